use adpilot_db::{DemoSeedDataset, SeededDocument, SqlDocumentStore};

use crate::commands::{open_database, prepare, CommandResult};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let store = SqlDocumentStore::new(pool.clone());

        let seed_result = DemoSeedDataset::load(&store)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoSeedDataset::verify(&store)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result = if verification.all_present {
            Ok(seed_result.documents_seeded)
        } else {
            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(check.as_str()))
                .collect::<Vec<_>>();
            Err(("seed_verification", verification_message(&failed_checks), 6u8))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(documents) => {
            let lines: Vec<String> = documents.iter().map(describe).collect();
            let message = format!("demo documents loaded:\n{}", lines.join("\n"));
            CommandResult::success("seed", message)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn describe(document: &SeededDocument) -> String {
    if document.campaign_count == 0 {
        format!("  - {}/{}", document.collection, document.id)
    } else {
        format!(
            "  - {}/{} ({} campaigns)",
            document.collection, document.id, document.campaign_count
        )
    }
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
