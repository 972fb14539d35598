use adpilot_db::{
    connect_with_settings, migrations, DemoSeedDataset, DocumentStore, SqlDocumentStore,
};
use serde_json::Value;

type SeedContractTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

fn require_array<'a>(value: &'a Value, field_name: &str) -> Result<&'a [Value], String> {
    value
        .as_array()
        .map(|values| values.as_slice())
        .ok_or_else(|| format!("{field_name} should be an array"))
}

#[test]
fn fixture_documents_follow_the_collection_contract() -> SeedContractTestResult {
    let documents: Value =
        serde_json::from_str(DemoSeedDataset::JSON).map_err(|error| error.to_string())?;

    for document in require_array(&documents, "fixture")? {
        let collection = document["collection"].as_str().unwrap_or_default();
        let data = &document["data"];
        match collection {
            "CustomerInstructions" => {
                let instruction = data["instruction"].as_str().unwrap_or_default();
                require!(!instruction.trim().is_empty(), "instruction should not be blank");
            }
            "GoogleAdsConfig" | "SA360Config" => {
                for campaign in require_array(&data["campaigns"], "campaigns")? {
                    let id = campaign["campaignId"].as_str().unwrap_or_default();
                    require!(
                        !id.is_empty() && id.chars().all(|ch| ch.is_ascii_digit()),
                        "campaignId `{id}` should be numeric"
                    );
                }
            }
            other => return Err(format!("unexpected collection `{other}`")),
        }
    }

    Ok(())
}

#[tokio::test]
async fn seeding_sql_store_is_idempotent() -> SeedContractTestResult {
    let pool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .map_err(|error| error.to_string())?;
    migrations::run_pending(&pool).await.map_err(|error| error.to_string())?;
    let store = SqlDocumentStore::new(pool.clone());

    DemoSeedDataset::load(&store).await.map_err(|error| error.to_string())?;
    DemoSeedDataset::load(&store).await.map_err(|error| error.to_string())?;

    let verification = DemoSeedDataset::verify(&store).await.map_err(|error| error.to_string())?;
    require!(verification.all_present, "seed verification failed: {:?}", verification.checks);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM document")
        .fetch_one(&pool)
        .await
        .map_err(|error| error.to_string())?;
    require!(count == 3, "expected 3 documents after double seed, found {count}");

    let instructions = store
        .get_document("CustomerInstructions", "1234567890")
        .await
        .map_err(|error| error.to_string())?;
    require!(instructions.is_some(), "demo instructions should be stored");

    pool.close().await;
    Ok(())
}
