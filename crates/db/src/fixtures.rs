use serde::Deserialize;
use serde_json::Value;

use crate::repositories::{Document, DocumentStore, RepositoryError};

/// Demo customer used by `adpilot seed` and the smoke tests.
pub const DEMO_CUSTOMER_ID: &str = "1234567890";

#[derive(Debug, Deserialize)]
struct SeedDocument {
    collection: String,
    id: String,
    data: Value,
}

/// Instruction and campaign-config documents for a single demo customer.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const JSON: &str = include_str!("../../../config/fixtures/demo_documents.json");

    fn documents() -> Result<Vec<SeedDocument>, RepositoryError> {
        serde_json::from_str(Self::JSON)
            .map_err(|error| RepositoryError::Decode(format!("invalid seed fixture ({error})")))
    }

    pub async fn load(store: &dyn DocumentStore) -> Result<SeedResult, RepositoryError> {
        let mut documents_seeded = Vec::new();

        for seed in Self::documents()? {
            let campaign_count = campaign_count(&seed.data);
            store.put_document(&seed.collection, Document::new(seed.id.clone(), seed.data)).await?;
            documents_seeded.push(SeededDocument {
                collection: seed.collection,
                id: seed.id,
                campaign_count,
            });
        }

        Ok(SeedResult { documents_seeded })
    }

    pub async fn verify(store: &dyn DocumentStore) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for seed in Self::documents()? {
            let found = store.get_document(&seed.collection, &seed.id).await?;
            let matches = found.map(|document| document.data == seed.data).unwrap_or(false);
            checks.push((format!("{}/{}", seed.collection, seed.id), matches));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

fn campaign_count(data: &Value) -> usize {
    data.get("campaigns").and_then(Value::as_array).map(Vec::len).unwrap_or(0)
}

#[derive(Debug)]
pub struct SeedResult {
    pub documents_seeded: Vec<SeededDocument>,
}

#[derive(Debug)]
pub struct SeededDocument {
    pub collection: String,
    pub id: String,
    pub campaign_count: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

#[cfg(test)]
mod tests {
    use super::{DemoSeedDataset, DEMO_CUSTOMER_ID};
    use crate::repositories::{DocumentStore, InMemoryDocumentStore};

    #[tokio::test]
    async fn verify_reports_missing_documents_before_load() {
        let store = InMemoryDocumentStore::new();

        let before = DemoSeedDataset::verify(&store).await.expect("verify");
        assert!(!before.all_present);

        let seeded = DemoSeedDataset::load(&store).await.expect("load");
        assert_eq!(seeded.documents_seeded.len(), 3);

        let after = DemoSeedDataset::verify(&store).await.expect("verify");
        assert!(after.all_present, "checks: {:?}", after.checks);

        let config = store
            .get_document("GoogleAdsConfig", DEMO_CUSTOMER_ID)
            .await
            .expect("get document")
            .expect("config seeded");
        assert_eq!(config.data["campaigns"].as_array().map(Vec::len), Some(3));
    }
}
