//! Google Ads integration: backend trait and REST client, wire translation,
//! live / dry-run executors and the campaign mutation orchestrator.

pub mod backend;
pub mod errors;
pub mod executor;
pub mod memory;
pub mod rest;
pub mod updater;
pub mod wire;

pub use backend::{AdsBackend, CampaignSnapshot, GeoTargets, MutateOperation, MutateResponse};
pub use errors::{AdsApiError, BackendError, UpdateError};
pub use executor::{DryRunExecutor, LiveExecutor, Mutation, MutationExecutor, MutationResult};
pub use memory::InMemoryAdsBackend;
pub use rest::GoogleAdsRestClient;
pub use updater::CampaignUpdater;
