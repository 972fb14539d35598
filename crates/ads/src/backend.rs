use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use adpilot_core::domain::campaign::{CampaignId, CustomerId};
use adpilot_core::domain::mutation::{
    CampaignUpdate, CriterionScope, FieldMask, LocationCriterion, PortfolioStrategyUpdate,
};

use crate::errors::BackendError;

/// Read model of a campaign as reported by the ads backend.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CampaignSnapshot {
    pub resource_name: String,
    pub id: CampaignId,
    pub name: Option<String>,
    pub status: Option<String>,
    pub advertising_channel_type: Option<String>,
    pub campaign_budget: Option<String>,
    pub bidding_strategy: Option<String>,
    pub bidding_strategy_type: Option<String>,
    /// Every field the backend returned, as reported.
    pub raw: Value,
}

/// Location criteria on a campaign and on each of its ad groups.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GeoTargets {
    pub campaign_targets: Vec<Value>,
    pub ad_group_targets: BTreeMap<String, Vec<Value>>,
}

/// A single mutate request, in domain terms.
#[derive(Clone, Debug, PartialEq)]
pub enum MutateOperation {
    UpdateCampaign { update: CampaignUpdate, mask: FieldMask },
    UpdateCampaignBudget { resource_name: String, amount_micros: i64 },
    /// Removes `remove` then creates `create`, in one request.
    ReplaceLocationCriteria {
        scope: CriterionScope,
        remove: Vec<String>,
        create: Vec<LocationCriterion>,
    },
    UpdateBiddingStrategy { update: PortfolioStrategyUpdate, mask: FieldMask },
}

impl MutateOperation {
    /// Whether the caller expects one resource name per sub-operation.
    pub fn is_batch(&self) -> bool {
        matches!(self, Self::ReplaceLocationCriteria { .. })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MutateResponse {
    pub resource_names: Vec<String>,
}

#[async_trait]
pub trait AdsBackend: Send + Sync {
    async fn get_campaign(
        &self,
        customer_id: &CustomerId,
        campaign_id: &CampaignId,
    ) -> Result<Option<CampaignSnapshot>, BackendError>;

    /// Resource names of the LOCATION criteria attached to `scope`.
    async fn list_location_criteria(
        &self,
        customer_id: &CustomerId,
        scope: &CriterionScope,
    ) -> Result<Vec<String>, BackendError>;

    async fn get_geo_targets(
        &self,
        customer_id: &CustomerId,
        campaign_id: &CampaignId,
    ) -> Result<GeoTargets, BackendError>;

    async fn list_shared_budgets(&self, customer_id: &CustomerId)
        -> Result<Vec<Value>, BackendError>;

    async fn list_portfolio_strategies(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Value>, BackendError>;

    async fn list_campaigns_by_bidding_strategy(
        &self,
        customer_id: &CustomerId,
        bidding_strategy_resource_name: &str,
    ) -> Result<Vec<Value>, BackendError>;

    async fn mutate(
        &self,
        customer_id: &CustomerId,
        operation: &MutateOperation,
    ) -> Result<MutateResponse, BackendError>;
}
