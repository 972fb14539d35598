use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::{json, Value};

use adpilot_core::domain::campaign::{campaign_resource, CampaignId, CustomerId};
use adpilot_core::domain::mutation::CriterionScope;

use crate::backend::{AdsBackend, CampaignSnapshot, GeoTargets, MutateOperation, MutateResponse};
use crate::errors::{AdsApiError, BackendError};

/// Campaign snapshot with the fields the orchestrator reads.
pub fn campaign_snapshot(
    customer_id: &CustomerId,
    campaign_id: &str,
    channel_type: &str,
    campaign_budget: Option<&str>,
) -> CampaignSnapshot {
    let resource_name = campaign_resource(customer_id, &CampaignId(campaign_id.to_string()));
    CampaignSnapshot {
        resource_name: resource_name.clone(),
        id: CampaignId(campaign_id.to_string()),
        name: Some(format!("Campaign {campaign_id}")),
        status: Some("ENABLED".to_string()),
        advertising_channel_type: Some(channel_type.to_string()),
        campaign_budget: campaign_budget.map(str::to_string),
        bidding_strategy: None,
        bidding_strategy_type: None,
        raw: json!({
            "resourceName": resource_name,
            "id": campaign_id,
            "advertisingChannelType": channel_type,
        }),
    }
}

#[derive(Default)]
struct State {
    campaigns: HashMap<(CustomerId, CampaignId), CampaignSnapshot>,
    criteria: HashMap<(CustomerId, CriterionScope), Vec<String>>,
    shared_budgets: Vec<Value>,
    portfolio_strategies: Vec<Value>,
}

/// Backend held entirely in memory. Records every mutate call.
#[derive(Default)]
pub struct InMemoryAdsBackend {
    state: RwLock<State>,
    mutations: Mutex<Vec<MutateOperation>>,
    rejection: Mutex<Option<Vec<AdsApiError>>>,
}

impl InMemoryAdsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_campaign(self, customer_id: &CustomerId, snapshot: CampaignSnapshot) -> Self {
        self.write().campaigns.insert((customer_id.clone(), snapshot.id.clone()), snapshot);
        self
    }

    pub fn with_location_criteria(
        self,
        customer_id: &CustomerId,
        scope: CriterionScope,
        resource_names: &[&str],
    ) -> Self {
        self.write().criteria.insert(
            (customer_id.clone(), scope),
            resource_names.iter().map(|name| name.to_string()).collect(),
        );
        self
    }

    pub fn with_shared_budget(self, budget: Value) -> Self {
        self.write().shared_budgets.push(budget);
        self
    }

    pub fn with_portfolio_strategy(self, strategy: Value) -> Self {
        self.write().portfolio_strategies.push(strategy);
        self
    }

    /// Every following mutate call fails with `errors`.
    pub fn reject_mutations(&self, errors: Vec<AdsApiError>) {
        *lock(&self.rejection) = Some(errors);
    }

    pub fn mutations(&self) -> Vec<MutateOperation> {
        lock(&self.mutations).clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        match self.state.read() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        match self.state.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait]
impl AdsBackend for InMemoryAdsBackend {
    async fn get_campaign(
        &self,
        customer_id: &CustomerId,
        campaign_id: &CampaignId,
    ) -> Result<Option<CampaignSnapshot>, BackendError> {
        Ok(self.read().campaigns.get(&(customer_id.clone(), campaign_id.clone())).cloned())
    }

    async fn list_location_criteria(
        &self,
        customer_id: &CustomerId,
        scope: &CriterionScope,
    ) -> Result<Vec<String>, BackendError> {
        let key = (customer_id.clone(), scope.clone());
        Ok(self.read().criteria.get(&key).cloned().unwrap_or_default())
    }

    async fn get_geo_targets(
        &self,
        customer_id: &CustomerId,
        campaign_id: &CampaignId,
    ) -> Result<GeoTargets, BackendError> {
        let scope = CriterionScope::Campaign(campaign_id.clone());
        let campaign_targets = self
            .list_location_criteria(customer_id, &scope)
            .await?
            .into_iter()
            .map(|resource_name| json!({ "resourceName": resource_name }))
            .collect();
        Ok(GeoTargets { campaign_targets, ..GeoTargets::default() })
    }

    async fn list_shared_budgets(
        &self,
        _customer_id: &CustomerId,
    ) -> Result<Vec<Value>, BackendError> {
        Ok(self.read().shared_budgets.clone())
    }

    async fn list_portfolio_strategies(
        &self,
        _customer_id: &CustomerId,
    ) -> Result<Vec<Value>, BackendError> {
        Ok(self.read().portfolio_strategies.clone())
    }

    async fn list_campaigns_by_bidding_strategy(
        &self,
        customer_id: &CustomerId,
        bidding_strategy_resource_name: &str,
    ) -> Result<Vec<Value>, BackendError> {
        Ok(self
            .read()
            .campaigns
            .iter()
            .filter(|((owner, _), snapshot)| {
                owner == customer_id
                    && snapshot.bidding_strategy.as_deref() == Some(bidding_strategy_resource_name)
            })
            .map(|(_, snapshot)| snapshot.raw.clone())
            .collect())
    }

    async fn mutate(
        &self,
        customer_id: &CustomerId,
        operation: &MutateOperation,
    ) -> Result<MutateResponse, BackendError> {
        lock(&self.mutations).push(operation.clone());
        if let Some(errors) = lock(&self.rejection).clone() {
            return Err(BackendError::Rejected { errors });
        }

        let resource_names = match operation {
            MutateOperation::UpdateCampaign { update, .. } => vec![update.resource_name.clone()],
            MutateOperation::UpdateCampaignBudget { resource_name, .. } => {
                vec![resource_name.clone()]
            }
            MutateOperation::UpdateBiddingStrategy { update, .. } => {
                vec![update.resource_name.clone()]
            }
            MutateOperation::ReplaceLocationCriteria { scope, remove, create } => {
                let collection = match scope {
                    CriterionScope::Campaign(_) => "campaignCriteria",
                    CriterionScope::AdGroup(_) => "adGroupCriteria",
                };
                let created = create.iter().map(|criterion| {
                    let geo_id =
                        criterion.geo_target_constant.rsplit('/').next().unwrap_or_default();
                    format!("customers/{}/{collection}/{}~{geo_id}", customer_id, scope.id())
                });
                remove.iter().cloned().chain(created).collect()
            }
        };

        Ok(MutateResponse { resource_names })
    }
}
