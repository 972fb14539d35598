//! Campaign mutation orchestration: validate, build, then hand the mutation
//! to whichever executor the run was configured with.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::{json, Value};

use adpilot_core::bidding::{is_allowed, try_apply_strategy};
use adpilot_core::domain::campaign::{
    campaign_resource, ensure_owned, geo_target_constant, is_portfolio_reference,
    parse_location_id, AdGroupId, CampaignId, CampaignStatus, CustomerId, ResourceKind,
};
use adpilot_core::domain::mutation::{
    CampaignUpdate, CriterionScope, FieldMask, LocationCriterion, PortfolioStrategyUpdate,
};
use adpilot_core::domain::strategy::StrategyDetails;
use adpilot_core::errors::ValidationError;

use crate::backend::{AdsBackend, CampaignSnapshot, GeoTargets, MutateOperation};
use crate::errors::UpdateError;
use crate::executor::{Mutation, MutationExecutor, MutationResult};

const UNKNOWN_TARGET: &str = "unknown";

fn dollars(micros: i64) -> Decimal {
    Decimal::new(micros, 6).round_dp(2)
}

fn ensure_positive(field: &'static str, value: i64) -> Result<(), ValidationError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ValidationError::NonPositiveAmount { field, value })
    }
}

fn details_value(details: Option<&StrategyDetails>) -> Value {
    details.and_then(|details| serde_json::to_value(details).ok()).unwrap_or(Value::Null)
}

pub struct CampaignUpdater {
    backend: Arc<dyn AdsBackend>,
    executor: Arc<dyn MutationExecutor>,
}

impl CampaignUpdater {
    pub fn new(backend: Arc<dyn AdsBackend>, executor: Arc<dyn MutationExecutor>) -> Self {
        Self { backend, executor }
    }

    pub fn is_dry_run(&self) -> bool {
        self.executor.is_dry_run()
    }

    async fn campaign(
        &self,
        customer_id: &CustomerId,
        campaign_id: &CampaignId,
    ) -> Result<CampaignSnapshot, UpdateError> {
        self.backend
            .get_campaign(customer_id, campaign_id)
            .await
            .map_err(|error| UpdateError::from_backend("fetch campaign details", error))?
            .ok_or_else(|| {
                UpdateError::Lookup(format!("Campaign with ID '{campaign_id}' not found."))
            })
    }

    pub async fn update_campaign_status(
        &self,
        customer_id: &CustomerId,
        campaign_id: &CampaignId,
        status: &str,
    ) -> Result<MutationResult, UpdateError> {
        let parsed: CampaignStatus = status.parse()?;

        let mut update = CampaignUpdate::new(campaign_resource(customer_id, campaign_id));
        update.status = Some(parsed);

        self.executor
            .apply(
                customer_id,
                Mutation {
                    tool: "update_google_ads_campaign_status",
                    operation_name: "update campaign",
                    params: json!({
                        "customer_id": customer_id,
                        "campaign_id": campaign_id,
                        "status": status,
                    }),
                    description: format!("Change campaign {campaign_id} status to {status}"),
                    target: campaign_id.to_string(),
                    operation: MutateOperation::UpdateCampaign {
                        update,
                        mask: ["status"].into_iter().collect(),
                    },
                },
            )
            .await
    }

    pub async fn update_campaign_budget(
        &self,
        customer_id: &CustomerId,
        campaign_id: &CampaignId,
        new_budget_micros: i64,
    ) -> Result<MutationResult, UpdateError> {
        ensure_positive("new_budget_micros", new_budget_micros)?;

        let budget = self
            .backend
            .get_campaign(customer_id, campaign_id)
            .await
            .map_err(|error| UpdateError::from_backend("fetch campaign budget", error))?
            .and_then(|snapshot| snapshot.campaign_budget)
            .filter(|budget| !budget.is_empty())
            .ok_or_else(|| {
                UpdateError::Lookup(format!(
                    "Campaign with ID '{campaign_id}' not found or has no budget."
                ))
            })?;

        self.executor
            .apply(
                customer_id,
                Mutation {
                    tool: "update_google_ads_campaign_budget",
                    operation_name: "update campaign budget",
                    params: json!({
                        "customer_id": customer_id,
                        "campaign_id": campaign_id,
                        "new_budget_micros": new_budget_micros,
                    }),
                    description: format!(
                        "Change campaign {campaign_id} budget to ${:.2}",
                        dollars(new_budget_micros)
                    ),
                    target: campaign_id.to_string(),
                    operation: MutateOperation::UpdateCampaignBudget {
                        resource_name: budget,
                        amount_micros: new_budget_micros,
                    },
                },
            )
            .await
    }

    pub async fn update_campaign_geo_targets(
        &self,
        customer_id: &CustomerId,
        campaign_id: &CampaignId,
        location_ids: &[String],
        negative: bool,
    ) -> Result<MutationResult, UpdateError> {
        let scope = CriterionScope::Campaign(campaign_id.clone());
        let target = campaign_id.to_string();
        self.replace_geo_targets(customer_id, scope, target, location_ids, negative).await
    }

    pub async fn update_ad_group_geo_targets(
        &self,
        customer_id: &CustomerId,
        ad_group_id: &AdGroupId,
        location_ids: &[String],
        negative: bool,
    ) -> Result<MutationResult, UpdateError> {
        let scope = CriterionScope::AdGroup(ad_group_id.clone());
        let target = UNKNOWN_TARGET.to_string();
        self.replace_geo_targets(customer_id, scope, target, location_ids, negative).await
    }

    /// Removes every LOCATION criterion on `scope`, then creates the
    /// requested ones, in a single operation list.
    async fn replace_geo_targets(
        &self,
        customer_id: &CustomerId,
        scope: CriterionScope,
        target: String,
        location_ids: &[String],
        negative: bool,
    ) -> Result<MutationResult, UpdateError> {
        let create = location_ids
            .iter()
            .map(|raw| {
                parse_location_id(raw).map(|id| LocationCriterion {
                    geo_target_constant: geo_target_constant(&id),
                    negative,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let remove = self
            .backend
            .list_location_criteria(customer_id, &scope)
            .await
            .map_err(|error| UpdateError::from_backend("fetch existing geo targets", error))?;

        if remove.is_empty() && create.is_empty() {
            return Ok(MutationResult::no_changes());
        }

        let target_type = if negative { "negative" } else { "positive" };
        let (tool, operation_name, params, description) = match &scope {
            CriterionScope::Campaign(campaign_id) => (
                "update_google_ads_campaign_geo_targets",
                "update campaign geo targets",
                json!({
                    "customer_id": customer_id,
                    "campaign_id": campaign_id,
                    "location_ids": location_ids,
                    "negative": negative,
                }),
                format!(
                    "Update campaign {campaign_id} {target_type} geo targets to {location_ids:?}"
                ),
            ),
            CriterionScope::AdGroup(ad_group_id) => (
                "update_google_ads_ad_group_geo_targets",
                "update ad group geo targets",
                json!({
                    "customer_id": customer_id,
                    "ad_group_id": ad_group_id,
                    "location_ids": location_ids,
                    "negative": negative,
                }),
                format!(
                    "Update ad group {ad_group_id} {target_type} geo targets to {location_ids:?}"
                ),
            ),
        };

        tracing::debug!(
            event_name = "ads.geo_targets.replace",
            customer_id = %customer_id,
            scope = scope.label(),
            removing = remove.len(),
            creating = create.len(),
            "replacing location criteria"
        );

        self.executor
            .apply(
                customer_id,
                Mutation {
                    tool,
                    operation_name,
                    params,
                    description,
                    target,
                    operation: MutateOperation::ReplaceLocationCriteria { scope, remove, create },
                },
            )
            .await
    }

    /// `strategy_type` is a strategy type name or a portfolio strategy
    /// resource name owned by `customer_id`.
    pub async fn update_bidding_strategy(
        &self,
        customer_id: &CustomerId,
        campaign_id: &CampaignId,
        strategy_type: &str,
        details: Option<&StrategyDetails>,
    ) -> Result<MutationResult, UpdateError> {
        let snapshot = self.campaign(customer_id, campaign_id).await?;
        let channel = snapshot.advertising_channel_type.as_deref().ok_or_else(|| {
            UpdateError::Lookup("Could not determine advertising_channel_type.".to_string())
        })?;

        let strategy = strategy_type.trim();
        if is_portfolio_reference(strategy) {
            ensure_owned(strategy, customer_id, ResourceKind::BiddingStrategy)?;
        } else if !is_allowed(channel, strategy) {
            return Err(ValidationError::StrategyNotAllowed {
                strategy: strategy_type.to_string(),
                channel: channel.to_string(),
            }
            .into());
        }

        let mut update = CampaignUpdate::new(campaign_resource(customer_id, campaign_id));
        let mut mask = FieldMask::new();
        try_apply_strategy(&mut update, strategy, &mut mask, details).map_err(|cause| {
            ValidationError::StrategyNotApplied {
                strategy: strategy_type.to_string(),
                cause: cause.to_string(),
            }
        })?;

        tracing::debug!(
            event_name = "ads.bidding_strategy.built",
            customer_id = %customer_id,
            campaign_id = %campaign_id,
            channel,
            mask = %mask,
            "bidding strategy mutation built"
        );

        self.executor
            .apply(
                customer_id,
                Mutation {
                    tool: "update_google_ads_bidding_strategy",
                    operation_name: "update bidding strategy",
                    params: json!({
                        "customer_id": customer_id,
                        "campaign_id": campaign_id,
                        "strategy_type": strategy_type,
                        "strategy_details": details_value(details),
                    }),
                    description: format!(
                        "Change campaign {campaign_id} bidding strategy to {strategy_type}"
                    ),
                    target: campaign_id.to_string(),
                    operation: MutateOperation::UpdateCampaign { update, mask },
                },
            )
            .await
    }

    pub async fn update_shared_budget(
        &self,
        customer_id: &CustomerId,
        budget_resource_name: &str,
        new_amount_micros: i64,
    ) -> Result<MutationResult, UpdateError> {
        ensure_owned(budget_resource_name, customer_id, ResourceKind::CampaignBudget)?;
        ensure_positive("new_amount_micros", new_amount_micros)?;

        self.executor
            .apply(
                customer_id,
                Mutation {
                    tool: "update_google_ads_shared_budget",
                    operation_name: "update shared budget",
                    params: json!({
                        "customer_id": customer_id,
                        "budget_resource_name": budget_resource_name,
                        "new_amount_micros": new_amount_micros,
                    }),
                    description: format!(
                        "Change shared budget {budget_resource_name} to ${:.2}",
                        dollars(new_amount_micros)
                    ),
                    target: UNKNOWN_TARGET.to_string(),
                    operation: MutateOperation::UpdateCampaignBudget {
                        resource_name: budget_resource_name.to_string(),
                        amount_micros: new_amount_micros,
                    },
                },
            )
            .await
    }

    pub async fn update_portfolio_bidding_strategy(
        &self,
        customer_id: &CustomerId,
        bidding_strategy_resource_name: &str,
        strategy_type: &str,
        details: Option<&StrategyDetails>,
    ) -> Result<MutationResult, UpdateError> {
        ensure_owned(bidding_strategy_resource_name, customer_id, ResourceKind::BiddingStrategy)?;

        let mut update = PortfolioStrategyUpdate::new(bidding_strategy_resource_name);
        let mut mask = FieldMask::new();
        try_apply_strategy(&mut update, strategy_type.trim(), &mut mask, details).map_err(
            |cause| ValidationError::StrategyNotApplied {
                strategy: strategy_type.to_string(),
                cause: cause.to_string(),
            },
        )?;

        self.executor
            .apply(
                customer_id,
                Mutation {
                    tool: "update_google_ads_portfolio_bidding_strategy",
                    operation_name: "update portfolio bidding strategy",
                    params: json!({
                        "customer_id": customer_id,
                        "bidding_strategy_resource_name": bidding_strategy_resource_name,
                        "strategy_type": strategy_type,
                        "strategy_details": details_value(details),
                    }),
                    description: format!(
                        "Change portfolio strategy {} to {strategy_type}",
                        bidding_strategy_resource_name
                    ),
                    target: UNKNOWN_TARGET.to_string(),
                    operation: MutateOperation::UpdateBiddingStrategy { update, mask },
                },
            )
            .await
    }

    pub async fn get_campaign_details(
        &self,
        customer_id: &CustomerId,
        campaign_id: &CampaignId,
    ) -> Result<CampaignSnapshot, UpdateError> {
        self.campaign(customer_id, campaign_id).await
    }

    pub async fn get_geo_targets(
        &self,
        customer_id: &CustomerId,
        campaign_id: &CampaignId,
    ) -> Result<GeoTargets, UpdateError> {
        self.backend
            .get_geo_targets(customer_id, campaign_id)
            .await
            .map_err(|error| UpdateError::from_backend("fetch geo targets", error))
    }

    pub async fn list_shared_budgets(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Value>, UpdateError> {
        self.backend
            .list_shared_budgets(customer_id)
            .await
            .map_err(|error| UpdateError::from_backend("fetch shared budgets", error))
    }

    pub async fn list_portfolio_bidding_strategies(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Value>, UpdateError> {
        self.backend
            .list_portfolio_strategies(customer_id)
            .await
            .map_err(|error| UpdateError::from_backend("fetch portfolio bidding strategies", error))
    }

    pub async fn get_campaigns_by_bidding_strategy(
        &self,
        customer_id: &CustomerId,
        bidding_strategy_resource_name: &str,
    ) -> Result<Vec<Value>, UpdateError> {
        ensure_owned(bidding_strategy_resource_name, customer_id, ResourceKind::BiddingStrategy)?;
        self.backend
            .list_campaigns_by_bidding_strategy(customer_id, bidding_strategy_resource_name)
            .await
            .map_err(|error| {
                UpdateError::from_backend("fetch campaigns by bidding strategy", error)
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use adpilot_core::actions::RunActionLog;
    use adpilot_core::domain::campaign::{AdGroupId, CampaignId, CustomerId};
    use adpilot_core::domain::mutation::{CampaignBidding, CriterionScope};
    use adpilot_core::domain::run::RunId;
    use adpilot_core::domain::strategy::{StrategyDetails, StrategyMutation};
    use adpilot_core::errors::ValidationError;

    use super::CampaignUpdater;
    use crate::backend::MutateOperation;
    use crate::errors::{AdsApiError, UpdateError};
    use crate::executor::{DryRunExecutor, LiveExecutor};
    use crate::memory::{campaign_snapshot, InMemoryAdsBackend};

    const CUSTOMER: &str = "1234567890";

    fn customer() -> CustomerId {
        CustomerId::new(CUSTOMER)
    }

    fn backend() -> Arc<InMemoryAdsBackend> {
        let customer = customer();
        Arc::new(
            InMemoryAdsBackend::new()
                .with_campaign(
                    &customer,
                    campaign_snapshot(
                        &customer,
                        "11",
                        "SEARCH",
                        Some("customers/1234567890/campaignBudgets/5"),
                    ),
                )
                .with_campaign(
                    &customer,
                    campaign_snapshot(&customer, "22", "PERFORMANCE_MAX", None),
                )
                .with_location_criteria(
                    &customer,
                    CriterionScope::Campaign(CampaignId("11".to_string())),
                    &["customers/1234567890/campaignCriteria/11~2840"],
                ),
        )
    }

    fn live(backend: Arc<InMemoryAdsBackend>, actions: &RunActionLog) -> CampaignUpdater {
        let executor = Arc::new(LiveExecutor::new(backend.clone(), actions.clone()));
        CampaignUpdater::new(backend, executor)
    }

    fn dry(backend: Arc<InMemoryAdsBackend>, actions: &RunActionLog) -> CampaignUpdater {
        CampaignUpdater::new(backend, Arc::new(DryRunExecutor::new(actions.clone())))
    }

    fn actions() -> RunActionLog {
        RunActionLog::detached(RunId("run-test".to_string()))
    }

    #[tokio::test]
    async fn live_and_dry_status_updates_share_shape_and_differ_in_effect() {
        let backend = backend();
        let live_actions = actions();
        let dry_actions = actions();

        let live_result = live(backend.clone(), &live_actions)
            .update_campaign_status(&customer(), &CampaignId("11".to_string()), "PAUSED")
            .await
            .expect("live update");
        let dry_result = dry(backend.clone(), &dry_actions)
            .update_campaign_status(&customer(), &CampaignId("11".to_string()), "PAUSED")
            .await
            .expect("dry update");

        assert!(live_result.success && dry_result.success);
        assert_eq!(live_result.resource_name.as_deref(), Some("customers/1234567890/campaigns/11"));
        assert_eq!(dry_result.resource_name.as_deref(), Some("simulated/11"));
        assert!(dry_result.dry_run);
        assert_eq!(backend.mutations().len(), 1);

        let live_logged = live_actions.get_all();
        let dry_logged = dry_actions.get_all();
        assert_eq!(live_logged.len(), 1);
        assert_eq!(dry_logged.len(), 1);
        assert!(!live_logged[0].simulated);
        assert!(dry_logged[0].simulated);
        assert_eq!(live_logged[0].tool_name, dry_logged[0].tool_name);
        assert_eq!(live_logged[0].params, dry_logged[0].params);
        assert_eq!(live_logged[0].description, "Change campaign 11 status to PAUSED");
    }

    #[tokio::test]
    async fn invalid_status_is_rejected_before_any_executor_runs() {
        let backend = backend();
        let log = actions();

        let error = live(backend.clone(), &log)
            .update_campaign_status(&customer(), &CampaignId("11".to_string()), "REMOVED")
            .await
            .expect_err("REMOVED is not a settable status");

        assert!(matches!(error, UpdateError::Validation(ValidationError::InvalidStatus(_))));
        assert!(backend.mutations().is_empty());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn disallowed_strategy_names_strategy_and_channel() {
        let backend = backend();
        let log = actions();

        let error = dry(backend.clone(), &log)
            .update_bidding_strategy(&customer(), &CampaignId("22".to_string()), "MANUAL_CPC", None)
            .await
            .expect_err("PMax does not accept manual CPC");

        assert_eq!(
            error.to_string(),
            "Bidding strategy 'MANUAL_CPC' is not allowed for channel type 'PERFORMANCE_MAX'."
        );
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn target_impression_share_sends_exact_mask() {
        let backend = backend();
        let log = actions();
        let details = StrategyDetails::new()
            .with("location", "top_of_page")
            .with("location_fraction_micros", 650_000);

        live(backend.clone(), &log)
            .update_bidding_strategy(
                &customer(),
                &CampaignId("11".to_string()),
                "TARGET_IMPRESSION_SHARE",
                Some(&details),
            )
            .await
            .expect("search accepts impression share");

        let mutations = backend.mutations();
        let MutateOperation::UpdateCampaign { update, mask } = &mutations[0] else {
            panic!("expected a campaign update, got {:?}", mutations[0]);
        };
        assert_eq!(
            mask.to_vec(),
            vec![
                "target_impression_share.location".to_string(),
                "target_impression_share.location_fraction_micros".to_string(),
            ]
        );
        assert!(matches!(
            update.bidding,
            Some(CampaignBidding::Standard(StrategyMutation::TargetImpressionShare { .. }))
        ));
    }

    #[tokio::test]
    async fn missing_impression_share_location_fails_with_type_in_message() {
        let backend = backend();
        let details = StrategyDetails::new().with("location_fraction_micros", 650_000);

        let error = live(backend.clone(), &actions())
            .update_bidding_strategy(
                &customer(),
                &CampaignId("11".to_string()),
                "TARGET_IMPRESSION_SHARE",
                Some(&details),
            )
            .await
            .expect_err("location is required");

        assert!(error.to_string().contains("TARGET_IMPRESSION_SHARE"));
        assert!(backend.mutations().is_empty());
    }

    #[tokio::test]
    async fn portfolio_link_skips_table_but_must_be_owned() {
        let backend = backend();
        let updater = live(backend.clone(), &actions());
        let campaign = CampaignId("22".to_string());

        updater
            .update_bidding_strategy(
                &customer(),
                &campaign,
                "customers/1234567890/biddingStrategies/77",
                None,
            )
            .await
            .expect("owned portfolio links");

        let foreign = updater
            .update_bidding_strategy(
                &customer(),
                &campaign,
                "customers/999/biddingStrategies/77",
                None,
            )
            .await
            .expect_err("another customer's strategy");
        assert!(matches!(
            foreign,
            UpdateError::Validation(ValidationError::ForeignResource { .. })
        ));

        let mutations = backend.mutations();
        assert_eq!(mutations.len(), 1);
        let MutateOperation::UpdateCampaign { mask, .. } = &mutations[0] else {
            panic!("expected a campaign update");
        };
        assert_eq!(mask.to_vec(), vec!["bidding_strategy".to_string()]);
    }

    #[tokio::test]
    async fn unknown_campaign_is_a_lookup_failure() {
        let error = live(backend(), &actions())
            .update_bidding_strategy(
                &customer(),
                &CampaignId("404".to_string()),
                "MANUAL_CPC",
                None,
            )
            .await
            .expect_err("no such campaign");

        assert!(matches!(error, UpdateError::Lookup(_)));
        assert_eq!(error.error_class(), "lookup");
    }

    #[tokio::test]
    async fn budget_update_resolves_budget_resource_and_formats_dollars() {
        let backend = backend();
        let log = actions();

        let result = dry(backend.clone(), &log)
            .update_campaign_budget(&customer(), &CampaignId("11".to_string()), 12_345_678)
            .await
            .expect("dry budget update");

        assert_eq!(
            result.message.as_deref(),
            Some("[DRY-RUN] Change campaign 11 budget to $12.35")
        );
        assert_eq!(log.get_all()[0].params["new_budget_micros"], 12_345_678);

        let missing = dry(backend, &log)
            .update_campaign_budget(&customer(), &CampaignId("22".to_string()), 1_000_000)
            .await
            .expect_err("campaign 22 has no budget");
        assert_eq!(missing.to_string(), "Campaign with ID '22' not found or has no budget.");
    }

    #[tokio::test]
    async fn non_positive_budget_is_rejected() {
        let error = live(backend(), &actions())
            .update_campaign_budget(&customer(), &CampaignId("11".to_string()), 0)
            .await
            .expect_err("zero budget");

        assert!(matches!(
            error,
            UpdateError::Validation(ValidationError::NonPositiveAmount { value: 0, .. })
        ));
    }

    #[tokio::test]
    async fn geo_replacement_removes_existing_then_creates_requested() {
        let backend = backend();

        let result = live(backend.clone(), &actions())
            .update_campaign_geo_targets(
                &customer(),
                &CampaignId("11".to_string()),
                &["2826".to_string(), "2250".to_string()],
                false,
            )
            .await
            .expect("geo replacement");

        assert_eq!(result.resource_names.len(), 3);
        let mutations = backend.mutations();
        let MutateOperation::ReplaceLocationCriteria { remove, create, .. } = &mutations[0] else {
            panic!("expected a location replacement");
        };
        assert_eq!(remove, &vec!["customers/1234567890/campaignCriteria/11~2840".to_string()]);
        assert_eq!(create[0].geo_target_constant, "geoTargetConstants/2826");
        assert_eq!(create[1].geo_target_constant, "geoTargetConstants/2250");
    }

    #[tokio::test]
    async fn geo_replacement_without_any_criteria_is_a_no_op() {
        let backend = backend();
        let log = actions();

        let result = live(backend.clone(), &log)
            .update_ad_group_geo_targets(&customer(), &AdGroupId("9".to_string()), &[], true)
            .await
            .expect("no-op");

        assert_eq!(result.message.as_deref(), Some("No changes to apply."));
        assert!(backend.mutations().is_empty());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn non_numeric_location_id_is_rejected() {
        let error = live(backend(), &actions())
            .update_campaign_geo_targets(
                &customer(),
                &CampaignId("11".to_string()),
                &["USA".to_string()],
                false,
            )
            .await
            .expect_err("location ids are numeric");

        assert!(error.to_string().contains("Invalid location_id: 'USA'"));
    }

    #[tokio::test]
    async fn shared_budget_of_another_customer_never_reaches_backend() {
        let backend = backend();

        let error = live(backend.clone(), &actions())
            .update_shared_budget(&customer(), "customers/42/campaignBudgets/5", 5_000_000)
            .await
            .expect_err("foreign budget");

        assert!(matches!(error, UpdateError::Validation(ValidationError::ForeignResource { .. })));
        assert!(backend.mutations().is_empty());
    }

    #[tokio::test]
    async fn portfolio_strategy_update_accepts_portfolio_only_types() {
        let backend = backend();
        let log = actions();
        let details = StrategyDetails::new().with("target_cpa_micros", 2_500_000);

        let result = dry(backend.clone(), &log)
            .update_portfolio_bidding_strategy(
                &customer(),
                "customers/1234567890/biddingStrategies/77",
                "TARGET_CPA",
                Some(&details),
            )
            .await
            .expect("portfolio target cpa");

        assert_eq!(result.resource_name.as_deref(), Some("simulated/unknown"));
        assert_eq!(
            log.get_all()[0].description,
            "Change portfolio strategy customers/1234567890/biddingStrategies/77 to TARGET_CPA"
        );
        assert_eq!(
            log.get_all()[0].params["strategy_details"],
            json!({"target_cpa_micros": 2_500_000})
        );
    }

    #[tokio::test]
    async fn backend_rejection_is_logged_and_classified() {
        let backend = backend();
        backend.reject_mutations(vec![AdsApiError {
            category: "internalError".to_string(),
            code: "TRANSIENT_ERROR".to_string(),
            message: "try again later".to_string(),
            trigger: None,
            field_path: None,
        }]);
        let log = actions();

        let error = live(backend.clone(), &log)
            .update_campaign_status(&customer(), &CampaignId("11".to_string()), "ENABLED")
            .await
            .expect_err("backend rejects");

        assert!(error.is_retryable());
        assert_eq!(error.api_errors()[0].code, "TRANSIENT_ERROR");
        let logged = log.get_all();
        assert_eq!(logged.len(), 1);
        assert_eq!(
            logged[0].result.as_ref().map(|result| result["success"].clone()),
            Some(json!(false))
        );
    }
}
