//! Google Ads tools exposed to the deciding model.
//!
//! Every tool is bound to one customer and one [`CampaignUpdater`]; whether
//! mutations are applied or simulated is decided by the updater's executor,
//! so the live and dry-run toolsets are the same code.

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

use adpilot_ads::{CampaignUpdater, UpdateError};
use adpilot_core::domain::campaign::{AdGroupId, CampaignId, CustomerId};
use adpilot_core::domain::strategy::StrategyDetails;

use crate::tools::{Tool, ToolRegistry};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdsTool {
    UpdateCampaignStatus,
    UpdateCampaignBudget,
    UpdateCampaignGeoTargets,
    UpdateAdGroupGeoTargets,
    UpdateBiddingStrategy,
    UpdateSharedBudget,
    UpdatePortfolioBiddingStrategy,
    GetCampaignDetails,
    GetGeoTargets,
    ListSharedBudgets,
    ListPortfolioBiddingStrategies,
    GetCampaignsByBiddingStrategy,
}

impl AdsTool {
    pub const ALL: [Self; 12] = [
        Self::UpdateCampaignStatus,
        Self::UpdateCampaignBudget,
        Self::UpdateCampaignGeoTargets,
        Self::UpdateAdGroupGeoTargets,
        Self::UpdateBiddingStrategy,
        Self::UpdateSharedBudget,
        Self::UpdatePortfolioBiddingStrategy,
        Self::GetCampaignDetails,
        Self::GetGeoTargets,
        Self::ListSharedBudgets,
        Self::ListPortfolioBiddingStrategies,
        Self::GetCampaignsByBiddingStrategy,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::UpdateCampaignStatus => "update_google_ads_campaign_status",
            Self::UpdateCampaignBudget => "update_google_ads_campaign_budget",
            Self::UpdateCampaignGeoTargets => "update_google_ads_campaign_geo_targets",
            Self::UpdateAdGroupGeoTargets => "update_google_ads_ad_group_geo_targets",
            Self::UpdateBiddingStrategy => "update_google_ads_bidding_strategy",
            Self::UpdateSharedBudget => "update_google_ads_shared_budget",
            Self::UpdatePortfolioBiddingStrategy => "update_google_ads_portfolio_bidding_strategy",
            Self::GetCampaignDetails => "get_google_ads_campaign_details",
            Self::GetGeoTargets => "get_google_ads_geo_targets",
            Self::ListSharedBudgets => "list_google_ads_shared_budgets",
            Self::ListPortfolioBiddingStrategies => "list_google_ads_portfolio_bidding_strategies",
            Self::GetCampaignsByBiddingStrategy => "get_google_ads_campaigns_by_bidding_strategy",
        }
    }

    pub fn is_mutating(self) -> bool {
        matches!(
            self,
            Self::UpdateCampaignStatus
                | Self::UpdateCampaignBudget
                | Self::UpdateCampaignGeoTargets
                | Self::UpdateAdGroupGeoTargets
                | Self::UpdateBiddingStrategy
                | Self::UpdateSharedBudget
                | Self::UpdatePortfolioBiddingStrategy
        )
    }

    fn description(self) -> &'static str {
        match self {
            Self::UpdateCampaignStatus => "Enable or pause a campaign.",
            Self::UpdateCampaignBudget => "Set the daily budget of a campaign's budget, in micros.",
            Self::UpdateCampaignGeoTargets => {
                "Replace every location target of a campaign with the given location ids."
            }
            Self::UpdateAdGroupGeoTargets => {
                "Replace every location target of an ad group with the given location ids."
            }
            Self::UpdateBiddingStrategy => {
                "Change a campaign's bidding strategy, or link it to a portfolio strategy \
                 by resource name."
            }
            Self::UpdateSharedBudget => "Set the amount of an explicitly shared budget, in micros.",
            Self::UpdatePortfolioBiddingStrategy => {
                "Change the type or targets of a portfolio bidding strategy."
            }
            Self::GetCampaignDetails => {
                "Fetch a campaign's status, channel type, budget and bidding configuration."
            }
            Self::GetGeoTargets => "Fetch the location targets of a campaign and of its ad groups.",
            Self::ListSharedBudgets => "List the customer's enabled, explicitly shared budgets.",
            Self::ListPortfolioBiddingStrategies => {
                "List the customer's enabled portfolio bidding strategies."
            }
            Self::GetCampaignsByBiddingStrategy => {
                "List the campaigns attached to a portfolio bidding strategy."
            }
        }
    }

    fn parameters(self) -> Value {
        match self {
            Self::UpdateCampaignStatus => {
                json!({ "campaign_id": "string", "status": "ENABLED | PAUSED" })
            }
            Self::UpdateCampaignBudget => {
                json!({ "campaign_id": "string", "new_budget_micros": "integer > 0" })
            }
            Self::UpdateCampaignGeoTargets => json!({
                "campaign_id": "string",
                "location_ids": "array of numeric strings, e.g. [\"2840\"]",
                "negative": "boolean, default false"
            }),
            Self::UpdateAdGroupGeoTargets => json!({
                "ad_group_id": "string",
                "location_ids": "array of numeric strings",
                "negative": "boolean, default false"
            }),
            Self::UpdateBiddingStrategy => json!({
                "campaign_id": "string",
                "strategy_type": "strategy type name or customers/{id}/biddingStrategies/{id}",
                "strategy_details": "optional object, e.g. {\"target_cpa_micros\": 1000000}"
            }),
            Self::UpdateSharedBudget => json!({
                "budget_resource_name": "customers/{id}/campaignBudgets/{id}",
                "new_amount_micros": "integer > 0"
            }),
            Self::UpdatePortfolioBiddingStrategy => json!({
                "bidding_strategy_resource_name": "customers/{id}/biddingStrategies/{id}",
                "strategy_type": "strategy type name",
                "strategy_details": "optional object"
            }),
            Self::GetCampaignDetails | Self::GetGeoTargets => json!({ "campaign_id": "string" }),
            Self::ListSharedBudgets | Self::ListPortfolioBiddingStrategies => json!({}),
            Self::GetCampaignsByBiddingStrategy => json!({
                "bidding_strategy_resource_name": "customers/{id}/biddingStrategies/{id}"
            }),
        }
    }
}

/// Loosely-typed tool arguments as produced by the model.
pub(crate) struct Args<'a> {
    tool: &'static str,
    map: &'a Map<String, Value>,
}

impl<'a> Args<'a> {
    pub(crate) fn parse(tool: &'static str, input: &'a Value) -> Result<Self> {
        match input {
            Value::Object(map) => Ok(Self { tool, map }),
            other => bail!("{tool} expects an object of arguments, got {other}"),
        }
    }

    pub(crate) fn present(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|value| !value.is_null())
    }

    pub(crate) fn text(&self, key: &str) -> Result<String> {
        match self.present(key) {
            Some(Value::String(value)) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            Some(Value::Number(value)) => Ok(value.to_string()),
            Some(other) => bail!("{}: `{key}` must be a string, got {other}", self.tool),
            None => bail!("{}: missing required argument `{key}`", self.tool),
        }
    }

    fn integer(&self, key: &str) -> Result<i64> {
        let value = self
            .present(key)
            .ok_or_else(|| anyhow!("{}: missing required argument `{key}`", self.tool))?;
        let parsed = match value {
            Value::Number(number) => number.as_i64().or_else(|| {
                number.as_f64().filter(|float| float.fract() == 0.0).map(|float| float as i64)
            }),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| anyhow!("{}: `{key}` must be an integer, got {value}", self.tool))
    }

    fn boolean_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.present(key) {
            None => Ok(default),
            Some(Value::Bool(value)) => Ok(*value),
            Some(Value::String(text)) if text.eq_ignore_ascii_case("true") => Ok(true),
            Some(Value::String(text)) if text.eq_ignore_ascii_case("false") => Ok(false),
            Some(other) => bail!("{}: `{key}` must be a boolean, got {other}", self.tool),
        }
    }

    fn string_list(&self, key: &str) -> Result<Vec<String>> {
        let items = match self.present(key) {
            Some(Value::Array(items)) => items.as_slice(),
            Some(single @ (Value::String(_) | Value::Number(_))) => std::slice::from_ref(single),
            Some(other) => bail!("{}: `{key}` must be a list, got {other}", self.tool),
            None => bail!("{}: missing required argument `{key}`", self.tool),
        };
        items
            .iter()
            .map(|item| match item {
                Value::String(text) => Ok(text.clone()),
                Value::Number(number) => Ok(number.to_string()),
                other => bail!("{}: `{key}` entries must be strings, got {other}", self.tool),
            })
            .collect()
    }

    fn details(&self, key: &str) -> Result<Option<StrategyDetails>> {
        match self.present(key) {
            None => Ok(None),
            Some(value @ Value::Object(_)) => Ok(Some(serde_json::from_value(value.clone())?)),
            Some(other) => bail!("{}: `{key}` must be an object, got {other}", self.tool),
        }
    }
}

fn error_payload(error: &UpdateError) -> Value {
    json!({
        "success": false,
        "error": error.to_string(),
        "error_class": error.error_class(),
        "errors": error.api_errors(),
        "retryable": error.is_retryable(),
    })
}

/// One Google Ads tool bound to a customer.
pub struct AdsToolHandler {
    tool: AdsTool,
    customer_id: CustomerId,
    updater: Arc<CampaignUpdater>,
}

impl AdsToolHandler {
    pub fn new(tool: AdsTool, customer_id: CustomerId, updater: Arc<CampaignUpdater>) -> Self {
        Self { tool, customer_id, updater }
    }

    fn check_customer(&self, args: &Args<'_>) -> Result<()> {
        if args.present("customer_id").is_none() {
            return Ok(());
        }
        let requested = CustomerId::new(args.text("customer_id")?);
        if requested != self.customer_id {
            bail!(
                "{}: this run manages customer {}, not {}",
                self.tool.name(),
                self.customer_id,
                requested
            );
        }
        Ok(())
    }

    async fn dispatch(&self, args: &Args<'_>) -> Result<Result<Value, UpdateError>> {
        let customer = &self.customer_id;
        let updater = &self.updater;

        let outcome = match self.tool {
            AdsTool::UpdateCampaignStatus => updater
                .update_campaign_status(
                    customer,
                    &CampaignId(args.text("campaign_id")?),
                    &args.text("status")?,
                )
                .await
                .map(to_value),
            AdsTool::UpdateCampaignBudget => updater
                .update_campaign_budget(
                    customer,
                    &CampaignId(args.text("campaign_id")?),
                    args.integer("new_budget_micros")?,
                )
                .await
                .map(to_value),
            AdsTool::UpdateCampaignGeoTargets => updater
                .update_campaign_geo_targets(
                    customer,
                    &CampaignId(args.text("campaign_id")?),
                    &args.string_list("location_ids")?,
                    args.boolean_or("negative", false)?,
                )
                .await
                .map(to_value),
            AdsTool::UpdateAdGroupGeoTargets => updater
                .update_ad_group_geo_targets(
                    customer,
                    &AdGroupId(args.text("ad_group_id")?),
                    &args.string_list("location_ids")?,
                    args.boolean_or("negative", false)?,
                )
                .await
                .map(to_value),
            AdsTool::UpdateBiddingStrategy => {
                let details = args.details("strategy_details")?;
                updater
                    .update_bidding_strategy(
                        customer,
                        &CampaignId(args.text("campaign_id")?),
                        &args.text("strategy_type")?,
                        details.as_ref(),
                    )
                    .await
                    .map(to_value)
            }
            AdsTool::UpdateSharedBudget => updater
                .update_shared_budget(
                    customer,
                    &args.text("budget_resource_name")?,
                    args.integer("new_amount_micros")?,
                )
                .await
                .map(to_value),
            AdsTool::UpdatePortfolioBiddingStrategy => {
                let details = args.details("strategy_details")?;
                updater
                    .update_portfolio_bidding_strategy(
                        customer,
                        &args.text("bidding_strategy_resource_name")?,
                        &args.text("strategy_type")?,
                        details.as_ref(),
                    )
                    .await
                    .map(to_value)
            }
            AdsTool::GetCampaignDetails => updater
                .get_campaign_details(customer, &CampaignId(args.text("campaign_id")?))
                .await
                .map(to_value),
            AdsTool::GetGeoTargets => updater
                .get_geo_targets(customer, &CampaignId(args.text("campaign_id")?))
                .await
                .map(to_value),
            AdsTool::ListSharedBudgets => updater
                .list_shared_budgets(customer)
                .await
                .map(|budgets| json!({ "shared_budgets": budgets })),
            AdsTool::ListPortfolioBiddingStrategies => updater
                .list_portfolio_bidding_strategies(customer)
                .await
                .map(|strategies| json!({ "bidding_strategies": strategies })),
            AdsTool::GetCampaignsByBiddingStrategy => updater
                .get_campaigns_by_bidding_strategy(
                    customer,
                    &args.text("bidding_strategy_resource_name")?,
                )
                .await
                .map(|campaigns| json!({ "campaigns": campaigns })),
        };

        Ok(outcome)
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[async_trait]
impl Tool for AdsToolHandler {
    fn name(&self) -> &'static str {
        self.tool.name()
    }

    fn description(&self) -> &'static str {
        self.tool.description()
    }

    fn parameters(&self) -> Value {
        self.tool.parameters()
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let args = Args::parse(self.tool.name(), &input)?;
        self.check_customer(&args)?;

        match self.dispatch(&args).await? {
            Ok(output) => Ok(output),
            Err(error) => {
                tracing::warn!(
                    event_name = "agent.tool.failed",
                    customer_id = %self.customer_id,
                    tool = self.tool.name(),
                    error_class = error.error_class(),
                    error = %error,
                    "tool call failed"
                );
                Ok(error_payload(&error))
            }
        }
    }
}

/// Registers every Google Ads tool for `customer_id`.
pub fn google_ads_toolset(customer_id: &CustomerId, updater: Arc<CampaignUpdater>) -> ToolRegistry {
    let mut registry = ToolRegistry::default();
    for tool in AdsTool::ALL {
        registry.register(AdsToolHandler::new(tool, customer_id.clone(), Arc::clone(&updater)));
    }
    registry
}
