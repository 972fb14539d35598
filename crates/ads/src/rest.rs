//! `AdsBackend` over the Google Ads REST interface.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use adpilot_core::config::GoogleAdsConfig;
use adpilot_core::domain::campaign::{CampaignId, CustomerId};
use adpilot_core::domain::mutation::CriterionScope;

use crate::backend::{AdsBackend, CampaignSnapshot, GeoTargets, MutateOperation, MutateResponse};
use crate::errors::BackendError;
use crate::wire;

const CAMPAIGN_FIELDS: &str = "campaign.resource_name, campaign.id, campaign.name, \
     campaign.status, campaign.serving_status, campaign.advertising_channel_type, \
     campaign.campaign_budget, campaign.bidding_strategy, campaign.bidding_strategy_type, \
     campaign.bidding_strategy_system_status, campaign.start_date, campaign.end_date, \
     campaign.optimization_score, campaign.maximize_conversions.target_cpa_micros, \
     campaign.maximize_conversion_value.target_roas, campaign.target_spend.cpc_bid_ceiling_micros, \
     campaign.target_impression_share.location, \
     campaign.target_impression_share.location_fraction_micros, \
     campaign.target_impression_share.cpc_bid_ceiling_micros, \
     campaign_budget.amount_micros, campaign_budget.delivery_method";

#[derive(Clone)]
pub struct GoogleAdsRestClient {
    client: Client,
    endpoint: String,
    developer_token: SecretString,
    access_token: SecretString,
    login_customer_id: Option<String>,
}

impl GoogleAdsRestClient {
    pub fn new(config: &GoogleAdsConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| BackendError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            developer_token: config.developer_token.clone(),
            access_token: config.access_token.clone(),
            login_customer_id: config.login_customer_id.as_ref().map(|id| id.replace('-', "")),
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder
            .bearer_auth(self.access_token.expose_secret())
            .header("developer-token", self.developer_token.expose_secret());
        match &self.login_customer_id {
            Some(login_customer_id) => builder.header("login-customer-id", login_customer_id),
            None => builder,
        }
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, BackendError> {
        let response = self.authorized(self.client.post(url)).json(body).send().await?;
        decode(response).await
    }

    /// Runs a GAQL query, following `nextPageToken` until exhausted.
    async fn search(
        &self,
        customer_id: &CustomerId,
        query: &str,
    ) -> Result<Vec<Value>, BackendError> {
        wire::numeric_id("customer", customer_id.as_str())?;
        let url = format!("{}/customers/{}/googleAds:search", self.endpoint, customer_id);

        let mut rows = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut body = json!({ "query": query });
            if let Some(token) = &page_token {
                body["pageToken"] = Value::String(token.clone());
            }

            let page = self.post(&url, &body).await?;
            if let Some(results) = page.get("results").and_then(Value::as_array) {
                rows.extend(results.iter().cloned());
            }

            page_token = page
                .get("nextPageToken")
                .and_then(Value::as_str)
                .filter(|token| !token.is_empty())
                .map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }

        tracing::debug!(
            event_name = "ads.search.completed",
            customer_id = %customer_id,
            rows = rows.len(),
            "google ads search completed"
        );
        Ok(rows)
    }
}

async fn decode(response: Response) -> Result<Value, BackendError> {
    let status = response.status();
    let text = response.text().await?;
    let body: Value = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).map_err(|error| BackendError::Decode(error.to_string()))?
    };

    if status.is_success() {
        return Ok(body);
    }

    let errors = wire::api_errors(&body);
    if !errors.is_empty() {
        return Err(BackendError::Rejected { errors });
    }

    let message = body
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or(text);
    Err(BackendError::Http { status: status.as_u16(), message })
}

fn resource_name_literal(value: &str) -> Result<&str, BackendError> {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '/' | '~' | '_' | '-'));
    if safe {
        Ok(value)
    } else {
        Err(BackendError::InvalidQuery(format!("resource name `{value}` is malformed")))
    }
}

fn members(rows: Vec<Value>, key: &str) -> Vec<Value> {
    rows.into_iter().filter_map(|mut row| row.get_mut(key).map(Value::take)).collect()
}

#[async_trait]
impl AdsBackend for GoogleAdsRestClient {
    async fn get_campaign(
        &self,
        customer_id: &CustomerId,
        campaign_id: &CampaignId,
    ) -> Result<Option<CampaignSnapshot>, BackendError> {
        let id = wire::numeric_id("campaign", &campaign_id.0)?;
        let query = format!("SELECT {CAMPAIGN_FIELDS} FROM campaign WHERE campaign.id = {id}");

        let rows = self.search(customer_id, &query).await?;
        rows.first().map(wire::campaign_snapshot).transpose()
    }

    async fn list_location_criteria(
        &self,
        customer_id: &CustomerId,
        scope: &CriterionScope,
    ) -> Result<Vec<String>, BackendError> {
        let (query, key) = match scope {
            CriterionScope::Campaign(campaign_id) => (
                format!(
                    "SELECT campaign_criterion.resource_name FROM campaign_criterion \
                     WHERE campaign.id = {} AND campaign_criterion.type = 'LOCATION'",
                    wire::numeric_id("campaign", &campaign_id.0)?
                ),
                "campaignCriterion",
            ),
            CriterionScope::AdGroup(ad_group_id) => (
                format!(
                    "SELECT ad_group_criterion.resource_name FROM ad_group_criterion \
                     WHERE ad_group.id = {} AND ad_group_criterion.type = 'LOCATION'",
                    wire::numeric_id("ad group", &ad_group_id.0)?
                ),
                "adGroupCriterion",
            ),
        };

        let rows = self.search(customer_id, &query).await?;
        Ok(members(rows, key)
            .iter()
            .filter_map(|criterion| criterion.get("resourceName").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    async fn get_geo_targets(
        &self,
        customer_id: &CustomerId,
        campaign_id: &CampaignId,
    ) -> Result<GeoTargets, BackendError> {
        let id = wire::numeric_id("campaign", &campaign_id.0)?;

        let campaign_rows = self
            .search(
                customer_id,
                &format!(
                    "SELECT campaign_criterion.resource_name, campaign_criterion.negative, \
                     campaign_criterion.location.geo_target_constant FROM campaign_criterion \
                     WHERE campaign.id = {id} AND campaign_criterion.type = 'LOCATION'"
                ),
            )
            .await?;

        let ad_group_rows = self
            .search(
                customer_id,
                &format!(
                    "SELECT ad_group.id, ad_group_criterion.resource_name, \
                     ad_group_criterion.negative, ad_group_criterion.location.geo_target_constant \
                     FROM ad_group_criterion \
                     WHERE campaign.id = {id} AND ad_group_criterion.type = 'LOCATION'"
                ),
            )
            .await?;

        let mut ad_group_targets: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for mut row in ad_group_rows {
            let ad_group_id = match row.pointer("/adGroup/id") {
                Some(Value::String(id)) => id.clone(),
                Some(other) => other.to_string(),
                None => continue,
            };
            if let Some(criterion) = row.get_mut("adGroupCriterion").map(Value::take) {
                ad_group_targets.entry(ad_group_id).or_default().push(criterion);
            }
        }

        Ok(GeoTargets {
            campaign_targets: members(campaign_rows, "campaignCriterion"),
            ad_group_targets,
        })
    }

    async fn list_shared_budgets(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Value>, BackendError> {
        let rows = self
            .search(
                customer_id,
                "SELECT campaign_budget.id, campaign_budget.name, campaign_budget.resource_name, \
                 campaign_budget.amount_micros, campaign_budget.status, \
                 campaign_budget.delivery_method, campaign_budget.type FROM campaign_budget \
                 WHERE campaign_budget.explicitly_shared = TRUE \
                 AND campaign_budget.status = 'ENABLED'",
            )
            .await?;
        Ok(members(rows, "campaignBudget"))
    }

    async fn list_portfolio_strategies(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<Value>, BackendError> {
        let rows = self
            .search(
                customer_id,
                "SELECT bidding_strategy.id, bidding_strategy.name, \
                 bidding_strategy.resource_name, bidding_strategy.type FROM bidding_strategy \
                 WHERE bidding_strategy.status = 'ENABLED'",
            )
            .await?;
        Ok(members(rows, "biddingStrategy"))
    }

    async fn list_campaigns_by_bidding_strategy(
        &self,
        customer_id: &CustomerId,
        bidding_strategy_resource_name: &str,
    ) -> Result<Vec<Value>, BackendError> {
        let resource_name = resource_name_literal(bidding_strategy_resource_name)?;
        let rows = self
            .search(
                customer_id,
                &format!(
                    "SELECT campaign.id, campaign.name, campaign.resource_name, campaign.status \
                     FROM campaign WHERE campaign.bidding_strategy = '{resource_name}'"
                ),
            )
            .await?;
        Ok(members(rows, "campaign"))
    }

    async fn mutate(
        &self,
        customer_id: &CustomerId,
        operation: &MutateOperation,
    ) -> Result<MutateResponse, BackendError> {
        wire::numeric_id("customer", customer_id.as_str())?;
        let request = wire::mutate_request(customer_id, operation);
        let url = format!("{}/customers/{}/{}:mutate", self.endpoint, customer_id, request.service);

        let body = self.post(&url, &request.body).await?;
        let response = wire::mutate_response(&body)?;

        tracing::info!(
            event_name = "ads.mutate.completed",
            customer_id = %customer_id,
            service = request.service,
            results = response.resource_names.len(),
            "google ads mutate completed"
        );
        Ok(response)
    }
}
