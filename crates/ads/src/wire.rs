//! Translation between domain mutations and the Google Ads REST (proto3 JSON)
//! representation: camelCase field names, int64 values as strings, and a
//! comma-separated camelCase `updateMask`.

use serde_json::{json, Map, Value};

use adpilot_core::domain::campaign::{ad_group_resource, campaign_resource, CampaignId, CustomerId};
use adpilot_core::domain::mutation::{CampaignBidding, CriterionScope, FieldMask};
use adpilot_core::domain::strategy::StrategyMutation;

use crate::backend::{CampaignSnapshot, MutateOperation, MutateResponse};
use crate::errors::{AdsApiError, BackendError};

/// Service collection and request body for one `:mutate` call.
#[derive(Clone, Debug, PartialEq)]
pub struct MutateRequest {
    pub service: &'static str,
    pub body: Value,
}

pub fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper = false;
    for ch in snake.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            out.push(ch.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

pub fn update_mask(mask: &FieldMask) -> String {
    mask.paths()
        .map(|path| path.split('.').map(camel_case).collect::<Vec<_>>().join("."))
        .collect::<Vec<_>>()
        .join(",")
}

fn int64(value: i64) -> Value {
    Value::String(value.to_string())
}

fn insert_some(object: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        object.insert(key.to_string(), value);
    }
}

/// The active union member as `(camelCaseMember, body)`.
pub fn strategy_json(strategy: &StrategyMutation) -> (String, Value) {
    let mut body = Map::new();
    match strategy {
        StrategyMutation::MaximizeConversions { target_cpa_micros } => {
            insert_some(&mut body, "targetCpaMicros", target_cpa_micros.map(int64));
        }
        StrategyMutation::MaximizeConversionValue { target_roas } => {
            insert_some(&mut body, "targetRoas", target_roas.map(Value::from));
        }
        StrategyMutation::TargetSpend { cpc_bid_ceiling_micros } => {
            insert_some(&mut body, "cpcBidCeilingMicros", cpc_bid_ceiling_micros.map(int64));
        }
        StrategyMutation::ManualCpc { enhanced_cpc_enabled } => {
            insert_some(&mut body, "enhancedCpcEnabled", enhanced_cpc_enabled.map(Value::from));
        }
        StrategyMutation::TargetImpressionShare {
            location,
            location_fraction_micros,
            cpc_bid_ceiling_micros,
        } => {
            body.insert("location".to_string(), Value::from(location.as_str()));
            body.insert("locationFractionMicros".to_string(), int64(*location_fraction_micros));
            insert_some(&mut body, "cpcBidCeilingMicros", cpc_bid_ceiling_micros.map(int64));
        }
        StrategyMutation::ManualCpm | StrategyMutation::ManualCpv => {}
        StrategyMutation::PercentCpc { cpc_bid_ceiling_micros, enhanced_cpc_enabled } => {
            insert_some(&mut body, "cpcBidCeilingMicros", cpc_bid_ceiling_micros.map(int64));
            insert_some(&mut body, "enhancedCpcEnabled", enhanced_cpc_enabled.map(Value::from));
        }
        StrategyMutation::Commission { commission_rate_micros } => {
            insert_some(&mut body, "commissionRateMicros", commission_rate_micros.map(int64));
        }
        StrategyMutation::TargetCpa { target_cpa_micros } => {
            body.insert("targetCpaMicros".to_string(), int64(*target_cpa_micros));
        }
        StrategyMutation::TargetRoas { target_roas } => {
            body.insert("targetRoas".to_string(), Value::from(*target_roas));
        }
    }
    (camel_case(strategy.strategy_type().field_name()), Value::Object(body))
}

pub fn mutate_request(customer_id: &CustomerId, operation: &MutateOperation) -> MutateRequest {
    match operation {
        MutateOperation::UpdateCampaign { update, mask } => {
            let mut campaign = Map::new();
            campaign.insert("resourceName".to_string(), Value::from(update.resource_name.clone()));
            if let Some(status) = update.status {
                campaign.insert("status".to_string(), Value::from(status.as_str()));
            }
            match &update.bidding {
                Some(CampaignBidding::Standard(strategy)) => {
                    let (member, body) = strategy_json(strategy);
                    campaign.insert(member, body);
                }
                Some(CampaignBidding::Portfolio(resource_name)) => {
                    campaign
                        .insert("biddingStrategy".to_string(), Value::from(resource_name.clone()));
                }
                None => {}
            }
            MutateRequest {
                service: "campaigns",
                body: json!({
                    "operations": [{ "update": campaign, "updateMask": update_mask(mask) }]
                }),
            }
        }
        MutateOperation::UpdateCampaignBudget { resource_name, amount_micros } => MutateRequest {
            service: "campaignBudgets",
            body: json!({
                "operations": [{
                    "update": {
                        "resourceName": resource_name,
                        "amountMicros": int64(*amount_micros)
                    },
                    "updateMask": "amountMicros"
                }]
            }),
        },
        MutateOperation::ReplaceLocationCriteria { scope, remove, create } => {
            let (service, parent_key, parent) = match scope {
                CriterionScope::Campaign(campaign_id) => {
                    ("campaignCriteria", "campaign", campaign_resource(customer_id, campaign_id))
                }
                CriterionScope::AdGroup(ad_group_id) => {
                    ("adGroupCriteria", "adGroup", ad_group_resource(customer_id, ad_group_id))
                }
            };
            let removes = remove.iter().map(|resource_name| json!({ "remove": resource_name }));
            let creates = create.iter().map(|criterion| {
                json!({
                    "create": {
                        parent_key: parent,
                        "location": { "geoTargetConstant": criterion.geo_target_constant },
                        "negative": criterion.negative,
                    }
                })
            });
            MutateRequest {
                service,
                body: json!({ "operations": removes.chain(creates).collect::<Vec<_>>() }),
            }
        }
        MutateOperation::UpdateBiddingStrategy { update, mask } => {
            let mut strategy = Map::new();
            strategy.insert("resourceName".to_string(), Value::from(update.resource_name.clone()));
            if let Some(mutation) = &update.strategy {
                let (member, body) = strategy_json(mutation);
                strategy.insert(member, body);
            }
            MutateRequest {
                service: "biddingStrategies",
                body: json!({
                    "operations": [{ "update": strategy, "updateMask": update_mask(mask) }]
                }),
            }
        }
    }
}

pub fn mutate_response(body: &Value) -> Result<MutateResponse, BackendError> {
    let results = body
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| BackendError::Decode("mutate response has no `results`".to_string()))?;

    let resource_names = results
        .iter()
        .filter_map(|result| result.get("resourceName").and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    Ok(MutateResponse { resource_names })
}

fn text(object: &Value, key: &str) -> Option<String> {
    match object.get(key) {
        Some(Value::String(value)) => Some(value.clone()),
        Some(Value::Number(value)) => Some(value.to_string()),
        _ => None,
    }
}

pub fn campaign_snapshot(row: &Value) -> Result<CampaignSnapshot, BackendError> {
    let campaign = row
        .get("campaign")
        .ok_or_else(|| BackendError::Decode("search row has no `campaign`".to_string()))?;
    let resource_name = text(campaign, "resourceName")
        .ok_or_else(|| BackendError::Decode("campaign row has no `resourceName`".to_string()))?;
    let id = text(campaign, "id")
        .or_else(|| resource_name.rsplit('/').next().map(str::to_string))
        .unwrap_or_default();

    Ok(CampaignSnapshot {
        resource_name,
        id: CampaignId(id),
        name: text(campaign, "name"),
        status: text(campaign, "status"),
        advertising_channel_type: text(campaign, "advertisingChannelType"),
        campaign_budget: text(campaign, "campaignBudget"),
        bidding_strategy: text(campaign, "biddingStrategy"),
        bidding_strategy_type: text(campaign, "biddingStrategyType"),
        raw: campaign.clone(),
    })
}

/// Extracts `GoogleAdsFailure` entries from a REST error body.
pub fn api_errors(body: &Value) -> Vec<AdsApiError> {
    let details = body
        .pointer("/error/details")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    details
        .iter()
        .filter_map(|detail| detail.get("errors").and_then(Value::as_array))
        .flatten()
        .map(|error| {
            let (category, code) = error
                .get("errorCode")
                .and_then(Value::as_object)
                .and_then(|codes| codes.iter().next())
                .map(|(category, code)| {
                    (category.clone(), code.as_str().unwrap_or_default().to_string())
                })
                .unwrap_or_else(|| ("unknown".to_string(), "UNKNOWN".to_string()));

            let trigger = error
                .get("trigger")
                .and_then(Value::as_object)
                .and_then(|trigger| trigger.values().next())
                .map(|value| match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                });

            let field_path = error
                .pointer("/location/fieldPathElements")
                .and_then(Value::as_array)
                .map(|elements| {
                    elements
                        .iter()
                        .filter_map(|element| {
                            let name = element.get("fieldName").and_then(Value::as_str)?;
                            Some(match element.get("index").and_then(Value::as_u64) {
                                Some(index) => format!("{name}[{index}]"),
                                None => name.to_string(),
                            })
                        })
                        .collect::<Vec<_>>()
                        .join(".")
                })
                .filter(|path| !path.is_empty());

            AdsApiError {
                category,
                code,
                message: text(error, "message").unwrap_or_default(),
                trigger,
                field_path,
            }
        })
        .collect()
}

/// Digits-only guard for ids interpolated into GAQL.
pub fn numeric_id<'a>(kind: &str, value: &'a str) -> Result<&'a str, BackendError> {
    if !value.is_empty() && value.chars().all(|ch| ch.is_ascii_digit()) {
        Ok(value)
    } else {
        Err(BackendError::InvalidQuery(format!("{kind} id `{value}` must be numeric")))
    }
}
