use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl CustomerId {
    /// Accepts the dashed form shown in the Ads UI (`123-456-7890`).
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().replace('-', ""))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CampaignId(pub String);

impl fmt::Display for CampaignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdGroupId(pub String);

impl fmt::Display for AdGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Enabled,
    Paused,
}

impl CampaignStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "ENABLED",
            Self::Paused => "PAUSED",
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ENABLED" => Ok(Self::Enabled),
            "PAUSED" => Ok(Self::Paused),
            _ => Err(ValidationError::InvalidStatus(value.to_owned())),
        }
    }
}

/// Customer-owned resources that tools may reference by full resource name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    CampaignBudget,
    BiddingStrategy,
}

impl ResourceKind {
    fn collection(self) -> &'static str {
        match self {
            Self::CampaignBudget => "campaignBudgets",
            Self::BiddingStrategy => "biddingStrategies",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::CampaignBudget => "campaign budget",
            Self::BiddingStrategy => "bidding strategy",
        }
    }
}

pub fn campaign_resource(customer_id: &CustomerId, campaign_id: &CampaignId) -> String {
    format!("customers/{}/campaigns/{}", customer_id.0, campaign_id.0)
}

pub fn ad_group_resource(customer_id: &CustomerId, ad_group_id: &AdGroupId) -> String {
    format!("customers/{}/adGroups/{}", customer_id.0, ad_group_id.0)
}

pub fn geo_target_constant(location_id: &str) -> String {
    format!("geoTargetConstants/{location_id}")
}

/// True for strings shaped like `customers/{id}/biddingStrategies/{id}`.
pub fn is_portfolio_reference(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("customers/") && value.contains("/biddingStrategies/")
}

/// Rejects resource names that belong to a different customer, or that name
/// a different kind of resource.
pub fn ensure_owned(
    resource_name: &str,
    customer_id: &CustomerId,
    kind: ResourceKind,
) -> Result<(), ValidationError> {
    let prefix = format!("customers/{}/{}/", customer_id.0, kind.collection());
    let owned = resource_name
        .strip_prefix(&prefix)
        .map(|rest| !rest.is_empty() && !rest.contains('/'))
        .unwrap_or(false);

    if owned {
        Ok(())
    } else {
        Err(ValidationError::ForeignResource {
            resource: resource_name.to_owned(),
            kind: kind.label(),
            customer_id: customer_id.0.clone(),
        })
    }
}

/// Location ids are geo target constant ids (`2840` is the United States).
pub fn parse_location_id(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(ValidationError::InvalidLocationId(raw.to_owned()));
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::{
        campaign_resource, ensure_owned, is_portfolio_reference, parse_location_id, CampaignId,
        CampaignStatus, CustomerId, ResourceKind,
    };
    use crate::errors::ValidationError;

    #[test]
    fn customer_id_strips_dashes() {
        let customer = CustomerId::new("123-456-7890");
        assert_eq!(customer.as_str(), "1234567890");
        assert_eq!(
            campaign_resource(&customer, &CampaignId("42".to_owned())),
            "customers/1234567890/campaigns/42"
        );
    }

    #[test]
    fn status_accepts_only_enabled_and_paused() {
        assert_eq!("paused".parse(), Ok(CampaignStatus::Paused));
        assert_eq!("ENABLED".parse(), Ok(CampaignStatus::Enabled));
        assert_eq!(
            "REMOVED".parse::<CampaignStatus>(),
            Err(ValidationError::InvalidStatus("REMOVED".to_owned()))
        );
    }

    #[test]
    fn ownership_check_rejects_other_customers_and_kinds() {
        let customer = CustomerId::new("111");

        let budget = ResourceKind::CampaignBudget;
        assert!(ensure_owned("customers/111/campaignBudgets/9", &customer, budget).is_ok());
        assert!(ensure_owned("customers/222/campaignBudgets/9", &customer, budget).is_err());
        assert!(ensure_owned(
            "customers/111/biddingStrategies/9",
            &customer,
            ResourceKind::CampaignBudget
        )
        .is_err());
        assert!(ensure_owned("customers/111/campaignBudgets/", &customer, budget).is_err());
        assert!(ensure_owned(
            "customers/1111/biddingStrategies/9",
            &customer,
            ResourceKind::BiddingStrategy
        )
        .is_err());
    }

    #[test]
    fn location_ids_must_be_numeric() {
        assert_eq!(parse_location_id(" 2840 "), Ok("2840".to_owned()));
        assert!(matches!(
            parse_location_id("USA"),
            Err(ValidationError::InvalidLocationId(ref raw)) if raw == "USA"
        ));
        assert!(parse_location_id("").is_err());
    }

    #[test]
    fn portfolio_reference_shape() {
        assert!(is_portfolio_reference("customers/1/biddingStrategies/2"));
        assert!(!is_portfolio_reference("TARGET_SPEND"));
        assert!(!is_portfolio_reference("customers/1/campaignBudgets/2"));
    }
}
