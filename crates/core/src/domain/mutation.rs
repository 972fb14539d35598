use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::campaign::{AdGroupId, CampaignId, CampaignStatus};
use crate::domain::strategy::StrategyMutation;
use crate::errors::ValidationError;

/// Mask path of the campaign field that links a portfolio strategy.
pub const PORTFOLIO_LINK_PATH: &str = "bidding_strategy";

/// Sorted, deduplicated set of dotted field paths declared by a partial
/// update.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldMask {
    paths: BTreeSet<String>,
}

impl FieldMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: impl Into<String>) {
        self.paths.insert(path.into());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.paths.iter().cloned().collect()
    }
}

impl Extend<String> for FieldMask {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        self.paths.extend(iter);
    }
}

impl<S: Into<String>> FromIterator<S> for FieldMask {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self { paths: iter.into_iter().map(Into::into).collect() }
    }
}

impl fmt::Display for FieldMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.paths.iter().map(String::as_str).collect::<Vec<_>>().join(",");
        f.write_str(&joined)
    }
}

/// Anything carrying a bidding-strategy union: a campaign or a portfolio
/// bidding strategy.
pub trait BiddingTarget {
    /// Replaces whatever member was active.
    fn set_strategy(&mut self, strategy: StrategyMutation);

    fn link_portfolio(&mut self, resource_name: &str) -> Result<(), ValidationError>;

    fn strategy(&self) -> Option<&StrategyMutation>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum CampaignBidding {
    Standard(StrategyMutation),
    Portfolio(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CampaignUpdate {
    pub resource_name: String,
    pub status: Option<CampaignStatus>,
    pub bidding: Option<CampaignBidding>,
}

impl CampaignUpdate {
    pub fn new(resource_name: impl Into<String>) -> Self {
        Self { resource_name: resource_name.into(), status: None, bidding: None }
    }

    pub fn portfolio_link(&self) -> Option<&str> {
        match &self.bidding {
            Some(CampaignBidding::Portfolio(resource_name)) => Some(resource_name),
            _ => None,
        }
    }
}

impl BiddingTarget for CampaignUpdate {
    fn set_strategy(&mut self, strategy: StrategyMutation) {
        self.bidding = Some(CampaignBidding::Standard(strategy));
    }

    fn link_portfolio(&mut self, resource_name: &str) -> Result<(), ValidationError> {
        self.bidding = Some(CampaignBidding::Portfolio(resource_name.trim().to_owned()));
        Ok(())
    }

    fn strategy(&self) -> Option<&StrategyMutation> {
        match &self.bidding {
            Some(CampaignBidding::Standard(strategy)) => Some(strategy),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PortfolioStrategyUpdate {
    pub resource_name: String,
    pub strategy: Option<StrategyMutation>,
}

impl PortfolioStrategyUpdate {
    pub fn new(resource_name: impl Into<String>) -> Self {
        Self { resource_name: resource_name.into(), strategy: None }
    }
}

impl BiddingTarget for PortfolioStrategyUpdate {
    fn set_strategy(&mut self, strategy: StrategyMutation) {
        self.strategy = Some(strategy);
    }

    fn link_portfolio(&mut self, resource_name: &str) -> Result<(), ValidationError> {
        Err(ValidationError::PortfolioLinkNotSupported(resource_name.to_owned()))
    }

    fn strategy(&self) -> Option<&StrategyMutation> {
        self.strategy.as_ref()
    }
}

/// Owner of a set of location criteria.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "level", content = "id", rename_all = "snake_case")]
pub enum CriterionScope {
    Campaign(CampaignId),
    AdGroup(AdGroupId),
}

impl CriterionScope {
    pub fn id(&self) -> &str {
        match self {
            Self::Campaign(id) => &id.0,
            Self::AdGroup(id) => &id.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Campaign(_) => "campaign",
            Self::AdGroup(_) => "ad group",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationCriterion {
    pub geo_target_constant: String,
    pub negative: bool,
}
