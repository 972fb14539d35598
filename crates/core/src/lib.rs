pub mod actions;
pub mod bidding;
pub mod config;
pub mod domain;
pub mod errors;

pub use actions::{Action, ActionJournal, RunActionLog};
pub use domain::campaign::{AdGroupId, CampaignId, CampaignStatus, CustomerId};
pub use domain::channel::ChannelType;
pub use domain::mutation::{
    BiddingTarget, CampaignBidding, CampaignUpdate, CriterionScope, FieldMask, LocationCriterion,
    PortfolioStrategyUpdate,
};
pub use domain::run::{NewRun, RunCompletion, RunId, RunRecord, RunStatus, Usecase};
pub use domain::strategy::{
    ImpressionShareLocation, StrategyDetails, StrategyMutation, StrategyType,
};
pub use errors::{ApplicationError, ValidationError};
