//! Bidding-strategy rules: which strategies a channel accepts, and how a
//! strategy request becomes a typed mutation with its field mask.

pub mod builder;
pub mod compatibility;

pub use builder::{apply_strategy, build_strategy, builder_for, try_apply_strategy};
pub use compatibility::{allowed_strategies, allows, is_allowed, prohibited_strategies};
