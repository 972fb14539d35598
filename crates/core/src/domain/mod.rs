pub mod campaign;
pub mod channel;
pub mod mutation;
pub mod run;
pub mod strategy;
