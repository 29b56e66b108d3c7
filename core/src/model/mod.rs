//! The cost model suite (C4): a pluggable root-cost collaborator plus the
//! two models this crate fits directly — Bernoulli rule application and
//! Gaussian edge-frequency.

pub mod freq_model;
pub mod root;
pub mod rule_model;
pub mod suite;

pub use freq_model::GaussianFreqModel;
pub use root::{RootCostModel, ZipfRootCostModel};
pub use rule_model::BernoulliRuleModel;
pub use suite::ModelSuite;
