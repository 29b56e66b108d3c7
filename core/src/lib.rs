//! morph-core
//!
//! The MCMC branching sampler, soft-EM model fitting, and rule-selection
//! core of an unsupervised morphological analyzer: it scores and selects
//! among a pre-materialized graph of candidate (source, target, rule)
//! derivations, it does not align strings or build transducers.
//!
//! Public API:
//! - [`Lexicon`]/[`Word`] - word-list entries with stable integer IDs (C1)
//! - [`RuleSet`]/[`Rule`] - morphological rules with stable integer IDs (C1)
//! - [`EdgeSet`]/[`GraphEdge`] - the candidate-edge graph (C1)
//! - [`Branching`] - the mutable directed forest the sampler explores (C2)
//! - [`CostCache`] - dense root/edge cost arrays (C3)
//! - [`model`] - the pluggable root-cost collaborator plus the Bernoulli
//!   rule-application and Gaussian edge-frequency models (C4)
//! - [`sampler`] - the Metropolis-Hastings engine (C5)
//! - [`stats`] - running estimators driven by the sampler (C6)
//! - [`modsel`] - the outer soft-EM driver and rule selector (C7, C8)
//! - [`Config`] - process configuration, loaded from TOML

pub mod error;
pub use error::{MorphError, Result};

pub mod config;
pub use config::Config;

pub mod lexicon;
pub use lexicon::{Lexicon, Word};

pub mod rules;
pub use rules::{Rule, RuleSet};

pub mod graph;
pub use graph::{EdgeSet, GraphEdge};

pub mod branching;
pub use branching::Branching;

pub mod cost;
pub use cost::CostCache;

pub mod model;
pub use model::ModelSuite;

pub mod sampler;
pub use sampler::{MCMCSampler, MoveProposal, SamplerMode};

pub mod stats;
pub use stats::Statistics;

pub mod modsel;
pub use modsel::{run_outer_iteration, ModselOptions, ModselState};
