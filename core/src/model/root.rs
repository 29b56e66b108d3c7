//! The root-cost collaborator boundary.
//!
//! A full deployment trains this model externally (a PFA over word forms)
//! and plugs it in behind this trait; this crate only ships the simplest
//! frequency-only variant so the sampler is runnable standalone.

use crate::lexicon::Lexicon;

/// A read-only, pluggable per-word cost model. Implementations never see
/// the candidate graph or the branching — only the lexicon.
pub trait RootCostModel {
    /// Cost of `lexicon.get(id)` being a root of the branching, for every
    /// word ID in `0..lexicon.len()`.
    fn root_costs(&self, lexicon: &Lexicon) -> Vec<f64>;
}

/// `cost(w) = ln(freq(w)) + ln(freq(w) + 1)`, the simplest root-cost
/// variant used by the original system's Zipfian estimator. The `+1` term
/// keeps the cost finite when `freq` is small.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipfRootCostModel;

impl RootCostModel for ZipfRootCostModel {
    fn root_costs(&self, lexicon: &Lexicon) -> Vec<f64> {
        lexicon
            .iter()
            .map(|(_, w)| w.freq.ln() + (w.freq + 1.0).ln())
            .collect()
    }
}
