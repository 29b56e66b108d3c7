//! `ModelSuite`: the composed cost model (root + Bernoulli rule-application
//! + Gaussian edge-frequency) the sampler consults for every cost query.

use crate::cost::CostCache;
use crate::error::Result;
use crate::graph::EdgeSet;
use crate::lexicon::Lexicon;
use crate::model::freq_model::GaussianFreqModel;
use crate::model::root::RootCostModel;
use crate::model::rule_model::BernoulliRuleModel;
use crate::rules::RuleSet;

pub struct ModelSuite<R: RootCostModel> {
    pub root_model: R,
    pub rule_model: BernoulliRuleModel,
    pub freq_model: GaussianFreqModel,
}

impl<R: RootCostModel> ModelSuite<R> {
    pub fn new(root_model: R, rule_set: &RuleSet, alpha: f64, beta: f64, variance_floor: f64) -> Self {
        ModelSuite {
            root_model,
            rule_model: BernoulliRuleModel::new(rule_set, alpha, beta),
            freq_model: GaussianFreqModel::new(rule_set.len(), variance_floor),
        }
    }

    /// Build a suite from already-fitted rule-application and
    /// edge-frequency models, e.g. ones loaded from a prior `morph-modsel`
    /// checkpoint (C10's frozen-model use case).
    pub fn from_parts(root_model: R, rule_model: BernoulliRuleModel, freq_model: GaussianFreqModel) -> Self {
        ModelSuite { root_model, rule_model, freq_model }
    }

    /// Cost of a graph without any edges: sum of root costs plus the sum
    /// of every rule's `rule_cost`.
    pub fn null_cost(&self, lexicon: &Lexicon) -> f64 {
        self.root_model.root_costs(lexicon).iter().sum::<f64>() + self.rule_model.null_cost()
    }

    /// Build the dense cost cache the sampler reads from during a run.
    pub fn build_cache(&self, lexicon: &Lexicon, edge_set: &EdgeSet) -> Result<CostCache> {
        let root_cost = self.root_model.root_costs(lexicon);
        let mut edge_cost = vec![0.0; edge_set.len()];
        for (id, edge) in edge_set.iter() {
            let delta = lexicon.get(edge.target).logfreq() - lexicon.get(edge.source).logfreq();
            edge_cost[id] =
                self.rule_model.edge_cost(edge.rule) + self.freq_model.edge_cost(edge.rule, delta);
        }
        CostCache::new(root_cost, edge_cost)
    }

    /// Refit the rule-application and edge-frequency models from sampled
    /// edge marginals.
    pub fn fit(&mut self, lexicon: &Lexicon, edge_set: &EdgeSet, edge_weights: &[f64]) {
        self.rule_model.fit(edge_set, edge_weights);
        self.freq_model.fit(lexicon, edge_set, edge_weights);
    }

    /// Shrink the rule-indexed model arrays down to `new_rule_set` after
    /// C8 deletes rules, carrying surviving rules' fitted parameters
    /// across via `remap` (old rule ID -> new rule ID).
    pub fn rebuild_for_rules(&mut self, new_rule_set: &RuleSet, remap: &std::collections::HashMap<usize, usize>) {
        self.rule_model.remap(new_rule_set, remap);
        self.freq_model.remap(new_rule_set.len(), remap);
    }
}
