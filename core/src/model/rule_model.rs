//! Bernoulli rule-application model: for each rule, the posterior-mean
//! probability that a word matching its domain actually applies it.

use crate::graph::EdgeSet;
use crate::rules::RuleSet;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

const PROB_EPS: f64 = 1e-9;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BernoulliRuleModel {
    alpha: f64,
    beta: f64,
    rule_domsize: Vec<f64>,
    rule_prob: Vec<f64>,
    appl_cost: Vec<f64>,
    rule_cost: Vec<f64>,
    null_cost: f64,
}

impl BernoulliRuleModel {
    pub fn new(rule_set: &RuleSet, alpha: f64, beta: f64) -> Self {
        let n = rule_set.len();
        let rule_domsize: Vec<f64> = (0..n).map(|id| rule_set.domsize(id)).collect();
        // Start every rule at its prior mean so the model is usable before
        // the first fit.
        let prior_mean = ((alpha - 1.0) / (alpha + beta - 2.0)).clamp(PROB_EPS, 1.0 - PROB_EPS);
        let mut model = BernoulliRuleModel {
            alpha,
            beta,
            rule_domsize,
            rule_prob: vec![prior_mean; n],
            appl_cost: vec![0.0; n],
            rule_cost: vec![0.0; n],
            null_cost: 0.0,
        };
        model.set_probs(model.rule_prob.clone());
        model
    }

    pub fn edge_cost(&self, rule_id: usize) -> f64 {
        self.appl_cost[rule_id]
    }

    pub fn rule_cost(&self, rule_id: usize) -> f64 {
        self.rule_cost[rule_id]
    }

    pub fn null_cost(&self) -> f64 {
        self.null_cost
    }

    pub fn prob(&self, rule_id: usize) -> f64 {
        self.rule_prob[rule_id]
    }

    pub fn rule_costs(&self) -> &[f64] {
        &self.rule_cost
    }

    /// Shrink every per-rule array down to `new_rule_set`'s ID space after
    /// C8 deletes rules, carrying surviving rules' fitted probabilities
    /// across via `remap` (old ID -> new ID) instead of resetting to the
    /// prior mean.
    pub fn remap(&mut self, new_rule_set: &RuleSet, remap: &std::collections::HashMap<usize, usize>) {
        let n = new_rule_set.len();
        let prior_mean = ((self.alpha - 1.0) / (self.alpha + self.beta - 2.0)).clamp(PROB_EPS, 1.0 - PROB_EPS);
        let mut rule_domsize = vec![0.0; n];
        let mut probs = vec![prior_mean; n];
        for (&old_id, &new_id) in remap {
            rule_domsize[new_id] = new_rule_set.domsize(new_id);
            probs[new_id] = self.rule_prob[old_id];
        }
        self.rule_domsize = rule_domsize;
        self.set_probs(probs);
    }

    fn set_probs(&mut self, probs: Vec<f64>) {
        self.rule_prob = probs
            .into_iter()
            .map(|p| p.clamp(PROB_EPS, 1.0 - PROB_EPS))
            .collect();
        self.appl_cost = self
            .rule_prob
            .iter()
            .map(|&p| -p.ln() + (1.0 - p).ln())
            .collect();
        self.rule_cost = self
            .rule_prob
            .iter()
            .zip(&self.rule_domsize)
            .map(|(&p, &d)| -(1.0 - p).ln() * d)
            .collect();
        self.null_cost = self.rule_cost.iter().sum();
    }

    /// Refit `rule_prob` from weighted edge presence: `weights[i]` is the
    /// marginal presence probability of `edge_set`'s `i`-th edge.
    pub fn fit(&mut self, edge_set: &EdgeSet, weights: &[f64]) {
        let mut rule_freq = vec![0.0; self.rule_domsize.len()];
        for (i, (_, edge)) in edge_set.iter().enumerate() {
            rule_freq[edge.rule] += weights[i];
        }
        let probs: Vec<f64> = rule_freq
            .iter()
            .zip(&self.rule_domsize)
            .map(|(&freq, &domsize)| {
                (freq + self.alpha - 1.0) / (domsize + self.alpha + self.beta - 2.0)
            })
            .collect();
        self.set_probs(probs);
    }

    pub fn load_tsv<R: BufRead>(reader: R, rule_set: &RuleSet, alpha: f64, beta: f64) -> crate::error::Result<Self> {
        let mut model = BernoulliRuleModel::new(rule_set, alpha, beta);
        let mut probs = model.rule_prob.clone();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut cols = line.split('\t');
            let rule_str = cols.next().ok_or_else(|| {
                crate::error::MorphError::config_at("missing rule column", lineno)
            })?;
            let prob: f64 = cols
                .next()
                .ok_or_else(|| crate::error::MorphError::config_at("missing prob column", lineno))?
                .parse()
                .map_err(|_| crate::error::MorphError::config_at("malformed probability", lineno))?;
            let rule = crate::rules::Rule::parse(rule_str)?;
            let id = rule_set.get_id(&rule).ok_or_else(|| {
                crate::error::MorphError::config_at(format!("unknown rule: {rule_str}"), lineno)
            })?;
            probs[id] = prob;
        }
        model.set_probs(probs);
        Ok(model)
    }

    pub fn save_tsv<W: Write>(&self, mut writer: W, rule_set: &RuleSet) -> crate::error::Result<()> {
        for (id, rule) in rule_set.iter() {
            writeln!(writer, "{}\t{}", rule, self.rule_prob[id])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphEdge;
    use crate::rules::Rule;

    fn rule_set() -> RuleSet {
        let mut rs = RuleSet::new();
        rs.add(Rule::parse(":/:s").unwrap(), 10.0);
        rs
    }

    #[test]
    fn fit_with_full_frequency_stays_below_one() {
        let rs = rule_set();
        let mut model = BernoulliRuleModel::new(&rs, 1.1, 1.1);
        let mut edges = EdgeSet::new();
        for _ in 0..10 {
            edges.add(GraphEdge {
                source: 0,
                target: 0,
                rule: 0,
            });
        }
        let weights = vec![1.0; 10];
        model.fit(&edges, &weights);
        assert!(model.prob(0) < 1.0);
    }

    #[test]
    fn unseen_rule_keeps_reasonable_prior_probability() {
        let rs = rule_set();
        let model = BernoulliRuleModel::new(&rs, 1.1, 1.1);
        assert!(model.prob(0) > 0.0 && model.prob(0) < 1.0);
    }

    #[test]
    fn save_and_load_tsv_round_trip() {
        let rs = rule_set();
        let mut model = BernoulliRuleModel::new(&rs, 1.1, 1.1);
        let mut edges = EdgeSet::new();
        edges.add(GraphEdge { source: 0, target: 0, rule: 0 });
        model.fit(&edges, &[0.7]);
        let mut buf = Vec::new();
        model.save_tsv(&mut buf, &rs).unwrap();
        let reloaded = BernoulliRuleModel::load_tsv(std::io::Cursor::new(buf), &rs, 1.1, 1.1).unwrap();
        assert!((reloaded.prob(0) - model.prob(0)).abs() < 1e-9);
    }
}
