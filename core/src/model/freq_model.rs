//! Per-rule Gaussian model of the log-frequency difference between an
//! edge's target and source.

use crate::graph::EdgeSet;
use crate::lexicon::Lexicon;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

const TWO_PI: f64 = std::f64::consts::TAU;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianFreqModel {
    variance_floor: f64,
    mean: Vec<f64>,
    var: Vec<f64>,
}

impl GaussianFreqModel {
    pub fn new(num_rules: usize, variance_floor: f64) -> Self {
        GaussianFreqModel {
            variance_floor,
            mean: vec![0.0; num_rules],
            var: vec![1.0; num_rules],
        }
    }

    /// `-log N(delta; mean, var)` for the given rule.
    pub fn edge_cost(&self, rule_id: usize, delta_logfreq: f64) -> f64 {
        let mean = self.mean[rule_id];
        let var = self.var[rule_id];
        let err = delta_logfreq - mean;
        0.5 * (err * err) / var + 0.5 * (TWO_PI * var).ln()
    }

    /// Refit every rule's (mean, variance) from weighted edges. Rules with
    /// fewer than two edges of positive weight keep their previous
    /// parameters, matching the original system's `fit_rule` short-circuit.
    pub fn fit(&mut self, lexicon: &Lexicon, edge_set: &EdgeSet, weights: &[f64]) {
        let num_rules = self.mean.len();
        let mut deltas_by_rule: Vec<Vec<(f64, f64)>> = vec![Vec::new(); num_rules];
        for (i, (_, edge)) in edge_set.iter().enumerate() {
            let w = weights[i];
            if w <= 0.0 {
                continue;
            }
            let delta = lexicon.get(edge.target).logfreq() - lexicon.get(edge.source).logfreq();
            deltas_by_rule[edge.rule].push((delta, w));
        }
        for (rule_id, samples) in deltas_by_rule.into_iter().enumerate() {
            if samples.len() <= 1 {
                continue;
            }
            let total_w: f64 = samples.iter().map(|(_, w)| w).sum();
            if total_w <= 0.0 {
                continue;
            }
            let mean = samples.iter().map(|(d, w)| d * w).sum::<f64>() / total_w;
            let var = samples.iter().map(|(d, w)| w * (d - mean) * (d - mean)).sum::<f64>()
                / total_w
                + self.variance_floor;
            self.mean[rule_id] = mean;
            self.var[rule_id] = var;
        }
    }

    /// Shrink `mean`/`var` down to the surviving rule IDs after C8 deletes
    /// rules, carrying fitted parameters across via `remap` (old ID -> new
    /// ID); a rule with no prior entry (impossible here, since `remap` only
    /// contains survivors) would fall back to the uninformative prior.
    pub fn remap(&mut self, new_len: usize, remap: &std::collections::HashMap<usize, usize>) {
        let mut mean = vec![0.0; new_len];
        let mut var = vec![1.0; new_len];
        for (&old_id, &new_id) in remap {
            mean[new_id] = self.mean[old_id];
            var[new_id] = self.var[old_id];
        }
        self.mean = mean;
        self.var = var;
    }

    pub fn save_bincode<W: Write>(&self, writer: W) -> crate::error::Result<()> {
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    pub fn load_bincode<R: Read>(reader: R) -> crate::error::Result<Self> {
        Ok(bincode::deserialize_from(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphEdge;
    use crate::lexicon::Word;

    fn sample_lexicon() -> Lexicon {
        let mut lex = Lexicon::new();
        lex.add(Word::new(vec!["a".into()], vec![], 10.0));
        lex.add(Word::new(vec!["b".into()], vec![], 20.0));
        lex.add(Word::new(vec!["c".into()], vec![], 40.0));
        lex
    }

    #[test]
    fn fit_with_too_few_samples_keeps_previous_params() {
        let lex = sample_lexicon();
        let mut edges = EdgeSet::new();
        edges.add(GraphEdge { source: 0, target: 1, rule: 0 });
        let mut model = GaussianFreqModel::new(1, 0.001);
        model.mean[0] = 42.0;
        model.fit(&lex, &edges, &[1.0]);
        assert_eq!(model.mean[0], 42.0);
    }

    #[test]
    fn fit_with_enough_samples_updates_mean_and_applies_variance_floor() {
        let lex = sample_lexicon();
        let mut edges = EdgeSet::new();
        edges.add(GraphEdge { source: 0, target: 1, rule: 0 });
        edges.add(GraphEdge { source: 1, target: 2, rule: 0 });
        let mut model = GaussianFreqModel::new(1, 0.001);
        model.fit(&lex, &edges, &[1.0, 1.0]);
        assert!(model.var[0] >= 0.001);
        assert!(model.mean[0].is_finite());
    }

    #[test]
    fn bincode_round_trip() {
        let mut model = GaussianFreqModel::new(2, 0.001);
        model.mean[1] = 1.23;
        let mut buf = Vec::new();
        model.save_bincode(&mut buf).unwrap();
        let reloaded = GaussianFreqModel::load_bincode(std::io::Cursor::new(buf)).unwrap();
        assert_eq!(reloaded.mean[1], 1.23);
    }
}
