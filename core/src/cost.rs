//! Dense cost caches and the exact incremental cost-of-change formula the
//! sampler evaluates on every proposed move.

use crate::error::{MorphError, Result};
use crate::graph::{EdgeSet, GraphEdge};

/// Root costs (per word) and edge costs (per candidate edge), recomputed in
/// full whenever the model is refitted. Never mutated during sampling.
#[derive(Debug, Clone)]
pub struct CostCache {
    pub root_cost: Vec<f64>,
    pub edge_cost: Vec<f64>,
}

impl CostCache {
    pub fn new(root_cost: Vec<f64>, edge_cost: Vec<f64>) -> Result<Self> {
        if root_cost.iter().any(|c| c.is_nan()) || edge_cost.iter().any(|c| c.is_nan()) {
            return Err(MorphError::InvariantViolation(
                "NaN in cost cache on construction".into(),
            ));
        }
        Ok(CostCache {
            root_cost,
            edge_cost,
        })
    }

    /// Exact log-posterior delta of adding `add` and removing `remove`
    /// (edge IDs from the companion `EdgeSet`).
    ///
    /// Adding an edge turns its target from a root into a leaf of its
    /// source (pay the edge cost, refund the root cost); removing does the
    /// reverse.
    pub fn cost_of_change(&self, edge_set: &EdgeSet, add: &[usize], remove: &[usize]) -> Result<f64> {
        let mut delta = 0.0;
        for &eid in add {
            let edge: GraphEdge = *edge_set.get(eid);
            delta += self.edge_cost[eid] - self.root_cost[edge.target];
        }
        for &eid in remove {
            let edge: GraphEdge = *edge_set.get(eid);
            delta -= self.edge_cost[eid] - self.root_cost[edge.target];
        }
        if delta.is_nan() {
            return Err(MorphError::InvariantViolation(
                "NaN produced while computing cost of change".into(),
            ));
        }
        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphEdge;

    #[test]
    fn add_then_remove_is_zero_sum() {
        let mut edges = EdgeSet::new();
        edges.add(GraphEdge {
            source: 0,
            target: 1,
            rule: 0,
        });
        let cache = CostCache::new(vec![1.0, 2.0], vec![0.5]).unwrap();
        let add_delta = cache.cost_of_change(&edges, &[0], &[]).unwrap();
        let remove_delta = cache.cost_of_change(&edges, &[], &[0]).unwrap();
        assert!((add_delta + remove_delta).abs() < 1e-12);
    }

    #[test]
    fn nan_in_cache_rejected_at_construction() {
        assert!(CostCache::new(vec![f64::NAN], vec![]).is_err());
    }
}
