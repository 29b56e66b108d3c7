//! Running estimators the sampler drives on every iteration (C6).
//!
//! Every concrete statistic implements [`SamplerStatistic`], the narrow
//! capability set the sampler touches: `reset`, `edge_added`,
//! `edge_removed`, `next_iter`, `finalize`. [`Statistics`] bundles the
//! required instances behind the `sample.stat_*` config switches and drives
//! them together so the sampler's inner loop only has one call site per
//! hook.

use crate::branching::Branching;
use crate::cost::CostCache;
use crate::graph::EdgeSet;
use std::collections::HashMap;

/// Exact running mean of a step function that only changes value at
/// discrete "touch" points, e.g. "is this edge present" or "how many edges
/// of this rule are present right now". Between touches the contribution of
/// the elapsed iterations is folded in lazily, on the next touch or at
/// [`RunningMean::finalize`], so it never needs an update every iteration.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningMean {
    current: f64,
    last_touch_iter: u64,
    accumulated: f64,
    frozen_mean: Option<f64>,
}

impl RunningMean {
    pub fn set(&mut self, iter: u64, value: f64) {
        self.accumulated += self.current * (iter - self.last_touch_iter) as f64;
        self.last_touch_iter = iter;
        self.current = value;
        self.frozen_mean = None;
    }

    pub fn adjust(&mut self, iter: u64, delta: f64) {
        self.set(iter, self.current + delta);
    }

    pub fn finalize(&mut self, total_iters: u64) -> f64 {
        self.set(total_iters.max(self.last_touch_iter), self.current);
        let mean = if total_iters == 0 {
            0.0
        } else {
            self.accumulated / total_iters as f64
        };
        self.frozen_mean = Some(mean);
        mean
    }

    pub fn mean(&self) -> f64 {
        self.frozen_mean.unwrap_or(0.0)
    }
}

/// The common shape every statistic drives through. Most statistics ignore
/// most of the context arguments; they are passed uniformly so the sampler
/// has one call site regardless of which statistics are enabled.
pub trait SamplerStatistic {
    fn reset(&mut self);
    fn edge_added(
        &mut self,
        iter: u64,
        edge_id: usize,
        edge_set: &EdgeSet,
        branching: &Branching,
        cost_cache: &CostCache,
        rule_cost: &[f64],
    );
    fn edge_removed(
        &mut self,
        iter: u64,
        edge_id: usize,
        edge_set: &EdgeSet,
        branching: &Branching,
        cost_cache: &CostCache,
        rule_cost: &[f64],
    );
    fn next_iter(&mut self, iter: u64, accepted: bool, current_cost: f64);
    fn finalize(&mut self, total_iters: u64);
}

/// Running fraction of proposed moves that were accepted.
#[derive(Debug, Clone, Default)]
pub struct AcceptanceRateStatistic {
    accepted: u64,
    total: u64,
}

impl AcceptanceRateStatistic {
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.accepted as f64 / self.total as f64
        }
    }
}

impl SamplerStatistic for AcceptanceRateStatistic {
    fn reset(&mut self) {
        *self = Self::default();
    }
    fn edge_added(&mut self, _: u64, _: usize, _: &EdgeSet, _: &Branching, _: &CostCache, _: &[f64]) {}
    fn edge_removed(&mut self, _: u64, _: usize, _: &EdgeSet, _: &Branching, _: &CostCache, _: &[f64]) {}
    fn next_iter(&mut self, _iter: u64, accepted: bool, _current_cost: f64) {
        self.total += 1;
        if accepted {
            self.accepted += 1;
        }
    }
    fn finalize(&mut self, _total_iters: u64) {}
}

/// Running mean of the model cost observed at each iteration.
#[derive(Debug, Clone, Default)]
pub struct ExpectedCostStatistic {
    mean: f64,
    n: u64,
}

impl ExpectedCostStatistic {
    pub fn mean(&self) -> f64 {
        self.mean
    }
}

impl SamplerStatistic for ExpectedCostStatistic {
    fn reset(&mut self) {
        *self = Self::default();
    }
    fn edge_added(&mut self, _: u64, _: usize, _: &EdgeSet, _: &Branching, _: &CostCache, _: &[f64]) {}
    fn edge_removed(&mut self, _: u64, _: usize, _: &EdgeSet, _: &Branching, _: &CostCache, _: &[f64]) {}
    fn next_iter(&mut self, _iter: u64, _accepted: bool, current_cost: f64) {
        self.n += 1;
        self.mean += (current_cost - self.mean) / self.n as f64;
    }
    fn finalize(&mut self, _total_iters: u64) {}
}

/// Per-edge marginal presence fraction, `edge_marginal[e] in [0, 1]`.
#[derive(Debug, Clone)]
pub struct EdgeFrequencyStatistic {
    trackers: Vec<RunningMean>,
}

impl EdgeFrequencyStatistic {
    pub fn new(num_edges: usize) -> Self {
        EdgeFrequencyStatistic {
            trackers: vec![RunningMean::default(); num_edges],
        }
    }

    pub fn marginal(&self, edge_id: usize) -> f64 {
        self.trackers[edge_id].mean()
    }

    pub fn marginals(&self) -> Vec<f64> {
        self.trackers.iter().map(RunningMean::mean).collect()
    }
}

impl SamplerStatistic for EdgeFrequencyStatistic {
    fn reset(&mut self) {
        for t in &mut self.trackers {
            *t = RunningMean::default();
        }
    }
    fn edge_added(&mut self, iter: u64, edge_id: usize, _: &EdgeSet, _: &Branching, _: &CostCache, _: &[f64]) {
        self.trackers[edge_id].adjust(iter, 1.0);
    }
    fn edge_removed(&mut self, iter: u64, edge_id: usize, _: &EdgeSet, _: &Branching, _: &CostCache, _: &[f64]) {
        self.trackers[edge_id].adjust(iter, -1.0);
    }
    fn next_iter(&mut self, _iter: u64, _accepted: bool, _current_cost: f64) {}
    fn finalize(&mut self, total_iters: u64) {
        for t in &mut self.trackers {
            t.finalize(total_iters);
        }
    }
}

/// Running mean of how many present edges currently carry each rule.
/// Summed over rules this equals the total expected edge weight in the
/// sample (the invariant the Bernoulli model's `freq_r` relies on).
#[derive(Debug, Clone)]
pub struct RuleFrequencyStatistic {
    trackers: Vec<RunningMean>,
}

impl RuleFrequencyStatistic {
    pub fn new(num_rules: usize) -> Self {
        RuleFrequencyStatistic {
            trackers: vec![RunningMean::default(); num_rules],
        }
    }

    pub fn frequency(&self, rule_id: usize) -> f64 {
        self.trackers[rule_id].mean()
    }
}

impl SamplerStatistic for RuleFrequencyStatistic {
    fn reset(&mut self) {
        for t in &mut self.trackers {
            *t = RunningMean::default();
        }
    }
    fn edge_added(&mut self, iter: u64, edge_id: usize, edge_set: &EdgeSet, _: &Branching, _: &CostCache, _: &[f64]) {
        let rule = edge_set.get(edge_id).rule;
        self.trackers[rule].adjust(iter, 1.0);
    }
    fn edge_removed(&mut self, iter: u64, edge_id: usize, edge_set: &EdgeSet, _: &Branching, _: &CostCache, _: &[f64]) {
        let rule = edge_set.get(edge_id).rule;
        self.trackers[rule].adjust(iter, -1.0);
    }
    fn next_iter(&mut self, _iter: u64, _accepted: bool, _current_cost: f64) {}
    fn finalize(&mut self, total_iters: u64) {
        for t in &mut self.trackers {
            t.finalize(total_iters);
        }
    }
}

/// Same as [`EdgeFrequencyStatistic`] but keyed by unordered word pair,
/// merging e.g. `run->runs` and a hypothetical `runs->run` candidate.
#[derive(Debug, Clone, Default)]
pub struct UndirectedEdgeFrequencyStatistic {
    trackers: HashMap<(usize, usize), RunningMean>,
}

fn unordered(a: usize, b: usize) -> (usize, usize) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl UndirectedEdgeFrequencyStatistic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marginal(&self, a: usize, b: usize) -> f64 {
        self.trackers
            .get(&unordered(a, b))
            .map(RunningMean::mean)
            .unwrap_or(0.0)
    }
}

impl SamplerStatistic for UndirectedEdgeFrequencyStatistic {
    fn reset(&mut self) {
        self.trackers.clear();
    }
    fn edge_added(&mut self, iter: u64, edge_id: usize, edge_set: &EdgeSet, _: &Branching, _: &CostCache, _: &[f64]) {
        let e = edge_set.get(edge_id);
        self.trackers.entry(unordered(e.source, e.target)).or_default().adjust(iter, 1.0);
    }
    fn edge_removed(&mut self, iter: u64, edge_id: usize, edge_set: &EdgeSet, _: &Branching, _: &CostCache, _: &[f64]) {
        let e = edge_set.get(edge_id);
        self.trackers.entry(unordered(e.source, e.target)).or_default().adjust(iter, -1.0);
    }
    fn next_iter(&mut self, _iter: u64, _accepted: bool, _current_cost: f64) {}
    fn finalize(&mut self, total_iters: u64) {
        for t in self.trackers.values_mut() {
            t.finalize(total_iters);
        }
    }
}

/// Running mean of a rule's expected contribution: the cost of removing
/// every edge currently carrying it, plus its `rule_cost`. Negative means
/// the rule is worth keeping; non-negative means [`crate::modsel`] should
/// drop it. Recomputed lazily whenever an edge of that rule is touched.
#[derive(Debug, Clone)]
pub struct RuleExpectedContributionStatistic {
    trackers: Vec<RunningMean>,
}

impl RuleExpectedContributionStatistic {
    pub fn new(num_rules: usize) -> Self {
        RuleExpectedContributionStatistic {
            trackers: vec![RunningMean::default(); num_rules],
        }
    }

    pub fn contribution(&self, rule_id: usize) -> f64 {
        self.trackers[rule_id].mean()
    }

    fn touch_rule(
        &mut self,
        iter: u64,
        rule: usize,
        edge_set: &EdgeSet,
        branching: &Branching,
        cost_cache: &CostCache,
        rule_cost: &[f64],
    ) {
        let present: Vec<usize> = edge_set
            .edge_ids_by_rule(rule)
            .iter()
            .copied()
            .filter(|&eid| {
                let e = edge_set.get(eid);
                branching.has_edge(e.source, e.target, eid)
            })
            .collect();
        // cost_of_change([], E_r): the delta from removing every present
        // edge of this rule.
        let remove_delta = cost_cache
            .cost_of_change(edge_set, &[], &present)
            .unwrap_or(0.0);
        self.trackers[rule].set(iter, remove_delta + rule_cost[rule]);
    }
}

impl SamplerStatistic for RuleExpectedContributionStatistic {
    fn reset(&mut self) {
        for t in &mut self.trackers {
            *t = RunningMean::default();
        }
    }
    fn edge_added(
        &mut self,
        iter: u64,
        edge_id: usize,
        edge_set: &EdgeSet,
        branching: &Branching,
        cost_cache: &CostCache,
        rule_cost: &[f64],
    ) {
        let rule = edge_set.get(edge_id).rule;
        self.touch_rule(iter, rule, edge_set, branching, cost_cache, rule_cost);
    }
    fn edge_removed(
        &mut self,
        iter: u64,
        edge_id: usize,
        edge_set: &EdgeSet,
        branching: &Branching,
        cost_cache: &CostCache,
        rule_cost: &[f64],
    ) {
        let rule = edge_set.get(edge_id).rule;
        self.touch_rule(iter, rule, edge_set, branching, cost_cache, rule_cost);
    }
    fn next_iter(&mut self, _iter: u64, _accepted: bool, _current_cost: f64) {}
    fn finalize(&mut self, total_iters: u64) {
        for t in &mut self.trackers {
            t.finalize(total_iters);
        }
    }
}

/// Which statistics to collect, mirroring the `sample.stat_*` config keys.
#[derive(Debug, Clone, Copy)]
pub struct StatConfig {
    pub acceptance_rate: bool,
    pub expected_cost: bool,
    pub edge_frequency: bool,
    pub rule_frequency: bool,
    pub undirected_edge_frequency: bool,
    pub rule_expected_contribution: bool,
}

impl Default for StatConfig {
    fn default() -> Self {
        StatConfig {
            acceptance_rate: true,
            expected_cost: true,
            edge_frequency: true,
            rule_frequency: true,
            undirected_edge_frequency: false,
            rule_expected_contribution: true,
        }
    }
}

/// The full set of statistics a sampler run drives, gated by [`StatConfig`].
/// Soft-EM (C7) reads `edge_frequency` marginals back out; rule selection
/// (C8) reads `rule_expected_contribution`.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub acceptance_rate: Option<AcceptanceRateStatistic>,
    pub expected_cost: Option<ExpectedCostStatistic>,
    pub edge_frequency: Option<EdgeFrequencyStatistic>,
    pub rule_frequency: Option<RuleFrequencyStatistic>,
    pub undirected_edge_frequency: Option<UndirectedEdgeFrequencyStatistic>,
    pub rule_expected_contribution: Option<RuleExpectedContributionStatistic>,
}

impl Statistics {
    pub fn new(config: StatConfig, num_edges: usize, num_rules: usize) -> Self {
        Statistics {
            acceptance_rate: config.acceptance_rate.then(AcceptanceRateStatistic::default),
            expected_cost: config.expected_cost.then(ExpectedCostStatistic::default),
            edge_frequency: config
                .edge_frequency
                .then(|| EdgeFrequencyStatistic::new(num_edges)),
            rule_frequency: config
                .rule_frequency
                .then(|| RuleFrequencyStatistic::new(num_rules)),
            undirected_edge_frequency: config
                .undirected_edge_frequency
                .then(UndirectedEdgeFrequencyStatistic::new),
            rule_expected_contribution: config
                .rule_expected_contribution
                .then(|| RuleExpectedContributionStatistic::new(num_rules)),
        }
    }

    pub fn reset(&mut self) {
        if let Some(s) = &mut self.acceptance_rate {
            s.reset();
        }
        if let Some(s) = &mut self.expected_cost {
            s.reset();
        }
        if let Some(s) = &mut self.edge_frequency {
            s.reset();
        }
        if let Some(s) = &mut self.rule_frequency {
            s.reset();
        }
        if let Some(s) = &mut self.undirected_edge_frequency {
            s.reset();
        }
        if let Some(s) = &mut self.rule_expected_contribution {
            s.reset();
        }
    }

    pub fn edge_added(&mut self, iter: u64, edge_id: usize, edge_set: &EdgeSet, branching: &Branching, cost_cache: &CostCache, rule_cost: &[f64]) {
        if let Some(s) = &mut self.edge_frequency {
            s.edge_added(iter, edge_id, edge_set, branching, cost_cache, rule_cost);
        }
        if let Some(s) = &mut self.rule_frequency {
            s.edge_added(iter, edge_id, edge_set, branching, cost_cache, rule_cost);
        }
        if let Some(s) = &mut self.undirected_edge_frequency {
            s.edge_added(iter, edge_id, edge_set, branching, cost_cache, rule_cost);
        }
        if let Some(s) = &mut self.rule_expected_contribution {
            s.edge_added(iter, edge_id, edge_set, branching, cost_cache, rule_cost);
        }
    }

    pub fn edge_removed(&mut self, iter: u64, edge_id: usize, edge_set: &EdgeSet, branching: &Branching, cost_cache: &CostCache, rule_cost: &[f64]) {
        if let Some(s) = &mut self.edge_frequency {
            s.edge_removed(iter, edge_id, edge_set, branching, cost_cache, rule_cost);
        }
        if let Some(s) = &mut self.rule_frequency {
            s.edge_removed(iter, edge_id, edge_set, branching, cost_cache, rule_cost);
        }
        if let Some(s) = &mut self.undirected_edge_frequency {
            s.edge_removed(iter, edge_id, edge_set, branching, cost_cache, rule_cost);
        }
        if let Some(s) = &mut self.rule_expected_contribution {
            s.edge_removed(iter, edge_id, edge_set, branching, cost_cache, rule_cost);
        }
    }

    pub fn next_iter(&mut self, iter: u64, accepted: bool, current_cost: f64) {
        if let Some(s) = &mut self.acceptance_rate {
            s.next_iter(iter, accepted, current_cost);
        }
        if let Some(s) = &mut self.expected_cost {
            s.next_iter(iter, accepted, current_cost);
        }
    }

    pub fn finalize(&mut self, total_iters: u64) {
        if let Some(s) = &mut self.edge_frequency {
            s.finalize(total_iters);
        }
        if let Some(s) = &mut self.rule_frequency {
            s.finalize(total_iters);
        }
        if let Some(s) = &mut self.undirected_edge_frequency {
            s.finalize(total_iters);
        }
        if let Some(s) = &mut self.rule_expected_contribution {
            s.finalize(total_iters);
        }
    }

    /// Edge marginals for every edge, defaulting to 0 if the statistic is
    /// disabled (the soft-EM driver always wants a full dense vector).
    pub fn edge_marginals(&self, num_edges: usize) -> Vec<f64> {
        match &self.edge_frequency {
            Some(s) => s.marginals(),
            None => vec![0.0; num_edges],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_mean_of_always_present_is_one() {
        let mut m = RunningMean::default();
        m.set(0, 1.0);
        assert_eq!(m.finalize(100), 1.0);
    }

    #[test]
    fn running_mean_of_half_present_is_half() {
        let mut m = RunningMean::default();
        m.set(0, 1.0);
        m.set(50, 0.0);
        assert!((m.finalize(100) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn acceptance_rate_tracks_fraction() {
        let mut s = AcceptanceRateStatistic::default();
        s.next_iter(1, true, 0.0);
        s.next_iter(2, false, 0.0);
        s.next_iter(3, true, 0.0);
        assert!((s.rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn edge_frequency_in_unit_interval() {
        let mut s = EdgeFrequencyStatistic::new(1);
        let es = EdgeSet::new();
        let b = Branching::empty(1);
        let cc = CostCache::new(vec![0.0], vec![]).unwrap();
        s.edge_added(0, 0, &es, &b, &cc, &[]);
        s.edge_removed(50, 0, &es, &b, &cc, &[]);
        s.finalize(100);
        assert!(s.marginal(0) >= 0.0 && s.marginal(0) <= 1.0);
    }
}
