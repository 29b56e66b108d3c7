//! Outer soft-EM loop (C7) and rule selector (C8): alternate running the
//! sampler to collect edge marginals, refitting the model suite from them,
//! and deleting rules whose expected contribution has turned non-negative.

use crate::error::Result;
use crate::graph::EdgeSet;
use crate::lexicon::Lexicon;
use crate::model::{ModelSuite, RootCostModel};
use crate::rules::RuleSet;
use crate::sampler::{MCMCSampler, SamplerMode};
use crate::stats::StatConfig;
use std::collections::HashSet;

/// Tunables for one outer soft-EM + rule-selection pass, independent of
/// file I/O or process configuration (those live in the `morph-modsel`
/// binary's `Config`).
#[derive(Debug, Clone, Copy)]
pub struct ModselOptions {
    pub warmup_iterations: u64,
    pub sampling_iterations: u64,
    pub seed: u64,
    pub random_init: bool,
}

/// The mutable state threaded through outer iterations: the candidate
/// graph shrinks as C8 deletes rules; the rule set shrinks in lockstep.
pub struct ModselState {
    pub lexicon: Lexicon,
    pub rule_set: RuleSet,
    pub edge_set: EdgeSet,
}

/// Result of one outer iteration: the refit marginals plus which rules (by
/// their ID *before* this iteration's deletion) were dropped.
///
/// `edge_marginals`/`rule_frequencies`/`rule_contributions` are indexed by
/// the edge/rule IDs that were valid *during this iteration's sampling run*
/// (i.e. before C8's deletion remapped surviving IDs) — callers that want
/// to write `sample-edge-stats`/`sample-rule-stats` files should do so
/// before relying on `state`'s post-iteration ID space.
pub struct OuterIterationReport {
    pub acceptance_rate: f64,
    pub expected_cost: f64,
    pub deleted_rule_count: usize,
    pub edge_marginals: Vec<f64>,
    pub rule_frequencies: Vec<f64>,
    pub rule_contributions: Vec<f64>,
}

/// Run one outer iteration: E-step (sample), M-step (refit), then rule
/// selection. Mutates `state` and `model` in place and returns a summary
/// report.
pub fn run_outer_iteration<R: RootCostModel>(
    state: &mut ModselState,
    model: &mut ModelSuite<R>,
    mode: SamplerMode,
    opts: &ModselOptions,
    stat_config: StatConfig,
) -> Result<OuterIterationReport> {
    let cache = model.build_cache(&state.lexicon, &state.edge_set)?;
    let mut sampler = MCMCSampler::new(
        &state.edge_set,
        model.rule_model.rule_costs(),
        state.lexicon.len(),
        cache,
        mode,
        stat_config,
        opts.seed,
        opts.random_init,
    )?;
    sampler.run(opts.warmup_iterations, opts.sampling_iterations)?;

    let edge_weights = sampler.stats.edge_marginals(state.edge_set.len());
    let acceptance_rate = sampler
        .stats
        .acceptance_rate
        .as_ref()
        .map(|s| s.rate())
        .unwrap_or(0.0);
    let expected_cost = sampler
        .stats
        .expected_cost
        .as_ref()
        .map(|s| s.mean())
        .unwrap_or(sampler.current_cost());

    model.fit(&state.lexicon, &state.edge_set, &edge_weights);

    let rule_frequencies = (0..state.rule_set.len())
        .map(|r| {
            sampler
                .stats
                .rule_frequency
                .as_ref()
                .map(|s| s.frequency(r))
                .unwrap_or(0.0)
        })
        .collect();
    let rule_contributions: Vec<f64> = (0..state.rule_set.len())
        .map(|r| {
            sampler
                .stats
                .rule_expected_contribution
                .as_ref()
                .map(|s| s.contribution(r))
                .unwrap_or(0.0)
        })
        .collect();

    let deleted_rule_count = match &sampler.stats.rule_expected_contribution {
        Some(contrib) => select_rules(state, model, contrib),
        None => 0,
    };

    Ok(OuterIterationReport {
        acceptance_rate,
        expected_cost,
        deleted_rule_count,
        edge_marginals: edge_weights,
        rule_frequencies,
        rule_contributions,
    })
}

/// Delete every rule whose `contrib_r < 0` (a negative expected
/// contribution means removing the rule's present edges and forgoing its
/// own `rule_cost` would lower the total cost), shrink the edge set and
/// rule set accordingly, and rebuild the model suite's per-rule arrays
/// against the new, smaller rule ID space.
///
/// Returns the number of rules deleted. Deletion is monotone and
/// cumulative: a rule already gone in a prior outer iteration simply isn't
/// in `state.rule_set` anymore, so it can't be "undeleted".
fn select_rules<R: RootCostModel>(
    state: &mut ModselState,
    model: &mut ModelSuite<R>,
    contrib: &crate::stats::RuleExpectedContributionStatistic,
) -> usize {
    let deleted: HashSet<usize> = (0..state.rule_set.len())
        .filter(|&r| contrib.contribution(r) < 0.0)
        .collect();
    if deleted.is_empty() {
        return 0;
    }
    let (new_rule_set, remap) = state.rule_set.without(&deleted);
    let new_edge_set = state.edge_set.without_rules(&deleted, &remap);

    model.rebuild_for_rules(&new_rule_set, &remap);

    state.rule_set = new_rule_set;
    state.edge_set = new_edge_set;
    deleted.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphEdge;
    use crate::lexicon::Word;
    use crate::model::ZipfRootCostModel;
    use crate::rules::Rule;

    fn toy_state() -> ModselState {
        let mut lexicon = Lexicon::new();
        lexicon.add(Word::new(vec!["r".into(), "u".into(), "n".into()], vec![], 100.0));
        lexicon.add(Word::new(
            vec!["r".into(), "u".into(), "n".into(), "s".into()],
            vec![],
            20.0,
        ));
        let mut rule_set = RuleSet::new();
        rule_set.add(Rule::parse(":/:s").unwrap(), 1.0);
        let mut edge_set = EdgeSet::new();
        edge_set.add(GraphEdge { source: 0, target: 1, rule: 0 });
        ModselState { lexicon, rule_set, edge_set }
    }

    #[test]
    fn one_outer_iteration_produces_high_marginal_for_single_rule_chain() {
        let mut state = toy_state();
        let mut model = ModelSuite::new(ZipfRootCostModel, &state.rule_set, 1.1, 1.1, 0.001);
        let opts = ModselOptions {
            warmup_iterations: 100,
            sampling_iterations: 5_000,
            seed: 1,
            random_init: false,
        };
        let report = run_outer_iteration(&mut state, &mut model, SamplerMode::Unsupervised, &opts, StatConfig::default())
            .unwrap();
        assert!(report.expected_cost.is_finite());
    }

    #[test]
    fn rule_with_no_support_survives_since_contribution_stays_nonnegative() {
        let mut state = toy_state();
        // Remove the only edge so the rule never appears in any accepted
        // move; with zero present edges its contribution is exactly its
        // own rule_cost, which is always >= 0, so it must not be deleted.
        state.edge_set = EdgeSet::new();
        let mut model = ModelSuite::new(ZipfRootCostModel, &state.rule_set, 1.1, 1.1, 0.001);
        model.rule_model.fit(&state.edge_set, &[]);
        let opts = ModselOptions {
            warmup_iterations: 10,
            sampling_iterations: 100,
            seed: 2,
            random_init: false,
        };
        let report = run_outer_iteration(&mut state, &mut model, SamplerMode::Unsupervised, &opts, StatConfig::default())
            .unwrap();
        assert_eq!(report.deleted_rule_count, 0);
        assert_eq!(state.rule_set.len(), 1);
    }

    #[test]
    fn rule_whose_forced_edge_costs_more_than_it_saves_gets_deleted() {
        // A supervised pair forces this edge present for the whole run
        // regardless of cost, so its contribution is the deterministic
        // cost of keeping it vs. letting the target be its own root. A
        // tiny domain size keeps rule_cost from offsetting a steep edge
        // cost driven by a large source/target frequency gap.
        let mut lexicon = Lexicon::new();
        lexicon.add(Word::new(vec!["s".into(), "r".into(), "c".into()], vec![], 100.0));
        lexicon.add(Word::new(vec!["t".into(), "g".into(), "t".into()], vec![], 1.0));
        let mut rule_set = RuleSet::new();
        rule_set.add(Rule::parse(":/:s").unwrap(), 10.0);
        let mut edge_set = EdgeSet::new();
        edge_set.add(GraphEdge { source: 0, target: 1, rule: 0 });
        let mut state = ModselState { lexicon, rule_set, edge_set };
        let mut model = ModelSuite::new(ZipfRootCostModel, &state.rule_set, 1.1, 1.1, 0.001);
        let mode = SamplerMode::Supervised { connected: vec![(0, 1)] };
        let opts = ModselOptions {
            warmup_iterations: 10,
            sampling_iterations: 50,
            seed: 3,
            random_init: false,
        };
        let report = run_outer_iteration(&mut state, &mut model, mode, &opts, StatConfig::default()).unwrap();
        assert!(report.rule_contributions[0] < 0.0);
        assert_eq!(report.deleted_rule_count, 1);
        assert_eq!(state.rule_set.len(), 0);
    }
}
