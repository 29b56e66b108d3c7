//! Move proposal: given the current branching and a uniformly chosen
//! candidate edge, classify and build the add/remove/proposal-ratio triple
//! the sampler needs to evaluate acceptance.

use crate::branching::Branching;
use crate::graph::EdgeSet;
use rand::Rng;
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub enum MoveProposal {
    Proposed {
        add: Vec<usize>,
        remove: Vec<usize>,
        q_ratio: f64,
    },
    Infeasible,
}

/// Sampler operating mode, controlling which move types are legal.
#[derive(Debug, Clone)]
pub enum SamplerMode {
    /// Unrestricted: all four move types (add/delete/swap-parent/flip).
    Unsupervised,
    /// Branching shape is fixed to a set of connected (source, target)
    /// pairs; only the rule used for each connection may change.
    Supervised { connected: Vec<(usize, usize)> },
    /// Unrestricted moves, but a proposal that would sever every
    /// connection between an ensured (source, target) pair is infeasible.
    SemiSupervised { ensured: HashSet<(usize, usize)> },
}

/// Classify `edge_id` against `branching` and build its move proposal.
pub fn determine_move_proposal(
    mode: &SamplerMode,
    branching: &Branching,
    edge_set: &EdgeSet,
    edge_id: usize,
    rng: &mut impl Rng,
) -> MoveProposal {
    match mode {
        SamplerMode::Supervised { connected } => propose_rule_swap(branching, edge_set, connected, rng),
        SamplerMode::Unsupervised => {
            let proposal = propose_unrestricted(branching, edge_set, edge_id, rng);
            proposal
        }
        SamplerMode::SemiSupervised { ensured } => {
            let proposal = propose_unrestricted(branching, edge_set, edge_id, rng);
            guard_ensured_connections(proposal, branching, edge_set, ensured)
        }
    }
}

fn guard_ensured_connections(
    proposal: MoveProposal,
    _branching: &Branching,
    edge_set: &EdgeSet,
    ensured: &HashSet<(usize, usize)>,
) -> MoveProposal {
    let MoveProposal::Proposed { add, remove, q_ratio } = &proposal else {
        return proposal;
    };
    // At most one edge is ever present per target, so removing an ensured
    // pair's edge severs the connection unless the same move also adds a
    // replacement edge for that exact pair.
    for &eid in remove {
        let e = edge_set.get(eid);
        let pair = (e.source, e.target);
        if !ensured.contains(&pair) {
            continue;
        }
        let replaced = add.iter().any(|&a| {
            let ae = edge_set.get(a);
            (ae.source, ae.target) == pair
        });
        if !replaced {
            return MoveProposal::Infeasible;
        }
    }
    MoveProposal::Proposed {
        add: add.clone(),
        remove: remove.clone(),
        q_ratio: *q_ratio,
    }
}

fn propose_unrestricted(
    branching: &Branching,
    edge_set: &EdgeSet,
    edge_id: usize,
    rng: &mut impl Rng,
) -> MoveProposal {
    let edge = *edge_set.get(edge_id);
    let (source, target) = (edge.source, edge.target);

    if branching.has_edge(source, target, edge_id) {
        return propose_deleting_edge(edge_id);
    }
    if branching.has_path(target, source) {
        return propose_flip(branching, edge_set, source, target, rng);
    }
    if branching.parent(target).is_some() {
        return propose_swapping_parent(branching, edge_id, target);
    }
    propose_adding_edge(edge_id)
}

fn propose_adding_edge(edge_id: usize) -> MoveProposal {
    MoveProposal::Proposed {
        add: vec![edge_id],
        remove: vec![],
        q_ratio: 1.0,
    }
}

fn propose_deleting_edge(edge_id: usize) -> MoveProposal {
    MoveProposal::Proposed {
        add: vec![],
        remove: vec![edge_id],
        q_ratio: 1.0,
    }
}

fn propose_swapping_parent(branching: &Branching, edge_id: usize, target: usize) -> MoveProposal {
    let current_parent_edge = branching
        .parent(target)
        .expect("swap-parent proposed only when target already has a parent");
    MoveProposal::Proposed {
        add: vec![edge_id],
        remove: vec![current_parent_edge],
        q_ratio: 1.0,
    }
}

fn propose_flip(
    branching: &Branching,
    edge_set: &EdgeSet,
    a: usize,
    b: usize,
    rng: &mut impl Rng,
) -> MoveProposal {
    let p = branching.parent_word(b);
    let q = branching
        .parent_word(a)
        .expect("a has an ancestor chain reaching b, so a must have a parent");

    // r: the node on a's ancestor chain whose parent is b. If b is already
    // a's direct parent, r is q itself and the walk below must not run (b
    // may be a root, with no parent of its own to query).
    let mut r = q;
    if r != b {
        loop {
            if branching.parent_word(r) == Some(b) {
                break;
            }
            r = branching
                .parent_word(r)
                .expect("b is an ancestor of a, so this walk must reach a node whose parent is b");
        }
    }

    if rng.gen_bool(0.5) {
        propose_flip_1(branching, edge_set, p, b, a, rng)
    } else {
        propose_flip_2(branching, edge_set, p, b, r, rng)
    }
}

fn propose_flip_1(
    branching: &Branching,
    edge_set: &EdgeSet,
    p: Option<usize>,
    b: usize,
    a: usize,
    rng: &mut impl Rng,
) -> MoveProposal {
    let Some(p) = p else {
        return MoveProposal::Infeasible;
    };
    let candidates = edge_set.find_edges(p, a);
    if candidates.is_empty() {
        return MoveProposal::Infeasible;
    }
    let chosen = candidates[rng.gen_range(0..candidates.len())];
    let reverse_candidates = edge_set.find_edges(p, b).len();

    let mut remove = vec![branching
        .parent(a)
        .expect("a's ancestor chain reaches b, so a has a parent edge")];
    if let Some(pb_edge) = branching.parent(b) {
        remove.push(pb_edge);
    }
    MoveProposal::Proposed {
        add: vec![chosen],
        remove,
        q_ratio: reverse_candidates as f64 / candidates.len() as f64,
    }
}

fn propose_flip_2(
    branching: &Branching,
    edge_set: &EdgeSet,
    p: Option<usize>,
    b: usize,
    r: usize,
    rng: &mut impl Rng,
) -> MoveProposal {
    let Some(p) = p else {
        return MoveProposal::Infeasible;
    };
    let candidates = edge_set.find_edges(p, r);
    if candidates.is_empty() {
        return MoveProposal::Infeasible;
    }
    let chosen = candidates[rng.gen_range(0..candidates.len())];
    let reverse_candidates = edge_set.find_edges(p, b).len();

    let remove = vec![
        branching
            .parent(r)
            .expect("r's parent is b by construction"),
        branching
            .parent(b)
            .expect("p is b's parent by construction"),
    ];
    MoveProposal::Proposed {
        add: vec![chosen],
        remove,
        q_ratio: reverse_candidates as f64 / candidates.len() as f64,
    }
}

/// Pick a uniformly random connected pair and propose replacing its
/// current edge with a different candidate edge for the same pair.
fn propose_rule_swap(
    branching: &Branching,
    edge_set: &EdgeSet,
    connected: &[(usize, usize)],
    rng: &mut impl Rng,
) -> MoveProposal {
    if connected.is_empty() {
        return MoveProposal::Infeasible;
    }
    let (source, target) = connected[rng.gen_range(0..connected.len())];
    let candidates = edge_set.find_edges(source, target);
    if candidates.len() < 2 {
        return MoveProposal::Infeasible;
    }
    let current = branching.parent(target);
    let alternatives: Vec<usize> = candidates
        .iter()
        .copied()
        .filter(|&c| Some(c) != current)
        .collect();
    if alternatives.is_empty() {
        return MoveProposal::Infeasible;
    }
    let chosen = alternatives[rng.gen_range(0..alternatives.len())];
    let mut remove = Vec::new();
    if let Some(cur) = current {
        remove.push(cur);
    }
    MoveProposal::Proposed {
        add: vec![chosen],
        remove,
        q_ratio: 1.0,
    }
}
