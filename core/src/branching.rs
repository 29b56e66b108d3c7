//! The mutable directed forest ("branching") the sampler explores: each
//! word has at most one incoming edge, and no directed cycle may exist.

use crate::error::{MorphError, Result};
use crate::graph::EdgeSet;
use rand::Rng;

/// A spanning forest over a lexicon of `num_words` words, where present
/// edges are identified by their ID in a companion `EdgeSet`.
#[derive(Debug, Clone)]
pub struct Branching {
    parent_edge: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    /// edge ID -> source word ID, grown lazily as edges are added. Lets
    /// `parent_word` walk the tree without holding a reference to the
    /// companion `EdgeSet`.
    edge_source_cache: Vec<usize>,
}

impl Branching {
    pub fn empty(num_words: usize) -> Self {
        Branching {
            parent_edge: vec![None; num_words],
            children: vec![Vec::new(); num_words],
            edge_source_cache: Vec::new(),
        }
    }

    /// A uniformly random spanning branching of `edge_set`: for each word,
    /// in arbitrary order, pick a uniformly random feasible incoming edge
    /// (one whose source is not a descendant of the word, so no cycle is
    /// created), skipping words with no feasible incoming edge.
    pub fn random(num_words: usize, edge_set: &EdgeSet, rng: &mut impl Rng) -> Self {
        let mut branching = Branching::empty(num_words);
        for target in 0..num_words {
            let mut candidates = Vec::new();
            for (id, edge) in edge_set.iter() {
                if edge.target == target && !branching.has_path(target, edge.source) {
                    candidates.push(id);
                }
            }
            if candidates.is_empty() {
                continue;
            }
            let chosen = candidates[rng.gen_range(0..candidates.len())];
            let edge = *edge_set.get(chosen);
            branching
                .add_edge(chosen, edge.source, edge.target)
                .expect("freshly verified acyclic add");
        }
        branching
    }

    pub fn parent(&self, word: usize) -> Option<usize> {
        self.parent_edge[word]
    }

    pub fn outgoing_edges(&self, word: usize) -> &[usize] {
        &self.children[word]
    }

    /// Is `descendant` reachable from `ancestor` by following present
    /// edges downward? Used to detect whether adding `ancestor -> X` would
    /// create a cycle when `X == descendant` is already an ancestor.
    pub fn has_path(&self, ancestor: usize, descendant: usize) -> bool {
        if ancestor == descendant {
            return true;
        }
        // `descendant` is reachable from `ancestor` iff `ancestor` appears
        // on `descendant`'s parent chain; walk that chain upward.
        let mut cur = descendant;
        loop {
            match self.parent_word(cur) {
                Some(p) if p == ancestor => return true,
                Some(p) => cur = p,
                None => return false,
            }
        }
    }

    /// The word currently parenting `word` (i.e. the source of `word`'s
    /// incoming edge), if any.
    pub fn parent_word(&self, word: usize) -> Option<usize> {
        self.parent_edge[word].map(|eid| self.edge_source_cache[eid])
    }

    pub fn add_edge(&mut self, edge_id: usize, source: usize, target: usize) -> Result<()> {
        if self.parent_edge[target].is_some() {
            return Err(MorphError::InvariantViolation(format!(
                "word {target} already has a parent"
            )));
        }
        if self.has_path(target, source) {
            return Err(MorphError::InvariantViolation(format!(
                "adding edge {source}->{target} would create a cycle"
            )));
        }
        self.parent_edge[target] = Some(edge_id);
        self.edge_source_cache.resize(self.edge_source_cache.len().max(edge_id + 1), usize::MAX);
        self.edge_source_cache[edge_id] = source;
        self.children[source].push(edge_id);
        Ok(())
    }

    pub fn remove_edge(&mut self, edge_id: usize, source: usize, target: usize) -> Result<()> {
        match self.parent_edge[target] {
            Some(e) if e == edge_id => {}
            _ => {
                return Err(MorphError::InvariantViolation(format!(
                    "edge {edge_id} is not the current parent edge of {target}"
                )))
            }
        }
        self.parent_edge[target] = None;
        self.children[source].retain(|&e| e != edge_id);
        Ok(())
    }

    pub fn has_edge(&self, _source: usize, target: usize, edge_id: usize) -> bool {
        self.parent_edge[target] == Some(edge_id)
    }

    /// Ancestor chain of `word`, nearest first, not including `word` itself.
    pub fn ancestors(&self, word: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut cur = word;
        while let Some(p) = self.parent_word(cur) {
            out.push(p);
            cur = p;
        }
        out
    }
}
