//! Candidate edges (`GraphEdge`) and the `EdgeSet` index: the full set of
//! morphological derivations the sampler is allowed to choose among.

use crate::error::{MorphError, Result};
use crate::lexicon::Lexicon;
use crate::rules::{Rule, RuleSet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{BufRead, Write};

/// A candidate derivation: `source` derives `target` via `rule`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: usize,
    pub target: usize,
    pub rule: usize,
}

/// The full candidate-edge graph, indexed by edge ID and by rule.
///
/// Invariant: every `source`/`target` is a valid word ID in the companion
/// `Lexicon`, and every `rule` is a valid rule ID in the companion
/// `RuleSet`; every `(source, rule)` pair maps to at most one edge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeSet {
    edges: Vec<GraphEdge>,
    by_rule: HashMap<usize, Vec<usize>>,
    by_source_target: HashMap<(usize, usize), Vec<usize>>,
}

impl EdgeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn add(&mut self, edge: GraphEdge) -> usize {
        let id = self.edges.len();
        self.by_rule.entry(edge.rule).or_default().push(id);
        self.by_source_target
            .entry((edge.source, edge.target))
            .or_default()
            .push(id);
        self.edges.push(edge);
        id
    }

    pub fn get(&self, id: usize) -> &GraphEdge {
        &self.edges[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &GraphEdge)> {
        self.edges.iter().enumerate()
    }

    /// All edges whose rule is `rule`.
    pub fn edge_ids_by_rule(&self, rule: usize) -> &[usize] {
        self.by_rule.get(&rule).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Stable mapping used for vectorized fits (C4).
    pub fn get_edge_ids_by_rule(&self) -> &HashMap<usize, Vec<usize>> {
        &self.by_rule
    }

    /// Candidate edges between a specific ordered (source, target) pair.
    pub fn find_edges(&self, source: usize, target: usize) -> &[usize] {
        self.by_source_target
            .get(&(source, target))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Build a reduced `EdgeSet` containing only edges whose rule is not in
    /// `deleted_rules`, remapping rule IDs through `rule_remap` (old -> new).
    pub fn without_rules(
        &self,
        deleted_rules: &std::collections::HashSet<usize>,
        rule_remap: &HashMap<usize, usize>,
    ) -> EdgeSet {
        let mut new_set = EdgeSet::new();
        for (_, edge) in self.iter() {
            if deleted_rules.contains(&edge.rule) {
                continue;
            }
            let new_rule = rule_remap[&edge.rule];
            new_set.add(GraphEdge {
                source: edge.source,
                target: edge.target,
                rule: new_rule,
            });
        }
        new_set
    }

    pub fn load_tsv<R: BufRead>(
        reader: R,
        lexicon: &Lexicon,
        rule_set: &mut RuleSet,
    ) -> Result<EdgeSet> {
        let mut set = EdgeSet::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut cols = line.split('\t');
            let source_str = cols
                .next()
                .ok_or_else(|| MorphError::config_at("missing source column", lineno))?;
            let target_str = cols
                .next()
                .ok_or_else(|| MorphError::config_at("missing target column", lineno))?;
            let rule_str = cols
                .next()
                .ok_or_else(|| MorphError::config_at("missing rule column", lineno))?;
            let source = lexicon.get_id_by_string(source_str).ok_or_else(|| {
                MorphError::config_at(format!("unknown source word: {source_str}"), lineno)
            })?;
            let target = lexicon.get_id_by_string(target_str).ok_or_else(|| {
                MorphError::config_at(format!("unknown target word: {target_str}"), lineno)
            })?;
            let rule = crate::rules::Rule::parse(rule_str)?;
            let rule_id = rule_set.get_id(&rule).ok_or_else(|| {
                MorphError::config_at(format!("unknown rule: {rule_str}"), lineno)
            })?;
            set.add(GraphEdge {
                source,
                target,
                rule: rule_id,
            });
        }
        Ok(set)
    }

    pub fn save_tsv<W: Write>(&self, mut writer: W, lexicon: &Lexicon, rule_set: &RuleSet) -> Result<()> {
        for (_, edge) in self.iter() {
            writeln!(
                writer,
                "{}\t{}\t{}",
                lexicon.get(edge.source),
                lexicon.get(edge.target),
                rule_set.get(edge.rule)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::Word;

    fn sample_lexicon() -> Lexicon {
        let mut lex = Lexicon::new();
        lex.add(Word::parse("run").unwrap());
        lex.add(Word::parse("runs").unwrap());
        lex
    }

    #[test]
    fn add_and_index_by_rule_and_pair() {
        let mut rules = RuleSet::new();
        let r = rules.add(Rule::parse(":/:s").unwrap(), 1.0);
        let mut edges = EdgeSet::new();
        let id = edges.add(GraphEdge {
            source: 0,
            target: 1,
            rule: r,
        });
        assert_eq!(edges.edge_ids_by_rule(r), &[id]);
        assert_eq!(edges.find_edges(0, 1), &[id]);
        assert!(edges.find_edges(1, 0).is_empty());
    }

    #[test]
    fn tsv_round_trip() {
        let lex = sample_lexicon();
        let mut rules = RuleSet::new();
        rules.add(Rule::parse(":/:s").unwrap(), 1.0);
        let mut edges = EdgeSet::new();
        edges.add(GraphEdge {
            source: 0,
            target: 1,
            rule: 0,
        });
        let mut buf = Vec::new();
        edges.save_tsv(&mut buf, &lex, &rules).unwrap();
        let mut rules2 = rules.clone();
        let reloaded = EdgeSet::load_tsv(std::io::Cursor::new(buf), &lex, &mut rules2).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get(0).source, 0);
        assert_eq!(reloaded.get(0).target, 1);
    }

    #[test]
    fn without_rules_drops_edges_and_remaps() {
        let mut rules = RuleSet::new();
        let r0 = rules.add(Rule::parse(":/:s").unwrap(), 1.0);
        let r1 = rules.add(Rule::parse("u:a/n:n").unwrap(), 1.0);
        let mut edges = EdgeSet::new();
        edges.add(GraphEdge { source: 0, target: 1, rule: r0 });
        edges.add(GraphEdge { source: 0, target: 2, rule: r1 });
        let mut deleted = std::collections::HashSet::new();
        deleted.insert(r0);
        let (_, remap) = rules.without(&deleted);
        let reduced = edges.without_rules(&deleted, &remap);
        assert_eq!(reduced.len(), 1);
        assert_eq!(reduced.get(0).rule, remap[&r1]);
    }
}
