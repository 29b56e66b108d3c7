//! Morphological rules: structural substitution patterns over symbol and
//! tag sequences, plus a `RuleSet` index assigning stable integer IDs.
//!
//! Rule string grammar (see `shared.py`'s `patterns` in the original system):
//! a `/`-separated list of substitution pairs `LEFT:RIGHT`, each side a
//! sequence of symbols (`[\w-]` or a braced `{NAME}` token), with an optional
//! `___LEFT:RIGHT` suffix giving a tag substitution (tags look like `<TAG>`).

use crate::error::{MorphError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One side of a substitution pair: a (possibly empty) sequence of symbols.
pub type SymbolSeq = Vec<String>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubstPair {
    pub left: SymbolSeq,
    pub right: SymbolSeq,
}

impl fmt::Display for SubstPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.left.join(""), self.right.join(""))
    }
}

/// A morphological rule: an ordered list of symbol-level substitution pairs
/// plus an optional tag substitution. Equality and hashing are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub subst: Vec<SubstPair>,
    pub tag_subst: Option<SubstPair>,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.subst.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", parts.join("/"))?;
        if let Some(tag) = &self.tag_subst {
            write!(f, "___{}", tag)?;
        }
        Ok(())
    }
}

fn tokenize_symbols(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '{' {
            let mut j = i + 1;
            while j < chars.len() && chars[j] != '}' {
                j += 1;
            }
            out.push(chars[i..=j.min(chars.len() - 1)].iter().collect());
            i = j + 1;
        } else {
            out.push(chars[i].to_string());
            i += 1;
        }
    }
    out
}

fn parse_subst_pair(s: &str) -> Result<SubstPair> {
    let mut parts = s.splitn(2, ':');
    let left = parts
        .next()
        .ok_or_else(|| MorphError::config(format!("malformed substitution pair: {s}")))?;
    let right = parts
        .next()
        .ok_or_else(|| MorphError::config(format!("malformed substitution pair: {s}")))?;
    Ok(SubstPair {
        left: tokenize_symbols(left),
        right: tokenize_symbols(right),
    })
}

impl Rule {
    /// Parse a rule string of the form `X:Y/X:Y___T:T`.
    pub fn parse(s: &str) -> Result<Rule> {
        let (body, tag_part) = match s.split_once("___") {
            Some((b, t)) => (b, Some(t)),
            None => (s, None),
        };
        let subst = body
            .split('/')
            .map(parse_subst_pair)
            .collect::<Result<Vec<_>>>()?;
        let tag_subst = tag_part.map(parse_subst_pair).transpose()?;
        Ok(Rule { subst, tag_subst })
    }
}

/// A collection of rules with stable integer IDs and per-rule domain sizes
/// (the count of lexicon entries matching the rule's left side).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    rules: Vec<Rule>,
    domsizes: Vec<f64>,
    index: HashMap<Rule, usize>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Insert a rule with its domain size, returning its ID. Re-inserting an
    /// existing rule returns its existing ID and leaves the domain size
    /// unchanged.
    pub fn add(&mut self, rule: Rule, domsize: f64) -> usize {
        if let Some(&id) = self.index.get(&rule) {
            return id;
        }
        let id = self.rules.len();
        self.index.insert(rule.clone(), id);
        self.rules.push(rule);
        self.domsizes.push(domsize);
        id
    }

    pub fn get_id(&self, rule: &Rule) -> Option<usize> {
        self.index.get(rule).copied()
    }

    pub fn get(&self, id: usize) -> &Rule {
        &self.rules[id]
    }

    pub fn domsize(&self, id: usize) -> f64 {
        self.domsizes[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Rule)> {
        self.rules.iter().enumerate()
    }

    /// Build a new `RuleSet` containing only the rules whose ID is not in
    /// `deleted`, returning it along with a map from old ID to new ID (rules
    /// that were deleted are absent from the map).
    pub fn without(&self, deleted: &std::collections::HashSet<usize>) -> (RuleSet, HashMap<usize, usize>) {
        let mut new_set = RuleSet::new();
        let mut remap = HashMap::new();
        for (old_id, rule) in self.iter() {
            if deleted.contains(&old_id) {
                continue;
            }
            let new_id = new_set.add(rule.clone(), self.domsize(old_id));
            remap.insert(old_id, new_id);
        }
        (new_set, remap)
    }

    pub fn load_tsv<R: std::io::BufRead>(reader: R) -> Result<RuleSet> {
        let mut set = RuleSet::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut cols = line.split('\t');
            let rule_str = cols
                .next()
                .ok_or_else(|| MorphError::config_at("missing rule column", lineno))?;
            let domsize: f64 = cols
                .next()
                .ok_or_else(|| MorphError::config_at("missing domsize column", lineno))?
                .parse()
                .map_err(|_| MorphError::config_at("malformed domsize", lineno))?;
            let rule = Rule::parse(rule_str)?;
            set.add(rule, domsize);
        }
        Ok(set)
    }

    pub fn save_tsv<W: std::io::Write>(&self, mut writer: W) -> Result<()> {
        for (id, rule) in self.iter() {
            writeln!(writer, "{}\t{}", rule, self.domsize(id))?;
        }
        Ok(())
    }
}
