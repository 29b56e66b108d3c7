//! Lexicon entries (`Word`) and the `Lexicon` index.
//!
//! A `Lexicon` assigns every distinct word string a stable, contiguous
//! integer ID, the unit every other module (`RuleSet`, `EdgeSet`,
//! `Branching`) uses instead of carrying words around by value.
//!
//! Word string grammar: a sequence of symbols (`[\w-]` or a braced `{NAME}`
//! token) followed by zero or more tags (`<TAG>`), e.g. `run<V>` or
//! `{AFX}run<V><SG>`.

use crate::error::{MorphError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::{BufRead, Write};

/// A single lexicon entry: its symbol/tag decomposition, observed
/// frequency, and an optional feature vector supplied by an external
/// feature extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub symbols: Vec<String>,
    pub tags: Vec<String>,
    pub freq: f64,
    pub features: Option<Vec<f64>>,
}

impl Word {
    pub fn new(symbols: Vec<String>, tags: Vec<String>, freq: f64) -> Self {
        Word {
            symbols,
            tags,
            freq,
            features: None,
        }
    }

    pub fn logfreq(&self) -> f64 {
        self.freq.ln()
    }

    pub fn parse(s: &str) -> Result<Word> {
        let chars: Vec<char> = s.chars().collect();
        let mut symbols = Vec::new();
        let mut tags = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            if chars[i] == '<' {
                let mut j = i + 1;
                while j < chars.len() && chars[j] != '>' {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(MorphError::config(format!("unterminated tag in word: {s}")));
                }
                tags.push(chars[i..=j].iter().collect());
                i = j + 1;
            } else if chars[i] == '{' {
                let mut j = i + 1;
                while j < chars.len() && chars[j] != '}' {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(MorphError::config(format!(
                        "unterminated symbol in word: {s}"
                    )));
                }
                symbols.push(chars[i..=j].iter().collect());
                i = j + 1;
            } else {
                symbols.push(chars[i].to_string());
                i += 1;
            }
        }
        Ok(Word::new(symbols, tags, 1.0))
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbols.join(""))?;
        for tag in &self.tags {
            write!(f, "{tag}")?;
        }
        Ok(())
    }
}

/// A collection of `Word`s with stable, contiguous integer IDs assigned in
/// insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lexicon {
    words: Vec<Word>,
    index: HashMap<String, usize>,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Insert a word, returning its ID. Re-inserting a word with the same
    /// string form returns the existing ID; the new frequency/features are
    /// discarded in that case.
    pub fn add(&mut self, word: Word) -> usize {
        let key = word.to_string();
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = self.words.len();
        self.index.insert(key, id);
        self.words.push(word);
        id
    }

    pub fn get_id_by_string(&self, s: &str) -> Option<usize> {
        self.index.get(s).copied()
    }

    pub fn get(&self, id: usize) -> &Word {
        &self.words[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Word)> {
        self.words.iter().enumerate()
    }

    pub fn load_tsv<R: BufRead>(reader: R) -> Result<Lexicon> {
        let mut lex = Lexicon::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let mut cols = line.split('\t');
            let word_str = cols
                .next()
                .ok_or_else(|| MorphError::config_at("missing word column", lineno))?;
            let freq: f64 = cols
                .next()
                .ok_or_else(|| MorphError::config_at("missing frequency column", lineno))?
                .parse()
                .map_err(|_| MorphError::config_at("malformed frequency", lineno))?;
            let mut word = Word::parse(word_str)?;
            word.freq = freq;
            if let Some(vec_str) = cols.next() {
                let features = vec_str
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        s.parse::<f64>()
                            .map_err(|_| MorphError::config_at("malformed feature vector", lineno))
                    })
                    .collect::<Result<Vec<_>>>()?;
                word.features = Some(features);
            }
            lex.add(word);
        }
        Ok(lex)
    }

    pub fn save_tsv<W: Write>(&self, mut writer: W) -> Result<()> {
        for (_, word) in self.iter() {
            write!(writer, "{}\t{}", word, word.freq)?;
            if let Some(features) = &word.features {
                let joined: Vec<String> = features.iter().map(|f| f.to_string()).collect();
                write!(writer, "\t{}", joined.join(","))?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_round_trip_plain() {
        let s = "run";
        let w = Word::parse(s).unwrap();
        assert_eq!(w.to_string(), s);
    }

    #[test]
    fn word_round_trip_with_tags() {
        let s = "run<V><PRES>";
        let w = Word::parse(s).unwrap();
        assert_eq!(w.to_string(), s);
        assert_eq!(w.tags, vec!["<V>".to_string(), "<PRES>".to_string()]);
    }

    #[test]
    fn word_round_trip_with_braced_symbol() {
        let s = "{AFX}run<V>";
        let w = Word::parse(s).unwrap();
        assert_eq!(w.to_string(), s);
        assert_eq!(w.symbols[0], "{AFX}");
    }

    #[test]
    fn duplicate_insert_returns_same_id() {
        let mut lex = Lexicon::new();
        let id1 = lex.add(Word::parse("run").unwrap());
        let id2 = lex.add(Word::parse("run").unwrap());
        assert_eq!(id1, id2);
        assert_eq!(lex.len(), 1);
    }

    #[test]
    fn tsv_round_trip() {
        let mut lex = Lexicon::new();
        lex.add(Word::new(
            vec!["r".into(), "u".into(), "n".into()],
            vec![],
            10.0,
        ));
        lex.add(Word::new(
            vec!["r".into(), "a".into(), "n".into()],
            vec![],
            3.0,
        ));
        let mut buf = Vec::new();
        lex.save_tsv(&mut buf).unwrap();
        let reloaded = Lexicon::load_tsv(std::io::Cursor::new(buf)).unwrap();
        assert_eq!(reloaded.len(), lex.len());
        assert_eq!(reloaded.get(0).freq, 10.0);
    }
}
