//! `rule-check`: static consistency checks on a `rules`/`graph` pair before
//! handing them to `morph-modsel` — catches malformed rule strings and
//! rules whose candidate-edge count exceeds their declared domain size
//! (either input is wrong, or the FST/alignment layer over-generated).
//!
//! Grounded on the teacher's small single-purpose `tools/*` binaries
//! (`clap::Parser` args, `anyhow::Result` main, plain stdout report).

use anyhow::{Context, Result};
use clap::Parser;
use morph_core::graph::EdgeSet;
use morph_core::lexicon::Lexicon;
use morph_core::rules::RuleSet;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "rule-check", about = "Validate a rules/graph pair for consistency")]
struct Args {
    /// Wordlist TSV, used only to resolve source/target words in the graph.
    #[arg(long)]
    wordlist: PathBuf,

    /// Rules TSV: rule string, domain size.
    #[arg(long)]
    rules: PathBuf,

    /// Candidate graph TSV: source word, target word, rule string.
    #[arg(long)]
    graph: PathBuf,
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<bool> {
    let args = Args::parse();

    let lexicon = Lexicon::load_tsv(BufReader::new(
        File::open(&args.wordlist).with_context(|| format!("opening wordlist {}", args.wordlist.display()))?,
    ))?;
    let mut rule_set = RuleSet::load_tsv(BufReader::new(
        File::open(&args.rules).with_context(|| format!("opening rules {}", args.rules.display()))?,
    ))?;
    let edge_set = EdgeSet::load_tsv(
        BufReader::new(File::open(&args.graph).with_context(|| format!("opening graph {}", args.graph.display()))?),
        &lexicon,
        &mut rule_set,
    )?;

    println!(
        "loaded {} words, {} rules, {} candidate edges",
        lexicon.len(),
        rule_set.len(),
        edge_set.len()
    );

    let mut clean = true;

    // Round-trip every rule string; a rule that doesn't print back to
    // itself indicates a parser/grammar mismatch upstream.
    for (id, rule) in rule_set.iter() {
        let reparsed = morph_core::rules::Rule::parse(&rule.to_string())
            .with_context(|| format!("rule {id} ({rule}) failed to re-parse its own Display form"))?;
        if &reparsed != rule {
            println!("WARN  rule {id} ({rule}) is not stable under parse/Display round-trip");
            clean = false;
        }
    }

    // A rule with more candidate edges than its declared domain size is
    // over-generating relative to what it claims to match.
    for (rule_id, rule) in rule_set.iter() {
        let edge_count = edge_set.edge_ids_by_rule(rule_id).len();
        let domsize = rule_set.domsize(rule_id);
        if (edge_count as f64) > domsize {
            println!(
                "WARN  rule {rule_id} ({rule}) has {edge_count} candidate edges but declares domain size {domsize}"
            );
            clean = false;
        }
        if edge_count == 0 {
            println!("INFO  rule {rule_id} ({rule}) has no candidate edges");
        }
    }

    // Invariant from the EdgeSet contract: (source, rule) determines target.
    use std::collections::HashMap;
    let mut seen: HashMap<(usize, usize), usize> = HashMap::new();
    for (edge_id, edge) in edge_set.iter() {
        if let Some(&prev_target) = seen.get(&(edge.source, edge.rule)) {
            if prev_target != edge.target {
                println!(
                    "ERROR edge {edge_id}: (source={}, rule={}) already maps to target {} but also claims target {}",
                    edge.source,
                    edge.rule,
                    prev_target,
                    edge.target
                );
                clean = false;
            }
        } else {
            seen.insert((edge.source, edge.rule), edge.target);
        }
    }

    if clean {
        println!("OK    no issues found");
    }
    Ok(clean)
}
