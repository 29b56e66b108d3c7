//! `inspect-graph`: look up a single word's candidate edges in a
//! `wordlist`/`rules`/`graph` triple without running the sampler.
//!
//! Grounded on the teacher's `show_lexicon_entry` (look up one key in an
//! on-disk index and print what is attached to it).

use anyhow::{Context, Result};
use clap::Parser;
use morph_core::graph::EdgeSet;
use morph_core::lexicon::Lexicon;
use morph_core::rules::RuleSet;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "inspect-graph", about = "Look up a word's candidate edges in a morphology graph")]
struct Args {
    /// Wordlist TSV: word, frequency, [feature vector].
    #[arg(long)]
    wordlist: PathBuf,

    /// Rules TSV: rule string, domain size.
    #[arg(long)]
    rules: PathBuf,

    /// Candidate graph TSV: source word, target word, rule string.
    #[arg(long)]
    graph: PathBuf,

    /// Word to look up (exact string form, e.g. `run<V>`).
    word: String,
}

fn main() -> Result<()> {
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

    let Some(id) = lexicon.get_id_by_string(&args.word) else {
        println!("word '{}' not found in wordlist ({} entries)", args.word, lexicon.len());
        return Ok(());
    };
    let word = lexicon.get(id);
    println!("word '{}' -> id {} (freq={}, logfreq={:.4})", word, id, word.freq, word.logfreq());

    let mut as_source = 0;
    let mut as_target = 0;
    println!("edges as source:");
    for (edge_id, edge) in edge_set.iter() {
        if edge.source == id {
            as_source += 1;
            println!(
                "  [{edge_id}] {} -> {} via {}",
                lexicon.get(edge.source),
                lexicon.get(edge.target),
                rule_set.get(edge.rule)
            );
        }
    }
    println!("edges as target:");
    for (edge_id, edge) in edge_set.iter() {
        if edge.target == id {
            as_target += 1;
            println!(
                "  [{edge_id}] {} -> {} via {}",
                lexicon.get(edge.source),
                lexicon.get(edge.target),
                rule_set.get(edge.rule)
            );
        }
    }
    println!("total: {as_source} outgoing, {as_target} incoming");

    Ok(())
}
