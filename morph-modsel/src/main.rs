//! `morph-modsel`: the outer soft-EM + rule-selection driver (C9). Loads a
//! wordlist/rules/graph triple, alternates sampling and refitting for
//! `modsel.iterations` outer passes, and writes the surviving rule/edge
//! sets plus sampler statistics and model files after each pass.

use anyhow::{Context, Result};
use clap::Parser;
use morph_core::graph::EdgeSet;
use morph_core::lexicon::Lexicon;
use morph_core::model::{ModelSuite, ZipfRootCostModel};
use morph_core::modsel::{run_outer_iteration, ModselOptions, ModselState};
use morph_core::rules::RuleSet;
use morph_core::sampler::SamplerMode;
use morph_core::{Config, MorphError};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "morph-modsel", about = "Soft-EM model fitting and rule selection over a candidate-edge graph")]
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

    /// TOML configuration file; falls back to built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory output files are written into.
    #[arg(long, default_value = "modsel-output")]
    output_dir: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "morph_modsel=info".into()))
        .with_target(false)
        .compact()
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(morph_err) = err.downcast_ref::<MorphError>() {
                tracing::error!("{morph_err}");
                ExitCode::from(morph_err.exit_code() as u8)
            } else {
                tracing::error!("{err:#}");
                ExitCode::FAILURE
            }
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_toml(path).with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating output dir {}", args.output_dir.display()))?;

    let lexicon = Lexicon::load_tsv(BufReader::new(
        File::open(&args.wordlist).with_context(|| format!("opening wordlist {}", args.wordlist.display()))?,
    ))
    .map_err(anyhow::Error::from)?;
    let mut rule_set = RuleSet::load_tsv(BufReader::new(
        File::open(&args.rules).with_context(|| format!("opening rules {}", args.rules.display()))?,
    ))
    .map_err(anyhow::Error::from)?;
    let edge_set = EdgeSet::load_tsv(
        BufReader::new(File::open(&args.graph).with_context(|| format!("opening graph {}", args.graph.display()))?),
        &lexicon,
        &mut rule_set,
    )
    .map_err(anyhow::Error::from)?;

    info!(
        words = lexicon.len(),
        rules = rule_set.len(),
        edges = edge_set.len(),
        "loaded lexicon, rule set, and candidate graph"
    );

    let mut state = ModselState { lexicon, rule_set, edge_set };
    let mut model = ModelSuite::new(
        ZipfRootCostModel,
        &state.rule_set,
        config.model.bernoulli_alpha,
        config.model.bernoulli_beta,
        config.model.gaussian_variance_floor,
    );

    let mode = if config.general.supervised {
        // Supervised mode's connected-pair set is every (source, target)
        // pair with at least one candidate edge.
        let mut pairs: Vec<(usize, usize)> = state
            .edge_set
            .iter()
            .map(|(_, e)| (e.source, e.target))
            .collect();
        pairs.sort_unstable();
        pairs.dedup();
        SamplerMode::Supervised { connected: pairs }
    } else {
        SamplerMode::Unsupervised
    };

    let opts = ModselOptions {
        warmup_iterations: config.modsel.warmup_iterations,
        sampling_iterations: config.modsel.sampling_iterations,
        seed: config.general.seed,
        random_init: config.general.random_init,
    };
    let stat_config = config.sample.to_stat_config();

    for outer_iter in 0..config.modsel.iterations {
        let report = run_outer_iteration(&mut state, &mut model, mode.clone(), &opts, stat_config)
            .map_err(anyhow::Error::from)?;
        info!(
            outer_iter,
            acceptance_rate = report.acceptance_rate,
            expected_cost = report.expected_cost,
            deleted_rules = report.deleted_rule_count,
            remaining_rules = state.rule_set.len(),
            remaining_edges = state.edge_set.len(),
            "outer iteration complete"
        );

        // Checkpoint after every outer iteration so a crash can resume by
        // re-reading these two files (sec. 7, recovery policy).
        write_rules_and_graph(&args.output_dir, &state)?;
        write_stat_files(&args.output_dir, &state, &report)?;
        model
            .rule_model
            .save_tsv(
                BufWriter::new(File::create(args.output_dir.join("rule-probs.tsv"))?),
                &state.rule_set,
            )
            .map_err(anyhow::Error::from)?;
        model
            .freq_model
            .save_bincode(BufWriter::new(File::create(
                args.output_dir.join("edge-freq-model.bincode"),
            )?))
            .map_err(anyhow::Error::from)?;
    }

    Ok(())
}

fn write_rules_and_graph(output_dir: &std::path::Path, state: &ModselState) -> Result<()> {
    state
        .rule_set
        .save_tsv(BufWriter::new(File::create(output_dir.join("rules-modsel"))?))
        .map_err(anyhow::Error::from)?;
    state
        .edge_set
        .save_tsv(
            BufWriter::new(File::create(output_dir.join("graph-modsel"))?),
            &state.lexicon,
            &state.rule_set,
        )
        .map_err(anyhow::Error::from)?;
    Ok(())
}

fn write_stat_files(
    output_dir: &std::path::Path,
    state: &ModselState,
    report: &morph_core::modsel::OuterIterationReport,
) -> Result<()> {
    use std::io::Write;

    let mut edge_stats = BufWriter::new(File::create(output_dir.join("sample-edge-stats"))?);
    for (id, edge) in state.edge_set.iter() {
        writeln!(
            edge_stats,
            "{}\t{}\t{}\t{}",
            state.lexicon.get(edge.source),
            state.lexicon.get(edge.target),
            state.rule_set.get(edge.rule),
            report.edge_marginals.get(id).copied().unwrap_or(0.0),
        )?;
    }

    let mut rule_stats = BufWriter::new(File::create(output_dir.join("sample-rule-stats"))?);
    for (id, rule) in state.rule_set.iter() {
        writeln!(
            rule_stats,
            "{}\t{}\t{}",
            rule,
            report.rule_frequencies.get(id).copied().unwrap_or(0.0),
            report.rule_contributions.get(id).copied().unwrap_or(0.0),
        )?;
    }

    let mut iter_stats = BufWriter::new(File::create(output_dir.join("sample-iter-stats"))?);
    writeln!(iter_stats, "{}\t{}", report.acceptance_rate, report.expected_cost)?;

    Ok(())
}
