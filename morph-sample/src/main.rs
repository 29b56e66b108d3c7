//! `morph-sample`: loads a frozen (already rule-selected) candidate graph
//! plus a previously fitted cost model and runs a single sampler pass,
//! dumping statistics without any M-step or rule deletion (C10). Useful
//! for diagnosing a model that `morph-modsel` already converged.

use anyhow::{Context, Result};
use clap::Parser;
use morph_core::graph::EdgeSet;
use morph_core::lexicon::Lexicon;
use morph_core::model::rule_model::BernoulliRuleModel;
use morph_core::model::{GaussianFreqModel, ModelSuite, ZipfRootCostModel};
use morph_core::rules::RuleSet;
use morph_core::sampler::{MCMCSampler, SamplerMode};
use morph_core::{Config, MorphError};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "morph-sample", about = "Single-pass MCMC sample over a frozen model")]
struct Args {
    #[arg(long)]
    wordlist: PathBuf,

    /// The surviving rule set, e.g. `rules-modsel` from a prior run.
    #[arg(long)]
    rules: PathBuf,

    /// The surviving candidate graph, e.g. `graph-modsel` from a prior run.
    #[arg(long)]
    graph: PathBuf,

    /// Rule-application probabilities TSV from a prior run.
    #[arg(long)]
    rule_probs: PathBuf,

    /// Edge-frequency Gaussian parameters (bincode) from a prior run.
    #[arg(long)]
    freq_model: PathBuf,

    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "sample-output")]
    output_dir: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "morph_sample=info".into()))
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

    std::fs::create_dir_all(&args.output_dir)?;

    let lexicon =
        Lexicon::load_tsv(BufReader::new(File::open(&args.wordlist).context("opening wordlist")?))
            .map_err(anyhow::Error::from)?;
    let mut rule_set = RuleSet::load_tsv(BufReader::new(File::open(&args.rules).context("opening rules")?))
        .map_err(anyhow::Error::from)?;
    let edge_set = EdgeSet::load_tsv(
        BufReader::new(File::open(&args.graph).context("opening graph")?),
        &lexicon,
        &mut rule_set,
    )
    .map_err(anyhow::Error::from)?;

    let rule_model = BernoulliRuleModel::load_tsv(
        BufReader::new(File::open(&args.rule_probs).context("opening rule probabilities")?),
        &rule_set,
        config.model.bernoulli_alpha,
        config.model.bernoulli_beta,
    )
    .map_err(anyhow::Error::from)?;
    let freq_model = GaussianFreqModel::load_bincode(BufReader::new(
        File::open(&args.freq_model).context("opening edge-frequency model")?,
    ))
    .map_err(anyhow::Error::from)?;

    info!(words = lexicon.len(), rules = rule_set.len(), edges = edge_set.len(), "loaded frozen model");

    let model = ModelSuite::from_parts(ZipfRootCostModel, rule_model, freq_model);
    let cache = model.build_cache(&lexicon, &edge_set).map_err(anyhow::Error::from)?;
    let rule_cost = model.rule_model.rule_costs().to_vec();

    let mode = if config.general.supervised {
        let mut pairs: Vec<(usize, usize)> = edge_set.iter().map(|(_, e)| (e.source, e.target)).collect();
        pairs.sort_unstable();
        pairs.dedup();
        SamplerMode::Supervised { connected: pairs }
    } else {
        SamplerMode::Unsupervised
    };

    let mut sampler = MCMCSampler::new(
        &edge_set,
        &rule_cost,
        lexicon.len(),
        cache,
        mode,
        config.sample.to_stat_config(),
        config.general.seed,
        config.general.random_init,
    )
    .map_err(anyhow::Error::from)?;

    let mut iter_stats = BufWriter::new(File::create(args.output_dir.join("sample-iter-stats"))?);
    sampler
        .run_with_interval_callback(
            config.modsel.warmup_iterations,
            config.modsel.sampling_iterations,
            config.sample.iter_stat_interval,
            |iter, cost| {
                let _ = writeln!(iter_stats, "{iter}\t{cost}");
            },
        )
        .map_err(anyhow::Error::from)?;

    let marginals = sampler.stats.edge_marginals(edge_set.len());
    let mut edge_stats = BufWriter::new(File::create(args.output_dir.join("sample-edge-stats"))?);
    for (id, edge) in edge_set.iter() {
        writeln!(
            edge_stats,
            "{}\t{}\t{}\t{}",
            lexicon.get(edge.source),
            lexicon.get(edge.target),
            rule_set.get(edge.rule),
            marginals[id],
        )?;
    }

    let mut rule_stats = BufWriter::new(File::create(args.output_dir.join("sample-rule-stats"))?);
    for (id, rule) in rule_set.iter() {
        let freq = sampler.stats.rule_frequency.as_ref().map(|s| s.frequency(id)).unwrap_or(0.0);
        let contrib = sampler
            .stats
            .rule_expected_contribution
            .as_ref()
            .map(|s| s.contribution(id))
            .unwrap_or(0.0);
        writeln!(rule_stats, "{rule}\t{freq}\t{contrib}")?;
    }

    info!(
        acceptance_rate = sampler.stats.acceptance_rate.as_ref().map(|s| s.rate()).unwrap_or(0.0),
        final_cost = sampler.current_cost(),
        "sampling pass complete"
    );

    Ok(())
}
