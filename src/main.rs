use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trend_event_lag::config::COARSE_PROFILE;
use trend_event_lag::matching::SeriesOutcome;
use trend_event_lag::report::{self, ReportInput};
use trend_event_lag::{analyze, ingest, Analysis, AnalysisOptions, GroupBy, Settings};

#[derive(Parser)]
#[command(name = "trend-event-lag")]
#[command(about = "Match keyword trend peaks to tagged records and forecast lags", long_about = None)]
struct Cli {
    #[command(flatten)]
    inputs: Inputs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Inputs {
    /// Glob for keyword count files
    #[arg(long, global = true, default_value = "data/keyword/*.csv")]
    keywords: String,
    /// Glob for record files
    #[arg(long, global = true, default_value = "data/school_record/*.csv")]
    records: String,
    /// TOML settings layered over the built-in defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true, default_value = COARSE_PROFILE)]
    profile: String,
    /// Keyword batch label (file stem) to skip; repeatable
    #[arg(long, global = true)]
    superseded: Vec<String>,
    #[arg(long, global = true)]
    category: Option<String>,
    #[arg(long, global = true)]
    entity: Option<String>,
    #[arg(long, global = true, value_enum, default_value_t = GroupArg::Department)]
    group_by: GroupArg,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum GroupArg {
    Department,
    Keyword,
    Category,
    Entity,
}

impl From<GroupArg> for GroupBy {
    fn from(arg: GroupArg) -> Self {
        match arg {
            GroupArg::Department => GroupBy::Department,
            GroupArg::Keyword => GroupBy::Keyword,
            GroupArg::Category => GroupBy::Category,
            GroupArg::Entity => GroupBy::Entity,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List aggregated keyword series with their peaks
    Series,
    /// Show records matched to each series
    Match,
    /// Summarize peak-to-record lag per grouping key
    Lags,
    /// Project record dates for tagged series without activity
    Forecast,
    /// Write a markdown report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_tracing(json_logs: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let inputs = &cli.inputs;
    init_tracing(inputs.json_logs);

    let settings = match &inputs.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    let profile = *settings.profile(&inputs.profile)?;

    let batches = ingest::load_signal_batches(&inputs.keywords, &inputs.superseded)?;
    let event_rows = ingest::load_event_rows(&inputs.records)?;

    let options = AnalysisOptions {
        group_by: inputs.group_by.into(),
        category: inputs.category.clone(),
        entity: inputs.entity.clone(),
        ..AnalysisOptions::default()
    };
    let analysis = analyze(&settings, &profile, &batches, &event_rows, &options)?;
    info!(profile = %inputs.profile, series = analysis.matches.series.len(), "analysis complete");

    match cli.command {
        Commands::Series => print_series(&analysis, inputs.json)?,
        Commands::Match => print_matches(&analysis, inputs.json)?,
        Commands::Lags => print_lags(&analysis, options.group_by, inputs.json)?,
        Commands::Forecast => print_forecasts(&analysis, inputs.json)?,
        Commands::Report { out } => {
            let report = report::build_report(&ReportInput {
                profile_name: &inputs.profile,
                profile: &analysis.profile,
                group_by: options.group_by,
                signals: &analysis.signals.report,
                events: &analysis.events.report,
                matches: &analysis.matches,
                stats: &analysis.stats,
                forecasts: &analysis.forecasts,
            });
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write report to {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn print_series(analysis: &Analysis, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(&analysis.signals.series)?);
        return Ok(());
    }
    for series in &analysis.signals.series {
        println!(
            "- {} peak {} ({} mentions) across {} points",
            series.key(),
            series.peak_date(),
            series.peak_count(),
            series.points().len()
        );
    }
    Ok(())
}

fn print_matches(analysis: &Analysis, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(&analysis.matches)?);
        return Ok(());
    }
    for entry in &analysis.matches.series {
        match &entry.outcome {
            SeriesOutcome::Matched { pairs } => {
                println!("{} (peak {}): {} matched", entry.key, entry.peak_date, pairs.len());
                for pair in pairs {
                    println!(
                        "  - [{}] {} on {} (lag {:.2} years)",
                        pair.record.entity_id, pair.record.activity, pair.record.date, pair.lag_years
                    );
                }
            }
            SeriesOutcome::NoActivity => {
                println!("{} (peak {}): no activity matches tag and year window", entry.key, entry.peak_date);
            }
            SeriesOutcome::Unmatchable => {
                println!("{} (peak {}): no tag configured, not matched", entry.key, entry.peak_date);
            }
        }
    }
    Ok(())
}

fn print_lags(analysis: &Analysis, group_by: GroupBy, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(&analysis.stats)?);
        return Ok(());
    }
    if analysis.stats.is_empty() {
        println!("No matched pairs to summarize.");
        return Ok(());
    }
    println!("Lag by {}:", group_by.as_str());
    for stat in &analysis.stats {
        println!("{}", report::lag_line(stat));
    }
    Ok(())
}

fn print_forecasts(analysis: &Analysis, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        let values: Vec<_> = analysis
            .forecasts
            .iter()
            .map(|pending| match &pending.outcome {
                Ok(forecast) => json!({ "status": "projected", "forecast": forecast }),
                Err(err) => json!({
                    "status": "refused",
                    "key": pending.key,
                    "grouping_key": pending.grouping_key,
                    "reason": err.to_string(),
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
        return Ok(());
    }
    if analysis.forecasts.is_empty() {
        println!("No tagged series are waiting on activity.");
        return Ok(());
    }
    for pending in &analysis.forecasts {
        match &pending.outcome {
            Ok(forecast) => println!(
                "- {}: expected around {} (mean lag {:.2} years, {} samples)",
                pending.key, forecast.projected_date, forecast.mean_lag, forecast.sample_count
            ),
            Err(err) => println!("- {}: no forecast, {}", pending.key, err),
        }
    }
    Ok(())
}
