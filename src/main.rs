use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::collections::BTreeSet;
use std::path::PathBuf;

use edudash::config::{DashboardConfig, JoinPolicy};
use edudash::data::parse_date;
use edudash::dataset::{load_or_sample, sample_dataset, Dataset};
use edudash::filter::{FilterOptions, FilterSpec};
use edudash::logging::{self, obj, v_str, Domain};
use edudash::render;
use edudash::views::Dashboard;

/// Enrollment and assessment analytics over a fact-constellation dataset
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    #[command(flatten)]
    source: SourceArgs,
    #[command(flatten)]
    filter: FilterArgs,
    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text, global = true)]
    format: Format,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Enrollment KPIs, trends, revenue and instructor leaderboard
    Enrollment,
    /// Assessment scores, pass rates and segment success rates
    Performance,
    /// Cross-fact correlation between enrollment progress and scores
    Correlation,
    /// All three views
    All,
    /// Values available for each filter
    Options,
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// Directory holding the eight CSV files
    #[arg(long, env = "EDUDASH_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,
    /// Skip the CSV files and use generated sample data
    #[arg(long, global = true)]
    sample: bool,
    /// Seed for generated sample data
    #[arg(long, global = true)]
    seed: Option<u64>,
    /// Fail the join on unresolved foreign keys instead of dropping rows
    #[arg(long, global = true)]
    strict: bool,
    /// Pass threshold in score percent
    #[arg(long, global = true)]
    pass_threshold: Option<f64>,
    /// Rows shown in ranked lists
    #[arg(long, global = true)]
    top: Option<usize>,
}

#[derive(Debug, Args)]
struct FilterArgs {
    /// First day of the date window (dd/mm/yyyy or yyyy-mm-dd)
    #[arg(long, global = true)]
    from: Option<String>,
    /// Last day of the date window (dd/mm/yyyy or yyyy-mm-dd)
    #[arg(long, global = true)]
    to: Option<String>,
    #[arg(long = "category", global = true)]
    categories: Vec<String>,
    #[arg(long = "membership", global = true)]
    memberships: Vec<String>,
    #[arg(long = "level", global = true)]
    levels: Vec<String>,
    #[arg(long = "status", global = true)]
    statuses: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn build_config(args: &SourceArgs) -> DashboardConfig {
    let mut cfg = DashboardConfig::from_env();
    if let Some(dir) = &args.data_dir {
        cfg.data_dir = dir.clone();
    }
    if let Some(seed) = args.seed {
        cfg.sample_seed = seed;
    }
    if args.strict {
        cfg.join_policy = JoinPolicy::Strict;
    }
    if let Some(th) = args.pass_threshold {
        cfg.pass_threshold = th;
    }
    if let Some(top) = args.top {
        cfg.top_n = top.max(1);
    }
    cfg
}

fn build_filter(args: &FilterArgs, opts: &FilterOptions) -> Result<FilterSpec> {
    let parse = |raw: &str| parse_date(raw).ok_or_else(|| anyhow!("invalid date '{}'", raw));
    let date_range = match (&args.from, &args.to) {
        (None, None) => None,
        (from, to) => {
            let from = match from {
                Some(raw) => parse(raw)?,
                None => opts.min_date.ok_or_else(|| anyhow!("--to given but dataset has no dates"))?,
            };
            let to = match to {
                Some(raw) => parse(raw)?,
                None => opts.max_date.ok_or_else(|| anyhow!("--from given but dataset has no dates"))?,
            };
            Some((from, to))
        }
    };
    let set = |v: &[String]| v.iter().map(|s| s.trim().to_string()).collect::<BTreeSet<_>>();
    Ok(FilterSpec {
        date_range,
        categories: set(&args.categories),
        memberships: set(&args.memberships),
        levels: set(&args.levels),
        statuses: set(&args.statuses),
    })
}

/// JSON body for a view command. Every payload names its data source so a
/// fallback to sample data is visible in machine output too.
fn json_payload(command: &Command, dataset: &Dataset, dash: &Dashboard) -> Result<serde_json::Value> {
    let view = match command {
        Command::Enrollment => ("enrollment", serde_json::to_value(&dash.enrollment)?),
        Command::Performance => ("performance", serde_json::to_value(&dash.performance)?),
        Command::Correlation => ("correlation", serde_json::to_value(&dash.correlation)?),
        _ => ("dashboard", serde_json::to_value(dash)?),
    };
    let mut payload = serde_json::Map::new();
    payload.insert("source".to_string(), serde_json::to_value(&dataset.source)?);
    payload.insert("join".to_string(), serde_json::to_value(&dataset.report)?);
    payload.insert(view.0.to_string(), view.1);
    Ok(serde_json::Value::Object(payload))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = build_config(&cli.source);

    let dataset = if cli.source.sample {
        sample_dataset(&cfg, "requested with --sample")?
    } else {
        load_or_sample(&cfg)?
    };
    let options = FilterOptions::discover(&dataset.tables);
    let spec = build_filter(&cli.filter, &options)?;

    logging::info(
        Domain::System,
        "run",
        obj(&[
            ("command", v_str(&format!("{:?}", cli.command).to_lowercase())),
            ("filter", v_str(&spec.fingerprint())),
            ("sample", serde_json::Value::Bool(dataset.source.is_sample())),
        ]),
    );

    if let Command::Options = cli.command {
        match cli.format {
            Format::Json => println!("{}", serde_json::to_string_pretty(&options)?),
            Format::Text => print!("{}", render::render_options(&options)),
        }
        return Ok(());
    }

    let dash = Dashboard::build(&dataset.tables, &spec, &cfg);
    match cli.format {
        Format::Json => {
            let payload = json_payload(&cli.command, &dataset, &dash)?;
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        Format::Text => {
            print!("{}", render::render_source(&dataset));
            let body = match cli.command {
                Command::Enrollment => render::render_enrollment(&dash.enrollment),
                Command::Performance => render::render_performance(&dash.performance),
                Command::Correlation => render::render_correlation(&dash.correlation, cfg.top_n),
                _ => render::render_dashboard(&dash, cfg.top_n),
            };
            print!("{}", body);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn args(from: Option<&str>, to: Option<&str>) -> FilterArgs {
        FilterArgs {
            from: from.map(str::to_string),
            to: to.map(str::to_string),
            categories: vec![" Design ".to_string()],
            memberships: vec![],
            levels: vec![],
            statuses: vec![],
        }
    }

    fn options() -> FilterOptions {
        FilterOptions {
            min_date: Some(d(2024, 1, 1)),
            max_date: Some(d(2024, 12, 31)),
            ..FilterOptions::default()
        }
    }

    #[test]
    fn test_build_filter_without_dates() {
        let spec = build_filter(&args(None, None), &options()).unwrap();
        assert_eq!(spec.date_range, None);
        assert!(spec.categories.contains("Design"));
    }

    #[test]
    fn test_build_filter_open_end_uses_dataset_max() {
        let spec = build_filter(&args(Some("01/06/2024"), None), &options()).unwrap();
        assert_eq!(spec.date_range, Some((d(2024, 6, 1), d(2024, 12, 31))));
    }

    #[test]
    fn test_build_filter_open_start_uses_dataset_min() {
        let spec = build_filter(&args(None, Some("2024-03-15")), &options()).unwrap();
        assert_eq!(spec.date_range, Some((d(2024, 1, 1), d(2024, 3, 15))));
    }

    #[test]
    fn test_build_filter_rejects_bad_date_and_empty_dataset() {
        assert!(build_filter(&args(Some("15/03/24"), None), &options()).is_err());
        assert!(build_filter(&args(Some("01/06/2024"), None), &FilterOptions::default()).is_err());
    }

    #[test]
    fn test_json_payload_names_source_for_every_view() {
        let cfg = DashboardConfig::from_env();
        let dataset = sample_dataset(&cfg, "no files").unwrap();
        let dash = Dashboard::build(&dataset.tables, &FilterSpec::default(), &cfg);
        for (command, key) in [
            (Command::Enrollment, "enrollment"),
            (Command::Performance, "performance"),
            (Command::Correlation, "correlation"),
            (Command::All, "dashboard"),
        ] {
            let payload = json_payload(&command, &dataset, &dash).unwrap();
            assert_eq!(payload["source"]["kind"], "sample");
            assert_eq!(payload["source"]["reason"], "no files");
            assert!(payload.get(key).is_some());
        }
    }
}
