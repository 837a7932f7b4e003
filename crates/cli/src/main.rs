//! idealfit CLI: select best-fit ideal functions and map test points onto them.

mod report;

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use idealfit_core::{AssignmentPolicy, Config, Dataset, StoreConfig};
use idealfit_ingestion::{load_dataset, load_observations};
use idealfit_matching::{ClassificationStats, ObservationClassifier, SeriesMatcher};
use idealfit_store::{DatasetTable, ResultStore};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Least-squares ideal function selection and test point mapping", long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Select the best-fitting ideal function for every training series
    Fit(FitArgs),
    /// Fit, classify test points, and store the outcome
    Run(RunArgs),
    /// Report on a run stored in the database
    Show(ShowArgs),
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Training CSV (X plus one column per series)
    #[arg(long, value_hint = ValueHint::FilePath)]
    training: PathBuf,

    /// Ideal-function CSV (X plus one column per candidate)
    #[arg(long, value_hint = ValueHint::FilePath)]
    ideal: PathBuf,
}

#[derive(Args, Debug)]
struct FitArgs {
    #[command(flatten)]
    inputs: InputArgs,

    /// Print the fit table as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    inputs: InputArgs,

    /// Test CSV with X and Y columns
    #[arg(long, value_hint = ValueHint::FilePath)]
    test: PathBuf,

    /// JSON configuration file
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// SQLite database (overrides the configuration)
    #[arg(long, value_hint = ValueHint::FilePath)]
    database: Option<PathBuf>,

    /// Tolerance multiplier applied to each fit's maximum deviation
    #[arg(long)]
    tolerance: Option<f64>,

    /// Choice among several eligible candidates
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Write the result table to this CSV file
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// Skip writing to the database
    #[arg(long)]
    no_store: bool,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// SQLite database written by `run`
    #[arg(long, value_hint = ValueHint::FilePath)]
    database: Option<PathBuf>,

    /// Run id (defaults to the most recent run)
    #[arg(long)]
    run: Option<i64>,

    /// List every stored run instead
    #[arg(long, conflicts_with = "run")]
    list: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    /// Smallest deviation wins
    Smallest,
    /// First eligible fit in reference order wins
    First,
}

impl From<PolicyArg> for AssignmentPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Smallest => AssignmentPolicy::SmallestDeviation,
            PolicyArg::First => AssignmentPolicy::FirstEligible,
        }
    }
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("invalid log level '{level}'"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn load_inputs(inputs: &InputArgs) -> Result<(Dataset, Dataset)> {
    let training = load_dataset(&inputs.training)
        .with_context(|| format!("loading training data from {}", inputs.training.display()))?;
    let ideal = load_dataset(&inputs.ideal)
        .with_context(|| format!("loading ideal functions from {}", inputs.ideal.display()))?;
    Ok((training, ideal))
}

/// Merge the configuration file with command-line overrides.
fn resolve_config(args: &RunArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(multiplier) = args.tolerance {
        config.tolerance.multiplier = multiplier;
    }
    if let Some(policy) = args.policy {
        config.tolerance.policy = policy.into();
    }
    if let Some(database) = &args.database {
        config.store.database_path = database.display().to_string();
    }
    config.validate()?;
    Ok(config)
}

fn fit(args: FitArgs) -> Result<()> {
    let (training, ideal) = load_inputs(&args.inputs)?;
    let fit_table = SeriesMatcher::new()
        .select_best_candidates(&training, &ideal)
        .context("selecting best-fit ideal functions")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&fit_table)?);
    } else {
        print!("{}", report::fit_table_text(&fit_table));
    }
    Ok(())
}

fn run(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let (training, ideal) = load_inputs(&args.inputs)?;

    let fit_table = SeriesMatcher::new()
        .select_best_candidates(&training, &ideal)
        .context("selecting best-fit ideal functions")?;
    print!("{}", report::fit_table_text(&fit_table));

    let observations = load_observations(&args.test)
        .with_context(|| format!("loading test data from {}", args.test.display()))?;
    let records = ObservationClassifier::new(config.tolerance)
        .classify(&observations, &fit_table, &ideal)
        .context("classifying test points")?;

    let stats = ClassificationStats::from_records(&records);
    println!();
    print!("{}", report::summary_text(&stats));
    if stats.total > 0 && stats.assigned == 0 {
        warn!("no test point is within tolerance of any selected ideal function");
    }

    if let Some(path) = &args.output {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        report::write_results_csv(file, &records)
            .with_context(|| format!("writing results to {}", path.display()))?;
        info!(path = %path.display(), "wrote result table");
    }

    if !args.no_store {
        let path = &config.store.database_path;
        let mut store = ResultStore::open(path).with_context(|| format!("opening database {path}"))?;
        let summary = store
            .save_run(&training, &ideal, &fit_table, &records, &config.tolerance)
            .with_context(|| format!("saving run to {path}"))?;
        println!("\nSaved run {} to {path}", summary.id);
    }

    Ok(())
}

/// Render a stored run: header, dataset sizes, fit table and mapping summary.
///
/// The dataset and fit tables hold the most recent run only, so they are
/// included only when `run_id` names that run.
fn stored_run_report(store: &ResultStore, run_id: Option<i64>) -> Result<String> {
    let latest = store.latest_run()?.context("the database holds no runs")?;
    let run = match run_id {
        Some(id) if id != latest.id => store.run(id)?.with_context(|| format!("no run with id {id}"))?,
        _ => latest.clone(),
    };
    debug!(run = run.id, latest = latest.id, "reporting stored run");

    let mut out = report::run_text(&run);
    if run.id == latest.id {
        let training = store.load_dataset(DatasetTable::Training)?;
        let ideal = store.load_dataset(DatasetTable::Ideal)?;
        out.push_str(&format!(
            "Training data: {} rows, {} series\nIdeal functions: {} rows, {} series\n\n",
            training.point_count(),
            training.series_count(),
            ideal.point_count(),
            ideal.series_count()
        ));
        out.push_str(&report::fit_table_text(&store.load_fit_table()?));
    }

    let records = store.load_results(run.id)?;
    let stats = ClassificationStats::from_records(&records);
    out.push('\n');
    out.push_str(&report::summary_text(&stats));
    out.push('\n');
    out.push_str(&report::distribution_text(&stats));
    Ok(out)
}

fn show(args: ShowArgs) -> Result<()> {
    let path = args
        .database
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| StoreConfig::default().database_path);
    if !std::path::Path::new(&path).exists() {
        anyhow::bail!("database {path} does not exist");
    }
    let store = ResultStore::open(&path).with_context(|| format!("opening database {path}"))?;

    if args.list {
        print!("{}", report::runs_text(&store.runs()?));
    } else {
        print!("{}", stored_run_report(&store, args.run)?);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    match cli.command {
        Command::Fit(args) => fit(args),
        Command::Run(args) => run(args),
        Command::Show(args) => show(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_overrides() {
        let cli = Cli::try_parse_from([
            "idealfit",
            "run",
            "--training",
            "train.csv",
            "--ideal",
            "ideal.csv",
            "--test",
            "test.csv",
            "--tolerance",
            "2",
            "--policy",
            "first",
            "--database",
            "runs.db",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.tolerance.multiplier, 2.0);
        assert_eq!(config.tolerance.policy, AssignmentPolicy::FirstEligible);
        assert_eq!(config.store.database_path, "runs.db");
    }

    #[test]
    fn test_pipeline_end_to_end() {
        use idealfit_ingestion::{read_dataset, read_observations};

        let training = read_dataset("x,y1,y2\n1,1.1,-1\n2,2.1,-2\n3,2.9,-3\n".as_bytes()).unwrap();
        let ideal = read_dataset("x,y1,y2,y3\n1,1,-1,5\n2,2,-2,5\n3,3,-3,5\n".as_bytes()).unwrap();
        let observations = read_observations("x,y\n1,1.05\n2,-2\n3,40\n2.5,2.5\n".as_bytes()).unwrap();

        let fit_table = SeriesMatcher::new().select_best_candidates(&training, &ideal).unwrap();
        assert_eq!(fit_table.get("Y1").unwrap().candidate, "Y1");
        assert_eq!(fit_table.get("Y2").unwrap().candidate, "Y2");

        let tolerance = Config::default().tolerance;
        let records = ObservationClassifier::new(tolerance)
            .classify(&observations, &fit_table, &ideal)
            .unwrap();
        let assigned: Vec<Option<&str>> = records.iter().map(|r| r.candidate()).collect();
        assert_eq!(assigned, vec![Some("Y1"), Some("Y2"), None, None]);

        let mut store = ResultStore::open_in_memory().unwrap();
        store.save_fit_table(&fit_table).unwrap();
        let summary = store.save_results(&records, &tolerance).unwrap();
        assert_eq!(summary.assigned, 2);
        assert_eq!(store.load_results(summary.id).unwrap(), records);
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let cli = Cli::try_parse_from([
            "idealfit", "run", "--training", "a.csv", "--ideal", "b.csv", "--test", "c.csv",
            "--tolerance=-1",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert!(resolve_config(&args).is_err());
    }

    fn stored_pipeline() -> ResultStore {
        let x = vec![0.0, 1.0, 2.0];
        let training = Dataset::new(x.clone(), vec![("Y1", vec![0.1, 1.1, 2.1])]).unwrap();
        let ideal = Dataset::new(x, vec![("Y1", vec![0.0, 1.0, 2.0]), ("Y2", vec![5.0, 5.0, 5.0])]).unwrap();
        let fit_table = SeriesMatcher::new().select_best_candidates(&training, &ideal).unwrap();
        let tolerance = Config::default().tolerance;
        let observations = [
            idealfit_core::Observation::new(0.0, 0.05),
            idealfit_core::Observation::new(1.0, 1.0),
            idealfit_core::Observation::new(2.0, 9.0),
            idealfit_core::Observation::new(2.0, 2.1),
        ];
        let records = ObservationClassifier::new(tolerance)
            .classify(&observations, &fit_table, &ideal)
            .unwrap();

        let mut store = ResultStore::open_in_memory().unwrap();
        store.save_run(&training, &ideal, &fit_table, &records, &tolerance).unwrap();
        store
    }

    #[test]
    fn test_show_latest_run() {
        let store = stored_pipeline();
        let text = stored_run_report(&store, None).unwrap();

        assert!(text.contains("=== Run 1 ==="));
        assert!(text.contains("Training data: 3 rows, 1 series"));
        assert!(text.contains("Ideal functions: 3 rows, 2 series"));
        assert!(text.contains("Y1 -> Y1"));
        assert!(text.contains("Total test points: 4"));
        assert!(text.contains("Mapped points: 3 (75.0%)"));
        assert!(text.contains("Unmapped points: 1 (25.0%)"));
        assert!(text.contains("=== Mapping Distribution by Ideal Function ===\nY1: 3\n"));
    }

    #[test]
    fn test_show_older_run_omits_current_tables() {
        let mut store = stored_pipeline();
        let later = vec![idealfit_core::ClassificationRecord::unassigned(
            idealfit_core::Observation::new(1.0, 40.0),
        )];
        let second = store.save_results(&later, &Config::default().tolerance).unwrap();
        assert_eq!(second.id, 2);

        let older = stored_run_report(&store, Some(1)).unwrap();
        assert!(older.contains("=== Run 1 ==="));
        assert!(!older.contains("Best Fitting"));
        assert!(older.contains("Total test points: 4"));

        let latest = stored_run_report(&store, Some(2)).unwrap();
        assert!(latest.contains("Best Fitting"));
        assert!(latest.contains("Unmapped points: 1 (100.0%)"));

        assert!(stored_run_report(&store, Some(7)).is_err());
    }

    #[test]
    fn test_show_empty_database() {
        let store = ResultStore::open_in_memory().unwrap();
        assert!(stored_run_report(&store, None).is_err());
    }

    #[test]
    fn test_show_list_conflicts_with_run() {
        let cli = Cli::try_parse_from(["idealfit", "show", "--list", "--run", "3"]);
        assert!(cli.is_err());
        let cli = Cli::try_parse_from(["idealfit", "show", "--database", "runs.db", "--run", "3"]).unwrap();
        let Command::Show(args) = cli.command else {
            panic!("expected show command");
        };
        assert_eq!(args.run, Some(3));
    }
}
