use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use shardstash::{
    check_connectivity, check_valid_field_names, check_valid_output_file_name, parse_query,
    Algorithm, DirGroupStore, Error, Namespace, OutputOrder, RunConfig, Runner,
};

fn parse_algorithm(value: &str) -> Result<Algorithm, String> {
    value.parse::<Algorithm>().map_err(|e| e.to_string())
}

fn parse_positive(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|err| format!("invalid number '{value}': {err}"))?;
    if parsed == 0 {
        return Err("value must be greater than zero".into());
    }
    Ok(parsed)
}

#[derive(Parser)]
#[command(
    name = "shardstash",
    version,
    about = "Partition a CSV file by key columns into compressed groups, and reassemble them"
)]
struct Cli {
    /// Log debug messages (or set RUST_LOG).
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split a CSV file into groups and store each one compressed.
    Compress(CompressArgs),
    /// Fetch the groups matching a partial key and write their rows to one CSV file.
    Decompress(DecompressArgs),
}

#[derive(Args)]
struct CommonArgs {
    /// Compression algorithm: gzip, bzip2, xz or zip.
    #[arg(short = 'a', long = "algorithm", value_name = "ALG", value_parser = parse_algorithm)]
    algorithm: Algorithm,
    /// Database name in the store.
    #[arg(short = 'd', long = "database", value_name = "DB")]
    database: Option<String>,
    /// Collection name in the store.
    #[arg(short = 'c', long = "collection", value_name = "COLL")]
    collection: Option<String>,
    /// Store root directory (overrides the configuration file).
    #[arg(long, value_name = "PATH")]
    endpoint: Option<PathBuf>,
    /// JSON run configuration.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Worker threads (default: CPU count + 1).
    #[arg(long, value_name = "N", value_parser = parse_positive)]
    workers: Option<usize>,
    /// Save the run report as JSON.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

#[derive(Args)]
struct CompressArgs {
    /// CSV file with a header row.
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    input: PathBuf,
    /// Key columns, each wrapped in double quotes: -f '"region"' '"year"'.
    #[arg(short = 'f', long = "fields", value_name = "NAME", num_args = 1.., required = true)]
    fields: Vec<String>,
    /// Flush a group once it holds this many rows.
    #[arg(long = "memory-cap", value_name = "ROWS", value_parser = parse_positive)]
    memory_cap: Option<usize>,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct DecompressArgs {
    /// Output file name wrapped in double quotes: -o '"out.csv"'.
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: String,
    /// Query terms: -f region=east year=2020.
    #[arg(short = 'f', long = "fields", value_name = "NAME=VALUE", num_args = 1.., required = true)]
    fields: Vec<String>,
    /// Write groups in query-result order instead of completion order.
    #[arg(long)]
    ordered: bool,
    /// Do not write the source header row.
    #[arg(long = "no-header")]
    no_header: bool,
    #[command(flatten)]
    common: CommonArgs,
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        LevelFilter::Debug
    } else if cli.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.parse_default_env();
    builder.format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()));
    let _ = builder.try_init();
}

/// Defaults, then the configuration file, then command-line flags.
fn load_config(common: &CommonArgs) -> Result<RunConfig> {
    let mut config = match &common.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from '{}'", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(workers) = common.workers {
        config.workers = Some(workers);
    }
    if let Some(endpoint) = &common.endpoint {
        config.store.endpoint = endpoint.display().to_string();
    }
    if let Some(database) = &common.database {
        config.store.database = Some(database.clone());
    }
    if let Some(collection) = &common.collection {
        config.store.collection = Some(collection.clone());
    }
    Ok(config)
}

fn namespace(config: &RunConfig) -> Result<Namespace> {
    let database = config
        .store
        .database
        .as_deref()
        .context("no database name given; pass -d or set store.database")?;
    let collection = config
        .store
        .collection
        .as_deref()
        .context("no collection name given; pass -c or set store.collection")?;
    Namespace::new(database, collection).context("invalid store namespace")
}

fn run_compress(args: &CompressArgs) -> Result<()> {
    let mut config = load_config(&args.common)?;
    if let Some(cap) = args.memory_cap {
        config.memory_cap = Some(cap);
    }
    config.validate().context("invalid configuration")?;

    if !args.input.is_file() {
        return Err(Error::InputNotFound(args.input.clone()).into());
    }
    let keys = check_valid_field_names(&args.fields).context("invalid key column")?;
    let namespace = namespace(&config)?;
    let store = DirGroupStore::create(&config.store.endpoint, namespace).with_context(|| {
        format!("failed to prepare store root '{}'", config.store.endpoint)
    })?;
    check_connectivity(&store, config.store.connect_timeout())?;

    log::info!("entering compress mode");
    let runner = Runner::from_config(args.common.algorithm, &config);
    let report = runner
        .compress_file(&args.input, &keys, &store)
        .with_context(|| format!("failed to compress '{}'", args.input.display()))?;

    report.print();
    if let Some(path) = &args.common.report {
        report
            .save_to_file(path)
            .with_context(|| format!("failed to save report to '{}'", path.display()))?;
    }
    Ok(())
}

fn run_decompress(args: &DecompressArgs) -> Result<()> {
    let mut config = load_config(&args.common)?;
    if args.ordered {
        config.output_order = OutputOrder::Submission;
    }
    if args.no_header {
        config.write_header = false;
    }
    config.validate().context("invalid configuration")?;

    let output = check_valid_output_file_name(&args.output).context("invalid output file")?;
    let query = parse_query(&args.fields).context("invalid query")?;
    let namespace = namespace(&config)?;
    let store = DirGroupStore::open(&config.store.endpoint, namespace);
    check_connectivity(&store, config.store.connect_timeout())?;

    log::info!("entering decompress mode");
    let runner = Runner::from_config(args.common.algorithm, &config);
    let report = runner
        .decompress_to_file(&query, &store, &output)
        .with_context(|| format!("failed to write '{}'", output.display()))?;

    report.print();
    if let Some(path) = &args.common.report {
        report
            .save_to_file(path)
            .with_context(|| format!("failed to save report to '{}'", path.display()))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);
    match &cli.command {
        Command::Compress(args) => run_compress(args),
        Command::Decompress(args) => run_decompress(args),
    }
}
