use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use md5scan::corpus::{collect_sources, read_file_list, SourceFilter};
use md5scan::{
    ConfigOverrides, Corpus, CorpusBuilder, ScanConfig, ScanError, ScanReport, ScanResult, Scanner,
    TargetDigest,
};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

const EXIT_NOT_FOUND: u8 = 1;
const EXIT_ERROR: u8 = 2;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (YAML), applied after the global and local ones
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct BuildArgs {
    /// Source files or directories
    #[arg(required_unless_present = "file_list")]
    paths: Vec<PathBuf>,

    /// Corpus file to write
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Substring length the corpus is built for; shorter lines are dropped
    #[arg(short = 'l', long)]
    substring_len: Option<usize>,

    /// File with one source path per line
    #[arg(long)]
    file_list: Option<PathBuf>,

    /// File extensions to include when walking directories (e.g. txt,md)
    #[arg(short = 'e', long)]
    extensions: Option<String>,

    /// Patterns to ignore when walking directories (glob format)
    #[arg(short, long)]
    ignore: Vec<String>,

    /// Hide the progress bar and summary
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Args)]
struct SearchArgs {
    /// Target MD5 digest, 32 hex digits
    target: String,

    /// Corpus file to search
    #[arg(short, long)]
    corpus: Option<PathBuf>,

    /// Substring length (19-55)
    #[arg(short = 'l', long)]
    substring_len: Option<usize>,

    /// Number of worker threads (1-63)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Print scan statistics to stderr
    #[arg(short, long)]
    stats: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a corpus file from text sources
    Build(BuildArgs),

    /// Search a corpus for a substring with the given MD5 digest
    Search(SearchArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run(cli: Cli) -> ScanResult<ExitCode> {
    let file_config = ScanConfig::load_from(cli.config.as_deref())?;

    match cli.command {
        Commands::Build(args) => {
            let config = file_config.merge_with_cli(ConfigOverrides {
                corpus_path: args.output.clone(),
                substring_len: args.substring_len,
                log_level: cli.log_level,
                extensions: args.extensions.as_deref().map(split_list),
                ignore_patterns: (!args.ignore.is_empty()).then(|| args.ignore.clone()),
                ..ConfigOverrides::default()
            });
            config.validate_substring_len()?;
            init_logging(&config.log_level);
            build(&config, args)
        }
        Commands::Search(args) => {
            let config = file_config.merge_with_cli(ConfigOverrides {
                corpus_path: args.corpus.clone(),
                substring_len: args.substring_len,
                thread_count: args.threads,
                log_level: cli.log_level,
                ..ConfigOverrides::default()
            });
            config.validate()?;
            init_logging(&config.log_level);
            search(config, args)
        }
    }
}

/// Logs go to stderr; stdout carries only the search result
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn build(config: &ScanConfig, args: BuildArgs) -> ScanResult<ExitCode> {
    let filter = SourceFilter::new(config.extensions.clone(), &config.ignore_patterns)?;
    let mut roots = args.paths;
    if let Some(list) = &args.file_list {
        roots.extend(read_file_list(list)?);
    }
    let sources = collect_sources(&roots, &filter)?;
    if sources.is_empty() {
        return Err(ScanError::config_error("no source files found"));
    }
    debug!("Building corpus from {} files", sources.len());

    let mut builder =
        CorpusBuilder::new(config.substring_len).with_capacity(config.max_corpus_bytes);
    builder.add_files(&sources, args.quiet)?;
    let manifest = builder.write_to(&config.corpus_path)?;

    if !args.quiet {
        eprintln!(
            "{} {}",
            "Wrote".green().bold(),
            config.corpus_path.display().to_string().blue()
        );
        eprintln!(
            "  {} files, {} records, {} bytes ({} short lines dropped)",
            manifest.files.to_string().green(),
            manifest.records.to_string().green(),
            manifest.data_bytes.to_string().green(),
            manifest.discarded_lines.to_string().yellow()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn search(config: ScanConfig, args: SearchArgs) -> ScanResult<ExitCode> {
    let target = TargetDigest::from_hex(&args.target)?;
    let corpus = Corpus::open(&config.corpus_path)?;
    let report = Scanner::new(config)?.scan(&corpus, &target)?;

    report.write_to(&mut io::stdout().lock())?;
    if args.stats {
        print_stats(&report);
    }

    Ok(if report.outcome.is_found() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_NOT_FOUND)
    })
}

fn print_stats(report: &ScanReport) {
    let stats = &report.stats;
    eprintln!(
        "{} {} candidates in {} batches, {} short records skipped",
        "Scanned".green().bold(),
        stats.candidates.to_string().green(),
        stats.batches,
        stats.records_skipped
    );
    eprintln!(
        "  {} bytes covered, {}/{} partitions completed, {:.2?} ({} kernel, {} threads)",
        stats.bytes_covered,
        stats.partitions_completed,
        report.threads,
        report.elapsed,
        report.backend.to_string().blue(),
        report.threads
    );
    if let Some(m) = report.outcome.as_match() {
        eprintln!(
            "  match at offset {} (partition {}, lane {})",
            m.offset.to_string().yellow(),
            m.partition,
            m.lane
        );
    }
}
