use std::io;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use rankscan::app::{RunOptions, Scraper};
use rankscan::config::{ConfigLoader, ConfigOverrides, Credentials};
use rankscan::dispatch::CancelToken;
use rankscan::domain::{ArtifactMode, DispatchMode};
use rankscan::error::RankscanError;
use rankscan::output::{JsonOutput, OutputMode};
use rankscan::persist::{check_artifact, resort_artifact};
use rankscan::progress::TerminalProgress;
use rankscan::prompt::prepare_artifact;

#[derive(Parser)]
#[command(name = "rankscan")]
#[command(about = "Scrape profile ranks over an id range into a sorted CSV")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Scrape the configured id range (default)")]
    Run(RunArgs),
    #[command(about = "Rewrite an existing artifact sorted by rank")]
    Sort(PathArgs),
    #[command(about = "Verify that an artifact is sorted by rank")]
    Check(PathArgs),
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    start: Option<u64>,

    #[arg(long)]
    end: Option<u64>,

    #[arg(long, short = 'c')]
    concurrency: Option<usize>,

    #[arg(long)]
    flush_every: Option<usize>,

    #[arg(long, short = 'o')]
    output: Option<String>,

    #[arg(long)]
    dispatch: Option<DispatchMode>,

    #[arg(long)]
    mode: Option<ArtifactMode>,

    /// Overwrite an existing artifact without asking.
    #[arg(long, short = 'y')]
    yes: bool,
}

#[derive(Args)]
struct PathArgs {
    path: Utf8PathBuf,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<RankscanError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &RankscanError) -> u8 {
    match error {
        RankscanError::InvalidRange(_)
        | RankscanError::InvalidConfig(_)
        | RankscanError::ConfigRead(_)
        | RankscanError::ConfigParse(_)
        | RankscanError::MissingCredential(_)
        | RankscanError::InvalidSelector { .. }
        | RankscanError::ArtifactExists(_) => 2,
        RankscanError::Filesystem(_)
        | RankscanError::ArtifactWrite { .. }
        | RankscanError::ArtifactRead { .. } => 3,
        RankscanError::ArtifactUnsorted { .. } => 4,
        RankscanError::HttpClient(_) | RankscanError::Prompt(_) => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run_scrape(args, output_mode),
        Commands::Sort(args) => {
            let records = resort_artifact(&args.path)?;
            tracing::info!(path = %args.path, records, "artifact sorted");
            if matches!(output_mode, OutputMode::NonInteractive) {
                JsonOutput::print_json(&serde_json::json!({
                    "path": args.path.as_str(),
                    "records": records,
                }))
                .into_diagnostic()?;
            } else {
                println!("Sorted {records} records in {}", args.path);
            }
            Ok(())
        }
        Commands::Check(args) => {
            let records = check_artifact(&args.path)?;
            if matches!(output_mode, OutputMode::NonInteractive) {
                JsonOutput::print_json(&serde_json::json!({
                    "path": args.path.as_str(),
                    "records": records,
                    "sorted": true,
                }))
                .into_diagnostic()?;
            } else {
                println!("{} is sorted ({records} records)", args.path);
            }
            Ok(())
        }
    }
}

fn run_scrape(args: RunArgs, output_mode: OutputMode) -> miette::Result<()> {
    let overrides = ConfigOverrides {
        start: args.start,
        end: args.end,
        concurrency: args.concurrency,
        flush_every: args.flush_every,
        output: args.output.clone(),
        dispatch: args.dispatch,
        mode: args.mode,
    };
    let config = ConfigLoader::resolve(args.config.as_deref(), overrides)?;

    // Everything that can fail on bad input is built before the existing
    // artifact is touched.
    let cwd = std::env::current_dir().into_diagnostic()?;
    let credentials = Credentials::from_env(&cwd)?;
    let app = Scraper::from_config(&config, &credentials)?;

    let proceed = prepare_artifact(
        app.persister(),
        output_mode,
        args.yes,
        &mut io::stdin().lock(),
        &mut io::stdout(),
    )?;
    if !proceed {
        tracing::info!("overwrite declined");
        eprintln!("Exiting. Please rename or remove the existing output file.");
        return Ok(());
    }

    let options = RunOptions::from(&config);
    let cancel = CancelToken::new();

    match output_mode {
        OutputMode::NonInteractive => {
            let summary = app.run(&options, &JsonOutput, &cancel)?;
            JsonOutput::print_summary(&summary).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let progress = TerminalProgress::stdout();
            let summary = app.run(&options, &progress, &cancel)?;
            if summary.mode == ArtifactMode::Append {
                println!(
                    "Appended {} records to {} (run `rankscan sort {}` to order them)",
                    summary.ranked, summary.output, summary.output
                );
            }
        }
    }
    Ok(())
}
