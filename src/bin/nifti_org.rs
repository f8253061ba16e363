use std::process::ExitCode;

use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use nifti_organizer::config::{ConfigLoader, ResolvedConfig};
use nifti_organizer::converter::{Converter, ConverterStatus, Dcm2niixConverter};
use nifti_organizer::error::OrganizerError;
use nifti_organizer::ledger::{CsvLedgerStore, Ledger};
use nifti_organizer::output::{
    JsonOutput, LogSink, OutputMode, print_convert_summary, print_organize_summary,
};
use nifti_organizer::pipeline::{Pipeline, ProgressSink};
use nifti_organizer::rules::RuleTable;

#[derive(Parser)]
#[command(name = "nifti-org")]
#[command(about = "Convert raw MRI sessions to NIfTI and organize them into the study layout")]
#[command(version, author)]
struct Cli {
    /// Path to the JSON config (defaults to ./nifti-org.json)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Print the run report as JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Convert raw acquisitions that have no NIfTI output yet")]
    Convert,
    #[command(about = "Copy converted scans into the data tree and update the ledger")]
    Organize,
    #[command(about = "Convert, then organize")]
    Run,
    #[command(about = "Show the resolved converter")]
    Tools,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<OrganizerError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &OrganizerError) -> u8 {
    match error {
        OrganizerError::MissingConfig
        | OrganizerError::ConfigRead(_)
        | OrganizerError::PathNotFound(_) => 2,
        OrganizerError::MissingTool(_) | OrganizerError::ExternalToolFailure(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Summary
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let converter = Dcm2niixConverter::new(&config.converter);

    match cli.command {
        Commands::Convert => {
            require_converter(&converter)?;
            let pipeline = Pipeline::from_config(&config, converter);
            let mut ledger = open_ledger(&config)?;
            let result = pipeline.convert(&mut ledger, sink_for(output_mode))?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_convert(&result).into_diagnostic()?,
                OutputMode::Summary => print_convert_summary(&result),
            }
        }
        Commands::Organize => {
            let rules = RuleTable::load(&config.rules)?;
            let pipeline = Pipeline::from_config(&config, converter);
            let mut ledger = open_ledger(&config)?;
            let result = pipeline.organize(&mut ledger, &rules, sink_for(output_mode))?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_organize(&result).into_diagnostic()?,
                OutputMode::Summary => print_organize_summary(&result),
            }
        }
        Commands::Run => {
            require_converter(&converter)?;
            let rules = RuleTable::load(&config.rules)?;
            let pipeline = Pipeline::from_config(&config, converter);
            let mut ledger = open_ledger(&config)?;
            let result = pipeline.run(&mut ledger, &rules, sink_for(output_mode))?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_run(&result).into_diagnostic()?,
                OutputMode::Summary => {
                    print_convert_summary(&result.convert);
                    print_organize_summary(&result.organize);
                }
            }
        }
        Commands::Tools => {
            let info = converter.tool_info();
            match output_mode {
                OutputMode::Json => {
                    let json = serde_json::to_string_pretty(&info).into_diagnostic()?;
                    println!("{json}");
                }
                OutputMode::Summary => {
                    println!(
                        "converter: {}",
                        info.program.as_deref().unwrap_or("not found")
                    );
                    println!("version: {}", info.version.as_deref().unwrap_or("unknown"));
                }
            }
        }
    }
    Ok(())
}

fn require_converter(converter: &Dcm2niixConverter) -> Result<(), OrganizerError> {
    match converter.status() {
        ConverterStatus::Ready => Ok(()),
        ConverterStatus::Missing { message } => Err(OrganizerError::MissingTool(message)),
    }
}

fn open_ledger(config: &ResolvedConfig) -> Result<Ledger<CsvLedgerStore>, OrganizerError> {
    let ledger = Ledger::open(CsvLedgerStore::new(config.ledger.clone()))?;
    tracing::info!(path = %config.ledger, rows = ledger.table().len(), "ledger opened");
    Ok(ledger)
}

fn sink_for(mode: OutputMode) -> &'static dyn ProgressSink {
    match mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Summary => &LogSink,
    }
}
