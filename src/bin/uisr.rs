use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use uis_reader::archive::HttpArchiveSource;
use uis_reader::cache::DataCache;
use uis_reader::catalog::Catalog;
use uis_reader::error::UisError;
use uis_reader::reader::Uis;

#[derive(Parser)]
#[command(name = "uisr")]
#[command(about = "Fetch and inspect UNESCO Institute for Statistics bulk datasets")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List the datasets available for bulk download")]
    Datasets,
    #[command(about = "Show the descriptor of one dataset")]
    Info(DatasetArgs),
    #[command(about = "Fetch a dataset and print a summary")]
    Fetch(FetchArgs),
}

#[derive(Args)]
struct DatasetArgs {
    dataset: String,
}

#[derive(Args)]
struct FetchArgs {
    dataset: String,

    #[arg(long)]
    refresh: bool,

    #[arg(long)]
    region: Option<String>,

    #[arg(long)]
    metadata: bool,
}

#[derive(Serialize)]
struct FetchSummary {
    name: String,
    code: String,
    category: String,
    rows: usize,
    columns: Vec<String>,
    regional: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(uis) = report.downcast_ref::<UisError>() {
            return ExitCode::from(map_exit_code(uis));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &UisError) -> u8 {
    match error {
        UisError::DatasetNotFound { .. }
        | UisError::MemberNotFound { .. }
        | UisError::RegionNotFound(_) => 2,
        UisError::Transfer(_) | UisError::TransferStatus { .. } | UisError::OverLimit(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let catalog = Catalog::bundled();

    match cli.command {
        Commands::Datasets => {
            for descriptor in catalog.datasets() {
                println!(
                    "{:<8} {:<45} {:<10} regional: {}",
                    descriptor.code, descriptor.name, descriptor.category, descriptor.regional
                );
            }
            Ok(())
        }
        Commands::Info(args) => {
            let descriptor = catalog.resolve(&args.dataset).into_diagnostic()?;
            print_json(descriptor)
        }
        Commands::Fetch(args) => {
            let source = HttpArchiveSource::new().into_diagnostic()?;
            let cache = Arc::new(DataCache::new(source));
            let uis = Uis::new(&catalog, cache, &args.dataset).into_diagnostic()?;
            if args.refresh {
                uis.refresh().into_diagnostic()?;
            }
            let table = uis
                .country_data(args.metadata, args.region.as_deref())
                .into_diagnostic()?;
            let summary = FetchSummary {
                name: uis.name().to_string(),
                code: uis.code().to_string(),
                category: uis.category().to_string(),
                rows: table.len(),
                columns: table.columns().to_vec(),
                regional: uis.descriptor().regional,
            };
            print_json(&summary)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> miette::Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}
