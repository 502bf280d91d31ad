use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use taxi_onboarding::config::AppConfig;
use taxi_onboarding::error::AppError;
use taxi_onboarding::telemetry;
use taxi_onboarding::workflows::contacts::{ContactImportWorkflow, ImportReport};
use taxi_onboarding::workflows::onboarding::{
    ActorKind, CodeAllocator, CodeStatistics, ExistingCodes, IdentityCode, InMemoryActorRepository,
    OnboardingEngine, OnboardingError, UnavailableProviders,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "taxi-onboarding",
    about = "Identity codes and bulk contact onboarding for the rider and driver apps",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect identity code allocation
    Codes {
        #[command(subcommand)]
        command: CodesCommand,
    },
    /// Register contacts from a CSV export
    Import(ImportArgs),
}

#[derive(Subcommand, Debug)]
enum CodesCommand {
    /// Print the code the next registration would receive
    Next(NextCodeArgs),
    /// Summarize issued codes per namespace
    Stats(ExistingCodesArgs),
}

#[derive(Args, Debug, Default)]
struct ExistingCodesArgs {
    /// Codes already issued, comma separated (e.g. p0001,p0002,c0110)
    #[arg(long, value_delimiter = ',')]
    existing: Vec<String>,
}

#[derive(Args, Debug)]
struct NextCodeArgs {
    /// Actor type: rider/cliente or driver/conductor
    #[arg(long, value_parser = parse_kind)]
    kind: ActorKind,
    #[command(flatten)]
    existing: ExistingCodesArgs,
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Contacts CSV with Nombre/Apellido/Email/Telefono/Tipo columns
    #[arg(long)]
    csv: PathBuf,
}

#[derive(Debug, Serialize)]
struct NextCodeView {
    kind: ActorKind,
    code: IdentityCode,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    match cli.command {
        Command::Codes {
            command: CodesCommand::Next(args),
        } => print_json(&next_code(&config, args)?),
        Command::Codes {
            command: CodesCommand::Stats(args),
        } => print_json(&code_statistics(&config, args)),
        Command::Import(args) => {
            let report = run_import(&config, args).await?;
            print_json(&report)
        }
    }
}

fn parse_kind(raw: &str) -> Result<ActorKind, String> {
    raw.parse().map_err(|err| format!("{err}"))
}

fn existing_codes(args: ExistingCodesArgs) -> ExistingCodes {
    args.existing
        .into_iter()
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty())
        .collect()
}

fn next_code(config: &AppConfig, args: NextCodeArgs) -> Result<NextCodeView, AppError> {
    let allocator = CodeAllocator::new(config.onboarding.numbering);
    let existing = existing_codes(args.existing);
    let code = allocator
        .allocate(args.kind, &existing)
        .map_err(OnboardingError::from)?;
    Ok(NextCodeView {
        kind: args.kind,
        code,
    })
}

fn code_statistics(config: &AppConfig, args: ExistingCodesArgs) -> CodeStatistics {
    CodeAllocator::new(config.onboarding.numbering).statistics(&existing_codes(args))
}

/// Runs against an empty in-memory repository with no live integrations, so only the
/// checks the contact plan keeps and the contacts can satisfy will pass.
async fn run_import(config: &AppConfig, args: ImportArgs) -> Result<ImportReport, AppError> {
    let engine = OnboardingEngine::new(
        Arc::new(InMemoryActorRepository::new()),
        UnavailableProviders::bundle(),
        config.onboarding.numbering,
        config.onboarding.verification.clone(),
    );

    info!(path = %args.csv.display(), "importing contacts");
    let report = ContactImportWorkflow::new(&engine)
        .import_path(&args.csv)
        .await?;
    Ok(report)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
