use crate::commands::{
    run_analyze, run_health, run_ledger, run_simulate, AnalyzeArgs, HealthArgs, LedgerArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use vantage_risk::config::AppConfig;
use vantage_risk::error::AppError;
use vantage_risk::telemetry;

#[derive(Parser, Debug)]
#[command(
    name = "Vantage Risk Console",
    about = "Run utility-based underwriting decisions, audit the ledger and watch service health",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Analyze a single applicant profile against the decisioning backend
    Analyze(AnalyzeArgs),
    /// Print or export the decision ledger
    Ledger(LedgerArgs),
    /// Sample the service health monitor locally
    Health(HealthArgs),
    /// Run the rule-based versus utility backtest and show the model scorecard
    Simulate,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    match command {
        Command::Serve(args) => server::run(config, args).await,
        Command::Analyze(args) => run_analyze(&config, args).await,
        Command::Ledger(args) => run_ledger(&config, args).await,
        Command::Health(args) => run_health(&config, args),
        Command::Simulate => run_simulate(&config).await,
    }
}
