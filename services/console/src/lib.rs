mod cli;
mod commands;
mod infra;
mod routes;
mod server;

use vantage_risk::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
