mod infra;
mod routes;
mod server;

use creditguard::error::AppError;

pub async fn run() -> Result<(), AppError> {
    server::run().await
}
