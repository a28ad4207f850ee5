//! facegate server binary
//!
//! Serves the face API with configuration from `.env`, an optional
//! `facegate` config file and the process environment.

use server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let config = ServerConfig::load()?;
    server::start_server(config).await?;

    Ok(())
}
