use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use rtmp2flv::config::{Args, Config};
use rtmp2flv::{logging, serve, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration (defaults < file < env < flags)
    let args = Args::parse();
    let config = Config::from_args(args)?;

    // 2. Validate (fail fast on misconfigurations)
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s)",
            errors.len()
        ));
    }

    // 3. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("rtmp to flv server started");
    if !config.appkey.is_empty() {
        info!("appkey required for /flv");
    }

    // 4. Serve until shutdown; bind failure is fatal
    let state = AppState::from_config(Arc::new(config))?;
    serve(state).await?;

    info!("rtmp to flv server shutting down");
    Ok(())
}
