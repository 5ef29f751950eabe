use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use moot_api::{create_router, AppState};
use moot_core::{logging, Config, RoomRegistry};
use moot_sfu::{IceConfig, SfuEngine};

const ROOM_CLEANUP_PERIOD: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Arc::new(Config::load()?);
    logging::init_logging(&config)?;

    info!(
        addr = %config.server_addr(),
        env = %config.env,
        "starting moot server"
    );
    info!(allowed_origins = ?config.allowed_origins, "cors configuration");

    let registry = Arc::new(RoomRegistry::new());
    let sfu = Arc::new(SfuEngine::new(IceConfig::new(config.ice_servers.clone())));

    tokio::spawn(Arc::clone(&registry).cleanup_task(ROOM_CLEANUP_PERIOD));

    let app = create_router(AppState {
        registry,
        sfu,
        config: Arc::clone(&config),
    });

    let listener = tokio::net::TcpListener::bind(config.server_addr()).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
