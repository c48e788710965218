use std::net::SocketAddr;

use popstats::server::{AppState, serve};

use crate::shutdown;

pub(crate) async fn handle_serve(
    bind: &str,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = bind
        .parse()
        .map_err(|e| format!("invalid bind address '{bind}': {e}"))?;

    let db = popstats::connect_and_migrate(database_url).await?;
    serve(addr, AppState::new(db), shutdown::wait_for_shutdown()).await?;

    tracing::info!("Server stopped");
    Ok(())
}
