//! `kasa serve`: monitored registry behind the HTTP API.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use kasa_config::Config;

use crate::app::AppContext;
use crate::cli::{GlobalOpts, ServeArgs};
use crate::error::CliError;
use crate::server::{self, ApiState};
use crate::shutdown;

pub async fn handle(
    args: ServeArgs,
    cfg: &Config,
    ctx: Arc<AppContext>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let candidates = cfg.candidates()?;

    let restored = ctx.rehydrate().await?;
    let outcomes = ctx.discover_all(&candidates).await?;
    let found = outcomes.iter().filter(|o| o.is_success()).count();
    info!(restored, probed = outcomes.len(), found, "startup discovery finished");

    if args.discover_only {
        let records: Vec<_> = outcomes.iter().filter_map(|o| o.record().cloned()).collect();
        return super::devices::print_records(&records, global);
    }

    if cfg.monitor.enabled && !args.no_monitoring {
        ctx.spawn_monitor().await;
    }

    let mut server_cfg = cfg.server.clone();
    if let Some(port) = args.port {
        server_cfg.port = port;
    }
    if let Some(bind) = args.bind {
        server_cfg.bind = bind;
    }
    let addr = server_cfg.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "API listening");

    let cancel = ctx.cancel_token().clone();
    let coordinator = shutdown::spawn_coordinator(cancel.clone());
    let result = server::serve(
        listener,
        ApiState::new(Arc::clone(&ctx), candidates),
        cancel.cancelled_owned(),
    )
    .await;

    ctx.shutdown().await;
    if let Err(e) = coordinator.await {
        tracing::warn!(error = %e, "shutdown coordinator ended abnormally");
    }
    info!("server stopped");
    result.map_err(CliError::from)
}
