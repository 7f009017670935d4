use std::net::SocketAddr;
use std::sync::Arc;

use crate::app::AppContext;

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    pub ctx: Arc<AppContext>,
    /// Addresses probed by `POST /api/discover`.
    pub candidates: Arc<[SocketAddr]>,
}

impl ApiState {
    pub fn new(ctx: Arc<AppContext>, candidates: Vec<SocketAddr>) -> Self {
        Self {
            ctx,
            candidates: candidates.into(),
        }
    }

    pub fn default_port(&self) -> u16 {
        self.ctx.registry().config().default_port
    }
}
