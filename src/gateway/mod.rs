//! API gateway: authenticates at the edge and relays to the resource services.
//!
//! Every request passes the JWT filter first, which strips any client-supplied
//! identity headers and, for non-public paths, injects the verified ones. The
//! proxy then forwards to the upstream chosen by the route table.

pub mod proxy;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;

pub use routes::{RouteTable, Upstream};

#[derive(Clone)]
pub struct GatewayState {
    pub routes: Arc<RouteTable>,
    pub http: reqwest::Client,
    pub max_body_bytes: usize,
}

impl GatewayState {
    pub fn from_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        // Upstreams are internal addresses; never route them through an outbound proxy
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.gateway.request_timeout_secs))
            .no_proxy()
            .build()?;

        Ok(Self {
            routes: Arc::new(RouteTable::from_config(&config.services)),
            http,
            max_body_bytes: config.gateway.max_request_size_bytes,
        })
    }
}
