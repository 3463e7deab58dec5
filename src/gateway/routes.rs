//! Static gateway route table: path prefix to upstream service.

use crate::config::ServicesConfig;
use crate::middleware::auth::segment_prefix;
use crate::types::ServiceKind;

const ROUTES: &[(&str, ServiceKind)] = &[
    ("/api/auth", ServiceKind::Users),
    ("/api/users", ServiceKind::Users),
    ("/api/notes", ServiceKind::Notes),
    ("/api/tasks", ServiceKind::Tasks),
    ("/api/events", ServiceKind::Events),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub service: ServiceKind,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<(String, Upstream)>,
}

impl RouteTable {
    pub fn from_config(services: &ServicesConfig) -> Self {
        let routes = ROUTES
            .iter()
            .filter_map(|(prefix, service)| {
                services.base_url(*service).map(|url| {
                    (
                        prefix.to_string(),
                        Upstream {
                            service: *service,
                            base_url: url.trim_end_matches('/').to_string(),
                        },
                    )
                })
            })
            .collect();
        Self { routes }
    }

    /// Upstream owning `path`, matched on whole segments
    pub fn resolve(&self, path: &str) -> Option<&Upstream> {
        self.routes
            .iter()
            .find(|(prefix, _)| segment_prefix(path, prefix))
            .map(|(_, upstream)| upstream)
    }
}
