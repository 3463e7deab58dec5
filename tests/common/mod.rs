#![allow(dead_code)]

use std::collections::HashMap;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::{json, Value};

use agendita_api::config::AppConfig;
use agendita_api::types::ServiceKind;

pub const TEST_SECRET: &str = "integration-test-secret";

/// One running backend: every service on its own loopback port
pub struct Stack {
    pub config: AppConfig,
    pub client: reqwest::Client,
}

impl Stack {
    pub fn url(&self, service: ServiceKind) -> String {
        format!("http://127.0.0.1:{}", self.config.services.port(service))
    }

    pub fn gateway(&self, path: &str) -> String {
        format!("{}{}", self.url(ServiceKind::Gateway), path)
    }

    pub fn direct(&self, service: ServiceKind, path: &str) -> String {
        format!("{}{}", self.url(service), path)
    }
}

fn pick_port() -> Result<u16> {
    portpicker::pick_unused_port().context("failed to pick free port")
}

/// Configuration wired to fresh ports, in-memory storage and a fixed secret
pub fn test_config(extra: &[(&str, String)]) -> Result<AppConfig> {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("JWT_SECRET".into(), TEST_SECRET.into());
    vars.insert("BIND_HOST".into(), "127.0.0.1".into());

    for (name, kind) in [
        ("GATEWAY", ServiceKind::Gateway),
        ("USERS", ServiceKind::Users),
        ("NOTES", ServiceKind::Notes),
        ("TASKS", ServiceKind::Tasks),
        ("EVENTS", ServiceKind::Events),
    ] {
        let port = pick_port()?;
        vars.insert(format!("{}_PORT", name), port.to_string());
        if kind != ServiceKind::Gateway {
            vars.insert(format!("{}_SERVICE_URL", name), format!("http://127.0.0.1:{}", port));
        }
    }
    for (key, value) in extra {
        vars.insert(key.to_string(), value.clone());
    }

    Ok(AppConfig::from_source(|key| vars.get(key).cloned())?)
}

async fn serve(kind: ServiceKind, config: &AppConfig) -> Result<()> {
    let app = agendita_api::app::build(kind, config).await?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", config.services.port(kind)))
        .await
        .with_context(|| format!("failed to bind {}", kind))?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(())
}

/// Start `services` for `config` and wait until each answers `/health`
pub async fn start(config: AppConfig, services: &[ServiceKind]) -> Result<Stack> {
    for kind in services {
        serve(*kind, &config).await?;
    }

    let stack = Stack {
        config,
        client: reqwest::Client::builder().no_proxy().build()?,
    };
    for kind in services {
        let url = stack.direct(*kind, "/health");
        let resp = stack.client.get(&url).send().await?;
        anyhow::ensure!(resp.status() == StatusCode::OK, "{} not healthy", kind);
    }
    Ok(stack)
}

pub async fn full_stack() -> Result<Stack> {
    start(
        test_config(&[])?,
        &[
            ServiceKind::Users,
            ServiceKind::Notes,
            ServiceKind::Tasks,
            ServiceKind::Events,
            ServiceKind::Gateway,
        ],
    )
    .await
}

pub struct Session {
    pub token: String,
    pub user_id: String,
}

/// Register through the gateway and log in, returning the bearer token
pub async fn sign_up(stack: &Stack, email: &str, password: &str) -> Result<Session> {
    let resp = stack
        .client
        .post(stack.gateway("/api/auth/register"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await?;
    anyhow::ensure!(resp.status() == StatusCode::CREATED, "register returned {}", resp.status());

    let resp = stack
        .client
        .post(stack.gateway("/api/auth/login"))
        .json(&json!({ "username_or_email": email, "password": password }))
        .send()
        .await?;
    anyhow::ensure!(resp.status() == StatusCode::OK, "login returned {}", resp.status());

    let body: Value = resp.json().await?;
    Ok(Session {
        token: body["token"].as_str().context("token in login response")?.to_string(),
        user_id: body["user"]["id"].as_str().context("user id in login response")?.to_string(),
    })
}
