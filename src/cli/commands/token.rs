use chrono::{DateTime, Duration, Utc};
use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{Identity, TokenCodec};
use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Sign a token with the configured JWT secret")]
    Issue {
        #[arg(help = "Username placed in the `sub` claim")]
        username: String,
        #[arg(long, help = "User id for the `userId` claim (random if omitted)")]
        user_id: Option<Uuid>,
        #[arg(long, help = "Lifetime in hours (defaults to JWT_EXPIRY_HOURS)")]
        hours: Option<i64>,
    },

    #[command(about = "Verify a token and print its claims")]
    Inspect {
        #[arg(help = "Encoded token")]
        token: String,
    },
}

fn codec(hours: Option<i64>) -> anyhow::Result<TokenCodec> {
    let config = AppConfig::from_env()?;
    let codec = match hours {
        Some(h) => TokenCodec::new(&config.security.jwt_secret, Duration::hours(h))?,
        None => TokenCodec::from_config(&config.security)?,
    };
    Ok(codec)
}

fn timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Issue { username, user_id, hours } => {
            let codec = codec(hours)?;
            let identity = Identity {
                user_id: user_id.unwrap_or_else(Uuid::new_v4),
                username,
            };
            let token = codec.issue(&identity)?;

            output_success(
                output_format,
                &format!("Issued token for {}", identity.username),
                Some(json!({
                    "user_id": identity.user_id.to_string(),
                    "expires_in": codec.ttl().num_seconds(),
                    "token": token,
                })),
            )
        }
        TokenCommands::Inspect { token } => {
            let codec = codec(None)?;
            match codec.verify(token.trim()) {
                Ok(claims) => output_success(
                    output_format,
                    "Token is valid",
                    Some(json!({
                        "sub": claims.sub,
                        "userId": claims.user_id,
                        "issued_at": timestamp(claims.iat),
                        "expires_at": timestamp(claims.exp),
                    })),
                ),
                Err(err) => {
                    output_error(output_format, &format!("Token rejected: {}", err), Some("INVALID_TOKEN"))?;
                    anyhow::bail!("token rejected")
                }
            }
        }
    }
}
