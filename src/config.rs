use anyhow::{Context, Result};

// ---------------------------------------------------------------------------
// PushGatewayConfig
// ---------------------------------------------------------------------------

/// Connection settings for the external push-notification gateway.
///
/// When `PUSH_BASE_URL` is unset the service runs in emulator mode:
/// registrations are accepted and deliveries succeed without any outbound
/// calls.
#[derive(Debug, Clone)]
pub struct PushGatewayConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// `None` → emulator-mode transport.
    pub push_gateway: Option<PushGatewayConfig>,
    /// Archiver tick interval in seconds. The upstream scheduler contract
    /// is "at most once per minute", so the default matches that floor.
    pub archive_interval_secs: u64,
    /// Minimum time between two notifications for the same metric+level key.
    pub notification_cooldown_minutes: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            push_gateway: parse_push_gateway(
                std::env::var("PUSH_BASE_URL").ok(),
                std::env::var("PUSH_CLIENT_ID").ok(),
                std::env::var("PUSH_CLIENT_SECRET").ok(),
            )?,
            archive_interval_secs: optional("ARCHIVE_INTERVAL_SECS", "60")
                .parse()
                .context("ARCHIVE_INTERVAL_SECS must be a positive integer")?,
            notification_cooldown_minutes: optional("NOTIFICATION_COOLDOWN_MINUTES", "30")
                .parse()
                .context("NOTIFICATION_COOLDOWN_MINUTES must be a positive integer")?,
        })
    }
}

/// Gateway config is all-or-nothing: a base URL without credentials (or the
/// other way round) is a configuration mistake, not emulator mode.
fn parse_push_gateway(
    base_url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
) -> Result<Option<PushGatewayConfig>> {
    match base_url {
        None => Ok(None),
        Some(base_url) => {
            let client_id =
                client_id.context("PUSH_CLIENT_ID is required when PUSH_BASE_URL is set")?;
            let client_secret =
                client_secret.context("PUSH_CLIENT_SECRET is required when PUSH_BASE_URL is set")?;
            Ok(Some(PushGatewayConfig { base_url, client_id, client_secret }))
        }
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_base_url_means_emulator_mode() {
        let gw = parse_push_gateway(None, Some("id".into()), None).unwrap();
        assert!(gw.is_none());
    }

    #[test]
    fn full_gateway_config_parses() {
        let gw = parse_push_gateway(
            Some("https://push.example.com".into()),
            Some("client".into()),
            Some("secret".into()),
        )
        .unwrap()
        .unwrap();
        assert_eq!(gw.base_url, "https://push.example.com");
        assert_eq!(gw.client_id, "client");
    }

    #[test]
    fn base_url_without_credentials_errors() {
        let err = parse_push_gateway(Some("https://push.example.com".into()), None, None)
            .unwrap_err();
        assert!(err.to_string().contains("PUSH_CLIENT_ID"));
    }
}
