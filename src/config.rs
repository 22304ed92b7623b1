use anyhow::{Context, Result};
use clap::Parser;

use crate::auth::{AuthSettings, DEFAULT_CLIENT_ID, DEFAULT_PROBE_PATH};

/// OCP Gateway - authenticated access to OCP APIs
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Server host address
    #[arg(short = 'H', long, env = "SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT", default_value = "8000")]
    pub port: u16,

    /// Proxy API key for client authentication
    #[arg(short = 'k', long, env = "PROXY_API_KEY")]
    pub api_key: Option<String>,

    /// OCP host URL, e.g. https://us1-a.ocp.ai
    #[arg(long, env = "OCP_HOST")]
    pub ocp_host: Option<String>,

    /// OCP username
    #[arg(short = 'u', long, env = "OCP_USERNAME")]
    pub username: Option<String>,

    /// OAuth client id in the master realm
    #[arg(long, env = "OCP_CLIENT_ID", default_value = DEFAULT_CLIENT_ID)]
    pub client_id: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // Authentication
    pub proxy_api_key: String,

    // OCP credentials
    pub ocp_host: String,
    pub ocp_username: String,
    pub ocp_password: String,
    pub ocp_client_id: String,
    pub token_probe_path: String,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();

        let config = Config {
            server_host: args.host,
            server_port: args.port,

            proxy_api_key: args
                .api_key
                .context("PROXY_API_KEY is required (use -k or set PROXY_API_KEY env var)")?,

            ocp_host: args
                .ocp_host
                .context("OCP_HOST is required (use --ocp-host or set OCP_HOST env var)")?,

            ocp_username: args
                .username
                .context("OCP_USERNAME is required (use -u or set OCP_USERNAME env var)")?,

            // Password is never taken from the command line
            ocp_password: std::env::var("OCP_PASSWORD")
                .context("OCP_PASSWORD env var is required")?,

            ocp_client_id: args.client_id,

            token_probe_path: std::env::var("TOKEN_PROBE_PATH")
                .unwrap_or_else(|_| DEFAULT_PROBE_PATH.to_string()),

            http_connect_timeout: std::env::var("HTTP_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),

            http_request_timeout: args.http_timeout,

            log_level: args.log_level,
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.ocp_host) {
            anyhow::bail!(
                "OCP_HOST must start with http:// or https://: {}",
                self.ocp_host
            );
        }

        if self.ocp_username.trim().is_empty() {
            anyhow::bail!("OCP_USERNAME cannot be empty");
        }

        if self.ocp_password.is_empty() {
            anyhow::bail!("OCP_PASSWORD cannot be empty");
        }

        if self.proxy_api_key.is_empty() {
            anyhow::bail!("PROXY_API_KEY cannot be empty");
        }

        if self.http_request_timeout == 0 {
            anyhow::bail!("HTTP_REQUEST_TIMEOUT must be greater than zero");
        }

        Ok(())
    }

    /// Settings handed to the credential manager
    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            host: self.ocp_host.trim_end_matches('/').to_string(),
            username: self.ocp_username.clone(),
            password: self.ocp_password.clone(),
            client_id: self.ocp_client_id.clone(),
            probe_path: self.token_probe_path.clone(),
        }
    }
}

fn is_http_url(s: &str) -> bool {
    let lower = s.to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 8000,
            proxy_api_key: "key".to_string(),
            ocp_host: "https://us1-a.ocp.ai/".to_string(),
            ocp_username: "user".to_string(),
            ocp_password: "password".to_string(),
            ocp_client_id: "ocp".to_string(),
            token_probe_path: DEFAULT_PROBE_PATH.to_string(),
            http_connect_timeout: 10,
            http_request_timeout: 30,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_host_without_scheme() {
        let mut config = test_config();
        config.ocp_host = "us1-a.ocp.ai".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("OCP_HOST"));
    }

    #[test]
    fn test_validate_rejects_empty_credentials() {
        let mut config = test_config();
        config.ocp_username = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.ocp_password = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = test_config();
        config.http_request_timeout = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_auth_settings_trims_trailing_slash() {
        let settings = test_config().auth_settings();
        assert_eq!(settings.host, "https://us1-a.ocp.ai");
        assert_eq!(settings.client_id, "ocp");
        assert_eq!(settings.probe_path, DEFAULT_PROBE_PATH);
    }

    #[test]
    fn test_is_http_url() {
        assert!(is_http_url("https://example.com"));
        assert!(is_http_url("HTTP://example.com"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("example.com"));
    }

    #[test]
    fn test_cli_args_parse() {
        let args = CliArgs::try_parse_from([
            "ocp-gateway",
            "--ocp-host",
            "https://ocp.example.com",
            "-u",
            "alice",
            "-k",
            "secret",
            "-p",
            "9000",
        ])
        .unwrap();
        assert_eq!(args.ocp_host.as_deref(), Some("https://ocp.example.com"));
        assert_eq!(args.username.as_deref(), Some("alice"));
        assert_eq!(args.api_key.as_deref(), Some("secret"));
        assert_eq!(args.port, 9000);
    }
}
