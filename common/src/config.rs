//! Application configuration.
//!
//! All settings are read from the process environment once at startup and
//! then handed to handlers through the application state. Nothing below the
//! HTTP layer reads the environment directly.

use std::path::{Path, PathBuf};

/// Built-in verification service location used when `BOND_SERVICE_URL` is unset.
pub const DEFAULT_BOND_URL: &str = "https://bond-service-l5xebjflvq-ew.a.run.app";

/// Zero-based position of the row whose name becomes the sentinel value.
pub const DEFAULT_SENTINEL_ROW_INDEX: usize = 50;

/// Directory where the platform mounts managed database sockets.
pub const DEFAULT_SOCKET_DIR: &str = "/cloudsql";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Process-wide configuration, immutable after startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Service name used in logs and health responses.
    pub service_name: String,
    /// Listen address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Platform project id. Empty until detected.
    pub project_id: String,
    /// Verification service base URL, without trailing slash.
    pub bond_url: String,
    /// Raw `DB_TYPE` value; parsed per request.
    pub db_type: Option<String>,
    /// Row index captured as the sentinel value.
    pub sentinel_row_index: usize,
    /// Database connect / acquire timeout.
    pub connect_timeout_secs: u64,
    /// Timeout for outbound verification calls.
    pub request_timeout_secs: u64,
    /// Database connection parameters.
    pub db: DbSettings,
    /// How managed database endpoints are reached.
    pub connector: ConnectorSettings,
}

/// Raw database connection parameters as found in the environment.
///
/// Validation happens later, when a request turns these into a
/// [`ConnectionInfo`](crate::models::ConnectionInfo).
#[derive(Debug, Clone, Default)]
pub struct DbSettings {
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub region: Option<String>,
    pub cluster: Option<String>,
    pub instance: Option<String>,
    pub project: Option<String>,
}

/// Where the managed connector finds database endpoints.
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    /// Directory holding one socket (or socket directory) per instance.
    pub socket_dir: PathBuf,
    /// TCP host of a locally running auth proxy; overrides `socket_dir`.
    pub host: Option<String>,
    /// TCP port of the auth proxy. Defaults to the backend's standard port.
    pub port: Option<u16>,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            socket_dir: PathBuf::from(DEFAULT_SOCKET_DIR),
            host: None,
            port: None,
        }
    }
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn load_with_service(service_name: &str) -> Self {
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parse_or(get("PORT").or_else(|| get("SERVER_PORT")), "PORT", DEFAULT_PORT);

        let bond_url = get("BOND_SERVICE_URL")
            .unwrap_or_else(|| DEFAULT_BOND_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Self {
            service_name: service_name.to_string(),
            host: get("SERVER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            project_id: get("GOOGLE_CLOUD_PROJECT")
                .or_else(|| get("PROJECT_ID"))
                .unwrap_or_default(),
            bond_url,
            db_type: get("DB_TYPE"),
            sentinel_row_index: parse_or(
                get("SENTINEL_ROW_INDEX"),
                "SENTINEL_ROW_INDEX",
                DEFAULT_SENTINEL_ROW_INDEX,
            ),
            connect_timeout_secs: parse_or(
                get("DB_CONNECT_TIMEOUT_SECS"),
                "DB_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            ),
            request_timeout_secs: parse_or(
                get("BOND_TIMEOUT_SECS"),
                "BOND_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
            db: DbSettings {
                user: get("DB_USER"),
                password: get("DB_PASS"),
                name: get("DB_NAME"),
                region: get("DB_REGION"),
                cluster: get("DB_CLUSTER"),
                instance: get("DB_INSTANCE"),
                project: get("DB_PROJECT"),
            },
            connector: ConnectorSettings {
                socket_dir: get("DB_SOCKET_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_DIR)),
                host: get("DB_HOST"),
                port: get("DB_PORT").and_then(|v| v.parse().ok()),
            },
        }
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> T {
    match value {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "invalid value, using default");
            default
        }),
        None => default,
    }
}

/// Loads a `.env` file (best-effort, no error if missing).
///
/// Variables already present in the environment are left untouched.
pub fn load_dotenv(path: &Path) {
    let Ok(content) = std::fs::read_to_string(path) else {
        return;
    };
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim().trim_matches('"');
            if std::env::var(key).is_err() {
                std::env::set_var(key, value);
            }
        }
    }
}
