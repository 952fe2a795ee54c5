//! Managed connector.
//!
//! Managed instances are never dialed by IP. The platform (or a locally
//! running auth proxy) exposes each instance as a Unix socket named after its
//! instance URI and takes care of the encrypted tunnel and IAM authorisation.
//! This module builds those instance URIs and maps them to dialable endpoints.

use std::path::PathBuf;

use common::config::ConnectorSettings;
use common::errors::{AppError, AppResult};
use common::models::ConnectionInfo;

/// Standard Postgres port, used when dialing an auth proxy over TCP.
const POSTGRES_PORT: u16 = 5432;
/// Standard MySQL port, used when dialing an auth proxy over TCP.
const MYSQL_PORT: u16 = 3306;

/// Instance URI of a clustered (AlloyDB) instance.
///
/// # Errors
/// Returns `AppError::ClusterRequired` when no cluster is configured.
pub fn alloydb_instance_uri(info: &ConnectionInfo) -> AppResult<String> {
    let cluster = info.cluster.as_deref().ok_or(AppError::ClusterRequired)?;
    Ok(format!(
        "projects/{}/locations/{}/clusters/{}/instances/{}",
        info.project_id, info.region, cluster, info.instance
    ))
}

/// Instance connection name of a Cloud SQL instance (`project:region:instance`).
pub fn cloudsql_instance_name(info: &ConnectionInfo) -> String {
    format!("{}:{}:{}", info.project_id, info.region, info.instance)
}

/// Wire protocol spoken through the tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Postgres,
    MySql,
}

impl Protocol {
    fn default_port(&self) -> u16 {
        match self {
            Protocol::Postgres => POSTGRES_PORT,
            Protocol::MySql => MYSQL_PORT,
        }
    }
}

/// Where the database driver should connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Unix socket. For Postgres this is the directory holding
    /// `.s.PGSQL.5432`; for MySQL it is the socket file itself.
    Socket(PathBuf),
    /// TCP address of an auth proxy.
    Tcp { host: String, port: u16 },
}

/// Resolves instance URIs to endpoints.
#[derive(Debug, Clone)]
pub struct ManagedConnector {
    settings: ConnectorSettings,
}

impl ManagedConnector {
    pub fn new(settings: ConnectorSettings) -> Self {
        Self { settings }
    }

    /// Returns the endpoint that tunnels to `instance_uri`.
    pub fn dial(&self, instance_uri: &str, protocol: Protocol) -> Endpoint {
        let endpoint = match &self.settings.host {
            Some(host) => Endpoint::Tcp {
                host: host.clone(),
                port: self.settings.port.unwrap_or_else(|| protocol.default_port()),
            },
            None => Endpoint::Socket(self.settings.socket_dir.join(instance_uri)),
        };
        tracing::debug!(instance = %instance_uri, endpoint = ?endpoint, "resolved managed endpoint");
        endpoint
    }
}
