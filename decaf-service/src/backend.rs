//! Backend selection and connection builders.
//!
//! One connector per [`BackendKind`]. Each turns a [`ConnectionInfo`] into a
//! live [`CoffeeSource`] so the aggregation code never needs to know which
//! backend it is reading from.

use std::sync::Arc;

use async_trait::async_trait;
use common::config::ConnectorSettings;
use common::errors::AppResult;
use common::models::{BackendKind, ConnectionInfo};

use crate::aggregator::CoffeeSource;
use crate::connector::{alloydb_instance_uri, cloudsql_instance_name, ManagedConnector, Protocol};
use crate::pool::{DatabasePool, MySqlDataSource, PoolSettings};

/// Builds a queryable handle for one backend kind.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    /// Connects to the backend described by `info`.
    async fn connect(&self, info: &ConnectionInfo) -> AppResult<Box<dyn CoffeeSource>>;
}

/// AlloyDB: clustered Postgres reached through the managed connector.
pub struct AlloyDbConnector {
    connector: ManagedConnector,
    pool: PoolSettings,
}

#[async_trait]
impl BackendConnector for AlloyDbConnector {
    async fn connect(&self, info: &ConnectionInfo) -> AppResult<Box<dyn CoffeeSource>> {
        let uri = alloydb_instance_uri(info)?;
        let endpoint = self.connector.dial(&uri, Protocol::Postgres);
        tracing::info!(instance = %uri, "connecting to AlloyDB");
        let pool = DatabasePool::connect_postgres(&endpoint, info, self.pool).await?;
        Ok(Box::new(pool))
    }
}

/// Cloud SQL for PostgreSQL, reached through the managed connector.
pub struct CloudSqlPostgresConnector {
    connector: ManagedConnector,
    pool: PoolSettings,
}

#[async_trait]
impl BackendConnector for CloudSqlPostgresConnector {
    async fn connect(&self, info: &ConnectionInfo) -> AppResult<Box<dyn CoffeeSource>> {
        let name = cloudsql_instance_name(info);
        let endpoint = self.connector.dial(&name, Protocol::Postgres);
        tracing::info!(instance = %name, "connecting to Cloud SQL Postgres");
        let pool = DatabasePool::connect_postgres(&endpoint, info, self.pool).await?;
        Ok(Box::new(pool))
    }
}

/// Cloud SQL for MySQL, opened from a data source description.
pub struct CloudSqlMySqlConnector {
    connector: ManagedConnector,
    pool: PoolSettings,
}

#[async_trait]
impl BackendConnector for CloudSqlMySqlConnector {
    async fn connect(&self, info: &ConnectionInfo) -> AppResult<Box<dyn CoffeeSource>> {
        let source = MySqlDataSource::from_info(info);
        let endpoint = self.connector.dial(&source.instance_name(), Protocol::MySql);
        tracing::info!(dsn = %source, "connecting to Cloud SQL MySQL");
        let pool = DatabasePool::connect_mysql(&endpoint, &source, self.pool).await?;
        Ok(Box::new(pool))
    }
}

/// The set of connectors, one per backend kind.
#[derive(Clone)]
pub struct Backends {
    alloydb: Arc<dyn BackendConnector>,
    cloudsql_postgres: Arc<dyn BackendConnector>,
    cloudsql_mysql: Arc<dyn BackendConnector>,
}

impl Backends {
    /// Creates a backend set from explicit connectors.
    pub fn new(
        alloydb: Arc<dyn BackendConnector>,
        cloudsql_postgres: Arc<dyn BackendConnector>,
        cloudsql_mysql: Arc<dyn BackendConnector>,
    ) -> Self {
        Self {
            alloydb,
            cloudsql_postgres,
            cloudsql_mysql,
        }
    }

    /// Production wiring: every backend dials through the managed connector.
    pub fn managed(settings: ConnectorSettings, pool: PoolSettings) -> Self {
        let connector = ManagedConnector::new(settings);
        Self::new(
            Arc::new(AlloyDbConnector {
                connector: connector.clone(),
                pool,
            }),
            Arc::new(CloudSqlPostgresConnector {
                connector: connector.clone(),
                pool,
            }),
            Arc::new(CloudSqlMySqlConnector { connector, pool }),
        )
    }

    /// Returns the connector for `kind`.
    pub fn select(&self, kind: BackendKind) -> Arc<dyn BackendConnector> {
        match kind {
            BackendKind::AlloyDb => self.alloydb.clone(),
            BackendKind::CloudSqlPostgres => self.cloudsql_postgres.clone(),
            BackendKind::CloudSqlMySql => self.cloudsql_mysql.clone(),
        }
    }
}
