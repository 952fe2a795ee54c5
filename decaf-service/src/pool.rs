//! Per-request database pools.
//!
//! Wraps the `sqlx` pool of whichever backend served the request and scans
//! the seeded table into [`CoffeeRow`]s.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use common::errors::{AppError, AppResult};
use common::models::ConnectionInfo;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{Column, MySqlPool, PgPool, Row, TypeInfo};

use crate::aggregator::{CoffeeRow, CoffeeSource, COFFEE_QUERY};
use crate::connector::Endpoint;

// Columns are read by position: 0 = id, 1 = name, 2 = price.
const NAME_COLUMN: usize = 1;
const PRICE_COLUMN: usize = 2;

/// Pool sizing shared by all backends.
#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl PoolSettings {
    pub fn new(connect_timeout_secs: u64) -> Self {
        Self {
            // one query per request
            max_connections: 1,
            acquire_timeout: Duration::from_secs(connect_timeout_secs),
        }
    }
}

/// Connection pool wrapper for the supported wire protocols.
#[derive(Clone)]
pub enum DatabasePool {
    /// PostgreSQL-compatible pool (AlloyDB, Cloud SQL Postgres).
    Postgres(PgPool),
    /// MySQL pool (Cloud SQL MySQL).
    MySQL(MySqlPool),
}

impl DatabasePool {
    /// Opens a Postgres pool through `endpoint`.
    ///
    /// TLS is disabled on the driver side: the managed tunnel already
    /// encrypts the connection.
    pub async fn connect_postgres(
        endpoint: &Endpoint,
        info: &ConnectionInfo,
        settings: PoolSettings,
    ) -> AppResult<Self> {
        let options = PgConnectOptions::new()
            .username(&info.user)
            .password(&info.password)
            .database(&info.db_name)
            .ssl_mode(PgSslMode::Disable);
        let options = match endpoint {
            Endpoint::Socket(dir) => options.socket(dir),
            Endpoint::Tcp { host, port } => options.host(host).port(*port),
        };

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| AppError::ConnectionFailed(e.to_string()))?;
        Ok(DatabasePool::Postgres(pool))
    }

    /// Opens a MySQL pool for `source` through `endpoint`.
    pub async fn connect_mysql(
        endpoint: &Endpoint,
        source: &MySqlDataSource,
        settings: PoolSettings,
    ) -> AppResult<Self> {
        let options = MySqlConnectOptions::new()
            .username(&source.user)
            .password(&source.password)
            .database(&source.db_name)
            .ssl_mode(MySqlSslMode::Disabled);
        let options = match endpoint {
            Endpoint::Socket(path) => options.socket(path),
            Endpoint::Tcp { host, port } => options.host(host).port(*port),
        };

        let pool = MySqlPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| AppError::ConnectionFailed(e.to_string()))?;
        Ok(DatabasePool::MySQL(pool))
    }
}

#[async_trait]
impl CoffeeSource for DatabasePool {
    async fn fetch_rows(&self) -> AppResult<Vec<CoffeeRow>> {
        let rows = match self {
            DatabasePool::Postgres(pool) => {
                let rows = sqlx::query(COFFEE_QUERY)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| AppError::QueryFailed(e.to_string()))?;
                rows.iter()
                    .map(|row| -> Result<CoffeeRow, sqlx::Error> {
                        Ok(CoffeeRow::new(
                            row.try_get::<String, _>(NAME_COLUMN)?,
                            row.try_get::<String, _>(PRICE_COLUMN)?,
                        ))
                    })
                    .collect::<Result<Vec<_>, sqlx::Error>>()
            }
            DatabasePool::MySQL(pool) => {
                let rows = sqlx::query(COFFEE_QUERY)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| AppError::QueryFailed(e.to_string()))?;
                rows.iter()
                    .map(|row| -> Result<CoffeeRow, sqlx::Error> {
                        Ok(CoffeeRow::new(
                            row.try_get::<String, _>(NAME_COLUMN)?,
                            mysql_price_text(row)?,
                        ))
                    })
                    .collect::<Result<Vec<_>, sqlx::Error>>()
            }
        };
        rows.map_err(|e| AppError::QueryFailed(format!("row scan: {}", e)))
    }

    async fn close(&self) {
        match self {
            DatabasePool::Postgres(pool) => pool.close().await,
            DatabasePool::MySQL(pool) => pool.close().await,
        }
    }
}

/// Reads the MySQL price column as text whatever its SQL type, so numeric
/// columns aggregate the same way as character ones.
fn mysql_price_text(row: &MySqlRow) -> Result<String, sqlx::Error> {
    // DECIMAL travels as its decimal text even in the binary protocol.
    if row.try_column(PRICE_COLUMN)?.type_info().name() == "DECIMAL" {
        return row.try_get_unchecked::<String, _>(PRICE_COLUMN);
    }
    row.try_get::<String, _>(PRICE_COLUMN).or_else(|err| {
        row.try_get::<i64, _>(PRICE_COLUMN)
            .map(|v| v.to_string())
            .or_else(|_| row.try_get::<u64, _>(PRICE_COLUMN).map(|v| v.to_string()))
            .or_else(|_| row.try_get::<f64, _>(PRICE_COLUMN).map(|v| v.to_string()))
            .map_err(|_| err)
    })
}

/// Cloud SQL MySQL data source.
///
/// Carries everything needed to reach one database: credentials, the
/// instance connection name and the schema. `Display` renders it in DSN
/// form with the password masked.
#[derive(Clone)]
pub struct MySqlDataSource {
    pub user: String,
    pub password: String,
    pub project: String,
    pub region: String,
    pub instance: String,
    pub db_name: String,
}

impl MySqlDataSource {
    pub fn from_info(info: &ConnectionInfo) -> Self {
        Self {
            user: info.user.clone(),
            password: info.password.clone(),
            project: info.project_id.clone(),
            region: info.region.clone(),
            instance: info.instance.clone(),
            db_name: info.db_name.clone(),
        }
    }

    /// `project:region:instance`
    pub fn instance_name(&self) -> String {
        format!("{}:{}:{}", self.project, self.region, self.instance)
    }
}

impl fmt::Display for MySqlDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:***@cloudsql-mysql({})/{}",
            self.user,
            self.instance_name(),
            self.db_name
        )
    }
}
