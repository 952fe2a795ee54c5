//! Data-Driven Decaf domain models.
//!
//! Contains the backend selector, the validated connection parameters and
//! the aggregate reported to the verification service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::config::DbSettings;
use crate::errors::{AppError, AppResult};

/// Managed database backend kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
pub enum BackendKind {
    /// Clustered Postgres-compatible database (AlloyDB).
    #[serde(rename = "ALLOY_DB")]
    AlloyDb,
    /// Managed standalone Postgres instance.
    #[serde(rename = "CLOUD_SQL_POSTGRES")]
    CloudSqlPostgres,
    /// Managed MySQL instance.
    #[serde(rename = "CLOUD_SQL_MYSQL")]
    CloudSqlMySql,
}

impl BackendKind {
    /// All recognised kinds.
    pub const ALL: [BackendKind; 3] = [
        BackendKind::AlloyDb,
        BackendKind::CloudSqlPostgres,
        BackendKind::CloudSqlMySql,
    ];

    /// Returns the `DB_TYPE` literal for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::AlloyDb => "ALLOY_DB",
            BackendKind::CloudSqlPostgres => "CLOUD_SQL_POSTGRES",
            BackendKind::CloudSqlMySql => "CLOUD_SQL_MYSQL",
        }
    }

    /// Checks the fields only this kind requires.
    ///
    /// # Errors
    /// Returns `AppError::ClusterRequired` for the clustered backend when no
    /// cluster is configured.
    pub fn check(&self, info: &ConnectionInfo) -> AppResult<()> {
        match self {
            BackendKind::AlloyDb if info.cluster.is_none() => Err(AppError::ClusterRequired),
            BackendKind::AlloyDb | BackendKind::CloudSqlPostgres | BackendKind::CloudSqlMySql => {
                Ok(())
            }
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| AppError::UnknownBackend(s.to_string()))
    }
}

/// Validated database connection parameters.
///
/// Built once per request from the startup snapshot of the environment.
#[derive(Clone, Validate)]
pub struct ConnectionInfo {
    #[validate(length(min = 1))]
    pub user: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[validate(length(min = 1))]
    pub db_name: String,
    pub region: String,
    /// Only required by the clustered backend.
    pub cluster: Option<String>,
    #[validate(length(min = 1))]
    pub instance: String,
    pub project_id: String,
}

impl ConnectionInfo {
    /// Resolves connection parameters, falling back to `default_project`
    /// when `DB_PROJECT` is unset.
    ///
    /// # Errors
    /// Returns `AppError::ConfigurationMissing` when user, password, database
    /// name or instance is empty.
    pub fn resolve(settings: &DbSettings, default_project: &str) -> AppResult<Self> {
        let owned = |v: &Option<String>| v.clone().unwrap_or_default();

        let info = Self {
            user: owned(&settings.user),
            password: owned(&settings.password),
            db_name: owned(&settings.name),
            region: owned(&settings.region),
            cluster: settings.cluster.clone().filter(|c| !c.is_empty()),
            instance: owned(&settings.instance),
            project_id: settings
                .project
                .clone()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| default_project.to_string()),
        };

        if let Err(errors) = info.validate() {
            let mut unset: Vec<&str> = errors
                .field_errors()
                .keys()
                .map(|field| env_name(field))
                .collect();
            unset.sort_unstable();
            return Err(AppError::ConfigurationMissing(format!(
                "DB_USER, DB_PASS, DB_NAME and DB_INSTANCE are required (unset: {})",
                unset.join(", ")
            )));
        }
        Ok(info)
    }
}

fn env_name(field: &str) -> &'static str {
    match field {
        "user" => "DB_USER",
        "password" => "DB_PASS",
        "db_name" => "DB_NAME",
        "instance" => "DB_INSTANCE",
        _ => "unknown",
    }
}

impl fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("user", &self.user)
            .field("password", &"***")
            .field("db_name", &self.db_name)
            .field("region", &self.region)
            .field("cluster", &self.cluster)
            .field("instance", &self.instance)
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// Summary computed from the seeded table and sent for verification.
///
/// Empty strings and a zero total are omitted from the JSON form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AggregateResult {
    /// Name found at the sentinel row.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub magic_coffee: String,
    /// Sum of the integer parts of every parseable price.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub total: i64,
    /// Platform project id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project: String,
    /// Backend kind literal.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub db: String,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}
