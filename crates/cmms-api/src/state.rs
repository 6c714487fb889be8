//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! ## Architecture
//!
//! - One [`Store`] per record kind, keyed by its identifier newtype.
//! - The equipment tree ([`EquipmentTree`]) alongside the equipment store.
//!   The store holds the full records; the tree holds the structure and
//!   the nested-set index. Both change together, under `equipment_writes`.
//! - The injected [`Clock`] used for completion stamps, overdue checks and
//!   `last_updated` timestamps.
//! - An optional Postgres pool for write-through persistence.
//!
//! Lock order when more than one is held: `equipment_writes` (async), then
//! `equipment_tree`, then any store.
//!
//! Writes apply to the stores before the database write and are reverted if
//! it fails, so other requests can observe a change that is later undone.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use sqlx::PgPool;
use thiserror::Error;

use cmms_core::{
    Clock, Equipment, EquipmentId, Part, PartId, Schedule, ScheduleId, SystemClock, Task, TaskId,
    User, UserId, Vendor, VendorId,
};
use cmms_state::{EquipmentTree, RawNode};

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// All operations are synchronous (the RwLock is `parking_lot`, not `tokio::sync`)
/// because we never hold the lock across `.await` points.
#[derive(Debug)]
pub struct Store<K, T> {
    data: Arc<RwLock<HashMap<K, T>>>,
}

impl<K, T> Clone for Store<K, T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K, T> Store<K, T>
where
    K: Eq + Hash + Copy,
    T: Clone,
{
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: K, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Retrieve a record by ID.
    pub fn get(&self, id: &K) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// List all records.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Records matching `pred`.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data
            .read()
            .values()
            .filter(|v| pred(v))
            .cloned()
            .collect()
    }

    /// Update a record in place. Returns the updated record, or `None` if not found.
    pub fn update(&self, id: &K, f: impl FnOnce(&mut T)) -> Option<T> {
        let mut guard = self.data.write();
        if let Some(entry) = guard.get_mut(id) {
            f(entry);
            Some(entry.clone())
        } else {
            None
        }
    }

    /// Apply `f` to every record, under one write lock.
    pub fn update_all(&self, mut f: impl FnMut(&mut T)) {
        for entry in self.data.write().values_mut() {
            f(entry);
        }
    }

    /// Run `f` against the whole map under a single write lock.
    ///
    /// For read-check-write sequences that touch more than one record,
    /// such as completing a schedule and inserting its successor.
    pub fn transact<R>(&self, f: impl FnOnce(&mut HashMap<K, T>) -> R) -> R {
        f(&mut self.data.write())
    }

    /// Remove a record by ID.
    pub fn remove(&self, id: &K) -> Option<T> {
        self.data.write().remove(id)
    }

    /// Remove every record matching `pred`, returning the removed records.
    pub fn remove_where(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        let mut guard = self.data.write();
        let keys: Vec<K> = guard
            .iter()
            .filter(|(_, v)| pred(v))
            .map(|(k, _)| *k)
            .collect();
        keys.iter().filter_map(|k| guard.remove(k)).collect()
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &K) -> bool {
        self.data.read().contains_key(id)
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, T> Default for Store<K, T>
where
    K: Eq + Hash + Copy,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

// -- Configuration ------------------------------------------------------------

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidLogFormat(other.to_string())),
        }
    }
}

/// Errors reading configuration from the environment.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `PORT` was set but is not a valid port number.
    #[error("PORT must be a port number, got \"{0}\"")]
    InvalidPort(String),

    /// `CMMS_METRICS_PORT` was set but is not a valid port number.
    #[error("CMMS_METRICS_PORT must be a port number, got \"{0}\"")]
    InvalidMetricsPort(String),

    /// `CMMS_LOG_FORMAT` was set to something other than `text` or `json`.
    #[error("CMMS_LOG_FORMAT must be \"text\" or \"json\", got \"{0}\"")]
    InvalidLogFormat(String),
}

/// Application configuration.
///
/// Custom `Debug` redacts the database URL, which may carry credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Postgres URL. `None` runs in in-memory-only mode.
    pub database_url: Option<String>,
    /// Log output format.
    pub log_format: LogFormat,
    /// Port for the Prometheus scrape listener. `None` disables the exporter.
    pub metrics_port: Option<u16>,
}

impl AppConfig {
    /// Read `PORT`, `DATABASE_URL`, `CMMS_LOG_FORMAT` and
    /// `CMMS_METRICS_PORT` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            None => 8080,
        };
        let log_format = match get("CMMS_LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => LogFormat::Text,
        };
        let metrics_port = get("CMMS_METRICS_PORT")
            .map(|raw| {
                raw.trim()
                    .parse::<u16>()
                    .map_err(|_| ConfigError::InvalidMetricsPort(raw.clone()))
            })
            .transpose()?;

        Ok(Self {
            port,
            database_url: get("DATABASE_URL"),
            log_format,
            metrics_port,
        })
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("log_format", &self.log_format)
            .field("metrics_port", &self.metrics_port)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: None,
            log_format: LogFormat::Text,
            metrics_port: None,
        }
    }
}

// -- Application State --------------------------------------------------------

/// Shared application state accessible to all route handlers.
///
/// Clone-friendly via `Arc` internals.
#[derive(Debug, Clone)]
pub struct AppState {
    pub vendors: Store<VendorId, Vendor>,
    pub equipment: Store<EquipmentId, Equipment>,
    pub parts: Store<PartId, Part>,
    pub tasks: Store<TaskId, Task>,
    pub schedules: Store<ScheduleId, Schedule>,
    pub users: Store<UserId, User>,

    /// Structure of the equipment records: parent pointers, name-ordered
    /// children and the nested-set index.
    pub equipment_tree: Arc<RwLock<EquipmentTree>>,

    /// Serializes equipment writes. Held across the database write so a
    /// failed persist can be reverted before anyone else moves a node.
    pub equipment_writes: Arc<tokio::sync::Mutex<()>>,

    /// Time source for completion dates, overdue checks and timestamps.
    pub clock: Arc<dyn Clock>,

    /// PostgreSQL connection pool. When `None`, the API operates in
    /// in-memory-only mode.
    pub db_pool: Option<PgPool>,

    pub config: AppConfig,
}

impl AppState {
    /// Empty in-memory state with default configuration and the system clock.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None)
    }

    /// Empty state with the given configuration and optional pool.
    pub fn with_config(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        Self {
            vendors: Store::new(),
            equipment: Store::new(),
            parts: Store::new(),
            tasks: Store::new(),
            schedules: Store::new(),
            users: Store::new(),
            equipment_tree: Arc::new(RwLock::new(EquipmentTree::new())),
            equipment_writes: Arc::new(tokio::sync::Mutex::new(())),
            clock: Arc::new(SystemClock),
            db_pool,
            config,
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Load equipment records into both the store and the tree.
    ///
    /// The tree is rebuilt from the records' parent pointers, so rows may
    /// come in any order. Fails if the pointers do not form a forest.
    pub fn load_equipment(&self, records: Vec<Equipment>) -> Result<(), cmms_state::HierarchyError> {
        let tree = EquipmentTree::from_raw(records.iter().map(|e| RawNode {
            id: e.id,
            name: e.name.clone(),
            parent: e.parent,
        }))?;
        *self.equipment_tree.write() = tree;
        for record in records {
            self.equipment.insert(record.id, record);
        }
        Ok(())
    }

    /// Hydrate in-memory stores from the database.
    ///
    /// Called once on startup when a database pool is available.
    pub async fn hydrate_from_db(&self) -> Result<(), String> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let vendors = crate::db::vendors::load_all(pool)
            .await
            .map_err(|e| format!("failed to load vendors: {e}"))?;
        let vendor_count = vendors.len();
        for record in vendors {
            self.vendors.insert(record.id, record);
        }

        let equipment = crate::db::equipment::load_all(pool)
            .await
            .map_err(|e| format!("failed to load equipment: {e}"))?;
        let equipment_count = equipment.len();
        self.load_equipment(equipment)
            .map_err(|e| format!("failed to index equipment tree: {e}"))?;

        let parts = crate::db::parts::load_all(pool)
            .await
            .map_err(|e| format!("failed to load parts: {e}"))?;
        let part_count = parts.len();
        for record in parts {
            self.parts.insert(record.id, record);
        }

        let tasks = crate::db::tasks::load_all(pool)
            .await
            .map_err(|e| format!("failed to load tasks: {e}"))?;
        let task_count = tasks.len();
        for record in tasks {
            self.tasks.insert(record.id, record);
        }

        let schedules = crate::db::schedules::load_all(pool)
            .await
            .map_err(|e| format!("failed to load schedules: {e}"))?;
        let schedule_count = schedules.len();
        for record in schedules {
            self.schedules.insert(record.id, record);
        }

        let users = crate::db::users::load_all(pool)
            .await
            .map_err(|e| format!("failed to load users: {e}"))?;
        let user_count = users.len();
        for record in users {
            self.users.insert(record.id, record);
        }

        tracing::info!(
            vendors = vendor_count,
            equipment = equipment_count,
            parts = part_count,
            tasks = task_count,
            schedules = schedule_count,
            users = user_count,
            "Hydrated in-memory stores from database"
        );

        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
