//! Local state file management
//!
//! Manages the `.awsflow/state.json` file which caches the last-known
//! record of every managed resource. The remote service stays the
//! authority; this file is what plan compares against.

use crate::error::{CloudError, Result};
use crate::value::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".awsflow";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const STATE_STAGING: &str = "state.json.tmp";
const LOCK_FILE: &str = "lock.json";

/// Every managed block's last-known record, keyed by block address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Managed resources indexed by `type.name`
    pub resources: BTreeMap<String, ResourceState>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get resources of a specific type
    pub fn resources_of_type(&self, resource_type: &str) -> Vec<(&String, &ResourceState)> {
        self.resources
            .iter()
            .filter(|(_, r)| r.resource_type == resource_type)
            .collect()
    }

    /// Add or update a resource
    pub fn set_resource(&mut self, address: String, state: ResourceState) {
        self.resources.insert(address, state);
        self.updated_at = Utc::now();
    }

    /// Records a refreshed or applied record, keeping the original creation time
    pub fn record(&mut self, address: &str, resource_type: &str, attributes: State) {
        let now = Utc::now();
        match self.resources.get_mut(address) {
            Some(existing) => {
                existing.id = id_attribute(&attributes);
                existing.attributes = attributes;
                existing.updated_at = now;
            }
            None => {
                let state = ResourceState::new(id_attribute(&attributes), resource_type)
                    .with_attributes(attributes);
                self.resources.insert(address.to_string(), state);
            }
        }
        self.updated_at = now;
    }

    /// Remove a resource
    pub fn remove_resource(&mut self, address: &str) -> Option<ResourceState> {
        let result = self.resources.remove(address);
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }

    /// Get a resource by address
    pub fn get_resource(&self, address: &str) -> Option<&ResourceState> {
        self.resources.get(address)
    }
}

fn id_attribute(attributes: &State) -> String {
    attributes
        .get("id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// State of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Remote identifier (the record's `id`)
    pub id: String,

    /// Resource type
    pub resource_type: String,

    /// The full attribute record
    pub attributes: State,

    /// When the resource was created
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            attributes: State::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_attributes(mut self, attributes: State) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Reads and writes the state file under a project root
pub struct StateManager {
    root: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root: project_root.as_ref().join(STATE_DIR),
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.root.join(STATE_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root).await?;
            tracing::debug!("Created state directory: {}", self.root.display());
        }
        Ok(())
    }

    /// Load the current state; a missing file is an empty state
    pub async fn load(&self) -> Result<GlobalState> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(GlobalState::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: GlobalState = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state with {} resources", state.resources.len());
        Ok(state)
    }

    /// Save the state, keeping the previous file as a backup
    ///
    /// The new content is written to a temporary file first and renamed
    /// into place, so an interrupted save leaves the old state readable.
    pub async fn save(&self, state: &GlobalState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let staging = self.root.join(STATE_STAGING);
        let content = serde_json::to_string_pretty(state)?;
        fs::write(&staging, content).await?;

        if path.exists() {
            fs::copy(&path, self.backup_path()).await?;
        }
        fs::rename(&staging, &path).await?;

        tracing::debug!("Saved state with {} resources", state.resources.len());
        Ok(())
    }

    /// Acquire a lock for exclusive access
    ///
    /// A lock older than [`STALE_LOCK_HOURS`] is taken over.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();
        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };

        let mut file = match create_lock_file(&lock_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                remove_stale_lock(&lock_path).await?;
                create_lock_file(&lock_path).await.map_err(|e| {
                    if e.kind() == ErrorKind::AlreadyExists {
                        CloudError::LockError("State lock was taken by another process".to_string())
                    } else {
                        e.into()
                    }
                })?
            }
            Err(e) => return Err(e.into()),
        };

        let lock = StateLock {
            lock_path,
            released: false,
        };
        file.write_all(serde_json::to_string_pretty(&lock_info)?.as_bytes())
            .await?;
        file.flush().await?;

        tracing::debug!("Acquired state lock");
        Ok(lock)
    }
}

/// Creates the lock file, failing with `AlreadyExists` if another holder has it
async fn create_lock_file(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
}

/// Removes the lock file if its holder is older than [`STALE_LOCK_HOURS`]
async fn remove_stale_lock(path: &Path) -> Result<()> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let lock_info: LockInfo = serde_json::from_str(&content).map_err(|_| {
        CloudError::LockError(format!(
            "State is locked ({} is being written or unreadable)",
            path.display()
        ))
    })?;

    let age = Utc::now().signed_duration_since(lock_info.acquired_at);
    if age.num_hours() < STALE_LOCK_HOURS {
        return Err(CloudError::LockError(format!(
            "State is locked by {} (pid {}) since {}",
            lock_info.holder, lock_info.pid, lock_info.acquired_at
        )));
    }

    tracing::warn!("Removing stale lock from {}", lock_info.holder);
    match fs::remove_file(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

pub const STALE_LOCK_HOURS: i64 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// Lock guard; dropping it without [`StateLock::release`] still removes the file
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
