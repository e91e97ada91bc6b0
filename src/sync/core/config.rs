//! Configuration for the synchronization layer.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::sync::core::errors::{SyncError, SyncResult};

/// Top-level configuration for the sync engine.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Who the local user is.
    pub identity: IdentityConfig,
    /// Conversation store bounds.
    pub store: StoreConfig,
    /// Page sizes and auto-fill limits.
    pub pagination: PaginationConfig,
    /// Duplicate-detection windows.
    pub reconcile: ReconcileConfig,
    /// Durable side-store for continuation tags.
    pub tags: TagConfig,
}

impl SyncConfig {
    /// Load a configuration from a JSON file. Missing sections use defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or fails validation.
    pub fn from_json_file(path: &Path) -> SyncResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CHAT_SYNC_*` overrides using the given variable lookup.
    ///
    /// # Errors
    /// Returns an error if an override is present but cannot be parsed.
    pub fn apply_env<F>(mut self, lookup: F) -> SyncResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(user) = lookup("CHAT_SYNC_LOCAL_USER") {
            let user = user.trim().to_string();
            self.identity.local_user_id = (!user.is_empty()).then_some(user);
        }
        if let Some(path) = lookup("CHAT_SYNC_SQLITE_PATH") {
            self.tags.sqlite_path = PathBuf::from(path);
        }
        if let Some(value) = lookup("CHAT_SYNC_MAX_CONVERSATIONS") {
            self.store.max_conversations = parse_override("CHAT_SYNC_MAX_CONVERSATIONS", &value)?;
        }
        if let Some(value) = lookup("CHAT_SYNC_MAX_MESSAGES") {
            self.store.max_messages_per_conversation =
                parse_override("CHAT_SYNC_MAX_MESSAGES", &value)?;
        }
        if let Some(value) = lookup("CHAT_SYNC_MESSAGE_PAGE_SIZE") {
            self.pagination.message_page_size =
                parse_override("CHAT_SYNC_MESSAGE_PAGE_SIZE", &value)?;
        }
        if let Some(value) = lookup("CHAT_SYNC_NOTIFICATION_PAGE_SIZE") {
            self.pagination.notification_page_size =
                parse_override("CHAT_SYNC_NOTIFICATION_PAGE_SIZE", &value)?;
        }
        Ok(self)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> SyncResult<()> {
        if self.store.max_messages_per_conversation == 0 {
            return Err(SyncError::InvalidConfig(
                "store.max_messages_per_conversation must be > 0".to_string(),
            ));
        }

        if self.store.max_conversations == 0 {
            return Err(SyncError::InvalidConfig(
                "store.max_conversations must be > 0".to_string(),
            ));
        }

        if self.pagination.message_page_size == 0 {
            return Err(SyncError::InvalidConfig(
                "pagination.message_page_size must be > 0".to_string(),
            ));
        }

        if self.pagination.notification_page_size == 0 {
            return Err(SyncError::InvalidConfig(
                "pagination.notification_page_size must be > 0".to_string(),
            ));
        }

        if self.pagination.autofill_max_consecutive == 0 {
            return Err(SyncError::InvalidConfig(
                "pagination.autofill_max_consecutive must be > 0".to_string(),
            ));
        }

        if self.tags.storage_key.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "tags.storage_key must not be empty".to_string(),
            ));
        }

        if !self
            .tags
            .table
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
            || self.tags.table.is_empty()
        {
            return Err(SyncError::InvalidConfig(format!(
                "tags.table must be a plain identifier, got {:?}",
                self.tags.table
            )));
        }

        Ok(())
    }
}

fn parse_override<T: FromStr>(name: &str, value: &str) -> SyncResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SyncError::InvalidConfig(format!("{name} has an invalid value: {value:?}")))
}

/// Local identity settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Sender id of the local user; messages from it never count as unread.
    pub local_user_id: Option<String>,
}

/// Conversation store bounds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Newest messages kept per conversation.
    pub max_messages_per_conversation: usize,
    /// Conversations kept before least-recently-used eviction.
    pub max_conversations: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_messages_per_conversation: 500,
            max_conversations: 100,
        }
    }
}

/// Pagination settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Messages requested per page.
    pub message_page_size: usize,
    /// Notifications requested per page.
    pub notification_page_size: usize,
    /// Minimum delay between automatic viewport-fill loads.
    pub autofill_cooldown_ms: u64,
    /// Hard cap on consecutive automatic loads.
    pub autofill_max_consecutive: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            message_page_size: 20,
            notification_page_size: 2,
            autofill_cooldown_ms: 250,
            autofill_max_consecutive: 5,
        }
    }
}

/// Time windows used by the duplicate heuristics.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Max distance between an optimistic message and its server echo.
    pub optimistic_window_ms: i64,
    /// Max distance for the render-layer near-duplicate check.
    pub render_window_ms: i64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            optimistic_window_ms: 60_000,
            render_window_ms: 2_000,
        }
    }
}

/// Durable side-store settings for continuation tags.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
    /// Key-value table name.
    pub table: String,
    /// Key under which the whole tag map is stored.
    pub storage_key: String,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("chat_sync.sqlite"),
            table: "kv_store".to_string(),
            storage_key: "chat_sync:i_tags".to_string(),
        }
    }
}
