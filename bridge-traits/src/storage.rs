//! Settings Storage Abstraction
//!
//! Key-value preferences persisted by the host. The provider priority
//! configuration is stored here as a JSON document.

use async_trait::async_trait;

use crate::error::Result;

/// Key-value settings storage trait
///
/// Platform implementations:
/// - Desktop: SQLite table (`bridge-desktop`)
/// - Mobile: UserDefaults / SharedPreferences
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn save_priorities(store: &dyn SettingsStore, json: &str) -> Result<()> {
///     store.set_string("provider_priorities", json).await
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Delete a setting; deleting a missing key is not an error
    async fn delete(&self, key: &str) -> Result<()>;
}
