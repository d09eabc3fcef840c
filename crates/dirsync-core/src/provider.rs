//! Provider configuration model and registry.
//!
//! A [`ProviderConfig`] describes one registered directory connection: its
//! raw multi-valued settings, sync policy, and cache policy. Configs are
//! immutable once registered. The registry is explicit context passed into
//! callers, never ambient global state, so several fixtures can coexist in
//! one process.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DirectoryError, DirectoryResult};
use crate::ids::ProviderId;

/// Settings key forcing self-registration of provisioned principals.
pub const SYNC_REGISTRATIONS: &str = "syncRegistrations";

/// Settings key selecting the provider edit mode.
pub const EDIT_MODE: &str = "editMode";

/// Provider-type tag for LDAP-style directories.
pub const PROVIDER_TYPE_LDAP: &str = "ldap";

/// Display name given to every provider this harness registers.
const PROVIDER_DISPLAY_NAME: &str = "test-ldap";

/// Sentinel meaning a periodic sync is disabled.
const SYNC_PERIOD_DISABLED: i64 = -1;

/// How the local store may edit directory-backed principals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditMode {
    /// Directory entries are never written.
    ReadOnly,
    /// Directory entries are created and updated in place.
    Writable,
    /// Local edits are kept out of the directory.
    Unsynced,
}

impl std::fmt::Display for EditMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditMode::ReadOnly => write!(f, "READ_ONLY"),
            EditMode::Writable => write!(f, "WRITABLE"),
            EditMode::Unsynced => write!(f, "UNSYNCED"),
        }
    }
}

/// Cache policy applied to principals resolved through a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CachePolicy {
    /// Never cache.
    NoCache,
    /// Cache entries for at most the given lifespan.
    MaxLifespan { lifespan: Duration },
}

/// Ordered multi-valued settings map.
///
/// Keys are unique, values keep their insertion order. Single-valued helpers
/// replace the whole value list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderSettings {
    entries: BTreeMap<String, Vec<String>>,
}

impl ProviderSettings {
    /// Create an empty settings map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the values under `key` with exactly one value.
    pub fn put_single(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), vec![value.into()]);
    }

    /// Append a value under `key`, preserving existing values.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(key.into()).or_default().push(value.into());
    }

    /// Get the first value under `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    /// Get all values under `key`.
    pub fn all(&self, key: &str) -> &[String] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Check whether any value is present under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Check whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl FromIterator<(String, String)> for ProviderSettings {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut settings = Self::new();
        for (key, value) in iter {
            settings.add(key, value);
        }
        settings
    }
}

/// One registered directory provider.
///
/// Created by [`ProviderRegistry::register`] and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    id: ProviderId,
    name: String,
    provider_type: String,
    settings: ProviderSettings,
    import_enabled: bool,
    priority: i32,
    cache_policy: CachePolicy,
    changed_sync_period: i64,
    full_sync_period: i64,
    last_sync: DateTime<Utc>,
}

impl ProviderConfig {
    /// Provider id, assigned at registration.
    pub fn id(&self) -> ProviderId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Provider-type tag.
    pub fn provider_type(&self) -> &str {
        &self.provider_type
    }

    /// Raw connection settings.
    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Whether principals are imported into the local store.
    pub fn import_enabled(&self) -> bool {
        self.import_enabled
    }

    /// Whether provisioned principals self-register in the directory.
    pub fn sync_registrations(&self) -> bool {
        self.settings.first(SYNC_REGISTRATIONS) == Some("true")
    }

    /// Edit mode recorded in the settings.
    pub fn edit_mode(&self) -> Option<&str> {
        self.settings.first(EDIT_MODE)
    }

    /// Priority; lower sorts first.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Cache policy.
    pub fn cache_policy(&self) -> CachePolicy {
        self.cache_policy
    }

    /// Changed-entries sync period; negative means disabled.
    pub fn changed_sync_period(&self) -> i64 {
        self.changed_sync_period
    }

    /// Full sync period; negative means disabled.
    pub fn full_sync_period(&self) -> i64 {
        self.full_sync_period
    }

    /// Timestamp of the last completed sync; epoch when never synced.
    pub fn last_sync(&self) -> DateTime<Utc> {
        self.last_sync
    }
}

/// Registry of provider configurations for one fixture run.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<ProviderId, ProviderConfig>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a directory provider from raw connection settings.
    ///
    /// Any caller-supplied `syncRegistrations` or `editMode` values are
    /// overridden: this harness always needs write-capable, self-registering
    /// provisioning. The fresh config gets priority 0, a 10-minute
    /// max-lifespan cache policy, disabled periodic syncs, and an epoch
    /// last-sync timestamp.
    ///
    /// Registration is a single atomic call; there are no retries.
    pub fn register(
        &mut self,
        mut settings: ProviderSettings,
        import_enabled: bool,
    ) -> DirectoryResult<ProviderId> {
        if settings.is_empty() {
            return Err(DirectoryError::invalid_config(
                "provider settings must not be empty",
            ));
        }

        settings.put_single(SYNC_REGISTRATIONS, "true");
        settings.put_single(EDIT_MODE, EditMode::Writable.to_string());

        let config = ProviderConfig {
            id: ProviderId::new(),
            name: PROVIDER_DISPLAY_NAME.to_string(),
            provider_type: PROVIDER_TYPE_LDAP.to_string(),
            settings,
            import_enabled,
            priority: 0,
            cache_policy: CachePolicy::MaxLifespan {
                lifespan: Duration::from_secs(600),
            },
            changed_sync_period: SYNC_PERIOD_DISABLED,
            full_sync_period: SYNC_PERIOD_DISABLED,
            last_sync: DateTime::<Utc>::UNIX_EPOCH,
        };

        let id = config.id();
        info!(provider_id = %id, import_enabled, "Registered directory provider");
        self.providers.insert(id, config);
        Ok(id)
    }

    /// Look up a registered provider.
    pub fn get(&self, id: ProviderId) -> DirectoryResult<&ProviderConfig> {
        self.providers
            .get(&id)
            .ok_or(DirectoryError::ProviderNotFound { provider_id: id })
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_settings() -> ProviderSettings {
        let mut settings = ProviderSettings::new();
        settings.put_single("bindDn", "cn=admin,dc=test,dc=local");
        settings.put_single("baseDn", "dc=test,dc=local");
        settings
    }

    #[test]
    fn test_settings_ordered_multi_values() {
        let mut settings = ProviderSettings::new();
        settings.add("userObjectClasses", "inetOrgPerson");
        settings.add("userObjectClasses", "organizationalPerson");
        assert_eq!(
            settings.all("userObjectClasses"),
            &["inetOrgPerson".to_string(), "organizationalPerson".to_string()]
        );
        settings.put_single("userObjectClasses", "person");
        assert_eq!(settings.all("userObjectClasses"), &["person".to_string()]);
    }

    #[test]
    fn test_register_overrides_sync_and_edit_mode() {
        let mut settings = base_settings();
        settings.put_single(SYNC_REGISTRATIONS, "false");
        settings.put_single(EDIT_MODE, "READ_ONLY");

        let mut registry = ProviderRegistry::new();
        let id = registry.register(settings, false).unwrap();
        let config = registry.get(id).unwrap();

        assert!(config.sync_registrations());
        assert_eq!(config.edit_mode(), Some("WRITABLE"));
        assert!(!config.import_enabled());
    }

    #[test]
    fn test_register_defaults() {
        let mut registry = ProviderRegistry::new();
        let id = registry.register(base_settings(), true).unwrap();
        let config = registry.get(id).unwrap();

        assert_eq!(config.id(), id);
        assert_eq!(config.name(), "test-ldap");
        assert_eq!(config.provider_type(), "ldap");
        assert_eq!(config.priority(), 0);
        assert_eq!(config.changed_sync_period(), -1);
        assert_eq!(config.full_sync_period(), -1);
        assert_eq!(config.last_sync(), DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(
            config.cache_policy(),
            CachePolicy::MaxLifespan {
                lifespan: Duration::from_secs(600)
            }
        );
    }

    #[test]
    fn test_register_empty_settings_is_configuration_error() {
        let mut registry = ProviderRegistry::new();
        let err = registry.register(ProviderSettings::new(), false).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_unknown_provider_lookup() {
        let registry = ProviderRegistry::new();
        let err = registry.get(ProviderId::new()).unwrap_err();
        assert_eq!(err.error_code(), "PROVIDER_NOT_FOUND");
    }
}
