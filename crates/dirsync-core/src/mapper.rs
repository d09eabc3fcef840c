//! Group mapper bindings.
//!
//! A mapper names the directory attributes that back group name,
//! description, and membership, and fixes the direction of a sync pass.
//! Mappers are resolved per provider by name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, DirectoryResult};
use crate::ids::ProviderId;

/// How a membership edge identifies the member entry.
///
/// A single resolution function branches on this tag; there is no per-mode
/// subtyping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipMode {
    /// The parent's membership attribute holds member DNs.
    Dn,
    /// The parent's membership attribute holds member UIDs, read from the
    /// member's uid-bearing attribute.
    Uid,
}

impl std::fmt::Display for MembershipMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MembershipMode::Dn => write!(f, "dn"),
            MembershipMode::Uid => write!(f, "uid"),
        }
    }
}

/// Which side is authoritative for group topology during a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupSyncMode {
    /// The directory is authoritative; the local store mirrors it.
    ImportFromDirectory,
    /// The local store is authoritative; the directory mirrors it.
    ExportToLocal,
}

/// Attribute bindings for one group mapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMapperConfig {
    /// Mapper name, unique per provider.
    pub name: String,
    /// Directory attribute backing the group name.
    pub group_name_attribute: String,
    /// Directory attribute backing the group description, if mapped.
    pub description_attribute: Option<String>,
    /// Membership attribute on the parent group entry.
    pub membership_attribute: String,
    /// Uid-bearing attribute on member entries, used in [`MembershipMode::Uid`].
    pub member_uid_attribute: String,
    /// Membership edge mode.
    pub membership_mode: MembershipMode,
    /// Sync direction.
    pub sync_mode: GroupSyncMode,
}

impl GroupMapperConfig {
    /// Create a mapper with directory-authoritative DN membership defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group_name_attribute: "cn".to_string(),
            description_attribute: None,
            membership_attribute: "member".to_string(),
            member_uid_attribute: "uidNumber".to_string(),
            membership_mode: MembershipMode::Dn,
            sync_mode: GroupSyncMode::ImportFromDirectory,
        }
    }

    /// Bind the description attribute.
    #[must_use]
    pub fn with_description_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.description_attribute = Some(attribute.into());
        self
    }

    /// Select the membership mode.
    #[must_use]
    pub fn with_membership_mode(mut self, mode: MembershipMode) -> Self {
        self.membership_mode = mode;
        self
    }

    /// Select the membership attribute on parent entries.
    #[must_use]
    pub fn with_membership_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.membership_attribute = attribute.into();
        self
    }

    /// Select the sync direction.
    #[must_use]
    pub fn with_sync_mode(mut self, mode: GroupSyncMode) -> Self {
        self.sync_mode = mode;
        self
    }
}

/// Resolver for mapper configurations, keyed by provider and mapper name.
#[derive(Debug, Default)]
pub struct MapperRegistry {
    mappers: BTreeMap<(ProviderId, String), GroupMapperConfig>,
}

impl MapperRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the mapper bound under `(provider, config.name)`.
    pub fn add_or_update(&mut self, provider_id: ProviderId, config: GroupMapperConfig) {
        self.mappers.insert((provider_id, config.name.clone()), config);
    }

    /// Resolve the mapper bound to a provider by name.
    pub fn resolve(&self, provider_id: ProviderId, name: &str) -> DirectoryResult<&GroupMapperConfig> {
        self.mappers
            .get(&(provider_id, name.to_string()))
            .ok_or_else(|| DirectoryError::MapperNotFound {
                provider_id,
                name: name.to_string(),
            })
    }
}
