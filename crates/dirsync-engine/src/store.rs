//! Local identity store.
//!
//! The local side of the synchronization: a path-keyed group tree, users,
//! and the set of default groups granted to users created afterwards. The
//! [`LocalIdentityStore`] trait is the seam the sync engine writes through;
//! [`MemoryIdentityStore`] is the in-memory implementation the harness and
//! tests run against.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use dirsync_core::error::{DirectoryError, DirectoryResult};

/// Outcome of an upsert against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The entry did not exist and was created.
    Created,
    /// The entry existed with different content and was rewritten.
    Updated,
    /// The entry existed with identical content; nothing was written.
    Unchanged,
}

/// One group in the local tree, keyed by its slash-separated path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalGroup {
    /// Full path, e.g. "/group1/group11".
    pub path: String,
    /// Leaf name, the last path segment.
    pub name: String,
    /// Description, when one was mapped from the directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LocalGroup {
    /// Build a group from its path, deriving the leaf name.
    pub fn new(path: impl Into<String>, description: Option<String>) -> DirectoryResult<Self> {
        let path = path.into();
        let name = leaf_name(&path)?.to_string();
        Ok(Self {
            path,
            name,
            description,
        })
    }
}

/// Parent path of `path`, or `None` for a top-level group.
pub fn parent_path(path: &str) -> Option<&str> {
    let idx = path.rfind('/')?;
    if idx == 0 {
        None
    } else {
        Some(&path[..idx])
    }
}

fn leaf_name(path: &str) -> DirectoryResult<&str> {
    validate_path(path)?;
    Ok(path.rsplit('/').next().unwrap_or_default())
}

fn validate_path(path: &str) -> DirectoryResult<()> {
    if !path.starts_with('/') || path.ends_with('/') || path.split('/').skip(1).any(str::is_empty)
    {
        return Err(DirectoryError::invalid_data(format!(
            "invalid group path '{path}'"
        )));
    }
    Ok(())
}

/// Store of local groups, users, and default-group designations.
#[async_trait]
pub trait LocalIdentityStore: Send + Sync {
    /// Create or update the group at `path`. The parent path must already
    /// exist. Returns whether anything changed.
    async fn upsert_group(
        &self,
        path: &str,
        description: Option<String>,
    ) -> DirectoryResult<UpsertOutcome>;

    /// Delete the group at `path`. The group must exist and have no
    /// children.
    async fn delete_group(&self, path: &str) -> DirectoryResult<()>;

    /// The group at `path`.
    async fn group(&self, path: &str) -> DirectoryResult<LocalGroup>;

    /// Every group path, sorted.
    async fn group_paths(&self) -> Vec<String>;

    /// Designate an existing group as a default group for new users.
    async fn set_default_group(&self, path: &str) -> DirectoryResult<()>;

    /// The designated default group paths, sorted.
    async fn default_groups(&self) -> Vec<String>;

    /// Create or update a user. A newly created user is granted every
    /// currently designated default group.
    async fn upsert_user(&self, username: &str, email: Option<&str>) -> DirectoryResult<()>;

    /// Group paths the user belongs to, sorted.
    async fn user_groups(&self, username: &str) -> DirectoryResult<Vec<String>>;

    /// Set the user's local credential.
    async fn set_credential(&self, username: &str, secret: &str) -> DirectoryResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LocalUser {
    email: Option<String>,
    credential: Option<String>,
    groups: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct StoreInner {
    groups: BTreeMap<String, LocalGroup>,
    users: BTreeMap<String, LocalUser>,
    default_groups: BTreeSet<String>,
}

/// In-memory [`LocalIdentityStore`].
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    inner: RwLock<StoreInner>,
}

impl MemoryIdentityStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The user's stored credential, for assertions.
    pub async fn credential(&self, username: &str) -> Option<String> {
        let inner = self.inner.read().await;
        inner.users.get(username).and_then(|u| u.credential.clone())
    }
}

#[async_trait]
impl LocalIdentityStore for MemoryIdentityStore {
    async fn upsert_group(
        &self,
        path: &str,
        description: Option<String>,
    ) -> DirectoryResult<UpsertOutcome> {
        let group = LocalGroup::new(path, description)?;
        let mut inner = self.inner.write().await;

        if let Some(parent) = parent_path(path) {
            if !inner.groups.contains_key(parent) {
                return Err(DirectoryError::invalid_data(format!(
                    "parent group '{parent}' of '{path}' does not exist"
                )));
            }
        }

        match inner.groups.get(path) {
            Some(existing) if *existing == group => Ok(UpsertOutcome::Unchanged),
            Some(_) => {
                inner.groups.insert(path.to_string(), group);
                debug!(path, "Updated local group");
                Ok(UpsertOutcome::Updated)
            }
            None => {
                inner.groups.insert(path.to_string(), group);
                debug!(path, "Created local group");
                Ok(UpsertOutcome::Created)
            }
        }
    }

    async fn delete_group(&self, path: &str) -> DirectoryResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.groups.contains_key(path) {
            return Err(DirectoryError::not_found(path));
        }
        let child_prefix = format!("{path}/");
        if inner.groups.keys().any(|p| p.starts_with(&child_prefix)) {
            return Err(DirectoryError::invalid_data(format!(
                "group '{path}' still has children"
            )));
        }
        inner.groups.remove(path);
        inner.default_groups.remove(path);
        for user in inner.users.values_mut() {
            user.groups.remove(path);
        }
        debug!(path, "Deleted local group");
        Ok(())
    }

    async fn group(&self, path: &str) -> DirectoryResult<LocalGroup> {
        let inner = self.inner.read().await;
        inner
            .groups
            .get(path)
            .cloned()
            .ok_or_else(|| DirectoryError::not_found(path))
    }

    async fn group_paths(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        inner.groups.keys().cloned().collect()
    }

    async fn set_default_group(&self, path: &str) -> DirectoryResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.groups.contains_key(path) {
            return Err(DirectoryError::not_found(path));
        }
        inner.default_groups.insert(path.to_string());
        info!(path, "Designated default group");
        Ok(())
    }

    async fn default_groups(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        inner.default_groups.iter().cloned().collect()
    }

    async fn upsert_user(&self, username: &str, email: Option<&str>) -> DirectoryResult<()> {
        let mut inner = self.inner.write().await;
        match inner.users.get_mut(username) {
            Some(user) => {
                if let Some(email) = email {
                    user.email = Some(email.to_string());
                }
            }
            None => {
                let groups = inner.default_groups.clone();
                inner.users.insert(
                    username.to_string(),
                    LocalUser {
                        email: email.map(str::to_string),
                        credential: None,
                        groups,
                    },
                );
                debug!(username, "Created local user");
            }
        }
        Ok(())
    }

    async fn user_groups(&self, username: &str) -> DirectoryResult<Vec<String>> {
        let inner = self.inner.read().await;
        inner
            .users
            .get(username)
            .map(|u| u.groups.iter().cloned().collect())
            .ok_or_else(|| DirectoryError::not_found(username))
    }

    async fn set_credential(&self, username: &str, secret: &str) -> DirectoryResult<()> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .get_mut(username)
            .ok_or_else(|| DirectoryError::not_found(username))?;
        user.credential = Some(secret.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("/group1/group11"), Some("/group1"));
        assert_eq!(parent_path("/group1"), None);
    }

    #[tokio::test]
    async fn test_upsert_group_outcomes() {
        let store = MemoryIdentityStore::new();
        assert_eq!(
            store.upsert_group("/group1", None).await.unwrap(),
            UpsertOutcome::Created
        );
        assert_eq!(
            store.upsert_group("/group1", None).await.unwrap(),
            UpsertOutcome::Unchanged
        );
        assert_eq!(
            store
                .upsert_group("/group1", Some("group1 - description".to_string()))
                .await
                .unwrap(),
            UpsertOutcome::Updated
        );
    }

    #[tokio::test]
    async fn test_upsert_group_requires_parent() {
        let store = MemoryIdentityStore::new();
        let err = store.upsert_group("/group1/group11", None).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DATA");

        store.upsert_group("/group1", None).await.unwrap();
        store.upsert_group("/group1/group11", None).await.unwrap();
        let group = store.group("/group1/group11").await.unwrap();
        assert_eq!(group.name, "group11");
    }

    #[tokio::test]
    async fn test_invalid_paths_rejected() {
        let store = MemoryIdentityStore::new();
        for path in ["group1", "/group1/", "//group1", ""] {
            let err = store.upsert_group(path, None).await.unwrap_err();
            assert_eq!(err.error_code(), "INVALID_DATA", "path {path:?}");
        }
    }

    #[tokio::test]
    async fn test_delete_group_leaf_only() {
        let store = MemoryIdentityStore::new();
        store.upsert_group("/group1", None).await.unwrap();
        store.upsert_group("/group1/group11", None).await.unwrap();

        let err = store.delete_group("/group1").await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DATA");

        store.delete_group("/group1/group11").await.unwrap();
        store.delete_group("/group1").await.unwrap();
        assert!(store.group_paths().await.is_empty());

        let err = store.delete_group("/group1").await.unwrap_err();
        assert_eq!(err.error_code(), "OBJECT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_default_group_requires_existing_group() {
        let store = MemoryIdentityStore::new();
        let err = store.set_default_group("/missing").await.unwrap_err();
        assert_eq!(err.error_code(), "OBJECT_NOT_FOUND");

        store.upsert_group("/defaultGroup1", None).await.unwrap();
        store.set_default_group("/defaultGroup1").await.unwrap();
        assert_eq!(store.default_groups().await, vec!["/defaultGroup1".to_string()]);
    }

    #[tokio::test]
    async fn test_new_users_granted_default_groups() {
        let store = MemoryIdentityStore::new();
        store.upsert_group("/defaultGroup1", None).await.unwrap();
        store
            .upsert_group("/defaultGroup1/defaultGroup11", None)
            .await
            .unwrap();
        store
            .set_default_group("/defaultGroup1/defaultGroup11")
            .await
            .unwrap();

        // Created before the designation: no grant.
        // (johnkeycloak exists already, davidkeycloak arrives afterwards.)
        store.upsert_user("davidkeycloak", None).await.unwrap();
        assert_eq!(
            store.user_groups("davidkeycloak").await.unwrap(),
            vec!["/defaultGroup1/defaultGroup11".to_string()]
        );

        // Upserting an existing user never re-applies defaults.
        store
            .set_default_group("/defaultGroup1")
            .await
            .unwrap();
        store.upsert_user("davidkeycloak", None).await.unwrap();
        assert_eq!(
            store.user_groups("davidkeycloak").await.unwrap(),
            vec!["/defaultGroup1/defaultGroup11".to_string()]
        );
    }

    #[tokio::test]
    async fn test_credentials() {
        let store = MemoryIdentityStore::new();
        let err = store.set_credential("mary", "password-app").await.unwrap_err();
        assert_eq!(err.error_code(), "OBJECT_NOT_FOUND");

        store.upsert_user("mary", None).await.unwrap();
        store.set_credential("mary", "password-app").await.unwrap();
        assert_eq!(store.credential("mary").await.as_deref(), Some("password-app"));
    }

    #[tokio::test]
    async fn test_deleting_group_revokes_membership() {
        let store = MemoryIdentityStore::new();
        store.upsert_group("/group1", None).await.unwrap();
        store.set_default_group("/group1").await.unwrap();
        store.upsert_user("john", None).await.unwrap();
        assert_eq!(store.user_groups("john").await.unwrap(), vec!["/group1".to_string()]);

        store.delete_group("/group1").await.unwrap();
        assert!(store.user_groups("john").await.unwrap().is_empty());
        assert!(store.default_groups().await.is_empty());
    }
}
