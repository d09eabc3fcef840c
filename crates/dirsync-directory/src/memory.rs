//! In-memory directory backend.
//!
//! Implements [`DirectoryClient`] with the same error contract as the LDAP
//! backend, so fixtures can run hermetically. An availability switch lets
//! callers simulate an unreachable server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use dirsync_core::error::{DirectoryError, DirectoryResult};

use crate::client::{DirectoryClient, UpdateMode};
use crate::object::{DirectoryObject, Dn};

/// In-memory [`DirectoryClient`] implementation.
#[derive(Debug)]
pub struct MemoryDirectory {
    // Keyed by normalized DN.
    entries: RwLock<HashMap<String, DirectoryObject>>,
    available: AtomicBool,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDirectory {
    /// Create an empty, available directory.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle availability. While unavailable every operation fails with a
    /// connection error.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the directory holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn check_available(&self) -> DirectoryResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DirectoryError::connection_failed("directory unavailable"))
        }
    }
}

#[async_trait]
impl DirectoryClient for MemoryDirectory {
    async fn create_entry(&self, object: DirectoryObject) -> DirectoryResult<()> {
        self.check_available()?;
        let key = object.dn.normalized();
        let mut entries = self.entries.write().await;
        if entries.contains_key(&key) {
            return Err(DirectoryError::conflict(object.dn.as_str()));
        }
        debug!(dn = %object.dn, "Created directory entry");
        entries.insert(key, object);
        Ok(())
    }

    async fn read_entry(&self, dn: &Dn) -> DirectoryResult<DirectoryObject> {
        self.check_available()?;
        self.entries
            .read()
            .await
            .get(&dn.normalized())
            .cloned()
            .ok_or_else(|| DirectoryError::not_found(dn.as_str()))
    }

    async fn update_attribute(
        &self,
        dn: &Dn,
        name: &str,
        values: Vec<String>,
        mode: UpdateMode,
    ) -> DirectoryResult<()> {
        self.check_available()?;
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&dn.normalized())
            .ok_or_else(|| DirectoryError::not_found(dn.as_str()))?;
        match mode {
            UpdateMode::Replace => entry.attributes.set(name, values),
            UpdateMode::Append => {
                for value in values {
                    entry.attributes.add_value(name, value);
                }
            }
        }
        Ok(())
    }

    async fn delete_entry(&self, dn: &Dn) -> DirectoryResult<()> {
        self.check_available()?;
        let mut entries = self.entries.write().await;
        if entries.remove(&dn.normalized()).is_none() {
            return Err(DirectoryError::not_found(dn.as_str()));
        }
        debug!(dn = %dn, "Deleted directory entry");
        Ok(())
    }

    async fn list_children(&self, base_dn: &Dn) -> DirectoryResult<Vec<DirectoryObject>> {
        self.check_available()?;
        let entries = self.entries.read().await;
        let mut children: Vec<DirectoryObject> = entries
            .values()
            .filter(|entry| entry.dn.parent().as_ref() == Some(base_dn))
            .cloned()
            .collect();
        // Deterministic order for callers and tests
        children.sort_by_key(|entry| entry.dn.normalized());
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str) -> DirectoryObject {
        DirectoryObject::new(Dn::new(format!("cn={name},ou=Groups,dc=test,dc=local")))
            .with_object_class("groupOfNames")
            .with_attribute("cn", name)
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let directory = MemoryDirectory::new();
        directory.create_entry(group("group1")).await.unwrap();

        let entry = directory
            .read_entry(&Dn::new("CN=GROUP1,ou=Groups,dc=test,dc=local"))
            .await
            .unwrap();
        assert_eq!(entry.attributes.first("cn"), Some("group1"));
    }

    #[tokio::test]
    async fn test_duplicate_create_is_conflict() {
        let directory = MemoryDirectory::new();
        directory.create_entry(group("group1")).await.unwrap();
        let err = directory.create_entry(group("group1")).await.unwrap_err();
        assert_eq!(err.error_code(), "OBJECT_EXISTS");
    }

    #[tokio::test]
    async fn test_missing_entry_is_not_found() {
        let directory = MemoryDirectory::new();
        let dn = Dn::new("cn=nope,ou=Groups,dc=test,dc=local");
        assert_eq!(
            directory.read_entry(&dn).await.unwrap_err().error_code(),
            "OBJECT_NOT_FOUND"
        );
        assert_eq!(
            directory.delete_entry(&dn).await.unwrap_err().error_code(),
            "OBJECT_NOT_FOUND"
        );
    }

    #[tokio::test]
    async fn test_update_modes() {
        let directory = MemoryDirectory::new();
        directory.create_entry(group("group1")).await.unwrap();
        let dn = Dn::new("cn=group1,ou=Groups,dc=test,dc=local");

        directory
            .update_attribute(&dn, "member", vec!["cn=a".into()], UpdateMode::Append)
            .await
            .unwrap();
        directory
            .update_attribute(
                &dn,
                "member",
                vec!["cn=b".into(), "cn=a".into()],
                UpdateMode::Append,
            )
            .await
            .unwrap();
        let entry = directory.read_entry(&dn).await.unwrap();
        assert_eq!(
            entry.attributes.all("member"),
            &["cn=a".to_string(), "cn=b".to_string()]
        );

        directory
            .update_attribute(&dn, "member", vec!["cn=c".into()], UpdateMode::Replace)
            .await
            .unwrap();
        let entry = directory.read_entry(&dn).await.unwrap();
        assert_eq!(entry.attributes.all("member"), &["cn=c".to_string()]);
    }

    #[tokio::test]
    async fn test_list_children_is_one_level_and_tolerant() {
        let directory = MemoryDirectory::new();
        directory.create_entry(group("group1")).await.unwrap();
        directory.create_entry(group("group2")).await.unwrap();
        directory
            .create_entry(
                DirectoryObject::new(Dn::new("uid=john,ou=People,dc=test,dc=local"))
                    .with_attribute("uid", "john"),
            )
            .await
            .unwrap();

        let groups = directory
            .list_children(&Dn::new("ou=Groups,dc=test,dc=local"))
            .await
            .unwrap();
        assert_eq!(groups.len(), 2);

        // Absent container is an empty list, not an error
        let none = directory
            .list_children(&Dn::new("ou=Missing,dc=test,dc=local"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_directory_fails_with_connection_error() {
        let directory = MemoryDirectory::new();
        directory.create_entry(group("group1")).await.unwrap();
        directory.set_available(false);

        let err = directory
            .read_entry(&Dn::new("cn=group1,ou=Groups,dc=test,dc=local"))
            .await
            .unwrap_err();
        assert!(err.is_transient());

        directory.set_available(true);
        assert_eq!(directory.len().await, 1);
    }
}
