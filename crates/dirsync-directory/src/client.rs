//! Entry-level directory client trait.
//!
//! The narrow seam between this core and whatever actually stores directory
//! entries. Implementations: [`crate::ldap::LdapDirectoryClient`] for real
//! servers, [`crate::memory::MemoryDirectory`] for hermetic runs.

use async_trait::async_trait;

use dirsync_core::error::DirectoryResult;

use crate::object::{DirectoryObject, Dn};

/// How `update_attribute` treats existing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Overwrite all existing values.
    Replace,
    /// Add values, skipping ones already present.
    Append,
}

/// Create/read/update/delete access to directory entries.
///
/// Error contract shared by all implementations:
/// - `create_entry` fails with a conflict when the DN already exists.
/// - `read_entry`, `update_attribute`, and `delete_entry` fail with
///   not-found when the DN is absent.
/// - An unreachable backend surfaces as a connection failure.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Create a new entry.
    async fn create_entry(&self, object: DirectoryObject) -> DirectoryResult<()>;

    /// Read one entry by DN.
    async fn read_entry(&self, dn: &Dn) -> DirectoryResult<DirectoryObject>;

    /// Replace or extend the values of one attribute.
    async fn update_attribute(
        &self,
        dn: &Dn,
        name: &str,
        values: Vec<String>,
        mode: UpdateMode,
    ) -> DirectoryResult<()>;

    /// Delete one entry by DN.
    async fn delete_entry(&self, dn: &Dn) -> DirectoryResult<()>;

    /// List the entries directly under `base_dn`.
    ///
    /// An absent or empty container yields an empty list, not an error.
    async fn list_children(&self, base_dn: &Dn) -> DirectoryResult<Vec<DirectoryObject>>;
}
