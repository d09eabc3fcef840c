//! # dirsync directory
//!
//! Directory object model and entry-level client for dirsync.
//!
//! Entries are addressed by distinguished name and carry inherently
//! multi-valued attributes. All access goes through the [`DirectoryClient`]
//! trait; two backends ship with the crate:
//!
//! - [`LdapDirectoryClient`] for live LDAP servers (via `ldap3`)
//! - [`MemoryDirectory`] for hermetic fixture runs and tests
//!
//! ## Crate organization
//!
//! - [`object`] - `Dn`, `Attributes`, `DirectoryObject`
//! - [`client`] - the `DirectoryClient` trait and `UpdateMode`
//! - [`config`] - `DirectoryConfig` parsed from provider settings
//! - [`ldap`] - ldap3-backed client
//! - [`memory`] - in-memory client

pub mod client;
pub mod config;
pub mod ldap;
pub mod memory;
pub mod object;

pub use client::{DirectoryClient, UpdateMode};
pub use config::DirectoryConfig;
pub use ldap::LdapDirectoryClient;
pub use memory::MemoryDirectory;
pub use object::{escape_rdn_value, Attributes, DirectoryObject, Dn};
