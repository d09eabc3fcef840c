//! # dirsync engine
//!
//! Provisioning and synchronization on top of the directory client: builds
//! group hierarchies and users in the directory, mirrors the group tree
//! into a local identity store, and deliberately introduces drift between
//! the two sides.
//!
//! ## Crate organization
//!
//! - [`groups`] - directory group creation and membership edges
//! - [`users`] - directory user provisioning and credentials
//! - [`store`] - the `LocalIdentityStore` trait and in-memory store
//! - [`sync`] - the directory-to-local group tree sync pass
//! - [`drift`] - directory-only deletions that bypass the store
//! - [`fixture`] - the end-to-end seed orchestration

pub mod drift;
pub mod fixture;
pub mod groups;
pub mod store;
pub mod sync;
pub mod users;

pub use fixture::seed_groups_fixture;
pub use store::{LocalGroup, LocalIdentityStore, MemoryIdentityStore, UpsertOutcome};
pub use sync::{GroupTreeSync, SyncReport};
