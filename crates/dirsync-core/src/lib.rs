//! # dirsync core
//!
//! Core abstractions for directory-backed identity provisioning: provider
//! configuration, group-mapper bindings, and the shared error taxonomy.
//!
//! ## Crate organization
//!
//! - [`ids`] - Type-safe identifiers (`ProviderId`)
//! - [`error`] - Error types with transient/permanent classification
//! - [`provider`] - Provider configuration model and registry
//! - [`mapper`] - Group mapper bindings and resolver

pub mod error;
pub mod ids;
pub mod mapper;
pub mod provider;

/// Prelude module for convenient imports.
///
/// ```
/// use dirsync_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{DirectoryError, DirectoryResult};
    pub use crate::ids::ProviderId;
    pub use crate::mapper::{GroupMapperConfig, GroupSyncMode, MapperRegistry, MembershipMode};
    pub use crate::provider::{
        CachePolicy, EditMode, ProviderConfig, ProviderRegistry, ProviderSettings,
    };
}
