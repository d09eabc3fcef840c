//! Drift simulation.
//!
//! Deletes identities on the directory side only, leaving local state
//! untouched. The resulting inconsistency is the precondition for
//! exercising a re-sync: after a drift call the local store still knows the
//! user while the directory answers not-found.

use tracing::{info, instrument};

use dirsync_core::error::DirectoryResult;
use dirsync_core::ids::ProviderId;
use dirsync_core::provider::ProviderRegistry;
use dirsync_directory::{DirectoryClient, DirectoryConfig};

use crate::users;

/// Remove one user from a provider's directory, bypassing the local store.
///
/// The provider must be registered; the username must exist in the
/// directory, otherwise this is a not-found failure.
#[instrument(skip(registry, client))]
pub async fn remove_ldap_user(
    registry: &ProviderRegistry,
    client: &dyn DirectoryClient,
    provider_id: ProviderId,
    username: &str,
) -> DirectoryResult<()> {
    let provider = registry.get(provider_id)?;
    let config = DirectoryConfig::from_settings(provider.settings())?;
    users::remove_user(client, &config, username).await?;
    info!(%provider_id, username, "Removed directory user behind the store's back");
    Ok(())
}
