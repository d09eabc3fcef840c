//! Seed fixture orchestration.
//!
//! One call that takes an empty provider to a fully provisioned state:
//! local users, the group mapper, a two-level directory group tree synced
//! into the local store, default-group designations, and directory users
//! with credentials. The run is not transactional; on partial failure the
//! caller bulk-clears the directory and re-runs.

use tracing::{info, instrument};

use dirsync_core::error::DirectoryResult;
use dirsync_core::ids::ProviderId;
use dirsync_core::mapper::{GroupMapperConfig, MapperRegistry, MembershipMode};
use dirsync_core::provider::ProviderRegistry;
use dirsync_directory::{Attributes, DirectoryClient, DirectoryConfig, Dn};

use crate::groups::{add_member, create_group, remove_all_groups};
use crate::store::LocalIdentityStore;
use crate::sync::{GroupTreeSync, SyncReport};
use crate::users::{add_user, remove_all_users, set_password};

/// Mapper name the fixture registers.
pub const GROUPS_MAPPER: &str = "groupsMapper";
/// Credential set on the local fixture users.
pub const LOCAL_PASSWORD: &str = "password-app";
/// Credential set on the directory fixture users.
pub const DIRECTORY_PASSWORD: &str = "Password1";

/// Directory users the fixture provisions: username, first, last, email, uid.
/// The last two share a uid on purpose.
const DIRECTORY_USERS: [(&str, &str, &str, &str, &str); 4] = [
    ("johnkeycloak", "John", "Doe", "john@email.org", "1234"),
    ("marykeycloak", "Mary", "Kelly", "mary@email.org", "5678"),
    ("robkeycloak", "Rob", "Brown", "rob@email.org", "8910"),
    ("jameskeycloak", "James", "Brown", "james@email.org", "8910"),
];

/// Provision the groups fixture against a registered provider.
///
/// Steps, in order: local users `mary` and `john`; the `groupsMapper`
/// binding; a cleared groups container repopulated with `group1` (and
/// children `group11`, `group12`) plus `defaultGroup1` (and children
/// `defaultGroup11`, `defaultGroup12`); a sync pass mirroring that tree
/// into the store; default designation of both `defaultGroup1` children;
/// finally a cleared users container repopulated with four directory users
/// holding `Password1`.
///
/// Membership edges are wired replace-then-append so each parent ends up
/// with exactly its two children regardless of leftover attribute values.
#[instrument(skip_all, fields(provider_id = %provider_id))]
pub async fn seed_groups_fixture(
    registry: &ProviderRegistry,
    mappers: &mut MapperRegistry,
    client: &dyn DirectoryClient,
    store: &dyn LocalIdentityStore,
    provider_id: ProviderId,
) -> DirectoryResult<SyncReport> {
    let provider = registry.get(provider_id)?;
    let config = DirectoryConfig::from_settings(provider.settings())?;

    store.upsert_user("mary", Some("mary@test.com")).await?;
    store.set_credential("mary", LOCAL_PASSWORD).await?;
    store.upsert_user("john", Some("john@test.com")).await?;
    store.set_credential("john", LOCAL_PASSWORD).await?;

    let mapper = GroupMapperConfig::new(GROUPS_MAPPER).with_description_attribute("description");
    mappers.add_or_update(provider_id, mapper);
    let mapper = mappers.resolve(provider_id, GROUPS_MAPPER)?.clone();

    remove_all_groups(client, &config).await?;

    let group1 = create_group(
        client,
        &config,
        "group1",
        Some(("description", "group1 - description")),
    )
    .await?;
    let group11 = create_group(client, &config, "group11", None).await?;
    let group12 = create_group(
        client,
        &config,
        "group12",
        Some(("description", "group12 - description")),
    )
    .await?;

    let default_group1 = create_group(
        client,
        &config,
        "defaultGroup1",
        Some(("description", "Default Group1 - description")),
    )
    .await?;
    let default_group11 = create_group(client, &config, "defaultGroup11", None).await?;
    let default_group12 = create_group(
        client,
        &config,
        "defaultGroup12",
        Some(("description", "Default Group12 - description")),
    )
    .await?;

    wire_children(&mapper, client, &group1.dn, &group11.dn, &group12.dn).await?;
    wire_children(
        &mapper,
        client,
        &default_group1.dn,
        &default_group11.dn,
        &default_group12.dn,
    )
    .await?;

    let report = GroupTreeSync::new(client, &config, &mapper, store)?
        .run()
        .await?;

    store.set_default_group("/defaultGroup1/defaultGroup11").await?;
    store.set_default_group("/defaultGroup1/defaultGroup12").await?;

    remove_all_users(client, &config).await?;
    for (username, first, last, email, uid) in DIRECTORY_USERS {
        let user = add_user(
            client,
            &config,
            username,
            first,
            last,
            email,
            Some(uid),
            Attributes::new(),
        )
        .await?;
        set_password(client, &config, &user, DIRECTORY_PASSWORD).await?;
    }

    info!(%report, "Seeded groups fixture");
    Ok(report)
}

/// Wire both children of a parent: the first edge replaces whatever the
/// membership attribute held, the second appends.
async fn wire_children(
    mapper: &GroupMapperConfig,
    client: &dyn DirectoryClient,
    parent: &Dn,
    first: &Dn,
    second: &Dn,
) -> DirectoryResult<()> {
    add_member(
        client,
        MembershipMode::Dn,
        &mapper.membership_attribute,
        &mapper.member_uid_attribute,
        parent,
        first,
        true,
    )
    .await?;
    add_member(
        client,
        MembershipMode::Dn,
        &mapper.membership_attribute,
        &mapper.member_uid_attribute,
        parent,
        second,
        false,
    )
    .await
}
