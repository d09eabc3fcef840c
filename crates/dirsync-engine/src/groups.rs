//! Group hierarchy building.
//!
//! Creates directory groups under the configured groups container and wires
//! membership edges between entries. Hierarchy construction is not
//! transactional: on failure, whatever was already created stays in place
//! and callers re-run from a bulk-cleared container.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, info, instrument};

use dirsync_core::error::{DirectoryError, DirectoryResult};
use dirsync_core::mapper::MembershipMode;
use dirsync_directory::{DirectoryClient, DirectoryConfig, DirectoryObject, Dn, UpdateMode};

/// DN of the group named `name` under the configured groups container.
pub fn group_dn(config: &DirectoryConfig, name: &str) -> Dn {
    Dn::child_of(&config.groups_dn(), &config.group_name_attribute, name)
}

/// Create a directory group.
///
/// The entry gets the configured group object classes, the group-name
/// attribute, and optionally one description attribute. A DN collision is a
/// conflict; there is no upsert.
#[instrument(skip(client, config, description))]
pub async fn create_group(
    client: &dyn DirectoryClient,
    config: &DirectoryConfig,
    name: &str,
    description: Option<(&str, &str)>,
) -> DirectoryResult<DirectoryObject> {
    let mut entry = DirectoryObject::new(group_dn(config, name));
    entry.object_classes = config.group_object_classes.clone();
    entry.attributes.set_single(&config.group_name_attribute, name);
    if let Some((attr_name, value)) = description {
        entry.attributes.set_single(attr_name, value);
    }

    client.create_entry(entry.clone()).await?;
    info!(group = name, dn = %entry.dn, "Created directory group");
    Ok(entry)
}

/// Resolve the identifier a membership edge stores for `child`.
///
/// DN mode uses the child's distinguished name; UID mode reads the child's
/// uid-bearing attribute.
fn resolve_member_id(
    mode: MembershipMode,
    member_uid_attribute: &str,
    child: &DirectoryObject,
) -> DirectoryResult<String> {
    match mode {
        MembershipMode::Dn => Ok(child.dn.as_str().to_string()),
        MembershipMode::Uid => child
            .attributes
            .first(member_uid_attribute)
            .map(str::to_string)
            .ok_or_else(|| {
                DirectoryError::invalid_data(format!(
                    "member {} has no '{}' attribute for uid membership",
                    child.dn, member_uid_attribute
                ))
            }),
    }
}

/// Walk membership edges from `start`, failing if `target` is reachable.
///
/// Member values that do not read back as entries (uid-mode values,
/// placeholders) are skipped; only DN-valued membership can be traversed.
async fn ensure_not_reachable(
    client: &dyn DirectoryClient,
    membership_attribute: &str,
    target: &Dn,
    start: &DirectoryObject,
) -> DirectoryResult<()> {
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(start.dn.normalized());
    let mut queue: VecDeque<DirectoryObject> = VecDeque::from([start.clone()]);

    while let Some(entry) = queue.pop_front() {
        for member in entry.attributes.all(membership_attribute) {
            let member_dn = Dn::new(member.clone());
            if !visited.insert(member_dn.normalized()) {
                continue;
            }
            if &member_dn == target {
                return Err(DirectoryError::invalid_data(format!(
                    "membership edge {target} -> {} would create a cycle",
                    start.dn
                )));
            }
            match client.read_entry(&member_dn).await {
                Ok(next) => queue.push_back(next),
                Err(DirectoryError::ObjectNotFound { .. }) => {}
                Err(err) => return Err(err),
            }
        }
    }
    Ok(())
}

/// Add a membership edge from `parent` to `child`.
///
/// With `replace_existing` the parent's membership attribute is overwritten
/// with exactly the one resolved identifier; otherwise the identifier is
/// appended without duplication. Both entries must exist; a missing one is a
/// fatal not-found, never retried. A self-referencing edge, or one that
/// would close a membership cycle (the parent already reachable from the
/// child through the membership attribute), is rejected before anything is
/// written.
#[instrument(skip(client), fields(parent = %parent, child = %child, mode = %mode, replace_existing))]
pub async fn add_member(
    client: &dyn DirectoryClient,
    mode: MembershipMode,
    membership_attribute: &str,
    member_uid_attribute: &str,
    parent: &Dn,
    child: &Dn,
    replace_existing: bool,
) -> DirectoryResult<()> {
    if parent == child || child.is_ancestor_of(parent) {
        return Err(DirectoryError::invalid_data(format!(
            "membership edge {parent} -> {child} would create a cycle"
        )));
    }

    // Both sides must exist before the edge is written.
    let _parent_entry = client.read_entry(parent).await?;
    let child_entry = client.read_entry(child).await?;

    // Groups under one container are DN-siblings, so the cycle check has to
    // walk the membership graph itself: refuse the edge when the parent is
    // already reachable from the child.
    ensure_not_reachable(client, membership_attribute, parent, &child_entry).await?;

    let member_id = resolve_member_id(mode, member_uid_attribute, &child_entry)?;

    let update_mode = if replace_existing {
        UpdateMode::Replace
    } else {
        UpdateMode::Append
    };
    client
        .update_attribute(parent, membership_attribute, vec![member_id], update_mode)
        .await?;

    debug!(parent = %parent, child = %child, "Added membership edge");
    Ok(())
}

/// Delete every entry under the groups container.
///
/// An already-empty container is a no-op.
#[instrument(skip(client, config))]
pub async fn remove_all_groups(
    client: &dyn DirectoryClient,
    config: &DirectoryConfig,
) -> DirectoryResult<()> {
    let container = config.groups_dn();
    let entries = client.list_children(&container).await?;
    let count = entries.len();
    for entry in entries {
        client.delete_entry(&entry.dn).await?;
    }
    if count > 0 {
        info!(count, container = %container, "Removed all directory groups");
    }
    Ok(())
}
