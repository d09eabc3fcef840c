//! Group tree synchronization.
//!
//! Mirrors the directory's group hierarchy into the local store. Discovery
//! runs to completion first: every group entry under the groups container is
//! read and the full path-keyed tree is assembled in memory before a single
//! local write happens, so an unreachable directory aborts the pass with
//! nothing committed. The commit phase then upserts parent-first, skips
//! entries that already match, and deletes stale local paths deepest-first.
//!
//! Default-group designation is a caller-driven step against the store; the
//! directory carries no such flag.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use dirsync_core::error::{DirectoryError, DirectoryResult};
use dirsync_core::mapper::{GroupMapperConfig, GroupSyncMode, MembershipMode};
use dirsync_directory::{DirectoryClient, DirectoryConfig, DirectoryObject};

use crate::store::{LocalIdentityStore, UpsertOutcome};

/// Counts of local-store changes from one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Local groups created.
    pub created: usize,
    /// Local groups rewritten with new content.
    pub updated: usize,
    /// Stale local groups deleted.
    pub deleted: usize,
    /// Local groups already in sync.
    pub unchanged: usize,
}

impl SyncReport {
    /// Whether the pass changed nothing.
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} deleted, {} unchanged",
            self.created, self.updated, self.deleted, self.unchanged
        )
    }
}

/// One reconciliation pass from directory groups to the local store.
pub struct GroupTreeSync<'a> {
    client: &'a dyn DirectoryClient,
    config: &'a DirectoryConfig,
    mapper: &'a GroupMapperConfig,
    store: &'a dyn LocalIdentityStore,
}

impl<'a> GroupTreeSync<'a> {
    /// Bind a sync pass to a directory, mapper, and store.
    ///
    /// Only directory-authoritative mappers can drive this engine.
    pub fn new(
        client: &'a dyn DirectoryClient,
        config: &'a DirectoryConfig,
        mapper: &'a GroupMapperConfig,
        store: &'a dyn LocalIdentityStore,
    ) -> DirectoryResult<Self> {
        if mapper.sync_mode != GroupSyncMode::ImportFromDirectory {
            return Err(DirectoryError::invalid_config(format!(
                "mapper '{}' does not import from the directory",
                mapper.name
            )));
        }
        Ok(Self {
            client,
            config,
            mapper,
            store,
        })
    }

    /// Run the pass: discover, then commit.
    #[instrument(skip(self), fields(mapper = %self.mapper.name))]
    pub async fn run(&self) -> DirectoryResult<SyncReport> {
        let desired = self.discover().await.map_err(|err| {
            if err.is_transient() {
                DirectoryError::sync_aborted(format!("group discovery failed: {err}"))
            } else {
                err
            }
        })?;

        let report = self.commit(&desired).await?;
        info!(%report, groups = desired.len(), "Group tree sync finished");
        Ok(report)
    }

    /// Read the whole directory tree into path order. No local writes here.
    async fn discover(&self) -> DirectoryResult<Vec<(String, Option<String>)>> {
        let entries = self.client.list_children(&self.config.groups_dn()).await?;

        // Index entries by DN and, in uid mode, by the uid attribute.
        let mut by_dn: HashMap<String, &DirectoryObject> = HashMap::new();
        let mut by_uid: HashMap<&str, &DirectoryObject> = HashMap::new();
        for entry in &entries {
            by_dn.insert(entry.dn.normalized(), entry);
            if let Some(uid) = entry.attributes.first(&self.mapper.member_uid_attribute) {
                by_uid.entry(uid).or_insert(entry);
            }
        }

        // Resolve membership edges and note which entries have a parent.
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        let mut has_parent: HashSet<String> = HashSet::new();
        for entry in &entries {
            let parent_key = entry.dn.normalized();
            for member in entry.attributes.all(&self.mapper.membership_attribute) {
                let resolved = match self.mapper.membership_mode {
                    MembershipMode::Dn => by_dn.get(&member.to_lowercase()).copied(),
                    MembershipMode::Uid => by_uid.get(member.as_str()).copied(),
                };
                let Some(child) = resolved else {
                    // Placeholder or out-of-container member; not a group.
                    warn!(parent = %entry.dn, member, "Skipping unresolvable member");
                    continue;
                };
                let child_key = child.dn.normalized();
                if child_key == parent_key {
                    continue;
                }
                has_parent.insert(child_key.clone());
                children.entry(parent_key.clone()).or_default().push(child_key);
            }
        }

        // BFS from the roots, assigning slash-separated paths parent-first.
        // The visited set breaks membership cycles and keeps a group with
        // two parents at its first-seen path.
        let mut desired: Vec<(String, Option<String>)> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, String)> = VecDeque::new();

        let mut roots: Vec<&DirectoryObject> = entries
            .iter()
            .filter(|e| !has_parent.contains(&e.dn.normalized()))
            .collect();
        roots.sort_by_key(|e| e.dn.normalized());
        for root in roots {
            queue.push_back((root.dn.normalized(), String::new()));
        }

        while let Some((key, parent_path)) = queue.pop_front() {
            if !visited.insert(key.clone()) {
                warn!(dn = %key, "Group reachable through more than one parent");
                continue;
            }
            let entry = by_dn[&key];
            let path = format!("{parent_path}/{}", self.group_name(entry)?);
            for child in children.get(&key).into_iter().flatten() {
                queue.push_back((child.clone(), path.clone()));
            }
            desired.push((path, self.group_description(entry)));
        }

        let dropped = entries.len() - visited.len();
        if dropped > 0 {
            warn!(dropped, "Groups unreachable from any root were skipped");
        }
        Ok(desired)
    }

    /// Apply the desired tree to the store and delete what is stale.
    async fn commit(&self, desired: &[(String, Option<String>)]) -> DirectoryResult<SyncReport> {
        let mut report = SyncReport::default();

        // Desired order is parent-first already.
        let mut desired_paths: HashSet<&str> = HashSet::new();
        for (path, description) in desired {
            desired_paths.insert(path.as_str());
            match self.store.upsert_group(path, description.clone()).await? {
                UpsertOutcome::Created => report.created += 1,
                UpsertOutcome::Updated => report.updated += 1,
                UpsertOutcome::Unchanged => report.unchanged += 1,
            }
        }

        // Deepest-first so children go before their parents.
        let mut stale: Vec<String> = self
            .store
            .group_paths()
            .await
            .into_iter()
            .filter(|path| !desired_paths.contains(path.as_str()))
            .collect();
        stale.sort_by_key(|path| std::cmp::Reverse(path.matches('/').count()));
        for path in stale {
            self.store.delete_group(&path).await?;
            report.deleted += 1;
        }

        Ok(report)
    }

    fn group_name(&self, entry: &DirectoryObject) -> DirectoryResult<String> {
        entry
            .attributes
            .first(&self.mapper.group_name_attribute)
            .map(str::to_string)
            .ok_or_else(|| {
                DirectoryError::invalid_data(format!(
                    "group {} has no '{}' attribute",
                    entry.dn, self.mapper.group_name_attribute
                ))
            })
    }

    fn group_description(&self, entry: &DirectoryObject) -> Option<String> {
        // A missing description on the entry is tolerated.
        self.mapper
            .description_attribute
            .as_deref()
            .and_then(|attr| entry.attributes.first(attr))
            .map(str::to_string)
    }
}
