//! LDAP-backed directory client.
//!
//! Implements [`DirectoryClient`] over `ldap3` with a lazily established,
//! cached connection and result-code mapping into the shared error taxonomy.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapResult, Mod, Scope, SearchEntry};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use dirsync_core::error::{DirectoryError, DirectoryResult};

use crate::client::{DirectoryClient, UpdateMode};
use crate::config::DirectoryConfig;
use crate::object::{DirectoryObject, Dn};

const OBJECT_CLASS: &str = "objectClass";
const MATCH_ALL: &str = "(objectClass=*)";

/// Directory client talking to a live LDAP server.
pub struct LdapDirectoryClient {
    config: DirectoryConfig,
    // Cached connection, lazily initialized.
    connection: Arc<RwLock<Option<Ldap>>>,
}

impl LdapDirectoryClient {
    /// Create a client from a validated configuration.
    ///
    /// A connection url is required; the client binds on first use.
    pub fn new(config: DirectoryConfig) -> DirectoryResult<Self> {
        config.validate()?;
        if config.connection_url.is_none() {
            return Err(DirectoryError::invalid_config(
                "connectionUrl is required for the LDAP backend",
            ));
        }
        Ok(Self {
            config,
            connection: Arc::new(RwLock::new(None)),
        })
    }

    /// Get the cached LDAP connection, creating and binding one if needed.
    async fn get_connection(&self) -> DirectoryResult<Ldap> {
        {
            let guard = self.connection.read().await;
            if let Some(ref conn) = *guard {
                return Ok(conn.clone());
            }
        }

        let conn = self.create_connection().await?;

        {
            let mut guard = self.connection.write().await;
            *guard = Some(conn.clone());
        }

        Ok(conn)
    }

    async fn create_connection(&self) -> DirectoryResult<Ldap> {
        let url = self
            .config
            .connection_url
            .as_deref()
            .expect("checked at construction");

        debug!(url = %url, "Connecting to LDAP server");

        let settings = LdapConnSettings::new();
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, url)
            .await
            .map_err(|e| {
                DirectoryError::connection_failed_with_source(
                    format!("failed to connect to LDAP server at {url}"),
                    e,
                )
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        let bind_dn = &self.config.bind_dn;
        let bind_credential = self.config.bind_credential.as_deref().unwrap_or("");

        debug!(bind_dn = %bind_dn, "Performing LDAP bind");

        let result = ldap.simple_bind(bind_dn, bind_credential).await.map_err(|e| {
            DirectoryError::connection_failed_with_source(
                format!("LDAP bind failed for {bind_dn}"),
                e,
            )
        })?;

        if result.rc != 0 {
            if result.rc == 49 {
                return Err(DirectoryError::AuthenticationFailed);
            }
            return Err(DirectoryError::connection_failed(format!(
                "LDAP bind failed with code {}: {}",
                result.rc, result.text
            )));
        }

        info!(url = %url, "LDAP connection established");

        Ok(ldap)
    }

    /// Map an LDAP result into the shared error taxonomy.
    fn check_result(result: &LdapResult, identifier: &str) -> DirectoryResult<()> {
        Self::check_result_code(result.rc, &result.text, identifier)
    }

    fn check_result_code(rc: u32, text: &str, identifier: &str) -> DirectoryResult<()> {
        match rc {
            0 => Ok(()),
            32 => Err(DirectoryError::not_found(identifier)),
            68 => Err(DirectoryError::conflict(identifier)),
            49 => Err(DirectoryError::AuthenticationFailed),
            rc => Err(DirectoryError::operation_failed(format!(
                "LDAP error {rc} on {identifier}: {text}"
            ))),
        }
    }

    fn entry_to_object(entry: SearchEntry) -> DirectoryObject {
        let mut object = DirectoryObject::new(Dn::new(entry.dn));
        for (name, values) in entry.attrs {
            if name.eq_ignore_ascii_case(OBJECT_CLASS) {
                object.object_classes = values;
            } else {
                object.attributes.set(&name, values);
            }
        }
        object
    }

    async fn search(
        &self,
        base: &Dn,
        scope: Scope,
        identifier: &str,
    ) -> DirectoryResult<Option<Vec<DirectoryObject>>> {
        let mut ldap = self.get_connection().await?;
        let result = ldap
            .search(base.as_str(), scope, MATCH_ALL, vec!["*"])
            .await
            .map_err(|e| {
                DirectoryError::operation_failed_with_source(
                    format!("LDAP search under {identifier} failed"),
                    e,
                )
            })?;

        if result.1.rc == 32 {
            return Ok(None);
        }
        Self::check_result(&result.1, identifier)?;

        Ok(Some(
            result
                .0
                .into_iter()
                .map(SearchEntry::construct)
                .map(Self::entry_to_object)
                .collect(),
        ))
    }
}

#[async_trait]
impl DirectoryClient for LdapDirectoryClient {
    async fn create_entry(&self, object: DirectoryObject) -> DirectoryResult<()> {
        let mut ldap = self.get_connection().await?;

        let mut attrs: Vec<(String, HashSet<String>)> = Vec::new();
        if !object.object_classes.is_empty() {
            attrs.push((
                OBJECT_CLASS.to_string(),
                object.object_classes.iter().cloned().collect(),
            ));
        }
        for (name, values) in object.attributes.iter() {
            attrs.push((name.to_string(), values.iter().cloned().collect()));
        }

        let result = ldap.add(object.dn.as_str(), attrs).await.map_err(|e| {
            DirectoryError::operation_failed_with_source(
                format!("LDAP add of {} failed", object.dn),
                e,
            )
        })?;
        Self::check_result(&result, object.dn.as_str())
    }

    async fn read_entry(&self, dn: &Dn) -> DirectoryResult<DirectoryObject> {
        let entries = self
            .search(dn, Scope::Base, dn.as_str())
            .await?
            .ok_or_else(|| DirectoryError::not_found(dn.as_str()))?;
        entries
            .into_iter()
            .next()
            .ok_or_else(|| DirectoryError::not_found(dn.as_str()))
    }

    async fn update_attribute(
        &self,
        dn: &Dn,
        name: &str,
        values: Vec<String>,
        mode: UpdateMode,
    ) -> DirectoryResult<()> {
        let values: HashSet<String> = match mode {
            UpdateMode::Replace => values.into_iter().collect(),
            UpdateMode::Append => {
                // LDAP rejects adding an already-present value; filter against
                // the current entry so append stays idempotent.
                let current = self.read_entry(dn).await?;
                let existing = current.attributes.all(name);
                let fresh: HashSet<String> = values
                    .into_iter()
                    .filter(|v| !existing.contains(v))
                    .collect();
                if fresh.is_empty() {
                    return Ok(());
                }
                fresh
            }
        };

        let modification = match mode {
            UpdateMode::Replace => Mod::Replace(name.to_string(), values),
            UpdateMode::Append => Mod::Add(name.to_string(), values),
        };

        let mut ldap = self.get_connection().await?;
        let result = ldap.modify(dn.as_str(), vec![modification]).await.map_err(|e| {
            DirectoryError::operation_failed_with_source(format!("LDAP modify of {dn} failed"), e)
        })?;
        Self::check_result(&result, dn.as_str())
    }

    async fn delete_entry(&self, dn: &Dn) -> DirectoryResult<()> {
        let mut ldap = self.get_connection().await?;
        let result = ldap.delete(dn.as_str()).await.map_err(|e| {
            DirectoryError::operation_failed_with_source(format!("LDAP delete of {dn} failed"), e)
        })?;
        Self::check_result(&result, dn.as_str())
    }

    async fn list_children(&self, base_dn: &Dn) -> DirectoryResult<Vec<DirectoryObject>> {
        // A missing container reads as empty, matching the trait contract.
        Ok(self
            .search(base_dn, Scope::OneLevel, base_dn.as_str())
            .await?
            .unwrap_or_default())
    }
}
