//! Directory connection configuration.
//!
//! A validated, typed view over raw provider settings: where to bind, which
//! containers hold users and groups, and which attributes name things.

use serde::{Deserialize, Serialize};

use dirsync_core::error::{DirectoryError, DirectoryResult};
use dirsync_core::provider::ProviderSettings;

use crate::object::Dn;

/// Settings key for the LDAP connection URL.
pub const CONNECTION_URL: &str = "connectionUrl";
/// Settings key for the bind DN.
pub const BIND_DN: &str = "bindDn";
/// Settings key for the bind credential.
pub const BIND_CREDENTIAL: &str = "bindCredential";
/// Settings key for the base DN.
pub const BASE_DN: &str = "baseDn";
/// Settings key for the users container DN.
pub const USERS_DN: &str = "usersDn";
/// Settings key for the groups container DN.
pub const GROUPS_DN: &str = "groupsDn";
/// Settings key for the username RDN attribute.
pub const USERNAME_ATTRIBUTE: &str = "usernameLDAPAttribute";

fn default_username_attribute() -> String {
    "uid".to_string()
}

fn default_group_name_attribute() -> String {
    "cn".to_string()
}

fn default_uid_attribute() -> String {
    "uidNumber".to_string()
}

fn default_password_attribute() -> String {
    "userPassword".to_string()
}

fn default_user_object_classes() -> Vec<String> {
    vec![
        "top".to_string(),
        "person".to_string(),
        "organizationalPerson".to_string(),
        "inetOrgPerson".to_string(),
    ]
}

fn default_group_object_classes() -> Vec<String> {
    vec!["top".to_string(), "groupOfNames".to_string()]
}

/// Configuration for one directory connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// LDAP connection URL (e.g. "ldap://localhost:389"). Not needed by the
    /// in-memory backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_url: Option<String>,

    /// Bind DN for authentication.
    pub bind_dn: String,

    /// Bind credential.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_credential: Option<String>,

    /// Base DN all containers live under.
    pub base_dn: String,

    /// Users container DN; defaults to "ou=People,{base_dn}".
    pub users_dn: String,

    /// Groups container DN; defaults to "ou=Groups,{base_dn}".
    pub groups_dn: String,

    /// RDN attribute naming users.
    #[serde(default = "default_username_attribute")]
    pub username_attribute: String,

    /// RDN attribute naming groups.
    #[serde(default = "default_group_name_attribute")]
    pub group_name_attribute: String,

    /// Attribute carrying a user's external numeric uid.
    #[serde(default = "default_uid_attribute")]
    pub uid_attribute: String,

    /// Attribute carrying a user's credential.
    #[serde(default = "default_password_attribute")]
    pub password_attribute: String,

    /// Object classes for new user entries.
    #[serde(default = "default_user_object_classes")]
    pub user_object_classes: Vec<String>,

    /// Object classes for new group entries.
    #[serde(default = "default_group_object_classes")]
    pub group_object_classes: Vec<String>,
}

impl std::fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("connection_url", &self.connection_url)
            .field("bind_dn", &self.bind_dn)
            .field(
                "bind_credential",
                &self.bind_credential.as_ref().map(|_| "***REDACTED***"),
            )
            .field("base_dn", &self.base_dn)
            .field("users_dn", &self.users_dn)
            .field("groups_dn", &self.groups_dn)
            .field("username_attribute", &self.username_attribute)
            .field("group_name_attribute", &self.group_name_attribute)
            .field("uid_attribute", &self.uid_attribute)
            .finish()
    }
}

impl DirectoryConfig {
    /// Create a config with defaulted containers and attribute names.
    pub fn new(base_dn: impl Into<String>, bind_dn: impl Into<String>) -> Self {
        let base_dn = base_dn.into();
        Self {
            connection_url: None,
            bind_dn: bind_dn.into(),
            bind_credential: None,
            users_dn: format!("ou=People,{base_dn}"),
            groups_dn: format!("ou=Groups,{base_dn}"),
            base_dn,
            username_attribute: default_username_attribute(),
            group_name_attribute: default_group_name_attribute(),
            uid_attribute: default_uid_attribute(),
            password_attribute: default_password_attribute(),
            user_object_classes: default_user_object_classes(),
            group_object_classes: default_group_object_classes(),
        }
    }

    /// Build a validated config from raw provider settings.
    pub fn from_settings(settings: &ProviderSettings) -> DirectoryResult<Self> {
        let base_dn = settings
            .first(BASE_DN)
            .ok_or_else(|| DirectoryError::invalid_config("baseDn is required"))?;
        let bind_dn = settings
            .first(BIND_DN)
            .ok_or_else(|| DirectoryError::invalid_config("bindDn is required"))?;

        let mut config = Self::new(base_dn, bind_dn);
        config.connection_url = settings.first(CONNECTION_URL).map(str::to_string);
        config.bind_credential = settings.first(BIND_CREDENTIAL).map(str::to_string);
        if let Some(users_dn) = settings.first(USERS_DN) {
            config.users_dn = users_dn.to_string();
        }
        if let Some(groups_dn) = settings.first(GROUPS_DN) {
            config.groups_dn = groups_dn.to_string();
        }
        if let Some(attr) = settings.first(USERNAME_ATTRIBUTE) {
            config.username_attribute = attr.to_string();
        }
        config.validate()?;
        Ok(config)
    }

    /// Set the connection url.
    pub fn with_connection_url(mut self, url: impl Into<String>) -> Self {
        self.connection_url = Some(url.into());
        self
    }

    /// Set the bind credential.
    pub fn with_bind_credential(mut self, credential: impl Into<String>) -> Self {
        self.bind_credential = Some(credential.into());
        self
    }

    /// Users container DN.
    pub fn users_dn(&self) -> Dn {
        Dn::new(self.users_dn.clone())
    }

    /// Groups container DN.
    pub fn groups_dn(&self) -> Dn {
        Dn::new(self.groups_dn.clone())
    }

    /// Validate required fields.
    pub fn validate(&self) -> DirectoryResult<()> {
        if self.base_dn.is_empty() {
            return Err(DirectoryError::invalid_config("base_dn is required"));
        }
        if self.bind_dn.is_empty() {
            return Err(DirectoryError::invalid_config("bind_dn is required"));
        }
        Ok(())
    }
}
