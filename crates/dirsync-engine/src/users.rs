//! Directory user provisioning.
//!
//! Creates user entries with profile attributes under the users container,
//! sets credentials, and removes single users or the whole container.
//! Removal never touches the local store; that asymmetry is what lets the
//! drift simulator introduce inconsistency on purpose.

use tracing::{debug, info, instrument};

use dirsync_core::error::{DirectoryError, DirectoryResult};
use dirsync_directory::{
    Attributes, DirectoryClient, DirectoryConfig, DirectoryObject, Dn, UpdateMode,
};

/// DN of the user named `username` under the configured users container.
pub fn user_dn(config: &DirectoryConfig, username: &str) -> Dn {
    Dn::child_of(&config.users_dn(), &config.username_attribute, username)
}

/// Create a directory user.
///
/// Username and email are unique at the directory level: a duplicate of
/// either fails with a conflict. When `uid` is given it is set verbatim on
/// the configured uid attribute and becomes the value used by uid-based
/// membership resolution; when omitted the attribute is left to the
/// directory's defaults.
#[instrument(skip(client, config, custom_attributes))]
pub async fn add_user(
    client: &dyn DirectoryClient,
    config: &DirectoryConfig,
    username: &str,
    first_name: &str,
    last_name: &str,
    email: &str,
    uid: Option<&str>,
    custom_attributes: Attributes,
) -> DirectoryResult<DirectoryObject> {
    // The DN catches duplicate usernames; email needs an explicit scan.
    let existing = client.list_children(&config.users_dn()).await?;
    if existing
        .iter()
        .any(|entry| entry.attributes.first("mail") == Some(email))
    {
        return Err(DirectoryError::conflict(format!("mail={email}")));
    }

    let mut entry = DirectoryObject::new(user_dn(config, username));
    entry.object_classes = config.user_object_classes.clone();
    entry.attributes = custom_attributes;
    entry.attributes.set_single(&config.username_attribute, username);
    entry.attributes.set_single("givenName", first_name);
    entry.attributes.set_single("sn", last_name);
    entry
        .attributes
        .set_single("cn", format!("{first_name} {last_name}"));
    entry.attributes.set_single("mail", email);
    if let Some(uid) = uid {
        entry.attributes.set_single(&config.uid_attribute, uid);
    }

    client.create_entry(entry.clone()).await?;
    info!(username, dn = %entry.dn, "Provisioned directory user");
    Ok(entry)
}

/// Set a user's credential in the directory (replacing any existing one).
#[instrument(skip(client, config, password))]
pub async fn set_password(
    client: &dyn DirectoryClient,
    config: &DirectoryConfig,
    user: &DirectoryObject,
    password: &str,
) -> DirectoryResult<()> {
    client
        .update_attribute(
            &user.dn,
            &config.password_attribute,
            vec![password.to_string()],
            UpdateMode::Replace,
        )
        .await?;
    debug!(dn = %user.dn, "Updated directory password");
    Ok(())
}

/// Delete one user from the directory by username.
///
/// Fails with not-found when no such username exists. The local store is
/// deliberately left untouched.
#[instrument(skip(client, config))]
pub async fn remove_user(
    client: &dyn DirectoryClient,
    config: &DirectoryConfig,
    username: &str,
) -> DirectoryResult<()> {
    let dn = user_dn(config, username);
    client.delete_entry(&dn).await?;
    info!(username, dn = %dn, "Removed directory user");
    Ok(())
}

/// Delete every entry under the users container.
///
/// An already-empty container is a no-op.
#[instrument(skip(client, config))]
pub async fn remove_all_users(
    client: &dyn DirectoryClient,
    config: &DirectoryConfig,
) -> DirectoryResult<()> {
    let container = config.users_dn();
    let entries = client.list_children(&container).await?;
    let count = entries.len();
    for entry in entries {
        client.delete_entry(&entry.dn).await?;
    }
    if count > 0 {
        info!(count, container = %container, "Removed all directory users");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirsync_directory::MemoryDirectory;

    fn config() -> DirectoryConfig {
        DirectoryConfig::new("dc=test,dc=local", "cn=admin,dc=test,dc=local")
    }

    #[tokio::test]
    async fn test_add_user_profile_attributes() {
        let directory = MemoryDirectory::new();
        let cfg = config();

        let user = add_user(
            &directory,
            &cfg,
            "johnkeycloak",
            "John",
            "Doe",
            "john@email.org",
            Some("1234"),
            Attributes::new(),
        )
        .await
        .unwrap();

        assert_eq!(user.dn.as_str(), "uid=johnkeycloak,ou=People,dc=test,dc=local");
        let stored = directory.read_entry(&user.dn).await.unwrap();
        assert_eq!(stored.attributes.first("givenName"), Some("John"));
        assert_eq!(stored.attributes.first("sn"), Some("Doe"));
        assert_eq!(stored.attributes.first("cn"), Some("John Doe"));
        assert_eq!(stored.attributes.first("mail"), Some("john@email.org"));
        assert_eq!(stored.attributes.first("uidNumber"), Some("1234"));
    }

    #[tokio::test]
    async fn test_add_user_without_uid_leaves_attribute_unset() {
        let directory = MemoryDirectory::new();
        let cfg = config();

        let user = add_user(
            &directory,
            &cfg,
            "marykeycloak",
            "Mary",
            "Kelly",
            "mary@email.org",
            None,
            Attributes::new(),
        )
        .await
        .unwrap();

        let stored = directory.read_entry(&user.dn).await.unwrap();
        assert!(!stored.attributes.has("uidNumber"));
    }

    #[tokio::test]
    async fn test_duplicate_username_is_conflict() {
        let directory = MemoryDirectory::new();
        let cfg = config();

        add_user(
            &directory,
            &cfg,
            "johnkeycloak",
            "John",
            "Doe",
            "john@email.org",
            None,
            Attributes::new(),
        )
        .await
        .unwrap();

        let err = add_user(
            &directory,
            &cfg,
            "johnkeycloak",
            "Johnny",
            "Doe",
            "johnny@email.org",
            None,
            Attributes::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), "OBJECT_EXISTS");
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let directory = MemoryDirectory::new();
        let cfg = config();

        add_user(
            &directory,
            &cfg,
            "johnkeycloak",
            "John",
            "Doe",
            "john@email.org",
            None,
            Attributes::new(),
        )
        .await
        .unwrap();

        let err = add_user(
            &directory,
            &cfg,
            "john2",
            "John",
            "Doe",
            "john@email.org",
            None,
            Attributes::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), "OBJECT_EXISTS");
    }

    #[tokio::test]
    async fn test_set_password_replaces() {
        let directory = MemoryDirectory::new();
        let cfg = config();
        let user = add_user(
            &directory,
            &cfg,
            "johnkeycloak",
            "John",
            "Doe",
            "john@email.org",
            None,
            Attributes::new(),
        )
        .await
        .unwrap();

        set_password(&directory, &cfg, &user, "Password1").await.unwrap();
        set_password(&directory, &cfg, &user, "Password2").await.unwrap();

        let stored = directory.read_entry(&user.dn).await.unwrap();
        assert_eq!(stored.attributes.all("userPassword"), &["Password2".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_missing_user_is_not_found() {
        let directory = MemoryDirectory::new();
        let cfg = config();
        let err = remove_user(&directory, &cfg, "ghost").await.unwrap_err();
        assert_eq!(err.error_code(), "OBJECT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_remove_all_users_bulk_and_empty() {
        let directory = MemoryDirectory::new();
        let cfg = config();

        remove_all_users(&directory, &cfg).await.unwrap();

        for (name, email) in [("a", "a@test.com"), ("b", "b@test.com")] {
            add_user(&directory, &cfg, name, "F", "L", email, None, Attributes::new())
                .await
                .unwrap();
        }
        remove_all_users(&directory, &cfg).await.unwrap();
        assert!(directory.is_empty().await);
    }
}
