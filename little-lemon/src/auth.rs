//! Staff and customer credentials loaded from a TOML file.
//!
//! This file is the identity provider: it decides who can log in and whether
//! the account is an administrator. Group memberships listed here are seeded
//! into the store at startup; later changes go through the group endpoints.
//!
//! ## Users file format
//!
//! **Single user (flat):**
//! ```toml
//! username = "admin"
//! password = "secret"
//! is_staff = true
//! ```
//!
//! **Multiple users (array):**
//! ```toml
//! [[users]]
//! username = "mario"
//! password = "pw1"
//! groups = ["Manager"]
//!
//! [[users]]
//! username = "luigi"
//! password = "pw2"
//! groups = ["Delivery crew"]
//! ```
//!
//! Both can be combined; the flat entry is merged with `[[users]]`.
//! Duplicate usernames are deduplicated (last wins). Empty usernames or passwords are skipped.
//!
//! **Security:** Use `chmod 600` on the users file. The server warns if it is world-readable (Unix).

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::{Database, RepositoryError};
use crate::roles::Group;

#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    users: BTreeMap<String, AuthUser>,
}

impl AuthSettings {
    pub fn from_users(users: Vec<AuthUser>) -> Self {
        let mut mapped = BTreeMap::new();

        for user in users {
            let username = user.username.trim().to_string();
            let password = user.password.trim().to_string();
            if username.is_empty() || password.is_empty() {
                continue;
            }
            mapped.insert(
                username.clone(),
                AuthUser {
                    username,
                    password,
                    is_staff: user.is_staff,
                    groups: user.groups,
                },
            );
        }

        Self { users: mapped }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn users(&self) -> impl Iterator<Item = &AuthUser> {
        self.users.values()
    }

    pub fn is_authorized(&self, username: &str, password: &str) -> bool {
        self.users.get(username).is_some_and(|known| {
            let a = password.as_bytes();
            let b = known.password.as_bytes();
            a.ct_eq(b).into()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub username: String,
    pub password: String,
    pub is_staff: bool,
    pub groups: Vec<String>,
}

#[cfg(test)]
impl AuthUser {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: String::from(username),
            password: String::from(password),
            is_staff: false,
            groups: Vec::new(),
        }
    }

    pub fn staff(mut self) -> Self {
        self.is_staff = true;
        self
    }

    pub fn in_group(mut self, group: &str) -> Self {
        self.groups.push(String::from(group));
        self
    }
}

#[derive(Debug, Error)]
pub enum AuthFileError {
    #[error("failed to read users file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid users config in {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("users file {path} does not define valid credentials")]
    EmptyCredentials { path: String },
}

#[derive(Debug, Default, Deserialize)]
struct AuthFile {
    username: Option<String>,
    password: Option<String>,
    #[serde(default)]
    is_staff: bool,
    #[serde(default)]
    groups: Vec<String>,
    users: Option<Vec<AuthUserEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
struct AuthUserEntry {
    username: String,
    password: String,
    #[serde(default)]
    is_staff: bool,
    #[serde(default)]
    groups: Vec<String>,
}

impl From<AuthUserEntry> for AuthUser {
    fn from(entry: AuthUserEntry) -> Self {
        Self {
            username: entry.username,
            password: entry.password,
            is_staff: entry.is_staff,
            groups: entry.groups,
        }
    }
}

/// Load credentials from the users file. At least one valid credential is required.
/// Warns if the file is world-readable (Unix only).
pub fn load_auth(path: &Path) -> Result<AuthSettings, AuthFileError> {
    check_auth_file_permissions(path);
    let settings = AuthSettings::from_users(load_users_from_file(path)?);
    if settings.is_empty() {
        return Err(AuthFileError::EmptyCredentials {
            path: path.display().to_string(),
        });
    }
    Ok(settings)
}

#[cfg(unix)]
fn check_auth_file_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Ok(meta) = std::fs::metadata(path) {
        let mode = meta.permissions().mode();
        if mode & 0o004 != 0 {
            warn!(
                path = %path.display(),
                "users file is world-readable; consider chmod 600"
            );
        }
    }
}

#[cfg(not(unix))]
fn check_auth_file_permissions(_path: &Path) {}

pub fn load_users_from_file(path: &Path) -> Result<Vec<AuthUser>, AuthFileError> {
    let raw = std::fs::read_to_string(path).map_err(|source| AuthFileError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let parsed: AuthFile = toml::from_str(&raw).map_err(|source| AuthFileError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    let mut users = Vec::new();

    if let (Some(username), Some(password)) = (parsed.username, parsed.password) {
        users.push(AuthUser {
            username,
            password,
            is_staff: parsed.is_staff,
            groups: parsed.groups,
        });
    }

    if let Some(more) = parsed.users {
        users.extend(more.into_iter().map(AuthUser::from));
    }

    Ok(users)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    pub synced: usize,
    pub pruned: usize,
}

/// Mirrors the credential file into the `users` table.
///
/// Existing accounts keep their ids. Listed groups are added, never removed.
/// With `prune`, accounts missing from the file are deleted along with their
/// orders and cart rows.
pub async fn sync_users(
    db: &Database,
    auth: &AuthSettings,
    prune: bool,
) -> Result<SyncSummary, RepositoryError> {
    let mut summary = SyncSummary::default();

    for entry in auth.users() {
        let user = db.users().upsert(&entry.username, entry.is_staff).await?;
        for name in &entry.groups {
            match Group::from_name(name) {
                Some(group) => db.users().add_to_group(user.id, group).await?,
                None => warn!(
                    username = %entry.username,
                    group = %name,
                    "ignoring unknown group in users file"
                ),
            }
        }
        debug!(user_id = user.id, username = %user.username, "user synced");
        summary.synced += 1;
    }

    if prune {
        for user in db.users().list().await? {
            if !auth.users.contains_key(&user.username) {
                db.users().delete(user.id).await?;
                info!(user_id = user.id, username = %user.username, "pruned user");
                summary.pruned += 1;
            }
        }
    }

    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use super::{load_auth, load_users_from_file, sync_users, AuthSettings, AuthUser};
    use crate::db::test_support::memory_db;
    use crate::roles::Group;

    #[test]
    fn auth_settings_merges_duplicate_users() {
        let settings = AuthSettings::from_users(vec![
            AuthUser::new("alice", "pw1"),
            AuthUser::new("alice", "pw2").staff(),
            AuthUser::new("bob", "pw3"),
        ]);

        assert!(!settings.is_empty());
        assert_eq!(settings.user_count(), 2);
        assert!(settings.is_authorized("alice", "pw2"));
        assert!(settings.is_authorized("bob", "pw3"));
        let alice = settings.users().find(|user| user.username == "alice");
        assert!(alice.is_some_and(|user| user.is_staff));
    }

    #[test]
    fn users_file_parses_single_and_list_users() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("users.toml");
        std::fs::write(
            &path,
            "username = \"admin\"\npassword = \"pw1\"\nis_staff = true\n\
             [[users]]\nusername = \"mario\"\npassword = \"pw2\"\ngroups = [\"Manager\"]\n",
        )?;

        let users = load_users_from_file(&path)?;

        assert_eq!(users.len(), 2);
        assert_eq!(users[0].username, "admin");
        assert!(users[0].is_staff);
        assert_eq!(users[1].username, "mario");
        assert!(!users[1].is_staff);
        assert_eq!(users[1].groups, vec![String::from("Manager")]);
        Ok(())
    }

    #[test]
    fn load_auth_rejects_empty_credentials_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.toml");
        std::fs::write(&path, "").unwrap();

        assert!(load_auth(&path).is_err());
    }

    #[test]
    fn load_auth_rejects_file_with_only_empty_users() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("users.toml");
        std::fs::write(&path, "username = \"\"\npassword = \"\"\n").unwrap();

        assert!(load_auth(&path).is_err());
    }

    #[test]
    fn auth_rejects_wrong_password() {
        let settings = AuthSettings::from_users(vec![AuthUser::new("user", "correct")]);
        assert!(!settings.is_authorized("user", "wrong"));
    }

    #[test]
    fn auth_rejects_unknown_user() {
        let settings = AuthSettings::from_users(vec![AuthUser::new("alice", "secret")]);
        assert!(!settings.is_authorized("bob", "secret"));
    }

    #[tokio::test]
    async fn sync_creates_accounts_and_groups() -> Result<()> {
        let db = memory_db().await?;
        let settings = AuthSettings::from_users(vec![
            AuthUser::new("admin", "pw").staff(),
            AuthUser::new("mario", "pw").in_group("Manager").in_group("Chef"),
        ]);

        let summary = sync_users(&db, &settings, false).await?;
        assert_eq!(summary.synced, 2);

        let mario = db.users().get_by_username("mario").await?.unwrap();
        assert_eq!(db.users().groups_of(mario.id).await?, vec![Group::Manager]);
        let admin = db.users().get_by_username("admin").await?.unwrap();
        assert!(admin.is_staff);
        Ok(())
    }

    #[tokio::test]
    async fn sync_prunes_accounts_missing_from_file() -> Result<()> {
        let db = memory_db().await?;
        let before = AuthSettings::from_users(vec![
            AuthUser::new("alice", "pw"),
            AuthUser::new("bob", "pw"),
        ]);
        sync_users(&db, &before, false).await?;

        let after = AuthSettings::from_users(vec![AuthUser::new("alice", "pw")]);
        let kept = sync_users(&db, &after, false).await?;
        assert_eq!(kept.pruned, 0);
        assert!(db.users().get_by_username("bob").await?.is_some());

        let pruned = sync_users(&db, &after, true).await?;
        assert_eq!(pruned.pruned, 1);
        assert!(db.users().get_by_username("bob").await?.is_none());
        Ok(())
    }
}
