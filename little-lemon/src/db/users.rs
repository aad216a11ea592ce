//! Accounts and staff group membership.

use sqlx::SqlitePool;

use super::RepositoryError;
use crate::models::User;
use crate::roles::Group;

pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>("SELECT id, username, is_staff FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, is_staff FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    pub async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let users =
            sqlx::query_as::<_, User>("SELECT id, username, is_staff FROM users ORDER BY id")
                .fetch_all(self.pool)
                .await?;
        Ok(users)
    }

    /// Insert the account or refresh its staff flag. The id of an existing account is kept.
    pub async fn upsert(&self, username: &str, is_staff: bool) -> Result<User, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, is_staff)
            VALUES (?, ?)
            ON CONFLICT(username) DO UPDATE SET is_staff = excluded.is_staff
            RETURNING id, username, is_staff
            "#,
        )
        .bind(username)
        .bind(is_staff)
        .fetch_one(self.pool)
        .await?;
        Ok(user)
    }

    /// Deletes the account. Its orders and cart rows go with it; orders it was
    /// delivering become unassigned.
    pub async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn groups_of(&self, user_id: i64) -> Result<Vec<Group>, RepositoryError> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT g.name
            FROM groups g
            JOIN user_groups ug ON ug.group_id = g.id
            WHERE ug.user_id = ?
            ORDER BY g.name
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(names
            .iter()
            .filter_map(|name| Group::from_name(name))
            .collect())
    }

    /// Creates the group if needed and adds the user. Adding twice is a no-op.
    pub async fn add_to_group(&self, user_id: i64, group: Group) -> Result<(), RepositoryError> {
        sqlx::query("INSERT OR IGNORE INTO groups (name) VALUES (?)")
            .bind(group.as_str())
            .execute(self.pool)
            .await?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO user_groups (user_id, group_id)
            SELECT ?, id FROM groups WHERE name = ?
            "#,
        )
        .bind(user_id)
        .bind(group.as_str())
        .execute(self.pool)
        .await
        .map_err(super::map_write_error)?;
        Ok(())
    }

    pub async fn members_of(&self, group: Group) -> Result<Vec<User>, RepositoryError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.is_staff
            FROM users u
            JOIN user_groups ug ON ug.user_id = u.id
            JOIN groups g ON g.id = ug.group_id
            WHERE g.name = ?
            ORDER BY u.id
            "#,
        )
        .bind(group.as_str())
        .fetch_all(self.pool)
        .await?;
        Ok(users)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use anyhow::Result;

    use crate::db::test_support::memory_db;
    use crate::roles::Group;

    #[tokio::test]
    async fn upsert_keeps_id_and_refreshes_staff_flag() -> Result<()> {
        let db = memory_db().await?;
        let first = db.users().upsert("mario", false).await?;
        let second = db.users().upsert("mario", true).await?;

        assert_eq!(first.id, second.id);
        assert!(second.is_staff);
        assert_eq!(db.users().list().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn group_membership_is_a_set() -> Result<()> {
        let db = memory_db().await?;
        let user = db.users().upsert("luigi", false).await?;

        db.users().add_to_group(user.id, Group::DeliveryCrew).await?;
        db.users().add_to_group(user.id, Group::DeliveryCrew).await?;

        assert_eq!(db.users().members_of(Group::DeliveryCrew).await?, vec![user.clone()]);
        assert_eq!(db.users().groups_of(user.id).await?, vec![Group::DeliveryCrew]);
        assert!(db.users().members_of(Group::Manager).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn delete_removes_memberships() -> Result<()> {
        let db = memory_db().await?;
        let user = db.users().upsert("peach", false).await?;
        db.users().add_to_group(user.id, Group::Manager).await?;

        assert!(db.users().delete(user.id).await?);
        assert!(db.users().get(user.id).await?.is_none());
        assert!(db.users().members_of(Group::Manager).await?.is_empty());
        assert!(!db.users().delete(user.id).await?);
        Ok(())
    }
}
