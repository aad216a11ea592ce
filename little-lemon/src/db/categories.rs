use sqlx::SqlitePool;

use super::RepositoryError;
use crate::models::Category;

pub struct CategoryRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CategoryRepository<'a> {
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY id")
                .fetch_all(self.pool)
                .await?;
        Ok(categories)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Category>, RepositoryError> {
        let category = sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(category)
    }

    pub async fn create(&self, name: &str) -> Result<Category, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name) VALUES (?) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(self.pool)
        .await?;
        Ok(category)
    }

    pub async fn update(&self, id: i64, name: &str) -> Result<Option<Category>, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = ? WHERE id = ? RETURNING id, name",
        )
        .bind(name)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(category)
    }

    /// Deletes the category together with its menu items.
    pub async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use anyhow::Result;

    use crate::db::test_support::memory_db;

    #[tokio::test]
    async fn update_returns_none_for_missing_category() -> Result<()> {
        let db = memory_db().await?;
        let created = db.categories().create("Mains").await?;

        let renamed = db.categories().update(created.id, "Main courses").await?;
        assert_eq!(renamed.map(|c| c.name), Some(String::from("Main courses")));
        assert!(db.categories().update(created.id + 1, "Nope").await?.is_none());
        Ok(())
    }
}
