//! Per-user cart rows. Adding the same menu item twice creates two rows.

use sqlx::SqlitePool;

use super::RepositoryError;
use crate::models::CartItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartFields {
    pub menuitem_id: i64,
    pub quantity: i64,
}

pub struct CartRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CartRepository<'a> {
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItem>(
            "SELECT id, user_id, menuitem_id, quantity FROM cart WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_for_user(
        &self,
        id: i64,
        user_id: i64,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let row = sqlx::query_as::<_, CartItem>(
            "SELECT id, user_id, menuitem_id, quantity FROM cart WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    pub async fn create(&self, user_id: i64, fields: CartFields) -> Result<CartItem, RepositoryError> {
        let row = sqlx::query_as::<_, CartItem>(
            r#"
            INSERT INTO cart (user_id, menuitem_id, quantity)
            VALUES (?, ?, ?)
            RETURNING id, user_id, menuitem_id, quantity
            "#,
        )
        .bind(user_id)
        .bind(fields.menuitem_id)
        .bind(fields.quantity)
        .fetch_one(self.pool)
        .await
        .map_err(super::map_write_error)?;
        Ok(row)
    }

    pub async fn update_for_user(
        &self,
        id: i64,
        user_id: i64,
        fields: CartFields,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let row = sqlx::query_as::<_, CartItem>(
            r#"
            UPDATE cart SET menuitem_id = ?, quantity = ?
            WHERE id = ? AND user_id = ?
            RETURNING id, user_id, menuitem_id, quantity
            "#,
        )
        .bind(fields.menuitem_id)
        .bind(fields.quantity)
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await
        .map_err(super::map_write_error)?;
        Ok(row)
    }

    pub async fn delete_for_user(&self, id: i64, user_id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use anyhow::Result;

    use super::CartFields;
    use crate::db::test_support::memory_db;
    use crate::db::MenuItemFields;

    #[tokio::test]
    async fn rows_are_scoped_to_their_owner() -> Result<()> {
        let db = memory_db().await?;
        let alice = db.users().upsert("alice", false).await?;
        let bob = db.users().upsert("bob", false).await?;
        let category = db.categories().create("Drinks").await?;
        let item = db
            .menu_items()
            .create(&MenuItemFields {
                name: String::from("Lemonade"),
                description: String::from("fresh"),
                price_cents: 300,
                category_id: category.id,
            })
            .await?;
        let fields = CartFields {
            menuitem_id: item.id,
            quantity: 2,
        };

        let row = db.cart().create(alice.id, fields).await?;
        db.cart().create(alice.id, fields).await?;
        db.cart().create(bob.id, fields).await?;

        assert_eq!(db.cart().list_for_user(alice.id).await?.len(), 2);
        assert!(db.cart().get_for_user(row.id, bob.id).await?.is_none());
        assert!(!db.cart().delete_for_user(row.id, bob.id).await?);
        assert!(db.cart().delete_for_user(row.id, alice.id).await?);
        assert_eq!(db.cart().list_for_user(alice.id).await?.len(), 1);
        Ok(())
    }
}
