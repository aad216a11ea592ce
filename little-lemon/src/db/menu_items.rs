use sqlx::{FromRow, SqlitePool};

use super::RepositoryError;
use crate::models::{price_from_cents, MenuItem};

/// Sort order for menu listings, taken from the `ordering` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MenuOrdering {
    #[default]
    Id,
    PriceAscending,
    PriceDescending,
}

impl MenuOrdering {
    /// Unknown fields are ignored rather than rejected.
    pub fn from_query(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("price") => MenuOrdering::PriceAscending,
            Some("-price") => MenuOrdering::PriceDescending,
            _ => MenuOrdering::Id,
        }
    }

    fn order_by(self) -> &'static str {
        match self {
            MenuOrdering::Id => "id ASC",
            MenuOrdering::PriceAscending => "price_cents ASC, id ASC",
            MenuOrdering::PriceDescending => "price_cents DESC, id ASC",
        }
    }
}

/// Writable columns of a menu item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItemFields {
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub category_id: i64,
}

#[derive(Debug, FromRow)]
struct MenuItemRow {
    id: i64,
    name: String,
    description: String,
    price_cents: i64,
    category_id: i64,
}

impl From<MenuItemRow> for MenuItem {
    fn from(row: MenuItemRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: price_from_cents(row.price_cents),
            category_id: row.category_id,
        }
    }
}

const COLUMNS: &str = "id, name, description, price_cents, category_id";

pub struct MenuItemRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MenuItemRepository<'a> {
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, ordering: MenuOrdering) -> Result<Vec<MenuItem>, RepositoryError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM menu_items ORDER BY {}",
            ordering.order_by()
        );
        let rows = sqlx::query_as::<_, MenuItemRow>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(MenuItem::from).collect())
    }

    pub async fn get(&self, id: i64) -> Result<Option<MenuItem>, RepositoryError> {
        let sql = format!("SELECT {COLUMNS} FROM menu_items WHERE id = ?");
        let row = sqlx::query_as::<_, MenuItemRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(MenuItem::from))
    }

    pub async fn exists(&self, id: i64) -> Result<bool, RepositoryError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM menu_items WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(found.is_some())
    }

    pub async fn create(&self, fields: &MenuItemFields) -> Result<MenuItem, RepositoryError> {
        let sql = format!(
            "INSERT INTO menu_items (name, description, price_cents, category_id) \
             VALUES (?, ?, ?, ?) RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, MenuItemRow>(&sql)
            .bind(&fields.name)
            .bind(&fields.description)
            .bind(fields.price_cents)
            .bind(fields.category_id)
            .fetch_one(self.pool)
            .await
            .map_err(super::map_write_error)?;
        Ok(row.into())
    }

    pub async fn update(
        &self,
        id: i64,
        fields: &MenuItemFields,
    ) -> Result<Option<MenuItem>, RepositoryError> {
        let sql = format!(
            "UPDATE menu_items SET name = ?, description = ?, price_cents = ?, category_id = ? \
             WHERE id = ? RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, MenuItemRow>(&sql)
            .bind(&fields.name)
            .bind(&fields.description)
            .bind(fields.price_cents)
            .bind(fields.category_id)
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(super::map_write_error)?;
        Ok(row.map(MenuItem::from))
    }

    pub async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM menu_items WHERE id = ?")
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

    use super::{MenuItemFields, MenuOrdering};
    use crate::db::test_support::memory_db;
    use crate::db::RepositoryError;
    use crate::models::price_to_cents;

    fn fields(name: &str, price_cents: i64, category_id: i64) -> MenuItemFields {
        MenuItemFields {
            name: String::from(name),
            description: String::from("house special"),
            price_cents,
            category_id,
        }
    }

    #[test]
    fn ordering_ignores_unknown_fields() {
        assert_eq!(MenuOrdering::from_query(Some("price")), MenuOrdering::PriceAscending);
        assert_eq!(MenuOrdering::from_query(Some("-price")), MenuOrdering::PriceDescending);
        assert_eq!(MenuOrdering::from_query(Some("name")), MenuOrdering::Id);
        assert_eq!(MenuOrdering::from_query(None), MenuOrdering::Id);
    }

    #[tokio::test]
    async fn list_sorts_by_price() -> Result<()> {
        let db = memory_db().await?;
        let category = db.categories().create("Mains").await?;
        db.menu_items().create(&fields("Pasta", 1250, category.id)).await?;
        db.menu_items().create(&fields("Bruschetta", 550, category.id)).await?;
        db.menu_items().create(&fields("Lemon dessert", 800, category.id)).await?;

        let ascending: Vec<i64> = db
            .menu_items()
            .list(MenuOrdering::PriceAscending)
            .await?
            .into_iter()
            .filter_map(|item| price_to_cents(item.price))
            .collect();
        assert_eq!(ascending, vec![550, 800, 1250]);

        let descending = db.menu_items().list(MenuOrdering::PriceDescending).await?;
        assert_eq!(descending.first().map(|item| item.name.as_str()), Some("Pasta"));
        Ok(())
    }

    #[tokio::test]
    async fn create_with_unknown_category_is_a_missing_reference() -> Result<()> {
        let db = memory_db().await?;
        let result = db.menu_items().create(&fields("Ghost", 100, 42)).await;
        assert!(matches!(result, Err(RepositoryError::MissingReference)));
        Ok(())
    }

    #[tokio::test]
    async fn deleting_category_cascades_to_menu_items() -> Result<()> {
        let db = memory_db().await?;
        let category = db.categories().create("Starters").await?;
        let item = db.menu_items().create(&fields("Soup", 400, category.id)).await?;

        assert!(db.categories().delete(category.id).await?);
        assert!(db.menu_items().get(item.id).await?.is_none());
        Ok(())
    }
}
