//! Orders and their menu item sets.

use std::collections::HashMap;

use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use super::RepositoryError;
use crate::models::Order;
use crate::roles::OrderScope;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub customer_id: i64,
    pub delivery_crew_id: Option<i64>,
    pub status: bool,
    pub items: Vec<i64>,
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: i64,
    customer_id: i64,
    delivery_crew_id: Option<i64>,
    status: bool,
}

impl OrderRow {
    fn into_order(self, items: Vec<i64>) -> Order {
        Order {
            id: self.id,
            customer_id: self.customer_id,
            delivery_crew_id: self.delivery_crew_id,
            status: self.status,
            items,
        }
    }
}

pub struct OrderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> OrderRepository<'a> {
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, scope: OrderScope) -> Result<Vec<Order>, RepositoryError> {
        let rows = match scope {
            OrderScope::All => {
                sqlx::query_as::<_, OrderRow>(
                    "SELECT id, customer_id, delivery_crew_id, status FROM orders ORDER BY id",
                )
                .fetch_all(self.pool)
                .await?
            }
            OrderScope::AssignedTo(crew_id) => {
                sqlx::query_as::<_, OrderRow>(
                    "SELECT id, customer_id, delivery_crew_id, status FROM orders \
                     WHERE delivery_crew_id = ? ORDER BY id",
                )
                .bind(crew_id)
                .fetch_all(self.pool)
                .await?
            }
        };

        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let mut items = self.items_for(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            "SELECT id, customer_id, delivery_crew_id, status FROM orders WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let items = self.items_for(&[row.id]).await?.remove(&row.id);
        Ok(Some(row.into_order(items.unwrap_or_default())))
    }

    /// Writes the order and its item set in one transaction.
    pub async fn create(&self, new: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            INSERT INTO orders (customer_id, delivery_crew_id, status)
            VALUES (?, ?, ?)
            RETURNING id, customer_id, delivery_crew_id, status
            "#,
        )
        .bind(new.customer_id)
        .bind(new.delivery_crew_id)
        .bind(new.status)
        .fetch_one(&mut *tx)
        .await
        .map_err(super::map_write_error)?;

        let mut items = new.items.clone();
        items.sort_unstable();
        items.dedup();
        for menuitem_id in &items {
            sqlx::query("INSERT INTO order_items (order_id, menuitem_id) VALUES (?, ?)")
                .bind(row.id)
                .bind(*menuitem_id)
                .execute(&mut *tx)
                .await
                .map_err(super::map_write_error)?;
        }

        tx.commit().await?;
        Ok(row.into_order(items))
    }

    pub async fn set_delivery_crew(&self, id: i64, crew_id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE orders SET delivery_crew_id = ? WHERE id = ?")
            .bind(crew_id)
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(super::map_write_error)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_status(&self, id: i64, status: bool) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE orders SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn items_for(&self, order_ids: &[i64]) -> Result<HashMap<i64, Vec<i64>>, RepositoryError> {
        let mut grouped: HashMap<i64, Vec<i64>> = HashMap::new();
        if order_ids.is_empty() {
            return Ok(grouped);
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT order_id, menuitem_id FROM order_items WHERE order_id IN (");
        let mut separated = builder.separated(", ");
        for id in order_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY order_id, menuitem_id");

        let pairs: Vec<(i64, i64)> = builder.build_query_as().fetch_all(self.pool).await?;
        for (order_id, menuitem_id) in pairs {
            grouped.entry(order_id).or_default().push(menuitem_id);
        }
        Ok(grouped)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use anyhow::Result;

    use super::NewOrder;
    use crate::db::test_support::memory_db;
    use crate::db::{Database, MenuItemFields};
    use crate::roles::OrderScope;

    async fn seed_item(db: &Database) -> Result<i64> {
        let category = db.categories().create("Mains").await?;
        let item = db
            .menu_items()
            .create(&MenuItemFields {
                name: String::from("Greek salad"),
                description: String::from("crisp"),
                price_cents: 1250,
                category_id: category.id,
            })
            .await?;
        Ok(item.id)
    }

    #[tokio::test]
    async fn list_filters_by_assigned_crew() -> Result<()> {
        let db = memory_db().await?;
        let customer = db.users().upsert("customer", false).await?;
        let crew = db.users().upsert("crew", false).await?;
        let item = seed_item(&db).await?;

        let assigned = db
            .orders()
            .create(&NewOrder {
                customer_id: customer.id,
                delivery_crew_id: Some(crew.id),
                status: false,
                items: vec![item, item],
            })
            .await?;
        db.orders()
            .create(&NewOrder {
                customer_id: customer.id,
                delivery_crew_id: None,
                status: false,
                items: Vec::new(),
            })
            .await?;

        let mine = db.orders().list(OrderScope::AssignedTo(crew.id)).await?;
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, assigned.id);
        assert_eq!(mine[0].items, vec![item]);
        assert_eq!(db.orders().list(OrderScope::All).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn deleting_crew_member_unassigns_orders() -> Result<()> {
        let db = memory_db().await?;
        let customer = db.users().upsert("customer", false).await?;
        let crew = db.users().upsert("crew", false).await?;
        let order = db
            .orders()
            .create(&NewOrder {
                customer_id: customer.id,
                delivery_crew_id: Some(crew.id),
                status: false,
                items: Vec::new(),
            })
            .await?;

        db.users().delete(crew.id).await?;
        let reloaded = db.orders().get(order.id).await?.unwrap();
        assert_eq!(reloaded.delivery_crew_id, None);

        db.users().delete(customer.id).await?;
        assert!(db.orders().get(order.id).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn status_and_crew_updates_report_missing_orders() -> Result<()> {
        let db = memory_db().await?;
        let crew = db.users().upsert("crew", false).await?;
        assert!(!db.orders().set_status(404, true).await?);
        assert!(!db.orders().set_delivery_crew(404, crew.id).await?);
        Ok(())
    }
}
