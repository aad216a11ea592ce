//! Relational storage for the ordering API.
//!
//! # Tables
//!
//! - `users` - accounts synced from the users file
//! - `groups`, `user_groups` - staff groups (`Manager`, `Delivery crew`); membership is a set
//! - `categories`, `menu_items` - the menu; deleting a category deletes its items
//! - `orders`, `order_items` - orders and their menu item set; a deleted crew
//!   member leaves the order unassigned
//! - `cart` - one row per add-to-cart, scoped by user
//!
//! Referential rules are enforced by SQLite foreign keys, which are switched on
//! for every pooled connection.

mod cart;
mod categories;
mod menu_items;
mod orders;
mod users;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::debug;

pub use cart::{CartFields, CartRepository};
pub use categories::CategoryRepository;
pub use menu_items::{MenuItemFields, MenuItemRepository, MenuOrdering};
pub use orders::{NewOrder, OrderRepository};
pub use users::UserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("referenced row does not exist")]
    MissingReference,
}

/// Maps foreign key violations to [`RepositoryError::MissingReference`].
fn map_write_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_foreign_key_violation() {
            return RepositoryError::MissingReference;
        }
    }
    RepositoryError::Database(err)
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        is_staff BOOLEAN NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS groups (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_groups (
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        group_id INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
        PRIMARY KEY (user_id, group_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS menu_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        price_cents INTEGER NOT NULL,
        category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        customer_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        delivery_crew_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
        status BOOLEAN NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS order_items (
        order_id INTEGER NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        menuitem_id INTEGER NOT NULL REFERENCES menu_items(id) ON DELETE CASCADE,
        PRIMARY KEY (order_id, menuitem_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cart (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        menuitem_id INTEGER NOT NULL REFERENCES menu_items(id) ON DELETE CASCADE,
        quantity INTEGER NOT NULL DEFAULT 1
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_menu_items_category ON menu_items(category_id)",
    "CREATE INDEX IF NOT EXISTS idx_orders_delivery_crew ON orders(delivery_crew_id)",
    "CREATE INDEX IF NOT EXISTS idx_cart_user ON cart(user_id)",
];

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the store and create missing tables.
    ///
    /// `sqlite::memory:` pins a single connection so every query sees the same database.
    pub async fn connect(database_url: &str) -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(8)
                .acquire_timeout(Duration::from_secs(10))
                .connect_with(options)
                .await?
        };

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!(statements = SCHEMA.len(), "schema ready");
        Ok(())
    }

    /// Round-trip used by the health endpoint.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn users(&self) -> UserRepository<'_> {
        UserRepository::new(&self.pool)
    }

    pub fn categories(&self) -> CategoryRepository<'_> {
        CategoryRepository::new(&self.pool)
    }

    pub fn menu_items(&self) -> MenuItemRepository<'_> {
        MenuItemRepository::new(&self.pool)
    }

    pub fn orders(&self) -> OrderRepository<'_> {
        OrderRepository::new(&self.pool)
    }

    pub fn cart(&self) -> CartRepository<'_> {
        CartRepository::new(&self.pool)
    }
}
