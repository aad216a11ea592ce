//! HTTP layer: Axum router, resource handlers, and request/response payloads.
//!
//! Resources: `/menu-items/`, `/categories/`, `/orders/`, `/cart/menu-items/`,
//! plus the staff group endpoints and token login.

mod auth;
mod cart;
mod categories;
mod error;
mod groups;
mod handlers;
mod menu_items;
mod orders;
mod payloads;
mod state;


pub use handlers::router;
pub use state::{AppState, TokenStore};
