//! Persisted entities and their JSON representations.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// Prices carry two decimal places and at most six significant digits.
pub const PRICE_DECIMAL_PLACES: u32 = 2;
pub const PRICE_MAX_DIGITS: u32 = 6;
pub const NAME_MAX_LENGTH: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category_id: i64,
}

/// Line items are a plain set of menu item ids, without quantity or price snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub delivery_crew_id: Option<i64>,
    pub status: bool,
    pub items: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct CartItem {
    pub id: i64,
    pub user_id: i64,
    pub menuitem_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
}

pub fn price_from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, PRICE_DECIMAL_PLACES)
}

/// Converts a validated price to integer cents. `None` if it does not fit.
pub fn price_to_cents(price: Decimal) -> Option<i64> {
    let mut scaled = price;
    scaled.rescale(PRICE_DECIMAL_PLACES);
    i64::try_from(scaled.mantissa()).ok()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::{price_from_cents, price_to_cents};

    #[test]
    fn cents_convert_both_ways() {
        let price = Decimal::from_str("12.5").unwrap_or_default();
        assert_eq!(price_to_cents(price), Some(1250));
        assert_eq!(price_from_cents(1250).to_string(), "12.50");
        assert_eq!(price_from_cents(5).to_string(), "0.05");
    }
}
