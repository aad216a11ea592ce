//! Request bodies, their validation, and the small response envelopes.
//!
//! Entity representations themselves live on the model types in `crate::models`.

use axum::extract::{FromRequest, FromRequestParts};
use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use super::error::{ApiError, FieldErrors};
use crate::db::{CartFields, MenuItemFields, NewOrder};
use crate::models::{
    price_to_cents, CartItem, Category, MenuItem, NAME_MAX_LENGTH, PRICE_DECIMAL_PLACES,
    PRICE_MAX_DIGITS,
};

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";

/// JSON body extractor whose rejections render as [`ApiError::BadRequest`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path parameter extractor. An id that does not parse is reported as a missing object.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Integer that may arrive as a JSON number or a numeric string (`3` or `"3"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LooseInt(pub i64);

impl<'de> Deserialize<'de> for LooseInt {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(value) => Ok(LooseInt(value)),
            Raw::Text(text) => text
                .trim()
                .parse()
                .map(LooseInt)
                .map_err(|_| D::Error::custom(format!("\"{text}\" is not a valid integer"))),
        }
    }
}

fn loose(value: Option<LooseInt>) -> Option<i64> {
    value.map(|LooseInt(inner)| inner)
}

#[derive(Debug, Default, Deserialize)]
pub struct MenuListQuery {
    pub ordering: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryPayload {
    pub name: Option<String>,
}

impl CategoryPayload {
    /// Validated name; with `current`, a missing name keeps the stored one.
    pub fn into_name(self, current: Option<&Category>) -> Result<String, ApiError> {
        let mut errors = FieldErrors::default();
        let name = resolve_text(
            &mut errors,
            "name",
            self.name,
            current.map(|category| category.name.clone()),
            Some(NAME_MAX_LENGTH),
        );
        errors.into_result(name)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MenuItemPayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    #[serde(alias = "category")]
    pub category_id: Option<LooseInt>,
}

impl MenuItemPayload {
    /// Full validation when `current` is `None`; otherwise missing fields fall back to it.
    pub fn into_fields(self, current: Option<&MenuItem>) -> Result<MenuItemFields, ApiError> {
        let mut errors = FieldErrors::default();

        let name = resolve_text(
            &mut errors,
            "name",
            self.name,
            current.map(|item| item.name.clone()),
            Some(NAME_MAX_LENGTH),
        );
        let description = resolve_text(
            &mut errors,
            "description",
            self.description,
            current.map(|item| item.description.clone()),
            None,
        );

        let price_cents = match self.price.or(current.map(|item| item.price)) {
            Some(price) => validate_price(price).unwrap_or_else(|message| {
                errors.add("price", message);
                0
            }),
            None => {
                errors.add("price", REQUIRED);
                0
            }
        };

        let category_id = loose(self.category_id)
            .or(current.map(|item| item.category_id))
            .unwrap_or_else(|| {
                errors.add("category_id", REQUIRED);
                0
            });

        errors.into_result(MenuItemFields {
            name,
            description,
            price_cents,
            category_id,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderPayload {
    pub customer_id: Option<LooseInt>,
    pub delivery_crew_id: Option<LooseInt>,
    pub status: Option<bool>,
    pub items: Option<Vec<LooseInt>>,
}

impl OrderPayload {
    /// The customer defaults to the caller.
    pub fn into_new_order(self, caller_id: i64) -> Result<NewOrder, ApiError> {
        let mut errors = FieldErrors::default();
        let items: Vec<i64> = match self.items {
            None => {
                errors.add("items", REQUIRED);
                Vec::new()
            }
            Some(items) if items.is_empty() => {
                errors.add("items", "This list may not be empty.");
                Vec::new()
            }
            Some(items) => items.into_iter().map(|LooseInt(id)| id).collect(),
        };

        errors.into_result(NewOrder {
            customer_id: loose(self.customer_id).unwrap_or(caller_id),
            delivery_crew_id: loose(self.delivery_crew_id),
            status: self.status.unwrap_or(false),
            items,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AssignCrewPayload {
    pub delivery_crew_id: Option<LooseInt>,
}

impl AssignCrewPayload {
    pub fn crew_id(&self) -> Option<i64> {
        loose(self.delivery_crew_id)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderStatusPayload {
    pub status: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CartPayload {
    pub menuitem_id: Option<LooseInt>,
    pub quantity: Option<LooseInt>,
}

impl CartPayload {
    pub fn menuitem_id(&self) -> Option<i64> {
        loose(self.menuitem_id)
    }

    pub fn quantity(&self) -> Option<i64> {
        loose(self.quantity)
    }

    /// Full validation when `current` is `None`; otherwise missing fields fall back to it.
    pub fn into_fields(self, current: Option<&CartItem>) -> Result<CartFields, ApiError> {
        let mut errors = FieldErrors::default();
        let menuitem_id = self
            .menuitem_id()
            .or(current.map(|row| row.menuitem_id))
            .unwrap_or_else(|| {
                errors.add("menuitem_id", REQUIRED);
                0
            });
        let quantity = self
            .quantity()
            .or(current.map(|row| row.quantity))
            .unwrap_or_else(|| {
                errors.add("quantity", REQUIRED);
                0
            });
        errors.into_result(CartFields {
            menuitem_id,
            quantity,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GroupMemberPayload {
    pub user_id: Option<LooseInt>,
}

impl GroupMemberPayload {
    pub fn user_id(&self) -> Option<i64> {
        loose(self.user_id)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginPayload {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub auth_token: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
    pub groups: Vec<&'static str>,
    pub role: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

fn resolve_text(
    errors: &mut FieldErrors,
    field: &str,
    provided: Option<String>,
    fallback: Option<String>,
    max_length: Option<usize>,
) -> String {
    let Some(value) = provided.map(|raw| raw.trim().to_string()).or(fallback) else {
        errors.add(field, REQUIRED);
        return String::new();
    };
    if value.is_empty() {
        errors.add(field, BLANK);
    } else if let Some(max) = max_length.filter(|max| value.chars().count() > *max) {
        errors.add(
            field,
            format!("Ensure this field has no more than {max} characters."),
        );
    }
    value
}

/// Checks the fixed-point limits of a price and returns it in cents.
pub fn validate_price(price: Decimal) -> Result<i64, String> {
    let decimal_places = price.scale();
    let mut remaining = price.mantissa().unsigned_abs();
    let mut digits = 1_u32;
    while remaining >= 10 {
        remaining /= 10;
        digits += 1;
    }
    let total_digits = digits.max(decimal_places);
    let whole_digits = total_digits - decimal_places;
    let max_whole_digits = PRICE_MAX_DIGITS - PRICE_DECIMAL_PLACES;

    if total_digits > PRICE_MAX_DIGITS {
        return Err(format!(
            "Ensure that there are no more than {PRICE_MAX_DIGITS} digits in total."
        ));
    }
    if decimal_places > PRICE_DECIMAL_PLACES {
        return Err(format!(
            "Ensure that there are no more than {PRICE_DECIMAL_PLACES} decimal places."
        ));
    }
    if whole_digits > max_whole_digits {
        return Err(format!(
            "Ensure that there are no more than {max_whole_digits} digits before the decimal point."
        ));
    }
    price_to_cents(price).ok_or_else(|| String::from("A valid number is required."))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::{validate_price, CartPayload, LooseInt, MenuItemPayload, OrderPayload};
    use crate::http::error::ApiError;
    use crate::models::MenuItem;

    fn dec(raw: &str) -> Decimal {
        Decimal::from_str(raw).unwrap()
    }

    #[test]
    fn price_precision_limits() {
        assert_eq!(validate_price(dec("12.50")), Ok(1250));
        assert_eq!(validate_price(dec("9999.99")), Ok(999_999));
        assert_eq!(validate_price(dec("0.05")), Ok(5));
        assert!(validate_price(dec("12.505")).is_err());
        assert!(validate_price(dec("10000")).is_err());
        assert!(validate_price(dec("123456.7")).is_err());
    }

    #[test]
    fn loose_int_accepts_numbers_and_numeric_strings() {
        let parsed: Vec<LooseInt> = serde_json::from_str(r#"[3, "4", " 5 "]"#).unwrap();
        assert_eq!(parsed, vec![LooseInt(3), LooseInt(4), LooseInt(5)]);
        assert!(serde_json::from_str::<LooseInt>(r#""abc""#).is_err());
    }

    #[test]
    fn menu_item_create_reports_every_missing_field() {
        let result = MenuItemPayload::default().into_fields(None);
        let Err(ApiError::Validation(errors)) = result else {
            panic!("expected validation error");
        };
        let body = serde_json::to_value(&errors).unwrap();
        for field in ["name", "description", "price", "category_id"] {
            assert_eq!(body[field][0], "This field is required.");
        }
    }

    #[test]
    fn menu_item_partial_update_keeps_current_values() {
        let current = MenuItem {
            id: 1,
            name: String::from("Pasta"),
            description: String::from("fresh"),
            price: dec("12.50"),
            category_id: 2,
        };
        let payload: MenuItemPayload = serde_json::from_str(r#"{"price": "14.00"}"#).unwrap();

        let fields = payload.into_fields(Some(&current)).unwrap();
        assert_eq!(fields.name, "Pasta");
        assert_eq!(fields.price_cents, 1400);
        assert_eq!(fields.category_id, 2);
    }

    #[test]
    fn menu_item_rejects_long_names() {
        let payload = MenuItemPayload {
            name: Some("x".repeat(256)),
            description: Some(String::from("d")),
            price: Some(dec("1.00")),
            category_id: Some(LooseInt(1)),
        };
        assert!(matches!(payload.into_fields(None), Err(ApiError::Validation(_))));
    }

    #[test]
    fn order_defaults_customer_to_caller_and_requires_items() {
        let payload: OrderPayload = serde_json::from_str(r#"{"items": [1, "2"]}"#).unwrap();
        let order = payload.into_new_order(7).unwrap();
        assert_eq!(order.customer_id, 7);
        assert_eq!(order.items, vec![1, 2]);
        assert!(!order.status);

        let empty: OrderPayload = serde_json::from_str(r#"{"items": []}"#).unwrap();
        assert!(matches!(empty.into_new_order(7), Err(ApiError::Validation(_))));
    }

    #[test]
    fn cart_full_update_requires_both_fields() {
        let payload: CartPayload = serde_json::from_str(r#"{"quantity": 2}"#).unwrap();
        assert!(matches!(payload.into_fields(None), Err(ApiError::Validation(_))));
    }
}
