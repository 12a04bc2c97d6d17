//! Field-level validation for item input.
//!
//! Validation collects every failing field instead of stopping at the first
//! one, so clients get the full picture in a single `422` response.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Maximum SKU length in characters.
pub const MAX_SKU_LEN: usize = 64;

/// Maximum item name length in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Field name → failure message map, serialized as the `details` of a
/// validation error response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    /// Creates an empty error set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure for `field`. A later failure on the same field
    /// replaces the earlier one.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    /// Returns `true` when no field failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the message recorded for `field`, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Returns the number of failing fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Converts the collected failures into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns `Err(self)` if at least one field failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

/// SKUs are 1..=64 characters of ASCII letters, digits and dashes.
pub fn check_sku(errors: &mut FieldErrors, sku: &str) {
    if sku.is_empty() {
        errors.add("sku", "is required");
    } else if sku.chars().count() > MAX_SKU_LEN {
        errors.add("sku", format!("must be at most {MAX_SKU_LEN} characters"));
    } else if !sku.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        errors.add("sku", "may only contain letters, digits and dashes");
    }
}

/// Names are non-blank and at most 255 characters.
pub fn check_name(errors: &mut FieldErrors, name: &str) {
    if name.trim().is_empty() {
        errors.add("name", "is required");
    } else if name.chars().count() > MAX_NAME_LEN {
        errors.add("name", format!("must be at most {MAX_NAME_LEN} characters"));
    }
}

/// Quantities are never negative.
pub fn check_quantity(errors: &mut FieldErrors, quantity: i32) {
    if quantity < 0 {
        errors.add("quantity", "must be zero or greater");
    }
}

/// Prices are finite and never negative.
pub fn check_price(errors: &mut FieldErrors, price: f64) {
    if !price.is_finite() {
        errors.add("price", "must be a finite number");
    } else if price < 0.0 {
        errors.add("price", "must be zero or greater");
    }
}

/// Per-item low stock thresholds are never negative.
pub fn check_low_stock_threshold(errors: &mut FieldErrors, threshold: i32) {
    if threshold < 0 {
        errors.add("low_stock_threshold", "must be zero or greater");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_sku_passes() {
        let mut errors = FieldErrors::new();
        check_sku(&mut errors, "WIDGET-42");
        assert!(errors.is_empty());
    }

    #[test]
    fn sku_rejects_spaces_and_symbols() {
        let mut errors = FieldErrors::new();
        check_sku(&mut errors, "bad sku!");
        assert!(errors.get("sku").is_some());
    }

    #[test]
    fn sku_rejects_overlong() {
        let mut errors = FieldErrors::new();
        check_sku(&mut errors, &"A".repeat(MAX_SKU_LEN + 1));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn blank_name_is_required() {
        let mut errors = FieldErrors::new();
        check_name(&mut errors, "   ");
        assert_eq!(errors.get("name"), Some("is required"));
    }

    #[test]
    fn price_rejects_nan_and_negative() {
        let mut errors = FieldErrors::new();
        check_price(&mut errors, f64::NAN);
        assert!(errors.get("price").is_some());

        let mut errors = FieldErrors::new();
        check_price(&mut errors, -0.01);
        assert!(errors.get("price").is_some());
    }

    #[test]
    fn collects_multiple_fields() {
        let mut errors = FieldErrors::new();
        check_quantity(&mut errors, -1);
        check_low_stock_threshold(&mut errors, -3);
        assert_eq!(errors.len(), 2);
        assert!(errors.clone().into_result().is_err());
        assert!(errors.to_string().contains("quantity"));
    }
}
