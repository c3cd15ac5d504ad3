//! # Utilities Module
//!
//! This module contains helper functions and utilities used
//! across the backend service.

/// Format a money amount as a human-readable string.
///
/// Converts from minor units (cents) to readable format with the
/// currency code uppercased.
///
/// ## Arguments
///
/// * `amount` - Amount in minor units
/// * `currency` - ISO currency code (e.g., "usd")
///
/// ## Returns
///
/// Formatted string like "1,234.56 USD"
///
/// ## Examples
///
/// ```rust,ignore
/// assert_eq!(format_amount(33_000, "usd"), "330.00 USD");
/// assert_eq!(format_amount(123_456_789, "eur"), "1,234,567.89 EUR");
/// ```
pub fn format_amount(amount: i64, currency: &str) -> String {
    let negative = amount < 0;
    let cents = amount.unsigned_abs();
    let whole = cents / 100;
    let frac = cents % 100;

    // Add commas
    let whole_str = whole.to_string();
    let mut result = String::new();
    for (i, c) in whole_str.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    let reversed: String = result.chars().rev().collect();

    let sign = if negative { "-" } else { "" };
    format!("{}{}.{:02} {}", sign, reversed, frac, currency.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(33_000, "usd"), "330.00 USD");
        assert_eq!(format_amount(47_000, "usd"), "470.00 USD");
        assert_eq!(format_amount(105, "usd"), "1.05 USD");
        assert_eq!(format_amount(0, "usd"), "0.00 USD");
    }

    #[test]
    fn test_format_amount_thousands_separator() {
        assert_eq!(format_amount(123_456_789, "eur"), "1,234,567.89 EUR");
        assert_eq!(format_amount(100_000, "usd"), "1,000.00 USD");
    }

    #[test]
    fn test_format_amount_negative() {
        assert_eq!(format_amount(-2_500, "usd"), "-25.00 USD");
    }
}
