//! Number formatting for amounts and rates.

use crate::core::currency::Currency;

/// Formats `amount` with `precision` fraction digits, `,` thousands separators
/// and a `.` decimal point.
pub fn format_number(amount: f64, precision: usize) -> String {
    let formatted = format!("{:.*}", precision, amount.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

/// Formats an amount with the currency symbol and display precision.
pub fn format_amount(amount: f64, currency: Currency) -> String {
    format!(
        "{} {}",
        currency.symbol(),
        format_number(amount, currency.precision())
    )
}

/// Formats a rate using the larger display precision of the two currencies.
pub fn format_rate(rate: f64, from: Currency, to: Currency) -> String {
    format_number(rate, from.precision().max(to.precision()))
}
