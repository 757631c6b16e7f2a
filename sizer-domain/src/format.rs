//! Display rounding for derived values.
//!
//! ```text
//! |x| >= 10  →  shortest representation, truncated to 3 fractional digits
//! |x| <  10  →  fixed point, 4 significant digits
//! ```

use crate::value_objects::DerivedValue;

/// Significant digits kept for small magnitudes
const SIGNIFICANT_DIGITS: i32 = 4;

/// Fractional digits kept for large magnitudes
const TRUNCATED_DIGITS: usize = 3;

/// Upper bound on fixed-point precision
const MAX_PRECISION: i32 = 100;

/// Render a derived value for display.
///
/// # Examples
/// ```
/// # use sizer_domain::{format_display, DerivedValue};
/// assert_eq!(format_display(&DerivedValue::Number(168.0672268907563)), "168.067");
/// assert_eq!(format_display(&DerivedValue::Number(1.680672268907563)), "1.681");
/// assert_eq!(format_display(&DerivedValue::Number(f64::NAN)), "NaN");
/// ```
pub fn format_display(value: &DerivedValue) -> String {
    match value {
        DerivedValue::Number(number) => format_number(*number),
        DerivedValue::Trend(trend) => trend.to_string(),
        DerivedValue::Undefined => String::new(),
    }
}

fn format_number(number: f64) -> String {
    if number.is_nan() {
        return "NaN".to_string();
    }
    if number.is_infinite() {
        return if number > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if number == 0.0 {
        return "0".to_string();
    }

    if number.abs() >= 10.0 {
        let mut text = number.to_string();
        if let Some(dot) = text.find('.') {
            text.truncate((dot + 1 + TRUNCATED_DIGITS).min(text.len()));
        }
        text
    } else {
        let magnitude = number.abs().log10().floor() as i32;
        let precision = (SIGNIFICANT_DIGITS - 1 - magnitude).clamp(0, MAX_PRECISION) as usize;
        format!("{:.*}", precision, number)
    }
}
