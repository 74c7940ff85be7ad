//! Turns raw card strings into typed values.
//!
//! Every function here is total: any input maps to a value or to
//! [`Field::Unavailable`], nothing panics.

use crate::models::{Field, UNAVAILABLE};
use once_cell::sync::Lazy;
use regex::Regex;

static NON_MANTISSA: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9.]").unwrap());
static AREA_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+(?:\.[0-9]+)?").unwrap());

/// Magnitude words used in Indonesian price labels, with their power of ten
const MAGNITUDES: &[(&str, u32)] = &[("miliar", 9), ("juta", 6)];

fn is_placeholder(raw: &str) -> bool {
    let raw = raw.trim();
    raw.is_empty() || raw.eq_ignore_ascii_case(UNAVAILABLE)
}

/// Parse a price label such as `Rp 1,5 Miliar` into whole rupiah.
///
/// `,` is the decimal separator when a magnitude word is present; without one
/// every non-digit is dropped, so `Rp 1.250.000` reads as 1250000.
pub fn normalize_price(raw: &str) -> Field<i64> {
    if is_placeholder(raw) {
        return Field::Unavailable;
    }

    let text = raw.to_lowercase().replace("rp", "").replace(',', ".");
    let magnitude = MAGNITUDES
        .iter()
        .find(|(word, _)| text.contains(word))
        .map(|(_, exp)| *exp);

    let value = match magnitude {
        Some(exp) => scale_mantissa(&NON_MANTISSA.replace_all(&text, ""), exp),
        None => {
            let digits: String = text.chars().filter(char::is_ascii_digit).collect();
            digits.parse::<i64>().ok()
        }
    };

    value.into()
}

/// `mantissa * 10^exp` in integer arithmetic, truncating surplus fraction digits
fn scale_mantissa(mantissa: &str, exp: u32) -> Option<i64> {
    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if fraction.contains('.') || (whole.is_empty() && fraction.is_empty()) {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let fraction: String = fraction.chars().take(exp as usize).collect();
    let fraction: i64 = if fraction.is_empty() {
        0
    } else {
        fraction.parse::<i64>().ok()? * 10i64.pow(exp - fraction.len() as u32)
    };

    whole.checked_mul(10i64.pow(exp))?.checked_add(fraction)
}

/// First numeric token of an area label (`60 m2`, `LT: 72.5`), in square meters
pub fn normalize_area(raw: &str) -> Field<f64> {
    if is_placeholder(raw) {
        return Field::Unavailable;
    }

    AREA_TOKEN
        .find(raw)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .into()
}
