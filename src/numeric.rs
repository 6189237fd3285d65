// Lenient number parsing for command output: take the longest numeric prefix, ignore the rest
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref FLOAT_PREFIX: Regex =
        Regex::new(r"^[+-]?(Infinity|(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?)").unwrap();
    static ref INT_PREFIX: Regex = Regex::new(r"^[+-]?\d+").unwrap();
}

/// Parse a leading float, so `"50%"` is 50 and `"abc"` is NaN.
pub fn parse_float_lenient(input: &str) -> f64 {
    FLOAT_PREFIX
        .find(input.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

/// Parse a leading integer, truncating anything after the digits (`"3.7"` is 3).
/// Digit runs too long to fit an f64 give `None`.
pub fn parse_int_lenient(input: &str) -> Option<f64> {
    INT_PREFIX
        .find(input.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}
