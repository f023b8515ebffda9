//! Size string conversions

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SIZE_REGEX: Regex =
        Regex::new(r"(?i)(?P<size>[\d.]+)\s*(?P<unit>[bkmgt])?").unwrap();
}

/// Parses a human size string like `"4M"` or `"1.5G"` into bytes.
///
/// Unit letters are case-insensitive and scale by powers of 1024
/// (`B`, `K`, `M`, `G`, `T`). A bare number means bytes; fractional
/// results truncate toward zero. Input without any digits yields 1.
pub fn size_in_bytes(size: &str) -> u64 {
    let mut value = 1.0f64;
    let mut exponent = 0i32;

    if let Some(caps) = SIZE_REGEX.captures(size) {
        value = caps
            .name("size")
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(1.0);
        exponent = caps
            .name("unit")
            .map(|m| unit_exponent(m.as_str()))
            .unwrap_or(0);
    }

    (value * 1024f64.powi(exponent)) as u64
}

fn unit_exponent(unit: &str) -> i32 {
    match unit.to_ascii_lowercase().as_str() {
        "k" => 1,
        "m" => 2,
        "g" => 3,
        "t" => 4,
        _ => 0,
    }
}

/// Renders a byte count as a short human string with two decimals at most
/// (`1030` becomes `"1.01K"`). Zero and negative counts render empty.
pub fn format_size(size: i64) -> String {
    if size <= 0 {
        return String::new();
    }

    const SUFFIXES: [&str; 5] = ["B", "K", "M", "G", "T"];

    let base = (size as f64).ln() / 1024f64.ln();
    let exponent = base.floor();
    let suffix = SUFFIXES.get(exponent as usize).copied().unwrap_or("");
    let value = (1024f64.powf(base - exponent) * 100.0).round() / 100.0;

    format!("{}{}", value, suffix)
}
