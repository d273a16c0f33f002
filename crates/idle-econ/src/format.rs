//! Human-readable rendering of economy values.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::BigNum;

/// Decimal places used when a caller has no preference.
pub const DEFAULT_PRECISION: u32 = 2;

/// Magnitude suffixes; index `i` covers `10^(3i) ..< 10^(3i + 3)`.
pub const SUFFIXES: [&str; 22] = [
    "", "K", "M", "B", "T", "Qa", "Qi", "Sx", "Sp", "Oc", "No", "Dc", "UDc", "DDc", "TDc", "QaDc",
    "QiDc", "SxDc", "SpDc", "OcDc", "NoDc", "Vg",
];

const THOUSAND: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// Render a value for display.
///
/// Below 1000 the value is rounded to `precision` places with trailing zeros
/// dropped and thousands grouped. From 1000 up the value is scaled into its
/// suffix tier and printed with exactly `precision` places (`1.50K`). Values
/// past the last tier switch to `<mantissa>e<exponent>`.
pub fn format_big(value: &BigNum, precision: u32) -> String {
    if value.is_zero() {
        return "0".to_string();
    }
    if value.is_negative() {
        return format!("-{}", format_big(&value.abs(), precision));
    }
    if value.exponent() < 3 {
        let Some(exact) = value.to_decimal() else {
            return "0".to_string();
        };
        let rounded = round(exact, precision);
        if rounded < THOUSAND {
            return group_thousands(rounded);
        }
        // Rounded up into the first suffix tier.
        return suffixed(BigNum::from(rounded), precision);
    }
    suffixed(*value, precision)
}

fn suffixed(value: BigNum, precision: u32) -> String {
    let exponent = value.exponent();
    let mut tier = (exponent / 3) as usize;
    if exponent / 3 < SUFFIXES.len() as i64 {
        let shift = Decimal::from_i128_with_scale(10i128.pow((exponent % 3) as u32), 0);
        let mut scaled = round(value.mantissa() * shift, precision);
        if scaled >= THOUSAND {
            tier += 1;
            scaled = round(scaled / THOUSAND, precision);
        }
        if tier < SUFFIXES.len() {
            return format!("{}{}", fixed(scaled, precision), SUFFIXES[tier]);
        }
        return scientific(BigNum::pow10(tier as i64 * 3), precision);
    }
    scientific(value, precision)
}

fn scientific(value: BigNum, precision: u32) -> String {
    let mut exponent = value.exponent();
    let mut mantissa = round(value.mantissa(), precision);
    if mantissa >= Decimal::TEN {
        mantissa = round(mantissa / Decimal::TEN, precision);
        exponent += 1;
    }
    format!("{}e{}", fixed(mantissa, precision), exponent)
}

fn round(value: Decimal, precision: u32) -> Decimal {
    value.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero)
}

/// Exactly `precision` fractional digits.
fn fixed(value: Decimal, precision: u32) -> String {
    let mut v = value;
    v.rescale(precision);
    v.to_string()
}

fn group_thousands(value: Decimal) -> String {
    let text = value.normalize().to_string();
    let (int, frac) = match text.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (text, None),
    };
    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    match frac {
        Some(f) => format!("{grouped}.{f}"),
        None => grouped,
    }
}

/// `0.25` → `"25%"`.
pub fn format_percent_big(value: &BigNum, precision: u32) -> String {
    let hundred = BigNum::from(100u32);
    format!("{}%", format_big(&(*value * hundred), precision))
}

/// Per-second rate, e.g. `"1.50K/sec"`.
pub fn format_rate_big(value: &BigNum, precision: u32) -> String {
    format!("{}/sec", format_big(value, precision))
}

/// Largest non-zero units down to seconds: `3725` → `"1h 2m 5s"`.
pub fn format_duration(total_seconds: u64) -> String {
    if total_seconds == 0 {
        return "0s".to_string();
    }
    let units = [
        (total_seconds / 86_400, "d"),
        ((total_seconds % 86_400) / 3_600, "h"),
        ((total_seconds % 3_600) / 60, "m"),
        (total_seconds % 60, "s"),
    ];
    units
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| format!("{n}{unit}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(s: &str) -> String {
        format_big(&s.parse().unwrap(), DEFAULT_PRECISION)
    }

    #[test]
    fn small_values_drop_trailing_zeros() {
        assert_eq!(fmt("0"), "0");
        assert_eq!(fmt("999"), "999");
        assert_eq!(fmt("12.5"), "12.5");
        assert_eq!(fmt("12.345"), "12.35");
        assert_eq!(fmt("0.001"), "0");
        assert_eq!(format_big(&"0".parse().unwrap(), 5), "0");
    }

    #[test]
    fn suffix_tiers() {
        assert_eq!(fmt("1500"), "1.50K");
        assert_eq!(fmt("1.5e15"), "1.50Qa");
        assert_eq!(fmt("25000000"), "25.00M");
        assert_eq!(fmt("999999"), "1.00M");
        assert_eq!(fmt("999.999"), "1.00K");
        assert_eq!(format_big(&"123456".parse().unwrap(), 0), "123K");
    }

    #[test]
    fn scientific_past_the_table() {
        assert_eq!(fmt("1.5e66"), "1.50e66");
        assert_eq!(fmt("9.999e70"), "1.00e71");
        assert_eq!(fmt("1e3000"), "1.00e3000");
    }

    #[test]
    fn negatives_mirror_positives() {
        assert_eq!(fmt("-1500"), "-1.50K");
        assert_eq!(fmt("-3"), "-3");
    }

    #[test]
    fn percent_and_rate() {
        assert_eq!(format_percent_big(&"0.25".parse().unwrap(), 2), "25%");
        assert_eq!(format_percent_big(&"0.5".parse().unwrap(), 0), "50%");
        assert_eq!(format_rate_big(&"1500".parse().unwrap(), 2), "1.50K/sec");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(3725), "1h 2m 5s");
        assert_eq!(format_duration(3600), "1h");
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(90_061), "1d 1h 1m 1s");
        assert_eq!(format_duration(3605), "1h 5s");
    }
}
