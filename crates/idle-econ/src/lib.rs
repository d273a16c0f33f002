#![deny(warnings)]

//! Decimal economy for the idle core.
//!
//! Every balance, cost, effect and rate is a [`BigNum`]: a normalized
//! mantissa/exponent decimal whose magnitude is not limited by `f64`.
//! Values cross the storage boundary as numeric strings, so the free functions
//! here accept any of a numeric string, a native number, or an already parsed
//! [`BigNum`] (see [`IntoBigNum`]) and hand back strings for anything that is
//! going to be persisted.

mod bignum;
mod format;

pub use bignum::{BigNum, MAX_DIGITS};
pub use format::{
    format_big, format_duration, format_percent_big, format_rate_big, DEFAULT_PRECISION, SUFFIXES,
};

use thiserror::Error;

/// Errors produced by the economy layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EconError {
    /// Input string is not a decimal or scientific-notation number.
    #[error("malformed numeric string: {0:?}")]
    Parse(String),
    /// Native float was NaN or infinite.
    #[error("non-finite numeric value")]
    NonFinite,
    /// Divisor was zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Result is undefined or unrepresentable (e.g. negative base with a
    /// fractional power).
    #[error("result out of range")]
    OutOfRange,
}

/// Anything the economy functions accept as a numeric operand.
pub trait IntoBigNum {
    fn into_big_num(self) -> Result<BigNum, EconError>;
}

impl IntoBigNum for BigNum {
    fn into_big_num(self) -> Result<BigNum, EconError> {
        Ok(self)
    }
}

impl IntoBigNum for &BigNum {
    fn into_big_num(self) -> Result<BigNum, EconError> {
        Ok(*self)
    }
}

impl IntoBigNum for &str {
    fn into_big_num(self) -> Result<BigNum, EconError> {
        self.parse()
    }
}

impl IntoBigNum for String {
    fn into_big_num(self) -> Result<BigNum, EconError> {
        self.parse()
    }
}

impl IntoBigNum for &String {
    fn into_big_num(self) -> Result<BigNum, EconError> {
        self.parse()
    }
}

impl IntoBigNum for f64 {
    fn into_big_num(self) -> Result<BigNum, EconError> {
        BigNum::try_from(self)
    }
}

macro_rules! into_big_num_int {
    ($($t:ty),*) => {
        $(impl IntoBigNum for $t {
            fn into_big_num(self) -> Result<BigNum, EconError> {
                Ok(BigNum::from(self))
            }
        })*
    };
}

into_big_num_int!(u32, u64, i32, i64, usize);

fn binary(
    a: impl IntoBigNum,
    b: impl IntoBigNum,
    op: impl FnOnce(BigNum, BigNum) -> Result<BigNum, EconError>,
) -> Result<String, EconError> {
    Ok(op(a.into_big_num()?, b.into_big_num()?)?.to_string())
}

fn compare(
    a: impl IntoBigNum,
    b: impl IntoBigNum,
    pred: impl FnOnce(&BigNum, &BigNum) -> bool,
) -> Result<bool, EconError> {
    Ok(pred(&a.into_big_num()?, &b.into_big_num()?))
}

/// `a + b` as a canonical string.
pub fn add(a: impl IntoBigNum, b: impl IntoBigNum) -> Result<String, EconError> {
    binary(a, b, |x, y| Ok(x + y))
}

/// `a - b` as a canonical string.
pub fn subtract(a: impl IntoBigNum, b: impl IntoBigNum) -> Result<String, EconError> {
    binary(a, b, |x, y| Ok(x - y))
}

/// `a × b` as a canonical string.
pub fn multiply(a: impl IntoBigNum, b: impl IntoBigNum) -> Result<String, EconError> {
    binary(a, b, |x, y| Ok(x * y))
}

/// `a / b`; fails on a zero divisor.
pub fn divide(a: impl IntoBigNum, b: impl IntoBigNum) -> Result<String, EconError> {
    binary(a, b, |x, y| x.checked_div(y).ok_or(EconError::DivisionByZero))
}

/// `base^exponent`; integral exponents are exact.
pub fn power(base: impl IntoBigNum, exponent: impl IntoBigNum) -> Result<String, EconError> {
    binary(base, exponent, |x, y| {
        x.pow(y.to_f64()).ok_or(EconError::OutOfRange)
    })
}

/// The smaller of `a` and `b`.
pub fn min(a: impl IntoBigNum, b: impl IntoBigNum) -> Result<String, EconError> {
    binary(a, b, |x, y| Ok(x.min(y)))
}

/// The larger of `a` and `b`.
pub fn max(a: impl IntoBigNum, b: impl IntoBigNum) -> Result<String, EconError> {
    binary(a, b, |x, y| Ok(x.max(y)))
}

/// Round toward negative infinity.
pub fn floor(a: impl IntoBigNum) -> Result<String, EconError> {
    Ok(a.into_big_num()?.floor().to_string())
}

/// Round toward positive infinity.
pub fn ceil(a: impl IntoBigNum) -> Result<String, EconError> {
    Ok(a.into_big_num()?.ceil().to_string())
}

/// `a < b`.
pub fn lt(a: impl IntoBigNum, b: impl IntoBigNum) -> Result<bool, EconError> {
    compare(a, b, |x, y| x < y)
}

/// `a <= b`.
pub fn lte(a: impl IntoBigNum, b: impl IntoBigNum) -> Result<bool, EconError> {
    compare(a, b, |x, y| x <= y)
}

/// `a > b`.
pub fn gt(a: impl IntoBigNum, b: impl IntoBigNum) -> Result<bool, EconError> {
    compare(a, b, |x, y| x > y)
}

/// `a >= b`.
pub fn gte(a: impl IntoBigNum, b: impl IntoBigNum) -> Result<bool, EconError> {
    compare(a, b, |x, y| x >= y)
}

/// Numeric equality, so `"1e3"` equals `1000`.
pub fn eq(a: impl IntoBigNum, b: impl IntoBigNum) -> Result<bool, EconError> {
    compare(a, b, |x, y| x == y)
}

/// Numeric inequality.
pub fn neq(a: impl IntoBigNum, b: impl IntoBigNum) -> Result<bool, EconError> {
    compare(a, b, |x, y| x != y)
}

/// Human-readable value, e.g. `"1.50K"`. See [`format_big`].
pub fn format_decimal(value: impl IntoBigNum, precision: u32) -> Result<String, EconError> {
    Ok(format_big(&value.into_big_num()?, precision))
}

/// Percentage, e.g. `0.5` → `"50%"`.
pub fn format_percent(value: impl IntoBigNum, precision: u32) -> Result<String, EconError> {
    Ok(format_percent_big(&value.into_big_num()?, precision))
}

/// Per-second rate, e.g. `"12/sec"`.
pub fn format_rate(value: impl IntoBigNum, precision: u32) -> Result<String, EconError> {
    Ok(format_rate_big(&value.into_big_num()?, precision))
}

/// Exponential cost curve `base × growth^level`.
pub fn calculate_upgrade_cost(base: &BigNum, growth: &BigNum, level: u32) -> BigNum {
    *base * growth.powi(u64::from(level))
}
