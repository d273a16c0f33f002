//! Arbitrary-magnitude decimal value used for every balance, cost and rate.

use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::EconError;

/// Significant digits kept in the mantissa.
pub const MAX_DIGITS: usize = 28;

/// Exponent window rendered as a plain decimal string.
const PLAIN_MIN_EXPONENT: i64 = -7;
const PLAIN_MAX_EXPONENT: i64 = 21;

/// A decimal number of the form `mantissa × 10^exponent`.
///
/// The mantissa is kept normalized to `1 ≤ |mantissa| < 10`, or exactly zero
/// with a zero exponent, so two equal values always share one representation.
/// Magnitudes are bounded only by the `i64` exponent.
#[derive(Clone, Copy, Debug)]
pub struct BigNum {
    mantissa: Decimal,
    exponent: i64,
}

impl BigNum {
    /// Zero.
    pub const ZERO: BigNum = BigNum {
        mantissa: Decimal::ZERO,
        exponent: 0,
    };
    /// One.
    pub const ONE: BigNum = BigNum {
        mantissa: Decimal::ONE,
        exponent: 0,
    };

    /// Build from an arbitrary mantissa/exponent pair, normalizing it.
    pub fn new(mantissa: Decimal, exponent: i64) -> Self {
        normalized(mantissa, exponent)
    }

    /// `10^exponent`.
    pub fn pow10(exponent: i64) -> Self {
        BigNum {
            mantissa: Decimal::ONE,
            exponent,
        }
    }

    /// Normalized mantissa, `1 <= |m| < 10` or zero.
    pub fn mantissa(&self) -> Decimal {
        self.mantissa
    }

    /// Base-10 exponent.
    pub fn exponent(&self) -> i64 {
        self.exponent
    }

    /// True for exact zero.
    pub fn is_zero(&self) -> bool {
        self.mantissa.is_zero()
    }

    /// Strictly below zero.
    pub fn is_negative(&self) -> bool {
        self.mantissa.is_sign_negative() && !self.is_zero()
    }

    /// Strictly above zero.
    pub fn is_positive(&self) -> bool {
        !self.is_negative() && !self.is_zero()
    }

    /// Absolute value.
    pub fn abs(self) -> Self {
        BigNum {
            mantissa: self.mantissa.abs(),
            exponent: self.exponent,
        }
    }

    /// The smaller of the two; `self` on a tie.
    pub fn min(self, other: Self) -> Self {
        if other < self {
            other
        } else {
            self
        }
    }

    /// The larger of the two; `self` on a tie.
    pub fn max(self, other: Self) -> Self {
        if other > self {
            other
        } else {
            self
        }
    }

    /// Division; `None` when the divisor is zero.
    pub fn checked_div(self, rhs: Self) -> Option<Self> {
        if rhs.is_zero() {
            return None;
        }
        if self.is_zero() {
            return Some(BigNum::ZERO);
        }
        let m = self.mantissa.checked_div(rhs.mantissa)?;
        Some(normalized(m, self.exponent.saturating_sub(rhs.exponent)))
    }

    /// Integer power by repeated squaring. Exact for the cost curves in use
    /// (e.g. `1.15^n`) up to the 28 significant digits of the mantissa.
    pub fn powi(self, n: u64) -> Self {
        let mut acc = BigNum::ONE;
        let mut base = self;
        let mut n = n;
        while n > 0 {
            if n & 1 == 1 {
                acc = acc * base;
            }
            n >>= 1;
            if n > 0 {
                base = base * base;
            }
        }
        acc
    }

    /// Real power. Integral exponents go through [`BigNum::powi`]; fractional
    /// ones are approximated through `log10`. `None` when the result is
    /// undefined (negative base with a fractional exponent, zero to a negative
    /// power) or the exponent is not finite.
    pub fn pow(self, p: f64) -> Option<Self> {
        if !p.is_finite() {
            return None;
        }
        if self.is_zero() {
            return match p.partial_cmp(&0.0)? {
                Ordering::Greater => Some(BigNum::ZERO),
                Ordering::Equal => Some(BigNum::ONE),
                Ordering::Less => None,
            };
        }
        if p.fract() == 0.0 && p.abs() < 9_007_199_254_740_992.0 {
            let raised = self.powi(p.abs() as u64);
            return if p < 0.0 {
                BigNum::ONE.checked_div(raised)
            } else {
                Some(raised)
            };
        }
        if self.is_negative() {
            return None;
        }
        let log = self.log10() * p;
        if !log.is_finite() || log.abs() > (i64::MAX / 2) as f64 {
            return None;
        }
        let exponent = log.floor();
        let mantissa = 10f64.powf(log - exponent);
        let m = BigNum::try_from(mantissa).ok()?;
        Some(normalized(m.mantissa, m.exponent.saturating_add(exponent as i64)))
    }

    /// Base-10 logarithm of the magnitude (`-inf` for zero).
    pub fn log10(&self) -> f64 {
        if self.is_zero() {
            return f64::NEG_INFINITY;
        }
        let m = self.mantissa.abs().to_f64().unwrap_or(1.0);
        m.log10() + self.exponent as f64
    }

    /// Nearest `f64`, saturating to `±inf` / `0.0` outside its range.
    pub fn to_f64(&self) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        let m = self.mantissa.to_f64().unwrap_or(0.0);
        if self.exponent > 400 {
            return m.signum() * f64::INFINITY;
        }
        if self.exponent < -400 {
            return 0.0;
        }
        // Split the power so 10^e never overflows before the mantissa scales it.
        let e = self.exponent as i32;
        m * 10f64.powi(e / 2) * 10f64.powi(e - e / 2)
    }

    /// Exact `Decimal` value when it fits (`-28 ≤ exponent ≤ 27`).
    pub fn to_decimal(&self) -> Option<Decimal> {
        if self.is_zero() {
            return Some(Decimal::ZERO);
        }
        match self.exponent {
            e @ 0..=27 => self
                .mantissa
                .checked_mul(Decimal::from_i128_with_scale(10i128.pow(e as u32), 0)),
            e @ -28..=-1 => self.mantissa.checked_mul(Decimal::new(1, (-e) as u32)),
            _ => None,
        }
    }

    /// Integer part, rounding toward zero.
    pub fn trunc(self) -> Self {
        let (digits, has_fraction) = self.integer_digits();
        match digits {
            None => BigNum::ZERO,
            Some(d) if has_fraction => from_parts(self.is_negative(), &d, self.exponent),
            Some(_) => self,
        }
    }

    pub fn floor(self) -> Self {
        let has_fraction = self.integer_digits().1;
        let t = self.trunc();
        if has_fraction && self.is_negative() {
            t - BigNum::ONE
        } else {
            t
        }
    }

    pub fn ceil(self) -> Self {
        let has_fraction = self.integer_digits().1;
        let t = self.trunc();
        if has_fraction && self.is_positive() {
            t + BigNum::ONE
        } else {
            t
        }
    }

    /// Mantissa digits without sign or point, e.g. `"15"` for `1.5e3`.
    fn digits(&self) -> String {
        self.mantissa
            .abs()
            .normalize()
            .to_string()
            .chars()
            .filter(char::is_ascii_digit)
            .collect()
    }

    /// Integer-part digits (None when the magnitude is below one) and whether
    /// any non-zero fractional digit was dropped.
    fn integer_digits(&self) -> (Option<String>, bool) {
        if self.is_zero() {
            return (None, false);
        }
        if self.exponent < 0 {
            return (None, true);
        }
        let digits = self.digits();
        let keep = self.exponent.saturating_add(1);
        if keep >= digits.len() as i64 {
            (Some(digits), false)
        } else {
            (Some(digits[..keep as usize].to_string()), true)
        }
    }

    /// Positional rendering without an exponent.
    fn plain_string(&self) -> String {
        let digits = self.digits();
        let sign = if self.is_negative() { "-" } else { "" };
        let point = self.exponent + 1;
        let body = if point <= 0 {
            format!("0.{}{}", "0".repeat((-point) as usize), digits)
        } else if point as usize >= digits.len() {
            format!("{}{}", digits, "0".repeat(point as usize - digits.len()))
        } else {
            let (int, frac) = digits.split_at(point as usize);
            format!("{int}.{frac}")
        };
        format!("{sign}{body}")
    }

    fn signum_i8(&self) -> i8 {
        if self.is_zero() {
            0
        } else if self.is_negative() {
            -1
        } else {
            1
        }
    }
}

fn normalized(mut m: Decimal, mut exponent: i64) -> BigNum {
    if m.is_zero() {
        return BigNum::ZERO;
    }
    while m.abs() >= Decimal::TEN {
        m /= Decimal::TEN;
        exponent = exponent.saturating_add(1);
    }
    while m.abs() < Decimal::ONE {
        m *= Decimal::TEN;
        exponent = exponent.saturating_sub(1);
    }
    BigNum {
        mantissa: m.normalize(),
        exponent,
    }
}

/// Build from significant digits where the first digit sits at `10^exponent`.
fn from_parts(negative: bool, digits: &str, exponent: i64) -> BigNum {
    let digits = &digits[..digits.len().min(MAX_DIGITS)];
    let Ok(int) = digits.parse::<i128>() else {
        return BigNum::ZERO;
    };
    let int = if negative { -int } else { int };
    match Decimal::try_from_i128_with_scale(int, (digits.len() - 1) as u32) {
        Ok(m) => normalized(m, exponent),
        Err(_) => BigNum::ZERO,
    }
}

impl Default for BigNum {
    fn default() -> Self {
        BigNum::ZERO
    }
}

impl PartialEq for BigNum {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BigNum {}

impl PartialOrd for BigNum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BigNum {
    fn cmp(&self, other: &Self) -> Ordering {
        let (sa, sb) = (self.signum_i8(), other.signum_i8());
        if sa != sb || sa == 0 {
            return sa.cmp(&sb);
        }
        let magnitude = self
            .exponent
            .cmp(&other.exponent)
            .then_with(|| self.mantissa.abs().cmp(&other.mantissa.abs()));
        if sa > 0 {
            magnitude
        } else {
            magnitude.reverse()
        }
    }
}

impl Add for BigNum {
    type Output = BigNum;

    fn add(self, rhs: BigNum) -> BigNum {
        if self.is_zero() {
            return rhs;
        }
        if rhs.is_zero() {
            return self;
        }
        let (hi, lo) = if self.exponent >= rhs.exponent {
            (self, rhs)
        } else {
            (rhs, self)
        };
        let diff = hi.exponent.saturating_sub(lo.exponent);
        if diff > MAX_DIGITS as i64 {
            return hi;
        }
        let shifted = lo.mantissa * Decimal::new(1, diff as u32);
        normalized(hi.mantissa + shifted, hi.exponent)
    }
}

impl Sub for BigNum {
    type Output = BigNum;

    fn sub(self, rhs: BigNum) -> BigNum {
        self + (-rhs)
    }
}

impl Mul for BigNum {
    type Output = BigNum;

    fn mul(self, rhs: BigNum) -> BigNum {
        if self.is_zero() || rhs.is_zero() {
            return BigNum::ZERO;
        }
        normalized(
            self.mantissa * rhs.mantissa,
            self.exponent.saturating_add(rhs.exponent),
        )
    }
}

impl Neg for BigNum {
    type Output = BigNum;

    fn neg(self) -> BigNum {
        BigNum {
            mantissa: -self.mantissa,
            exponent: self.exponent,
        }
    }
}

impl AddAssign for BigNum {
    fn add_assign(&mut self, rhs: BigNum) {
        *self = *self + rhs;
    }
}

impl SubAssign for BigNum {
    fn sub_assign(&mut self, rhs: BigNum) {
        *self = *self - rhs;
    }
}

impl MulAssign for BigNum {
    fn mul_assign(&mut self, rhs: BigNum) {
        *self = *self * rhs;
    }
}

impl Sum for BigNum {
    fn sum<I: Iterator<Item = BigNum>>(iter: I) -> BigNum {
        iter.fold(BigNum::ZERO, |acc, v| acc + v)
    }
}

impl<'a> Sum<&'a BigNum> for BigNum {
    fn sum<I: Iterator<Item = &'a BigNum>>(iter: I) -> BigNum {
        iter.fold(BigNum::ZERO, |acc, v| acc + *v)
    }
}

macro_rules! from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for BigNum {
            fn from(v: $t) -> Self {
                normalized(Decimal::from(v), 0)
            }
        })*
    };
}

from_int!(u32, u64, i32, i64, usize);

impl From<Decimal> for BigNum {
    fn from(v: Decimal) -> Self {
        normalized(v, 0)
    }
}

impl TryFrom<f64> for BigNum {
    type Error = EconError;

    fn try_from(v: f64) -> Result<Self, Self::Error> {
        if !v.is_finite() {
            return Err(EconError::NonFinite);
        }
        // `{:e}` yields the shortest representation that round-trips.
        format!("{v:e}").parse()
    }
}

impl FromStr for BigNum {
    type Err = EconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || EconError::Parse(s.to_string());
        let raw = s.trim();
        let (negative, body) = match raw.as_bytes().first() {
            None => return Err(err()),
            Some(b'-') => (true, &raw[1..]),
            Some(b'+') => (false, &raw[1..]),
            Some(_) => (false, raw),
        };
        let (mant, exp) = match body.find(|c: char| c == 'e' || c == 'E') {
            Some(i) => (&body[..i], body[i + 1..].parse::<i64>().map_err(|_| err())?),
            None => (body, 0),
        };
        let (int_part, frac_part) = mant.split_once('.').unwrap_or((mant, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(err());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let digits = format!("{int_part}{frac_part}");
        let leading = digits.bytes().take_while(|b| *b == b'0').count();
        if leading == digits.len() {
            return Ok(BigNum::ZERO);
        }
        let significant = digits[leading..].trim_end_matches('0');
        let exponent = (int_part.len() as i64 - leading as i64 - 1)
            .checked_add(exp)
            .ok_or_else(err)?;
        Ok(from_parts(negative, significant, exponent))
    }
}

impl fmt::Display for BigNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }
        if (PLAIN_MIN_EXPONENT..PLAIN_MAX_EXPONENT).contains(&self.exponent) {
            return f.write_str(&self.plain_string());
        }
        write!(f, "{}e{}", self.mantissa.normalize(), self.exponent)
    }
}

impl Serialize for BigNum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BigNum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum NumericInput {
            Text(String),
            Int(i64),
            Float(f64),
        }

        match NumericInput::deserialize(deserializer)? {
            NumericInput::Text(raw) => raw.parse().map_err(D::Error::custom),
            NumericInput::Int(v) => Ok(BigNum::from(v)),
            NumericInput::Float(v) => BigNum::try_from(v).map_err(D::Error::custom),
        }
    }
}
