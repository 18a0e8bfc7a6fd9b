use std::{
    fmt,
    ops::{Add, Neg, Sub},
    str::FromStr,
};

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, Zero};

use crate::EngineError;

/// Digits after the decimal point in the canonical representation.
pub const SCALE: u32 = 5;

/// Exponents beyond this magnitude are rejected while parsing.
const MAX_EXPONENT: u64 = 4096;

/// Exact money amount backed by an arbitrary precision rational.
///
/// Use this type for **all** monetary values in the engine (balances and
/// transfer amounts) so no precision is lost the way binary floats would.
///
/// The textual form is canonical: [`Display`](fmt::Display) always renders
/// exactly [`SCALE`] fractional digits, rounding half away from zero, so two
/// canonical strings can be compared for equality.
///
/// # Examples
///
/// ```rust
/// use engine::Amount;
///
/// let amount: Amount = "123.45".parse().unwrap();
/// assert_eq!(amount, Amount::from_ratio(12345, 100));
/// assert_eq!(amount.to_string(), "123.45000");
/// assert_eq!(Amount::from_ratio(10, 3).to_string(), "3.33333");
/// ```
///
/// Parsing only accepts plain decimal literals:
///
/// ```rust
/// use engine::Amount;
///
/// assert!("10/1".parse::<Amount>().is_err());
/// assert!("NaN".parse::<Amount>().is_err());
/// assert!("Inf".parse::<Amount>().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(BigRational);

impl Amount {
    /// Creates an amount from an integer number of units.
    #[must_use]
    pub fn from_integer(value: i64) -> Self {
        Self(BigRational::from_integer(BigInt::from(value)))
    }

    /// Creates the amount `numer / denom`.
    ///
    /// # Panics
    ///
    /// Panics when `denom` is zero.
    #[must_use]
    pub fn from_ratio(numer: i64, denom: i64) -> Self {
        Self(BigRational::new(BigInt::from(numer), BigInt::from(denom)))
    }

    #[must_use]
    pub fn zero() -> Self {
        Self(BigRational::zero())
    }

    #[must_use]
    pub fn as_ratio(&self) -> &BigRational {
        &self.0
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    /// Returns the amount rounded to [`SCALE`] fractional digits, i.e. the
    /// exact value its canonical string denotes.
    #[must_use]
    pub fn canonical(&self) -> Self {
        let factor = BigRational::from_integer(scale_factor());
        let units = (&self.0 * &factor).round();
        Self(units / factor)
    }
}

fn scale_factor() -> BigInt {
    BigInt::from(10u32).pow(SCALE)
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = (&self.0 * BigRational::from_integer(scale_factor()))
            .round()
            .to_integer();
        let sign = if units.is_negative() { "-" } else { "" };
        let digits = format!(
            "{:0>width$}",
            units.abs().to_string(),
            width = SCALE as usize + 1
        );
        let (whole, fraction) = digits.split_at(digits.len() - SCALE as usize);
        write!(f, "{sign}{whole}.{fraction}")
    }
}

impl FromStr for Amount {
    type Err = EngineError;

    /// Parses a decimal string into an exact amount.
    ///
    /// The text must first be a finite floating point literal; only then is
    /// it read again as an exact decimal. Fraction syntax (`10/1`) and the
    /// special `NaN`/`Inf` tokens are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidAmount(s.to_string());

        let float: f64 = s.parse().map_err(|_| invalid())?;
        if !float.is_finite() {
            return Err(invalid());
        }

        parse_decimal(s).map(Self).ok_or_else(invalid)
    }
}

/// Reads `[+-]digits[.digits][(e|E)[+-]digits]` exactly.
fn parse_decimal(s: &str) -> Option<BigRational> {
    let (negative, unsigned) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(index) => (
            &unsigned[..index],
            unsigned[index + 1..].parse::<i64>().ok()?,
        ),
        None => (unsigned, 0),
    };

    let (whole, fraction) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    let digits = format!("{whole}{fraction}");
    let numer = BigInt::parse_bytes(digits.as_bytes(), 10)?;
    if numer.is_zero() {
        return Some(BigRational::zero());
    }

    let shift = exponent.checked_sub(i64::try_from(fraction.len()).ok()?)?;
    if shift.unsigned_abs() > MAX_EXPONENT {
        return None;
    }
    let power = BigInt::from(10u32).pow(u32::try_from(shift.unsigned_abs()).ok()?);
    let value = if shift >= 0 {
        BigRational::from_integer(numer * power)
    } else {
        BigRational::new(numer, power)
    };

    Some(if negative { -value } else { value })
}

impl Add for &Amount {
    type Output = Amount;

    fn add(self, rhs: &Amount) -> Self::Output {
        Amount(&self.0 + &rhs.0)
    }
}

impl Sub for &Amount {
    type Output = Amount;

    fn sub(self, rhs: &Amount) -> Self::Output {
        Amount(&self.0 - &rhs.0)
    }
}

impl Neg for &Amount {
    type Output = Amount;

    fn neg(self) -> Self::Output {
        Amount(-&self.0)
    }
}

impl From<BigRational> for Amount {
    fn from(value: BigRational) -> Self {
        Self(value)
    }
}
