use std::{
    cmp::Ordering,
    fmt,
    ops::{Add, Mul, Neg, Sub},
};

use serde::{Deserialize, Serialize};

use crate::{Result, WindowError};

const DEFAULT_MAX_DENOMINATOR: i64 = 1000;

/// Exact beat position.
///
/// Always stored reduced with a positive denominator, so derived equality and
/// hashing agree with numeric equality. The numerator is never `i64::MIN`, so
/// negation cannot overflow. Serialised in mixed form as
/// `[integer, numerator, denominator]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[i64; 3]", into = "[i64; 3]")]
pub struct Fraction {
    num: i64,
    den: i64,
}

impl Fraction {
    pub const ZERO: Fraction = Fraction { num: 0, den: 1 };
    pub const ONE: Fraction = Fraction { num: 1, den: 1 };

    /// Creates a whole-beat fraction.
    ///
    /// `i64::MIN` is clamped to `-i64::MAX`.
    pub const fn from_int(value: i64) -> Self {
        let num = if value == i64::MIN { -i64::MAX } else { value };
        Self { num, den: 1 }
    }

    /// Creates `numerator / denominator`, reduced.
    pub fn new(numerator: i64, denominator: i64) -> Result<Self> {
        if denominator == 0 {
            return Err(WindowError::InvalidFraction {
                numerator,
                denominator,
            });
        }
        Self::checked_reduced(i128::from(numerator), i128::from(denominator))
            .ok_or_else(|| WindowError::FractionOutOfRange(format!("{numerator}/{denominator}")))
    }

    /// Creates `integer + numerator / denominator`.
    pub fn mixed(integer: i64, numerator: i64, denominator: i64) -> Result<Self> {
        if denominator == 0 {
            return Err(WindowError::InvalidFraction {
                numerator,
                denominator,
            });
        }
        let total = i128::from(integer) * i128::from(denominator) + i128::from(numerator);
        Self::checked_reduced(total, i128::from(denominator)).ok_or_else(|| {
            WindowError::FractionOutOfRange(format!("{integer} {numerator}/{denominator}"))
        })
    }

    /// Finds the continued-fraction convergent of `value` closest to it whose
    /// denominator does not exceed `max_denominator`.
    ///
    /// Returns `None` for non-finite input or a non-positive bound.
    pub fn from_f64(value: f64, max_denominator: i64) -> Option<Self> {
        if !value.is_finite() || max_denominator < 1 {
            return None;
        }

        // Convergents h/k, seeded with h(-2)/k(-2) = 0/1 and h(-1)/k(-1) = 1/0.
        let (mut h_prev, mut h) = (0_i64, 1_i64);
        let (mut k_prev, mut k) = (1_i64, 0_i64);
        let mut remain = value;

        loop {
            let floor = remain.floor();
            if floor.abs() >= i64::MAX as f64 {
                break;
            }
            let a = floor as i64;
            let next = a
                .checked_mul(h)
                .and_then(|v| v.checked_add(h_prev))
                .zip(a.checked_mul(k).and_then(|v| v.checked_add(k_prev)));
            let Some((h_next, k_next)) = next else {
                break;
            };
            if k_next > max_denominator {
                break;
            }
            (h_prev, h) = (h, h_next);
            (k_prev, k) = (k, k_next);

            let fractional = remain - floor;
            if fractional.abs() < 1e-12 {
                break;
            }
            remain = 1.0 / fractional;
        }

        Self::checked_reduced(i128::from(h), i128::from(k))
    }

    /// Same as [`Fraction::from_f64`] with the default denominator bound of 1000.
    pub fn approximate(value: f64) -> Option<Self> {
        Self::from_f64(value, DEFAULT_MAX_DENOMINATOR)
    }

    /// Rounds `value` to the nearest multiple of `1 / denominator`.
    pub fn from_f64_rounded(value: f64, denominator: i64) -> Result<Self> {
        Self::new((value * denominator as f64).round() as i64, denominator)
    }

    pub fn numerator(&self) -> i64 {
        self.num
    }

    pub fn denominator(&self) -> i64 {
        self.den
    }

    /// Whole part, rounded towards negative infinity.
    pub fn integer_part(&self) -> i64 {
        self.num.div_euclid(self.den)
    }

    /// Numerator of the non-negative remainder in mixed form.
    pub fn fractional_numerator(&self) -> i64 {
        self.num.rem_euclid(self.den)
    }

    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    pub fn is_zero(&self) -> bool {
        self.num == 0
    }

    /// Sum, or `None` if the reduced result does not fit in 64 bits.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        let num = i128::from(self.num) * i128::from(rhs.den)
            + i128::from(rhs.num) * i128::from(self.den);
        Self::checked_reduced(num, i128::from(self.den) * i128::from(rhs.den))
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.checked_add(-rhs)
    }

    pub fn checked_mul(self, rhs: Self) -> Option<Self> {
        Self::checked_reduced(
            i128::from(self.num) * i128::from(rhs.num),
            i128::from(self.den) * i128::from(rhs.den),
        )
    }

    /// Division that reports a zero divisor or an overflow instead of panicking.
    pub fn checked_div(self, rhs: Self) -> Option<Self> {
        if rhs.num == 0 {
            return None;
        }
        Self::checked_reduced(
            i128::from(self.num) * i128::from(rhs.den),
            i128::from(self.den) * i128::from(rhs.num),
        )
    }

    fn checked_reduced(numerator: i128, denominator: i128) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        let divisor = i128::try_from(gcd(numerator.unsigned_abs(), denominator.unsigned_abs()))
            .ok()?
            .max(1);
        let sign = denominator.signum();
        let num = i64::try_from(numerator / divisor * sign).ok()?;
        let den = i64::try_from(denominator / divisor * sign).ok()?;
        if num == i64::MIN {
            return None;
        }
        Some(Self { num, den })
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl Default for Fraction {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Ord for Fraction {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = i128::from(self.num) * i128::from(other.den);
        let rhs = i128::from(other.num) * i128::from(self.den);
        lhs.cmp(&rhs)
    }
}

impl PartialOrd for Fraction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// # Panics
///
/// Panics if the reduced sum does not fit in 64 bits; use
/// [`Fraction::checked_add`] for untrusted values.
impl Add for Fraction {
    type Output = Fraction;

    fn add(self, rhs: Self) -> Self::Output {
        match self.checked_add(rhs) {
            Some(sum) => sum,
            None => panic!("overflow when adding fractions"),
        }
    }
}

/// # Panics
///
/// Panics if the reduced difference does not fit in 64 bits.
impl Sub for Fraction {
    type Output = Fraction;

    fn sub(self, rhs: Self) -> Self::Output {
        match self.checked_sub(rhs) {
            Some(difference) => difference,
            None => panic!("overflow when subtracting fractions"),
        }
    }
}

/// # Panics
///
/// Panics if the reduced product does not fit in 64 bits.
impl Mul for Fraction {
    type Output = Fraction;

    fn mul(self, rhs: Self) -> Self::Output {
        match self.checked_mul(rhs) {
            Some(product) => product,
            None => panic!("overflow when multiplying fractions"),
        }
    }
}

impl Neg for Fraction {
    type Output = Fraction;

    fn neg(self) -> Self::Output {
        Self {
            num: -self.num,
            den: self.den,
        }
    }
}

impl From<i64> for Fraction {
    fn from(value: i64) -> Self {
        Self::from_int(value)
    }
}

impl TryFrom<[i64; 3]> for Fraction {
    type Error = WindowError;

    fn try_from(value: [i64; 3]) -> Result<Self> {
        let [integer, numerator, denominator] = value;
        Self::mixed(integer, numerator, denominator)
    }
}

impl From<Fraction> for [i64; 3] {
    fn from(value: Fraction) -> Self {
        [
            value.integer_part(),
            value.fractional_numerator(),
            value.denominator(),
        ]
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{}",
            self.integer_part(),
            self.fractional_numerator(),
            self.den
        )
    }
}
