// crates/placer-mining/src/decimal.rs
//
// Truncating fixed-point decimals for reward accounting.
//
// All monetary math in the engine runs on scaled u128 integers: a Decimal
// with scale `s` stores `value * 10^s`. Every division rounds down, so
// remainders stay with the protocol instead of the participant and repeated
// accrual can never over-issue.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest supported decimal scale. Prices scaled by 10^18 still leave
/// ample u128 headroom for price-times-amount terms.
pub const MAX_SCALE: u32 = 18;

/// A non-negative fixed-point decimal: `raw / 10^scale`.
///
/// Comparisons and equality are meaningful only between values of the same
/// scale; the engine keeps every price at the configured reward precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Decimal {
    raw: u128,
    scale: u32,
}

impl Decimal {
    /// Build a decimal from an already-scaled integer: `raw / 10^scale`.
    pub fn from_raw(raw: u128, scale: u32) -> Self {
        Self { raw, scale }
    }

    /// Build a decimal from a whole-number value, scaling it up.
    /// Returns `None` on overflow.
    pub fn from_int(value: u128, scale: u32) -> Option<Self> {
        let raw = value.checked_mul(pow10(scale)?)?;
        Some(Self { raw, scale })
    }

    /// Zero at the given scale.
    pub fn zero(scale: u32) -> Self {
        Self { raw: 0, scale }
    }

    /// The underlying scaled integer.
    pub fn raw(&self) -> u128 {
        self.raw
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.raw == 0
    }

    /// Re-express the value at a different scale without changing it.
    ///
    /// Scaling up multiplies the raw value; scaling down only succeeds when
    /// no fractional digits are lost. The failure on lossy down-scaling is
    /// what makes this usable as a precision check on configured prices.
    pub fn rescale(self, scale: u32) -> Option<Self> {
        if scale == self.scale {
            return Some(self);
        }
        if scale > self.scale {
            let factor = pow10(scale - self.scale)?;
            Some(Self {
                raw: self.raw.checked_mul(factor)?,
                scale,
            })
        } else {
            let factor = pow10(self.scale - scale)?;
            if self.raw % factor != 0 {
                return None;
            }
            Some(Self {
                raw: self.raw / factor,
                scale,
            })
        }
    }

    /// Checked addition. Both operands must carry the same scale.
    pub fn checked_add(self, other: Self) -> Option<Self> {
        debug_assert_eq!(self.scale, other.scale);
        Some(Self {
            raw: self.raw.checked_add(other.raw)?,
            scale: self.scale,
        })
    }

    /// Multiply by an integer factor, keeping the scale.
    pub fn checked_mul_int(self, factor: u128) -> Option<Self> {
        Some(Self {
            raw: self.raw.checked_mul(factor)?,
            scale: self.scale,
        })
    }

    /// Divide by an integer, truncating toward zero at this scale.
    /// Returns `None` for a zero divisor.
    pub fn div_int_trunc(self, divisor: u128) -> Option<Self> {
        if divisor == 0 {
            return None;
        }
        Some(Self {
            raw: self.raw / divisor,
            scale: self.scale,
        })
    }
}

fn pow10(exp: u32) -> Option<u128> {
    10u128.checked_pow(exp)
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = 10u128.saturating_pow(self.scale);
        let whole = self.raw / unit;
        let frac = self.raw % unit;
        if frac == 0 {
            write!(f, "{}", whole)
        } else {
            // Show up to `scale` decimal places, trimming trailing zeros.
            let frac_str = format!("{:0width$}", frac, width = self.scale as usize);
            write!(f, "{}.{}", whole, frac_str.trim_end_matches('0'))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_int() {
        let d = Decimal::from_int(10, 2).unwrap();
        assert_eq!(d.raw(), 1000);
        assert_eq!(d.scale(), 2);
    }

    #[test]
    fn test_rescale_up() {
        let d = Decimal::from_raw(15, 1); // 1.5
        let up = d.rescale(4).unwrap();
        assert_eq!(up.raw(), 15_000);
        assert_eq!(up.scale(), 4);
    }

    #[test]
    fn test_rescale_down_exact() {
        let d = Decimal::from_raw(15_000, 4); // 1.5000
        let down = d.rescale(1).unwrap();
        assert_eq!(down.raw(), 15);
    }

    #[test]
    fn test_rescale_down_lossy_fails() {
        let d = Decimal::from_raw(15, 1); // 1.5
        assert!(d.rescale(0).is_none());
    }

    #[test]
    fn test_div_truncates_toward_zero() {
        // 10.00 / 3 = 3.33, remainder discarded
        let d = Decimal::from_int(10, 2).unwrap();
        let q = d.div_int_trunc(3).unwrap();
        assert_eq!(q.raw(), 333);
    }

    #[test]
    fn test_div_by_zero() {
        let d = Decimal::from_int(1, 2).unwrap();
        assert!(d.div_int_trunc(0).is_none());
    }

    #[test]
    fn test_mul_overflow() {
        let d = Decimal::from_raw(u128::MAX, 0);
        assert!(d.checked_mul_int(2).is_none());
    }

    #[test]
    fn test_add_same_scale() {
        let a = Decimal::from_raw(100, 2);
        let b = Decimal::from_raw(25, 2);
        assert_eq!(a.checked_add(b).unwrap().raw(), 125);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Decimal::from_raw(42_00, 2)), "42");
        assert_eq!(format!("{}", Decimal::from_raw(42_50, 2)), "42.5");
        assert_eq!(format!("{}", Decimal::from_raw(5, 4)), "0.0005");
        assert_eq!(format!("{}", Decimal::zero(8)), "0");
    }
}
