//! Target-value (`Tarval`) arithmetic: a `(mode, value)` pair supporting
//! arithmetic and comparison per the mode's arithmetic family (§3, §4.2).

use std::fmt;

use ethnum::{I256, U256};

use crate::error::{Error, Result};
use crate::mode::{Arithmetic, Mode, Signedness};
use crate::relation::Relation;

/// The value payload of a [`Tarval`].
#[derive(Debug, Clone, Copy, PartialEq)]
enum Payload {
    /// Raw two's-complement bit pattern, always pre-masked to the mode's
    /// width. Interpreted as signed or unsigned per the mode.
    Int(U256),
    /// IEEE-754 value, stored at `f64` precision; narrowed to `f32`
    /// round-trip precision on construction/arithmetic when the mode is
    /// 32 bits wide.
    Float(f64),
}

/// A mode-tagged target constant.
///
/// `tarval_bad` is represented as `Tarval { mode: None, .. }` internally;
/// use [`Tarval::bad`] / [`Tarval::is_bad`] rather than matching on the
/// representation.
#[derive(Debug, Clone, PartialEq)]
pub struct Tarval {
    mode: Option<Mode>,
    payload: Option<Payload>,
}

impl fmt::Display for Tarval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bad() {
            return f.write_str("<bad>");
        }
        match self.payload {
            Some(Payload::Int(_)) => write!(f, "{}", self.to_decimal().unwrap_or_default()),
            Some(Payload::Float(v)) => write!(f, "{v}"),
            None => f.write_str("<bad>"),
        }
    }
}

fn mask_for(bits: u32) -> U256 {
    if bits == 0 {
        U256::ZERO
    } else if bits >= 256 {
        U256::MAX
    } else {
        (U256::ONE << bits) - U256::ONE
    }
}

fn sign_bit(bits: u32) -> U256 {
    if bits == 0 || bits >= 256 {
        U256::ZERO
    } else {
        U256::ONE << (bits - 1)
    }
}

/// Sign-extends a masked raw value of `bits` width into an `I256`.
fn to_signed(raw: U256, bits: u32) -> I256 {
    if bits == 0 || bits >= 256 {
        return raw.as_i256();
    }
    if raw & sign_bit(bits) != U256::ZERO {
        let widened = raw.as_i256();
        widened - (I256::ONE << bits)
    } else {
        raw.as_i256()
    }
}

fn from_signed(value: I256, bits: u32) -> U256 {
    let raw: U256 = value.as_u256();
    raw & mask_for(bits)
}

impl Tarval {
    /// `tarval_bad`: the universal "no value" sentinel.
    pub fn bad() -> Self {
        Self {
            mode: None,
            payload: None,
        }
    }

    /// `true` iff this is `tarval_bad`.
    pub fn is_bad(&self) -> bool {
        self.mode.is_none()
    }

    /// The mode this tarval is tagged with, if not `tarval_bad`.
    pub fn mode(&self) -> Option<&Mode> {
        self.mode.as_ref()
    }

    fn require_int(mode: &Mode) -> Result<()> {
        if !mode.is_int() && !mode.is_reference() {
            return Err(Error::UnsupportedArithmetic {
                mode: mode.name().to_string(),
                reason: "integer tarval operation on a non-integer mode".into(),
            });
        }
        Ok(())
    }

    fn int_payload(mode: &Mode, raw: U256) -> Self {
        Self {
            mode: Some(mode.clone()),
            payload: Some(Payload::Int(raw & mask_for(mode.bits()))),
        }
    }

    fn float_payload(mode: &Mode, value: f64) -> Self {
        let value = if mode.bits() <= 32 { value as f32 as f64 } else { value };
        Self {
            mode: Some(mode.clone()),
            payload: Some(Payload::Float(value)),
        }
    }

    /// The additive identity of `mode`.
    pub fn zero(mode: &Mode) -> Result<Self> {
        if mode.is_float() {
            return Ok(Self::float_payload(mode, 0.0));
        }
        Self::require_int(mode)?;
        Ok(Self::int_payload(mode, U256::ZERO))
    }

    /// The multiplicative identity of `mode`.
    pub fn one(mode: &Mode) -> Result<Self> {
        if mode.is_float() {
            return Ok(Self::float_payload(mode, 1.0));
        }
        Self::require_int(mode)?;
        Ok(Self::int_payload(mode, U256::ONE))
    }

    /// The all-ones bit pattern of `mode` (every bit set).
    pub fn all_ones(mode: &Mode) -> Result<Self> {
        Self::require_int(mode)?;
        Ok(Self::int_payload(mode, mask_for(mode.bits())))
    }

    /// The boolean `true` tarval.
    pub fn b_true() -> Self {
        Self::int_payload(&Mode::boolean(), U256::ONE)
    }

    /// The boolean `false` tarval.
    pub fn b_false() -> Self {
        Self::int_payload(&Mode::boolean(), U256::ZERO)
    }

    /// Builds an integer tarval from an `i128`, truncating to `mode`'s
    /// width.
    pub fn from_i128(mode: &Mode, value: i128) -> Result<Self> {
        Self::require_int(mode)?;
        let raw = from_signed(I256::from(value), mode.bits());
        Ok(Self::int_payload(mode, raw))
    }

    /// Builds an integer tarval directly from a raw (unmasked) bit
    /// pattern; the value is masked to `mode`'s width.
    pub fn from_raw(mode: &Mode, raw: U256) -> Result<Self> {
        Self::require_int(mode)?;
        Ok(Self::int_payload(mode, raw))
    }

    /// Builds a float tarval.
    pub fn from_f64(mode: &Mode, value: f64) -> Result<Self> {
        if !mode.is_float() {
            return Err(Error::UnsupportedArithmetic {
                mode: mode.name().to_string(),
                reason: "from_f64 called on a non-float mode".into(),
            });
        }
        Ok(Self::float_payload(mode, value))
    }

    /// The raw (masked) bit pattern, if this is an integer/reference
    /// tarval.
    pub fn raw_bits(&self) -> Option<U256> {
        match self.payload {
            Some(Payload::Int(raw)) => Some(raw),
            _ => None,
        }
    }

    /// The value as `i128`, sign- or zero-extended per the mode's
    /// signedness, if it fits.
    pub fn to_i128(&self) -> Option<i128> {
        let mode = self.mode.as_ref()?;
        match self.payload {
            Some(Payload::Int(raw)) => {
                let value = match mode.signedness()? {
                    Signedness::Signed => to_signed(raw, mode.bits()),
                    Signedness::Unsigned => raw.as_i256(),
                };
                i128::try_from(value).ok()
            }
            _ => None,
        }
    }

    /// `true` iff this tarval is the zero value of its mode.
    pub fn is_null(&self) -> bool {
        match self.payload {
            Some(Payload::Int(raw)) => raw == U256::ZERO,
            Some(Payload::Float(v)) => v == 0.0,
            None => false,
        }
    }

    fn binary_int<F>(&self, other: &Self, f: F) -> Result<Self>
    where
        F: FnOnce(U256, U256) -> U256,
    {
        let (mode, a, b) = self.int_operands(other)?;
        Ok(Self::int_payload(&mode, f(a, b)))
    }

    fn int_operands(&self, other: &Self) -> Result<(Mode, U256, U256)> {
        if self.is_bad() || other.is_bad() {
            return Err(Error::UnsupportedArithmetic {
                mode: "bad".into(),
                reason: "arithmetic on tarval_bad".into(),
            });
        }
        let mode = self.mode.clone().unwrap();
        let other_mode = other.mode.clone().unwrap();
        if mode != other_mode {
            return Err(Error::ModeMismatch {
                expected: mode.name().to_string(),
                found: other_mode.name().to_string(),
            });
        }
        let (Payload::Int(a), Payload::Int(b)) = (
            self.payload.ok_or_else(|| Error::UnsupportedArithmetic {
                mode: mode.name().to_string(),
                reason: "missing payload".into(),
            })?,
            other.payload.ok_or_else(|| Error::UnsupportedArithmetic {
                mode: mode.name().to_string(),
                reason: "missing payload".into(),
            })?,
        ) else {
            return Err(Error::UnsupportedArithmetic {
                mode: mode.name().to_string(),
                reason: "integer operation on a float tarval".into(),
            });
        };
        Ok((mode, a, b))
    }

    /// `self + other`, wrapping per the mode's width (two's complement
    /// add is sign-agnostic).
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.binary_int(other, |a, b| a.wrapping_add(b))
    }

    /// `self - other`.
    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.binary_int(other, |a, b| a.wrapping_sub(b))
    }

    /// `self * other`.
    pub fn mul(&self, other: &Self) -> Result<Self> {
        self.binary_int(other, |a, b| a.wrapping_mul(b))
    }

    /// Bitwise AND.
    pub fn bitand(&self, other: &Self) -> Result<Self> {
        self.binary_int(other, |a, b| a & b)
    }

    /// Bitwise OR.
    pub fn bitor(&self, other: &Self) -> Result<Self> {
        self.binary_int(other, |a, b| a | b)
    }

    /// Bitwise XOR.
    pub fn bitxor(&self, other: &Self) -> Result<Self> {
        self.binary_int(other, |a, b| a ^ b)
    }

    /// Bitwise NOT.
    pub fn bitnot(&self) -> Result<Self> {
        if self.is_bad() {
            return Ok(Self::bad());
        }
        let mode = self.mode.clone().unwrap();
        let Payload::Int(raw) = self.payload.unwrap() else {
            return Err(Error::UnsupportedArithmetic {
                mode: mode.name().to_string(),
                reason: "bitnot on a float tarval".into(),
            });
        };
        Ok(Self::int_payload(&mode, !raw))
    }

    /// Two's-complement negation.
    pub fn neg(&self) -> Result<Self> {
        if self.is_bad() {
            return Ok(Self::bad());
        }
        match self.payload {
            Some(Payload::Float(v)) => Ok(Self::float_payload(self.mode.as_ref().unwrap(), -v)),
            Some(Payload::Int(raw)) => {
                let mode = self.mode.clone().unwrap();
                Ok(Self::int_payload(&mode, raw.wrapping_neg()))
            }
            None => unreachable!("checked is_bad above"),
        }
    }

    /// Division, honoring signedness. Division by zero is `tarval_bad`
    /// rather than a panic, matching the "inputs out of range fail" /
    /// sentinel-propagation posture of the rest of the kernel.
    pub fn div(&self, other: &Self) -> Result<Self> {
        let (mode, a, b) = self.int_operands(other)?;
        if b == U256::ZERO {
            return Ok(Self::bad());
        }
        let raw = match mode.signedness() {
            Some(Signedness::Signed) => {
                let bits = mode.bits();
                let sa = to_signed(a, bits);
                let sb = to_signed(b, bits);
                from_signed(sa / sb, bits)
            }
            _ => a / b,
        };
        Ok(Self::int_payload(&mode, raw))
    }

    /// Remainder, honoring signedness (sign of result follows the
    /// dividend, as in Rust's `%`).
    pub fn modulo(&self, other: &Self) -> Result<Self> {
        let (mode, a, b) = self.int_operands(other)?;
        if b == U256::ZERO {
            return Ok(Self::bad());
        }
        let raw = match mode.signedness() {
            Some(Signedness::Signed) => {
                let bits = mode.bits();
                let sa = to_signed(a, bits);
                let sb = to_signed(b, bits);
                from_signed(sa % sb, bits)
            }
            _ => a % b,
        };
        Ok(Self::int_payload(&mode, raw))
    }

    fn effective_shift(&self, mode: &Mode, amount: u32) -> u32 {
        let modulus = mode.modulo_shift();
        if modulus == 0 {
            amount
        } else {
            amount % modulus
        }
    }

    /// Logical/arithmetic left shift. `amount` is reduced modulo the
    /// mode's modulo-shift first (§3).
    pub fn shl(&self, amount: u32) -> Result<Self> {
        if self.is_bad() {
            return Ok(Self::bad());
        }
        let mode = self.mode.clone().unwrap();
        let Payload::Int(raw) = self.payload.unwrap() else {
            return Err(Error::UnsupportedArithmetic {
                mode: mode.name().to_string(),
                reason: "shift on a float tarval".into(),
            });
        };
        let amount = self.effective_shift(&mode, amount);
        if amount >= 256 {
            return Ok(Self::int_payload(&mode, U256::ZERO));
        }
        Ok(Self::int_payload(&mode, raw << amount))
    }

    /// Logical (zero-filling) right shift.
    pub fn shr(&self, amount: u32) -> Result<Self> {
        if self.is_bad() {
            return Ok(Self::bad());
        }
        let mode = self.mode.clone().unwrap();
        let Payload::Int(raw) = self.payload.unwrap() else {
            return Err(Error::UnsupportedArithmetic {
                mode: mode.name().to_string(),
                reason: "shift on a float tarval".into(),
            });
        };
        let amount = self.effective_shift(&mode, amount);
        if amount >= 256 {
            return Ok(Self::int_payload(&mode, U256::ZERO));
        }
        Ok(Self::int_payload(&mode, raw >> amount))
    }

    /// Arithmetic (sign-filling) right shift.
    pub fn shrs(&self, amount: u32) -> Result<Self> {
        if self.is_bad() {
            return Ok(Self::bad());
        }
        let mode = self.mode.clone().unwrap();
        let Payload::Int(raw) = self.payload.unwrap() else {
            return Err(Error::UnsupportedArithmetic {
                mode: mode.name().to_string(),
                reason: "shift on a float tarval".into(),
            });
        };
        let bits = mode.bits();
        let amount = self.effective_shift(&mode, amount);
        let signed = to_signed(raw, bits);
        let shifted = if amount >= bits.max(1) {
            if signed.is_negative() {
                I256::MINUS_ONE
            } else {
                I256::ZERO
            }
        } else {
            signed >> amount
        };
        Ok(Self::int_payload(&mode, from_signed(shifted, bits)))
    }

    /// Relation between `self` and `other`, honoring the mode's
    /// arithmetic family (§4.2).
    pub fn cmp(&self, other: &Self) -> Result<Relation> {
        if self.is_bad() || other.is_bad() {
            return Err(Error::UnsupportedArithmetic {
                mode: "bad".into(),
                reason: "comparison against tarval_bad".into(),
            });
        }
        let mode = self.mode.clone().unwrap();
        let other_mode = other.mode.clone().unwrap();
        if mode != other_mode {
            return Err(Error::ModeMismatch {
                expected: mode.name().to_string(),
                found: other_mode.name().to_string(),
            });
        }
        match (self.payload.unwrap(), other.payload.unwrap()) {
            (Payload::Float(a), Payload::Float(b)) => {
                if a.is_nan() || b.is_nan() {
                    Ok(Relation::UNORDERED)
                } else if a < b {
                    Ok(Relation::LESS)
                } else if a > b {
                    Ok(Relation::GREATER)
                } else {
                    Ok(Relation::EQUAL)
                }
            }
            (Payload::Int(a), Payload::Int(b)) => {
                let ordering = match mode.signedness() {
                    Some(Signedness::Signed) => {
                        to_signed(a, mode.bits()).cmp(&to_signed(b, mode.bits()))
                    }
                    _ => a.cmp(&b),
                };
                Ok(match ordering {
                    std::cmp::Ordering::Less => Relation::LESS,
                    std::cmp::Ordering::Equal => Relation::EQUAL,
                    std::cmp::Ordering::Greater => Relation::GREATER,
                })
            }
            _ => Err(Error::UnsupportedArithmetic {
                mode: mode.name().to_string(),
                reason: "comparing an integer tarval against a float tarval".into(),
            }),
        }
    }

    /// Converts this tarval to `target`'s mode: truncation or
    /// sign-extension between integer modes, IEEE rounding to/from float
    /// modes.
    pub fn convert(&self, target: &Mode) -> Result<Self> {
        if self.is_bad() {
            return Ok(Self::bad());
        }
        let mode = self.mode.as_ref().unwrap();
        match (self.payload.unwrap(), target.is_float()) {
            (Payload::Int(raw), false) => {
                let bits = target.bits();
                let widened = match mode.signedness() {
                    Some(Signedness::Signed) => from_signed(to_signed(raw, mode.bits()), bits),
                    _ => raw & mask_for(bits),
                };
                Ok(Self::int_payload(target, widened))
            }
            (Payload::Int(raw), true) => {
                let as_i128 = match mode.signedness() {
                    Some(Signedness::Signed) => i128::try_from(to_signed(raw, mode.bits()))
                        .map_err(|_| Error::UnsupportedArithmetic {
                            mode: mode.name().to_string(),
                            reason: "integer too wide to convert to float".into(),
                        })?,
                    _ => i128::try_from(raw).map_err(|_| Error::UnsupportedArithmetic {
                        mode: mode.name().to_string(),
                        reason: "integer too wide to convert to float".into(),
                    })?,
                };
                Ok(Self::float_payload(target, as_i128 as f64))
            }
            (Payload::Float(v), true) => Ok(Self::float_payload(target, v)),
            (Payload::Float(v), false) => {
                let bits = target.bits();
                let truncated = v.trunc();
                let raw = match target.signedness() {
                    Some(Signedness::Signed) => from_signed(I256::from(truncated as i128), bits),
                    _ => U256::from(truncated as u128) & mask_for(bits),
                };
                Ok(Self::int_payload(target, raw))
            }
        }
    }

    /// Parses a decimal string into `mode`'s arithmetic; round-trips
    /// exactly within the mode (§3).
    pub fn from_decimal(mode: &Mode, s: &str) -> Result<Self> {
        if mode.is_float() {
            let value: f64 = s.parse().map_err(|_| Error::ParseTarval {
                value: s.to_string(),
                mode: mode.name().to_string(),
            })?;
            return Ok(Self::float_payload(mode, value));
        }
        Self::require_int(mode)?;
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let magnitude = U256::from_str_radix(digits, 10).map_err(|_| Error::ParseTarval {
            value: s.to_string(),
            mode: mode.name().to_string(),
        })?;
        let raw = if negative {
            magnitude.wrapping_neg()
        } else {
            magnitude
        };
        Ok(Self::int_payload(mode, raw))
    }

    /// Renders this tarval as an exact decimal string within its mode.
    pub fn to_decimal(&self) -> Result<String> {
        if self.is_bad() {
            return Ok("bad".to_string());
        }
        let mode = self.mode.as_ref().unwrap();
        match self.payload.unwrap() {
            Payload::Float(v) => Ok(format!("{v}")),
            Payload::Int(raw) => Ok(match mode.signedness() {
                Some(Signedness::Signed) => to_signed(raw, mode.bits()).to_string(),
                _ => raw.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn i32_mode() -> Mode {
        Mode::new_int("Is32", 32, Signedness::Signed, 32).unwrap()
    }

    fn u8_mode() -> Mode {
        Mode::new_int("Iu8", 8, Signedness::Unsigned, 8).unwrap()
    }

    #[test]
    fn decimal_round_trip_signed() {
        let mode = i32_mode();
        for text in ["-2147483648", "-1", "0", "1", "2147483647"] {
            let tv = Tarval::from_decimal(&mode, text).unwrap();
            assert_eq!(tv.to_decimal().unwrap(), text);
        }
    }

    #[test]
    fn wraps_on_overflow() {
        let mode = u8_mode();
        let max = Tarval::all_ones(&mode).unwrap();
        let one = Tarval::one(&mode).unwrap();
        let wrapped = max.add(&one).unwrap();
        assert!(wrapped.is_null());
    }

    #[test]
    fn signed_division_truncates_toward_zero() {
        let mode = i32_mode();
        let a = Tarval::from_i128(&mode, -7).unwrap();
        let b = Tarval::from_i128(&mode, 2).unwrap();
        let q = a.div(&b).unwrap();
        assert_eq!(q.to_i128(), Some(-3));
    }

    #[test]
    fn division_by_zero_is_bad() {
        let mode = i32_mode();
        let a = Tarval::from_i128(&mode, 7).unwrap();
        let zero = Tarval::zero(&mode).unwrap();
        assert!(a.div(&zero).unwrap().is_bad());
    }

    #[test]
    fn arithmetic_shift_preserves_sign() {
        let mode = i32_mode();
        let neg = Tarval::from_i128(&mode, -8).unwrap();
        let shifted = neg.shrs(1).unwrap();
        assert_eq!(shifted.to_i128(), Some(-4));
    }

    #[test]
    fn cmp_orders_signed_values() {
        let mode = i32_mode();
        let a = Tarval::from_i128(&mode, -1).unwrap();
        let b = Tarval::from_i128(&mode, 1).unwrap();
        assert_eq!(a.cmp(&b).unwrap(), Relation::LESS);
    }
}
