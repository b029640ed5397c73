//! Q32.32 fixed-point arithmetic.
//!
//! Every value that flows through the deterministic step loop is an [`Fx`]:
//! a signed 64-bit integer interpreted as `raw / 2^32`. Products and
//! quotients are formed in `i128` and narrowed back with an explicit range
//! check, so overflow is reported as [`EngineError::ArithmeticOverflow`]
//! instead of wrapping.
//!
//! # Rounding
//!
//! - `mul` shifts the double-width product right by 32 with an arithmetic
//!   shift, i.e. it **floors** toward negative infinity.
//! - `div` uses integer division, i.e. it **truncates** toward zero.
//!
//! The two rules differ on purpose. Recorded hash tips depend on the exact
//! bit pattern they produce, so neither may be changed.

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of fractional bits.
pub const FX_SHIFT: u32 = 32;

const SCALE_F64: f64 = 4_294_967_296.0; // 2^32

/// Signed Q32.32 fixed-point number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fx(i64);

impl Fx {
    /// 0.0
    pub const ZERO: Fx = Fx(0);

    /// 1.0
    pub const ONE: Fx = Fx(1 << FX_SHIFT);

    /// 0.5
    pub const HALF: Fx = Fx(1 << (FX_SHIFT - 1));

    /// 2.0
    pub const TWO: Fx = Fx(2 << FX_SHIFT);

    /// Exact `ONE / 60` in integer arithmetic (not a rounded float `1/60`).
    pub const DT: Fx = Fx((1 << FX_SHIFT) / 60);

    /// Wraps a raw Q32.32 integer.
    pub const fn from_raw(raw: i64) -> Self {
        Fx(raw)
    }

    /// Returns the raw Q32.32 integer.
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Converts a whole number. Always representable.
    pub const fn from_int(value: i32) -> Self {
        Fx((value as i64) << FX_SHIFT)
    }

    /// Converts a float via `floor(v * 2^32)`.
    ///
    /// Lossy. Only used at the simulation boundary (initial seeding and
    /// configuration), never inside the step loop.
    pub fn from_f64(value: f64) -> EngineResult<Self> {
        if !value.is_finite() {
            return Err(EngineError::overflow("from_f64"));
        }
        let scaled = (value * SCALE_F64).floor();
        // i64 range is [-2^63, 2^63); both bounds are exact in f64.
        if scaled < -9_223_372_036_854_775_808.0 || scaled >= 9_223_372_036_854_775_808.0 {
            return Err(EngineError::overflow("from_f64"));
        }
        Ok(Fx(scaled as i64))
    }

    /// Converts to a float via `raw / 2^32`. Display only.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALE_F64
    }

    pub fn checked_add(self, rhs: Fx) -> EngineResult<Fx> {
        self.0
            .checked_add(rhs.0)
            .map(Fx)
            .ok_or(EngineError::overflow("add"))
    }

    pub fn checked_sub(self, rhs: Fx) -> EngineResult<Fx> {
        self.0
            .checked_sub(rhs.0)
            .map(Fx)
            .ok_or(EngineError::overflow("sub"))
    }

    pub fn checked_neg(self) -> EngineResult<Fx> {
        self.0
            .checked_neg()
            .map(Fx)
            .ok_or(EngineError::overflow("neg"))
    }

    /// `(a * b) >> 32`, flooring.
    pub fn checked_mul(self, rhs: Fx) -> EngineResult<Fx> {
        // |a*b| < 2^126, cannot overflow i128.
        let wide = (self.0 as i128) * (rhs.0 as i128);
        narrow(wide >> FX_SHIFT, "mul")
    }

    /// `(a << 32) / b`, truncating toward zero.
    pub fn checked_div(self, rhs: Fx) -> EngineResult<Fx> {
        if rhs.0 == 0 {
            return Err(EngineError::DivisionByZero { op: "div" });
        }
        // |a| < 2^63 so the shifted numerator stays below 2^95.
        let wide = (self.0 as i128) << FX_SHIFT;
        narrow(wide / rhs.0 as i128, "div")
    }

    /// Halves by arithmetic right shift of the raw value.
    pub const fn halved(self) -> Fx {
        Fx(self.0 >> 1)
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Absolute value; fails only for `i64::MIN`.
    pub fn checked_abs(self) -> EngineResult<Fx> {
        self.0
            .checked_abs()
            .map(Fx)
            .ok_or(EngineError::overflow("abs"))
    }

    /// Low 64 bits in two's complement, as written into snapshots.
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

fn narrow(wide: i128, op: &'static str) -> EngineResult<Fx> {
    i64::try_from(wide)
        .map(Fx)
        .map_err(|_| EngineError::overflow(op))
}

impl fmt::Display for Fx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match f.precision() {
            Some(p) => write!(f, "{:.*}", p, self.to_f64()),
            None => write!(f, "{}", self.to_f64()),
        }
    }
}
