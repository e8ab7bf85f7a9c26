//! x87 and SSE control state.
//!
//! Stack slots are held in 80-bit extended format and indexed by physical register number
//! (R0..R7), not relative to TOP. At the bridge boundary each slot is exchanged as an `i64`.
//! That conversion is exact for every `i64` on the way in. On the way out it rounds to nearest
//! even, and values outside the `i64` range (plus NaN and infinity) produce the x87 integer
//! indefinite, `i64::MIN`.

use bytemuck::Zeroable;

const EXP_BIAS: i32 = 16383;
const EXP_MASK: u16 = 0x7FFF;
const SIGN_BIT: u16 = 0x8000;

/// x87 integer indefinite.
pub const INTEGER_INDEFINITE: i64 = i64::MIN;

/// Power-on MXCSR value. Not applied to a fresh core.
pub const MXCSR_DEFAULT: u32 = 0x1F80;

/// 80-bit extended-precision value: explicit-integer-bit significand plus sign and 15-bit
/// biased exponent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Zeroable)]
pub struct Float80 {
    pub signif: u64,
    pub sign_exp: u16,
}

impl Float80 {
    pub const ZERO: Float80 = Float80 {
        signif: 0,
        sign_exp: 0,
    };

    #[inline]
    pub fn sign(&self) -> bool {
        self.sign_exp & SIGN_BIT != 0
    }

    #[inline]
    pub fn biased_exp(&self) -> u16 {
        self.sign_exp & EXP_MASK
    }

    pub fn is_nan_or_inf(&self) -> bool {
        self.biased_exp() == EXP_MASK
    }

    pub fn from_i64(val: i64) -> Self {
        if val == 0 {
            return Self::ZERO;
        }
        let sign = if val < 0 { SIGN_BIT } else { 0 };
        let mag = val.unsigned_abs();
        let shift = mag.leading_zeros();
        let exp = (EXP_BIAS + 63 - shift as i32) as u16;
        Float80 {
            signif: mag << shift,
            sign_exp: sign | exp,
        }
    }

    pub fn to_i64(&self) -> i64 {
        let exp = self.biased_exp();
        if exp == EXP_MASK {
            return INTEGER_INDEFINITE;
        }
        if exp == 0 || self.signif == 0 {
            // Zero and denormals are far below 0.5.
            return 0;
        }

        let e = i32::from(exp) - EXP_BIAS;
        if e < -1 {
            return 0;
        }
        if e > 63 {
            return INTEGER_INDEFINITE;
        }

        // value = signif * 2^(e - 63); shift is in 0..=64.
        let shift = (63 - e) as u32;
        let signif = u128::from(self.signif);
        let mut int = signif >> shift;
        if shift > 0 {
            let rem = signif & ((1u128 << shift) - 1);
            let half = 1u128 << (shift - 1);
            if rem > half || (rem == half && int & 1 == 1) {
                int += 1;
            }
        }

        if self.sign() {
            if int > 1u128 << 63 {
                INTEGER_INDEFINITE
            } else {
                (int as u64).wrapping_neg() as i64
            }
        } else if int > i64::MAX as u128 {
            INTEGER_INDEFINITE
        } else {
            int as i64
        }
    }
}

/// FPU and SSE control/status state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Zeroable)]
pub struct FpState {
    pub fcw: u16,
    pub fsw: u16,
    /// Full 16-bit tag word (two bits per physical register).
    pub ftw: u16,
    /// Last x87 opcode (11 bits significant).
    pub fop: u16,
    st: [Float80; 8],
    pub mxcsr: u32,
    pub mxcsr_mask: u32,
}

impl FpState {
    /// Panics if `index > 7`.
    #[track_caller]
    pub fn st(&self, index: usize) -> i64 {
        self.st[index].to_i64()
    }

    #[track_caller]
    pub fn set_st(&mut self, index: usize, val: i64) {
        self.st[index] = Float80::from_i64(val);
    }

    #[track_caller]
    pub fn st_raw(&self, index: usize) -> Float80 {
        self.st[index]
    }

    #[track_caller]
    pub fn set_st_raw(&mut self, index: usize, val: Float80) {
        self.st[index] = val;
    }

    /// TOP field of the status word.
    pub fn top(&self) -> u8 {
        ((self.fsw >> 11) & 0x7) as u8
    }
}
