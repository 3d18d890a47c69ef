//! Exact integer helpers used by the expression evaluator.
//!
//! All arithmetic is done on `i128` with checked operations: an overflow is reported as
//! `None` (inapplicable) instead of wrapping, and no floating point is involved anywhere.

/// True iff the bits of `value` selected by `mask` equal `target`.
///
/// Used to classify VHDX BAT entries by their low three state bits regardless of the
/// 61 offset/reserved bits above them.
pub fn masked_eq(value: u64, mask: u64, target: u64) -> bool {
    value & mask == target
}

/// `i128` variant of [`masked_eq`] used on evaluated values. Negative inputs are
/// compared on their two's complement bits.
pub fn masked_eq_i128(value: i128, mask: i128, target: i128) -> bool {
    value & mask == target
}

/// Floor of `a / b`; `None` when `b == 0` or on overflow.
pub fn floor_div(a: i128, b: i128) -> Option<i128> {
    if b == 0 {
        return None;
    }
    let q = a.checked_div(b)?;
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) != (b < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

/// Ceiling of `a / b`; `None` when `b == 0` or on overflow.
///
/// For non-negative operands this equals `(a + b - 1) / b` without the intermediate sum.
pub fn ceil_div(a: i128, b: i128) -> Option<i128> {
    if b == 0 {
        return None;
    }
    let q = a.checked_div(b)?;
    let r = a.checked_rem(b)?;
    if r != 0 && ((r < 0) == (b < 0)) {
        q.checked_add(1)
    } else {
        Some(q)
    }
}

/// Truncating division; `None` when `b == 0` or on overflow.
pub fn trunc_div(a: i128, b: i128) -> Option<i128> {
    if b == 0 {
        return None;
    }
    a.checked_div(b)
}

/// Remainder with the sign of `a`; `None` when `b == 0`.
pub fn trunc_rem(a: i128, b: i128) -> Option<i128> {
    if b == 0 {
        return None;
    }
    a.checked_rem(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_eq_low_three_bits() {
        assert!(masked_eq(0x0000_0000_0000_0006, 0x07, 6));
        assert!(masked_eq(0x0000_0000_0000_000E, 0x07, 6));
        assert!(!masked_eq(0x0000_0000_0000_0007, 0x07, 6));
        assert!(masked_eq(0xFFFF_FFFF_FFFF_FFF8, 0x07, 0));
        for v in [0u64, 1, 5, 0x8000_0000_0000_0003, u64::MAX] {
            for s in 0..8 {
                assert_eq!(masked_eq(v, 7, s), v & 7 == s);
            }
        }
    }

    #[test]
    fn test_ceil_floor_concrete() {
        assert_eq!(ceil_div(10, 3), Some(4));
        assert_eq!(floor_div(10, 3), Some(3));
        assert_eq!(ceil_div(9, 3), Some(3));
        assert_eq!(floor_div(9, 3), Some(3));
        assert_eq!(ceil_div(0, 7), Some(0));
        assert_eq!(floor_div(0, 7), Some(0));
        assert_eq!(ceil_div(6, 7), Some(1));
        assert_eq!(floor_div(6, 7), Some(0));
    }

    #[test]
    fn test_division_by_zero_is_inapplicable() {
        assert_eq!(ceil_div(10, 0), None);
        assert_eq!(floor_div(10, 0), None);
        assert_eq!(trunc_div(10, 0), None);
        assert_eq!(trunc_rem(10, 0), None);
    }

    #[test]
    fn test_floor_le_ceil_and_equal_iff_exact() {
        let big = (1i128 << 100) + 12345;
        for a in [0i128, 1, 2, 63, 64, 65, 1 << 40, big, i128::MAX] {
            for b in [1i128, 2, 3, 7, 64, 1 << 20, (1 << 64) + 1] {
                let f = floor_div(a, b).unwrap();
                let c = ceil_div(a, b).unwrap();
                assert!(f <= c);
                assert!(f * b <= a);
                assert_eq!(f == c, a % b == 0, "a={a} b={b}");
                if a % b != 0 {
                    assert_eq!(c, f + 1);
                }
            }
        }
    }

    #[test]
    fn test_negative_operands_round_correctly() {
        assert_eq!(floor_div(-7, 2), Some(-4));
        assert_eq!(ceil_div(-7, 2), Some(-3));
        assert_eq!(floor_div(7, -2), Some(-4));
        assert_eq!(ceil_div(7, -2), Some(-3));
        assert_eq!(floor_div(i128::MIN, -1), None);
    }
}
