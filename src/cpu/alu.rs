//! The arithmetic/logic unit.
//!
//! Pure combinational functions over 16-bit words: no flags, no state, no
//! overflow detection. Arithmetic wraps modulo 2^16, which is where the
//! machine's two's-complement behavior comes from. The low 16 bits of a sum,
//! difference, or product are the same whether the operands are read as
//! signed or unsigned, so everything here works on plain `u16`.

/// Add two words, wrapping modulo 2^16.
#[inline]
pub fn add(a: u16, b: u16) -> u16 {
    a.wrapping_add(b)
}

/// Subtract `b` from `a`, wrapping modulo 2^16.
#[inline]
pub fn sub(a: u16, b: u16) -> u16 {
    a.wrapping_sub(b)
}

/// Multiply two words, keeping the low 16 bits of the product.
#[inline]
pub fn mul(a: u16, b: u16) -> u16 {
    a.wrapping_mul(b)
}

/// Bitwise AND.
#[inline]
pub fn and(a: u16, b: u16) -> u16 {
    a & b
}

/// Bitwise OR.
#[inline]
pub fn or(a: u16, b: u16) -> u16 {
    a | b
}

/// Bitwise complement of `a`.
///
/// NOT is unary at the ISA level, but the ALU's second operand port still
/// exists: `b` arrives and is ignored.
#[inline]
pub fn not(a: u16, _b: u16) -> u16 {
    !a
}

/// Logical shift left by the amount in the low byte of `b`.
///
/// Vacated bits fill with zero; amounts of 16 or more shift everything out
/// and produce 0.
#[inline]
pub fn shift_left(a: u16, b: u16) -> u16 {
    a.checked_shl(u32::from(b & 0x00FF)).unwrap_or(0)
}

/// Logical shift right by the amount in the low byte of `b`.
///
/// Same amount rules as [`shift_left`].
#[inline]
pub fn shift_right(a: u16, b: u16) -> u16 {
    a.checked_shr(u32::from(b & 0x00FF)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_add_wraps() {
        assert_eq!(add(1, 2), 3);
        assert_eq!(add(0x7FFF, 1), 0x8000);
        assert_eq!(add(0xFFFF, 1), 0);
        assert_eq!(add(0xFFFF, 0xFFFF), 0xFFFE);
    }

    #[test]
    fn test_sub_wraps() {
        assert_eq!(sub(5, 3), 2);
        assert_eq!(sub(0, 1), 0xFFFF);
        assert_eq!(sub(0x8000, 1), 0x7FFF);
    }

    #[test]
    fn test_mul_truncates() {
        assert_eq!(mul(7, 6), 42);
        // -2 * 3 = -6 in two's complement
        assert_eq!(mul(0xFFFE, 3), 0xFFFA);
        // 0x4000 * 4 = 0x10000, high bits dropped
        assert_eq!(mul(0x4000, 4), 0);
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(and(0b1100, 0b1010), 0b1000);
        assert_eq!(or(0b1100, 0b1010), 0b1110);
        assert_eq!(not(0, 0), 0xFFFF);
        assert_eq!(not(0xFFFF, 0), 0);
    }

    #[test]
    fn test_shift_amounts() {
        assert_eq!(shift_left(1, 0), 1);
        assert_eq!(shift_left(1, 15), 0x8000);
        assert_eq!(shift_left(1, 16), 0);
        assert_eq!(shift_right(0x8000, 15), 1);
        assert_eq!(shift_right(0x8000, 16), 0);
        // Only the low byte of the amount counts: 0x0100 & 0xFF == 0
        assert_eq!(shift_left(1, 0x0100), 1);
    }

    proptest! {
        #[test]
        fn add_agrees_with_signed_view(a: u16, b: u16) {
            let signed = (a as i16).wrapping_add(b as i16) as u16;
            prop_assert_eq!(add(a, b), signed);
        }

        #[test]
        fn sub_is_add_of_negation(a: u16, b: u16) {
            prop_assert_eq!(sub(a, b), add(a, b.wrapping_neg()));
        }

        #[test]
        fn mul_agrees_with_signed_view(a: u16, b: u16) {
            let signed = (a as i16).wrapping_mul(b as i16) as u16;
            prop_assert_eq!(mul(a, b), signed);
        }

        #[test]
        fn not_ignores_second_operand(a: u16, b: u16, c: u16) {
            prop_assert_eq!(not(a, b), not(a, c));
            prop_assert_eq!(not(a, b), !a);
        }

        #[test]
        fn complement_is_involutive(a: u16, b: u16) {
            prop_assert_eq!(not(not(a, b), b), a);
        }
    }
}
