use primitive_types::U256 as PrimitiveU256;

/// 256-bit unsigned integer backing the A and B super-registers.
pub type U256 = PrimitiveU256;

/// Four 64-bit lanes of a super-register, word 0 least significant.
pub type SuperRegister = [u64; 4];

/// Sentinel returned by ledger queries that find nothing (`-1` as unsigned).
pub const MINUS_ONE: u64 = u64::MAX;

/// Reinterprets a 64-bit word as a two's complement signed value.
pub fn unsigned_to_signed(value: u64) -> i64 {
    value as i64
}

/// Normalises any signed value into `[0, 2^64)`.
pub fn signed_to_unsigned(value: i128) -> u64 {
    value.rem_euclid(1i128 << 64) as u64
}

/// Joins four words into one 256-bit integer: `Σ w[i] * 2^(64 i)`.
pub fn message_to_super_register(words: SuperRegister) -> U256 {
    PrimitiveU256(words)
}

/// Splits a 256-bit integer into base-2^64 digits, least significant first.
pub fn super_register_to_message(value: U256) -> SuperRegister {
    value.0
}

/// Splits a signed 256-bit quantity given as sign and magnitude.
///
/// Negative values wrap around modulo 2^256 before decomposition.
pub fn signed_super_register_to_message(negative: bool, magnitude: U256) -> SuperRegister {
    if negative {
        (!magnitude).overflowing_add(U256::one()).0 .0
    } else {
        magnitude.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_reinterpretation() {
        assert_eq!(unsigned_to_signed(u64::MAX), -1);
        assert_eq!(unsigned_to_signed(0x8000_0000_0000_0000), i64::MIN);
        assert_eq!(unsigned_to_signed(5), 5);
    }

    #[test]
    fn test_signed_to_unsigned_wraps() {
        assert_eq!(signed_to_unsigned(-1), u64::MAX);
        assert_eq!(signed_to_unsigned(1i128 << 64), 0);
        assert_eq!(signed_to_unsigned((1i128 << 64) + 7), 7);
        assert_eq!(signed_to_unsigned(i64::MIN as i128), 0x8000_0000_0000_0000);
    }

    #[test]
    fn test_super_register_word_order() {
        let value = message_to_super_register([1, 2, 0, 0]);
        assert_eq!(value, U256::from(2u64) * (U256::one() << 64) + U256::one());
        assert_eq!(super_register_to_message(value), [1, 2, 0, 0]);
    }

    #[test]
    fn test_negative_super_register() {
        assert_eq!(
            signed_super_register_to_message(true, U256::one()),
            [u64::MAX; 4]
        );
        assert_eq!(
            signed_super_register_to_message(true, U256::zero()),
            [0, 0, 0, 0]
        );
        assert_eq!(
            signed_super_register_to_message(false, U256::from(9u64)),
            [9, 0, 0, 0]
        );
    }

    proptest::proptest! {
        #[test]
        fn prop_signed_wrap_matches_i128(value in proptest::prelude::any::<i128>()) {
            let expected = (value as u128 & u64::MAX as u128) as u64;
            proptest::prop_assert_eq!(signed_to_unsigned(value), expected);
        }
    }
}
