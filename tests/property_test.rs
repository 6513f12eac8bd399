use proptest::prelude::*;
use signum_simulator::crypto::{digest_words, HashAlgorithm};
use signum_simulator::types::{
    hex_to_string, message_to_super_register, signed_to_unsigned, string_to_hex,
    super_register_to_message, unsigned_to_signed,
};
use signum_simulator::vm::{Breakpoints, Controller, DeployOptions, HaltReason, StepOutcome};

fn digest_bytes(words: &[u64]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_le_bytes()).collect()
}

fn run_binary(op: &str, a: u64, b: u64) -> u64 {
    let source = format!(
        "^declare a\n^declare b\nSET @a #{a:016x}\nSET @b #{b:016x}\n{op} @a $b\nFIN"
    );
    let mut controller = Controller::default();
    let id = controller.deploy(DeployOptions::new(source)).unwrap();
    let result = controller.run_contract(id, &Breakpoints::new()).unwrap();
    assert_eq!(result.outcome, StepOutcome::Halted(HaltReason::Finished));
    controller.contract(id).unwrap().memory.read("a")
}

#[test]
fn test_empty_input_digests() {
    let cases = [
        (HashAlgorithm::Md5, "d41d8cd98f00b204e9800998ecf8427e"),
        (
            HashAlgorithm::Ripemd160,
            "9c1185a5c5e9fc54612808977ee8f548b2258d31",
        ),
        (
            HashAlgorithm::Sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
        ),
    ];
    for (algorithm, expected) in cases {
        let words = digest_words(algorithm, &[]);
        assert_eq!(words.len(), algorithm.output_words());
        let expected = hex::decode(expected).unwrap();
        let bytes = digest_bytes(&words);
        assert_eq!(&bytes[..expected.len()], expected.as_slice());
        assert!(bytes[expected.len()..].iter().all(|b| *b == 0));
    }
}

proptest! {
    #[test]
    fn prop_signed_unsigned_round_trip(value in any::<u64>()) {
        prop_assert_eq!(signed_to_unsigned(i128::from(unsigned_to_signed(value))), value);
    }

    #[test]
    fn prop_super_register_round_trip(words in any::<[u64; 4]>()) {
        prop_assert_eq!(super_register_to_message(message_to_super_register(words)), words);
    }

    #[test]
    fn prop_string_hex_round_trip(text in ".{0,250}") {
        prop_assume!(text.len() <= 1000);
        prop_assert_eq!(hex_to_string(&string_to_hex(&text)).unwrap(), text);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_arithmetic_wraps(a in (u64::MAX - 1024)..=u64::MAX, b in any::<u64>()) {
        prop_assert_eq!(run_binary("ADD", a, b), a.wrapping_add(b));
        prop_assert_eq!(run_binary("SUB", b, a), b.wrapping_sub(a));
        prop_assert_eq!(run_binary("MUL", a, b), a.wrapping_mul(b));
    }
}
