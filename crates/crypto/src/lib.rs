//! Hash engine over arrays of 64-bit words.
//!
//! Contract opcodes hash register contents, not byte strings. Every input
//! word is split into two 32-bit halves, low half first, and each half is laid
//! out little-endian; that is exactly the little-endian byte image of the
//! word. SHA-256 runs a big-endian compression core, so its 32-bit halves are
//! byte-swapped on the way in and the digest words swapped back on the way
//! out, which again leaves the plain byte image. Digest bytes are then
//! regrouped into 64-bit words, low 32-bit digest word first.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
/// Hash algorithms reachable from contract code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Md5,
    Ripemd160,
    Sha256,
}

impl HashAlgorithm {
    /// Number of 64-bit words produced by the algorithm.
    pub const fn output_words(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 2,
            HashAlgorithm::Ripemd160 => 3,
            HashAlgorithm::Sha256 => 4,
        }
    }
}

fn words_to_bytes(words: &[u64]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_le_bytes()).collect()
}

fn bytes_to_words(bytes: &[u8]) -> Vec<u64> {
    bytes
        .chunks(8)
        .map(|chunk| {
            let mut word = [0u8; 8];
            word[..chunk.len()].copy_from_slice(chunk);
            u64::from_le_bytes(word)
        })
        .collect()
}

fn digest_bytes(algorithm: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    match algorithm {
        HashAlgorithm::Md5 => md5::compute(data).0.to_vec(),
        HashAlgorithm::Ripemd160 => {
            let mut hasher = Ripemd160::new();
            hasher.update(data);
            hasher.finalize().to_vec()
        }
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(data);
            hasher.finalize().to_vec()
        }
    }
}

/// Hashes an arbitrary number of words and packs the digest into words.
pub fn digest_words(algorithm: HashAlgorithm, words: &[u64]) -> Vec<u64> {
    bytes_to_words(&digest_bytes(algorithm, &words_to_bytes(words)))
}

/// MD5 of two words (`A1, A2`), producing two words.
pub fn md5_words(input: &[u64; 2]) -> [u64; 2] {
    let digest = digest_words(HashAlgorithm::Md5, input);
    [digest[0], digest[1]]
}

/// RIPEMD-160 of four words; the third output word carries 32 bits.
pub fn ripemd160_words(input: &[u64; 4]) -> [u64; 3] {
    let digest = digest_words(HashAlgorithm::Ripemd160, input);
    [digest[0], digest[1], digest[2]]
}

/// SHA-256 of four words, producing four words.
pub fn sha256_words(input: &[u64; 4]) -> [u64; 4] {
    let digest = digest_words(HashAlgorithm::Sha256, input);
    [digest[0], digest[1], digest[2], digest[3]]
}

/// First digest word of SHA-256 over raw bytes.
pub fn sha256_bytes_to_word(data: &[u8]) -> u64 {
    bytes_to_words(&digest_bytes(HashAlgorithm::Sha256, data))[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(hex_digest: &str) -> Vec<u64> {
        bytes_to_words(&hex::decode(hex_digest).unwrap())
    }

    #[test]
    fn test_md5_empty() {
        let expected = packed("d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(digest_words(HashAlgorithm::Md5, &[]), expected);
        assert_eq!(expected[0], 0x04b2008fd98c1dd4);
        assert_eq!(expected[1], 0x7e42f8ec980980e9);
    }

    #[test]
    fn test_sha256_empty() {
        let expected =
            packed("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
        let words = digest_words(HashAlgorithm::Sha256, &[]);
        assert_eq!(words, expected);
        assert_eq!(words[0], 0x141cfc9842c4b0e3);
        assert_eq!(words[3], 0x55b852781b9995a4);
    }

    #[test]
    fn test_ripemd160_empty() {
        let words = digest_words(HashAlgorithm::Ripemd160, &[]);
        assert_eq!(words, packed("9c1185a5c5e9fc54612808977ee8f548b2258d31"));
        assert_eq!(words.len(), 3);
        assert_eq!(words[2] >> 32, 0);
        assert_eq!(words[2], 0x318d25b2);
    }

    #[test]
    fn test_abc_vectors() {
        // "abc" occupies the low three bytes of a single word
        let abc = [0x636261u64];
        let bytes = words_to_bytes(&abc);
        assert_eq!(&bytes[..3], b"abc");
        assert_eq!(
            digest_bytes(HashAlgorithm::Sha256, b"abc"),
            hex::decode("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
                .unwrap()
        );
        assert_eq!(
            digest_bytes(HashAlgorithm::Md5, b"abc"),
            hex::decode("900150983cd24fb0d6963f7d28e17f72").unwrap()
        );
        assert_eq!(
            digest_bytes(HashAlgorithm::Ripemd160, b"abc"),
            hex::decode("8eb208f7e05d987a9b044a8e98c6b087f15a0bfc").unwrap()
        );
    }

    #[test]
    fn test_fixed_shapes_agree_with_generic() {
        let input = [0x0123456789abcdef, 0xfedcba9876543210, 7, 0];
        assert_eq!(
            sha256_words(&input).to_vec(),
            digest_words(HashAlgorithm::Sha256, &input)
        );
        assert_eq!(
            ripemd160_words(&input).to_vec(),
            digest_words(HashAlgorithm::Ripemd160, &input)
        );
        assert_eq!(
            md5_words(&[input[0], input[1]]).to_vec(),
            digest_words(HashAlgorithm::Md5, &input[..2])
        );
    }
}
