//! Hex and text codecs for the 32-byte message pages carried by transactions.
//!
//! A page is four 64-bit words. On the wire each word is eight little-endian
//! bytes, so the 64 hex characters of a page read as `w0 w1 w2 w3` with the
//! least significant byte of each word first.

use crate::{Result, TypesError};

/// Number of 64-bit words in one message page.
pub const MESSAGE_PAGE_WORDS: usize = 4;

const WORD_HEX_CHARS: usize = 16;

/// Decodes a hex string into 64-bit words.
///
/// The input is right-padded with `'0'` to a multiple of 16 characters.
pub fn hex_to_words(hex_str: &str) -> Result<Vec<u64>> {
    let trimmed = hex_str.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let mut padded = trimmed.to_string();
    let remainder = padded.len() % WORD_HEX_CHARS;
    if remainder != 0 {
        padded.extend(std::iter::repeat('0').take(WORD_HEX_CHARS - remainder));
    }

    let bytes = hex::decode(&padded).map_err(|_| TypesError::InvalidHex(hex_str.to_string()))?;
    Ok(bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            u64::from_le_bytes(word)
        })
        .collect())
}

/// Decodes a hex string into whole message pages (at least one page).
pub fn hex_to_message_array(hex_str: &str) -> Result<Vec<u64>> {
    let mut words = hex_to_words(hex_str)?;
    let pages = words.len().div_ceil(MESSAGE_PAGE_WORDS).max(1);
    words.resize(pages * MESSAGE_PAGE_WORDS, 0);
    Ok(words)
}

/// Encodes words as lowercase hex, 16 characters per word.
pub fn message_array_to_hex(words: &[u64]) -> String {
    let bytes: Vec<u8> = words.iter().flat_map(|word| word.to_le_bytes()).collect();
    hex::encode(bytes)
}

/// Renders the UTF-8 bytes of `text` as lowercase hex.
pub fn string_to_hex(text: &str) -> String {
    hex::encode(text.as_bytes())
}

/// Decodes hex produced by [`string_to_hex`] back to text.
pub fn hex_to_string(hex_str: &str) -> Result<String> {
    let bytes =
        hex::decode(hex_str.trim()).map_err(|_| TypesError::InvalidHex(hex_str.to_string()))?;
    String::from_utf8(bytes).map_err(|_| TypesError::InvalidUtf8)
}

/// Reads message pages back as text, dropping the NUL padding of the last word.
pub fn message_array_to_string(words: &[u64]) -> Result<String> {
    let mut bytes: Vec<u8> = words.iter().flat_map(|word| word.to_le_bytes()).collect();
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    String::from_utf8(bytes).map_err(|_| TypesError::InvalidUtf8)
}

/// Packs UTF-8 text into message pages.
pub fn text_to_message_array(text: &str) -> Vec<u64> {
    let mut words: Vec<u64> = text
        .as_bytes()
        .chunks(8)
        .map(|chunk| {
            let mut word = [0u8; 8];
            word[..chunk.len()].copy_from_slice(chunk);
            u64::from_le_bytes(word)
        })
        .collect();
    let pages = words.len().div_ceil(MESSAGE_PAGE_WORDS).max(1);
    words.resize(pages * MESSAGE_PAGE_WORDS, 0);
    words
}
