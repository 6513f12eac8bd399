pub mod message;
pub mod uint;

pub use message::{
    hex_to_message_array, hex_to_string, hex_to_words, message_array_to_hex, message_array_to_string,
    string_to_hex, text_to_message_array, MESSAGE_PAGE_WORDS,
};
pub use uint::{
    message_to_super_register, signed_super_register_to_message, signed_to_unsigned,
    super_register_to_message, unsigned_to_signed, SuperRegister, U256, MINUS_ONE,
};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    #[error("Invalid UTF-8 sequence in decoded message")]
    InvalidUtf8,

    #[error("Value out of 64-bit range: {0}")]
    Overflow(String),
}

pub type Result<T> = std::result::Result<T, TypesError>;
