//! Order number generation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Short opaque token identifying an order to humans (emails, support).
///
/// Twenty uppercase hexadecimal characters taken from a random UUID.
/// Uniqueness is enforced by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Length of generated order numbers.
    pub const LEN: usize = 20;

    /// Generates a fresh random order number.
    pub fn generate() -> Self {
        let mut token = Uuid::new_v4().simple().to_string().to_uppercase();
        token.truncate(Self::LEN);
        Self(token)
    }

    /// Wraps an order number loaded from storage.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the order number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_numbers_are_short_uppercase_hex() {
        let number = OrderNumber::generate();
        assert_eq!(number.as_str().len(), OrderNumber::LEN);
        assert!(
            number
                .as_str()
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        );
    }

    #[test]
    fn generated_numbers_differ() {
        assert_ne!(OrderNumber::generate(), OrderNumber::generate());
    }
}
