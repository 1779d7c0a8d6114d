// crates/placer-core/src/address.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// An account address on the host chain.
///
/// Addresses are opaque 32-byte identifiers supplied by the host environment
/// (caller identity, reward recipients, refund targets). The engine never
/// interprets their contents; it only uses them as map keys.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Address(pub [u8; 32]);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Leading 8 bytes are enough to identify an address in a message.
        write!(f, "0x")?;
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "..")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefix() {
        let addr = Address([0xab; 32]);
        assert_eq!(format!("{}", addr), "0xabababababababab..");
    }

    #[test]
    fn test_ordering_is_bytewise() {
        let a = Address([1; 32]);
        let b = Address([2; 32]);
        assert!(a < b);
    }
}
