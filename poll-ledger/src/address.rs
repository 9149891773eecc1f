use poll_fhe::Principal;
use std::{fmt, str::FromStr};

pub const ADDRESS_SIZE: usize = 32;

/// Identity of a caller: poll creators and voters.
///
/// Addresses are public, and so is the fact that an address voted; only the
/// content of a ballot is confidential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Address(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0; ADDRESS_SIZE];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Address(bytes))
    }
}

impl From<Address> for Principal {
    fn from(address: Address) -> Self {
        Principal::new(address.0)
    }
}
