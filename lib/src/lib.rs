// Shared Rust library for the Chord overlay: identifier arithmetic and wire types
pub mod dataset;
pub mod dht_messages;

use num_bigint::BigUint;
use num_traits::One;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;

/// Number of bits in the Chord identifier space (SHA-1 produces a 160-bit hash).
pub const M: usize = 160;

/// Width of an identifier in bytes.
pub const ID_BYTES: usize = M / 8;

/// A point on the identifier ring, stored big-endian so that byte order and
/// integer order agree.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Identifier(pub [u8; ID_BYTES]);

impl Identifier {
    pub const ZERO: Identifier = Identifier([0u8; ID_BYTES]);
    pub const MAX: Identifier = Identifier([0xFF; ID_BYTES]);

    /// Reduces an arbitrary integer modulo 2^160.
    pub fn from_biguint(value: &BigUint) -> Self {
        let bytes = value.to_bytes_be();
        let mut id = [0u8; ID_BYTES];
        let take = bytes.len().min(ID_BYTES);
        let src = bytes.get(bytes.len() - take..).unwrap_or_default();
        if let Some(dst) = id.get_mut(ID_BYTES - take..) {
            dst.copy_from_slice(src);
        }
        Identifier(id)
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    /// Parses a hex string, left-padding short input with zeros. Input wider
    /// than 160 bits is reduced modulo 2^160.
    pub fn from_hex(hex_str: &str) -> Result<Self, hex::FromHexError> {
        let padded;
        let hex_str = if hex_str.len() % 2 == 1 {
            padded = format!("0{}", hex_str);
            padded.as_str()
        } else {
            hex_str
        };
        let bytes = hex::decode(hex_str)?;
        Ok(Self::from_biguint(&BigUint::from_bytes_be(&bytes)))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First four bytes in hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(self.0.get(..4).unwrap_or_default())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.short())
    }
}

impl From<[u8; ID_BYTES]> for Identifier {
    fn from(bytes: [u8; ID_BYTES]) -> Self {
        Identifier(bytes)
    }
}

/// SHA-1 digest of a string, which is already an element of [0, 2^160).
pub fn hash(input: &str) -> Identifier {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    Identifier(hasher.finalize().into())
}

fn ring_modulus() -> BigUint {
    BigUint::one() << M
}

/// (id + 2^exponent) mod 2^160
pub fn add_id_power_of_2(id: &Identifier, exponent: usize) -> Identifier {
    let sum = id.to_biguint() + (BigUint::one() << exponent);
    Identifier::from_biguint(&(sum % ring_modulus()))
}

/// (id - 2^exponent) mod 2^160
pub fn sub_id_power_of_2(id: &Identifier, exponent: usize) -> Identifier {
    let modulus = ring_modulus();
    let offset = (BigUint::one() << exponent) % &modulus;
    let difference = (id.to_biguint() + &modulus - offset) % modulus;
    Identifier::from_biguint(&difference)
}

/// Start of the i-th finger (1-based): (id + 2^(i-1)) mod 2^160.
pub fn ring_start(id: &Identifier, i: usize) -> Identifier {
    add_id_power_of_2(id, i.saturating_sub(1))
}

/// The point whose i-th finger would start at `id`: (id - 2^(i-1)) mod 2^160.
pub fn ring_pred_point(id: &Identifier, i: usize) -> Identifier {
    sub_id_power_of_2(id, i.saturating_sub(1))
}

/// Bound types for a circular interval test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    /// `(l, r)`
    Open,
    /// `[l, r)`
    LeftClosed,
    /// `(l, r]`
    RightClosed,
    /// `[l, r]`
    Closed,
}

impl Interval {
    fn includes_left(self) -> bool {
        matches!(self, Interval::LeftClosed | Interval::Closed)
    }

    fn includes_right(self) -> bool {
        matches!(self, Interval::RightClosed | Interval::Closed)
    }

    pub fn notation(self) -> &'static str {
        match self {
            Interval::Open => "()",
            Interval::LeftClosed => "[)",
            Interval::RightClosed => "(]",
            Interval::Closed => "[]",
        }
    }
}

/// Circular membership test of `x` in the interval from `l` to `r`, walking
/// clockwise. When `l > r` the interval crosses the 2^160 boundary.
///
/// With `l == r` the interval spans the whole ring: every point for the
/// half-open and closed kinds, every point except `l` for the open kind.
pub fn in_interval(l: &Identifier, x: &Identifier, r: &Identifier, kind: Interval) -> bool {
    if l == r {
        return match kind {
            Interval::Open => x != l,
            _ => true,
        };
    }

    let after_left = if kind.includes_left() { x >= l } else { x > l };
    let before_right = if kind.includes_right() { x <= r } else { x < r };

    if l < r {
        after_left && before_right
    } else {
        after_left || before_right
    }
}

/// Checks if an ID is between two other IDs in a circular ID space.
/// `id` is between `start` and `end` if `start < id <= end` in the circular space.
pub fn is_between(id: &Identifier, start: &Identifier, end: &Identifier) -> bool {
    in_interval(start, id, end, Interval::RightClosed)
}
