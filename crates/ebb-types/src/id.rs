use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Number of identifiers in one allocation space.
pub const SPACE_SIZE: u32 = 1 << 16;

/// An allocation space: the high 16 bits of every [`EbbId`] it hands out.
///
/// Independent allocators are given disjoint spaces, so they never collide
/// without having to coordinate. Space 0 is reserved for the static
/// identifiers in [`crate::static_ids`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdSpace(u16);

impl IdSpace {
    /// The space holding statically assigned identifiers.
    pub const STATIC: IdSpace = IdSpace(0);

    pub const fn new(space: u16) -> Self {
        Self(space)
    }

    pub const fn get(self) -> u16 {
        self.0
    }

    /// The first identifier of this space.
    pub const fn base(self) -> EbbId {
        EbbId::new(self.0, 0)
    }

    /// Returns `true` if `id` was allocated out of this space.
    pub fn contains(self, id: EbbId) -> bool {
        id.space() == self
    }
}

impl fmt::Display for IdSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "space:{:04x}", self.0)
    }
}

/// Opaque name of an Ebb.
///
/// The value is split into an allocation-space segment (high 16 bits) and a
/// local segment (low 16 bits). Two identifiers are equal iff their integer
/// values are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EbbId(u32);

impl EbbId {
    /// Compose an identifier from its space and local segments.
    pub const fn new(space: u16, local: u16) -> Self {
        Self(((space as u32) << 16) | local as u32)
    }

    /// Rebuild an identifier from its integer value.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The integer value.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The allocation space this identifier belongs to.
    pub const fn space(self) -> IdSpace {
        IdSpace((self.0 >> 16) as u16)
    }

    /// The space-local segment.
    pub const fn local(self) -> u16 {
        (self.0 & 0xffff) as u16
    }

    /// Hex encoding of the raw value (8 characters).
    pub fn to_hex(self) -> String {
        hex::encode(self.0.to_be_bytes())
    }

    /// Parse from 8 hex characters, with or without the `ebb:` prefix.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("ebb:").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let arr: [u8; 4] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| TypeError::InvalidLength {
                expected: 4,
                actual: bytes.len(),
            })?;
        Ok(Self(u32::from_be_bytes(arr)))
    }
}

impl fmt::Debug for EbbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EbbId({:04x}.{:04x})", self.space().get(), self.local())
    }
}

impl fmt::Display for EbbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ebb:{}", self.to_hex())
    }
}

impl FromStr for EbbId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<EbbId> for u32 {
    fn from(id: EbbId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn segments_compose_and_split() {
        let id = EbbId::new(3, 0x1234);
        assert_eq!(id.space(), IdSpace::new(3));
        assert_eq!(id.local(), 0x1234);
        assert_eq!(id.raw(), 0x0003_1234);
    }

    #[test]
    fn space_base_and_contains() {
        let space = IdSpace::new(7);
        assert_eq!(space.base(), EbbId::new(7, 0));
        assert!(space.contains(EbbId::new(7, 99)));
        assert!(!space.contains(EbbId::new(8, 99)));
    }

    #[test]
    fn display_and_parse() {
        let id = EbbId::new(1, 42);
        let shown = id.to_string();
        assert_eq!(shown, "ebb:0001002a");
        assert_eq!(shown.parse::<EbbId>().unwrap(), id);
        assert_eq!(EbbId::from_hex("0001002a").unwrap(), id);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(matches!(
            EbbId::from_hex("ebb:zz"),
            Err(TypeError::InvalidHex(_))
        ));
        assert_eq!(
            EbbId::from_hex("ebb:0102"),
            Err(TypeError::InvalidLength {
                expected: 4,
                actual: 2
            })
        );
    }

    #[test]
    fn serde_roundtrip() {
        let id = EbbId::new(2, 5);
        let json = serde_json::to_string(&id).unwrap();
        let parsed: EbbId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn debug_shows_segments() {
        assert_eq!(format!("{:?}", EbbId::new(1, 2)), "EbbId(0001.0002)");
    }

    proptest! {
        #[test]
        fn distinct_spaces_never_collide(a in any::<u16>(), b in any::<u16>(), la in any::<u16>(), lb in any::<u16>()) {
            prop_assume!(a != b);
            prop_assert_ne!(EbbId::new(a, la), EbbId::new(b, lb));
        }

        #[test]
        fn split_inverts_compose(space in any::<u16>(), local in any::<u16>()) {
            let id = EbbId::new(space, local);
            prop_assert_eq!(id.space().get(), space);
            prop_assert_eq!(id.local(), local);
            prop_assert_eq!(EbbId::from_raw(id.raw()), id);
        }
    }
}
