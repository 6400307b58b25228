//! The container flags byte.
//!
//! Both CRAM 3.1 codecs open every stream with one flags byte. The two
//! families share most bit positions, but bit 0x04 selects 32-way
//! interleaving for rANS Nx16 and external compression for the range codec,
//! and the range codec reserves the two low bits for the model order.

use crate::error::{Error, Result};

const ORDER: u8 = 0x01;
const ORDER_MASK_RANGE: u8 = 0x03;
const N32: u8 = 0x04;
const EXT: u8 = 0x04;
const STRIPE: u8 = 0x08;
const NOSZ: u8 = 0x10;
const CAT: u8 = 0x20;
const RLE: u8 = 0x40;
const PACK: u8 = 0x80;

/// Codec family whose bit table applies to a flags byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
    /// rANS Nx16.
    RansNx16,
    /// Adaptive arithmetic (range) codec.
    Range,
}

/// Context order of the entropy model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Order {
    /// No context.
    #[default]
    Zero,
    /// Previous symbol as context.
    One,
}

/// Number of interleaved rANS states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interleave {
    /// Four states.
    #[default]
    Four,
    /// Thirty-two states.
    ThirtyTwo,
}

impl Interleave {
    /// Number of lanes.
    pub fn lanes(self) -> usize {
        match self {
            Interleave::Four => 4,
            Interleave::ThirtyTwo => 32,
        }
    }
}

/// Parsed flags byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FormatFlags {
    /// Model order.
    pub order: Order,
    /// rANS interleave width (rANS Nx16 only).
    pub interleave: Interleave,
    /// Stripe transform.
    pub stripe: bool,
    /// Bit-packing of small alphabets.
    pub pack: bool,
    /// Payload stored verbatim.
    pub cat: bool,
    /// Run-length encoding.
    pub rle: bool,
    /// Uncompressed size omitted; the caller supplies it.
    pub no_size: bool,
    /// Payload delegated to the external compressor (range codec only).
    pub external: bool,
}

impl FormatFlags {
    /// Flags for a plain order-0 stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model order.
    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Set the interleave width.
    pub fn interleave(mut self, interleave: Interleave) -> Self {
        self.interleave = interleave;
        self
    }

    /// Enable or disable the stripe transform.
    pub fn stripe(mut self, on: bool) -> Self {
        self.stripe = on;
        self
    }

    /// Enable or disable bit-packing.
    pub fn pack(mut self, on: bool) -> Self {
        self.pack = on;
        self
    }

    /// Enable or disable verbatim storage.
    pub fn cat(mut self, on: bool) -> Self {
        self.cat = on;
        self
    }

    /// Enable or disable run-length encoding.
    pub fn rle(mut self, on: bool) -> Self {
        self.rle = on;
        self
    }

    /// Enable or disable the no-size header.
    pub fn no_size(mut self, on: bool) -> Self {
        self.no_size = on;
        self
    }

    /// Enable or disable external compression.
    pub fn external(mut self, on: bool) -> Self {
        self.external = on;
        self
    }

    /// Parse a flags byte under the given family's bit table.
    pub fn parse(byte: u8, family: Family) -> Result<Self> {
        let mut flags = Self {
            stripe: byte & STRIPE != 0,
            pack: byte & PACK != 0,
            cat: byte & CAT != 0,
            rle: byte & RLE != 0,
            no_size: byte & NOSZ != 0,
            ..Self::default()
        };
        match family {
            Family::RansNx16 => {
                if byte & ORDER != 0 {
                    flags.order = Order::One;
                }
                if byte & N32 != 0 {
                    flags.interleave = Interleave::ThirtyTwo;
                }
            }
            Family::Range => {
                flags.order = match byte & ORDER_MASK_RANGE {
                    0 => Order::Zero,
                    1 => Order::One,
                    _ => return Err(Error::Malformed("range codec order above 1")),
                };
                flags.external = byte & EXT != 0;
            }
        }
        Ok(flags)
    }

    /// Serialise under the given family's bit table.
    pub fn to_byte(&self, family: Family) -> Result<u8> {
        let mut byte = 0;
        if self.order == Order::One {
            byte |= ORDER;
        }
        match family {
            Family::RansNx16 => {
                if self.external {
                    return Err(Error::Unsupported("rANS Nx16 has no external-compression flag"));
                }
                if self.interleave == Interleave::ThirtyTwo {
                    byte |= N32;
                }
            }
            Family::Range => {
                if self.interleave != Interleave::Four {
                    return Err(Error::Unsupported("range codec has no interleave width"));
                }
                if self.external {
                    byte |= EXT;
                }
            }
        }
        for (on, bit) in [
            (self.stripe, STRIPE),
            (self.no_size, NOSZ),
            (self.cat, CAT),
            (self.rle, RLE),
            (self.pack, PACK),
        ] {
            if on {
                byte |= bit;
            }
        }
        Ok(byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rans_bits() {
        let flags = FormatFlags::parse(0xC1, Family::RansNx16).unwrap();
        assert_eq!(flags.order, Order::One);
        assert!(flags.pack && flags.rle);
        assert!(!flags.cat && !flags.stripe && !flags.no_size);
        assert_eq!(flags.interleave, Interleave::Four);

        let flags = FormatFlags::parse(0x04, Family::RansNx16).unwrap();
        assert_eq!(flags.interleave, Interleave::ThirtyTwo);
        assert!(!flags.external);
    }

    #[test]
    fn test_shared_bit_differs_by_family() {
        let range = FormatFlags::parse(0x04, Family::Range).unwrap();
        assert!(range.external);
        assert_eq!(range.interleave, Interleave::Four);
        assert_eq!(range.to_byte(Family::Range).unwrap(), 0x04);
        assert!(range.to_byte(Family::RansNx16).is_err());
    }

    #[test]
    fn test_range_order_bits() {
        assert!(FormatFlags::parse(0x02, Family::Range).is_err());
        assert_eq!(FormatFlags::parse(0x01, Family::Range).unwrap().order, Order::One);
    }

    #[test]
    fn test_every_rans_byte_survives() {
        for byte in 0..=255u8 {
            let flags = FormatFlags::parse(byte, Family::RansNx16).unwrap();
            // 0x02 has no meaning for rANS Nx16 and is dropped.
            assert_eq!(flags.to_byte(Family::RansNx16).unwrap(), byte & !0x02);
        }
    }
}
