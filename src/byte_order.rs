//! Helpers for explicit network byte-order conversions.
//!
//! Frame length prefixes, ethertypes and TCP ports are all big-endian on the
//! wire. Keeping the conversions here scopes the Clippy expectation to the
//! points where wire endianness is decided.

/// Serialise a `u16` in network byte order (big-endian).
///
/// # Examples
///
/// ```
/// use chatlens::byte_order::write_network_u16;
///
/// assert_eq!(write_network_u16(0x1234), [0x12, 0x34]);
/// ```
#[must_use]
pub fn write_network_u16(value: u16) -> [u8; 2] {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    value.to_be_bytes()
}

/// Parse a network-order `u16` from its on-wire representation.
///
/// # Examples
///
/// ```
/// use chatlens::byte_order::read_network_u16;
///
/// assert_eq!(read_network_u16([0x12, 0x34]), 0x1234);
/// ```
#[must_use]
pub fn read_network_u16(bytes: [u8; 2]) -> u16 {
    #[expect(
        clippy::big_endian_bytes,
        reason = "Network byte order requires big-endian bytes."
    )]
    u16::from_be_bytes(bytes)
}

/// Read a network-order `u16` starting at `offset`, if enough bytes remain.
///
/// # Examples
///
/// ```
/// use chatlens::byte_order::read_network_u16_at;
///
/// assert_eq!(read_network_u16_at(&[0xff, 0x00, 0x05], 1), Some(5));
/// assert_eq!(read_network_u16_at(&[0x00], 0), None);
/// ```
#[must_use]
pub fn read_network_u16_at(bytes: &[u8], offset: usize) -> Option<u16> {
    let end = offset.checked_add(2)?;
    let pair = bytes.get(offset..end)?;
    <[u8; 2]>::try_from(pair).ok().map(read_network_u16)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{read_network_u16, read_network_u16_at, write_network_u16};

    #[rstest]
    #[case(0x0000, [0x00, 0x00])]
    #[case(0x0005, [0x00, 0x05])]
    #[case(0x5000, [0x50, 0x00])]
    #[case(0xffff, [0xff, 0xff])]
    fn u16_matches_wire_layout(#[case] value: u16, #[case] wire: [u8; 2]) {
        assert_eq!(write_network_u16(value), wire);
        assert_eq!(read_network_u16(wire), value);
    }

    #[test]
    fn offset_read_rejects_short_input() {
        assert_eq!(read_network_u16_at(&[0x12, 0x34], 1), None);
        assert_eq!(read_network_u16_at(&[0x12, 0x34], usize::MAX), None);
        assert_eq!(read_network_u16_at(&[0x12, 0x34], 0), Some(0x1234));
    }
}
