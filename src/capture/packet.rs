//! Link, network and transport header stripping.
//!
//! Only what is needed to recover a TCP payload and its 4-tuple is parsed.
//! Anything else (non-TCP traffic, IPv4 fragments, truncated headers) is
//! rejected with `None`.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::{byte_order::read_network_u16_at, flow::ConnectionKey};

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86DD;
const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_QINQ: u16 = 0x88A8;

const ETHERNET_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;
const NULL_HEADER_LEN: usize = 4;
const SLL_HEADER_LEN: usize = 16;
const IPV6_HEADER_LEN: usize = 40;
const TCP_MIN_HEADER_LEN: usize = 20;

const IPPROTO_TCP: u8 = 6;
const IPV6_HOP_BY_HOP: u8 = 0;
const IPV6_ROUTING: u8 = 43;
const IPV6_DEST_OPTS: u8 = 60;

/// Link layer of captured packets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkType {
    /// Ethernet II, optionally 802.1Q/802.1ad tagged.
    Ethernet,
    /// Bare IPv4 or IPv6 packets.
    RawIp,
    /// BSD loopback with a 4-byte address-family header.
    Loopback,
    /// Linux "cooked" capture (`any` pseudo-device).
    LinuxCooked,
}

impl LinkType {
    /// Map a pcap `DLT_*` value.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatlens::capture::LinkType;
    ///
    /// assert_eq!(LinkType::from_dlt(1), Some(LinkType::Ethernet));
    /// assert_eq!(LinkType::from_dlt(147), None);
    /// ```
    #[must_use]
    pub fn from_dlt(dlt: i32) -> Option<Self> {
        match dlt {
            1 => Some(Self::Ethernet),
            12 | 14 | 101 => Some(Self::RawIp),
            0 | 108 => Some(Self::Loopback),
            113 => Some(Self::LinuxCooked),
            _ => None,
        }
    }
}

/// A TCP payload borrowed from a captured packet.
#[derive(Debug, PartialEq, Eq)]
pub struct TcpSegment<'a> {
    pub key: ConnectionKey,
    pub payload: &'a [u8],
}

/// Strip every header below TCP and return the payload with its flow key.
#[must_use]
pub fn parse_packet(link: LinkType, data: &[u8]) -> Option<TcpSegment<'_>> {
    match link {
        LinkType::Ethernet => parse_ethernet(data),
        LinkType::RawIp => parse_ip(data),
        LinkType::Loopback => parse_ip(data.get(NULL_HEADER_LEN..)?),
        LinkType::LinuxCooked => {
            let ethertype = read_network_u16_at(data, 14)?;
            parse_ethertype(ethertype, data.get(SLL_HEADER_LEN..)?)
        }
    }
}

fn parse_ethernet(data: &[u8]) -> Option<TcpSegment<'_>> {
    let mut offset = ETHERNET_HEADER_LEN - 2;
    let mut ethertype = read_network_u16_at(data, offset)?;
    while matches!(ethertype, ETHERTYPE_VLAN | ETHERTYPE_QINQ) {
        offset += VLAN_TAG_LEN;
        ethertype = read_network_u16_at(data, offset)?;
    }
    parse_ethertype(ethertype, data.get(offset + 2..)?)
}

fn parse_ethertype(ethertype: u16, data: &[u8]) -> Option<TcpSegment<'_>> {
    match ethertype {
        ETHERTYPE_IPV4 => parse_ipv4(data),
        ETHERTYPE_IPV6 => parse_ipv6(data),
        _ => None,
    }
}

fn parse_ip(data: &[u8]) -> Option<TcpSegment<'_>> {
    match data.first()? >> 4 {
        4 => parse_ipv4(data),
        6 => parse_ipv6(data),
        _ => None,
    }
}

fn parse_ipv4(data: &[u8]) -> Option<TcpSegment<'_>> {
    let version_ihl = *data.first()?;
    if version_ihl >> 4 != 4 {
        return None;
    }
    let header_len = usize::from(version_ihl & 0x0F) * 4;
    if header_len < 20 || data.len() < header_len {
        return None;
    }
    if data[9] != IPPROTO_TCP {
        return None;
    }
    // Only the first fragment carries the TCP header; reassembly of IP
    // fragments is not attempted.
    let flags_offset = read_network_u16_at(data, 6)?;
    if flags_offset & 0x3FFF != 0 {
        return None;
    }
    // Ethernet padding may follow the datagram.
    let total_len = usize::from(read_network_u16_at(data, 2)?);
    let end = if (header_len..=data.len()).contains(&total_len) {
        total_len
    } else {
        data.len()
    };
    let src = Ipv4Addr::new(data[12], data[13], data[14], data[15]);
    let dst = Ipv4Addr::new(data[16], data[17], data[18], data[19]);
    parse_tcp(src.into(), dst.into(), &data[header_len..end])
}

fn parse_ipv6(data: &[u8]) -> Option<TcpSegment<'_>> {
    if data.len() < IPV6_HEADER_LEN || data[0] >> 4 != 6 {
        return None;
    }
    let payload_len = usize::from(read_network_u16_at(data, 4)?);
    let end = (IPV6_HEADER_LEN + payload_len).min(data.len());
    let src = ipv6_at(data, 8)?;
    let dst = ipv6_at(data, 24)?;

    let mut next_header = data[6];
    let mut offset = IPV6_HEADER_LEN;
    while matches!(next_header, IPV6_HOP_BY_HOP | IPV6_ROUTING | IPV6_DEST_OPTS) {
        let ext = data.get(offset..offset + 2)?;
        next_header = ext[0];
        offset += (usize::from(ext[1]) + 1) * 8;
    }
    if next_header != IPPROTO_TCP {
        return None;
    }
    parse_tcp(src.into(), dst.into(), data.get(offset..end)?)
}

fn ipv6_at(data: &[u8], offset: usize) -> Option<Ipv6Addr> {
    let octets: [u8; 16] = data.get(offset..offset + 16)?.try_into().ok()?;
    Some(Ipv6Addr::from(octets))
}

fn parse_tcp(src: IpAddr, dst: IpAddr, data: &[u8]) -> Option<TcpSegment<'_>> {
    if data.len() < TCP_MIN_HEADER_LEN {
        return None;
    }
    let src_port = read_network_u16_at(data, 0)?;
    let dst_port = read_network_u16_at(data, 2)?;
    let header_len = usize::from(data[12] >> 4) * 4;
    if header_len < TCP_MIN_HEADER_LEN {
        return None;
    }
    Some(TcpSegment {
        key: ConnectionKey {
            src_addr: src,
            dst_addr: dst,
            src_port,
            dst_port,
        },
        payload: data.get(header_len..)?,
    })
}
