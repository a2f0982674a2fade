//! Tests for header stripping, filtering and the capture loop.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddrV4};

use bytes::Bytes;
use rstest::rstest;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{
    CaptureError,
    CaptureFilter,
    LinkType,
    PacketSource,
    PortRange,
    Segment,
    parse_packet,
    run_capture,
};
use crate::{
    byte_order::write_network_u16,
    flow::ConnectionKey,
    test_helpers::{ReplaySource, ethernet_tcp_packet, game_endpoints},
};

fn strip_ethernet(packet: &[u8]) -> &[u8] { &packet[14..] }

#[test]
fn strips_ethernet_ipv4_tcp() {
    let (server, client) = game_endpoints();
    let packet = ethernet_tcp_packet(server, client, b"payload");
    let segment = parse_packet(LinkType::Ethernet, &packet).expect("tcp segment");
    assert_eq!(segment.payload, b"payload");
    assert_eq!(segment.key.src_addr, IpAddr::V4(*server.ip()));
    assert_eq!(segment.key.dst_port, client.port());
}

#[test]
fn strips_vlan_tag() {
    let (server, client) = game_endpoints();
    let plain = ethernet_tcp_packet(server, client, b"tagged");
    let mut tagged = plain[..12].to_vec();
    tagged.extend_from_slice(&write_network_u16(0x8100));
    tagged.extend_from_slice(&[0x00, 0x2A]);
    tagged.extend_from_slice(&plain[12..]);

    let segment = parse_packet(LinkType::Ethernet, &tagged).expect("tcp segment");
    assert_eq!(segment.payload, b"tagged");
}

#[test]
fn raw_ip_and_loopback_share_the_ip_parser() {
    let (server, client) = game_endpoints();
    let packet = ethernet_tcp_packet(server, client, b"x");
    let ip = strip_ethernet(&packet);
    assert_eq!(
        parse_packet(LinkType::RawIp, ip).map(|s| s.payload),
        Some(&b"x"[..])
    );

    let mut looped = vec![2, 0, 0, 0];
    looped.extend_from_slice(ip);
    assert_eq!(
        parse_packet(LinkType::Loopback, &looped).map(|s| s.payload),
        Some(&b"x"[..])
    );
}

#[test]
fn ethernet_padding_is_not_payload() {
    let (server, client) = game_endpoints();
    let mut packet = ethernet_tcp_packet(server, client, b"");
    packet.extend_from_slice(&[0; 6]);
    let segment = parse_packet(LinkType::Ethernet, &packet).expect("tcp segment");
    assert!(segment.payload.is_empty());
}

#[test]
fn strips_ipv6_tcp() {
    let src = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1);
    let dst = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 2);
    let payload = b"v6";
    let mut packet = vec![0x60, 0, 0, 0];
    packet.extend_from_slice(&write_network_u16(20 + 2));
    packet.extend_from_slice(&[6, 64]);
    packet.extend_from_slice(&src.octets());
    packet.extend_from_slice(&dst.octets());
    packet.extend_from_slice(&write_network_u16(11001));
    packet.extend_from_slice(&write_network_u16(40000));
    packet.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0, 0x50, 0x18, 0xff, 0xff, 0, 0, 0, 0]);
    packet.extend_from_slice(payload);

    let segment = parse_packet(LinkType::RawIp, &packet).expect("tcp segment");
    assert_eq!(segment.payload, payload);
    assert_eq!(segment.key.dst_addr, IpAddr::V6(dst));
    assert_eq!(segment.key.src_port, 11001);
}

#[rstest]
#[case::udp(17)]
#[case::icmp(1)]
fn non_tcp_is_rejected(#[case] protocol: u8) {
    let (server, client) = game_endpoints();
    let mut packet = ethernet_tcp_packet(server, client, b"x");
    packet[14 + 9] = protocol;
    assert!(parse_packet(LinkType::Ethernet, &packet).is_none());
}

#[test]
fn truncated_packet_is_rejected() {
    let (server, client) = game_endpoints();
    let packet = ethernet_tcp_packet(server, client, b"x");
    assert!(parse_packet(LinkType::Ethernet, &packet[..30]).is_none());
}

fn key(src_port: u16, dst_port: u16) -> ConnectionKey {
    ConnectionKey {
        src_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
        dst_addr: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
        src_port,
        dst_port,
    }
}

#[rstest]
#[case::server_side(11002, 50000, true)]
#[case::client_side(50000, 11003, true)]
#[case::outside(50000, 443, false)]
fn default_filter_matches_either_port(#[case] src: u16, #[case] dst: u16, #[case] keep: bool) {
    assert_eq!(CaptureFilter::default().matches(&key(src, dst)), keep);
}

#[test]
fn host_filter_matches_either_endpoint() {
    let filter = CaptureFilter {
        host: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))),
        ports: None,
    };
    assert!(filter.matches(&key(1, 2)));
    assert!(filter.matches(&key(1, 2).reversed()));
    let other = CaptureFilter {
        host: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9))),
        ports: None,
    };
    assert!(!other.matches(&key(1, 2)));
}

#[rstest]
#[case::any(CaptureFilter::any(), None, "tcp")]
#[case::host_and_ports(
    CaptureFilter {
        host: Some(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7))),
        ports: Some(PortRange { min: 11001, max: 11003 }),
    },
    None,
    "tcp and host 203.0.113.7 and portrange 11001-11003"
)]
#[case::user_expr(CaptureFilter::any(), Some("not port 22"), "(tcp) and (not port 22)")]
#[case::blank_user_expr(CaptureFilter::any(), Some("  "), "tcp")]
fn builds_bpf_expression(
    #[case] filter: CaptureFilter,
    #[case] extra: Option<&str>,
    #[case] expected: &str,
) {
    assert_eq!(filter.bpf_expression(extra), expected);
}

#[rstest]
#[case("11001-11003", Some(PortRange { min: 11001, max: 11003 }))]
#[case("8080", Some(PortRange { min: 8080, max: 8080 }))]
#[case(" 1 - 2 ", Some(PortRange { min: 1, max: 2 }))]
#[case("9-1", None)]
#[case("a-b", None)]
#[case("70000", None)]
fn parses_port_ranges(#[case] input: &str, #[case] expected: Option<PortRange>) {
    assert_eq!(input.parse::<PortRange>().ok(), expected);
}

#[test]
fn capture_loop_forwards_matching_payloads() {
    let (server, client) = game_endpoints();
    let elsewhere = SocketAddrV4::new(Ipv4Addr::new(198, 51, 100, 1), 443);
    let mut source = ReplaySource::new([
        ethernet_tcp_packet(server, client, b"one"),
        ethernet_tcp_packet(elsewhere, client, b"filtered"),
        ethernet_tcp_packet(client, server, b""),
        vec![0u8; 10],
        ethernet_tcp_packet(client, server, b"two"),
    ]);
    let (tx, mut rx) = mpsc::channel(8);

    let stats = run_capture(
        &mut source,
        &CaptureFilter::default(),
        &tx,
        &CancellationToken::new(),
    )
    .expect("capture loop");

    assert_eq!(stats.packets, 5);
    assert_eq!(stats.segments, 2);
    assert_eq!(stats.ignored, 3);
    let first: Segment = rx.try_recv().expect("first segment");
    assert_eq!(first.payload, Bytes::from_static(b"one"));
    let second = rx.try_recv().expect("second segment");
    assert_eq!(second.payload, Bytes::from_static(b"two"));
    assert_eq!(second.key, first.key.reversed());
}

struct FailingSource;

impl PacketSource for FailingSource {
    fn link_type(&self) -> LinkType { LinkType::Ethernet }

    fn next_packet(&mut self) -> Result<Option<Bytes>, CaptureError> {
        Err(CaptureError::Io(std::io::Error::other("device gone")))
    }
}

#[test]
fn capture_loop_surfaces_source_errors() {
    let (tx, _rx) = mpsc::channel(1);
    let err = run_capture(
        &mut FailingSource,
        &CaptureFilter::default(),
        &tx,
        &CancellationToken::new(),
    )
    .expect_err("source error");
    assert!(matches!(err, CaptureError::Io(_)));
}

#[test]
fn capture_loop_stops_when_cancelled() {
    let (server, client) = game_endpoints();
    let mut source = ReplaySource::new([ethernet_tcp_packet(server, client, b"late")]);
    let (tx, mut rx) = mpsc::channel(1);
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let stats = run_capture(&mut source, &CaptureFilter::default(), &tx, &shutdown)
        .expect("capture loop");
    assert_eq!(stats, super::CaptureStats::default());
    assert!(rx.try_recv().is_err());
}
