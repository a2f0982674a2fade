//! Command line interface for the `chatlens` binary.
//!
//! Kept free of crate types so the build script can render a man page from
//! it.

use std::{net::IpAddr, path::PathBuf};

use clap::Parser;

/// Command line arguments for the `chatlens` binary.
#[derive(Debug, Parser)]
#[command(
    name = "chatlens",
    version,
    about = "Show in-game chat from the wire, translated, in arrival order",
    after_help = "Live capture needs libpcap and a build with `--features capture`; \
                  without it the binary exits with an unsupported-capture error."
)]
pub struct Cli {
    /// JSON configuration file.
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Capture interface; discovered from the default route when omitted.
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Only keep traffic to or from this address.
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Inclusive TCP port range, as `MIN-MAX` or a single port.
    #[arg(short, long, default_value = "11001-11003")]
    pub ports: String,

    /// Watch every TCP port, ignoring `--ports`.
    #[arg(long, conflicts_with = "ports")]
    pub any_port: bool,

    /// Extra BPF expression ANDed with the generated filter.
    #[arg(long)]
    pub bpf: Option<String>,

    /// Put the interface into promiscuous mode.
    #[arg(long)]
    pub promisc: bool,

    /// Serve Prometheus metrics on this address.
    #[cfg(feature = "metrics")]
    #[arg(long)]
    pub metrics_addr: Option<std::net::SocketAddr>,
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use clap::{CommandFactory, Parser};

    use super::Cli;

    #[test]
    fn defaults_match_the_game_ports() {
        let cli = Cli::parse_from(["chatlens"]);
        assert_eq!(cli.config.to_str(), Some("config.json"));
        assert_eq!(cli.ports, "11001-11003");
        assert!(!cli.any_port);
        assert!(!cli.promisc);
    }

    #[test]
    fn parses_filter_options() {
        let cli = Cli::parse_from([
            "chatlens",
            "--interface",
            "eth0",
            "--host",
            "203.0.113.7",
            "--ports",
            "7000-7001",
            "--bpf",
            "not port 22",
            "--promisc",
        ]);
        assert_eq!(cli.interface.as_deref(), Some("eth0"));
        assert_eq!(cli.host, Some(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7))));
        assert_eq!(cli.ports, "7000-7001");
        assert_eq!(cli.bpf.as_deref(), Some("not port 22"));
        assert!(cli.promisc);
    }

    #[test]
    fn any_port_conflicts_with_explicit_ports() {
        assert!(Cli::try_parse_from(["chatlens", "--any-port", "--ports", "1-2"]).is_err());
    }

    #[test]
    fn help_mentions_capture_feature() {
        let help = Cli::command().render_long_help().to_string();
        assert!(help.contains("--features capture"));
    }
}
