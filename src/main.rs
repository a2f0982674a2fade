//! `chatlens` binary: capture, translate and display in-game chat.

mod cli;

use std::sync::Arc;

use chatlens::{
    capture::{self, CaptureFilter, LiveOptions, PortRange},
    config::Config,
    display::{DisplaySink, TerminalSink},
    monitor::{Monitor, MonitorConfig},
    translate::{TranslationRouter, http_client},
};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), chatlens::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    let config = Config::load_or_default(&cli.config);

    #[cfg(feature = "metrics")]
    if let Some(addr) = cli.metrics_addr {
        chatlens::metrics::install_exporter(addr)?;
    }

    let ports = if cli.any_port {
        None
    } else {
        Some(cli.ports.parse::<PortRange>()?)
    };
    let filter = CaptureFilter {
        host: cli.host,
        ports,
    };
    let options = LiveOptions {
        interface: cli.interface.clone(),
        promiscuous: cli.promisc,
        bpf: filter.bpf_expression(cli.bpf.as_deref()),
    };
    let (source, interface) = capture::open_live(&options)?;

    let client = http_client()?;
    let router = Arc::new(TranslationRouter::from_config(&config.translation(), &client)?);
    let decoder = chatlens::frame::FrameDecoder::new(config.registry()?);
    let sink: Arc<dyn DisplaySink> = Arc::new(TerminalSink::stdout());
    if let Err(err) = sink.append(&format!("Started, listening on adapter: {interface}")) {
        warn!(error = %err, "display unavailable");
    }

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("shutting down");
                    shutdown.cancel();
                }
                Err(err) => warn!(error = %err, "failed to listen for ctrl-c"),
            }
        }
    });

    let monitor = Monitor::new(
        decoder,
        MonitorConfig {
            filter,
            flow: config.flow(),
            pipeline: config.pipeline(),
            ..MonitorConfig::default()
        },
    );
    let report = monitor.run(source, router, sink, shutdown).await?;
    info!(
        packets = report.capture.packets,
        submitted = report.submitted,
        "capture finished"
    );
    Ok(())
}
