//! Replay helpers wrapping [`Monitor::run`](chatlens::Monitor::run).

use std::{sync::Arc, time::Duration};

use chatlens::{
    CaptureFilter,
    Monitor,
    MonitorConfig,
    TranslationRouter,
    Translator,
    frame::FrameDecoder,
    monitor::MonitorReport,
    test_helpers::{RecordingSink, ReplaySource, ethernet_tcp_packet, game_endpoints},
    translate::{ProviderKind, ProviderSpec},
};
use tokio_util::sync::CancellationToken;

/// Packet carrying `payload` from the game server to the client.
#[must_use]
pub fn server_packet(payload: &[u8]) -> Vec<u8> {
    let (server, client) = game_endpoints();
    ethernet_tcp_packet(server, client, payload)
}

/// Packet carrying `payload` from the client to the game server.
#[must_use]
pub fn client_packet(payload: &[u8]) -> Vec<u8> {
    let (server, client) = game_endpoints();
    ethernet_tcp_packet(client, server, payload)
}

/// Router with no providers: every message passes through unchanged.
#[must_use]
pub fn passthrough_router() -> Arc<TranslationRouter> {
    Arc::new(
        TranslationRouter::builder()
            .build()
            .expect("empty router is valid"),
    )
}

/// Router trying `providers` in order, each with `timeout`.
#[must_use]
pub fn router_with<'a, I, T>(providers: I, timeout: Duration) -> Arc<TranslationRouter>
where
    I: IntoIterator<Item = (&'a str, T)>,
    T: Translator + 'static,
{
    let builder = providers
        .into_iter()
        .fold(TranslationRouter::builder(), |builder, (name, backend)| {
            builder.provider(
                ProviderSpec::new(ProviderKind::Custom, name, timeout),
                Arc::new(backend),
            )
        });
    Arc::new(builder.build().expect("valid router"))
}

/// Run a monitor over `packets` until the source is exhausted.
///
/// Returns the report and every line the display received.
pub async fn drive_monitor<I, P>(
    packets: I,
    router: Arc<TranslationRouter>,
    config: MonitorConfig,
) -> (MonitorReport, Vec<String>)
where
    I: IntoIterator<Item = P>,
    P: Into<bytes::Bytes>,
{
    let sink = RecordingSink::default();
    let report = Monitor::new(FrameDecoder::default(), config)
        .run(
            ReplaySource::new(packets),
            router,
            Arc::new(sink.clone()),
            CancellationToken::new(),
        )
        .await
        .expect("monitor run");
    (report, sink.lines())
}

/// Replay `packets` through a pass-through monitor on the default ports.
pub async fn drive_packets<I, P>(packets: I) -> Vec<String>
where
    I: IntoIterator<Item = P>,
    P: Into<bytes::Bytes>,
{
    let config = MonitorConfig {
        filter: CaptureFilter::default(),
        ..MonitorConfig::default()
    };
    drive_monitor(packets, passthrough_router(), config).await.1
}
