#![doc(html_root_url = "https://docs.rs/chatlens/latest")]
//! Public API for the `chatlens` library.
//!
//! This crate reconstructs a game's chat stream from passively captured TCP
//! traffic, translates each message through an ordered list of providers and
//! shows the results in the order they were seen on the wire.
//!
//! Live capture through libpcap is behind the `capture` feature, which is not
//! enabled by default. Without it [`capture::open_live`] returns
//! [`CaptureError::Unsupported`] and the `chatlens` binary exits at startup;
//! build with `cargo run --features capture` to sniff a real interface.

pub mod byte_order;
pub mod capture;
pub mod config;
pub mod display;
pub mod error;
pub mod flow;
pub mod frame;
pub mod metrics;
pub mod monitor;
pub mod pipeline;
pub mod protocol;
pub mod test_helpers;
pub mod translate;

pub use capture::{CaptureError, CaptureFilter, PacketSource};
pub use config::Config;
pub use display::{DisplaySink, TerminalSink};
pub use error::{Error, Result};
pub use flow::{ConnectionKey, FlowBufferStore};
pub use frame::{FrameDecoder, FrameError};
pub use monitor::{Monitor, MonitorConfig};
pub use pipeline::{OrderedPipeline, PipelineHandle};
pub use protocol::{DecodedMessage, MessageRegistry};
pub use translate::{ProviderError, TranslationRouter, Translator};
