//! Utilities for driving a [`Monitor`](chatlens::Monitor) over replayed
//! packets during tests.
//!
//! ```rust
//! use chatlens_testing::{chat_frame, drive_packets, server_packet};
//!
//! # async fn example() {
//! let lines = drive_packets([server_packet(&chat_frame("Bob", "hi"))]).await;
//! assert_eq!(lines, ["Bob>>>hi"]);
//! # }
//! ```

pub mod helpers;

pub use chatlens::test_helpers::*;
pub use helpers::{
    client_packet,
    drive_monitor,
    drive_packets,
    passthrough_router,
    router_with,
    server_packet,
};
