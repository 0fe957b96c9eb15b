// src/io/mod.rs
//
// I/O layer for the line monitor. The serial loops are blocking code run on
// a dedicated thread; they report back to the async side through a channel
// of MonitorEvents and are stopped by a shared cancel flag.

mod error;
pub mod serial;

pub use error::IoError;

/// Message from the blocking monitor loop to the printing task.
#[derive(Debug, PartialEq)]
pub enum MonitorEvent {
    /// A complete line received from the peer, UTF-8 decoded and trimmed.
    Line(String),
    /// A fatal loop error (read/write/decode). The loop ends after sending this.
    Error(String),
    /// The loop finished: "stopped", "disconnected", or "error".
    Ended(&'static str),
}
