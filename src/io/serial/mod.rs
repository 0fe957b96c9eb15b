// src/io/serial/mod.rs
//
// Serial line monitor: port configuration, the listen/echo loops, and
// newline framing of the received byte stream.

pub mod line;
pub mod monitor;
pub mod utils;

pub use monitor::{
    list_serial_ports, open_port, run_echo_loop, run_listen_loop, EchoConfig, SerialConfig,
};
pub use utils::Parity;
