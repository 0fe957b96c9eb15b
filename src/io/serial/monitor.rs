// src/io/serial/monitor.rs
//
// The listen/echo loops. Both are blocking and meant to run on a dedicated
// thread (tokio::task::spawn_blocking); they emit MonitorEvents through a
// channel and honor a shared cancel flag at every iteration boundary and
// inside every pause. The port is owned by the loop and released by drop on
// every exit path, so it is closed exactly once however the loop ends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc;

use super::line::LineFramer;
use super::utils::{self, Parity};
use crate::io::{IoError, MonitorEvent};

// ============================================================================
// Configuration
// ============================================================================

/// Serial connection parameters
#[derive(Clone, Debug)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0", "COM6")
    pub port: String,
    /// Serial baud rate (typically 115200)
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
    /// Read timeout - bounds every blocking read so cancellation stays responsive
    pub timeout: Duration,
}

/// Echo-mode payload and timing
#[derive(Clone, Debug)]
pub struct EchoConfig {
    /// Line sent each interval (a newline is appended on the wire)
    pub payload: String,
    /// Pause after each send to give the peer time to reply
    pub response_delay: Duration,
    /// Pause between iterations
    pub interval: Duration,
}

// ============================================================================
// Port Abstraction
// ============================================================================

/// The serial primitives the monitor loops consume. Production code uses the
/// opened `Box<dyn serialport::SerialPort>`; tests drive the loops with a
/// scripted mock. Closing is the owner dropping the port.
pub trait LinePort: Send {
    /// Number of bytes buffered and readable without blocking.
    fn bytes_to_read(&mut self) -> std::io::Result<u32>;
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
    fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()>;
    fn flush(&mut self) -> std::io::Result<()>;
}

impl LinePort for Box<dyn serialport::SerialPort> {
    fn bytes_to_read(&mut self) -> std::io::Result<u32> {
        (**self)
            .bytes_to_read()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    }

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        std::io::Read::read(&mut **self, buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        std::io::Write::write_all(&mut **self, bytes)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::Write::flush(&mut **self)
    }
}

/// Open the configured serial port. Failure is fatal to the caller; nothing
/// is retried here.
pub fn open_port(config: &SerialConfig) -> Result<Box<dyn serialport::SerialPort>, IoError> {
    let port = serialport::new(&config.port, config.baud_rate)
        .data_bits(utils::to_serialport_data_bits(config.data_bits))
        .stop_bits(utils::to_serialport_stop_bits(config.stop_bits))
        .parity(utils::to_serialport_parity(config.parity))
        .timeout(config.timeout)
        .open()
        .map_err(|e| IoError::connection(&config.port, e.to_string()))?;

    tlog!(
        "[monitor] Opened {} at {} baud ({}-{}-{}, timeout {:?})",
        config.port,
        config.baud_rate,
        config.data_bits,
        match config.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
        },
        config.stop_bits,
        config.timeout
    );

    Ok(port)
}

// ============================================================================
// Loops
// ============================================================================

/// Blocking listen loop: print every newline-terminated line the peer sends.
/// Runs until the cancel flag is set, the port disconnects, or a fault.
pub fn run_listen_loop(
    mut port: impl LinePort,
    port_name: &str,
    cancel_flag: Arc<AtomicBool>,
    tx: mpsc::Sender<MonitorEvent>,
) {
    let mut framer = LineFramer::new();
    let mut buf = [0u8; 256];
    let reason;

    loop {
        if cancel_flag.load(Ordering::Relaxed) {
            reason = "stopped";
            break;
        }

        // The port's read timeout bounds this call, so the flag check above
        // is never starved for longer than the configured timeout.
        match port.read(&mut buf) {
            Ok(n) if n > 0 => {
                if let Err(e) = emit_lines(&mut framer, &buf[..n], port_name, &tx) {
                    let _ = tx.blocking_send(MonitorEvent::Error(e.to_string()));
                    reason = "error";
                    break;
                }
            }
            Ok(_) => {
                // EOF - port closed/disconnected
                reason = "disconnected";
                break;
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                // Timeout is expected for serial reads
            }
            Err(e) => {
                let _ = tx.blocking_send(MonitorEvent::Error(
                    IoError::read(port_name, e.to_string()).to_string(),
                ));
                reason = "error";
                break;
            }
        }
    }

    finish(framer, reason, &tx);
}

/// Blocking echo loop: each iteration writes the fixed payload, waits briefly
/// for the peer's reply, prints any waiting line, then idles until the next
/// send. Runs until the cancel flag is set or a fault.
pub fn run_echo_loop(
    mut port: impl LinePort,
    port_name: &str,
    echo: &EchoConfig,
    cancel_flag: Arc<AtomicBool>,
    tx: mpsc::Sender<MonitorEvent>,
) {
    let mut framer = LineFramer::new();
    let mut buf = [0u8; 256];
    let mut payload = echo.payload.clone().into_bytes();
    payload.push(b'\n');
    let reason;

    loop {
        if cancel_flag.load(Ordering::Relaxed) {
            reason = "stopped";
            break;
        }

        // 1. Send the payload
        if let Err(e) = port.write_all(&payload).and_then(|_| port.flush()) {
            let _ = tx.blocking_send(MonitorEvent::Error(
                IoError::write(port_name, e.to_string()).to_string(),
            ));
            reason = "error";
            break;
        }

        // 2. Give the peer time to reply
        if !pause(&cancel_flag, echo.response_delay) {
            reason = "stopped";
            break;
        }

        // 3. Read the reply if bytes are waiting
        match port.bytes_to_read() {
            Ok(0) => {}
            Ok(_) => match port.read(&mut buf) {
                Ok(n) if n > 0 => {
                    if let Err(e) = emit_lines(&mut framer, &buf[..n], port_name, &tx) {
                        let _ = tx.blocking_send(MonitorEvent::Error(e.to_string()));
                        reason = "error";
                        break;
                    }
                }
                Ok(_) => {}
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => {
                    let _ = tx.blocking_send(MonitorEvent::Error(
                        IoError::read(port_name, e.to_string()).to_string(),
                    ));
                    reason = "error";
                    break;
                }
            },
            Err(e) => {
                let _ = tx.blocking_send(MonitorEvent::Error(
                    IoError::read(port_name, e.to_string()).to_string(),
                ));
                reason = "error";
                break;
            }
        }

        // 4. Idle until the next send
        if !pause(&cancel_flag, echo.interval) {
            reason = "stopped";
            break;
        }
    }

    finish(framer, reason, &tx);
}

/// Feed received bytes through the framer and emit a trimmed Line event for
/// each completed line. Non-UTF-8 payload is fatal (no recovery).
fn emit_lines(
    framer: &mut LineFramer,
    bytes: &[u8],
    port_name: &str,
    tx: &mpsc::Sender<MonitorEvent>,
) -> Result<(), IoError> {
    for frame in framer.feed(bytes) {
        let text = String::from_utf8(frame.bytes)
            .map_err(|e| IoError::decode(port_name, e.to_string()))?;
        let _ = tx.blocking_send(MonitorEvent::Line(text.trim().to_string()));
    }
    Ok(())
}

/// Flush any pending partial line, then report how the loop ended.
/// The caller's port binding goes out of scope right after this returns,
/// which is the one and only close.
fn finish(mut framer: LineFramer, reason: &'static str, tx: &mpsc::Sender<MonitorEvent>) {
    if let Some(frame) = framer.flush() {
        if let Ok(text) = String::from_utf8(frame.bytes) {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                let _ = tx.blocking_send(MonitorEvent::Line(trimmed.to_string()));
            }
        }
    }
    let _ = tx.blocking_send(MonitorEvent::Ended(reason));
}

/// Sleep for `total`, waking early when the cancel flag is set.
/// Returns false if cancelled.
fn pause(cancel_flag: &AtomicBool, total: Duration) -> bool {
    const SLICE: Duration = Duration::from_millis(20);
    let deadline = Instant::now() + total;

    loop {
        if cancel_flag.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(SLICE.min(deadline - now));
    }
}

// ============================================================================
// Port Listing
// ============================================================================

/// Information about an available serial port
#[derive(Clone, Debug, Serialize)]
pub struct SerialPortInfo {
    pub port_name: String,
    pub port_type: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

/// List available serial ports.
///
/// On macOS, filters out /dev/tty.* devices and only shows /dev/cu.* devices.
/// The cu (calling unit) devices are non-blocking and preferred for outgoing
/// connections; the tty devices block on open waiting for carrier detect.
pub fn list_serial_ports() -> Result<Vec<SerialPortInfo>, String> {
    let ports =
        serialport::available_ports().map_err(|e| format!("Failed to enumerate ports: {}", e))?;

    Ok(ports
        .into_iter()
        .filter(|_p| {
            #[cfg(target_os = "macos")]
            {
                !_p.port_name.starts_with("/dev/tty.")
            }
            #[cfg(not(target_os = "macos"))]
            {
                true
            }
        })
        .map(|p| {
            let (port_type, manufacturer, product, serial_number, vid, pid) = match p.port_type {
                serialport::SerialPortType::UsbPort(info) => (
                    "USB".to_string(),
                    info.manufacturer,
                    info.product,
                    info.serial_number,
                    Some(info.vid),
                    Some(info.pid),
                ),
                serialport::SerialPortType::BluetoothPort => {
                    ("Bluetooth".to_string(), None, None, None, None, None)
                }
                serialport::SerialPortType::PciPort => {
                    ("PCI".to_string(), None, None, None, None, None)
                }
                serialport::SerialPortType::Unknown => {
                    ("Unknown".to_string(), None, None, None, None, None)
                }
            };
            SerialPortInfo {
                port_name: p.port_name,
                port_type,
                manufacturer,
                product,
                serial_number,
                vid,
                pid,
            }
        })
        .collect())
}

// ============================================================================
// Tests
// ============================================================================
