// src/main.rs
//
// linetap - serial line monitor.
// `listen` prints every newline-terminated line a peer sends; `echo`
// periodically sends a fixed payload and prints the replies; `ports` lists
// the serial devices on this machine.

#[macro_use]
mod logging;
mod io;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;

use crate::io::serial::{self, EchoConfig, Parity, SerialConfig};
use crate::io::MonitorEvent;

#[derive(Parser)]
#[command(name = "linetap", version, about = "Exchange newline-delimited text with a serial device")]
struct Cli {
    /// Tee diagnostic output to this file in addition to stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every line the peer sends until interrupted
    Listen(ConnectArgs),
    /// Periodically send a fixed payload and print the replies
    Echo {
        #[command(flatten)]
        connect: ConnectArgs,
        /// Line to send each interval (a newline is appended)
        #[arg(long, default_value = "thunder")]
        payload: String,
        /// Milliseconds between sends
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        /// Milliseconds to wait for the peer's reply after each send
        #[arg(long, default_value_t = 100)]
        response_delay_ms: u64,
    },
    /// List available serial ports
    Ports,
}

#[derive(Args)]
struct ConnectArgs {
    /// Serial port path (e.g. /dev/ttyUSB0, COM6)
    #[arg(short, long)]
    port: String,
    /// Baud rate
    #[arg(short, long, default_value_t = 115_200)]
    baud: u32,
    /// Data bits (5-8)
    #[arg(long, default_value_t = 8)]
    data_bits: u8,
    /// Stop bits (1 or 2)
    #[arg(long, default_value_t = 1)]
    stop_bits: u8,
    #[arg(long, value_enum, default_value = "none")]
    parity: Parity,
    /// Read timeout in milliseconds
    #[arg(long, default_value_t = 50)]
    timeout_ms: u64,
}

impl ConnectArgs {
    fn into_config(self) -> SerialConfig {
        SerialConfig {
            port: self.port,
            baud_rate: self.baud,
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
            parity: self.parity,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Some(ref path) = cli.log_file {
        if let Err(e) = logging::init_file_logging(path) {
            tlog!("[linetap] {}", e);
        }
    }

    let code = match run(cli.command).await {
        Ok(()) => 0,
        Err(e) => {
            tlog!("[linetap] {}", e);
            1
        }
    };
    std::process::exit(code);
}

async fn run(command: Command) -> Result<(), String> {
    match command {
        Command::Listen(connect) => run_monitor(connect.into_config(), None).await,
        Command::Echo {
            connect,
            payload,
            interval_ms,
            response_delay_ms,
        } => {
            let echo = EchoConfig {
                payload,
                response_delay: Duration::from_millis(response_delay_ms),
                interval: Duration::from_millis(interval_ms),
            };
            run_monitor(connect.into_config(), Some(echo)).await
        }
        Command::Ports => print_ports(),
    }
}

/// Open the port, run the blocking loop on a dedicated thread, and print the
/// events it emits. Ctrl-C sets the cancel flag; the loop then winds down,
/// drops the port, and reports Ended, at which point we return.
async fn run_monitor(config: SerialConfig, echo: Option<EchoConfig>) -> Result<(), String> {
    let port = serial::open_port(&config).map_err(String::from)?;

    println!("Listening on {}...", config.port);

    let label = if echo.is_some() { "MCU replied" } else { "Received" };
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let (tx, mut rx) = mpsc::channel::<MonitorEvent>(64);

    let loop_flag = cancel_flag.clone();
    let port_name = config.port.clone();
    let handle = tokio::task::spawn_blocking(move || match echo {
        Some(echo) => serial::run_echo_loop(port, &port_name, &echo, loop_flag, tx),
        None => serial::run_listen_loop(port, &port_name, loop_flag, tx),
    });

    let signal_flag = cancel_flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("Stopped by user.");
            signal_flag.store(true, Ordering::Relaxed);
        }
    });

    let mut reason = "stopped";
    while let Some(event) = rx.recv().await {
        match event {
            MonitorEvent::Line(line) => println!("{}: {}", label, line),
            MonitorEvent::Error(msg) => tlog!("[monitor] {}", msg),
            MonitorEvent::Ended(r) => {
                reason = r;
                break;
            }
        }
    }

    if handle.await.is_err() {
        return Err("serial loop panicked".to_string());
    }

    match reason {
        "stopped" => Ok(()),
        "disconnected" => {
            tlog!("[monitor] {} disconnected", config.port);
            Ok(())
        }
        _ => Err(format!("serial loop on {} ended with an error", config.port)),
    }
}

fn print_ports() -> Result<(), String> {
    let ports = serial::list_serial_ports()?;
    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }

    for p in ports {
        let mut details = vec![p.port_type.clone()];
        if let (Some(vid), Some(pid)) = (p.vid, p.pid) {
            details.push(format!("{:04x}:{:04x}", vid, pid));
        }
        if let Some(m) = p.manufacturer {
            details.push(m);
        }
        if let Some(prod) = p.product {
            details.push(prod);
        }
        if let Some(sn) = p.serial_number {
            details.push(format!("sn {}", sn));
        }
        println!("{}  [{}]", p.port_name, details.join(", "));
    }
    Ok(())
}
