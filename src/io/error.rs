// src/io/error.rs
//
// Typed errors for the serial I/O paths. Each variant carries the device
// identifier it relates to so log lines and CLI errors name the port.

use std::fmt;

#[derive(Clone, Debug)]
pub enum IoError {
    /// Opening the device failed (missing, busy, bad parameters).
    Connection { device: String, message: String },
    /// A read from an open device failed.
    Read { device: String, message: String },
    /// A write to an open device failed.
    Write { device: String, message: String },
    /// Received bytes were not valid UTF-8.
    Decode { device: String, message: String },
}

impl IoError {
    pub fn connection(device: &str, message: impl Into<String>) -> Self {
        IoError::Connection {
            device: device.to_string(),
            message: message.into(),
        }
    }

    pub fn read(device: &str, message: impl Into<String>) -> Self {
        IoError::Read {
            device: device.to_string(),
            message: message.into(),
        }
    }

    pub fn write(device: &str, message: impl Into<String>) -> Self {
        IoError::Write {
            device: device.to_string(),
            message: message.into(),
        }
    }

    pub fn decode(device: &str, message: impl Into<String>) -> Self {
        IoError::Decode {
            device: device.to_string(),
            message: message.into(),
        }
    }

    /// The device identifier this error relates to.
    #[allow(dead_code)]
    pub fn device(&self) -> &str {
        match self {
            IoError::Connection { device, .. }
            | IoError::Read { device, .. }
            | IoError::Write { device, .. }
            | IoError::Decode { device, .. } => device,
        }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoError::Connection { device, message } => {
                write!(f, "Failed to open {}: {}", device, message)
            }
            IoError::Read { device, message } => {
                write!(f, "Read error on {}: {}", device, message)
            }
            IoError::Write { device, message } => {
                write!(f, "Write error on {}: {}", device, message)
            }
            IoError::Decode { device, message } => {
                write!(f, "Decode error on {}: {}", device, message)
            }
        }
    }
}

impl std::error::Error for IoError {}

impl From<IoError> for String {
    fn from(e: IoError) -> String {
        e.to_string()
    }
}
