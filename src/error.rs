//! Custom error types for the CPE monitor
//!
//! This module defines the error taxonomy used across the polling core. Only
//! [`MonitorError`] and [`CycleError`] ever reach the host; transport and field
//! access failures are recovered inside their own component and logged.

use std::fmt;

/// Main error type for the CPE monitor application
#[derive(Debug)]
pub enum MonitorError {
    /// Error occurred while parsing address
    AddressParse(std::net::AddrParseError),

    /// Error occurred while running the server
    Server(std::io::Error),

    /// Error occurred while reading configuration file
    ConfigRead(std::io::Error),

    /// Error occurred while parsing configuration
    ConfigParse(json5::Error),

    /// Error occurred while building the HTTP client
    Http(reqwest::Error),

    /// Generic error with a message
    Generic(String),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::AddressParse(e) => {
                write!(f, "Failed to parse network address: {e}")
            }
            MonitorError::Server(e) => {
                write!(f, "Server runtime error: {e}")
            }
            MonitorError::ConfigRead(e) => {
                write!(f, "Failed to read configuration file: {e}")
            }
            MonitorError::ConfigParse(e) => {
                write!(f, "Failed to parse configuration: {e}")
            }
            MonitorError::Http(e) => {
                write!(f, "Failed to build HTTP client: {e}")
            }
            MonitorError::Generic(msg) => {
                write!(f, "Error: {msg}")
            }
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MonitorError::AddressParse(e) => Some(e),
            MonitorError::Server(e) | MonitorError::ConfigRead(e) => Some(e),
            MonitorError::ConfigParse(e) => Some(e),
            MonitorError::Http(e) => Some(e),
            MonitorError::Generic(_) => None,
        }
    }
}

impl From<std::net::AddrParseError> for MonitorError {
    fn from(error: std::net::AddrParseError) -> Self {
        MonitorError::AddressParse(error)
    }
}

impl From<std::io::Error> for MonitorError {
    fn from(error: std::io::Error) -> Self {
        MonitorError::ConfigRead(error)
    }
}

impl From<json5::Error> for MonitorError {
    fn from(error: json5::Error) -> Self {
        MonitorError::ConfigParse(error)
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(error: reqwest::Error) -> Self {
        MonitorError::Http(error)
    }
}

impl From<&str> for MonitorError {
    fn from(message: &str) -> Self {
        MonitorError::Generic(message.to_string())
    }
}

impl From<String> for MonitorError {
    fn from(message: String) -> Self {
        MonitorError::Generic(message)
    }
}

/// Result type alias using our custom error type
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Failure of a single request against the device API.
///
/// Every variant carries the endpoint path so a degraded snapshot entry can be
/// traced back to the call that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection refused, timeout, DNS failure and similar.
    Network { cause: String, endpoint: String },

    /// The device answered with an HTTP status other than the expected one.
    UnexpectedStatus { status: u16, endpoint: String },

    /// The body was not valid JSON.
    MalformedResponse { endpoint: String },

    /// The envelope `Status` field was not `"ok"`. Unsupported features answer
    /// this way, so it is an expected outcome rather than a fault.
    DeviceError { status: String, endpoint: String },
}

impl TransportError {
    /// The endpoint path the failed request targeted.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        match self {
            TransportError::Network { endpoint, .. }
            | TransportError::UnexpectedStatus { endpoint, .. }
            | TransportError::MalformedResponse { endpoint }
            | TransportError::DeviceError { endpoint, .. } => endpoint,
        }
    }

    /// Short machine-readable name of the failure class.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Network { .. } => "network_error",
            TransportError::UnexpectedStatus { .. } => "unexpected_status",
            TransportError::MalformedResponse { .. } => "malformed_response",
            TransportError::DeviceError { .. } => "device_error",
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Network { cause, endpoint } => {
                write!(f, "Network error for {endpoint}: {cause}")
            }
            TransportError::UnexpectedStatus { status, endpoint } => {
                write!(f, "Unexpected HTTP status {status} for {endpoint}")
            }
            TransportError::MalformedResponse { endpoint } => {
                write!(f, "Invalid JSON response from {endpoint}")
            }
            TransportError::DeviceError { status, endpoint } => {
                write!(f, "Device returned status '{status}' for {endpoint}")
            }
        }
    }
}

impl std::error::Error for TransportError {}

/// Reason a field path could not be resolved inside a JSON document.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldAccessError {
    /// An object did not contain the requested field.
    MissingKey { key: String, depth: usize },

    /// An array was shorter than the requested index.
    IndexOutOfRange {
        index: usize,
        len: usize,
        depth: usize,
    },

    /// The node at `depth` was not the kind the next key needs.
    WrongNodeKind {
        expected: &'static str,
        found: &'static str,
        depth: usize,
    },

    /// The value was found but the transform rejected it.
    Transform(String),
}

impl fmt::Display for FieldAccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldAccessError::MissingKey { key, depth } => {
                write!(f, "Missing key '{key}' at depth {depth}")
            }
            FieldAccessError::IndexOutOfRange { index, len, depth } => {
                write!(
                    f,
                    "Index {index} out of range for array of length {len} at depth {depth}"
                )
            }
            FieldAccessError::WrongNodeKind {
                expected,
                found,
                depth,
            } => {
                write!(f, "Expected {expected} but found {found} at depth {depth}")
            }
            FieldAccessError::Transform(msg) => {
                write!(f, "Transform failed: {msg}")
            }
        }
    }
}

impl std::error::Error for FieldAccessError {}

/// Failure of a whole polling cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleError {
    /// Every catalog source failed; the previous snapshot stays installed.
    AllSourcesFailed { failures: Vec<(String, TransportError)> },
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleError::AllSourcesFailed { failures } => {
                write!(f, "All {} sources failed", failures.len())?;
                if let Some((name, err)) = failures.first() {
                    write!(f, " (first: {name}: {err})")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for CycleError {}

/// Failure of a write command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandError {
    /// Arguments were missing or invalid; nothing was sent to the device.
    Validation(String),

    /// The command name is not one the dispatcher knows.
    UnknownCommand(String),

    /// The device request failed.
    Transport(TransportError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Validation(msg) => write!(f, "Invalid command arguments: {msg}"),
            CommandError::UnknownCommand(name) => write!(f, "Unknown command: {name}"),
            CommandError::Transport(e) => write!(f, "Command failed: {e}"),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for CommandError {
    fn from(error: TransportError) -> Self {
        CommandError::Transport(error)
    }
}
