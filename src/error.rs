//! Error types for Redforge
//!
//! This module defines all error types used throughout the server. We follow
//! Redis's error conventions where applicable so that error replies read the
//! same as a real `redis-server`.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Main error type for Redforge operations
#[derive(Debug)]
pub enum ForgeError {
    /// Protocol-related errors (RESP parsing, serialization)
    Protocol(String),

    /// Command execution errors
    Command(CommandError),

    /// Storage engine errors
    Storage(StorageError),

    /// Network/IO errors
    Io(String),

    /// Configuration errors
    Config(String),

    /// Client connection errors
    Connection(String),

    /// Internal server errors
    Internal(String),
}

/// Command-specific errors that map to Redis error responses
#[derive(Debug, Clone)]
pub enum CommandError {
    /// Unknown command
    UnknownCommand(String),

    /// Wrong number of arguments for command
    WrongNumberOfArgs(String),

    /// Syntax error in command
    SyntaxError(String),

    /// Operation against wrong type
    WrongType,

    /// Integer overflow
    IntegerOverflow,

    /// Value is not an integer or out of range
    NotInteger,

    /// Generic command error with message
    Generic(String),
}

/// Storage-related errors
#[derive(Debug)]
pub enum StorageError {
    /// Key not found
    KeyNotFound,

    /// Wrong data type for operation
    WrongType,

    /// RDB file is corrupt or uses an unsupported encoding
    CorruptRdb(String),
}

/// Type alias for Results throughout Redforge
pub type Result<T> = std::result::Result<T, ForgeError>;

impl fmt::Display for ForgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForgeError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            ForgeError::Command(err) => write!(f, "{}", err),
            ForgeError::Storage(err) => write!(f, "{}", err),
            ForgeError::Io(msg) => write!(f, "I/O error: {}", msg),
            ForgeError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ForgeError::Connection(msg) => write!(f, "Connection error: {}", msg),
            ForgeError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::UnknownCommand(cmd) => {
                write!(f, "ERR unknown command '{}'", cmd)
            }
            CommandError::WrongNumberOfArgs(cmd) => {
                write!(f, "ERR wrong number of arguments for '{}' command", cmd)
            }
            CommandError::SyntaxError(msg) => write!(f, "ERR syntax error: {}", msg),
            CommandError::WrongType => {
                write!(f, "WRONGTYPE Operation against a key holding the wrong kind of value")
            }
            CommandError::IntegerOverflow => {
                write!(f, "ERR increment or decrement would overflow")
            }
            CommandError::NotInteger => {
                write!(f, "ERR value is not an integer or out of range")
            }
            CommandError::Generic(msg) => write!(f, "ERR {}", msg),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::KeyNotFound => write!(f, "ERR no such key"),
            StorageError::WrongType => {
                write!(f, "WRONGTYPE Operation against a key holding the wrong kind of value")
            }
            StorageError::CorruptRdb(msg) => write!(f, "ERR RDB file is corrupt: {}", msg),
        }
    }
}

impl StdError for ForgeError {}
impl StdError for CommandError {}
impl StdError for StorageError {}

// Conversion implementations
impl From<io::Error> for ForgeError {
    fn from(err: io::Error) -> Self {
        ForgeError::Io(err.to_string())
    }
}

impl From<CommandError> for ForgeError {
    fn from(err: CommandError) -> Self {
        ForgeError::Command(err)
    }
}

impl From<StorageError> for ForgeError {
    fn from(err: StorageError) -> Self {
        ForgeError::Storage(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CommandError::UnknownCommand("FOOBAR".to_string());
        assert_eq!(err.to_string(), "ERR unknown command 'FOOBAR'");

        let err = CommandError::WrongType;
        assert_eq!(
            err.to_string(),
            "WRONGTYPE Operation against a key holding the wrong kind of value"
        );
    }
}
