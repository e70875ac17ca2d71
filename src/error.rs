//! Error types and handling for the `StationFlow` engine

use thiserror::Error;

/// Main error type for the `StationFlow` engine
#[derive(Error, Debug)]
pub enum StationError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Inbound message could not be decoded
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// A formula was given an absent physical quantity
    #[error("Missing input for {field}")]
    MissingInput { field: &'static str },

    /// Outbound publication errors
    #[error("Publish error: {message}")]
    Publish { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON (de)serialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl StationError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a new missing-input error
    #[must_use]
    pub fn missing_input(field: &'static str) -> Self {
        Self::MissingInput { field }
    }

    /// Create a new publish error
    pub fn publish<S: Into<String>>(message: S) -> Self {
        Self::Publish {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            StationError::Config { .. } => {
                "Configuration error. Please check your config file and environment.".to_string()
            }
            StationError::Decode { message } => {
                format!("Could not decode station message: {message}")
            }
            StationError::MissingInput { field } => {
                format!("Sensor value for {field} was not reported. Check the sensor.")
            }
            StationError::Publish { .. } => {
                "Unable to hand a record to the publisher.".to_string()
            }
            StationError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
            StationError::Serialization { source } => {
                format!("Malformed JSON: {source}")
            }
        }
    }
}
