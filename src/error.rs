//! Error taxonomy for the weather lookup pipeline
//!
//! Every failure in the pipeline ends up as exactly one [`WeatherError`], tagged
//! with one of the five [`ErrorKind`]s. The presentation layer only ever sees the
//! kind and the matching [`UserMessage`]; the optional diagnostic message is for logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Closed set of failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The place name could not be resolved, or the provider reported 404
    CityNotFound,
    /// Something outside the taxonomy went wrong in our own code
    ServerError,
    /// A provider response did not have the expected shape
    InvalidData,
    /// Connection failure, timeout or cancellation
    NetworkError,
    /// The provider answered with an unexpected HTTP status
    ApiError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::CityNotFound,
        ErrorKind::ServerError,
        ErrorKind::InvalidData,
        ErrorKind::NetworkError,
        ErrorKind::ApiError,
    ];

    /// Stable code used in logs and JSON bodies
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::CityNotFound => "CITY_NOT_FOUND",
            ErrorKind::ServerError => "SERVER_ERROR",
            ErrorKind::InvalidData => "INVALID_DATA",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::ApiError => "API_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ErrorKind {
    type Err = String;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        ErrorKind::ALL
            .into_iter()
            .find(|kind| kind.code().eq_ignore_ascii_case(code.trim()))
            .ok_or_else(|| format!("Unknown error code '{code}'"))
    }
}

/// Heading and message shown to the end user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserMessage {
    pub heading: &'static str,
    pub message: &'static str,
}

/// Pair used for anything that is not a known error code
pub const FALLBACK_MESSAGE: UserMessage = UserMessage {
    heading: "Unexpected Error",
    message: "An unexpected error occurred. Please try again later.",
};

/// Get the user-facing heading/message pair for an error kind
#[must_use]
pub fn user_message(kind: ErrorKind) -> UserMessage {
    match kind {
        ErrorKind::CityNotFound => UserMessage {
            heading: "City Not Found",
            message: "We couldn't find the city you entered. Please check your spelling and try again.",
        },
        ErrorKind::ServerError => UserMessage {
            heading: "Server Error",
            message: "We're experiencing technical difficulties. Please try again later.",
        },
        ErrorKind::InvalidData => UserMessage {
            heading: "Invalid Data Received",
            message: "We received invalid data from the weather service. Please try again later.",
        },
        ErrorKind::NetworkError => UserMessage {
            heading: "Connection Error",
            message: "We couldn't connect to the weather service. Please check your internet connection and try again.",
        },
        ErrorKind::ApiError => UserMessage {
            heading: "Service Unavailable",
            message: "The weather service is currently unavailable. Please try again later.",
        },
    }
}

/// Look up the pair for a raw error code, falling back to a generic pair
#[must_use]
pub fn user_message_for_code(code: &str) -> UserMessage {
    code.parse::<ErrorKind>()
        .map(user_message)
        .unwrap_or(FALLBACK_MESSAGE)
}

fn detail_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

/// The single error type returned from every fallible pipeline operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}{}", .kind, detail_suffix(.message))]
pub struct WeatherError {
    kind: ErrorKind,
    message: Option<String>,
}

impl WeatherError {
    /// Create an error without a diagnostic message
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Create an error with a diagnostic message
    pub fn with_message<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: Some(message.into()),
        }
    }

    pub fn city_not_found<S: Into<String>>(message: S) -> Self {
        Self::with_message(ErrorKind::CityNotFound, message)
    }

    pub fn server<S: Into<String>>(message: S) -> Self {
        Self::with_message(ErrorKind::ServerError, message)
    }

    pub fn invalid_data<S: Into<String>>(message: S) -> Self {
        Self::with_message(ErrorKind::InvalidData, message)
    }

    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::with_message(ErrorKind::NetworkError, message)
    }

    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::with_message(ErrorKind::ApiError, message)
    }

    /// Bring an arbitrary failure into the taxonomy.
    ///
    /// An error that already carries a `WeatherError` is returned unchanged;
    /// anything else becomes `fallback` with the full cause chain as message.
    #[must_use]
    pub fn classify(err: anyhow::Error, fallback: ErrorKind) -> Self {
        match err.downcast::<WeatherError>() {
            Ok(classified) => classified,
            Err(other) => Self::with_message(fallback, format!("{other:#}")),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Diagnostic message, if any
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Get the user-facing heading/message pair
    #[must_use]
    pub fn user_message(&self) -> UserMessage {
        user_message(self.kind)
    }
}

/// Anything unclassified reaching the orchestrator boundary is a server error
impl From<anyhow::Error> for WeatherError {
    fn from(err: anyhow::Error) -> Self {
        Self::classify(err, ErrorKind::ServerError)
    }
}
