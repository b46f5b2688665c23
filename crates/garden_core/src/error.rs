use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("invalid_input - {0}")]
    InvalidInput(String),
    #[error("invalid_data - {0}")]
    InvalidData(String),
    #[error("io_error - {0}")]
    Io(String),
    #[error("{} - {}", .0.kind.code(), .0.user_message())]
    Fetch(#[from] FetchError),
}

impl AppError {
    pub fn invalid_input<M: Into<String>>(message: M) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_data<M: Into<String>>(message: M) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn io<M: Into<String>>(message: M) -> Self {
        Self::Io(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidData(_) => "invalid_data",
            Self::Io(_) => "io_error",
            Self::Fetch(err) => err.kind.code(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::InvalidInput(message) => message,
            Self::InvalidData(message) => message,
            Self::Io(message) => message,
            Self::Fetch(err) => err.user_message(),
        }
    }
}

/// Classification of a failed call against the remote task source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Authentication,
    Authorization,
    RateLimit,
    RemoteServer,
    Network,
    DataFormat,
    Unknown,
}

impl FetchErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::RateLimit => "rate_limit",
            Self::RemoteServer => "remote_server",
            Self::Network => "network",
            Self::DataFormat => "data_format",
            Self::Unknown => "unknown",
        }
    }

    /// Message shown to the user after a failed foreground fetch.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::Authentication => {
                "Your access token is invalid or has expired. Connect again with a fresh token."
            }
            Self::Authorization => {
                "The token does not have permission to read tasks in this workspace."
            }
            Self::RateLimit => "Too many requests. Wait a minute and refresh again.",
            Self::RemoteServer => "The task service is having trouble. Try again later.",
            Self::Network => "Could not reach the task service. Check your connection.",
            Self::DataFormat => "The task service rejected the request or returned data we could not read.",
            Self::Unknown => "Something went wrong while loading your tasks.",
        }
    }

    /// Maps an HTTP status code to an error kind. `None` for success codes.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=399 => None,
            400 => Some(Self::DataFormat),
            401 => Some(Self::Authentication),
            403 => Some(Self::Authorization),
            429 => Some(Self::RateLimit),
            500..=599 => Some(Self::RemoteServer),
            _ => Some(Self::Unknown),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} - {detail}", .kind.code())]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub detail: String,
}

impl FetchError {
    pub fn new<M: Into<String>>(kind: FetchErrorKind, detail: M) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn data_format<M: Into<String>>(detail: M) -> Self {
        Self::new(FetchErrorKind::DataFormat, detail)
    }

    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if let Some(status) = err.status() {
            FetchErrorKind::from_status(status.as_u16()).unwrap_or(FetchErrorKind::Unknown)
        } else if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            FetchErrorKind::Network
        } else if err.is_decode() {
            FetchErrorKind::DataFormat
        } else {
            FetchErrorKind::Unknown
        };
        Self::new(kind, err.to_string())
    }
}
