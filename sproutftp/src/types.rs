//! # Types
//!
//! Errors, replies and the small value types shared by the session driver

use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::status::{ReplyClass, Status};

/// A shorthand for a Result whose error type is always an FtpError.
pub type FtpResult<T> = std::result::Result<T, FtpError>;

/// `FtpError` is a library-global error type to describe the different kinds of
/// errors that might occur while talking to an FTP server.
#[derive(Debug, Error)]
pub enum FtpError {
    /// The server couldn't be reached, or didn't greet us before the connect timeout elapsed
    #[error("Connect error: {0}")]
    ConnectError(std::io::Error),
    /// The control connection failed after the greeting. The session is disconnected
    #[error("Connection lost: {0}")]
    ConnectionLost(std::io::Error),
    /// The data channel couldn't be opened, or failed while moving bytes.
    /// The control connection is unaffected
    #[error("Data channel error: {0}")]
    DataChannelError(std::io::Error),
    /// The connection settings are not usable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    /// The server rejected the credentials
    #[error("Authentication failed: {0}")]
    AuthError(Response),
    /// The operation is not allowed in the current session state. Nothing was sent to the server
    #[error("Invalid session state: {0}")]
    InvalidState(SessionState),
    /// A command argument can't be sent as is, e.g. a path with a line break in it.
    /// Nothing was sent to the server
    #[error("Invalid argument: {0:?}")]
    InvalidArgument(String),
    /// The server sent something which is not a valid reply
    #[error("Protocol error: {0}")]
    ProtocolError(String),
    /// The server answered with a well-formed 4xx or 5xx reply
    #[error("Remote error: {0}")]
    RemoteError(Response),
    /// The server answered with a positive reply, but not the one the operation expects
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(Response),
    /// A data command failed; `stage` tells where
    #[error("Transfer failed while {stage}: {source}")]
    TransferError {
        stage: TransferStage,
        source: Box<FtpError>,
    },
    /// The target path doesn't exist on the server
    #[error("No such file or directory: {0}")]
    NotFound(String),
    /// The target path exists and overwriting it was not allowed
    #[error("File already exists: {0}")]
    AlreadyExists(String),
    /// There was an error with the secure stream
    #[cfg(feature = "native-tls")]
    #[cfg_attr(docsrs, doc(cfg(feature = "native-tls")))]
    #[error("Secure error: {0}")]
    SecureError(String),
}

impl FtpError {
    /// Wrap the error into a [`FtpError::TransferError`] at `stage`.
    /// Errors which already carry a stage, state errors and rejected arguments are returned untouched.
    pub(crate) fn at_stage(self, stage: TransferStage) -> Self {
        match self {
            Self::TransferError { .. } | Self::InvalidState(_) | Self::InvalidArgument(_) => self,
            err => Self::TransferError {
                stage,
                source: Box::new(err),
            },
        }
    }

    /// Returns the server reply carried by the error, if any, looking through transfer errors
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::AuthError(response)
            | Self::RemoteError(response)
            | Self::UnexpectedResponse(response) => Some(response),
            Self::TransferError { source, .. } => source.response(),
            _ => None,
        }
    }

    /// Returns the stage of a failed transfer
    pub fn stage(&self) -> Option<TransferStage> {
        match self {
            Self::TransferError { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether the control connection is gone after this error
    pub fn is_connection_lost(&self) -> bool {
        match self {
            Self::ConnectionLost(_) => true,
            Self::TransferError { source, .. } => source.is_connection_lost(),
            _ => false,
        }
    }
}

/// Step of a data command (LIST, RETR, STOR) at which it failed
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TransferStage {
    /// PASV/EPSV negotiation
    PassiveMode,
    /// Opening the data channel to the advertised address
    DataConnection,
    /// Sending the data command and reading its preliminary reply
    Command,
    /// Moving bytes over the data channel
    Transfer,
    /// Reading the completion reply once the data channel is closed
    Completion,
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PassiveMode => "entering passive mode",
            Self::DataConnection => "opening the data connection",
            Self::Command => "sending the data command",
            Self::Transfer => "transferring data",
            Self::Completion => "waiting for transfer completion",
        })
    }
}

/// Protocol state of a [`crate::Session`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No control connection
    Disconnected,
    /// Greeted by the server, not logged in yet
    Connected,
    /// Logged in and idle
    Authenticated,
    /// A command is in flight
    Busy,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Authenticated => "authenticated",
            Self::Busy => "busy",
        })
    }
}

/// A reply read from the control channel.
///
/// For multi-line replies `code` is the one of the closing line and `message` joins
/// the text of every line with `\n`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub code: u32,
    pub message: String,
}

impl Response {
    /// Instantiates a new `Response`
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Well-known status for the reply code; [`Status::Unknown`] for anything else
    pub fn status(&self) -> Status {
        Status::from(self.code)
    }

    /// Reply family. Replies are only built from codes in `100..600`, so this never fails
    pub fn class(&self) -> ReplyClass {
        ReplyClass::from_code(self.code).unwrap_or(ReplyClass::PermanentNegative)
    }

    /// Whether the reply reports a failure (4xx or 5xx)
    pub fn is_negative(&self) -> bool {
        self.class().is_negative()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Representation type used in the `TYPE` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    /// ASCII text, non-print format control
    Ascii,
    /// Image (binary) transfers; bytes are sent untouched
    Binary,
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ascii => "A N",
            Self::Binary => "I",
        })
    }
}

/// How the data channel is negotiated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// PASV; the server advertises `(h1,h2,h3,h4,p1,p2)`
    Passive,
    /// EPSV; required on IPv6. Defined in rfc 2428 <https://www.rfc-editor.org/rfc/rfc2428#section-3>
    ExtendedPassive,
}
