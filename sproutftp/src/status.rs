//! # Status
//!
//! Reply codes defined by the File Transfer Protocol (RFC 959) and the families they belong to.

use std::fmt;

use thiserror::Error;

/// Family of a reply, given by the first digit of its code
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ReplyClass {
    /// 1xx: the action is being started; expect another reply before a new command
    PositivePreliminary,
    /// 2xx: the action has been completed successfully
    PositiveCompletion,
    /// 3xx: the command was accepted, but the server needs further information
    PositiveIntermediate,
    /// 4xx: the command was not accepted, but the error condition is temporary
    TransientNegative,
    /// 5xx: the command was not accepted and should not be repeated as is
    PermanentNegative,
}

impl ReplyClass {
    /// Classify a reply code. Returns `None` for codes outside `100..600`
    pub fn from_code(code: u32) -> Option<Self> {
        match code / 100 {
            1 => Some(Self::PositivePreliminary),
            2 => Some(Self::PositiveCompletion),
            3 => Some(Self::PositiveIntermediate),
            4 => Some(Self::TransientNegative),
            5 => Some(Self::PermanentNegative),
            _ => None,
        }
    }

    /// Whether the reply reports a failure (4xx or 5xx)
    pub fn is_negative(&self) -> bool {
        matches!(self, Self::TransientNegative | Self::PermanentNegative)
    }
}

impl fmt::Display for ReplyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PositivePreliminary => "positive preliminary",
            Self::PositiveCompletion => "positive completion",
            Self::PositiveIntermediate => "positive intermediate",
            Self::TransientNegative => "transient negative",
            Self::PermanentNegative => "permanent negative",
        })
    }
}

#[derive(Debug, Copy, Clone, Error, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
/// Well-known reply status
pub enum Status {
    // 1xx: Positive Preliminary Reply
    #[error("restart marker reply")]
    RestartMarker = 110,
    #[error("service ready in n minutes")]
    ReadyMinute = 120,
    #[error("data connection already open; transfer starting")]
    AlreadyOpen = 125,
    #[error("file status okay; about to open data connection")]
    AboutToSend = 150,
    // 2xx: Positive Completion Reply
    #[error("command okay")]
    CommandOk = 200,
    #[error("command not implemented, superfluous at this site")]
    CommandNotImplemented = 202,
    #[error("system status, or system help reply")]
    System = 211,
    #[error("file status")]
    File = 213,
    #[error("service ready for new user")]
    Ready = 220,
    #[error("service closing control connection")]
    Closing = 221,
    #[error("closing data connection")]
    ClosingDataConnection = 226,
    #[error("entering passive mode")]
    PassiveMode = 227,
    #[error("entering extended passive mode")]
    ExtendedPassiveMode = 229,
    #[error("user logged in, proceed")]
    LoggedIn = 230,
    #[error("security data exchange complete")]
    AuthOk = 234,
    #[error("requested file action okay, completed")]
    RequestedFileActionOk = 250,
    #[error("pathname created")]
    PathCreated = 257,
    // 3xx: Positive Intermediate Reply
    #[error("user name okay, need password")]
    NeedPassword = 331,
    #[error("need account for login")]
    LoginNeedAccount = 332,
    #[error("requested file action pending further information")]
    RequestFilePending = 350,
    // 4xx: Transient Negative Completion Reply
    #[error("service not available, closing control connection")]
    NotAvailable = 421,
    #[error("can't open data connection")]
    CannotOpenDataConnection = 425,
    #[error("connection closed; transfer aborted")]
    TransferAborted = 426,
    #[error("requested file action not taken; file unavailable")]
    RequestFileActionIgnored = 450,
    #[error("requested action aborted; local error in processing")]
    ActionAborted = 451,
    #[error("requested action not taken; insufficient storage space")]
    RequestedActionNotTaken = 452,
    // 5xx: Permanent Negative Completion Reply
    #[error("syntax error, command unrecognized")]
    BadCommand = 500,
    #[error("syntax error in parameters or arguments")]
    BadArguments = 501,
    #[error("command not implemented")]
    NotImplemented = 502,
    #[error("bad sequence of commands")]
    BadSequence = 503,
    #[error("command not implemented for that parameter")]
    NotImplementedParameter = 504,
    #[error("not logged in")]
    NotLoggedIn = 530,
    #[error("need account for storing files")]
    StoringNeedAccount = 532,
    #[error("requested action not taken; file unavailable")]
    FileUnavailable = 550,
    #[error("requested action aborted; page type unknown")]
    PageTypeUnknown = 551,
    #[error("requested file action aborted; exceeded storage allocation")]
    ExceededStorage = 552,
    #[error("requested action not taken; file name not allowed")]
    BadFilename = 553,
    #[error("unknown reply code")]
    Unknown = 0,
}

impl Status {
    /// Get status code
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Get status description
    pub fn desc(&self) -> String {
        self.to_string()
    }
}

impl From<u32> for Status {
    fn from(code: u32) -> Self {
        match code {
            110 => Self::RestartMarker,
            120 => Self::ReadyMinute,
            125 => Self::AlreadyOpen,
            150 => Self::AboutToSend,
            200 => Self::CommandOk,
            202 => Self::CommandNotImplemented,
            211 => Self::System,
            213 => Self::File,
            220 => Self::Ready,
            221 => Self::Closing,
            226 => Self::ClosingDataConnection,
            227 => Self::PassiveMode,
            229 => Self::ExtendedPassiveMode,
            230 => Self::LoggedIn,
            234 => Self::AuthOk,
            250 => Self::RequestedFileActionOk,
            257 => Self::PathCreated,
            331 => Self::NeedPassword,
            332 => Self::LoginNeedAccount,
            350 => Self::RequestFilePending,
            421 => Self::NotAvailable,
            425 => Self::CannotOpenDataConnection,
            426 => Self::TransferAborted,
            450 => Self::RequestFileActionIgnored,
            451 => Self::ActionAborted,
            452 => Self::RequestedActionNotTaken,
            500 => Self::BadCommand,
            501 => Self::BadArguments,
            502 => Self::NotImplemented,
            503 => Self::BadSequence,
            504 => Self::NotImplementedParameter,
            530 => Self::NotLoggedIn,
            532 => Self::StoringNeedAccount,
            550 => Self::FileUnavailable,
            551 => Self::PageTypeUnknown,
            552 => Self::ExceededStorage,
            553 => Self::BadFilename,
            _ => Self::Unknown,
        }
    }
}
