#![crate_name = "sproutftp"]
#![crate_type = "lib"]

//! # SproutFTP
//!
//! SproutFTP is a small, blocking FTP client.
//!
//! It is made of two layers:
//!
//! - [`Session`]: the protocol driver. It owns one control connection, tracks the protocol
//!   state and runs single commands and data commands (`LIST`, `RETR`, `STOR`) over passive
//!   mode data channels.
//! - [`FileManager`]: high level file operations. Each call opens its own session, logs in,
//!   runs the operation and quits.
//!
//! ## Get started
//!
//! ```toml
//! sproutftp = "^0.1"
//! ```
//!
//! ### Features
//!
//! - `native-tls`: enable explicit (`AUTH TLS`) and implicit FTPS with [native-tls](https://crates.io/crates/native-tls)
//! - `native-tls-vendored`: same as `native-tls`, with a vendored OpenSSL
//! - `no-log`: disable logging
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::io::Cursor;
//!
//! use sproutftp::{Config, FileManager};
//!
//! let manager = FileManager::new(
//!     Config::new("127.0.0.1").credentials("anonymous", "anonymous"),
//! )
//! .unwrap();
//! for entry in manager.list_directory(None).unwrap() {
//!     println!("{} {}", entry.kind(), entry.name());
//! }
//! manager
//!     .upload_file("/hello.txt", &mut Cursor::new(b"hello".to_vec()), false)
//!     .unwrap();
//! ```
//!
//! The driver can be used directly when several commands must share a connection:
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use sproutftp::Session;
//! use sproutftp::types::TransferType;
//!
//! let mut session = Session::connect("127.0.0.1", 21, Duration::from_secs(10)).unwrap();
//! session.authenticate("anonymous", "anonymous").unwrap();
//! session.transfer_type(TransferType::Binary).unwrap();
//! let content = session.retr_as_buffer("/pub/readme.txt").unwrap();
//! println!("{} bytes", content.into_inner().len());
//! session.disconnect().unwrap();
//! ```

#![doc(html_playground_url = "https://play.rust-lang.org")]

// -- common deps
#[macro_use]
extern crate lazy_regex;
#[macro_use]
extern crate log;

// -- private
mod regex;
mod session;
mod status;
#[cfg(test)]
mod test_server;

// -- public
pub mod command;
pub mod config;
pub mod list;
pub mod manager;
pub mod types;

// -- secure deps
#[cfg(feature = "native-tls")]
pub extern crate native_tls_crate as native_tls;

// -- export
pub use command::Command;
pub use config::{Config, ConfigError, EncryptionMode, IpVersion};
pub use list::{DirectoryEntry, EntryKind, Listing};
pub use manager::{remote_path, FileManager};
pub use session::{DataStream, Session};
#[cfg(feature = "native-tls")]
pub use session::{TlsConnector, TlsStream};
pub use status::{ReplyClass, Status};
pub use types::{FtpError, FtpResult, Mode, Response, SessionState, TransferStage};

// -- test logging
#[cfg(test)]
pub fn log_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}
