//! # Manager
//!
//! High level file operations for callers which don't want to drive a [`Session`].
//!
//! Every operation opens its own session: connect, log in, switch to binary mode, run the
//! operation, quit. The session is closed on every path, failures included, so a
//! [`FileManager`] holds no connection between calls and can be shared freely.

use std::io::{Cursor, Read, Write};

use crate::config::Config;
use crate::list::{DirectoryEntry, EntryKind};
use crate::session::Session;
use crate::status::Status;
use crate::types::{FtpError, FtpResult, TransferStage, TransferType};

/// Runs file operations against the server described by a [`Config`]
#[derive(Debug, Clone)]
pub struct FileManager {
    config: Config,
}

impl FileManager {
    /// Create a manager for `config`. Fails if the config is not usable
    pub fn new(config: Config) -> FtpResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Create a manager from the `SPROUTFTP_*` environment variables
    pub fn from_env() -> FtpResult<Self> {
        Self::new(Config::from_env()?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// List `path`, or the configured default path. Directories come first, then files;
    /// each group is sorted by name
    pub fn list_directory(&self, path: Option<&str>) -> FtpResult<Vec<DirectoryEntry>> {
        let path = path.unwrap_or(&self.config.default_path);
        info!("Listing {path}");
        let mut entries: Vec<DirectoryEntry> =
            self.with_session(|session| session.list(Some(path)).map(Iterator::collect))?;
        entries.sort_by(|a, b| {
            b.is_directory()
                .cmp(&a.is_directory())
                .then_with(|| a.name().cmp(b.name()))
        });
        Ok(entries)
    }

    /// Upload the content of `reader` to `path`. Returns the number of bytes sent.
    ///
    /// With `overwrite` unset, an existing file at `path` makes the upload fail with
    /// [`FtpError::AlreadyExists`] before any byte is sent
    pub fn upload_file<R: Read>(&self, path: &str, reader: &mut R, overwrite: bool) -> FtpResult<u64> {
        info!("Uploading {path}");
        self.with_session(|session| {
            if !overwrite && session.stat_file(path)? {
                return Err(FtpError::AlreadyExists(path.to_string()));
            }
            session.put_file(path, reader)
        })
    }

    /// Download `path` into memory
    pub fn download_file(&self, path: &str) -> FtpResult<Vec<u8>> {
        info!("Downloading {path}");
        self.with_session(|session| session.retr_as_buffer(path).map(Cursor::into_inner))
            .map_err(|err| not_found(err, path))
    }

    /// Download `path` into `writer`. Returns the number of bytes received
    pub fn download_to<W: Write>(&self, path: &str, writer: &mut W) -> FtpResult<u64> {
        info!("Downloading {path}");
        self.with_session(|session| {
            session.retr(path, |stream| {
                std::io::copy(stream, writer).map_err(FtpError::DataChannelError)
            })
        })
        .map_err(|err| not_found(err, path))
    }

    /// Delete the directory or file at `path`. Returns the kind of the deleted entry.
    ///
    /// Directories are removed with `RMD`, so they must be empty
    pub fn delete_entry(&self, path: &str) -> FtpResult<EntryKind> {
        info!("Deleting {path}");
        self.with_session(|session| {
            if session.stat_directory(path)? {
                session.rmdir(path)?;
                Ok(EntryKind::Directory)
            } else if session.stat_file(path)? {
                session.rm(path)?;
                Ok(EntryKind::File)
            } else {
                Err(FtpError::NotFound(path.to_string()))
            }
        })
    }

    /// Create the directory `path`. Returns the path reported by the server
    pub fn create_directory(&self, path: &str) -> FtpResult<String> {
        info!("Creating directory {path}");
        self.with_session(|session| session.mkdir(path))
    }

    /// Open a logged in session in binary mode, run `op`, then quit
    fn with_session<T, F>(&self, op: F) -> FtpResult<T>
    where
        F: FnOnce(&mut Session) -> FtpResult<T>,
    {
        let mut session = Session::connect_with_config(&self.config)?;
        let result = session
            .authenticate(&self.config.username, &self.config.password)
            .and_then(|_| session.transfer_type(TransferType::Binary))
            .and_then(|_| op(&mut session));
        if let Err(err) = &result {
            debug!("Operation failed: {err}");
        }
        if let Err(err) = session.disconnect() {
            debug!("Failed to quit: {err}");
        }
        result
    }
}

/// Join a directory and an entry name into a remote path
pub fn remote_path(dir: &str, name: &str) -> String {
    let name = name.trim_start_matches('/');
    if dir.is_empty() {
        format!("/{name}")
    } else if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// A 550 or 450 to the data command itself means there's nothing at `path`
fn not_found(err: FtpError, path: &str) -> FtpError {
    let missing = err.stage() == Some(TransferStage::Command)
        && matches!(
            err.response().map(|r| r.status()),
            Some(Status::FileUnavailable | Status::RequestFileActionIgnored)
        );
    if missing {
        FtpError::NotFound(path.to_string())
    } else {
        err
    }
}
