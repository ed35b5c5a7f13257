//! # Session
//!
//! The FTP protocol driver. A [`Session`] owns one control connection and walks it through
//! the states described by [`SessionState`]:
//!
//! ```text
//! Disconnected --connect--> Connected --authenticate--> Authenticated
//!                                 \____________ disconnect ___________/--> Disconnected
//! ```
//!
//! Every command moves the session to `Busy` until its final reply has been read. Data
//! commands opened with [`Session::retr_as_stream`] or [`Session::put_with_stream`] keep the
//! session `Busy` until the matching `finalize_*` call.

mod data_stream;
mod passive;
mod reply;
#[cfg(feature = "native-tls")]
mod tls;

use std::io::{copy, BufRead, BufReader, Cursor, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

pub use data_stream::DataStream;
use reply::ReplyBuilder;
#[cfg(feature = "native-tls")]
pub use tls::{TlsConnector, TlsStream};

use crate::command::Command;
#[cfg(feature = "native-tls")]
use crate::command::ProtectionLevel;
use crate::config::{Config, EncryptionMode};
use crate::list::Listing;
use crate::regex::{QUOTED_PATH_RE, SIZE_RE};
use crate::status::Status;
use crate::types::{FtpError, FtpResult, Mode, Response, SessionState, TransferStage, TransferType};

/// Replies which close a data command
const TRANSFER_COMPLETE: [Status; 2] = [Status::ClosingDataConnection, Status::RequestedFileActionOk];
/// Replies which open a data command
const TRANSFER_STARTING: [Status; 2] = [Status::AboutToSend, Status::AlreadyOpen];
/// Longest control channel line accepted, terminator included
const MAX_REPLY_LINE_LEN: usize = 4096;
/// Most lines accepted in a multi-line reply
const MAX_REPLY_LINES: usize = 1024;
/// Longest listing line accepted, terminator included
const MAX_LIST_LINE_LEN: usize = 8192;

/// A session with an FTP server
#[derive(Debug)]
pub struct Session {
    reader: Option<BufReader<DataStream>>,
    state: SessionState,
    /// State the session goes back to when the command in flight completes
    idle_state: SessionState,
    mode: Mode,
    nat_workaround: bool,
    welcome_msg: Option<String>,
    #[cfg(feature = "native-tls")]
    tls_ctx: Option<TlsConnector>,
    #[cfg(feature = "native-tls")]
    domain: String,
}

impl Session {
    /// Connect to `host:port` with default settings.
    ///
    /// `timeout` bounds both the TCP connect and the wait for the greeting
    pub fn connect(host: &str, port: u16, timeout: Duration) -> FtpResult<Self> {
        Self::connect_with_config(
            &Config::new(host)
                .port(port)
                .connect_timeout(timeout),
        )
    }

    /// Connect using `config`.
    ///
    /// Resolves the host, opens the control connection to the first reachable address and
    /// waits for the `220` greeting. With [`EncryptionMode::Explicit`] the connection is then
    /// upgraded with `AUTH TLS`; with [`EncryptionMode::Implicit`] TLS is negotiated first.
    pub fn connect_with_config(config: &Config) -> FtpResult<Self> {
        config.validate()?;
        let stream = Self::open_control_connection(config)?;
        let mode = match stream.peer_addr() {
            Ok(addr) if addr.is_ipv6() => Mode::ExtendedPassive,
            _ => Mode::Passive,
        };
        let mut session = Self {
            reader: None,
            state: SessionState::Disconnected,
            idle_state: SessionState::Disconnected,
            mode,
            nat_workaround: config.passive_nat_workaround,
            welcome_msg: None,
            #[cfg(feature = "native-tls")]
            tls_ctx: None,
            #[cfg(feature = "native-tls")]
            domain: config.host.clone(),
        };
        let stream = session.secure_implicit(config, stream)?;
        session.reader = Some(BufReader::new(stream));
        session.state = SessionState::Connected;
        session.idle_state = SessionState::Connected;

        let greeting = session.read_greeting().map_err(|err| match err {
            FtpError::ConnectionLost(err) => FtpError::ConnectError(err),
            err => err,
        });
        match greeting {
            Ok(response) => {
                debug!("Server READY; response: {:?}", response.message);
                session.welcome_msg = Some(response.message);
            }
            Err(err) => {
                session.close_transport(false);
                return Err(err);
            }
        }
        if config.encryption == EncryptionMode::Explicit {
            if let Err(err) = session.secure_explicit(config) {
                session.close_transport(false);
                return Err(err);
            }
        }
        Ok(session)
    }

    /// Resolve the configured host and connect to the first address which accepts
    fn open_control_connection(config: &Config) -> FtpResult<TcpStream> {
        debug!("Connecting to server {}:{}", config.host, config.port);
        let addrs: Vec<SocketAddr> = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(FtpError::ConnectError)?
            .filter(|addr| config.ip_version.accepts(addr))
            .collect();
        if addrs.is_empty() {
            return Err(FtpError::ConnectError(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                format!("{} has no {} address", config.host, config.ip_version),
            )));
        }
        let mut last_error = None;
        for addr in addrs {
            trace!("Trying {addr}");
            match TcpStream::connect_timeout(&addr, config.connect_timeout) {
                Ok(stream) => {
                    debug!("Established connection with server {addr}");
                    stream
                        .set_read_timeout(Some(config.connect_timeout))
                        .and_then(|_| stream.set_write_timeout(Some(config.connect_timeout)))
                        .map_err(FtpError::ConnectError)?;
                    return Ok(stream);
                }
                Err(err) => {
                    debug!("Could not connect to {addr}: {err}");
                    last_error = Some(err);
                }
            }
        }
        Err(FtpError::ConnectError(last_error.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotConnected, "no address to connect to")
        })))
    }

    /// Read the greeting; a `120` is followed by the actual `220`
    fn read_greeting(&mut self) -> FtpResult<Response> {
        debug!("Reading server response...");
        let response = self.read_response_in(&[Status::Ready, Status::ReadyMinute])?;
        if response.code == Status::ReadyMinute.code() {
            debug!("Server not ready yet: {}", response.message);
            return self.read_response(Status::Ready);
        }
        Ok(response)
    }

    #[cfg(feature = "native-tls")]
    fn secure_implicit(&mut self, config: &Config, stream: TcpStream) -> FtpResult<DataStream> {
        if config.encryption.is_secure() {
            self.tls_ctx = Some(TlsConnector::new(config.accept_invalid_certs)?);
        }
        match (&self.tls_ctx, config.encryption) {
            (Some(tls_ctx), EncryptionMode::Implicit) => {
                debug!("TLS OK; initializing ssl stream");
                let stream = tls_ctx.connect(&self.domain, stream)?;
                debug!("TLS Stream OK");
                Ok(DataStream::Tls(Box::new(stream)))
            }
            _ => Ok(DataStream::Tcp(stream)),
        }
    }

    #[cfg(not(feature = "native-tls"))]
    fn secure_implicit(&mut self, _config: &Config, stream: TcpStream) -> FtpResult<DataStream> {
        Ok(DataStream::Tcp(stream))
    }

    /// Upgrade the control channel with `AUTH TLS`, then protect the data channel
    #[cfg(feature = "native-tls")]
    fn secure_explicit(&mut self, _config: &Config) -> FtpResult<()> {
        debug!("Initializing TLS auth");
        self.perform(Command::Auth)?;
        self.read_response(Status::AuthOk)?;
        let tls_ctx = self
            .tls_ctx
            .clone()
            .ok_or_else(|| FtpError::SecureError("no TLS connector".to_string()))?;
        let reader = self.reader.take().ok_or(FtpError::InvalidState(SessionState::Disconnected))?;
        let stream = reader.into_inner().into_tcp_stream().map_err(|_| {
            FtpError::SecureError("control channel is already encrypted".to_string())
        })?;
        debug!("TLS OK; initializing ssl stream");
        let stream = tls_ctx.connect(&self.domain, stream)?;
        debug!("TLS Stream OK");
        self.reader = Some(BufReader::new(DataStream::Tls(Box::new(stream))));
        self.perform(Command::Pbsz(0))?;
        self.read_response(Status::CommandOk)?;
        self.perform(Command::Prot(ProtectionLevel::Private))?;
        self.read_response(Status::CommandOk)?;
        Ok(())
    }

    #[cfg(not(feature = "native-tls"))]
    fn secure_explicit(&mut self, _config: &Config) -> FtpResult<()> {
        Err(crate::config::ConfigError::TlsNotSupported.into())
    }

    /// Log in with `user` and `password`.
    ///
    /// When the server accepts the user name with `230`, no password is sent. The connect
    /// timeout stops applying to the control connection once this call returns.
    pub fn authenticate(&mut self, user: &str, password: &str) -> FtpResult<()> {
        if self.state != SessionState::Connected {
            return Err(FtpError::InvalidState(self.state));
        }
        self.state = SessionState::Busy;
        let result = self.login(user, password);
        if result.is_ok() {
            debug!("Login OK");
            self.idle_state = SessionState::Authenticated;
        }
        let result = self.finish(result);
        self.clear_timeouts();
        result
    }

    fn login(&mut self, user: &str, password: &str) -> FtpResult<()> {
        debug!("Signing in with user '{}'", user);
        self.perform(Command::User(user.to_string()))?;
        let mut response = self.read_reply()?;
        if response.code == Status::NeedPassword.code() {
            debug!("Password is required");
            self.perform(Command::Pass(password.to_string()))?;
            response = self.read_reply()?;
        }
        match response.code {
            230 => Ok(()),
            // 430 is the non-standard "invalid username or password"
            430 | 500..=599 => Err(FtpError::AuthError(response)),
            400..=499 => Err(FtpError::RemoteError(response)),
            _ => Err(FtpError::UnexpectedResponse(response)),
        }
    }

    /// Send `QUIT` and close the control connection.
    ///
    /// Always succeeds; write errors and missing replies are ignored, and calling it on a
    /// disconnected session does nothing
    pub fn disconnect(&mut self) -> FtpResult<()> {
        if self.state == SessionState::Disconnected {
            return Ok(());
        }
        debug!("Quitting stream");
        match self
            .perform(Command::Quit)
            .and_then(|_| self.read_response(Status::Closing))
        {
            Ok(_) => trace!("QUIT OK"),
            Err(err) => debug!("Ignoring QUIT failure: {err}"),
        }
        self.close_transport(true);
        Ok(())
    }

    /// Send `command` and read its reply. Returns the reply if it is positive.
    ///
    /// Data commands (`LIST`, `RETR`, `STOR`) need a data channel; use [`Self::list`],
    /// [`Self::retr_as_stream`] and [`Self::put_with_stream`] for those
    pub fn execute(&mut self, command: Command) -> FtpResult<Response> {
        self.guarded(|session| {
            session.perform(command)?;
            let response = session.read_reply()?;
            if response.is_negative() {
                Err(FtpError::RemoteError(response))
            } else {
                Ok(response)
            }
        })
    }

    /// Current protocol state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Greeting sent by the server on connect
    pub fn welcome_msg(&self) -> Option<&str> {
        self.welcome_msg.as_deref()
    }

    /// Underlying control socket, to tune timeouts or inspect addresses.
    /// `None` once disconnected
    pub fn get_ref(&self) -> Option<&TcpStream> {
        self.reader.as_ref().map(|reader| reader.get_ref().get_ref())
    }

    /// Data channel negotiation in use
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Enable EPSV or go back to PASV
    pub fn set_mode(&mut self, mode: Mode) {
        debug!("Changed mode to {:?}", mode);
        self.mode = mode;
    }

    /// Connect the data channel to the control peer regardless of the PASV address
    pub fn set_passive_nat_workaround(&mut self, nat_workaround: bool) {
        self.nat_workaround = nat_workaround;
    }

    /// Whether the control connection is encrypted
    pub fn is_secure(&self) -> bool {
        self.reader
            .as_ref()
            .map(|reader| reader.get_ref().is_secure())
            .unwrap_or(false)
    }

    // -- single round trip commands

    /// Change working directory
    pub fn cwd(&mut self, path: &str) -> FtpResult<()> {
        debug!("Changing working directory to {}", path);
        self.guarded(|session| session.change_dir(path))
    }

    /// Get working directory
    pub fn pwd(&mut self) -> FtpResult<String> {
        debug!("Getting working directory");
        self.guarded(|session| session.working_dir())
    }

    /// Create a directory. Returns the path reported by the server
    pub fn mkdir(&mut self, path: &str) -> FtpResult<String> {
        debug!("Creating directory at {}", path);
        self.guarded(|session| {
            session.perform(Command::Mkd(path.to_string()))?;
            let response = session.read_response(Status::PathCreated)?;
            Ok(quoted_path(&response).unwrap_or_else(|| path.to_string()))
        })
    }

    /// Remove an empty directory
    pub fn rmdir(&mut self, path: &str) -> FtpResult<()> {
        debug!("Removing directory {}", path);
        self.guarded(|session| {
            session.perform(Command::Rmd(path.to_string()))?;
            session.read_response(Status::RequestedFileActionOk).map(|_| ())
        })
    }

    /// Remove a file
    pub fn rm(&mut self, path: &str) -> FtpResult<()> {
        debug!("Removing file {}", path);
        self.guarded(|session| {
            session.perform(Command::Dele(path.to_string()))?;
            session.read_response(Status::RequestedFileActionOk).map(|_| ())
        })
    }

    /// Size in bytes of the file at `path`
    pub fn size(&mut self, path: &str) -> FtpResult<u64> {
        debug!("Getting file size for {}", path);
        self.guarded(|session| session.file_size(path))
    }

    /// Set the representation type for the next transfers
    pub fn transfer_type(&mut self, transfer_type: TransferType) -> FtpResult<()> {
        debug!("Setting transfer type {}", transfer_type);
        self.guarded(|session| {
            session.perform(Command::Type(transfer_type))?;
            session.read_response(Status::CommandOk).map(|_| ())
        })
    }

    /// Whether `path` is a directory.
    ///
    /// Changes into `path` and back to the previous working directory. A `550` on the first
    /// `CWD` means `false`; any other failure is returned
    pub fn stat_directory(&mut self, path: &str) -> FtpResult<bool> {
        debug!("Checking whether {} is a directory", path);
        self.guarded(|session| {
            let origin = session.working_dir()?;
            match session.change_dir(path) {
                Ok(()) => {
                    session.change_dir(&origin)?;
                    Ok(true)
                }
                Err(FtpError::RemoteError(response))
                    if response.status() == Status::FileUnavailable =>
                {
                    Ok(false)
                }
                Err(err) => Err(err),
            }
        })
    }

    /// Whether `path` is a regular file.
    ///
    /// Uses `SIZE`; a `550` or `450` means `false`. Servers without `SIZE` are asked
    /// for a listing of `path` instead, with the same reading of `550` and `450`
    pub fn stat_file(&mut self, path: &str) -> FtpResult<bool> {
        debug!("Checking whether {} is a file", path);
        self.guarded(|session| match session.file_size(path) {
            Ok(_) => Ok(true),
            Err(FtpError::RemoteError(response)) => match response.status() {
                Status::FileUnavailable | Status::RequestFileActionIgnored => Ok(false),
                Status::BadCommand | Status::NotImplemented => {
                    debug!("SIZE not supported; listing {path}");
                    session.stat_file_by_listing(path)
                }
                _ => Err(FtpError::RemoteError(response)),
            },
            Err(err) => Err(err),
        })
    }

    fn stat_file_by_listing(&mut self, path: &str) -> FtpResult<bool> {
        let name = path.trim_end_matches('/').rsplit('/').next().unwrap_or(path);
        match self.stream_lines(Command::List(Some(path.to_string()))) {
            Ok(lines) => Ok(Listing::new(lines).any(|entry| entry.is_file() && entry.name() == name)),
            Err(err)
                if matches!(
                    err.response().map(|r| r.status()),
                    Some(Status::FileUnavailable | Status::RequestFileActionIgnored)
                ) =>
            {
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    // -- data commands

    /// List `path`, or the working directory. Lines which can't be parsed are skipped
    pub fn list(&mut self, path: Option<&str>) -> FtpResult<Listing> {
        debug!("Reading {} directory content", path.unwrap_or("working"));
        let lines =
            self.guarded(|session| session.stream_lines(Command::List(path.map(String::from))))?;
        Ok(Listing::new(lines))
    }

    /// Raw lines of the listing of `path`
    pub fn list_lines(&mut self, path: Option<&str>) -> FtpResult<Vec<String>> {
        self.guarded(|session| session.stream_lines(Command::List(path.map(String::from))))
    }

    /// Download `path`, passing the data stream to `reader`
    pub fn retr<F, D>(&mut self, path: &str, mut reader: F) -> FtpResult<D>
    where
        F: FnMut(&mut dyn Read) -> FtpResult<D>,
    {
        let mut stream = self.retr_as_stream(path)?;
        let result = reader(&mut stream);
        if result.is_err() {
            stream.abandon();
        }
        let completion = self.finalize_retr_stream(stream);
        match (result, completion) {
            (Ok(data), Ok(())) => Ok(data),
            (Err(err), _) => Err(err.at_stage(TransferStage::Transfer)),
            (Ok(_), Err(err)) => Err(err),
        }
    }

    /// Download `path` into memory
    pub fn retr_as_buffer(&mut self, path: &str) -> FtpResult<Cursor<Vec<u8>>> {
        self.retr(path, |stream| {
            let mut buf = Vec::new();
            stream
                .read_to_end(&mut buf)
                .map(|_| Cursor::new(buf))
                .map_err(FtpError::DataChannelError)
        })
    }

    /// Start downloading `path` and return the data stream.
    ///
    /// The session stays `Busy` until [`Self::finalize_retr_stream`] is called
    pub fn retr_as_stream(&mut self, path: &str) -> FtpResult<DataStream> {
        debug!("Retrieving '{}'", path);
        self.open_guarded(|session| session.data_command(Command::Retr(path.to_string())))
    }

    /// Close the stream obtained with [`Self::retr_as_stream`] and read the completion reply
    pub fn finalize_retr_stream(&mut self, stream: impl Read) -> FtpResult<()> {
        debug!("Finalizing retr stream");
        self.finalize(stream)
    }

    /// Upload the content of `r` to `path`. Returns the number of bytes sent
    pub fn put_file<R: Read>(&mut self, path: &str, r: &mut R) -> FtpResult<u64> {
        let mut stream = self.put_with_stream(path)?;
        let result = copy(r, &mut stream)
            .and_then(|bytes| stream.flush().map(|_| bytes))
            .map_err(FtpError::DataChannelError);
        if result.is_err() {
            stream.abandon();
        }
        let completion = self.finalize_put_stream(stream);
        match (result, completion) {
            (Ok(bytes), Ok(())) => Ok(bytes),
            (Err(err), _) => Err(err.at_stage(TransferStage::Transfer)),
            (Ok(_), Err(err)) => Err(err),
        }
    }

    /// Start uploading to `path` and return the data stream.
    ///
    /// The session stays `Busy` until [`Self::finalize_put_stream`] is called
    pub fn put_with_stream(&mut self, path: &str) -> FtpResult<DataStream> {
        debug!("Put file {}", path);
        self.open_guarded(|session| session.data_command(Command::Stor(path.to_string())))
    }

    /// Close the stream obtained with [`Self::put_with_stream`] and read the completion reply
    pub fn finalize_put_stream(&mut self, stream: impl Write) -> FtpResult<()> {
        debug!("Finalizing put stream");
        self.finalize(stream)
    }

    fn finalize<S>(&mut self, stream: S) -> FtpResult<()> {
        if self.state != SessionState::Busy {
            return Err(FtpError::InvalidState(self.state));
        }
        // the server sends the completion reply only once the data channel is closed
        drop(stream);
        trace!("dropped stream");
        let result = self.read_completion();
        self.finish(result)
    }

    // -- state handling

    /// Run `f` as one command: the session is `Busy` while it runs, then goes back to its
    /// previous state, or to `Disconnected` if the control connection was lost
    fn guarded<T, F>(&mut self, f: F) -> FtpResult<T>
    where
        F: FnOnce(&mut Self) -> FtpResult<T>,
    {
        self.begin()?;
        let result = f(self);
        self.finish(result)
    }

    /// Like [`Self::guarded`], but on success the session stays `Busy` until [`Self::finalize`]
    fn open_guarded<F>(&mut self, f: F) -> FtpResult<DataStream>
    where
        F: FnOnce(&mut Self) -> FtpResult<DataStream>,
    {
        self.begin()?;
        match f(self) {
            Ok(stream) => Ok(stream),
            Err(err) => self.finish(Err(err)),
        }
    }

    fn begin(&mut self) -> FtpResult<()> {
        match self.state {
            SessionState::Connected | SessionState::Authenticated => {
                self.idle_state = self.state;
                self.state = SessionState::Busy;
                Ok(())
            }
            state => Err(FtpError::InvalidState(state)),
        }
    }

    fn finish<T>(&mut self, result: FtpResult<T>) -> FtpResult<T> {
        let closing = match &result {
            Err(err) if err.is_connection_lost() => true,
            Err(err) => err.response().map(|r| r.status()) == Some(Status::NotAvailable),
            Ok(_) => false,
        };
        if closing {
            error!("Control connection lost; session is now disconnected");
            self.close_transport(false);
        } else {
            self.state = self.idle_state;
        }
        result
    }

    /// Drop the control connection. The TLS close notify is only sent when `graceful`
    fn close_transport(&mut self, graceful: bool) {
        if let Some(mut reader) = self.reader.take() {
            if !graceful {
                reader.get_mut().abandon();
            }
            trace!("Control connection closed");
        }
        self.state = SessionState::Disconnected;
        self.idle_state = SessionState::Disconnected;
    }

    fn clear_timeouts(&mut self) {
        if let Some(stream) = self.get_ref() {
            if let Err(err) = stream
                .set_read_timeout(None)
                .and_then(|_| stream.set_write_timeout(None))
            {
                warn!("Failed to clear control connection timeouts: {err}");
            }
        }
    }

    // -- raw commands; state is handled by the callers

    fn change_dir(&mut self, path: &str) -> FtpResult<()> {
        self.perform(Command::Cwd(path.to_string()))?;
        self.read_response_in(&[Status::RequestedFileActionOk, Status::CommandOk])
            .map(|_| ())
    }

    fn working_dir(&mut self) -> FtpResult<String> {
        self.perform(Command::Pwd)?;
        let response = self.read_response(Status::PathCreated)?;
        quoted_path(&response).ok_or(FtpError::UnexpectedResponse(response))
    }

    fn file_size(&mut self, path: &str) -> FtpResult<u64> {
        self.perform(Command::Size(path.to_string()))?;
        let response = self.read_response(Status::File)?;
        SIZE_RE
            .captures(&response.message)
            .and_then(|caps| caps[1].parse::<u64>().ok())
            .ok_or_else(|| FtpError::ProtocolError(format!("invalid SIZE reply: {response}")))
    }

    /// Negotiate a data channel, connect it and send `cmd`
    fn data_command(&mut self, cmd: Command) -> FtpResult<DataStream> {
        cmd.check()?;
        let addr = match self.mode {
            Mode::Passive => self.pasv(),
            Mode::ExtendedPassive => self.epsv(),
        }
        .map_err(|err| err.at_stage(TransferStage::PassiveMode))?;

        trace!("Opening data connection to {addr}");
        let stream = TcpStream::connect(addr)
            .map_err(|err| FtpError::DataChannelError(err).at_stage(TransferStage::DataConnection))?;

        self.perform(cmd)
            .and_then(|_| self.read_response_in(&TRANSFER_STARTING))
            .map_err(|err| err.at_stage(TransferStage::Command))?;

        self.secure_data_stream(stream)
            .map_err(|err| err.at_stage(TransferStage::DataConnection))
    }

    #[cfg(feature = "native-tls")]
    fn secure_data_stream(&self, stream: TcpStream) -> FtpResult<DataStream> {
        match self.tls_ctx {
            Some(ref tls_ctx) if self.is_secure() => tls_ctx
                .connect(&self.domain, stream)
                .map(|x| DataStream::Tls(Box::new(x))),
            _ => Ok(DataStream::Tcp(stream)),
        }
    }

    #[cfg(not(feature = "native-tls"))]
    fn secure_data_stream(&self, stream: TcpStream) -> FtpResult<DataStream> {
        Ok(DataStream::Tcp(stream))
    }

    /// Runs the PASV command to enter passive mode.
    fn pasv(&mut self) -> FtpResult<SocketAddr> {
        debug!("PASV command");
        self.perform(Command::Pasv)?;
        // PASV response format : 227 Entering Passive Mode (h1,h2,h3,h4,p1,p2).
        let response = self.read_response(Status::PassiveMode)?;
        let addr = passive::parse_pasv_reply(&response)?;
        trace!("Passive address: {addr}");
        if self.nat_workaround || addr.ip().is_unspecified() {
            let mut remote = self.peer_addr()?;
            remote.set_port(addr.port());
            trace!("Replacing site local address {} with {}", addr, remote);
            Ok(remote)
        } else {
            Ok(addr)
        }
    }

    /// Runs the EPSV to enter Extended passive mode.
    fn epsv(&mut self) -> FtpResult<SocketAddr> {
        debug!("EPSV command");
        self.perform(Command::Epsv)?;
        // EPSV response format : 229 Entering Extended Passive Mode (|||PORT|)
        let response = self.read_response(Status::ExtendedPassiveMode)?;
        let port = passive::parse_epsv_reply(&response)?;
        let mut remote = self.peer_addr()?;
        remote.set_port(port);
        trace!("Remote address for extended passive mode is {}", remote);
        Ok(remote)
    }

    fn peer_addr(&self) -> FtpResult<SocketAddr> {
        self.get_ref()
            .ok_or(FtpError::InvalidState(SessionState::Disconnected))?
            .peer_addr()
            .map_err(FtpError::ConnectionLost)
    }

    /// Execute a command which returns list of strings in a separate stream
    fn stream_lines(&mut self, cmd: Command) -> FtpResult<Vec<String>> {
        let mut data_stream = BufReader::new(self.data_command(cmd)?);
        let lines = Self::get_lines_from_stream(&mut data_stream);
        if lines.is_err() {
            data_stream.get_mut().abandon();
        }
        drop(data_stream);
        let completion = self.read_completion();
        let lines = lines.map_err(|err| err.at_stage(TransferStage::Transfer))?;
        completion.map(|_| lines)
    }

    /// Read a data stream line by line, dropping empty lines
    fn get_lines_from_stream(data_stream: &mut impl BufRead) -> FtpResult<Vec<String>> {
        let mut lines: Vec<String> = Vec::new();
        let mut line_buf = Vec::new();
        loop {
            line_buf.clear();
            match limited_read_until(data_stream, MAX_LIST_LINE_LEN, &mut line_buf) {
                Ok((_, 0)) => break,
                Ok((false, len)) if len == MAX_LIST_LINE_LEN => {
                    error!("listing line longer than {MAX_LIST_LINE_LEN} bytes");
                    return Err(FtpError::ProtocolError(format!(
                        "listing line longer than {MAX_LIST_LINE_LEN} bytes"
                    )));
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&line_buf);
                    trace!("STREAM IN: {:?}", line);
                    let line = line.trim_end_matches(['\r', '\n']);
                    if !line.is_empty() {
                        lines.push(line.to_string());
                    }
                }
                Err(err) => {
                    error!("failed to get lines from stream: {err}");
                    return Err(FtpError::DataChannelError(err));
                }
            }
        }
        Ok(lines)
    }

    fn read_completion(&mut self) -> FtpResult<()> {
        self.read_response_in(&TRANSFER_COMPLETE)
            .map(|_| ())
            .map_err(|err| err.at_stage(TransferStage::Completion))
    }

    // -- wire

    /// Read response from stream
    fn read_response(&mut self, expected_code: Status) -> FtpResult<Response> {
        self.read_response_in(&[expected_code])
    }

    /// Read a reply and check its code is one of `expected_code`
    fn read_response_in(&mut self, expected_code: &[Status]) -> FtpResult<Response> {
        let response = self.read_reply()?;
        if expected_code.iter().any(|status| status.code() == response.code) {
            Ok(response)
        } else if response.is_negative() {
            Err(FtpError::RemoteError(response))
        } else {
            Err(FtpError::UnexpectedResponse(response))
        }
    }

    /// Read a complete, possibly multi-line, reply
    fn read_reply(&mut self) -> FtpResult<Response> {
        let line = self.read_line()?;
        let mut builder = ReplyBuilder::new(&line)?;
        let mut lines = 1;
        while !builder.is_complete() {
            if lines == MAX_REPLY_LINES {
                return Err(FtpError::ProtocolError(format!(
                    "reply has more than {MAX_REPLY_LINES} lines"
                )));
            }
            let line = self.read_line()?;
            builder.feed(&line);
            lines += 1;
        }
        let response = builder.build();
        trace!("Code parsed from response: {} ({})", response.status(), response.code);
        Ok(response)
    }

    /// Read one line from the control channel, without the line terminator
    fn read_line(&mut self) -> FtpResult<String> {
        let reader = self
            .reader
            .as_mut()
            .ok_or(FtpError::InvalidState(SessionState::Disconnected))?;
        let mut buf = Vec::new();
        let (found, len) = limited_read_until(reader, MAX_REPLY_LINE_LEN, &mut buf)
            .map_err(FtpError::ConnectionLost)?;
        if len == 0 {
            return Err(FtpError::ConnectionLost(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed by server",
            )));
        }
        if !found && len == MAX_REPLY_LINE_LEN {
            return Err(FtpError::ProtocolError(format!(
                "reply line longer than {MAX_REPLY_LINE_LEN} bytes"
            )));
        }
        let line = String::from_utf8_lossy(&buf);
        trace!("CC IN: {:?}", line);
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Write data to stream with command to perform
    fn perform(&mut self, command: Command) -> FtpResult<()> {
        command.check()?;
        trace!("CC OUT: {}", command.log_line());
        let stream = self
            .reader
            .as_mut()
            .ok_or(FtpError::InvalidState(SessionState::Disconnected))?
            .get_mut();
        stream
            .write_all(command.to_string().as_bytes())
            .and_then(|_| stream.flush())
            .map_err(FtpError::ConnectionLost)
    }
}

/// Read up to `max_len` bytes into `buf`, stopping after the first `\n`.
/// Returns whether the delimiter was found and how many bytes were read
fn limited_read_until(
    reader: &mut impl BufRead,
    max_len: usize,
    buf: &mut Vec<u8>,
) -> std::io::Result<(bool, usize)> {
    let len = (&mut *reader).take(max_len as u64).read_until(b'\n', buf)?;
    Ok((buf.last() == Some(&b'\n'), len))
}

/// Extract the path from a `257 "path" ...` reply
fn quoted_path(response: &Response) -> Option<String> {
    QUOTED_PATH_RE
        .captures(&response.message)
        .map(|caps| caps[1].replace("\"\"", "\""))
}
