//! # Tls
//!
//! native-tls wrappers for FTPS control and data channels

use std::io::Write;
use std::net::TcpStream;

use native_tls::{TlsConnector as NativeTlsConnector, TlsStream as NativeTlsStream};

use crate::types::{FtpError, FtpResult};

#[derive(Debug, Clone)]
/// A Wrapper for the tls connector
pub struct TlsConnector {
    connector: NativeTlsConnector,
}

impl From<NativeTlsConnector> for TlsConnector {
    fn from(connector: NativeTlsConnector) -> Self {
        Self { connector }
    }
}

impl TlsConnector {
    /// Build a connector with the system trust store.
    /// When `accept_invalid_certs` is set, neither the certificate nor the host name are verified
    pub fn new(accept_invalid_certs: bool) -> FtpResult<Self> {
        NativeTlsConnector::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .danger_accept_invalid_hostnames(accept_invalid_certs)
            .build()
            .map(Self::from)
            .map_err(|e| FtpError::SecureError(e.to_string()))
    }

    /// Run the TLS handshake over `stream`
    pub fn connect(&self, domain: &str, stream: TcpStream) -> FtpResult<TlsStream> {
        self.connector
            .connect(domain, stream)
            .map(TlsStream::from)
            .map_err(|e| FtpError::SecureError(format!("{e}")))
    }
}

/// Tls stream wrapper. Sends the TLS close notify when dropped
#[derive(Debug)]
pub struct TlsStream {
    stream: NativeTlsStream<TcpStream>,
    ssl_shutdown: bool,
}

impl TlsStream {
    /// Get ref to underlying tcp stream
    pub(crate) fn get_ref(&self) -> &TcpStream {
        self.stream.get_ref()
    }

    /// Get mutable reference to tls stream
    pub(crate) fn mut_ref(&mut self) -> &mut NativeTlsStream<TcpStream> {
        &mut self.stream
    }

    /// Skip the close notify on drop; the peer is known to be gone
    pub(crate) fn skip_shutdown(&mut self) {
        self.ssl_shutdown = false;
    }
}

impl From<NativeTlsStream<TcpStream>> for TlsStream {
    fn from(stream: NativeTlsStream<TcpStream>) -> Self {
        Self {
            stream,
            ssl_shutdown: true,
        }
    }
}

impl Drop for TlsStream {
    fn drop(&mut self) {
        if self.ssl_shutdown {
            if let Err(err) = self.stream.shutdown() {
                error!("Failed to shutdown stream: {}", err);
            } else {
                debug!("TLS Stream shut down");
            }
        } else if let Err(err) = self.stream.get_mut().flush() {
            debug!("Error in flushing tcp stream: {}", err);
        }
    }
}
