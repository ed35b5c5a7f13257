//! # Data Stream
//!
//! This module exposes the data stream where bytes must be written to/read from

use std::io::{Read, Result, Write};
use std::net::TcpStream;

#[cfg(feature = "native-tls")]
use super::tls::TlsStream;

/// Data Stream used for communications. It can be both of type Tcp in case of plain communication or Tls in case of FTPS
#[derive(Debug)]
pub enum DataStream {
    Tcp(TcpStream),
    #[cfg(feature = "native-tls")]
    #[cfg_attr(docsrs, doc(cfg(feature = "native-tls")))]
    Tls(Box<TlsStream>),
}

impl DataStream {
    /// Returns a reference to the underlying TcpStream.
    pub fn get_ref(&self) -> &TcpStream {
        match self {
            DataStream::Tcp(ref stream) => stream,
            #[cfg(feature = "native-tls")]
            DataStream::Tls(ref stream) => stream.get_ref(),
        }
    }

    /// Whether the stream is encrypted
    pub fn is_secure(&self) -> bool {
        !matches!(self, DataStream::Tcp(_))
    }

    /// Unwrap a plain stream. Returns the stream back if it is encrypted
    #[cfg(feature = "native-tls")]
    pub(crate) fn into_tcp_stream(self) -> std::result::Result<TcpStream, Self> {
        match self {
            DataStream::Tcp(stream) => Ok(stream),
            stream => Err(stream),
        }
    }

    /// Mark the stream as dead, so dropping it won't try to talk to the peer
    pub(crate) fn abandon(&mut self) {
        match self {
            DataStream::Tcp(_) => {}
            #[cfg(feature = "native-tls")]
            DataStream::Tls(stream) => stream.skip_shutdown(),
        }
    }
}

impl Read for DataStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            DataStream::Tcp(ref mut stream) => stream.read(buf),
            #[cfg(feature = "native-tls")]
            DataStream::Tls(ref mut stream) => stream.mut_ref().read(buf),
        }
    }
}

impl Write for DataStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self {
            DataStream::Tcp(ref mut stream) => stream.write(buf),
            #[cfg(feature = "native-tls")]
            DataStream::Tls(ref mut stream) => stream.mut_ref().write(buf),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self {
            DataStream::Tcp(ref mut stream) => stream.flush(),
            #[cfg(feature = "native-tls")]
            DataStream::Tls(ref mut stream) => stream.mut_ref().flush(),
        }
    }
}
