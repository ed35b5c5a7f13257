//! # Passive
//!
//! Decodes the data channel address advertised in PASV and EPSV replies

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::regex::{EPSV_PORT_RE, PASV_PORT_RE};
use crate::types::{FtpError, FtpResult, Response};

/// Parse the `(h1,h2,h3,h4,p1,p2)` tuple of a 227 reply into `h1.h2.h3.h4:(p1 * 256 + p2)`
pub(crate) fn parse_pasv_reply(response: &Response) -> FtpResult<SocketAddr> {
    let caps = PASV_PORT_RE
        .captures(&response.message)
        .ok_or_else(|| FtpError::ProtocolError(format!("invalid PASV reply: {response}")))?;
    let mut octets = [0u8; 6];
    for (i, octet) in octets.iter_mut().enumerate() {
        *octet = caps[i + 1].parse::<u8>().map_err(|_| {
            FtpError::ProtocolError(format!("PASV field out of range: {}", &caps[i + 1]))
        })?;
    }
    let ip = Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);
    let port = (u16::from(octets[4]) << 8) | u16::from(octets[5]);
    Ok(SocketAddr::new(IpAddr::V4(ip), port))
}

/// Parse the port of a 229 reply, `(|||port|)`
pub(crate) fn parse_epsv_reply(response: &Response) -> FtpResult<u16> {
    let caps = EPSV_PORT_RE
        .captures(&response.message)
        .ok_or_else(|| FtpError::ProtocolError(format!("invalid EPSV reply: {response}")))?;
    caps[1]
        .parse::<u16>()
        .map_err(|_| FtpError::ProtocolError(format!("EPSV port out of range: {}", &caps[1])))
}
