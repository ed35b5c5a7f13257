//! # FTP Regex
//!
//! Regular expressions to parse FTP replies

use lazy_regex::{Lazy, Regex};

/// This regex extracts IP and Port details from PASV command response.
/// The regex looks for the pattern (h1,h2,h3,h4,p1,p2).
pub static PASV_PORT_RE: Lazy<Regex> =
    lazy_regex!(r"\((\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3})\)");

/// This regex extract the port number from EPSV command response.
/// The regex looks for the pattern (|||port_number|)
pub static EPSV_PORT_RE: Lazy<Regex> = lazy_regex!(r"\(\|\|\|(\d{1,5})\|\)");

/// This regex extracts file size from SIZE command response.
pub static SIZE_RE: Lazy<Regex> = lazy_regex!(r"\s*(\d+)\s*$");

/// This regex extracts the quoted directory name from a PWD/MKD response.
/// Quotes inside the name are doubled (rfc 959, appendix II)
pub static QUOTED_PATH_RE: Lazy<Regex> = lazy_regex!(r#""((?:[^"]|"")*)""#);
