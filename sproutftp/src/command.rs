//! # Command
//!
//! The set of FTP commands sent on the control channel

use std::fmt;

use crate::types::{FtpError, FtpResult, TransferType};

#[derive(Debug, Clone, PartialEq, Eq)]
/// Ftp commands with their arguments
pub enum Command {
    /// Set auth to TLS
    #[cfg(feature = "native-tls")]
    Auth,
    /// Change working directory
    Cwd(String),
    /// Remove file at specified path
    Dele(String),
    /// Extended passive mode <https://www.rfc-editor.org/rfc/rfc2428#section-3>
    Epsv,
    /// List entries at specified path. If path is not provided list entries at current working directory
    List(Option<String>),
    /// Make directory
    Mkd(String),
    /// Provide login password
    Pass(String),
    /// Passive mode
    Pasv,
    /// Protection buffer size
    #[cfg(feature = "native-tls")]
    Pbsz(usize),
    /// Set protection level for the data channel
    #[cfg(feature = "native-tls")]
    Prot(ProtectionLevel),
    /// Print working directory
    Pwd,
    /// Quit
    Quit,
    /// Retrieve file
    Retr(String),
    /// Remove directory
    Rmd(String),
    /// Get file size of specified path
    Size(String),
    /// Put file at specified path
    Stor(String),
    /// Set transfer type
    Type(TransferType),
    /// Provide user to login as
    User(String),
}

#[cfg(feature = "native-tls")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(unused)]
/// Protection level; argument for `Prot` command
pub enum ProtectionLevel {
    Clear,
    Private,
}

impl Command {
    /// The command line as it should appear in logs; secrets are masked
    pub fn log_line(&self) -> String {
        match self {
            Self::Pass(_) => "PASS ******".to_string(),
            cmd => cmd.to_string().trim_end_matches("\r\n").to_string(),
        }
    }

    /// The free-form argument of the command, if any
    fn argument(&self) -> Option<&str> {
        match self {
            Self::Cwd(arg)
            | Self::Dele(arg)
            | Self::List(Some(arg))
            | Self::Mkd(arg)
            | Self::Pass(arg)
            | Self::Retr(arg)
            | Self::Rmd(arg)
            | Self::Size(arg)
            | Self::Stor(arg)
            | Self::User(arg) => Some(arg.as_str()),
            _ => None,
        }
    }

    /// Make sure the command fits on one control line.
    /// A line break in the argument would end the command early and inject the rest
    pub fn check(&self) -> FtpResult<()> {
        match self.argument() {
            Some(arg) if arg.contains(['\r', '\n']) => Err(FtpError::InvalidArgument(match self {
                Self::Pass(_) => String::from("******"),
                _ => arg.to_string(),
            })),
            _ => Ok(()),
        }
    }
}

// -- stringify

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(feature = "native-tls")]
            Self::Auth => write!(f, "AUTH TLS"),
            Self::Cwd(d) => write!(f, "CWD {d}"),
            Self::Dele(p) => write!(f, "DELE {p}"),
            Self::Epsv => write!(f, "EPSV"),
            Self::List(Some(p)) => write!(f, "LIST {p}"),
            Self::List(None) => write!(f, "LIST"),
            Self::Mkd(p) => write!(f, "MKD {p}"),
            Self::Pass(p) => write!(f, "PASS {p}"),
            Self::Pasv => write!(f, "PASV"),
            #[cfg(feature = "native-tls")]
            Self::Pbsz(sz) => write!(f, "PBSZ {sz}"),
            #[cfg(feature = "native-tls")]
            Self::Prot(l) => write!(f, "PROT {l}"),
            Self::Pwd => write!(f, "PWD"),
            Self::Quit => write!(f, "QUIT"),
            Self::Retr(p) => write!(f, "RETR {p}"),
            Self::Rmd(p) => write!(f, "RMD {p}"),
            Self::Size(p) => write!(f, "SIZE {p}"),
            Self::Stor(p) => write!(f, "STOR {p}"),
            Self::Type(t) => write!(f, "TYPE {t}"),
            Self::User(u) => write!(f, "USER {u}"),
        }?;
        f.write_str("\r\n")
    }
}

#[cfg(feature = "native-tls")]
impl fmt::Display for ProtectionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Clear => "C",
            Self::Private => "P",
        })
    }
}

#[cfg(test)]
mod test {

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn should_reject_line_breaks_in_arguments() {
        assert!(Command::Retr(String::from("/a.txt")).check().is_ok());
        assert!(Command::List(None).check().is_ok());
        assert!(matches!(
            Command::Retr(String::from("/a.txt\r\nDELE /b.txt")).check(),
            Err(FtpError::InvalidArgument(arg)) if arg == "/a.txt\r\nDELE /b.txt"
        ));
        assert!(Command::Dele(String::from("/a\n")).check().is_err());
        assert!(Command::Stor(String::from("/a\rb")).check().is_err());
        assert!(Command::User(String::from("bob\r\nSITE x")).check().is_err());
        assert!(matches!(
            Command::Pass(String::from("secret\nSITE x")).check(),
            Err(FtpError::InvalidArgument(arg)) if arg == "******"
        ));
    }

    #[test]
    fn should_stringify_command() {
        assert_eq!(
            Command::Cwd(String::from("/tmp")).to_string().as_str(),
            "CWD /tmp\r\n"
        );
        assert_eq!(
            Command::Dele(String::from("a.txt")).to_string().as_str(),
            "DELE a.txt\r\n"
        );
        assert_eq!(Command::Epsv.to_string().as_str(), "EPSV\r\n");
        assert_eq!(
            Command::List(Some(String::from("/tmp")))
                .to_string()
                .as_str(),
            "LIST /tmp\r\n"
        );
        assert_eq!(Command::List(None).to_string().as_str(), "LIST\r\n");
        assert_eq!(
            Command::Mkd(String::from("/tmp")).to_string().as_str(),
            "MKD /tmp\r\n"
        );
        assert_eq!(
            Command::Pass(String::from("qwerty123"))
                .to_string()
                .as_str(),
            "PASS qwerty123\r\n"
        );
        assert_eq!(Command::Pasv.to_string().as_str(), "PASV\r\n");
        assert_eq!(Command::Pwd.to_string().as_str(), "PWD\r\n");
        assert_eq!(Command::Quit.to_string().as_str(), "QUIT\r\n");
        assert_eq!(
            Command::Retr(String::from("a.txt")).to_string().as_str(),
            "RETR a.txt\r\n"
        );
        assert_eq!(
            Command::Rmd(String::from("/tmp")).to_string().as_str(),
            "RMD /tmp\r\n"
        );
        assert_eq!(
            Command::Size(String::from("a.txt")).to_string().as_str(),
            "SIZE a.txt\r\n"
        );
        assert_eq!(
            Command::Stor(String::from("a.txt")).to_string().as_str(),
            "STOR a.txt\r\n"
        );
        assert_eq!(
            Command::Type(TransferType::Binary).to_string().as_str(),
            "TYPE I\r\n"
        );
        assert_eq!(
            Command::User(String::from("omar")).to_string().as_str(),
            "USER omar\r\n"
        );
    }

    #[test]
    fn should_keep_spaces_in_path_argument() {
        assert_eq!(
            Command::Stor(String::from("/upload/my report.pdf"))
                .to_string()
                .as_str(),
            "STOR /upload/my report.pdf\r\n"
        );
    }

    #[test]
    fn should_mask_password_in_log_line() {
        assert_eq!(
            Command::Pass(String::from("secret")).log_line().as_str(),
            "PASS ******"
        );
        assert_eq!(
            Command::User(String::from("omar")).log_line().as_str(),
            "USER omar"
        );
    }

    #[cfg(feature = "native-tls")]
    #[test]
    fn should_stringify_secure_commands() {
        assert_eq!(Command::Auth.to_string().as_str(), "AUTH TLS\r\n");
        assert_eq!(Command::Pbsz(0).to_string().as_str(), "PBSZ 0\r\n");
        assert_eq!(
            Command::Prot(ProtectionLevel::Private).to_string().as_str(),
            "PROT P\r\n"
        );
    }
}
