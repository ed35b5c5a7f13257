//! # List
//!
//! This module exposes the parser for the LIST command output.
//!
//! RFC 959 leaves the LIST output format open, so what comes back depends on the
//! remote server. In practice servers emit either POSIX `ls -l` style lines or MS-DOS
//! style lines; the format is detected line by line and lines matching neither are skipped.
//!
//! ```rust
//! use sproutftp::list::DirectoryEntry;
//!
//! let entry: DirectoryEntry = "-rw-rw-r-- 1 0  1  8192 Nov 5 2018 omar.txt".parse().unwrap();
//! assert_eq!(entry.name(), "omar.txt");
//! assert_eq!(entry.size(), Some(8192));
//! ```

mod entry_kind;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::prelude::{NaiveDate, NaiveDateTime, Utc};
use chrono::{Datelike, Duration};
use lazy_regex::{Lazy, Regex};
use thiserror::Error;

pub use self::entry_kind::EntryKind;

// -- Regex

/// Leading token of a POSIX line: entry type and permission bits, optionally followed by an ACL marker
static POSIX_PEX_RE: Lazy<Regex> = lazy_regex!(r"^[\-dlbcps][\-rwxsStT]{9}[.+@]?$");
/// Three letters month token
static MONTH_RE: Lazy<Regex> =
    lazy_regex!(r"(?i)^(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)$");
/// POSIX system regex to parse list output
static POSIX_LS_RE: Lazy<Regex> = lazy_regex!(
    r#"^([\-ld])[\-rwxsStT]{9}[.+@]?\s+\d+\s+[^ ]+\s+[^ ]+\s+(\d+)\s+([A-Za-z]{3}\s+\d{1,2}\s+(?:\d{1,2}:\d{2}|\d{4}))\s+(.+)$"#
);
/// Date prefix which marks a DOS line
static DOS_DATE_RE: Lazy<Regex> = lazy_regex!(r"^\d{2}-\d{2}-\d{2}");
/// DOS system regex to parse list output
static DOS_LS_RE: Lazy<Regex> = lazy_regex!(
    r#"^(\d{2}-\d{2}-(?:\d{4}|\d{2}))\s+(\d{1,2}:\d{2})\s*([AaPp][Mm])?\s+(?:(<DIR>)|([\d,]+))\s+(.+)$"#
);

// -- Directory entry

/// Describes an entry of a remote directory.
/// Entries are produced by parsing the LIST output; they have no identity beyond their name
/// within one listing.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct DirectoryEntry {
    name: String,
    kind: EntryKind,
    /// Size in bytes; unknown for DOS directories
    size: Option<u64>,
    /// Best-effort modification time, as printed by the server (no timezone)
    modified: Option<NaiveDateTime>,
}

// -- Error

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ParseError {
    #[error("Syntax error: invalid line")]
    SyntaxError,
    #[error("Bad file size")]
    BadSize,
}

impl DirectoryEntry {
    /// Build an entry from its parts
    pub fn new(
        name: impl Into<String>,
        kind: EntryKind,
        size: Option<u64>,
        modified: Option<NaiveDateTime>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            size,
            modified,
        }
    }

    // -- getters

    /// Get entry name
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Get entry kind
    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    /// Get whether entry is a directory
    pub fn is_directory(&self) -> bool {
        self.kind.is_directory()
    }

    /// Get whether entry is a file
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Get whether entry is a symlink
    pub fn is_symlink(&self) -> bool {
        self.kind.is_symlink()
    }

    /// Returns, if available, the file the symlink is pointing to
    pub fn symlink(&self) -> Option<&Path> {
        self.kind.symlink()
    }

    /// Size in bytes, when known
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Last modification time, when the server printed one we understand
    pub fn modified(&self) -> Option<NaiveDateTime> {
        self.modified
    }

    // -- parsers

    /// Parse one line of LIST output, detecting whether it is POSIX or DOS formatted
    pub fn from_line(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if Self::looks_like_posix(line) {
            Self::from_posix_line(line)
        } else if DOS_DATE_RE.is_match(line) {
            Self::from_dos_line(line)
        } else {
            Err(ParseError::SyntaxError)
        }
    }

    /// A POSIX line starts with permission bits and carries a three letters month
    fn looks_like_posix(line: &str) -> bool {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some(pex) if POSIX_PEX_RE.is_match(pex) => tokens.any(|t| MONTH_RE.is_match(t)),
            _ => false,
        }
    }

    /// Parse a POSIX LIST output line and if it is valid, return a `DirectoryEntry`.
    ///
    /// ```text
    /// -rw-r--r--   1 user  group     123 Jan  1 00:00 a.txt
    /// lrwxrwxrwx   1 user  group       9 Nov  5  2018 docs -> /srv/docs
    /// ```
    pub fn from_posix_line(line: &str) -> Result<Self, ParseError> {
        let metadata = POSIX_LS_RE
            .captures(line)
            .ok_or(ParseError::SyntaxError)?;
        trace!("Parsed POSIX line {}", line);
        let kind = match &metadata[1] {
            "d" => EntryKind::Directory,
            "l" => EntryKind::Symlink(None),
            _ => EntryKind::File,
        };
        let size = metadata[2]
            .parse::<u64>()
            .map_err(|_| ParseError::BadSize)?;
        let modified = Self::parse_lstime(metadata[3].trim());
        let (name, kind) = match kind {
            EntryKind::Symlink(_) => {
                let (name, target) = Self::get_name_and_link(&metadata[4]);
                (name, EntryKind::Symlink(target))
            }
            kind => (metadata[4].to_string(), kind),
        };
        trace!(
            "Found entry with name {}, kind: {:?}, size: {}, modified: {:?}",
            name,
            kind,
            size,
            modified
        );
        Ok(Self {
            name,
            kind,
            size: Some(size),
            modified,
        })
    }

    /// Try to parse a LIST output line in DOS format.
    ///
    /// ```text
    /// {DATE} {TIME} {<DIR> | SIZE} {FILENAME}
    /// 10-19-20  03:19PM <DIR> pub
    /// 04-08-14  03:09PM 403   readme.txt
    /// ```
    pub fn from_dos_line(line: &str) -> Result<Self, ParseError> {
        let metadata = DOS_LS_RE.captures(line).ok_or(ParseError::SyntaxError)?;
        trace!("Parsed DOS line {}", line);
        let modified = Self::parse_dostime(
            &metadata[1],
            &metadata[2],
            metadata.get(3).map(|x| x.as_str()),
        );
        let (kind, size) = match (metadata.get(4), metadata.get(5)) {
            (Some(_), _) => (EntryKind::Directory, None),
            (None, Some(size)) => {
                let size = size
                    .as_str()
                    .replace(',', "")
                    .parse::<u64>()
                    .map_err(|_| ParseError::BadSize)?;
                (EntryKind::File, Some(size))
            }
            (None, None) => return Err(ParseError::SyntaxError),
        };
        let name = metadata[6].to_string();
        trace!(
            "Found entry with name {}, kind: {:?}, size: {:?}",
            name,
            kind,
            size
        );
        Ok(Self {
            name,
            kind,
            size,
            modified,
        })
    }

    /// Returns from a `ls -l` name token the name of the file and the symbolic link target (if there is any)
    fn get_name_and_link(token: &str) -> (String, Option<PathBuf>) {
        match token.split_once(" -> ") {
            Some((name, target)) => (name.to_string(), Some(PathBuf::from(target))),
            None => (token.to_string(), None),
        }
    }

    /// Convert ls syntax time.
    /// ls time has two possible syntax:
    /// 1. if the date is within the last six months: %b %d %H:%M (e.g. Nov 5 13:46)
    /// 2. else: %b %d %Y (e.g. Nov 5 2019)
    ///
    /// In the first case the year is the current one, unless that would put the date in the future.
    fn parse_lstime(tm: &str) -> Option<NaiveDateTime> {
        let tm = tm.split_whitespace().collect::<Vec<&str>>().join(" ");
        if let Ok(date) = NaiveDate::parse_from_str(&tm, "%b %d %Y") {
            return date.and_hms_opt(0, 0, 0);
        }
        let now = Utc::now().naive_utc();
        let this_year = now.year();
        let parse_in = |year: i32| {
            NaiveDateTime::parse_from_str(&format!("{tm} {year}"), "%b %d %H:%M %Y").ok()
        };
        match parse_in(this_year) {
            Some(dt) if dt > now + Duration::days(1) => parse_in(this_year - 1),
            Some(dt) => Some(dt),
            // i.e. Feb 29 printed during a leap year we are no longer in
            None => parse_in(this_year - 1),
        }
    }

    /// Parse date and time in DOS representation; both 12 and 24 hours clocks are accepted
    fn parse_dostime(date: &str, time: &str, meridiem: Option<&str>) -> Option<NaiveDateTime> {
        let date_fmt = if date.len() == 10 { "%m-%d-%Y" } else { "%m-%d-%y" };
        match meridiem {
            Some(meridiem) => NaiveDateTime::parse_from_str(
                &format!("{date} {time}{meridiem}"),
                &format!("{date_fmt} %I:%M%p"),
            ),
            None => NaiveDateTime::parse_from_str(
                &format!("{date} {time}"),
                &format!("{date_fmt} %H:%M"),
            ),
        }
        .ok()
    }
}

impl FromStr for DirectoryEntry {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_line(s)
    }
}

impl TryFrom<&str> for DirectoryEntry {
    type Error = ParseError;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        Self::from_line(line)
    }
}

// -- listing

/// Entries of one LIST data channel.
///
/// Lines are parsed lazily as the iterator is advanced; lines which can't be parsed are skipped.
/// The sequence is finite and can't be restarted: listing again requires a new LIST command.
#[derive(Debug)]
pub struct Listing {
    lines: std::vec::IntoIter<String>,
}

impl Listing {
    /// Build a listing from the raw lines read from the data channel
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines: lines.into_iter(),
        }
    }
}

impl Iterator for Listing {
    type Item = DirectoryEntry;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            match DirectoryEntry::from_line(&line) {
                Ok(entry) => return Some(entry),
                Err(err) => trace!("Skipping LIST line {:?}: {}", line, err),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.lines.size_hint().1)
    }
}
