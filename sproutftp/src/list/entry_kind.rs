use std::fmt;
use std::path::{Path, PathBuf};

/// Describes the kind of a directory entry. Can be `Directory`, `File` or `Symlink`.
/// If `Symlink` and the server told us, the path to the pointed file is provided.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum EntryKind {
    /// Directory type
    Directory,
    /// Regular file type
    File,
    /// Symlink type with the path to the pointed file
    Symlink(Option<PathBuf>),
}

impl EntryKind {
    /// Returns whether the entry is a directory
    pub fn is_directory(&self) -> bool {
        matches!(self, &EntryKind::Directory)
    }

    /// Returns whether the entry is a file
    pub fn is_file(&self) -> bool {
        matches!(self, &EntryKind::File)
    }

    /// Returns whether the entry is a symlink
    pub fn is_symlink(&self) -> bool {
        matches!(self, &EntryKind::Symlink(_))
    }

    /// get symlink target if any
    pub fn symlink(&self) -> Option<&Path> {
        match self {
            EntryKind::Symlink(p) => p.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntryKind::Directory => "dir",
            EntryKind::File => "file",
            EntryKind::Symlink(_) => "link",
        })
    }
}
