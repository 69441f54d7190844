// SPDX-License-Identifier: Apache-2.0

// Try not implement From for NplanError here unless you are sure this
// error should always convert to certain type of ErrorKind.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Malformed YAML, wrong node type, unknown key or duplicate mapping
    /// entry.
    ParseError,
    /// Invalid enum value, out of range integer, malformed address, MAC or
    /// netdef ID, invalid prefix length.
    SchemaError,
    /// Cross-reference still unresolved after the resolution fixed point.
    ReferenceError,
    /// Interface assigned to two bonds or bridges, duplicated bond primary,
    /// conflicting default routes, veth self peering and similar.
    ConsistencyError,
    /// A feature was requested that the chosen backend cannot express.
    BackendError,
    /// Cannot open, read, write or rename a file.
    FileError,
    Bug,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Error of the nplan library.
///
/// Carries the source file and position when the failure can be attributed
/// to a location in an input document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NplanError {
    kind: ErrorKind,
    msg: String,
    filepath: Option<PathBuf>,
    line: Option<usize>,
    column: Option<usize>,
}

impl NplanError {
    pub fn new(kind: ErrorKind, msg: String) -> Self {
        Self {
            kind,
            msg,
            filepath: None,
            line: None,
            column: None,
        }
    }

    /// Wrap a [serde_yaml::Error], preserving its position when the
    /// underlying parser provides one.
    pub fn from_yaml(e: &serde_yaml::Error, filepath: &Path) -> Self {
        let mut ret = Self::new(ErrorKind::ParseError, e.to_string())
            .with_file(filepath);
        if let Some(location) = e.location() {
            ret.line = Some(location.line());
            ret.column = Some(location.column());
        }
        ret
    }

    pub fn with_file(mut self, filepath: &Path) -> Self {
        self.filepath = Some(filepath.to_path_buf());
        self
    }

    pub fn with_position(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn msg(&self) -> &str {
        self.msg.as_str()
    }

    pub fn filepath(&self) -> Option<&Path> {
        self.filepath.as_deref()
    }

    pub fn position(&self) -> Option<(usize, usize)> {
        if let (Some(line), Some(column)) = (self.line, self.column) {
            Some((line, column))
        } else {
            None
        }
    }
}

impl std::fmt::Display for NplanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.filepath.as_ref(), self.line) {
            (Some(path), Some(line)) => write!(
                f,
                "{}:{}:{}: {}",
                path.display(),
                line,
                self.column.unwrap_or(0),
                self.msg
            ),
            (Some(path), None) => {
                write!(f, "{}: {}", path.display(), self.msg)
            }
            _ => write!(f, "{}", self.msg),
        }
    }
}

impl std::error::Error for NplanError {}

impl From<std::io::Error> for NplanError {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::FileError, e.to_string())
    }
}
