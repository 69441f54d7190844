// SPDX-License-Identifier: Apache-2.0

pub(crate) mod networkd;
pub(crate) mod nm;

use std::path::Path;

use crate::{ErrorKind, NplanError};

/// Escape a netdef ID for use as a file name component, URL style.
pub(crate) fn escape_filename(id: &str) -> String {
    let mut escaped = String::with_capacity(id.len());
    for byte in id.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.' => escaped.push(byte as char),
            _ => escaped.push_str(&format!("%{byte:02X}")),
        }
    }
    escaped
}

/// Write a generated file, creating parent directories as needed.
pub(crate) fn write_file(
    path: &Path,
    content: &str,
    mode: u32,
) -> Result<(), NplanError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            NplanError::new(
                ErrorKind::FileError,
                format!("Cannot create {}: {e}", parent.display()),
            )
        })?;
    }
    std::fs::write(path, content).map_err(|e| {
        NplanError::new(
            ErrorKind::FileError,
            format!("Cannot write {}: {e}", path.display()),
        )
    })?;
    set_mode(path, mode)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), NplanError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| {
            NplanError::new(
                ErrorKind::FileError,
                format!("Cannot chmod {}: {e}", path.display()),
            )
        })
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), NplanError> {
    Ok(())
}

/// Unlink every file in `dir` whose name starts with `prefix` and ends
/// with `suffix`. Missing directories are fine.
pub(crate) fn cleanup_dir(
    dir: &Path,
    prefix: &str,
    suffix: &str,
) -> Result<(), NplanError> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Ok(());
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str())
        else {
            continue;
        };
        if name.starts_with(prefix) && name.ends_with(suffix) {
            std::fs::remove_file(&path).map_err(|e| {
                NplanError::new(
                    ErrorKind::FileError,
                    format!("Cannot remove {}: {e}", path.display()),
                )
            })?;
        }
    }
    Ok(())
}

/// `yes`/`no` spelling used by both backends' boolean keys.
pub(crate) fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_filename() {
        assert_eq!(escape_filename("eth0"), "eth0");
        assert_eq!(escape_filename("br-lan.10"), "br-lan.10");
        assert_eq!(escape_filename("eth 0/a"), "eth%200%2Fa");
    }
}
