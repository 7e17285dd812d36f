/*
 * SPDX-FileCopyrightText: 2026 The gcm-prep contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

#![doc = include_str!("../README.md")]
// for now we don't need any new feature but we might remove this in the future
#![deny(unstable_features)]
#![deny(trivial_casts)]
#![deny(unconditional_recursion)]
#![deny(clippy::empty_loop)]
#![deny(unreachable_code)]
#![deny(unreachable_pub)]
#![deny(unreachable_patterns)]
#![deny(unused_macro_rules)]
#![deny(unused_doc_comments)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod normalize;
pub mod pipeline;
pub mod process;
pub mod remap;
pub mod workspace;

/// Prelude module to import everything from this crate
pub mod prelude {
    pub use crate::normalize::*;
    pub use crate::pipeline::*;
    pub use crate::process::*;
    pub use crate::remap::*;
    pub use crate::workspace::*;
}

use std::path::{Path, PathBuf};

/// Inserts a suffix between the stem and the extension of the file name of
/// a path, so that `karate.txt` with suffix `_key` becomes `karate_key.txt`.
///
/// Paths without a file name are returned with the suffix as file name.
pub fn with_stem_suffix(path: impl AsRef<Path>, suffix: impl AsRef<str>) -> PathBuf {
    let path = path.as_ref();
    let mut file_name = path.file_stem().unwrap_or_default().to_owned();
    file_name.push(suffix.as_ref());
    if let Some(extension) = path.extension() {
        file_name.push(".");
        file_name.push(extension);
    }
    path.with_file_name(file_name)
}

/// Returns the directory containing `path`, using `.` for bare file names.
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Creates a temporary file in the directory of `dest`, to be persisted
/// onto `dest` once completely written.
///
/// If `dest` exists the temporary file gets its permissions; otherwise it
/// gets the permissions of a file created with [`File::create`](std::fs::File::create).
pub(crate) fn temp_file_for(
    dest: &Path,
    prefix: &str,
) -> std::io::Result<tempfile::NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // subject to the umask
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    let tmp = builder.tempfile_in(parent_dir(dest))?;
    if let Ok(metadata) = std::fs::metadata(dest) {
        tmp.as_file().set_permissions(metadata.permissions())?;
    }
    Ok(tmp)
}
