/*
 * SPDX-FileCopyrightText: 2026 The gcm-prep contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Translation of partitions from dense ids back to the original labels.
//!
//! The clustering code writes, for a formatted edge list `f`, a file
//! `partition_f` containing one integer cluster label per line, where line
//! *i* refers to dense id *i*. The remapper inverts the mapping file written
//! by the [`Normalizer`](crate::normalize::Normalizer) and rewrites the
//! partition file in place with lines `<label> <cluster>`, in increasing
//! dense id order.

use crate::temp_file_for;
use dsi_progress_logger::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The prefix the clustering code adds to the name of its result file.
pub const PARTITION_PREFIX: &str = "partition_";

#[derive(Error, Debug)]
pub enum RemapError {
    #[error("Dense id {dense_id} appears in the partition but not in the mapping {}", .key_file.display())]
    MissingMapping { key_file: PathBuf, dense_id: usize },
    #[error("Line {line_number} of mapping {} is not of the form '<label> <id>': {line:?}", .path.display())]
    MalformedMapping {
        path: PathBuf,
        line_number: usize,
        line: String,
    },
    #[error("Dense id {dense_id} appears twice in mapping {}", .path.display())]
    DuplicateId { path: PathBuf, dense_id: usize },
    #[error("Line {line_number} of partition {} is not an integer cluster label: {line:?}", .path.display())]
    MalformedPartition {
        path: PathBuf,
        line_number: usize,
        line: String,
    },
    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RemapError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| RemapError::Io {
            path: path.to_owned(),
            source,
        }
    }
}

/// Returns the name of the partition file the clustering code writes for a
/// formatted edge list.
pub fn partition_file_name(formatted: impl AsRef<Path>) -> PathBuf {
    let mut name = std::ffi::OsString::from(PARTITION_PREFIX);
    name.push(formatted.as_ref().file_name().unwrap_or_default());
    PathBuf::from(name)
}

/// Reads a mapping file and inverts it.
///
/// The element of index *i* of the result is the label of dense id *i*
/// (index 0 is never used). Labels are opaque tokens: they are returned as
/// written, even if they look like integers. Since labels might contain
/// spaces, the id is taken after the last run of whitespace.
pub fn read_inverse_mapping(path: impl AsRef<Path>) -> Result<Vec<Option<String>>, RemapError> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path).map_err(RemapError::io(path))?);
    let mut labels: Vec<Option<String>> = vec![None];

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(RemapError::io(path))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let malformed = || RemapError::MalformedMapping {
            path: path.to_owned(),
            line_number: index + 1,
            line: line.clone(),
        };
        let (label, id) = trimmed
            .rsplit_once(char::is_whitespace)
            .ok_or_else(malformed)?;
        let label = label.trim_end();
        let dense_id = id.parse::<usize>().map_err(|_| malformed())?;
        if label.is_empty() || dense_id == 0 {
            return Err(malformed());
        }

        if labels.len() <= dense_id {
            labels.resize(dense_id + 1, None);
        }
        if labels[dense_id].replace(label.to_owned()).is_some() {
            return Err(RemapError::DuplicateId {
                path: path.to_owned(),
                dense_id,
            });
        }
    }
    Ok(labels)
}

/// Reads a partition file: one integer cluster label per line, the line
/// number being the dense id.
pub fn read_partition(path: impl AsRef<Path>) -> Result<Vec<i64>, RemapError> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path).map_err(RemapError::io(path))?);
    reader
        .lines()
        .enumerate()
        .map(|(index, line)| {
            let line = line.map_err(RemapError::io(path))?;
            line.trim()
                .parse::<i64>()
                .map_err(|_| RemapError::MalformedPartition {
                    path: path.to_owned(),
                    line_number: index + 1,
                    line,
                })
        })
        .collect()
}

/// Rewrites `partition_file` in place replacing dense ids with the labels of
/// `key_file`, returning the number of nodes written.
///
/// Every dense id of the partition must have a label; otherwise
/// [`RemapError::MissingMapping`] is returned and the partition file is left
/// untouched.
pub fn remap_file(
    key_file: impl AsRef<Path>,
    partition_file: impl AsRef<Path>,
    pl: &mut impl ProgressLog,
) -> Result<usize, RemapError> {
    let key_file = key_file.as_ref();
    let partition_file = partition_file.as_ref();

    let partition = read_partition(partition_file)?;
    let labels = read_inverse_mapping(key_file)?;
    log::info!(
        "Remapping {} nodes of {} using {}",
        partition.len(),
        partition_file.display(),
        key_file.display()
    );

    // check everything before touching the result
    let remapped = partition
        .iter()
        .enumerate()
        .map(|(index, cluster)| {
            let dense_id = index + 1;
            match labels.get(dense_id) {
                Some(Some(label)) => Ok((label.as_str(), *cluster)),
                _ => Err(RemapError::MissingMapping {
                    key_file: key_file.to_owned(),
                    dense_id,
                }),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let tmp = temp_file_for(partition_file, ".gcm_partition_")
        .map_err(RemapError::io(partition_file))?;
    let mut writer = BufWriter::new(tmp.as_file());

    pl.item_name("node").expected_updates(Some(remapped.len()));
    pl.start(format!("Writing {}", partition_file.display()));
    for (label, cluster) in &remapped {
        writeln!(writer, "{} {}", label, cluster).map_err(RemapError::io(partition_file))?;
        pl.light_update();
    }
    writer.flush().map_err(RemapError::io(partition_file))?;
    drop(writer);
    pl.done();

    tmp.persist(partition_file)
        .map_err(|err| RemapError::io(partition_file)(err.error))?;
    Ok(remapped.len())
}

/// Remaps the partition the clustering code produced for `formatted`, which
/// is expected in the same directory as `formatted`.
///
/// Returns the path of the rewritten partition file.
pub fn remap_partition(
    key_file: impl AsRef<Path>,
    formatted: impl AsRef<Path>,
    pl: &mut impl ProgressLog,
) -> Result<PathBuf, RemapError> {
    let formatted = formatted.as_ref();
    let partition_file = formatted.with_file_name(partition_file_name(formatted));
    remap_file(key_file, &partition_file, pl)?;
    Ok(partition_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsi_progress_logger::no_logging;

    #[test]
    fn test_partition_file_name() {
        assert_eq!(
            partition_file_name("scratch/karate_formatted.txt"),
            PathBuf::from("partition_karate_formatted.txt")
        );
    }

    #[test]
    fn test_read_inverse_mapping() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let key_file = dir.path().join("g_key.txt");
        std::fs::write(&key_file, "A 1\nNew York 3\n\n10 2\n")?;
        let labels = read_inverse_mapping(&key_file)?;
        assert_eq!(
            labels,
            vec![
                None,
                Some("A".to_owned()),
                Some("10".to_owned()),
                Some("New York".to_owned())
            ]
        );
        Ok(())
    }

    #[test]
    fn test_read_inverse_mapping_errors() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let key_file = dir.path().join("g_key.txt");

        std::fs::write(&key_file, "A 1\nB\n")?;
        assert!(matches!(
            read_inverse_mapping(&key_file),
            Err(RemapError::MalformedMapping { line_number: 2, .. })
        ));

        std::fs::write(&key_file, "A one\n")?;
        assert!(matches!(
            read_inverse_mapping(&key_file),
            Err(RemapError::MalformedMapping { line_number: 1, .. })
        ));

        std::fs::write(&key_file, "A 1\nB 1\n")?;
        assert!(matches!(
            read_inverse_mapping(&key_file),
            Err(RemapError::DuplicateId { dense_id: 1, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_remap() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let key_file = dir.path().join("g_key.txt");
        let formatted = dir.path().join("g_formatted.txt");
        std::fs::write(&key_file, "A 1\nB 2\nC 3\n")?;
        std::fs::write(dir.path().join("partition_g_formatted.txt"), "0\n1\n0\n")?;

        let partition_file = remap_partition(&key_file, &formatted, no_logging![])?;
        assert_eq!(partition_file, dir.path().join("partition_g_formatted.txt"));
        assert_eq!(
            std::fs::read_to_string(&partition_file)?,
            "A 0\nB 1\nC 0\n"
        );
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_remap_keeps_permissions() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir()?;
        let key_file = dir.path().join("g_key.txt");
        let partition_file = dir.path().join("partition_g_formatted.txt");
        std::fs::write(&key_file, "A 1\nB 2\n")?;
        for mode in [0o644, 0o640] {
            std::fs::write(&partition_file, "0\n1\n")?;
            std::fs::set_permissions(&partition_file, std::fs::Permissions::from_mode(mode))?;
            remap_file(&key_file, &partition_file, no_logging![])?;
            let metadata = std::fs::metadata(&partition_file)?;
            assert_eq!(metadata.permissions().mode() & 0o777, mode);
        }
        Ok(())
    }

    #[test]
    fn test_remap_missing_mapping() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let key_file = dir.path().join("g_key.txt");
        let partition_file = dir.path().join("partition_g_formatted.txt");
        std::fs::write(&key_file, "A 1\nB 2\n")?;
        std::fs::write(&partition_file, "0\n1\n0\n")?;

        let err = remap_file(&key_file, &partition_file, no_logging![]).unwrap_err();
        assert!(matches!(err, RemapError::MissingMapping { dense_id: 3, .. }));
        assert_eq!(std::fs::read_to_string(&partition_file)?, "0\n1\n0\n");
        Ok(())
    }

    #[test]
    fn test_remap_malformed_partition() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let key_file = dir.path().join("g_key.txt");
        let partition_file = dir.path().join("partition_g.txt");
        std::fs::write(&key_file, "A 1\nB 2\n")?;
        std::fs::write(&partition_file, "0\nx\n")?;

        let err = remap_file(&key_file, &partition_file, no_logging![]).unwrap_err();
        assert!(matches!(
            err,
            RemapError::MalformedPartition { line_number: 2, .. }
        ));
        Ok(())
    }
}
