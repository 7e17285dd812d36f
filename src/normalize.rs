/*
 * SPDX-FileCopyrightText: 2026 The gcm-prep contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Renumbering of edge lists to dense node identifiers.
//!
//! The clustering code expects nodes to be numbered from 1 to *n* without
//! gaps. A [`Normalizer`] reads an edge list whose lines contain a source
//! label, a target label, and a weight, collects the set of labels, assigns
//! to each label its 1-based rank in lexicographical order, and writes two
//! files next to the input:
//!
//! - the formatted edge list (by default `<stem>_formatted.<ext>`), with
//!   lines `<source id> <target id> <weight>` in the same order as the input;
//! - the mapping file `<stem>_key.<ext>`, with lines `<label> <id>` sorted by
//!   label.
//!
//! The weight is copied verbatim. Since ids depend on the whole vocabulary,
//! the input is read twice.

use crate::{temp_file_for, with_stem_suffix};
use dsi_progress_logger::prelude::*;
use std::collections::BTreeSet;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The suffix of the mapping file, which cannot be used for the formatted
/// edge list.
pub const KEY_SUFFIX: &str = "_key";

/// The default suffix of the formatted edge list.
pub const DEFAULT_SUFFIX: &str = "_formatted";

/// How to split the lines of an edge list into fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Separator {
    /// Runs of whitespace; leading and trailing whitespace is ignored.
    #[default]
    Space,
    /// A single comma.
    Comma,
    /// A single semicolon.
    Semicolon,
}

impl Separator {
    /// Splits a line into fields.
    pub fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self {
            Separator::Space => line.split_whitespace().collect(),
            Separator::Comma => line.split(',').collect(),
            Separator::Semicolon => line.split(';').collect(),
        }
    }
}

impl Display for Separator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Separator::Space => "space",
            Separator::Comma => "comma",
            Separator::Semicolon => "semicolon",
        })
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot use {suffix:?} as suffix as it is reserved for the re-indexing mapping")]
    ReservedSuffix { suffix: String },
}

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error(
        "Failed to split line {line_number} of {} using separator {separator}: expected 3 fields, got {fields}. Offending line: {line:?}",
        .path.display()
    )]
    MalformedLine {
        path: PathBuf,
        line_number: usize,
        line: String,
        separator: Separator,
        fields: usize,
    },
    #[error(
        "Line {line_number} of {} has an empty field: {line:?}",
        .path.display()
    )]
    EmptyField {
        path: PathBuf,
        line_number: usize,
        line: String,
    },
    #[error(
        "Label {label:?} at line {line_number} of {} was not seen while collecting labels; was the file modified?",
        .path.display()
    )]
    UnknownLabel {
        path: PathBuf,
        line_number: usize,
        label: String,
    },
    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl NormalizeError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| NormalizeError::Io {
            path: path.to_owned(),
            source,
        }
    }
}

/// The fields of an edge line, trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEdge<'a> {
    pub source: &'a str,
    pub target: &'a str,
    /// The weight text, never parsed.
    pub weight: &'a str,
}

impl<'a> RawEdge<'a> {
    /// Splits a line into an edge, returning the number of fields found if
    /// they are not exactly three.
    pub fn parse(line: &'a str, separator: Separator) -> Result<Self, usize> {
        match *separator.split(line).as_slice() {
            [source, target, weight] => Ok(RawEdge {
                source: source.trim(),
                target: target.trim(),
                weight: weight.trim(),
            }),
            ref fields => Err(fields.len()),
        }
    }
}

/// A bijection between node labels and the dense ids 1, 2, …, *n*.
///
/// Ids follow the lexicographical order of the labels, so the same
/// vocabulary always yields the same mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdMapping {
    /// Sorted, without duplicates; the id of `labels[i]` is `i + 1`.
    labels: Vec<String>,
}

impl IdMapping {
    pub fn from_labels<S: Into<String>>(labels: impl IntoIterator<Item = S>) -> Self {
        let labels = labels
            .into_iter()
            .map(Into::into)
            .collect::<BTreeSet<String>>();
        Self {
            labels: labels.into_iter().collect(),
        }
    }

    /// The number of labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns the dense id of a label.
    pub fn id(&self, label: &str) -> Option<usize> {
        self.labels
            .binary_search_by(|probe| probe.as_str().cmp(label))
            .ok()
            .map(|index| index + 1)
    }

    /// Returns the label with the given dense id.
    pub fn label(&self, id: usize) -> Option<&str> {
        id.checked_sub(1)
            .and_then(|index| self.labels.get(index))
            .map(String::as_str)
    }

    /// Iterates on pairs (label, id) in increasing id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.labels
            .iter()
            .enumerate()
            .map(|(index, label)| (label.as_str(), index + 1))
    }

    /// Writes the mapping in the format `<label> <id>`, one node per line.
    pub fn write(&self, mut writer: impl Write) -> std::io::Result<()> {
        for (label, id) in self.iter() {
            writeln!(writer, "{} {}", label, id)?;
        }
        writer.flush()
    }
}

/// What a successful run of [`Normalizer::normalize`] produced.
#[derive(Debug, Clone)]
pub struct NormalizeSummary {
    /// The formatted edge list.
    pub formatted: PathBuf,
    /// The mapping file.
    pub key_file: PathBuf,
    pub mapping: IdMapping,
    /// The number of edges, that is, of non-blank lines after the skipped ones.
    pub num_edges: usize,
}

/// Renumbers edge lists.
///
/// ```no_run
/// # use gcm_prep::normalize::{Normalizer, Separator};
/// # use dsi_progress_logger::no_logging;
/// let summary = Normalizer::new()
///     .skip(1)
///     .separator(Separator::Comma)
///     .suffix("renumbered")?
///     .normalize("karate.csv", no_logging![])?;
/// assert!(summary.formatted.ends_with("karate_renumbered.csv"));
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Normalizer {
    skip: usize,
    separator: Separator,
    suffix: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            skip: 0,
            separator: Separator::default(),
            suffix: DEFAULT_SUFFIX.to_owned(),
        }
    }
}

/// Prepends an underscore to `name` if missing, and rejects the suffix of
/// the mapping file.
pub fn output_suffix(name: &str) -> Result<String, ConfigError> {
    let suffix = if name.starts_with('_') {
        name.to_owned()
    } else {
        format!("_{}", name)
    };
    if suffix == KEY_SUFFIX {
        return Err(ConfigError::ReservedSuffix { suffix });
    }
    Ok(suffix)
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of initial lines to ignore (e.g., headers).
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn separator(mut self, separator: Separator) -> Self {
        self.separator = separator;
        self
    }

    /// Sets the suffix of the formatted edge list. A leading underscore is
    /// added if missing.
    pub fn suffix(mut self, name: impl AsRef<str>) -> Result<Self, ConfigError> {
        self.suffix = output_suffix(name.as_ref())?;
        Ok(self)
    }

    /// The path of the formatted edge list for the given input.
    pub fn formatted_path(&self, input: impl AsRef<Path>) -> PathBuf {
        with_stem_suffix(input, &self.suffix)
    }

    /// The path of the mapping file for the given input.
    pub fn key_path(&self, input: impl AsRef<Path>) -> PathBuf {
        with_stem_suffix(input, KEY_SUFFIX)
    }

    /// Iterates on the edge lines of the input, yielding 1-based line
    /// numbers and edges.
    fn for_each_edge(
        &self,
        path: &Path,
        mut f: impl FnMut(usize, RawEdge<'_>) -> Result<(), NormalizeError>,
    ) -> Result<(), NormalizeError> {
        let reader = BufReader::new(File::open(path).map_err(NormalizeError::io(path))?);
        for (index, line) in reader.lines().enumerate().skip(self.skip) {
            let line = line.map_err(NormalizeError::io(path))?;
            if line.trim().is_empty() {
                continue;
            }
            let edge = RawEdge::parse(&line, self.separator).map_err(|fields| {
                NormalizeError::MalformedLine {
                    path: path.to_owned(),
                    line_number: index + 1,
                    line: line.clone(),
                    separator: self.separator,
                    fields,
                }
            })?;
            if [edge.source, edge.target, edge.weight].contains(&"") {
                return Err(NormalizeError::EmptyField {
                    path: path.to_owned(),
                    line_number: index + 1,
                    line,
                });
            }
            f(index + 1, edge)?;
        }
        Ok(())
    }

    /// Collects the labels of the input and checks that every line has the
    /// right shape.
    pub fn scan(
        &self,
        input: impl AsRef<Path>,
        pl: &mut impl ProgressLog,
    ) -> Result<(IdMapping, usize), NormalizeError> {
        let input = input.as_ref();
        log::info!(
            "Reading file {}, skipping {} line(s), splitting at {}",
            input.display(),
            self.skip,
            self.separator
        );
        pl.item_name("edge");
        pl.start(format!("Collecting labels from {}", input.display()));

        let mut labels = BTreeSet::new();
        let mut num_edges = 0;
        self.for_each_edge(input, |_, edge| {
            for label in [edge.source, edge.target] {
                if !labels.contains(label) {
                    labels.insert(label.to_owned());
                }
            }
            num_edges += 1;
            pl.light_update();
            Ok(())
        })?;
        pl.done();

        let mapping = IdMapping {
            labels: labels.into_iter().collect(),
        };
        log::info!("Read in {} nodes, {} edges", mapping.len(), num_edges);
        Ok((mapping, num_edges))
    }

    /// Renumbers the input, writing the formatted edge list and the mapping
    /// file next to it.
    ///
    /// The input is not modified. If a line does not split into exactly three
    /// fields, no output file is created.
    pub fn normalize(
        &self,
        input: impl AsRef<Path>,
        pl: &mut impl ProgressLog,
    ) -> Result<NormalizeSummary, NormalizeError> {
        let input = input.as_ref();
        let formatted = self.formatted_path(input);
        let key_file = self.key_path(input);

        let (mapping, num_edges) = self.scan(input, pl)?;

        log::info!("Writing formatted edge list to {}", formatted.display());
        let tmp = temp_file_for(&formatted, ".gcm_formatted_")
            .map_err(NormalizeError::io(&formatted))?;
        let mut writer = BufWriter::new(tmp.as_file());

        pl.expected_updates(Some(num_edges));
        pl.start(format!("Writing {}", formatted.display()));
        self.for_each_edge(input, |line_number, edge| {
            let id = |label: &str| {
                mapping.id(label).ok_or_else(|| NormalizeError::UnknownLabel {
                    path: input.to_owned(),
                    line_number,
                    label: label.to_owned(),
                })
            };
            writeln!(writer, "{} {} {}", id(edge.source)?, id(edge.target)?, edge.weight)
                .map_err(NormalizeError::io(&formatted))?;
            pl.light_update();
            Ok(())
        })?;
        writer.flush().map_err(NormalizeError::io(&formatted))?;
        drop(writer);
        pl.done();

        log::debug!("Writing mapping to {}", key_file.display());
        let key_tmp =
            temp_file_for(&key_file, ".gcm_key_").map_err(NormalizeError::io(&key_file))?;
        mapping
            .write(BufWriter::new(key_tmp.as_file()))
            .map_err(NormalizeError::io(&key_file))?;

        // both files are complete before either is renamed into place
        tmp.persist(&formatted)
            .map_err(|err| NormalizeError::io(&formatted)(err.error))?;
        key_tmp
            .persist(&key_file)
            .map_err(|err| NormalizeError::io(&key_file)(err.error))?;

        Ok(NormalizeSummary {
            formatted,
            key_file,
            mapping,
            num_edges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dsi_progress_logger::no_logging;

    #[test]
    fn test_separator_split() {
        assert_eq!(Separator::Space.split("  a \t b 1.0 "), ["a", "b", "1.0"]);
        assert_eq!(Separator::Comma.split("a, b,1.0"), ["a", " b", "1.0"]);
        assert_eq!(Separator::Semicolon.split("a;b"), ["a", "b"]);
    }

    #[test]
    fn test_raw_edge_parse() {
        assert_eq!(
            RawEdge::parse("x y 2.50", Separator::Space),
            Ok(RawEdge {
                source: "x",
                target: "y",
                weight: "2.50"
            })
        );
        assert_eq!(
            RawEdge::parse(" x , y z ,1e-3 ", Separator::Comma),
            Ok(RawEdge {
                source: "x",
                target: "y z",
                weight: "1e-3"
            })
        );
        assert_eq!(RawEdge::parse("x y", Separator::Space), Err(2));
        assert_eq!(RawEdge::parse("x,y,1,2", Separator::Comma), Err(4));
    }

    #[test]
    fn test_output_suffix() {
        assert_eq!(output_suffix("formatted").unwrap(), "_formatted");
        assert_eq!(output_suffix("_dense").unwrap(), "_dense");
        assert!(matches!(
            output_suffix("key"),
            Err(ConfigError::ReservedSuffix { .. })
        ));
        assert!(output_suffix("_key").is_err());
        assert!(output_suffix("keys").is_ok());
    }

    #[test]
    fn test_id_mapping() {
        let mapping = IdMapping::from_labels(["b", "a", "c", "a"]);
        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.id("a"), Some(1));
        assert_eq!(mapping.id("c"), Some(3));
        assert_eq!(mapping.id("d"), None);
        assert_eq!(mapping.label(0), None);
        assert_eq!(mapping.label(2), Some("b"));
        assert_eq!(mapping.label(4), None);
        let mut buf = Vec::new();
        mapping.write(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "a 1\nb 2\nc 3\n");
    }

    #[test]
    fn test_normalize() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("edges.txt");
        std::fs::write(&input, "B A 1.0\nA C 2.5\n")?;

        let summary = Normalizer::new().normalize(&input, no_logging![])?;
        assert_eq!(summary.formatted, dir.path().join("edges_formatted.txt"));
        assert_eq!(summary.key_file, dir.path().join("edges_key.txt"));
        assert_eq!(summary.num_edges, 2);
        assert_eq!(
            std::fs::read_to_string(&summary.formatted)?,
            "2 1 1.0\n1 3 2.5\n"
        );
        assert_eq!(
            std::fs::read_to_string(&summary.key_file)?,
            "A 1\nB 2\nC 3\n"
        );
        // the input is untouched
        assert_eq!(std::fs::read_to_string(&input)?, "B A 1.0\nA C 2.5\n");
        Ok(())
    }

    #[test]
    fn test_normalize_skip_and_blank_lines() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("edges.csv");
        std::fs::write(&input, "from;to;weight\n\nn10; n2 ;0.5\n   \nn2;n10;7\n")?;

        let summary = Normalizer::new()
            .skip(1)
            .separator(Separator::Semicolon)
            .suffix("dense")?
            .normalize(&input, no_logging![])?;
        assert_eq!(summary.formatted, dir.path().join("edges_dense.csv"));
        assert_eq!(summary.num_edges, 2);
        assert_eq!(std::fs::read_to_string(&summary.formatted)?, "1 2 0.5\n2 1 7\n");
        assert_eq!(std::fs::read_to_string(&summary.key_file)?, "n10 1\nn2 2\n");
        Ok(())
    }

    #[test]
    fn test_normalize_malformed_line() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("edges.txt");
        std::fs::write(&input, "a b 1\nc d\n")?;

        let err = Normalizer::new()
            .normalize(&input, no_logging![])
            .unwrap_err();
        match err {
            NormalizeError::MalformedLine {
                line_number,
                line,
                fields,
                ..
            } => {
                assert_eq!(line_number, 2);
                assert_eq!(line, "c d");
                assert_eq!(fields, 2);
            }
            other => panic!("unexpected error {other}"),
        }
        // only the input is left in the directory
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn test_normalize_empty_field() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("edges.csv");
        for content in ["a,b,1\na,,1\n", "a,b,1\n , b,1\n", "a,b,1\na,b, \n"] {
            std::fs::write(&input, content)?;
            let err = Normalizer::new()
                .separator(Separator::Comma)
                .normalize(&input, no_logging![])
                .unwrap_err();
            assert!(matches!(
                err,
                NormalizeError::EmptyField { line_number: 2, .. }
            ));
            assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);
        }
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_permissions() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let mode = |path: &Path| -> std::io::Result<u32> {
            Ok(std::fs::metadata(path)?.permissions().mode() & 0o777)
        };
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("edges.txt");
        std::fs::write(&input, "a b 1\n")?;

        let summary = Normalizer::new().normalize(&input, no_logging![])?;
        assert_eq!(mode(&summary.formatted)?, mode(&input)?);
        assert_eq!(mode(&summary.key_file)?, mode(&input)?);
        Ok(())
    }
}
