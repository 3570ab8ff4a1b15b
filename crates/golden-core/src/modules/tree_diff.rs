//! Directory tree comparison rendered as unified diff text.
//!
//! The output doubles as a human-readable report and as input for
//! `patch -p1`: one-sided files are diffed against `/dev/null` and every
//! fragment carries the side labels handed in by the caller.

use crate::domain::{HarnessError, HarnessResult};
use similar::TextDiff;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

const ABSENT_LABEL: &str = "/dev/null";
const CONTEXT_RADIUS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    LeftOnly,
    RightOnly,
    Modified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffFragment {
    pub kind: FragmentKind,
    pub path: String,
    /// Fragment as written to the patch. File content lines are copied
    /// byte for byte.
    pub bytes: Vec<u8>,
    /// False when the fragment is a notice without hunks, e.g. for an
    /// empty one-sided file.
    pub patchable: bool,
}

impl DiffFragment {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeDiff {
    pub fragments: Vec<DiffFragment>,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn count(&self, kind: FragmentKind) -> usize {
        self.fragments
            .iter()
            .filter(|fragment| fragment.kind == kind)
            .count()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.fragments
            .iter()
            .flat_map(|fragment| fragment.bytes.iter().copied())
            .collect()
    }

    /// Display form; invalid UTF-8 is replaced.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.to_bytes()).into_owned()
    }
}

impl Display for TreeDiff {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for fragment in &self.fragments {
            f.write_str(&fragment.text())?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TreeDiffError {
    #[error("failed to read directory '{}': {source}", path.display())]
    ReadDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read file '{}': {source}", path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to render diff for '{path}': {source}")]
    RenderDiff {
        path: String,
        source: std::io::Error,
    },
}

impl From<TreeDiffError> for HarnessError {
    fn from(error: TreeDiffError) -> Self {
        let message = error.to_string();
        match error {
            TreeDiffError::ReadDirectory { .. } => {
                HarnessError::io_system("IO.TREE_DIRECTORY", message)
            }
            TreeDiffError::ReadFile { .. } => HarnessError::io_system("IO.TREE_FILE", message),
            TreeDiffError::RenderDiff { .. } => HarnessError::internal("SYS.TREE_RENDER", message),
        }
    }
}

/// Compares two trees and returns the concatenated diff text. An empty
/// string means both trees hold the same files with the same content.
pub fn compare_directories(
    left_dir: &Path,
    right_dir: &Path,
    left_label: &str,
    right_label: &str,
) -> HarnessResult<String> {
    Ok(diff_trees(left_dir, right_dir, left_label, right_label)?.to_text())
}

/// Structured form of [`compare_directories`].
///
/// Either directory may be missing; its side then holds no files. Fragments
/// are ordered left-only, right-only, modified, each sorted by path.
pub fn diff_trees(
    left_dir: &Path,
    right_dir: &Path,
    left_label: &str,
    right_label: &str,
) -> Result<TreeDiff, TreeDiffError> {
    let left_files = collect_relative_files(left_dir)?.unwrap_or_default();
    let right_files = collect_relative_files(right_dir)?.unwrap_or_default();

    let mut fragments = Vec::new();

    for relative in left_files.difference(&right_files) {
        let content = read_bytes(&left_dir.join(relative))?;
        let present = join_label(left_label, relative);
        let absent = join_label(right_label, relative);
        let mut bytes = missing_notice(&present, &absent);
        let hunks = unified_diff(&content, b"", &present, ABSENT_LABEL, relative)?;
        let patchable = !hunks.is_empty();
        bytes.extend_from_slice(&hunks);
        fragments.push(DiffFragment {
            kind: FragmentKind::LeftOnly,
            path: relative.clone(),
            bytes,
            patchable,
        });
    }

    for relative in right_files.difference(&left_files) {
        let content = read_bytes(&right_dir.join(relative))?;
        let present = join_label(right_label, relative);
        let absent = join_label(left_label, relative);
        let mut bytes = missing_notice(&present, &absent);
        let hunks = unified_diff(b"", &content, ABSENT_LABEL, &present, relative)?;
        let patchable = !hunks.is_empty();
        bytes.extend_from_slice(&hunks);
        fragments.push(DiffFragment {
            kind: FragmentKind::RightOnly,
            path: relative.clone(),
            bytes,
            patchable,
        });
    }

    for relative in left_files.intersection(&right_files) {
        let left_bytes = read_bytes(&left_dir.join(relative))?;
        let right_bytes = read_bytes(&right_dir.join(relative))?;
        if left_bytes == right_bytes {
            continue;
        }

        let old_label = join_label(left_label, relative);
        let new_label = join_label(right_label, relative);
        let hunks = unified_diff(&left_bytes, &right_bytes, &old_label, &new_label, relative)?;
        // Unequal content never yields an empty fragment.
        let (bytes, patchable) = if hunks.is_empty() {
            (
                format!("Binary files {} and {} differ\n", old_label, new_label).into_bytes(),
                false,
            )
        } else {
            (hunks, true)
        };
        fragments.push(DiffFragment {
            kind: FragmentKind::Modified,
            path: relative.clone(),
            bytes,
            patchable,
        });
    }

    Ok(TreeDiff { fragments })
}

fn missing_notice(present: &str, absent: &str) -> Vec<u8> {
    format!("Found {} but not {}.\n", present, absent).into_bytes()
}

fn unified_diff(
    old: &[u8],
    new: &[u8],
    old_label: &str,
    new_label: &str,
    relative: &str,
) -> Result<Vec<u8>, TreeDiffError> {
    let diff = TextDiff::from_lines(old, new);
    let mut unified = diff.unified_diff();
    unified.context_radius(CONTEXT_RADIUS);

    let mut out = Vec::new();
    for (index, hunk) in unified.iter_hunks().enumerate() {
        if index == 0 {
            out.extend_from_slice(format!("--- {}\n+++ {}\n", old_label, new_label).as_bytes());
        }
        hunk.to_writer(&mut out).map_err(|source| TreeDiffError::RenderDiff {
            path: relative.to_string(),
            source,
        })?;
    }
    Ok(out)
}

fn join_label(label: &str, relative: &str) -> String {
    if label.is_empty() {
        relative.to_string()
    } else {
        format!("{}/{}", label.trim_end_matches('/'), relative)
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, TreeDiffError> {
    fs::read(path).map_err(|source| TreeDiffError::ReadFile {
        path: path.to_path_buf(),
        source,
    })
}

fn collect_relative_files(root: &Path) -> Result<Option<BTreeSet<String>>, TreeDiffError> {
    if !root.exists() {
        return Ok(None);
    }

    let mut results = BTreeSet::new();
    collect_relative_files_recursive(root, root, &mut results)?;
    Ok(Some(results))
}

fn collect_relative_files_recursive(
    root: &Path,
    current_dir: &Path,
    results: &mut BTreeSet<String>,
) -> Result<(), TreeDiffError> {
    let directory = fs::read_dir(current_dir).map_err(|source| TreeDiffError::ReadDirectory {
        path: current_dir.to_path_buf(),
        source,
    })?;

    for entry in directory {
        let entry = entry.map_err(|source| TreeDiffError::ReadDirectory {
            path: current_dir.to_path_buf(),
            source,
        })?;
        let entry_path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|source| TreeDiffError::ReadDirectory {
                path: entry_path.clone(),
                source,
            })?;

        if file_type.is_dir() {
            collect_relative_files_recursive(root, &entry_path, results)?;
            continue;
        }

        if file_type.is_file() {
            let relative_path = entry_path
                .strip_prefix(root)
                .unwrap_or(&entry_path)
                .to_string_lossy()
                .replace('\\', "/");
            results.insert(relative_path);
        }
    }

    Ok(())
}
