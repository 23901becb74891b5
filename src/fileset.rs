//! # File Sets
//!
//! A [`FileSet`] names a directory plus an ordered list of include/exclude
//! rules and resolves, on demand, to an ordered list of concrete files.
//! Batch runs iterate a set sequentially through a cursor: `first`, `next`,
//! `current`, and a completion flag once the cursor walks off the end.
//!
//! Resolution is deterministic for identical filesystem state: the
//! directory is enumerated in sorted order, include rules admit files by
//! exact name or glob pattern (every file is admitted when there is no
//! include rule at all), and exclude rules then remove matches. A missing
//! or unreadable directory resolves to an empty list rather than an error,
//! so iteration over it is immediately complete.
//!
//! File sets are owned by a [`FileSetStore`] and referenced by
//! [`FileSetId`]; several batch wizards may share one set without copying
//! it.

use std::fs;
use std::path::{Path, PathBuf};

/// Whether a requirement admits or removes matching files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementKind {
  /// Admit files matching the pattern.
  Include,
  /// Remove files matching the pattern.
  Exclude,
}

/// One include/exclude rule: an exact file name or a glob pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSetRequirement {
  /// Include or exclude.
  pub kind: RequirementKind,
  /// Exact file name or glob pattern, matched against file names.
  pub pattern: String,
}

/// Handle of a file set within a [`FileSetStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileSetId(pub(crate) usize);

/// A named directory with inclusion/exclusion rules and a resolution
/// cursor.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
  name: String,
  directory: PathBuf,
  requirements: Vec<FileSetRequirement>,
  resolved: Vec<PathBuf>,
  cursor: usize,
}

impl FileSet {
  /// Creates a file set over the given directory with no rules.
  pub fn new(name: &str, directory: impl Into<PathBuf>) -> Self {
    Self {
      name: name.to_string(),
      directory: directory.into(),
      requirements: Vec::new(),
      resolved: Vec::new(),
      cursor: 0,
    }
  }

  /// Returns the set name.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Returns the directory the rules apply to.
  pub fn directory(&self) -> &Path {
    &self.directory
  }

  /// Returns the ordered rule list.
  pub fn requirements(&self) -> &[FileSetRequirement] {
    &self.requirements
  }

  /// Appends a rule. Resolution is not redone until [`FileSet::resolve`]
  /// is called again.
  pub fn add_requirement(&mut self, kind: RequirementKind, pattern: &str) {
    self.requirements.push(FileSetRequirement {
      kind,
      pattern: pattern.to_string(),
    });
  }

  /// Resolves the rules against the directory's current contents and
  /// resets the cursor to the first file.
  ///
  /// The directory is enumerated in sorted order so that two resolutions
  /// over unchanged filesystem state yield the same list. Subdirectories
  /// are skipped; rules match plain file names only.
  pub fn resolve(&mut self) {
    let mut entries: Vec<PathBuf> = match fs::read_dir(&self.directory) {
      Ok(dir) => dir
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect(),
      Err(error) => {
        tracing::warn!(
          fileset = %self.name,
          directory = %self.directory.display(),
          error = %error,
          "directory enumeration failed, resolving to empty set"
        );
        Vec::new()
      }
    };
    entries.sort();

    let includes: Vec<&FileSetRequirement> = self
      .requirements
      .iter()
      .filter(|r| r.kind == RequirementKind::Include)
      .collect();

    let resolved: Vec<PathBuf> = entries
      .into_iter()
      .filter(|path| {
        let name = file_name(path);
        if !includes.is_empty() && !includes.iter().any(|r| matches(&r.pattern, name)) {
          return false;
        }
        !self
          .requirements
          .iter()
          .filter(|r| r.kind == RequirementKind::Exclude)
          .any(|r| matches(&r.pattern, name))
      })
      .collect();

    tracing::debug!(
      fileset = %self.name,
      files = resolved.len(),
      "resolved file set"
    );
    self.resolved = resolved;
    self.cursor = 0;
  }

  /// Returns the resolved file list from the last [`FileSet::resolve`].
  pub fn files(&self) -> &[PathBuf] {
    &self.resolved
  }

  /// Positions the cursor at the first resolved file and returns it.
  pub fn first(&mut self) -> Option<&Path> {
    self.cursor = 0;
    self.resolved.first().map(PathBuf::as_path)
  }

  /// Advances the cursor and returns the new current file, or `None` once
  /// iteration has walked past the last resolved file.
  pub fn next(&mut self) -> Option<&Path> {
    if self.cursor < self.resolved.len() {
      self.cursor += 1;
    }
    self.resolved.get(self.cursor).map(PathBuf::as_path)
  }

  /// Returns the file currently under the cursor.
  pub fn current(&self) -> Option<&Path> {
    self.resolved.get(self.cursor).map(PathBuf::as_path)
  }

  /// Queries whether iteration has exhausted the resolved files. An empty
  /// resolution is complete from the start.
  pub fn is_complete(&self) -> bool {
    self.cursor >= self.resolved.len()
  }
}

/// Matches a file name against an exact name or glob pattern.
///
/// An invalid glob pattern degrades to an exact-name comparison.
fn matches(pattern: &str, name: &str) -> bool {
  if !pattern.contains(['*', '?', '[']) {
    return pattern == name;
  }
  match glob::Pattern::new(pattern) {
    Ok(glob) => glob.matches(name),
    Err(error) => {
      tracing::warn!(pattern = %pattern, error = %error, "invalid glob pattern");
      pattern == name
    }
  }
}

fn file_name(path: &Path) -> &str {
  path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

/// Owner of every file set referenced by the batch wizards of one document.
///
/// The store hands out stable [`FileSetId`] handles; wizards keep handles,
/// never copies, so a shared set advances once per run for all of them.
#[derive(Debug, Clone, Default)]
pub struct FileSetStore {
  sets: Vec<FileSet>,
}

impl FileSetStore {
  /// Creates an empty store.
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds a set and returns its handle.
  pub fn add(&mut self, set: FileSet) -> FileSetId {
    self.sets.push(set);
    FileSetId(self.sets.len() - 1)
  }

  /// Looks up a set by handle.
  pub fn get(&self, id: FileSetId) -> Option<&FileSet> {
    self.sets.get(id.0)
  }

  /// Looks up a set mutably by handle.
  pub fn get_mut(&mut self, id: FileSetId) -> Option<&mut FileSet> {
    self.sets.get_mut(id.0)
  }

  /// Finds a set's handle by name.
  pub fn find(&self, name: &str) -> Option<FileSetId> {
    self.sets.iter().position(|s| s.name() == name).map(FileSetId)
  }

  /// Returns every set in the store.
  pub fn sets(&self) -> &[FileSet] {
    &self.sets
  }

  /// Number of sets in the store.
  pub fn len(&self) -> usize {
    self.sets.len()
  }

  /// Queries whether the store holds no sets.
  pub fn is_empty(&self) -> bool {
    self.sets.is_empty()
  }
}
