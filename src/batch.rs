//! # Batch Wizards
//!
//! A [`BatchWizard`] binds one serialized wizard graph (by file name) to the
//! file sets and literal-value overrides that drive an unattended run. The
//! wizard does not own its file sets — the surrounding [`BatchDocument`]
//! owns them in a [`FileSetStore`] and wizards hold [`FileSetId`] handles,
//! so a set shared between wizards advances exactly once per pass.
//!
//! An optional repeat set drives multiple executions: the run loop executes
//! the graph once per file of the repeat set, advancing every referenced
//! set between runs. A wizard without a repeat set is complete after a
//! single pass.

use crate::fileset::{FileSet, FileSetId, FileSetStore};
use crate::value::DataValue;

/// A literal-value override injected into a graph's Value items before each
/// run.
///
/// The override key is `(item_name, port_name, type_name)`; one batch
/// wizard never holds two overrides with the same key.
#[derive(Debug, Clone, PartialEq)]
pub struct InputValue {
  item_name: String,
  port_name: String,
  value: DataValue,
}

impl InputValue {
  /// Creates an override for the named item and port.
  pub fn new(item_name: &str, port_name: &str, value: DataValue) -> Self {
    Self {
      item_name: item_name.to_string(),
      port_name: port_name.to_string(),
      value,
    }
  }

  /// Name of the Value item to override.
  pub fn item_name(&self) -> &str {
    &self.item_name
  }

  /// Name of the output port on that item.
  pub fn port_name(&self) -> &str {
    &self.port_name
  }

  /// The type component of the override key.
  pub fn type_name(&self) -> &str {
    self.value.type_name()
  }

  /// The override value.
  pub fn value(&self) -> &DataValue {
    &self.value
  }
}

/// One serialized graph bound to file sets and overrides for batch
/// execution.
#[derive(Debug, Clone, Default)]
pub struct BatchWizard {
  wizard_filename: String,
  cleanup: bool,
  repeat: Option<FileSetId>,
  file_sets: Vec<FileSetId>,
  input_values: Vec<InputValue>,
}

impl BatchWizard {
  /// Creates a batch binding for the wizard stored at `wizard_filename`.
  pub fn new(wizard_filename: &str) -> Self {
    Self {
      wizard_filename: wizard_filename.to_string(),
      ..Self::default()
    }
  }

  /// Path of the serialized graph this wizard runs.
  pub fn wizard_filename(&self) -> &str {
    &self.wizard_filename
  }

  /// Whether artifacts should be cleaned up after each run.
  pub fn cleanup(&self) -> bool {
    self.cleanup
  }

  /// Sets the cleanup flag.
  pub fn set_cleanup(&mut self, cleanup: bool) {
    self.cleanup = cleanup;
  }

  /// The file set whose files drive repeated execution, if any.
  pub fn repeat_file_set(&self) -> Option<FileSetId> {
    self.repeat
  }

  /// Sets the repeat file set, adding it to the referenced sets when not
  /// already present.
  pub fn set_repeat_file_set(&mut self, id: FileSetId) {
    self.repeat = Some(id);
    if !self.file_sets.contains(&id) {
      self.file_sets.push(id);
    }
  }

  /// The referenced file sets, in add order.
  pub fn file_sets(&self) -> &[FileSetId] {
    &self.file_sets
  }

  /// Adds a file set reference. Returns `false` when already referenced.
  pub fn add_file_set(&mut self, id: FileSetId) -> bool {
    if self.file_sets.contains(&id) {
      return false;
    }
    self.file_sets.push(id);
    true
  }

  /// Drops a file set reference; clears the repeat set when it referenced
  /// the removed set. Returns `false` when the set was not referenced.
  pub fn remove_file_set(&mut self, id: FileSetId) -> bool {
    let Some(pos) = self.file_sets.iter().position(|f| *f == id) else {
      return false;
    };
    self.file_sets.remove(pos);
    if self.repeat == Some(id) {
      self.repeat = None;
    }
    true
  }

  /// The literal overrides, in add order.
  pub fn input_values(&self) -> &[InputValue] {
    &self.input_values
  }

  /// Records a literal override for `(item_name, port_name)` with the
  /// value's type completing the key.
  ///
  /// First write wins: when an override with the same key already exists
  /// the call is a no-op returning `None`, and the stored value is
  /// unchanged.
  pub fn set_input_value(
    &mut self,
    item_name: &str,
    port_name: &str,
    value: DataValue,
  ) -> Option<&InputValue> {
    let duplicate = self.input_values.iter().any(|iv| {
      iv.item_name == item_name && iv.port_name == port_name && iv.type_name() == value.type_name()
    });
    if duplicate {
      return None;
    }
    self
      .input_values
      .push(InputValue::new(item_name, port_name, value));
    self.input_values.last()
  }

  /// Resolves every referenced file set — the repeat set first, then the
  /// others in add order — and positions each at its first file.
  pub fn initialize_file_sets(&self, store: &mut FileSetStore) {
    self.for_each_set(store, |set| {
      set.resolve();
      set.first();
    });
  }

  /// Advances every referenced file set's cursor, repeat set first, in the
  /// same order as initialization.
  pub fn advance_file_sets(&self, store: &mut FileSetStore) {
    self.for_each_set(store, |set| {
      set.next();
    });
  }

  /// Queries whether the batch run is finished. Delegates to the repeat
  /// set; a wizard with no repeat set is complete after one pass.
  pub fn is_complete(&self, store: &FileSetStore) -> bool {
    match self.repeat {
      Some(id) => store.get(id).map(FileSet::is_complete).unwrap_or(true),
      None => true,
    }
  }

  fn for_each_set(&self, store: &mut FileSetStore, mut apply: impl FnMut(&mut FileSet)) {
    if let Some(repeat) = self.repeat {
      if let Some(set) = store.get_mut(repeat) {
        apply(set);
      }
    }
    for id in &self.file_sets {
      if Some(*id) == self.repeat {
        continue;
      }
      if let Some(set) = store.get_mut(*id) {
        apply(set);
      }
    }
  }
}

/// The parsed form of one batch document: the owned file sets plus every
/// batch wizard that references them.
#[derive(Debug, Clone, Default)]
pub struct BatchDocument {
  /// The file sets owned by this document.
  pub file_sets: FileSetStore,
  /// The batch wizards, in document order.
  pub wizards: Vec<BatchWizard>,
}

impl BatchDocument {
  /// Creates an empty document.
  pub fn new() -> Self {
    Self::default()
  }
}
