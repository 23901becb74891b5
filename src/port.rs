//! # Ports
//!
//! A [`WizardPort`] is a named, typed connection point on a wizard item.
//! Ports carry the data that flows between items: an output port's value is
//! copied to every connected input port when its owning item executes.
//!
//! Ports are owned by their item and addressed by [`PortRef`] handles
//! (item id + direction + position). Connections are stored symmetrically:
//! if port A lists B, then B lists A. All connection bookkeeping goes
//! through [`crate::graph::WizardGraph`], which owns both ends; the port
//! type itself only exposes read access plus crate-internal mutators.

use crate::graph::ItemId;
use crate::value::DataValue;

/// Which side of an item a port sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDir {
  /// An input port: consumes a value produced upstream.
  Input,
  /// An output port: produces a value for downstream consumers.
  Output,
}

/// A stable address for one port: owning item, direction, and position
/// within that direction's port list.
///
/// Item ids are never reused, so a `PortRef` stays valid across item
/// reorders; it dangles only when its port or item is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRef {
  /// Handle of the owning item.
  pub item: ItemId,
  /// Input or output side.
  pub dir: PortDir,
  /// Index into the item's port list for that side.
  pub index: usize,
}

/// A typed connection point on a wizard item.
///
/// Every port remembers the type it was declared with (`original_type`) and
/// the type it currently carries (`current_type`); the current type may be
/// retyped to any member of `valid_types`. Retyping clears the stored value.
///
/// # Invariants
///
/// * `valid_types` is never empty; it defaults to `[original_type]`.
/// * A stored value's registry type always equals `current_type`.
/// * `connections` only ever holds ports of the same current type; the
///   graph severs links whose peer is retyped away.
#[derive(Debug, Clone)]
pub struct WizardPort {
  name: String,
  original_type: String,
  current_type: String,
  valid_types: Vec<String>,
  description: String,
  value: Option<DataValue>,
  connections: Vec<PortRef>,
}

impl WizardPort {
  /// Creates a new port of the given declared type with no value and no
  /// connections.
  pub(crate) fn new(name: &str, port_type: &str, description: &str) -> Self {
    Self {
      name: name.to_string(),
      original_type: port_type.to_string(),
      current_type: port_type.to_string(),
      valid_types: vec![port_type.to_string()],
      description: description.to_string(),
      value: None,
      connections: Vec::new(),
    }
  }

  /// Returns the port name.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Returns the type the port was declared with.
  pub fn original_type(&self) -> &str {
    &self.original_type
  }

  /// Returns the type the port currently carries.
  pub fn current_type(&self) -> &str {
    &self.current_type
  }

  /// Returns the types this port may be retyped to. Never empty.
  pub fn valid_types(&self) -> &[String] {
    &self.valid_types
  }

  /// Returns the port description shown by editors.
  pub fn description(&self) -> &str {
    &self.description
  }

  /// Returns the currently stored value, if any.
  pub fn value(&self) -> Option<&DataValue> {
    self.value.as_ref()
  }

  /// Returns the ports this port is connected to.
  pub fn connections(&self) -> &[PortRef] {
    &self.connections
  }

  /// Checks whether this port is connected to `other`.
  pub fn is_connected_to(&self, other: PortRef) -> bool {
    self.connections.contains(&other)
  }

  /// Replaces the valid-type list. An empty list falls back to the
  /// original type so the never-empty invariant holds.
  pub(crate) fn set_valid_types(&mut self, types: Vec<String>) {
    if types.is_empty() {
      self.valid_types = vec![self.original_type.clone()];
    } else {
      self.valid_types = types;
    }
  }

  /// Overwrites the description.
  pub(crate) fn set_description(&mut self, description: &str) {
    self.description = description.to_string();
  }

  /// Sets the current type directly, without the retype side effects.
  /// Used when reconstructing ports from a document.
  pub(crate) fn restore_type(&mut self, current_type: &str) {
    self.current_type = current_type.to_string();
    if !self.valid_types.iter().any(|t| t == current_type) {
      self.valid_types.push(current_type.to_string());
    }
  }

  /// Retypes the port, clearing any stored value.
  ///
  /// Returns `true` when the type actually changed. The caller (the graph)
  /// is responsible for validating the new type and severing mismatched
  /// connections.
  pub(crate) fn retype(&mut self, new_type: &str) -> bool {
    if new_type == self.current_type {
      return false;
    }
    self.current_type = new_type.to_string();
    self.value = None;
    true
  }

  /// Stores a value. Returns `true` when the stored value changed.
  pub(crate) fn store_value(&mut self, value: Option<DataValue>) -> bool {
    if self.value == value {
      return false;
    }
    self.value = value;
    true
  }

  /// Records a symmetric link to `other`. Returns `false` when the link
  /// already exists.
  pub(crate) fn link(&mut self, other: PortRef) -> bool {
    if self.connections.contains(&other) {
      return false;
    }
    self.connections.push(other);
    true
  }

  /// Removes the link to `other`. Returns `false` when no such link exists.
  pub(crate) fn unlink(&mut self, other: PortRef) -> bool {
    match self.connections.iter().position(|c| *c == other) {
      Some(pos) => {
        self.connections.remove(pos);
        true
      }
      None => false,
    }
  }

  /// Drops every recorded link and returns them. The graph uses this when
  /// a port is destroyed to sever the peer sides.
  pub(crate) fn take_connections(&mut self) -> Vec<PortRef> {
    std::mem::take(&mut self.connections)
  }

  /// Rewrites stored links after ports shift position within an item
  /// (a lower-indexed sibling was removed).
  pub(crate) fn shift_links_after_removal(&mut self, removed: PortRef) {
    for link in &mut self.connections {
      if link.item == removed.item && link.dir == removed.dir && link.index > removed.index {
        link.index -= 1;
      }
    }
  }
}
