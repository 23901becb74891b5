//! # Wizard Items
//!
//! A [`WizardItem`] is a single task inside a wizard graph: a plug-in
//! invocation, a desktop-service call, or a literal value. An item has a
//! name and a [`ItemKind`] that identify it, a batch/interactive mode pair,
//! a layout position for builders, and ordered lists of owned input and
//! output ports holding the data used to execute it.
//!
//! Items are owned by exactly one [`crate::graph::WizardGraph`] and are
//! addressed by stable [`ItemId`] handles. Connection records between items
//! in an arbitrary list are captured as [`WizardConnection`] index pairs,
//! which is what clipboard round-trips and document serialization use
//! instead of live references.

use crate::graph::ItemId;
use crate::port::{PortDir, PortRef, WizardPort};
use std::fmt;
use std::str::FromStr;

/// The task category of an item.
///
/// The closed set mirrors the built-in categories of the original wizard
/// format; anything else is a plug-in-defined type carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
  /// A processing algorithm.
  Algorithm,
  /// An exporter writing data out of the system.
  Exporter,
  /// A georeferencing task.
  Georeference,
  /// An importer bringing data into the system.
  Importer,
  /// A literal value; always exactly one output port and no input ports.
  Value,
  /// A viewer presenting data.
  Viewer,
  /// A nested wizard.
  Wizard,
  /// A plug-in-defined task type.
  PlugIn(String),
}

impl ItemKind {
  /// Returns the serialized name of this kind.
  pub fn as_str(&self) -> &str {
    match self {
      ItemKind::Algorithm => "Algorithm",
      ItemKind::Exporter => "Exporter",
      ItemKind::Georeference => "Georeference",
      ItemKind::Importer => "Importer",
      ItemKind::Value => "Value",
      ItemKind::Viewer => "Viewer",
      ItemKind::Wizard => "Wizard",
      ItemKind::PlugIn(name) => name,
    }
  }
}

impl fmt::Display for ItemKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for ItemKind {
  type Err = std::convert::Infallible;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(match s {
      "Algorithm" => ItemKind::Algorithm,
      "Exporter" => ItemKind::Exporter,
      "Georeference" => ItemKind::Georeference,
      "Importer" => ItemKind::Importer,
      "Value" => ItemKind::Value,
      "Viewer" => ItemKind::Viewer,
      "Wizard" => ItemKind::Wizard,
      other => ItemKind::PlugIn(other.to_string()),
    })
  }
}

/// A connection between two ports, recorded by list position.
///
/// Indices are positions within a caller-provided item list, not graph-wide
/// handles, so a record set stays meaningful after serialization or when
/// pasted into a different graph. Records whose indices fall outside the
/// target list are skipped when replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WizardConnection {
  /// Position of the producing item in the list.
  pub output_item: usize,
  /// Index of the output port on the producing item.
  pub output_port: usize,
  /// Position of the consuming item in the list.
  pub input_item: usize,
  /// Index of the input port on the consuming item.
  pub input_port: usize,
}

/// A single task node in a wizard graph.
#[derive(Debug, Clone)]
pub struct WizardItem {
  id: ItemId,
  name: String,
  kind: ItemKind,
  batch: bool,
  mode_supported: bool,
  position: (f64, f64),
  input_ports: Vec<WizardPort>,
  output_ports: Vec<WizardPort>,
}

impl WizardItem {
  pub(crate) fn new(id: ItemId, name: &str, kind: ItemKind) -> Self {
    Self {
      id,
      name: name.to_string(),
      kind,
      batch: false,
      mode_supported: true,
      position: (0.0, 0.0),
      input_ports: Vec::new(),
      output_ports: Vec::new(),
    }
  }

  /// Returns the item's stable handle.
  pub fn id(&self) -> ItemId {
    self.id
  }

  /// Returns the item name.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Returns the item's task category.
  pub fn kind(&self) -> &ItemKind {
    &self.kind
  }

  /// Returns `true` when the item is set to run in batch mode, `false`
  /// for interactive mode.
  pub fn batch_mode(&self) -> bool {
    self.batch
  }

  /// Returns whether the item supports its current batch/interactive mode.
  pub fn is_mode_supported(&self) -> bool {
    self.mode_supported
  }

  /// Returns the builder layout position. View metadata only; carried
  /// through serialization untouched.
  pub fn position(&self) -> (f64, f64) {
    self.position
  }

  /// Returns the ordered input ports.
  pub fn input_ports(&self) -> &[WizardPort] {
    &self.input_ports
  }

  /// Returns the ordered output ports.
  pub fn output_ports(&self) -> &[WizardPort] {
    &self.output_ports
  }

  /// Returns the port list for one side.
  pub fn ports(&self, dir: PortDir) -> &[WizardPort] {
    match dir {
      PortDir::Input => &self.input_ports,
      PortDir::Output => &self.output_ports,
    }
  }

  /// Looks up a port by reference, if the reference addresses this item.
  pub fn port(&self, port: PortRef) -> Option<&WizardPort> {
    if port.item != self.id {
      return None;
    }
    self.ports(port.dir).get(port.index)
  }

  /// Queries whether `port` addresses one of this item's input ports.
  pub fn is_input_port(&self, port: PortRef) -> bool {
    port.item == self.id && port.dir == PortDir::Input && port.index < self.input_ports.len()
  }

  /// Queries whether `port` addresses one of this item's output ports.
  pub fn is_output_port(&self, port: PortRef) -> bool {
    port.item == self.id && port.dir == PortDir::Output && port.index < self.output_ports.len()
  }

  /// Finds an input port by name and current type.
  pub fn input_port(&self, name: &str, port_type: &str) -> Option<PortRef> {
    self.find_port(PortDir::Input, name, port_type)
  }

  /// Finds an output port by name and current type.
  pub fn output_port(&self, name: &str, port_type: &str) -> Option<PortRef> {
    self.find_port(PortDir::Output, name, port_type)
  }

  fn find_port(&self, dir: PortDir, name: &str, port_type: &str) -> Option<PortRef> {
    if name.is_empty() || port_type.is_empty() {
      return None;
    }
    self
      .ports(dir)
      .iter()
      .position(|p| p.name() == name && p.current_type() == port_type)
      .map(|index| PortRef {
        item: self.id,
        dir,
        index,
      })
  }

  pub(crate) fn ports_mut(&mut self, dir: PortDir) -> &mut Vec<WizardPort> {
    match dir {
      PortDir::Input => &mut self.input_ports,
      PortDir::Output => &mut self.output_ports,
    }
  }

  pub(crate) fn port_mut(&mut self, port: PortRef) -> Option<&mut WizardPort> {
    if port.item != self.id {
      return None;
    }
    self.ports_mut(port.dir).get_mut(port.index)
  }

  pub(crate) fn rename(&mut self, name: &str) -> bool {
    if name == self.name {
      return false;
    }
    self.name = name.to_string();
    true
  }

  pub(crate) fn set_position(&mut self, x: f64, y: f64) -> bool {
    if (x, y) == self.position {
      return false;
    }
    self.position = (x, y);
    true
  }

  pub(crate) fn set_batch_flags(&mut self, batch: bool, mode_supported: bool) -> bool {
    if batch == self.batch && mode_supported == self.mode_supported {
      return false;
    }
    self.batch = batch;
    self.mode_supported = mode_supported;
    true
  }

  /// Clones this item's definition under a new handle: name, kind, flags,
  /// position, and ports with their retypes and values. Connections are
  /// not copied; the clone starts detached.
  pub(crate) fn duplicate(&self, id: ItemId) -> WizardItem {
    let mut copy = self.clone();
    copy.id = id;
    for port in copy
      .input_ports
      .iter_mut()
      .chain(copy.output_ports.iter_mut())
    {
      port.take_connections();
    }
    copy
  }
}
