//! # Wizard Graph
//!
//! This module defines [`WizardGraph`], the ordered, connected collection of
//! items that makes up one wizard. The graph owns every item (and through
//! them every port) and is the single mutation surface: connecting,
//! retyping, reordering, and structural edits all go through graph methods
//! so that both ends of a symmetric connection are updated together.
//!
//! ## Execution order
//!
//! The item list order *is* the execution order, and the graph maintains it
//! as a valid topological order with respect to port connections: for every
//! connected pair (output port on item A, input port on item B), A appears
//! before B. New items append at the end, which is trivially legal because
//! a fresh item has no connections; the reorder operations
//! ([`WizardGraph::increase_item_order`] / [`WizardGraph::decrease_item_order`])
//! relocate one item at a time and refuse any move that would break the
//! invariant.
//!
//! ## Cycle prevention
//!
//! [`WizardGraph::is_item_connected`] is an explicit visited-set DFS over
//! item handles. Editors call [`WizardGraph::can_connect`] before wiring an
//! output to an input; a connection is refused when the producing item is
//! already downstream of the consuming item, which would close a cycle.
//!
//! ## Change notifications
//!
//! Every mutation appends a [`WizardEvent`] to an internal journal drained
//! with [`WizardGraph::take_events`]. View layers replay the journal instead
//! of observing live objects; the graph itself stays single-threaded and
//! lock-free.

use crate::item::{ItemKind, WizardConnection, WizardItem};
use crate::port::{PortDir, PortRef, WizardPort};
use crate::value::DataValue;
use std::collections::HashSet;

/// Stable handle of an item within one graph. Never reused, so handles
/// survive reorders and removals of other items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub(crate) u64);

/// A change recorded by the graph's event journal.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardEvent {
  /// An item was added to the graph.
  ItemAdded(ItemId),
  /// An item (and all of its ports) was removed.
  ItemRemoved(ItemId),
  /// An item was renamed.
  ItemRenamed(ItemId),
  /// An item's layout position changed.
  ItemMoved(ItemId),
  /// An item's batch-mode flags changed.
  BatchModeChanged(ItemId),
  /// A port was added to an item.
  PortAdded(PortRef),
  /// A port was removed from an item.
  PortRemoved(PortRef),
  /// A port was retyped.
  PortTypeChanged(PortRef),
  /// A port's stored value changed.
  PortValueChanged(PortRef),
  /// Two ports were connected.
  Connected(PortRef, PortRef),
  /// Two ports were disconnected.
  Disconnected(PortRef, PortRef),
  /// The execution order changed.
  OrderChanged,
}

/// The ordered, connected collection of items defining one wizard.
#[derive(Debug, Clone, Default)]
pub struct WizardGraph {
  name: String,
  batch: bool,
  menu_location: String,
  items: Vec<WizardItem>,
  next_id: u64,
  events: Vec<WizardEvent>,
}

impl WizardGraph {
  /// Creates a new empty graph with the given name.
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_string(),
      ..Self::default()
    }
  }

  /// Returns the graph name.
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Sets the graph name.
  pub fn set_name(&mut self, name: &str) {
    self.name = name.to_string();
  }

  /// Returns the whole-graph default batch mode.
  pub fn batch(&self) -> bool {
    self.batch
  }

  /// Sets the whole-graph default batch mode.
  pub fn set_batch(&mut self, batch: bool) {
    self.batch = batch;
  }

  /// Returns the optional command-palette path for launching this wizard.
  pub fn menu_location(&self) -> &str {
    &self.menu_location
  }

  /// Sets the command-palette path.
  pub fn set_menu_location(&mut self, location: &str) {
    self.menu_location = location.to_string();
  }

  /// Returns the items in execution order.
  pub fn items(&self) -> &[WizardItem] {
    &self.items
  }

  /// Looks up an item by handle.
  pub fn item(&self, id: ItemId) -> Option<&WizardItem> {
    self.items.iter().find(|item| item.id() == id)
  }

  /// Finds the first item with the given name.
  pub fn find_item(&self, name: &str) -> Option<&WizardItem> {
    self.items.iter().find(|item| item.name() == name)
  }

  /// Looks up a port by reference.
  pub fn port(&self, port: PortRef) -> Option<&WizardPort> {
    self.item(port.item).and_then(|item| item.port(port))
  }

  /// Drains and returns the change-event journal.
  pub fn take_events(&mut self) -> Vec<WizardEvent> {
    std::mem::take(&mut self.events)
  }

  // ==========================================================================
  // Item management
  // ==========================================================================

  /// Constructs a new item and appends it to the execution order.
  ///
  /// Appending is always legal: a freshly created item has no connections.
  pub fn add_item(&mut self, name: &str, kind: ItemKind) -> ItemId {
    let id = self.allocate_id();
    tracing::debug!(item = %name, kind = %kind, "adding wizard item");
    self.items.push(WizardItem::new(id, name, kind));
    self.events.push(WizardEvent::ItemAdded(id));
    id
  }

  /// Constructs a literal-value item: kind [`ItemKind::Value`], no input
  /// ports, and exactly one output port named after the item, typed and
  /// populated from the given literal.
  pub fn add_value_item(&mut self, name: &str, value: DataValue) -> ItemId {
    let id = self.allocate_id();
    let mut item = WizardItem::new(id, name, ItemKind::Value);
    let mut port = WizardPort::new(name, value.type_name(), "");
    port.store_value(Some(value));
    item.ports_mut(PortDir::Output).push(port);
    self.items.push(item);
    self.events.push(WizardEvent::ItemAdded(id));
    self.events.push(WizardEvent::PortAdded(PortRef {
      item: id,
      dir: PortDir::Output,
      index: 0,
    }));
    id
  }

  /// Removes an item, destroying all of its ports and severing their
  /// connections to ports on other, still-live items.
  ///
  /// Returns `false` only when `id` is not in this graph.
  pub fn remove_item(&mut self, id: ItemId) -> bool {
    let Some(pos) = self.position_of(id) else {
      return false;
    };

    // Sever every connection touching the doomed item before it goes away.
    let mut links: Vec<(PortRef, PortRef)> = Vec::new();
    for dir in [PortDir::Input, PortDir::Output] {
      for (index, port) in self.items[pos].ports(dir).iter().enumerate() {
        let local = PortRef {
          item: id,
          dir,
          index,
        };
        for peer in port.connections() {
          links.push((local, *peer));
        }
      }
    }
    for (local, peer) in links {
      if peer.item != id {
        if let Some(peer_port) = self.port_mut(peer) {
          peer_port.unlink(local);
        }
        self.events.push(WizardEvent::Disconnected(local, peer));
      }
    }

    self.items.remove(pos);
    self.events.push(WizardEvent::ItemRemoved(id));
    true
  }

  /// Duplicates an item's definition (name, kind, flags, position, ports
  /// with values) under a fresh handle appended at the end of the order.
  /// The copy starts with no connections.
  pub fn duplicate_item(&mut self, id: ItemId) -> Option<ItemId> {
    let source = self.item(id)?;
    let copy_id = ItemId(self.next_id);
    let copy = source.duplicate(copy_id);
    self.next_id += 1;
    self.items.push(copy);
    self.events.push(WizardEvent::ItemAdded(copy_id));
    Some(copy_id)
  }

  /// Renames an item. Emits [`WizardEvent::ItemRenamed`] when the name
  /// actually changed.
  pub fn set_item_name(&mut self, id: ItemId, name: &str) -> bool {
    let Some(item) = self.item_mut(id) else {
      return false;
    };
    if item.rename(name) {
      self.events.push(WizardEvent::ItemRenamed(id));
    }
    true
  }

  /// Moves an item's layout position. View metadata only.
  pub fn set_item_position(&mut self, id: ItemId, x: f64, y: f64) -> bool {
    let Some(item) = self.item_mut(id) else {
      return false;
    };
    if item.set_position(x, y) {
      self.events.push(WizardEvent::ItemMoved(id));
    }
    true
  }

  /// Updates an item's batch-mode pair: whether it runs in batch mode and
  /// whether it can actually run in that mode. Both flags are written
  /// together; an event fires when either differed.
  pub fn set_batch_mode(&mut self, id: ItemId, batch: bool, mode_supported: bool) -> bool {
    let Some(item) = self.item_mut(id) else {
      return false;
    };
    if item.set_batch_flags(batch, mode_supported) {
      self.events.push(WizardEvent::BatchModeChanged(id));
    }
    true
  }

  // ==========================================================================
  // Port management
  // ==========================================================================

  /// Constructs and appends a new input port on an item.
  ///
  /// Returns `None` when the item does not exist or is a Value item
  /// (Value items never have input ports).
  pub fn add_input_port(
    &mut self,
    id: ItemId,
    name: &str,
    port_type: &str,
    description: &str,
  ) -> Option<PortRef> {
    self.add_port(id, PortDir::Input, name, port_type, description)
  }

  /// Constructs and appends a new output port on an item.
  ///
  /// Returns `None` when the item does not exist or is a Value item
  /// (a Value item's single output port is created with the item).
  pub fn add_output_port(
    &mut self,
    id: ItemId,
    name: &str,
    port_type: &str,
    description: &str,
  ) -> Option<PortRef> {
    self.add_port(id, PortDir::Output, name, port_type, description)
  }

  fn add_port(
    &mut self,
    id: ItemId,
    dir: PortDir,
    name: &str,
    port_type: &str,
    description: &str,
  ) -> Option<PortRef> {
    let item = self.item_mut(id)?;
    if *item.kind() == ItemKind::Value {
      return None;
    }
    let ports = item.ports_mut(dir);
    ports.push(WizardPort::new(name, port_type, description));
    let port = PortRef {
      item: id,
      dir,
      index: ports.len() - 1,
    };
    self.events.push(WizardEvent::PortAdded(port));
    Some(port)
  }

  /// Detaches and destroys a port, severing its connections first.
  ///
  /// `delete_value` additionally clears the stored value before the port is
  /// destroyed, so a literal does not linger in any shared store the caller
  /// hands values to.
  pub fn remove_port(&mut self, port: PortRef, delete_value: bool) -> bool {
    if self.port(port).is_none() {
      return false;
    }
    self.disconnect_all(port);

    let item = self.item_mut(port.item).expect("port resolved above");
    let mut removed = item.ports_mut(port.dir).remove(port.index);
    if delete_value {
      removed.store_value(None);
    }
    drop(removed);

    // Ports after the removed one shift down; fix every link that
    // addressed them by their old index.
    for item in &mut self.items {
      for dir in [PortDir::Input, PortDir::Output] {
        for p in item.ports_mut(dir).iter_mut() {
          p.shift_links_after_removal(port);
        }
      }
    }

    self.events.push(WizardEvent::PortRemoved(port));
    true
  }

  /// Replaces a port's valid-type list. An empty list falls back to the
  /// port's original type.
  pub fn set_valid_types(&mut self, port: PortRef, types: Vec<String>) -> bool {
    match self.port_mut(port) {
      Some(p) => {
        p.set_valid_types(types);
        true
      }
      None => false,
    }
  }

  /// Retypes a port to another member of its valid-type list.
  ///
  /// Retyping clears the stored value, severs any connection whose peer
  /// type no longer matches, and emits [`WizardEvent::PortTypeChanged`].
  /// Returns `false` when the port is unknown, the new type equals the
  /// current type (no-op), or the new type is not in `valid_types`.
  pub fn set_port_type(&mut self, port: PortRef, new_type: &str) -> bool {
    let Some(p) = self.port(port) else {
      return false;
    };
    if p.current_type() == new_type {
      return false;
    }
    if !p.valid_types().iter().any(|t| t == new_type) {
      return false;
    }

    self
      .port_mut(port)
      .expect("port resolved above")
      .retype(new_type);
    self.events.push(WizardEvent::PortTypeChanged(port));

    // A retype invalidates links to peers of the old type.
    let stale: Vec<PortRef> = self
      .port(port)
      .map(|p| {
        p.connections()
          .iter()
          .copied()
          .filter(|peer| {
            self
              .port(*peer)
              .map(|pp| pp.current_type() != new_type)
              .unwrap_or(true)
          })
          .collect()
      })
      .unwrap_or_default();
    for peer in stale {
      self.disconnect(port, peer);
    }
    true
  }

  /// Stores a value on a port. The value's registry type must equal the
  /// port's current type; a mismatch is rejected with no side effect.
  /// Storing the already-held value is a no-op that emits no event.
  pub fn set_port_value(&mut self, port: PortRef, value: DataValue) -> bool {
    let Some(p) = self.port(port) else {
      return false;
    };
    if p.current_type() != value.type_name() {
      tracing::warn!(
        port = %p.name(),
        port_type = %p.current_type(),
        value_type = %value.type_name(),
        "rejecting value of mismatched type"
      );
      return false;
    }
    if self
      .port_mut(port)
      .expect("port resolved above")
      .store_value(Some(value))
    {
      self.events.push(WizardEvent::PortValueChanged(port));
    }
    true
  }

  /// Clears a port's stored value.
  pub fn clear_port_value(&mut self, port: PortRef) -> bool {
    match self.port_mut(port) {
      Some(p) => {
        if p.store_value(None) {
          self.events.push(WizardEvent::PortValueChanged(port));
        }
        true
      }
      None => false,
    }
  }

  // ==========================================================================
  // Connections
  // ==========================================================================

  /// Connects two ports symmetrically.
  ///
  /// Fails with no side effect when either port is unknown, the ports are
  /// the same, their current types differ, or they are already connected.
  pub fn connect(&mut self, a: PortRef, b: PortRef) -> bool {
    if a == b {
      return false;
    }
    let (Some(pa), Some(pb)) = (self.port(a), self.port(b)) else {
      return false;
    };
    if pa.current_type() != pb.current_type() {
      return false;
    }
    if pa.is_connected_to(b) {
      return false;
    }

    self.port_mut(a).expect("port resolved above").link(b);
    self.port_mut(b).expect("port resolved above").link(a);
    self.events.push(WizardEvent::Connected(a, b));
    true
  }

  /// Disconnects two ports symmetrically. Fails when they are not
  /// connected.
  pub fn disconnect(&mut self, a: PortRef, b: PortRef) -> bool {
    let unlinked = match self.port_mut(a) {
      Some(pa) => pa.unlink(b),
      None => false,
    };
    if !unlinked {
      return false;
    }
    if let Some(pb) = self.port_mut(b) {
      pb.unlink(a);
    }
    self.events.push(WizardEvent::Disconnected(a, b));
    true
  }

  /// Disconnects a port from every peer.
  pub fn disconnect_all(&mut self, port: PortRef) {
    let peers: Vec<PortRef> = self
      .port(port)
      .map(|p| p.connections().to_vec())
      .unwrap_or_default();
    for peer in peers {
      self.disconnect(port, peer);
    }
  }

  /// Editor-side legality check for wiring an output port to an input port.
  ///
  /// The connection is legal when `output` is an output port, `input` is an
  /// input port, their current types match, the input port has no producer
  /// yet, and the wire would not close a cycle: the producing item must not
  /// already depend on the consuming item through its upstream chain.
  pub fn can_connect(&self, output: PortRef, input: PortRef) -> bool {
    if output.dir != PortDir::Output || input.dir != PortDir::Input {
      return false;
    }
    let (Some(po), Some(pi)) = (self.port(output), self.port(input)) else {
      return false;
    };
    if po.current_type() != pi.current_type() {
      return false;
    }
    // One producer per input.
    if !pi.connections().is_empty() {
      return false;
    }
    // A wire from `output.item` into `input.item` closes a cycle when the
    // producer already depends on the consumer (covers self-wires too).
    !self.is_item_connected(output.item, input.item, true)
  }

  /// Queries whether `other` is directly or transitively connected to
  /// `item`, searching the chain of input connections (`via_inputs`,
  /// upstream producers) or output connections (downstream consumers).
  ///
  /// Returns `true` immediately when `other == item`; `false` when either
  /// handle is unknown.
  pub fn is_item_connected(&self, item: ItemId, other: ItemId, via_inputs: bool) -> bool {
    if self.item(item).is_none() || self.item(other).is_none() {
      return false;
    }
    if item == other {
      return true;
    }

    let dir = if via_inputs {
      PortDir::Input
    } else {
      PortDir::Output
    };
    let mut visited: HashSet<ItemId> = HashSet::new();
    let mut stack = vec![item];
    while let Some(current) = stack.pop() {
      if !visited.insert(current) {
        continue;
      }
      if current == other {
        return true;
      }
      let Some(node) = self.item(current) else {
        continue;
      };
      for port in node.ports(dir) {
        for peer in port.connections() {
          if !visited.contains(&peer.item) {
            stack.push(peer.item);
          }
        }
      }
    }
    false
  }

  /// Returns the items directly connected to `item`'s input or output
  /// ports, de-duplicated, in first-encounter order.
  pub fn connected_items(&self, item: ItemId, via_inputs: bool) -> Vec<ItemId> {
    let dir = if via_inputs {
      PortDir::Input
    } else {
      PortDir::Output
    };
    let mut connected = Vec::new();
    if let Some(node) = self.item(item) {
      for port in node.ports(dir) {
        for peer in port.connections() {
          if !connected.contains(&peer.item) {
            connected.push(peer.item);
          }
        }
      }
    }
    connected
  }

  // ==========================================================================
  // Execution order
  // ==========================================================================

  /// Moves an item later in the execution order, up to its first
  /// downstream dependent.
  ///
  /// Scans forward past items that do not consume this item's output
  /// (directly or transitively) and re-inserts the item immediately before
  /// the first one that does. The move is refused when the item is last,
  /// when no later item depends on it (nothing to gain), or when the
  /// dependent immediately follows it — any step past a dependent would
  /// break the topological invariant.
  pub fn increase_item_order(&mut self, id: ItemId) -> bool {
    let Some(pos) = self.position_of(id) else {
      return false;
    };
    if pos + 1 >= self.items.len() {
      return false;
    }
    let dependent = (pos + 1..self.items.len())
      .find(|&j| self.is_item_connected(id, self.items[j].id(), false));
    match dependent {
      None => false,
      Some(j) if j == pos + 1 => false,
      Some(j) => {
        let item = self.items.remove(pos);
        self.items.insert(j - 1, item);
        self.events.push(WizardEvent::OrderChanged);
        true
      }
    }
  }

  /// Moves an item earlier in the execution order, back to its nearest
  /// upstream producer.
  ///
  /// Scans backward past items this item does not depend on and re-inserts
  /// it immediately after the nearest producer of one of its inputs — or
  /// at the front when nothing upstream constrains it. The move is refused
  /// when the item is first or already sits directly after a producer.
  pub fn decrease_item_order(&mut self, id: ItemId) -> bool {
    let Some(pos) = self.position_of(id) else {
      return false;
    };
    if pos == 0 {
      return false;
    }
    let producer = (0..pos)
      .rev()
      .find(|&k| self.is_item_connected(id, self.items[k].id(), true));
    match producer {
      Some(k) if k + 1 == pos => false,
      Some(k) => {
        let item = self.items.remove(pos);
        self.items.insert(k + 1, item);
        self.events.push(WizardEvent::OrderChanged);
        true
      }
      None => {
        let item = self.items.remove(pos);
        self.items.insert(0, item);
        self.events.push(WizardEvent::OrderChanged);
        true
      }
    }
  }

  /// Re-establishes the order invariant after wiring `output_item` into
  /// `input_item`: the producer is walked earlier, one legal relocation at
  /// a time, until it precedes the consumer or no legal move remains.
  /// Best effort — a producer pinned behind its own upstream chain stays
  /// where it is.
  pub fn normalize_order_after_connect(&mut self, output_item: ItemId, input_item: ItemId) {
    loop {
      let (Some(out_pos), Some(in_pos)) =
        (self.position_of(output_item), self.position_of(input_item))
      else {
        return;
      };
      if out_pos < in_pos {
        return;
      }
      if !self.decrease_item_order(output_item) {
        return;
      }
    }
  }

  /// Checks that the current item order is a valid topological order: every
  /// producer precedes all of its consumers.
  pub fn is_order_valid(&self) -> bool {
    for (pos, item) in self.items.iter().enumerate() {
      for port in item.ports(PortDir::Output) {
        for peer in port.connections() {
          if peer.dir != PortDir::Input {
            continue;
          }
          match self.position_of(peer.item) {
            Some(peer_pos) if peer_pos > pos => {}
            _ => return false,
          }
        }
      }
    }
    true
  }

  // ==========================================================================
  // Connection records
  // ==========================================================================

  /// Records every connection whose both ends lie on items in `ids`, as
  /// index pairs relative to that list.
  ///
  /// This is the clipboard/serialization form: no live handles, so the
  /// records survive being written out and replayed against a
  /// reconstructed item list.
  pub fn connections_among(&self, ids: &[ItemId]) -> Vec<WizardConnection> {
    let mut connections = Vec::new();
    for (output_item, id) in ids.iter().enumerate() {
      let Some(item) = self.item(*id) else {
        continue;
      };
      for (output_port, port) in item.ports(PortDir::Output).iter().enumerate() {
        for peer in port.connections() {
          if peer.dir != PortDir::Input {
            continue;
          }
          let Some(input_item) = ids.iter().position(|i| *i == peer.item) else {
            continue;
          };
          connections.push(WizardConnection {
            output_item,
            output_port,
            input_item,
            input_port: peer.index,
          });
        }
      }
    }
    connections
  }

  /// Replays connection records against the items in `ids`, silently
  /// skipping any record whose indices fall outside the list or the
  /// addressed items' port lists.
  pub fn apply_connections(&mut self, ids: &[ItemId], connections: &[WizardConnection]) {
    for conn in connections {
      let (Some(out_id), Some(in_id)) = (
        ids.get(conn.output_item).copied(),
        ids.get(conn.input_item).copied(),
      ) else {
        continue;
      };
      let output = PortRef {
        item: out_id,
        dir: PortDir::Output,
        index: conn.output_port,
      };
      let input = PortRef {
        item: in_id,
        dir: PortDir::Input,
        index: conn.input_port,
      };
      if self.port(output).is_none() || self.port(input).is_none() {
        continue;
      }
      self.connect(output, input);
    }
  }

  // ==========================================================================
  // Internals
  // ==========================================================================

  fn allocate_id(&mut self) -> ItemId {
    let id = ItemId(self.next_id);
    self.next_id += 1;
    id
  }

  /// Position of an item in the execution order.
  pub(crate) fn position_of(&self, id: ItemId) -> Option<usize> {
    self.items.iter().position(|item| item.id() == id)
  }

  pub(crate) fn item_mut(&mut self, id: ItemId) -> Option<&mut WizardItem> {
    self.items.iter_mut().find(|item| item.id() == id)
  }

  pub(crate) fn port_mut(&mut self, port: PortRef) -> Option<&mut WizardPort> {
    self
      .item_mut(port.item)
      .and_then(|item| item.port_mut(port))
  }
}
