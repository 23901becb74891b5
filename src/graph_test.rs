//! # Graph Test Suite
//!
//! Covers item management, reachability queries, cycle prevention,
//! execution-order maintenance, and connection records.

use crate::graph::{ItemId, WizardGraph};
use crate::item::{ItemKind, WizardConnection};
use crate::port::{PortDir, PortRef};
use crate::value::DataValue;

/// Builds `producer -> consumer` over one int connection and returns
/// `(graph, producer, consumer)`.
fn chain_of_two() -> (WizardGraph, ItemId, ItemId) {
  let mut graph = WizardGraph::new("chain");
  let producer = graph.add_item("producer", ItemKind::Algorithm);
  let consumer = graph.add_item("consumer", ItemKind::Algorithm);
  let output = graph.add_output_port(producer, "out", "int", "").unwrap();
  let input = graph.add_input_port(consumer, "in", "int", "").unwrap();
  assert!(graph.connect(output, input));
  (graph, producer, consumer)
}

fn output_of(item: ItemId) -> PortRef {
  PortRef {
    item,
    dir: PortDir::Output,
    index: 0,
  }
}

fn input_of(item: ItemId) -> PortRef {
  PortRef {
    item,
    dir: PortDir::Input,
    index: 0,
  }
}

// ============================================================================
// Item Management Tests
// ============================================================================

#[test]
fn add_item_appends_in_execution_order() {
  let mut graph = WizardGraph::new("g");
  let a = graph.add_item("a", ItemKind::Importer);
  let b = graph.add_item("b", ItemKind::Viewer);

  let order: Vec<ItemId> = graph.items().iter().map(|i| i.id()).collect();
  assert_eq!(order, vec![a, b]);
  assert_eq!(graph.find_item("a").unwrap().id(), a);
}

#[test]
fn port_membership_predicates_check_side_and_owner() {
  let mut graph = WizardGraph::new("g");
  let a = graph.add_item("a", ItemKind::Algorithm);
  let b = graph.add_item("b", ItemKind::Algorithm);
  let a_in = graph.add_input_port(a, "in", "int", "").unwrap();
  let a_out = graph.add_output_port(a, "out", "int", "").unwrap();

  let item = graph.item(a).unwrap();
  assert!(item.is_input_port(a_in));
  assert!(!item.is_output_port(a_in));
  assert!(item.is_output_port(a_out));
  // A foreign item owns neither.
  let other = graph.item(b).unwrap();
  assert!(!other.is_input_port(a_in));
}

#[test]
fn value_items_have_one_output_and_reject_new_ports() {
  let mut graph = WizardGraph::new("g");
  let literal = graph.add_value_item("Five", DataValue::Int(5));

  let item = graph.item(literal).unwrap();
  assert_eq!(*item.kind(), ItemKind::Value);
  assert!(item.input_ports().is_empty());
  assert_eq!(item.output_ports().len(), 1);
  let port = &item.output_ports()[0];
  assert_eq!(port.name(), "Five");
  assert_eq!(port.current_type(), "int");
  assert_eq!(port.value(), Some(&DataValue::Int(5)));

  assert!(graph.add_input_port(literal, "in", "int", "").is_none());
  assert!(graph.add_output_port(literal, "extra", "int", "").is_none());
}

#[test]
fn remove_item_severs_connections_on_surviving_items() {
  let (mut graph, producer, consumer) = chain_of_two();

  assert!(graph.remove_item(producer));
  assert!(graph.item(producer).is_none());
  let input = input_of(consumer);
  assert!(graph.port(input).unwrap().connections().is_empty());

  assert!(!graph.remove_item(producer));
}

#[test]
fn duplicate_item_copies_definition_but_not_connections() {
  let (mut graph, producer, _) = chain_of_two();
  graph.set_item_position(producer, 10.0, 20.0);

  let copy = graph.duplicate_item(producer).unwrap();
  assert_ne!(copy, producer);
  let copied = graph.item(copy).unwrap();
  assert_eq!(copied.name(), "producer");
  assert_eq!(copied.position(), (10.0, 20.0));
  assert_eq!(copied.output_ports().len(), 1);
  assert!(copied.output_ports()[0].connections().is_empty());
}

#[test]
fn set_batch_mode_updates_both_flags_together() {
  let mut graph = WizardGraph::new("g");
  let item = graph.add_item("task", ItemKind::Algorithm);
  graph.take_events();

  assert!(graph.set_batch_mode(item, true, false));
  let updated = graph.item(item).unwrap();
  assert!(updated.batch_mode());
  assert!(!updated.is_mode_supported());
  assert_eq!(graph.take_events().len(), 1);

  // Same flags again: no event.
  assert!(graph.set_batch_mode(item, true, false));
  assert!(graph.take_events().is_empty());
}

// ============================================================================
// Reachability and Cycle Tests
// ============================================================================

#[test]
fn is_item_connected_walks_the_upstream_chain() {
  let (mut graph, producer, consumer) = chain_of_two();
  let sink = graph.add_item("sink", ItemKind::Exporter);
  let sink_in = graph.add_input_port(sink, "in", "int", "").unwrap();
  let consumer_out = graph.add_output_port(consumer, "out", "int", "").unwrap();
  assert!(graph.connect(consumer_out, sink_in));

  // Upstream: sink reaches consumer and, transitively, producer.
  assert!(graph.is_item_connected(sink, consumer, true));
  assert!(graph.is_item_connected(sink, producer, true));
  // Downstream: producer reaches sink.
  assert!(graph.is_item_connected(producer, sink, false));
  // Not the other way around.
  assert!(!graph.is_item_connected(producer, sink, true));
  // An item is always connected to itself.
  assert!(graph.is_item_connected(sink, sink, true));
}

#[test]
fn can_connect_rejects_would_be_cycles() {
  let (mut graph, producer, consumer) = chain_of_two();
  let back_out = graph.add_output_port(consumer, "out", "int", "").unwrap();
  let back_in = graph.add_input_port(producer, "in", "int", "").unwrap();

  // consumer already depends on producer; wiring consumer -> producer
  // would close a cycle.
  assert!(graph.is_item_connected(consumer, producer, true));
  assert!(!graph.can_connect(back_out, back_in));
}

#[test]
fn can_connect_enforces_direction_type_and_single_producer() {
  let mut graph = WizardGraph::new("g");
  let a = graph.add_item("a", ItemKind::Algorithm);
  let b = graph.add_item("b", ItemKind::Algorithm);
  let c = graph.add_item("c", ItemKind::Algorithm);
  let a_out = graph.add_output_port(a, "out", "int", "").unwrap();
  let b_in = graph.add_input_port(b, "in", "int", "").unwrap();
  let b_in_double = graph.add_input_port(b, "in2", "double", "").unwrap();
  let c_out = graph.add_output_port(c, "out", "int", "").unwrap();

  assert!(graph.can_connect(a_out, b_in));
  // Wrong direction and wrong type.
  assert!(!graph.can_connect(b_in, a_out));
  assert!(!graph.can_connect(a_out, b_in_double));

  // Once fed, an input admits no second producer.
  assert!(graph.connect(a_out, b_in));
  assert!(!graph.can_connect(c_out, b_in));
}

#[test]
fn connected_items_deduplicates_direct_neighbors() {
  let mut graph = WizardGraph::new("g");
  let producer = graph.add_item("producer", ItemKind::Algorithm);
  let consumer = graph.add_item("consumer", ItemKind::Algorithm);
  let out_a = graph.add_output_port(producer, "a", "int", "").unwrap();
  let out_b = graph.add_output_port(producer, "b", "int", "").unwrap();
  let in_a = graph.add_input_port(consumer, "a", "int", "").unwrap();
  let in_b = graph.add_input_port(consumer, "b", "int", "").unwrap();
  assert!(graph.connect(out_a, in_a));
  assert!(graph.connect(out_b, in_b));

  assert_eq!(graph.connected_items(producer, false), vec![consumer]);
  assert_eq!(graph.connected_items(consumer, true), vec![producer]);
  assert!(graph.connected_items(producer, true).is_empty());
}

// ============================================================================
// Execution Order Tests
// ============================================================================

#[test]
fn value_to_consumer_order_scenario() {
  // Graph with a literal int 5 wired into one consumer input: the literal
  // must stay ahead of the consumer, and once disconnected the blocked
  // moves still fail for positional reasons.
  let mut graph = WizardGraph::new("g");
  let literal = graph.add_value_item("Five", DataValue::Int(5));
  let task = graph.add_item("task", ItemKind::Algorithm);
  let input = graph.add_input_port(task, "in", "int", "").unwrap();
  let output = output_of(literal);
  assert!(graph.connect(output, input));

  let order: Vec<ItemId> = graph.items().iter().map(|i| i.id()).collect();
  assert_eq!(order, vec![literal, task]);

  // The consumer directly follows the literal it depends on: neither move
  // is legal.
  assert!(!graph.increase_item_order(literal));
  assert!(!graph.decrease_item_order(task));

  assert!(graph.disconnect(output, input));
  // With the connection gone nothing downstream depends on the literal,
  // so a forward move gains nothing and is refused.
  assert!(!graph.increase_item_order(literal));
  assert!(graph.is_order_valid());
}

#[test]
fn increase_item_order_moves_up_to_the_first_dependent() {
  let mut graph = WizardGraph::new("g");
  let a = graph.add_item("a", ItemKind::Algorithm);
  let b = graph.add_item("b", ItemKind::Algorithm);
  let c = graph.add_item("c", ItemKind::Algorithm);
  let a_out = graph.add_output_port(a, "out", "int", "").unwrap();
  let c_in = graph.add_input_port(c, "in", "int", "").unwrap();
  assert!(graph.connect(a_out, c_in));

  // `a` slides past the unrelated `b` and stops just before its
  // dependent `c`.
  assert!(graph.increase_item_order(a));
  let order: Vec<ItemId> = graph.items().iter().map(|i| i.id()).collect();
  assert_eq!(order, vec![b, a, c]);
  assert!(graph.is_order_valid());

  // Directly before the dependent already: no further move.
  assert!(!graph.increase_item_order(a));
}

#[test]
fn decrease_item_order_with_no_upstream_moves_to_the_front() {
  let mut graph = WizardGraph::new("g");
  let a = graph.add_item("a", ItemKind::Algorithm);
  let b = graph.add_item("b", ItemKind::Algorithm);
  let c = graph.add_item("c", ItemKind::Algorithm);

  assert!(graph.decrease_item_order(c));
  let order: Vec<ItemId> = graph.items().iter().map(|i| i.id()).collect();
  assert_eq!(order, vec![c, a, b]);
  assert!(!graph.decrease_item_order(c)); // already first
}

#[test]
fn decrease_item_order_refuses_to_pass_an_upstream_producer() {
  let (mut graph, producer, consumer) = chain_of_two();
  assert!(!graph.decrease_item_order(consumer));
  assert!(!graph.decrease_item_order(producer)); // already first

  let order: Vec<ItemId> = graph.items().iter().map(|i| i.id()).collect();
  assert_eq!(order, vec![producer, consumer]);
}

#[test]
fn normalize_order_after_connect_walks_the_producer_forward() {
  let mut graph = WizardGraph::new("g");
  let consumer = graph.add_item("consumer", ItemKind::Algorithm);
  let middle = graph.add_item("middle", ItemKind::Viewer);
  let producer = graph.add_item("producer", ItemKind::Algorithm);
  let input = graph.add_input_port(consumer, "in", "int", "").unwrap();
  let output = graph.add_output_port(producer, "out", "int", "").unwrap();

  // The producer sits after its consumer; wiring them demands a reorder.
  assert!(graph.connect(output, input));
  assert!(!graph.is_order_valid());
  graph.normalize_order_after_connect(producer, consumer);

  let order: Vec<ItemId> = graph.items().iter().map(|i| i.id()).collect();
  assert_eq!(order, vec![producer, consumer, middle]);
  assert!(graph.is_order_valid());
}

// ============================================================================
// Connection Record Tests
// ============================================================================

#[test]
fn connections_among_records_index_pairs() {
  let (graph, producer, consumer) = chain_of_two();
  let records = graph.connections_among(&[producer, consumer]);

  assert_eq!(
    records,
    vec![WizardConnection {
      output_item: 0,
      output_port: 0,
      input_item: 1,
      input_port: 0,
    }]
  );

  // A subset missing one endpoint records nothing.
  assert!(graph.connections_among(&[producer]).is_empty());
}

#[test]
fn apply_connections_replays_records_and_skips_out_of_range() {
  let mut graph = WizardGraph::new("g");
  let producer = graph.add_item("producer", ItemKind::Algorithm);
  let consumer = graph.add_item("consumer", ItemKind::Algorithm);
  graph.add_output_port(producer, "out", "int", "").unwrap();
  graph.add_input_port(consumer, "in", "int", "").unwrap();

  let records = vec![
    WizardConnection {
      output_item: 0,
      output_port: 0,
      input_item: 1,
      input_port: 0,
    },
    // Out of range on every index: silently skipped.
    WizardConnection {
      output_item: 5,
      output_port: 9,
      input_item: 7,
      input_port: 3,
    },
  ];
  graph.apply_connections(&[producer, consumer], &records);

  let output = output_of(producer);
  let input = input_of(consumer);
  assert!(graph.port(output).unwrap().is_connected_to(input));
  assert_eq!(graph.connections_among(&[producer, consumer]).len(), 1);
}

#[test]
fn records_round_trip_through_a_duplicate_pair() {
  // Clipboard shape: duplicate two connected items, then replay the
  // original records against the copies.
  let (mut graph, producer, consumer) = chain_of_two();
  let records = graph.connections_among(&[producer, consumer]);

  let producer_copy = graph.duplicate_item(producer).unwrap();
  let consumer_copy = graph.duplicate_item(consumer).unwrap();
  graph.apply_connections(&[producer_copy, consumer_copy], &records);

  let out_copy = output_of(producer_copy);
  let in_copy = input_of(consumer_copy);
  assert!(graph.port(out_copy).unwrap().is_connected_to(in_copy));
}
