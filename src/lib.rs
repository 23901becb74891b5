//! # WizardWeave
//!
//! Wizard execution graphs in pure Rust.
//!
//! WizardWeave models user-composed processing pipelines ("wizards"): a
//! graph of items — plug-in invocations, service calls, or literal values —
//! wired together through typed ports. The crate maintains the graph's
//! legality (type-matched connections, no cycles, topological execution
//! order), persists it as an XML document, and drives batch execution of a
//! serialized graph over sets of files.
//!
//! ## Key Pieces
//!
//! - **Graph**: ordered item collection; item order is execution order
//! - **Item**: one task with typed input/output ports
//! - **Port**: typed connection point; connections are symmetric
//! - **FileSet**: directory + include/exclude globs, iterated file by file
//! - **BatchWizard**: one serialized graph bound to file sets and literal
//!   overrides for unattended, repeated runs
//! - **Executor**: walks a graph in order, delegating single-item execution
//!   to an opaque task runner
//!
//! ## Quick Start
//!
//! ```rust
//! use wizardweave::graph::WizardGraph;
//! use wizardweave::item::ItemKind;
//! use wizardweave::value::DataValue;
//!
//! let mut graph = WizardGraph::new("my wizard");
//! let literal = graph.add_value_item("Threshold", DataValue::Int(5));
//! let task = graph.add_item("Band Math", ItemKind::Algorithm);
//! let input = graph.add_input_port(task, "Threshold", "int", "").unwrap();
//! let output = graph.item(literal).unwrap().output_port("Threshold", "int").unwrap();
//! assert!(graph.can_connect(output, input));
//! assert!(graph.connect(output, input));
//! ```

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// Batch wizards: graph-to-fileset bindings and literal overrides.
pub mod batch;
/// Crate error taxonomy.
pub mod error;
/// Graph execution and the opaque task-runner boundary.
pub mod executor;
/// File sets: directories with include/exclude rules and cursor iteration.
pub mod fileset;
/// The wizard graph: items, connections, ordering, and change events.
pub mod graph;
/// Wizard items and connection records.
pub mod item;
/// Typed ports and port references.
pub mod port;
/// Typed port values.
pub mod value;
/// Wizard and batch document serialization.
pub mod xml;

#[cfg(test)]
mod graph_test;
#[cfg(test)]
mod xml_test;
