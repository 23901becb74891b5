//! # Wizard Execution
//!
//! Drives a wizard graph: items run strictly in execution order, each one
//! through an opaque [`TaskRunner`] that stands in for the plug-in host.
//! The executor owns the data plumbing around every task:
//!
//! 1. Input values are gathered from the item's input ports.
//! 2. The runner executes the task and returns output values keyed by
//!    output port name.
//! 3. Output values are written to the item's output ports and propagated
//!    to every connected input port (a type mismatch is logged and
//!    skipped, never fatal).
//! 4. The item's own port values are cleared so data does not linger
//!    between runs. Value items keep their literals and execute by
//!    propagation alone.
//!
//! A failed task aborts the run: every non-Value item's port values are
//! reset and the failure surfaces as [`WizardError::Execution`].
//!
//! [`run_batch`] repeats this per batch wizard: the graph is loaded from
//! its serialized form, literal overrides are injected into Value items
//! before every run, and the repeat file set decides how many runs happen.

use crate::batch::{BatchDocument, BatchWizard};
use crate::error::WizardError;
use crate::fileset::FileSetStore;
use crate::graph::{ItemId, WizardGraph};
use crate::item::{ItemKind, WizardItem};
use crate::port::{PortDir, PortRef};
use crate::value::DataValue;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Error type for task execution. Opaque to this crate; the message is
/// what ends up in [`WizardError::Execution`].
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// The opaque boundary to whatever actually executes a single item.
///
/// Implementations receive the item definition plus its gathered input
/// values (keyed by input port name) and return output values keyed by
/// output port name. Everything around the call — ordering, propagation,
/// resets — is the executor's job.
pub trait TaskRunner {
  /// Executes one item.
  fn run_task(
    &mut self,
    item: &WizardItem,
    inputs: HashMap<String, DataValue>,
  ) -> Result<HashMap<String, DataValue>, TaskError>;
}

/// One executed item in an [`ExecutionReport`].
#[derive(Debug, Clone)]
pub struct ExecutionStep {
  /// Name of the executed item.
  pub item: String,
  /// Kind of the executed item.
  pub kind: ItemKind,
  /// When execution of this item began.
  pub started: DateTime<Utc>,
}

/// The record of one complete graph run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
  /// Executed items, in execution order.
  pub steps: Vec<ExecutionStep>,
}

/// Executes every item of the graph in execution order.
///
/// # Errors
///
/// Returns [`WizardError::Execution`] when the graph has no items or a
/// task fails; on task failure every non-Value item's port values have
/// been reset before the error is returned.
pub fn execute_graph(
  graph: &mut WizardGraph,
  runner: &mut dyn TaskRunner,
) -> Result<ExecutionReport, WizardError> {
  if graph.items().is_empty() {
    return Err(WizardError::Execution {
      item: graph.name().to_string(),
      message: "there are no items in the wizard to execute".to_string(),
    });
  }

  tracing::info!(wizard = %graph.name(), items = graph.items().len(), "starting wizard execution");

  let order: Vec<ItemId> = graph.items().iter().map(WizardItem::id).collect();
  let mut report = ExecutionReport::default();

  for id in order {
    let Some(item) = graph.item(id) else {
      continue;
    };
    let name = item.name().to_string();
    let kind = item.kind().clone();
    let started = Utc::now();

    if kind == ItemKind::Value {
      tracing::debug!(item = %name, "executing value item");
      propagate_outputs(graph, id);
      report.steps.push(ExecutionStep {
        item: name,
        kind,
        started,
      });
      continue;
    }

    let inputs: HashMap<String, DataValue> = item
      .input_ports()
      .iter()
      .filter_map(|port| port.value().cloned().map(|v| (port.name().to_string(), v)))
      .collect();

    tracing::info!(item = %name, kind = %kind, "executing wizard item");
    match runner.run_task(item, inputs) {
      Ok(outputs) => {
        store_outputs(graph, id, outputs);
        propagate_outputs(graph, id);
        reset_item_values(graph, id);
        report.steps.push(ExecutionStep {
          item: name,
          kind,
          started,
        });
      }
      Err(error) => {
        tracing::error!(item = %name, error = %error, "wizard item failed");
        reset_all_values(graph);
        return Err(WizardError::Execution {
          item: name,
          message: error.to_string(),
        });
      }
    }
  }

  tracing::info!(wizard = %graph.name(), "wizard complete");
  Ok(report)
}

/// Runs every batch wizard of a document.
///
/// Each wizard's graph is loaded from `wizard_filename`, its file sets are
/// resolved and positioned, and the graph executes once per file of the
/// repeat set (exactly once when there is no repeat set), with literal
/// overrides injected before every run. A repeat set that resolves to
/// nothing produces zero runs.
///
/// # Errors
///
/// Returns the first load or execution error; wizards later in the
/// document are not attempted after a failure.
pub fn run_batch(
  document: &mut BatchDocument,
  runner: &mut dyn TaskRunner,
) -> Result<Vec<ExecutionReport>, WizardError> {
  let mut reports = Vec::new();
  let BatchDocument { file_sets, wizards } = document;

  for wizard in wizards.iter() {
    tracing::info!(wizard = %wizard.wizard_filename(), "starting batch wizard");
    let mut graph = crate::xml::read_wizard_file(wizard.wizard_filename())?;

    wizard.initialize_file_sets(file_sets);
    if wizard.repeat_file_set().is_some() && wizard.is_complete(file_sets) {
      tracing::info!(
        wizard = %wizard.wizard_filename(),
        "repeat file set resolved to no files, nothing to run"
      );
      continue;
    }

    loop {
      inject_overrides(&mut graph, wizard, file_sets);
      reports.push(execute_graph(&mut graph, runner)?);
      wizard.advance_file_sets(file_sets);
      if wizard.is_complete(file_sets) {
        break;
      }
    }
  }

  Ok(reports)
}

/// Writes runner outputs into the item's output ports by port name.
fn store_outputs(graph: &mut WizardGraph, id: ItemId, mut outputs: HashMap<String, DataValue>) {
  let Some(item) = graph.item(id) else {
    return;
  };
  let targets: Vec<(usize, String)> = item
    .output_ports()
    .iter()
    .enumerate()
    .map(|(index, port)| (index, port.name().to_string()))
    .collect();

  for (index, port_name) in targets {
    let Some(value) = outputs.remove(&port_name) else {
      continue;
    };
    let port = PortRef {
      item: id,
      dir: PortDir::Output,
      index,
    };
    // The port keeps its declared type; a runner output of another type
    // is dropped with a warning inside set_port_value.
    graph.set_port_value(port, value);
  }

  for leftover in outputs.keys() {
    tracing::warn!(port = %leftover, "runner produced a value for an unknown output port");
  }
}

/// Copies each output port's value to every connected input port.
///
/// A connected port whose current type no longer matches the value is
/// skipped with a warning; the run continues.
fn propagate_outputs(graph: &mut WizardGraph, id: ItemId) {
  let Some(item) = graph.item(id) else {
    return;
  };
  let item_name = item.name().to_string();

  let mut writes: Vec<(PortRef, DataValue)> = Vec::new();
  for port in item.output_ports() {
    let Some(value) = port.value() else {
      continue;
    };
    for peer in port.connections() {
      if peer.dir != PortDir::Input {
        continue;
      }
      match graph.port(*peer) {
        Some(target) if target.current_type() == value.type_name() => {
          writes.push((*peer, value.clone()));
        }
        Some(target) => {
          tracing::warn!(
            item = %item_name,
            output = %port.name(),
            input = %target.name(),
            input_type = %target.current_type(),
            value_type = %value.type_name(),
            "input port type is incompatible with the connected output, value not set"
          );
        }
        None => {}
      }
    }
  }

  for (port, value) in writes {
    graph.set_port_value(port, value);
  }
}

/// Clears every port value on one item.
fn reset_item_values(graph: &mut WizardGraph, id: ItemId) {
  let Some(item) = graph.item(id) else {
    return;
  };
  let mut ports: Vec<PortRef> = Vec::new();
  for dir in [PortDir::Input, PortDir::Output] {
    for index in 0..item.ports(dir).len() {
      ports.push(PortRef {
        item: id,
        dir,
        index,
      });
    }
  }
  for port in ports {
    graph.clear_port_value(port);
  }
}

/// Clears port values on every non-Value item. Value items keep their
/// literals.
fn reset_all_values(graph: &mut WizardGraph) {
  let ids: Vec<ItemId> = graph
    .items()
    .iter()
    .filter(|item| *item.kind() != ItemKind::Value)
    .map(WizardItem::id)
    .collect();
  for id in ids {
    reset_item_values(graph, id);
  }
}

/// Injects a batch wizard's literal overrides into the graph's Value
/// items. A `FileSet` override resolves to the named set's current file
/// as a `Filename` value; an exhausted or unknown set skips the override.
pub(crate) fn inject_overrides(
  graph: &mut WizardGraph,
  wizard: &BatchWizard,
  file_sets: &FileSetStore,
) {
  for input in wizard.input_values() {
    let value = match input.value() {
      DataValue::FileSetRef(name) => {
        let current = file_sets
          .find(name)
          .and_then(|id| file_sets.get(id))
          .and_then(|set| set.current());
        match current {
          Some(path) => DataValue::Filename(path.to_path_buf()),
          None => {
            tracing::warn!(
              fileset = %name,
              item = %input.item_name(),
              "file set reference cannot be resolved, override skipped"
            );
            continue;
          }
        }
      }
      other => other.clone(),
    };

    let Some(target) = graph.items().iter().find(|item| {
      *item.kind() == ItemKind::Value
        && item.name() == input.item_name()
        && item
          .output_ports()
          .first()
          .map(|p| p.name() == input.port_name())
          .unwrap_or(false)
    }) else {
      tracing::warn!(
        item = %input.item_name(),
        port = %input.port_name(),
        "no matching value item for override"
      );
      continue;
    };

    let port = PortRef {
      item: target.id(),
      dir: PortDir::Output,
      index: 0,
    };
    // Overrides replace the literal wholesale, retype included.
    if let Some(p) = graph.port_mut(port) {
      p.restore_type(value.type_name());
      p.store_value(Some(value));
    }
  }
}
