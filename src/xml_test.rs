//! # Serialization Test Suite
//!
//! Round-trips wizard and batch documents and checks the malformed-input
//! failure paths.

use crate::batch::{BatchDocument, BatchWizard};
use crate::fileset::{FileSet, RequirementKind};
use crate::graph::{ItemId, WizardGraph};
use crate::item::ItemKind;
use crate::value::DataValue;
use crate::xml;

/// A graph exercising every serialized feature: a literal, an algorithm
/// with retyped and described ports, one connection, and layout data.
fn sample_graph() -> WizardGraph {
  let mut graph = WizardGraph::new("sample");
  graph.set_batch(true);
  graph.set_menu_location("Tools/Samples");

  let literal = graph.add_value_item("Threshold", DataValue::Int(5));
  graph.set_item_position(literal, 12.5, 40.0);

  let task = graph.add_item("Band Math", ItemKind::Algorithm);
  graph.set_batch_mode(task, true, false);
  graph.set_item_position(task, 80.0, 40.0);
  let input = graph
    .add_input_port(task, "Threshold", "int", "Cutoff value")
    .unwrap();
  graph.set_valid_types(input, vec!["int".to_string(), "double".to_string()]);
  let result = graph
    .add_output_port(task, "Result", "RasterElement", "")
    .unwrap();
  graph.set_port_value(
    result,
    DataValue::Object {
      type_name: "RasterElement".to_string(),
      value: serde_json::json!({"bands": 3}),
    },
  );

  let out = graph
    .item(literal)
    .unwrap()
    .output_port("Threshold", "int")
    .unwrap();
  assert!(graph.connect(out, input));
  graph
}

// ============================================================================
// Wizard Document Tests
// ============================================================================

#[test]
fn wizard_round_trip_preserves_items_ports_and_connections() {
  let graph = sample_graph();
  let xml_text = xml::write_wizard(&graph).unwrap();
  let loaded = xml::read_wizard(&xml_text).unwrap();

  assert_eq!(loaded.name(), "sample");
  assert!(loaded.batch());
  assert_eq!(loaded.menu_location(), "Tools/Samples");

  // Identical item order.
  let names: Vec<&str> = loaded.items().iter().map(|i| i.name()).collect();
  assert_eq!(names, vec!["Threshold", "Band Math"]);

  let literal = &loaded.items()[0];
  assert_eq!(*literal.kind(), ItemKind::Value);
  assert_eq!(literal.position(), (12.5, 40.0));
  assert_eq!(
    literal.output_ports()[0].value(),
    Some(&DataValue::Int(5))
  );

  let task = &loaded.items()[1];
  assert!(task.batch_mode());
  assert!(!task.is_mode_supported());
  let input = &task.input_ports()[0];
  assert_eq!(input.description(), "Cutoff value");
  assert_eq!(
    input.valid_types(),
    ["int".to_string(), "double".to_string()]
  );
  let result = &task.output_ports()[0];
  assert_eq!(result.current_type(), "RasterElement");
  assert_eq!(
    result.value(),
    Some(&DataValue::Object {
      type_name: "RasterElement".to_string(),
      value: serde_json::json!({"bands": 3}),
    })
  );

  // Identical connection set as index pairs.
  let original_ids: Vec<ItemId> = graph.items().iter().map(|i| i.id()).collect();
  let loaded_ids: Vec<ItemId> = loaded.items().iter().map(|i| i.id()).collect();
  assert_eq!(
    graph.connections_among(&original_ids),
    loaded.connections_among(&loaded_ids)
  );
}

#[test]
fn serializing_twice_is_stable() {
  let graph = sample_graph();
  let first = xml::write_wizard(&graph).unwrap();
  let reloaded = xml::read_wizard(&first).unwrap();
  let second = xml::write_wizard(&reloaded).unwrap();
  assert_eq!(first, second);
}

#[test]
fn loaded_graphs_start_with_an_empty_event_journal() {
  let xml_text = xml::write_wizard(&sample_graph()).unwrap();
  let mut loaded = xml::read_wizard(&xml_text).unwrap();
  assert!(loaded.take_events().is_empty());
}

#[test]
fn wizard_rejects_wrong_root_and_broken_documents() {
  assert!(xml::read_wizard("<other/>").is_err());
  assert!(xml::read_wizard("not xml at all <<<").is_err());
  assert!(xml::read_wizard("").is_err());
  // An item without a name attribute.
  assert!(xml::read_wizard(r#"<wizard name="w"><item type="Value"/></wizard>"#).is_err());
  // A scalar value that does not parse.
  assert!(
    xml::read_wizard(
      r#"<wizard name="w">
        <item name="v" type="Value">
          <output version="1" name="v" originalType="int" type="int">
            <value>five</value>
          </output>
        </item>
      </wizard>"#
    )
    .is_err()
  );
}

#[test]
fn escaped_text_survives_the_round_trip() {
  let mut graph = WizardGraph::new("escapes & <angles>");
  graph.add_value_item("note", DataValue::String("a < b && c > d".to_string()));

  let xml_text = xml::write_wizard(&graph).unwrap();
  let loaded = xml::read_wizard(&xml_text).unwrap();
  assert_eq!(loaded.name(), "escapes & <angles>");
  assert_eq!(
    loaded.items()[0].output_ports()[0].value(),
    Some(&DataValue::String("a < b && c > d".to_string()))
  );
}

// ============================================================================
// Batch Document Tests
// ============================================================================

fn sample_batch() -> BatchDocument {
  let mut document = BatchDocument::new();

  let mut looped = FileSet::new("scenes", "/data/scenes");
  looped.add_requirement(RequirementKind::Include, "*.tif");
  looped.add_requirement(RequirementKind::Exclude, "cloudy.tif");
  let looped = document.file_sets.add(looped);
  let aux = document.file_sets.add(FileSet::new("aux", "/data/aux"));

  let mut wizard = BatchWizard::new("wizards/ingest.wiz");
  wizard.set_cleanup(true);
  wizard.set_repeat_file_set(looped);
  wizard.add_file_set(aux);
  wizard.set_input_value("Input File", "Input File", DataValue::FileSetRef("scenes".to_string()));
  wizard.set_input_value("Threshold", "Threshold", DataValue::Double(0.5));
  document.wizards.push(wizard);

  // A second wizard sharing the same repeat set by name.
  let mut second = BatchWizard::new("wizards/report.wiz");
  second.set_repeat_file_set(looped);
  document.wizards.push(second);

  document
}

#[test]
fn batch_round_trip_preserves_wizards_filesets_and_parameters() {
  let document = sample_batch();
  let xml_text = xml::write_batch(&document).unwrap();
  let loaded = xml::read_batch(&xml_text).unwrap();

  assert_eq!(loaded.wizards.len(), 2);

  let wizard = &loaded.wizards[0];
  assert_eq!(wizard.wizard_filename(), "wizards/ingest.wiz");
  assert!(wizard.cleanup());
  assert_eq!(wizard.file_sets().len(), 2);

  let repeat = wizard.repeat_file_set().unwrap();
  let scenes = loaded.file_sets.get(repeat).unwrap();
  assert_eq!(scenes.name(), "scenes");
  assert_eq!(scenes.requirements().len(), 2);
  assert_eq!(scenes.requirements()[0].kind, RequirementKind::Include);
  assert_eq!(scenes.requirements()[0].pattern, "*.tif");

  assert_eq!(wizard.input_values().len(), 2);
  assert_eq!(
    wizard.input_values()[0].value(),
    &DataValue::FileSetRef("scenes".to_string())
  );
  assert_eq!(wizard.input_values()[1].value(), &DataValue::Double(0.5));

  // Both wizards resolved "scenes" to the same shared instance.
  let second = &loaded.wizards[1];
  assert_eq!(second.repeat_file_set(), Some(repeat));
  assert!(!second.cleanup());
}

#[test]
fn batch_rejects_wrong_root_and_missing_attributes() {
  assert!(xml::read_batch("<wizard/>").is_err());
  assert!(xml::read_batch(r#"<batch><wizard/></batch>"#).is_err());
  assert!(
    xml::read_batch(r#"<batch><wizard filename="w.wiz"><fileset dir="/d"/></wizard></batch>"#)
      .is_err()
  );
}
