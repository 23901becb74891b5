//! # Document Serialization
//!
//! Reading and writing the two XML document shapes:
//!
//! - **Wizard documents** (`.wiz`): the graph root with its items, their
//!   ports, and a trailing flat list of connection records addressed by
//!   item/port indices.
//! - **Batch documents** (`.batchwiz`): batch wizards with their referenced
//!   file sets (de-duplicated by name on load so wizards share one
//!   instance) and literal parameter overrides.
//!
//! Reading builds a small element tree from the `quick_xml` event stream
//! and then interprets it; a document that parses as XML but lacks the
//! expected shape fails with [`WizardError::Malformed`] and no partial
//! object is returned. Item order in a document becomes execution order;
//! the format carries no ordering metadata beyond that and is not
//! re-validated on load.

use crate::batch::{BatchDocument, BatchWizard};
use crate::error::WizardError;
use crate::fileset::{FileSet, RequirementKind};
use crate::graph::{ItemId, WizardGraph};
use crate::item::{ItemKind, WizardConnection, WizardItem};
use crate::port::{PortDir, WizardPort};
use crate::value::DataValue;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;

/// Version attribute written on document roots.
const DOCUMENT_VERSION: &str = "1";

// ============================================================================
// Element tree
// ============================================================================

/// One parsed element: name, attributes, child elements, text content.
#[derive(Debug, Default)]
struct XmlElement {
  name: String,
  attrs: HashMap<String, String>,
  children: Vec<XmlElement>,
  text: String,
}

impl XmlElement {
  fn attr(&self, name: &str) -> Option<&str> {
    self.attrs.get(name).map(String::as_str)
  }

  fn required_attr(&self, name: &str) -> Result<&str, WizardError> {
    self.attr(name).ok_or_else(|| {
      WizardError::malformed(format!(
        "element '{}' is missing required attribute '{}'",
        self.name, name
      ))
    })
  }

  fn child(&self, name: &str) -> Option<&XmlElement> {
    self.children.iter().find(|c| c.name == name)
  }

  fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
    self.children.iter().filter(move |c| c.name == name)
  }
}

/// Parses a document into its root element using a stack over the event
/// stream.
fn parse_document(xml: &str) -> Result<XmlElement, WizardError> {
  let mut reader = Reader::from_str(xml);
  reader.config_mut().trim_text_start = true;
  reader.config_mut().trim_text_end = true;

  let mut stack: Vec<XmlElement> = Vec::new();
  let mut root: Option<XmlElement> = None;

  loop {
    match reader.read_event()? {
      Event::Start(start) => {
        stack.push(element_from(&start)?);
      }
      Event::Empty(start) => {
        let element = element_from(&start)?;
        attach(&mut stack, &mut root, element);
      }
      Event::Text(text) => {
        if let Some(top) = stack.last_mut() {
          top.text.push_str(&text.unescape()?);
        }
      }
      Event::End(_) => {
        let element = stack
          .pop()
          .ok_or_else(|| WizardError::malformed("unbalanced closing tag"))?;
        attach(&mut stack, &mut root, element);
      }
      Event::Eof => break,
      _ => {}
    }
  }

  if !stack.is_empty() {
    return Err(WizardError::malformed("unterminated element"));
  }
  root.ok_or_else(|| WizardError::malformed("document has no root element"))
}

fn element_from(start: &BytesStart<'_>) -> Result<XmlElement, WizardError> {
  let mut element = XmlElement {
    name: String::from_utf8_lossy(start.name().as_ref()).to_string(),
    ..XmlElement::default()
  };
  for attr in start.attributes() {
    let attr = attr.map_err(|e| WizardError::malformed(format!("bad attribute: {e}")))?;
    let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
    let value = attr.unescape_value()?.into_owned();
    element.attrs.insert(key, value);
  }
  Ok(element)
}

fn attach(stack: &mut Vec<XmlElement>, root: &mut Option<XmlElement>, element: XmlElement) {
  match stack.last_mut() {
    Some(parent) => parent.children.push(element),
    None => {
      if root.is_none() {
        *root = Some(element);
      }
    }
  }
}

fn parse_bool(text: Option<&str>) -> bool {
  matches!(text, Some("true") | Some("1"))
}

fn parse_index(element: &XmlElement, attr: &str) -> Result<usize, WizardError> {
  element.required_attr(attr)?.parse::<usize>().map_err(|_| {
    WizardError::malformed(format!(
      "attribute '{}' of '{}' is not an index",
      attr, element.name
    ))
  })
}

// ============================================================================
// Wizard documents
// ============================================================================

/// Serializes a graph to wizard-document XML.
pub fn write_wizard(graph: &WizardGraph) -> Result<String, WizardError> {
  let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

  let mut root = BytesStart::new("wizard");
  root.push_attribute(("version", DOCUMENT_VERSION));
  root.push_attribute(("name", graph.name()));
  root.push_attribute(("type", "WizardObject"));
  let batch = graph.batch().to_string();
  root.push_attribute(("batch", batch.as_str()));
  root.push_attribute(("menuLocation", graph.menu_location()));
  writer.write_event(Event::Start(root))?;

  for item in graph.items() {
    write_item(&mut writer, item)?;
  }

  let ids: Vec<ItemId> = graph.items().iter().map(WizardItem::id).collect();
  for conn in graph.connections_among(&ids) {
    let mut element = BytesStart::new("connection");
    let input_item = conn.input_item.to_string();
    let input_node = conn.input_port.to_string();
    let output_item = conn.output_item.to_string();
    let output_node = conn.output_port.to_string();
    element.push_attribute(("inputItem", input_item.as_str()));
    element.push_attribute(("inputNode", input_node.as_str()));
    element.push_attribute(("outputItem", output_item.as_str()));
    element.push_attribute(("outputNode", output_node.as_str()));
    writer.write_event(Event::Empty(element))?;
  }

  writer.write_event(Event::End(BytesEnd::new("wizard")))?;
  finish(writer)
}

/// Serializes a graph to a file.
pub fn write_wizard_file(graph: &WizardGraph, path: impl AsRef<Path>) -> Result<(), WizardError> {
  let xml = write_wizard(graph)?;
  fs::write(path.as_ref(), xml)?;
  tracing::debug!(path = %path.as_ref().display(), "wrote wizard document");
  Ok(())
}

/// Parses a wizard document.
///
/// Items and their ports are reconstructed first, in document order (which
/// becomes execution order), then connection records are replayed.
///
/// # Errors
///
/// [`WizardError::Malformed`] when the document does not have the wizard
/// shape; no partial graph is returned.
pub fn read_wizard(xml: &str) -> Result<WizardGraph, WizardError> {
  let root = parse_document(xml)?;
  if root.name != "wizard" {
    return Err(WizardError::malformed(format!(
      "expected 'wizard' root element, found '{}'",
      root.name
    )));
  }

  let mut graph = WizardGraph::new(root.attr("name").unwrap_or(""));
  graph.set_batch(parse_bool(root.attr("batch")));
  graph.set_menu_location(root.attr("menuLocation").unwrap_or(""));

  let mut ids: Vec<ItemId> = Vec::new();
  for element in root.children_named("item") {
    ids.push(read_item(&mut graph, element)?);
  }

  let mut connections: Vec<WizardConnection> = Vec::new();
  for element in root.children_named("connection") {
    connections.push(WizardConnection {
      output_item: parse_index(element, "outputItem")?,
      output_port: parse_index(element, "outputNode")?,
      input_item: parse_index(element, "inputItem")?,
      input_port: parse_index(element, "inputNode")?,
    });
  }
  graph.apply_connections(&ids, &connections);

  // Loading is not an edit; start the journal empty.
  graph.take_events();
  Ok(graph)
}

/// Parses a wizard document from a file.
pub fn read_wizard_file(path: impl AsRef<Path>) -> Result<WizardGraph, WizardError> {
  let text = fs::read_to_string(path.as_ref())?;
  tracing::debug!(path = %path.as_ref().display(), "loading wizard document");
  read_wizard(&text)
}

fn write_item(
  writer: &mut Writer<Cursor<Vec<u8>>>,
  item: &WizardItem,
) -> Result<(), WizardError> {
  let mut element = BytesStart::new("item");
  element.push_attribute(("name", item.name()));
  element.push_attribute(("type", item.kind().as_str()));
  let batch = item.batch_mode().to_string();
  let supported = item.is_mode_supported().to_string();
  element.push_attribute(("batch", batch.as_str()));
  element.push_attribute(("batchSupported", supported.as_str()));
  writer.write_event(Event::Start(element))?;

  let (x, y) = item.position();
  write_text_element(writer, "location", &format!("{} {}", x, y))?;

  for port in item.input_ports() {
    write_port(writer, "input", port)?;
  }
  for port in item.output_ports() {
    write_port(writer, "output", port)?;
  }

  writer.write_event(Event::End(BytesEnd::new("item")))?;
  Ok(())
}

fn write_port(
  writer: &mut Writer<Cursor<Vec<u8>>>,
  element_name: &str,
  port: &WizardPort,
) -> Result<(), WizardError> {
  let mut element = BytesStart::new(element_name);
  element.push_attribute(("version", DOCUMENT_VERSION));
  element.push_attribute(("name", port.name()));
  element.push_attribute(("originalType", port.original_type()));
  element.push_attribute(("type", port.current_type()));
  writer.write_event(Event::Start(element))?;

  if !port.description().is_empty() {
    write_text_element(writer, "description", port.description())?;
  }
  for valid_type in port.valid_types() {
    write_text_element(writer, "validType", valid_type)?;
  }
  if let Some(value) = port.value() {
    write_text_element(writer, "value", &value.to_text())?;
  }

  writer.write_event(Event::End(BytesEnd::new(element_name)))?;
  Ok(())
}

fn write_text_element(
  writer: &mut Writer<Cursor<Vec<u8>>>,
  name: &str,
  text: &str,
) -> Result<(), WizardError> {
  writer.write_event(Event::Start(BytesStart::new(name)))?;
  writer.write_event(Event::Text(BytesText::new(text)))?;
  writer.write_event(Event::End(BytesEnd::new(name)))?;
  Ok(())
}

fn read_item(graph: &mut WizardGraph, element: &XmlElement) -> Result<ItemId, WizardError> {
  let name = element.required_attr("name")?;
  let kind: ItemKind = element
    .required_attr("type")?
    .parse()
    .expect("ItemKind::from_str is infallible");

  let id = graph.add_item(name, kind);
  let batch = parse_bool(element.attr("batch"));
  let supported = element
    .attr("batchSupported")
    .map(|v| matches!(v, "true" | "1"))
    .unwrap_or(true);
  graph.set_batch_mode(id, batch, supported);

  if let Some(location) = element.child("location") {
    let mut coords = location.text.split_whitespace();
    let x = coords.next().and_then(|c| c.parse::<f64>().ok());
    let y = coords.next().and_then(|c| c.parse::<f64>().ok());
    if let (Some(x), Some(y)) = (x, y) {
      graph.set_item_position(id, x, y);
    }
  }

  for child in &element.children {
    let dir = match child.name.as_str() {
      "input" => PortDir::Input,
      "output" => PortDir::Output,
      _ => continue,
    };
    let port = read_port(child)?;
    let item = graph
      .item_mut(id)
      .ok_or_else(|| WizardError::malformed("item vanished during load"))?;
    item.ports_mut(dir).push(port);
  }

  Ok(id)
}

fn read_port(element: &XmlElement) -> Result<WizardPort, WizardError> {
  let name = element.required_attr("name")?;
  let original_type = element.required_attr("originalType")?;
  let current_type = element.attr("type").unwrap_or(original_type);

  let mut port = WizardPort::new(name, original_type, "");
  if let Some(description) = element.child("description") {
    port.set_description(&description.text);
  }

  let valid_types: Vec<String> = element
    .children_named("validType")
    .map(|c| c.text.clone())
    .collect();
  port.set_valid_types(valid_types);
  port.restore_type(current_type);

  if let Some(value) = element.child("value") {
    match DataValue::parse(current_type, &value.text) {
      Some(parsed) => {
        port.store_value(Some(parsed));
      }
      None => {
        return Err(WizardError::malformed(format!(
          "port '{}' carries an invalid {} value '{}'",
          name, current_type, value.text
        )));
      }
    }
  }

  Ok(port)
}

// ============================================================================
// Batch documents
// ============================================================================

/// Serializes a batch document to XML.
///
/// Each wizard element carries its referenced file sets inline; a set
/// shared by several wizards is written once per referencing wizard and
/// re-unified by name on load.
pub fn write_batch(document: &BatchDocument) -> Result<String, WizardError> {
  let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

  let mut root = BytesStart::new("batch");
  root.push_attribute(("version", DOCUMENT_VERSION));
  writer.write_event(Event::Start(root))?;

  for wizard in &document.wizards {
    let mut element = BytesStart::new("wizard");
    element.push_attribute(("filename", wizard.wizard_filename()));
    if let Some(repeat) = wizard
      .repeat_file_set()
      .and_then(|id| document.file_sets.get(id))
    {
      element.push_attribute(("repeat", repeat.name()));
    }
    if wizard.cleanup() {
      element.push_attribute(("cleanup", "true"));
    }
    writer.write_event(Event::Start(element))?;

    for id in wizard.file_sets() {
      if let Some(set) = document.file_sets.get(*id) {
        write_file_set(&mut writer, set)?;
      }
    }

    for input in wizard.input_values() {
      let mut parameter = BytesStart::new("parameter");
      parameter.push_attribute(("item", input.item_name()));
      parameter.push_attribute(("name", input.port_name()));
      parameter.push_attribute(("type", input.type_name()));
      writer.write_event(Event::Start(parameter))?;
      write_text_element(&mut writer, "value", &input.value().to_text())?;
      writer.write_event(Event::End(BytesEnd::new("parameter")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("wizard")))?;
  }

  writer.write_event(Event::End(BytesEnd::new("batch")))?;
  finish(writer)
}

/// Serializes a batch document to a file.
pub fn write_batch_file(
  document: &BatchDocument,
  path: impl AsRef<Path>,
) -> Result<(), WizardError> {
  let xml = write_batch(document)?;
  fs::write(path.as_ref(), xml)?;
  Ok(())
}

/// Parses a batch document.
///
/// File sets are de-duplicated by name: the first definition wins and
/// later wizards referencing the same name share the one instance.
pub fn read_batch(xml: &str) -> Result<BatchDocument, WizardError> {
  let root = parse_document(xml)?;
  if root.name != "batch" {
    return Err(WizardError::malformed(format!(
      "expected 'batch' root element, found '{}'",
      root.name
    )));
  }

  let mut document = BatchDocument::new();
  for element in root.children_named("wizard") {
    let mut wizard = BatchWizard::new(element.required_attr("filename")?);
    wizard.set_cleanup(parse_bool(element.attr("cleanup")));

    for set_element in element.children_named("fileset") {
      let name = set_element.required_attr("name")?;
      let id = match document.file_sets.find(name) {
        Some(existing) => existing,
        None => {
          let mut set = FileSet::new(name, set_element.required_attr("dir")?);
          for rule in &set_element.children {
            let kind = match rule.name.as_str() {
              "include" => RequirementKind::Include,
              "exclude" => RequirementKind::Exclude,
              _ => continue,
            };
            set.add_requirement(kind, rule.required_attr("name")?);
          }
          document.file_sets.add(set)
        }
      };
      wizard.add_file_set(id);
    }

    if let Some(repeat) = element.attr("repeat") {
      match document.file_sets.find(repeat) {
        Some(id) => wizard.set_repeat_file_set(id),
        None => {
          tracing::warn!(fileset = %repeat, "repeat attribute names an unknown file set");
        }
      }
    }

    for parameter in element.children_named("parameter") {
      let item = parameter.required_attr("item")?;
      let name = parameter.required_attr("name")?;
      let type_name = parameter.required_attr("type")?;
      let text = parameter
        .child("value")
        .map(|v| v.text.as_str())
        .unwrap_or("");
      match DataValue::parse(type_name, text) {
        Some(value) => {
          wizard.set_input_value(item, name, value);
        }
        None => {
          return Err(WizardError::malformed(format!(
            "parameter '{}' carries an invalid {} value '{}'",
            name, type_name, text
          )));
        }
      }
    }

    document.wizards.push(wizard);
  }

  Ok(document)
}

/// Parses a batch document from a file.
pub fn read_batch_file(path: impl AsRef<Path>) -> Result<BatchDocument, WizardError> {
  let text = fs::read_to_string(path.as_ref())?;
  tracing::debug!(path = %path.as_ref().display(), "loading batch document");
  read_batch(&text)
}

fn write_file_set(
  writer: &mut Writer<Cursor<Vec<u8>>>,
  set: &FileSet,
) -> Result<(), WizardError> {
  let mut element = BytesStart::new("fileset");
  element.push_attribute(("name", set.name()));
  let dir = set.directory().display().to_string();
  element.push_attribute(("dir", dir.as_str()));
  writer.write_event(Event::Start(element))?;

  for requirement in set.requirements() {
    let rule = match requirement.kind {
      RequirementKind::Include => "include",
      RequirementKind::Exclude => "exclude",
    };
    let mut rule_element = BytesStart::new(rule);
    rule_element.push_attribute(("name", requirement.pattern.as_str()));
    writer.write_event(Event::Empty(rule_element))?;
  }

  writer.write_event(Event::End(BytesEnd::new("fileset")))?;
  Ok(())
}

fn finish(writer: Writer<Cursor<Vec<u8>>>) -> Result<String, WizardError> {
  let bytes = writer.into_inner().into_inner();
  String::from_utf8(bytes).map_err(|e| WizardError::malformed(format!("non-utf8 output: {e}")))
}
