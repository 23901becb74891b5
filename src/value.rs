//! # Data Values
//!
//! Typed values carried by wizard ports and batch parameter overrides.
//!
//! A [`DataValue`] is a tagged union keyed by the same closed type registry
//! that port `valid_types` lists use. Scalar variants cover the literal types
//! a Value item can hold directly; plug-in-defined payloads travel as
//! [`DataValue::Object`] with a `serde_json::Value` body, so executors and
//! tests can pass structured data without this crate knowing its shape.
//!
//! The registry names are the strings that appear in `type` attributes of
//! serialized documents: `"int"`, `"double"`, `"bool"`, `"string"`,
//! `"Filename"`, `"FileSet"`, or the object's own type name.

use std::fmt;
use std::path::PathBuf;

/// A typed, self-describing port value.
///
/// Values compare by structural equality, which is what the no-op rules for
/// `set_value` rely on: storing an equal value emits no change event.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
  /// Signed integer literal (`"int"`).
  Int(i64),
  /// Floating-point literal (`"double"`).
  Double(f64),
  /// Boolean literal (`"bool"`).
  Bool(bool),
  /// Text literal (`"string"`).
  String(String),
  /// Path to a file (`"Filename"`).
  Filename(PathBuf),
  /// Reference to a named file set (`"FileSet"`).
  ///
  /// Only meaningful inside batch parameter overrides; the batch driver
  /// resolves it to the named set's current file before each run.
  FileSetRef(String),
  /// Plug-in-defined payload tagged with its own type name.
  Object {
    /// The plug-in-defined type name (e.g. `"RasterElement"`).
    type_name: String,
    /// The payload body.
    value: serde_json::Value,
  },
}

impl DataValue {
  /// Returns the registry name of this value's type.
  pub fn type_name(&self) -> &str {
    match self {
      DataValue::Int(_) => "int",
      DataValue::Double(_) => "double",
      DataValue::Bool(_) => "bool",
      DataValue::String(_) => "string",
      DataValue::Filename(_) => "Filename",
      DataValue::FileSetRef(_) => "FileSet",
      DataValue::Object { type_name, .. } => type_name,
    }
  }

  /// Renders the value as the text form used inside `<value>` elements.
  pub fn to_text(&self) -> String {
    match self {
      DataValue::Int(i) => i.to_string(),
      DataValue::Double(d) => d.to_string(),
      DataValue::Bool(b) => b.to_string(),
      DataValue::String(s) => s.clone(),
      DataValue::Filename(p) => p.display().to_string(),
      DataValue::FileSetRef(name) => name.clone(),
      DataValue::Object { value, .. } => value.to_string(),
    }
  }

  /// Parses the text form of a value, guided by its registry type name.
  ///
  /// # Arguments
  ///
  /// * `type_name` - The registry name from the document's `type` attribute
  /// * `text` - The element text content
  ///
  /// # Returns
  ///
  /// `Some(DataValue)` on success. `None` only for scalar types whose text
  /// does not parse (a malformed document); unknown type names always
  /// succeed as [`DataValue::Object`], falling back to a JSON string body
  /// when the text is not valid JSON.
  pub fn parse(type_name: &str, text: &str) -> Option<DataValue> {
    match type_name {
      "int" => text.trim().parse::<i64>().ok().map(DataValue::Int),
      "double" => text.trim().parse::<f64>().ok().map(DataValue::Double),
      "bool" => match text.trim() {
        "true" | "1" => Some(DataValue::Bool(true)),
        "false" | "0" => Some(DataValue::Bool(false)),
        _ => None,
      },
      "string" => Some(DataValue::String(text.to_string())),
      "Filename" => Some(DataValue::Filename(PathBuf::from(text))),
      "FileSet" => Some(DataValue::FileSetRef(text.to_string())),
      other => {
        let value = serde_json::from_str(text)
          .unwrap_or_else(|_| serde_json::Value::String(text.to_string()));
        Some(DataValue::Object {
          type_name: other.to_string(),
          value,
        })
      }
    }
  }
}

impl fmt::Display for DataValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.to_text())
  }
}
