//! Per-document text extraction.
//!
//! Every configured field is turned into text through [`FieldValue`], the
//! field texts are joined with single spaces, trimmed, and normalized with
//! [`TextNormalization`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CorpusError, Result};
use crate::format::id_violation;

/// Name of the required identifier field.
pub const ID_FIELD: &str = "id";

/// A JSON field value, classified once by how it becomes text.
#[derive(Debug, Clone, Copy)]
pub enum FieldValue<'a> {
    /// A JSON string, used as-is.
    Text(&'a str),
    /// A JSON array; elements are rendered one by one and space-joined.
    Sequence(&'a [Value]),
    /// Anything else (number, bool, null, object): canonical compact JSON.
    Other(&'a Value),
}

impl<'a> FieldValue<'a> {
    pub fn classify(value: &'a Value) -> Self {
        match value {
            Value::String(s) => FieldValue::Text(s),
            Value::Array(items) => FieldValue::Sequence(items),
            other => FieldValue::Other(other),
        }
    }

    /// Append this value's text to `out`.
    pub fn render_into(&self, out: &mut String) {
        match self {
            FieldValue::Text(s) => out.push_str(s),
            FieldValue::Sequence(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    render_element(item, out);
                }
            }
            FieldValue::Other(v) => out.push_str(&v.to_string()),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }
}

/// Sequence elements: strings as-is, everything else (nested arrays
/// included) as compact JSON.
fn render_element(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => out.push_str(s),
        other => out.push_str(&other.to_string()),
    }
}

/// How extracted text is normalized before it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextNormalization {
    /// Nearest-ASCII transliteration.
    #[default]
    Ascii,
    /// Keep UTF-8 text untouched.
    Preserve,
}

impl TextNormalization {
    pub fn apply(self, text: String) -> String {
        match self {
            TextNormalization::Ascii => transliterate(&text),
            TextNormalization::Preserve => text,
        }
    }
}

/// Deterministic nearest-ASCII transliteration (`"Héllo"` -> `"Hello"`).
pub fn transliterate(text: &str) -> String {
    deunicode::deunicode(text)
}

/// Read the document identifier from a parsed source line.
///
/// Strings are used as-is and numbers by their JSON text. Ids must fit in
/// a tab/newline-delimited index line.
pub fn document_id(record: &Map<String, Value>, line: u64) -> Result<String> {
    let id = match record.get(ID_FIELD) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(CorpusError::InvalidId {
                line,
                reason: format!("expected a string or number, got {}", json_type(other)),
            })
        }
        None => {
            return Err(CorpusError::MissingField {
                line,
                field: ID_FIELD.to_string(),
            })
        }
    };

    if let Some(reason) = id_violation(&id) {
        return Err(CorpusError::InvalidId {
            line,
            reason: reason.to_string(),
        });
    }
    Ok(id)
}

/// Build the stored text for one document: configured fields in order,
/// space-joined, trimmed, then normalized.
pub fn document_text(
    record: &Map<String, Value>,
    keys: &[String],
    normalization: TextNormalization,
    line: u64,
) -> Result<String> {
    let mut joined = String::new();
    for (i, key) in keys.iter().enumerate() {
        let value = record.get(key).ok_or_else(|| CorpusError::MissingField {
            line,
            field: key.clone(),
        })?;
        if i > 0 {
            joined.push(' ');
        }
        FieldValue::classify(value).render_into(&mut joined);
    }

    Ok(normalization.apply(joined.trim().to_string()))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
