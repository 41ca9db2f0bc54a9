//! Request payloads
//!
//! Reads send their payload as query parameters, writes send it as a JSON
//! body, and media-style uploads send multipart form data. A multipart form
//! cannot be replayed once sent, so `FormBody` keeps the parts and builds a
//! fresh `reqwest::multipart::Form` for every attempt.

use reqwest::multipart::{Form, Part};
use serde_json::Value;
use sitebroker_core::{Error, Result};

#[derive(Debug, Clone)]
pub enum Payload {
    Json(Value),
    Form(FormBody),
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<FormBody> for Payload {
    fn from(form: FormBody) -> Self {
        Payload::Form(form)
    }
}

impl Payload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(v) => Some(v),
            Payload::Form(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime: Option<String>,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct FormBody {
    parts: Vec<FormPart>,
}

impl FormBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            mime,
            bytes,
        });
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    /// Flatten a JSON object into text fields
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            Error::InvalidRequest("Form data payload must be a JSON object".to_string())
        })?;

        Ok(object
            .iter()
            .filter_map(|(k, v)| scalar_to_string(v).map(|s| (k, s)))
            .fold(FormBody::new(), |form, (k, s)| form.text(k.clone(), s)))
    }

    pub fn to_multipart(&self) -> Result<Form> {
        let mut form = Form::new();
        for part in &self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
                FormPart::File {
                    name,
                    file_name,
                    mime,
                    bytes,
                } => {
                    let mut file = Part::bytes(bytes.clone()).file_name(file_name.clone());
                    if let Some(mime) = mime {
                        file = file.mime_str(mime).map_err(|e| {
                            Error::InvalidRequest(format!("Invalid MIME type '{}': {}", mime, e))
                        })?;
                    }
                    form.part(name.clone(), file)
                }
            };
        }
        Ok(form)
    }
}

/// Render a JSON value as a query or form field; `None` drops the field
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(scalar_to_string)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}

/// Query pairs for a read; the payload must be a JSON object
pub(crate) fn query_pairs(value: &Value) -> Result<Vec<(String, String)>> {
    let object = value.as_object().ok_or_else(|| {
        Error::InvalidRequest("Query payload must be a JSON object".to_string())
    })?;

    Ok(object
        .iter()
        .filter_map(|(k, v)| scalar_to_string(v).map(|s| (k.clone(), s)))
        .collect())
}
