//! Domain models for the resource reconciler.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::address::ResourceAddress;
use crate::error::ReconcilerError;

/// Wire encoding of a document body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Json,
    #[default]
    Yaml,
}

impl Encoding {
    /// Value for the `Content-Type` and `Accept` headers.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Yaml => "application/yaml",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = ReconcilerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" => Ok(Self::Yaml),
            _ => Err(ReconcilerError::InvalidEncoding(s.to_owned())),
        }
    }
}

/// Desired content of one resource plus its address.
///
/// Built fresh for each operation and not modified afterwards. The metadata
/// block is synthesized from the address, labels and annotations when the
/// body is prepared, see [`ResourceDocument::prepare_content`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDocument {
    address: ResourceAddress,
    encoding: Encoding,
    raw_content: Bytes,
    labels: BTreeMap<String, String>,
    annotations: BTreeMap<String, String>,
    wait_for: Vec<String>,
    synthesize_metadata: bool,
}

impl ResourceDocument {
    #[must_use]
    pub fn new(address: ResourceAddress, encoding: Encoding, raw_content: impl Into<Bytes>) -> Self {
        Self {
            address,
            encoding,
            raw_content: raw_content.into(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            wait_for: Vec::new(),
            synthesize_metadata: true,
        }
    }

    /// Builds a document from a complete manifest that carries its own
    /// `apiVersion`, `kind` and `metadata`.
    ///
    /// The address is derived from the manifest and the body is sent as is.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcilerError::InvalidDocument`] if the manifest cannot be
    /// decoded or lacks a kind or a name.
    pub fn from_manifest(
        content: impl Into<Bytes>,
        encoding: Encoding,
    ) -> Result<Self, ReconcilerError> {
        let content = content.into();
        let address = crate::manifest::address_of(&content, encoding)?;

        Ok(Self {
            synthesize_metadata: false,
            ..Self::new(address, encoding, content)
        })
    }

    #[must_use]
    pub fn with_labels<K, V>(mut self, labels: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.labels = labels
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    #[must_use]
    pub fn with_annotations<K, V>(mut self, annotations: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.annotations = annotations
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Declares wait-for targets, see [`crate::WaitTarget`].
    #[must_use]
    pub fn with_wait_for<S: Into<String>>(mut self, targets: impl IntoIterator<Item = S>) -> Self {
        self.wait_for = targets.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn address(&self) -> &ResourceAddress {
        &self.address
    }

    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    #[must_use]
    pub fn raw_content(&self) -> &Bytes {
        &self.raw_content
    }

    #[must_use]
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    #[must_use]
    pub fn annotations(&self) -> &BTreeMap<String, String> {
        &self.annotations
    }

    #[must_use]
    pub fn wait_for(&self) -> &[String] {
        &self.wait_for
    }

    /// Produces the request body.
    ///
    /// For YAML the metadata block is written as text and the raw content is
    /// appended unchanged, so raw content must not declare its own
    /// `metadata`. For JSON the metadata is inserted into the top-level
    /// object. Documents built with [`Self::from_manifest`] are returned
    /// verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcilerError::InvalidDocument`] for JSON content that is
    /// not an object or already contains `metadata`.
    pub fn prepare_content(&self) -> Result<Bytes, ReconcilerError> {
        if !self.synthesize_metadata {
            return Ok(self.raw_content.clone());
        }

        match self.encoding {
            Encoding::Yaml => Ok(Bytes::from(self.yaml_envelope())),
            Encoding::Json => self.json_envelope().map(Bytes::from),
        }
    }

    fn yaml_envelope(&self) -> Vec<u8> {
        let mut buf = String::from("metadata:\n");
        buf.push_str("  name: ");
        buf.push_str(&yaml_quote(self.address.name()));
        buf.push('\n');

        if let Some(namespace) = self.address.effective_namespace() {
            buf.push_str("  namespace: ");
            buf.push_str(&yaml_quote(namespace));
            buf.push('\n');
        }

        write_yaml_map(&mut buf, "labels", &self.labels);
        write_yaml_map(&mut buf, "annotations", &self.annotations);

        let mut out = buf.into_bytes();
        out.extend_from_slice(&self.raw_content);
        out
    }

    fn json_envelope(&self) -> Result<Vec<u8>, ReconcilerError> {
        let mut body = if self.raw_content.iter().all(u8::is_ascii_whitespace) {
            serde_json::Map::new()
        } else {
            match serde_json::from_slice::<serde_json::Value>(&self.raw_content) {
                Ok(serde_json::Value::Object(map)) => map,
                Ok(_) => {
                    return Err(ReconcilerError::InvalidDocument(
                        "JSON content must be an object".to_owned(),
                    ));
                }
                Err(e) => return Err(ReconcilerError::InvalidDocument(e.to_string())),
            }
        };

        if body.contains_key("metadata") {
            return Err(ReconcilerError::InvalidDocument(
                "content must not declare 'metadata'".to_owned(),
            ));
        }

        let mut metadata = serde_json::Map::new();
        metadata.insert("name".to_owned(), self.address.name().into());
        if let Some(namespace) = self.address.effective_namespace() {
            metadata.insert("namespace".to_owned(), namespace.into());
        }
        if !self.labels.is_empty() {
            metadata.insert("labels".to_owned(), json_object(&self.labels));
        }
        if !self.annotations.is_empty() {
            metadata.insert("annotations".to_owned(), json_object(&self.annotations));
        }
        body.insert("metadata".to_owned(), serde_json::Value::Object(metadata));

        serde_json::to_vec(&body).map_err(|e| ReconcilerError::InvalidDocument(e.to_string()))
    }
}

fn json_object(map: &BTreeMap<String, String>) -> serde_json::Value {
    serde_json::Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect(),
    )
}

fn write_yaml_map(buf: &mut String, label: &str, map: &BTreeMap<String, String>) {
    if map.is_empty() {
        return;
    }

    buf.push_str("  ");
    buf.push_str(label);
    buf.push_str(":\n");

    for (key, value) in map {
        buf.push_str("    ");
        if is_plain_yaml_key(key) {
            buf.push_str(key);
        } else {
            buf.push_str(&yaml_quote(key));
        }
        buf.push_str(": ");
        buf.push_str(&yaml_quote(value));
        buf.push('\n');
    }
}

fn is_plain_yaml_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'))
}

/// Double-quoted YAML scalar.
fn yaml_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
