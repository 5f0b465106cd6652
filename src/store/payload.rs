//! Payload schema for indexed points

use crate::error::{Error, Result};
use qdrant_client::qdrant::{value::Kind, ListValue, PointStruct, Struct, Value as QdrantValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of content a source holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    #[default]
    Chapter,
    Module,
    Exercise,
    Supplementary,
    UserInput,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Chapter => "chapter",
            SourceType::Module => "module",
            SourceType::Exercise => "exercise",
            SourceType::Supplementary => "supplementary",
            SourceType::UserInput => "user_input",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "chapter" | "textbook_chapter" | "chapter_content" => Ok(SourceType::Chapter),
            "module" | "textbook_module" | "module_content" => Ok(SourceType::Module),
            "exercise" | "exercise_content" => Ok(SourceType::Exercise),
            "supplementary" => Ok(SourceType::Supplementary),
            "user_input" => Ok(SourceType::UserInput),
            _ => Err(Error::InvalidRequest(format!("Unknown source type: {}", s))),
        }
    }
}

/// A point ready to be upserted into a collection
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

impl IndexedPoint {
    /// Convert to qdrant-client PointStruct
    pub fn to_point_struct(self) -> Result<PointStruct> {
        let payload_map = self.payload.to_qdrant_payload()?;
        Ok(PointStruct::new(self.id.to_string(), self.vector, payload_map))
    }
}

/// Payload stored with each chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    /// Chunk text
    pub text: String,

    /// Source document ID
    pub source_id: String,

    pub source_type: SourceType,

    /// Chunk index within the source
    pub chunk_index: usize,

    /// Human-readable key the point id is derived from
    pub point_key: String,

    pub metadata: ChunkMetadata,
}

/// Chunk metadata carried in the payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Character count of the chunk
    pub chunk_size: usize,
    pub word_count: usize,
    /// Offset of the first word in the source
    pub word_start: usize,
    /// Blake3 hash of the chunk text
    pub hash: String,
    pub created_at: String,
}

impl PointPayload {
    /// Convert to Qdrant payload format
    pub fn to_qdrant_payload(&self) -> Result<HashMap<String, QdrantValue>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map
                .into_iter()
                .map(|(k, v)| (k, json_to_qdrant_value(v)))
                .collect()),
            other => Err(Error::Other(format!(
                "Point payload serialized to a non-object: {}",
                other
            ))),
        }
    }

    /// Rebuild a payload from its stored JSON form
    pub fn from_json_map(map: Map<String, Value>) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(map))?)
    }

    /// Rebuild a payload from a Qdrant payload
    pub fn from_qdrant_payload(payload: HashMap<String, QdrantValue>) -> Result<Self> {
        let map = payload
            .into_iter()
            .map(|(k, v)| (k, json_from_qdrant_value(v)))
            .collect::<Map<String, Value>>();
        Self::from_json_map(map)
    }
}

/// Derive the stable point id for a chunk of a source.
///
/// Returns the readable key `{source_id}_{hash8}_{index}` and the UUIDv5 of it.
pub fn point_id(source_id: &str, hash_prefix: &str, index: usize) -> (String, Uuid) {
    let key = format!("{}_{}_{}", source_id, hash_prefix, index);
    let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes());
    (key, id)
}

/// Convert serde_json Value to a Qdrant value
pub(crate) fn json_to_qdrant_value(v: Value) -> QdrantValue {
    let kind = match v {
        Value::Null => Kind::NullValue(0),
        Value::Bool(b) => Kind::BoolValue(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Kind::IntegerValue(i),
            None => Kind::DoubleValue(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => Kind::StringValue(s),
        Value::Array(items) => Kind::ListValue(ListValue {
            values: items.into_iter().map(json_to_qdrant_value).collect(),
        }),
        Value::Object(map) => Kind::StructValue(Struct {
            fields: map
                .into_iter()
                .map(|(k, v)| (k, json_to_qdrant_value(v)))
                .collect(),
        }),
    };
    QdrantValue { kind: Some(kind) }
}

/// Convert Qdrant value to serde_json Value
pub(crate) fn json_from_qdrant_value(v: QdrantValue) -> Value {
    match v.kind {
        Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(
            list.values
                .into_iter()
                .map(json_from_qdrant_value)
                .collect(),
        ),
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, json_from_qdrant_value(v)))
                .collect(),
        ),
        None => Value::Null,
    }
}
