use dumbvec_cache::Weighted;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Doc set versions this crate writes and accepts.
pub const DOCSET_VERSION: f64 = 1.1;
pub const SUPPORTED_DOCSET_VERSIONS: [f64; 2] = [1.0, 1.1];

/// A source record. Documents are arbitrary JSON objects; the index only
/// ever looks at them through the embedding function.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Reads `field` as an array of numbers. Returns `None` when the field is
    /// missing, is not an array, or holds a non-numeric element.
    pub fn numeric_array(&self, field: &str) -> Option<Vec<f32>> {
        self.0
            .get(field)?
            .as_array()?
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect()
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Document(map)
    }
}

impl TryFrom<Value> for Document {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Document(map)),
            other => Err(other),
        }
    }
}

impl Weighted for Document {
    fn weight(&self) -> usize {
        // Serialized size is a good enough proxy for the heap footprint.
        serde_json::to_vec(&self.0).map(|v| v.len()).unwrap_or(0) + 1
    }
}

/// A named collection of documents persisted as one unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocSet {
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "v")]
    pub version: f64,
    #[serde(rename = "d")]
    pub documents: Vec<Document>,
}

impl DocSet {
    pub fn new(name: impl Into<String>, documents: Vec<Document>) -> Self {
        DocSet {
            name: name.into(),
            version: DOCSET_VERSION,
            documents,
        }
    }

    pub fn is_supported_version(&self) -> bool {
        SUPPORTED_DOCSET_VERSIONS.contains(&self.version)
    }
}

impl Weighted for DocSet {
    fn weight(&self) -> usize {
        self.name.len() + self.documents.iter().map(Weighted::weight).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_array() {
        let doc = Document::try_from(json!({
            "embedding": [0.5, -1, 0.25],
            "mixed": [0.5, "x"],
            "text": "hello",
        }))
        .unwrap();
        assert_eq!(doc.numeric_array("embedding"), Some(vec![0.5, -1.0, 0.25]));
        assert_eq!(doc.numeric_array("mixed"), None);
        assert_eq!(doc.numeric_array("text"), None);
        assert_eq!(doc.numeric_array("missing"), None);
    }

    #[test]
    fn test_document_must_be_object() {
        assert!(Document::try_from(json!([1, 2])).is_err());
        assert!(serde_json::from_value::<Document>(json!("text")).is_err());
    }

    #[test]
    fn test_docset_wire_shape() {
        let mut doc = Document::new();
        doc.insert("id", 7);
        let set = DocSet::new("notes_0_1", vec![doc]);
        let value = serde_json::to_value(&set).unwrap();
        assert_eq!(value, json!({"n": "notes_0_1", "v": 1.1, "d": [{"id": 7}]}));

        let old: DocSet = serde_json::from_value(json!({"n": "old", "v": 1, "d": []})).unwrap();
        assert!(old.is_supported_version());
        let future: DocSet = serde_json::from_value(json!({"n": "new", "v": 2, "d": []})).unwrap();
        assert!(!future.is_supported_version());
    }
}
