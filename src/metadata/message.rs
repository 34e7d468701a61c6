use serde_json::Value;

/// One JSON value received as a metadata frame
///
/// No schema is enforced; the value is forwarded verbatim. Accessors cover
/// the fields servers commonly send for the playing track.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataMessage(Value);

impl MetadataMessage {
    /// Wrap a parsed frame
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Look up a top-level field
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Track title, if the server sent one
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.get("title").and_then(Value::as_str)
    }

    /// Track artist, if the server sent one
    #[must_use]
    pub fn artist(&self) -> Option<&str> {
        self.get("artist").and_then(Value::as_str)
    }

    /// Borrow the raw value
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Take the raw value
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for MetadataMessage {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
