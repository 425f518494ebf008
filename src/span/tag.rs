use serde_json::Value;


/// Ordered, append-only map of span tags.
///
/// Values are stored already coerced to strings; duplicate keys keep
/// every appended entry and lookups return the most recent one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpanTags(Vec<(String, String)>);

impl SpanTags {
    /// Returns a new empty tag list.
    pub fn new() -> SpanTags {
        SpanTags(Vec::new())
    }
}

impl SpanTags {
    /// Attempt to fetch a tag by name.
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(key, _)| key == tag)
            .map(|(_, value)| value.as_str())
    }

    /// Returns an iterator over all tags in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Append a tag, coercing the value to its string form.
    pub fn tag<TV: Into<TagValue>>(&mut self, tag: &str, value: TV) {
        self.0.push((String::from(tag), value.into().coerce()));
    }
}


/// Closed set of accepted tag value shapes.
///
/// Tagging is a total operation: anything outside the scalar shapes
/// coerces to the empty string instead of failing, so instrumentation
/// can never break the traced request.
#[derive(Clone, Debug, PartialEq)]
pub enum TagValue {
    Boolean(bool),
    Float(f64),
    Integer(i64),
    String(String),
    Unsupported,
}

impl TagValue {
    /// Total conversion to the reported string form.
    pub fn coerce(&self) -> String {
        match self {
            TagValue::Boolean(value) => value.to_string(),
            TagValue::Float(value) => value.to_string(),
            TagValue::Integer(value) => value.to_string(),
            TagValue::String(value) => value.clone(),
            TagValue::Unsupported => String::new(),
        }
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> TagValue {
        TagValue::Boolean(value)
    }
}

impl From<f64> for TagValue {
    fn from(value: f64) -> TagValue {
        TagValue::Float(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> TagValue {
        TagValue::Integer(value)
    }
}

impl From<u64> for TagValue {
    fn from(value: u64) -> TagValue {
        TagValue::Integer(value as i64)
    }
}

impl From<usize> for TagValue {
    fn from(value: usize) -> TagValue {
        TagValue::Integer(value as i64)
    }
}

impl From<u16> for TagValue {
    fn from(value: u16) -> TagValue {
        TagValue::Integer(i64::from(value))
    }
}

impl<'a> From<&'a str> for TagValue {
    fn from(value: &'a str) -> TagValue {
        TagValue::String(String::from(value))
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> TagValue {
        TagValue::String(value)
    }
}

/// Dynamic values from decoded payloads: scalars pass through, nulls,
/// arrays and objects are unsupported.
impl From<Value> for TagValue {
    fn from(value: Value) -> TagValue {
        match value {
            Value::Bool(value) => TagValue::Boolean(value),
            Value::String(value) => TagValue::String(value),
            Value::Number(number) => {
                if let Some(value) = number.as_i64() {
                    TagValue::Integer(value)
                } else if let Some(value) = number.as_f64() {
                    TagValue::Float(value)
                } else {
                    TagValue::Unsupported
                }
            }
            Value::Null | Value::Array(_) | Value::Object(_) => TagValue::Unsupported,
        }
    }
}
