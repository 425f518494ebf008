use std::collections::BTreeMap;
use std::collections::HashMap;

use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;


/// Interface for header-like key/value carriers.
///
/// Trace context crosses process boundaries through carriers: any medium
/// exposing get/set by key, typically HTTP request headers.
///
/// Key lookup is case-insensitive and multi-valued entries must yield
/// their first value.
pub trait MapCarrier {
    /// Fetch a value by key, ignoring ASCII case.
    ///
    /// For carriers that store several values under one key this returns
    /// the first value.
    fn get(&self, key: &str) -> Option<String>;

    /// Set a key/value pair on the carrier.
    fn set(&mut self, key: &str, value: &str);
}

impl MapCarrier for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = HashMap::get(self, key) {
            return Some(value.clone());
        }
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.clone())
    }

    fn set(&mut self, key: &str, value: &str) {
        self.insert(String::from(key), String::from(value));
    }
}

impl MapCarrier for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = BTreeMap::get(self, key) {
            return Some(value.clone());
        }
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.clone())
    }

    fn set(&mut self, key: &str, value: &str) {
        self.insert(String::from(key), String::from(value));
    }
}

/// Multi-valued carriers surface the first value for each key.
impl MapCarrier for HashMap<String, Vec<String>> {
    fn get(&self, key: &str) -> Option<String> {
        let values = match HashMap::get(self, key) {
            Some(values) => Some(values),
            None => self
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v),
        };
        values.and_then(|values| values.first().cloned())
    }

    fn set(&mut self, key: &str, value: &str) {
        self.insert(String::from(key), vec![String::from(value)]);
    }
}

/// HTTP header maps are natively case-insensitive and multi-valued.
///
/// Keys or values that are not valid header tokens are silently dropped
/// on `set`: propagation must never fail an outbound request.
impl MapCarrier for HeaderMap {
    fn get(&self, key: &str) -> Option<String> {
        HeaderMap::get(self, key)
            .and_then(|value| value.to_str().ok())
            .map(String::from)
    }

    fn set(&mut self, key: &str, value: &str) {
        let name = HeaderName::from_bytes(key.to_ascii_lowercase().as_bytes());
        let value = HeaderValue::from_str(value);
        if let (Ok(name), Ok(value)) = (name, value) {
            self.insert(name, value);
        }
    }
}
