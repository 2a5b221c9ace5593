//! # Value
//! One immutable snapshot fetched from a source: the raw JSON payload, a
//! content digest used to decide whether a later fetch is a material change,
//! and the fetch timestamp.
//!
//! Two values with identical payloads compare as unchanged. A new fetch always
//! produces a new `Value`; nothing here is mutated in place.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct Value {
    payload: serde_json::Value,
    digest: String,
    fetched_at: DateTime<Utc>,
}

impl Value {
    pub fn new(payload: serde_json::Value) -> Self {
        let digest = digest_hex(&payload);
        Self {
            payload,
            digest,
            fetched_at: Utc::now(),
        }
    }

    /// True when this value differs materially from `prev`.
    /// Absence of a previous value always counts as changed.
    pub fn changed_from(&self, prev: Option<&Value>) -> bool {
        match prev {
            None => true,
            Some(p) => p.digest != self.digest,
        }
    }

    /// Plain-data export for consumer views.
    pub fn export(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}

/// sha256 over the serialized payload. `serde_json` objects keep their keys
/// ordered, so equal content serializes to equal bytes.
fn digest_hex(payload: &serde_json::Value) -> String {
    let bytes = serde_json::to_vec(payload).expect("json value serializes");
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Dotted paths of the fields that differ between two payloads.
/// Log/diagnostic output only; change detection itself goes by digest.
pub fn diff_fields(old: &serde_json::Value, new: &serde_json::Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_diff(old, new, String::new(), &mut out);
    out
}

fn collect_diff(old: &serde_json::Value, new: &serde_json::Value, prefix: String, out: &mut Vec<String>) {
    match (old.as_object(), new.as_object()) {
        (Some(o), Some(n)) => {
            let keys: std::collections::BTreeSet<&String> = o.keys().chain(n.keys()).collect();
            for key in keys {
                let full = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                match (o.get(key), n.get(key)) {
                    (Some(ov), Some(nv)) => collect_diff(ov, nv, full, out),
                    _ => out.push(full),
                }
            }
        }
        _ => {
            if old != new {
                out.push(prefix);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equal_payloads_compare_unchanged() {
        let a = Value::new(json!({"ip": "1.2.3.4"}));
        let b = Value::new(json!({"ip": "1.2.3.4"}));
        assert!(!b.changed_from(Some(&a)));
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn different_payloads_compare_changed() {
        let a = Value::new(json!({"ip": "1.2.3.4"}));
        let b = Value::new(json!({"ip": "5.6.7.8"}));
        assert!(b.changed_from(Some(&a)));
    }

    #[test]
    fn absence_counts_as_changed() {
        let a = Value::new(json!({"v": 1}));
        assert!(a.changed_from(None));
    }

    #[test]
    fn key_order_does_not_matter() {
        // serde_json object maps are ordered, so these parse to the same content
        let a: serde_json::Value = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap();
        assert_eq!(Value::new(a).digest(), Value::new(b).digest());
    }

    #[test]
    fn diff_reports_nested_paths() {
        let old = json!({"iss_position": {"latitude": "1.0", "longitude": "2.0"}, "message": "success"});
        let new = json!({"iss_position": {"latitude": "1.5", "longitude": "2.0"}, "message": "success"});
        let d = diff_fields(&old, &new);
        assert_eq!(d, vec!["iss_position.latitude".to_string()]);
    }

    #[test]
    fn diff_reports_added_and_removed_keys() {
        let old = json!({"a": 1});
        let new = json!({"b": 2});
        let mut d = diff_fields(&old, &new);
        d.sort();
        assert_eq!(d, vec!["a".to_string(), "b".to_string()]);
    }
}
