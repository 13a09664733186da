// src/source/key.rs

//! Cache key derivation.

use blake3::Hasher;
use serde_json::Value;

use crate::types::Options;

/// Deterministic key for a set of request options.
///
/// Object keys are visited in sorted order so that two option maps with the
/// same content hash identically regardless of insertion order.
pub fn options_key(options: &Options) -> String {
    let mut hasher = Hasher::new();
    hash_object(&mut hasher, options);
    hasher.finalize().to_hex().to_string()
}

fn hash_object(hasher: &mut Hasher, object: &Options) {
    let mut keys: Vec<&String> = object.keys().collect();
    keys.sort();

    hasher.update(b"{");
    for key in keys {
        hasher.update(Value::from(key.as_str()).to_string().as_bytes());
        hasher.update(b":");
        if let Some(value) = object.get(key) {
            hash_value(hasher, value);
        }
        hasher.update(b",");
    }
    hasher.update(b"}");
}

fn hash_value(hasher: &mut Hasher, value: &Value) {
    match value {
        Value::Object(object) => hash_object(hasher, object),
        Value::Array(items) => {
            hasher.update(b"[");
            for item in items {
                hash_value(hasher, item);
                hasher.update(b",");
            }
            hasher.update(b"]");
        }
        // Scalars: their JSON text is already unambiguous.
        scalar => {
            hasher.update(scalar.to_string().as_bytes());
        }
    }
}
