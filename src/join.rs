// src/join.rs

//! Client-side joins between two record sets.
//!
//! All joins hash the right-hand side by key and walk the left-hand side in
//! order, so output order is fully determined by input order:
//! - matched pairs are merged with right-hand fields overriding left-hand
//!   ones, one output row per match (right order);
//! - `left` keeps unmatched left rows as they are;
//! - `full_outer` additionally appends unmatched right rows in right order.
//!
//! Keys must be strings, numbers or booleans. Arrays and objects are
//! rejected; null or missing keys never match anything.

use std::collections::HashMap;

use serde_json::Value;

use crate::errors::{FetchdagError, Result};
use crate::source::json_kind;
use crate::types::{JoinKind, Record, Records};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum JoinKey {
    Bool(bool),
    Number(String),
    String(String),
}

fn join_key(record: &Record, field: &str) -> Result<Option<JoinKey>> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(JoinKey::Bool(*b))),
        Some(Value::Number(n)) => Ok(Some(JoinKey::Number(n.to_string()))),
        Some(Value::String(s)) => Ok(Some(JoinKey::String(s.clone()))),
        Some(other) => Err(FetchdagError::JoinError(format!(
            "join key '{field}' must be a primitive value, got {}",
            json_kind(other)
        ))),
    }
}

fn merge(left: &Record, right: &Record) -> Record {
    let mut merged = left.clone();
    for (k, v) in right {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

pub fn join(
    kind: JoinKind,
    left: &[Record],
    right: &[Record],
    left_key: &str,
    right_key: &str,
) -> Result<Records> {
    let mut by_key: HashMap<JoinKey, Vec<usize>> = HashMap::new();
    for (idx, record) in right.iter().enumerate() {
        if let Some(key) = join_key(record, right_key)? {
            by_key.entry(key).or_default().push(idx);
        }
    }

    let mut matched_right = vec![false; right.len()];
    let mut out = Vec::with_capacity(left.len());

    for record in left {
        let matches: &[usize] = match join_key(record, left_key)? {
            Some(key) => by_key.get(&key).map(Vec::as_slice).unwrap_or(&[]),
            None => &[],
        };

        if matches.is_empty() {
            if kind != JoinKind::Inner {
                out.push(record.clone());
            }
            continue;
        }

        for &idx in matches {
            matched_right[idx] = true;
            out.push(merge(record, &right[idx]));
        }
    }

    if kind == JoinKind::FullOuter {
        out.extend(
            right
                .iter()
                .zip(&matched_right)
                .filter(|(_, matched)| !**matched)
                .map(|(record, _)| record.clone()),
        );
    }

    Ok(out)
}

pub fn left_join(left: &[Record], right: &[Record], left_key: &str, right_key: &str) -> Result<Records> {
    join(JoinKind::Left, left, right, left_key, right_key)
}

pub fn inner_join(left: &[Record], right: &[Record], left_key: &str, right_key: &str) -> Result<Records> {
    join(JoinKind::Inner, left, right, left_key, right_key)
}

pub fn full_outer_join(
    left: &[Record],
    right: &[Record],
    left_key: &str,
    right_key: &str,
) -> Result<Records> {
    join(JoinKind::FullOuter, left, right, left_key, right_key)
}
