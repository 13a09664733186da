// src/contract.rs

//! Field contracts: which fields a source promises on every record.

use std::collections::BTreeSet;

use crate::errors::{FetchdagError, Result};
use crate::types::Record;

/// Required fields absent from at least one record, sorted and deduplicated.
pub fn missing_fields(records: &[Record], required: &[String]) -> Vec<String> {
    let mut missing: BTreeSet<&str> = BTreeSet::new();
    for record in records {
        for field in required {
            if !record.contains_key(field) {
                missing.insert(field.as_str());
            }
        }
    }
    missing.into_iter().map(str::to_string).collect()
}

/// Fail with [`FetchdagError::ContractViolation`] if any required field is missing.
pub fn check_contract(source_name: &str, records: &[Record], required: &[String]) -> Result<()> {
    let missing = missing_fields(records, required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(FetchdagError::ContractViolation {
            source_name: source_name.to_string(),
            missing,
        })
    }
}
