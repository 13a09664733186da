// src/dag/declaration.rs

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{FetchdagError, Result};
use crate::types::SourceName;

/// `name` or `name(dep, dep, ...)`. Names are ASCII word characters and the
/// only whitespace allowed is after a comma.
static DECLARATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_]+)(?:\(([A-Za-z0-9_]+(?:,\s*[A-Za-z0-9_]+)*)\))?$")
        .expect("declaration regex is valid")
});

/// One parsed declaration: a source and the sources it waits for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: SourceName,
    /// Prerequisites in declared order. Their results are handed to the
    /// source's provider positionally in this order.
    pub prerequisites: Vec<SourceName>,
}

impl Declaration {
    pub fn new(name: impl Into<SourceName>) -> Self {
        Self {
            name: name.into(),
            prerequisites: Vec::new(),
        }
    }

    pub fn after(mut self, prerequisite: impl Into<SourceName>) -> Self {
        self.prerequisites.push(prerequisite.into());
        self
    }
}

impl FromStr for Declaration {
    type Err = FetchdagError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || FetchdagError::ParseError(s.to_string());

        let caps = DECLARATION_RE.captures(s).ok_or_else(malformed)?;
        let name = caps
            .get(1)
            .map(|m| m.as_str().to_string())
            .ok_or_else(malformed)?;

        let prerequisites: Vec<SourceName> = caps
            .get(2)
            .map(|list| {
                list.as_str()
                    .split(',')
                    .map(|dep| dep.trim_start().to_string())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            name,
            prerequisites,
        })
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prerequisites.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}({})", self.name, self.prerequisites.join(", "))
        }
    }
}

/// Parse every declaration, failing on the first malformed one.
pub fn parse_declarations<S: AsRef<str>>(declarations: &[S]) -> Result<Vec<Declaration>> {
    declarations
        .iter()
        .map(|d| d.as_ref().parse::<Declaration>())
        .collect()
}
