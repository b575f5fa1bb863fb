//! Key columns, tags and partial-key queries.
//!
//! A [`Tag`] is the tuple of key-column values taken from one row. It is both
//! the grouping identity used by the partitioner and, zipped with the key
//! column names, the lookup key written next to each compressed group.
//!
//! ```
//! use shardstash::io::csv::Header;
//! use shardstash::tag::{parse_query, KeyColumns};
//! # fn main() -> shardstash::Result<()> {
//! let header = Header::new(["id", "region", "amount"])?;
//! let keys = KeyColumns::resolve(&header, &["region".to_string()])?;
//! let row = vec!["1".to_string(), "east".to_string(), "10".to_string()];
//! let tag = keys.extract_tag(&row);
//! assert_eq!(keys.fields(&tag), vec![("region".to_string(), "east".to_string())]);
//!
//! let query = parse_query(&["region=east"])?;
//! assert!(query.matches(&keys.fields(&tag)));
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use crate::io::csv::{Header, Row};
use crate::validation::{check_field_name, PRIVATE_PREFIX};
use std::fmt;

/// Ordered tuple of key-column values identifying one group.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(Vec<String>);

impl Tag {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(values.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// Resolve column names to header positions.
///
/// # Errors
/// Returns [`Error::ColumnNotFound`] naming the first absent column.
pub fn resolve_positions(header: &Header, names: &[String]) -> Result<Vec<usize>> {
    names
        .iter()
        .map(|name| {
            header
                .position(name)
                .ok_or_else(|| Error::ColumnNotFound(name.clone()))
        })
        .collect()
}

/// Pick the values at `positions` out of `row`.
///
/// Positions come from [`resolve_positions`] against the same header, and the
/// CSV reader guarantees every row is as wide as the header.
#[must_use]
pub fn extract_tag(row: &Row, positions: &[usize]) -> Tag {
    Tag(positions.iter().map(|&p| row[p].clone()).collect())
}

/// Key column names resolved once against a header for the lifetime of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyColumns {
    names: Vec<String>,
    positions: Vec<usize>,
}

impl KeyColumns {
    /// # Errors
    /// Returns [`Error::ColumnNotFound`] if any name is missing from `header`.
    pub fn resolve(header: &Header, names: &[String]) -> Result<Self> {
        let positions = resolve_positions(header, names)?;
        Ok(Self {
            names: names.to_vec(),
            positions,
        })
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    #[must_use]
    pub fn extract_tag(&self, row: &Row) -> Tag {
        extract_tag(row, &self.positions)
    }

    /// Zip key names with a tag's values: the store fields for that group.
    #[must_use]
    pub fn fields(&self, tag: &Tag) -> Vec<(String, String)> {
        self.names
            .iter()
            .cloned()
            .zip(tag.values().iter().cloned())
            .collect()
    }
}

/// Partial-key query: required values for a subset of key columns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    terms: Vec<(String, String)>,
}

impl Query {
    /// Add or replace a term; a repeated name keeps the last value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let (name, value) = (name.into(), value.into());
        match self.terms.iter_mut().find(|(k, _)| *k == name) {
            Some(term) => term.1 = value,
            None => self.terms.push((name, value)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.terms
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.terms.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// True when every term is present in `fields` with an equal value.
    /// Private fields (leading `_`) never match.
    #[must_use]
    pub fn matches(&self, fields: &[(String, String)]) -> bool {
        self.iter().all(|(k, v)| {
            fields
                .iter()
                .any(|(fk, fv)| !fk.starts_with(PRIVATE_PREFIX) && fk == k && fv == v)
        })
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{{{}}}", terms.join(", "))
    }
}

/// Parse `NAME=VALUE` tokens into a [`Query`].
///
/// The split happens at the first `=`, so values may themselves contain `=`.
/// Names follow the same rules as key-column names and may not address
/// private store fields.
///
/// # Errors
/// Returns [`Error::MalformedQueryField`] for a token with no `=` or an empty
/// name, and [`Error::MalformedIdentifier`] for a name that is not a valid
/// field name.
pub fn parse_query<S: AsRef<str>>(tokens: &[S]) -> Result<Query> {
    let mut query = Query::default();
    for token in tokens {
        let token = token.as_ref();
        let Some((name, value)) = token.split_once('=').filter(|(name, _)| !name.is_empty())
        else {
            return Err(Error::MalformedQueryField(token.to_string()));
        };
        check_field_name(name)?;
        query.insert(name, value);
    }
    Ok(query)
}

/// Human-readable label for a stored group, e.g. `[region: east, year: 2020]`.
///
/// Fields whose name starts with `_` are private to the store and skipped.
#[must_use]
pub fn tag_label(fields: &[(String, String)]) -> String {
    let parts: Vec<String> = fields
        .iter()
        .filter(|(k, _)| !k.starts_with(PRIVATE_PREFIX))
        .map(|(k, v)| format!("{k}: {v}"))
        .collect();
    format!("[{}]", parts.join(", "))
}
