//! Fortran namelist reading and writing.
//!
//! The model and its assimilation tools are configured through Fortran
//! namelists: named groups of `key = value` assignments where most values are
//! per-domain lists.
//!
//! ```text
//! &domains
//!  time_step             = 60,
//!  max_dom               = 2,
//!  parent_time_step_ratio = 1, 3,
//! /
//! ```
//!
//! This module implements the subset used by the cycle: integer, real,
//! logical and string values, comma or blank separated lists, `n*value`
//! repeat counts and `!` comments. Group and key names are case-insensitive
//! and stored lowercase; group and key order is preserved on write.
//!
//! The cycle never edits namelists free-form: the fixed set of keys it
//! touches lives in [`sync`].

mod parser;
pub mod sync;
mod writer;

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from reading or writing namelists.
#[derive(Debug, Error)]
pub enum NamelistError {
    /// Failed to read or write the namelist file
    #[error("namelist I/O error for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The text is not a valid namelist
    #[error("namelist syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// A required group/key is absent
    #[error("namelist is missing {group}.{key}")]
    MissingKey { group: String, key: String },

    /// A key holds a value of the wrong type
    #[error("namelist {group}.{key} has unexpected value '{value}': {reason}")]
    InvalidValue {
        group: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// A single namelist value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Real(f64),
    Bool(bool),
    Str(String),
}

impl Value {
    /// Returns the integer value, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a float, widening integers.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Real(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Real(v) => {
                if v.fract() == 0.0 && v.abs() < 1e15 {
                    write!(f, "{v:.1}")
                } else {
                    write!(f, "{v}")
                }
            }
            Value::Bool(true) => write!(f, ".true."),
            Value::Bool(false) => write!(f, ".false."),
            Value::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

/// One `&name ... /` group.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    name: String,
    entries: Vec<(String, Vec<Value>)>,
}

impl Group {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            entries: Vec::new(),
        }
    }

    /// Group name (lowercase).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Iterate over the group's assignments in file order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    fn get(&self, key: &str) -> Option<&[Value]> {
        let key = key.to_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_slice())
    }

    fn set(&mut self, key: &str, values: Vec<Value>) {
        let key = key.to_lowercase();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = values,
            None => self.entries.push((key, values)),
        }
    }
}

/// An ordered collection of namelist groups.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Namelist {
    groups: Vec<Group>,
}

impl Namelist {
    /// Creates an empty namelist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse namelist text.
    pub fn parse(text: &str) -> Result<Self, NamelistError> {
        parser::parse(text)
    }

    /// Read and parse a namelist file.
    pub fn read(path: &Path) -> Result<Self, NamelistError> {
        let text = std::fs::read_to_string(path).map_err(|source| NamelistError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Write the namelist to a file, replacing any existing file.
    pub fn write(&self, path: &Path) -> Result<(), NamelistError> {
        std::fs::write(path, writer::to_namelist_string(self)).map_err(|source| {
            NamelistError::Io {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Iterate over groups in file order.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    /// Returns the values assigned to `group.key`.
    pub fn get(&self, group: &str, key: &str) -> Option<&[Value]> {
        self.group(group).and_then(|g| g.get(key))
    }

    /// Returns the value of `group.key` that applies to a domain.
    ///
    /// Per-domain lists are indexed by `domain - 1`; a single value applies
    /// to every domain.
    pub fn get_for_domain(&self, group: &str, key: &str, domain: usize) -> Option<&Value> {
        let values = self.get(group, key)?;
        match values.len() {
            0 => None,
            1 => values.first(),
            _ => values.get(domain.checked_sub(1)?),
        }
    }

    /// Returns the first value of `group.key` as an integer.
    pub fn get_int(&self, group: &str, key: &str) -> Result<i64, NamelistError> {
        let value = self
            .get(group, key)
            .and_then(|v| v.first())
            .ok_or_else(|| NamelistError::MissingKey {
                group: group.to_string(),
                key: key.to_string(),
            })?;
        value.as_int().ok_or_else(|| NamelistError::InvalidValue {
            group: group.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected an integer".to_string(),
        })
    }

    /// Assign a single value to `group.key`.
    pub fn set_scalar(&mut self, group: &str, key: &str, value: impl Into<Value>) {
        self.set(group, key, vec![value.into()]);
    }

    /// Assign `group.key`, creating the group and key if needed.
    pub fn set(&mut self, group: &str, key: &str, values: Vec<Value>) {
        let name = group.to_lowercase();
        match self.groups.iter_mut().find(|g| g.name == name) {
            Some(g) => g.set(key, values),
            None => {
                let mut g = Group::new(&name);
                g.set(key, values);
                self.groups.push(g);
            }
        }
    }

    fn group(&self, name: &str) -> Option<&Group> {
        let name = name.to_lowercase();
        self.groups.iter().find(|g| g.name == name)
    }

    fn push_group(&mut self, group: Group) {
        self.groups.push(group);
    }
}
