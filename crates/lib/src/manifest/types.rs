//! Manifest configuration types.
//!
//! A [`BuildConfiguration`] is the user-supplied mapping of manifest field name
//! to value. Field order is significant: it is the order lines are rendered in,
//! so the map is an [`IndexMap`] rather than a sorted map.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Field holding the script's display name. Always rendered first.
pub const NAME_FIELD: &str = "name";
/// Field holding the script's version.
pub const VERSION_FIELD: &str = "version";
/// Field listing the privileged capabilities the script may call.
pub const GRANT_FIELD: &str = "grant";
/// Field listing scripts the host loads before the artifact body.
pub const REQUIRE_FIELD: &str = "require";

/// Version used when the configuration does not declare one.
pub const DEFAULT_VERSION: &str = "0.1.0";

/// A single manifest field value.
///
/// Sequence values render one manifest line per element, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
  Single(String),
  Multiple(Vec<String>),
}

impl FieldValue {
  /// Borrow the value as a list of elements.
  ///
  /// A scalar becomes a one-element list; an empty scalar is still one element
  /// (it renders a key-only line).
  pub fn elements(&self) -> Vec<&str> {
    match self {
      FieldValue::Single(value) => vec![value.as_str()],
      FieldValue::Multiple(values) => values.iter().map(String::as_str).collect(),
    }
  }

  /// Convert into an owned list of elements.
  pub fn into_elements(self) -> Vec<String> {
    match self {
      FieldValue::Single(value) => vec![value],
      FieldValue::Multiple(values) => values,
    }
  }
}

impl From<&str> for FieldValue {
  fn from(value: &str) -> Self {
    FieldValue::Single(value.to_string())
  }
}

impl From<String> for FieldValue {
  fn from(value: String) -> Self {
    FieldValue::Single(value)
  }
}

impl From<Vec<String>> for FieldValue {
  fn from(values: Vec<String>) -> Self {
    FieldValue::Multiple(values)
  }
}

impl From<Vec<&str>> for FieldValue {
  fn from(values: Vec<&str>) -> Self {
    FieldValue::Multiple(values.into_iter().map(str::to_string).collect())
  }
}

/// The manifest fields for one artifact, in declaration order.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildConfiguration {
  fields: IndexMap<String, FieldValue>,
}

impl BuildConfiguration {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, field: &str) -> Option<&FieldValue> {
    self.fields.get(field)
  }

  pub fn contains(&self, field: &str) -> bool {
    self.fields.contains_key(field)
  }

  pub fn len(&self) -> usize {
    self.fields.len()
  }

  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }

  /// Iterate over fields in declaration order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
    self.fields.iter().map(|(key, value)| (key.as_str(), value))
  }

  /// Set a field, keeping its original position if it already exists.
  pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
    self.fields.insert(field.into(), value.into());
  }

  /// Builder-style [`set`](Self::set).
  pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
    self.set(field, value);
    self
  }

  /// Return a copy where `field` holds the existing elements followed by
  /// `extra`, with duplicates removed (first occurrence wins).
  ///
  /// A missing field is created at the end; the result is always a sequence.
  pub fn merged_list<I, S>(&self, field: &str, extra: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let mut merged: Vec<String> = self.get(field).cloned().map(FieldValue::into_elements).unwrap_or_default();
    for item in extra {
      let item = item.into();
      if !merged.contains(&item) {
        merged.push(item);
      }
    }
    let mut next = self.clone();
    next.set(field, FieldValue::Multiple(merged));
    next
  }

  /// Return a copy with the `name` and `version` defaults filled in.
  ///
  /// `name` is derived from `file_stem` with `-` and `_` replaced by spaces.
  /// Fields that are already set are left untouched.
  pub fn with_defaults(&self, file_stem: &str) -> Self {
    let mut next = self.clone();
    if !next.contains(NAME_FIELD) {
      next.set(NAME_FIELD, derive_name(file_stem));
    }
    if !next.contains(VERSION_FIELD) {
      next.set(VERSION_FIELD, DEFAULT_VERSION);
    }
    next
  }
}

impl FromIterator<(String, FieldValue)> for BuildConfiguration {
  fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
    Self {
      fields: iter.into_iter().collect(),
    }
  }
}

/// Derive a display name from a source file stem.
pub fn derive_name(file_stem: &str) -> String {
  file_stem.replace(['-', '_'], " ")
}
