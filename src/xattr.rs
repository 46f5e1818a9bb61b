use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "json_schema")]
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::errors::Error;
use crate::native::xattr as sys;

/// Extended attributes of one path: name to value.
#[cfg_attr(feature = "json_schema", derive(JsonSchema))]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Xattr(pub BTreeMap<String, String>);

impl Xattr {
    /// Creates an empty set of attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an attribute.
    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.0.insert(name.into(), value.into());
    }

    /// Looks up an attribute value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(|v| v.as_str())
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Attribute names, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }
}

impl fmt::Display for Xattr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.0 {
            writeln!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

impl FromIterator<(String, String)> for Xattr {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Xattr(iter.into_iter().collect())
    }
}

/// Reads the extended attributes of `path` without following a final symlink.
///
/// Returns an empty set on platforms, or filesystems, without xattr support.
pub fn get_xattr(path: &str) -> Result<Xattr, Error> {
    sys::get(path)
}

/// Sets every attribute in `attrs` on `path`.
pub fn set_xattr(path: &str, attrs: &Xattr) -> Result<(), Error> {
    sys::set(path, attrs)
}

/// Deletes the named attributes from `path`.
pub fn del_xattr<S: AsRef<str>>(path: &str, names: &[S]) -> Result<(), Error> {
    sys::delete(path, names)
}
