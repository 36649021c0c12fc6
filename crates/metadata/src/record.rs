//! Metadata records as reported by a [`MetadataService`](crate::MetadataService).

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Group-qualified tag names the organizer reads.
pub mod tags {
    pub const FILE_TYPE: &str = "File:FileType";
    pub const FILE_MODIFY_DATE: &str = "File:FileModifyDate";
    pub const SUBSEC_DATE_TIME_ORIGINAL: &str = "Composite:SubSecDateTimeOriginal";
    pub const DATE_TIME_ORIGINAL: &str = "EXIF:DateTimeOriginal";
    /// Timezone-qualified creation date written by most phones.
    pub const QUICKTIME_CREATION_DATE: &str = "QuickTime:CreationDate";
    /// Bare creation date, no offset.
    pub const QUICKTIME_CREATE_DATE: &str = "QuickTime:CreateDate";
}

/// One metadata record: the file type and a flat map of group-qualified tags
/// (`Group:Tag`) to their textual values.
///
/// ```
/// use datum_metadata::{MetadataRecord, tags};
///
/// let record: MetadataRecord = [
///     (tags::FILE_TYPE, "JPEG"),
///     (tags::DATE_TIME_ORIGINAL, "2023:05:01 12:51:23"),
/// ]
/// .into_iter()
/// .collect();
/// assert_eq!(record.file_type(), Some("JPEG"));
/// assert_eq!(record.get(tags::DATE_TIME_ORIGINAL), Some("2023:05:01 12:51:23"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRecord {
    fields: BTreeMap<String, String>,
}
impl MetadataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tag: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(tag.into(), value.into());
        self
    }

    pub fn get(&self, tag: &str) -> Option<&str> {
        self.fields.get(tag).map(String::as_str)
    }

    pub fn file_type(&self) -> Option<&str> {
        self.get(tags::FILE_TYPE)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetadataRecord {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
impl From<Map<String, Value>> for MetadataRecord {
    /// Scalars are kept as text; nested structures and nulls are dropped.
    fn from(object: Map<String, Value>) -> Self {
        object
            .into_iter()
            .filter_map(|(tag, value)| match value {
                Value::String(s) => Some((tag, s)),
                Value::Number(n) => Some((tag, n.to_string())),
                Value::Bool(b) => Some((tag, b.to_string())),
                Value::Null | Value::Array(_) | Value::Object(_) => None,
            })
            .collect()
    }
}
