//! In-memory tree of tagged fields.

use std::collections::BTreeMap;

use super::ValueTag;
use crate::util::{mat4_from_floats, mat4_to_floats, vec3_from_floats, Error, Mat4, Result, Vec3};

/// A single typed field value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Double(f64),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
    Floats(Vec<f32>),
    Record(TaggedRecord),
    List(Vec<TaggedRecord>),
}

impl Value {
    /// Wire tag of this value.
    pub fn tag(&self) -> ValueTag {
        match self {
            Self::Int(_) => ValueTag::Int,
            Self::Double(_) => ValueTag::Double,
            Self::Bool(_) => ValueTag::Bool,
            Self::Str(_) => ValueTag::Str,
            Self::Bytes(_) => ValueTag::Bytes,
            Self::Floats(_) => ValueTag::Floats,
            Self::Record(_) => ValueTag::Record,
            Self::List(_) => ValueTag::List,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Vec<f32>> for Value {
    fn from(v: Vec<f32>) -> Self {
        Self::Floats(v)
    }
}

impl From<Vec3> for Value {
    fn from(v: Vec3) -> Self {
        Self::Floats(v.to_array().to_vec())
    }
}

impl From<Mat4> for Value {
    fn from(m: Mat4) -> Self {
        Self::Floats(mat4_to_floats(&m))
    }
}

impl From<TaggedRecord> for Value {
    fn from(v: TaggedRecord) -> Self {
        Self::Record(v)
    }
}

impl From<Vec<TaggedRecord>> for Value {
    fn from(v: Vec<TaggedRecord>) -> Self {
        Self::List(v)
    }
}

/// A named set of fields. Keys are unique; iteration order is sorted by key
/// so encoding is deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaggedRecord {
    fields: BTreeMap<String, Value>,
}

macro_rules! required_getter {
    ($name:ident, $opt:ident, $variant:ident, $ty:ty, $v:ident => $conv:expr) => {
        #[doc = concat!("Required `", stringify!($variant), "` field.")]
        pub fn $name(&self, key: &str) -> Result<$ty> {
            self.$opt(key)?.ok_or_else(|| Error::missing(key))
        }

        #[doc = concat!("Optional `", stringify!($variant), "` field; wrong type is still an error.")]
        pub fn $opt(&self, key: &str) -> Result<Option<$ty>> {
            match self.fields.get(key) {
                None => Ok(None),
                Some(Value::$variant($v)) => Ok(Some($conv)),
                Some(other) => Err(type_mismatch(key, ValueTag::$variant, other.tag())),
            }
        }
    };
}

impl TaggedRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the record has no fields.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True if a field with this key exists.
    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Raw field access.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Iterate over fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a field only when `value` is `Some`.
    pub fn set_opt<V: Into<Value>>(&mut self, key: impl Into<String>, value: Option<V>) -> &mut Self {
        if let Some(v) = value {
            self.set(key, v);
        }
        self
    }

    /// Remove a field.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Insert a decoded field, rejecting duplicate keys.
    pub(crate) fn insert_unique(&mut self, key: String, value: Value) -> Result<()> {
        if self.fields.contains_key(&key) {
            return Err(Error::invalid(format!("Duplicate field: {}", key)));
        }
        self.fields.insert(key, value);
        Ok(())
    }

    required_getter!(int, opt_int, Int, i64, v => *v);
    required_getter!(double, opt_double, Double, f64, v => *v);
    required_getter!(bool, opt_bool, Bool, bool, v => *v);
    required_getter!(str, opt_str, Str, &str, v => v.as_str());
    required_getter!(bytes, opt_bytes, Bytes, &[u8], v => v.as_slice());
    required_getter!(floats, opt_floats, Floats, &[f32], v => v.as_slice());
    required_getter!(record, opt_record, Record, &TaggedRecord, v => v);
    required_getter!(list, opt_list, List, &[TaggedRecord], v => v.as_slice());

    /// Optional list; absence means empty.
    pub fn list_or_empty(&self, key: &str) -> Result<&[TaggedRecord]> {
        Ok(self.opt_list(key)?.unwrap_or(&[]))
    }

    /// Required non-negative integer that fits in `usize`.
    pub fn usize(&self, key: &str) -> Result<usize> {
        let v = self.int(key)?;
        usize::try_from(v).map_err(|_| Error::missing(format!("{} (negative: {})", key, v)))
    }

    /// Required three-component vector.
    pub fn vec3(&self, key: &str) -> Result<Vec3> {
        vec3_from_floats(self.floats(key)?)
            .ok_or_else(|| Error::missing(format!("{} (expected 3 floats)", key)))
    }

    /// Required 4x4 matrix stored column-major.
    pub fn mat4(&self, key: &str) -> Result<Mat4> {
        mat4_from_floats(self.floats(key)?)
            .ok_or_else(|| Error::missing(format!("{} (expected 16 floats)", key)))
    }
}

fn type_mismatch(key: &str, expected: ValueTag, actual: ValueTag) -> Error {
    Error::missing(format!(
        "{} (expected {}, found {})",
        key,
        expected.name(),
        actual.name()
    ))
}
