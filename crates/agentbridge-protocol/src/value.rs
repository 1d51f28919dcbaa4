//! The host's dynamic value model.
//!
//! A host application (a game engine, a simulator) exchanges data with the
//! bridge as [`Value`]s: a tagged union of scalars, arrays and dictionaries,
//! plus the packed numeric arrays that engines use for bulk data. Nothing
//! here knows about JSON or sockets; see [`marshal`](crate::marshal) for the
//! conversion to the canonical document.

use std::fmt;

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A dynamically typed host value.
///
/// The first seven variants are the supported core kinds. The `Packed*`
/// variants are host collections that travel as plain lists. [`Value::Other`]
/// stands in for any host kind the bridge cannot represent (object handles,
/// resource references, and so on); marshaling it always fails.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The absence of a value.
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Dictionary(Dictionary),

    PackedBytes(Vec<u8>),
    PackedInts(Vec<i64>),
    PackedFloats(Vec<f64>),
    PackedStrings(Vec<String>),
    PackedVector2(Vec<[f64; 2]>),
    PackedVector3(Vec<[f64; 3]>),
    PackedColors(Vec<[f64; 4]>),

    /// A host kind with no wire representation.
    Other {
        /// The host's name for the kind, used in error messages.
        kind: String,
    },
}

impl Value {
    /// Returns the kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Nil => ValueKind::Nil,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::String(_) => ValueKind::String,
            Self::Array(_) => ValueKind::Array,
            Self::Dictionary(_) => ValueKind::Dictionary,
            Self::PackedBytes(_) => ValueKind::PackedBytes,
            Self::PackedInts(_) => ValueKind::PackedInts,
            Self::PackedFloats(_) => ValueKind::PackedFloats,
            Self::PackedStrings(_) => ValueKind::PackedStrings,
            Self::PackedVector2(_) => ValueKind::PackedVector2,
            Self::PackedVector3(_) => ValueKind::PackedVector3,
            Self::PackedColors(_) => ValueKind::PackedColors,
            Self::Other { .. } => ValueKind::Other,
        }
    }

    /// Returns `true` for [`Value::Nil`].
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a float. Integers are widened.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            Self::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    /// Looks up a string key when this value is a dictionary.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_dictionary().and_then(|dict| dict.get_str(key))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u16> for Value {
    fn from(i: u16) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<Dictionary> for Value {
    fn from(dict: Dictionary) -> Self {
        Self::Dictionary(dict)
    }
}

// ---------------------------------------------------------------------------
// ValueKind
// ---------------------------------------------------------------------------

/// The kind tag of a [`Value`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Nil,
    Bool,
    Int,
    Float,
    String,
    Array,
    Dictionary,
    PackedBytes,
    PackedInts,
    PackedFloats,
    PackedStrings,
    PackedVector2,
    PackedVector3,
    PackedColors,
    Other,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Nil => "Nil",
            Self::Bool => "Bool",
            Self::Int => "Int",
            Self::Float => "Float",
            Self::String => "String",
            Self::Array => "Array",
            Self::Dictionary => "Dictionary",
            Self::PackedBytes => "PackedBytes",
            Self::PackedInts => "PackedInts",
            Self::PackedFloats => "PackedFloats",
            Self::PackedStrings => "PackedStrings",
            Self::PackedVector2 => "PackedVector2",
            Self::PackedVector3 => "PackedVector3",
            Self::PackedColors => "PackedColors",
            Self::Other => "Other",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Dictionary
// ---------------------------------------------------------------------------

/// An insertion-ordered mapping from [`Value`] keys to values.
///
/// Host dictionaries may use any value as a key; on the wire every key
/// becomes a string. Equality is structural and ignores key order, because
/// JSON objects do not preserve it.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    entries: Vec<(Value, Value)>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a key/value pair, replacing the value of an existing key in
    /// place. Returns the previous value, if any.
    pub fn insert(
        &mut self,
        key: impl Into<Value>,
        value: impl Into<Value>,
    ) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Looks up a string key without allocating a [`Value`].
    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get_str(key).is_some()
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl PartialEq for Dictionary {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut dict = Self::new();
        for (k, v) in iter {
            dict.insert(k, v);
        }
        dict
    }
}
