//! Dynamic cell values and the traits that move typed fields in and out of them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::SheetRecord;

/// Element type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Int,
    Long,
    Float,
    Double,
    Bool,
    Text,
    /// Needs an enum mapping
    Enum,
    /// Needs a composite-key mapping
    Item,
    /// Needs a pair mapping
    Object,
}

impl ValueType {
    /// Primitive columns convert directly; everything else goes through a mapping.
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            ValueType::Int
                | ValueType::Long
                | ValueType::Float
                | ValueType::Double
                | ValueType::Bool
                | ValueType::Text
        )
    }
}

/// Reference to an item inside a named item set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ItemPath {
    pub set: String,
    pub id: i64,
}

impl ItemPath {
    pub fn new(set: impl Into<String>, id: i64) -> Self {
        Self { set: set.into(), id }
    }
}

/// Reference to a host-side object (an asset path, a sprite name...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ObjectRef(pub String);

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    #[default]
    Empty,
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Text(String),
    /// Enum member by ordinal
    Enum(i64),
    Item(ItemPath),
    Object(String),
    Array(Vec<Value>),
    Record(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Snapshot a record as a `Value::Record`, one entry per declared field.
    pub fn record<R: SheetRecord>(record: &R) -> Value {
        Value::Record(
            R::fields()
                .into_iter()
                .map(|f| (f.name.to_string(), record.get(f.name)))
                .collect(),
        )
    }

    pub fn records<R: SheetRecord>(records: &[R]) -> Value {
        Value::Array(records.iter().map(Value::record).collect())
    }

    /// Build a record from a `Value::Record`. Fields missing from the map keep
    /// their default; anything other than a record yields `R::default()`.
    pub fn into_record<R: SheetRecord>(self) -> R {
        let mut record = R::default();
        if let Value::Record(fields) = self {
            for (name, value) in fields {
                record.set(&name, value);
            }
        }
        record
    }

    pub fn into_records<R: SheetRecord>(self) -> Vec<R> {
        match self {
            Value::Array(items) => items.into_iter().map(Value::into_record).collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Bool(true) => write!(f, "TRUE"),
            Value::Bool(false) => write!(f, "FALSE"),
            Value::Text(s) | Value::Object(s) => write!(f, "{s}"),
            Value::Enum(ordinal) => write!(f, "{ordinal}"),
            Value::Item(path) => write!(f, "{}:{}", path.set, path.id),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

// ============================================================================
// Typed fields
// ============================================================================

/// A field type that fits in a single column.
///
/// Conversion from a value is lenient: a value of the wrong shape gives the
/// type's zero value, the same as an unparseable cell.
pub trait CellType: Sized {
    const VALUE_TYPE: ValueType;
    const IS_ARRAY: bool = false;

    fn to_value(&self) -> Value;
    fn from_value(value: Value) -> Self;
}

/// Single-cell types. `Vec<T>` of a scalar is an array column holding
/// comma-separated elements.
pub trait Scalar: CellType {}

impl<T: Scalar> CellType for Vec<T> {
    const VALUE_TYPE: ValueType = T::VALUE_TYPE;
    const IS_ARRAY: bool = true;

    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(T::to_value).collect())
    }

    fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            _ => Vec::new(),
        }
    }
}

macro_rules! scalar_cell {
    ($ty:ty, $value_type:ident, $variant:ident) => {
        impl CellType for $ty {
            const VALUE_TYPE: ValueType = ValueType::$value_type;

            fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }

            fn from_value(value: Value) -> Self {
                match value {
                    Value::$variant(v) => v,
                    _ => Default::default(),
                }
            }
        }

        impl Scalar for $ty {}
    };
}

scalar_cell!(i32, Int, Int);
scalar_cell!(i64, Long, Long);
scalar_cell!(f32, Float, Float);
scalar_cell!(f64, Double, Double);
scalar_cell!(bool, Bool, Bool);
scalar_cell!(String, Text, Text);
scalar_cell!(ItemPath, Item, Item);

impl CellType for ObjectRef {
    const VALUE_TYPE: ValueType = ValueType::Object;

    fn to_value(&self) -> Value {
        if self.0.is_empty() {
            Value::Empty
        } else {
            Value::Object(self.0.clone())
        }
    }

    fn from_value(value: Value) -> Self {
        match value {
            Value::Object(s) => ObjectRef(s),
            _ => ObjectRef::default(),
        }
    }
}

impl Scalar for ObjectRef {}

/// A fieldless enum usable as a column type. Implement with [`sheet_enum!`].
pub trait SheetEnum: Sized + 'static {
    const NAME: &'static str;

    /// (name, ordinal) for every member, in declaration order.
    fn members() -> &'static [(&'static str, i64)];
    fn ordinal(&self) -> i64;
    fn from_ordinal(ordinal: i64) -> Option<Self>;
}

/// Implements [`SheetEnum`], [`CellType`] and [`Scalar`] for a fieldless enum.
/// The enum must implement `Default`, which is used for unknown ordinals.
///
/// ```ignore
/// #[derive(Debug, Clone, Copy, Default, PartialEq)]
/// enum Color { #[default] None, Red, Blue }
/// sheet_enum!(Color { None = 0, Red = 1, Blue = 2 });
/// ```
#[macro_export]
macro_rules! sheet_enum {
    ($ty:ident { $($variant:ident = $ordinal:expr),+ $(,)? }) => {
        impl $crate::SheetEnum for $ty {
            const NAME: &'static str = stringify!($ty);

            fn members() -> &'static [(&'static str, i64)] {
                &[$((stringify!($variant), $ordinal)),+]
            }

            fn ordinal(&self) -> i64 {
                match self {
                    $($ty::$variant => $ordinal,)+
                }
            }

            fn from_ordinal(ordinal: i64) -> Option<Self> {
                $(if ordinal == $ordinal {
                    return Some($ty::$variant);
                })+
                None
            }
        }

        impl $crate::CellType for $ty {
            const VALUE_TYPE: $crate::ValueType = $crate::ValueType::Enum;

            fn to_value(&self) -> $crate::Value {
                $crate::Value::Enum($crate::SheetEnum::ordinal(self))
            }

            fn from_value(value: $crate::Value) -> Self {
                match value {
                    $crate::Value::Enum(ordinal) => {
                        <$ty as $crate::SheetEnum>::from_ordinal(ordinal).unwrap_or_default()
                    }
                    _ => Default::default(),
                }
            }
        }

        impl $crate::Scalar for $ty {}
    };
}
