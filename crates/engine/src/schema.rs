//! Record schemas.
//!
//! A record type declares its fields once (usually through [`sheet_record!`]);
//! flattening turns that declaration into the ordered list of sheet columns.
//! Nested records contribute one column per leaf, named with a dotted path.
//! A nested array of records distributes each leaf across the array items, so
//! `drops.name` holds `"a,b"` for two drops.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::SchemaError;
use crate::value::{CellType, Value, ValueType};

/// A record type that maps onto one sheet row.
pub trait SheetRecord: Default + 'static {
    /// Field declarations, in column order.
    fn fields() -> Vec<FieldDef>;
    fn get(&self, field: &str) -> Value;
    fn set(&mut self, field: &str, value: Value);
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    Leaf { value_type: ValueType, is_array: bool },
    /// Expanded into the nested record's own columns.
    Nested { fields: fn() -> Vec<FieldDef>, is_array: bool },
}

impl FieldDef {
    pub fn leaf<T: CellType>(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Leaf {
                value_type: T::VALUE_TYPE,
                is_array: T::IS_ARRAY,
            },
        }
    }

    pub fn nested<R: SheetRecord>(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Nested { fields: R::fields, is_array: false },
        }
    }

    pub fn nested_array<R: SheetRecord>(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Nested { fields: R::fields, is_array: true },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub name: String,
    pub is_array: bool,
}

/// One flattened, addressable column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Dotted path, also the header text
    pub name: String,
    pub path: Vec<PathSegment>,
    pub value_type: ValueType,
    /// Cell holds comma-separated elements
    pub is_array: bool,
    pub is_primitive: bool,
}

/// Flatten `R` into columns: depth-first, declaration order.
pub fn flatten<R: SheetRecord>() -> Result<Vec<Column>, SchemaError> {
    let mut columns = Vec::new();
    let mut path = Vec::new();
    walk(&R::fields(), &mut path, &mut columns)?;
    if columns.is_empty() {
        return Err(SchemaError::NoFields(std::any::type_name::<R>().to_string()));
    }
    Ok(columns)
}

fn walk(
    fields: &[FieldDef],
    path: &mut Vec<PathSegment>,
    columns: &mut Vec<Column>,
) -> Result<(), SchemaError> {
    for field in fields {
        match &field.kind {
            FieldKind::Leaf { value_type, is_array } => {
                path.push(PathSegment { name: field.name.to_string(), is_array: *is_array });
                let column = column_for(path, *value_type)?;
                columns.push(column);
                path.pop();
            }
            FieldKind::Nested { fields, is_array } => {
                path.push(PathSegment { name: field.name.to_string(), is_array: *is_array });
                walk(&fields(), path, columns)?;
                path.pop();
            }
        }
    }
    Ok(())
}

fn column_for(path: &[PathSegment], value_type: ValueType) -> Result<Column, SchemaError> {
    let name = path
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(".");
    let arrays = path.iter().filter(|s| s.is_array).count();
    if arrays > 1 {
        return Err(SchemaError::NestedArray(name));
    }
    Ok(Column {
        name,
        path: path.to_vec(),
        value_type,
        is_array: arrays == 1,
        is_primitive: value_type.is_primitive(),
    })
}

/// Flattened schemas, built once per record type.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<TypeId, Arc<[Column]>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns<R: SheetRecord>(&self) -> Result<Arc<[Column]>, SchemaError> {
        let key = TypeId::of::<R>();
        if let Some(columns) = self.schemas.read().get(&key) {
            return Ok(Arc::clone(columns));
        }
        let columns: Arc<[Column]> = flatten::<R>()?.into();
        log::debug!(
            "Flattened {} into {} columns",
            std::any::type_name::<R>(),
            columns.len()
        );
        Ok(Arc::clone(self.schemas.write().entry(key).or_insert(columns)))
    }

    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.read().is_empty()
    }
}

// ============================================================================
// Path access on record trees
// ============================================================================

/// Value of `column` inside a `Value::Record` tree. A column under an array of
/// records yields a `Value::Array` with one element per item.
pub fn read_column(tree: &Value, column: &Column) -> Value {
    read_path(tree, &column.path)
}

fn read_path(node: &Value, path: &[PathSegment]) -> Value {
    let Some((segment, rest)) = path.split_first() else {
        return node.clone();
    };
    let child = match node {
        Value::Record(fields) => fields.get(&segment.name),
        _ => None,
    };
    let Some(child) = child else {
        return if segment.is_array { Value::Array(Vec::new()) } else { Value::Empty };
    };
    if segment.is_array && !rest.is_empty() {
        return match child {
            Value::Array(items) => Value::Array(items.iter().map(|item| read_path(item, rest)).collect()),
            _ => Value::Array(Vec::new()),
        };
    }
    read_path(child, rest)
}

/// Store `value` for `column` into a record tree, creating intermediate
/// records. Under an array of records, the elements of `value` are spread
/// across the items, growing the array as needed.
pub fn write_column(tree: &mut BTreeMap<String, Value>, column: &Column, value: Value) {
    write_path(tree, &column.path, value);
}

fn write_path(fields: &mut BTreeMap<String, Value>, path: &[PathSegment], value: Value) {
    let Some((segment, rest)) = path.split_first() else {
        return;
    };
    if rest.is_empty() {
        fields.insert(segment.name.clone(), value);
        return;
    }

    let child = fields.entry(segment.name.clone()).or_insert_with(|| {
        if segment.is_array {
            Value::Array(Vec::new())
        } else {
            Value::Record(BTreeMap::new())
        }
    });

    if segment.is_array {
        let Value::Array(items) = child else {
            return;
        };
        let elements = match value {
            Value::Array(elements) => elements,
            other => vec![other],
        };
        if items.len() < elements.len() {
            items.resize_with(elements.len(), || Value::Record(BTreeMap::new()));
        }
        for (item, element) in items.iter_mut().zip(elements) {
            if let Value::Record(item_fields) = item {
                write_path(item_fields, rest, element);
            }
        }
    } else if let Value::Record(child_fields) = child {
        write_path(child_fields, rest, value);
    }
}

/// Implements [`SheetRecord`] for an existing struct.
///
/// Each field is declared as `mode name: Type`, where mode is `leaf` for a
/// column type, `nested` for an embedded record and `nested_array` for a
/// `Vec` of records (give the element type).
///
/// ```ignore
/// sheet_record!(Unit {
///     leaf name: String,
///     leaf tags: Vec<String>,
///     nested stats: Stats,
///     nested_array drops: Drop,
/// });
/// ```
#[macro_export]
macro_rules! sheet_record {
    ($ty:ty { $($mode:ident $field:ident : $fty:ty),+ $(,)? }) => {
        impl $crate::SheetRecord for $ty {
            fn fields() -> Vec<$crate::FieldDef> {
                vec![$($crate::sheet_record!(@def $mode $field $fty)),+]
            }

            fn get(&self, field: &str) -> $crate::Value {
                match field {
                    $(stringify!($field) => $crate::sheet_record!(@get $mode self.$field),)+
                    _ => $crate::Value::Empty,
                }
            }

            fn set(&mut self, field: &str, value: $crate::Value) {
                match field {
                    $(stringify!($field) => {
                        self.$field = $crate::sheet_record!(@set $mode $fty, value);
                    })+
                    _ => {}
                }
            }
        }
    };
    (@def leaf $field:ident $fty:ty) => { $crate::FieldDef::leaf::<$fty>(stringify!($field)) };
    (@def nested $field:ident $fty:ty) => { $crate::FieldDef::nested::<$fty>(stringify!($field)) };
    (@def nested_array $field:ident $fty:ty) => {
        $crate::FieldDef::nested_array::<$fty>(stringify!($field))
    };
    (@get leaf $e:expr) => { $crate::CellType::to_value(&$e) };
    (@get nested $e:expr) => { $crate::Value::record(&$e) };
    (@get nested_array $e:expr) => { $crate::Value::records(&$e) };
    (@set leaf $fty:ty, $v:ident) => { <$fty as $crate::CellType>::from_value($v) };
    (@set nested $fty:ty, $v:ident) => { $v.into_record::<$fty>() };
    (@set nested_array $fty:ty, $v:ident) => { $v.into_records::<$fty>() };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Nested {
        val: f32,
    }
    crate::sheet_record!(Nested { leaf val: f32 });

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Row {
        name: String,
        nested: Vec<Nested>,
    }
    crate::sheet_record!(Row {
        leaf name: String,
        nested_array nested: Nested,
    });

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Tagged {
        tags: Vec<String>,
    }
    crate::sheet_record!(Tagged { leaf tags: Vec<String> });

    #[derive(Debug, Clone, Default, PartialEq)]
    struct TooDeep {
        rows: Vec<Tagged>,
    }
    crate::sheet_record!(TooDeep { nested_array rows: Tagged });

    #[derive(Debug, Default)]
    struct Empty;
    impl SheetRecord for Empty {
        fn fields() -> Vec<FieldDef> {
            Vec::new()
        }
        fn get(&self, _: &str) -> Value {
            Value::Empty
        }
        fn set(&mut self, _: &str, _: Value) {}
    }

    #[test]
    fn test_flatten_nested_array() {
        let columns = flatten::<Row>().unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["name", "nested.val"]);

        assert!(!columns[0].is_array);
        assert_eq!(columns[0].value_type, ValueType::Text);
        assert!(columns[1].is_array);
        assert!(columns[1].is_primitive);
        assert_eq!(columns[1].value_type, ValueType::Float);
    }

    #[test]
    fn test_flatten_rejects_array_inside_array() {
        assert!(matches!(flatten::<TooDeep>(), Err(SchemaError::NestedArray(name)) if name == "rows.tags"));
    }

    #[test]
    fn test_flatten_rejects_empty_schema() {
        assert!(matches!(flatten::<Empty>(), Err(SchemaError::NoFields(_))));
    }

    #[test]
    fn test_registry_builds_once() {
        let registry = SchemaRegistry::new();
        let a = registry.columns::<Row>().unwrap();
        let b = registry.columns::<Row>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_write_then_read_distributes_array() {
        let columns = flatten::<Row>().unwrap();
        let mut tree = BTreeMap::new();
        write_column(&mut tree, &columns[0], Value::Text("x".into()));
        write_column(
            &mut tree,
            &columns[1],
            Value::Array(vec![Value::Float(1.0), Value::Float(2.5)]),
        );

        let row: Row = Value::Record(tree).into_record();
        assert_eq!(row.name, "x");
        assert_eq!(row.nested, vec![Nested { val: 1.0 }, Nested { val: 2.5 }]);

        let tree = Value::record(&row);
        assert_eq!(
            read_column(&tree, &columns[1]),
            Value::Array(vec![Value::Float(1.0), Value::Float(2.5)])
        );
    }

    #[test]
    fn test_read_missing_path() {
        let columns = flatten::<Row>().unwrap();
        let tree = Value::Record(BTreeMap::new());
        assert_eq!(read_column(&tree, &columns[0]), Value::Empty);
        assert_eq!(read_column(&tree, &columns[1]), Value::Array(Vec::new()));
    }
}
