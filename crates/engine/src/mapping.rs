//! Key ↔ value mappings for non-primitive columns.
//!
//! Every mapping offers the same four operations: the list of keys (which
//! also feeds the column dropdown), key → value resolution, validation of a
//! value, and the reverse lookup used when writing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::MappingError;
use crate::value::{ItemPath, SheetEnum, Value};

const KEY_TRIM: &[char] = &[' ', '\r', '\n'];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Mapping {
    Pair(PairMapping),
    Enum(EnumMapping),
    CompositeKey(CompositeKeyMapping),
}

impl Mapping {
    /// Every key this mapping understands, in declaration order.
    pub fn all_keys(&self) -> Vec<String> {
        match self {
            Mapping::Pair(m) => m.pairs.iter().map(Pair::key).collect(),
            Mapping::Enum(m) => m.members.iter().map(|member| member.name.clone()).collect(),
            Mapping::CompositeKey(m) => m.all_keys(),
        }
    }

    pub fn resolve(&self, key: &str) -> Result<Value, MappingError> {
        match self {
            Mapping::Pair(m) => Ok(m.resolve(key)),
            Mapping::Enum(m) => Ok(m.resolve(key)),
            Mapping::CompositeKey(m) => m.resolve(key),
        }
    }

    /// Whether `value` is something this mapping can produce.
    pub fn validate(&self, value: &Value) -> bool {
        match self {
            Mapping::Pair(_) => !value.is_empty(),
            Mapping::Enum(m) => match value {
                Value::Enum(ordinal) => m.members.iter().any(|member| member.ordinal == *ordinal),
                _ => false,
            },
            Mapping::CompositeKey(m) => match value {
                Value::Item(path) => m
                    .sets
                    .iter()
                    .any(|set| set.name == path.set && set.items.iter().any(|item| item.id == path.id)),
                _ => false,
            },
        }
    }

    /// First key resolving to `value`, or an empty string.
    pub fn key_of(&self, value: &Value) -> String {
        self.all_keys()
            .into_iter()
            .find(|key| self.resolve(key).is_ok_and(|v| &v == value))
            .unwrap_or_default()
    }
}

// ============================================================================
// Pair
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    #[serde(default)]
    pub key: String,
    pub value: Value,
}

impl Pair {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self { key: key.into(), value }
    }

    /// The explicit key, or the value's text when the key is left blank.
    pub fn key(&self) -> String {
        if self.key.is_empty() {
            self.value.to_string()
        } else {
            self.key.clone()
        }
    }
}

/// Explicit key/value table with a fallback for unknown keys.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PairMapping {
    pub pairs: Vec<Pair>,
    #[serde(default)]
    pub default: Value,
}

impl PairMapping {
    pub fn new(pairs: Vec<Pair>, default: Value) -> Self {
        Self { pairs, default }
    }

    pub fn resolve(&self, key: &str) -> Value {
        self.pairs
            .iter()
            .find(|pair| pair.key() == key)
            .map(|pair| pair.value.clone())
            .unwrap_or_else(|| self.default.clone())
    }
}

// ============================================================================
// Enum
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumMember {
    pub name: String,
    pub ordinal: i64,
}

/// Keys are the member names of an enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumMapping {
    pub type_name: String,
    pub members: Vec<EnumMember>,
}

impl EnumMapping {
    pub fn of<E: SheetEnum>() -> Self {
        Self {
            type_name: E::NAME.to_string(),
            members: E::members()
                .iter()
                .map(|(name, ordinal)| EnumMember { name: name.to_string(), ordinal: *ordinal })
                .collect(),
        }
    }

    /// Unknown names resolve to `Value::Empty`, which fails validation.
    pub fn resolve(&self, key: &str) -> Value {
        match self.members.iter().find(|member| member.name == key) {
            Some(member) => Value::Enum(member.ordinal),
            None => {
                log::error!("'{}' is not a member of {}", key, self.type_name);
                Value::Empty
            }
        }
    }
}

// ============================================================================
// Composite key
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetItem {
    pub id: i64,
    pub name: String,
}

/// A named collection of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSet {
    pub name: String,
    pub items: Vec<SetItem>,
}

/// Keys are `"item"` or `"set:item"`, resolved against one or more item sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeKeyMapping {
    pub sets: Vec<ItemSet>,
    #[serde(default = "short_form_default")]
    pub prefer_short_form: bool,
}

fn short_form_default() -> bool {
    true
}

impl CompositeKeyMapping {
    pub fn new(sets: Vec<ItemSet>) -> Self {
        Self { sets, prefer_short_form: true }
    }

    /// Short keys fall back to the `"set: item"` form for item names found in
    /// more than one set, so every key resolves back to its own item.
    fn all_keys(&self) -> Vec<String> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for item in self.sets.iter().flat_map(|set| &set.items) {
            *seen.entry(item.name.as_str()).or_default() += 1;
        }

        let seen = &seen;
        self.sets
            .iter()
            .flat_map(move |set| {
                set.items.iter().map(move |item| {
                    let unique = seen.get(item.name.as_str()) == Some(&1);
                    if self.prefer_short_form && unique {
                        item.name.clone()
                    } else {
                        format!("{}: {}", set.name, item.name)
                    }
                })
            })
            .collect()
    }

    /// A blank key is an empty cell and resolves to `Value::Empty`.
    pub fn resolve(&self, key: &str) -> Result<Value, MappingError> {
        if key.trim_matches(KEY_TRIM).is_empty() {
            return Ok(Value::Empty);
        }
        let (set_name, item_name) = match key.split_once(':') {
            Some((set, item)) => (Some(set.trim_matches(KEY_TRIM)), item.trim_matches(KEY_TRIM)),
            None => (None, key.trim_matches(KEY_TRIM)),
        };
        if item_name.is_empty() {
            return Err(MappingError::MalformedKey(key.to_string()));
        }

        self.sets
            .iter()
            .filter(|set| set_name.map_or(true, |name| name.is_empty() || name == set.name))
            .find_map(|set| {
                set.items
                    .iter()
                    .find(|item| item.name == item_name)
                    .map(|item| Value::Item(ItemPath::new(set.name.clone(), item.id)))
            })
            .ok_or_else(|| MappingError::ItemNotFound(key.to_string()))
    }
}

/// Mapping attached to a field by dotted name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingEntry {
    pub field_name: String,
    #[serde(default)]
    pub mapping: Option<Mapping>,
}

impl MappingEntry {
    pub fn new(field_name: impl Into<String>, mapping: Mapping) -> Self {
        Self { field_name: field_name.into(), mapping: Some(mapping) }
    }
}

/// First entry naming `field` exactly that carries a mapping.
pub fn resolve_mapping<'a>(entries: &'a [MappingEntry], field: &str) -> Option<&'a Mapping> {
    entries
        .iter()
        .filter(|entry| entry.field_name == field)
        .find_map(|entry| entry.mapping.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{CellType, ItemPath};

    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    enum Color {
        #[default]
        None,
        Red,
        Blue,
    }
    crate::sheet_enum!(Color { None = 0, Red = 1, Blue = 2 });

    fn colors() -> Mapping {
        Mapping::Pair(PairMapping::new(
            vec![
                Pair::new("red", Color::Red.to_value()),
                Pair::new("blue", Color::Blue.to_value()),
            ],
            Color::None.to_value(),
        ))
    }

    fn weapons() -> CompositeKeyMapping {
        CompositeKeyMapping::new(vec![
            ItemSet {
                name: "Melee".into(),
                items: vec![SetItem { id: 4, name: "Sword".into() }],
            },
            ItemSet {
                name: "Ranged".into(),
                items: vec![
                    SetItem { id: 7, name: "Bow".into() },
                    SetItem { id: 8, name: "Sword".into() },
                ],
            },
        ])
    }

    #[test]
    fn test_pair_mapping() {
        let m = colors();
        assert_eq!(m.resolve("red").unwrap(), Color::Red.to_value());
        assert_eq!(m.resolve("green").unwrap(), Color::None.to_value());
        assert_eq!(m.key_of(&Color::Blue.to_value()), "blue");
        assert_eq!(m.key_of(&Color::None.to_value()), "");
        assert_eq!(m.all_keys(), vec!["red", "blue"]);
    }

    #[test]
    fn test_pair_blank_key_uses_value_text() {
        let m = Mapping::Pair(PairMapping::new(
            vec![Pair::new("", Value::Object("hero.png".into()))],
            Value::Empty,
        ));
        assert_eq!(m.all_keys(), vec!["hero.png"]);
        assert_eq!(m.resolve("hero.png").unwrap(), Value::Object("hero.png".into()));
        assert!(!m.validate(&m.resolve("villain.png").unwrap()));
    }

    #[test]
    fn test_enum_mapping() {
        let m = Mapping::Enum(EnumMapping::of::<Color>());
        assert_eq!(m.all_keys(), vec!["None", "Red", "Blue"]);
        assert_eq!(m.resolve("Blue").unwrap(), Value::Enum(2));
        assert_eq!(m.resolve("Purple").unwrap(), Value::Empty);
        assert!(m.validate(&Value::Enum(1)));
        assert!(!m.validate(&Value::Enum(12)));
        assert_eq!(m.key_of(&Value::Enum(1)), "Red");
    }

    #[test]
    fn test_composite_key_resolution() {
        let m = weapons();
        assert_eq!(m.resolve("Bow").unwrap(), Value::Item(ItemPath::new("Ranged", 7)));
        assert_eq!(m.resolve(" Sword ").unwrap(), Value::Item(ItemPath::new("Melee", 4)));
        assert_eq!(m.resolve("Ranged : Sword").unwrap(), Value::Item(ItemPath::new("Ranged", 8)));
        assert_eq!(m.resolve("").unwrap(), Value::Empty);
    }

    #[test]
    fn test_composite_key_failures() {
        let m = weapons();
        assert_eq!(m.resolve("Axe"), Err(MappingError::ItemNotFound("Axe".into())));
        assert_eq!(m.resolve("Melee:Bow"), Err(MappingError::ItemNotFound("Melee:Bow".into())));
        assert_eq!(m.resolve("Melee: "), Err(MappingError::MalformedKey("Melee: ".into())));
    }

    #[test]
    fn test_composite_key_forms() {
        let mut m = weapons();
        let short = Mapping::CompositeKey(m.clone());
        assert_eq!(short.all_keys(), vec!["Melee: Sword", "Bow", "Ranged: Sword"]);
        assert_eq!(short.key_of(&Value::Item(ItemPath::new("Ranged", 8))), "Ranged: Sword");
        assert_eq!(short.key_of(&Value::Item(ItemPath::new("Melee", 4))), "Melee: Sword");
        assert_eq!(short.key_of(&Value::Item(ItemPath::new("Ranged", 7))), "Bow");

        m.prefer_short_form = false;
        let m = Mapping::CompositeKey(m);
        assert_eq!(m.all_keys(), vec!["Melee: Sword", "Ranged: Bow", "Ranged: Sword"]);
        assert_eq!(m.key_of(&Value::Item(ItemPath::new("Ranged", 8))), "Ranged: Sword");
        assert!(m.validate(&Value::Item(ItemPath::new("Melee", 4))));
        assert!(!m.validate(&Value::Item(ItemPath::new("Melee", 7))));
    }

    #[test]
    fn test_resolve_mapping_skips_unset_entries() {
        let entries = vec![
            MappingEntry { field_name: "color".into(), mapping: None },
            MappingEntry::new("color", colors()),
            MappingEntry::new("Color", Mapping::Enum(EnumMapping::of::<Color>())),
        ];
        assert_eq!(resolve_mapping(&entries, "color"), Some(&colors()));
        assert!(matches!(resolve_mapping(&entries, "Color"), Some(Mapping::Enum(_))));
        assert_eq!(resolve_mapping(&entries, "missing"), None);
    }

    #[test]
    fn test_mapping_serde() {
        let entry = MappingEntry::new("color", colors());
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"fieldName\":\"color\""));
        assert!(json.contains("\"kind\":\"pair\""));
        let back: MappingEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
