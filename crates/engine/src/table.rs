use serde::{Deserialize, Serialize};

use sheetsync_core::{CellAddress, SheetRef};

use crate::mapping::{resolve_mapping, Mapping, MappingEntry};

/// Where a table lives and how its non-primitive columns are mapped.
///
/// Hosts persist this alongside their data; it serializes with camelCase keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDefinition {
    pub sheet: SheetRef,
    /// Top-left header cell
    #[serde(default)]
    pub start: CellAddress,
    #[serde(default)]
    pub mappings: Vec<MappingEntry>,
}

impl TableDefinition {
    pub fn new(sheet: SheetRef) -> Self {
        Self { sheet, start: CellAddress::default(), mappings: Vec::new() }
    }

    pub fn with_start(mut self, start: CellAddress) -> Self {
        self.start = start;
        self
    }

    pub fn with_mapping(mut self, field_name: impl Into<String>, mapping: Mapping) -> Self {
        self.mappings.push(MappingEntry::new(field_name, mapping));
        self
    }

    pub fn mapping_for(&self, field: &str) -> Option<&Mapping> {
        resolve_mapping(&self.mappings, field)
    }
}

/// A definition plus the local rows it synchronizes.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable<R> {
    pub definition: TableDefinition,
    pub rows: Vec<R>,
}

impl<R> SheetTable<R> {
    pub fn new(definition: TableDefinition) -> Self {
        Self { definition, rows: Vec::new() }
    }

    pub fn with_rows(definition: TableDefinition, rows: Vec<R>) -> Self {
        Self { definition, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::PairMapping;
    use crate::value::Value;

    #[test]
    fn test_definition_json() {
        let json = r#"{
            "sheet": { "spreadsheetId": "abc", "sheetName": "Units" },
            "start": { "column": "B", "row": 3 },
            "mappings": [
                { "fieldName": "icon", "mapping": null },
                { "fieldName": "icon", "mapping": { "kind": "pair", "pairs": [
                    { "key": "hero", "value": { "type": "Object", "value": "hero.png" } }
                ] } }
            ]
        }"#;
        let def: TableDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.start.to_string(), "B3");
        let Some(Mapping::Pair(pairs)) = def.mapping_for("icon") else {
            panic!("expected pair mapping");
        };
        assert_eq!(pairs.resolve("hero"), Value::Object("hero.png".into()));
    }

    #[test]
    fn test_definition_defaults() {
        let json = r#"{ "sheet": { "spreadsheetId": "abc", "sheetName": "Units" } }"#;
        let def: TableDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.start, CellAddress::default());
        assert!(def.mappings.is_empty());

        let built = TableDefinition::new(SheetRef::new("abc", "Units"))
            .with_mapping("icon", Mapping::Pair(PairMapping::default()));
        assert!(built.mapping_for("icon").is_some());
    }
}
