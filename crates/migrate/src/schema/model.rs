//! Expected and actual schema shapes compared by the validator.

use serde::Serialize;
use std::collections::BTreeMap;

/// Table declared by a `CREATE TABLE` statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDef {
    pub name: String,
    /// Column names in declaration order
    pub columns: Vec<String>,
}

/// Index declared by a `CREATE [UNIQUE] INDEX` statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDef {
    pub name: String,
    pub table: String,
    pub unique: bool,
}

/// Tables and indexes a domain's schema files declare
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpectedSchema {
    pub tables: Vec<TableDef>,
    pub indexes: Vec<IndexDef>,
}

impl ExpectedSchema {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.indexes.is_empty()
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Add a table; a repeated declaration extends the first one's columns
    pub fn add_table(&mut self, table: TableDef) {
        match self.tables.iter_mut().find(|t| t.name == table.name) {
            Some(existing) => {
                for column in table.columns {
                    if !existing.columns.contains(&column) {
                        existing.columns.push(column);
                    }
                }
            }
            None => self.tables.push(table),
        }
    }

    pub fn add_index(&mut self, index: IndexDef) {
        if self.index(&index.name).is_none() {
            self.indexes.push(index);
        }
    }

    /// Fold another file's declarations into this one
    pub fn merge(&mut self, other: ExpectedSchema) {
        for table in other.tables {
            self.add_table(table);
        }
        for index in other.indexes {
            self.add_index(index);
        }
    }
}

/// Tables, columns and indexes found in the live database
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActualSchema {
    /// Table name to column names in ordinal order
    pub tables: BTreeMap<String, Vec<String>>,
    /// Index name to the table it is defined on
    pub indexes: BTreeMap<String, String>,
}

impl ActualSchema {
    /// Keep only the tables `expected` declares, with their indexes.
    ///
    /// Used when several domains share one PostgreSQL schema, where other
    /// domains' tables are not unexpected.
    pub fn scoped_to(self, expected: &ExpectedSchema) -> ActualSchema {
        let tables: BTreeMap<String, Vec<String>> = self
            .tables
            .into_iter()
            .filter(|(name, _)| expected.table(name).is_some())
            .collect();
        let indexes = self
            .indexes
            .into_iter()
            .filter(|(name, table)| tables.contains_key(table) || expected.index(name).is_some())
            .collect();
        ActualSchema { tables, indexes }
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn index_count(&self) -> usize {
        self.indexes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, columns: &[&str]) -> TableDef {
        TableDef {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_merge_extends_repeated_tables() {
        let mut schema = ExpectedSchema::default();
        schema.add_table(table("posts", &["id", "title"]));

        let mut other = ExpectedSchema::default();
        other.add_table(table("posts", &["title", "body"]));
        other.add_table(table("tags", &["id"]));
        schema.merge(other);

        assert_eq!(schema.tables.len(), 2);
        assert_eq!(schema.table("posts").unwrap().columns, vec!["id", "title", "body"]);
    }

    #[test]
    fn test_scoped_to_drops_foreign_tables() {
        let mut expected = ExpectedSchema::default();
        expected.add_table(table("posts", &["id"]));

        let mut actual = ActualSchema::default();
        actual.tables.insert("posts".into(), vec!["id".into()]);
        actual.tables.insert("inquiries".into(), vec!["id".into()]);
        actual.indexes.insert("idx_posts_id".into(), "posts".into());
        actual.indexes.insert("idx_inquiries_id".into(), "inquiries".into());

        let scoped = actual.scoped_to(&expected);
        assert_eq!(scoped.table_count(), 1);
        assert_eq!(scoped.index_count(), 1);
        assert!(scoped.indexes.contains_key("idx_posts_id"));
    }
}
