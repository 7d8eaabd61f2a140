//! Pure comparison of an expected schema against the live one.

use std::collections::HashSet;

use super::model::{ActualSchema, ExpectedSchema};

/// Findings of one comparison, in a stable order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    /// Declared objects the database lacks
    pub errors: Vec<String>,
    /// Objects the database has that nothing declares
    pub warnings: Vec<String>,
}

impl SchemaDiff {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// Compare both directions.
///
/// Errors come in declaration order: missing tables and their missing
/// columns, then missing or misplaced indexes. Warnings list unexpected
/// columns, then unexpected tables and indexes by name.
pub fn diff_schemas(expected: &ExpectedSchema, actual: &ActualSchema) -> SchemaDiff {
    let mut diff = SchemaDiff::default();

    for table in &expected.tables {
        let actual_columns = match actual.tables.get(&table.name) {
            Some(columns) => columns,
            None => {
                diff.errors.push(format!("Missing table: {}", table.name));
                continue;
            }
        };

        let present: HashSet<&str> = actual_columns.iter().map(String::as_str).collect();
        for column in &table.columns {
            if !present.contains(column.as_str()) {
                diff.errors
                    .push(format!("Missing column: {}.{}", table.name, column));
            }
        }

        for column in actual_columns {
            if !table.columns.contains(column) {
                diff.warnings
                    .push(format!("Unexpected column: {}.{}", table.name, column));
            }
        }
    }

    for index in &expected.indexes {
        match actual.indexes.get(&index.name) {
            None => diff.errors.push(format!("Missing index: {}", index.name)),
            Some(table) if *table != index.table => diff.errors.push(format!(
                "Index {} is on table {}, expected {}",
                index.name, table, index.table
            )),
            Some(_) => {}
        }
    }

    for table in actual.tables.keys() {
        if expected.table(table).is_none() {
            diff.warnings.push(format!("Unexpected table: {}", table));
        }
    }
    for index in actual.indexes.keys() {
        if expected.index(index).is_none() {
            diff.warnings.push(format!("Unexpected index: {}", index));
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema;

    fn with_table(mut schema: ActualSchema, name: &str, columns: &[&str]) -> ActualSchema {
        schema.tables.insert(
            name.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        schema
    }

    fn with_index(mut schema: ActualSchema, name: &str, table: &str) -> ActualSchema {
        schema.indexes.insert(name.to_string(), table.to_string());
        schema
    }

    #[test]
    fn test_matching_schema_has_no_findings() {
        let expected = parse_schema("CREATE TABLE t (id INT, title TEXT, created_at TIMESTAMPTZ);").unwrap();
        let actual = with_table(ActualSchema::default(), "t", &["id", "title", "created_at"]);

        assert!(diff_schemas(&expected, &actual).is_clean());
    }

    #[test]
    fn test_missing_table() {
        let expected = parse_schema("CREATE TABLE t (id INT, title TEXT);").unwrap();
        let diff = diff_schemas(&expected, &ActualSchema::default());

        assert_eq!(diff.errors, vec!["Missing table: t"]);
        assert!(diff.warnings.is_empty());
    }

    #[test]
    fn test_columns_and_indexes_both_directions() {
        let expected = parse_schema(
            "CREATE TABLE posts (id INT, title TEXT, body TEXT);
             CREATE INDEX idx_posts_title ON posts (title);
             CREATE INDEX idx_posts_body ON posts (body);",
        )
        .unwrap();
        let actual = with_table(ActualSchema::default(), "posts", &["id", "title", "legacy"]);
        let actual = with_table(actual, "audit", &["id"]);
        let actual = with_index(actual, "idx_posts_body", "audit");
        let actual = with_index(actual, "idx_posts_legacy", "posts");

        let diff = diff_schemas(&expected, &actual);
        assert_eq!(
            diff.errors,
            vec![
                "Missing column: posts.body",
                "Missing index: idx_posts_title",
                "Index idx_posts_body is on table audit, expected posts",
            ]
        );
        assert_eq!(
            diff.warnings,
            vec![
                "Unexpected column: posts.legacy",
                "Unexpected table: audit",
                "Unexpected index: idx_posts_legacy",
            ]
        );
    }
}
