//! Expected-schema parser.
//!
//! Walks the token stream of a declarative SQL file looking for
//! `CREATE TABLE` and `CREATE INDEX` statements. Everything else (comments,
//! `CREATE EXTENSION`, `COMMENT ON`, grants, ...) is skipped up to the next
//! semicolon. Column clauses are split on commas at parenthesis depth one
//! only, so `NUMERIC(10,2)` or `CHECK (a IN (1, 2))` stay in one clause.

use sqlparser::tokenizer::{Token, TokenWithLocation};
use thiserror::Error;

use super::model::{ExpectedSchema, IndexDef, TableDef};
use crate::sql::{self, SqlLexError};

/// Malformed expected-schema file
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct SchemaParseError {
    pub line: u64,
    pub message: String,
}

impl From<SqlLexError> for SchemaParseError {
    fn from(err: SqlLexError) -> Self {
        SchemaParseError {
            line: err.line,
            message: err.message,
        }
    }
}

/// Table-level clauses that are not column definitions
const CONSTRAINT_KEYWORDS: &[&str] = &[
    "CONSTRAINT",
    "PRIMARY",
    "FOREIGN",
    "UNIQUE",
    "CHECK",
    "LIKE",
];

/// Parse the tables, columns and indexes declared in `sql`.
///
/// A file with only comments and whitespace yields an empty schema.
pub fn parse_schema(sql: &str) -> Result<ExpectedSchema, SchemaParseError> {
    let tokens = sql::significant_tokens(sql)?;
    let mut parser = SchemaParser { tokens: &tokens, pos: 0 };
    let mut schema = ExpectedSchema::default();

    while !parser.at_end() {
        if parser.eat_keyword("CREATE") {
            parser.create_statement(&mut schema)?;
        } else {
            parser.skip_statement();
        }
    }
    Ok(schema)
}

struct SchemaParser<'a> {
    tokens: &'a [TokenWithLocation],
    pos: usize,
}

impl<'a> SchemaParser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn line(&self) -> u64 {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.location.line)
    }

    fn error(&self, message: impl Into<String>) -> SchemaParseError {
        SchemaParseError {
            line: self.line(),
            message: message.into(),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| sql::is_keyword(t, keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keywords(&mut self, keywords: &[&str]) -> bool {
        let matches = keywords.iter().enumerate().all(|(offset, keyword)| {
            self.tokens
                .get(self.pos + offset)
                .is_some_and(|t| sql::is_keyword(&t.token, keyword))
        });
        if matches {
            self.pos += keywords.len();
        }
        matches
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), SchemaParseError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}, found {}", keyword, self.describe_next())))
        }
    }

    fn describe_next(&self) -> String {
        match self.peek() {
            Some(token) => format!("'{}'", token),
            None => "end of file".to_string(),
        }
    }

    /// Skip past the next top-level semicolon
    fn skip_statement(&mut self) {
        while let Some(token) = self.next() {
            if matches!(token, Token::SemiColon) {
                break;
            }
        }
    }

    /// `name` or `schema.name`; the schema qualifier is dropped
    fn qualified_name(&mut self, what: &str) -> Result<String, SchemaParseError> {
        let mut name = self.next_identifier(what)?;
        while matches!(self.peek(), Some(Token::Period)) {
            self.pos += 1;
            name = self.next_identifier(what)?;
        }
        Ok(name)
    }

    fn next_identifier(&mut self, what: &str) -> Result<String, SchemaParseError> {
        match self.peek().and_then(sql::identifier) {
            Some(name) => {
                self.pos += 1;
                Ok(name)
            }
            None => Err(self.error(format!("expected {}, found {}", what, self.describe_next()))),
        }
    }

    fn create_statement(&mut self, schema: &mut ExpectedSchema) -> Result<(), SchemaParseError> {
        self.eat_keywords(&["OR", "REPLACE"]);
        while self.eat_keyword("GLOBAL")
            || self.eat_keyword("LOCAL")
            || self.eat_keyword("TEMP")
            || self.eat_keyword("TEMPORARY")
            || self.eat_keyword("UNLOGGED")
        {}
        let unique = self.eat_keyword("UNIQUE");

        if !unique && self.eat_keyword("TABLE") {
            let table = self.create_table()?;
            schema.add_table(table);
        } else if self.eat_keyword("INDEX") {
            if let Some(index) = self.create_index(unique)? {
                schema.add_index(index);
            }
        } else {
            self.skip_statement();
        }
        Ok(())
    }

    fn create_table(&mut self) -> Result<TableDef, SchemaParseError> {
        self.eat_keywords(&["IF", "NOT", "EXISTS"]);
        let name = self.qualified_name("table name")?;

        if !matches!(self.peek(), Some(Token::LParen)) {
            return Err(self.error(format!(
                "expected column list for table {}, found {}",
                name,
                self.describe_next()
            )));
        }
        let open_line = self.line();
        self.pos += 1;

        let mut columns = Vec::new();
        let mut clause: Vec<&Token> = Vec::new();
        let mut depth = 1usize;

        loop {
            let token = match self.next() {
                Some(token) => token,
                None => {
                    return Err(SchemaParseError {
                        line: open_line,
                        message: format!("unterminated column list for table {}", name),
                    })
                }
            };

            match token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                Token::Comma if depth == 1 => {
                    if let Some(column) = self.column_name(&name, &clause)? {
                        columns.push(column);
                    }
                    clause.clear();
                    continue;
                }
                Token::SemiColon => {
                    return Err(SchemaParseError {
                        line: open_line,
                        message: format!("unterminated column list for table {}", name),
                    })
                }
                _ => {}
            }
            clause.push(token);
        }

        // `CREATE TABLE t ()` is legal and has no clauses
        if !(clause.is_empty() && columns.is_empty()) {
            if let Some(column) = self.column_name(&name, &clause)? {
                columns.push(column);
            }
        }

        // Storage options, PARTITION BY, INHERITS and the like
        self.skip_statement();
        Ok(TableDef { name, columns })
    }

    /// First token of a column clause, or `None` for a table constraint
    fn column_name(&self, table: &str, clause: &[&Token]) -> Result<Option<String>, SchemaParseError> {
        let first = match clause.first() {
            Some(first) => *first,
            None => return Err(self.error(format!("empty column definition in table {}", table))),
        };

        if CONSTRAINT_KEYWORDS.iter().any(|kw| sql::is_keyword(first, kw)) {
            return Ok(None);
        }
        // EXCLUDE is unreserved: a constraint only before USING or its element list
        if sql::is_keyword(first, "EXCLUDE") {
            let constraint = match clause.get(1) {
                Some(Token::LParen) => true,
                Some(next) => sql::is_keyword(next, "USING"),
                None => false,
            };
            if constraint {
                return Ok(None);
            }
        }

        sql::identifier(first).map(Some).ok_or_else(|| {
            self.error(format!(
                "expected column name in table {}, found '{}'",
                table, first
            ))
        })
    }

    /// `None` for unnamed indexes, which cannot be matched by name
    fn create_index(&mut self, unique: bool) -> Result<Option<IndexDef>, SchemaParseError> {
        self.eat_keyword("CONCURRENTLY");
        self.eat_keywords(&["IF", "NOT", "EXISTS"]);

        if self.peek_keyword("ON") {
            tracing::debug!(line = self.line(), "skipping unnamed index");
            self.skip_statement();
            return Ok(None);
        }

        let name = self.qualified_name("index name")?;
        self.expect_keyword("ON")?;
        self.eat_keyword("ONLY");
        let table = self.qualified_name("table name")?;
        self.skip_statement();

        Ok(Some(IndexDef {
            name,
            table,
            unique,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table_and_indexes() {
        let sql = r#"
            -- Content domain
            CREATE TABLE IF NOT EXISTS content.posts (
                id BIGSERIAL PRIMARY KEY,
                title TEXT NOT NULL,
                "Slug" VARCHAR(200) UNIQUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );

            CREATE UNIQUE INDEX idx_posts_slug ON content.posts ("Slug");
            CREATE INDEX CONCURRENTLY IF NOT EXISTS idx_posts_created ON ONLY posts USING btree (created_at);
        "#;

        let schema = parse_schema(sql).unwrap();
        assert_eq!(schema.tables.len(), 1);
        assert_eq!(schema.tables[0].name, "posts");
        assert_eq!(schema.tables[0].columns, vec!["id", "title", "Slug", "created_at"]);

        assert_eq!(
            schema.indexes,
            vec![
                IndexDef {
                    name: "idx_posts_slug".into(),
                    table: "posts".into(),
                    unique: true
                },
                IndexDef {
                    name: "idx_posts_created".into(),
                    table: "posts".into(),
                    unique: false
                },
            ]
        );
    }

    #[test]
    fn test_nested_commas_stay_in_one_column() {
        let sql = "CREATE TABLE prices (
            id INT,
            amount NUMERIC(10,2) NOT NULL CHECK (amount IN (1, 2, 3)),
            currency CHAR(3) DEFAULT 'E,U'
        );";

        let schema = parse_schema(sql).unwrap();
        assert_eq!(schema.tables[0].columns, vec!["id", "amount", "currency"]);
    }

    #[test]
    fn test_table_constraints_are_not_columns() {
        let sql = "CREATE TABLE inquiries (
            id INT,
            post_id INT,
            email TEXT,
            CONSTRAINT inquiries_pk PRIMARY KEY (id),
            FOREIGN KEY (post_id) REFERENCES posts (id),
            UNIQUE (email, post_id),
            CHECK (email <> '')
        ) WITH (fillfactor = 70);";

        let schema = parse_schema(sql).unwrap();
        assert_eq!(schema.tables[0].columns, vec!["id", "post_id", "email"]);
    }

    #[test]
    fn test_exclude_column_versus_exclude_constraint() {
        let sql = "CREATE TABLE bookings (
            id INT,
            room INT,
            during TSRANGE,
            exclude BOOLEAN DEFAULT FALSE,
            EXCLUDE USING gist (room WITH =, during WITH &&),
            EXCLUDE (room WITH =)
        );";

        let schema = parse_schema(sql).unwrap();
        assert_eq!(schema.tables[0].columns, vec!["id", "room", "during", "exclude"]);
    }

    #[test]
    fn test_comments_only_and_empty_files() {
        assert!(parse_schema("").unwrap().is_empty());
        assert!(parse_schema("-- nothing yet\n/* still\nnothing */\n").unwrap().is_empty());
    }

    #[test]
    fn test_multiple_statements_and_other_ddl() {
        let sql = "CREATE EXTENSION IF NOT EXISTS pgcrypto;
            CREATE TABLE a (id INT);
            COMMENT ON TABLE a IS 'create table b (x int)';
            CREATE OR REPLACE FUNCTION touch() RETURNS trigger AS $$ BEGIN RETURN NEW; END; $$ LANGUAGE plpgsql;
            CREATE UNLOGGED TABLE b (id INT, a_id INT);
            CREATE INDEX ON b (a_id);
            CREATE TABLE empty ();";

        let schema = parse_schema(sql).unwrap();
        let names: Vec<&str> = schema.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "empty"]);
        assert!(schema.table("empty").unwrap().columns.is_empty());
        assert!(schema.indexes.is_empty());
    }

    #[test]
    fn test_unterminated_column_list_is_an_error() {
        let err = parse_schema("CREATE TABLE posts (\n  id INT,\n  title TEXT\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("unterminated"));

        let err = parse_schema("CREATE TABLE posts (id INT,);").unwrap_err();
        assert!(err.message.contains("empty column definition"));
    }

    #[test]
    fn test_lex_errors_carry_line() {
        let err = parse_schema("CREATE TABLE a (id INT);\nCREATE TABLE b (name TEXT DEFAULT 'x);").unwrap_err();
        assert_eq!(err.line, 2);
    }
}
