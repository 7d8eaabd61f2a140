//! Lexing helpers built on the `sqlparser` PostgreSQL tokenizer.
//!
//! Migration scripts are executed verbatim; the tokenizer is only used to
//! reject scripts with unterminated literals or comments before they reach
//! the database, and to drive the expected-schema parser.

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Token, TokenWithLocation, Tokenizer};
use thiserror::Error;

/// Lexical error in a SQL script
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct SqlLexError {
    pub line: u64,
    pub message: String,
}

/// Tokenize `sql`, dropping whitespace and comments
pub fn significant_tokens(sql: &str) -> Result<Vec<TokenWithLocation>, SqlLexError> {
    let dialect = PostgreSqlDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .tokenize_with_location()
        .map_err(|e| SqlLexError {
            line: e.location.line,
            message: e.message,
        })?;

    Ok(tokens
        .into_iter()
        .filter(|t| !matches!(t.token, Token::Whitespace(_) | Token::EOF))
        .collect())
}

/// Number of non-empty statements in a script
pub fn count_statements(sql: &str) -> Result<usize, SqlLexError> {
    let mut count = 0;
    let mut in_statement = false;

    for token in significant_tokens(sql)? {
        match token.token {
            Token::SemiColon => {
                if in_statement {
                    count += 1;
                }
                in_statement = false;
            }
            _ => in_statement = true,
        }
    }

    if in_statement {
        count += 1;
    }
    Ok(count)
}

/// Case-insensitive match of an unquoted keyword
pub(crate) fn is_keyword(token: &Token, keyword: &str) -> bool {
    match token {
        Token::Word(word) => word.quote_style.is_none() && word.value.eq_ignore_ascii_case(keyword),
        _ => false,
    }
}

/// Identifier as PostgreSQL resolves it: unquoted names fold to lower case
pub(crate) fn identifier(token: &Token) -> Option<String> {
    match token {
        Token::Word(word) if word.quote_style.is_some() => Some(word.value.clone()),
        Token::Word(word) => Some(word.value.to_lowercase()),
        _ => None,
    }
}
