//! Validation results and the console report.

use serde::Serialize;
use std::fmt::Write;

/// Outcome of validating one domain. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    domain: String,
    valid: bool,
    table_count: usize,
    index_count: usize,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    /// `valid` is derived: true exactly when `errors` is empty
    pub fn new(
        domain: impl Into<String>,
        table_count: usize,
        index_count: usize,
        errors: Vec<String>,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            valid: errors.is_empty(),
            table_count,
            index_count,
            errors,
            warnings,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Tables found in the database for this domain
    pub fn table_count(&self) -> usize {
        self.table_count
    }

    /// Indexes found in the database for this domain
    pub fn index_count(&self) -> usize {
        self.index_count
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

const BANNER: &str = "==================================================";

/// Render `results` in input order, ending with `<valid>/<total> domains valid`
pub fn generate_report(results: &[ValidationResult]) -> String {
    let mut out = String::new();
    let valid = results.iter().filter(|r| r.is_valid()).count();

    // Writing into a String cannot fail
    let _ = writeln!(out, "{}", BANNER);
    let _ = writeln!(out, "Schema Validation Report");
    let _ = writeln!(out, "{}", BANNER);

    for result in results {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Domain: {} - {}",
            result.domain(),
            if result.is_valid() { "VALID" } else { "INVALID" }
        );
        let _ = writeln!(
            out,
            "  Tables: {}, Indexes: {}",
            result.table_count(),
            result.index_count()
        );

        if !result.errors().is_empty() {
            let _ = writeln!(out, "  Errors ({}):", result.errors().len());
            for error in result.errors() {
                let _ = writeln!(out, "    - {}", error);
            }
        }
        if !result.warnings().is_empty() {
            let _ = writeln!(out, "  Warnings ({}):", result.warnings().len());
            for warning in result.warnings() {
                let _ = writeln!(out, "    - {}", warning);
            }
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", BANNER);
    let _ = writeln!(out, "Summary: {}/{} domains valid", valid, results.len());
    out
}
