//! Step file parser.
//!
//! A step file is a sequence of tag blocks:
//!
//! ```text
//! /*-assign_result row_count-*/
//! select count(*) from some_table;
//!
//! /*-exit_step_if :row_count = 0-*/
//! ```
//!
//! Text before the first tag is ignored.

use crate::error::{SneaqlError, SneaqlResult};
use crate::registry::Registry;
use crate::tokenizer::Tokenizer;

pub const TAG_OPEN: &str = "/*-";
pub const TAG_CLOSE: &str = "-*/";

/// One tagged command and its SQL body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub command: String,
    pub arguments: Vec<String>,
    /// Text after the closing tag, sent to the database after substitution.
    pub body: String,
    /// The statement as it appeared in the file, tag included.
    pub text: String,
}

/// Splits step files into statements.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepParser {
    tokenizer: Tokenizer,
}

impl StepParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a whole step file.
    ///
    /// Every statement whose tag cannot be tokenized is logged; the first
    /// such error is returned.
    pub fn parse(&self, contents: &str) -> SneaqlResult<Vec<Statement>> {
        let mut statements = Vec::new();
        let mut first_error = None;
        for (index, parsed) in self.parse_each(contents) {
            match parsed {
                Ok(statement) => statements.push(statement),
                Err(e) => {
                    tracing::error!(statement = index, error = %e, "Invalid statement tag");
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        if statements.is_empty() {
            return Err(SneaqlError::NoStatementsFound);
        }
        Ok(statements)
    }

    /// 1-based statement numbers paired with every tag error in the file.
    pub fn tag_errors(&self, contents: &str) -> Vec<(usize, SneaqlError)> {
        self.parse_each(contents)
            .into_iter()
            .filter_map(|(index, parsed)| parsed.err().map(|e| (index, e)))
            .collect()
    }

    fn parse_each(&self, contents: &str) -> Vec<(usize, SneaqlResult<Statement>)> {
        contents
            .split(TAG_OPEN)
            .skip(1)
            .enumerate()
            .map(|(i, fragment)| (i + 1, self.parse_statement(&format!("{}{}", TAG_OPEN, fragment))))
            .collect()
    }

    fn parse_statement(&self, text: &str) -> SneaqlResult<Statement> {
        let (command, arguments) = self.extract_tag(text)?;
        let body = text
            .split_once(TAG_CLOSE)
            .map(|(_, body)| body.to_string())
            .unwrap_or_default();
        Ok(Statement {
            command,
            arguments,
            body,
            text: text.to_string(),
        })
    }

    /// Tokenize the tag of one statement into a command name and its arguments.
    pub fn extract_tag(&self, statement: &str) -> SneaqlResult<(String, Vec<String>)> {
        let inner = statement.trim_start();
        let inner = inner.strip_prefix(TAG_OPEN).unwrap_or(inner);
        let Some((tag, _)) = inner.split_once(TAG_CLOSE) else {
            return Err(SneaqlError::StatementParsing(format!(
                "tag is not closed with '{}': {}",
                TAG_CLOSE,
                preview(statement)
            )));
        };

        let mut tokens = self.tokenizer.tokenize(tag)?.into_iter();
        match tokens.next() {
            Some(command) => Ok((command, tokens.collect())),
            None => Err(SneaqlError::StatementParsing(format!(
                "tag has no command: {}",
                preview(statement)
            ))),
        }
    }
}

/// Check every statement's command exists and accepts its arguments.
///
/// All failures are logged before returning.
pub fn validate_all(statements: &[Statement], registry: &Registry) -> bool {
    let mut valid = true;
    for (index, statement) in statements.iter().enumerate() {
        match registry.command(&statement.command) {
            Ok(command) => {
                if !command.validate_args(&statement.arguments) {
                    tracing::error!(
                        statement = index + 1,
                        command = %statement.command,
                        arguments = ?statement.arguments,
                        "Invalid arguments"
                    );
                    valid = false;
                }
            }
            Err(e) => {
                tracing::error!(statement = index + 1, error = %e, "Unknown command");
                valid = false;
            }
        }
    }
    valid
}

fn preview(text: &str) -> String {
    text.chars().take(60).collect()
}
