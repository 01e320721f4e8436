pub mod ast;
pub mod lexer;
pub mod line_index;
pub mod parser;
pub mod span;

use ast::names::NameResolver;
use ast::{ExprId, ParseError, Stmt};
use lexer::Lexer;
use parser::Parser;
use std::fmt;

pub use span::Span;

/// First error of a failed parse.
#[derive(Debug, Clone)]
pub struct ParseFailure {
    pub line: usize,
    pub message: String,
    pub errors: Vec<ParseError>,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on line {}", self.message, self.line)
    }
}

impl std::error::Error for ParseFailure {}

impl ParseFailure {
    fn from_errors(source: &[u8], errors: Vec<ParseError>) -> Option<Self> {
        let first = errors.first()?;
        let line = line_index::LineIndex::new(source).line(first.span.start);
        Some(Self {
            line,
            message: first.message.clone(),
            errors,
        })
    }
}

/// Parse a PHP file into name-resolved top-level statements.
pub fn parse_source(source: &[u8]) -> Result<Vec<Stmt>, ParseFailure> {
    let (statements, errors) = parse_source_lenient(source);
    match ParseFailure::from_errors(source, errors) {
        Some(failure) => Err(failure),
        None => Ok(statements),
    }
}

/// Parse a PHP file, keeping whatever could be recovered next to the
/// collected errors.
pub fn parse_source_lenient(source: &[u8]) -> (Vec<Stmt>, Vec<ParseError>) {
    let mut parser = Parser::new(Lexer::new(source));
    let mut program = parser.parse_program();
    NameResolver::new().resolve_statements(&mut program.statements);
    (program.statements, program.errors)
}

/// Parse a standalone PHP expression such as a rendered default value.
/// Names resolve as in the global namespace.
pub fn parse_expression(source: &str) -> Result<ExprId, ParseFailure> {
    let mut parser = Parser::new(Lexer::new_scripting(source.as_bytes()));
    let mut expr = parser.parse_standalone_expr();
    if let Some(failure) = ParseFailure::from_errors(source.as_bytes(), parser.errors().to_vec()) {
        return Err(failure);
    }
    NameResolver::new().resolve_expr(&mut expr);
    Ok(expr)
}
