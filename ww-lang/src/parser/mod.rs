//! Reader: source text to raw forms.
//!
//! The reader knows nothing about special forms; `(if a b)` reads as a
//! three-element list. See [`crate::analyzer`] for the second stage.

use pest::error::{Error as PestError, LineColLocation};
use pest::iterators::Pair;
use pest::Parser;
use thiserror::Error;

use crate::anchor::Path;
use crate::ast::Symbol;
use crate::runtime::values::Value;

#[derive(pest_derive::Parser)]
#[grammar = "ww.pest"] // Path relative to src/
pub struct WwParser;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{line}:{column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("{line}:{column}: invalid literal '{text}': {message}")]
    InvalidLiteral {
        line: usize,
        column: usize,
        text: String,
        message: String,
    },
}

impl ParseError {
    pub fn line_col(&self) -> (usize, usize) {
        match self {
            ParseError::Syntax { line, column, .. }
            | ParseError::InvalidLiteral { line, column, .. } => (*line, *column),
        }
    }

    fn invalid(pair: &Pair<Rule>, message: impl Into<String>) -> Self {
        let (line, column) = pair.as_span().start_pos().line_col();
        ParseError::InvalidLiteral {
            line,
            column,
            text: pair.as_str().to_string(),
            message: message.into(),
        }
    }
}

impl From<PestError<Rule>> for ParseError {
    fn from(err: PestError<Rule>) -> Self {
        let (line, column) = match err.line_col {
            LineColLocation::Pos(pos) => pos,
            LineColLocation::Span(start, _) => start,
        };
        ParseError::Syntax {
            line,
            column,
            message: err.variant.message().to_string(),
        }
    }
}

/// Reads every form in `input`.
pub fn parse(input: &str) -> Result<Vec<Value>, ParseError> {
    let mut pairs = WwParser::parse(Rule::program, input)?;
    let Some(program) = pairs.next() else {
        return Ok(Vec::new());
    };
    program
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(build_form)
        .collect()
}

/// Reads exactly one form; trailing forms are an error.
pub fn parse_one(input: &str) -> Result<Value, ParseError> {
    let mut forms = parse(input)?;
    match forms.len() {
        1 => Ok(forms.remove(0)),
        n => Err(ParseError::Syntax {
            line: 1,
            column: 1,
            message: format!("expected exactly one form, found {}", n),
        }),
    }
}

fn build_form(pair: Pair<Rule>) -> Result<Value, ParseError> {
    match pair.as_rule() {
        Rule::nil => Ok(Value::Nil),
        Rule::boolean => Ok(Value::Boolean(pair.as_str() == "true")),
        Rule::integer => pair
            .as_str()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|e| ParseError::invalid(&pair, e.to_string())),
        Rule::float => pair
            .as_str()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|e| ParseError::invalid(&pair, e.to_string())),
        Rule::string => {
            let inner = pair.clone().into_inner().next().map(|p| p.as_str()).unwrap_or("");
            unescape(inner)
                .map(Value::from)
                .map_err(|msg| ParseError::invalid(&pair, msg))
        }
        Rule::symbol => Ok(Value::Symbol(Symbol::from(pair.as_str()))),
        Rule::path => Path::parse(pair.as_str())
            .map(Value::Path)
            .map_err(|e| ParseError::invalid(&pair, e.to_string())),
        Rule::list => Ok(Value::list(build_seq(pair)?)),
        Rule::vector => Ok(Value::vector(build_seq(pair)?)),
        Rule::quoted => {
            let inner = pair
                .clone()
                .into_inner()
                .next()
                .ok_or_else(|| ParseError::invalid(&pair, "nothing to quote"))?;
            Ok(Value::list(vec![Value::symbol("quote"), build_form(inner)?]))
        }
        other => Err(ParseError::invalid(&pair, format!("unexpected rule {:?}", other))),
    }
}

fn build_seq(pair: Pair<Rule>) -> Result<Vec<Value>, ParseError> {
    pair.into_inner().map(build_form).collect()
}

fn unescape(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => return Err(format!("unknown escape '\\{}'", other)),
            None => return Err("dangling escape".to_string()),
        }
    }
    Ok(out)
}
