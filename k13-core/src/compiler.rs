//! Pipeline driver: lexing, parsing, checking, emission.
//!
//! Stage gating: any lexical or syntax error stops the pipeline after
//! parsing (the side tables may be incomplete, so checking them would
//! fabricate errors); semantic errors additionally suppress emission.
//! Warnings never block anything.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::Path;

use crate::ast::{ExpressionBucket, Statement, Traces};
use crate::diagnostic::{has_errors, Diagnostic};
use crate::emitter;
use crate::error::CoreError;
use crate::lexer::tokenize;
use crate::parser::parse;
use crate::semantic;
use crate::token::{Lexeme, Literal, UnknownLexeme, VarType};

/// Everything a compilation produced, kept around for inspection even
/// when emission was suppressed.
#[derive(Debug)]
pub struct CompileOutput {
    pub program_name: String,
    pub lexemes: Vec<Lexeme>,
    pub literals: Vec<Literal>,
    pub unknowns: Vec<UnknownLexeme>,
    pub variables: BTreeMap<String, VarType>,
    pub identifiers: Traces,
    pub labels: Traces,
    pub expressions: Vec<ExpressionBucket>,
    pub ast: Vec<Statement>,
    pub diagnostics: Vec<Diagnostic>,
    /// The rendered C++ unit; `None` when any error was reported.
    pub translation_unit: Option<String>,
}

impl CompileOutput {
    pub fn succeeded(&self) -> bool {
        self.translation_unit.is_some()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }
}

pub fn compile(source: &str) -> CompileOutput {
    let lexed = tokenize(source);
    let parsed = parse(&lexed.lexemes, &lexed.unknowns);
    let mut diagnostics = lexed.diagnostics;
    diagnostics.extend(parsed.diagnostics);

    let front_end_clean = !has_errors(&diagnostics);
    if front_end_clean {
        diagnostics.extend(semantic::check(
            &parsed.variables,
            &parsed.identifiers,
            &parsed.labels,
            &parsed.expressions,
        ));
    }
    let translation_unit = if front_end_clean && !has_errors(&diagnostics) {
        Some(emitter::emit(&parsed.ast, &lexed.literals))
    } else {
        None
    };

    CompileOutput {
        program_name: parsed.program_name,
        lexemes: lexed.lexemes,
        literals: lexed.literals,
        unknowns: lexed.unknowns,
        variables: parsed.variables,
        identifiers: parsed.identifiers,
        labels: parsed.labels,
        expressions: parsed.expressions,
        ast: parsed.ast,
        diagnostics,
        translation_unit,
    }
}

/// Reads and compiles one `.k13` source file.
pub fn compile_file(path: impl AsRef<Path>) -> Result<CompileOutput, CoreError> {
    let path = path.as_ref();
    if path.extension().and_then(OsStr::to_str) != Some("k13") {
        return Err(CoreError::WrongFileType(path.to_path_buf()));
    }
    let source = fs::read_to_string(path)?;
    Ok(compile(&source))
}
