//! Core pipeline for the k13 teaching language.
//!
//! k13 is a small Pascal-like language that compiles to C++. The
//! pipeline is roughly:
//!
//!   source .k13
//!     -> scanner + classifier (concurrent, lexemes + side tables)
//!     -> parser    (statement tree + usage traces + expression buckets)
//!     -> semantic  (scope, label and string-type checking)
//!     -> emitter   (C++ translation unit)
//!
//! Tools (CLI etc.) should depend on this crate rather than
//! reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod diagnostic;
pub mod error;

// ---------------------------------------------------------------------
// Front-end: scanning, classification, parsing
// ---------------------------------------------------------------------

pub mod token;
pub mod scanner;
pub mod classifier;
pub mod lexer;
pub mod parser;
pub mod ast;

// ---------------------------------------------------------------------
// Semantic checking
// ---------------------------------------------------------------------

pub mod semantic;

// ---------------------------------------------------------------------
// Back-end: C++ emission and compiler orchestration
// ---------------------------------------------------------------------

pub mod emitter;
pub mod compiler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::{CompileOutput, compile, compile_file};
pub use diagnostic::{Diagnostic, Severity, has_errors};
pub use error::CoreError;
