//! AST and usage-trace side tables produced by the parser.
//!
//! Expressions are deliberately not reduced to typed trees: the raw
//! matched token sub-sequence is kept verbatim (parentheses included)
//! both in the owning statement and in a type-tagged bucket. The
//! checker re-walks the tokens for type consistency and the emitter
//! replays them almost unchanged, so token order and nesting must be
//! preserved exactly.

use std::collections::BTreeMap;

use crate::token::{Lexeme, VarType};

/// What an identifier or label did at one point in parse order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A compound block opened while the name was already known.
    ScopeEnter,
    /// The matching block closed.
    ScopeExit,
    /// Declared in a `var` section.
    Declared,
    /// Target of an assignment.
    Assigned,
    /// Target of a `get`.
    Input,
    /// Read inside an expression or `put`.
    Used,
    /// Became a `for` loop counter.
    ForStart,
    /// The `for` loop closed.
    ForEnd,
    /// Declared as a statement label.
    Label,
    /// Target of a `goto`.
    Goto,
}

/// A timestamped usage fact, replayed by the semantic checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageEvent {
    pub line: u32,
    pub kind: EventKind,
}

impl UsageEvent {
    pub fn new(line: u32, kind: EventKind) -> Self {
        UsageEvent { line, kind }
    }
}

/// Per-name ordered event sequences; order equals source order.
pub type Traces = BTreeMap<String, Vec<UsageEvent>>;

/// A raw token sub-sequence tagged with the type context it must
/// satisfy, accumulated in parse order.
pub type ExpressionBucket = (VarType, Vec<Lexeme>);

/// One k13 statement. Expression fields hold the verbatim token
/// sub-sequences matched by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `start ... finish` block with its own declarations, in source
    /// order.
    Compound {
        vars: Vec<(String, VarType)>,
        body: Vec<Statement>,
    },
    Assign {
        target: String,
        value: Vec<Lexeme>,
    },
    /// `get(x)`
    Input { target: String },
    /// `put(expr)`
    Output { value: Vec<Lexeme> },
    Goto { label: String },
    /// A bare identifier statement declaring a label.
    Label { name: String },
    /// `if` keeps the three parser-chosen label names so the emitter
    /// can reproduce the exact branch targets.
    If {
        condition: Vec<Lexeme>,
        true_label: String,
        false_branch: Box<Statement>,
        exit_label: String,
        end_label: String,
    },
    For {
        var: String,
        from: Vec<Lexeme>,
        to: Vec<Lexeme>,
        body: Vec<Statement>,
    },
}
