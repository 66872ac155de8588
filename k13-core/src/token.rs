//! Lexeme model and the fixed keyword / operator tables of k13.
//!
//! The classifier is intentionally simple: it attaches no semantic
//! meaning beyond recognizing keywords, operators and basic literals.
//! Higher layers interpret identifiers and labels.

/// Kind of a classified lexeme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexemeKind {
    // Structural keywords
    Program,
    Start,
    Finish,
    Var,
    If,
    Goto,
    For,
    To,
    Next,
    Get,
    Put,

    // Type keywords
    Int,
    Bool,
    String,

    // Literals
    Number,
    StringLiteral,
    True,
    False,

    Identifier,

    // Operators and punctuation
    Assign,   // :=
    Add,      // +
    Sub,      // -
    Mul,      // *
    Div,      // /
    Mod,      // %
    Equal,    // =
    NotEqual, // <>
    Less,     // le
    Greater,  // ge
    And,      // &&
    Or,       // ||
    Not,      // !!
    LParen,   // (
    RParen,   // )
    Semicolon,
    Comma,

    Unknown,
}

/// Declared type of a k13 variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VarType {
    Int,
    Bool,
    String,
}

impl LexemeKind {
    /// Maps the three type keywords onto [`VarType`].
    pub fn var_type(self) -> Option<VarType> {
        match self {
            LexemeKind::Int => Some(VarType::Int),
            LexemeKind::Bool => Some(VarType::Bool),
            LexemeKind::String => Some(VarType::String),
            _ => None,
        }
    }
}

/// Looks up an exact keyword spelling.
///
/// `le` and `ge` are keywords at the lexical level but classify as
/// comparison operators, matching the language reference.
pub fn keyword(text: &str) -> Option<LexemeKind> {
    let kind = match text {
        "program" => LexemeKind::Program,
        "start" => LexemeKind::Start,
        "finish" => LexemeKind::Finish,
        "var" => LexemeKind::Var,
        "if" => LexemeKind::If,
        "goto" => LexemeKind::Goto,
        "for" => LexemeKind::For,
        "to" => LexemeKind::To,
        "next" => LexemeKind::Next,
        "get" => LexemeKind::Get,
        "put" => LexemeKind::Put,
        "string" => LexemeKind::String,
        "int16_t" => LexemeKind::Int,
        "bool" => LexemeKind::Bool,
        "true" => LexemeKind::True,
        "false" => LexemeKind::False,
        "le" => LexemeKind::Less,
        "ge" => LexemeKind::Greater,
        _ => return None,
    };
    Some(kind)
}

/// Looks up an exact operator or punctuation spelling.
pub fn operator(text: &str) -> Option<LexemeKind> {
    let kind = match text {
        ":=" => LexemeKind::Assign,
        "+" => LexemeKind::Add,
        "-" => LexemeKind::Sub,
        "*" => LexemeKind::Mul,
        "/" => LexemeKind::Div,
        "%" => LexemeKind::Mod,
        "=" => LexemeKind::Equal,
        "<>" => LexemeKind::NotEqual,
        "&&" => LexemeKind::And,
        "||" => LexemeKind::Or,
        "!!" => LexemeKind::Not,
        "(" => LexemeKind::LParen,
        ")" => LexemeKind::RParen,
        ";" => LexemeKind::Semicolon,
        "," => LexemeKind::Comma,
        _ => return None,
    };
    Some(kind)
}

/// A classified token with its 1-based source line.
///
/// Invariants: `number` is `Some` iff `kind == Number`; `table_id` is
/// `Some` iff the kind is `StringLiteral` or `Unknown`, in which case
/// `text` stays empty and the raw text lives in the corresponding
/// side table ([`Literal`] / [`UnknownLexeme`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub kind: LexemeKind,
    pub text: String,
    pub line: u32,
    pub number: Option<i64>,
    pub table_id: Option<u32>,
}

impl Lexeme {
    pub fn new(kind: LexemeKind, text: impl Into<String>, line: u32) -> Self {
        Lexeme {
            kind,
            text: text.into(),
            line,
            number: None,
            table_id: None,
        }
    }

    pub fn number(text: impl Into<String>, line: u32, value: i64) -> Self {
        Lexeme {
            kind: LexemeKind::Number,
            text: text.into(),
            line,
            number: Some(value),
            table_id: None,
        }
    }

    pub fn string_literal(line: u32, id: u32) -> Self {
        Lexeme {
            kind: LexemeKind::StringLiteral,
            text: String::new(),
            line,
            number: None,
            table_id: Some(id),
        }
    }

    pub fn unknown(line: u32, id: u32) -> Self {
        Lexeme {
            kind: LexemeKind::Unknown,
            text: String::new(),
            line,
            number: None,
            table_id: Some(id),
        }
    }
}

/// One entry per distinct string literal occurrence, 1-based, in
/// source order. `raw_text` keeps the surrounding quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    pub id: u32,
    pub raw_text: String,
}

/// One entry per token that matched none of the lexical classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLexeme {
    pub id: u32,
    pub raw_text: String,
}
