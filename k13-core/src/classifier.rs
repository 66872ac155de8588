//! Turns raw token candidates into typed [`Lexeme`]s.
//!
//! Classification order (first match wins): operator table, keyword
//! table, integer literal, string literal, identifier, unknown.
//! String literals and unknowns are interned into 1-based side tables
//! so large text is never re-embedded in every lexeme.

use crate::token::{self, Lexeme, Literal, UnknownLexeme};

/// Identifiers are at most this long; longer words are unknown.
const MAX_IDENTIFIER_LEN: usize = 6;
/// Digit strings longer than this never classify as numbers.
const MAX_NUMBER_LEN: usize = 16;

#[derive(Debug, Default)]
pub struct Classifier {
    lexemes: Vec<Lexeme>,
    literals: Vec<Literal>,
    unknowns: Vec<UnknownLexeme>,
}

impl Classifier {
    pub fn new() -> Self {
        Classifier::default()
    }

    /// Classifies one candidate, preserving input order.
    pub fn classify(&mut self, text: &str, line: u32) {
        if let Some(kind) = token::operator(text) {
            self.lexemes.push(Lexeme::new(kind, text, line));
            return;
        }
        if let Some(kind) = token::keyword(text) {
            self.lexemes.push(Lexeme::new(kind, text, line));
            return;
        }
        if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
            if text.len() > MAX_NUMBER_LEN {
                self.push_unknown(text, line);
            } else {
                match text.parse::<i64>() {
                    Ok(value) => self.lexemes.push(Lexeme::number(text, line, value)),
                    Err(_) => self.push_unknown(text, line),
                }
            }
            return;
        }
        if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
            let id = self.literals.len() as u32 + 1;
            self.literals.push(Literal {
                id,
                raw_text: text.to_string(),
            });
            self.lexemes.push(Lexeme::string_literal(line, id));
            return;
        }
        if text.starts_with(|c: char| c.is_ascii_lowercase()) && text.len() <= MAX_IDENTIFIER_LEN {
            self.lexemes
                .push(Lexeme::new(token::LexemeKind::Identifier, text, line));
            return;
        }
        self.push_unknown(text, line);
    }

    fn push_unknown(&mut self, text: &str, line: u32) {
        let id = self.unknowns.len() as u32 + 1;
        self.unknowns.push(UnknownLexeme {
            id,
            raw_text: text.to_string(),
        });
        self.lexemes.push(Lexeme::unknown(line, id));
    }

    pub fn finish(self) -> (Vec<Lexeme>, Vec<Literal>, Vec<UnknownLexeme>) {
        (self.lexemes, self.literals, self.unknowns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::LexemeKind;

    fn classify_all(candidates: &[(&str, u32)]) -> Classifier {
        let mut classifier = Classifier::new();
        for (text, line) in candidates {
            classifier.classify(text, *line);
        }
        classifier
    }

    #[test]
    fn every_keyword_classifies_to_its_table_entry() {
        let words = [
            ("program", LexemeKind::Program),
            ("start", LexemeKind::Start),
            ("finish", LexemeKind::Finish),
            ("var", LexemeKind::Var),
            ("if", LexemeKind::If),
            ("goto", LexemeKind::Goto),
            ("for", LexemeKind::For),
            ("to", LexemeKind::To),
            ("next", LexemeKind::Next),
            ("get", LexemeKind::Get),
            ("put", LexemeKind::Put),
            ("string", LexemeKind::String),
            ("int16_t", LexemeKind::Int),
            ("bool", LexemeKind::Bool),
            ("true", LexemeKind::True),
            ("false", LexemeKind::False),
            ("le", LexemeKind::Less),
            ("ge", LexemeKind::Greater),
        ];
        for (word, kind) in words {
            let mut classifier = Classifier::new();
            classifier.classify(word, 1);
            let (lexemes, _, _) = classifier.finish();
            assert_eq!(lexemes[0].kind, kind, "keyword {word}");
        }
    }

    #[test]
    fn every_operator_classifies_to_its_table_entry() {
        let ops = [
            (":=", LexemeKind::Assign),
            ("+", LexemeKind::Add),
            ("-", LexemeKind::Sub),
            ("*", LexemeKind::Mul),
            ("/", LexemeKind::Div),
            ("%", LexemeKind::Mod),
            ("=", LexemeKind::Equal),
            ("<>", LexemeKind::NotEqual),
            ("&&", LexemeKind::And),
            ("||", LexemeKind::Or),
            ("!!", LexemeKind::Not),
            ("(", LexemeKind::LParen),
            (")", LexemeKind::RParen),
            (";", LexemeKind::Semicolon),
            (",", LexemeKind::Comma),
        ];
        for (op, kind) in ops {
            let mut classifier = Classifier::new();
            classifier.classify(op, 1);
            let (lexemes, _, _) = classifier.finish();
            assert_eq!(lexemes[0].kind, kind, "operator {op}");
        }
    }

    #[test]
    fn numbers_carry_their_value() {
        let classifier = classify_all(&[("1234", 3)]);
        let (lexemes, _, _) = classifier.finish();
        assert_eq!(lexemes[0].kind, LexemeKind::Number);
        assert_eq!(lexemes[0].number, Some(1234));
    }

    #[test]
    fn seventeen_digits_classify_unknown_never_number() {
        let classifier = classify_all(&[("12345678901234567", 1)]);
        let (lexemes, _, unknowns) = classifier.finish();
        assert_eq!(lexemes[0].kind, LexemeKind::Unknown);
        assert_eq!(unknowns[0].raw_text, "12345678901234567");
    }

    #[test]
    fn string_literals_intern_into_the_side_table() {
        let classifier = classify_all(&[("\"ab\"", 1), ("\"cd\"", 2)]);
        let (lexemes, literals, _) = classifier.finish();
        assert_eq!(lexemes[0].table_id, Some(1));
        assert_eq!(lexemes[1].table_id, Some(2));
        assert_eq!(literals[1].raw_text, "\"cd\"");
        assert!(lexemes[0].text.is_empty());
    }

    #[test]
    fn identifiers_are_short_and_lowercase_initial() {
        let classifier = classify_all(&[("count", 1), ("toolong", 1), ("Upper", 1)]);
        let (lexemes, _, unknowns) = classifier.finish();
        assert_eq!(lexemes[0].kind, LexemeKind::Identifier);
        assert_eq!(lexemes[1].kind, LexemeKind::Unknown);
        assert_eq!(lexemes[2].kind, LexemeKind::Unknown);
        assert_eq!(unknowns.len(), 2);
    }
}
