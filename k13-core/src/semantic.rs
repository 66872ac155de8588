//! Semantic checking over the parser's side tables.
//!
//! The checker never touches the statement tree. It replays three
//! kinds of evidence the parser collected:
//!
//! * identifier usage traces, through a declare/initialize scope
//!   automaton,
//! * label traces, through a depth/position coordinate automaton,
//! * type-tagged expression buckets, through a segment machine that
//!   tracks string operands across comparison operators.
//!
//! Checking is pure: the same tables always produce the same
//! diagnostics, in the same order.

use std::collections::{BTreeMap, HashMap};

use crate::ast::{EventKind, ExpressionBucket, Traces, UsageEvent};
use crate::diagnostic::Diagnostic;
use crate::token::{Lexeme, LexemeKind, VarType};

pub fn check(
    variables: &BTreeMap<String, VarType>,
    identifiers: &Traces,
    labels: &Traces,
    expressions: &[ExpressionBucket],
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    check_identifiers(identifiers, labels, &mut diagnostics);
    check_labels(labels, &mut diagnostics);
    check_expressions(variables, expressions, &mut diagnostics);
    diagnostics
}

// ----------------------------------------------------------------------
// Identifier automaton
// ----------------------------------------------------------------------

/// Per-scope variable state. Copied into nested scopes by value, so
/// inner declarations never leak back out.
#[derive(Debug, Clone, Copy, Default)]
struct VarState {
    declared: bool,
    initialized: bool,
}

fn check_identifiers(identifiers: &Traces, labels: &Traces, diagnostics: &mut Vec<Diagnostic>) {
    for (name, events) in identifiers {
        let Some(first) = events.first() else {
            continue;
        };
        if labels.contains_key(name) {
            diagnostics.push(Diagnostic::semantic(
                first.line,
                format!("Identifier {name} is a label"),
            ));
            continue;
        }
        // A name never declared in any scope gets one error at its
        // first appearance instead of one per use.
        let ever_declared = events
            .iter()
            .any(|event| matches!(event.kind, EventKind::Declared | EventKind::ForStart));
        if !ever_declared {
            diagnostics.push(Diagnostic::semantic(
                first.line,
                format!("Identifier {name} is not declared"),
            ));
            continue;
        }
        walk_scope(name, events, 0, VarState::default(), true, diagnostics);
    }
}

/// Replays one scope's worth of events starting at `index`; returns
/// the index just past the scope's exit event. The loop flag is reset
/// per scope and deliberately not inherited by nested blocks.
fn walk_scope(
    name: &str,
    events: &[UsageEvent],
    mut index: usize,
    mut state: VarState,
    top_level: bool,
    diagnostics: &mut Vec<Diagnostic>,
) -> usize {
    let mut in_for = false;
    while let Some(event) = events.get(index) {
        match event.kind {
            EventKind::ScopeEnter => {
                index = walk_scope(name, events, index + 1, state, false, diagnostics);
                continue;
            }
            EventKind::ScopeExit => {
                if !top_level {
                    return index + 1;
                }
            }
            EventKind::Declared => {
                if state.declared {
                    diagnostics.push(Diagnostic::semantic(
                        event.line,
                        format!("Identifier {name} is already declared"),
                    ));
                } else if in_for {
                    diagnostics.push(Diagnostic::semantic(
                        event.line,
                        format!(
                            "Identifier {name} is used in for loop. Redeclaration is unacceptable"
                        ),
                    ));
                }
                state.declared = true;
            }
            EventKind::ForStart => {
                if state.declared {
                    diagnostics.push(Diagnostic::warning(
                        event.line,
                        format!(
                            "Identifier {name} is already declared. Possible undefined behavior"
                        ),
                    ));
                }
                in_for = true;
            }
            EventKind::ForEnd => in_for = false,
            EventKind::Assigned | EventKind::Input => {
                if !state.declared {
                    diagnostics.push(Diagnostic::semantic(
                        event.line,
                        format!("Identifier {name} is not declared"),
                    ));
                }
                if in_for {
                    diagnostics.push(Diagnostic::warning(
                        event.line,
                        format!(
                            "Identifier {name} is used in for loop. Possible undefined behavior"
                        ),
                    ));
                }
                state.initialized = true;
            }
            EventKind::Used => {
                if !state.declared {
                    diagnostics.push(Diagnostic::semantic(
                        event.line,
                        format!("Identifier {name} is not declared"),
                    ));
                } else if !state.initialized {
                    diagnostics.push(Diagnostic::semantic(
                        event.line,
                        format!("Identifier {name} is not initialized"),
                    ));
                }
                if in_for {
                    diagnostics.push(Diagnostic::warning(
                        event.line,
                        format!(
                            "Identifier {name} is used in for loop. Possible undefined behavior"
                        ),
                    ));
                }
            }
            EventKind::Label | EventKind::Goto => {}
        }
        index += 1;
    }
    index
}

// ----------------------------------------------------------------------
// Label automaton
// ----------------------------------------------------------------------

/// A label is reachable from a `goto` only when the jump sits in the
/// same block as the label or deeper. Blocks are numbered per nesting
/// depth, so `(depth, position)` identifies one block; a jump is in
/// scope when its depth is greater than the label's, or equal with the
/// same position.
fn check_labels(labels: &Traces, diagnostics: &mut Vec<Diagnostic>) {
    for (name, events) in labels {
        let Some(first) = events.first() else {
            continue;
        };
        let mut depth: i32 = 0;
        let mut last_position: HashMap<i32, i32> = HashMap::from([(0, 0)]);
        let mut declared = false;
        let mut label_coord = (0i32, 0i32);
        let mut sites: Vec<(u32, i32, i32)> = Vec::new();
        for event in events {
            match event.kind {
                EventKind::ScopeEnter => {
                    depth += 1;
                    match last_position.get_mut(&depth) {
                        Some(position) => *position += 1,
                        None => {
                            last_position.insert(depth, 0);
                        }
                    }
                }
                EventKind::ScopeExit => {
                    depth -= 1;
                    match last_position.get_mut(&depth) {
                        Some(position) => {
                            if depth != 0 {
                                *position += 1;
                            }
                        }
                        None => {
                            last_position.insert(depth, 0);
                        }
                    }
                }
                EventKind::Label => {
                    if declared {
                        diagnostics.push(Diagnostic::semantic(
                            event.line,
                            format!("Identifier {name} is already declared"),
                        ));
                    }
                    let position = last_position.get(&depth).copied().unwrap_or(0);
                    label_coord = (depth, position);
                    declared = true;
                    sites.push((event.line, depth, position));
                }
                EventKind::Goto => {
                    let position = last_position.get(&depth).copied().unwrap_or(0);
                    sites.push((event.line, depth, position));
                }
                _ => {}
            }
        }
        if !declared {
            diagnostics.push(Diagnostic::semantic(
                first.line,
                format!("Label {name} is not declared"),
            ));
            continue;
        }
        for (line, site_depth, site_position) in sites {
            if site_depth < label_coord.0
                || (site_depth == label_coord.0 && site_position != label_coord.1)
            {
                diagnostics.push(Diagnostic::semantic(
                    line,
                    format!("Label {name} is used out of scope"),
                ));
            }
        }
    }
}

// ----------------------------------------------------------------------
// Expression segment machine
// ----------------------------------------------------------------------

/// State for one comparison operand. `concat` stays true while only
/// `+` joins the operand's factors; a comparison operator shifts the
/// current operand into the `_b` slots.
#[derive(Debug)]
struct Segment {
    concat: bool,
    has_string: bool,
    has_comp: bool,
    concat_b: bool,
    has_string_b: bool,
}

impl Segment {
    fn new() -> Self {
        Segment {
            concat: true,
            has_string: false,
            has_comp: false,
            concat_b: true,
            has_string_b: false,
        }
    }

    fn shift(&mut self) {
        self.concat_b = self.concat;
        self.has_string_b = self.has_string;
        self.concat = true;
        self.has_string = false;
        self.has_comp = true;
    }

    /// Runs the operand-pair checks at a segment boundary (`&&`, `||`
    /// or a closing parenthesis) and resets for the next segment.
    fn close(&mut self, line: u32, diagnostics: &mut Vec<Diagnostic>) {
        if self.has_comp {
            if self.has_string != self.has_string_b {
                diagnostics.push(Diagnostic::semantic(
                    line,
                    "In boolean expression both operands must be one type",
                ));
            } else if self.has_string && !self.concat && !self.concat_b {
                diagnostics.push(Diagnostic::semantic(
                    line,
                    "In boolean expression string is used with non-concatenation operator",
                ));
            }
        }
        self.concat = true;
        self.has_string = false;
        self.has_comp = false;
    }
}

fn check_expressions(
    variables: &BTreeMap<String, VarType>,
    expressions: &[ExpressionBucket],
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (context, tokens) in expressions {
        match context {
            VarType::Int => check_int_context(variables, tokens, diagnostics),
            VarType::Bool => check_bool_context(variables, tokens, diagnostics),
            VarType::String => check_string_context(variables, tokens, diagnostics),
        }
    }
}

fn is_string_variable(variables: &BTreeMap<String, VarType>, lexeme: &Lexeme) -> bool {
    variables.get(&lexeme.text) == Some(&VarType::String)
}

/// Loop bounds must be numeric; string variables are rejected
/// outright.
fn check_int_context(
    variables: &BTreeMap<String, VarType>,
    tokens: &[Lexeme],
    diagnostics: &mut Vec<Diagnostic>,
) {
    for lexeme in tokens {
        if lexeme.kind == LexemeKind::Identifier && is_string_variable(variables, lexeme) {
            diagnostics.push(Diagnostic::semantic(
                lexeme.line,
                format!(
                    "Identifier {} is declared as string, using as int is unacceptable",
                    lexeme.text
                ),
            ));
        }
    }
}

fn check_bool_context(
    variables: &BTreeMap<String, VarType>,
    tokens: &[Lexeme],
    diagnostics: &mut Vec<Diagnostic>,
) {
    if let [only] = tokens {
        if only.kind == LexemeKind::Identifier && is_string_variable(variables, only) {
            diagnostics.push(Diagnostic::semantic(
                only.line,
                "In boolean expression string can't use without comparison",
            ));
        } else if only.kind == LexemeKind::StringLiteral {
            diagnostics.push(Diagnostic::semantic(
                only.line,
                "In boolean expression string literal can't use without comparison",
            ));
        }
    }
    let mut segment = Segment::new();
    let mut pos = 0;
    while pos < tokens.len() {
        let lexeme = &tokens[pos];
        match lexeme.kind {
            LexemeKind::StringLiteral => {
                segment.has_string = true;
                if !segment.concat {
                    diagnostics.push(Diagnostic::semantic(
                        lexeme.line,
                        "In boolean expression string is used with non-concatenation operator",
                    ));
                }
            }
            LexemeKind::Identifier => {
                if is_string_variable(variables, lexeme) {
                    diagnostics.push(Diagnostic::semantic(
                        lexeme.line,
                        "In boolean expression string variable is unacceptable",
                    ));
                }
            }
            LexemeKind::And | LexemeKind::Or | LexemeKind::RParen => {
                segment.close(lexeme.line, diagnostics);
            }
            LexemeKind::Less | LexemeKind::Greater | LexemeKind::Equal | LexemeKind::NotEqual => {
                segment.shift();
            }
            LexemeKind::Sub | LexemeKind::Mul | LexemeKind::Div | LexemeKind::Mod => {
                segment.concat = false;
            }
            LexemeKind::LParen => {
                let (next, concat, has_string) =
                    check_nested(tokens, pos + 1, diagnostics);
                pos = next;
                segment.concat &= concat;
                segment.has_string |= has_string;
            }
            _ => {}
        }
        pos += 1;
    }
}

/// String expressions are free-form concatenations; only their
/// parenthesized boolean sub-expressions need checking.
fn check_string_context(
    _variables: &BTreeMap<String, VarType>,
    tokens: &[Lexeme],
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut pos = 0;
    while pos < tokens.len() {
        if tokens[pos].kind == LexemeKind::LParen {
            let (next, _, _) = check_nested(tokens, pos + 1, diagnostics);
            pos = next;
        }
        pos += 1;
    }
}

/// Checks a parenthesized sub-expression, stopping at its closing
/// parenthesis without consuming it. Returns the stop index and the
/// concat/string flags the enclosing operand folds in.
fn check_nested(
    tokens: &[Lexeme],
    mut pos: usize,
    diagnostics: &mut Vec<Diagnostic>,
) -> (usize, bool, bool) {
    let mut segment = Segment::new();
    while pos < tokens.len() {
        let lexeme = &tokens[pos];
        match lexeme.kind {
            LexemeKind::RParen => break,
            LexemeKind::StringLiteral => {
                segment.has_string = true;
                if !segment.concat {
                    diagnostics.push(Diagnostic::semantic(
                        lexeme.line,
                        "In boolean expression string is used with non-concatenation operator",
                    ));
                }
            }
            LexemeKind::And | LexemeKind::Or => {
                segment.close(lexeme.line, diagnostics);
            }
            LexemeKind::Less | LexemeKind::Greater | LexemeKind::Equal | LexemeKind::NotEqual => {
                segment.shift();
            }
            LexemeKind::Sub | LexemeKind::Mul | LexemeKind::Div | LexemeKind::Mod => {
                segment.concat = false;
            }
            LexemeKind::LParen => {
                let (next, concat, has_string) = check_nested(tokens, pos + 1, diagnostics);
                pos = next;
                segment.concat &= concat;
                segment.has_string |= has_string;
            }
            _ => {}
        }
        pos += 1;
    }
    (pos, segment.concat, segment.has_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;
    use crate::token::Lexeme;

    fn events(entries: &[(u32, EventKind)]) -> Vec<UsageEvent> {
        entries
            .iter()
            .map(|&(line, kind)| UsageEvent::new(line, kind))
            .collect()
    }

    fn identifier_diags(name: &str, entries: &[(u32, EventKind)]) -> Vec<Diagnostic> {
        let mut identifiers = Traces::new();
        identifiers.insert(name.to_string(), events(entries));
        check(&BTreeMap::new(), &identifiers, &Traces::new(), &[])
    }

    fn label_diags(name: &str, entries: &[(u32, EventKind)]) -> Vec<Diagnostic> {
        let mut labels = Traces::new();
        labels.insert(name.to_string(), events(entries));
        check(&BTreeMap::new(), &Traces::new(), &labels, &[])
    }

    use EventKind::*;

    #[test]
    fn declared_assigned_used_is_clean() {
        let diags = identifier_diags(
            "x",
            &[(1, Declared), (2, Assigned), (3, Used), (4, ScopeExit)],
        );
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn use_before_initialization_is_an_error() {
        let diags = identifier_diags("x", &[(1, Declared), (2, Used)]);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, 2);
        assert!(diags[0].message.contains("is not initialized"));
    }

    #[test]
    fn lone_use_of_an_unknown_name_reports_exactly_one_error() {
        let diags = identifier_diags("x", &[(4, Used)]);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, 4);
        assert!(diags[0].message.contains("Identifier x is not declared"));
    }

    #[test]
    fn never_declared_collapses_into_one_error_at_first_event() {
        let diags = identifier_diags("x", &[(3, Assigned), (4, Used), (5, Used)]);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, 3);
        assert!(diags[0].message.contains("is not declared"));
    }

    #[test]
    fn inner_declaration_does_not_leak_to_outer_scope() {
        let diags = identifier_diags(
            "x",
            &[
                (1, ScopeEnter),
                (2, Declared),
                (3, Assigned),
                (4, ScopeExit),
                (5, Used),
            ],
        );
        assert!(diags
            .iter()
            .any(|d| d.line == 5 && d.message.contains("is not declared")));
        // The name was declared somewhere, so no summary error.
        assert!(!diags.iter().any(|d| d.line == 1));
    }

    #[test]
    fn outer_state_is_inherited_by_nested_scopes() {
        let diags = identifier_diags(
            "x",
            &[
                (1, Declared),
                (2, Assigned),
                (3, ScopeEnter),
                (4, Used),
                (5, ScopeExit),
            ],
        );
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn redeclaration_in_same_scope_is_an_error() {
        let diags = identifier_diags("x", &[(1, Declared), (2, Declared)]);
        assert!(diags
            .iter()
            .any(|d| d.line == 2 && d.message.contains("is already declared")));
    }

    #[test]
    fn shadowing_in_a_nested_scope_is_rejected() {
        let diags = identifier_diags(
            "x",
            &[(1, Declared), (2, ScopeEnter), (3, Declared), (4, ScopeExit)],
        );
        assert!(diags
            .iter()
            .any(|d| d.line == 3 && d.message.contains("is already declared")));
    }

    #[test]
    fn loop_counter_reuse_warns_but_does_not_error() {
        let diags = identifier_diags(
            "i",
            &[
                (1, Declared),
                (2, Assigned),
                (3, ForStart),
                (4, Used),
                (5, ForEnd),
            ],
        );
        assert!(diags.iter().all(|d| d.severity == Severity::Warning));
        // One for the redeclaration at the loop head, one for the use
        // inside the body.
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn loop_flag_is_not_inherited_by_nested_scopes() {
        let diags = identifier_diags(
            "x",
            &[
                (1, Declared),
                (2, Assigned),
                (3, ForStart),
                (4, ScopeEnter),
                (5, Used),
                (6, ScopeExit),
                (7, ForEnd),
            ],
        );
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn identifier_clashing_with_a_label_is_reported_once() {
        let mut identifiers = Traces::new();
        identifiers.insert("x".to_string(), events(&[(2, Declared), (3, Used)]));
        let mut labels = Traces::new();
        labels.insert("x".to_string(), events(&[(5, Label)]));
        let diags = check(&BTreeMap::new(), &identifiers, &labels, &[]);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, 2);
        assert!(diags[0].message.contains("is a label"));
    }

    #[test]
    fn goto_in_same_block_as_label_is_in_scope() {
        let diags = label_diags(
            "l",
            &[(1, ScopeEnter), (2, Goto), (3, Label), (4, ScopeExit)],
        );
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn goto_from_deeper_nesting_is_in_scope() {
        let diags = label_diags(
            "l",
            &[
                (1, ScopeEnter),
                (2, Label),
                (3, ScopeEnter),
                (4, Goto),
                (5, ScopeExit),
                (6, ScopeExit),
            ],
        );
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn goto_from_shallower_nesting_is_out_of_scope() {
        let diags = label_diags(
            "l",
            &[
                (1, ScopeEnter),
                (2, ScopeEnter),
                (3, Label),
                (4, ScopeExit),
                (5, Goto),
                (6, ScopeExit),
            ],
        );
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, 5);
        assert!(diags[0].message.contains("is used out of scope"));
    }

    #[test]
    fn goto_into_a_sibling_block_is_out_of_scope() {
        let diags = label_diags(
            "l",
            &[
                (1, ScopeEnter),
                (2, Label),
                (3, ScopeExit),
                (4, ScopeEnter),
                (5, Goto),
                (6, ScopeExit),
            ],
        );
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, 5);
    }

    #[test]
    fn label_never_declared_is_an_error_at_first_site() {
        let diags = label_diags("l", &[(7, Goto)]);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].line, 7);
        assert!(diags[0].message.contains("Label l is not declared"));
    }

    #[test]
    fn duplicate_label_declaration_is_an_error() {
        let diags = label_diags("l", &[(1, Label), (2, Label)]);
        assert!(diags
            .iter()
            .any(|d| d.line == 2 && d.message.contains("is already declared")));
    }

    fn string_vars() -> BTreeMap<String, VarType> {
        let mut variables = BTreeMap::new();
        variables.insert("s".to_string(), VarType::String);
        variables.insert("n".to_string(), VarType::Int);
        variables
    }

    fn ident(name: &str, line: u32) -> Lexeme {
        Lexeme::new(LexemeKind::Identifier, name, line)
    }

    fn op(kind: LexemeKind, text: &str, line: u32) -> Lexeme {
        Lexeme::new(kind, text, line)
    }

    #[test]
    fn string_variable_in_int_context_is_an_error() {
        let bucket = (
            VarType::Int,
            vec![ident("s", 3), op(LexemeKind::Add, "+", 3), ident("n", 3)],
        );
        let diags = check(&string_vars(), &Traces::new(), &Traces::new(), &[bucket]);
        assert_eq!(diags.len(), 1);
        assert!(diags[0]
            .message
            .contains("declared as string, using as int is unacceptable"));
    }

    #[test]
    fn lone_string_literal_in_bool_context_needs_a_comparison() {
        let bucket = (VarType::Bool, vec![Lexeme::string_literal(2, 1)]);
        let diags = check(&string_vars(), &Traces::new(), &Traces::new(), &[bucket]);
        assert_eq!(diags.len(), 1);
        assert!(diags[0]
            .message
            .contains("string literal can't use without comparison"));
    }

    #[test]
    fn mixed_comparison_operands_are_rejected_at_the_connective() {
        // "a" = 1 && true
        let bucket = (
            VarType::Bool,
            vec![
                Lexeme::string_literal(4, 1),
                op(LexemeKind::Equal, "=", 4),
                Lexeme::number("1", 4, 1),
                op(LexemeKind::And, "&&", 4),
                Lexeme::new(LexemeKind::True, "true", 4),
            ],
        );
        let diags = check(&string_vars(), &Traces::new(), &Traces::new(), &[bucket]);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("both operands must be one type"));
    }

    #[test]
    fn string_with_non_concatenation_operator_is_rejected() {
        // "a" - "b" (already split into tokens)
        let bucket = (
            VarType::Bool,
            vec![
                Lexeme::string_literal(5, 1),
                op(LexemeKind::Sub, "-", 5),
                Lexeme::string_literal(5, 2),
            ],
        );
        let diags = check(&string_vars(), &Traces::new(), &Traces::new(), &[bucket]);
        assert_eq!(diags.len(), 1);
        assert!(diags[0]
            .message
            .contains("string is used with non-concatenation operator"));
    }

    #[test]
    fn string_concatenation_across_a_comparison_is_accepted() {
        // "a" + "b" = "c" && true
        let bucket = (
            VarType::Bool,
            vec![
                Lexeme::string_literal(6, 1),
                op(LexemeKind::Add, "+", 6),
                Lexeme::string_literal(6, 2),
                op(LexemeKind::Equal, "=", 6),
                Lexeme::string_literal(6, 3),
                op(LexemeKind::And, "&&", 6),
                Lexeme::new(LexemeKind::True, "true", 6),
            ],
        );
        let diags = check(&string_vars(), &Traces::new(), &Traces::new(), &[bucket]);
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn checking_is_idempotent() {
        let mut identifiers = Traces::new();
        identifiers.insert("x".to_string(), events(&[(2, Used)]));
        let mut labels = Traces::new();
        labels.insert("l".to_string(), events(&[(3, Goto)]));
        let first = check(&BTreeMap::new(), &identifiers, &labels, &[]);
        let second = check(&BTreeMap::new(), &identifiers, &labels, &[]);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.line, b.line);
            assert_eq!(a.message, b.message);
            assert_eq!(a.severity, b.severity);
        }
    }
}
