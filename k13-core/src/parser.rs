//! Recursive-descent parser for the k13 grammar.
//!
//! Besides the [`Statement`] tree the parser fills four side tables:
//! the variable type table, per-identifier and per-label usage traces
//! (the semantic checker replays those instead of walking the tree),
//! and type-tagged expression buckets holding the verbatim token
//! sub-sequences.
//!
//! Errors never abort the pass: each mismatch records a positioned
//! diagnostic and parsing resynchronizes on statement boundaries, so
//! one syntax error does not suppress independent errors elsewhere.

use std::collections::BTreeMap;
use std::mem;

use crate::ast::{EventKind, ExpressionBucket, Statement, Traces, UsageEvent};
use crate::diagnostic::Diagnostic;
use crate::token::{Lexeme, LexemeKind, UnknownLexeme, VarType};

/// Everything the parser produces for one compilation unit. All
/// tables are read-only afterward.
#[derive(Debug)]
pub struct ParseResult {
    pub program_name: String,
    pub ast: Vec<Statement>,
    pub variables: BTreeMap<String, VarType>,
    pub identifiers: Traces,
    pub labels: Traces,
    pub expressions: Vec<ExpressionBucket>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn parse(lexemes: &[Lexeme], unknowns: &[UnknownLexeme]) -> ParseResult {
    let mut parser = Parser {
        lexemes,
        unknowns,
        pos: 0,
        program_name: String::new(),
        variables: BTreeMap::new(),
        identifiers: Traces::new(),
        labels: Traces::new(),
        expressions: Vec::new(),
        expr: Vec::new(),
        diagnostics: Vec::new(),
    };
    let ast = parser.program();
    ParseResult {
        program_name: parser.program_name,
        ast,
        variables: parser.variables,
        identifiers: parser.identifiers,
        labels: parser.labels,
        expressions: parser.expressions,
        diagnostics: parser.diagnostics,
    }
}

struct Parser<'a> {
    lexemes: &'a [Lexeme],
    unknowns: &'a [UnknownLexeme],
    pos: usize,
    program_name: String,
    variables: BTreeMap<String, VarType>,
    identifiers: Traces,
    labels: Traces,
    expressions: Vec<ExpressionBucket>,
    /// Accumulator for the expression currently being matched.
    expr: Vec<Lexeme>,
    diagnostics: Vec<Diagnostic>,
}

impl Parser<'_> {
    // ------------------------------------------------------------------
    // Cursor helpers
    // ------------------------------------------------------------------

    fn at_end(&self) -> bool {
        self.pos >= self.lexemes.len()
    }

    fn peek(&self) -> Option<&Lexeme> {
        self.lexemes.get(self.pos)
    }

    fn check(&self, kind: LexemeKind) -> bool {
        self.peek().is_some_and(|lex| lex.kind == kind)
    }

    fn check_next(&self, kind: LexemeKind) -> bool {
        self.lexemes
            .get(self.pos + 1)
            .is_some_and(|lex| lex.kind == kind)
    }

    /// Consumes the current lexeme if it has the expected kind.
    fn accept(&mut self, kind: LexemeKind) -> bool {
        if self.check(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn advance(&mut self) {
        if self.pos < self.lexemes.len() {
            self.pos += 1;
        }
    }

    /// Line of the current lexeme, falling back to the last known line
    /// at end of input.
    fn line(&self) -> u32 {
        self.peek()
            .or_else(|| self.lexemes.last())
            .map_or(1, |lex| lex.line)
    }

    fn prev_line(&self) -> u32 {
        if self.pos == 0 {
            return self.line();
        }
        self.lexemes.get(self.pos - 1).map_or(1, |lex| lex.line)
    }

    /// Display text for diagnostics; unknowns resolve through the side
    /// table.
    fn text_at(&self, index: usize) -> String {
        let Some(lex) = self.lexemes.get(index) else {
            return String::new();
        };
        match lex.kind {
            LexemeKind::Unknown => lex
                .table_id
                .and_then(|id| self.unknowns.get(id as usize - 1))
                .map_or_else(String::new, |u| u.raw_text.clone()),
            LexemeKind::StringLiteral => "string literal".to_string(),
            _ => lex.text.clone(),
        }
    }

    fn error(&mut self, line: u32, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::syntax(line, message));
    }

    /// Pushes the current lexeme into the expression accumulator and
    /// consumes it.
    fn take_into_expr(&mut self) {
        if let Some(lex) = self.lexemes.get(self.pos) {
            self.expr.push(lex.clone());
            self.pos += 1;
        }
    }

    // ------------------------------------------------------------------
    // Usage-event recording
    // ------------------------------------------------------------------

    fn record_identifier(&mut self, name: &str, line: u32, kind: EventKind) {
        self.identifiers
            .entry(name.to_string())
            .or_default()
            .push(UsageEvent::new(line, kind));
    }

    fn record_label(&mut self, name: &str, line: u32, kind: EventKind) {
        self.labels
            .entry(name.to_string())
            .or_default()
            .push(UsageEvent::new(line, kind));
    }

    /// Broadcasts a scope boundary to every identifier and label known
    /// so far; this replaces a separate symbol-table stack.
    fn broadcast_scope(&mut self, line: u32, kind: EventKind) {
        for events in self.identifiers.values_mut() {
            events.push(UsageEvent::new(line, kind));
        }
        for events in self.labels.values_mut() {
            events.push(UsageEvent::new(line, kind));
        }
    }

    // ------------------------------------------------------------------
    // Grammar productions
    // ------------------------------------------------------------------

    /// `program := "program" IDENT ";" compound`. The root statement
    /// must be a compound block; the emitter relies on it for the
    /// braces around the program entry point.
    fn program(&mut self) -> Vec<Statement> {
        self.program_declaration();
        if !self.check(LexemeKind::Start) {
            let line = self.line();
            self.error(line, "Expected 'start' keyword after program declaration");
            return self.program_body();
        }
        let mut body = vec![self.compound_statement()];
        if !self.at_end() {
            let line = self.line();
            let text = self.text_at(self.pos);
            self.error(
                line,
                format!("Unexpected statement {text} after 'finish' keyword"),
            );
            body.extend(self.program_body());
        }
        body
    }

    fn program_declaration(&mut self) {
        if !self.accept(LexemeKind::Program) {
            let line = self.line();
            self.error(line, "Expected 'program' keyword before program name");
        }
        if self.check(LexemeKind::Identifier) {
            self.program_name = self.text_at(self.pos);
            self.advance();
        } else {
            let line = self.line();
            self.error(line, "Expected program name after 'program' keyword");
        }
        self.expect_semicolon();
    }

    /// Statements until `finish` or end of input.
    fn program_body(&mut self) -> Vec<Statement> {
        let mut body = Vec::new();
        while !self.at_end() && !self.check(LexemeKind::Finish) {
            if let Some(statement) = self.statement() {
                body.push(statement);
            }
        }
        body
    }

    fn statement(&mut self) -> Option<Statement> {
        match self.peek().map(|lex| lex.kind)? {
            LexemeKind::Start => Some(self.compound_statement()),
            LexemeKind::Get => {
                let statement = self.get_statement();
                self.expect_semicolon();
                Some(statement)
            }
            LexemeKind::Put => {
                let statement = self.put_statement();
                self.expect_semicolon();
                Some(statement)
            }
            LexemeKind::If => Some(self.if_statement()),
            LexemeKind::Goto => {
                let statement = self.goto_statement();
                self.expect_semicolon();
                Some(statement)
            }
            LexemeKind::For => {
                let statement = self.for_statement();
                self.expect_semicolon();
                Some(statement)
            }
            LexemeKind::Identifier => {
                let statement = if self.check_next(LexemeKind::Assign) {
                    self.assign_statement()
                } else {
                    Statement::Label {
                        name: self.label_name(),
                    }
                };
                self.expect_semicolon();
                Some(statement)
            }
            _ => {
                let line = self.line();
                let text = self.text_at(self.pos);
                self.error(line, format!("Unknown statement {text}"));
                self.advance();
                None
            }
        }
    }

    fn compound_statement(&mut self) -> Statement {
        if !self.accept(LexemeKind::Start) {
            let line = self.line();
            self.error(line, "Expected 'start' keyword before compound statement");
        }
        self.broadcast_scope(self.prev_line(), EventKind::ScopeEnter);
        let vars = self.variable_declaration();
        let body = self.program_body();
        if !self.accept(LexemeKind::Finish) {
            let line = self.prev_line();
            self.error(line, "Expected 'finish' keyword after compound statement");
        }
        self.broadcast_scope(self.prev_line(), EventKind::ScopeExit);
        Statement::Compound { vars, body }
    }

    fn variable_declaration(&mut self) -> Vec<(String, VarType)> {
        if !self.accept(LexemeKind::Var) {
            let line = self.line();
            self.error(line, "Expected 'var' keyword before variable segment");
        }
        let mut vars = Vec::new();
        if self
            .peek()
            .is_some_and(|lex| lex.kind.var_type().is_some())
        {
            self.variable_list(&mut vars);
        }
        self.expect_semicolon();
        vars
    }

    fn variable_list(&mut self, vars: &mut Vec<(String, VarType)>) {
        // Caller checked the current lexeme is a type keyword.
        let mut ty = self.peek().and_then(|lex| lex.kind.var_type());
        self.advance();
        self.declare_variable(ty, vars);
        while self.accept(LexemeKind::Comma) {
            if !self.check(LexemeKind::Identifier) {
                match self.peek().and_then(|lex| lex.kind.var_type()) {
                    Some(next_ty) => {
                        ty = Some(next_ty);
                        self.advance();
                    }
                    None => {
                        let line = self.line();
                        self.error(line, "Expected variable type before identifier");
                    }
                }
            }
            self.declare_variable(ty, vars);
        }
    }

    fn declare_variable(&mut self, ty: Option<VarType>, vars: &mut Vec<(String, VarType)>) {
        if !self.check(LexemeKind::Identifier) {
            let line = self.line();
            self.error(line, "Expected identifier after variable type");
            return;
        }
        let name = self.text_at(self.pos);
        let line = self.line();
        self.advance();
        if let Some(ty) = ty {
            self.variables.insert(name.clone(), ty);
            vars.push((name.clone(), ty));
        }
        self.record_identifier(&name, line, EventKind::Declared);
    }

    fn get_statement(&mut self) -> Statement {
        self.advance(); // get
        if !self.accept(LexemeKind::LParen) {
            let line = self.line();
            self.error(line, "Expected '(' before identifier");
        }
        let mut target = String::new();
        if self.check(LexemeKind::Identifier) {
            target = self.text_at(self.pos);
            let line = self.line();
            self.record_identifier(&target.clone(), line, EventKind::Input);
            self.advance();
        } else {
            let line = self.line();
            self.error(line, "Expected identifier after 'get' statement");
        }
        if !self.accept(LexemeKind::RParen) {
            let line = self.line();
            self.error(line, "Expected ')' after identifier");
        }
        Statement::Input { target }
    }

    fn put_statement(&mut self) -> Statement {
        self.advance(); // put
        if !self.accept(LexemeKind::LParen) {
            let line = self.line();
            self.error(line, "Expected '(' before output expression");
        }
        self.expr.clear();
        let ok = self.string_expression();
        let value = mem::take(&mut self.expr);
        if ok {
            self.expressions.push((VarType::String, value.clone()));
        }
        if !self.accept(LexemeKind::RParen) {
            let line = self.line();
            self.error(line, "Expected ')' after expression in 'put' statement");
        }
        Statement::Output { value }
    }

    fn assign_statement(&mut self) -> Statement {
        let target = self.text_at(self.pos);
        let line = self.line();
        self.record_identifier(&target, line, EventKind::Assigned);
        self.advance();
        if !self.accept(LexemeKind::Assign) {
            let line = self.line();
            self.error(line, "Expected ':=' after identifier");
        }
        self.expr.clear();
        // String targets take a concatenation expression; everything
        // else takes the full boolean grammar.
        let is_string = self.variables.get(&target) == Some(&VarType::String);
        let ok = if is_string {
            self.string_expression()
        } else {
            self.logical_expression()
        };
        let value = mem::take(&mut self.expr);
        if ok {
            let context = if is_string {
                VarType::String
            } else {
                VarType::Bool
            };
            self.expressions.push((context, value.clone()));
        }
        Statement::Assign { target, value }
    }

    fn goto_statement(&mut self) -> Statement {
        if !self.accept(LexemeKind::Goto) {
            let line = self.line();
            self.error(line, "Expected 'goto' keyword before identifier");
        }
        let mut label = String::new();
        if self.check(LexemeKind::Identifier) {
            label = self.text_at(self.pos);
            let line = self.line();
            self.record_label(&label.clone(), line, EventKind::Goto);
            self.advance();
        } else {
            let line = self.line();
            self.error(line, "Expected identifier after 'goto' statement");
        }
        Statement::Goto { label }
    }

    fn label_name(&mut self) -> String {
        if self.check(LexemeKind::Identifier) {
            let name = self.text_at(self.pos);
            let line = self.line();
            self.record_label(&name, line, EventKind::Label);
            self.advance();
            name
        } else {
            let line = self.line();
            self.error(line, "Expected label identifier");
            String::new()
        }
    }

    /// `if (cond) goto L1; start ... finish goto L2; L3;`
    ///
    /// The false branch is the compound; the true branch is whatever
    /// follows `L3` in the surrounding block. All three label names
    /// are kept so the emitter reproduces the exact targets.
    fn if_statement(&mut self) -> Statement {
        self.advance(); // if
        if !self.accept(LexemeKind::LParen) {
            let line = self.line();
            self.error(line, "Expected '(' before condition expression");
        }
        self.expr.clear();
        let ok = self.logical_expression();
        let condition = mem::take(&mut self.expr);
        if ok {
            self.expressions.push((VarType::Bool, condition.clone()));
        }
        if !self.accept(LexemeKind::RParen) {
            let line = self.line();
            self.error(line, "Expected ')' after condition expression");
        }
        let true_label = match self.goto_statement() {
            Statement::Goto { label } => label,
            _ => String::new(),
        };
        self.expect_semicolon();

        // Resynchronize on the 'start' of the false branch.
        if !self.check(LexemeKind::Start) {
            let line = self.line();
            let mut skipped = Vec::new();
            while !self.at_end() && !self.check(LexemeKind::Start) {
                skipped.push(self.text_at(self.pos));
                self.advance();
            }
            if self.at_end() {
                self.error(line, "Expected 'start' keyword after 'if' statement");
                return Statement::If {
                    condition,
                    true_label,
                    false_branch: Box::new(Statement::Compound {
                        vars: Vec::new(),
                        body: Vec::new(),
                    }),
                    exit_label: String::new(),
                    end_label: String::new(),
                };
            }
            self.error(
                line,
                format!(
                    "Unknown statements before 'start' keyword: {}",
                    skipped.join(" ")
                ),
            );
        }
        let false_branch = self.compound_statement();
        let exit_label = match self.goto_statement() {
            Statement::Goto { label } => label,
            _ => String::new(),
        };
        self.expect_semicolon();
        let end_label = self.label_name();
        self.expect_semicolon();
        Statement::If {
            condition,
            true_label,
            false_branch: Box::new(false_branch),
            exit_label,
            end_label,
        }
    }

    fn for_statement(&mut self) -> Statement {
        self.advance(); // for
        let mut var = String::new();
        if self.check(LexemeKind::Identifier) {
            var = self.text_at(self.pos);
            let line = self.line();
            self.record_identifier(&var.clone(), line, EventKind::ForStart);
            self.advance();
        } else {
            let line = self.line();
            self.error(line, "Expected identifier after 'for' statement");
        }
        if !self.accept(LexemeKind::Assign) {
            let line = self.line();
            self.error(line, "Expected ':=' after identifier");
        }
        self.expr.clear();
        let ok = self.arithmetic_expression();
        let from = mem::take(&mut self.expr);
        if ok {
            self.expressions.push((VarType::Int, from.clone()));
        }
        if !self.accept(LexemeKind::To) {
            let line = self.line();
            self.error(line, "Expected 'to' keyword after expression");
        }
        self.expr.clear();
        let ok = self.arithmetic_expression();
        let to = mem::take(&mut self.expr);
        if ok {
            self.expressions.push((VarType::Int, to.clone()));
        }
        let mut body = Vec::new();
        while !self.at_end()
            && !self.check(LexemeKind::Next)
            && !self.check(LexemeKind::Finish)
        {
            if let Some(statement) = self.statement() {
                body.push(statement);
            }
        }
        if !self.accept(LexemeKind::Next) {
            let line = self.line();
            self.error(line, "Expected 'next' keyword after loop body");
        }
        if self.check(LexemeKind::Identifier) {
            if self.text_at(self.pos) != var {
                let line = self.line();
                self.error(
                    line,
                    format!("Expected identifier {var} after 'next' statement"),
                );
            }
            let line = self.line();
            self.record_identifier(&var.clone(), line, EventKind::ForEnd);
            self.advance();
        } else {
            let line = self.line();
            self.error(line, "Expected identifier after 'next' statement");
            self.record_identifier(&var.clone(), line, EventKind::ForEnd);
        }
        Statement::For {
            var,
            from,
            to,
            body,
        }
    }

    fn expect_semicolon(&mut self) {
        if self.accept(LexemeKind::Semicolon) {
            return;
        }
        let line = self.prev_line();
        if self.at_end() {
            let text = self.text_at(self.lexemes.len().saturating_sub(1));
            self.error(line, format!("Missing ';' after statement {text}"));
        } else {
            let text = self.text_at(self.pos);
            self.error(line, format!("Missing ';' before statement {text}"));
        }
    }

    // ------------------------------------------------------------------
    // Expression grammar. Each production appends the matched tokens
    // verbatim to the accumulator and reports whether it matched.
    // ------------------------------------------------------------------

    fn arithmetic_expression(&mut self) -> bool {
        let mut ok = self.term();
        while self.check(LexemeKind::Add) || self.check(LexemeKind::Sub) {
            self.take_into_expr();
            ok &= self.term();
        }
        ok
    }

    fn term(&mut self) -> bool {
        let mut ok = self.factor();
        while self.check(LexemeKind::Mul)
            || self.check(LexemeKind::Div)
            || self.check(LexemeKind::Mod)
        {
            self.take_into_expr();
            ok &= self.factor();
        }
        ok
    }

    fn factor(&mut self) -> bool {
        match self.peek().map(|lex| lex.kind) {
            Some(LexemeKind::Identifier) => {
                let name = self.text_at(self.pos);
                let line = self.line();
                self.record_identifier(&name, line, EventKind::Used);
                self.take_into_expr();
                true
            }
            Some(LexemeKind::Number | LexemeKind::True | LexemeKind::False) => {
                self.take_into_expr();
                true
            }
            Some(LexemeKind::LParen) => {
                self.take_into_expr();
                let mut ok = self.logical_expression();
                if self.check(LexemeKind::RParen) {
                    self.take_into_expr();
                } else {
                    let line = self.line();
                    self.error(line, "Expected ')' after expression");
                    ok = false;
                }
                ok
            }
            Some(LexemeKind::StringLiteral) => {
                let line = self.line();
                self.error(line, "Unexpected string literal in expression");
                self.advance();
                false
            }
            Some(LexemeKind::Unknown) => {
                let line = self.line();
                let text = self.text_at(self.pos);
                self.error(line, format!("Unknown statement {text}"));
                self.advance();
                false
            }
            _ => {
                let line = self.line();
                self.error(line, "Expected factor");
                self.skip_non_boundary();
                false
            }
        }
    }

    /// Consumes one token unless it can start or close the enclosing
    /// production; keeps panic-mode recovery from eating statement
    /// boundaries.
    fn skip_non_boundary(&mut self) {
        let boundary = matches!(
            self.peek().map(|lex| lex.kind),
            None | Some(
                LexemeKind::Semicolon
                    | LexemeKind::RParen
                    | LexemeKind::Start
                    | LexemeKind::Finish
                    | LexemeKind::Next
                    | LexemeKind::To
            )
        );
        if !boundary {
            self.advance();
        }
    }

    fn logical_expression(&mut self) -> bool {
        let mut ok = self.logical_term();
        while self.check(LexemeKind::Or) {
            self.take_into_expr();
            ok &= self.logical_term();
        }
        ok
    }

    fn logical_term(&mut self) -> bool {
        let mut ok = self.compare();
        while self.check(LexemeKind::And) {
            self.take_into_expr();
            ok &= self.compare();
        }
        ok
    }

    fn compare(&mut self) -> bool {
        let mut ok = self.compare_operand();
        if self.check(LexemeKind::Equal) || self.check(LexemeKind::NotEqual) {
            self.take_into_expr();
            ok &= self.compare_operand();
        }
        ok
    }

    /// `["!!"] ("(" bool_expr ")" | relational)`
    fn compare_operand(&mut self) -> bool {
        if !self.check(LexemeKind::Not) {
            return self.relational();
        }
        self.take_into_expr();
        if !self.check(LexemeKind::LParen) {
            let line = self.line();
            self.error(line, "Expected '(' after '!!' operator");
            return false;
        }
        self.take_into_expr();
        let mut ok = self.logical_expression();
        if self.check(LexemeKind::RParen) {
            self.take_into_expr();
        } else {
            let line = self.line();
            self.error(line, "Expected ')' after expression");
            ok = false;
        }
        ok
    }

    fn relational(&mut self) -> bool {
        let mut ok = if self.check(LexemeKind::StringLiteral) {
            self.take_into_expr();
            true
        } else {
            self.arithmetic_expression()
        };
        if self.check(LexemeKind::Less) || self.check(LexemeKind::Greater) {
            self.take_into_expr();
            if self.check(LexemeKind::StringLiteral) {
                self.take_into_expr();
            } else {
                ok &= self.arithmetic_expression();
            }
        }
        ok
    }

    fn string_expression(&mut self) -> bool {
        let mut ok = self.string_factor();
        while self.check(LexemeKind::Add) {
            self.take_into_expr();
            ok &= self.string_factor();
        }
        ok
    }

    fn string_factor(&mut self) -> bool {
        match self.peek().map(|lex| lex.kind) {
            Some(LexemeKind::Identifier) => {
                let name = self.text_at(self.pos);
                let line = self.line();
                self.record_identifier(&name, line, EventKind::Used);
                self.take_into_expr();
                true
            }
            Some(
                LexemeKind::StringLiteral
                | LexemeKind::Number
                | LexemeKind::True
                | LexemeKind::False,
            ) => {
                self.take_into_expr();
                true
            }
            Some(LexemeKind::LParen) => {
                self.take_into_expr();
                let mut ok = self.logical_expression();
                if self.check(LexemeKind::RParen) {
                    self.take_into_expr();
                } else {
                    let line = self.line();
                    self.error(line, "Expected ')' after string expression");
                    ok = false;
                }
                ok
            }
            Some(LexemeKind::Unknown) => {
                let line = self.line();
                let text = self.text_at(self.pos);
                self.error(line, format!("Unknown statement {text}"));
                self.advance();
                false
            }
            _ => {
                let line = self.line();
                self.error(line, "Expected factor for string");
                self.skip_non_boundary();
                false
            }
        }
    }
}
