//! C++ translation-unit emission.
//!
//! The emitter is a pure tree walk over checked statements: same AST
//! and literal table in, same text out. Expression tokens are replayed
//! in their original order; only `+` changes meaning in string
//! context, where top-level concatenation becomes stream insertion.

use std::collections::BTreeMap;

use crate::ast::Statement;
use crate::token::{Lexeme, LexemeKind, Literal, VarType};

const HEADER: &str = "#include <iostream>\n\
                      #include <string>\n\
                      #include <sstream>\n\n\
                      int main()";

/// Renders a full translation unit for an error-free program.
pub fn emit(statements: &[Statement], literals: &[Literal]) -> String {
    let mut writer = Writer {
        literals,
        out: String::from(HEADER),
    };
    writer.statements(statements, &BTreeMap::new());
    writer.out
}

struct Writer<'a> {
    literals: &'a [Literal],
    out: String,
}

impl Writer<'_> {
    fn statements(&mut self, list: &[Statement], scope: &BTreeMap<String, VarType>) {
        for statement in list {
            self.statement(statement, scope);
        }
    }

    fn statement(&mut self, statement: &Statement, scope: &BTreeMap<String, VarType>) {
        match statement {
            Statement::Compound { vars, body } => self.compound(vars, body, scope),
            Statement::Assign { target, value } => self.assign(target, value, scope),
            Statement::Input { target } => {
                self.out.push_str("std::cin >> ");
                self.out.push_str(target);
                self.out.push_str(";\n");
            }
            Statement::Output { value } => {
                self.out.push_str("std::cout");
                self.str_expression(value);
                self.out.push_str(" << std::endl;\n");
            }
            Statement::Goto { label } => {
                self.out.push_str("goto ");
                self.out.push_str(label);
                self.out.push_str(";\n");
            }
            Statement::Label { name } => self.label(name),
            Statement::If {
                condition,
                true_label,
                false_branch,
                exit_label,
                end_label,
            } => {
                self.out.push_str("if (");
                self.expression(condition);
                self.out.push_str(") goto ");
                self.out.push_str(true_label);
                self.out.push_str(";\n");
                self.statement(false_branch, scope);
                self.out.push_str("goto ");
                self.out.push_str(exit_label);
                self.out.push_str(";\n");
                self.label(end_label);
            }
            Statement::For {
                var,
                from,
                to,
                body,
            } => self.for_loop(var, from, to, body, scope),
        }
    }

    /// Labels end in a null statement so one may legally close a
    /// block.
    fn label(&mut self, name: &str) {
        self.out.push_str(name);
        self.out.push_str(":;\n");
    }

    fn compound(
        &mut self,
        vars: &[(String, VarType)],
        body: &[Statement],
        scope: &BTreeMap<String, VarType>,
    ) {
        let mut inner = scope.clone();
        self.out.push_str("{\n");
        for (name, ty) in vars {
            match ty {
                VarType::Int => {
                    self.out.push_str("int16_t ");
                    self.out.push_str(name);
                    self.out.push_str(";\n");
                }
                VarType::Bool => {
                    self.out.push_str("bool ");
                    self.out.push_str(name);
                    self.out.push_str(";\n");
                }
                VarType::String => {
                    // Strings are backed by a stringstream so that
                    // concatenation assignments stay insertions.
                    self.out.push_str("std::stringstream ");
                    self.out.push_str(name);
                    self.out.push_str("_ss;\n");
                    self.out.push_str("std::string ");
                    self.out.push_str(name);
                    self.out.push_str(";\n");
                }
            }
            inner.insert(name.clone(), *ty);
        }
        self.statements(body, &inner);
        self.out.push_str("}\n");
    }

    fn assign(&mut self, target: &str, value: &[Lexeme], scope: &BTreeMap<String, VarType>) {
        match scope.get(target) {
            Some(VarType::String) => {
                self.out.push_str(target);
                self.out.push_str("_ss");
                self.str_expression(value);
                self.out.push_str(";\n");
                self.out.push_str(target);
                self.out.push_str(" = ");
                self.out.push_str(target);
                self.out.push_str("_ss.str();\n");
                self.out.push_str(target);
                self.out.push_str("_ss.str(\"\");\n");
                self.out.push_str(target);
                self.out.push_str("_ss.clear();\n");
            }
            _ => {
                self.out.push_str(target);
                self.out.push_str(" = ");
                self.expression(value);
                self.out.push_str(";\n");
            }
        }
    }

    fn for_loop(
        &mut self,
        var: &str,
        from: &[Lexeme],
        to: &[Lexeme],
        body: &[Statement],
        scope: &BTreeMap<String, VarType>,
    ) {
        self.out.push_str("for (");
        if !scope.contains_key(var) {
            self.out.push_str("int16_t ");
        }
        self.out.push_str(var);
        self.out.push('=');
        self.expression(from);
        self.out.push_str("; ");
        self.out.push_str(var);
        self.out.push('<');
        self.expression(to);
        self.out.push_str("; ");
        self.out.push_str(var);
        self.out.push_str("++) ");
        let mut inner = scope.clone();
        inner.insert(var.to_string(), VarType::Int);
        self.out.push_str("{\n");
        self.statements(body, &inner);
        self.out.push_str("}\n");
    }

    /// Arithmetic and boolean context: every token maps to one C++
    /// token, no spacing.
    fn expression(&mut self, tokens: &[Lexeme]) {
        for lexeme in tokens {
            let symbol = self.symbol(lexeme);
            self.out.push_str(&symbol);
        }
    }

    /// String context. Operands at nesting depth zero are separate
    /// stream insertions, so top-level `+` disappears; inside
    /// parentheses the tokens replay verbatim.
    fn str_expression(&mut self, tokens: &[Lexeme]) {
        let mut depth = 0i32;
        for lexeme in tokens {
            match lexeme.kind {
                LexemeKind::LParen => {
                    if depth == 0 {
                        self.out.push_str("<< ");
                    }
                    depth += 1;
                    self.out.push('(');
                }
                LexemeKind::RParen => {
                    depth -= 1;
                    self.out.push(')');
                }
                LexemeKind::Number
                | LexemeKind::Identifier
                | LexemeKind::StringLiteral
                | LexemeKind::True
                | LexemeKind::False => {
                    if depth == 0 {
                        self.out.push_str("<< ");
                    }
                    let symbol = self.symbol(lexeme);
                    self.out.push_str(&symbol);
                }
                LexemeKind::Add => {
                    if depth > 0 {
                        self.out.push('+');
                    }
                }
                _ => {
                    let symbol = self.symbol(lexeme);
                    self.out.push_str(&symbol);
                }
            }
        }
    }

    fn symbol(&self, lexeme: &Lexeme) -> String {
        match lexeme.kind {
            LexemeKind::LParen => "(".to_string(),
            LexemeKind::RParen => ")".to_string(),
            LexemeKind::Number => lexeme
                .number
                .map_or_else(|| lexeme.text.clone(), |value| value.to_string()),
            LexemeKind::Identifier => lexeme.text.clone(),
            LexemeKind::StringLiteral => lexeme
                .table_id
                .and_then(|id| self.literals.get(id as usize - 1))
                .map_or_else(String::new, |literal| literal.raw_text.clone()),
            LexemeKind::True => "true".to_string(),
            LexemeKind::False => "false".to_string(),
            LexemeKind::Add => "+".to_string(),
            LexemeKind::Sub => "-".to_string(),
            LexemeKind::Mul => "*".to_string(),
            LexemeKind::Div => "/".to_string(),
            LexemeKind::Mod => "%".to_string(),
            LexemeKind::And => "&&".to_string(),
            LexemeKind::Or => "||".to_string(),
            LexemeKind::Not => "!".to_string(),
            LexemeKind::Equal => "==".to_string(),
            LexemeKind::NotEqual => "!=".to_string(),
            LexemeKind::Less => "<".to_string(),
            LexemeKind::Greater => ">".to_string(),
            _ => String::new(),
        }
    }
}
