//! Character-class state machine that splits raw source text into
//! `(text, line)` token candidates.
//!
//! The scanner is a lazy, single-pass iterator; classification of the
//! candidates happens separately (and concurrently, see
//! [`crate::lexer`]). Lines are 1-based and a token carries the line
//! it started on.

use crate::diagnostic::Diagnostic;

/// Scanner states. `Finish` and `EndOfFile` are resume points: the
/// iterator yields a token while in `Finish` and terminates once it
/// reaches `EndOfFile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Letter,
    Digit,
    Separator,
    Another,
    StringBody,
    CommentStart,
    Comment,
    Finish,
    EndOfFile,
}

/// A raw token candidate paired with the 1-based line it started on.
pub type Candidate = (String, u32);

pub struct Scanner<'src> {
    bytes: &'src [u8],
    index: usize,
    line: u32,
    state: State,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Scanner<'src> {
    pub fn new(source: &'src str) -> Self {
        Scanner {
            bytes: source.as_bytes(),
            index: 0,
            line: 1,
            state: State::Start,
            diagnostics: Vec::new(),
        }
    }

    /// Diagnostics recorded while scanning (unterminated strings).
    /// Complete only after the iterator is exhausted.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.index += 1;
        Some(ch)
    }

    fn lex_letter(&mut self) -> Candidate {
        let start = self.index;
        let line = self.line;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == b'_' {
                self.index += 1;
            } else {
                break;
            }
        }
        (self.text_from(start), line)
    }

    fn lex_digit(&mut self) -> Candidate {
        let start = self.index;
        let line = self.line;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                self.index += 1;
            } else {
                break;
            }
        }
        (self.text_from(start), line)
    }

    /// Reads a string verbatim, quotes included. Embedded escapes are
    /// kept as literal characters; only the next double quote closes
    /// the string.
    fn lex_string(&mut self) -> Option<Candidate> {
        let start = self.index;
        let line = self.line;
        self.index += 1; // opening quote
        while let Some(ch) = self.bump() {
            if ch == b'"' {
                return Some((self.text_from(start), line));
            }
        }
        // The source ran out before the closing quote.
        self.diagnostics.push(Diagnostic::syntax(
            line,
            "unexpected end of file in string literal",
        ));
        self.state = State::EndOfFile;
        None
    }

    /// Operators and stray punctuation. Two-character operators are
    /// matched greedily before falling back to a single character.
    fn lex_another(&mut self) -> Candidate {
        let start = self.index;
        let line = self.line;
        let ch = self.bytes[self.index];
        self.index += 1;
        let two = matches!(
            (ch, self.peek()),
            (b':', Some(b'='))
                | (b'<', Some(b'>'))
                | (b'&', Some(b'&'))
                | (b'|', Some(b'|'))
                | (b'!', Some(b'!'))
        );
        if two {
            self.index += 1;
        }
        (self.text_from(start), line)
    }

    fn text_from(&self, start: usize) -> String {
        String::from_utf8_lossy(&self.bytes[start..self.index]).into_owned()
    }
}

impl Iterator for Scanner<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            match self.state {
                State::Start => {
                    let Some(ch) = self.peek() else {
                        self.state = State::EndOfFile;
                        continue;
                    };
                    self.state = if ch.is_ascii_alphabetic() {
                        State::Letter
                    } else if ch.is_ascii_digit() {
                        State::Digit
                    } else if ch == b' ' || ch == b'\t' || ch == b'\n' || ch == b'\r' {
                        State::Separator
                    } else if ch == b'$' {
                        State::CommentStart
                    } else {
                        State::Another
                    };
                }
                State::Letter => {
                    let token = self.lex_letter();
                    self.state = State::Finish;
                    return Some(token);
                }
                State::Digit => {
                    let token = self.lex_digit();
                    self.state = State::Finish;
                    return Some(token);
                }
                State::Separator => {
                    if self.bump() == Some(b'\n') {
                        self.line += 1;
                    }
                    self.state = State::Start;
                }
                State::CommentStart => {
                    let line = self.line;
                    self.index += 1; // '$'
                    if self.peek() == Some(b'$') {
                        self.index += 1;
                        self.state = State::Comment;
                    } else {
                        // A lone '$' is a token of its own.
                        self.state = State::Finish;
                        return Some(("$".to_string(), line));
                    }
                }
                State::Comment => {
                    // Line comment: consumed to end of line. Running
                    // out of input here simply ends the comment.
                    loop {
                        match self.bump() {
                            Some(b'\n') => {
                                self.line += 1;
                                self.state = State::Start;
                                break;
                            }
                            Some(_) => {}
                            None => {
                                self.state = State::EndOfFile;
                                break;
                            }
                        }
                    }
                }
                State::Another => {
                    if self.peek() == Some(b'"') {
                        self.state = State::StringBody;
                        continue;
                    }
                    let token = self.lex_another();
                    self.state = State::Finish;
                    return Some(token);
                }
                State::StringBody => {
                    match self.lex_string() {
                        Some(token) => {
                            self.state = State::Finish;
                            return Some(token);
                        }
                        // lex_string already moved to EndOfFile.
                        None => continue,
                    }
                }
                State::Finish => {
                    self.state = if self.peek().is_some() {
                        State::Start
                    } else {
                        State::EndOfFile
                    };
                }
                State::EndOfFile => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> (Vec<Candidate>, Vec<Diagnostic>) {
        let mut scanner = Scanner::new(source);
        let tokens: Vec<_> = scanner.by_ref().collect();
        (tokens, scanner.into_diagnostics())
    }

    #[test]
    fn splits_words_digits_and_operators() {
        let (tokens, diags) = scan("abc := 12+x;");
        let texts: Vec<&str> = tokens.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(texts, ["abc", ":=", "12", "+", "x", ";"]);
        assert!(diags.is_empty());
    }

    #[test]
    fn tracks_lines_across_newlines() {
        let (tokens, _) = scan("a\nb\n\nc");
        let lines: Vec<u32> = tokens.iter().map(|(_, l)| *l).collect();
        assert_eq!(lines, [1, 2, 4]);
    }

    #[test]
    fn greedy_two_character_operators() {
        let (tokens, _) = scan("a<>b && c || !!d :=");
        let texts: Vec<&str> = tokens.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(texts, ["a", "<>", "b", "&&", "c", "||", "!!", "d", ":="]);
    }

    #[test]
    fn double_dollar_comment_runs_to_end_of_line() {
        let (tokens, diags) = scan("a $$ comment text\nb");
        let texts: Vec<&str> = tokens.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(texts, ["a", "b"]);
        assert_eq!(tokens[1].1, 2);
        assert!(diags.is_empty());
    }

    #[test]
    fn lone_dollar_is_a_token() {
        let (tokens, _) = scan("a $ b");
        let texts: Vec<&str> = tokens.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(texts, ["a", "$", "b"]);
    }

    #[test]
    fn strings_keep_quotes_and_raw_escapes() {
        let (tokens, _) = scan(r#"put("a\nb")"#);
        let texts: Vec<&str> = tokens.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(texts, ["put", "(", r#""a\nb""#, ")"]);
    }

    #[test]
    fn unterminated_string_is_a_terminal_error() {
        let (tokens, diags) = scan("x := \"oops");
        let texts: Vec<&str> = tokens.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(texts, ["x", ":="]);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("unexpected end of file"));
    }

    #[test]
    fn comment_at_end_of_file_is_not_an_error() {
        let (tokens, diags) = scan("a $$ trailing");
        assert_eq!(tokens.len(), 1);
        assert!(diags.is_empty());
    }
}
