//! Concurrent composition of the scanner and the classifier.
//!
//! The scanner runs on its own thread as the sole producer into an
//! unbounded FIFO channel; the classifier consumes on the calling
//! thread. The channel keeps classification order equal to production
//! order, the producer never blocks on the consumer, and the consumer
//! drains until the channel disconnects so no token is dropped.

use crossbeam_channel::unbounded;

use crate::classifier::Classifier;
use crate::diagnostic::Diagnostic;
use crate::scanner::Scanner;
use crate::token::{Lexeme, Literal, UnknownLexeme};

/// Result of lexing a source file.
#[derive(Debug)]
pub struct LexResult {
    pub lexemes: Vec<Lexeme>,
    pub literals: Vec<Literal>,
    pub unknowns: Vec<UnknownLexeme>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Scans and classifies `source` into a lexeme stream plus the
/// literal and unknown side tables.
pub fn tokenize(source: &str) -> LexResult {
    let (sender, receiver) = unbounded();

    std::thread::scope(|scope| {
        let producer = scope.spawn(move || {
            let mut scanner = Scanner::new(source);
            for candidate in scanner.by_ref() {
                // The consumer outlives the producer; a send can only
                // fail if the receiver was dropped on panic.
                if sender.send(candidate).is_err() {
                    break;
                }
            }
            scanner.into_diagnostics()
        });

        let mut classifier = Classifier::new();
        for (text, line) in receiver {
            classifier.classify(&text, line);
        }

        let diagnostics = producer.join().expect("scanner thread panicked");
        let (lexemes, literals, unknowns) = classifier.finish();
        LexResult {
            lexemes,
            literals,
            unknowns,
            diagnostics,
        }
    })
}
