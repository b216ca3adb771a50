//! Lexical tokenizer for command tags.
//!
//! A finite-state machine over four states and nine character classes.
//! The tokenizer only segments text: quoted literals keep their quotes and
//! their escape characters, and no token is interpreted.

use crate::error::{SneaqlError, SneaqlResult};

/// Classification of a single tag character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Whitespace,
    Escape,
    Word,
    Colon,
    SingleQuote,
    OpenBrace,
    CloseBrace,
    Operator,
    NonWord,
}

/// Tokenizer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerState {
    OutsideWord,
    InWord,
    InStringLiteral,
    InStringLiteralEscape,
}

/// Action taken for a (class, state) pair, applied in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    NoAction,
    NewToken,
    Concat,
    Error,
    Transition(TokenizerState),
}

use Action::{Concat, Error, NewToken, NoAction, Transition};
use TokenizerState::{InStringLiteral, InStringLiteralEscape, InWord, OutsideWord};

/// The transition table. Total over every class and state.
pub fn actions(class: CharClass, state: TokenizerState) -> &'static [Action] {
    match (class, state) {
        (CharClass::Whitespace, OutsideWord) => &[NoAction],
        (CharClass::Whitespace, InWord) => &[Transition(OutsideWord)],
        (CharClass::Whitespace, InStringLiteral) => &[Concat],
        (CharClass::Whitespace, InStringLiteralEscape) => &[Concat, Transition(InStringLiteral)],

        (CharClass::Escape, OutsideWord) => &[Error],
        (CharClass::Escape, InWord) => &[Error],
        (CharClass::Escape, InStringLiteral) => &[Concat, Transition(InStringLiteralEscape)],
        (CharClass::Escape, InStringLiteralEscape) => &[Concat, Transition(InStringLiteral)],

        (CharClass::SingleQuote, OutsideWord) => &[NewToken, Concat, Transition(InStringLiteral)],
        (CharClass::SingleQuote, InWord) => &[Error],
        (CharClass::SingleQuote, InStringLiteral) => &[Concat, Transition(OutsideWord)],
        (CharClass::SingleQuote, InStringLiteralEscape) => &[Concat, Transition(InStringLiteral)],

        (CharClass::OpenBrace, OutsideWord) => &[NewToken, Concat, Transition(InWord)],
        (CharClass::OpenBrace, InWord) => &[Error],
        (CharClass::OpenBrace, InStringLiteral) => &[Concat],
        (CharClass::OpenBrace, InStringLiteralEscape) => &[Concat, Transition(InStringLiteral)],

        (CharClass::CloseBrace, OutsideWord) => &[Error],
        (CharClass::CloseBrace, InWord) => &[Concat],
        (CharClass::CloseBrace, InStringLiteral) => &[Concat],
        (CharClass::CloseBrace, InStringLiteralEscape) => &[Concat, Transition(InStringLiteral)],

        // word, colon, operator and other non-word characters share one row
        (_, OutsideWord) => &[NewToken, Concat, Transition(InWord)],
        (_, InWord) => &[Concat],
        (_, InStringLiteral) => &[Concat],
        (_, InStringLiteralEscape) => &[Concat, Transition(InStringLiteral)],
    }
}

/// Splits command tags into tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tokenizer;

impl Tokenizer {
    pub fn new() -> Self {
        Self
    }

    /// Classify a single character.
    pub fn classify(&self, c: char) -> CharClass {
        match c {
            c if c.is_whitespace() => CharClass::Whitespace,
            '\\' => CharClass::Escape,
            c if c.is_ascii_alphanumeric() || c == '_' => CharClass::Word,
            ':' => CharClass::Colon,
            '\'' => CharClass::SingleQuote,
            '{' => CharClass::OpenBrace,
            '}' => CharClass::CloseBrace,
            '=' | '>' | '<' | '!' => CharClass::Operator,
            _ => CharClass::NonWord,
        }
    }

    /// Classify every character of `text`.
    pub fn classify_all(&self, text: &str) -> Vec<CharClass> {
        text.chars().map(|c| self.classify(c)).collect()
    }

    /// Split `text` into tokens, left to right.
    pub fn tokenize(&self, text: &str) -> SneaqlResult<Vec<String>> {
        let mut state = OutsideWord;
        let mut tokens = Vec::new();
        let mut current = String::new();

        for (position, c) in text.chars().enumerate() {
            for action in actions(self.classify(c), state) {
                match *action {
                    NoAction => {}
                    NewToken => {
                        if !current.is_empty() {
                            tokens.push(std::mem::take(&mut current));
                        }
                    }
                    Concat => current.push(c),
                    Error => {
                        return Err(SneaqlError::Tokenization {
                            position,
                            message: format!("unexpected character '{}' in {:?}", c, state),
                        })
                    }
                    Transition(next) => state = next,
                }
            }
        }

        if matches!(state, InStringLiteral | InStringLiteralEscape) {
            return Err(SneaqlError::Tokenization {
                position: text.chars().count(),
                message: "unterminated string literal".to_string(),
            });
        }

        if !current.is_empty() {
            tokens.push(current);
        }

        Ok(tokens)
    }
}
