//! Lexical analysis (tokenizer).
use std::str::{CharIndices, FromStr};

use itertools::{multipeek, MultiPeek};
use smol_str::SmolStr;

use pl0::error::{Diagnostic, Phase};

use crate::tokens::{Keyword, Token, TokenKind};

/// Lexical analyzer.
///
/// Produces a finite token sequence terminated by [`TokenKind::Eof`].
/// Malformed input never stops the scan: the offending characters are
/// reported as diagnostics and skipped, and scanning resumes at the next
/// character.
pub struct Lexer<'a> {
    source: SourceText<'a>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Lexer<'a> {
    pub fn new(source_code: &'a str) -> Self {
        Self {
            source: SourceText::new(source_code),
            diagnostics: vec![],
        }
    }

    /// Scan the whole source up front.
    ///
    /// The returned sequence always ends with an `Eof` token, so the parser
    /// can peek without running off the end.
    pub fn tokenize(source_code: &'a str) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut lexer = Lexer::new(source_code);
        let mut tokens = vec![];

        loop {
            let token = lexer.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }

        (tokens, lexer.diagnostics)
    }

    /// Scan the source characters and construct the next token.
    ///
    /// Whitespace, comments and erroneous characters are consumed here so
    /// that callers only ever see well-formed tokens.
    pub fn next_token(&mut self) -> Token {
        use TokenKind as T;

        while let Some(c) = self.source.next_char() {
            let line = self.source.line();

            let kind = match c {
                ' ' | '\t' | '\r' | '\n' => continue,
                '+' => T::Plus,
                '-' => T::Minus,
                '*' => T::Star,
                '/' => T::Slash,
                '=' => T::Eq,
                ',' => T::Comma,
                ';' => T::Semicolon,
                '.' => T::Period,
                ')' => T::RParen,
                '(' => {
                    if self.source.eat_char('*') {
                        self.consume_comment(line);
                        continue;
                    }
                    T::LParen
                }
                ':' => {
                    if self.source.eat_char('=') {
                        T::Assign
                    } else {
                        self.error(line, "stray ':', the assignment operator is ':='");
                        continue;
                    }
                }
                '<' => {
                    if self.source.eat_char('=') {
                        T::Le
                    } else if self.source.eat_char('>') {
                        T::Ne
                    } else {
                        T::Lt
                    }
                }
                '>' => {
                    if self.source.eat_char('=') {
                        T::Ge
                    } else {
                        T::Gt
                    }
                }
                '0'..='9' => match self.consume_number(c) {
                    Some(kind) => kind,
                    None => continue,
                },
                'a'..='z' | 'A'..='Z' => self.consume_ident(c),
                _ => {
                    self.error(line, format!("unknown character '{}'", c));
                    continue;
                }
            };

            return Token::new(kind, line);
        }

        Token::new(T::Eof, self.source.line())
    }

    fn error(&mut self, line: u32, message: impl ToString) {
        self.diagnostics
            .push(Diagnostic::error(Phase::Lexical, line, message));
    }

    /// Consume a `(* … *)` comment; the opening delimiter is already gone.
    ///
    /// Comments nest, so the delimiters are counted rather than matched to
    /// the first closer.
    fn consume_comment(&mut self, start_line: u32) {
        let mut depth = 1usize;

        loop {
            match self.source.next_char() {
                None => {
                    self.error(start_line, "unterminated comment");
                    return;
                }
                Some('(') => {
                    if self.source.eat_char('*') {
                        depth += 1;
                    }
                }
                Some('*') => {
                    if self.source.eat_char(')') {
                        depth -= 1;
                        if depth == 0 {
                            return;
                        }
                    }
                }
                Some(_) => {}
            }
        }
    }

    /// Consume a maximal run of digits.
    ///
    /// Returns `None` when the literal does not fit the machine's integer
    /// type; the run is still consumed so scanning resumes after it.
    fn consume_number(&mut self, first: char) -> Option<TokenKind> {
        let line = self.source.line();
        let mut text = String::new();
        text.push(first);

        while let Some(c @ '0'..='9') = self.source.peek_char() {
            self.source.next_char();
            text.push(c);
        }

        match text.parse::<i64>() {
            Ok(value) => Some(TokenKind::Number(value)),
            Err(_) => {
                self.error(line, format!("integer literal '{}' is too large", text));
                None
            }
        }
    }

    fn consume_ident(&mut self, first: char) -> TokenKind {
        let mut text = String::new();
        text.push(first);

        while let Some(c) = self.source.peek_char() {
            match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' => {
                    self.source.next_char();
                    text.push(c);
                }
                _ => break,
            }
        }

        // Reserved words match regardless of case; the original spelling of
        // a user identifier is kept.
        match Keyword::from_str(&text.to_ascii_lowercase()) {
            Ok(keyword) => TokenKind::Keyword(keyword),
            Err(_) => TokenKind::Ident(SmolStr::new(text)),
        }
    }
}

/// Wrapper for source code that keeps a cursor position.
///
/// The `MultiPeek` wrapper buffers the variable-width UTF-8 decoding so the
/// scanner can look one character ahead without re-indexing the string.
struct SourceText<'a> {
    source: MultiPeek<CharIndices<'a>>,
    /// Line of the most recently consumed character, counted from 1.
    line: u32,
}

impl<'a> SourceText<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source: multipeek(source.char_indices()),
            line: 1,
        }
    }

    fn line(&self) -> u32 {
        self.line
    }

    /// Advance the cursor and return the next character.
    fn next_char(&mut self) -> Option<char> {
        match self.source.next() {
            Some((_, c)) => {
                if c == '\n' {
                    self.line += 1;
                }
                Some(c)
            }
            None => None,
        }
    }

    /// The next character without consuming it.
    fn peek_char(&mut self) -> Option<char> {
        self.source.reset_peek();
        self.source.peek().map(|(_, c)| *c)
    }

    /// Consume the next character if it matches.
    fn eat_char(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.next_char();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tokens::TokenKind as T;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, diagnostics) = Lexer::tokenize(source);
        assert!(diagnostics.is_empty(), "unexpected: {:?}", diagnostics);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert_eq!(
            kinds("BEGIN Begin begin"),
            vec![
                T::Keyword(Keyword::Begin),
                T::Keyword(Keyword::Begin),
                T::Keyword(Keyword::Begin),
                T::Eof
            ]
        );
    }

    #[test]
    fn test_identifier_spelling_preserved() {
        assert_eq!(
            kinds("Counter counter"),
            vec![
                T::Ident(SmolStr::new("Counter")),
                T::Ident(SmolStr::new("counter")),
                T::Eof
            ]
        );
    }

    #[test]
    fn test_two_char_operators_are_maximal() {
        assert_eq!(kinds("<="), vec![T::Le, T::Eof]);
        assert_eq!(kinds("< ="), vec![T::Lt, T::Eq, T::Eof]);
        assert_eq!(kinds("<>"), vec![T::Ne, T::Eof]);
        assert_eq!(kinds(":="), vec![T::Assign, T::Eof]);
        assert_eq!(kinds(">="), vec![T::Ge, T::Eof]);
        // `<==` is `<=` followed by `=`.
        assert_eq!(kinds("<=="), vec![T::Le, T::Eq, T::Eof]);
    }

    #[test]
    fn test_lone_colon_is_an_error() {
        let (tokens, diagnostics) = Lexer::tokenize("x : y");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].phase, Phase::Lexical);
        // The colon is skipped; scanning resumes with `y`.
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_nested_comment() {
        assert_eq!(
            kinds("a (* outer (* inner *) still outer *) b"),
            vec![
                T::Ident(SmolStr::new("a")),
                T::Ident(SmolStr::new("b")),
                T::Eof
            ]
        );
    }

    #[test]
    fn test_unterminated_comment() {
        let (tokens, diagnostics) = Lexer::tokenize("a (* no close\nmore");
        assert_eq!(tokens.last().map(|t| t.kind.clone()), Some(T::Eof));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, 1);
        assert!(diagnostics[0].message.contains("unterminated"));
    }

    #[test]
    fn test_integer_overflow() {
        let (tokens, diagnostics) = Lexer::tokenize("99999999999999999999999");
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("too large"));
        assert_eq!(tokens.len(), 1); // only Eof
    }

    #[test]
    fn test_line_numbers() {
        let (tokens, _) = Lexer::tokenize("a\nb\n\nc");
        let lines: Vec<u32> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![1, 2, 4, 4]);
    }
}
