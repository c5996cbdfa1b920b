//! Lexer for Quill
//!
//! Converts source code into a stream of tokens.

use crate::error::{ErrorKind, QuillError, Result};
use crate::token::{lookup_keyword, Span, Token, TokenKind};

/// The lexer state
pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer from source code
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire source
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }

        tokens.push(Token::new(
            TokenKind::Eof,
            Span::new(self.current_pos, self.current_pos, self.line, self.column),
            String::new(),
        ));

        Ok(tokens)
    }

    /// Get the next token
    fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace_and_comments()?;

        let Some(&(start_pos, ch)) = self.chars.peek() else {
            return Ok(None);
        };

        let start_line = self.line;
        let start_column = self.column;

        let kind = match ch {
            '(' => self.single(TokenKind::LeftParen),
            ')' => self.single(TokenKind::RightParen),
            '{' => self.single(TokenKind::LeftBrace),
            '}' => self.single(TokenKind::RightBrace),
            '[' => self.single(TokenKind::LeftBracket),
            ']' => self.single(TokenKind::RightBracket),
            ',' => self.single(TokenKind::Comma),
            ';' => self.single(TokenKind::Semicolon),
            ':' => self.single(TokenKind::Colon),
            '?' => self.single(TokenKind::Question),
            '~' => self.single(TokenKind::Tilde),
            '^' => self.single(TokenKind::Caret),

            '.' => {
                self.advance();
                if self.peek_char() == Some('.') {
                    self.advance();
                    if self.peek_char() == Some('.') {
                        self.advance();
                        TokenKind::Ellipsis
                    } else {
                        TokenKind::DotDot
                    }
                } else {
                    TokenKind::Dot
                }
            }
            '+' => self.with_equal(TokenKind::Plus, TokenKind::PlusEqual),
            '-' => self.with_equal(TokenKind::Minus, TokenKind::MinusEqual),
            '/' => self.with_equal(TokenKind::Slash, TokenKind::SlashEqual),
            '%' => self.with_equal(TokenKind::Percent, TokenKind::PercentEqual),
            '=' => self.with_equal(TokenKind::Equal, TokenKind::EqualEqual),
            '!' => self.with_equal(TokenKind::Bang, TokenKind::BangEqual),
            '*' => {
                self.advance();
                if self.peek_char() == Some('*') {
                    self.advance();
                    TokenKind::StarStar
                } else if self.peek_char() == Some('=') {
                    self.advance();
                    TokenKind::StarEqual
                } else {
                    TokenKind::Star
                }
            }
            '<' => {
                self.advance();
                match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        TokenKind::LessEqual
                    }
                    Some('<') => {
                        self.advance();
                        TokenKind::LessLess
                    }
                    _ => TokenKind::Less,
                }
            }
            '>' => {
                self.advance();
                match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        TokenKind::GreaterEqual
                    }
                    Some('>') => {
                        self.advance();
                        TokenKind::GreaterGreater
                    }
                    _ => TokenKind::Greater,
                }
            }
            '&' => {
                self.advance();
                if self.peek_char() == Some('&') {
                    self.advance();
                    TokenKind::AndAnd
                } else {
                    TokenKind::Amp
                }
            }
            '|' => {
                self.advance();
                if self.peek_char() == Some('|') {
                    self.advance();
                    TokenKind::OrOr
                } else {
                    TokenKind::Pipe
                }
            }

            '"' => self.scan_string()?,

            c if c.is_ascii_digit() => self.scan_number()?,

            c if c.is_alphabetic() || c == '_' => self.scan_identifier(),

            _ => {
                self.advance();
                return Err(QuillError::new(
                    ErrorKind::UnexpectedCharacter(ch),
                    Some(Span::new(start_pos, self.current_pos, start_line, start_column)),
                ));
            }
        };

        let lexeme = self.source[start_pos..self.current_pos].to_string();

        Ok(Some(Token::new(
            kind,
            Span::new(start_pos, self.current_pos, start_line, start_column),
            lexeme,
        )))
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    /// One-character operator that becomes `compound` when followed by `=`
    fn with_equal(&mut self, plain: TokenKind, compound: TokenKind) -> TokenKind {
        self.advance();
        if self.peek_char() == Some('=') {
            self.advance();
            compound
        } else {
            plain
        }
    }

    /// Advance and return the current character
    fn advance(&mut self) -> Option<char> {
        let (pos, ch) = self.chars.next()?;
        self.current_pos = pos + ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    /// Peek at the next character without advancing
    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, ch)| ch)
    }

    /// Peek `n` characters past the next one
    fn peek_nth(&self, n: usize) -> Option<char> {
        self.source[self.current_pos..].chars().nth(n)
    }

    /// Skip whitespace and comments
    fn skip_whitespace_and_comments(&mut self) -> Result<()> {
        while let Some(&(_, ch)) = self.chars.peek() {
            match ch {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }

                '/' if self.source[self.current_pos..].starts_with("//") => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }

                '/' if self.source[self.current_pos..].starts_with("/*") => {
                    let span = Span::new(self.current_pos, self.current_pos + 2, self.line, self.column);
                    self.advance();
                    self.advance();
                    loop {
                        if self.source[self.current_pos..].starts_with("*/") {
                            self.advance();
                            self.advance();
                            break;
                        }
                        if self.advance().is_none() {
                            return Err(QuillError::at(ErrorKind::UnterminatedComment, span));
                        }
                    }
                }

                _ => break,
            }
        }
        Ok(())
    }

    /// Scan a string literal
    fn scan_string(&mut self) -> Result<TokenKind> {
        let start_line = self.line;
        let start_column = self.column;
        let start_pos = self.current_pos;

        // Opening quote
        self.advance();

        let mut value = String::new();

        loop {
            match self.peek_char() {
                Some('"') => {
                    self.advance();
                    return Ok(TokenKind::String(value));
                }
                Some('\\') => {
                    self.advance();
                    match self.advance() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some('0') => value.push('\0'),
                        Some(c) => value.push(c),
                        None => break,
                    }
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
                None => break,
            }
        }

        Err(QuillError::new(
            ErrorKind::UnterminatedString,
            Some(Span::new(start_pos, self.current_pos, start_line, start_column)),
        ))
    }

    fn consume_digits(&mut self, radix: u32) {
        while let Some(c) = self.peek_char() {
            if c.is_digit(radix) || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Scan a number literal, including the `u` and `n` suffixes
    fn scan_number(&mut self) -> Result<TokenKind> {
        let start = self.current_pos;
        let span = Span::new(start, start, self.line, self.column);
        let invalid = |text: &str| QuillError::at(ErrorKind::InvalidNumber(text.to_string()), span);

        if self.source[start..].starts_with("0x") || self.source[start..].starts_with("0X") {
            self.advance();
            self.advance();
            self.consume_digits(16);
            let text = &self.source[start..self.current_pos];
            let digits = text[2..].replace('_', "");
            return i64::from_str_radix(&digits, 16)
                .map(TokenKind::Int)
                .map_err(|_| invalid(text));
        }

        self.consume_digits(10);

        let mut is_float = false;

        // A '.' only belongs to the number when a digit follows, so `1..3` stays a range
        if self.peek_char() == Some('.') && self.peek_nth(1).map_or(false, |c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            self.consume_digits(10);
        }

        if matches!(self.peek_char(), Some('e' | 'E')) {
            let sign_len = usize::from(matches!(self.peek_nth(1), Some('+' | '-')));
            if self.peek_nth(1 + sign_len).map_or(false, |c| c.is_ascii_digit()) {
                is_float = true;
                self.advance();
                if sign_len == 1 {
                    self.advance();
                }
                self.consume_digits(10);
            }
        }

        let digits = self.source[start..self.current_pos].replace('_', "");

        let suffix = self
            .peek_char()
            .filter(|c| matches!(c, 'u' | 'n'))
            .filter(|_| !self.peek_nth(1).map_or(false, |c| c.is_alphanumeric() || c == '_'));

        match suffix {
            Some('n') => {
                self.advance();
                if is_float {
                    Ok(TokenKind::BigFloat(digits))
                } else {
                    Ok(TokenKind::BigInt(digits))
                }
            }
            Some(_) if !is_float => {
                self.advance();
                digits.parse::<u64>().map(TokenKind::UInt).map_err(|_| invalid(&digits))
            }
            _ if is_float => digits.parse::<f64>().map(TokenKind::Float).map_err(|_| invalid(&digits)),
            // Literals too wide for i64 become big integers instead of failing
            _ => Ok(digits
                .parse::<i64>()
                .map(TokenKind::Int)
                .unwrap_or(TokenKind::BigInt(digits))),
        }
    }

    /// Scan an identifier or keyword
    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.current_pos;

        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let text = &self.source[start..self.current_pos];

        lookup_keyword(text).unwrap_or_else(|| TokenKind::Ident(text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        lexer
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .filter(|k| !matches!(k, TokenKind::Eof))
            .collect()
    }

    #[test]
    fn test_keywords() {
        let tokens = tokenize("var fun return if else while foreach in");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Var,
                TokenKind::Fun,
                TokenKind::Return,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::While,
                TokenKind::Foreach,
                TokenKind::In,
            ]
        );
    }

    #[test]
    fn test_operators() {
        let tokens = tokenize("+ - * ** / = == != < <= > >= << >> && || += .. ...");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::StarStar,
                TokenKind::Slash,
                TokenKind::Equal,
                TokenKind::EqualEqual,
                TokenKind::BangEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::LessLess,
                TokenKind::GreaterGreater,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::PlusEqual,
                TokenKind::DotDot,
                TokenKind::Ellipsis,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens = tokenize("42 3.14 0 7u 12n 1.5n 1e3 0xff");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Int(42),
                TokenKind::Float(3.14),
                TokenKind::Int(0),
                TokenKind::UInt(7),
                TokenKind::BigInt("12".to_string()),
                TokenKind::BigFloat("1.5".to_string()),
                TokenKind::Float(1000.0),
                TokenKind::Int(255),
            ]
        );
    }

    #[test]
    fn test_wide_integer_literal_becomes_bigint() {
        let tokens = tokenize("123456789012345678901234567890");
        assert_eq!(tokens, vec![TokenKind::BigInt("123456789012345678901234567890".to_string())]);
    }

    #[test]
    fn test_range_is_not_a_float() {
        let tokens = tokenize("1..3");
        assert_eq!(tokens, vec![TokenKind::Int(1), TokenKind::DotDot, TokenKind::Int(3)]);
    }

    #[test]
    fn test_strings() {
        let tokens = tokenize(r#""hello" "a\"b\n""#);
        assert_eq!(
            tokens,
            vec![
                TokenKind::String("hello".to_string()),
                TokenKind::String("a\"b\n".to_string()),
            ]
        );
    }

    #[test]
    fn test_comments_and_lines() {
        let mut lexer = Lexer::new("// first\n/* block\n comment */ x");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Ident("x".to_string()));
        assert_eq!(tokens[0].span.line, 3);
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("\"open");
        let err = lexer.tokenize().unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnterminatedString);
    }
}
