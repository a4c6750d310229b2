/// Lexer for Stoat
///
/// Source is a sequence of whitespace-separated words. Only string and
/// character literals may contain whitespace. `//` starts a comment that runs
/// to the end of the line.
use crate::ast::SourceLoc;
use crate::error::{ErrorKind, Result};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Colon,
    Semicolon,
    LeftParen,
    RightParen,
    Dashes,
    If,
    Else,
    Loop,
    Do,
    Bind,
    In,
    Struct,
    Const,
    Memory,
}

impl Keyword {
    pub fn from_word(word: &str) -> Option<Keyword> {
        let keyword = match word {
            ":" => Keyword::Colon,
            ";" => Keyword::Semicolon,
            "(" => Keyword::LeftParen,
            ")" => Keyword::RightParen,
            "--" => Keyword::Dashes,
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "loop" => Keyword::Loop,
            "do" => Keyword::Do,
            "bind" => Keyword::Bind,
            "in" => Keyword::In,
            "struct" => Keyword::Struct,
            "const" => Keyword::Const,
            "memory" => Keyword::Memory,
            _ => return None,
        };
        Some(keyword)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Colon => ":",
            Keyword::Semicolon => ";",
            Keyword::LeftParen => "(",
            Keyword::RightParen => ")",
            Keyword::Dashes => "--",
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::Loop => "loop",
            Keyword::Do => "do",
            Keyword::Bind => "bind",
            Keyword::In => "in",
            Keyword::Struct => "struct",
            Keyword::Const => "const",
            Keyword::Memory => "memory",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Int(i64),
    /// `"..."`, escapes expanded
    Str(Vec<u8>),
    /// `c"..."`, escapes expanded, without the terminator
    CStr(Vec<u8>),
    Keyword(Keyword),
    Word,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub location: SourceLoc,
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    file: Rc<str>,
}

impl Lexer {
    pub fn new(input: &str, file: impl Into<Rc<str>>) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            file: file.into(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments();
            let location = self.location();

            let Some(ch) = self.current() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    lexeme: String::new(),
                    location,
                });
                break;
            };

            let token = match (ch, self.peek_at(1)) {
                ('"', _) => {
                    self.advance();
                    let bytes = self.read_quoted('"', &location)?;
                    Token {
                        lexeme: format!("\"{}\"", String::from_utf8_lossy(&bytes)),
                        kind: TokenKind::Str(bytes),
                        location,
                    }
                }
                ('c', Some('"')) => {
                    self.advance();
                    self.advance();
                    let bytes = self.read_quoted('"', &location)?;
                    Token {
                        lexeme: format!("c\"{}\"", String::from_utf8_lossy(&bytes)),
                        kind: TokenKind::CStr(bytes),
                        location,
                    }
                }
                ('\'', _) => {
                    self.advance();
                    let bytes = self.read_quoted('\'', &location)?;
                    let &[byte] = bytes.as_slice() else {
                        return Err(ErrorKind::malformed("character literal must hold exactly one byte").at(&location));
                    };
                    Token {
                        kind: TokenKind::Int(i64::from(byte)),
                        lexeme: format!("'{}'", char::from(byte)),
                        location,
                    }
                }
                _ => {
                    let word = self.read_word();
                    let kind = classify(&word, &location)?;
                    Token {
                        kind,
                        lexeme: word,
                        location,
                    }
                }
            };

            tracing::trace!(lexeme = %token.lexeme, at = %token.location, "token");
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn location(&self) -> SourceLoc {
        SourceLoc {
            line: self.line,
            column: self.column,
            file: self.file.clone(),
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current()?;
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '/' && self.peek_at(1) == Some('/') {
                while let Some(ch) = self.advance() {
                    if ch == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                break;
            }
            word.push(ch);
            self.advance();
        }
        word
    }

    /// Read up to the closing `quote`, expanding escapes
    fn read_quoted(&mut self, quote: char, start: &SourceLoc) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        loop {
            let escape_at = self.location();
            match self.advance() {
                None => {
                    return Err(ErrorKind::malformed(format!("unterminated literal: expected closing {}", quote)).at(start));
                }
                Some(ch) if ch == quote => break,
                Some('\\') => {
                    let byte = match self.advance() {
                        Some('n') => b'\n',
                        Some('r') => b'\r',
                        Some('t') => b'\t',
                        Some('0') => 0,
                        Some('\\') => b'\\',
                        Some('"') => b'"',
                        Some('\'') => b'\'',
                        Some(other) => {
                            return Err(ErrorKind::malformed(format!("unknown escape sequence `\\{}`", other)).at(&escape_at));
                        }
                        None => {
                            return Err(ErrorKind::malformed("unterminated literal: input ends after `\\`").at(start));
                        }
                    };
                    bytes.push(byte);
                }
                Some(ch) => {
                    let mut buf = [0u8; 4];
                    bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                }
            }
        }

        if self.current().is_some_and(|ch| !ch.is_whitespace()) {
            return Err(ErrorKind::malformed("expected whitespace after literal").at(&self.location()));
        }
        Ok(bytes)
    }
}

fn looks_numeric(word: &str) -> bool {
    let digits = word.strip_prefix('-').unwrap_or(word);
    digits.starts_with(|c: char| c.is_ascii_digit())
}

fn parse_int(word: &str) -> Option<i64> {
    let (negative, digits) = match word.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, word),
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i128::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i128>().ok()?,
    };
    let value = if negative { -magnitude } else { magnitude };
    i64::try_from(value).ok()
}

fn classify(word: &str, location: &SourceLoc) -> Result<TokenKind> {
    if let Some(keyword) = Keyword::from_word(word) {
        return Ok(TokenKind::Keyword(keyword));
    }
    if looks_numeric(word) {
        return parse_int(word)
            .map(TokenKind::Int)
            .ok_or_else(|| ErrorKind::malformed(format!("invalid integer literal `{}`", word)).at(location));
    }
    Ok(TokenKind::Word)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input, "test.stoat")
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_words_and_keywords() {
        assert_eq!(
            kinds(": sq ( -- ) dup ;"),
            vec![
                TokenKind::Keyword(Keyword::Colon),
                TokenKind::Word,
                TokenKind::Keyword(Keyword::LeftParen),
                TokenKind::Keyword(Keyword::Dashes),
                TokenKind::Keyword(Keyword::RightParen),
                TokenKind::Word,
                TokenKind::Keyword(Keyword::Semicolon),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_integers() {
        assert_eq!(
            kinds("42 -7 0xff - 'A'"),
            vec![
                TokenKind::Int(42),
                TokenKind::Int(-7),
                TokenKind::Int(255),
                TokenKind::Word,
                TokenKind::Int(65),
                TokenKind::Eof,
            ]
        );
        assert_eq!(kinds("-9223372036854775808")[0], TokenKind::Int(i64::MIN));
    }

    #[test]
    fn test_invalid_integer() {
        let err = Lexer::new("1 2x", "test.stoat").tokenize().unwrap_err();
        assert_eq!(err.location, SourceLoc::new(1, 3, "test.stoat"));
        assert!(matches!(err.kind, ErrorKind::MalformedSyntax { .. }));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a b\n" c"x\0""#),
            vec![
                TokenKind::Str(b"a b\n".to_vec()),
                TokenKind::CStr(b"x\0".to_vec()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string_points_at_opening_quote() {
        let err = Lexer::new("1\n  \"oops", "test.stoat").tokenize().unwrap_err();
        assert_eq!(err.location, SourceLoc::new(2, 3, "test.stoat"));
    }

    #[test]
    fn test_unknown_escape() {
        let err = Lexer::new(r#""\q""#, "test.stoat").tokenize().unwrap_err();
        match err.kind {
            ErrorKind::MalformedSyntax { message } => assert!(message.contains("\\q")),
            other => panic!("Expected MalformedSyntax, got {:?}", other),
        }
    }

    #[test]
    fn test_comments_and_locations() {
        let tokens = Lexer::new("// header\n  dup // trailing\nswap", "test.stoat")
            .tokenize()
            .unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].lexeme, "dup");
        assert_eq!(tokens[0].location, SourceLoc::new(2, 3, "test.stoat"));
        assert_eq!(tokens[1].location, SourceLoc::new(3, 1, "test.stoat"));
    }
}
