//! Lexical scanner.
//!
//! Produces the full token stream for a file up front, with automatic
//! semicolon insertion at line breaks following a terminating token, and
//! collects comments into a side list ordered by position. Comments never
//! appear in the token stream; the parser attaches doc and trailing comment
//! groups from the side list by position.

use crate::{
    ParseError,
    ast::Comment,
    pos::{Pos, Span},
    token::{Token, TokenKind},
};

/// Scans `src` into a token stream terminated by a single `Eof` token, plus
/// the position-ordered comment list.
pub fn scan(src: &str) -> Result<(Vec<Token>, Vec<Comment>), ParseError> {
    let mut scanner = Scanner::new(src);
    scanner.run()?;
    Ok((scanner.tokens, scanner.comments))
}

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    offset: usize,
    tokens: Vec<Token>,
    comments: Vec<Comment>,
    /// Kind of the last emitted token, for semicolon insertion.
    last: Option<TokenKind>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            offset: 0,
            tokens: Vec::new(),
            comments: Vec::new(),
            last: None,
        }
    }

    fn run(&mut self) -> Result<(), ParseError> {
        while self.offset < self.bytes.len() {
            let b = self.bytes[self.offset];
            match b {
                b' ' | b'\t' | b'\r' => {
                    self.offset += 1;
                }
                b'\n' => {
                    self.insert_semicolon_at(self.offset);
                    self.offset += 1;
                }
                b'/' if self.peek(1) == Some(b'/') => self.line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.block_comment()?,
                _ => self.token(b)?,
            }
        }
        // A final line without a trailing newline still terminates.
        self.insert_semicolon_at(self.offset);
        let end = Pos::from_usize(self.offset);
        self.emit(TokenKind::Eof, Span::new(end, end));
        Ok(())
    }

    fn peek(&self, n: usize) -> Option<u8> {
        self.bytes.get(self.offset + n).copied()
    }

    fn emit(&mut self, kind: TokenKind, span: Span) {
        self.last = Some(kind);
        self.tokens.push(Token { kind, span });
    }

    /// Emits an automatic semicolon at `at` when the previous token ends a
    /// statement. The span is empty: nothing in the source spells it.
    fn insert_semicolon_at(&mut self, at: usize) {
        if self.last.is_some_and(TokenKind::terminates_line) {
            let pos = Pos::from_usize(at);
            self.emit(TokenKind::Semicolon, Span::new(pos, pos));
        }
    }

    fn line_comment(&mut self) {
        let start = self.offset;
        while self.offset < self.bytes.len() && self.bytes[self.offset] != b'\n' {
            self.offset += 1;
        }
        self.comments.push(Comment {
            span: Span::new(Pos::from_usize(start), Pos::from_usize(self.offset)),
            text: self.src[start..self.offset].to_owned(),
        });
        // The newline itself is handled by the main loop and may insert a
        // semicolon for the code preceding the comment.
    }

    fn block_comment(&mut self) -> Result<(), ParseError> {
        let start = self.offset;
        self.offset += 2;
        let mut crossed_newline = false;
        loop {
            if self.offset + 1 >= self.bytes.len() {
                return Err(ParseError::syntax(
                    "unterminated block comment",
                    Span::new(Pos::from_usize(start), Pos::from_usize(self.bytes.len())),
                ));
            }
            if self.bytes[self.offset] == b'\n' {
                crossed_newline = true;
            }
            if self.bytes[self.offset] == b'*' && self.bytes[self.offset + 1] == b'/' {
                self.offset += 2;
                break;
            }
            self.offset += 1;
        }
        self.comments.push(Comment {
            span: Span::new(Pos::from_usize(start), Pos::from_usize(self.offset)),
            text: self.src[start..self.offset].to_owned(),
        });
        if crossed_newline {
            self.insert_semicolon_at(start);
        }
        Ok(())
    }

    fn token(&mut self, b: u8) -> Result<(), ParseError> {
        let start = self.offset;
        if b == b'_' || b.is_ascii_alphabetic() || b >= 0x80 {
            return self.ident_or_keyword(start);
        }
        if b.is_ascii_digit() {
            return self.number(start);
        }
        match b {
            b'"' => self.interpreted_string(start),
            b'`' => self.raw_string(start),
            b'\'' => self.rune(start),
            b'.' if self.peek(1).is_some_and(|c| c.is_ascii_digit()) => self.number(start),
            _ => self.operator(start),
        }
    }

    fn ident_or_keyword(&mut self, start: usize) -> Result<(), ParseError> {
        while self.offset < self.bytes.len() {
            let b = self.bytes[self.offset];
            if b == b'_' || b.is_ascii_alphanumeric() || b >= 0x80 {
                self.offset += 1;
            } else {
                break;
            }
        }
        let word = &self.src[start..self.offset];
        let span = Span::new(Pos::from_usize(start), Pos::from_usize(self.offset));
        match TokenKind::keyword(word) {
            Some(kind) => self.emit(kind, span),
            None => self.emit(TokenKind::Ident, span),
        }
        Ok(())
    }

    fn number(&mut self, start: usize) -> Result<(), ParseError> {
        let mut kind = TokenKind::Int;
        if self.bytes[start] == b'0'
            && matches!(self.peek(1), Some(b'x' | b'X' | b'o' | b'O' | b'b' | b'B'))
        {
            self.offset += 2;
            while self
                .peek(0)
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
            {
                self.offset += 1;
            }
        } else {
            while self.peek(0).is_some_and(|c| c.is_ascii_digit() || c == b'_') {
                self.offset += 1;
            }
            if self.peek(0) == Some(b'.') && self.peek(1) != Some(b'.') {
                kind = TokenKind::Float;
                self.offset += 1;
                while self.peek(0).is_some_and(|c| c.is_ascii_digit() || c == b'_') {
                    self.offset += 1;
                }
            }
            if matches!(self.peek(0), Some(b'e' | b'E')) {
                kind = TokenKind::Float;
                self.offset += 1;
                if matches!(self.peek(0), Some(b'+' | b'-')) {
                    self.offset += 1;
                }
                while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                    self.offset += 1;
                }
            }
        }
        if self.peek(0) == Some(b'i') {
            kind = TokenKind::Imag;
            self.offset += 1;
        }
        let span = Span::new(Pos::from_usize(start), Pos::from_usize(self.offset));
        self.emit(kind, span);
        Ok(())
    }

    fn interpreted_string(&mut self, start: usize) -> Result<(), ParseError> {
        self.offset += 1;
        loop {
            match self.peek(0) {
                None | Some(b'\n') => {
                    return Err(ParseError::syntax(
                        "unterminated string literal",
                        Span::new(Pos::from_usize(start), Pos::from_usize(self.offset)),
                    ));
                }
                Some(b'\\') => self.offset += 2,
                Some(b'"') => {
                    self.offset += 1;
                    break;
                }
                Some(_) => self.offset += 1,
            }
        }
        let span = Span::new(Pos::from_usize(start), Pos::from_usize(self.offset));
        self.emit(TokenKind::Str, span);
        Ok(())
    }

    fn raw_string(&mut self, start: usize) -> Result<(), ParseError> {
        self.offset += 1;
        loop {
            match self.peek(0) {
                None => {
                    return Err(ParseError::syntax(
                        "unterminated raw string literal",
                        Span::new(Pos::from_usize(start), Pos::from_usize(self.offset)),
                    ));
                }
                Some(b'`') => {
                    self.offset += 1;
                    break;
                }
                Some(_) => self.offset += 1,
            }
        }
        let span = Span::new(Pos::from_usize(start), Pos::from_usize(self.offset));
        self.emit(TokenKind::Str, span);
        Ok(())
    }

    fn rune(&mut self, start: usize) -> Result<(), ParseError> {
        self.offset += 1;
        loop {
            match self.peek(0) {
                None | Some(b'\n') => {
                    return Err(ParseError::syntax(
                        "unterminated rune literal",
                        Span::new(Pos::from_usize(start), Pos::from_usize(self.offset)),
                    ));
                }
                Some(b'\\') => self.offset += 2,
                Some(b'\'') => {
                    self.offset += 1;
                    break;
                }
                Some(_) => self.offset += 1,
            }
        }
        let span = Span::new(Pos::from_usize(start), Pos::from_usize(self.offset));
        self.emit(TokenKind::Rune, span);
        Ok(())
    }

    fn operator(&mut self, start: usize) -> Result<(), ParseError> {
        use TokenKind as T;
        let rest = &self.bytes[start..];
        // Maximal munch: longest operators first.
        const TABLE: &[(&[u8], TokenKind)] = &[
            (b"<<=", T::ShlAssign),
            (b">>=", T::ShrAssign),
            (b"&^=", T::AmpCaretAssign),
            (b"...", T::Ellipsis),
            (b"+=", T::PlusAssign),
            (b"-=", T::MinusAssign),
            (b"*=", T::StarAssign),
            (b"/=", T::SlashAssign),
            (b"%=", T::PercentAssign),
            (b"&=", T::AmpAssign),
            (b"|=", T::PipeAssign),
            (b"^=", T::CaretAssign),
            (b"&&", T::AndAnd),
            (b"||", T::OrOr),
            (b"<-", T::Arrow),
            (b"++", T::Inc),
            (b"--", T::Dec),
            (b"==", T::EqEq),
            (b"!=", T::NotEq),
            (b"<=", T::LtEq),
            (b">=", T::GtEq),
            (b":=", T::Define),
            (b"<<", T::Shl),
            (b">>", T::Shr),
            (b"&^", T::AmpCaret),
            (b"+", T::Plus),
            (b"-", T::Minus),
            (b"*", T::Star),
            (b"/", T::Slash),
            (b"%", T::Percent),
            (b"&", T::Amp),
            (b"|", T::Pipe),
            (b"^", T::Caret),
            (b"<", T::Lt),
            (b">", T::Gt),
            (b"=", T::Assign),
            (b"!", T::Not),
            (b"(", T::LParen),
            (b"[", T::LBracket),
            (b"{", T::LBrace),
            (b",", T::Comma),
            (b".", T::Dot),
            (b")", T::RParen),
            (b"]", T::RBracket),
            (b"}", T::RBrace),
            (b";", T::Semicolon),
            (b":", T::Colon),
        ];
        for &(text, kind) in TABLE {
            if rest.starts_with(text) {
                self.offset += text.len();
                let span = Span::new(Pos::from_usize(start), Pos::from_usize(self.offset));
                self.emit(kind, span);
                return Ok(());
            }
        }
        Err(ParseError::syntax(
            format!("unexpected character {:?}", self.src[start..].chars().next().unwrap_or('?')),
            Span::new(Pos::from_usize(start), Pos::from_usize(start + 1)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let (tokens, _) = scan(src).expect("scan failed");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_short_declaration() {
        use TokenKind as T;
        assert_eq!(
            kinds("x := 1\n"),
            vec![T::Ident, T::Define, T::Int, T::Semicolon, T::Eof]
        );
    }

    #[test]
    fn semicolon_insertion_after_rbrace_only_when_terminating() {
        use TokenKind as T;
        assert_eq!(
            kinds("if x {\n\ty++\n}\n"),
            vec![
                T::If,
                T::Ident,
                T::LBrace,
                T::Ident,
                T::Inc,
                T::Semicolon,
                T::RBrace,
                T::Semicolon,
                T::Eof
            ]
        );
        // No semicolon after `{` or binary operators.
        assert_eq!(kinds("x +\n1"), vec![T::Ident, T::Plus, T::Int, T::Semicolon, T::Eof]);
    }

    #[test]
    fn comments_are_collected_not_tokenized() {
        let (tokens, comments) = scan("x // trailing\n// next line\ny").expect("scan failed");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident,
                TokenKind::Semicolon,
                TokenKind::Ident,
                TokenKind::Semicolon,
                TokenKind::Eof
            ]
        );
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].text, "// trailing");
        assert_eq!(comments[1].text, "// next line");
    }

    #[test]
    fn scans_operators_with_maximal_munch() {
        use TokenKind as T;
        assert_eq!(kinds("a <<= 2"), vec![T::Ident, T::ShlAssign, T::Int, T::Semicolon, T::Eof]);
        assert_eq!(kinds("a &^ b"), vec![T::Ident, T::AmpCaret, T::Ident, T::Semicolon, T::Eof]);
        assert_eq!(kinds("<-ch"), vec![T::Arrow, T::Ident, T::Semicolon, T::Eof]);
    }

    #[test]
    fn scans_literals() {
        use TokenKind as T;
        assert_eq!(
            kinds(r#"0x1f 1.5 2i 'a' "s" `raw`"#),
            vec![T::Int, T::Float, T::Imag, T::Rune, T::Str, T::Str, T::Semicolon, T::Eof]
        );
    }

    #[test]
    fn block_comment_with_newline_terminates_statement() {
        let (tokens, _) = scan("x /* spans\nlines */ y").expect("scan failed");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident,
                TokenKind::Semicolon,
                TokenKind::Ident,
                TokenKind::Semicolon,
                TokenKind::Eof
            ]
        );
    }
}
