pub mod api;

use raybridge_common::error::BridgeError;
use raybridge_common::span::Span;
use raybridge_common::types::{CType, ScalarKind};
use raybridge_lexer::{tokenize, SpannedToken, Token};

pub use api::ApiDescription;

pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            tokens: tokenize(source),
            pos: 0,
        }
    }

    pub fn current(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    pub fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    pub fn advance(&mut self) -> &SpannedToken {
        let tok = &self.tokens[self.pos];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.current() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>, span: Span) -> BridgeError {
        BridgeError::TypeSyntax {
            message: message.into(),
            input: self.source.to_string(),
            span,
        }
    }

    fn skip_qualifiers(&mut self) {
        while matches!(self.current(), Token::Const | Token::Volatile) {
            self.advance();
        }
    }

    /// type := qualifier* base ('*' | qualifier)* ('[' NUMBER ']')*
    pub fn parse_type(&mut self) -> Result<CType, BridgeError> {
        self.skip_qualifiers();
        let mut ty = self.parse_base()?;

        loop {
            match self.current() {
                Token::Star => {
                    self.advance();
                    ty = CType::Pointer(Box::new(ty));
                }
                Token::Const | Token::Volatile => {
                    self.advance();
                }
                _ => break,
            }
        }

        let mut dims = Vec::new();
        while self.current() == &Token::LBracket {
            let open = self.advance().span;
            let len = match self.current().clone() {
                Token::Number(n) => {
                    self.advance();
                    n
                }
                other => {
                    return Err(self.error(
                        format!("expected array length, found '{other}'"),
                        self.current_span().merge(open),
                    ));
                }
            };
            if !self.eat(&Token::RBracket) {
                return Err(self.error(
                    format!("expected ']', found '{}'", self.current()),
                    self.current_span(),
                ));
            }
            dims.push(len);
        }
        for len in dims.into_iter().rev() {
            ty = CType::Array(Box::new(ty), len);
        }

        if self.current() != &Token::Eof {
            return Err(self.error(
                format!("unexpected '{}' after type", self.current()),
                self.current_span(),
            ));
        }
        Ok(ty)
    }

    fn parse_base(&mut self) -> Result<CType, BridgeError> {
        let unsigned = match self.current() {
            Token::Unsigned => {
                self.advance();
                Some(true)
            }
            Token::Signed => {
                self.advance();
                Some(false)
            }
            _ => None,
        };
        self.skip_qualifiers();

        let pick = |signed: ScalarKind, unsigned_kind: ScalarKind| {
            CType::Scalar(if unsigned == Some(true) { unsigned_kind } else { signed })
        };

        let ty = match self.current().clone() {
            Token::Char => {
                self.advance();
                pick(ScalarKind::I8, ScalarKind::U8)
            }
            Token::Short => {
                self.advance();
                self.eat(&Token::Int);
                pick(ScalarKind::I16, ScalarKind::U16)
            }
            Token::Int => {
                self.advance();
                pick(ScalarKind::I32, ScalarKind::U32)
            }
            Token::Long => {
                self.advance();
                let wide = self.eat(&Token::Long);
                self.eat(&Token::Int);
                if wide {
                    pick(ScalarKind::I64, ScalarKind::U64)
                } else {
                    pick(ScalarKind::I32, ScalarKind::U32)
                }
            }
            // A bare `unsigned` or `signed` means int; `unsigned float` then
            // fails on the trailing token.
            _ if unsigned.is_some() => pick(ScalarKind::I32, ScalarKind::U32),
            Token::Float => {
                self.advance();
                CType::Scalar(ScalarKind::F32)
            }
            Token::Double => {
                self.advance();
                CType::Scalar(ScalarKind::F64)
            }
            Token::Bool => {
                self.advance();
                CType::Scalar(ScalarKind::Bool)
            }
            Token::Void => {
                self.advance();
                CType::Void
            }
            Token::Struct => {
                self.advance();
                match self.current().clone() {
                    Token::Ident(name) => {
                        self.advance();
                        CType::Named(name)
                    }
                    other => {
                        return Err(self.error(
                            format!("expected struct name, found '{other}'"),
                            self.current_span(),
                        ));
                    }
                }
            }
            Token::Ident(name) => {
                self.advance();
                CType::Named(name)
            }
            other => {
                return Err(self.error(
                    format!("expected a type, found '{other}'"),
                    self.current_span(),
                ));
            }
        };

        Ok(ty)
    }
}

/// Parse one C type string such as `const char *` or `float[4]`.
pub fn parse_ctype(source: &str) -> Result<CType, BridgeError> {
    Parser::new(source).parse_type()
}
