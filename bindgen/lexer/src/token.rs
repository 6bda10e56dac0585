use logos::Logos;
use raybridge_common::span::Span;

/// Raw token produced by logos before keyword classification.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"/\*([^*]|\*[^/])*\*/")]
pub enum RawToken {
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<u32>().ok())]
    Int(u32),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[token("*")]
    Star,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
}

/// Classified token with C keywords resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Qualifiers
    Const,
    Volatile,
    Signed,
    Unsigned,
    Struct,

    // Base types
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
    Bool,

    /// A struct, alias or typedef name such as `Color` or `Texture2D`.
    Ident(String),
    Number(u32),

    Star,
    LBracket,
    RBracket,

    Eof,
    Error,
}

impl Token {
    /// True for the tokens that can start or continue a base type.
    pub fn is_base_type(&self) -> bool {
        matches!(
            self,
            Token::Char
                | Token::Short
                | Token::Int
                | Token::Long
                | Token::Float
                | Token::Double
                | Token::Void
                | Token::Bool
        )
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Const => write!(f, "const"),
            Token::Volatile => write!(f, "volatile"),
            Token::Signed => write!(f, "signed"),
            Token::Unsigned => write!(f, "unsigned"),
            Token::Struct => write!(f, "struct"),
            Token::Char => write!(f, "char"),
            Token::Short => write!(f, "short"),
            Token::Int => write!(f, "int"),
            Token::Long => write!(f, "long"),
            Token::Float => write!(f, "float"),
            Token::Double => write!(f, "double"),
            Token::Void => write!(f, "void"),
            Token::Bool => write!(f, "bool"),
            Token::Ident(s) => write!(f, "{s}"),
            Token::Number(n) => write!(f, "{n}"),
            Token::Star => write!(f, "*"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Eof => write!(f, "end of type"),
            Token::Error => write!(f, "<error>"),
        }
    }
}

/// A token with its byte span in the type string.
#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

fn classify_ident(s: String) -> Token {
    match s.as_str() {
        "const" => Token::Const,
        "volatile" => Token::Volatile,
        "signed" => Token::Signed,
        "unsigned" => Token::Unsigned,
        "struct" => Token::Struct,
        "char" => Token::Char,
        "short" => Token::Short,
        "int" => Token::Int,
        "long" => Token::Long,
        "float" => Token::Float,
        "double" => Token::Double,
        "void" => Token::Void,
        "bool" | "_Bool" => Token::Bool,
        _ => Token::Ident(s),
    }
}

/// Tokenize a C type string. Always ends with [`Token::Eof`].
pub fn tokenize(source: &str) -> Vec<SpannedToken> {
    let mut tokens = Vec::new();
    let lexer = RawToken::lexer(source);

    for (result, range) in lexer.spanned() {
        let span = Span::from(range);
        let token = match result {
            Ok(raw) => match raw {
                RawToken::Int(v) => Token::Number(v),
                RawToken::Ident(s) => classify_ident(s),
                RawToken::Star => Token::Star,
                RawToken::LBracket => Token::LBracket,
                RawToken::RBracket => Token::RBracket,
            },
            Err(()) => Token::Error,
        };
        tokens.push(SpannedToken { token, span });
    }

    tokens.push(SpannedToken {
        token: Token::Eof,
        span: Span::new(source.len(), source.len()),
    });

    tokens
}
