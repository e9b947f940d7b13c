use crate::errors::RuleError;

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Double(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    In,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Question,
    Colon,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            Self::Int(value) => value.to_string(),
            Self::Double(value) => value.to_string(),
            Self::Str(value) => format!("{value:?}"),
            Self::Ident(name) => name.clone(),
            Self::True => "true".to_string(),
            Self::False => "false".to_string(),
            Self::Null => "null".to_string(),
            Self::In => "in".to_string(),
            Self::LParen => "(".to_string(),
            Self::RParen => ")".to_string(),
            Self::LBracket => "[".to_string(),
            Self::RBracket => "]".to_string(),
            Self::Comma => ",".to_string(),
            Self::Dot => ".".to_string(),
            Self::Question => "?".to_string(),
            Self::Colon => ":".to_string(),
            Self::Bang => "!".to_string(),
            Self::Plus => "+".to_string(),
            Self::Minus => "-".to_string(),
            Self::Star => "*".to_string(),
            Self::Slash => "/".to_string(),
            Self::Percent => "%".to_string(),
            Self::AndAnd => "&&".to_string(),
            Self::OrOr => "||".to_string(),
            Self::EqEq => "==".to_string(),
            Self::NotEq => "!=".to_string(),
            Self::Lt => "<".to_string(),
            Self::Le => "<=".to_string(),
            Self::Gt => ">".to_string(),
            Self::Ge => ">=".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset into the rule text.
    pub position: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, RuleError> {
    let mut lexer = Lexer { source, chars: source.char_indices().peekable(), tokens: Vec::new() };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn run(&mut self) -> Result<(), RuleError> {
        while let Some(&(position, ch)) = self.chars.peek() {
            if ch.is_whitespace() {
                self.chars.next();
                continue;
            }

            let kind = match ch {
                '0'..='9' => self.number(position)?,
                '"' | '\'' => self.string(position, ch)?,
                c if c == '_' || c.is_ascii_alphabetic() => self.word(position),
                _ => self.symbol(position, ch)?,
            };
            self.tokens.push(Token { kind, position });
        }
        Ok(())
    }

    fn number(&mut self, start: usize) -> Result<TokenKind, RuleError> {
        let mut end = start;
        let mut is_double = false;

        while let Some(&(index, ch)) = self.chars.peek() {
            if ch.is_ascii_digit() {
                end = index + 1;
                self.chars.next();
            } else if ch == '.' && !is_double && self.digit_follows(index + 1) {
                is_double = true;
                end = index + 1;
                self.chars.next();
            } else {
                break;
            }
        }

        let text = &self.source[start..end];
        if is_double {
            text.parse::<f64>()
                .map(TokenKind::Double)
                .map_err(|_| parse_error(start, format!("invalid number `{text}`")))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| parse_error(start, format!("integer `{text}` is out of range")))
        }
    }

    fn digit_follows(&self, offset: usize) -> bool {
        self.source[offset..].chars().next().is_some_and(|ch| ch.is_ascii_digit())
    }

    fn string(&mut self, start: usize, quote: char) -> Result<TokenKind, RuleError> {
        self.chars.next();
        let mut value = String::new();

        loop {
            let Some((index, ch)) = self.chars.next() else {
                return Err(parse_error(start, "unterminated string literal"));
            };
            match ch {
                c if c == quote => return Ok(TokenKind::Str(value)),
                '\\' => {
                    let Some((_, escaped)) = self.chars.next() else {
                        return Err(parse_error(index, "unterminated escape sequence"));
                    };
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '\\' | '"' | '\'' => escaped,
                        other => {
                            return Err(parse_error(index, format!("unknown escape `\\{other}`")))
                        }
                    });
                }
                c => value.push(c),
            }
        }
    }

    fn word(&mut self, start: usize) -> TokenKind {
        let mut end = start;
        while let Some(&(index, ch)) = self.chars.peek() {
            if ch == '_' || ch.is_ascii_alphanumeric() {
                end = index + ch.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }

        match &self.source[start..end] {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "in" => TokenKind::In,
            other => TokenKind::Ident(other.to_string()),
        }
    }

    fn symbol(&mut self, position: usize, ch: char) -> Result<TokenKind, RuleError> {
        self.chars.next();
        let next = self.chars.peek().map(|&(_, next)| next);

        let (kind, pair) = match (ch, next) {
            ('&', Some('&')) => (TokenKind::AndAnd, true),
            ('|', Some('|')) => (TokenKind::OrOr, true),
            ('=', Some('=')) => (TokenKind::EqEq, true),
            ('!', Some('=')) => (TokenKind::NotEq, true),
            ('<', Some('=')) => (TokenKind::Le, true),
            ('>', Some('=')) => (TokenKind::Ge, true),
            ('!', _) => (TokenKind::Bang, false),
            ('<', _) => (TokenKind::Lt, false),
            ('>', _) => (TokenKind::Gt, false),
            ('(', _) => (TokenKind::LParen, false),
            (')', _) => (TokenKind::RParen, false),
            ('[', _) => (TokenKind::LBracket, false),
            (']', _) => (TokenKind::RBracket, false),
            (',', _) => (TokenKind::Comma, false),
            ('.', _) => (TokenKind::Dot, false),
            ('?', _) => (TokenKind::Question, false),
            (':', _) => (TokenKind::Colon, false),
            ('+', _) => (TokenKind::Plus, false),
            ('-', _) => (TokenKind::Minus, false),
            ('*', _) => (TokenKind::Star, false),
            ('/', _) => (TokenKind::Slash, false),
            ('%', _) => (TokenKind::Percent, false),
            ('=', _) => return Err(parse_error(position, "single `=` is not an operator; use `==`")),
            _ => return Err(parse_error(position, format!("unexpected character `{ch}`"))),
        };

        if pair {
            self.chars.next();
        }
        Ok(kind)
    }
}

pub(crate) fn parse_error(position: usize, message: impl Into<String>) -> RuleError {
    RuleError::Parse { position, message: message.into() }
}
