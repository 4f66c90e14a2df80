//! Type expressions used in unit manifests.
//!
//! ```text
//! type    := 'reified'? IDENT ':' type      bounded type parameter
//!          | 'reified' IDENT                unconstrained reified parameter
//!          | atom '?'*
//! atom    := IDENT ('<' type (',' type)* '>')?
//!          | '(' type ')'
//! ```
//!
//! `Int32`, `String?`, `List<Name>`, `Array<T>`, `T : Name`, `(T : Name)?`.

use std::fmt;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeExpr {
    Named { name: String, args: Vec<TypeExpr> },
    Parameter {
        name: String,
        bound: Option<Box<TypeExpr>>,
        reified: bool,
    },
    Nullable(Box<TypeExpr>),
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn nullable(self) -> Self {
        match self {
            already @ Self::Nullable(_) => already,
            inner => Self::Nullable(Box::new(inner)),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named { name, args } => {
                f.write_str(name)?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(">")?;
                }
                Ok(())
            }
            Self::Parameter {
                name,
                bound,
                reified,
            } => {
                if *reified {
                    f.write_str("reified ")?;
                }
                f.write_str(name)?;
                match bound {
                    Some(bound) => write!(f, " : {bound}"),
                    None => Ok(()),
                }
            }
            Self::Nullable(inner) => match **inner {
                Self::Parameter { bound: Some(_), .. } => write!(f, "({inner})?"),
                _ => write!(f, "{inner}?"),
            },
        }
    }
}

/// A type expression that failed to parse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeExprError {
    pub input: String,
    /// Byte offset of the offending token.
    pub position: usize,
    pub message: String,
}

impl fmt::Display for TypeExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid type expression '{}' at {}: {}",
            self.input, self.position, self.message
        )
    }
}

impl std::error::Error for TypeExprError {}

impl FromStr for TypeExpr {
    type Err = TypeExprError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser::new(input);
        let expr = parser.parse_type()?;
        match parser.next() {
            None => Ok(expr),
            Some(token) => Err(parser.error(token.position, format!("unexpected '{}'", token.text))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenKind {
    Ident,
    Punct(char),
}

#[derive(Clone, Copy, Debug)]
struct Token<'s> {
    kind: TokenKind,
    text: &'s str,
    position: usize,
}

struct Parser<'s> {
    input: &'s str,
    tokens: Vec<Token<'s>>,
    cursor: usize,
    lex_error: Option<usize>,
}

impl<'s> Parser<'s> {
    fn new(input: &'s str) -> Self {
        let mut tokens = Vec::new();
        let mut lex_error = None;
        let mut chars = input.char_indices().peekable();
        while let Some(&(start, ch)) = chars.peek() {
            if ch.is_whitespace() {
                chars.next();
            } else if ch.is_ascii_alphabetic() || ch == '_' {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                        end = i + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    kind: TokenKind::Ident,
                    text: &input[start..end],
                    position: start,
                });
            } else if matches!(ch, '<' | '>' | ',' | '?' | ':' | '(' | ')') {
                chars.next();
                tokens.push(Token {
                    kind: TokenKind::Punct(ch),
                    text: &input[start..start + 1],
                    position: start,
                });
            } else {
                lex_error = Some(start);
                break;
            }
        }
        Self {
            input,
            tokens,
            cursor: 0,
            lex_error,
        }
    }

    fn error(&self, position: usize, message: impl Into<String>) -> TypeExprError {
        TypeExprError {
            input: self.input.to_string(),
            position,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<Token<'s>> {
        self.tokens.get(self.cursor).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<Token<'s>> {
        self.tokens.get(self.cursor + offset).copied()
    }

    fn next(&mut self) -> Option<Token<'s>> {
        let token = self.peek()?;
        self.cursor += 1;
        Some(token)
    }

    fn eat(&mut self, punct: char) -> bool {
        if self.peek().is_some_and(|t| t.kind == TokenKind::Punct(punct)) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: char) -> Result<(), TypeExprError> {
        if self.eat(punct) {
            return Ok(());
        }
        let position = self.peek().map_or(self.input.len(), |t| t.position);
        Err(self.error(position, format!("expected '{punct}'")))
    }

    fn ident(&mut self) -> Result<&'s str, TypeExprError> {
        match self.next() {
            Some(Token {
                kind: TokenKind::Ident,
                text,
                ..
            }) => Ok(text),
            Some(token) => Err(self.error(token.position, format!("expected a name, found '{}'", token.text))),
            None => Err(self.error(self.input.len(), "expected a name")),
        }
    }

    fn parse_type(&mut self) -> Result<TypeExpr, TypeExprError> {
        if let Some(position) = self.lex_error
            && self.cursor == 0
        {
            return Err(self.error(position, "unexpected character"));
        }

        let reified = self.peek().is_some_and(|t| t.kind == TokenKind::Ident && t.text == "reified")
            && self.peek_at(1).is_some_and(|t| t.kind == TokenKind::Ident);
        if reified {
            self.cursor += 1;
        }

        let is_bounded = self.peek().is_some_and(|t| t.kind == TokenKind::Ident)
            && self.peek_at(1).is_some_and(|t| t.kind == TokenKind::Punct(':'));
        if is_bounded {
            let name = self.ident()?.to_string();
            self.expect(':')?;
            let bound = self.parse_type()?;
            return Ok(TypeExpr::Parameter {
                name,
                bound: Some(Box::new(bound)),
                reified,
            });
        }
        if reified {
            let name = self.ident()?.to_string();
            return Ok(self.parse_suffix(TypeExpr::Parameter {
                name,
                bound: None,
                reified: true,
            }));
        }

        let atom = self.parse_atom()?;
        Ok(self.parse_suffix(atom))
    }

    fn parse_suffix(&mut self, mut expr: TypeExpr) -> TypeExpr {
        while self.eat('?') {
            expr = expr.nullable();
        }
        expr
    }

    fn parse_atom(&mut self) -> Result<TypeExpr, TypeExprError> {
        if self.eat('(') {
            let inner = self.parse_type()?;
            self.expect(')')?;
            return Ok(inner);
        }
        let name = self.ident()?.to_string();
        let mut args = Vec::new();
        if self.eat('<') {
            loop {
                args.push(self.parse_type()?);
                if self.eat(',') {
                    continue;
                }
                self.expect('>')?;
                break;
            }
        }
        Ok(TypeExpr::Named { name, args })
    }
}
