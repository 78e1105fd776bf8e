use chrono_tz::Tz;

use super::lexer::{self, Token};
use super::Type;
use crate::{Error, Result, Value};

/// Parses a full type descriptor. Every failure maps to
/// [`Error::UnknownType`] carrying the original descriptor.
pub fn parse_type_descriptor(descriptor: &str) -> Result<Type> {
    let tokens = lexer::tokens(descriptor);
    let mut stream = TokenStream {
        tokens: &tokens,
        pos: 0,
    };
    let parsed = stream
        .parse_type()
        .ok_or_else(|| Error::UnknownType(descriptor.to_string()))?;
    if !stream.at_end() {
        return Err(Error::UnknownType(descriptor.to_string()));
    }
    parsed
        .validate()
        .map_err(|_| Error::UnknownType(descriptor.to_string()))?;
    Ok(parsed)
}

/// Lexes a single text-quoted literal into an untyped [`Value`]: a quoted
/// string, an optionally negative integer, a decimal, or `NULL`.
pub fn parse_untyped_literal(raw: &str) -> Result<Value> {
    let tokens = lexer::tokens(raw);
    let value = match &tokens[..] {
        [Token::StringLiteral(s)] => Value::String(lexer::unquote(s).into_bytes()),
        [Token::Number(n)] => n
            .parse::<u64>()
            .map(|v| {
                if v <= i64::MAX as u64 {
                    Value::Int64(v as i64)
                } else {
                    Value::UInt64(v)
                }
            })
            .map_err(|_| Error::DomainError(format!("integer literal '{n}' out of range")))?,
        [Token::Minus, Token::Number(n)] => {
            let magnitude = n
                .parse::<i64>()
                .map_err(|_| Error::DomainError(format!("integer literal '-{n}' out of range")))?;
            Value::Int64(-magnitude)
        }
        [Token::Decimal(d)] => Value::Float64(
            d.parse::<f64>()
                .map_err(|_| Error::DomainError(format!("float literal '{d}' out of range")))?,
        ),
        [Token::Minus, Token::Decimal(d)] => Value::Float64(
            -d.parse::<f64>()
                .map_err(|_| Error::DomainError(format!("float literal '-{d}' out of range")))?,
        ),
        [Token::Identifier(word)] if word.eq_ignore_ascii_case("null") => Value::Null,
        [Token::Identifier(word)] if word.eq_ignore_ascii_case("true") => Value::UInt8(1),
        [Token::Identifier(word)] if word.eq_ignore_ascii_case("false") => Value::UInt8(0),
        _ => {
            return Err(Error::TypeMismatch(format!(
                "'{raw}' is not a single literal"
            )))
        }
    };
    Ok(value)
}

struct TokenStream<'a, 'b> {
    tokens: &'b [Token<'a>],
    pos: usize,
}

impl<'a> TokenStream<'a, '_> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }

    fn eat(&mut self, expected: Token<'a>) -> Option<()> {
        (self.next()? == expected).then_some(())
    }

    fn at_end(&self) -> bool {
        self.pos == self.tokens.len()
    }

    // Returns None on any syntax error; the caller owns the descriptor string
    // for the error message.
    fn parse_type(&mut self) -> Option<Type> {
        let ident = match self.next()? {
            Token::Identifier(ident) => ident,
            _ => return None,
        };
        if self.peek() != Some(Token::OpeningRoundBracket) {
            return scalar_by_name(ident);
        }
        self.eat(Token::OpeningRoundBracket)?;
        let parsed = match ident {
            "FixedString" => {
                let n = self.number()?;
                if n <= 0 {
                    return None;
                }
                Type::FixedString(n as usize)
            }
            "DateTime" => {
                let tz = match self.next()? {
                    Token::StringLiteral(s) => lexer::unquote(s).parse::<Tz>().ok()?,
                    _ => return None,
                };
                Type::DateTime(tz)
            }
            "Enum8" => Type::Enum8(self.enum_entries::<i8>()?),
            "Enum16" => Type::Enum16(self.enum_entries::<i16>()?),
            "Array" => Type::Array(Box::new(self.parse_type()?)),
            "Nullable" => Type::Nullable(Box::new(self.parse_type()?)),
            "Tuple" => {
                let mut members = vec![self.parse_type()?];
                while self.peek() == Some(Token::Comma) {
                    self.next();
                    members.push(self.parse_type()?);
                }
                Type::Tuple(members)
            }
            "Nested" => {
                let mut fields = vec![self.nested_field()?];
                while self.peek() == Some(Token::Comma) {
                    self.next();
                    fields.push(self.nested_field()?);
                }
                Type::Nested(fields)
            }
            _ => return None,
        };
        if matches!(parsed, Type::Enum8(_) | Type::Enum16(_)) {
            // enum_entries consumed the closing bracket
            return Some(parsed);
        }
        self.eat(Token::ClosingRoundBracket)?;
        Some(parsed)
    }

    fn number(&mut self) -> Option<i64> {
        match self.next()? {
            Token::Number(n) => n.parse().ok(),
            Token::Minus => match self.next()? {
                Token::Number(n) => n.parse::<i64>().ok().map(|v| -v),
                _ => None,
            },
            _ => None,
        }
    }

    // `'name' = value, …)` including the terminating bracket. Names must be
    // unique and at least one pair is required.
    fn enum_entries<V: TryFrom<i64>>(&mut self) -> Option<Vec<(String, V)>> {
        let mut entries: Vec<(String, V)> = vec![];
        loop {
            let name = match self.next()? {
                Token::StringLiteral(s) => lexer::unquote(s),
                _ => return None,
            };
            if entries.iter().any(|(existing, _)| existing == &name) {
                return None;
            }
            self.eat(Token::Equals)?;
            let value = V::try_from(self.number()?).ok()?;
            entries.push((name, value));
            match self.next()? {
                Token::Comma => continue,
                Token::ClosingRoundBracket => return Some(entries),
                _ => return None,
            }
        }
    }

    fn nested_field(&mut self) -> Option<(String, Type)> {
        let name = match self.next()? {
            Token::Identifier(name) => name.to_string(),
            _ => return None,
        };
        Some((name, self.parse_type()?))
    }
}

fn scalar_by_name(ident: &str) -> Option<Type> {
    Some(match ident {
        "Int8" => Type::Int8,
        "Int16" => Type::Int16,
        "Int32" => Type::Int32,
        "Int64" => Type::Int64,
        "Bool" | "UInt8" => Type::UInt8,
        "UInt16" => Type::UInt16,
        "UInt32" => Type::UInt32,
        "UInt64" => Type::UInt64,
        "Float32" => Type::Float32,
        "Float64" => Type::Float64,
        "String" => Type::String,
        "UUID" => Type::Uuid,
        "Date" => Type::Date,
        "DateTime" => Type::DateTime(chrono_tz::UTC),
        _ => return None,
    })
}
