use compiler_tools::TokenParse;
use compiler_tools_derive::token_parse;

/// Tokens of a server type descriptor, e.g. `Array(Nullable(FixedString(3)))`
/// or `Enum8('a' = 1, 'b' = 2)`. The same alphabet covers the quoted literals
/// substituted into client-side prepared queries.
#[token_parse]
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Token<'a> {
    OpeningRoundBracket = "(",
    ClosingRoundBracket = ")",
    Comma = ",",
    Equals = "=",
    Minus = "-",

    #[token(regex = "[ \n\t\r]+")]
    Whitespace(&'a str),
    #[token(regex = "[a-zA-Z_][0-9a-zA-Z_]*")]
    Identifier(&'a str),
    #[token(regex = "[0-9]+[.][0-9]+")]
    Decimal(&'a str),
    #[token(regex = "[0-9]+")]
    Number(&'a str),
    /// Single-quoted, backslash-escaped; the token keeps its quotes.
    #[token(parse_fn = "compiler_tools::util::parse_str::<'\\''>")]
    StringLiteral(&'a str),
    #[token(illegal)]
    Illegal(char),
}

/// Lexes `input` to the end, dropping whitespace. Reaching the end of the
/// token stream stands in for an explicit EOF token.
pub fn tokens(input: &str) -> Vec<Token<'_>> {
    let mut tokenizer = Tokenizer::new(input);
    let mut out = vec![];
    while let Some(token) = tokenizer.next() {
        if !matches!(token.token, Token::Whitespace(_)) {
            out.push(token.token);
        }
    }
    out
}

/// Strips the surrounding quotes of a [`Token::StringLiteral`] and resolves
/// backslash escapes.
pub fn unquote(literal: &str) -> String {
    let inner = &literal[1..literal.len().saturating_sub(1).max(1)];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some(other) => out.push(other),
                None => break,
            }
        } else {
            out.push(c);
        }
    }
    out
}
