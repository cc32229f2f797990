use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use super::PredicateError;

/// Byte range inside a formula, used to point rule authors at the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Variable(String),
    Text(String),
    Number(f64),
    Bool(bool),
    Eq,
    And,
    Or,
    LParen,
    RParen,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Variable(name) => write!(f, "[{name}]"),
            TokenKind::Text(text) => write!(f, "\"{text}\""),
            TokenKind::Number(number) => write!(f, "{number}"),
            TokenKind::Bool(flag) => write!(f, "{flag}"),
            TokenKind::Eq => write!(f, "=="),
            TokenKind::And => write!(f, "AND"),
            TokenKind::Or => write!(f, "OR"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Eof => write!(f, "end of formula"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) span: Span,
}

impl Token {
    fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Splits a condition formula into tokens; the final token is always `Eof`.
pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, PredicateError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();

    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }

    Ok(tokens)
}

struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn next_token(&mut self) -> Result<Token, PredicateError> {
        while self.chars.next_if(|(_, ch)| ch.is_whitespace()).is_some() {}

        let Some(&(start, ch)) = self.chars.peek() else {
            let end = self.input.len();
            return Ok(Token::new(TokenKind::Eof, Span::new(end, end)));
        };

        match ch {
            '(' => {
                self.chars.next();
                Ok(Token::new(TokenKind::LParen, Span::new(start, start + 1)))
            }
            ')' => {
                self.chars.next();
                Ok(Token::new(TokenKind::RParen, Span::new(start, start + 1)))
            }
            '[' => self.variable(start),
            '"' | '\'' => self.text(start, ch),
            '=' | '!' | '<' | '>' | '&' | '|' => self.operator(start),
            '-' | '.' | '0'..='9' => self.number(start),
            c if c.is_alphabetic() || c == '_' => self.word(start),
            other => Err(PredicateError::UnexpectedChar {
                found: other,
                span: Span::new(start, start + other.len_utf8()),
            }),
        }
    }

    fn position(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(index, _)| *index)
            .unwrap_or(self.input.len())
    }

    fn variable(&mut self, start: usize) -> Result<Token, PredicateError> {
        self.chars.next();
        let mut name = String::new();
        loop {
            match self.chars.next() {
                Some((end, ']')) => {
                    let span = Span::new(start, end + 1);
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(PredicateError::EmptyVariable { span });
                    }
                    return Ok(Token::new(TokenKind::Variable(name.to_string()), span));
                }
                Some((_, ch)) => name.push(ch),
                None => {
                    return Err(PredicateError::Unterminated {
                        what: "variable reference",
                        span: Span::new(start, self.input.len()),
                    })
                }
            }
        }
    }

    fn text(&mut self, start: usize, quote: char) -> Result<Token, PredicateError> {
        self.chars.next();
        let mut text = String::new();
        loop {
            match self.chars.next() {
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, escaped)) => text.push(escaped),
                    None => break,
                },
                Some((end, ch)) if ch == quote => {
                    return Ok(Token::new(
                        TokenKind::Text(text),
                        Span::new(start, end + ch.len_utf8()),
                    ));
                }
                Some((_, ch)) => text.push(ch),
                None => break,
            }
        }

        Err(PredicateError::Unterminated {
            what: "string literal",
            span: Span::new(start, self.input.len()),
        })
    }

    fn operator(&mut self, start: usize) -> Result<Token, PredicateError> {
        let mut operator = String::new();
        while let Some((_, ch)) = self
            .chars
            .next_if(|(_, ch)| matches!(ch, '=' | '!' | '<' | '>' | '&' | '|'))
        {
            operator.push(ch);
        }
        let span = Span::new(start, self.position());

        if operator == "==" {
            Ok(Token::new(TokenKind::Eq, span))
        } else {
            Err(PredicateError::UnsupportedOperator { operator, span })
        }
    }

    fn number(&mut self, start: usize) -> Result<Token, PredicateError> {
        let mut raw = String::new();
        if let Some((_, sign)) = self.chars.next_if(|(_, ch)| *ch == '-') {
            raw.push(sign);
        }
        while let Some((_, ch)) = self
            .chars
            .next_if(|(_, ch)| ch.is_ascii_digit() || *ch == '.')
        {
            raw.push(ch);
        }
        let span = Span::new(start, self.position());

        raw.parse::<f64>()
            .map(|number| Token::new(TokenKind::Number(number), span))
            .map_err(|_| PredicateError::InvalidNumber { raw, span })
    }

    fn word(&mut self, start: usize) -> Result<Token, PredicateError> {
        let mut word = String::new();
        while let Some((_, ch)) = self
            .chars
            .next_if(|(_, ch)| ch.is_alphanumeric() || *ch == '_')
        {
            word.push(ch);
        }
        let span = Span::new(start, self.position());

        let kind = match word.to_ascii_uppercase().as_str() {
            "AND" => TokenKind::And,
            "OR" => TokenKind::Or,
            "TRUE" => TokenKind::Bool(true),
            "FALSE" => TokenKind::Bool(false),
            "NOT" => {
                return Err(PredicateError::UnsupportedOperator {
                    operator: word,
                    span,
                })
            }
            _ => return Err(PredicateError::UnknownWord { word, span }),
        };

        Ok(Token::new(kind, span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .expect("formula tokenizes")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn tokenizes_bracketed_comparisons() {
        assert_eq!(
            kinds(r#"([post_type] == "steel") and [height] == 6.5"#),
            vec![
                TokenKind::LParen,
                TokenKind::Variable("post_type".to_string()),
                TokenKind::Eq,
                TokenKind::Text("steel".to_string()),
                TokenKind::RParen,
                TokenKind::And,
                TokenKind::Variable("height".to_string()),
                TokenKind::Eq,
                TokenKind::Number(6.5),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn single_quoted_literals_and_escapes() {
        assert_eq!(
            kinds(r"[style] == 'board\'s edge'"),
            vec![
                TokenKind::Variable("style".to_string()),
                TokenKind::Eq,
                TokenKind::Text("board's edge".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn rejects_unsupported_operators_with_span() {
        match tokenize("[height] != 6") {
            Err(PredicateError::UnsupportedOperator { operator, span }) => {
                assert_eq!(operator, "!=");
                assert_eq!(span, Span::new(9, 11));
            }
            other => panic!("expected unsupported operator, got {other:?}"),
        }
        assert!(matches!(
            tokenize("NOT [capped] == true"),
            Err(PredicateError::UnsupportedOperator { .. })
        ));
    }

    #[test]
    fn reports_unterminated_pieces() {
        assert!(matches!(
            tokenize("[height == 6"),
            Err(PredicateError::Unterminated { what: "variable reference", .. })
        ));
        assert!(matches!(
            tokenize(r#"[style] == "open"#),
            Err(PredicateError::Unterminated { what: "string literal", .. })
        ));
        assert!(matches!(
            tokenize("[ ] == 1"),
            Err(PredicateError::EmptyVariable { .. })
        ));
    }
}
