use super::ConditionError;
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Not,
    And,
    Or,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Token::Number(n) => return write!(f, "number {}", n),
            Token::Str(s) => return write!(f, "string '{}'", s),
            Token::Ident(name) => return write!(f, "identifier '{}'", name),
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Dot => ".",
            Token::Comma => ",",
            Token::Not => "!",
            Token::And => "&&",
            Token::Or => "||",
            Token::Eq => "==",
            Token::NotEq => "!=",
            Token::StrictEq => "===",
            Token::StrictNotEq => "!==",
            Token::Lt => "<",
            Token::LtEq => "<=",
            Token::Gt => ">",
            Token::GtEq => ">=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
        };
        write!(f, "'{}'", symbol)
    }
}

/// A token with the byte offset it starts at
pub type Spanned = (usize, Token);

pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ConditionError> {
    let mut lexer = Lexer {
        source,
        chars: source.char_indices().peekable(),
    };
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn next_token(&mut self) -> Result<Option<Spanned>, ConditionError> {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

        let Some((offset, ch)) = self.chars.next() else {
            return Ok(None);
        };

        let token = match ch {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '.' => Token::Dot,
            ',' => Token::Comma,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '!' => {
                if self.eat('=') {
                    if self.eat('=') {
                        Token::StrictNotEq
                    } else {
                        Token::NotEq
                    }
                } else {
                    Token::Not
                }
            }
            '=' => {
                if !self.eat('=') {
                    return Err(ConditionError::UnexpectedChar { ch, offset });
                }
                if self.eat('=') {
                    Token::StrictEq
                } else {
                    Token::Eq
                }
            }
            '<' => {
                if self.eat('=') {
                    Token::LtEq
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    Token::GtEq
                } else {
                    Token::Gt
                }
            }
            '&' if self.eat('&') => Token::And,
            '|' if self.eat('|') => Token::Or,
            '\'' | '"' => Token::Str(self.string(ch, offset)?),
            c if c.is_ascii_digit() => Token::Number(self.number(offset)?),
            c if is_ident_start(c) => Token::Ident(self.identifier(offset)),
            _ => return Err(ConditionError::UnexpectedChar { ch, offset }),
        };

        Ok(Some((offset, token)))
    }

    fn eat(&mut self, expected: char) -> bool {
        self.chars.next_if(|(_, c)| *c == expected).is_some()
    }

    fn string(&mut self, quote: char, start: usize) -> Result<String, ConditionError> {
        let mut value = String::new();
        loop {
            match self.chars.next() {
                None => return Err(ConditionError::UnterminatedString(start)),
                Some((_, c)) if c == quote => return Ok(value),
                Some((_, '\\')) => match self.chars.next() {
                    None => return Err(ConditionError::UnterminatedString(start)),
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, '0')) => value.push('\0'),
                    Some((_, other)) => value.push(other),
                },
                Some((_, c)) => value.push(c),
            }
        }
    }

    fn number(&mut self, start: usize) -> Result<f64, ConditionError> {
        let mut end = start + 1;
        let mut seen_dot = false;
        while let Some(&(offset, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                end = offset + 1;
                self.chars.next();
            } else if c == '.' && !seen_dot && self.digit_follows(offset) {
                seen_dot = true;
                end = offset + 1;
                self.chars.next();
            } else {
                break;
            }
        }
        let literal = &self.source[start..end];
        literal
            .parse()
            .map_err(|_| ConditionError::InvalidNumber(literal.to_string()))
    }

    /// A dot only belongs to a number when a digit follows it (`1.5`, not `1.toString`)
    fn digit_follows(&self, dot_offset: usize) -> bool {
        self.source[dot_offset + 1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
    }

    fn identifier(&mut self, start: usize) -> String {
        let mut end = start + 1;
        while let Some(&(offset, c)) = self.chars.peek() {
            if is_ident_continue(c) {
                end = offset + c.len_utf8();
                self.chars.next();
            } else {
                break;
            }
        }
        self.source[start..end].to_string()
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|(_, t)| t).collect()
    }

    #[test]
    fn tokenizes_member_comparison() {
        assert_eq!(
            kinds("answers['A'] === 'yes'"),
            vec![
                Token::Ident("answers".into()),
                Token::LBracket,
                Token::Str("A".into()),
                Token::RBracket,
                Token::StrictEq,
                Token::Str("yes".into()),
            ]
        );
    }

    #[test]
    fn distinguishes_equality_operators() {
        assert_eq!(
            kinds("a == b != c !== d ! e"),
            vec![
                Token::Ident("a".into()),
                Token::Eq,
                Token::Ident("b".into()),
                Token::NotEq,
                Token::Ident("c".into()),
                Token::StrictNotEq,
                Token::Ident("d".into()),
                Token::Not,
                Token::Ident("e".into()),
            ]
        );
    }

    #[test]
    fn reads_numbers_and_escapes() {
        assert_eq!(kinds("12.5"), vec![Token::Number(12.5)]);
        assert_eq!(
            kinds(r#""it\"s""#),
            vec![Token::Str("it\"s".into())]
        );
    }

    #[test]
    fn rejects_assignment_and_stray_characters() {
        assert!(matches!(
            tokenize("a = 1"),
            Err(ConditionError::UnexpectedChar { ch: '=', offset: 2 })
        ));
        assert!(matches!(
            tokenize("a & b"),
            Err(ConditionError::UnexpectedChar { ch: '&', .. })
        ));
        assert!(matches!(
            tokenize("'open"),
            Err(ConditionError::UnterminatedString(0))
        ));
    }
}
