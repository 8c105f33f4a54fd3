use super::lexer::{tokenize, Spanned, Token};
use super::value::Value;
use super::ConditionError;

/// Maximum nesting of parentheses, brackets and unary operators
pub const MAX_DEPTH: usize = 64;

/// Maximum number of operators, lookups and calls in one expression
pub const MAX_NODES: usize = 512;

/// The AST of a compiled condition expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// The whole answer mapping (`answers`)
    Answers,
    /// A bare identifier, read from the answers
    Identifier(String),
    Member {
        object: Box<Expr>,
        property: Box<Expr>,
    },
    Call {
        object: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

pub fn parse(source: &str) -> Result<Expr, ConditionError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        position: 0,
        depth: 0,
        nodes: 0,
    };
    let expr = parser.expression()?;
    match parser.tokens.get(parser.position) {
        None => Ok(expr),
        Some((offset, token)) => Err(ConditionError::UnexpectedToken {
            found: token.to_string(),
            offset: *offset,
        }),
    }
}

/// Recursive-descent parser, one method per precedence level
struct Parser {
    tokens: Vec<Spanned>,
    position: usize,
    depth: usize,
    nodes: usize,
}

impl Parser {
    fn expression(&mut self) -> Result<Expr, ConditionError> {
        self.enter()?;
        let expr = self.or();
        self.depth -= 1;
        expr
    }

    fn enter(&mut self) -> Result<(), ConditionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ConditionError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    /// Operator chains build left-nested trees without recursing here, so
    /// every composite node draws from a fixed budget.
    fn grow(&mut self) -> Result<(), ConditionError> {
        self.nodes += 1;
        if self.nodes > MAX_NODES {
            return Err(ConditionError::TooLarge(MAX_NODES));
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(_, token)| token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ConditionError> {
        match self.advance() {
            Some((_, token)) if token == expected => Ok(()),
            Some((offset, token)) => Err(ConditionError::UnexpectedToken {
                found: token.to_string(),
                offset,
            }),
            None => Err(ConditionError::UnexpectedEnd),
        }
    }

    fn or(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.and()?;
        while self.eat(&Token::Or) {
            self.grow()?;
            let right = self.and()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.equality()?;
        while self.eat(&Token::And) {
            self.grow()?;
            let right = self.equality()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Equal,
                Some(Token::NotEq) => BinaryOp::NotEqual,
                Some(Token::StrictEq) => BinaryOp::StrictEqual,
                Some(Token::StrictNotEq) => BinaryOp::StrictNotEqual,
                _ => return Ok(left),
            };
            self.position += 1;
            self.grow()?;
            let right = self.comparison()?;
            left = binary(op, left, right);
        }
    }

    fn comparison(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Less,
                Some(Token::LtEq) => BinaryOp::LessOrEqual,
                Some(Token::Gt) => BinaryOp::Greater,
                Some(Token::GtEq) => BinaryOp::GreaterOrEqual,
                _ => return Ok(left),
            };
            self.position += 1;
            self.grow()?;
            let right = self.additive()?;
            left = binary(op, left, right);
        }
    }

    fn additive(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Subtract,
                _ => return Ok(left),
            };
            self.position += 1;
            self.grow()?;
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Multiply,
                Some(Token::Slash) => BinaryOp::Divide,
                Some(Token::Percent) => BinaryOp::Remainder,
                _ => return Ok(left),
            };
            self.position += 1;
            self.grow()?;
            let right = self.unary()?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, ConditionError> {
        let op = match self.peek() {
            Some(Token::Not) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Negate,
            _ => return self.postfix(),
        };
        self.position += 1;
        self.grow()?;
        self.enter()?;
        let operand = self.unary();
        self.depth -= 1;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand?),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ConditionError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                self.grow()?;
                let name = match self.advance() {
                    Some((_, Token::Ident(name))) => name,
                    Some((offset, token)) => {
                        return Err(ConditionError::UnexpectedToken {
                            found: token.to_string(),
                            offset,
                        })
                    }
                    None => return Err(ConditionError::UnexpectedEnd),
                };
                if self.eat(&Token::LParen) {
                    let args = self.arguments()?;
                    expr = Expr::Call {
                        object: Box::new(expr),
                        method: name,
                        args,
                    };
                } else {
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property: Box::new(Expr::Literal(Value::String(name))),
                    };
                }
            } else if self.eat(&Token::LBracket) {
                self.grow()?;
                let property = self.expression()?;
                self.expect(Token::RBracket)?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: Box::new(property),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Call arguments after the opening parenthesis
    fn arguments(&mut self) -> Result<Vec<Expr>, ConditionError> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(Token::Comma)?;
        }
    }

    fn primary(&mut self) -> Result<Expr, ConditionError> {
        let Some((offset, token)) = self.advance() else {
            return Err(ConditionError::UnexpectedEnd);
        };
        match token {
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                "undefined" => Expr::Literal(Value::Undefined),
                "answers" => Expr::Answers,
                _ => Expr::Identifier(name),
            }),
            Token::LParen => {
                let expr = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            other => Err(ConditionError::UnexpectedToken {
                found: other.to_string(),
                offset,
            }),
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
