//! Custom combination expressions.
//!
//! A condition may fold its criteria with a boolean expression instead of
//! plain ALL/ANY. Operands are 1-based criterion positions; `and` binds
//! tighter than `or`, `not` tighter than both, parentheses group.
//!
//! Evaluation is Kleene: `not` swaps true and false and leaves
//! indeterminate alone, so missing data propagates instead of silently
//! flipping polarity.

use thiserror::Error;

use super::truth::Truth;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error("empty combination expression")]
    Empty,
    #[error("unexpected character '{0}' in combination expression")]
    UnexpectedChar(char),
    #[error("unexpected token '{0}' in combination expression")]
    UnexpectedToken(String),
    #[error("unbalanced parenthesis in combination expression")]
    UnbalancedParen,
    #[error("trailing input after combination expression: '{0}'")]
    TrailingInput(String),
    #[error("criterion position {position} out of range (condition has {count} criteria)")]
    IndexOutOfRange { position: usize, count: usize },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    And,
    Or,
    Not,
    LParen,
    RParen,
    Index(usize),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
            Self::Not => write!(f, "not"),
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
            Self::Index(n) => write!(f, "{n}"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            c if c.is_ascii_digit() => {
                let mut end = start;
                while chars.peek().is_some_and(|(_, c)| c.is_ascii_digit()) {
                    end = chars.next().unwrap().0;
                }
                let digits = &input[start..=end];
                // Digits only, bounded length: parse cannot fail except on
                // absurd positions, which are out of range anyway.
                let position: usize = digits
                    .parse()
                    .map_err(|_| ExpressionError::UnexpectedToken(digits.to_string()))?;
                tokens.push(Token::Index(position));
            }
            c if c.is_ascii_alphabetic() => {
                let mut end = start;
                while chars.peek().is_some_and(|(_, c)| c.is_ascii_alphabetic()) {
                    end = chars.next().unwrap().0;
                }
                let word = &input[start..=end];
                match word.to_ascii_lowercase().as_str() {
                    "and" => tokens.push(Token::And),
                    "or" => tokens.push(Token::Or),
                    "not" => tokens.push(Token::Not),
                    _ => return Err(ExpressionError::UnexpectedToken(word.to_string())),
                }
            }
            other => return Err(ExpressionError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Index(usize),
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

/// Parsed combination expression, ready to evaluate against the ordered
/// criterion results of its condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    root: Node,
}

impl Expression {
    pub fn parse(input: &str) -> Result<Self, ExpressionError> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(ExpressionError::Empty);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let root = parser.or_expr()?;
        if let Some(extra) = parser.peek() {
            return Err(ExpressionError::TrailingInput(extra.to_string()));
        }
        Ok(Self { root })
    }

    /// Evaluate against criterion results in definition order.
    pub fn evaluate(&self, results: &[Truth]) -> Result<Truth, ExpressionError> {
        eval_node(&self.root, results)
    }
}

fn eval_node(node: &Node, results: &[Truth]) -> Result<Truth, ExpressionError> {
    match node {
        Node::Index(position) => {
            if *position == 0 || *position > results.len() {
                return Err(ExpressionError::IndexOutOfRange {
                    position: *position,
                    count: results.len(),
                });
            }
            Ok(results[position - 1])
        }
        Node::Not(inner) => Ok(eval_node(inner, results)?.negate()),
        Node::And(left, right) => Ok(eval_node(left, results)?.and(eval_node(right, results)?)),
        Node::Or(left, right) => Ok(eval_node(left, results)?.or(eval_node(right, results)?)),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn or_expr(&mut self) -> Result<Node, ExpressionError> {
        let mut node = self.and_expr()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.next();
            let rhs = self.and_expr()?;
            node = Node::Or(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn and_expr(&mut self) -> Result<Node, ExpressionError> {
        let mut node = self.unary()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.next();
            let rhs = self.unary()?;
            node = Node::And(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn unary(&mut self) -> Result<Node, ExpressionError> {
        match self.next() {
            Some(Token::Not) => Ok(Node::Not(Box::new(self.unary()?))),
            Some(Token::Index(position)) => Ok(Node::Index(position)),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ExpressionError::UnbalancedParen),
                }
            }
            Some(token) => Err(ExpressionError::UnexpectedToken(token.to_string())),
            None => Err(ExpressionError::UnexpectedToken("end of input".to_string())),
        }
    }
}
