//! Recursive-descent parser, one function per precedence level.
//!
//! Nesting is capped at [`MAX_DEPTH`]. Every level of recursion and every
//! link of a left-associative or postfix chain counts, so the depth also
//! bounds the height of the tree handed to the checker and the evaluator.

use crate::errors::RuleError;

use super::ast::{BinaryOp, Expr, Literal, Quantifier, UnaryOp};
use super::lexer::{parse_error, tokenize, Token, TokenKind};

pub const MAX_DEPTH: usize = 128;

pub fn parse(source: &str) -> Result<Expr, RuleError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, cursor: 0, end: source.len(), depth: 0 };
    let expr = parser.expression()?;

    if let Some(token) = parser.peek() {
        return Err(parse_error(
            token.position,
            format!("unexpected `{}` after complete expression", token.kind.describe()),
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn expression(&mut self) -> Result<Expr, RuleError> {
        self.descend()?;
        let expr = self.conditional()?;
        self.depth -= 1;
        Ok(expr)
    }

    fn conditional(&mut self) -> Result<Expr, RuleError> {
        let condition = self.or()?;
        if !self.eat(&TokenKind::Question) {
            return Ok(condition);
        }

        let then_branch = self.expression()?;
        self.expect(&TokenKind::Colon)?;
        let else_branch = self.expression()?;
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn or(&mut self) -> Result<Expr, RuleError> {
        let mut left = self.and()?;
        let mut links = 0;
        while self.eat(&TokenKind::OrOr) {
            self.descend()?;
            links += 1;
            let right = self.and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        self.depth -= links;
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, RuleError> {
        let mut left = self.relation()?;
        let mut links = 0;
        while self.eat(&TokenKind::AndAnd) {
            self.descend()?;
            links += 1;
            let right = self.relation()?;
            left = binary(BinaryOp::And, left, right);
        }
        self.depth -= links;
        Ok(left)
    }

    fn relation(&mut self) -> Result<Expr, RuleError> {
        let mut left = self.additive()?;
        let mut links = 0;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::EqEq) => BinaryOp::Equal,
                Some(TokenKind::NotEq) => BinaryOp::NotEqual,
                Some(TokenKind::Lt) => BinaryOp::Less,
                Some(TokenKind::Le) => BinaryOp::LessEqual,
                Some(TokenKind::Gt) => BinaryOp::Greater,
                Some(TokenKind::Ge) => BinaryOp::GreaterEqual,
                Some(TokenKind::In) => BinaryOp::In,
                _ => break,
            };
            self.cursor += 1;
            self.descend()?;
            links += 1;
            let right = self.additive()?;
            left = binary(op, left, right);
        }
        self.depth -= links;
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, RuleError> {
        let mut left = self.multiplicative()?;
        let mut links = 0;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Subtract,
                _ => break,
            };
            self.cursor += 1;
            self.descend()?;
            links += 1;
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
        self.depth -= links;
        Ok(left)
    }

    fn multiplicative(&mut self) -> Result<Expr, RuleError> {
        let mut left = self.unary()?;
        let mut links = 0;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => BinaryOp::Multiply,
                Some(TokenKind::Slash) => BinaryOp::Divide,
                Some(TokenKind::Percent) => BinaryOp::Modulo,
                _ => break,
            };
            self.cursor += 1;
            self.descend()?;
            links += 1;
            let right = self.unary()?;
            left = binary(op, left, right);
        }
        self.depth -= links;
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, RuleError> {
        let op = match self.peek_kind() {
            Some(TokenKind::Bang) => UnaryOp::Not,
            Some(TokenKind::Minus) => UnaryOp::Negate,
            _ => return self.postfix(),
        };
        self.cursor += 1;
        self.descend()?;
        let operand = self.unary()?;
        self.depth -= 1;
        Ok(Expr::Unary { op, operand: Box::new(operand) })
    }

    fn postfix(&mut self) -> Result<Expr, RuleError> {
        let mut expr = self.primary()?;
        let mut links = 0;
        loop {
            if self.eat(&TokenKind::Dot) {
                self.descend()?;
                links += 1;
                let (field, position) = self.identifier()?;
                if !self.eat(&TokenKind::LParen) {
                    expr = Expr::Member { target: Box::new(expr), field };
                    continue;
                }
                let args = self.arguments(&TokenKind::RParen)?;
                expr = method_call(expr, field, args, position)?;
            } else if self.eat(&TokenKind::LBracket) {
                self.descend()?;
                links += 1;
                let index = self.expression()?;
                self.expect(&TokenKind::RBracket)?;
                expr = Expr::Index { target: Box::new(expr), index: Box::new(index) };
            } else {
                self.depth -= links;
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, RuleError> {
        let Some(token) = self.next() else {
            return Err(parse_error(self.end, "unexpected end of rule"));
        };

        let expr = match token.kind {
            TokenKind::Int(value) => Expr::Literal(Literal::Int(value)),
            TokenKind::Double(value) => Expr::Literal(Literal::Double(value)),
            TokenKind::Str(value) => Expr::Literal(Literal::String(value)),
            TokenKind::True => Expr::Literal(Literal::Bool(true)),
            TokenKind::False => Expr::Literal(Literal::Bool(false)),
            TokenKind::Null => Expr::Literal(Literal::Null),
            TokenKind::Ident(name) => {
                if self.eat(&TokenKind::LParen) {
                    let args = self.arguments(&TokenKind::RParen)?;
                    Expr::Call { target: None, function: name, args }
                } else {
                    Expr::Ident(name)
                }
            }
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen)?;
                inner
            }
            TokenKind::LBracket => Expr::List(self.arguments(&TokenKind::RBracket)?),
            other => {
                return Err(parse_error(
                    token.position,
                    format!("unexpected `{}`", other.describe()),
                ))
            }
        };
        Ok(expr)
    }

    /// Comma-separated expressions up to and including `close`.
    fn arguments(&mut self, close: &TokenKind) -> Result<Vec<Expr>, RuleError> {
        let mut args = Vec::new();
        if self.eat(close) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat(close) {
                return Ok(args);
            }
            self.expect(&TokenKind::Comma)?;
        }
    }

    fn descend(&mut self) -> Result<(), RuleError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            let position = self.peek().map_or(self.end, |token| token.position);
            return Err(parse_error(position, format!("rule nests deeper than {MAX_DEPTH} levels")));
        }
        Ok(())
    }

    fn identifier(&mut self) -> Result<(String, usize), RuleError> {
        match self.next() {
            Some(Token { kind: TokenKind::Ident(name), position }) => Ok((name, position)),
            Some(token) => Err(parse_error(
                token.position,
                format!("expected field name, found `{}`", token.kind.describe()),
            )),
            None => Err(parse_error(self.end, "expected field name, found end of rule")),
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), RuleError> {
        if self.eat(kind) {
            return Ok(());
        }
        match self.peek() {
            Some(token) => Err(parse_error(
                token.position,
                format!("expected `{}`, found `{}`", kind.describe(), token.kind.describe()),
            )),
            None => Err(parse_error(
                self.end,
                format!("expected `{}`, found end of rule", kind.describe()),
            )),
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.cursor += 1;
            return true;
        }
        false
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|token| &token.kind)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).cloned();
        if token.is_some() {
            self.cursor += 1;
        }
        token
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary { op, left: Box::new(left), right: Box::new(right) }
}

fn method_call(
    target: Expr,
    function: String,
    mut args: Vec<Expr>,
    position: usize,
) -> Result<Expr, RuleError> {
    let Some(quantifier) = Quantifier::from_method(&function) else {
        return Ok(Expr::Call { target: Some(Box::new(target)), function, args });
    };

    if args.len() != 2 {
        return Err(parse_error(
            position,
            format!("`{function}` takes a variable and a predicate, got {} arguments", args.len()),
        ));
    }
    let predicate = args.pop().map(Box::new);
    let variable = args.pop();
    match (variable, predicate) {
        (Some(Expr::Ident(variable)), Some(predicate)) => Ok(Expr::Comprehension {
            quantifier,
            range: Box::new(target),
            variable,
            predicate,
        }),
        _ => Err(parse_error(
            position,
            format!("first argument of `{function}` must be a variable name"),
        )),
    }
}
