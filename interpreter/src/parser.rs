use std::mem;

use losk_core::{Literal, Token, Type};
use tracing::debug;

use crate::ast::{Expr, Stmt};
use crate::error::Error;
use crate::limits::{MAX_ARGS, MAX_NESTING, MAX_PARAMS};
use crate::stack::ensure_sufficient_stack;

pub struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,

    // Statements and expressions currently open around `current`
    nesting: usize,

    // Stand-in for a missing trailing `Eof`, so that `peek` never runs off the token slice
    eof: Token,

    // Problems that are reported but do not stop parsing, e.g. an invalid assignment target
    diagnostics: Vec<Error>,
}

// A wrapper over vector of statements to not leak Stmt to public
#[derive(Debug, PartialEq)]
pub struct StmtStream(pub(crate) Vec<Stmt>);

impl StmtStream {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Helper alias for shorter return types
type ParserResult = Result<StmtStream, Vec<Error>>;
type BlockResult = Result<Vec<Stmt>, Error>;
type StmtResult = Result<Stmt, Error>;
type ExprResult = Result<Expr, Error>;

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        let line = tokens.last().map_or(1, |token| token.line);
        Parser {
            tokens,
            current: 0,
            nesting: 0,
            eof: Token::new(Type::Eof, String::new(), line, 0, tokens.len(), Literal::Nil),
            diagnostics: Vec::new(),
        }
    }

    /// Parses the whole token stream. Any diagnostic makes this an `Err`: the non-fatal ones come
    /// first in the order they were found, and a fatal error, if there was one, is always last.
    /// Parsing stops at the first fatal error.
    pub fn parse(&mut self) -> ParserResult {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.synchronize();
                    debug!(line = err.line(), "aborting parse: {}", err);
                    self.diagnostics.push(err);
                    break;
                }
            }
        }

        if self.diagnostics.is_empty() {
            Ok(StmtStream(statements))
        } else {
            Err(mem::take(&mut self.diagnostics))
        }
    }

    fn declaration(&mut self) -> StmtResult {
        self.nested(|parser| {
            if parser.match_one(Type::Fun) {
                parser.function()
            } else if parser.match_one(Type::Var) {
                parser.var_declaration()
            } else {
                parser.statement()
            }
        })
    }

    fn function(&mut self) -> StmtResult {
        let name = self
            .consume(Type::Identifier, "Expect function name.")?
            .clone();
        self.consume(Type::LeftParen, "Expect '(' after function name.")?;

        let mut params = Vec::new();
        if !self.check(Type::RightParen) {
            loop {
                if params.len() >= MAX_PARAMS {
                    self.report(Error::parser_error(
                        self.peek(),
                        "Can't have more than 255 parameters.",
                    ));
                }

                params.push(
                    self.consume(Type::Identifier, "Expect parameter name.")?
                        .clone(),
                );
                if !self.match_one(Type::Comma) {
                    break;
                }
            }
        }

        self.consume(Type::RightParen, "Expect ')' after parameters.")?;
        self.consume(Type::LeftBrace, "Expect '{' before function body.")?;

        let body = self.block()?;
        Ok(Stmt::function(name, params, body))
    }

    fn var_declaration(&mut self) -> StmtResult {
        let name = self
            .consume(Type::Identifier, "Expect variable name.")?
            .clone();
        let init = if self.match_one(Type::Equal) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(Type::SemiColon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::var(name, init))
    }

    fn statement(&mut self) -> StmtResult {
        self.nested(|parser| {
            if parser.match_one(Type::If) {
                parser.if_statement()
            } else if parser.match_one(Type::Print) {
                parser.print_statement()
            } else if parser.match_one(Type::Return) {
                parser.return_statement()
            } else if parser.match_one(Type::While) {
                parser.while_statement()
            } else if parser.match_one(Type::For) {
                parser.for_statement()
            } else if parser.match_one(Type::LeftBrace) {
                Ok(Stmt::block(parser.block()?))
            } else {
                parser.expression_statement()
            }
        })
    }

    fn block(&mut self) -> BlockResult {
        let mut stmts = Vec::new();
        while !self.check(Type::RightBrace) && !self.is_at_end() {
            stmts.push(self.declaration()?);
        }
        self.consume(Type::RightBrace, "Expect '}' after block.")?;
        Ok(stmts)
    }

    fn expression_statement(&mut self) -> StmtResult {
        let expr = self.expression()?;
        self.consume(Type::SemiColon, "Expect ';' after expression.")?;
        Ok(Stmt::expression(expr))
    }

    fn if_statement(&mut self) -> StmtResult {
        self.consume(Type::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(Type::RightParen, "Expect ')' after if condition.")?;

        let then_branch = self.statement()?;
        let else_branch = if self.match_one(Type::Else) {
            Some(self.statement()?)
        } else {
            None
        };

        Ok(Stmt::if_(condition, then_branch, else_branch))
    }

    fn while_statement(&mut self) -> StmtResult {
        self.consume(Type::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(Type::RightParen, "Expect ')' after while condition.")?;
        let body = self.statement()?;
        Ok(Stmt::while_(condition, body))
    }

    // There is no for node in the tree, the loop is rewritten into
    // `{ init; while (cond) { body; incr; } }`
    fn for_statement(&mut self) -> StmtResult {
        self.consume(Type::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_one(Type::SemiColon) {
            None
        } else if self.match_one(Type::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(Type::SemiColon) {
            self.expression()?
        } else {
            Expr::literal(true)
        };
        self.consume(Type::SemiColon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(Type::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(Type::RightParen, "Expect ')' after for clauses.")?;

        let mut while_body = vec![self.statement()?];
        if let Some(increment) = increment {
            while_body.push(Stmt::expression(increment));
        }

        let mut outer = Vec::with_capacity(2);
        if let Some(initializer) = initializer {
            outer.push(initializer);
        }
        outer.push(Stmt::while_(condition, Stmt::block(while_body)));

        Ok(Stmt::block(outer))
    }

    fn print_statement(&mut self) -> StmtResult {
        let keyword = self.previous().clone();
        let expr = self.expression()?;
        self.consume(Type::SemiColon, "Expect ';' after value.")?;
        Ok(Stmt::print(keyword, expr))
    }

    fn return_statement(&mut self) -> StmtResult {
        let keyword = self.previous().clone();
        let value = if !self.check(Type::SemiColon) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(Type::SemiColon, "Expect ';' after return value.")?;
        Ok(Stmt::return_(keyword, value))
    }

    fn expression(&mut self) -> ExprResult {
        self.nested(|parser| parser.assignment())
    }

    fn assignment(&mut self) -> ExprResult {
        let expr = self.or_expression()?;
        if self.match_one(Type::Equal) {
            let equals = self.previous().clone();
            let value = self.nested(|parser| parser.assignment())?;

            if let Expr::Variable { name } = &expr {
                return Ok(Expr::assign(name.clone(), value));
            }

            // Reported, but the left side is still a perfectly good expression so parsing goes
            // on with it
            self.report(Error::parser_error(&equals, "Invalid assignment target."));
            Ok(expr)
        } else {
            Ok(expr)
        }
    }

    fn or_expression(&mut self) -> ExprResult {
        let mut expr = self.and_expression()?;
        while self.match_one(Type::Or) {
            let operator = self.previous().clone();
            let right = self.and_expression()?;
            expr = Expr::logical(expr, operator, right);
        }
        Ok(expr)
    }

    fn and_expression(&mut self) -> ExprResult {
        let mut expr = self.equality()?;
        while self.match_one(Type::And) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::logical(expr, operator, right);
        }
        Ok(expr)
    }

    fn equality(&mut self) -> ExprResult {
        let mut expr = self.comparison()?;
        while self.match_either(&[Type::BangEqual, Type::EqualEqual]) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> ExprResult {
        let mut expr = self.term()?;
        while self.match_either(&[
            Type::Greater,
            Type::GreaterEqual,
            Type::Less,
            Type::LessEqual,
        ]) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = Expr::binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn term(&mut self) -> ExprResult {
        let mut expr = self.factor()?;
        while self.match_either(&[Type::Plus, Type::Minus]) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn factor(&mut self) -> ExprResult {
        let mut expr = self.unary()?;
        while self.match_either(&[Type::Slash, Type::Star]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn unary(&mut self) -> ExprResult {
        if self.match_either(&[Type::Bang, Type::Minus]) {
            let operator = self.previous().clone();
            let right = self.nested(|parser| parser.unary())?;
            Ok(Expr::unary(operator, right))
        } else {
            self.call()
        }
    }

    fn call(&mut self) -> ExprResult {
        let mut expr = self.primary()?;
        while self.match_one(Type::LeftParen) {
            expr = self.finish_call(expr)?;
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ExprResult {
        let mut args: Vec<Expr> = Vec::new();
        if !self.check(Type::RightParen) {
            loop {
                if args.len() >= MAX_ARGS {
                    self.report(Error::parser_error(
                        self.peek(),
                        "Can't have more than 255 arguments.",
                    ));
                }

                args.push(self.expression()?);
                if !self.match_one(Type::Comma) {
                    break;
                }
            }
        }

        let paren = self
            .consume(Type::RightParen, "Expect ')' after arguments.")?
            .clone();
        Ok(Expr::call(callee, paren, args))
    }

    fn primary(&mut self) -> ExprResult {
        if self.match_one(Type::True) {
            Ok(Expr::literal(true))
        } else if self.match_one(Type::False) {
            Ok(Expr::literal(false))
        } else if self.match_one(Type::Nil) {
            Ok(Expr::nil())
        } else if self.match_either(&[Type::Number, Type::String]) {
            Ok(Expr::literal(self.previous().value.clone()))
        } else if self.match_one(Type::LeftParen) {
            let expr = self.expression()?;
            self.consume(Type::RightParen, "Expect ')' after expression.")?;
            Ok(Expr::grouping(expr))
        } else if self.match_one(Type::Identifier) {
            Ok(Expr::variable(self.previous().clone()))
        } else {
            Err(Error::parser_error(self.peek(), "Expect expression."))
        }
    }

    // Runs one level of recursive descent. The stack is grown when it runs low, and nesting past
    // `MAX_NESTING` is a fatal error.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, Error>,
    ) -> Result<T, Error> {
        if self.nesting >= MAX_NESTING {
            return Err(Error::parser_error(self.peek(), "Too much nesting."));
        }

        self.nesting += 1;
        let result = ensure_sufficient_stack(|| parse(self));
        self.nesting -= 1;
        result
    }

    fn report(&mut self, err: Error) {
        self.diagnostics.push(err);
    }

    fn is_at_end(&self) -> bool {
        self.peek().ty == Type::Eof
    }

    fn check(&self, ty: Type) -> bool {
        if self.is_at_end() {
            false
        } else {
            self.peek().ty == ty
        }
    }

    fn consume(&mut self, ty: Type, msg: &str) -> Result<&Token, Error> {
        if self.check(ty) {
            Ok(self.advance())
        } else {
            Err(Error::parser_error(self.peek(), msg))
        }
    }

    // Discards tokens until the next statement boundary: right after a ';' or right before a
    // keyword that starts a declaration or statement.
    fn synchronize(&mut self) {
        debug!(line = self.peek().line, "synchronizing parser");
        self.advance();

        while !self.is_at_end() {
            if self.previous().ty == Type::SemiColon || self.peek().ty.starts_statement() {
                return;
            }

            self.advance();
        }
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.current).unwrap_or(&self.eof)
    }

    fn previous(&self) -> &Token {
        self.current
            .checked_sub(1)
            .and_then(|idx| self.tokens.get(idx))
            .unwrap_or(&self.eof)
    }

    fn match_either(&mut self, types: &[Type]) -> bool {
        for ty in types {
            if self.match_one(*ty) {
                // Already skipped in the `match_one`, just return result
                return true;
            }
        }

        false
    }

    fn match_one(&mut self, ty: Type) -> bool {
        if self.check(ty) {
            self.advance();
            true
        } else {
            false
        }
    }
}
