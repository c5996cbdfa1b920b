//! Parser for Quill
//!
//! Converts tokens into an Abstract Syntax Tree.

use std::rc::Rc;

use crate::ast::{
    Arg, BinaryOp, ClassDecl, Expr, FieldDecl, FunctionDecl, Literal, LogicalOp, NodeId, Program,
    Stmt, UnaryOp,
};
use crate::error::{ErrorKind, QuillError, Result};
use crate::token::{Span, Token, TokenKind};

/// The parser state
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    source: Option<String>,
}

impl Parser {
    /// Create a new parser from tokens
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            current: 0,
            source: None,
        }
    }

    /// Keep the original text around so `assert` can quote its expression verbatim
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Parse the tokens into a program
    pub fn parse(&mut self) -> Result<Program> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        Ok(Program::new(statements))
    }

    // ==================== Declarations ====================

    fn declaration(&mut self) -> Result<Stmt> {
        if self.check(&TokenKind::Var) {
            self.var_declaration()
        } else if self.check(&TokenKind::Fun) && self.peek_next_is_ident() {
            self.advance();
            let decl = self.function_body_decl("function")?;
            Ok(Stmt::Function { decl })
        } else if self.check(&TokenKind::Class) {
            self.class_declaration()
        } else if self.check(&TokenKind::Enum) {
            self.enum_declaration()
        } else {
            self.statement()
        }
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let span = self.advance().span; // 'var'

        let name = self.expect_ident("variable name")?;

        let initializer = if self.match_token(&TokenKind::Equal) {
            Some(self.expression()?)
        } else {
            None
        };

        self.expect(&TokenKind::Semicolon, "';' after variable declaration")?;

        Ok(Stmt::Var { name, initializer, span })
    }

    /// Parses `name(params) { body }`; the leading keyword is already consumed.
    fn function_body_decl(&mut self, what: &str) -> Result<Rc<FunctionDecl>> {
        let span = self.peek().span;
        let name = self.expect_ident(&format!("{} name", what))?;
        self.expect(&TokenKind::LeftParen, &format!("'(' after {} name", what))?;
        let (params, rest) = self.parameters()?;
        self.expect(&TokenKind::LeftBrace, &format!("'{{' before {} body", what))?;
        let body = self.block_statements()?;

        Ok(Rc::new(FunctionDecl {
            name,
            params,
            rest,
            body,
            span,
        }))
    }

    /// Parameter list after '(' through ')'
    fn parameters(&mut self) -> Result<(Vec<String>, Option<String>)> {
        let mut params = Vec::new();
        let mut rest = None;

        if !self.check(&TokenKind::RightParen) {
            loop {
                if self.match_token(&TokenKind::Ellipsis) {
                    rest = Some(self.expect_ident("rest parameter name")?);
                    break;
                }
                params.push(self.expect_ident("parameter name")?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(&TokenKind::RightParen, "')' after parameters")?;
        Ok((params, rest))
    }

    fn class_declaration(&mut self) -> Result<Stmt> {
        let span = self.advance().span; // 'class'
        let name = self.expect_ident("class name")?;

        let superclass = if self.match_token(&TokenKind::Less) {
            let token = self.peek().clone();
            let super_name = self.expect_ident("superclass name")?;
            Some(Expr::Variable {
                name: super_name,
                id: NodeId::fresh(),
                span: token.span,
            })
        } else {
            None
        };

        self.expect(&TokenKind::LeftBrace, "'{' before class body")?;

        let mut methods = Vec::new();
        let mut static_methods = Vec::new();
        let mut fields = Vec::new();
        let mut static_fields = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            let is_static = self.match_token(&TokenKind::Static);

            if self.check(&TokenKind::Var) || self.peek_is_field() {
                let field = self.field_declaration()?;
                if is_static {
                    static_fields.push(field);
                } else {
                    fields.push(field);
                }
            } else {
                // Methods may optionally be introduced with 'fun'
                self.match_token(&TokenKind::Fun);
                let method = self.function_body_decl("method")?;
                if is_static {
                    static_methods.push(method);
                } else {
                    methods.push(method);
                }
            }
        }

        self.expect(&TokenKind::RightBrace, "'}' after class body")?;

        Ok(Stmt::Class {
            decl: Rc::new(ClassDecl {
                name,
                superclass,
                methods,
                static_methods,
                fields,
                static_fields,
                span,
            }),
        })
    }

    /// `var` is optional on fields: `static count = 0;`
    fn field_declaration(&mut self) -> Result<FieldDecl> {
        let span = self.peek().span;
        self.match_token(&TokenKind::Var);
        let name = self.expect_ident("field name")?;
        let initializer = if self.match_token(&TokenKind::Equal) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(&TokenKind::Semicolon, "';' after field declaration")?;
        Ok(FieldDecl {
            name,
            initializer,
            span,
        })
    }

    fn enum_declaration(&mut self) -> Result<Stmt> {
        let span = self.advance().span; // 'enum'
        let name = self.expect_ident("enum name")?;
        self.expect(&TokenKind::LeftBrace, "'{' before enum body")?;

        let mut variants = Vec::new();
        while !self.check(&TokenKind::RightBrace) {
            variants.push(self.expect_ident("enum variant")?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.expect(&TokenKind::RightBrace, "'}' after enum variants")?;
        Ok(Stmt::Enum { name, variants, span })
    }

    // ==================== Statements ====================

    fn statement(&mut self) -> Result<Stmt> {
        match self.peek().kind {
            TokenKind::Print => self.print_statement(true),
            TokenKind::Put => self.print_statement(false),
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::Do => self.do_while_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::Foreach => self.foreach_statement(),
            TokenKind::Repeat => self.repeat_statement(),
            TokenKind::Loop => {
                let span = self.advance().span;
                let body = Box::new(self.statement()?);
                Ok(Stmt::Loop { body, span })
            }
            TokenKind::Return => self.return_statement(),
            TokenKind::Break => {
                let span = self.advance().span;
                self.expect(&TokenKind::Semicolon, "';' after 'break'")?;
                Ok(Stmt::Break { span })
            }
            TokenKind::Continue => {
                let span = self.advance().span;
                self.expect(&TokenKind::Semicolon, "';' after 'continue'")?;
                Ok(Stmt::Continue { span })
            }
            TokenKind::Throw => {
                let span = self.advance().span;
                let value = self.expression()?;
                self.expect(&TokenKind::Semicolon, "';' after thrown value")?;
                Ok(Stmt::Throw { value, span })
            }
            TokenKind::Try => self.try_statement(),
            TokenKind::Assert => self.assert_statement(),
            TokenKind::LeftBrace => {
                let span = self.advance().span;
                let stmts = self.block_statements()?;
                Ok(Stmt::Block { stmts, span })
            }
            _ => {
                let expr = self.expression()?;
                self.expect(&TokenKind::Semicolon, "';' after expression")?;
                Ok(Stmt::Expr { expr })
            }
        }
    }

    fn print_statement(&mut self, newline: bool) -> Result<Stmt> {
        let span = self.advance().span;
        let expr = self.expression()?;
        self.expect(&TokenKind::Semicolon, "';' after value")?;
        Ok(Stmt::Print { expr, newline, span })
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        let span = self.advance().span; // 'if'

        self.expect(&TokenKind::LeftParen, "'(' after 'if'")?;
        let condition = self.expression()?;
        self.expect(&TokenKind::RightParen, "')' after if condition")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_token(&TokenKind::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            span,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        let span = self.advance().span; // 'while'

        self.expect(&TokenKind::LeftParen, "'(' after 'while'")?;
        let condition = self.expression()?;
        self.expect(&TokenKind::RightParen, "')' after while condition")?;
        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body, span })
    }

    fn do_while_statement(&mut self) -> Result<Stmt> {
        let span = self.advance().span; // 'do'

        let body = Box::new(self.statement()?);
        self.expect(&TokenKind::While, "'while' after do body")?;
        self.expect(&TokenKind::LeftParen, "'(' after 'while'")?;
        let condition = self.expression()?;
        self.expect(&TokenKind::RightParen, "')' after do-while condition")?;
        self.expect(&TokenKind::Semicolon, "';' after do-while")?;

        Ok(Stmt::DoWhile { body, condition, span })
    }

    fn for_statement(&mut self) -> Result<Stmt> {
        let span = self.advance().span; // 'for'
        self.expect(&TokenKind::LeftParen, "'(' after 'for'")?;

        let initializer = if self.match_token(&TokenKind::Semicolon) {
            None
        } else if self.check(&TokenKind::Var) {
            Some(Box::new(self.var_declaration()?))
        } else {
            let expr = self.expression()?;
            self.expect(&TokenKind::Semicolon, "';' after loop initializer")?;
            Some(Box::new(Stmt::Expr { expr }))
        };

        let condition = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&TokenKind::Semicolon, "';' after loop condition")?;

        let increment = if self.check(&TokenKind::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect(&TokenKind::RightParen, "')' after for clauses")?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::For {
            initializer,
            condition,
            increment,
            body,
            span,
        })
    }

    fn foreach_statement(&mut self) -> Result<Stmt> {
        let span = self.advance().span; // 'foreach'
        self.expect(&TokenKind::LeftParen, "'(' after 'foreach'")?;
        self.match_token(&TokenKind::Var);
        let var = self.expect_ident("loop variable name")?;
        self.expect(&TokenKind::In, "'in' after loop variable")?;
        let iterable = self.expression()?;
        self.expect(&TokenKind::RightParen, "')' after foreach target")?;
        let body = Box::new(self.statement()?);

        Ok(Stmt::Foreach {
            var,
            iterable,
            body,
            span,
        })
    }

    fn repeat_statement(&mut self) -> Result<Stmt> {
        let span = self.advance().span; // 'repeat'
        self.expect(&TokenKind::LeftParen, "'(' after 'repeat'")?;
        let count = self.expression()?;
        self.expect(&TokenKind::RightParen, "')' after repeat count")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::Repeat { count, body, span })
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let span = self.advance().span; // 'return'

        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };

        self.expect(&TokenKind::Semicolon, "';' after return value")?;
        Ok(Stmt::Return { value, span })
    }

    fn try_statement(&mut self) -> Result<Stmt> {
        let span = self.advance().span; // 'try'
        self.expect(&TokenKind::LeftBrace, "'{' after 'try'")?;
        let body = self.block_statements()?;

        let mut catch_var = None;
        let mut catch_body = None;
        if self.match_token(&TokenKind::Catch) {
            if self.match_token(&TokenKind::LeftParen) {
                catch_var = Some(self.expect_ident("catch variable name")?);
                self.expect(&TokenKind::RightParen, "')' after catch variable")?;
            }
            self.expect(&TokenKind::LeftBrace, "'{' after 'catch'")?;
            catch_body = Some(self.block_statements()?);
        }

        let finally_body = if self.match_token(&TokenKind::Finally) {
            self.expect(&TokenKind::LeftBrace, "'{' after 'finally'")?;
            Some(self.block_statements()?)
        } else {
            None
        };

        if catch_body.is_none() && finally_body.is_none() {
            return Err(QuillError::at(ErrorKind::BareTry, span));
        }

        Ok(Stmt::Try {
            body,
            catch_var,
            catch_body,
            finally_body,
            span,
        })
    }

    fn assert_statement(&mut self) -> Result<Stmt> {
        let span = self.advance().span; // 'assert'
        let first = self.current;
        let expr = self.expression()?;
        let source = self.source_text(first, self.current);
        self.expect(&TokenKind::Semicolon, "';' after assertion")?;
        Ok(Stmt::Assert { expr, source, span })
    }

    /// Text covered by tokens `[from, to)`
    fn source_text(&self, from: usize, to: usize) -> String {
        let tokens = &self.tokens[from..to];
        match (&self.source, tokens.first(), tokens.last()) {
            (Some(source), Some(first), Some(last)) => source[first.span.start..last.span.end].to_string(),
            _ => tokens
                .iter()
                .map(|t| t.lexeme.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Statements up to and including the closing '}'
    fn block_statements(&mut self) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            stmts.push(self.declaration()?);
        }

        self.expect(&TokenKind::RightBrace, "'}' after block")?;

        Ok(stmts)
    }

    // ==================== Expressions ====================

    fn expression(&mut self) -> Result<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr = self.ternary()?;

        let op = match self.peek().kind {
            TokenKind::Equal => None,
            TokenKind::PlusEqual => Some(BinaryOp::Add),
            TokenKind::MinusEqual => Some(BinaryOp::Sub),
            TokenKind::StarEqual => Some(BinaryOp::Mul),
            TokenKind::SlashEqual => Some(BinaryOp::Div),
            TokenKind::PercentEqual => Some(BinaryOp::Mod),
            _ => return Ok(expr),
        };
        let equals = self.advance().span;
        let value = Box::new(self.assignment()?);

        match expr {
            Expr::Variable { name, id, span } => Ok(Expr::Assign {
                name,
                op,
                value,
                id,
                span,
            }),
            Expr::Get { object, name, span } => Ok(Expr::Set {
                object,
                name,
                op,
                value,
                span,
            }),
            Expr::Index { object, index, span } => Ok(Expr::IndexSet {
                object,
                index,
                op,
                value,
                span,
            }),
            _ => Err(QuillError::at(ErrorKind::InvalidAssignmentTarget, equals)),
        }
    }

    fn ternary(&mut self) -> Result<Expr> {
        let condition = self.or_expr()?;

        if self.match_token(&TokenKind::Question) {
            let then_expr = self.expression()?;
            self.expect(&TokenKind::Colon, "':' in conditional expression")?;
            let else_expr = self.ternary()?;
            let span = condition.span().to(else_expr.span());
            return Ok(Expr::Ternary {
                condition: Box::new(condition),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
                span,
            });
        }

        Ok(condition)
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut left = self.and_expr()?;

        while self.match_token(&TokenKind::OrOr) {
            let right = self.and_expr()?;
            let span = left.span().to(right.span());
            left = Expr::Logical {
                left: Box::new(left),
                op: LogicalOp::Or,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut left = self.bit_or()?;

        while self.match_token(&TokenKind::AndAnd) {
            let right = self.bit_or()?;
            let span = left.span().to(right.span());
            left = Expr::Logical {
                left: Box::new(left),
                op: LogicalOp::And,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    /// One left-associative precedence level
    fn binary_level(
        &mut self,
        operators: &[(TokenKind, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut left = next(self)?;

        'outer: loop {
            for (kind, op) in operators {
                if self.match_token(kind) {
                    let right = next(self)?;
                    let span = left.span().to(right.span());
                    left = Expr::Binary {
                        left: Box::new(left),
                        op: *op,
                        right: Box::new(right),
                        span,
                    };
                    continue 'outer;
                }
            }
            break;
        }

        Ok(left)
    }

    fn bit_or(&mut self) -> Result<Expr> {
        self.binary_level(&[(TokenKind::Pipe, BinaryOp::BitOr)], Self::bit_xor)
    }

    fn bit_xor(&mut self) -> Result<Expr> {
        self.binary_level(&[(TokenKind::Caret, BinaryOp::BitXor)], Self::bit_and)
    }

    fn bit_and(&mut self) -> Result<Expr> {
        self.binary_level(&[(TokenKind::Amp, BinaryOp::BitAnd)], Self::equality)
    }

    fn equality(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                (TokenKind::EqualEqual, BinaryOp::Eq),
                (TokenKind::BangEqual, BinaryOp::Ne),
            ],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                (TokenKind::Less, BinaryOp::Lt),
                (TokenKind::LessEqual, BinaryOp::Le),
                (TokenKind::Greater, BinaryOp::Gt),
                (TokenKind::GreaterEqual, BinaryOp::Ge),
                (TokenKind::In, BinaryOp::In),
            ],
            Self::range,
        )
    }

    fn range(&mut self) -> Result<Expr> {
        let start = self.shift()?;

        if self.match_token(&TokenKind::DotDot) {
            let end = self.shift()?;
            let span = start.span().to(end.span());
            return Ok(Expr::Range {
                start: Box::new(start),
                end: Box::new(end),
                span,
            });
        }

        Ok(start)
    }

    fn shift(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                (TokenKind::LessLess, BinaryOp::Shl),
                (TokenKind::GreaterGreater, BinaryOp::Shr),
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr> {
        self.binary_level(
            &[(TokenKind::Plus, BinaryOp::Add), (TokenKind::Minus, BinaryOp::Sub)],
            Self::factor,
        )
    }

    fn factor(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Mod),
            ],
            Self::unary,
        )
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Tilde => UnaryOp::BitNot,
            _ => return self.power(),
        };
        let span = self.advance().span;
        let operand = self.unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            span,
        })
    }

    /// `**` binds tighter than unary minus on its left and is right-associative
    fn power(&mut self) -> Result<Expr> {
        let base = self.call()?;

        if self.match_token(&TokenKind::StarStar) {
            let exponent = self.unary()?;
            let span = base.span().to(exponent.span());
            return Ok(Expr::Binary {
                left: Box::new(base),
                op: BinaryOp::Pow,
                right: Box::new(exponent),
                span,
            });
        }

        Ok(base)
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_token(&TokenKind::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if self.match_token(&TokenKind::Dot) {
                let name = self.expect_ident("property name after '.'")?;
                let span = expr.span().to(self.previous().span);
                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                    span,
                };
            } else if self.match_token(&TokenKind::LeftBracket) {
                expr = self.finish_index(expr)?;
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let args = self.arguments(&TokenKind::RightParen, "')' after arguments")?;
        let span = callee.span().to(self.previous().span);

        Ok(Expr::Call {
            callee: Box::new(callee),
            args,
            span,
        })
    }

    /// Comma-separated, possibly spread, items through the closing token
    fn arguments(&mut self, close: &TokenKind, message: &str) -> Result<Vec<Arg>> {
        let mut args = Vec::new();

        while !self.check(close) {
            if self.match_token(&TokenKind::Ellipsis) {
                args.push(Arg::Spread(self.expression()?));
            } else {
                args.push(Arg::Plain(self.expression()?));
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.expect(close, message)?;
        Ok(args)
    }

    fn finish_index(&mut self, object: Expr) -> Result<Expr> {
        let start = if self.check(&TokenKind::Colon) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };

        if self.match_token(&TokenKind::Colon) {
            let end = if self.check(&TokenKind::RightBracket) {
                None
            } else {
                Some(Box::new(self.expression()?))
            };
            self.expect(&TokenKind::RightBracket, "']' after slice")?;
            let span = object.span().to(self.previous().span);
            return Ok(Expr::Slice {
                object: Box::new(object),
                start,
                end,
                span,
            });
        }

        self.expect(&TokenKind::RightBracket, "']' after index")?;
        let span = object.span().to(self.previous().span);
        match start {
            Some(index) => Ok(Expr::Index {
                object: Box::new(object),
                index,
                span,
            }),
            None => Err(QuillError::at(
                ErrorKind::ExpectedExpression("]".to_string()),
                span,
            )),
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        let token = self.advance().clone();
        let span = token.span;

        let literal = |value: Literal| -> Result<Expr> { Ok(Expr::Literal { value, span }) };

        match token.kind {
            TokenKind::Int(n) => literal(Literal::Int(n)),
            TokenKind::UInt(n) => literal(Literal::UInt(n)),
            TokenKind::Float(n) => literal(Literal::Float(n)),
            TokenKind::BigInt(digits) => literal(Literal::BigInt(digits)),
            TokenKind::BigFloat(digits) => literal(Literal::BigFloat(digits)),
            TokenKind::String(s) => literal(Literal::String(Rc::from(s))),
            TokenKind::True => literal(Literal::Bool(true)),
            TokenKind::False => literal(Literal::Bool(false)),
            TokenKind::Nil => literal(Literal::Nil),
            TokenKind::Ident(name) => Ok(Expr::Variable {
                name,
                id: NodeId::fresh(),
                span,
            }),
            TokenKind::This => Ok(Expr::This {
                id: NodeId::fresh(),
                span,
            }),
            TokenKind::Super => {
                self.expect(&TokenKind::Dot, "'.' after 'super'")?;
                let method = self.expect_ident("superclass method name")?;
                Ok(Expr::Super {
                    method,
                    id: NodeId::fresh(),
                    span,
                })
            }
            TokenKind::LeftParen => {
                let expr = self.expression()?;
                self.expect(&TokenKind::RightParen, "')' after expression")?;
                Ok(Expr::Grouping {
                    expr: Box::new(expr),
                    span,
                })
            }
            TokenKind::LeftBracket => {
                let items = self.arguments(&TokenKind::RightBracket, "']' after list items")?;
                Ok(Expr::List { items, span })
            }
            TokenKind::LeftBrace => self.dict_literal(span),
            TokenKind::Fun => {
                self.expect(&TokenKind::LeftParen, "'(' after 'fun'")?;
                let (params, rest) = self.parameters()?;
                self.expect(&TokenKind::LeftBrace, "'{' before function body")?;
                let body = self.block_statements()?;
                Ok(Expr::Lambda {
                    decl: Rc::new(FunctionDecl {
                        name: "lambda".to_string(),
                        params,
                        rest,
                        body,
                        span,
                    }),
                    span,
                })
            }
            TokenKind::Pipe => {
                let (params, rest) = self.lambda_parameters()?;
                self.expression_lambda(params, rest, span)
            }
            TokenKind::OrOr => self.expression_lambda(Vec::new(), None, span),
            other => Err(QuillError::at(
                ErrorKind::ExpectedExpression(other.to_string()),
                span,
            )),
        }
    }

    fn dict_literal(&mut self, span: Span) -> Result<Expr> {
        let mut entries = Vec::new();

        while !self.check(&TokenKind::RightBrace) {
            let key = self.expression()?;
            self.expect(&TokenKind::Colon, "':' after dict key")?;
            let value = self.expression()?;
            entries.push((key, value));
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.expect(&TokenKind::RightBrace, "'}' after dict entries")?;
        Ok(Expr::Dict { entries, span })
    }

    /// Parameters between pipes; the opening '|' is consumed
    fn lambda_parameters(&mut self) -> Result<(Vec<String>, Option<String>)> {
        let mut params = Vec::new();
        let mut rest = None;

        while !self.check(&TokenKind::Pipe) {
            if self.match_token(&TokenKind::Ellipsis) {
                rest = Some(self.expect_ident("rest parameter name")?);
                break;
            }
            params.push(self.expect_ident("lambda parameter name")?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.expect(&TokenKind::Pipe, "'|' after lambda parameters")?;
        Ok((params, rest))
    }

    fn expression_lambda(&mut self, params: Vec<String>, rest: Option<String>, span: Span) -> Result<Expr> {
        let body = self.expression()?;
        let body_span = body.span();
        Ok(Expr::Lambda {
            decl: Rc::new(FunctionDecl {
                name: "lambda".to_string(),
                params,
                rest,
                body: vec![Stmt::Return {
                    value: Some(body),
                    span: body_span,
                }],
                span,
            }),
            span,
        })
    }

    // ==================== Helpers ====================

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn peek_is_field(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Ident(_))
            && self
                .tokens
                .get(self.current + 1)
                .is_some_and(|t| matches!(t.kind, TokenKind::Equal | TokenKind::Semicolon))
    }

    fn peek_next_is_ident(&self) -> bool {
        matches!(
            self.tokens.get(self.current + 1).map(|t| &t.kind),
            Some(TokenKind::Ident(_))
        )
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
            self.previous()
        } else {
            self.peek()
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, message: &str) -> Result<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(QuillError::new(
                ErrorKind::ExpectedToken(message.to_string(), format!("{}", self.peek().kind)),
                Some(self.peek().span),
            ))
        }
    }

    fn expect_ident(&mut self, message: &str) -> Result<String> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(QuillError::new(
                ErrorKind::ExpectedToken(message.to_string(), format!("{}", self.peek().kind)),
                Some(self.peek().span),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(source: &str) -> Program {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize().unwrap();
        let mut parser = Parser::new(tokens).with_source(source);
        parser.parse().unwrap()
    }

    fn parse_err(source: &str) -> ErrorKind {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize().unwrap();
        Parser::new(tokens).parse().unwrap_err().kind
    }

    #[test]
    fn test_var_statement() {
        let program = parse("var x = 42;");
        assert_eq!(program.statements.len(), 1);
        match &program.statements[0] {
            Stmt::Var { name, initializer, .. } => {
                assert_eq!(name, "x");
                assert!(initializer.is_some());
            }
            _ => panic!("expected var statement"),
        }
    }

    #[test]
    fn test_function() {
        let program = parse("fun add(a, b, ...more) { return a + b; }");
        match &program.statements[0] {
            Stmt::Function { decl } => {
                assert_eq!(decl.name, "add");
                assert_eq!(decl.params, ["a", "b"]);
                assert_eq!(decl.rest.as_deref(), Some("more"));
            }
            _ => panic!("expected function"),
        }
    }

    #[test]
    fn test_class_members() {
        let program = parse(
            "class B < A { var x = 1; static var count = 0; init(v) { this.x = v; } static make() { return B(1); } get() { return this.x; } }",
        );
        match &program.statements[0] {
            Stmt::Class { decl } => {
                assert_eq!(decl.name, "B");
                assert!(decl.superclass.is_some());
                assert_eq!(decl.fields.len(), 1);
                assert_eq!(decl.static_fields.len(), 1);
                assert_eq!(decl.methods.len(), 2);
                assert_eq!(decl.static_methods.len(), 1);
            }
            _ => panic!("expected class"),
        }
    }

    #[test]
    fn test_if_else() {
        let program = parse("if (x > 0) { print x; } else print 0;");
        match &program.statements[0] {
            Stmt::If { else_branch, .. } => assert!(else_branch.is_some()),
            _ => panic!("expected if statement"),
        }
    }

    #[test]
    fn test_power_binds_tighter_than_negation() {
        let program = parse("-2 ** 2;");
        match &program.statements[0] {
            Stmt::Expr {
                expr: Expr::Unary { op: UnaryOp::Neg, operand, .. },
            } => assert!(matches!(**operand, Expr::Binary { op: BinaryOp::Pow, .. })),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_compound_index_assignment() {
        let program = parse("xs[0] += 2;");
        match &program.statements[0] {
            Stmt::Expr {
                expr: Expr::IndexSet { op, .. },
            } => assert_eq!(*op, Some(BinaryOp::Add)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_slice_forms() {
        let program = parse("xs[1:]; xs[:2]; xs[1:2];");
        assert!(program
            .statements
            .iter()
            .all(|s| matches!(s, Stmt::Expr { expr: Expr::Slice { .. } })));
    }

    #[test]
    fn test_assert_keeps_source_text() {
        let program = parse("assert len(xs) > 2;");
        match &program.statements[0] {
            Stmt::Assert { source, .. } => assert_eq!(source, "len(xs) > 2"),
            _ => panic!("expected assert"),
        }
    }

    #[test]
    fn test_try_requires_handler() {
        assert_eq!(parse_err("try { print 1; }"), ErrorKind::BareTry);
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert_eq!(parse_err("1 + 2 = 3;"), ErrorKind::InvalidAssignmentTarget);
    }

    #[test]
    fn test_lambda_forms() {
        let program = parse("var f = |a, b| a + b; var g = || 1; var h = fun (x) { return x; };");
        assert_eq!(program.statements.len(), 3);
        for stmt in &program.statements {
            match stmt {
                Stmt::Var {
                    initializer: Some(Expr::Lambda { .. }),
                    ..
                } => {}
                other => panic!("expected lambda, got {:?}", other),
            }
        }
    }
}
