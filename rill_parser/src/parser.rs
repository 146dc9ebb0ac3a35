//! Pratt parser producing a grammar tree

use crate::ast::*;
use crate::precedence::Precedence;
use rill_common::{Diagnostics, RillError, RillResult, Span};
use rill_lexer::{Istr, TokenIdx, TokenKind, TokenStream};

/// The parser's output: the owned module tree, the token stream it indexes
/// into, and the number of lexical scopes that were opened.
pub struct GrammarTree<'a> {
    pub module: Module,
    pub tokens: TokenStream<'a>,
    pub block_count: u32,
}

/// Parse a token stream into a grammar tree rooted at a module node.
///
/// The parser does not attempt synchronisation: the first error renders a
/// diagnostic with a source excerpt and fails the whole stage.
pub fn parse(tokens: TokenStream<'_>) -> RillResult<GrammarTree<'_>> {
    let parsed = {
        let mut parser = Parser {
            tokens: &tokens,
            current: 0,
            block_count: 0,
            current_block: 0,
            decl_counter: 0,
            body_follows: false,
            diagnostics: Diagnostics::new(),
        };
        let parsed = parser.module();
        if let Err(ref error) = parsed {
            log::debug!(target: "parser", "parse failed: {error}");
            parser.diagnostics.emit(tokens.source(), "parser");
        }
        parsed
    };
    let (module, block_count) = parsed?;
    Ok(GrammarTree { module, tokens, block_count })
}

struct Parser<'t, 'a> {
    tokens: &'t TokenStream<'a>,
    current: TokenIdx,
    block_count: u32,
    current_block: BlockId,
    /// Declaration slots handed out in the current frame (module or function).
    decl_counter: u32,
    /// Set while parsing a condition that is directly followed by a body,
    /// which suppresses the `{` initializer rule.
    body_follows: bool,
    diagnostics: Diagnostics,
}

/// Stable partition: declarations first, both partitions in source order.
fn partition_decls(nodes: Vec<Stmt>) -> (Vec<Stmt>, Vec<Stmt>) {
    let mut decls = Vec::new();
    let mut stmts = Vec::new();
    for node in nodes {
        if node.is_declaration() {
            decls.push(node);
        } else {
            stmts.push(node);
        }
    }
    (decls, stmts)
}

impl<'t, 'a> Parser<'t, 'a> {
    fn kind(&self) -> TokenKind {
        self.tokens.kind(self.current)
    }

    fn peek_kind(&self) -> TokenKind {
        let next = (self.current + 1).min(self.tokens.len() as TokenIdx - 1);
        self.tokens.kind(next)
    }

    fn text(&self) -> &str {
        self.tokens.text(self.current)
    }

    fn payload(&self) -> Istr {
        self.tokens.payload(self.current)
    }

    fn span(&self) -> Span {
        self.tokens.span(self.current)
    }

    fn advance(&mut self) {
        if (self.current as usize) < self.tokens.len() - 1 {
            self.current += 1;
        }
    }

    fn error(&mut self, message: String) -> RillError {
        let span = self.span();
        self.diagnostics.error(&message, span);
        RillError::parse_error(message)
    }

    fn error_here(&mut self, expectation: &str) -> RillError {
        self.error(format!("{expectation}, got '{}'", self.text()))
    }

    fn expect(&mut self, kind: TokenKind, expectation: &str) -> RillResult<TokenIdx> {
        if self.kind() == kind {
            let index = self.current;
            self.advance();
            Ok(index)
        } else {
            Err(self.error_here(expectation))
        }
    }

    /// Expect an identifier and return its interned name.
    fn expect_ident(&mut self, expectation: &str) -> RillResult<(Istr, TokenIdx)> {
        if self.kind() == TokenKind::Ident {
            let name = self.payload();
            let index = self.current;
            self.advance();
            Ok((name, index))
        } else {
            Err(self.error_here(expectation))
        }
    }

    fn module(&mut self) -> RillResult<(Module, u32)> {
        let first = self.current;
        let mut nodes = Vec::new();
        while self.kind() != TokenKind::Eof {
            nodes.push(self.statement()?);
        }
        let (decls, stmts) = partition_decls(nodes);
        let module = Module {
            decls,
            stmts,
            span: TokenSpan::new(first, self.current),
            frame_slots: None,
        };
        Ok((module, self.block_count))
    }

    fn statement(&mut self) -> RillResult<Stmt> {
        match self.kind() {
            TokenKind::Ident => {
                if self.peek_kind() == TokenKind::ColonAssign {
                    self.var_decl()
                } else if self.peek_kind() == TokenKind::Assign {
                    self.assign_stmt()
                } else {
                    self.expression_stmt()
                }
            }
            TokenKind::Int
            | TokenKind::Real
            | TokenKind::Str
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Minus
            | TokenKind::Not
            | TokenKind::Bang
            | TokenKind::LParen => self.expression_stmt(),
            TokenKind::LBrace => {
                let block = self.block()?;
                let span = block.span;
                Ok(Stmt::new(StmtKind::Block(block), span))
            }
            TokenKind::If => self.if_stmt(),
            TokenKind::While => self.while_stmt(),
            TokenKind::Fun => self.fun_decl(),
            TokenKind::Return => self.return_stmt(),
            TokenKind::Struct => self.struct_decl(),
            TokenKind::Eof => Err(self.error("Unexpected end of input".to_string())),
            _ => Err(self.error(format!("Unexpected token '{}'", self.text()))),
        }
    }

    fn expression_stmt(&mut self) -> RillResult<Stmt> {
        let expr = self.expression()?;
        let span = expr.span;
        Ok(Stmt::new(StmtKind::Expr(expr), span))
    }

    fn expression(&mut self) -> RillResult<Expr> {
        self.parse_precedence(Precedence::Assignment)
    }

    fn parse_precedence(&mut self, min: Precedence) -> RillResult<Expr> {
        let mut left = self.prefix()?;
        loop {
            let kind = self.kind();
            if Precedence::of(kind) < min {
                break;
            }
            // Brace initializers are suppressed while the expression is the
            // condition of an if/while, to keep `if x { … }` unambiguous.
            if kind == TokenKind::LBrace && self.body_follows {
                break;
            }
            left = self.infix(left)?;
        }
        Ok(left)
    }

    fn prefix(&mut self) -> RillResult<Expr> {
        match self.kind() {
            TokenKind::Int | TokenKind::Real | TokenKind::Str | TokenKind::True
            | TokenKind::False => self.literal(),
            TokenKind::Ident => self.identifier(),
            TokenKind::Minus | TokenKind::Not | TokenKind::Bang => self.unary(),
            TokenKind::LParen => self.group(),
            _ => Err(self.error_here("Expected expression")),
        }
    }

    fn infix(&mut self, left: Expr) -> RillResult<Expr> {
        match self.kind() {
            kind if kind.is_binary_operator() => self.binary(left),
            TokenKind::LParen => self.call(left),
            TokenKind::Dot => self.access(left),
            TokenKind::LBrace => self.init(left),
            TokenKind::Assign => Err(self.error_here("Expected identifier before '=' token")),
            _ => Err(self.error_here("Expected operator")),
        }
    }

    fn literal(&mut self) -> RillResult<Expr> {
        let start = self.current;
        let value = match self.kind() {
            TokenKind::True => LiteralValue::Bool(true),
            TokenKind::False => LiteralValue::Bool(false),
            TokenKind::Int => {
                let text = self.text();
                let parsed = text
                    .parse::<i64>()
                    .map_err(|_| format!("Integer literal out of range: '{text}'"));
                match parsed {
                    Ok(value) => LiteralValue::Int(value),
                    Err(message) => return Err(self.error(message)),
                }
            }
            TokenKind::Real => {
                let text = self.text();
                let parsed = text
                    .parse::<f64>()
                    .map_err(|_| format!("Malformed real literal: '{text}'"));
                match parsed {
                    Ok(value) => LiteralValue::Real(value),
                    Err(message) => return Err(self.error(message)),
                }
            }
            TokenKind::Str => LiteralValue::Str(self.payload()),
            _ => return Err(self.error_here("Expected literal")),
        };
        self.advance();
        Ok(Expr::new(ExprKind::Literal(value), TokenSpan::single(start)))
    }

    fn identifier(&mut self) -> RillResult<Expr> {
        let start = self.current;
        let name = self.payload();
        self.advance();
        Ok(Expr::new(ExprKind::Identifier { name, slot: None }, TokenSpan::single(start)))
    }

    fn unary(&mut self) -> RillResult<Expr> {
        let start = self.current;
        let op = match self.kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Not | TokenKind::Bang => UnaryOp::Not,
            _ => return Err(self.error_here("Expected unary operator")),
        };
        self.advance();
        let operand = self.parse_precedence(Precedence::Unary)?;
        let span = TokenSpan::new(start, operand.span.end);
        Ok(Expr::new(ExprKind::Unary { op, operand: Box::new(operand) }, span))
    }

    fn binary(&mut self, left: Expr) -> RillResult<Expr> {
        let kind = self.kind();
        let op = match kind {
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Mod,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::BangEq => BinaryOp::Ne,
            TokenKind::Ge => BinaryOp::Ge,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::And => BinaryOp::And,
            TokenKind::Or => BinaryOp::Or,
            _ => return Err(self.error_here("Expected binary operator")),
        };
        self.advance();
        let right = self.parse_precedence(Precedence::of(kind).next())?;
        let span = TokenSpan::new(left.span.start, right.span.end);
        Ok(Expr::new(
            ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) },
            span,
        ))
    }

    fn call(&mut self, left: Expr) -> RillResult<Expr> {
        let ExprKind::Identifier { name, .. } = left.kind else {
            return Err(self.error_here("Expected identifier before '(' token"));
        };
        let start = left.span.start;
        self.advance();

        let mut args = Vec::new();
        while self.kind() != TokenKind::RParen && self.kind() != TokenKind::Eof {
            args.push(self.expression()?);
            if self.kind() == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        let end = self.expect(TokenKind::RParen, "Expected ')' after argument list")?;
        Ok(Expr::new(
            ExprKind::Call { name, args, fun_id: None },
            TokenSpan::new(start, end),
        ))
    }

    fn access(&mut self, left: Expr) -> RillResult<Expr> {
        if !matches!(left.kind, ExprKind::Identifier { .. } | ExprKind::Access { .. }) {
            return Err(self.error_here("Expected identifier before '.' token"));
        }
        let start = left.span.start;
        self.advance();
        let (field, end) = self.expect_ident("Expected field name after '.'")?;
        Ok(Expr::new(
            ExprKind::Access { base: Box::new(left), field, slot: None },
            TokenSpan::new(start, end),
        ))
    }

    fn init(&mut self, left: Expr) -> RillResult<Expr> {
        let ExprKind::Identifier { name, .. } = left.kind else {
            return Err(self.error_here("Expected identifier before '{' token"));
        };
        let start = left.span.start;
        self.advance();

        let mut args = Vec::new();
        while self.kind() != TokenKind::RBrace && self.kind() != TokenKind::Eof {
            args.push(self.init_arg(args.len() as u32)?);
            if self.kind() == TokenKind::Comma {
                self.advance();
            }
        }
        let end = self.expect(TokenKind::RBrace, "Expected '}' after initializer list")?;
        Ok(Expr::new(ExprKind::Init { name, args }, TokenSpan::new(start, end)))
    }

    fn init_arg(&mut self, position: u32) -> RillResult<InitArg> {
        let start = self.current;
        let name = if self.kind() == TokenKind::Ident && self.peek_kind() == TokenKind::Assign {
            let name = self.payload();
            self.advance();
            self.advance();
            Some(name)
        } else {
            None
        };
        let expr = self.expression()?;
        let span = TokenSpan::new(start, expr.span.end);
        Ok(InitArg { name, position, expr, span, field_index: None })
    }

    fn group(&mut self) -> RillResult<Expr> {
        self.advance();
        let expr = self.expression()?;
        self.expect(TokenKind::RParen, "Expected ')' after expression")?;
        Ok(expr)
    }

    fn parse_type(&mut self) -> RillResult<TypeRef> {
        if self.kind() != TokenKind::Ident {
            return Err(self.error_here("Expected type identifier"));
        }
        let name = self.payload();
        let span = TokenSpan::single(self.current);
        self.advance();
        Ok(TypeRef { name, span, resolved: None })
    }

    fn var_decl(&mut self) -> RillResult<Stmt> {
        let (name, start) = self.expect_ident("Expected identifier")?;
        self.expect(TokenKind::ColonAssign, "Expected ':=' after identifier")?;
        let value = self.expression()?;
        let decl_offset = self.decl_counter;
        self.decl_counter += 1;
        let span = TokenSpan::new(start, value.span.end);
        Ok(Stmt::new(
            StmtKind::VarDecl { name, decl_offset, value, slot: None, ty: None },
            span,
        ))
    }

    fn assign_stmt(&mut self) -> RillResult<Stmt> {
        let (name, start) = self.expect_ident("Expected identifier")?;
        self.expect(TokenKind::Assign, "Expected '=' after identifier")?;
        let value = self.expression()?;
        let span = TokenSpan::new(start, value.span.end);
        Ok(Stmt::new(StmtKind::Assign { name, value, slot: None }, span))
    }

    /// Parse a braced scope. The caller decides whether it opens a fresh
    /// frame (function bodies) or shares the enclosing one.
    fn block(&mut self) -> RillResult<Block> {
        let start = self.expect(TokenKind::LBrace, "Expected '{' token")?;
        self.block_count += 1;
        let id = self.block_count;
        let parent = self.current_block;
        let previous_block = std::mem::replace(&mut self.current_block, id);

        let mut nodes = Vec::new();
        while self.kind() != TokenKind::RBrace && self.kind() != TokenKind::Eof {
            nodes.push(self.statement()?);
        }
        let end = self.expect(TokenKind::RBrace, "Expected '}' token after block")?;
        self.current_block = previous_block;

        let (decls, stmts) = partition_decls(nodes);
        Ok(Block { id, parent, decls, stmts, span: TokenSpan::new(start, end) })
    }

    fn if_stmt(&mut self) -> RillResult<Stmt> {
        let start = self.current;
        self.advance();

        self.body_follows = true;
        let condition = self.expression()?;
        self.body_follows = false;

        let then_form = self.kind() == TokenKind::Then;
        let then_branch = if then_form {
            self.advance();
            self.statement()?
        } else {
            let block = self.block()?;
            let span = block.span;
            Stmt::new(StmtKind::Block(block), span)
        };

        let else_branch = if self.kind() == TokenKind::Else {
            self.advance();
            let branch = if self.kind() == TokenKind::If {
                self.if_stmt()?
            } else if then_form {
                self.statement()?
            } else {
                let block = self.block()?;
                let span = block.span;
                Stmt::new(StmtKind::Block(block), span)
            };
            Some(Box::new(branch))
        } else {
            None
        };

        let end = else_branch.as_ref().map(|b| b.span.end).unwrap_or(then_branch.span.end);
        Ok(Stmt::new(
            StmtKind::If {
                condition,
                then_branch: Box::new(then_branch),
                else_branch,
            },
            TokenSpan::new(start, end),
        ))
    }

    fn while_stmt(&mut self) -> RillResult<Stmt> {
        let start = self.current;
        self.advance();

        self.body_follows = true;
        let condition = self.expression()?;
        self.body_follows = false;

        let body = self.block()?;
        let span = TokenSpan::new(start, body.span.end);
        Ok(Stmt::new(StmtKind::While { condition, body }, span))
    }

    fn return_stmt(&mut self) -> RillResult<Stmt> {
        let start = self.current;
        self.advance();
        let value = self.expression()?;
        let span = TokenSpan::new(start, value.span.end);
        Ok(Stmt::new(StmtKind::Return { value }, span))
    }

    fn fun_param(&mut self, offset: u32) -> RillResult<FunParam> {
        let (name, start) = self.expect_ident("Expected identifier in fun param")?;
        self.expect(TokenKind::Colon, "Expected ':' after identifier")?;
        let ty = self.parse_type()?;
        let span = TokenSpan::new(start, ty.span.end);
        Ok(FunParam { name, offset, ty, span })
    }

    fn fun_decl(&mut self) -> RillResult<Stmt> {
        let start = self.current;
        self.advance();

        let (name, _) = self.expect_ident("Expected identifier after 'fun' token")?;
        self.expect(TokenKind::LParen, "Expected '(' after identifier")?;

        let mut params = Vec::new();
        while self.kind() != TokenKind::RParen && self.kind() != TokenKind::Eof {
            params.push(self.fun_param(params.len() as u32)?);
            if self.kind() == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::RParen, "Expected ')' after parameter list")?;

        let return_type =
            if self.kind() != TokenKind::LBrace { Some(self.parse_type()?) } else { None };

        // A function body opens a fresh frame: its declarations restart at
        // slot 0, after the parameters.
        let previous_decls = std::mem::replace(&mut self.decl_counter, params.len() as u32);
        let body = self.block()?;
        self.decl_counter = previous_decls;

        let span = TokenSpan::new(start, body.span.end);
        Ok(Stmt::new(
            StmtKind::FunDecl(FunDecl {
                name,
                params,
                return_type,
                body,
                span,
                fun_id: None,
                frame_slots: None,
            }),
            span,
        ))
    }

    fn struct_field(&mut self, offset: u32) -> RillResult<StructField> {
        let (name, start) = self.expect_ident("Expected identifier in struct field")?;
        self.expect(TokenKind::Colon, "Expected ':' after identifier in struct field")?;
        let ty = self.parse_type()?;
        let default = if self.kind() == TokenKind::Assign {
            self.advance();
            Some(self.expression()?)
        } else {
            None
        };
        let end = default.as_ref().map(|e| e.span.end).unwrap_or(ty.span.end);
        Ok(StructField { name, offset, ty, default, span: TokenSpan::new(start, end) })
    }

    fn struct_decl(&mut self) -> RillResult<Stmt> {
        let start = self.current;
        self.advance();

        let (name, _) = self.expect_ident("Expected identifier after 'struct' token")?;
        self.expect(TokenKind::LBrace, "Expected '{' after identifier")?;

        self.block_count += 1;
        let id = self.block_count;
        let parent = self.current_block;

        let mut fields = Vec::new();
        while self.kind() != TokenKind::RBrace && self.kind() != TokenKind::Eof {
            fields.push(self.struct_field(fields.len() as u32)?);
        }
        let end = self.expect(TokenKind::RBrace, "Expected '}' token after struct body")?;

        Ok(Stmt::new(
            StmtKind::StructDecl(StructDecl {
                id,
                parent,
                name,
                fields,
                span: TokenSpan::new(start, end),
            }),
            TokenSpan::new(start, end),
        ))
    }
}
