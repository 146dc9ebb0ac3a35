//! AST visitor for traversal and per-kind dispatch.
//!
//! Every `visit_*` method defaults to the matching `walk_*` function, which
//! recurses into all child positions. The `walk_*` bodies match on node kinds
//! exhaustively, so adding a kind forces every traversal to be revisited.

use crate::ast::*;

/// Trait for immutable AST visitors
pub trait Visitor: Sized {
    fn visit_module(&mut self, module: &Module) {
        walk_module(self, module);
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block);
    }

    fn visit_fun_decl(&mut self, fun: &FunDecl) {
        walk_fun_decl(self, fun);
    }

    fn visit_fun_param(&mut self, param: &FunParam) {
        walk_fun_param(self, param);
    }

    fn visit_struct_decl(&mut self, decl: &StructDecl) {
        walk_struct_decl(self, decl);
    }

    fn visit_struct_field(&mut self, field: &StructField) {
        walk_struct_field(self, field);
    }

    fn visit_type_ref(&mut self, _ty: &TypeRef) {}

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }

    fn visit_init_arg(&mut self, arg: &InitArg) {
        walk_init_arg(self, arg);
    }
}

pub fn walk_module<V: Visitor>(visitor: &mut V, module: &Module) {
    for decl in &module.decls {
        visitor.visit_stmt(decl);
    }
    for stmt in &module.stmts {
        visitor.visit_stmt(stmt);
    }
}

pub fn walk_stmt<V: Visitor>(visitor: &mut V, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::Expr(expr) => visitor.visit_expr(expr),
        StmtKind::Assign { value, .. } => visitor.visit_expr(value),
        StmtKind::VarDecl { value, .. } => visitor.visit_expr(value),
        StmtKind::Block(block) => visitor.visit_block(block),
        StmtKind::FunDecl(fun) => visitor.visit_fun_decl(fun),
        StmtKind::StructDecl(decl) => visitor.visit_struct_decl(decl),
        StmtKind::Return { value } => visitor.visit_expr(value),
        StmtKind::If { condition, then_branch, else_branch } => {
            visitor.visit_expr(condition);
            visitor.visit_stmt(then_branch);
            if let Some(else_branch) = else_branch {
                visitor.visit_stmt(else_branch);
            }
        }
        StmtKind::While { condition, body } => {
            visitor.visit_expr(condition);
            visitor.visit_block(body);
        }
    }
}

pub fn walk_block<V: Visitor>(visitor: &mut V, block: &Block) {
    for decl in &block.decls {
        visitor.visit_stmt(decl);
    }
    for stmt in &block.stmts {
        visitor.visit_stmt(stmt);
    }
}

pub fn walk_fun_decl<V: Visitor>(visitor: &mut V, fun: &FunDecl) {
    for param in &fun.params {
        visitor.visit_fun_param(param);
    }
    if let Some(return_type) = &fun.return_type {
        visitor.visit_type_ref(return_type);
    }
    visitor.visit_block(&fun.body);
}

pub fn walk_fun_param<V: Visitor>(visitor: &mut V, param: &FunParam) {
    visitor.visit_type_ref(&param.ty);
}

pub fn walk_struct_decl<V: Visitor>(visitor: &mut V, decl: &StructDecl) {
    for field in &decl.fields {
        visitor.visit_struct_field(field);
    }
}

pub fn walk_struct_field<V: Visitor>(visitor: &mut V, field: &StructField) {
    visitor.visit_type_ref(&field.ty);
    if let Some(default) = &field.default {
        visitor.visit_expr(default);
    }
}

pub fn walk_expr<V: Visitor>(visitor: &mut V, expr: &Expr) {
    match &expr.kind {
        ExprKind::Literal(_) => {}
        ExprKind::Identifier { .. } => {}
        ExprKind::Unary { operand, .. } => visitor.visit_expr(operand),
        ExprKind::Binary { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        ExprKind::Call { args, .. } => {
            for arg in args {
                visitor.visit_expr(arg);
            }
        }
        ExprKind::Access { base, .. } => visitor.visit_expr(base),
        ExprKind::Init { args, .. } => {
            for arg in args {
                visitor.visit_init_arg(arg);
            }
        }
    }
}

pub fn walk_init_arg<V: Visitor>(visitor: &mut V, arg: &InitArg) {
    visitor.visit_expr(&arg.expr);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use rill_alloc::HeapAlloc;
    use rill_common::SourceBuffer;
    use rill_lexer::lex;

    #[derive(Default)]
    struct Counter {
        exprs: usize,
        stmts: usize,
        funs: usize,
    }

    impl Visitor for Counter {
        fn visit_stmt(&mut self, stmt: &Stmt) {
            self.stmts += 1;
            walk_stmt(self, stmt);
        }

        fn visit_expr(&mut self, expr: &Expr) {
            self.exprs += 1;
            walk_expr(self, expr);
        }

        fn visit_fun_decl(&mut self, fun: &FunDecl) {
            self.funs += 1;
            walk_fun_decl(self, fun);
        }
    }

    #[test]
    fn default_walk_reaches_every_child() {
        let heap = HeapAlloc::new();
        let source = SourceBuffer::new(
            "<test>",
            "fun add(a: int, b: int) int { return a + b } add(1, 2) * 3",
        );
        let tree = parse(lex(&source, &heap).unwrap()).unwrap();
        let mut counter = Counter::default();
        counter.visit_module(&tree.module);
        assert_eq!(counter.funs, 1);
        // return; and the expression statement
        assert_eq!(counter.stmts, 3);
        // a, b, a+b, add(1,2), 1, 2, 3, add(1,2)*3
        assert_eq!(counter.exprs, 8);
    }
}
