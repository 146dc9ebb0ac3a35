//! Graphviz rendering of a grammar tree, built on the visitor

use crate::ast::*;
use crate::parser::GrammarTree;
use crate::visitor::{self, Visitor};
use rill_lexer::TokenStream;
use std::fmt::Write as _;

/// Render the tree as a `digraph` suitable for `dot -Tsvg`.
pub fn write_dot(tree: &GrammarTree<'_>) -> String {
    let mut writer = DotWriter {
        tokens: &tree.tokens,
        out: String::from("digraph ast {\n    node [shape=box, fontname=\"monospace\"];\n"),
        next_id: 0,
        parents: Vec::new(),
    };
    let root = writer.node("Module");
    writer.parents.push(root);
    writer.visit_module(&tree.module);
    writer.out.push_str("}\n");
    writer.out
}

struct DotWriter<'t, 'a> {
    tokens: &'t TokenStream<'a>,
    out: String,
    next_id: usize,
    parents: Vec<usize>,
}

impl<'t, 'a> DotWriter<'t, 'a> {
    fn node(&mut self, label: &str) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        let escaped = label.replace('\\', "\\\\").replace('"', "\\\"");
        let _ = writeln!(self.out, "    n{id} [label=\"{escaped}\"];");
        if let Some(parent) = self.parents.last() {
            let _ = writeln!(self.out, "    n{parent} -> n{id};");
        }
        id
    }

    fn child<F: FnOnce(&mut Self)>(&mut self, label: &str, walk: F) {
        let id = self.node(label);
        self.parents.push(id);
        walk(self);
        self.parents.pop();
    }

    fn name(&self, istr: rill_lexer::Istr) -> &str {
        self.tokens.pool().get(istr)
    }
}

impl<'t, 'a> Visitor for DotWriter<'t, 'a> {
    fn visit_stmt(&mut self, stmt: &Stmt) {
        let label = match &stmt.kind {
            StmtKind::Expr(_) => "ExprStmt".to_string(),
            StmtKind::Assign { name, .. } => format!("Assign {}", self.name(*name)),
            StmtKind::VarDecl { name, decl_offset, .. } => {
                format!("VarDecl {} #{decl_offset}", self.name(*name))
            }
            StmtKind::Block(block) => format!("Block id={}", block.id),
            StmtKind::FunDecl(fun) => format!("FunDecl {}", self.name(fun.name)),
            StmtKind::StructDecl(decl) => format!("Struct {}", self.name(decl.name)),
            StmtKind::Return { .. } => "Return".to_string(),
            StmtKind::If { .. } => "If".to_string(),
            StmtKind::While { .. } => "While".to_string(),
        };
        self.child(&label, |w| visitor::walk_stmt(w, stmt));
    }

    fn visit_block(&mut self, block: &Block) {
        let label = format!("Block id={} parent={}", block.id, block.parent);
        self.child(&label, |w| visitor::walk_block(w, block));
    }

    fn visit_fun_param(&mut self, param: &FunParam) {
        let label = format!("Param {}: {}", self.name(param.name), self.name(param.ty.name));
        self.child(&label, |w| visitor::walk_fun_param(w, param));
    }

    fn visit_struct_field(&mut self, field: &StructField) {
        let label = format!("Field {}: {}", self.name(field.name), self.name(field.ty.name));
        self.child(&label, |w| visitor::walk_struct_field(w, field));
    }

    fn visit_expr(&mut self, expr: &Expr) {
        let label = match &expr.kind {
            ExprKind::Literal(LiteralValue::Int(value)) => format!("Int {value}"),
            ExprKind::Literal(LiteralValue::Real(value)) => format!("Real {value}"),
            ExprKind::Literal(LiteralValue::Bool(value)) => format!("Bool {value}"),
            ExprKind::Literal(LiteralValue::Str(istr)) => format!("Str \"{}\"", self.name(*istr)),
            ExprKind::Identifier { name, .. } => format!("Ident {}", self.name(*name)),
            ExprKind::Unary { op, .. } => format!("Unary {op}"),
            ExprKind::Binary { op, .. } => format!("Binary {op}"),
            ExprKind::Call { name, .. } => format!("Call {}", self.name(*name)),
            ExprKind::Access { field, .. } => format!("Access .{}", self.name(*field)),
            ExprKind::Init { name, .. } => format!("Init {}", self.name(*name)),
        };
        self.child(&label, |w| visitor::walk_expr(w, expr));
    }

    fn visit_init_arg(&mut self, arg: &InitArg) {
        let label = match arg.name {
            Some(name) => format!("InitArg {} =", self.name(name)),
            None => format!("InitArg #{}", arg.position),
        };
        self.child(&label, |w| visitor::walk_init_arg(w, arg));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;
    use rill_alloc::HeapAlloc;
    use rill_common::SourceBuffer;
    use rill_lexer::lex;

    #[test]
    fn renders_a_digraph_with_edges() {
        let heap = HeapAlloc::new();
        let source = SourceBuffer::new("<test>", "a := 1 + 2 a");
        let tree = parse(lex(&source, &heap).unwrap()).unwrap();
        let dot = write_dot(&tree);
        assert!(dot.starts_with("digraph ast {"));
        assert!(dot.contains("VarDecl a"));
        assert!(dot.contains("Binary +"));
        assert!(dot.contains("->"));
        assert!(dot.ends_with("}\n"));
    }
}
