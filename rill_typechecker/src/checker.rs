//! Type checking implementation.
//!
//! The checker walks the grammar tree once per scope in two phases: function
//! and struct declarations first (the parser already hoists them, which is
//! what makes forward and mutually-recursive references work), then bodies
//! and statements. Resolution results are written into the tree in place:
//! expression types, frame slots, call targets and frame sizes.

use crate::env::{ScopeStack, VarInfo};
use crate::types::{FieldLayout, FunInfo, StructLayout, PRINT_FUN_ID};
use hashbrown::HashMap;
use rill_common::{Diagnostics, RillError, RillResult, Span};
use rill_lexer::{Istr, TokenStream};
use rill_parser::{
    BinaryOp, Expr, ExprKind, FunDecl, GrammarTree, Module, Stmt, StmtKind, StructDecl, TokenSpan,
    Ty, TypeRef, UnaryOp,
};

/// The checked tree: the module with annotations resolved in place, plus the
/// signature and layout tables the code generator consumes.
pub struct TypedTree<'a> {
    pub module: Module,
    pub tokens: TokenStream<'a>,
    pub functions: Vec<FunInfo>,
    pub structs: HashMap<Istr, StructLayout>,
    pub block_count: u32,
}

/// Check a grammar tree. The first error renders a diagnostic and fails the
/// stage; the partially annotated tree is discarded with it.
pub fn check(tree: GrammarTree<'_>) -> RillResult<TypedTree<'_>> {
    let GrammarTree { mut module, mut tokens, block_count } = tree;
    let print_name = tokens.pool_mut().intern("print");

    let checked = {
        let mut checker = Checker {
            tokens: &tokens,
            scopes: ScopeStack::new(),
            functions: Vec::new(),
            structs: HashMap::new(),
            current_frame: 0,
            next_frame: 0,
            frame_next_slot: 0,
            current_return: None,
            diagnostics: Diagnostics::new(),
        };
        let checked = checker.check_module(&mut module, print_name);
        if checked.is_err() {
            checker.diagnostics.emit(tokens.source(), "checker");
        }
        checked.map(|()| (checker.functions, checker.structs))
    };
    let (functions, structs) = checked?;
    Ok(TypedTree { module, tokens, functions, structs, block_count })
}

struct Checker<'t, 'a> {
    tokens: &'t TokenStream<'a>,
    scopes: ScopeStack,
    functions: Vec<FunInfo>,
    structs: HashMap<Istr, StructLayout>,
    current_frame: u32,
    next_frame: u32,
    /// Next free slot in the current frame; monotone, never reused.
    frame_next_slot: u32,
    /// Return type of the enclosing function; `None` at module scope.
    current_return: Option<Ty>,
    diagnostics: Diagnostics,
}

impl<'t, 'a> Checker<'t, 'a> {
    fn name(&self, istr: Istr) -> &str {
        self.tokens.pool().get(istr)
    }

    fn span(&self, span: TokenSpan) -> Span {
        self.tokens.span_of_range(span.start, span.end)
    }

    fn error(&mut self, message: String, span: TokenSpan) -> RillError {
        let byte_span = self.span(span);
        self.diagnostics.error(&message, byte_span);
        RillError::type_error(message)
    }

    fn size_of(&self, ty: Ty) -> u32 {
        match ty {
            Ty::Struct(name) => self.structs[&name].slots,
            Ty::Void => 0,
            _ => 1,
        }
    }

    fn check_module(&mut self, module: &mut Module, print_name: Istr) -> RillResult<()> {
        // Root scope holds the builtins; the module scope may shadow them.
        self.scopes.open(0);
        debug_assert_eq!(self.functions.len() as u32, PRINT_FUN_ID);
        self.functions.push(FunInfo {
            name: print_name,
            params: vec![Ty::Str],
            ret: Ty::Void,
            builtin: true,
        });
        self.scopes.current().funs.insert(print_name, PRINT_FUN_ID);

        self.scopes.open(0);
        self.declare_all(&mut module.decls)?;
        self.check_decl_bodies(&mut module.decls)?;
        for stmt in &mut module.stmts {
            self.check_stmt(stmt)?;
        }
        self.scopes.close();
        self.scopes.close();

        module.frame_slots = Some(self.frame_next_slot);
        log::debug!(
            target: "checker",
            "checked module: {} functions, {} structs, {} global slots",
            self.functions.len(),
            self.structs.len(),
            self.frame_next_slot
        );
        Ok(())
    }

    /// Phase one: register every declaration of the scope, in source order.
    fn declare_all(&mut self, decls: &mut [Stmt]) -> RillResult<()> {
        for stmt in decls.iter_mut() {
            match &mut stmt.kind {
                StmtKind::StructDecl(decl) => self.declare_struct(decl)?,
                StmtKind::FunDecl(fun) => self.declare_fun(fun)?,
                _ => unreachable!("non-declaration in the declaration partition"),
            }
        }
        Ok(())
    }

    /// Phase two: struct field defaults first (initializers anywhere in the
    /// scope rely on them), then function bodies.
    fn check_decl_bodies(&mut self, decls: &mut [Stmt]) -> RillResult<()> {
        for stmt in decls.iter_mut() {
            if let StmtKind::StructDecl(decl) = &mut stmt.kind {
                self.check_struct_defaults(decl)?;
            }
        }
        for stmt in decls.iter_mut() {
            if let StmtKind::FunDecl(fun) = &mut stmt.kind {
                self.check_fun_body(fun)?;
            }
        }
        Ok(())
    }

    fn declare_struct(&mut self, decl: &mut StructDecl) -> RillResult<()> {
        if self.structs.contains_key(&decl.name) {
            let message = format!("Struct '{}' is already defined", self.name(decl.name));
            return Err(self.error(message, decl.span));
        }

        let mut fields = Vec::with_capacity(decl.fields.len());
        let mut offset = 0u32;
        for field in &mut decl.fields {
            let ty = self.resolve_type(&mut field.ty, false, true)?;
            fields.push(FieldLayout { name: field.name, ty, offset });
            offset += self.size_of(ty);
        }
        if fields.iter().enumerate().any(|(i, f)| fields[..i].iter().any(|g| g.name == f.name)) {
            let message = format!("Struct '{}' has a duplicate field", self.name(decl.name));
            return Err(self.error(message, decl.span));
        }

        let defaults = vec![None; fields.len()];
        self.structs
            .insert(decl.name, StructLayout { name: decl.name, fields, defaults, slots: offset });
        self.scopes.current().structs.insert(decl.name);
        Ok(())
    }

    fn check_struct_defaults(&mut self, decl: &mut StructDecl) -> RillResult<()> {
        let mut defaults = Vec::with_capacity(decl.fields.len());
        for (index, field) in decl.fields.iter_mut().enumerate() {
            match &mut field.default {
                Some(expr) => {
                    let ty = self.check_expr(expr)?;
                    let field_ty = self.structs[&decl.name].fields[index].ty;
                    if ty != field_ty {
                        let message = format!(
                            "Default for field '{}' has type {ty}, expected {field_ty}",
                            self.name(field.name)
                        );
                        return Err(self.error(message, field.span));
                    }
                    defaults.push(Some(expr.clone()));
                }
                None => defaults.push(None),
            }
        }
        self.structs.get_mut(&decl.name).expect("struct was declared").defaults = defaults;
        Ok(())
    }

    fn declare_fun(&mut self, fun: &mut FunDecl) -> RillResult<()> {
        if self.scopes.current().funs.contains_key(&fun.name) {
            let message =
                format!("Function '{}' is already defined in this scope", self.name(fun.name));
            return Err(self.error(message, fun.span));
        }

        let mut params = Vec::with_capacity(fun.params.len());
        for param in &mut fun.params {
            params.push(self.resolve_type(&mut param.ty, false, false)?);
        }
        let ret = match &mut fun.return_type {
            Some(type_ref) => self.resolve_type(type_ref, true, false)?,
            None => Ty::Void,
        };

        let fun_id = self.functions.len() as u32;
        self.functions.push(FunInfo { name: fun.name, params, ret, builtin: false });
        self.scopes.current().funs.insert(fun.name, fun_id);
        fun.fun_id = Some(fun_id);
        Ok(())
    }

    fn check_fun_body(&mut self, fun: &mut FunDecl) -> RillResult<()> {
        let fun_id = fun.fun_id.expect("function was declared");
        let saved_frame = self.current_frame;
        let saved_slot = self.frame_next_slot;
        let saved_return = self.current_return;

        self.next_frame += 1;
        self.current_frame = self.next_frame;
        self.frame_next_slot = fun.params.len() as u32;
        self.current_return = Some(self.functions[fun_id as usize].ret);

        self.scopes.open(self.current_frame);
        for param in &fun.params {
            let ty = param.ty.resolved.expect("parameter type was resolved");
            if self.scopes.current().vars.contains_key(&param.name) {
                let message = format!("Duplicate parameter '{}'", self.name(param.name));
                return Err(self.error(message, param.span));
            }
            self.scopes.current().vars.insert(param.name, VarInfo { ty, slot: param.offset });
        }
        self.check_block_scoped(&mut fun.body)?;
        self.scopes.close();

        fun.frame_slots = Some(self.frame_next_slot);

        self.current_frame = saved_frame;
        self.frame_next_slot = saved_slot;
        self.current_return = saved_return;
        Ok(())
    }

    fn check_block_scoped(&mut self, block: &mut rill_parser::Block) -> RillResult<()> {
        self.scopes.open(self.current_frame);
        self.declare_all(&mut block.decls)?;
        self.check_decl_bodies(&mut block.decls)?;
        for stmt in &mut block.stmts {
            self.check_stmt(stmt)?;
        }
        self.scopes.close();
        Ok(())
    }

    fn check_stmt(&mut self, stmt: &mut Stmt) -> RillResult<()> {
        let stmt_span = stmt.span;
        match &mut stmt.kind {
            StmtKind::Expr(expr) => {
                let ty = self.check_expr(expr)?;
                if ty.is_struct() {
                    let message = format!("A value of type {ty} cannot be used here");
                    return Err(self.error(message, stmt_span));
                }
                Ok(())
            }
            StmtKind::Assign { name, value, slot } => {
                let name = *name;
                let ty = self.check_expr(value)?;
                let Some((var, frame)) = self.scopes.lookup_var(name) else {
                    let message = format!("Undefined identifier '{}'", self.name(name));
                    return Err(self.error(message, stmt_span));
                };
                if frame != self.current_frame {
                    let message = format!(
                        "Cannot assign variable '{}' from an enclosing function",
                        self.name(name)
                    );
                    return Err(self.error(message, stmt_span));
                }
                if ty != var.ty {
                    let message = format!(
                        "Cannot assign {ty} to '{}' of type {}",
                        self.name(name),
                        var.ty
                    );
                    return Err(self.error(message, stmt_span));
                }
                *slot = Some(var.slot);
                Ok(())
            }
            StmtKind::VarDecl { name, value, slot, ty, .. } => {
                let name = *name;
                let value_ty = self.check_expr(value)?;
                if value_ty == Ty::Void {
                    let message =
                        format!("Cannot declare '{}' with a void value", self.name(name));
                    return Err(self.error(message, stmt_span));
                }
                if self.scopes.current().vars.contains_key(&name) {
                    let message = format!(
                        "Variable '{}' is already declared in this scope",
                        self.name(name)
                    );
                    return Err(self.error(message, stmt_span));
                }
                let assigned = self.frame_next_slot;
                self.frame_next_slot += self.size_of(value_ty);
                self.scopes.current().vars.insert(name, VarInfo { ty: value_ty, slot: assigned });
                *slot = Some(assigned);
                *ty = Some(value_ty);
                Ok(())
            }
            StmtKind::Block(block) => self.check_block_scoped(block),
            // Declarations normally live in the partitioned prefix of a
            // block, but a then-form branch can carry one directly.
            StmtKind::FunDecl(fun) => {
                self.declare_fun(fun)?;
                self.check_fun_body(fun)
            }
            StmtKind::StructDecl(decl) => {
                self.declare_struct(decl)?;
                self.check_struct_defaults(decl)
            }
            StmtKind::Return { value } => {
                let ty = self.check_expr(value)?;
                match self.current_return {
                    None => {
                        Err(self.error("Return outside of a function".to_string(), stmt_span))
                    }
                    Some(Ty::Void) => {
                        let message =
                            format!("Function without a return type cannot return {ty}");
                        Err(self.error(message, stmt_span))
                    }
                    Some(expected) if ty != expected => {
                        let message = format!("Return type mismatch: expected {expected}, found {ty}");
                        Err(self.error(message, stmt_span))
                    }
                    Some(_) => Ok(()),
                }
            }
            StmtKind::If { condition, then_branch, else_branch } => {
                let cond_ty = self.check_expr(condition)?;
                if cond_ty != Ty::Bool {
                    let message = format!("If condition must be bool, found {cond_ty}");
                    return Err(self.error(message, condition.span));
                }
                self.check_stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.check_stmt(else_branch)?;
                }
                Ok(())
            }
            StmtKind::While { condition, body } => {
                let cond_ty = self.check_expr(condition)?;
                if cond_ty != Ty::Bool {
                    let message = format!("While condition must be bool, found {cond_ty}");
                    return Err(self.error(message, condition.span));
                }
                self.check_block_scoped(body)
            }
        }
    }

    fn check_expr(&mut self, expr: &mut Expr) -> RillResult<Ty> {
        let span = expr.span;
        let ty = match &mut expr.kind {
            ExprKind::Literal(value) => value.ty(),
            ExprKind::Identifier { name, slot } => {
                let name = *name;
                match self.scopes.lookup_var(name) {
                    Some((var, frame)) => {
                        if frame != self.current_frame {
                            let message = format!(
                                "Cannot reference variable '{}' from an enclosing function",
                                self.name(name)
                            );
                            return Err(self.error(message, span));
                        }
                        *slot = Some(var.slot);
                        var.ty
                    }
                    None => {
                        let message = if self.scopes.lookup_fun(name).is_some() {
                            format!("'{}' is a function, not a value", self.name(name))
                        } else {
                            format!("Undefined identifier '{}'", self.name(name))
                        };
                        return Err(self.error(message, span));
                    }
                }
            }
            ExprKind::Unary { op, operand } => {
                let op = *op;
                let operand_ty = self.check_expr(operand)?;
                match op {
                    UnaryOp::Neg if operand_ty.is_numeric() => operand_ty,
                    UnaryOp::Not if operand_ty == Ty::Bool => Ty::Bool,
                    _ => {
                        let message =
                            format!("Unary operator '{op}' cannot be applied to {operand_ty}");
                        return Err(self.error(message, span));
                    }
                }
            }
            ExprKind::Binary { op, left, right } => {
                let op = *op;
                let left_ty = self.check_expr(left)?;
                let right_ty = self.check_expr(right)?;
                self.check_binary(op, left_ty, right_ty, span)?
            }
            ExprKind::Call { name, args, fun_id } => {
                let name = *name;
                let Some(target) = self.scopes.lookup_fun(name) else {
                    let message = format!("Undefined function '{}'", self.name(name));
                    return Err(self.error(message, span));
                };
                let signature = self.functions[target as usize].clone();
                if args.len() != signature.params.len() {
                    let message = format!(
                        "Function '{}' expects {} arguments, got {}",
                        self.name(name),
                        signature.params.len(),
                        args.len()
                    );
                    return Err(self.error(message, span));
                }
                for (arg, expected) in args.iter_mut().zip(signature.params.iter()) {
                    let arg_ty = self.check_expr(arg)?;
                    if arg_ty != *expected {
                        let message =
                            format!("Argument type mismatch: expected {expected}, found {arg_ty}");
                        return Err(self.error(message, arg.span));
                    }
                }
                *fun_id = Some(target);
                signature.ret
            }
            ExprKind::Access { base, field, slot } => {
                let field = *field;
                let base_ty = self.check_expr(base)?;
                let Ty::Struct(struct_name) = base_ty else {
                    let message = format!("Field access on non-struct type {base_ty}");
                    return Err(self.error(message, span));
                };
                let base_slot = match &base.kind {
                    ExprKind::Identifier { slot: Some(slot), .. } => *slot,
                    ExprKind::Access { slot: Some(slot), .. } => *slot,
                    _ => unreachable!("parser restricts access bases to lvalue paths"),
                };
                let layout_field = self.structs[&struct_name].field(field).copied();
                let Some(layout_field) = layout_field else {
                    let message = format!(
                        "Unknown field '{}' on struct '{}'",
                        self.name(field),
                        self.name(struct_name)
                    );
                    return Err(self.error(message, span));
                };
                *slot = Some(base_slot + layout_field.offset);
                layout_field.ty
            }
            ExprKind::Init { name, args } => {
                let name = *name;
                if !self.scopes.struct_in_scope(name) || !self.structs.contains_key(&name) {
                    let message = format!("Unknown struct '{}'", self.name(name));
                    return Err(self.error(message, span));
                }
                let layout = self.structs[&name].clone();
                let mut covered = vec![false; layout.fields.len()];
                for arg in args.iter_mut() {
                    let index = match arg.name {
                        Some(field_name) => {
                            match layout.fields.iter().position(|f| f.name == field_name) {
                                Some(index) => index,
                                None => {
                                    let message = format!(
                                        "Unknown field '{}' on struct '{}'",
                                        self.name(field_name),
                                        self.name(name)
                                    );
                                    return Err(self.error(message, arg.span));
                                }
                            }
                        }
                        None => arg.position as usize,
                    };
                    if index >= layout.fields.len() {
                        let message = format!(
                            "Struct '{}' has {} fields, initializer has more",
                            self.name(name),
                            layout.fields.len()
                        );
                        return Err(self.error(message, arg.span));
                    }
                    if covered[index] {
                        let message = format!(
                            "Field '{}' initialized twice",
                            self.name(layout.fields[index].name)
                        );
                        return Err(self.error(message, arg.span));
                    }
                    covered[index] = true;

                    let arg_ty = self.check_expr(&mut arg.expr)?;
                    let field_ty = layout.fields[index].ty;
                    if arg_ty != field_ty {
                        let message = format!(
                            "Field '{}' has type {field_ty}, initializer is {arg_ty}",
                            self.name(layout.fields[index].name)
                        );
                        return Err(self.error(message, arg.span));
                    }
                    arg.field_index = Some(index as u32);
                }
                for (index, was_covered) in covered.iter().enumerate() {
                    if !was_covered && layout.defaults[index].is_none() {
                        let message = format!(
                            "Missing initializer for field '{}'",
                            self.name(layout.fields[index].name)
                        );
                        return Err(self.error(message, span));
                    }
                }
                Ty::Struct(name)
            }
        };
        expr.ty = Some(ty);
        Ok(ty)
    }

    fn check_binary(
        &mut self,
        op: BinaryOp,
        left: Ty,
        right: Ty,
        span: TokenSpan,
    ) -> RillResult<Ty> {
        if op.is_arithmetic() {
            if left == right && left.is_numeric() {
                return Ok(left);
            }
        } else if op.is_equality() {
            if left == right && !left.is_struct() && left != Ty::Void {
                return Ok(Ty::Bool);
            }
        } else if op.is_relational() {
            if left == right && left.is_numeric() {
                return Ok(Ty::Bool);
            }
        } else if op.is_logical() && left == Ty::Bool && right == Ty::Bool {
            return Ok(Ty::Bool);
        }
        let message = format!("Operator '{op}' cannot be applied to {left} and {right}");
        Err(self.error(message, span))
    }

    /// Resolve a type name. Builtin scalar names win over struct names;
    /// struct types are only legal where `allow_struct` is set (field types),
    /// and `void` only where `allow_void` is set (return types).
    fn resolve_type(
        &mut self,
        type_ref: &mut TypeRef,
        allow_void: bool,
        allow_struct: bool,
    ) -> RillResult<Ty> {
        let ty = match self.name(type_ref.name) {
            "int" => Ty::Int,
            "real" => Ty::Real,
            "str" => Ty::Str,
            "bool" => Ty::Bool,
            "void" => {
                if !allow_void {
                    return Err(self.error("Type void is not allowed here".into(), type_ref.span));
                }
                Ty::Void
            }
            other => {
                if self.scopes.struct_in_scope(type_ref.name)
                    && self.structs.contains_key(&type_ref.name)
                {
                    if !allow_struct {
                        let message =
                            format!("Struct values cannot cross function boundaries: '{other}'");
                        return Err(self.error(message, type_ref.span));
                    }
                    Ty::Struct(type_ref.name)
                } else {
                    let message = format!("Unknown type: '{other}'");
                    return Err(self.error(message, type_ref.span));
                }
            }
        };
        type_ref.resolved = Some(ty);
        Ok(ty)
    }
}
