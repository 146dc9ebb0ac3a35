//! Bytecode generation from the typed tree.
//!
//! Register discipline: temporaries are allocated bottom-up from `r3` with a
//! per-statement counter; binary operations leave their result in the left
//! operand's register. Calls save the live temporaries with `Push`/`Pop`
//! around argument materialization. Jump and call targets are symbolic
//! labels during emission and patched to instruction indices in a second
//! pass. Module code is emitted first and ends in the program's only `Exit`;
//! function bodies follow.

use crate::instruction::{Instruction, Program, Reg, BP, FIRST_TEMP, REGISTER_COUNT, RESULT, SP};
use hashbrown::HashMap;
use rill_common::{RillError, RillResult};
use rill_lexer::Istr;
use rill_parser::{
    BinaryOp, Block, Expr, ExprKind, FunDecl, LiteralValue, Stmt, StmtKind, Ty, UnaryOp,
};
use rill_typechecker::{StructLayout, TypedTree, PRINT_FUN_ID};

/// Generate a program from a checked tree.
pub fn generate(tree: &TypedTree<'_>) -> RillResult<Program> {
    let mut generator = Generator {
        tree,
        code: Vec::new(),
        strings: Vec::new(),
        string_ids: HashMap::new(),
        labels: Vec::new(),
        patches: Vec::new(),
        fun_labels: HashMap::new(),
        next_reg: FIRST_TEMP,
        in_function: false,
    };
    generator.module()?;
    log::debug!(
        target: "codegen",
        "generated {} instructions, {} strings",
        generator.code.len(),
        generator.strings.len()
    );
    Ok(Program { instructions: generator.code, strings: generator.strings })
}

type Label = u32;

struct Generator<'g, 'a> {
    tree: &'g TypedTree<'a>,
    code: Vec<Instruction>,
    strings: Vec<String>,
    string_ids: HashMap<Istr, i64>,
    labels: Vec<Option<u32>>,
    /// `(instruction index, label)` pairs to patch once all labels are bound.
    patches: Vec<(usize, Label)>,
    fun_labels: HashMap<u32, Label>,
    next_reg: Reg,
    /// Module-level expression statements publish their value in `r2`.
    in_function: bool,
}

fn missing(what: &str) -> RillError {
    RillError::codegen_error(format!("tree is missing a {what} annotation"))
}

/// Collect every function declaration, including those nested in blocks,
/// branches and other function bodies.
fn collect_funs<'g>(out: &mut Vec<&'g FunDecl>, stmts: &'g [Stmt]) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::FunDecl(fun) => {
                out.push(fun);
                collect_funs(out, &fun.body.decls);
                collect_funs(out, &fun.body.stmts);
            }
            StmtKind::Block(block) => {
                collect_funs(out, &block.decls);
                collect_funs(out, &block.stmts);
            }
            StmtKind::If { then_branch, else_branch, .. } => {
                collect_funs(out, std::slice::from_ref(then_branch));
                if let Some(else_branch) = else_branch {
                    collect_funs(out, std::slice::from_ref(else_branch));
                }
            }
            StmtKind::While { body, .. } => {
                collect_funs(out, &body.decls);
                collect_funs(out, &body.stmts);
            }
            _ => {}
        }
    }
}

impl<'g, 'a> Generator<'g, 'a> {
    fn emit(&mut self, instruction: Instruction) -> usize {
        self.code.push(instruction);
        self.code.len() - 1
    }

    fn new_label(&mut self) -> Label {
        self.labels.push(None);
        (self.labels.len() - 1) as Label
    }

    fn bind(&mut self, label: Label) {
        self.labels[label as usize] = Some(self.code.len() as u32);
    }

    fn emit_jmp(&mut self, label: Label) {
        let index = self.emit(Instruction::Jmp { target: label });
        self.patches.push((index, label));
    }

    fn emit_jmp_zero(&mut self, label: Label, src: Reg) {
        let index = self.emit(Instruction::JmpZero { target: label, src });
        self.patches.push((index, label));
    }

    fn emit_call(&mut self, label: Label) {
        let index = self.emit(Instruction::Call { target: label });
        self.patches.push((index, label));
    }

    fn alloc_reg(&mut self) -> RillResult<Reg> {
        if (self.next_reg as usize) >= REGISTER_COUNT {
            return Err(RillError::codegen_error(
                "expression too deeply nested: out of registers",
            ));
        }
        let reg = self.next_reg;
        self.next_reg += 1;
        Ok(reg)
    }

    fn free_reg(&mut self, reg: Reg) {
        debug_assert_eq!(reg + 1, self.next_reg, "registers are freed in stack order");
        self.next_reg -= 1;
    }

    fn string_id(&mut self, istr: Istr) -> i64 {
        if let Some(id) = self.string_ids.get(&istr) {
            return *id;
        }
        let id = self.strings.len() as i64;
        self.strings.push(self.tree.tokens.pool().get(istr).to_string());
        self.string_ids.insert(istr, id);
        id
    }

    fn layout_of(&self, ty: Ty) -> RillResult<StructLayout> {
        let Ty::Struct(name) = ty else {
            return Err(RillError::codegen_error(format!("expected a struct type, found {ty}")));
        };
        Ok(self.tree.structs[&name].clone())
    }

    fn module(&mut self) -> RillResult<()> {
        let module = &self.tree.module;
        let globals = module.frame_slots.ok_or_else(|| missing("module frame size"))?;

        let mut funs = Vec::new();
        collect_funs(&mut funs, &module.decls);
        collect_funs(&mut funs, &module.stmts);
        for fun in &funs {
            let fun_id = fun.fun_id.ok_or_else(|| missing("function id"))?;
            let label = self.new_label();
            self.fun_labels.insert(fun_id, label);
        }

        // Reserve the module's own stack slots.
        if globals > 0 {
            self.emit(Instruction::MovImm64 { dst: FIRST_TEMP, imm: globals as i64 });
            self.emit(Instruction::Add { dst: SP, src: FIRST_TEMP });
        }
        for stmt in &module.stmts {
            self.stmt(stmt)?;
        }
        if globals > 0 {
            self.emit(Instruction::MovImm64 { dst: FIRST_TEMP, imm: globals as i64 });
            self.emit(Instruction::Sub { dst: SP, src: FIRST_TEMP });
        }
        self.emit(Instruction::Exit);

        for fun in &funs {
            self.function(fun)?;
        }
        self.patch()
    }

    fn function(&mut self, fun: &FunDecl) -> RillResult<()> {
        let fun_id = fun.fun_id.ok_or_else(|| missing("function id"))?;
        let frame = fun.frame_slots.ok_or_else(|| missing("function frame size"))?;
        let label = self.fun_labels[&fun_id];
        self.bind(label);

        let param_count = fun.params.len() as i64;
        self.emit(Instruction::Push { src: BP });
        self.emit(Instruction::Mov { dst: BP, src: SP });
        if frame > 0 {
            self.emit(Instruction::MovImm64 { dst: FIRST_TEMP, imm: frame as i64 });
            self.emit(Instruction::Add { dst: SP, src: FIRST_TEMP });
        }
        // Copy the arguments from below the frame into slots 0..n.
        for index in 0..param_count {
            self.emit(Instruction::Load {
                dst: FIRST_TEMP,
                slot: (index - param_count - 2) as i32,
            });
            self.emit(Instruction::Store { slot: index as i32, src: FIRST_TEMP });
        }

        let was_in_function = std::mem::replace(&mut self.in_function, true);
        self.block(&fun.body)?;
        self.in_function = was_in_function;

        // Falling off the end returns zero.
        if !matches!(fun.body.stmts.last().map(|s| &s.kind), Some(StmtKind::Return { .. })) {
            self.emit(Instruction::MovImm64 { dst: RESULT, imm: 0 });
            self.epilogue();
        }
        Ok(())
    }

    fn epilogue(&mut self) {
        self.emit(Instruction::Mov { dst: SP, src: BP });
        self.emit(Instruction::Pop { dst: BP });
        self.emit(Instruction::Ret);
    }

    fn block(&mut self, block: &Block) -> RillResult<()> {
        for stmt in &block.stmts {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> RillResult<()> {
        // Statement boundary: all temporaries are dead.
        self.next_reg = FIRST_TEMP;
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                if let Some(reg) = self.expr(expr)? {
                    if !self.in_function {
                        self.emit(Instruction::Mov { dst: RESULT, src: reg });
                    }
                    self.free_reg(reg);
                }
                Ok(())
            }
            StmtKind::VarDecl { value, slot, ty, .. } => {
                let slot = slot.ok_or_else(|| missing("variable slot"))?;
                let ty = ty.ok_or_else(|| missing("variable type"))?;
                self.store_value(slot, ty, value)
            }
            StmtKind::Assign { value, slot, .. } => {
                let slot = slot.ok_or_else(|| missing("assignment slot"))?;
                let ty = value.ty.ok_or_else(|| missing("expression type"))?;
                self.store_value(slot, ty, value)
            }
            StmtKind::Block(block) => self.block(block),
            // Emitted separately; nothing happens inline.
            StmtKind::FunDecl(_) | StmtKind::StructDecl(_) => Ok(()),
            StmtKind::Return { value } => {
                let reg = self.expr_reg(value)?;
                self.emit(Instruction::Mov { dst: RESULT, src: reg });
                self.free_reg(reg);
                self.epilogue();
                Ok(())
            }
            StmtKind::If { condition, then_branch, else_branch } => {
                let cond = self.expr_reg(condition)?;
                match else_branch {
                    Some(else_branch) => {
                        let else_label = self.new_label();
                        let end_label = self.new_label();
                        self.emit_jmp_zero(else_label, cond);
                        self.free_reg(cond);
                        self.stmt(then_branch)?;
                        self.emit_jmp(end_label);
                        self.bind(else_label);
                        self.stmt(else_branch)?;
                        self.bind(end_label);
                    }
                    None => {
                        let end_label = self.new_label();
                        self.emit_jmp_zero(end_label, cond);
                        self.free_reg(cond);
                        self.stmt(then_branch)?;
                        self.bind(end_label);
                    }
                }
                Ok(())
            }
            StmtKind::While { condition, body } => {
                let start_label = self.new_label();
                let end_label = self.new_label();
                self.bind(start_label);
                let cond = self.expr_reg(condition)?;
                self.emit_jmp_zero(end_label, cond);
                self.free_reg(cond);
                self.block(body)?;
                self.emit_jmp(start_label);
                self.bind(end_label);
                Ok(())
            }
        }
    }

    /// Store a value into `slot`: scalars through a register, struct values
    /// through the aggregate path.
    fn store_value(&mut self, slot: u32, ty: Ty, value: &Expr) -> RillResult<()> {
        if ty.is_struct() {
            self.aggregate_into(slot, value)
        } else {
            let reg = self.expr_reg(value)?;
            self.emit(Instruction::Store { slot: slot as i32, src: reg });
            self.free_reg(reg);
            Ok(())
        }
    }

    /// Generate an expression that must produce a value.
    fn expr_reg(&mut self, expr: &Expr) -> RillResult<Reg> {
        self.expr(expr)?
            .ok_or_else(|| RillError::codegen_error("void expression used as a value"))
    }

    /// Generate an expression. Returns `None` for void calls.
    fn expr(&mut self, expr: &Expr) -> RillResult<Option<Reg>> {
        match &expr.kind {
            ExprKind::Literal(value) => {
                let dst = self.alloc_reg()?;
                let imm = match *value {
                    LiteralValue::Int(value) => value,
                    LiteralValue::Real(value) => value.to_bits() as i64,
                    LiteralValue::Bool(value) => value as i64,
                    LiteralValue::Str(istr) => self.string_id(istr),
                };
                self.emit(Instruction::MovImm64 { dst, imm });
                Ok(Some(dst))
            }
            ExprKind::Identifier { slot, .. } => {
                let slot = slot.ok_or_else(|| missing("identifier slot"))?;
                let dst = self.alloc_reg()?;
                self.emit(Instruction::Load { dst, slot: slot as i32 });
                Ok(Some(dst))
            }
            ExprKind::Unary { op, operand } => self.unary(*op, operand).map(Some),
            ExprKind::Binary { op, left, right } => self.binary(*op, left, right).map(Some),
            ExprKind::Call { args, fun_id, .. } => {
                let fun_id = fun_id.ok_or_else(|| missing("call target"))?;
                self.call(fun_id, args)
            }
            ExprKind::Access { slot, .. } => {
                let slot = slot.ok_or_else(|| missing("field slot"))?;
                let dst = self.alloc_reg()?;
                self.emit(Instruction::Load { dst, slot: slot as i32 });
                Ok(Some(dst))
            }
            ExprKind::Init { .. } => Err(RillError::codegen_error(
                "struct initializer outside an aggregate context",
            )),
        }
    }

    fn unary(&mut self, op: UnaryOp, operand: &Expr) -> RillResult<Reg> {
        let operand_ty = operand.ty.ok_or_else(|| missing("expression type"))?;
        match op {
            UnaryOp::Neg => {
                // Lowered as 0 - x.
                let dst = self.alloc_reg()?;
                let (zero, is_real) = match operand_ty {
                    Ty::Real => (0f64.to_bits() as i64, true),
                    _ => (0, false),
                };
                self.emit(Instruction::MovImm64 { dst, imm: zero });
                let src = self.expr_reg(operand)?;
                if is_real {
                    self.emit(Instruction::SubReal { dst, src });
                } else {
                    self.emit(Instruction::Sub { dst, src });
                }
                self.free_reg(src);
                Ok(dst)
            }
            UnaryOp::Not => {
                // Lowered as x == 0.
                let dst = self.expr_reg(operand)?;
                let zero = self.alloc_reg()?;
                self.emit(Instruction::MovImm64 { dst: zero, imm: 0 });
                self.emit(Instruction::Eq { dst, src: zero });
                self.free_reg(zero);
                Ok(dst)
            }
        }
    }

    fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> RillResult<Reg> {
        // Logical operators short-circuit; the checker guarantees both sides
        // are 0/1-valued booleans.
        match op {
            BinaryOp::And => {
                let dst = self.expr_reg(left)?;
                let end_label = self.new_label();
                self.emit_jmp_zero(end_label, dst);
                let rhs = self.expr_reg(right)?;
                self.emit(Instruction::Mov { dst, src: rhs });
                self.free_reg(rhs);
                self.bind(end_label);
                return Ok(dst);
            }
            BinaryOp::Or => {
                let dst = self.expr_reg(left)?;
                let rhs_label = self.new_label();
                let end_label = self.new_label();
                self.emit_jmp_zero(rhs_label, dst);
                self.emit_jmp(end_label);
                self.bind(rhs_label);
                let rhs = self.expr_reg(right)?;
                self.emit(Instruction::Mov { dst, src: rhs });
                self.free_reg(rhs);
                self.bind(end_label);
                return Ok(dst);
            }
            _ => {}
        }

        let is_real = left.ty == Some(Ty::Real);
        let dst = self.expr_reg(left)?;
        let src = self.expr_reg(right)?;
        let instruction = match (op, is_real) {
            (BinaryOp::Add, false) => Instruction::Add { dst, src },
            (BinaryOp::Sub, false) => Instruction::Sub { dst, src },
            (BinaryOp::Mul, false) => Instruction::Mul { dst, src },
            (BinaryOp::Div, false) => Instruction::Div { dst, src },
            (BinaryOp::Mod, false) => Instruction::Mod { dst, src },
            (BinaryOp::Add, true) => Instruction::AddReal { dst, src },
            (BinaryOp::Sub, true) => Instruction::SubReal { dst, src },
            (BinaryOp::Mul, true) => Instruction::MulReal { dst, src },
            (BinaryOp::Div, true) => Instruction::DivReal { dst, src },
            (BinaryOp::Mod, true) => Instruction::ModReal { dst, src },
            (BinaryOp::Lt, false) => Instruction::Lt { dst, src },
            (BinaryOp::Le, false) => Instruction::Le { dst, src },
            (BinaryOp::Eq, false) => Instruction::Eq { dst, src },
            (BinaryOp::Ne, false) => Instruction::Ne { dst, src },
            (BinaryOp::Ge, false) => Instruction::Ge { dst, src },
            (BinaryOp::Gt, false) => Instruction::Gt { dst, src },
            (BinaryOp::Lt, true) => Instruction::LtReal { dst, src },
            (BinaryOp::Le, true) => Instruction::LeReal { dst, src },
            (BinaryOp::Eq, true) => Instruction::EqReal { dst, src },
            (BinaryOp::Ne, true) => Instruction::NeReal { dst, src },
            (BinaryOp::Ge, true) => Instruction::GeReal { dst, src },
            (BinaryOp::Gt, true) => Instruction::GtReal { dst, src },
            (BinaryOp::And | BinaryOp::Or, _) => unreachable!("handled above"),
        };
        self.emit(instruction);
        self.free_reg(src);
        Ok(dst)
    }

    fn call(&mut self, fun_id: u32, args: &[Expr]) -> RillResult<Option<Reg>> {
        if fun_id == PRINT_FUN_ID {
            let reg = self.expr_reg(&args[0])?;
            self.emit(Instruction::Print { src: reg });
            self.free_reg(reg);
            return Ok(None);
        }

        // Save the live temporaries across the call.
        let live: smallvec::SmallVec<[Reg; 8]> = (FIRST_TEMP..self.next_reg).collect();
        for reg in &live {
            self.emit(Instruction::Push { src: *reg });
        }

        // Arguments go onto the stack in declaration order.
        for arg in args {
            let reg = self.expr_reg(arg)?;
            self.emit(Instruction::Push { src: reg });
            self.free_reg(reg);
        }
        let label = self.fun_labels[&fun_id];
        self.emit_call(label);

        // Drop the argument area, restore the saved temporaries.
        if !args.is_empty() {
            let scratch = self.alloc_reg()?;
            self.emit(Instruction::MovImm64 { dst: scratch, imm: args.len() as i64 });
            self.emit(Instruction::Sub { dst: SP, src: scratch });
            self.free_reg(scratch);
        }
        for reg in live.iter().rev() {
            self.emit(Instruction::Pop { dst: *reg });
        }

        if self.tree.functions[fun_id as usize].ret == Ty::Void {
            Ok(None)
        } else {
            let dst = self.alloc_reg()?;
            self.emit(Instruction::Mov { dst, src: RESULT });
            Ok(Some(dst))
        }
    }

    /// Materialize a struct value into the frame slots starting at `base`.
    fn aggregate_into(&mut self, base: u32, value: &Expr) -> RillResult<()> {
        let ty = value.ty.ok_or_else(|| missing("expression type"))?;
        let layout = self.layout_of(ty)?;
        match &value.kind {
            ExprKind::Init { args, .. } => {
                for (index, field) in layout.fields.iter().enumerate() {
                    let provided = args
                        .iter()
                        .find(|arg| arg.field_index == Some(index as u32))
                        .map(|arg| &arg.expr);
                    let field_value = provided.or(layout.defaults[index].as_ref()).ok_or_else(
                        || {
                            RillError::codegen_error(
                                "field has neither an initializer nor a default",
                            )
                        },
                    )?;
                    if field.ty.is_struct() {
                        self.aggregate_into(base + field.offset, field_value)?;
                    } else {
                        let reg = self.expr_reg(field_value)?;
                        self.emit(Instruction::Store {
                            slot: (base + field.offset) as i32,
                            src: reg,
                        });
                        self.free_reg(reg);
                    }
                }
                Ok(())
            }
            // Copying an existing struct value, slot by slot.
            ExprKind::Identifier { slot, .. } | ExprKind::Access { slot, .. } => {
                let source = slot.ok_or_else(|| missing("aggregate source slot"))?;
                for index in 0..layout.slots {
                    let reg = self.alloc_reg()?;
                    self.emit(Instruction::Load { dst: reg, slot: (source + index) as i32 });
                    self.emit(Instruction::Store { slot: (base + index) as i32, src: reg });
                    self.free_reg(reg);
                }
                Ok(())
            }
            _ => Err(RillError::codegen_error("unsupported aggregate expression")),
        }
    }

    fn patch(&mut self) -> RillResult<()> {
        for (index, label) in &self.patches {
            let target = self.labels[*label as usize]
                .ok_or_else(|| RillError::codegen_error("jump to an unbound label"))?;
            match &mut self.code[*index] {
                Instruction::Jmp { target: slot }
                | Instruction::JmpZero { target: slot, .. }
                | Instruction::Call { target: slot } => *slot = target,
                other => {
                    return Err(RillError::codegen_error(format!(
                        "patch target is not a jump: {other:?}"
                    )))
                }
            }
        }
        Ok(())
    }
}
