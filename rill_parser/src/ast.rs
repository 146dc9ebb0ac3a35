//! Abstract syntax tree for the Rill language.
//!
//! Nodes own their children. Every node records the token-index range it was
//! parsed from; byte spans for diagnostics are recovered through the token
//! stream. Fields of `Option` type (`ty`, `slot`, `fun_id`, `field_index`,
//! `frame_slots`) are left empty by the parser and resolved in place by the
//! type checker, turning the grammar tree into the typed tree.

use rill_lexer::{Istr, TokenIdx};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a lexical scope. Scope 0 is the module scope.
pub type BlockId = u32;

/// Closed token-index range covering a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenSpan {
    pub start: TokenIdx,
    pub end: TokenIdx,
}

impl TokenSpan {
    pub fn new(start: TokenIdx, end: TokenIdx) -> Self {
        Self { start, end }
    }

    pub fn single(index: TokenIdx) -> Self {
        Self { start: index, end: index }
    }

    pub fn to(self, other: TokenSpan) -> TokenSpan {
        TokenSpan::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// A scalar type of the source language, resolved by the type checker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ty {
    Void,
    Bool,
    Int,
    Real,
    Str,
    Struct(Istr),
}

impl Ty {
    pub fn is_numeric(self) -> bool {
        matches!(self, Ty::Int | Ty::Real)
    }

    pub fn is_struct(self) -> bool {
        matches!(self, Ty::Struct(_))
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Void => write!(f, "void"),
            Ty::Bool => write!(f, "bool"),
            Ty::Int => write!(f, "int"),
            Ty::Real => write!(f, "real"),
            Ty::Str => write!(f, "str"),
            Ty::Struct(name) => write!(f, "struct {name}"),
        }
    }
}

/// Literal payloads. Strings stay interned; their escapes are verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    Int(i64),
    Real(f64),
    Str(Istr),
    Bool(bool),
}

impl LiteralValue {
    pub fn ty(self) -> Ty {
        match self {
            LiteralValue::Int(_) => Ty::Int,
            LiteralValue::Real(_) => Ty::Real,
            LiteralValue::Str(_) => Ty::Str,
            LiteralValue::Bool(_) => Ty::Bool,
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Not => write!(f, "not"),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod)
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Ge | BinaryOp::Gt
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Ne)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Ge => ">=",
            BinaryOp::Gt => ">",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        };
        write!(f, "{repr}")
    }
}

/// Expression node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: TokenSpan,
    /// Resolved by the type checker.
    pub ty: Option<Ty>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: TokenSpan) -> Self {
        Self { kind, span, ty: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    Literal(LiteralValue),
    /// Variable reference. `slot` is the bp-relative frame slot.
    Identifier { name: Istr, slot: Option<u32> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    /// Call of a named function. `fun_id` is the checker-assigned target.
    Call { name: Istr, args: Vec<Expr>, fun_id: Option<u32> },
    /// Field access `base.field`. `slot` is the absolute frame slot of the
    /// accessed field.
    Access { base: Box<Expr>, field: Istr, slot: Option<u32> },
    /// Struct initializer `Name { args }`
    Init { name: Istr, args: Vec<InitArg> },
}

/// One argument of a struct initializer, matched to a field by name or by
/// position. `field_index` is the checker-resolved field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitArg {
    pub name: Option<Istr>,
    pub position: u32,
    pub expr: Expr,
    pub span: TokenSpan,
    pub field_index: Option<u32>,
}

/// Statement node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: TokenSpan,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: TokenSpan) -> Self {
        Self { kind, span }
    }

    /// Function and struct declarations are hoisted to the front of their
    /// enclosing block.
    pub fn is_declaration(&self) -> bool {
        matches!(self.kind, StmtKind::FunDecl(_) | StmtKind::StructDecl(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtKind {
    Expr(Expr),
    /// `name = value`
    Assign { name: Istr, value: Expr, slot: Option<u32> },
    /// `name := value`. `decl_offset` is the per-frame declaration index;
    /// `slot`/`ty` are resolved by the checker.
    VarDecl { name: Istr, decl_offset: u32, value: Expr, slot: Option<u32>, ty: Option<Ty> },
    Block(Block),
    FunDecl(FunDecl),
    StructDecl(StructDecl),
    Return { value: Expr },
    If { condition: Expr, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>> },
    While { condition: Expr, body: Block },
}

/// A braced scope. Declarations precede statements, each partition in source
/// order. A function body is the block held by its `FunDecl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub parent: BlockId,
    pub decls: Vec<Stmt>,
    pub stmts: Vec<Stmt>,
    pub span: TokenSpan,
}

impl Block {
    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }
}

/// Reference to a type by name, resolved by the checker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeRef {
    pub name: Istr,
    pub span: TokenSpan,
    pub resolved: Option<Ty>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunParam {
    pub name: Istr,
    /// 0-based position in the declaration.
    pub offset: u32,
    pub ty: TypeRef,
    pub span: TokenSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunDecl {
    pub name: Istr,
    pub params: Vec<FunParam>,
    /// Absent return type means void.
    pub return_type: Option<TypeRef>,
    pub body: Block,
    pub span: TokenSpan,
    /// Checker-assigned identity used as the call target.
    pub fun_id: Option<u32>,
    /// Total frame slots (parameters + locals), sized by the checker.
    pub frame_slots: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructField {
    pub name: Istr,
    /// 0-based declaration offset, the field's slot index before flattening.
    pub offset: u32,
    pub ty: TypeRef,
    pub default: Option<Expr>,
    pub span: TokenSpan,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructDecl {
    pub id: BlockId,
    pub parent: BlockId,
    pub name: Istr,
    pub fields: Vec<StructField>,
    pub span: TokenSpan,
}

/// Root of the grammar tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub decls: Vec<Stmt>,
    pub stmts: Vec<Stmt>,
    pub span: TokenSpan,
    /// Module frame slots, sized by the checker.
    pub frame_slots: Option<u32>,
}

impl Module {
    pub fn decl_count(&self) -> usize {
        self.decls.len()
    }
}
