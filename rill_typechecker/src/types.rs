//! Resolved signatures and struct layouts

use rill_lexer::Istr;
use rill_parser::Ty;

/// The pre-declared `print(str)` builtin always occupies function id 0.
pub const PRINT_FUN_ID: u32 = 0;

/// Resolved signature of a function, indexed by its `fun_id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunInfo {
    pub name: Istr,
    pub params: Vec<Ty>,
    pub ret: Ty,
    pub builtin: bool,
}

/// One field of a flattened struct layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub name: Istr,
    pub ty: Ty,
    /// Slot offset of the field within the struct, after flattening nested
    /// struct fields.
    pub offset: u32,
}

/// Flattened stack layout of a struct type
#[derive(Debug, Clone)]
pub struct StructLayout {
    pub name: Istr,
    pub fields: Vec<FieldLayout>,
    /// Checked default expressions, parallel to `fields`.
    pub defaults: Vec<Option<rill_parser::Expr>>,
    /// Total stack slots occupied by a value of this type.
    pub slots: u32,
}

impl StructLayout {
    pub fn field(&self, name: Istr) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }
}
