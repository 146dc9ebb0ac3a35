//! Scope chain stored in a chunk pool

use hashbrown::{HashMap, HashSet};
use rill_alloc::{Pool, PoolId};
use rill_lexer::Istr;
use rill_parser::Ty;

/// A variable bound in a scope
#[derive(Debug, Clone, Copy)]
pub struct VarInfo {
    pub ty: Ty,
    /// bp-relative frame slot of the value.
    pub slot: u32,
}

/// One lexical scope. Scopes form a chain through `parent`; `frame`
/// identifies the function frame the scope belongs to (0 is the module).
#[derive(Debug)]
pub struct Scope {
    pub parent: Option<PoolId>,
    pub frame: u32,
    pub vars: HashMap<Istr, VarInfo>,
    pub funs: HashMap<Istr, u32>,
    pub structs: HashSet<Istr>,
}

/// Scope storage and chain walking. Scope records live in a [`Pool`]; a
/// closed scope returns its chunk to the free list.
pub struct ScopeStack {
    pool: Pool<Scope>,
    current: Option<PoolId>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self { pool: Pool::with_capacity(16), current: None }
    }

    pub fn open(&mut self, frame: u32) -> PoolId {
        let scope = Scope {
            parent: self.current,
            frame,
            vars: HashMap::new(),
            funs: HashMap::new(),
            structs: HashSet::new(),
        };
        let id = self.pool.insert(scope);
        self.current = Some(id);
        id
    }

    pub fn close(&mut self) {
        let current = self.current.expect("no scope to close");
        let scope = self.pool.remove(current).expect("scope chunk is live");
        self.current = scope.parent;
    }

    pub fn current(&mut self) -> &mut Scope {
        let id = self.current.expect("no open scope");
        self.pool.get_mut(id).expect("scope chunk is live")
    }

    /// Resolve a variable through the chain. Returns the binding and the
    /// frame of the scope that declared it.
    pub fn lookup_var(&self, name: Istr) -> Option<(VarInfo, u32)> {
        let mut next = self.current;
        while let Some(id) = next {
            let scope = self.pool.get(id).expect("scope chunk is live");
            if let Some(info) = scope.vars.get(&name) {
                return Some((*info, scope.frame));
            }
            next = scope.parent;
        }
        None
    }

    pub fn lookup_fun(&self, name: Istr) -> Option<u32> {
        let mut next = self.current;
        while let Some(id) = next {
            let scope = self.pool.get(id).expect("scope chunk is live");
            if let Some(fun_id) = scope.funs.get(&name) {
                return Some(*fun_id);
            }
            next = scope.parent;
        }
        None
    }

    pub fn struct_in_scope(&self, name: Istr) -> bool {
        let mut next = self.current;
        while let Some(id) = next {
            let scope = self.pool.get(id).expect("scope chunk is live");
            if scope.structs.contains(&name) {
                return true;
            }
            next = scope.parent;
        }
        false
    }
}
