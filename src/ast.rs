//! Abstract syntax consumed by the machine
//!
//! Statements live in an arena owned by the [`Program`]; each statement
//! records its syntactic successor as an id rather than an owning pointer,
//! so the statement graph can share targets freely. The program also owns
//! the class table and the label index, both populated as the front end
//! (or an embedder) constructs the tree.

use std::collections::HashMap;
use std::rc::Rc;

pub type Ident = String;

/// Source location for error reporting, in byte offsets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

// ============================================================================
// Classes
// ============================================================================

/// A field definition carries only the field's name.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: Ident,
}

/// A method: its name, the ordered formal parameter names, and the entry
/// statement of the body. A body with no statements has no entry; running
/// it falls off the end immediately.
#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: Ident,
    pub formals: Vec<Ident>,
    pub body: Option<StmtId>,
}

/// A class definition. The parent is referenced by name and resolved
/// through the program's class table, never held directly, so deep or
/// mutually referential hierarchies stay acyclic in memory.
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: Ident,
    pub parent: Option<Ident>,
    fields: HashMap<Ident, FieldDef>,
    methods: HashMap<Ident, MethodDef>,
}

impl ClassDef {
    pub fn new(name: impl Into<Ident>, parent: Option<Ident>) -> Self {
        Self {
            name: name.into(),
            parent,
            fields: HashMap::new(),
            methods: HashMap::new(),
        }
    }

    pub fn add_field(&mut self, name: impl Into<Ident>) {
        let name = name.into();
        self.fields.insert(name.clone(), FieldDef { name });
    }

    pub fn add_method(
        &mut self,
        name: impl Into<Ident>,
        formals: Vec<Ident>,
        body: Option<StmtId>,
    ) {
        let name = name.into();
        self.methods.insert(
            name.clone(),
            MethodDef {
                name,
                formals,
                body,
            },
        );
    }

    /// A method defined directly on this class (no parent walk).
    pub fn method(&self, name: &str) -> Option<&MethodDef> {
        self.methods.get(name)
    }

    /// A field defined directly on this class (no parent walk).
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }
}

// ============================================================================
// Statements
// ============================================================================

/// Index of a statement in the program's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StmtId(usize);

/// A statement paired with its syntactic successor. `goto`, `if` and
/// `return` may ignore the successor; everything else falls through to it.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub next: Option<StmtId>,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Skip,
    Label(Ident),
    Goto(Ident),
    If {
        cond: AExp,
        target: Ident,
    },
    AssignAExp {
        lhs: Ident,
        rhs: AExp,
    },
    FieldAssign {
        object: AExp,
        field: Ident,
        rhs: AExp,
    },
    New {
        lhs: Ident,
        class_name: Ident,
    },
    Invoke {
        lhs: Ident,
        object: AExp,
        method: Ident,
        args: Vec<AExp>,
    },
    InvokeSuper {
        lhs: Ident,
        method: Ident,
        args: Vec<AExp>,
    },
    Return(AExp),
    PushHandler {
        class_name: Ident,
        label: Ident,
    },
    PopHandler,
    Throw(AExp),
    MoveException(Ident),
    Print(Vec<AExp>),
}

// ============================================================================
// Atomic expressions
// ============================================================================

/// Primitive operations over integers. `+` and `*` are n-ary folds with
/// identities 0 and 1; `-` and `=` are strictly binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimOp {
    Add,
    Sub,
    Mul,
    Eq,
}

/// Atomic expressions: side-effect free, terminating, and evaluated
/// against a frame pointer and a store only.
#[derive(Debug, Clone)]
pub enum AExp {
    /// The current receiver, read from register `$this`.
    This,
    Register(Ident),
    Int(i32),
    Bool(bool),
    Null,
    Void,
    /// A field read off an object-valued expression.
    Field(Rc<AExp>, Ident),
    /// Class membership test, walking the parent chain.
    InstanceOf(Rc<AExp>, Ident),
    Atomic(PrimOp, Vec<AExp>),
}

// ============================================================================
// Program
// ============================================================================

/// A whole program: the statement arena, the class table, and the label
/// index. These are the shared context the machine executes against;
/// keeping them on a value (instead of process globals) lets several
/// machines run isolated and deterministic in one process.
#[derive(Debug, Default)]
pub struct Program {
    stmts: Vec<Stmt>,
    classes: HashMap<Ident, ClassDef>,
    labels: HashMap<Ident, StmtId>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a statement to the arena and return its id. A `label`
    /// statement registers itself in the label index as it is built, so
    /// `goto`/`if` targets resolve by name; a duplicate label overwrites
    /// the earlier one.
    pub fn add_stmt(&mut self, kind: StmtKind, next: Option<StmtId>) -> StmtId {
        let id = StmtId(self.stmts.len());
        if let StmtKind::Label(name) = &kind {
            self.labels.insert(name.clone(), id);
        }
        self.stmts.push(Stmt { kind, next });
        id
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.0]
    }

    /// The statement registered at a label, if any.
    pub fn label_target(&self, label: &str) -> Option<StmtId> {
        self.labels.get(label).copied()
    }

    /// Register a class. Duplicate names overwrite; the machine assumes
    /// class names are unique.
    pub fn add_class(&mut self, class: ClassDef) {
        self.classes.insert(class.name.clone(), class);
    }

    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    /// Resolve a method by walking from `class_name` toward the root,
    /// returning the defining class's name with the shallowest match.
    /// `None` once the chain is exhausted (or breaks off at a name with
    /// no registered class).
    pub fn lookup_method(&self, class_name: &str, method: &str) -> Option<(&str, &MethodDef)> {
        let mut current = class_name;
        while let Some(class) = self.classes.get(current) {
            if let Some(m) = class.method(method) {
                return Some((class.name.as_str(), m));
            }
            current = class.parent.as_deref()?;
        }
        None
    }

    /// Walk the parent chain for a field declaration. A class-table query
    /// only: the machine addresses fields through object pointers and
    /// never consults declarations, so a missing declaration is not a
    /// run-time failure of its own.
    pub fn lookup_field(&self, class_name: &str, field: &str) -> Option<(&str, &FieldDef)> {
        let mut current = class_name;
        while let Some(class) = self.classes.get(current) {
            if let Some(f) = class.field(field) {
                return Some((class.name.as_str(), f));
            }
            current = class.parent.as_deref()?;
        }
        None
    }

    /// True iff `target` is `class_name` itself or an ancestor of it.
    pub fn is_instance_of(&self, class_name: &str, target: &str) -> bool {
        let mut current = class_name;
        loop {
            if current == target {
                return true;
            }
            match self.classes.get(current).and_then(|c| c.parent.as_deref()) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }
}
