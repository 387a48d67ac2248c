//! The abstract machine
//!
//! A machine state is the four-tuple of the current statement (control),
//! the active frame pointer (environment), the store, and the continuation
//! stack. [`Machine::step`] maps one reified state to the next; nothing is
//! hidden in host-level recursion, so the transition relation itself can be
//! inspected, replayed, or re-targeted.
//!
//! The continuation stack is a linked chain of frames bottoming out in
//! [`Kont::Halt`]: `Assign` frames are return points pushed by invocation,
//! `Handler` frames are installed by `pushHandler`. Procedure return walks
//! the chain with [`Kont::apply`]; `throw` walks it with [`Kont::handle`].

use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use thiserror::Error;

use crate::addr::{Addr, FramePointer, PointerGen};
use crate::ast::{AExp, MethodDef, PrimOp, Program, StmtId, StmtKind};
use crate::store::Store;
use crate::value::Value;

// ============================================================================
// Errors
// ============================================================================

/// Structural runtime errors. None of these are recoverable inside the
/// machine; every one aborts the step that raised it. Program-level
/// exceptions are not errors -- they are ordinary object values handled by
/// the continuation stack -- except when no handler matches, which
/// surfaces as [`MachineError::UncaughtException`].
#[derive(Error, Debug)]
pub enum MachineError {
    #[error("unresolved label: {0}")]
    UnresolvedLabel(String),
    #[error("unbound address: {0}")]
    UnboundAddr(Addr),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("no such method: {0}")]
    NoSuchMethod(String),
    #[error("no handler to pop")]
    PopWithoutHandler,
    #[error("uncaught exception: {0}")]
    UncaughtException(Value),
    #[error("cannot write program output: {0}")]
    Io(#[from] io::Error),
}

// ============================================================================
// Continuations
// ============================================================================

/// A reified stack frame. Frames reference the frame beneath them; the
/// chain always terminates in the single `Halt`.
#[derive(Debug, Clone)]
pub enum Kont {
    /// The bottom of every stack. Applying it ends the run.
    Halt,
    /// A return point: when applied, binds the returned value at
    /// `(fp, register)` and resumes at `resume`.
    Assign {
        register: String,
        resume: Option<StmtId>,
        fp: FramePointer,
        next: Rc<Kont>,
    },
    /// An installed exception handler. Inert on `apply`; on `handle` it
    /// catches exceptions whose class is an instance of `class_name`.
    Handler {
        class_name: String,
        label: String,
        next: Rc<Kont>,
    },
}

impl Kont {
    /// Procedure return: deliver `value` to the nearest return point.
    /// Handlers in the way are passed through untouched -- they only
    /// react to `handle`.
    pub fn apply(&self, value: Value, store: &Store) -> Transition {
        match self {
            Kont::Halt => Transition::Done(Outcome::Returned(value)),
            Kont::Assign {
                register,
                resume,
                fp,
                next,
            } => {
                let store = store.extend(fp.offset(register), value);
                Transition::Next(State {
                    stmt: *resume,
                    fp: *fp,
                    store,
                    kont: next.clone(),
                })
            }
            Kont::Handler { next, .. } => next.apply(value, store),
        }
    }

    /// Throw: unwind to the nearest handler whose class matches the
    /// exception. Return points in the way are discarded, but each one
    /// swaps in its captured frame pointer, so a matching handler runs in
    /// the frame that installed it with `$ex` bound there.
    pub fn handle(
        &self,
        exception: Value,
        fp: FramePointer,
        store: &Store,
        program: &Program,
    ) -> Result<Transition, MachineError> {
        match self {
            Kont::Halt => Err(MachineError::UncaughtException(exception)),
            Kont::Assign {
                fp: captured, next, ..
            } => next.handle(exception, *captured, store, program),
            Kont::Handler {
                class_name,
                label,
                next,
            } => {
                let caught = match &exception {
                    Value::Object {
                        class_name: thrown, ..
                    } => program.is_instance_of(thrown, class_name),
                    _ => false,
                };
                if caught {
                    let target = program
                        .label_target(label)
                        .ok_or_else(|| MachineError::UnresolvedLabel(label.clone()))?;
                    let store = store.extend(fp.offset("$ex"), exception);
                    Ok(Transition::Next(State {
                        stmt: Some(target),
                        fp,
                        store,
                        kont: next.clone(),
                    }))
                } else {
                    next.handle(exception, fp, store, program)
                }
            }
        }
    }

    /// Remove the topmost frame, which must be a handler.
    pub fn pop_handler(&self) -> Result<Rc<Kont>, MachineError> {
        match self {
            Kont::Handler { next, .. } => Ok(next.clone()),
            _ => Err(MachineError::PopWithoutHandler),
        }
    }
}

// ============================================================================
// States
// ============================================================================

/// One machine state: (control, environment, store, kontinuation).
/// `stmt` is `None` when control has run past the end of a body.
#[derive(Debug, Clone)]
pub struct State {
    pub stmt: Option<StmtId>,
    pub fp: FramePointer,
    pub store: Store,
    pub kont: Rc<Kont>,
}

/// The result of one reduction.
#[derive(Debug, Clone)]
pub enum Transition {
    Next(State),
    Done(Outcome),
}

/// Why the machine stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A `return` reached the halt continuation.
    Returned(Value),
    /// Control ran past the final statement of a body.
    FellOffEnd,
}

// ============================================================================
// The machine
// ============================================================================

/// An interpreter instance over one program. The machine owns the mutable
/// run context: the fresh-pointer counter, the resolved-method cache, and
/// the output sink for `print`. Everything else lives in the immutable
/// program or in the states themselves.
pub struct Machine<'p> {
    program: &'p Program,
    gen: PointerGen,
    /// (class name, method name) -> defining class, so repeated dynamic
    /// dispatch does not re-walk deep parent chains.
    method_cache: HashMap<(String, String), String>,
    out: Box<dyn Write + 'p>,
}

impl<'p> Machine<'p> {
    /// A machine printing to stdout.
    pub fn new(program: &'p Program) -> Self {
        Self::with_output(program, Box::new(io::stdout()))
    }

    /// A machine printing to the given sink; tests capture output this way.
    pub fn with_output(program: &'p Program, out: Box<dyn Write + 'p>) -> Self {
        Self {
            program,
            gen: PointerGen::new(),
            method_cache: HashMap::new(),
            out,
        }
    }

    /// Build the initial state for the `main` method of `main_class`.
    ///
    /// The initial receiver is bound at register name `"this"` -- not
    /// `"$this"`, which is the register the `this` expression reads -- so
    /// a top-level `main` that evaluates `this` observes an unbound
    /// address. Methods invoked from `main` onward get `$this` bound
    /// normally.
    pub fn initial_state(&mut self, main_class: &str) -> Result<State, MachineError> {
        let main = self.resolve_method(main_class, "main")?;

        let op = self.gen.fresh_object();
        let receiver = Value::Object {
            class_name: main_class.to_string(),
            ptr: op,
        };
        let fp0 = self.gen.fresh_frame();
        let store = Store::new().extend(fp0.offset("this"), receiver);

        Ok(State {
            stmt: main.body,
            fp: fp0,
            store,
            kont: Rc::new(Kont::Halt),
        })
    }

    /// Run `main` of the given class to completion.
    pub fn run(&mut self, main_class: &str) -> Result<Outcome, MachineError> {
        let mut state = self.initial_state(main_class)?;
        loop {
            match self.step(&state)? {
                Transition::Next(next) => state = next,
                Transition::Done(outcome) => return Ok(outcome),
            }
        }
    }

    // ========================================================================
    // The step relation
    // ========================================================================

    /// Advance one state to its successor. Each statement kind has exactly
    /// one transition rule.
    pub fn step(&mut self, state: &State) -> Result<Transition, MachineError> {
        let program = self.program;
        let id = match state.stmt {
            Some(id) => id,
            None => return Ok(Transition::Done(Outcome::FellOffEnd)),
        };
        let stmt = program.stmt(id);
        let next = stmt.next;
        let fp = state.fp;
        let store = &state.store;
        let kont = &state.kont;

        match &stmt.kind {
            StmtKind::Skip | StmtKind::Label(_) => Ok(Transition::Next(State {
                stmt: next,
                fp,
                store: store.clone(),
                kont: kont.clone(),
            })),

            StmtKind::Goto(label) => {
                let target = self.label_target(label)?;
                Ok(Transition::Next(State {
                    stmt: Some(target),
                    fp,
                    store: store.clone(),
                    kont: kont.clone(),
                }))
            }

            StmtKind::If { cond, target } => {
                let taken = if self.eval(cond, fp, store)?.is_truthy() {
                    Some(self.label_target(target)?)
                } else {
                    next
                };
                Ok(Transition::Next(State {
                    stmt: taken,
                    fp,
                    store: store.clone(),
                    kont: kont.clone(),
                }))
            }

            StmtKind::AssignAExp { lhs, rhs } => {
                let value = self.eval(rhs, fp, store)?;
                Ok(Transition::Next(State {
                    stmt: next,
                    fp,
                    store: store.extend(fp.offset(lhs), value),
                    kont: kont.clone(),
                }))
            }

            StmtKind::FieldAssign { object, field, rhs } => {
                let object = self.eval(object, fp, store)?;
                let value = self.eval(rhs, fp, store)?;
                let addr = Self::field_addr(&object, field)?;
                Ok(Transition::Next(State {
                    stmt: next,
                    fp,
                    store: store.extend(addr, value),
                    kont: kont.clone(),
                }))
            }

            StmtKind::New { lhs, class_name } => {
                let ptr = self.gen.fresh_object();
                let object = Value::Object {
                    class_name: class_name.clone(),
                    ptr,
                };
                Ok(Transition::Next(State {
                    stmt: next,
                    fp,
                    store: store.extend(fp.offset(lhs), object),
                    kont: kont.clone(),
                }))
            }

            StmtKind::Invoke {
                lhs,
                object,
                method,
                args,
            } => {
                let receiver = self.eval(object, fp, store)?;
                let class_name = match &receiver {
                    Value::Object { class_name, .. } => class_name.clone(),
                    other => {
                        return Err(MachineError::TypeMismatch(format!(
                            "invoke on non-object: {}",
                            other
                        )))
                    }
                };
                let method = self.resolve_method(&class_name, method)?;
                self.apply_method(method, receiver, lhs, args, next, fp, store, kont)
            }

            StmtKind::InvokeSuper { lhs, method, args } => {
                let receiver = self.read(store, fp.offset("$this"))?;
                let class_name = match &receiver {
                    Value::Object { class_name, .. } => class_name.clone(),
                    other => {
                        return Err(MachineError::TypeMismatch(format!(
                            "invoke super on non-object: {}",
                            other
                        )))
                    }
                };
                let parent = program
                    .class(&class_name)
                    .and_then(|c| c.parent.clone())
                    .ok_or_else(|| MachineError::NoSuchMethod(method.clone()))?;
                let method = self.resolve_method(&parent, method)?;
                self.apply_method(method, receiver, lhs, args, next, fp, store, kont)
            }

            StmtKind::Return(result) => {
                let value = self.eval(result, fp, store)?;
                Ok(kont.apply(value, store))
            }

            StmtKind::PushHandler { class_name, label } => {
                let kont = Rc::new(Kont::Handler {
                    class_name: class_name.clone(),
                    label: label.clone(),
                    next: kont.clone(),
                });
                Ok(Transition::Next(State {
                    stmt: next,
                    fp,
                    store: store.clone(),
                    kont,
                }))
            }

            StmtKind::PopHandler => {
                let kont = kont.pop_handler()?;
                Ok(Transition::Next(State {
                    stmt: next,
                    fp,
                    store: store.clone(),
                    kont,
                }))
            }

            StmtKind::Throw(exception) => {
                let value = self.eval(exception, fp, store)?;
                if !matches!(value, Value::Object { .. }) {
                    return Err(MachineError::TypeMismatch(format!(
                        "throw of non-object: {}",
                        value
                    )));
                }
                kont.handle(value, fp, store, program)
            }

            StmtKind::MoveException(register) => {
                let exception = self.read(store, fp.offset("$ex"))?;
                Ok(Transition::Next(State {
                    stmt: next,
                    fp,
                    store: store.extend(fp.offset(register), exception),
                    kont: kont.clone(),
                }))
            }

            StmtKind::Print(args) => {
                for arg in args {
                    let value = self.eval(arg, fp, store)?;
                    writeln!(self.out, "{}", value)?;
                }
                Ok(Transition::Next(State {
                    stmt: next,
                    fp,
                    store: store.clone(),
                    kont: kont.clone(),
                }))
            }
        }
    }

    /// Enter a method body: actuals are evaluated in the caller's frame
    /// against the caller's store, then `$this` and the formals are bound
    /// in a fresh callee frame, and an `Assign` return point is pushed.
    #[allow(clippy::too_many_arguments)]
    fn apply_method(
        &mut self,
        method: &'p MethodDef,
        receiver: Value,
        lhs: &str,
        args: &[AExp],
        resume: Option<StmtId>,
        fp: FramePointer,
        store: &Store,
        kont: &Rc<Kont>,
    ) -> Result<Transition, MachineError> {
        if args.len() != method.formals.len() {
            return Err(MachineError::TypeMismatch(format!(
                "method {} expects {} argument(s), got {}",
                method.name,
                method.formals.len(),
                args.len()
            )));
        }

        let mut actuals = Vec::with_capacity(args.len());
        for arg in args {
            actuals.push(self.eval(arg, fp, store)?);
        }

        let callee_fp = self.gen.fresh_frame();
        let ret = Rc::new(Kont::Assign {
            register: lhs.to_string(),
            resume,
            fp,
            next: kont.clone(),
        });

        let mut store = store.extend(callee_fp.offset("$this"), receiver);
        for (formal, actual) in method.formals.iter().zip(actuals) {
            store = store.extend(callee_fp.offset(formal), actual);
        }

        Ok(Transition::Next(State {
            stmt: method.body,
            fp: callee_fp,
            store,
            kont: ret,
        }))
    }

    // ========================================================================
    // Atomic expression evaluation
    // ========================================================================

    /// Evaluate an atomic expression against a frame pointer and a store.
    /// Pure: no allocation, no store extension, no continuation effects.
    pub fn eval(&self, exp: &AExp, fp: FramePointer, store: &Store) -> Result<Value, MachineError> {
        match exp {
            AExp::This => self.read(store, fp.offset("$this")),
            AExp::Register(register) => self.read(store, fp.offset(register)),
            AExp::Int(n) => Ok(Value::Int(*n)),
            AExp::Bool(b) => Ok(Value::Bool(*b)),
            AExp::Null => Ok(Value::Null),
            AExp::Void => Ok(Value::Void),

            AExp::Field(object, field) => {
                let object = self.eval(object, fp, store)?;
                let addr = Self::field_addr(&object, field)?;
                self.read(store, addr)
            }

            AExp::InstanceOf(object, class_name) => match self.eval(object, fp, store)? {
                Value::Object {
                    class_name: actual, ..
                } => Ok(Value::Bool(self.program.is_instance_of(&actual, class_name))),
                other => Err(MachineError::TypeMismatch(format!(
                    "instanceof on non-object: {}",
                    other
                ))),
            },

            AExp::Atomic(op, args) => self.eval_op(*op, args, fp, store),
        }
    }

    fn eval_op(
        &self,
        op: PrimOp,
        args: &[AExp],
        fp: FramePointer,
        store: &Store,
    ) -> Result<Value, MachineError> {
        match op {
            // n-ary fold from the additive identity
            PrimOp::Add => {
                let mut sum = 0i32;
                for arg in args {
                    sum = sum.wrapping_add(self.int_arg(arg, fp, store)?);
                }
                Ok(Value::Int(sum))
            }

            // n-ary fold from the multiplicative identity
            PrimOp::Mul => {
                let mut product = 1i32;
                for arg in args {
                    product = product.wrapping_mul(self.int_arg(arg, fp, store)?);
                }
                Ok(Value::Int(product))
            }

            PrimOp::Sub => match args {
                [a, b] => Ok(Value::Int(
                    self.int_arg(a, fp, store)?
                        .wrapping_sub(self.int_arg(b, fp, store)?),
                )),
                _ => Err(MachineError::TypeMismatch(format!(
                    "'-' expects 2 arguments, got {}",
                    args.len()
                ))),
            },

            // integer equality only; there is no reference equality
            PrimOp::Eq => match args {
                [a, b] => Ok(Value::Bool(
                    self.int_arg(a, fp, store)? == self.int_arg(b, fp, store)?,
                )),
                _ => Err(MachineError::TypeMismatch(format!(
                    "'=' expects 2 arguments, got {}",
                    args.len()
                ))),
            },
        }
    }

    fn int_arg(&self, arg: &AExp, fp: FramePointer, store: &Store) -> Result<i32, MachineError> {
        let value = self.eval(arg, fp, store)?;
        value.as_int().ok_or_else(|| {
            MachineError::TypeMismatch(format!("expected an int, got {}", value.type_name()))
        })
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn read(&self, store: &Store, addr: Addr) -> Result<Value, MachineError> {
        store
            .get(&addr)
            .cloned()
            .ok_or(MachineError::UnboundAddr(addr))
    }

    fn field_addr(object: &Value, field: &str) -> Result<Addr, MachineError> {
        match object {
            Value::Object { ptr, .. } => Ok(ptr.offset(field)),
            other => Err(MachineError::TypeMismatch(format!(
                "cannot offset non-object: {}",
                other
            ))),
        }
    }

    fn label_target(&self, label: &str) -> Result<StmtId, MachineError> {
        self.program
            .label_target(label)
            .ok_or_else(|| MachineError::UnresolvedLabel(label.to_string()))
    }

    fn resolve_method(
        &mut self,
        class_name: &str,
        method: &str,
    ) -> Result<&'p MethodDef, MachineError> {
        let program = self.program;
        let key = (class_name.to_string(), method.to_string());
        if let Some(owner) = self.method_cache.get(&key) {
            if let Some(found) = program.class(owner).and_then(|c| c.method(method)) {
                return Ok(found);
            }
        }
        match program.lookup_method(class_name, method) {
            Some((owner, found)) => {
                self.method_cache.insert(key, owner.to_string());
                Ok(found)
            }
            None => Err(MachineError::NoSuchMethod(method.to_string())),
        }
    }
}
