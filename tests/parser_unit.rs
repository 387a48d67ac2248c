//! Parser unit tests
//!
//! These tests verify the shape of the AST the parser builds for each
//! construct of the surface syntax. Tests are organized by category.

use schist::ast::{AExp, PrimOp, Program, StmtKind};
use schist::test_support::parse_source;

// ============================================================================
// Helpers
// ============================================================================

fn parse(input: &str) -> (Program, Vec<String>) {
    parse_source(input).unwrap()
}

/// The statement kinds of a method body, in successor order.
fn body_kinds<'a>(program: &'a Program, class: &str, method: &str) -> Vec<&'a StmtKind> {
    let (_, m) = program.lookup_method(class, method).unwrap();
    let mut kinds = Vec::new();
    let mut cur = m.body;
    while let Some(id) = cur {
        let stmt = program.stmt(id);
        kinds.push(&stmt.kind);
        cur = stmt.next;
    }
    kinds
}

// ============================================================================
// Class definitions
// ============================================================================

mod classes {
    use super::*;

    #[test]
    fn empty_class() {
        let (program, classes) = parse("class A extends Object { }");
        assert_eq!(classes, vec!["A".to_string()]);
        let a = program.class("A").unwrap();
        assert_eq!(a.parent.as_deref(), Some("Object"));
    }

    #[test]
    fn fields_then_methods() {
        let (program, _) = parse(
            "class Box extends Object {
               var v;
               var w;
               def get() { return $x; }
             }",
        );
        let class = program.class("Box").unwrap();
        assert!(class.field("v").is_some());
        assert!(class.field("w").is_some());
        assert!(class.field("missing").is_none());
        assert!(class.method("get").is_some());
    }

    #[test]
    fn formals_in_order() {
        let (program, _) = parse("class A extends Object { def f($a, $b, $c) { skip; } }");
        let (_, m) = program.lookup_method("A", "f").unwrap();
        assert_eq!(m.formals, vec!["$a", "$b", "$c"]);
    }

    #[test]
    fn empty_method_body_has_no_entry() {
        let (program, _) = parse("class A extends Object { def f() { } }");
        let (_, m) = program.lookup_method("A", "f").unwrap();
        assert!(m.body.is_none());
    }

    #[test]
    fn several_classes_keep_declaration_order() {
        let (_, classes) = parse(
            "class A extends Object { }
             class B extends A { }
             class C extends B { }",
        );
        assert_eq!(classes, vec!["A", "B", "C"]);
    }
}

// ============================================================================
// Statements
// ============================================================================

mod statements {
    use super::*;

    fn parse_main(body: &str) -> (Program, Vec<String>) {
        let source = format!("class Main extends Object {{ def main() {{ {} }} }}", body);
        parse(&source)
    }

    #[test]
    fn skip_and_fallthrough() {
        let (program, _) = parse_main("skip; skip; return void;");
        let kinds = body_kinds(&program, "Main", "main");
        assert!(matches!(kinds[0], StmtKind::Skip));
        assert!(matches!(kinds[1], StmtKind::Skip));
        assert!(matches!(kinds[2], StmtKind::Return(AExp::Void)));
        assert_eq!(kinds.len(), 3);
    }

    #[test]
    fn label_registers_itself() {
        let (program, _) = parse_main("label loop: goto loop;");
        let kinds = body_kinds(&program, "Main", "main");
        assert!(matches!(kinds[0], StmtKind::Label(l) if l == "loop"));
        assert!(matches!(kinds[1], StmtKind::Goto(l) if l == "loop"));

        let (_, m) = program.lookup_method("Main", "main").unwrap();
        assert_eq!(program.label_target("loop"), m.body);
    }

    #[test]
    fn if_carries_condition_and_target() {
        let (program, _) = parse_main("if =(1,2) goto done; label done: skip;");
        let kinds = body_kinds(&program, "Main", "main");
        match kinds[0] {
            StmtKind::If { cond, target } => {
                assert!(matches!(cond, AExp::Atomic(PrimOp::Eq, args) if args.len() == 2));
                assert_eq!(target, "done");
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn register_assignment() {
        let (program, _) = parse_main("$x := +(1,2);");
        let kinds = body_kinds(&program, "Main", "main");
        match kinds[0] {
            StmtKind::AssignAExp { lhs, rhs } => {
                assert_eq!(lhs, "$x");
                assert!(matches!(rhs, AExp::Atomic(PrimOp::Add, _)));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn new_assignment() {
        let (program, _) = parse_main("$b := new Box;");
        let kinds = body_kinds(&program, "Main", "main");
        assert!(matches!(
            kinds[0],
            StmtKind::New { lhs, class_name } if lhs == "$b" && class_name == "Box"
        ));
    }

    #[test]
    fn invoke_assignment() {
        let (program, _) = parse_main("$r := invoke $o.frob($a, 3);");
        let kinds = body_kinds(&program, "Main", "main");
        match kinds[0] {
            StmtKind::Invoke {
                lhs,
                object,
                method,
                args,
            } => {
                assert_eq!(lhs, "$r");
                assert!(matches!(object, AExp::Register(r) if r == "$o"));
                assert_eq!(method, "frob");
                assert_eq!(args.len(), 2);
                assert!(matches!(&args[1], AExp::Int(3)));
            }
            other => panic!("expected invoke, got {:?}", other),
        }
    }

    #[test]
    fn invoke_super_assignment() {
        let (program, _) = parse_main("$r := invoke super.frob();");
        let kinds = body_kinds(&program, "Main", "main");
        assert!(matches!(
            kinds[0],
            StmtKind::InvokeSuper { lhs, method, args }
                if lhs == "$r" && method == "frob" && args.is_empty()
        ));
    }

    #[test]
    fn handler_statements() {
        let (program, _) =
            parse_main("pushHandler Error oops; popHandler; label oops: moveException $e;");
        let kinds = body_kinds(&program, "Main", "main");
        assert!(matches!(
            kinds[0],
            StmtKind::PushHandler { class_name, label }
                if class_name == "Error" && label == "oops"
        ));
        assert!(matches!(kinds[1], StmtKind::PopHandler));
        assert!(matches!(kinds[3], StmtKind::MoveException(r) if r == "$e"));
    }

    #[test]
    fn throw_takes_an_expression() {
        let (program, _) = parse_main("throw $e;");
        let kinds = body_kinds(&program, "Main", "main");
        assert!(matches!(kinds[0], StmtKind::Throw(AExp::Register(r)) if r == "$e"));
    }

    #[test]
    fn print_takes_several_arguments() {
        let (program, _) = parse_main("print(1, $x, true);");
        let kinds = body_kinds(&program, "Main", "main");
        assert!(matches!(kinds[0], StmtKind::Print(args) if args.len() == 3));
    }
}

// ============================================================================
// Expressions
// ============================================================================

mod expressions {
    use super::*;

    fn rhs_of(body: &str) -> (Program, AExp) {
        let source = format!("class Main extends Object {{ def main() {{ {} }} }}", body);
        let (program, _) = parse(&source);
        let rhs = match body_kinds(&program, "Main", "main")[0] {
            StmtKind::AssignAExp { rhs, .. } => rhs.clone(),
            other => panic!("expected assignment, got {:?}", other),
        };
        (program, rhs)
    }

    #[test]
    fn literals() {
        assert!(matches!(rhs_of("$x := 42;").1, AExp::Int(42)));
        assert!(matches!(rhs_of("$x := true;").1, AExp::Bool(true)));
        assert!(matches!(rhs_of("$x := false;").1, AExp::Bool(false)));
        assert!(matches!(rhs_of("$x := null;").1, AExp::Null));
        assert!(matches!(rhs_of("$x := void;").1, AExp::Void));
        assert!(matches!(rhs_of("$x := this;").1, AExp::This));
    }

    #[test]
    fn atomic_operations() {
        assert!(matches!(
            rhs_of("$x := +(1, 2, 3);").1,
            AExp::Atomic(PrimOp::Add, args) if args.len() == 3
        ));
        assert!(matches!(
            rhs_of("$x := -($a, 1);").1,
            AExp::Atomic(PrimOp::Sub, args) if args.len() == 2
        ));
        assert!(matches!(
            rhs_of("$x := *();").1,
            AExp::Atomic(PrimOp::Mul, args) if args.is_empty()
        ));
        assert!(matches!(
            rhs_of("$x := =($a, $b);").1,
            AExp::Atomic(PrimOp::Eq, args) if args.len() == 2
        ));
    }

    #[test]
    fn nested_operations() {
        let (_, exp) = rhs_of("$x := +(*(2, 3), -(10, 4));");
        match exp {
            AExp::Atomic(PrimOp::Add, args) => {
                assert!(matches!(&args[0], AExp::Atomic(PrimOp::Mul, _)));
                assert!(matches!(&args[1], AExp::Atomic(PrimOp::Sub, _)));
            }
            other => panic!("expected add, got {:?}", other),
        }
    }

    #[test]
    fn field_access_suffix() {
        let (_, exp) = rhs_of("$x := $o.count;");
        match exp {
            AExp::Field(base, field) => {
                assert!(matches!(base.as_ref(), AExp::Register(r) if r == "$o"));
                assert_eq!(field, "count");
            }
            other => panic!("expected field access, got {:?}", other),
        }
    }

    #[test]
    fn instance_of() {
        let (_, exp) = rhs_of("$x := instanceof($o, Box);");
        assert!(matches!(
            exp,
            AExp::InstanceOf(_, class_name) if class_name == "Box"
        ));
    }
}
