//! Type checker integration tests

use pretty_assertions::assert_eq;
use rill_alloc::HeapAlloc;
use rill_common::SourceBuffer;
use rill_lexer::lex;
use rill_parser::{parse, StmtKind, Ty};
use rill_typechecker::{check, TypedTree};

fn check_ok<'a>(source: &'a SourceBuffer, heap: &'a HeapAlloc) -> TypedTree<'a> {
    check(parse(lex(source, heap).expect("lexes")).expect("parses")).expect("checks")
}

fn check_fails(text: &str) -> bool {
    let heap = HeapAlloc::new();
    let source = SourceBuffer::new("<test>", text);
    let Ok(tokens) = lex(&source, &heap) else { return true };
    let Ok(tree) = parse(tokens) else { return true };
    let result = check(tree).is_err();
    result
}

#[test]
fn literals_have_intrinsic_types() {
    let heap = HeapAlloc::new();
    let source = SourceBuffer::new("<test>", "1 + 2 * 3");
    let tree = check_ok(&source, &heap);
    let StmtKind::Expr(expr) = &tree.module.stmts[0].kind else { panic!() };
    assert_eq!(expr.ty, Some(Ty::Int));
}

#[test]
fn var_decl_takes_the_initializer_type_and_a_slot() {
    let heap = HeapAlloc::new();
    let source = SourceBuffer::new("<test>", "a := 1 b := 2.5 c := a < 3");
    let tree = check_ok(&source, &heap);
    let slots_and_types: Vec<(Option<u32>, Option<Ty>)> = tree
        .module
        .stmts
        .iter()
        .map(|s| match &s.kind {
            StmtKind::VarDecl { slot, ty, .. } => (*slot, *ty),
            _ => panic!("expected var decl"),
        })
        .collect();
    assert_eq!(
        slots_and_types,
        vec![
            (Some(0), Some(Ty::Int)),
            (Some(1), Some(Ty::Real)),
            (Some(2), Some(Ty::Bool)),
        ]
    );
    assert_eq!(tree.module.frame_slots, Some(3));
}

#[test]
fn functions_get_ids_and_frame_sizes() {
    let heap = HeapAlloc::new();
    let source = SourceBuffer::new(
        "<test>",
        "fun main(a: int, b: int) int { c := a + b return c } main(34, 35)",
    );
    let tree = check_ok(&source, &heap);
    let StmtKind::FunDecl(fun) = &tree.module.decls[0].kind else { panic!() };
    // id 0 is the print builtin
    assert_eq!(fun.fun_id, Some(1));
    // two params + one local
    assert_eq!(fun.frame_slots, Some(3));
    assert!(tree.functions[0].builtin);
    assert_eq!(tree.functions[1].params, vec![Ty::Int, Ty::Int]);
    assert_eq!(tree.functions[1].ret, Ty::Int);

    let StmtKind::Expr(call) = &tree.module.stmts[0].kind else { panic!() };
    let rill_parser::ExprKind::Call { fun_id, .. } = &call.kind else { panic!() };
    assert_eq!(*fun_id, Some(1));
}

#[test]
fn forward_references_resolve_through_the_partition() {
    let heap = HeapAlloc::new();
    let source = SourceBuffer::new(
        "<test>",
        "main() fun main() int { return nested(69) } fun nested(a: int) int { return a }",
    );
    check_ok(&source, &heap);
}

#[test]
fn recursion_and_mutual_recursion_check() {
    let heap = HeapAlloc::new();
    let source = SourceBuffer::new(
        "<test>",
        "fun even(n: int) bool { if n == 0 then return true return odd(n - 1) } \
         fun odd(n: int) bool { if n == 0 then return false return even(n - 1) } \
         even(10)",
    );
    check_ok(&source, &heap);
}

#[test]
fn struct_layouts_flatten_nested_structs() {
    let heap = HeapAlloc::new();
    let source = SourceBuffer::new(
        "<test>",
        "struct Inner { x: int y: int } struct Outer { a: int inner: Inner b: int } \
         o := Outer { a = 1 inner = Inner { x = 2 y = 3 } b = 4 } o.b",
    );
    let tree = check_ok(&source, &heap);
    let outer = tree
        .structs
        .values()
        .find(|layout| tree.tokens.pool().get(layout.name) == "Outer")
        .expect("Outer layout");
    assert_eq!(outer.slots, 4);
    assert_eq!(outer.fields[0].offset, 0);
    assert_eq!(outer.fields[1].offset, 1);
    assert_eq!(outer.fields[2].offset, 3);
}

#[test]
fn field_access_is_resolved_to_absolute_slots() {
    let heap = HeapAlloc::new();
    let source = SourceBuffer::new(
        "<test>",
        "struct Foo { a: int b: int } x := 1 foo := Foo { a = 35 b = 34 } foo.b",
    );
    let tree = check_ok(&source, &heap);
    let StmtKind::Expr(expr) = &tree.module.stmts[2].kind else { panic!() };
    let rill_parser::ExprKind::Access { slot, .. } = &expr.kind else { panic!() };
    // x is slot 0, foo occupies 1..3, so foo.b is slot 2.
    assert_eq!(*slot, Some(2));
}

#[test]
fn defaults_fill_uncovered_fields() {
    let heap = HeapAlloc::new();
    let source = SourceBuffer::new(
        "<test>",
        "struct Foo { a: int b: int = 7 } foo := Foo { a = 1 } foo.b",
    );
    check_ok(&source, &heap);
}

#[test]
fn print_builtin_is_predeclared() {
    let heap = HeapAlloc::new();
    let source = SourceBuffer::new("<test>", "print(\"hello\")");
    let tree = check_ok(&source, &heap);
    assert!(tree.functions[0].builtin);
}

#[test]
fn name_resolution_errors() {
    assert!(check_fails("x = 1"));
    assert!(check_fails("x + 1"));
    assert!(check_fails("a := 1 a := 2"));
    assert!(check_fails("missing()"));
    assert!(check_fails("fun f() int { return 1 } f = 2"));
}

#[test]
fn condition_type_errors() {
    assert!(check_fails("if 1 { 2 }"));
    assert!(check_fails("while 1 { }"));
    assert!(check_fails("if 1 + 2 then 3"));
}

#[test]
fn operator_type_errors() {
    assert!(check_fails("1 + 2.5"));
    assert!(check_fails("true + false"));
    assert!(check_fails("1 and 2"));
    assert!(check_fails("not 1"));
    assert!(check_fails("-true"));
    assert!(check_fails("\"a\" < \"b\""));
    assert!(check_fails("1 == true"));
}

#[test]
fn call_type_errors() {
    assert!(check_fails("fun f(a: int) int { return a } f()"));
    assert!(check_fails("fun f(a: int) int { return a } f(1, 2)"));
    assert!(check_fails("fun f(a: int) int { return a } f(true)"));
}

#[test]
fn return_type_errors() {
    assert!(check_fails("return 1"));
    assert!(check_fails("fun f() int { return true }"));
    assert!(check_fails("fun f() { return 1 }"));
    assert!(check_fails("fun f() int { return 1 } x := f() + 0.5"));
}

#[test]
fn struct_type_errors() {
    assert!(check_fails("struct Foo { a: int } foo := Foo { a = 1 } foo.missing"));
    assert!(check_fails("struct Foo { a: int } foo := Foo { }"));
    assert!(check_fails("struct Foo { a: int } foo := Foo { a = 1 a = 2 }"));
    assert!(check_fails("struct Foo { a: int } foo := Foo { a = true }"));
    assert!(check_fails("struct Foo { a: int } fun f(x: Foo) int { return 1 }"));
    assert!(check_fails("struct Foo { a: int } fun f() Foo { }"));
    assert!(check_fails("struct Foo { a: int } struct Foo { b: int }"));
    assert!(check_fails("x := 1 x.field"));
}

#[test]
fn variables_do_not_cross_function_frames() {
    assert!(check_fails("a := 1 fun f() int { return a } f()"));
    assert!(check_fails("a := 1 fun f() int { a = 2 return 0 } f()"));
}

#[test]
fn block_scopes_shadow_and_expire() {
    let heap = HeapAlloc::new();
    let source = SourceBuffer::new("<test>", "a := 1 { a := 2 a } a");
    check_ok(&source, &heap);
    assert!(check_fails("{ b := 1 } b"));
}
