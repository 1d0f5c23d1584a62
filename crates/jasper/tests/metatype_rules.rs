use jasper::ast::{BuiltinType, ProgramBuilder, SeqItem};
use jasper::typecheck::check_program;
use jasper::{MetaType, TypeError};

#[test]
fn value_definitions_cannot_form_a_pure_reference_cycle() {
    let mut b = ProgramBuilder::new();
    let a = b.declare("a");
    let b_decl = b.declare("b");
    let b_ref = b.ident(b_decl);
    b.define(a, b_ref);
    let a_ref = b.ident(a);
    b.define(b_decl, a_ref);

    let err = check_program(&b.finish()).unwrap_err();
    match err {
        TypeError::MetaCycle { names, .. } => {
            assert!(names.contains('a'));
            assert!(names.contains('b'));
        }
        other => panic!("expected MetaCycle, got {other:?}"),
    }
}

#[test]
fn a_declaration_cannot_be_defined_as_itself() {
    let mut b = ProgramBuilder::new();
    let a = b.declare("a");
    let a_ref = b.ident(a);
    b.define(a, a_ref);

    let err = check_program(&b.finish()).unwrap_err();
    assert!(matches!(err, TypeError::MetaCycle { .. }), "got {err:?}");
}

#[test]
fn cycles_cannot_mix_types_and_values() {
    let mut b = ProgramBuilder::new();
    let int_ty = b.ident(b.builtin(BuiltinType::Int));
    let struct_ty = b.struct_type(vec![("x", int_ty)]);
    let t = b.decl("T", struct_ty);
    let one = b.int(1);
    let v = b.decl("v", one);
    // Edges the resolver would produce for annotations not modelled here.
    b.add_reference(t, v);
    b.add_reference(v, t);

    let err = check_program(&b.finish()).unwrap_err();
    assert!(matches!(err, TypeError::MixedCycle { .. }), "got {err:?}");
}

#[test]
fn constructors_cannot_be_bound_to_names() {
    let mut b = ProgramBuilder::new();
    let unit_ty = b.ident(b.builtin(BuiltinType::Unit));
    let union = b.union_type(vec![("Red", unit_ty)]);
    let color = b.decl("Color", union);

    let color_ref = b.ident(color);
    let red = b.access(color_ref, "Red");
    b.decl("c", red);

    let err = check_program(&b.finish()).unwrap_err();
    match err {
        TypeError::ConstructorBinding { name, .. } => assert_eq!(name, "c"),
        other => panic!("expected ConstructorBinding, got {other:?}"),
    }
}

#[test]
fn declarations_are_classified_into_metatypes() {
    let mut b = ProgramBuilder::new();
    let int_ty = b.ident(b.builtin(BuiltinType::Int));
    let struct_ty = b.struct_type(vec![("x", int_ty)]);
    let t = b.decl("T", struct_ty);

    let t_ref = b.ident(t);
    let alias = b.decl("Alias", t_ref);

    let array_ref = b.ident(b.builtin(BuiltinType::Array));
    let int_ty2 = b.ident(b.builtin(BuiltinType::Int));
    let applied = b.type_apply(array_ref, vec![int_ty2]);
    let int_list = b.decl("IntList", applied);

    let one = b.int(1);
    let v = b.decl("v", one);

    let typed = check_program(&b.finish()).expect("program should check");
    assert_eq!(typed.meta_type_of_decl(t), MetaType::TypeFunction);
    assert_eq!(typed.meta_type_of_decl(alias), MetaType::TypeFunction);
    assert_eq!(typed.meta_type_of_decl(int_list), MetaType::Type);
    assert_eq!(typed.meta_type_of_decl(v), MetaType::Term);
}

#[test]
fn types_cannot_appear_in_value_positions() {
    let mut b = ProgramBuilder::new();
    let int_ty = b.ident(b.builtin(BuiltinType::Int));
    let struct_ty = b.struct_type(vec![("x", int_ty)]);
    let t = b.decl("T", struct_ty);

    let t_ref = b.ident(t);
    let arr = b.array(vec![t_ref]);
    b.decl("bad", arr);

    let err = check_program(&b.finish()).unwrap_err();
    assert!(matches!(err, TypeError::MetaConflict { .. }), "got {err:?}");
}

#[test]
fn block_bindings_must_be_values() {
    let mut b = ProgramBuilder::new();
    let int_ty = b.ident(b.builtin(BuiltinType::Int));
    let struct_ty = b.struct_type(vec![("x", int_ty)]);
    let local = b.local("t", struct_ty);
    let one = b.int(1);
    let seq = b.seq(vec![SeqItem::Bind(local), SeqItem::Expr(one)]);
    b.decl("bad", seq);

    let err = check_program(&b.finish()).unwrap_err();
    assert!(matches!(err, TypeError::MetaConflict { .. }), "got {err:?}");
}

#[test]
fn block_bindings_are_checked_and_scoped() {
    let mut b = ProgramBuilder::new();
    let one = b.int(1);
    let local = b.local("n", one);
    let n_ref = b.ident(local);
    let n_ref2 = b.ident(local);
    let two = b.int(2);
    let pick = b.ternary(n_ref, n_ref2, two);
    let seq = b.seq(vec![SeqItem::Bind(local), SeqItem::Expr(pick)]);
    let block = b.decl("block", seq);

    let typed = check_program(&b.finish()).expect("program should check");
    assert_eq!(typed.display(typed.value_type(seq).unwrap()), "int");
    assert_eq!(typed.meta_type_of_decl(block), MetaType::Term);
}
