use cool_frontend::{
    analyze, dump_program, parse_source, sym, type_check_program, ClassTable, DumpTypes, Interner,
    SemantErrorKind,
};

const SHAPES: &str = r#"
class Shape {
  area() : Int { 0 };
  scaled(k : Int) : SELF_TYPE { self };
};

class Square inherits Shape {
  side : Int <- 2;
  area() : Int { side * side };
};

class Circle inherits Shape {
  r : Int <- 1;
  area() : Int { 3 * r * r };
};

class Main inherits IO {
  pick(b : Bool) : Shape { if b then new Square else new Circle fi };
  main() : Object {
    let s : Shape <- pick(true) in {
      out_int(s.scaled(2).area());
      out_string("\n");
    }
  };
};
"#;

#[test]
fn suppressed_dump_is_stable_across_type_checking() {
    let mut interner = Interner::new();
    let prog = parse_source(&mut interner, "shapes.cl", SHAPES).unwrap();

    let before = dump_program(&prog, &interner, DumpTypes::Suppress);
    assert!(!before.contains(": Int"));
    type_check_program(&prog, &interner).unwrap();
    let after = dump_program(&prog, &interner, DumpTypes::Suppress);
    assert_eq!(before, after);

    let typed = dump_program(&prog, &interner, DumpTypes::Show);
    assert!(typed.contains(": Int\n"));
    assert!(typed.contains(": Shape\n"));
    assert_eq!(typed.lines().count(), before.lines().count());
}

#[test]
fn conditional_takes_the_least_upper_bound() {
    let mut interner = Interner::new();
    let prog = parse_source(&mut interner, "shapes.cl", SHAPES).unwrap();
    let analysis = analyze(&prog, &interner).unwrap();

    let shape = interner.ident("Shape");
    let square = analysis.classes.find(interner.ident("Square")).unwrap();
    let circle = analysis.classes.find(interner.ident("Circle")).unwrap();
    let lub = analysis.classes.lub(square, circle);
    assert_eq!(analysis.classes.node(lub).name, shape);
}

#[test]
fn conformance_is_reflexive_and_follows_inheritance() {
    let mut interner = Interner::new();
    let prog = parse_source(&mut interner, "shapes.cl", SHAPES).unwrap();
    let classes = ClassTable::install(&prog);

    let object = classes.root();
    for id in classes.preorder() {
        assert!(classes.conforms(id, id));
        assert!(classes.conforms(id, object));
        assert_eq!(classes.lub(id, id), id);
        assert_eq!(classes.lub(id, object), object);
    }

    let square = classes.find(interner.ident("Square")).unwrap();
    let shape = classes.find(interner.ident("Shape")).unwrap();
    assert!(classes.conforms(square, shape));
    assert!(!classes.conforms(shape, square));
    assert_eq!(classes.depth(square), 2);

    let int = classes.find(sym::INT).unwrap();
    assert_eq!(classes.lub(int, square), object);
}

#[test]
fn errors_in_several_classes_are_all_reported() {
    let src = r#"
class A { f() : Int { true }; };
class B { g() : Bool { 1 + false }; };
class Main { main() : Object { undefined_thing }; };
"#;
    let mut interner = Interner::new();
    let prog = parse_source(&mut interner, "multi.cl", src).unwrap();
    let errs = type_check_program(&prog, &interner).unwrap_err();

    let lines: Vec<_> = errs.iter().map(|e| e.line).collect();
    assert!(lines.contains(&2));
    assert!(lines.contains(&3));
    assert!(lines.contains(&4));
    assert!(errs
        .iter()
        .any(|e| matches!(e.kind, SemantErrorKind::UndefinedIdentifier { .. })));
    assert!(errs.iter().all(|e| e.filename == "multi.cl"));
}

#[test]
fn programs_from_several_files_keep_their_file_names() {
    let mut interner = Interner::new();
    let mut prog = parse_source(&mut interner, "a.cl", "class A { x : Int <- \"no\"; };").unwrap();
    let main = parse_source(&mut interner, "main.cl", "class Main { main() : Int { 0 }; };").unwrap();
    prog.classes.extend(main.classes);

    let errs = type_check_program(&prog, &interner).unwrap_err();
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].filename, "a.cl");
    assert!(matches!(errs[0].kind, SemantErrorKind::AttrInitMismatch { .. }));
}
