mod test_harness;

use kestrel_core::ast::{AssignOp, BinaryOp, ConstructorInitializerKind, MemberDecl, PostfixOp};
use kestrel_core::{Modifiers, PrimitiveKind};
use test_harness::TestHarness;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn nested_compound_on_a_field_leaves_the_new_value() {
    // int run() { int x = (y += 1); return x; }
    let h = TestHarness::new();
    let b = &h.b;
    let mut class = b.class("Counter");
    class.members.push(MemberDecl::Field(b.field(b.int_type(), "y", None)));
    class.members.push(MemberDecl::Method(b.method(
        "run",
        b.int_type(),
        vec![],
        Some(b.block(vec![
            b.local(b.int_type(), "x", Some(b.compound(AssignOp::AddAssign, b.ident("y"), b.int(1)))),
            b.ret(Some(b.ident("x"))),
        ])),
    )));
    let generated = h.generate(vec![b.unit("Counter.ks", Some("app"), vec![class])]);
    assert_eq!(
        generated.listing("app.Counter", "run"),
        strings(&[
            "aload 0",
            "dup",
            "getfield app/Counter.y:I",
            "iconst_1",
            "iadd",
            "dup_x1",
            "putfield app/Counter.y:I",
            "istore 1",
            "iload 1",
            "ireturn",
        ])
    );
    let code = generated.method("app.Counter", "run").code.as_ref().unwrap();
    assert_eq!(code.max_stack, 3);
    assert_eq!(code.max_locals, 2);
}

#[test]
fn postfix_on_a_static_field_stores_the_old_value() {
    // static int next() { int z = w++; return z; }
    let h = TestHarness::new();
    let b = &h.b;
    let mut class = b.class("Ids");
    let mut w = b.field(b.int_type(), "w", None);
    w.modifiers |= Modifiers::STATIC;
    class.members.push(MemberDecl::Field(w));
    let mut next = b.method(
        "next",
        b.int_type(),
        vec![],
        Some(b.block(vec![
            b.local(b.int_type(), "z", Some(b.postfix(PostfixOp::PostInc, b.ident("w")))),
            b.ret(Some(b.ident("z"))),
        ])),
    );
    next.modifiers |= Modifiers::STATIC;
    class.members.push(MemberDecl::Method(next));
    let generated = h.generate(vec![b.unit("Ids.ks", Some("app"), vec![class])]);
    assert_eq!(
        generated.listing("app.Ids", "next"),
        strings(&[
            "getstatic app/Ids.w:I",
            "dup",
            "iconst_1",
            "iadd",
            "putstatic app/Ids.w:I",
            "istore 0",
            "iload 0",
            "ireturn",
        ])
    );
}

#[test]
fn property_compound_goes_through_both_accessors() {
    let h = TestHarness::new();
    let b = &h.b;
    let mut class = b.class("Box");
    let mut count = b.field(b.int_type(), "count", None);
    count.modifiers = Modifiers::PRIVATE;
    class.members.push(MemberDecl::Field(count));
    class.members.push(MemberDecl::Property(b.property(
        b.int_type(),
        "Count",
        Some(b.accessor(Some(b.block(vec![b.ret(Some(b.ident("count")))])))),
        Some(b.accessor(Some(b.block(vec![b.expr_stmt(b.assign(b.ident("count"), b.ident("value")))])))),
    )));
    class.members.push(MemberDecl::Method(b.method(
        "bump",
        b.int_type(),
        vec![],
        Some(b.block(vec![b.ret(Some(b.compound(
            AssignOp::AddAssign,
            b.member(b.this(), "Count"),
            b.int(2),
        )))])),
    )));
    let generated = h.generate(vec![b.unit("Box.ks", Some("app"), vec![class])]);
    assert_eq!(
        generated.listing("app.Box", "bump"),
        strings(&[
            "aload 0",
            "dup",
            "invokevirtual app/Box.getCount()I",
            "iconst_2",
            "iadd",
            "dup_x1",
            "invokevirtual app/Box.setCount(I)V",
            "ireturn",
        ])
    );
}

#[test]
fn two_index_indexers_spill_their_operands() {
    let h = TestHarness::new();
    let b = &h.b;
    let mut class = b.class("Grid");
    let getter = b.accessor(Some(b.block(vec![b.ret(Some(b.binary(
        BinaryOp::Add,
        b.ident("r"),
        b.ident("c"),
    )))])));
    let setter = b.accessor(Some(b.block(vec![])));
    class.members.push(MemberDecl::Indexer(b.indexer(
        b.int_type(),
        vec![b.param(b.int_type(), "r"), b.param(b.int_type(), "c")],
        Some(getter),
        Some(setter),
    )));
    class.members.push(MemberDecl::Method(b.method(
        "grow",
        b.void_type(),
        vec![],
        Some(b.block(vec![b.expr_stmt(b.compound(
            AssignOp::AddAssign,
            b.index(b.this(), vec![b.int(1), b.int(2)]),
            b.int(5),
        ))])),
    )));
    let generated = h.generate(vec![b.unit("Grid.ks", Some("app"), vec![class])]);
    let text = generated.listing("app.Grid", "grow");
    let count = |prefix: &str| text.iter().filter(|i| i.starts_with(prefix)).count();
    assert_eq!(count("invokevirtual app/Grid.getItem(II)I"), 1);
    assert_eq!(count("invokevirtual app/Grid.setItem(III)V"), 1);
    // Receiver, two indexes and the new value live in temporaries.
    assert_eq!(count("astore"), 1);
    assert_eq!(count("istore"), 3);
    assert!(!text.iter().any(|i| i.starts_with("dup")), "{:?}", text);
    let code = generated.method("app.Grid", "grow").code.as_ref().unwrap();
    assert!(code.max_locals >= 5);
}

#[test]
fn wide_locals_and_static_fields_duplicate_two_slots() {
    let h = TestHarness::new();
    let b = &h.b;
    let long = || b.prim(PrimitiveKind::Long);
    let mut class = b.class("Totals");
    let mut total = b.field(long(), "total", None);
    total.modifiers |= Modifiers::STATIC;
    class.members.push(MemberDecl::Field(total));
    let mut add = b.method(
        "add",
        long(),
        vec![b.param(long(), "d")],
        Some(b.block(vec![b.ret(Some(b.compound(AssignOp::AddAssign, b.ident("total"), b.ident("d"))))])),
    );
    add.modifiers |= Modifiers::STATIC;
    class.members.push(MemberDecl::Method(add));
    class.members.push(MemberDecl::Method(b.method(
        "step",
        long(),
        vec![],
        Some(b.block(vec![
            b.local(long(), "n", Some(b.long(1))),
            b.local(long(), "m", Some(b.postfix(PostfixOp::PostInc, b.ident("n")))),
            b.ret(Some(b.ident("m"))),
        ])),
    )));
    let generated = h.generate(vec![b.unit("Totals.ks", Some("app"), vec![class])]);
    assert_eq!(
        generated.listing("app.Totals", "add"),
        strings(&[
            "getstatic app/Totals.total:J",
            "lload 0",
            "ladd",
            "dup2",
            "putstatic app/Totals.total:J",
            "lreturn",
        ])
    );
    assert_eq!(
        generated.listing("app.Totals", "step"),
        strings(&[
            "lconst_1",
            "lstore 1",
            "lload 1",
            "dup2",
            "lconst_1",
            "ladd",
            "lstore 1",
            "lstore 3",
            "lload 3",
            "lreturn",
        ])
    );
}

#[test]
fn wide_instance_fields_duplicate_under_the_receiver() {
    let h = TestHarness::new();
    let b = &h.b;
    let mut class = b.class("Meter");
    class.members.push(MemberDecl::Field(b.field(b.prim(PrimitiveKind::Double), "level", None)));
    class.members.push(MemberDecl::Field(b.field(b.prim(PrimitiveKind::Long), "ticks", None)));
    class.members.push(MemberDecl::Method(b.method(
        "bump",
        b.prim(PrimitiveKind::Double),
        vec![],
        Some(b.block(vec![b.ret(Some(b.postfix(PostfixOp::PostInc, b.ident("level"))))])),
    )));
    class.members.push(MemberDecl::Method(b.method(
        "tick",
        b.prim(PrimitiveKind::Long),
        vec![b.param(b.prim(PrimitiveKind::Long), "d")],
        Some(b.block(vec![b.ret(Some(b.compound(AssignOp::AddAssign, b.ident("ticks"), b.ident("d"))))])),
    )));
    let generated = h.generate(vec![b.unit("Meter.ks", Some("app"), vec![class])]);
    assert_eq!(
        generated.listing("app.Meter", "bump"),
        strings(&[
            "aload 0",
            "dup",
            "getfield app/Meter.level:D",
            "dup2_x1",
            "dconst_1",
            "dadd",
            "putfield app/Meter.level:D",
            "dreturn",
        ])
    );
    assert_eq!(
        generated.listing("app.Meter", "tick"),
        strings(&[
            "aload 0",
            "dup",
            "getfield app/Meter.ticks:J",
            "lload 1",
            "ladd",
            "dup2_x1",
            "putfield app/Meter.ticks:J",
            "lreturn",
        ])
    );
}

#[test]
fn wide_array_elements_duplicate_under_array_and_index() {
    let h = TestHarness::new();
    let b = &h.b;
    let mut class = b.class("Buffers");
    class.members.push(MemberDecl::Method(b.method(
        "grow",
        b.prim(PrimitiveKind::Long),
        vec![b.param(b.array_of(b.prim(PrimitiveKind::Long)), "a")],
        Some(b.block(vec![b.ret(Some(b.compound(
            AssignOp::AddAssign,
            b.index(b.ident("a"), vec![b.int(1)]),
            b.long(1),
        )))])),
    )));
    class.members.push(MemberDecl::Method(b.method(
        "drain",
        b.prim(PrimitiveKind::Double),
        vec![b.param(b.array_of(b.prim(PrimitiveKind::Double)), "d")],
        Some(b.block(vec![b.ret(Some(b.postfix(
            PostfixOp::PostDec,
            b.index(b.ident("d"), vec![b.int(0)]),
        )))])),
    )));
    let generated = h.generate(vec![b.unit("Buffers.ks", Some("app"), vec![class])]);
    assert_eq!(
        generated.listing("app.Buffers", "grow"),
        strings(&["aload 1", "iconst_1", "dup2", "laload", "lconst_1", "ladd", "dup2_x2", "lastore", "lreturn"])
    );
    assert_eq!(
        generated.listing("app.Buffers", "drain"),
        strings(&["aload 1", "iconst_0", "dup2", "daload", "dup2_x2", "dconst_1", "dsub", "dastore", "dreturn"])
    );
}

#[test]
fn wide_first_index_spills_the_indexer_operands() {
    let h = TestHarness::new();
    let b = &h.b;
    let mut class = b.class("Table");
    class.members.push(MemberDecl::Indexer(b.indexer(
        b.int_type(),
        vec![b.param(b.prim(PrimitiveKind::Long), "key")],
        Some(b.accessor(Some(b.block(vec![b.ret(Some(b.int(0)))])))),
        Some(b.accessor(Some(b.block(vec![])))),
    )));
    class.members.push(MemberDecl::Method(b.method(
        "bump",
        b.int_type(),
        vec![],
        Some(b.block(vec![b.ret(Some(b.postfix(
            PostfixOp::PostInc,
            b.index(b.this(), vec![b.long(1)]),
        )))])),
    )));
    let generated = h.generate(vec![b.unit("Table.ks", Some("app"), vec![class])]);
    assert_eq!(
        generated.listing("app.Table", "bump"),
        strings(&[
            "aload 0",
            "lconst_1",
            "lstore 2",
            "astore 1",
            "aload 1",
            "lload 2",
            "invokevirtual app/Table.getItem(J)I",
            "dup",
            "iconst_1",
            "iadd",
            "istore 4",
            "aload 1",
            "lload 2",
            "iload 4",
            "invokevirtual app/Table.setItem(JI)V",
            "ireturn",
        ])
    );
    let code = generated.method("app.Table", "bump").code.as_ref().unwrap();
    assert_eq!(code.max_locals, 5);
}

#[test]
fn delegate_compound_combines_and_casts() {
    let h = TestHarness::new();
    let b = &h.b;
    let handler = b.delegate("Handler", b.void_type(), vec![]);
    let mut bus = b.class("Bus");
    bus.members.push(MemberDecl::Field(b.field(b.named("Handler"), "listeners", None)));
    bus.members.push(MemberDecl::Method(b.method(
        "subscribe",
        b.void_type(),
        vec![b.param(b.named("Handler"), "h")],
        Some(b.block(vec![b.expr_stmt(b.compound(
            AssignOp::AddAssign,
            b.ident("listeners"),
            b.ident("h"),
        ))])),
    )));
    let generated = h.generate(vec![b.unit("Bus.ks", Some("app"), vec![handler, bus])]);
    let text = generated.listing("app.Bus", "subscribe");
    assert_eq!(text[0..4], strings(&["aload 0", "dup", "getfield app/Bus.listeners:Lapp/Handler;", "aload 1"]));
    assert!(text[4].starts_with("invokestatic kestrel/lang/Delegate.combine"));
    assert_eq!(text[5..], strings(&["checkcast app/Handler", "putfield app/Bus.listeners:Lapp/Handler;", "return"]));
}

#[test]
fn string_compound_appends_a_chain_into_one_builder() {
    let h = TestHarness::new();
    let b = &h.b;
    let mut class = b.class("Log");
    let mut method = b.method(
        "line",
        b.named("String"),
        vec![b.param(b.named("String"), "s"), b.param(b.int_type(), "n")],
        Some(b.block(vec![
            b.expr_stmt(b.compound(
                AssignOp::AddAssign,
                b.ident("s"),
                b.binary(BinaryOp::Add, b.string(" #"), b.ident("n")),
            )),
            b.ret(Some(b.ident("s"))),
        ])),
    );
    method.modifiers |= Modifiers::STATIC;
    class.members.push(MemberDecl::Method(method));
    let generated = h.generate(vec![b.unit("Log.ks", Some("app"), vec![class])]);
    let text = generated.listing("app.Log", "line");
    assert_eq!(text.iter().filter(|i| i.starts_with("new kestrel/lang/StringBuilder")).count(), 1);
    assert_eq!(text.iter().filter(|i| i.contains("StringBuilder.append")).count(), 2);
    assert_eq!(text.iter().filter(|i| i.contains("StringBuilder.toString")).count(), 1);
    assert_eq!(text[text.len() - 3..], strings(&["astore 0", "aload 0", "areturn"]));
}

#[test]
fn constructors_call_the_base_then_run_initializers() {
    let h = TestHarness::new();
    let b = &h.b;
    let mut base = b.class("Base");
    base.members.push(MemberDecl::Constructor(b.constructor(
        vec![b.param(b.int_type(), "v")],
        None,
        b.block(vec![]),
    )));
    let mut derived = b.class("Derived");
    derived.bases.push(b.named("Base"));
    derived.members.push(MemberDecl::Field(b.field(b.int_type(), "f", Some(b.int(3)))));
    derived.members.push(MemberDecl::Constructor(b.constructor(
        vec![],
        Some(b.ctor_init(ConstructorInitializerKind::Super, vec![b.int(7)])),
        b.block(vec![]),
    )));
    let generated = h.generate(vec![b.unit("Shapes.ks", Some("app"), vec![base, derived])]);
    assert_eq!(
        generated.listing("app.Derived", "<init>"),
        strings(&[
            "aload 0",
            "bipush 7",
            "invokespecial app/Base.<init>(I)V",
            "aload 0",
            "iconst_3",
            "putfield app/Derived.f:I",
            "return",
        ])
    );
}

#[test]
fn compiled_types_produce_class_binaries() {
    let h = TestHarness::new();
    let b = &h.b;
    let mut class = b.class("Main");
    class.members.push(MemberDecl::Method(b.method(
        "answer",
        b.int_type(),
        vec![],
        Some(b.block(vec![b.ret(Some(b.int(42)))])),
    )));
    let result = h.compile_binary(vec![b.unit("Main.ks", Some("app"), vec![class])]);
    result.assert_success();
    let bytes = &result.results.binaries["app.Main"];
    let contains = |needle: &[u8]| bytes.windows(needle.len()).any(|w| w == needle);
    assert!(contains(b"Code"));
    assert!(contains(b"answer"));
    // bipush 42, ireturn
    assert!(contains(&[16, 42, 172]));
}
