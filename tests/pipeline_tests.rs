mod test_harness;

use kestrel::{CancellationToken, CompilationStage, CompilerParameters};
use kestrel_compiler::class_writer::MAGIC;
use kestrel_core::ast::{BinaryOp, MemberDecl};
use kestrel_core::{CompilationError, CompilationWarning, Modifiers};
use std::sync::Arc;
use test_harness::TestHarness;

#[test]
fn duplicate_type_stops_at_types_definition() {
    let h = TestHarness::new();
    let b = &h.b;
    let result = h.compile(vec![
        b.unit("A.ks", Some("app"), vec![b.class("Twice")]),
        b.unit("B.ks", Some("app"), vec![b.class("Twice")]),
    ]);
    result.assert_stopped_at(CompilationStage::TypesDefinition);
    assert_eq!(
        result.error_count(&CompilationError::DuplicateType { name: String::new() }),
        1
    );
}

#[test]
fn inheritance_cycle_stops_at_super_types() {
    let h = TestHarness::new();
    let b = &h.b;
    let mut first = b.class("First");
    first.bases.push(b.named("Second"));
    let mut second = b.class("Second");
    second.bases.push(b.named("First"));
    let result = h.compile(vec![b.unit("Cycle.ks", Some("app"), vec![first, second])]);
    result.assert_stopped_at(CompilationStage::SuperTypesDefinition);
    assert!(result.error_count(&CompilationError::CyclicInheritance { name: String::new() }) >= 1);
}

#[test]
fn reading_an_unassigned_local_is_one_error() {
    let h = TestHarness::new();
    let b = &h.b;
    let mut class = b.class("Locals");
    class.members.push(MemberDecl::Method(b.method(
        "read",
        b.int_type(),
        vec![],
        Some(b.block(vec![b.local(b.int_type(), "i", None), b.ret(Some(b.ident("i")))])),
    )));
    let result = h.compile(vec![b.unit("Locals.ks", Some("app"), vec![class])]);
    result.assert_stopped_at(CompilationStage::CodeValidation);
    assert_eq!(result.errors().len(), 1);
    assert_eq!(
        result.error_count(&CompilationError::UnassignedLocal { name: String::new() }),
        1
    );
}

#[test]
fn an_unused_local_is_one_warning() {
    let h = TestHarness::new();
    let b = &h.b;
    let mut class = b.class("Locals");
    class.members.push(MemberDecl::Method(b.method(
        "idle",
        b.void_type(),
        vec![],
        Some(b.block(vec![b.local(b.int_type(), "i", None)])),
    )));
    let result = h.compile(vec![b.unit("Locals.ks", Some("app"), vec![class])]);
    result.assert_success();
    assert!(result.errors().is_empty());
    assert_eq!(result.warnings().len(), 1);
    assert_eq!(
        result.warning_count(&CompilationWarning::LocalNeverUsed { name: String::new() }),
        1
    );
}

#[test]
fn warnings_do_not_gate_binary_output() {
    let h = TestHarness::new();
    let b = &h.b;
    let mut class = b.class("Noisy");
    class.members.push(MemberDecl::Method(b.method(
        "m",
        b.void_type(),
        vec![],
        Some(b.block(vec![b.local(b.int_type(), "k", Some(b.int(1)))])),
    )));
    let result = h.compile_binary(vec![b.unit("Noisy.ks", Some("app"), vec![class])]);
    result.assert_success();
    assert!(!result.warnings().is_empty());
    assert!(result.results.binaries.contains_key("app.Noisy"));
}

#[test]
fn missing_return_is_reported() {
    let h = TestHarness::new();
    let b = &h.b;
    let mut class = b.class("Paths");
    let n = b.param(b.int_type(), "n");
    class.members.push(MemberDecl::Method(b.method(
        "sign",
        b.int_type(),
        vec![n],
        Some(b.block(vec![b.if_stmt(
            b.binary(BinaryOp::Greater, b.ident("n"), b.int(0)),
            b.ret(Some(b.int(1))),
            None,
        )])),
    )));
    let result = h.compile(vec![b.unit("Paths.ks", Some("app"), vec![class])]);
    result.assert_stopped_at(CompilationStage::CodeValidation);
    assert_eq!(
        result.error_count(&CompilationError::MissingReturn { method: String::new() }),
        1
    );
}

#[test]
fn enum_constants_become_static_fields_and_helpers() {
    let h = TestHarness::new();
    let b = &h.b;
    let generated = h.generate(vec![b.unit("Color.ks", Some("app"), vec![b.enum_type("Color", &["A", "B"])])]);
    let types = &generated.session.types;
    let def = types.find_type("app.Color").expect("enum defined");
    let statics: Vec<_> = types
        .def(def)
        .fields
        .iter()
        .map(|&f| types.field(f))
        .filter(|f| f.modifiers.contains(Modifiers::STATIC | Modifiers::ENUM))
        .collect();
    assert_eq!(statics.len(), 2);

    let names: Vec<&str> = generated.ty("app.Color").methods.iter().map(|m| m.name.as_str()).collect();
    for expected in ["<clinit>", "<init>", "values", "valueOf"] {
        assert!(names.contains(&expected), "{} missing from {:?}", expected, names);
    }
    let clinit = generated.listing("app.Color", "<clinit>");
    let constructions = clinit
        .iter()
        .filter(|i| i.starts_with("invokespecial app/Color.<init>"))
        .count();
    assert_eq!(constructions, 2);
}

#[test]
fn parse_failure_skips_the_input_and_stops() {
    struct Broken;

    impl kestrel::DeclarationSource for Broken {
        fn file_name(&self) -> &str {
            "Broken.ks"
        }

        fn parse(&self) -> Result<kestrel_core::ast::CompilationUnit, kestrel_core::IngestError> {
            Err(kestrel_core::IngestError::Recoverable {
                file: "Broken.ks".to_string(),
                line: 1,
                col: 1,
                message: "unexpected token".to_string(),
            })
        }
    }

    let h = TestHarness::new();
    let b = &h.b;
    let sources: Vec<Box<dyn kestrel::DeclarationSource>> = vec![
        Box::new(Broken),
        kestrel::ParsedSource::boxed(b.unit("Ok.ks", Some("app"), vec![b.class("Fine")])),
    ];
    let results = kestrel::Compiler::new().compile(&sources, &CompilerParameters::new());
    assert_eq!(results.stage, CompilationStage::Parsing);
    assert_eq!(results.errors().count(), 1);
}

#[test]
fn fatal_ingestion_aborts() {
    struct Unreadable;

    impl kestrel::DeclarationSource for Unreadable {
        fn file_name(&self) -> &str {
            "Gone.ks"
        }

        fn parse(&self) -> Result<kestrel_core::ast::CompilationUnit, kestrel_core::IngestError> {
            Err(kestrel_core::IngestError::Fatal {
                file: "Gone.ks".to_string(),
                message: "permission denied".to_string(),
            })
        }
    }

    let sources: Vec<Box<dyn kestrel::DeclarationSource>> = vec![Box::new(Unreadable)];
    let results = kestrel::Compiler::new().compile(&sources, &CompilerParameters::new());
    assert_eq!(results.stage, CompilationStage::Parsing);
    assert!(results.has_errors());
    assert_eq!(results.errors().next().map(|d| d.file.as_str()), Some("Gone.ks"));
}

#[test]
fn cancelled_runs_are_flagged() {
    let h = TestHarness::new();
    let b = &h.b;
    let token = CancellationToken::new();
    token.cancel();
    let params = CompilerParameters::new().progress(Arc::new(token)).generate_binary(true);
    let result = h.compile_with(vec![b.unit("A.ks", Some("app"), vec![b.class("A")])], &params);
    assert!(result.results.cancelled);
    assert_eq!(result.results.stage, CompilationStage::Parsing);
    assert!(result.results.binaries.is_empty());
}

#[test]
fn binaries_are_keyed_by_qualified_name() {
    let h = TestHarness::new();
    let b = &h.b;
    let mut outer = b.class("Outer");
    outer.members.push(MemberDecl::Type(b.class("Inner")));
    let result = h.compile_binary(vec![b.unit("Outer.ks", Some("app.geo"), vec![outer])]);
    result.assert_success();
    let binaries = &result.results.binaries;
    assert_eq!(binaries.len(), 2);
    for name in ["app.geo.Outer", "app.geo.Outer.Inner"] {
        let bytes = binaries.get(name).unwrap_or_else(|| panic!("no binary for {}", name));
        assert_eq!(&bytes[..4], MAGIC);
    }
}
