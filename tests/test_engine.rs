use miniblade::{context, Engine, ErrorKind, Value};
use similar_asserts::assert_eq;

#[test]
fn test_render_named_template() {
    let mut engine = Engine::new();
    engine.add_template("hello", "Hello {{ name }}!");
    let rv = engine.render("hello", context! { name => "World" }).unwrap();
    assert_eq!(rv, "Hello World!");
}

#[test]
fn test_unknown_template_fails() {
    let err = Engine::new().render("nope", context! {}).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TemplateNotFound);
}

#[test]
fn test_remove_template() {
    let mut engine = Engine::new();
    engine.add_template("t", "x");
    engine.remove_template("t");
    assert_eq!(
        engine.render("t", context! {}).unwrap_err().kind(),
        ErrorKind::TemplateNotFound
    );
}

#[test]
fn test_globals_and_shadowing() {
    let mut engine = Engine::new();
    engine.add_global("site", "miniblade");
    assert_eq!(
        engine.render_str("{{ site }}", context! {}).unwrap(),
        "miniblade"
    );
    assert_eq!(
        engine
            .render_str("{{ site }}", context! { site => "other" })
            .unwrap(),
        "other"
    );
}

#[test]
fn test_added_function_is_callable() {
    let mut engine = Engine::new();
    engine.add_function("shout", |args| {
        Ok(Value::from(format!("{}!!", args[0])))
    });
    let rv = engine
        .render_str("{{ shout(word) }}", context! { word => "go" })
        .unwrap();
    assert_eq!(rv, "go!!");
}

#[test]
fn test_builtin_functions_available() {
    let rv = Engine::new()
        .render_str(
            "{{ upper(name) }} has {{ len(items) }}",
            context! { name => "ada", items => vec![1, 2] },
        )
        .unwrap();
    assert_eq!(rv, "ADA has 2");
}

#[test]
fn test_custom_directive() {
    let mut engine = Engine::new();
    engine
        .register_directive("badge", |args| {
            Ok(format!("<span class=\"badge\">{}</span>", args[0]))
        })
        .unwrap();
    let rv = engine
        .render_str("@badge(label)", context! { label => "new" })
        .unwrap();
    assert_eq!(rv, "<span class=\"badge\">new</span>");
}

#[test]
fn test_custom_directive_output_is_raw() {
    let mut engine = Engine::new();
    engine
        .register_directive("hr", |_args| Ok("<hr>".to_string()))
        .unwrap();
    assert_eq!(engine.render_str("@hr()", context! {}).unwrap(), "<hr>");
}

#[test]
fn test_custom_directive_arg_falls_back_to_literal() {
    let mut engine = Engine::new();
    engine
        .register_directive("echo", |args| Ok(args[0].to_string()))
        .unwrap();
    let rv = engine.render_str("@echo(not valid ++)", context! {}).unwrap();
    assert_eq!(rv, "not valid ++");
}

#[test]
fn test_invalid_directive_names_rejected() {
    let mut engine = Engine::new();
    for name in ["", "_private", "has space", "semi;colon"] {
        let err = engine
            .register_directive(name, |_| Ok(String::new()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArguments);
    }
}

#[test]
fn test_directive_registration_applies_to_later_renders() {
    let mut engine = Engine::new();
    // not registered yet, stays literal
    assert_eq!(
        engine.render_str("@mark(1)", context! {}).unwrap(),
        "@mark(1)"
    );
    engine
        .register_directive("mark", |args| Ok(format!("[{}]", args[0])))
        .unwrap();
    assert_eq!(engine.render_str("@mark(1)", context! {}).unwrap(), "[1]");
}

#[test]
fn test_template_size_limit() {
    let mut engine = Engine::new();
    engine.set_max_template_size(8);
    let err = engine
        .render_str("this is longer than eight bytes", context! {})
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TemplateTooLarge);
}

#[test]
fn test_context_must_be_a_map() {
    let err = Engine::new().render_str("x", 42).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadSerialization);
}

#[test]
fn test_struct_context() {
    #[derive(serde::Serialize)]
    struct Ctx {
        user: String,
        count: usize,
    }
    let rv = Engine::new()
        .render_str(
            "{{ user }}: {{ count }}",
            Ctx {
                user: "mia".into(),
                count: 3,
            },
        )
        .unwrap();
    assert_eq!(rv, "mia: 3");
}

#[test]
fn test_fs_loader() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("emails")).unwrap();
    std::fs::write(dir.path().join("emails/welcome.html"), "hi {{ user }}").unwrap();

    let mut engine = Engine::new();
    engine.set_loader(miniblade::FsLoader::new(dir.path()));
    let rv = engine
        .render("emails.welcome", context! { user => "sam" })
        .unwrap();
    assert_eq!(rv, "hi sam");
}

#[test]
fn test_fs_loader_rejects_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = Engine::new();
    engine.set_loader(miniblade::FsLoader::new(dir.path()));
    let err = engine.render("../etc/passwd", context! {}).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SandboxViolation);
}

#[test]
fn test_closure_loader() {
    let mut engine = Engine::new();
    engine.set_loader(|name: &str| {
        if name == "dynamic" {
            Ok(Some("from closure".to_string()))
        } else {
            Ok(None)
        }
    });
    assert_eq!(
        engine.render("dynamic", context! {}).unwrap(),
        "from closure"
    );
    assert_eq!(
        engine.render("other", context! {}).unwrap_err().kind(),
        ErrorKind::TemplateNotFound
    );
}
