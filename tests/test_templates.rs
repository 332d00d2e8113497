use miniblade::{context, Engine, ErrorKind};
use similar_asserts::assert_eq;

fn render_str(source: &str, ctx: miniblade::Value) -> String {
    Engine::new().render_str(source, ctx).unwrap()
}

#[test]
fn test_interpolation_escapes() {
    let rv = render_str("Hello {{ name }}!", context! { name => "<World>" });
    assert_eq!(rv, "Hello &lt;World&gt;!");
}

#[test]
fn test_raw_interpolation() {
    let rv = render_str("{!! markup !!}", context! { markup => "<b>hi</b>" });
    assert_eq!(rv, "<b>hi</b>");
}

#[test]
fn test_undefined_renders_empty() {
    let rv = render_str("[{{ missing }}]", context! {});
    assert_eq!(rv, "[]");
}

#[test]
fn test_strict_mode_fails_on_undefined() {
    let mut engine = Engine::new();
    engine.set_strict(true);
    let err = engine.render_str("{{ missing }}", context! {}).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UndefinedVariable);
}

#[test]
fn test_eval_error_renders_empty_outside_strict() {
    let rv = render_str("[{{ 1 < 'x' }}]", context! {});
    assert_eq!(rv, "[]");
}

#[test]
fn test_sandbox_violation_always_fails() {
    let err = Engine::new()
        .render_str("{{ x.__class__ }}", context! { x => 1 })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SandboxViolation);
    let err = Engine::new()
        .render_str("{{ system('ls') }}", context! {})
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SandboxViolation);
}

#[test]
fn test_comments_are_dropped() {
    let rv = render_str("a{{-- secret @if(x) --}}b", context! {});
    assert_eq!(rv, "ab");
}

#[test]
fn test_if_elseif_else() {
    let tmpl = "@if(n > 10)big@elseif(n > 5)medium@else small@endif";
    assert_eq!(render_str(tmpl, context! { n => 20 }), "big");
    assert_eq!(render_str(tmpl, context! { n => 7 }), "medium");
    assert_eq!(render_str(tmpl, context! { n => 1 }), " small");
}

#[test]
fn test_unless() {
    let tmpl = "@unless(logged_in)please log in@endunless";
    assert_eq!(render_str(tmpl, context! { logged_in => false }), "please log in");
    assert_eq!(render_str(tmpl, context! { logged_in => true }), "");
}

#[test]
fn test_isset_and_empty() {
    let tmpl = "@isset(user)yes@endisset@empty(items)none@endempty";
    assert_eq!(
        render_str(tmpl, context! { user => "joe", items => vec![1] }),
        "yes"
    );
    assert_eq!(
        render_str(tmpl, context! { items => Vec::<i32>::new() }),
        "none"
    );
    // none counts as not set
    assert_eq!(render_str("@isset(x)y@endisset", context! { x => () }), "");
}

#[test]
fn test_switch() {
    let tmpl = "@switch(status)@case('active')on@break@case('paused')hold@default off@endswitch";
    assert_eq!(render_str(tmpl, context! { status => "active" }), "on");
    assert_eq!(render_str(tmpl, context! { status => "paused" }), "hold");
    assert_eq!(render_str(tmpl, context! { status => "gone" }), " off");
}

#[test]
fn test_switch_case_eval_error_skips_case() {
    let tmpl = "@switch(x)@case(1 < 'y')bad@case(2)two@endswitch";
    assert_eq!(render_str(tmpl, context! { x => 2 }), "two");
}

#[test]
fn test_foreach() {
    let rv = render_str(
        "@foreach(item in items)[{{ item }}]@endforeach",
        context! { items => vec![1, 2, 3] },
    );
    assert_eq!(rv, "[1][2][3]");
}

#[test]
fn test_foreach_pairs_over_map() {
    let rv = render_str(
        "@foreach(key, value in settings){{ key }}={{ value }};@endforeach",
        context! { settings => std::collections::BTreeMap::from([("a", 1), ("b", 2)]) },
    );
    assert_eq!(rv, "a=1;b=2;");
}

#[test]
fn test_loop_scope_does_not_leak() {
    let rv = render_str(
        "@foreach(item in items){{ item }}@endforeach[{{ item }}]",
        context! { items => vec![1] },
    );
    assert_eq!(rv, "1[]");
}

#[test]
fn test_break_and_continue() {
    let rv = render_str(
        "@foreach(n in items)@if(n == 2)@continue@endif@if(n == 4)@break@endif{{ n }}@endforeach",
        context! { items => vec![1, 2, 3, 4, 5] },
    );
    assert_eq!(rv, "13");
}

#[test]
fn test_break_outside_loop_is_inert() {
    assert_eq!(render_str("a@break b", context! {}), "a b");
}

#[test]
fn test_loop_limit_boundary() {
    let mut engine = Engine::new();
    engine.set_max_loop_iterations(3);
    // exactly at the limit passes
    let rv = engine
        .render_str(
            "@foreach(n in items){{ n }}@endforeach",
            context! { items => vec![1, 2, 3] },
        )
        .unwrap();
    assert_eq!(rv, "123");
    // one more iteration fails
    let err = engine
        .render_str(
            "@foreach(n in items){{ n }}@endforeach",
            context! { items => vec![1, 2, 3, 4] },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LoopLimitExceeded);
}

#[test]
fn test_while_respects_limit() {
    let mut engine = Engine::new();
    engine.set_max_loop_iterations(5);
    let err = engine
        .render_str("@while(true)x@endwhile", context! {})
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LoopLimitExceeded);
}

#[test]
fn test_for_range() {
    let rv = render_str("@for(i in range(3)){{ i }}@endfor", context! {});
    assert_eq!(rv, "012");
}

#[test]
fn test_unknown_directive_stays_literal() {
    let rv = render_str("email me @here(soon)", context! {});
    assert_eq!(rv, "email me @here(soon)");
}

#[test]
fn test_include() {
    let mut engine = Engine::new();
    engine.add_template("partial", "[{{ name }}]");
    engine.add_template("page", "before @include('partial') after");
    let rv = engine.render("page", context! { name => "x" }).unwrap();
    assert_eq!(rv, "before [x] after");
}

#[test]
fn test_include_with_data() {
    let mut engine = Engine::new();
    engine.add_template("partial", "[{{ name }}:{{ extra }}]");
    engine.add_template("page", "@include('partial', {'name': 'y', 'extra': 1})");
    let rv = engine.render("page", context! { name => "x" }).unwrap();
    assert_eq!(rv, "[y:1]");
}

#[test]
fn test_include_data_must_be_a_map() {
    let mut engine = Engine::new();
    engine.add_template("partial", "x");
    engine.add_template("page", "@include('partial', 42)");
    let err = engine.render("page", context! {}).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArguments);
}

#[test]
fn test_include_if() {
    let mut engine = Engine::new();
    engine.add_template("partial", "shown");
    engine.add_template("page", "@includeIf('partial', flag)");
    assert_eq!(engine.render("page", context! { flag => true }).unwrap(), "shown");
    assert_eq!(engine.render("page", context! { flag => false }).unwrap(), "");
}

#[test]
fn test_include_scope_is_isolated() {
    let mut engine = Engine::new();
    engine.add_template("partial", "@foreach(x in [9]){{ x }}@endforeach");
    engine.add_template("page", "@include('partial'){{ x }}");
    let rv = engine.render("page", context! { x => 1 }).unwrap();
    assert_eq!(rv, "91");
}

#[test]
fn test_missing_include_fails() {
    let err = Engine::new()
        .render_str("@include('nope')", context! {})
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TemplateNotFound);
}

#[test]
fn test_recursion_depth_limit() {
    let mut engine = Engine::new();
    engine.add_template("a", "@include('b')");
    engine.add_template("b", "@include('a')");
    let err = engine.render("a", context! {}).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RecursionLimitExceeded);
}

#[test]
fn test_extends_with_sections() {
    let mut engine = Engine::new();
    engine.add_template(
        "layout",
        "<title>@yield('title', 'Untitled')</title><main>@yield('content')</main>",
    );
    engine.add_template(
        "page",
        "@extends('layout')@section('title', 'Home')@section('content')welcome {{ user }}@endsection",
    );
    let rv = engine.render("page", context! { user => "joe" }).unwrap();
    assert_eq!(rv, "<title>Home</title><main>welcome joe</main>");
}

#[test]
fn test_yield_default_is_used_without_section() {
    let mut engine = Engine::new();
    engine.add_template("layout", "@yield('title', 'fallback {{ x }}')");
    engine.add_template("page", "@extends('layout')");
    let rv = engine.render("page", context! { x => 1 }).unwrap();
    assert_eq!(rv, "fallback 1");
}

#[test]
fn test_loose_content_becomes_content_section() {
    let mut engine = Engine::new();
    engine.add_template("layout", "<body>@yield('content')</body>");
    engine.add_template("page", "@extends('layout')hello");
    let rv = engine.render("page", context! {}).unwrap();
    assert_eq!(rv, "<body>hello</body>");
}

#[test]
fn test_multi_level_inheritance() {
    let mut engine = Engine::new();
    engine.add_template("base", "[@yield('header')|@yield('content')]");
    engine.add_template(
        "mid",
        "@extends('base')@section('header')H@endsection",
    );
    engine.add_template(
        "page",
        "@extends('mid')@section('content')C@endsection",
    );
    let rv = engine.render("page", context! {}).unwrap();
    assert_eq!(rv, "[H|C]");
}

#[test]
fn test_child_section_wins_over_parent() {
    let mut engine = Engine::new();
    engine.add_template("base", "@yield('title')");
    engine.add_template(
        "mid",
        "@extends('base')@section('title')mid@endsection",
    );
    engine.add_template(
        "page",
        "@extends('mid')@section('title')page@endsection",
    );
    let rv = engine.render("page", context! {}).unwrap();
    assert_eq!(rv, "page");
}

#[test]
fn test_extends_cycle_fails() {
    let mut engine = Engine::new();
    engine.add_template("a", "@extends('b')");
    engine.add_template("b", "@extends('a')");
    let err = engine.render("a", context! {}).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TemplateRecursion);
}

#[test]
fn test_push_from_include_reaches_stack() {
    let mut engine = Engine::new();
    engine.add_template("partial", "@push('scripts')<script>p</script>@endpush");
    engine.add_template(
        "page",
        "@include('partial')<footer>@stack('scripts')</footer>",
    );
    let rv = engine.render("page", context! {}).unwrap();
    assert_eq!(rv, "<footer><script>p</script></footer>");
}

#[test]
fn test_push_from_child_reaches_layout_stack() {
    let mut engine = Engine::new();
    engine.add_template("layout", "@yield('content')|@stack('scripts')");
    engine.add_template(
        "page",
        "@extends('layout')@section('content')body@endsection@push('scripts')<script>a</script>@endpush@push('scripts')<script>b</script>@endpush",
    );
    let rv = engine.render("page", context! {}).unwrap();
    assert_eq!(rv, "body|<script>a</script>\n<script>b</script>");
}

#[test]
fn test_push_survives_layout_without_content_yield() {
    let mut engine = Engine::new();
    engine.add_template("layout", "<head>@stack('scripts')</head>@yield('title')");
    engine.add_template(
        "page",
        "@extends('layout')@section('title', 'Home')@push('scripts')<script>A</script>@endpush",
    );
    let rv = engine.render("page", context! {}).unwrap();
    assert_eq!(rv, "<head><script>A</script></head>Home");
}

#[test]
fn test_prepend_goes_first() {
    let rv = render_str(
        "@push('s')b@endpush@prepend('s')a@endprepend@stack('s')",
        context! {},
    );
    assert_eq!(rv, "a\nb");
}

#[test]
fn test_empty_stack_renders_nothing() {
    assert_eq!(render_str("[@stack('s')]", context! {}), "[]");
}

#[test]
fn test_stack_entries_are_trimmed() {
    let rv = render_str("@push('s')\n  x\n@endpush@stack('s')", context! {});
    assert_eq!(rv, "x");
}

#[test]
fn test_malformed_template_errors() {
    let err = Engine::new()
        .render_str("@if(x)unclosed", context! {})
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedTemplate);
    let err = Engine::new()
        .render_str("{{-- unclosed", context! {})
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedTemplate);
}

#[test]
fn test_error_carries_location() {
    let err = Engine::new()
        .render_str("line one\n@if(x)\noops", context! {})
        .unwrap_err();
    assert_eq!(err.line(), Some(2));
}

#[test]
fn test_safe_values_skip_escaping() {
    let mut engine = Engine::new();
    engine.add_function("trusted", |_args| {
        Ok(miniblade::Value::from_safe_string("<b>ok</b>".to_string()))
    });
    let rv = engine.render_str("{{ trusted() }}", context! {}).unwrap();
    assert_eq!(rv, "<b>ok</b>");
}
