mod fixtures;

use std::{sync::Arc, thread};

use fixtures::{
    Faulty, Person, Team, generate_random_whitespace, generate_random_whitespace_at_least_one,
    unique_name,
};
use minibars::{
    ExecutionContext, ExecutionContextDelegate, Helper, MinibarsError, ParseErrorKind,
    RenderOptions, Template, Value, render, render_with_helpers,
};
use pretty_assertions::assert_eq;

#[test]
#[ntest::timeout(100)]
fn test_basic_substitution() {
    let template = format!(
        "Hello, {{{{{}name{}}}}}!",
        generate_random_whitespace(),
        generate_random_whitespace()
    );
    let context = Value::object([("name", "Jessica")]);
    assert_eq!(
        render(&template, &context).unwrap(),
        "Hello, Jessica!",
        "Rendered string should match the template."
    );
}

#[test]
#[ntest::timeout(100)]
fn test_basic_iteration() {
    let template = format!(
        "{{{{#{}each{}cats{}}}}}Greetings {{{{{}this{}}}}}\n{{{{/{}each{}}}}}",
        generate_random_whitespace(),
        generate_random_whitespace_at_least_one(),
        generate_random_whitespace(),
        generate_random_whitespace(),
        generate_random_whitespace(),
        generate_random_whitespace(),
        generate_random_whitespace(),
    );

    let context = Value::object([("cats", Value::array(["Fluffy", "Whiskers", "Mittens"]))]);
    assert_eq!(
        render(&template, &context).unwrap(),
        "Greetings Fluffy\nGreetings Whiskers\nGreetings Mittens\n",
        "template was {template:?}"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_rendering_is_idempotent() {
    let template = Template::new("{{#each xs}}{{this}}{{#unless @last}}, {{/unless}}{{/each}}");
    let context = Value::object([("xs", Value::array([1, 2, 3]))]);
    let first = template.render(&context).unwrap();
    let second = template.render(&context).unwrap();
    assert_eq!(first, "1, 2, 3");
    assert_eq!(first, second);
}

#[test]
#[ntest::timeout(100)]
fn test_path_resolution() {
    let context = Value::object([("a", Value::object([("b", 5)]))]);
    assert_eq!(render("{{a.b}}", &context).unwrap(), "5");
    assert_eq!(render("{{a/b}}", &context).unwrap(), "5");
    assert_eq!(render("{{this.a.[b]}}", &context).unwrap(), "5");
    assert_eq!(render("[{{a.c}}]", &context).unwrap(), "[]");
    assert_eq!(render("[{{a.b.c.d}}]", &context).unwrap(), "[]");
}

#[test]
#[ntest::timeout(100)]
fn test_escaping() {
    let context = Value::object([("x", "<b>\"Tom\" & 'Jerry'</b>")]);
    assert_eq!(
        render("{{x}}", &context).unwrap(),
        "&lt;b&gt;&quot;Tom&quot; &amp; &#x27;Jerry&#x27;&lt;/b&gt;"
    );
    assert_eq!(render("{{{x}}}", &context).unwrap(), "<b>\"Tom\" & 'Jerry'</b>");
    assert_eq!(render("{{& x}}", &context).unwrap(), "<b>\"Tom\" & 'Jerry'</b>");
}

#[test]
#[ntest::timeout(100)]
fn test_truthiness() {
    let template = "{{#if v}}T{{else}}F{{/if}}";
    let cases = [
        (Value::from(0), "F"),
        (Value::from(-1), "F"),
        (Value::from(1), "T"),
        (Value::from(0.5), "T"),
        (Value::from(""), "F"),
        (Value::from("no"), "T"),
        (Value::array(Vec::<i32>::new()), "F"),
        (Value::array(["x"]), "T"),
        (Value::from(false), "F"),
        (Value::from(true), "T"),
        (Value::Null, "F"),
    ];
    for (value, expected) in cases {
        let context = Value::object([("v", value.clone())]);
        assert_eq!(render(template, &context).unwrap(), expected, "value {value:?}");
    }
    assert_eq!(render(template, &Value::object([("w", 1)])).unwrap(), "F");
}

#[test]
#[ntest::timeout(100)]
fn test_block_helper_reentry() {
    let template = Template::new("{{#list people}}<{{name}}>{{/list}}");
    template.register_helper(
        "list",
        Helper::from_fn(|info| {
            let mut output = String::new();
            for person in info.param(0).and_then(Value::elements).unwrap_or_default() {
                output.push_str(&info.statements().render(person, info.data().clone())?);
            }
            Ok(output)
        }),
    );
    let context = Value::object([(
        "people",
        Value::array([
            Value::object([("name", "Ann")]),
            Value::object([("name", "Bob")]),
            Value::object([("name", "Cid")]),
        ]),
    )]);
    assert_eq!(template.render(&context).unwrap(), "<Ann><Bob><Cid>");
}

#[test]
#[ntest::timeout(100)]
fn test_inverse_fallback() {
    let template = Template::new("[{{#when flag}}{{else}}inverse{{/when}}][{{#when flag}}{{/when}}]");
    template.register_helper(
        "when",
        Helper::from_fn(|info| {
            let section = if info.param(0).is_some_and(Value::is_truthy) {
                info.statements()
            } else {
                info.inverse()
            };
            section.render(info.context().clone(), info.data().clone())
        }),
    );
    let context = Value::object([("flag", 0)]);
    assert_eq!(template.render(&context).unwrap(), "[inverse][]");
}

#[test]
#[ntest::timeout(100)]
fn test_missing_block_helper_fails_the_render() {
    let result = render("before {{#frobnicate items}}x{{/frobnicate}} after", &Value::Null);
    assert_eq!(
        result,
        Err(MinibarsError::MissingHelper {
            helper_name: "frobnicate".to_string()
        })
    );
}

#[test]
#[ntest::timeout(100)]
fn test_missing_partial_fails_the_render() {
    assert_eq!(
        render("{{> nowhere}}", &Value::Null),
        Err(MinibarsError::MissingPartial {
            partial_name: "nowhere".to_string()
        })
    );
}

#[test]
#[ntest::timeout(100)]
fn test_local_helper_wins_over_global() {
    let name = unique_name("precedence");
    ExecutionContext::global()
        .register_helper(name.clone(), Helper::from_fn(|_| Ok("global".to_string())));

    let template = Template::new(format!("{{{{{name}}}}}"));
    assert_eq!(template.render(&Value::Null).unwrap(), "global");

    template.register_helper(name.clone(), Helper::from_fn(|_| Ok("local".to_string())));
    assert_eq!(template.render(&Value::Null).unwrap(), "local");

    ExecutionContext::global().unregister_helper(&name);
}

#[test]
#[ntest::timeout(100)]
fn test_partial_hash_is_private_data() {
    let template = Template::new("{{> badge label='Admin'}}");
    template
        .register_partial_string("badge", "[{{@label}}|{{label}}]")
        .unwrap();
    let context = Value::object([("label", "from context")]);
    assert_eq!(template.render(&context).unwrap(), "[Admin|from context]");
}

#[test]
#[ntest::timeout(100)]
fn test_partial_with_context_expression() {
    let template = Template::new("{{#each people}}{{> card}}{{/each}}|{{> card boss}}");
    template
        .register_partial_string("card", "{{name}}@{{@index}};")
        .unwrap();
    let context = Value::object([
        (
            "people",
            Value::array([Value::object([("name", "Ann")]), Value::object([("name", "Bob")])]),
        ),
        ("boss", Value::object([("name", "Zed")])),
    ]);
    assert_eq!(template.render(&context).unwrap(), "Ann@0;Bob@1;|Zed@;");
}

#[test]
#[ntest::timeout(100)]
fn test_host_objects() {
    let context = Value::object([
        ("owner", Value::host(Person::new("Ada", 36))),
        (
            "team",
            Value::host(Team(vec![Person::new("Alan", 41), Person::new("Grace", 85)])),
        ),
    ]);
    assert_eq!(
        render("{{owner.name}} is {{owner.age}}[{{owner.secret}}]", &context).unwrap(),
        "Ada is 36[]"
    );
    assert_eq!(render("{{owner}}", &context).unwrap(), "Ada (36)");
    assert_eq!(
        render("{{#each team}}{{@index}}:{{name}} {{/each}}", &context).unwrap(),
        "0:Alan 1:Grace "
    );
    assert_eq!(render("{{team.1.name}}", &context).unwrap(), "Grace");
    assert_eq!(render("{{#with owner}}{{name}}{{/with}}", &context).unwrap(), "Ada");
}

#[test]
#[ntest::timeout(100)]
fn test_host_faults_abort_rendering() {
    let context = Value::object([("source", Value::host(Faulty))]);
    assert_eq!(render("{{source.ok}}", &context).unwrap(), "fine");

    let err = render("{{source.ok}} {{source.broken}}", &context).unwrap_err();
    assert!(
        matches!(err, MinibarsError::HostAccess(ref fault) if fault.key == "broken"),
        "unexpected error {err:?}"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_parse_error_position() {
    let err = render("line one\n{{#if x}}\n{{/each}}", &Value::Null).unwrap_err();
    let MinibarsError::Parse(parse) = err else {
        panic!("expected a parse error, got {err:?}");
    };
    assert_eq!(parse.line, 3);
    assert_eq!(parse.column, 1);
    assert_eq!(parse.position, 19);
    assert!(parse.context.contains("{{/each}}"), "context was {:?}", parse.context);
    assert_eq!(
        parse.kind,
        ParseErrorKind::MismatchedClose {
            open: "if".to_string(),
            close: "each".to_string()
        }
    );
}

#[test]
#[ntest::timeout(100)]
fn test_parent_scopes_and_private_data() {
    let template =
        "{{#each groups}}{{name}}:{{#each members}}{{../name}}/{{this}}#{{@../index}}.{{@index}} {{/each}}{{/each}}";
    let context = Value::object([(
        "groups",
        Value::array([
            Value::object([("name", Value::from("a")), ("members", Value::array(["x", "y"]))]),
            Value::object([("name", Value::from("b")), ("members", Value::array(["z"]))]),
        ]),
    )]);
    assert_eq!(
        render(template, &context).unwrap(),
        "a:a/x#0.0 a/y#0.1 b:b/z#1.0 "
    );
}

#[test]
#[ntest::timeout(100)]
fn test_whitespace_control() {
    let context = Value::object([("xs", Value::array([1, 2]))]);
    assert_eq!(
        render("<ul>\n  {{~#each xs~}}\n  <li>{{this}}</li>\n  {{~/each~}}\n</ul>", &context).unwrap(),
        "<ul><li>1</li><li>2</li></ul>"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_comments_and_escaped_mustaches() {
    assert_eq!(
        render("a{{! short }}b{{!-- has }} inside --}}c \\{{literal}}", &Value::Null).unwrap(),
        "abc {{literal}}"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_one_shot_helpers() {
    let output = render_with_helpers(
        "{{join items sep=', '}}",
        &Value::object([("items", Value::array(["a", "b", "c"]))]),
        [(
            "join",
            Helper::from_fn(|info| {
                let separator = info.hash_value("sep").map(Value::to_display_string).unwrap_or_default();
                let items = info.param(0).and_then(Value::elements).unwrap_or_default();
                Ok(items
                    .iter()
                    .map(Value::to_display_string)
                    .collect::<Vec<_>>()
                    .join(&separator))
            }),
        )],
    )
    .unwrap();
    assert_eq!(output, "a, b, c");
}

struct Catalog;

impl ExecutionContextDelegate for Catalog {
    fn partial_string_named(&self, name: &str, _context: &ExecutionContext) -> Option<String> {
        name.strip_prefix("catalog/")
            .map(|item| format!("<item>{item}:{{{{this}}}}</item>"))
    }

    fn localized_string(&self, text: &str, _context: &ExecutionContext) -> Option<String> {
        (text == "Items").then(|| "Artikel".to_string())
    }

    fn escape_string(
        &self,
        raw: &str,
        target_format: &str,
        _context: &ExecutionContext,
    ) -> Option<String> {
        (target_format == "text/xml").then(|| raw.replace('&', "&amp;").replace('<', "&lt;"))
    }
}

#[test]
#[ntest::timeout(100)]
fn test_delegate_supplies_partials_translations_and_escaping() {
    let shared = Arc::new(ExecutionContext::new());
    shared.set_delegate(Some(Arc::new(Catalog)));
    let template = shared
        .template("{{localize 'Items'}}: {{> catalog/book title}} {{note}}")
        .with_options(RenderOptions::new().with_target_format("text/xml"));
    let context = Value::object([("title", "Dune"), ("note", "a > b & c < d")]);
    assert_eq!(
        template.render(&context).unwrap(),
        "Artikel: <item>book:Dune</item> a > b &amp; c &lt; d"
    );
}

#[test]
#[ntest::timeout(2000)]
fn test_concurrent_rendering_and_registration() {
    let shared = Arc::new(ExecutionContext::new());
    shared.register_helper("tag", Helper::from_fn(|_| Ok("v0".to_string())));
    let template = Arc::new(shared.template("{{#each xs}}{{tag}}{{/each}}"));
    let context = Value::object([("xs", Value::array([1, 2, 3]))]);

    let renderers: Vec<_> = (0..4)
        .map(|_| {
            let template = Arc::clone(&template);
            let context = context.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let output = template.render(&context).unwrap();
                    assert_eq!(output.matches('v').count(), 3, "unexpected output {output}");
                }
            })
        })
        .collect();

    let writer = {
        let shared = Arc::clone(&shared);
        thread::spawn(move || {
            for _ in 0..50 {
                shared.register_helper("tag", Helper::from_fn(|_| Ok("v1".to_string())));
                shared.register_helper("tag", Helper::from_fn(|_| Ok("v0".to_string())));
            }
        })
    };

    for handle in renderers {
        handle.join().unwrap();
    }
    writer.join().unwrap();
}

#[test]
#[ntest::timeout(1000)]
fn test_deeply_nested_blocks_fail_to_parse() {
    let levels = 5000;
    let template = format!("{}x{}", "{{#if 1}}".repeat(levels), "{{/if}}".repeat(levels));
    let err = render(&template, &Value::Null).unwrap_err();
    assert!(
        matches!(
            err,
            MinibarsError::Parse(ref parse) if matches!(parse.kind, ParseErrorKind::NestingTooDeep { .. })
        ),
        "unexpected error {err:?}"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_escaped_backslash_before_tag() {
    let context = Value::object([("x", "v")]);
    assert_eq!(render("[\\\\{{x}}]", &context).unwrap(), "[\\v]");
    assert_eq!(render("[\\{{x}}]", &context).unwrap(), "[{{x}}]");
}
