//! Helpers every template can use without registering them. Any helper
//! registered under the same name, at any level, takes precedence.

use std::sync::LazyLock;

use tracing::{debug, error, info, trace, warn};

use crate::{
    access::access,
    helper::{CallingInfo, Helper, HelperResult},
    registry::HelperRegistry,
    value::Value,
};

static BUILTINS: LazyLock<HelperRegistry> = LazyLock::new(|| {
    let registry = HelperRegistry::new();
    registry.register_fn("if", if_helper);
    registry.register_fn("unless", unless_helper);
    registry.register_fn("each", each_helper);
    registry.register_fn("with", with_helper);
    registry.register_fn("lookup", lookup_helper);
    registry.register_fn("log", log_helper);
    registry.register_fn("localize", localize_helper);
    registry
});

pub fn builtin_helper(name: &str) -> Option<Helper> {
    BUILTINS.get(name)
}

pub fn builtin_helper_names() -> Vec<String> {
    BUILTINS.names()
}

/// Renders the main section when `condition` holds, else the inverse, both
/// against the caller's context.
fn branch(call: &CallingInfo<'_>, condition: bool) -> HelperResult {
    let section = if condition {
        call.statements()
    } else {
        call.inverse()
    };
    section.render(call.context().clone(), call.data().clone())
}

fn if_helper(call: &CallingInfo<'_>) -> HelperResult {
    branch(call, call.param(0).is_some_and(Value::is_truthy))
}

fn unless_helper(call: &CallingInfo<'_>) -> HelperResult {
    branch(call, !call.param(0).is_some_and(Value::is_truthy))
}

fn each_helper(call: &CallingInfo<'_>) -> HelperResult {
    let target = call.param(0).cloned().unwrap_or_default();
    let mut output = String::new();

    if let Some(items) = target.elements().filter(|items| !items.is_empty()) {
        let last = items.len() - 1;
        for (index, item) in items.into_iter().enumerate() {
            let data = call.data().extend([
                ("index", Value::from(index)),
                ("first", Value::from(index == 0)),
                ("last", Value::from(index == last)),
            ]);
            output.push_str(&call.statements().render(item, data)?);
        }
        return Ok(output);
    }

    if let Some(entries) = target.entries().filter(|entries| !entries.is_empty()) {
        let last = entries.len() - 1;
        for (index, (key, item)) in entries.into_iter().enumerate() {
            let data = call.data().extend([
                ("key", Value::from(key)),
                ("index", Value::from(index)),
                ("first", Value::from(index == 0)),
                ("last", Value::from(index == last)),
            ]);
            output.push_str(&call.statements().render(item, data)?);
        }
        return Ok(output);
    }

    call.inverse()
        .render(call.context().clone(), call.data().clone())
}

fn with_helper(call: &CallingInfo<'_>) -> HelperResult {
    match call.param(0) {
        Some(value) if !value.is_null() => call
            .statements()
            .render(value.clone(), call.data().clone()),
        _ => call
            .inverse()
            .render(call.context().clone(), call.data().clone()),
    }
}

fn lookup_helper(call: &CallingInfo<'_>) -> HelperResult {
    let (Some(target), Some(key)) = (call.param(0), call.param(1)) else {
        return Err(call.error("expects a value and a key"));
    };
    Ok(access(target, &key.to_display_string())?
        .map(|value| value.to_display_string())
        .unwrap_or_default())
}

fn log_helper(call: &CallingInfo<'_>) -> HelperResult {
    let message = call
        .params()
        .iter()
        .map(Value::to_display_string)
        .collect::<Vec<_>>()
        .join(" ");
    let level = call.hash_value("level").map(Value::to_display_string);
    match level.as_deref() {
        Some("trace") => trace!("{message}"),
        Some("debug" | "0") => debug!("{message}"),
        Some("warn" | "2") => warn!("{message}"),
        Some("error" | "3") => error!("{message}"),
        _ => info!("{message}"),
    }
    Ok(String::new())
}

fn localize_helper(call: &CallingInfo<'_>) -> HelperResult {
    let text = call
        .param(0)
        .map(Value::to_display_string)
        .unwrap_or_default();
    Ok(call.localize(&text))
}
