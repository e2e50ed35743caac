use crate::{
    error::{MinibarsError, MinibarsResult},
    helper::Helper,
    template::Template,
    value::Value,
};

/// Compiles `source` and renders it once against `context`.
///
/// Helpers and partials resolve through the global execution context and the
/// built-in helpers. To render the same text repeatedly, keep a [`Template`]
/// instead so the source is parsed only once.
///
/// # Errors
/// Fails with any error [`Template::render`] can return.
///
/// # Example
///
/// ```rust
/// use minibars::{render, Value};
///
/// let context = Value::object([("name", "<World>")]);
/// assert_eq!(render("Hello, {{name}}!", &context).unwrap(), "Hello, &lt;World&gt;!");
/// ```
pub fn render(source: &str, context: &Value) -> MinibarsResult<String> {
    Template::new(source).render(context)
}

/// Like [`render`], with `helpers` visible to this render only. They shadow
/// helpers registered anywhere else under the same names.
///
/// # Errors
/// Fails with any error [`Template::render`] can return.
pub fn render_with_helpers<I, N>(source: &str, context: &Value, helpers: I) -> MinibarsResult<String>
where
    I: IntoIterator<Item = (N, Helper)>,
    N: Into<String>,
{
    render_with_helpers_and_partials(source, context, helpers, std::iter::empty::<(N, &str)>())
}

/// Like [`render_with_helpers`], also registering `partials` given as
/// `(name, source)` pairs.
///
/// # Errors
/// A partial source that does not parse fails the call with
/// [`MinibarsError::InvalidPartial`] before anything renders. Otherwise fails
/// with any error [`Template::render`] can return.
pub fn render_with_helpers_and_partials<I, N, P, M, S>(
    source: &str,
    context: &Value,
    helpers: I,
    partials: P,
) -> MinibarsResult<String>
where
    I: IntoIterator<Item = (N, Helper)>,
    N: Into<String>,
    P: IntoIterator<Item = (M, S)>,
    M: Into<String>,
    S: AsRef<str>,
{
    let template = Template::new(source);
    template.register_helpers(helpers);
    for (name, partial) in partials {
        let name = name.into();
        template
            .register_partial_string(name.clone(), partial.as_ref())
            .map_err(|source| MinibarsError::InvalidPartial {
                partial_name: name,
                source,
            })?;
    }
    template.render(context)
}
