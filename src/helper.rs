use std::{fmt, sync::Arc};

use crate::{
    ast::Program,
    context::{ContextState, PrivateData},
    error::{MinibarsError, MinibarsResult},
    render::Renderer,
    template::Template,
    value::Value,
};

/// What a helper returns: the text it renders to, or the error that aborts
/// the render.
pub type HelperResult = MinibarsResult<String>;

/// A named, invocable unit referenced from templates.
///
/// Implemented for every `Fn(&CallingInfo<'_>) -> HelperResult`, so plain
/// closures can be registered directly; implement it by hand for helpers that
/// carry configuration.
pub trait HelperDef: Send + Sync {
    /// # Errors
    /// A helper that cannot produce output returns an error, which aborts
    /// the whole render.
    fn call(&self, info: &CallingInfo<'_>) -> HelperResult;
}

impl<F> HelperDef for F
where
    F: Fn(&CallingInfo<'_>) -> HelperResult + Send + Sync,
{
    fn call(&self, info: &CallingInfo<'_>) -> HelperResult {
        self(info)
    }
}

/// A shareable handle to a [`HelperDef`].
#[derive(Clone)]
pub struct Helper(Arc<dyn HelperDef>);

impl Helper {
    pub fn new<H: HelperDef + 'static>(def: H) -> Self {
        Self(Arc::new(def))
    }

    /// Wraps a closure. Unlike [`Helper::new`], the closure's argument type
    /// is inferred.
    ///
    /// ```
    /// use minibars::{Helper, Template, Value};
    ///
    /// let template = Template::new("{{shout word}}");
    /// template.register_helper(
    ///     "shout",
    ///     Helper::from_fn(|info| {
    ///         Ok(info.param(0).map(Value::to_display_string).unwrap_or_default().to_uppercase())
    ///     }),
    /// );
    /// let output = template.render(&Value::object([("word", "hey")])).unwrap();
    /// assert_eq!(output, "HEY");
    /// ```
    pub fn from_fn<F>(function: F) -> Self
    where
        F: Fn(&CallingInfo<'_>) -> HelperResult + Send + Sync + 'static,
    {
        Self(Arc::new(function))
    }

    /// # Errors
    /// Whatever the helper returns.
    pub fn call(&self, info: &CallingInfo<'_>) -> HelperResult {
        self.0.call(info)
    }
}

impl fmt::Debug for Helper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Helper").finish_non_exhaustive()
    }
}

/// How a helper was reached from the template.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationKind {
    /// `{{name params...}}`: the helper has no body.
    Expression,
    /// `{{#name params...}}...{{/name}}`.
    Block,
}

/// A deferred section of a block: rendering it re-enters the template with a
/// context and private data of the helper's choosing.
///
/// Sections absent from the source are empty programs, so rendering them is
/// always allowed and yields an empty string.
#[derive(Clone, Copy)]
pub struct Statements<'a> {
    program: &'a Program,
    renderer: &'a Renderer<'a>,
    state: &'a ContextState<'a>,
}

impl<'a> Statements<'a> {
    pub(crate) const fn new(
        program: &'a Program,
        renderer: &'a Renderer<'a>,
        state: &'a ContextState<'a>,
    ) -> Self {
        Self {
            program,
            renderer,
            state,
        }
    }

    /// Renders the section against `context`, in a new scope whose parent is
    /// the scope the helper was called from.
    ///
    /// # Errors
    /// Any error raised while rendering the section.
    pub fn render(&self, context: Value, data: PrivateData) -> HelperResult {
        let state = self.state.child(context, data);
        self.renderer.render_program(self.program, &state)
    }

    pub fn is_empty(&self) -> bool {
        self.program.is_empty()
    }
}

impl fmt::Debug for Statements<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statements")
            .field("program", self.program)
            .finish_non_exhaustive()
    }
}

/// Everything a helper receives when it is invoked.
pub struct CallingInfo<'a> {
    helper_name: &'a str,
    state: &'a ContextState<'a>,
    params: Vec<Value>,
    hash: Vec<(String, Value)>,
    kind: InvocationKind,
    statements: Statements<'a>,
    inverse: Statements<'a>,
    renderer: &'a Renderer<'a>,
}

impl<'a> CallingInfo<'a> {
    pub(crate) const fn new(
        helper_name: &'a str,
        state: &'a ContextState<'a>,
        params: Vec<Value>,
        hash: Vec<(String, Value)>,
        kind: InvocationKind,
        statements: Statements<'a>,
        inverse: Statements<'a>,
        renderer: &'a Renderer<'a>,
    ) -> Self {
        Self {
            helper_name,
            state,
            params,
            hash,
            kind,
            statements,
            inverse,
            renderer,
        }
    }

    pub const fn helper_name(&self) -> &str {
        self.helper_name
    }

    /// The value of the scope the helper was called from.
    pub const fn context(&self) -> &Value {
        self.state.value()
    }

    pub const fn data(&self) -> &PrivateData {
        self.state.data()
    }

    /// Positional parameters, in order. Absent values are [`Value::Null`].
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn param(&self, index: usize) -> Option<&Value> {
        self.params.get(index)
    }

    /// Named parameters in declaration order.
    pub fn hash(&self) -> &[(String, Value)] {
        &self.hash
    }

    pub fn hash_value(&self, name: &str) -> Option<&Value> {
        self.hash
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub const fn kind(&self) -> InvocationKind {
        self.kind
    }

    /// The main section; empty for expression helpers.
    pub const fn statements(&self) -> &Statements<'a> {
        &self.statements
    }

    /// The `{{else}}` section; empty for expression helpers.
    pub const fn inverse(&self) -> &Statements<'a> {
        &self.inverse
    }

    pub const fn template(&self) -> &Template {
        self.renderer.template()
    }

    pub fn localize(&self, text: &str) -> String {
        self.template().localized_string(text)
    }

    pub fn escape(&self, raw: &str) -> String {
        self.template().escape_string(raw).into_owned()
    }

    /// A [`MinibarsError::Helper`] naming this helper.
    pub fn error<M: Into<String>>(&self, message: M) -> MinibarsError {
        MinibarsError::helper(self.helper_name, message)
    }
}

impl fmt::Debug for CallingInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallingInfo")
            .field("helper_name", &self.helper_name)
            .field("context", self.context())
            .field("params", &self.params)
            .field("hash", &self.hash)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
