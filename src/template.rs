use std::{borrow::Cow, sync::Arc, sync::OnceLock};

use tracing::debug;

use crate::{
    ast::Program,
    builtins::builtin_helper,
    context::{ContextState, PrivateData},
    error::{MinibarsResult, ParseError},
    escape::escape_html,
    execution::ExecutionContext,
    helper::Helper,
    options::RenderOptions,
    parser::parse,
    registry::Partial,
    render::Renderer,
    value::Value,
};

/// A Template is a template string that can be rendered against a [`Value`].
///
/// The string is parsed the first time the template is compiled or
/// rendered, and the result is kept for every later render. A template owns
/// its own helper and partial registries; names it does not find there are
/// looked up in the execution context it was created from (if any), then in
/// the global execution context, then among the built-in helpers.
///
/// # Example
///
/// ```rust
/// use minibars::{Helper, Template, Value};
///
/// let template = Template::new("{{#each people}}{{greet name}} {{/each}}");
/// template.register_helper(
///     "greet",
///     Helper::from_fn(|info| {
///         let name = info.param(0).map(Value::to_display_string).unwrap_or_default();
///         Ok(format!("Hello, {name}!"))
///     }),
/// );
///
/// let context = Value::object([(
///     "people",
///     Value::array([Value::object([("name", "Ada")]), Value::object([("name", "Alan")])]),
/// )]);
/// let result = template.render(&context).unwrap();
/// assert_eq!(result, "Hello, Ada! Hello, Alan! ");
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug)]
pub struct Template {
    source: String,
    #[cfg_attr(feature = "serde", serde(skip))]
    program: OnceLock<Result<Program, ParseError>>,
    #[cfg_attr(feature = "serde", serde(skip))]
    context: ExecutionContext,
    #[cfg_attr(feature = "serde", serde(skip))]
    shared: Option<Arc<ExecutionContext>>,
    options: RenderOptions,
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Template {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct TemplateHelper {
            source: String,
            #[serde(default)]
            options: RenderOptions,
        }

        let helper = TemplateHelper::deserialize(deserializer)?;

        // Rebuild the syntax tree rather than trusting serialized state.
        let template = Self::new(helper.source).with_options(helper.options);
        template
            .compile()
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse template: {e}")))?;

        Ok(template)
    }
}

impl Template {
    /// Creates a template from its source. Nothing is parsed until the
    /// template is compiled or rendered.
    pub fn new<S: Into<String>>(source: S) -> Self {
        Self {
            source: source.into(),
            program: OnceLock::new(),
            context: ExecutionContext::new(),
            shared: None,
            options: RenderOptions::default(),
        }
    }

    /// Creates a template that consults `shared` before the global context.
    /// [`ExecutionContext::template`] is the usual way to call this.
    pub fn with_context<S: Into<String>>(source: S, shared: Arc<ExecutionContext>) -> Self {
        Self {
            shared: Some(shared),
            ..Self::new(source)
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub const fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// The template-local execution context.
    pub const fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// The execution context the template was created from.
    pub const fn shared_context(&self) -> Option<&Arc<ExecutionContext>> {
        self.shared.as_ref()
    }

    /// Parses the template, once. Later calls, including concurrent ones,
    /// return the same result without parsing again.
    ///
    /// # Errors
    ///
    /// Returns the [`ParseError`] of a template whose syntax is invalid. The
    /// error is memoized too.
    pub fn compile(&self) -> Result<&Program, ParseError> {
        self.program
            .get_or_init(|| {
                let compiled = parse(&self.source);
                match &compiled {
                    Ok(program) => debug!(
                        source_len = self.source.len(),
                        statements = program.statements.len(),
                        "compiled template"
                    ),
                    Err(error) => debug!(%error, "template failed to compile"),
                }
                compiled
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    pub fn is_compiled(&self) -> bool {
        self.program.get().is_some()
    }

    /// Renders the template against `context`.
    ///
    /// # Arguments
    ///
    /// * `context` - The value the template's top-level expressions are
    ///   resolved against
    ///
    /// # Returns
    ///
    /// * `MinibarsResult<String>` - The rendered text if successful
    ///
    /// # Errors
    ///
    /// No partial output is returned when rendering fails. Errors occur when:
    /// * `MinibarsError::Parse` - The template does not compile
    /// * `MinibarsError::MissingHelper` - A block, or a tag with parameters,
    ///   names a helper that is registered nowhere
    /// * `MinibarsError::MissingPartial` - A partial is registered nowhere
    /// * `MinibarsError::InvalidPartial` - A delegate supplied a partial
    ///   source that does not compile
    /// * `MinibarsError::HostAccess` - A host object failed while being read
    /// * `MinibarsError::Helper` - A helper returned an error
    /// * `MinibarsError::RecursionLimit` - Partials nested deeper than
    ///   [`RenderOptions::max_partial_depth`]
    pub fn render(&self, context: &Value) -> MinibarsResult<String> {
        let program = self.compile()?;
        let state = ContextState::root(context.clone(), PrivateData::new());
        Renderer::new(self).render_program(program, &state)
    }

    pub fn register_helper<N: Into<String>>(&self, name: N, helper: Helper) {
        self.context.register_helper(name, helper);
    }

    pub fn register_helpers<I, N>(&self, helpers: I)
    where
        I: IntoIterator<Item = (N, Helper)>,
        N: Into<String>,
    {
        self.context.register_helpers(helpers);
    }

    /// # Errors
    /// Returns the [`ParseError`] when `source` is not a valid template.
    pub fn register_partial_string<N: Into<String>>(
        &self,
        name: N,
        source: &str,
    ) -> Result<(), ParseError> {
        self.context.register_partial_string(name, source)
    }

    /// # Errors
    /// Returns the first [`ParseError`]; nothing is registered in that case.
    pub fn register_partial_strings<I, N, S>(&self, sources: I) -> Result<(), ParseError>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: AsRef<str>,
    {
        self.context.register_partial_strings(sources)
    }

    /// Contexts consulted for helpers, partials, translations and escaping,
    /// nearest first.
    fn resolution_chain(&self) -> impl Iterator<Item = &ExecutionContext> {
        let global = ExecutionContext::global();
        let shared_is_global = self
            .shared
            .as_ref()
            .is_some_and(|shared| Arc::ptr_eq(shared, global));
        std::iter::once(&self.context)
            .chain(self.shared.as_deref())
            .chain((!shared_is_global).then_some(global.as_ref()))
    }

    /// Resolves a helper name: the template's own helpers, the shared
    /// context and its delegate, the global context and its delegate, then
    /// the built-in helpers.
    pub fn helper(&self, name: &str) -> Option<Helper> {
        self.resolution_chain()
            .find_map(|context| context.helper(name))
            .or_else(|| builtin_helper(name))
    }

    /// Resolves a partial name through the same chain as [`Self::helper`],
    /// minus the built-ins.
    ///
    /// # Errors
    /// Fails when a delegate supplies a partial source that does not parse.
    pub fn partial(&self, name: &str) -> MinibarsResult<Option<Partial>> {
        for context in self.resolution_chain() {
            if let Some(partial) = context.partial(name)? {
                return Ok(Some(partial));
            }
        }
        Ok(None)
    }

    /// The first translation a delegate in the chain provides, else `text`.
    pub fn localized_string(&self, text: &str) -> String {
        self.resolution_chain()
            .find_map(|context| context.localized_string(text))
            .unwrap_or_else(|| text.to_string())
    }

    /// Escapes `raw` for the configured target format. Falls back to HTML
    /// escaping when no delegate in the chain supports the format.
    pub fn escape_string<'r>(&self, raw: &'r str) -> Cow<'r, str> {
        self.resolution_chain()
            .find_map(|context| context.escape_string(raw, &self.options.target_format))
            .map_or_else(|| escape_html(raw), Cow::Owned)
    }
}
