use std::{
    fmt,
    sync::{Arc, LazyLock},
};

use parking_lot::RwLock;
use tracing::debug;

use crate::{
    error::{MinibarsError, MinibarsResult, ParseError},
    helper::Helper,
    registry::{HelperRegistry, Partial, PartialRegistry},
    template::Template,
};

static GLOBAL: LazyLock<Arc<ExecutionContext>> =
    LazyLock::new(|| Arc::new(ExecutionContext::new()));

/// Supplies helpers, partials, translations and escaping on demand, for
/// entries that are not registered ahead of time.
///
/// Every hook declines (returns `None`) by default. A declined lookup falls
/// through to the next context in the resolution chain.
pub trait ExecutionContextDelegate: Send + Sync {
    fn helper_named(&self, _name: &str, _context: &ExecutionContext) -> Option<Helper> {
        None
    }

    fn partial_named(&self, _name: &str, _context: &ExecutionContext) -> Option<Partial> {
        None
    }

    /// Source text for a partial; consulted after [`Self::partial_named`].
    fn partial_string_named(&self, _name: &str, _context: &ExecutionContext) -> Option<String> {
        None
    }

    fn localized_string(&self, _text: &str, _context: &ExecutionContext) -> Option<String> {
        None
    }

    /// Escapes `raw` for `target_format`, or declines an unsupported format.
    fn escape_string(
        &self,
        _raw: &str,
        _target_format: &str,
        _context: &ExecutionContext,
    ) -> Option<String> {
        None
    }
}

/// A set of helpers and partials shared by the templates created from it,
/// plus an optional delegate that provides entries on demand.
///
/// Registration may happen at any time, including while templates created
/// from the context are rendering on other threads.
#[derive(Default)]
pub struct ExecutionContext {
    helpers: HelperRegistry,
    partials: PartialRegistry,
    delegate: RwLock<Option<Arc<dyn ExecutionContextDelegate>>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide context, consulted after every other context.
    /// Created on first use.
    pub fn global() -> &'static Arc<Self> {
        &GLOBAL
    }

    /// Creates a template that resolves helpers and partials through this
    /// context, including entries registered after the template was created.
    pub fn template<S: Into<String>>(self: &Arc<Self>, source: S) -> Template {
        Template::with_context(source, Arc::clone(self))
    }

    pub const fn helpers(&self) -> &HelperRegistry {
        &self.helpers
    }

    pub const fn partials(&self) -> &PartialRegistry {
        &self.partials
    }

    pub fn register_helper<N: Into<String>>(&self, name: N, helper: Helper) {
        self.helpers.register(name, helper);
    }

    pub fn register_helpers<I, N>(&self, helpers: I)
    where
        I: IntoIterator<Item = (N, Helper)>,
        N: Into<String>,
    {
        self.helpers.register_all(helpers);
    }

    pub fn unregister_helper(&self, name: &str) -> Option<Helper> {
        self.helpers.remove(name)
    }

    pub fn unregister_all_helpers(&self) {
        self.helpers.clear();
    }

    pub fn register_partial<N: Into<String>>(&self, name: N, partial: Partial) {
        self.partials.register(name, partial);
    }

    /// # Errors
    /// Returns the [`ParseError`] when `source` is not a valid template.
    pub fn register_partial_string<N: Into<String>>(
        &self,
        name: N,
        source: &str,
    ) -> Result<(), ParseError> {
        self.partials.register_string(name, source)
    }

    /// # Errors
    /// Returns the first [`ParseError`]; nothing is registered in that case.
    pub fn register_partial_strings<I, N, S>(&self, sources: I) -> Result<(), ParseError>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: AsRef<str>,
    {
        self.partials.register_strings(sources)
    }

    pub fn unregister_partial(&self, name: &str) -> Option<Partial> {
        self.partials.remove(name)
    }

    pub fn unregister_all_partials(&self) {
        self.partials.clear();
    }

    pub fn delegate(&self) -> Option<Arc<dyn ExecutionContextDelegate>> {
        self.delegate.read().clone()
    }

    /// Installs `delegate`, or removes the current one with `None`.
    pub fn set_delegate(&self, delegate: Option<Arc<dyn ExecutionContextDelegate>>) {
        *self.delegate.write() = delegate;
    }

    /// The registered helper named `name`, else the delegate's.
    pub fn helper(&self, name: &str) -> Option<Helper> {
        self.helpers.get(name).or_else(|| {
            let helper = self.delegate()?.helper_named(name, self);
            if helper.is_some() {
                debug!(name, "helper provided by delegate");
            }
            helper
        })
    }

    /// The registered partial named `name`, else the delegate's compiled
    /// partial, else the delegate's partial source, compiled.
    ///
    /// # Errors
    /// Fails with [`MinibarsError::InvalidPartial`] when the source the
    /// delegate supplied does not parse.
    pub fn partial(&self, name: &str) -> MinibarsResult<Option<Partial>> {
        if let Some(partial) = self.partials.get(name) {
            return Ok(Some(partial));
        }
        let Some(delegate) = self.delegate() else {
            return Ok(None);
        };
        if let Some(partial) = delegate.partial_named(name, self) {
            debug!(name, "partial provided by delegate");
            return Ok(Some(partial));
        }
        let Some(source) = delegate.partial_string_named(name, self) else {
            return Ok(None);
        };
        debug!(name, "partial source provided by delegate");
        Partial::compile(&source)
            .map(Some)
            .map_err(|source| MinibarsError::InvalidPartial {
                partial_name: name.to_string(),
                source,
            })
    }

    pub fn localized_string(&self, text: &str) -> Option<String> {
        self.delegate()?.localized_string(text, self)
    }

    pub fn escape_string(&self, raw: &str, target_format: &str) -> Option<String> {
        self.delegate()?.escape_string(raw, target_format, self)
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("helpers", &self.helpers)
            .field("partials", &self.partials)
            .field("has_delegate", &self.delegate.read().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorKind;

    struct Provider;

    impl ExecutionContextDelegate for Provider {
        fn helper_named(&self, name: &str, _context: &ExecutionContext) -> Option<Helper> {
            (name == "dynamic").then(|| Helper::from_fn(|_| Ok("from delegate".to_string())))
        }

        fn partial_string_named(&self, name: &str, _context: &ExecutionContext) -> Option<String> {
            match name {
                "footer" => Some("(c) {{year}}".to_string()),
                "broken" => Some("{{#if x}}".to_string()),
                _ => None,
            }
        }
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_registered_helpers_win_over_delegate() {
        let context = ExecutionContext::new();
        context.set_delegate(Some(Arc::new(Provider)));
        assert!(context.helper("dynamic").is_some());
        assert!(context.helper("other").is_none());

        context.register_helper("other", Helper::from_fn(|_| Ok(String::new())));
        assert!(context.helper("other").is_some());
        assert!(context.unregister_helper("other").is_some());
        assert!(context.helper("other").is_none());
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_partials_from_delegate_strings() {
        let context = ExecutionContext::new();
        assert!(context.partial("footer").unwrap().is_none());

        context.set_delegate(Some(Arc::new(Provider)));
        let footer = context.partial("footer").unwrap().unwrap();
        assert_eq!(footer.source(), "(c) {{year}}");
        assert!(context.partial("missing").unwrap().is_none());

        let err = context.partial("broken").unwrap_err();
        assert!(matches!(
            err,
            MinibarsError::InvalidPartial { ref partial_name, ref source }
                if partial_name == "broken" && matches!(source.kind, ParseErrorKind::UnexpectedEOF { .. })
        ));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_removing_the_delegate() {
        let context = ExecutionContext::new();
        context.set_delegate(Some(Arc::new(Provider)));
        context.set_delegate(None);
        assert!(context.delegate().is_none());
        assert!(context.helper("dynamic").is_none());
    }
}
