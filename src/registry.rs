use std::{collections::HashMap, fmt, sync::Arc};

use parking_lot::RwLock;
use tracing::debug;

use crate::{
    ast::Program,
    error::ParseError,
    helper::{CallingInfo, Helper, HelperResult},
    parser::parse,
};

/// Entries a [`Registry`] can hold.
pub trait RegistryEntry: Clone + Send + Sync {
    /// Noun used in log events.
    const KIND: &'static str;
}

impl RegistryEntry for Helper {
    const KIND: &'static str = "helper";
}

impl RegistryEntry for Partial {
    const KIND: &'static str = "partial";
}

/// A named store that can be read and written from several threads at once.
///
/// Lookups take a shared lock and return a clone of the entry, so a render
/// never holds the lock while it runs a helper or a partial.
pub struct Registry<T> {
    entries: RwLock<HashMap<String, T>>,
}

pub type HelperRegistry = Registry<Helper>;
pub type PartialRegistry = Registry<Partial>;

impl<T: RegistryEntry> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Adds `entry` under `name`, returning the entry it replaced.
    pub fn register<N: Into<String>>(&self, name: N, entry: T) -> Option<T> {
        let name = name.into();
        debug!(kind = T::KIND, name = %name, "registering");
        self.entries.write().insert(name, entry)
    }

    /// Adds every entry, taking the write lock once.
    pub fn register_all<I, N>(&self, entries: I)
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
    {
        let mut map = self.entries.write();
        for (name, entry) in entries {
            let name = name.into();
            debug!(kind = T::KIND, name = %name, "registering");
            map.insert(name, entry);
        }
    }

    pub fn get(&self, name: &str) -> Option<T> {
        self.entries.read().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<T> {
        let removed = self.entries.write().remove(name);
        if removed.is_some() {
            debug!(kind = T::KIND, name, "unregistered");
        }
        removed
    }

    pub fn clear(&self) {
        let mut map = self.entries.write();
        debug!(kind = T::KIND, count = map.len(), "unregistering all");
        map.clear();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.entries.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

impl<T: RegistryEntry> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RegistryEntry> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &T::KIND)
            .field("names", &self.names())
            .finish()
    }
}

impl Registry<Helper> {
    /// Registers a closure as a helper.
    pub fn register_fn<N, F>(&self, name: N, function: F) -> Option<Helper>
    where
        N: Into<String>,
        F: Fn(&CallingInfo<'_>) -> HelperResult + Send + Sync + 'static,
    {
        self.register(name, Helper::from_fn(function))
    }
}

impl Registry<Partial> {
    /// Compiles `source` and registers it under `name`.
    ///
    /// # Errors
    /// Returns the [`ParseError`] when `source` is not a valid template;
    /// nothing is registered in that case.
    pub fn register_string<N: Into<String>>(&self, name: N, source: &str) -> Result<(), ParseError> {
        let partial = Partial::compile(source)?;
        self.register(name, partial);
        Ok(())
    }

    /// Compiles every source first and registers them only if all compile.
    ///
    /// # Errors
    /// Returns the first [`ParseError`]; nothing is registered in that case.
    pub fn register_strings<I, N, S>(&self, sources: I) -> Result<(), ParseError>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: AsRef<str>,
    {
        let partials = sources
            .into_iter()
            .map(|(name, source)| Ok((name, Partial::compile(source.as_ref())?)))
            .collect::<Result<Vec<_>, ParseError>>()?;
        self.register_all(partials);
        Ok(())
    }
}

/// A compiled partial along with the text it was compiled from.
#[derive(Debug, Clone)]
pub struct Partial {
    source: Arc<str>,
    program: Arc<Program>,
}

impl Partial {
    /// # Errors
    /// Returns the [`ParseError`] when `source` is not a valid template.
    pub fn compile(source: &str) -> Result<Self, ParseError> {
        let program = parse(source)?;
        Ok(Self {
            source: Arc::from(source),
            program: Arc::new(program),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn program(&self) -> &Program {
        &self.program
    }
}
