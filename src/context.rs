use std::{collections::BTreeMap, sync::Arc};

use crate::{
    access::access,
    ast::{KeyPath, PathComponent},
    error::HostAccessError,
    value::Value,
};

/// Helper-set variables (`@index`, `@first`, ...) visible to a block body.
///
/// Immutable: [`PrivateData::with`] and [`PrivateData::extend`] return a new
/// scope and leave the receiver untouched, so a helper can never change the
/// data it was given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrivateData(Arc<BTreeMap<String, Value>>);

impl PrivateData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// A copy of this scope with `name` set to `value`.
    #[must_use]
    pub fn with<N: Into<String>, V: Into<Value>>(&self, name: N, value: V) -> Self {
        self.extend([(name, value)])
    }

    /// A copy of this scope with every entry of `entries` set.
    #[must_use]
    pub fn extend<I, N, V>(&self, entries: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<Value>,
    {
        let mut map = BTreeMap::clone(&self.0);
        map.extend(
            entries
                .into_iter()
                .map(|(name, value)| (name.into(), value.into())),
        );
        Self(Arc::new(map))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for PrivateData {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self::new().extend(iter)
    }
}

/// One link of the scope chain: the value a section evaluates against, its
/// private data, and the state it was entered from.
///
/// States live on the renderer's call stack and borrow their parent, so a
/// state can only be created as a child of one that outlives it.
#[derive(Debug)]
pub struct ContextState<'a> {
    value: Value,
    data: PrivateData,
    parent: Option<&'a ContextState<'a>>,
}

impl<'a> ContextState<'a> {
    pub const fn root(value: Value, data: PrivateData) -> Self {
        Self {
            value,
            data,
            parent: None,
        }
    }

    pub const fn child<'b>(&'b self, value: Value, data: PrivateData) -> ContextState<'b> {
        ContextState {
            value,
            data,
            parent: Some(self),
        }
    }

    /// The same scope level with other private data: same value, same
    /// parent.
    pub fn with_data(&self, data: PrivateData) -> Self {
        Self {
            value: self.value.clone(),
            data,
            parent: self.parent,
        }
    }

    pub const fn value(&self) -> &Value {
        &self.value
    }

    pub const fn data(&self) -> &PrivateData {
        &self.data
    }

    pub const fn parent(&self) -> Option<&'a ContextState<'a>> {
        self.parent
    }

    /// The state `levels` links up the chain, if the chain is that long.
    pub fn ancestor(&self, levels: usize) -> Option<&ContextState<'a>> {
        let mut state = self;
        for _ in 0..levels {
            state = state.parent?;
        }
        Some(state)
    }

    /// Resolves `path` against this state.
    ///
    /// Leading `..` components move up the chain; `this` stays on the current
    /// value; `@name` reads the private data of the state reached so far; any
    /// other component reads a key off the current value. An absent step
    /// makes the whole path absent, and ordinary identifiers never fall back
    /// to enclosing scopes.
    ///
    /// # Errors
    /// Fails only when a host object fails while one of its fields is read.
    pub fn resolve(&self, path: &KeyPath) -> Result<Option<Value>, HostAccessError> {
        let parents = path
            .components
            .iter()
            .take_while(|component| matches!(component, PathComponent::Parent))
            .count();
        let Some(state) = self.ancestor(parents) else {
            return Ok(None);
        };

        let mut current = state.value.clone();
        for component in &path.components[parents..] {
            let next = match component {
                PathComponent::This => Some(current),
                // Only leading parent markers move up the chain.
                PathComponent::Parent => None,
                PathComponent::Private(name) => state.data.get(name).cloned(),
                PathComponent::Identifier(key) => access(&current, key)?,
            };
            match next {
                Some(value) => current = value,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }
}
