use crate::value::Number;

/// An ordered sequence of statements; the root of every parsed template and
/// the body of every block section.
///
/// Sections missing from the source are represented by an empty program, so
/// a [`Block`] always has both a main and an inverse program to render.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub const fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    pub const fn empty() -> Self {
        Self {
            statements: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Literal text, emitted unchanged.
    RawText(String),
    /// `{{! ... }}`, dropped at render time.
    Comment(String),
    /// `{{expr}}`, `{{{expr}}}` or `{{helper params...}}`.
    SimpleTag(SimpleTag),
    /// `{{> name}}`.
    PartialTag(PartialTag),
    /// `{{#helper}}...{{else}}...{{/helper}}`.
    Block(Block),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleTag {
    pub expression: Expression,
    pub params: Vec<Expression>,
    pub hash: ParametersHash,
    /// `false` for `{{{...}}}` and `{{&...}}`.
    pub escaped: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartialTag {
    pub name: String,
    pub context: Option<Expression>,
    pub hash: ParametersHash,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub path: KeyPath,
    pub params: Vec<Expression>,
    pub hash: ParametersHash,
    pub program: Program,
    pub inverse: Program,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    ContextualValue(KeyPath),
    StringLiteral(String),
    NumberLiteral(NumberLiteral),
}

impl Expression {
    pub const fn as_key_path(&self) -> Option<&KeyPath> {
        match self {
            Self::ContextualValue(path) => Some(path),
            Self::StringLiteral(_) | Self::NumberLiteral(_) => None,
        }
    }
}

/// A number as written in the template. `true` and `false` are numbers with
/// `is_boolean` set, so they keep their spelling when rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberLiteral {
    pub value: Number,
    pub is_boolean: bool,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathComponent {
    /// `this` or `.`.
    This,
    /// `..`.
    Parent,
    /// `@name`.
    Private(String),
    Identifier(String),
}

/// A lookup path such as `../items.0.name` or `@index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath {
    pub components: Vec<PathComponent>,
    /// The path as written, used in diagnostics and to match close tags.
    pub source: String,
}

impl KeyPath {
    pub fn new<S: Into<String>>(components: Vec<PathComponent>, source: S) -> Self {
        Self {
            components,
            source: source.into(),
        }
    }

    /// The name this path denotes when it is a lone identifier, which is the
    /// only shape that can refer to a helper.
    pub fn helper_name(&self) -> Option<&str> {
        match self.components.as_slice() {
            [PathComponent::Identifier(name)] => Some(name),
            _ => None,
        }
    }
}

/// Named parameters in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParametersHash {
    entries: Vec<(String, Expression)>,
}

impl ParametersHash {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends a parameter. A repeated name replaces the earlier value but
    /// keeps its position.
    pub fn insert<N: Into<String>>(&mut self, name: N, expression: Expression) {
        let name = name.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = expression,
            None => self.entries.push((name, expression)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Expression> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, expression)| expression)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Expression)> {
        self.entries
            .iter()
            .map(|(key, expression)| (key.as_str(), expression))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>> FromIterator<(N, Expression)> for ParametersHash {
    fn from_iter<I: IntoIterator<Item = (N, Expression)>>(iter: I) -> Self {
        let mut hash = Self::new();
        for (name, expression) in iter {
            hash.insert(name, expression);
        }
        hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(components: Vec<PathComponent>) -> KeyPath {
        KeyPath::new(components, "")
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_helper_name_only_for_lone_identifiers() {
        let ident = |name: &str| PathComponent::Identifier(name.to_string());
        assert_eq!(path(vec![ident("each")]).helper_name(), Some("each"));
        assert_eq!(path(vec![ident("a"), ident("b")]).helper_name(), None);
        assert_eq!(path(vec![PathComponent::This, ident("a")]).helper_name(), None);
        assert_eq!(path(vec![PathComponent::Parent, ident("a")]).helper_name(), None);
        assert_eq!(
            path(vec![PathComponent::Private("index".to_string())]).helper_name(),
            None
        );
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_hash_keeps_declaration_order() {
        let literal = |text: &str| Expression::StringLiteral(text.to_string());
        let mut hash = ParametersHash::new();
        hash.insert("zeta", literal("1"));
        hash.insert("alpha", literal("2"));
        hash.insert("zeta", literal("3"));

        let names: Vec<_> = hash.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["zeta", "alpha"]);
        assert_eq!(hash.get("zeta"), Some(&literal("3")));
        assert_eq!(hash.len(), 2);
    }
}
