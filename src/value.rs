use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

use crate::error::HostAccessError;

/// A numeric host value.
///
/// Integers and floats are kept apart so that `5` renders as `5` rather than
/// `5.0`, and so that integer coercion of integral values is exact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    #[allow(clippy::cast_precision_loss, reason = "display/ordering only")]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(value) => value as f64,
            Self::Float(value) => value,
        }
    }

    /// Integer value, truncating towards zero. Non-finite floats are 0.
    #[allow(clippy::cast_possible_truncation, reason = "truncation is the coercion")]
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Int(value) => value,
            Self::Float(value) if value.is_finite() => value.trunc() as i64,
            Self::Float(_) => 0,
        }
    }

    pub fn is_positive(self) -> bool {
        match self {
            Self::Int(value) => value > 0,
            Self::Float(value) => value > 0.0,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
        }
    }
}

/// Capabilities an application type exposes to templates.
///
/// Every capability is optional. A type that only wants to be readable by
/// field name lists its fields in [`HostObject::field_names`] and answers
/// [`HostObject::read_field`]; a collection type answers
/// [`HostObject::as_sequence`] or [`HostObject::as_mapping`] instead.
///
/// Which fields templates may read is decided by [`HostObject::valid_keys`]:
/// when it returns `Some`, only those keys are readable; when it returns
/// `None` (the default), every name in `field_names` is.
///
/// # Example
///
/// ```
/// use minibars::{HostAccessError, HostObject, Template, Value};
///
/// #[derive(Debug)]
/// struct User {
///     name: String,
///     password: String,
/// }
///
/// impl HostObject for User {
///     fn field_names(&self) -> &[&str] {
///         &["name", "password"]
///     }
///
///     fn valid_keys(&self) -> Option<&[&str]> {
///         Some(&["name"])
///     }
///
///     fn read_field(&self, key: &str) -> Result<Option<Value>, HostAccessError> {
///         Ok(match key {
///             "name" => Some(self.name.clone().into()),
///             "password" => Some(self.password.clone().into()),
///             _ => None,
///         })
///     }
/// }
///
/// let user = Value::host(User {
///     name: "Ada".to_string(),
///     password: "hunter2".to_string(),
/// });
/// let template = Template::new("{{name}}:{{password}}");
/// assert_eq!(template.render(&user).unwrap(), "Ada:");
/// ```
pub trait HostObject: fmt::Debug + Send + Sync {
    /// Name used in diagnostics.
    fn type_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Explicit allow-list of readable keys.
    fn valid_keys(&self) -> Option<&[&str]> {
        None
    }

    /// Every public field the type can be read by.
    fn field_names(&self) -> &[&str] {
        &[]
    }

    /// Reads a field. Only called for keys that passed the allow-list.
    ///
    /// # Errors
    /// A type that fails while producing the value returns a
    /// [`HostAccessError`], which aborts rendering.
    fn read_field(&self, _key: &str) -> Result<Option<Value>, HostAccessError> {
        Ok(None)
    }

    fn as_sequence(&self) -> Option<Vec<Value>> {
        None
    }

    fn as_mapping(&self) -> Option<Vec<(String, Value)>> {
        None
    }

    /// Text used when the object itself is interpolated.
    fn to_display(&self) -> Option<String> {
        None
    }
}

/// Data a template is rendered against.
///
/// Containers are reference counted, so cloning a `Value` (which happens
/// whenever a helper passes an element on as a new context) never copies the
/// underlying collection.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Arc<[Value]>),
    Object(Arc<BTreeMap<String, Value>>),
    Host(Arc<dyn HostObject>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Host(a), Self::Host(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (
                Self::Null
                | Self::Bool(_)
                | Self::Number(_)
                | Self::String(_)
                | Self::Array(_)
                | Self::Object(_)
                | Self::Host(_),
                _,
            ) => false,
        }
    }
}

impl Value {
    pub fn host<H: HostObject + 'static>(object: H) -> Self {
        Self::Host(Arc::new(object))
    }

    pub fn array<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Self>,
    {
        Self::Array(items.into_iter().map(Into::into).collect())
    }

    pub fn object<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Self>,
    {
        Self::Object(Arc::new(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ))
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            Self::Null
            | Self::Bool(_)
            | Self::Number(_)
            | Self::Array(_)
            | Self::Object(_)
            | Self::Host(_) => None,
        }
    }

    /// Elements of a sequence-like value, in order.
    pub fn elements(&self) -> Option<Vec<Self>> {
        match self {
            Self::Array(items) => Some(items.to_vec()),
            Self::Host(host) => host.as_sequence(),
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::String(_) | Self::Object(_) => {
                None
            }
        }
    }

    /// Entries of a mapping-like value.
    pub fn entries(&self) -> Option<Vec<(String, Self)>> {
        match self {
            Self::Object(map) => Some(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            ),
            Self::Host(host) => host.as_mapping(),
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::String(_) | Self::Array(_) => {
                None
            }
        }
    }

    /// Truthiness used by the conditional helpers.
    ///
    /// - numbers are truthy when strictly positive (`true` counts as 1)
    /// - strings and sequences are truthy when non-empty
    /// - everything else, null included, is falsy
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Number(number) => number.is_positive(),
            Self::String(value) => !value.is_empty(),
            Self::Array(items) => !items.is_empty(),
            Self::Host(host) => host.as_sequence().is_some_and(|items| !items.is_empty()),
            Self::Null | Self::Object(_) => false,
        }
    }

    /// Integer coercion: numbers by value, strings by length, sequences by
    /// element count, everything else 0.
    pub fn as_integer(&self) -> i64 {
        let count = |len: usize| i64::try_from(len).unwrap_or(i64::MAX);
        match self {
            Self::Bool(value) => i64::from(*value),
            Self::Number(number) => number.as_i64(),
            Self::String(value) => count(value.chars().count()),
            Self::Array(items) => count(items.len()),
            Self::Host(host) => host.as_sequence().map_or(0, |items| count(items.len())),
            Self::Null | Self::Object(_) => 0,
        }
    }

    /// Text emitted when the value is interpolated.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Null | Self::Object(_) => String::new(),
            Self::Bool(value) => value.to_string(),
            Self::Number(number) => number.to_string(),
            Self::String(value) => value.clone(),
            Self::Array(items) => join_display(items),
            Self::Host(host) => host
                .to_display()
                .or_else(|| host.as_sequence().map(|items| join_display(&items)))
                .unwrap_or_default(),
        }
    }
}

fn join_display(items: &[Value]) -> String {
    items
        .iter()
        .map(Value::to_display_string)
        .collect::<Vec<_>>()
        .join(",")
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::Number(Number::Int(i64::from(value)))
                }
            }
        )*
    };
}

from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<usize> for Value {
    #[allow(clippy::cast_precision_loss, reason = "only for values beyond i64")]
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or(Self::Number(Number::Float(value as f64)), |value| {
            Self::Number(Number::Int(value))
        })
    }
}

impl From<u64> for Value {
    #[allow(clippy::cast_precision_loss, reason = "only for values beyond i64")]
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(Self::Number(Number::Float(value as f64)), |value| {
            Self::Number(Number::Int(value))
        })
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Number(Number::Float(f64::from(value)))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(Number::Float(value))
    }
}

impl From<Number> for Value {
    fn from(value: Number) -> Self {
        Self::Number(value)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::array(items)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<K: Into<String>, V: Into<Self>> From<BTreeMap<K, V>> for Value {
    fn from(map: BTreeMap<K, V>) -> Self {
        Self::object(map)
    }
}

impl<K: Into<String>, V: Into<Self>, S> From<HashMap<K, V, S>> for Value {
    fn from(map: HashMap<K, V, S>) -> Self {
        Self::object(map)
    }
}

impl From<Arc<dyn HostObject>> for Value {
    fn from(host: Arc<dyn HostObject>) -> Self {
        Self::Host(host)
    }
}

#[cfg(feature = "serde")]
impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(value) => Self::Bool(value),
            serde_json::Value::Number(number) => number.as_i64().map_or_else(
                || Self::Number(Number::Float(number.as_f64().unwrap_or_default())),
                |value| Self::Number(Number::Int(value)),
            ),
            serde_json::Value::String(value) => Self::String(value),
            serde_json::Value::Array(items) => Self::array(items),
            serde_json::Value::Object(map) => Self::object(map),
        }
    }
}

#[cfg(feature = "serde")]
impl Value {
    /// Builds a value from anything serde can serialize.
    ///
    /// # Errors
    /// Fails when `value` cannot be represented as JSON (e.g. maps with
    /// non-string keys).
    pub fn from_serialize<T: serde::Serialize + ?Sized>(
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Self::from)
    }
}
