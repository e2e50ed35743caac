//! A minimal Handlebars template engine.
//!
//! Templates compile lazily into a syntax tree that is rendered against a
//! [`Value`]. Helpers and partials are looked up by name when a template
//! renders: first in the template's own registries, then in the
//! [`ExecutionContext`] it was created from, then in the global context, then
//! among the built-in helpers (`if`, `unless`, `each`, `with`, `lookup`, `log`
//! and `localize`).
//!
//! ```rust
//! use minibars::{ExecutionContext, Helper, Value};
//! use std::sync::Arc;
//!
//! let context = Arc::new(ExecutionContext::new());
//! context.register_helper("upper", Helper::from_fn(|info| {
//!     Ok(info.param(0).map(Value::to_display_string).unwrap_or_default().to_uppercase())
//! }));
//! context.register_partial_string("item", "<li>{{upper this}}</li>").unwrap();
//!
//! let template = context.template("<ul>{{#each items}}{{> item}}{{/each}}</ul>");
//! let data = Value::object([("items", Value::array(["a", "b"]))]);
//! assert_eq!(template.render(&data).unwrap(), "<ul><li>A</li><li>B</li></ul>");
//! ```

mod access;
mod ast;
mod builtins;
mod context;
mod error;
mod escape;
mod execution;
mod helper;
mod interface;
mod options;
mod parser;
mod registry;
mod render;
mod template;
mod value;

pub use access::access;
pub use ast::{
    Block, Expression, KeyPath, NumberLiteral, ParametersHash, PartialTag, PathComponent, Program,
    SimpleTag, Statement,
};
pub use builtins::builtin_helper_names;
pub use context::{ContextState, PrivateData};
pub use error::{HostAccessError, MinibarsError, MinibarsResult, ParseError, ParseErrorKind};
pub use escape::escape_html;
pub use execution::{ExecutionContext, ExecutionContextDelegate};
pub use helper::{CallingInfo, Helper, HelperDef, HelperResult, InvocationKind, Statements};
pub use interface::{render, render_with_helpers, render_with_helpers_and_partials};
pub use options::{DEFAULT_MAX_PARTIAL_DEPTH, DEFAULT_TARGET_FORMAT, RenderOptions};
pub use parser::{MAX_BLOCK_DEPTH, parse};
pub use registry::{HelperRegistry, Partial, PartialRegistry, Registry, RegistryEntry};
pub use template::Template;
pub use value::{HostObject, Number, Value};
