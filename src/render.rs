use std::cell::Cell;

use tracing::trace;

use crate::{
    ast::{Block, Expression, KeyPath, ParametersHash, PartialTag, Program, SimpleTag, Statement},
    context::ContextState,
    error::{MinibarsError, MinibarsResult},
    helper::{CallingInfo, Helper, InvocationKind, Statements},
    template::Template,
    value::Value,
};

/// Section handed to expression helpers, which have no body.
static EMPTY_PROGRAM: Program = Program::empty();

/// A helper call site, resolved and ready to invoke.
struct Call<'n> {
    name: &'n str,
    helper: Helper,
    params: &'n [Expression],
    hash: &'n ParametersHash,
    kind: InvocationKind,
    program: &'n Program,
    inverse: &'n Program,
}

/// Walks a program, writing its output. One renderer serves a single
/// top-level render call of a template.
pub(crate) struct Renderer<'t> {
    template: &'t Template,
    partial_depth: Cell<usize>,
}

impl<'t> Renderer<'t> {
    pub(crate) const fn new(template: &'t Template) -> Self {
        Self {
            template,
            partial_depth: Cell::new(0),
        }
    }

    pub(crate) const fn template(&self) -> &'t Template {
        self.template
    }

    pub(crate) fn render_program(
        &self,
        program: &Program,
        state: &ContextState<'_>,
    ) -> MinibarsResult<String> {
        let mut output = String::new();
        self.render_into(program, state, &mut output)?;
        Ok(output)
    }

    fn render_into(
        &self,
        program: &Program,
        state: &ContextState<'_>,
        output: &mut String,
    ) -> MinibarsResult<()> {
        for statement in &program.statements {
            match statement {
                Statement::RawText(text) => output.push_str(text),
                Statement::Comment(_) => {}
                Statement::SimpleTag(tag) => self.render_simple_tag(tag, state, output)?,
                Statement::PartialTag(partial) => self.render_partial(partial, state, output)?,
                Statement::Block(block) => {
                    let rendered = self.render_block(block, state)?;
                    output.push_str(&rendered);
                }
            }
        }
        Ok(())
    }

    fn render_simple_tag(
        &self,
        tag: &SimpleTag,
        state: &ContextState<'_>,
        output: &mut String,
    ) -> MinibarsResult<()> {
        // A lone identifier naming a helper calls it, even if the context has
        // a field of the same name.
        let helper = tag
            .expression
            .as_key_path()
            .and_then(KeyPath::helper_name)
            .and_then(|name| Some((name, self.template.helper(name)?)));

        let text = match helper {
            Some((name, helper)) => self.invoke(
                &Call {
                    name,
                    helper,
                    params: &tag.params,
                    hash: &tag.hash,
                    kind: InvocationKind::Expression,
                    program: &EMPTY_PROGRAM,
                    inverse: &EMPTY_PROGRAM,
                },
                state,
            )?,
            None if !tag.params.is_empty() || !tag.hash.is_empty() => {
                return Err(MinibarsError::MissingHelper {
                    helper_name: expression_source(&tag.expression),
                });
            }
            None => self
                .evaluate(&tag.expression, state)?
                .map(|value| value.to_display_string())
                .unwrap_or_default(),
        };

        if tag.escaped {
            output.push_str(&self.template.escape_string(&text));
        } else {
            output.push_str(&text);
        }
        Ok(())
    }

    fn render_block(&self, block: &Block, state: &ContextState<'_>) -> MinibarsResult<String> {
        let missing = || MinibarsError::MissingHelper {
            helper_name: block.path.source.clone(),
        };
        let name = block.path.helper_name().ok_or_else(missing)?;
        let helper = self.template.helper(name).ok_or_else(missing)?;
        self.invoke(
            &Call {
                name,
                helper,
                params: &block.params,
                hash: &block.hash,
                kind: InvocationKind::Block,
                program: &block.program,
                inverse: &block.inverse,
            },
            state,
        )
    }

    fn render_partial(
        &self,
        partial: &PartialTag,
        state: &ContextState<'_>,
        output: &mut String,
    ) -> MinibarsResult<()> {
        let found = self
            .template
            .partial(&partial.name)?
            .ok_or_else(|| MinibarsError::MissingPartial {
                partial_name: partial.name.clone(),
            })?;

        let depth = self.partial_depth.get();
        let limit = self.template.options().max_partial_depth;
        if depth >= limit {
            return Err(MinibarsError::RecursionLimit {
                partial_name: partial.name.clone(),
                limit,
            });
        }

        let data = if partial.hash.is_empty() {
            state.data().clone()
        } else {
            state.data().extend(self.evaluate_hash(&partial.hash, state)?)
        };
        // Only an explicit context opens a scope; otherwise `../` inside the
        // partial means what it means at the call site.
        let child = match &partial.context {
            Some(expression) => {
                let value = self.evaluate(expression, state)?.unwrap_or_default();
                state.child(value, data)
            }
            None => state.with_data(data),
        };

        self.partial_depth.set(depth + 1);
        let result = self.render_into(found.program(), &child, output);
        self.partial_depth.set(depth);
        result
    }

    fn invoke(&self, call: &Call<'_>, state: &ContextState<'_>) -> MinibarsResult<String> {
        let params = call
            .params
            .iter()
            .map(|param| Ok(self.evaluate(param, state)?.unwrap_or_default()))
            .collect::<MinibarsResult<Vec<_>>>()?;
        let hash = self.evaluate_hash(call.hash, state)?;
        trace!(
            helper = call.name,
            kind = ?call.kind,
            params = params.len(),
            "invoking helper"
        );

        let info = CallingInfo::new(
            call.name,
            state,
            params,
            hash,
            call.kind,
            Statements::new(call.program, self, state),
            Statements::new(call.inverse, self, state),
            self,
        );
        call.helper.call(&info)
    }

    /// Evaluates named parameters in declaration order.
    fn evaluate_hash(
        &self,
        hash: &ParametersHash,
        state: &ContextState<'_>,
    ) -> MinibarsResult<Vec<(String, Value)>> {
        hash.iter()
            .map(|(name, expression)| {
                Ok((
                    name.to_string(),
                    self.evaluate(expression, state)?.unwrap_or_default(),
                ))
            })
            .collect()
    }

    fn evaluate(
        &self,
        expression: &Expression,
        state: &ContextState<'_>,
    ) -> MinibarsResult<Option<Value>> {
        Ok(match expression {
            Expression::ContextualValue(path) => state.resolve(path)?,
            Expression::StringLiteral(text) => Some(Value::String(text.clone())),
            Expression::NumberLiteral(literal) if literal.is_boolean => {
                Some(Value::Bool(literal.value.is_positive()))
            }
            Expression::NumberLiteral(literal) => Some(Value::Number(literal.value)),
        })
    }
}

fn expression_source(expression: &Expression) -> String {
    match expression {
        Expression::ContextualValue(path) => path.source.clone(),
        Expression::StringLiteral(text) => text.clone(),
        Expression::NumberLiteral(literal) => literal.source.clone(),
    }
}
