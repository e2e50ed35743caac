use crate::{
    ast::{
        Block, Expression, KeyPath, NumberLiteral, ParametersHash, PartialTag, PathComponent,
        Program, SimpleTag, Statement,
    },
    error::{ParseError, ParseErrorKind},
    value::Number,
};

type ParseResult<T> = Result<T, ParseError>;

/// Bytes of template text captured on either side of an error position.
const CONTEXT_RADIUS: usize = 16;

/// How deeply blocks may nest, `{{else name}}` chain links included.
pub const MAX_BLOCK_DEPTH: usize = 64;

/// The head of a block: `{{#name params hash}}` or `{{else name params hash}}`.
struct BlockOpen {
    path: KeyPath,
    params: Vec<Expression>,
    hash: ParametersHash,
}

/// What ended a run of statements.
enum Terminator {
    Eof,
    /// `{{else}}` or `{{^}}`, or `{{else name ...}}` when it chains a block.
    Else {
        chain: Option<BlockOpen>,
        at: usize,
    },
    Close {
        path: KeyPath,
        at: usize,
    },
}

enum Tag {
    Statement(Statement),
    Else(Option<BlockOpen>),
    Close(KeyPath),
}

/// Characters that may appear in an unbracketed path segment.
fn is_id_char(c: char) -> bool {
    !c.is_whitespace() && !"!\"#%&'()*+,./;<=>@[\\]^`{|}~".contains(c)
}

fn is_partial_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/')
}

/// Whether a literal ending right before `rest` is a complete token.
fn ends_token(rest: &str) -> bool {
    rest.chars()
        .next()
        .is_none_or(|c| c.is_whitespace() || matches!(c, '}' | '~' | ')'))
}

fn strip_trailing_whitespace(statements: &mut Vec<Statement>) {
    if let Some(Statement::RawText(text)) = statements.last_mut() {
        let trimmed_len = text.trim_end().len();
        text.truncate(trimmed_len);
        if text.is_empty() {
            statements.pop();
        }
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// The starting location of the current line
    line_start_pos: usize,
    /// Set by a tag closed with `~}}`; the next raw text loses its leading
    /// whitespace.
    strip_next: bool,
    /// Blocks currently open.
    depth: usize,
}

impl<'a> Parser<'a> {
    const fn new(input: &'a str) -> Self {
        Parser {
            input,
            pos: 0,
            line: 1,
            line_start_pos: 0,
            strip_next: false,
            depth: 0,
        }
    }

    #[inline]
    const fn current_column(&self) -> usize {
        self.pos - self.line_start_pos + 1
    }

    fn context_window(&self, position: usize) -> String {
        let mut start = position.saturating_sub(CONTEXT_RADIUS);
        while !self.input.is_char_boundary(start) {
            start -= 1;
        }
        let mut end = (position + CONTEXT_RADIUS).min(self.input.len());
        while !self.input.is_char_boundary(end) {
            end += 1;
        }
        self.input[start..end].to_string()
    }

    #[inline]
    fn make_error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError {
            line: self.line,
            column: self.current_column(),
            position: self.pos,
            context: self.context_window(self.pos),
            kind,
        }
    }

    /// Builds an error for an earlier position, recomputing its line and
    /// column from the input.
    fn make_error_at(&self, position: usize, kind: ParseErrorKind) -> ParseError {
        let before = &self.input[..position];
        let line_start = before.rfind('\n').map_or(0, |index| index + 1);
        ParseError {
            line: before.matches('\n').count() + 1,
            column: position - line_start + 1,
            position,
            context: self.context_window(position),
            kind,
        }
    }

    /// Advances the parser position past `current_char`, updating line
    /// tracking if it is a newline.
    #[inline]
    fn advance_by_char(&mut self, current_char: char) {
        let char_len = current_char.len_utf8();
        if current_char == '\n' {
            self.line += 1;
            self.line_start_pos = self.pos + char_len;
        }
        self.pos += char_len;
    }

    /// Advances the parser position by `len` bytes.
    /// The skipped text must not contain newlines.
    #[inline]
    fn advance_bytes_no_newline(&mut self, len: usize) {
        self.pos += len;
    }

    /// Advances by `len` bytes of arbitrary text.
    fn advance_over(&mut self, len: usize) {
        let end = self.pos + len;
        while self.pos < end {
            match self.peek_char() {
                Some(current_char) => self.advance_by_char(current_char),
                None => break,
            }
        }
    }

    const fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Peek if the remaining input starts with `s`
    fn peek(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    /// Consume `s` if the remaining input starts with it.
    /// Assumes `s` does not contain newlines.
    fn consume(&mut self, s: &str) -> bool {
        if self.peek(s) {
            self.advance_bytes_no_newline(s.len());
            true
        } else {
            false
        }
    }

    fn consume_whitespace(&mut self) {
        while let Some(current_char) = self.peek_char() {
            if !current_char.is_whitespace() {
                break;
            }
            self.advance_by_char(current_char);
        }
    }

    /// Expect `s` to be the start of the remaining input, consume it or return Err.
    /// Assumes `s` does not contain newlines.
    fn expect(&mut self, s: &str) -> ParseResult<()> {
        if self.consume(s) {
            return Ok(());
        }
        let kind = if self.eof() {
            ParseErrorKind::unexpected_eof(Some(s.to_string()))
        } else {
            ParseErrorKind::UnexpectedToken {
                expected: format!("'{s}'"),
                found: format!(
                    "'{}'",
                    self.input[self.pos..]
                        .chars()
                        .take(s.len() + 10)
                        .collect::<String>()
                ),
            }
        };
        Err(self.make_error(kind))
    }

    /// Whether the remaining input closes the current tag.
    fn at_tag_end(&self) -> bool {
        self.peek("}") || self.peek("~}")
    }

    /// Consumes `}}` or `~}}`, arming whitespace stripping for the latter.
    fn expect_close(&mut self) -> ParseResult<()> {
        self.consume_whitespace();
        let strip = self.consume("~");
        self.expect("}}")?;
        self.strip_next = strip;
        Ok(())
    }

    /// Collects literal text up to the next tag. `\{{` yields a literal `{{`,
    /// while `\\{{` yields a backslash and leaves the tag live.
    fn parse_raw_text(&mut self) -> String {
        let mut text = String::new();
        while let Some(current_char) = self.peek_char() {
            if self.peek("\\\\{{") {
                self.advance_bytes_no_newline(2);
                text.push('\\');
                break;
            }
            if self.peek("\\{{") {
                self.advance_bytes_no_newline(3);
                text.push_str("{{");
                continue;
            }
            if self.peek("{{") {
                break;
            }
            text.push(current_char);
            self.advance_by_char(current_char);
        }
        if std::mem::take(&mut self.strip_next) {
            text = text.trim_start().to_string();
        }
        text
    }

    /// Parses statements until the end of input or a tag that ends the
    /// current section.
    fn parse_statements(&mut self) -> ParseResult<(Vec<Statement>, Terminator)> {
        let mut statements = Vec::new();
        loop {
            if self.eof() {
                return Ok((statements, Terminator::Eof));
            }
            if !self.peek("{{") {
                let text = self.parse_raw_text();
                if !text.is_empty() {
                    statements.push(Statement::RawText(text));
                }
                continue;
            }

            let tag_start = self.pos;
            self.advance_bytes_no_newline(2);
            self.strip_next = false;
            if self.consume("~") {
                strip_trailing_whitespace(&mut statements);
            }
            match self.parse_tag()? {
                Tag::Statement(statement) => statements.push(statement),
                Tag::Else(chain) => {
                    return Ok((statements, Terminator::Else { chain, at: tag_start }));
                }
                Tag::Close(path) => {
                    return Ok((statements, Terminator::Close { path, at: tag_start }));
                }
            }
        }
    }

    /// Parses a tag whose `{{` (and optional `~`) were already consumed.
    fn parse_tag(&mut self) -> ParseResult<Tag> {
        if self.consume("!") {
            return self.parse_comment().map(Tag::Statement);
        }
        if self.consume("{") {
            let (expression, params, hash) = self.parse_call()?;
            self.consume_whitespace();
            self.expect("}")?;
            self.expect_close()?;
            return Ok(Tag::Statement(Statement::SimpleTag(SimpleTag {
                expression,
                params,
                hash,
                escaped: false,
            })));
        }
        if self.consume("&") {
            let (expression, params, hash) = self.parse_call()?;
            self.expect_close()?;
            return Ok(Tag::Statement(Statement::SimpleTag(SimpleTag {
                expression,
                params,
                hash,
                escaped: false,
            })));
        }
        if self.consume("#") {
            let open = self.parse_block_open()?;
            self.expect_close()?;
            let close_name = open.path.source.clone();
            return self
                .parse_block(open, &close_name, false)
                .map(|block| Tag::Statement(Statement::Block(block)));
        }
        if self.consume("^") {
            self.consume_whitespace();
            if self.at_tag_end() {
                self.expect_close()?;
                return Ok(Tag::Else(None));
            }
            let open = self.parse_block_open()?;
            self.expect_close()?;
            let close_name = open.path.source.clone();
            return self
                .parse_block(open, &close_name, true)
                .map(|block| Tag::Statement(Statement::Block(block)));
        }
        if self.consume("/") {
            self.consume_whitespace();
            let path = self.parse_path()?;
            self.expect_close()?;
            return Ok(Tag::Close(path));
        }
        if self.consume(">") {
            return self
                .parse_partial()
                .map(|partial| Tag::Statement(Statement::PartialTag(partial)));
        }

        self.consume_whitespace();
        if self.peek_keyword("else") {
            self.advance_bytes_no_newline("else".len());
            self.consume_whitespace();
            if self.at_tag_end() {
                self.expect_close()?;
                return Ok(Tag::Else(None));
            }
            let open = self.parse_block_open()?;
            self.expect_close()?;
            return Ok(Tag::Else(Some(open)));
        }

        let (expression, params, hash) = self.parse_call()?;
        self.expect_close()?;
        Ok(Tag::Statement(Statement::SimpleTag(SimpleTag {
            expression,
            params,
            hash,
            escaped: true,
        })))
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        self.input[self.pos..]
            .strip_prefix(keyword)
            .is_some_and(|rest| rest.chars().next().is_none_or(|c| !is_id_char(c)))
    }

    /// `{{! text}}` or `{{!-- text --}}`; the latter may contain `}}`.
    fn parse_comment(&mut self) -> ParseResult<Statement> {
        let input = self.input;
        let long = self.consume("--");
        let terminators: &[&str] = if long {
            &["--~}}", "--}}"]
        } else {
            &["~}}", "}}"]
        };
        let rest = &input[self.pos..];
        let found = terminators
            .iter()
            .filter_map(|terminator| rest.find(terminator).map(|at| (at, *terminator)))
            .min_by_key(|(at, _)| *at);

        let Some((len, terminator)) = found else {
            self.advance_over(rest.len());
            let expected = if long { "--}}" } else { "}}" };
            return Err(self.make_error(ParseErrorKind::unexpected_eof(Some(expected.to_string()))));
        };
        self.advance_over(len);
        self.advance_bytes_no_newline(terminator.len());
        self.strip_next = terminator.contains('~');
        Ok(Statement::Comment(rest[..len].to_string()))
    }

    /// Parses the sections following a block's open tag, up to and including
    /// the close tag, which must name `close_name`.
    fn parse_block(
        &mut self,
        open: BlockOpen,
        close_name: &str,
        inverted: bool,
    ) -> ParseResult<Block> {
        if self.depth >= MAX_BLOCK_DEPTH {
            return Err(self.make_error(ParseErrorKind::NestingTooDeep {
                limit: MAX_BLOCK_DEPTH,
            }));
        }
        self.depth += 1;
        let block = self.parse_block_body(open, close_name, inverted);
        self.depth -= 1;
        block
    }

    fn parse_block_body(
        &mut self,
        open: BlockOpen,
        close_name: &str,
        inverted: bool,
    ) -> ParseResult<Block> {
        let (statements, terminator) = self.parse_statements()?;
        let program = Program::new(statements);
        let inverse = match terminator {
            Terminator::Eof => return Err(self.unclosed(close_name)),
            Terminator::Close { path, at } => {
                self.check_close(close_name, &path, at)?;
                Program::empty()
            }
            Terminator::Else { chain: None, .. } => {
                let (statements, terminator) = self.parse_statements()?;
                match terminator {
                    Terminator::Eof => return Err(self.unclosed(close_name)),
                    Terminator::Close { path, at } => self.check_close(close_name, &path, at)?,
                    Terminator::Else { at, .. } => {
                        return Err(self.make_error_at(
                            at,
                            ParseErrorKind::Message(format!(
                                "'{close_name}' already has an inverse section"
                            )),
                        ));
                    }
                }
                Program::new(statements)
            }
            // The chained block shares our close tag.
            Terminator::Else {
                chain: Some(chained),
                ..
            } => {
                let nested = self.parse_block(chained, close_name, false)?;
                Program::new(vec![Statement::Block(nested)])
            }
        };

        let (program, inverse) = if inverted {
            (inverse, program)
        } else {
            (program, inverse)
        };
        Ok(Block {
            path: open.path,
            params: open.params,
            hash: open.hash,
            program,
            inverse,
        })
    }

    fn unclosed(&self, close_name: &str) -> ParseError {
        self.make_error(ParseErrorKind::unexpected_eof(Some(format!(
            "{{{{/{close_name}}}}}"
        ))))
    }

    fn check_close(&self, close_name: &str, path: &KeyPath, at: usize) -> ParseResult<()> {
        if path.source == close_name {
            Ok(())
        } else {
            Err(self.make_error_at(
                at,
                ParseErrorKind::MismatchedClose {
                    open: close_name.to_string(),
                    close: path.source.clone(),
                },
            ))
        }
    }

    fn parse_block_open(&mut self) -> ParseResult<BlockOpen> {
        self.consume_whitespace();
        let start = self.pos;
        let (expression, params, hash) = self.parse_call()?;
        match expression {
            Expression::ContextualValue(path) => Ok(BlockOpen { path, params, hash }),
            Expression::StringLiteral(_) | Expression::NumberLiteral(_) => Err(self.make_error_at(
                start,
                ParseErrorKind::Expected {
                    description: "a block helper name".to_string(),
                },
            )),
        }
    }

    /// `{{> name [context] [key=value...]}}`, with `>` already consumed.
    fn parse_partial(&mut self) -> ParseResult<PartialTag> {
        self.consume_whitespace();
        let name = match self.peek_char() {
            Some(quote @ ('"' | '\'')) => self.parse_string_literal(quote)?,
            _ => {
                let input = self.input;
                let rest = &input[self.pos..];
                let len = rest
                    .find(|c: char| !is_partial_name_char(c))
                    .unwrap_or(rest.len());
                if len == 0 {
                    return Err(self.make_error(ParseErrorKind::Expected {
                        description: "a partial name".to_string(),
                    }));
                }
                self.advance_bytes_no_newline(len);
                rest[..len].to_string()
            }
        };

        let mut context = None;
        let mut hash = ParametersHash::new();
        loop {
            self.consume_whitespace();
            if self.at_tag_end() {
                break;
            }
            if let Some(key) = self.peek_hash_key() {
                self.parse_hash_entry(key, &mut hash)?;
            } else if context.is_none() && hash.is_empty() {
                context = Some(self.parse_expression()?);
            } else {
                return Err(self.make_error(ParseErrorKind::Expected {
                    description: "named parameters after the partial context".to_string(),
                }));
            }
        }
        self.expect_close()?;
        Ok(PartialTag {
            name,
            context,
            hash,
        })
    }

    /// An expression followed by positional parameters, then named ones.
    fn parse_call(&mut self) -> ParseResult<(Expression, Vec<Expression>, ParametersHash)> {
        self.consume_whitespace();
        let expression = self.parse_expression()?;
        let mut params = Vec::new();
        let mut hash = ParametersHash::new();
        loop {
            self.consume_whitespace();
            if self.at_tag_end() {
                break;
            }
            if let Some(key) = self.peek_hash_key() {
                self.parse_hash_entry(key, &mut hash)?;
            } else if hash.is_empty() {
                params.push(self.parse_expression()?);
            } else {
                return Err(self.make_error(ParseErrorKind::Expected {
                    description: "only named parameters after the first named parameter"
                        .to_string(),
                }));
            }
        }
        Ok((expression, params, hash))
    }

    /// Returns `key` when the remaining input starts with `key=`.
    fn peek_hash_key(&self) -> Option<&'a str> {
        let input = self.input;
        let rest = &input[self.pos..];
        let len = rest.find(|c: char| !is_id_char(c)).unwrap_or(rest.len());
        (len > 0 && rest[len..].trim_start().starts_with('=')).then(|| &rest[..len])
    }

    fn parse_hash_entry(&mut self, key: &str, hash: &mut ParametersHash) -> ParseResult<()> {
        self.advance_bytes_no_newline(key.len());
        self.consume_whitespace();
        self.expect("=")?;
        self.consume_whitespace();
        let value = self.parse_expression()?;
        hash.insert(key, value);
        Ok(())
    }

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        match self.peek_char() {
            None => Err(self.make_error(ParseErrorKind::unexpected_eof(Some("}}".to_string())))),
            Some(quote @ ('"' | '\'')) => self
                .parse_string_literal(quote)
                .map(Expression::StringLiteral),
            Some(_) => match self.parse_number_literal() {
                Some(literal) => Ok(Expression::NumberLiteral(literal)),
                None => self.parse_path().map(Expression::ContextualValue),
            },
        }
    }

    fn parse_string_literal(&mut self, quote: char) -> ParseResult<String> {
        self.advance_bytes_no_newline(quote.len_utf8());
        let mut value = String::new();
        loop {
            match self.peek_char() {
                None => {
                    return Err(
                        self.make_error(ParseErrorKind::unexpected_eof(Some(quote.to_string())))
                    );
                }
                Some('\\') if self.input[self.pos + 1..].starts_with(quote) => {
                    value.push(quote);
                    self.advance_bytes_no_newline(1 + quote.len_utf8());
                }
                Some(current_char) if current_char == quote => {
                    self.advance_bytes_no_newline(quote.len_utf8());
                    return Ok(value);
                }
                Some(current_char) => {
                    value.push(current_char);
                    self.advance_by_char(current_char);
                }
            }
        }
    }

    /// Numbers and `true`/`false`. Consumes nothing unless a whole literal
    /// token is present, so `1st` still parses as a path.
    fn parse_number_literal(&mut self) -> Option<NumberLiteral> {
        let input = self.input;
        let rest = &input[self.pos..];

        if let Some(word) = ["true", "false"]
            .into_iter()
            .find(|word| rest.starts_with(word) && ends_token(&rest[word.len()..]))
        {
            self.advance_bytes_no_newline(word.len());
            return Some(NumberLiteral {
                value: Number::Int(i64::from(word == "true")),
                is_boolean: true,
                source: word.to_string(),
            });
        }

        let sign_len = usize::from(rest.starts_with('-'));
        let digits = |from: usize| {
            rest[from..]
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len() - from)
        };
        let integer_len = digits(sign_len);
        if integer_len == 0 {
            return None;
        }
        let mut len = sign_len + integer_len;
        if rest[len..].starts_with('.') {
            let fraction_len = digits(len + 1);
            if fraction_len > 0 {
                len += 1 + fraction_len;
            }
        }
        if !ends_token(&rest[len..]) {
            return None;
        }

        let source = &rest[..len];
        let value = source
            .parse::<i64>()
            .map(Number::Int)
            .or_else(|_| source.parse::<f64>().map(Number::Float))
            .ok()?;
        self.advance_bytes_no_newline(len);
        Some(NumberLiteral {
            value,
            is_boolean: false,
            source: source.to_string(),
        })
    }

    fn consume_separator(&mut self) -> bool {
        self.consume(".") || self.consume("/")
    }

    /// `name`, `a.b/c`, `this.a`, `.`, `../a`, `@index`, `@../index`, `[any text]`.
    fn parse_path(&mut self) -> ParseResult<KeyPath> {
        let start = self.pos;
        let mut private = self.consume("@");
        let mut components = Vec::new();

        let mut segments_follow = true;
        while self.peek("..") {
            self.advance_bytes_no_newline(2);
            components.push(PathComponent::Parent);
            if !self.consume_separator() {
                segments_follow = false;
                break;
            }
        }
        if segments_follow && !private && components.is_empty() && self.peek(".") {
            self.advance_bytes_no_newline(1);
            components.push(PathComponent::This);
            segments_follow = self.consume("/");
        }

        while segments_follow {
            let (segment, bracketed) = self.parse_segment()?;
            let component = if private {
                private = false;
                PathComponent::Private(segment)
            } else if !bracketed && segment == "this" {
                PathComponent::This
            } else {
                PathComponent::Identifier(segment)
            };
            components.push(component);
            segments_follow = self.consume_separator();
        }

        if private {
            return Err(self.make_error(ParseErrorKind::Expected {
                description: "a private variable name".to_string(),
            }));
        }
        Ok(KeyPath::new(components, &self.input[start..self.pos]))
    }

    /// One path segment, and whether it was written in brackets.
    fn parse_segment(&mut self) -> ParseResult<(String, bool)> {
        let input = self.input;
        if self.consume("[") {
            let rest = &input[self.pos..];
            let Some(len) = rest.find(']') else {
                self.advance_over(rest.len());
                return Err(self.make_error(ParseErrorKind::unexpected_eof(Some("]".to_string()))));
            };
            self.advance_over(len);
            self.advance_bytes_no_newline(1);
            return Ok((rest[..len].to_string(), true));
        }

        let rest = &input[self.pos..];
        let len = rest.find(|c: char| !is_id_char(c)).unwrap_or(rest.len());
        if len == 0 {
            let kind = match self.peek_char() {
                Some(c) if c != '}' && c != '~' && !c.is_whitespace() => {
                    ParseErrorKind::InvalidIdentifier {
                        at_char: c.to_string(),
                    }
                }
                _ => ParseErrorKind::Expected {
                    description: "identifier".to_string(),
                },
            };
            return Err(self.make_error(kind));
        }
        self.advance_bytes_no_newline(len);
        Ok((rest[..len].to_string(), false))
    }
}

/// Parses a template into its syntax tree.
///
/// # Errors
/// Returns a [`ParseError`] carrying the line, column, byte offset and
/// surrounding text of the first syntax error.
pub fn parse(input: &str) -> Result<Program, ParseError> {
    let mut parser = Parser::new(input);
    let (statements, terminator) = parser.parse_statements()?;
    match terminator {
        Terminator::Eof => Ok(Program::new(statements)),
        Terminator::Else { at, .. } => Err(parser.make_error_at(
            at,
            ParseErrorKind::Message("'else' outside of a block".to_string()),
        )),
        Terminator::Close { path, at } => Err(parser.make_error_at(
            at,
            ParseErrorKind::Message(format!(
                "'{{{{/{}}}}}' does not close any block",
                path.source
            )),
        )),
    }
}
