//! Expression compiler for human-authored key and filter conditions.
//!
//! Conditions are written with `#name` markers for reserved attribute names and
//! double-quoted string literals for values:
//!
//! ```text
//! hkey = "users" and begins_with(#status, "act")
//! ```
//!
//! Compilation runs in two passes. The first splits the input into quoted
//! literals and everything else; the second finds `#name` markers only in the
//! non-literal segments, so a `#` inside a literal is never taken for a name.
//! Literals become generated `:litN` placeholders bound as string values, and
//! names map to themselves (`#status -> status`).

use std::collections::HashMap;

use raziel_model::AttributeValue;

/// One lexical piece of a condition string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Operators, placeholders, plain attribute names and whitespace, emitted as-is.
    Verbatim(&'a str),
    /// A `#name` marker, without the `#`.
    Name(&'a str),
    /// The contents of a double-quoted literal, without the quotes.
    Literal(&'a str),
}

/// Split a condition string into tokens.
#[must_use]
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    for segment in split_literals(input) {
        match segment {
            Token::Verbatim(text) => split_names(text, &mut tokens),
            other => tokens.push(other),
        }
    }
    tokens
}

/// First pass: separate `"..."` literals from the surrounding text.
///
/// An unterminated quote is kept as verbatim text.
fn split_literals(input: &str) -> Vec<Token<'_>> {
    let mut out = Vec::new();
    let mut rest = input;
    while let Some(open) = rest.find('"') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('"') else {
            break;
        };
        if open > 0 {
            out.push(Token::Verbatim(&rest[..open]));
        }
        out.push(Token::Literal(&after[..close]));
        rest = &after[close + 1..];
    }
    if !rest.is_empty() {
        out.push(Token::Verbatim(rest));
    }
    out
}

/// Second pass: pull `#name` markers out of a non-literal segment.
fn split_names<'a>(text: &'a str, out: &mut Vec<Token<'a>>) {
    let mut verbatim_start = 0;
    let mut pos = 0;
    let bytes = text.as_bytes();
    while pos < bytes.len() {
        if bytes[pos] == b'#' {
            let name_len = text[pos + 1..]
                .bytes()
                .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
                .count();
            if name_len > 0 {
                if pos > verbatim_start {
                    out.push(Token::Verbatim(&text[verbatim_start..pos]));
                }
                out.push(Token::Name(&text[pos + 1..pos + 1 + name_len]));
                pos += 1 + name_len;
                verbatim_start = pos;
                continue;
            }
        }
        pos += 1;
    }
    if verbatim_start < text.len() {
        out.push(Token::Verbatim(&text[verbatim_start..]));
    }
}

/// Name and value placeholder tables shared by every expression of one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionContext {
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
    next_literal: usize,
}

impl ExpressionContext {
    /// An empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile one condition string, registering its names and literals.
    ///
    /// Literal placeholders are numbered across every call on this context, so
    /// a key condition and a filter compiled for the same request never share
    /// an id.
    pub fn compile(&mut self, input: &str) -> String {
        let mut rendered = String::with_capacity(input.len());
        for token in tokenize(input) {
            match token {
                Token::Verbatim(text) => rendered.push_str(text),
                Token::Name(name) => {
                    let placeholder = format!("#{name}");
                    self.names.insert(placeholder.clone(), name.to_owned());
                    rendered.push_str(&placeholder);
                }
                Token::Literal(literal) => {
                    let placeholder = format!(":lit{}", self.next_literal);
                    self.next_literal += 1;
                    self.values
                        .insert(placeholder.clone(), AttributeValue::s(literal));
                    rendered.push_str(&placeholder);
                }
            }
        }
        rendered
    }

    /// Bind a name placeholder directly.
    pub fn bind_name(&mut self, placeholder: impl Into<String>, name: impl Into<String>) {
        self.names.insert(placeholder.into(), name.into());
    }

    /// Bind a value placeholder directly.
    pub fn bind_value(&mut self, placeholder: impl Into<String>, value: AttributeValue) {
        self.values.insert(placeholder.into(), value);
    }

    /// Registered name placeholders.
    #[must_use]
    pub fn names(&self) -> &HashMap<String, String> {
        &self.names
    }

    /// Registered value placeholders.
    #[must_use]
    pub fn values(&self) -> &HashMap<String, AttributeValue> {
        &self.values
    }

    /// Split into the name and value maps.
    #[must_use]
    pub fn into_parts(self) -> (HashMap<String, String>, HashMap<String, AttributeValue>) {
        (self.names, self.values)
    }
}

/// A single compiled condition with its own placeholder tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    /// The store-native expression.
    pub expression: String,
    /// `#name -> name`.
    pub names: HashMap<String, String>,
    /// `:litN -> S(literal)`.
    pub values: HashMap<String, AttributeValue>,
}

/// Compile a standalone condition string.
#[must_use]
pub fn compile(input: &str) -> Compiled {
    let mut ctx = ExpressionContext::new();
    let expression = ctx.compile(input);
    let (names, values) = ctx.into_parts();
    Compiled {
        expression,
        names,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_replace_literals_with_placeholders() {
        let out = compile(r#"hkey = "a" and begins_with(rkey, "b/")"#);
        assert_eq!(out.expression, "hkey = :lit0 and begins_with(rkey, :lit1)");
        assert_eq!(out.values.get(":lit0"), Some(&AttributeValue::s("a")));
        assert_eq!(out.values.get(":lit1"), Some(&AttributeValue::s("b/")));
        assert!(out.names.is_empty());
    }

    #[test]
    fn test_should_map_names_to_themselves() {
        let out = compile(r#"#status = "active" AND #size > :n"#);
        assert_eq!(out.expression, "#status = :lit0 AND #size > :n");
        assert_eq!(out.names.get("#status").map(String::as_str), Some("status"));
        assert_eq!(out.names.get("#size").map(String::as_str), Some("size"));
    }

    #[test]
    fn test_should_not_read_names_inside_literals() {
        let out = compile(r##"note = "#not-a-name""##);
        assert_eq!(out.expression, "note = :lit0");
        assert!(out.names.is_empty());
        assert_eq!(
            out.values.get(":lit0"),
            Some(&AttributeValue::s("#not-a-name"))
        );
    }

    #[test]
    fn test_should_keep_unterminated_quote_verbatim() {
        let tokens = tokenize(r#"a = "x" and b = "y"#);
        assert_eq!(
            tokens,
            vec![
                Token::Verbatim("a = "),
                Token::Literal("x"),
                Token::Verbatim(r#" and b = "y"#),
            ]
        );
    }

    #[test]
    fn test_should_keep_bare_hash_verbatim() {
        assert_eq!(tokenize("a # b"), vec![Token::Verbatim("a # b")]);
    }

    #[test]
    fn test_should_number_placeholders_across_expressions() {
        let mut ctx = ExpressionContext::new();
        let key = ctx.compile(r#"hkey = "a""#);
        let filter = ctx.compile(r#"#kind = "b""#);
        assert_eq!(key, "hkey = :lit0");
        assert_eq!(filter, "#kind = :lit1");
        assert_eq!(ctx.values().len(), 2);
    }

    #[test]
    fn test_should_accept_empty_literal() {
        let out = compile(r#"a = """#);
        assert_eq!(out.expression, "a = :lit0");
        assert_eq!(out.values.get(":lit0"), Some(&AttributeValue::s("")));
    }
}
