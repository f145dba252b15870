//! Parameterized statements
//!
//! A [`Statement`] is SQL text using named `@name` placeholders together with
//! the values bound to those names. Backends differ in the placeholder syntax
//! they accept, so a statement is rendered for a [`PlaceholderStyle`] right
//! before execution.

use super::database_types::PlaceholderStyle;
use super::error::{DatabaseError, Result};
use super::value::DatabaseValue;

/// One named parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub value: DatabaseValue,
}

impl Param {
    pub fn new(name: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// SQL text plus its bound parameters
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    sql: String,
    params: Vec<Param>,
}

impl Statement {
    /// Create a statement with no parameters
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Create a statement from text and an ordered parameter list
    pub fn with_params(sql: impl Into<String>, params: Vec<Param>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Bind a value to `name`
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.params.push(Param::new(name, value));
        self
    }

    /// Statement text with named placeholders
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bound parameters in binding order
    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Value bound to `name`, if any
    pub fn param(&self, name: &str) -> Option<&DatabaseValue> {
        self.params.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    /// Rewrite placeholders for `style` and order the values to match
    ///
    /// Text inside single quotes, double quotes and backticks is copied
    /// untouched, so literals such as `'alice@example.com'` in a caller's
    /// filter are never mistaken for placeholders. `--` line comments and
    /// `/* */` block comments are copied the same way. `@@name` is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::SqlSynthesis`] when the text references a
    /// placeholder that has no bound value.
    pub fn render(&self, style: PlaceholderStyle) -> Result<(String, Vec<DatabaseValue>)> {
        let mut sql = String::with_capacity(self.sql.len());
        let mut values = Vec::with_capacity(self.params.len());
        // Names already assigned a position, in order of first appearance.
        let mut seen: Vec<&str> = Vec::new();

        let mut quote: Option<char> = None;
        let mut chars = self.sql.char_indices().peekable();

        while let Some((idx, ch)) = chars.next() {
            if let Some(q) = quote {
                sql.push(ch);
                if ch == q {
                    quote = None;
                }
                continue;
            }

            match ch {
                '\'' | '"' | '`' => {
                    quote = Some(ch);
                    sql.push(ch);
                }
                '-' if chars.peek().map(|&(_, c)| c) == Some('-') => {
                    sql.push(ch);
                    for (_, c) in chars.by_ref() {
                        sql.push(c);
                        if c == '\n' {
                            break;
                        }
                    }
                }
                '/' if chars.peek().map(|&(_, c)| c) == Some('*') => {
                    sql.push(ch);
                    if let Some((_, star)) = chars.next() {
                        sql.push(star);
                    }
                    let mut prev = '\0';
                    for (_, c) in chars.by_ref() {
                        sql.push(c);
                        if prev == '*' && c == '/' {
                            break;
                        }
                        prev = c;
                    }
                }
                '@' => match chars.peek().map(|&(_, c)| c) {
                    Some('@') => {
                        sql.push_str("@@");
                        chars.next();
                    }
                    Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                        let start = idx + 1;
                        let mut end = start;
                        while let Some(&(i, c)) = chars.peek() {
                            if c.is_ascii_alphanumeric() || c == '_' {
                                end = i + c.len_utf8();
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        let name = &self.sql[start..end];
                        let value = self.param(name).ok_or_else(|| {
                            DatabaseError::synthesis(format!(
                                "placeholder @{} has no bound value",
                                name
                            ))
                        })?;

                        let position = seen.iter().position(|n| *n == name);
                        match style {
                            PlaceholderStyle::Named => {
                                sql.push('@');
                                sql.push_str(name);
                                if position.is_none() {
                                    seen.push(name);
                                    values.push(value.clone());
                                }
                            }
                            PlaceholderStyle::Question => {
                                sql.push('?');
                                values.push(value.clone());
                            }
                            PlaceholderStyle::Dollar => {
                                let number = match position {
                                    Some(p) => p + 1,
                                    None => {
                                        seen.push(name);
                                        values.push(value.clone());
                                        seen.len()
                                    }
                                };
                                sql.push('$');
                                sql.push_str(&number.to_string());
                            }
                        }
                    }
                    _ => sql.push('@'),
                },
                _ => sql.push(ch),
            }
        }

        Ok((sql, values))
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql)
    }
}
