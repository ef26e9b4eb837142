//! Statement descriptors.
//!
//! A [`Statement`] is SQL text using `@name` placeholders together with the
//! named values bound to them. Structural parts of the text (table, key column,
//! caller-supplied WHERE fragments) are trusted; everything else is a parameter.

use crate::models::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// How the statement text is interpreted by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Plain SQL text
    #[default]
    Text,
    /// The text is a stored procedure name; parameters are passed in order
    StoredProcedure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    params: Vec<(String, Value)>,
    /// Position of each name in `params`
    index: HashMap<String, usize>,
    pub kind: CommandKind,
    /// Overrides the configured command timeout.
    pub timeout: Option<Duration>,
}

impl Statement {
    /// Create a plain text statement without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            index: HashMap::new(),
            kind: CommandKind::Text,
            timeout: None,
        }
    }

    /// Create a stored procedure invocation.
    pub fn procedure(name: impl Into<String>) -> Self {
        Self {
            kind: CommandKind::StoredProcedure,
            ..Self::new(name)
        }
    }

    /// Bind a named parameter. The name is given without the `@` sigil.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push_param(name, value);
        self
    }

    /// Bind several named parameters.
    pub fn bind_all<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (name, value) in params {
            self.push_param(name, value);
        }
        self
    }

    /// Set the command timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Look up a bound parameter by name (case-sensitive).
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.index.get(name).map(|&i| &self.params[i].1)
    }

    /// Bound parameters in binding order.
    pub fn params(&self) -> &[(String, Value)] {
        &self.params
    }

    /// Same text and kind, different parameter set.
    pub(crate) fn with_params_of(&self, other: &Statement) -> Self {
        Self {
            params: other.params.clone(),
            index: other.index.clone(),
            timeout: self.timeout.or(other.timeout),
            ..self.clone()
        }
    }

    fn push_param(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let name = name.strip_prefix('@').map(str::to_string).unwrap_or(name);
        let value = value.into();
        match self.index.get(&name) {
            Some(&i) => self.params[i].1 = value,
            None => {
                self.index.insert(name.clone(), self.params.len());
                self.params.push((name, value));
            }
        }
    }
}
