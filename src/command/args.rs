// src/command/args.rs

use std::fmt::Display;

/// Ordered `--key=value` argument list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgList {
    args: Vec<String>,
}

impl ArgList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: &str, value: impl Display) -> &mut Self {
        self.args.push(format!("--{key}={value}"));
        self
    }

    pub fn push_if(&mut self, condition: bool, key: &str, value: impl Display) -> &mut Self {
        if condition {
            self.push(key, value);
        }
        self
    }

    /// Push only when `value` is non-empty.
    pub fn push_non_empty(&mut self, key: &str, value: &str) -> &mut Self {
        self.push_if(!value.is_empty(), key, value)
    }

    /// Comma-joined list, omitted entirely when empty.
    pub fn push_list(&mut self, key: &str, values: &[String]) -> &mut Self {
        if !values.is_empty() {
            self.push(key, values.join(","));
        }
        self
    }

    pub fn finish(&mut self) -> Vec<String> {
        std::mem::take(&mut self.args)
    }
}

/// Floats keep a decimal point (`200.0`, not `200`).
pub fn float(v: f64) -> String {
    format!("{v:?}")
}
