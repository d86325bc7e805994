//! `${{ ... }}` expression expansion for step commands and environment values

use crate::core::{environment::is_valid_name, Environment, SecretStore};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

/// Error raised by an expression that cannot be expanded
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InterpolationError {
    #[error("unknown expression '${{{{ {0} }}}}' (expected env.NAME, secrets.NAME or workspace)")]
    UnknownExpression(String),

    #[error("invalid variable name in '${{{{ {0} }}}}'")]
    InvalidName(String),

    #[error("secret '{0}' is not declared")]
    UndeclaredSecret(String),

    #[error("unterminated expression at '{0}'")]
    Unterminated(String),
}

/// A parsed `${{ ... }}` expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Env(String),
    Secret(String),
    Workspace,
}

impl Expression {
    /// Parse the text between `${{` and `}}`
    pub fn parse(raw: &str) -> Result<Self, InterpolationError> {
        let expr = raw.trim();
        if expr == "workspace" {
            return Ok(Expression::Workspace);
        }

        let (namespace, name) = expr
            .split_once('.')
            .ok_or_else(|| InterpolationError::UnknownExpression(expr.to_string()))?;

        if !is_valid_name(name) {
            return Err(InterpolationError::InvalidName(expr.to_string()));
        }

        match namespace {
            "env" => Ok(Expression::Env(name.to_string())),
            "secrets" => Ok(Expression::Secret(name.to_string())),
            _ => Err(InterpolationError::UnknownExpression(expr.to_string())),
        }
    }
}

fn expression_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{\{([^}]*)\}\}").expect("expression regex is valid"))
}

/// Reject a `${{` that is not closed by `}}`
fn check_terminated(template: &str) -> Result<(), InterpolationError> {
    let rest = expression_regex().replace_all(template, "");
    match rest.find("${{") {
        Some(pos) => Err(InterpolationError::Unterminated(rest[pos..].trim_end().to_string())),
        None => Ok(()),
    }
}

/// Parse every expression in `template` without expanding it
pub fn expressions(template: &str) -> Result<Vec<Expression>, InterpolationError> {
    check_terminated(template)?;
    expression_regex()
        .captures_iter(template)
        .map(|caps| Expression::parse(&caps[1]))
        .collect()
}

/// Values an expression can resolve against
pub struct Scope<'a> {
    pub env: &'a Environment,
    pub secrets: &'a SecretStore,
    pub workspace: &'a Path,
}

impl Scope<'_> {
    /// Expand every expression in `template` in a single pass
    ///
    /// An unset `env.NAME` expands to the empty string.
    pub fn expand(&self, template: &str) -> Result<String, InterpolationError> {
        check_terminated(template)?;
        let mut result = String::with_capacity(template.len());
        let mut last = 0;

        for caps in expression_regex().captures_iter(template) {
            let Some(whole) = caps.get(0) else { continue };
            result.push_str(&template[last..whole.start()]);

            match Expression::parse(&caps[1])? {
                Expression::Env(name) => result.push_str(self.env.get(&name).unwrap_or("")),
                Expression::Secret(name) => {
                    let value = self
                        .secrets
                        .get(&name)
                        .ok_or(InterpolationError::UndeclaredSecret(name))?;
                    result.push_str(value);
                }
                Expression::Workspace => result.push_str(&self.workspace.to_string_lossy()),
            }

            last = whole.end();
        }

        result.push_str(&template[last..]);
        Ok(result)
    }
}
