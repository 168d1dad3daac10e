//! Restricted JEXL evaluator for expression-mode steps.
//!
//! Wraps `jexl_eval::Evaluator` with a fixed whitelist of pure transforms.
//! The grammar has literals, field access, arithmetic, comparison, logical
//! operators, ternary and `in`; it has no statements, loops, assignment or
//! I/O. Transform names are checked against the whitelist before anything
//! is evaluated.
//!
//! **Security note:** context values are always passed as the evaluation
//! context, NEVER interpolated into expression strings.

use serde_json::{json, Value};

use super::context::ContextStore;

/// Upper bound on expression source length.
pub const MAX_EXPRESSION_LEN: usize = 4096;

/// Transforms available to expressions (`value|name(args)`).
pub const TRANSFORMS: &[&str] = &[
    "lower",
    "upper",
    "trim",
    "split",
    "join",
    "not",
    "contains",
    "startsWith",
    "endsWith",
    "length",
    "string",
    "number",
    "round",
    "keys",
];

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur during expression validation or evaluation.
#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    #[error("Expression evaluation failed: {0}")]
    EvalFailed(String),

    #[error("Expression rejected: {0}")]
    Rejected(String),

    #[error("Unknown transform '{0}'")]
    UnknownTransform(String),

    #[error("Invalid context: {0}")]
    InvalidContext(String),
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Statically check an expression before evaluation.
///
/// Rejects empty or oversized sources, statement separators, unterminated
/// string literals and any transform outside [`TRANSFORMS`].
pub fn validate_expression(expression: &str) -> Result<(), ExpressionError> {
    if expression.trim().is_empty() {
        return Err(ExpressionError::Rejected("expression is empty".to_string()));
    }
    if expression.len() > MAX_EXPRESSION_LEN {
        return Err(ExpressionError::Rejected(format!(
            "expression exceeds {MAX_EXPRESSION_LEN} characters"
        )));
    }

    let chars: Vec<char> = expression.chars().collect();
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(q) = quote {
            if c == '\\' {
                i += 2;
                continue;
            }
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '\'' | '"' => quote = Some(c),
            ';' => {
                return Err(ExpressionError::Rejected(
                    "statement separators are not allowed".to_string(),
                ));
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                // Logical or.
                i += 2;
                continue;
            }
            '|' => {
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                let start = j;
                while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                let name: String = chars[start..j].iter().collect();
                if !TRANSFORMS.contains(&name.as_str()) {
                    return Err(ExpressionError::UnknownTransform(name));
                }
                i = j;
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    if quote.is_some() {
        return Err(ExpressionError::Rejected(
            "unterminated string literal".to_string(),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// WorkflowEvaluator
// ---------------------------------------------------------------------------

/// JEXL expression evaluator with the standard transforms pre-registered.
///
/// Used for expression-mode steps, e.g. `candidates|length > 0`,
/// `placements * fee_rate`, `(score > 7) ? 'shortlist' : 'reject'`.
pub struct WorkflowEvaluator {
    evaluator: jexl_eval::Evaluator<'static>,
}

impl WorkflowEvaluator {
    /// Create a new evaluator with all standard transforms registered.
    pub fn new() -> Self {
        let evaluator = jexl_eval::Evaluator::new()
            // String transforms
            .with_transform("lower", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.to_lowercase()))
            })
            .with_transform("upper", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.to_uppercase()))
            })
            .with_transform("trim", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(s.trim()))
            })
            .with_transform("split", |args: &[Value]| {
                let s = args.first().and_then(|v| v.as_str()).unwrap_or("");
                let delimiter = args.get(1).and_then(|v| v.as_str()).unwrap_or(",");
                let parts: Vec<&str> = s.split(delimiter).collect();
                Ok(json!(parts))
            })
            .with_transform("join", |args: &[Value]| {
                let separator = args.get(1).and_then(|v| v.as_str()).unwrap_or(",");
                let joined = match args.first() {
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(display)
                        .collect::<Vec<_>>()
                        .join(separator),
                    Some(other) => display(other),
                    None => String::new(),
                };
                Ok(json!(joined))
            })
            // Boolean transforms
            .with_transform("not", |args: &[Value]| {
                let val = args.first().cloned().unwrap_or(Value::Null);
                Ok(json!(!truthy(&val)))
            })
            // String search transforms
            .with_transform("contains", |args: &[Value]| {
                let found = match (args.first(), args.get(1)) {
                    (Some(Value::Array(items)), Some(needle)) => items.contains(needle),
                    (Some(Value::String(s)), Some(Value::String(search))) => s.contains(search.as_str()),
                    _ => false,
                };
                Ok(json!(found))
            })
            .with_transform("startsWith", |args: &[Value]| {
                let subject = args.first().and_then(|v| v.as_str()).unwrap_or("");
                let prefix = args.get(1).and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(subject.starts_with(prefix)))
            })
            .with_transform("endsWith", |args: &[Value]| {
                let subject = args.first().and_then(|v| v.as_str()).unwrap_or("");
                let suffix = args.get(1).and_then(|v| v.as_str()).unwrap_or("");
                Ok(json!(subject.ends_with(suffix)))
            })
            // Length transform (works on strings, arrays, and objects)
            .with_transform("length", |args: &[Value]| {
                let len = match args.first() {
                    Some(Value::String(s)) => s.chars().count(),
                    Some(Value::Array(a)) => a.len(),
                    Some(Value::Object(o)) => o.len(),
                    _ => 0,
                };
                Ok(json!(len as f64))
            })
            // Conversions
            .with_transform("string", |args: &[Value]| {
                Ok(json!(args.first().map(display).unwrap_or_default()))
            })
            .with_transform("number", |args: &[Value]| {
                let parsed = match args.first() {
                    Some(Value::Number(n)) => n.as_f64(),
                    Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
                    Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
                    _ => None,
                };
                Ok(parsed.map_or(Value::Null, |n| json!(n)))
            })
            .with_transform("round", |args: &[Value]| {
                let n = args.first().and_then(|v| v.as_f64()).unwrap_or(0.0);
                let places = args.get(1).and_then(|v| v.as_f64()).unwrap_or(0.0) as i32;
                let factor = 10f64.powi(places);
                Ok(json!((n * factor).round() / factor))
            })
            .with_transform("keys", |args: &[Value]| {
                let keys: Vec<String> = match args.first() {
                    Some(Value::Object(map)) => map.keys().cloned().collect(),
                    _ => Vec::new(),
                };
                Ok(json!(keys))
            });

        Self { evaluator }
    }

    /// Evaluate an expression and return the raw JSON value.
    ///
    /// The `context` must be a JSON object; its keys are the variables in
    /// scope.
    pub fn evaluate_value(
        &self,
        expression: &str,
        context: &Value,
    ) -> Result<Value, ExpressionError> {
        if !context.is_object() {
            return Err(ExpressionError::InvalidContext(
                "context must be a JSON object".to_string(),
            ));
        }
        validate_expression(expression)?;

        self.evaluator
            .eval_in_context(expression, context)
            .map_err(|e| ExpressionError::EvalFailed(e.to_string()))
    }

    /// Evaluate an expression with every context key bound as a variable.
    pub fn evaluate_in_context(
        &self,
        expression: &str,
        ctx: &ContextStore,
    ) -> Result<Value, ExpressionError> {
        self.evaluate_value(expression, &ctx.to_expression_context())
    }
}

impl Default for WorkflowEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Coerce a JSON value to boolean using JavaScript-like truthiness.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().unwrap_or(0.0) != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn display(value: &Value) -> String {
    super::resolve::value_to_string(value)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
