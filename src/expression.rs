//! Adapter between user formulas and total numeric functions of `x`.
//!
//! The symbolic engine sits behind [`ExpressionCompiler`]; [`MevalCompiler`]
//! is the default backend. Whatever the backend does, [`CompiledFunction`]
//! never fails: a formula that does not compile evaluates to NaN everywhere,
//! complex results contribute their real part, and evaluation errors become
//! NaN. Non-finite values are filtered later by the preview sampler.

use std::fmt;
use std::sync::LazyLock;

use meval::shunting_yard::to_rpn;
use meval::tokenizer::{Operation, Token, tokenize};
use meval::{Context, Expr};
use num_complex::Complex64;
use regex::{Captures, Regex};

/// Name of the free variable in every formula.
pub const VARIABLE: &str = "x";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    #[error("expression `{expression}` could not be parsed: {reason}")]
    Parse { expression: String, reason: String },
    #[error("expression `{expression}` could not be evaluated: {reason}")]
    Evaluate { expression: String, reason: String },
}

/// Result of one evaluation. Backends with complex arithmetic may return
/// `Complex`; the adapter keeps only the real component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    Real(f64),
    Complex(Complex64),
}

impl Evaluation {
    #[must_use]
    pub fn real_part(self) -> f64 {
        match self {
            Self::Real(value) => value,
            Self::Complex(value) => value.re,
        }
    }
}

pub type RawEvaluator = Box<dyn Fn(f64) -> Result<Evaluation, ExpressionError>>;

/// A symbolic engine able to turn a normalized formula into an evaluator.
pub trait ExpressionCompiler {
    fn compile_raw(&self, normalized: &str) -> Result<RawEvaluator, ExpressionError>;

    /// Compiles `expression` into a total function. Never fails; parse errors
    /// are logged and produce an always-NaN function.
    fn compile(&self, expression: &str) -> CompiledFunction {
        let normalized = normalize_expression(expression);
        match self.compile_raw(&normalized) {
            Ok(evaluator) => CompiledFunction {
                source: expression.to_owned(),
                evaluator: Some(evaluator),
            },
            Err(error) => {
                log::warn!("{error}");
                CompiledFunction {
                    source: expression.to_owned(),
                    evaluator: None,
                }
            }
        }
    }
}

/// A formula compiled into `f64 -> f64`.
pub struct CompiledFunction {
    source: String,
    evaluator: Option<RawEvaluator>,
}

impl CompiledFunction {
    #[must_use]
    pub fn eval(&self, x: f64) -> f64 {
        let Some(evaluator) = &self.evaluator else {
            return f64::NAN;
        };
        match evaluator(x) {
            Ok(value) => value.real_part(),
            Err(error) => {
                log::debug!("{error}");
                f64::NAN
            }
        }
    }

    /// `false` when the formula failed to compile.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.evaluator.is_some()
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for CompiledFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledFunction")
            .field("source", &self.source)
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// `meval`-backed compiler with a few extra functions common in plotting
/// formulas (`log`, `log10`, `log2`, `sec`, `csc`, `cot`, `sign`).
///
/// Evaluation is real first. When that gives NaN for a finite `x`, the same
/// RPN is replayed over [`Complex64`], so `sqrt(-4)` yields `2i` and
/// `(-8)^(1/3)` its principal root.
#[derive(Debug, Default, Clone, Copy)]
pub struct MevalCompiler;

impl ExpressionCompiler for MevalCompiler {
    fn compile_raw(&self, normalized: &str) -> Result<RawEvaluator, ExpressionError> {
        let parse_error = |reason: String| ExpressionError::Parse {
            expression: normalized.to_owned(),
            reason,
        };

        let expr: Expr = normalized
            .parse()
            .map_err(|error: meval::Error| parse_error(error.to_string()))?;
        let bound = expr
            .bind_with_context(build_context(), VARIABLE)
            .map_err(|error| parse_error(error.to_string()))?;
        let tokens = tokenize(normalized).map_err(|error| parse_error(error.to_string()))?;
        let rpn = to_rpn(&tokens).map_err(|error| parse_error(error.to_string()))?;

        Ok(Box::new(move |x| {
            let real = bound(x);
            if !real.is_nan() || !x.is_finite() {
                return Ok(Evaluation::Real(real));
            }
            Ok(eval_complex(&rpn, x).map_or(Evaluation::Real(real), Evaluation::Complex))
        }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Complex replay
// ─────────────────────────────────────────────────────────────────────────────

/// Evaluates `rpn` over the complex numbers. `None` when a token has no
/// complex meaning here (`%` or `floor` on a non-real value, unknown names).
fn eval_complex(rpn: &[Token], x: f64) -> Option<Complex64> {
    let mut stack: Vec<Complex64> = Vec::with_capacity(16);
    for token in rpn {
        let value = match token {
            Token::Number(value) => Complex64::new(*value, 0.0),
            Token::Var(name) => Complex64::new(complex_var(name, x)?, 0.0),
            Token::Unary(op) => {
                let value = stack.pop()?;
                match op {
                    Operation::Plus => value,
                    Operation::Minus => -value,
                    _ => return None,
                }
            }
            Token::Binary(op) => {
                let right = stack.pop()?;
                let left = stack.pop()?;
                complex_binary(*op, left, right)?
            }
            Token::Func(name, Some(arity)) => {
                let start = stack.len().checked_sub(*arity)?;
                let args = stack.split_off(start);
                complex_func(name, &args)?
            }
            _ => return None,
        };
        stack.push(value);
    }
    match stack.as_slice() {
        [value] => Some(*value),
        _ => None,
    }
}

fn complex_var(name: &str, x: f64) -> Option<f64> {
    match name {
        VARIABLE => Some(x),
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        _ => None,
    }
}

fn real_only(value: Complex64) -> Option<f64> {
    (value.im == 0.0).then_some(value.re)
}

fn complex_binary(op: Operation, left: Complex64, right: Complex64) -> Option<Complex64> {
    Some(match op {
        Operation::Plus => left + right,
        Operation::Minus => left - right,
        Operation::Times => left * right,
        Operation::Div => left / right,
        Operation::Rem => Complex64::new(real_only(left)? % real_only(right)?, 0.0),
        Operation::Pow => match (real_only(left), real_only(right)) {
            (Some(base), Some(exponent)) if base >= 0.0 || exponent.fract() == 0.0 => {
                Complex64::new(base.powf(exponent), 0.0)
            }
            _ => left.powc(right),
        },
    })
}

fn complex_func(name: &str, args: &[Complex64]) -> Option<Complex64> {
    let real = |f: fn(f64) -> f64| -> Option<Complex64> {
        match args {
            [value] => Some(Complex64::new(f(real_only(*value)?), 0.0)),
            _ => None,
        }
    };
    let [z] = args else {
        return match name {
            "atan2" => match args {
                [y, x] => Some(Complex64::new(real_only(*y)?.atan2(real_only(*x)?), 0.0)),
                _ => None,
            },
            "max" | "min" => {
                let values = args.iter().map(|v| real_only(*v)).collect::<Option<Vec<_>>>()?;
                let pick = if name == "max" { f64::max } else { f64::min };
                values.into_iter().reduce(pick).map(|v| Complex64::new(v, 0.0))
            }
            _ => None,
        };
    };
    let z = *z;
    Some(match name {
        "sqrt" => z.sqrt(),
        "exp" => z.exp(),
        "ln" | "log" => z.ln(),
        "log10" => z.log10(),
        "log2" => z.log2(),
        "abs" => Complex64::new(z.norm(), 0.0),
        "sin" => z.sin(),
        "cos" => z.cos(),
        "tan" => z.tan(),
        "asin" => z.asin(),
        "acos" => z.acos(),
        "atan" => z.atan(),
        "sinh" => z.sinh(),
        "cosh" => z.cosh(),
        "tanh" => z.tanh(),
        "asinh" => z.asinh(),
        "acosh" => z.acosh(),
        "atanh" => z.atanh(),
        "sec" => z.cos().inv(),
        "csc" => z.sin().inv(),
        "cot" => z.tan().inv(),
        "floor" => return real(f64::floor),
        "ceil" => return real(f64::ceil),
        "round" => return real(f64::round),
        "signum" | "sign" | "sgn" => return real(f64::signum),
        _ => return None,
    })
}

fn build_context() -> Context<'static> {
    let mut context = Context::new();
    context.func("log", f64::ln);
    context.func("log10", f64::log10);
    context.func("log2", f64::log2);
    context.func("sign", f64::signum);
    context.func("sgn", f64::signum);
    context.func("sec", |value| 1.0 / value.cos());
    context.func("csc", |value| 1.0 / value.sin());
    context.func("cot", |value| 1.0 / value.tan());
    context
}

// A number that is not part of an identifier (`log10`), followed by a factor.
static NUMBER_FACTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^A-Za-z_\d.])(\d+(?:\.\d+)?)([eE][+-]?\d|[A-Za-z_(])")
        .expect("static regex is valid")
});
static PAREN_FACTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\)\s*([A-Za-z_(\d])").expect("static regex is valid"));

/// Rewrites the formula syntaxes users type into what the backend parses:
/// `**` becomes `^`, implicit products such as `2x` or `(x+1)(x-1)` get an
/// explicit `*`, trailing semicolons are dropped. An empty formula is `x`.
#[must_use]
pub fn normalize_expression(source: &str) -> String {
    let trimmed = source.trim().trim_end_matches(';').trim_end();
    if trimmed.is_empty() {
        return VARIABLE.to_owned();
    }

    let powered = trimmed.replace("**", "^");
    let numbered = NUMBER_FACTOR.replace_all(&powered, |caps: &Captures| {
        let factor = &caps[3];
        if factor.len() > 1 {
            // Scientific notation such as `1e-3`.
            caps[0].to_owned()
        } else {
            format!("{}{}*{}", &caps[1], &caps[2], factor)
        }
    });
    PAREN_FACTOR.replace_all(&numbered, ")*$1").into_owned()
}
