use crate::actions::ActionRegistry;
use crate::error::EvalError;
use crate::tracker::CancelFlag;
use std::sync::Arc;
use std::time::Duration;
use vigil_common::types::{Action, ActionKind};
use vigil_dsl::{Expr, Program, Stmt};
use vigil_metrics::names::{self, MetricKind};
use vigil_metrics::MetricReader;

/// Runtime value produced by evaluating a rule expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Str(String),
    Null,
    /// Sentinel: a `when` guard held and its body completed without error.
    Triggered,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Float(_) => "FLOAT",
            Value::Boolean(_) => "BOOLEAN",
            Value::Str(_) => "STRING",
            Value::Null => "NULL",
            Value::Triggered => "RULE_TRIGGERED",
        }
    }

    fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            _ => true,
        }
    }

    /// Rendering used for action messages.
    pub fn render(&self) -> String {
        match self {
            Value::Integer(v) => v.to_string(),
            Value::Float(v) => format!("{v:.6}"),
            Value::Boolean(v) => v.to_string(),
            Value::Str(v) => v.clone(),
            Value::Null => "null".to_string(),
            Value::Triggered => "rule_triggered".to_string(),
        }
    }
}

/// Tree-walking interpreter for rule programs.
///
/// The evaluator reads metrics through the [`MetricReader`] capability and
/// requests side-effects through the action registry; it holds no reference
/// to the engine. Cancellation is checked between statements and before
/// each guard and body.
#[derive(Clone)]
pub struct Evaluator {
    metrics: Arc<dyn MetricReader>,
    actions: Arc<ActionRegistry>,
}

impl Evaluator {
    pub fn new(metrics: Arc<dyn MetricReader>, actions: Arc<ActionRegistry>) -> Self {
        Self { metrics, actions }
    }

    /// Evaluate a whole program for `rule`. Statements run in order; the
    /// first error stops evaluation.
    pub fn eval(
        &self,
        program: &Program,
        rule: &str,
        cancel: &CancelFlag,
    ) -> Result<Value, EvalError> {
        let mut result = Value::Null;
        for stmt in &program.statements {
            if cancel.is_cancelled() {
                return Err(EvalError::Cancelled);
            }
            result = self.eval_stmt(stmt, rule, cancel)?;
        }
        Ok(result)
    }

    fn eval_stmt(
        &self,
        stmt: &Stmt,
        rule: &str,
        cancel: &CancelFlag,
    ) -> Result<Value, EvalError> {
        match stmt {
            Stmt::When { condition, body } => {
                if cancel.is_cancelled() {
                    return Err(EvalError::Cancelled);
                }
                let guard = self.eval_expr(condition, rule, cancel)?;
                if !guard.is_truthy() {
                    return Ok(Value::Null);
                }

                if cancel.is_cancelled() {
                    return Err(EvalError::Cancelled);
                }
                for stmt in body {
                    if cancel.is_cancelled() {
                        return Err(EvalError::Cancelled);
                    }
                    self.eval_stmt(stmt, rule, cancel)?;
                }
                Ok(Value::Triggered)
            }
            Stmt::Expr(expr) => self.eval_expr(expr, rule, cancel),
        }
    }

    fn eval_expr(
        &self,
        expr: &Expr,
        rule: &str,
        cancel: &CancelFlag,
    ) -> Result<Value, EvalError> {
        match expr {
            Expr::IntegerLiteral(v) => Ok(Value::Integer(*v)),
            Expr::FloatLiteral(v) => Ok(Value::Float(*v)),
            Expr::StringLiteral(v) => Ok(Value::Str(v.clone())),
            Expr::Identifier(name) => Err(EvalError::IdentifierNotFound(name.clone())),
            Expr::Unit { value, unit } => self.eval_unit(value, unit, rule, cancel),
            Expr::Prefix { operator, right } => {
                let operand = self.eval_expr(right, rule, cancel)?;
                eval_prefix(operator, operand)
            }
            Expr::Infix {
                operator,
                left,
                right,
            } => self.eval_infix(operator, left, right, rule, cancel),
            Expr::Dot { left, right } => self.eval_dot(left, right),
            Expr::Call { function, args } => self.eval_call(function, args, rule, cancel),
        }
    }

    fn eval_unit(
        &self,
        value: &Expr,
        unit: &str,
        rule: &str,
        cancel: &CancelFlag,
    ) -> Result<Value, EvalError> {
        let inner = self.eval_expr(value, rule, cancel)?;
        let factor = unit_factor(unit).ok_or_else(|| EvalError::UnknownUnit(unit.to_string()))?;
        match inner {
            Value::Integer(v) => Ok(Value::Integer(v.wrapping_mul(factor as i64))),
            Value::Float(v) => Ok(Value::Float(v * factor)),
            _ => Err(EvalError::BadUnitValue),
        }
    }

    fn eval_infix(
        &self,
        operator: &str,
        left: &Expr,
        right: &Expr,
        rule: &str,
        cancel: &CancelFlag,
    ) -> Result<Value, EvalError> {
        let lhs = self.eval_expr(left, rule, cancel)?;

        // Boolean && / || short-circuit so conditions carrying actions do
        // not fire them needlessly.
        if let Value::Boolean(lv) = lhs {
            match operator {
                "&&" if !lv => return Ok(Value::Boolean(false)),
                "||" if lv => return Ok(Value::Boolean(true)),
                _ => {}
            }
        }

        let rhs = self.eval_expr(right, rule, cancel)?;
        eval_binary(operator, lhs, rhs)
    }

    fn eval_dot(&self, left: &Expr, right: &Expr) -> Result<Value, EvalError> {
        let (Expr::Identifier(category), Expr::Identifier(metric)) = (left, right) else {
            return Err(EvalError::InvalidDotExpression);
        };

        let kind = names::builtin_kind(category, metric).ok_or_else(|| {
            EvalError::UnknownMetric {
                category: category.clone(),
                metric: metric.clone(),
            }
        })?;

        let value = self
            .metrics
            .get(&format!("{category}.{metric}"))
            .unwrap_or(0.0);

        Ok(match kind {
            MetricKind::Integer => Value::Integer(value as i64),
            MetricKind::Float => Value::Float(value),
        })
    }

    fn eval_call(
        &self,
        function: &Expr,
        args: &[Expr],
        rule: &str,
        cancel: &CancelFlag,
    ) -> Result<Value, EvalError> {
        let Expr::Identifier(name) = function else {
            return Err(EvalError::InvalidCall);
        };

        match name.as_str() {
            "alert" => self.eval_action(ActionKind::Alert, "alert", args, rule, cancel),
            "log" => self.eval_action(ActionKind::Log, "log", args, rule, cancel),
            "avg" => {
                let (metric, window) = self.aggregation_args("avg", args, rule, cancel)?;
                Ok(Value::Float(self.metrics.avg(&metric, window)))
            }
            "max" => {
                let (metric, window) = self.aggregation_args("max", args, rule, cancel)?;
                Ok(Value::Float(self.metrics.max(&metric, window)))
            }
            "trend" => {
                let (metric, window) = self.aggregation_args("trend", args, rule, cancel)?;
                Ok(Value::Float(self.metrics.trend(&metric, window)))
            }
            other => Err(EvalError::UnknownFunction(other.to_string())),
        }
    }

    fn eval_action(
        &self,
        kind: ActionKind,
        function: &'static str,
        args: &[Expr],
        rule: &str,
        cancel: &CancelFlag,
    ) -> Result<Value, EvalError> {
        if args.len() != 1 {
            return Err(EvalError::WrongArgCount {
                function,
                got: args.len(),
                want: 1,
            });
        }
        let message = self.eval_expr(&args[0], rule, cancel)?.render();
        let action = Action::new(kind, message, rule);
        self.actions
            .dispatch(&action)
            .map_err(|err| EvalError::ActionFailed {
                kind: function,
                message: err.to_string(),
            })?;
        Ok(Value::Null)
    }

    /// Shared argument handling for `avg`/`max`/`trend`: a metric path
    /// string and a window that is either a bare number of seconds or a
    /// unit expression converted with millisecond factors.
    fn aggregation_args(
        &self,
        function: &'static str,
        args: &[Expr],
        rule: &str,
        cancel: &CancelFlag,
    ) -> Result<(String, Duration), EvalError> {
        if args.len() != 2 {
            return Err(EvalError::WrongArgCount {
                function,
                got: args.len(),
                want: 2,
            });
        }

        let Value::Str(path) = self.eval_expr(&args[0], rule, cancel)? else {
            return Err(EvalError::BadArgument {
                function,
                index: 1,
                expected: "a metric path string",
            });
        };

        let parts: Vec<&str> = path.split('.').collect();
        if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
            return Err(EvalError::BadMetricPath(path));
        }

        let window = match &args[1] {
            // `5m`, `500ms`: the unit expression already yields milliseconds.
            Expr::Unit { .. } => match self.eval_expr(&args[1], rule, cancel)? {
                Value::Integer(ms) if ms >= 0 => Duration::from_millis(ms as u64),
                Value::Float(ms) if ms >= 0.0 => Duration::from_millis(ms as u64),
                _ => {
                    return Err(EvalError::BadArgument {
                        function,
                        index: 2,
                        expected: "a time duration",
                    })
                }
            },
            // Bare numbers are seconds.
            _ => match self.eval_expr(&args[1], rule, cancel)? {
                Value::Integer(secs) if secs >= 0 => Duration::from_secs(secs as u64),
                Value::Float(secs) if secs >= 0.0 => Duration::from_secs_f64(secs),
                _ => {
                    return Err(EvalError::BadArgument {
                        function,
                        index: 2,
                        expected: "a time duration",
                    })
                }
            },
        };

        Ok((path, window))
    }
}

fn eval_prefix(operator: &str, operand: Value) -> Result<Value, EvalError> {
    match (operator, &operand) {
        ("!", Value::Boolean(v)) => Ok(Value::Boolean(!v)),
        ("-", Value::Integer(v)) => Ok(Value::Integer(v.wrapping_neg())),
        ("-", Value::Float(v)) => Ok(Value::Float(-v)),
        _ => Err(EvalError::UnknownPrefixOperator {
            operator: operator.to_string(),
            operand: operand.type_name(),
        }),
    }
}

fn eval_binary(operator: &str, left: Value, right: Value) -> Result<Value, EvalError> {
    match (&left, &right) {
        (Value::Integer(l), Value::Integer(r)) => eval_integer_binary(operator, *l, *r),
        (Value::Float(_), _) | (_, Value::Float(_))
            if matches!(left, Value::Integer(_) | Value::Float(_))
                && matches!(right, Value::Integer(_) | Value::Float(_)) =>
        {
            eval_float_binary(operator, as_float(&left), as_float(&right))
        }
        (Value::Boolean(l), Value::Boolean(r)) => eval_boolean_binary(operator, *l, *r),
        _ => match operator {
            "==" => Ok(Value::Boolean(left == right)),
            "!=" => Ok(Value::Boolean(left != right)),
            _ => Err(EvalError::UnknownOperator {
                operator: operator.to_string(),
                left: left.type_name(),
                right: right.type_name(),
            }),
        },
    }
}

fn eval_integer_binary(operator: &str, left: i64, right: i64) -> Result<Value, EvalError> {
    match operator {
        "+" => Ok(Value::Integer(left.wrapping_add(right))),
        "-" => Ok(Value::Integer(left.wrapping_sub(right))),
        "*" => Ok(Value::Integer(left.wrapping_mul(right))),
        "/" => {
            if right == 0 {
                Err(EvalError::DivisionByZero)
            } else {
                Ok(Value::Integer(left.wrapping_div(right)))
            }
        }
        "<" => Ok(Value::Boolean(left < right)),
        ">" => Ok(Value::Boolean(left > right)),
        "<=" => Ok(Value::Boolean(left <= right)),
        ">=" => Ok(Value::Boolean(left >= right)),
        "==" => Ok(Value::Boolean(left == right)),
        "!=" => Ok(Value::Boolean(left != right)),
        "&&" => Ok(Value::Boolean(left != 0 && right != 0)),
        "||" => Ok(Value::Boolean(left != 0 || right != 0)),
        _ => Err(EvalError::UnknownOperator {
            operator: operator.to_string(),
            left: "INTEGER",
            right: "INTEGER",
        }),
    }
}

fn eval_float_binary(operator: &str, left: f64, right: f64) -> Result<Value, EvalError> {
    match operator {
        "+" => Ok(Value::Float(left + right)),
        "-" => Ok(Value::Float(left - right)),
        "*" => Ok(Value::Float(left * right)),
        "/" => {
            if right == 0.0 {
                Err(EvalError::DivisionByZero)
            } else {
                Ok(Value::Float(left / right))
            }
        }
        "<" => Ok(Value::Boolean(left < right)),
        ">" => Ok(Value::Boolean(left > right)),
        "<=" => Ok(Value::Boolean(left <= right)),
        ">=" => Ok(Value::Boolean(left >= right)),
        "==" => Ok(Value::Boolean(left == right)),
        "!=" => Ok(Value::Boolean(left != right)),
        _ => Err(EvalError::UnknownOperator {
            operator: operator.to_string(),
            left: "FLOAT",
            right: "FLOAT",
        }),
    }
}

fn eval_boolean_binary(operator: &str, left: bool, right: bool) -> Result<Value, EvalError> {
    match operator {
        "&&" => Ok(Value::Boolean(left && right)),
        "||" => Ok(Value::Boolean(left || right)),
        "==" => Ok(Value::Boolean(left == right)),
        "!=" => Ok(Value::Boolean(left != right)),
        _ => Err(EvalError::UnknownOperator {
            operator: operator.to_string(),
            left: "BOOLEAN",
            right: "BOOLEAN",
        }),
    }
}

fn as_float(value: &Value) -> f64 {
    match value {
        Value::Integer(v) => *v as f64,
        Value::Float(v) => *v,
        _ => 0.0,
    }
}

/// Unit factors: power-of-two memory units, millisecond-based time units.
fn unit_factor(unit: &str) -> Option<f64> {
    match unit.to_uppercase().as_str() {
        "B" => Some(1.0),
        "KB" => Some(1024.0),
        "MB" => Some(1024.0 * 1024.0),
        "GB" => Some(1024.0 * 1024.0 * 1024.0),
        "MS" => Some(1.0),
        "S" => Some(1000.0),
        "M" => Some(60.0 * 1000.0),
        "H" => Some(60.0 * 60.0 * 1000.0),
        _ => None,
    }
}
