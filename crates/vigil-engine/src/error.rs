use std::time::Duration;

/// Admission-time failures from [`Engine::add_rule`](crate::Engine::add_rule).
#[derive(Debug, thiserror::Error)]
pub enum AdmitError {
    #[error("maximum number of rules exceeded ({limit})")]
    TooManyRules { limit: usize },
    #[error("a rule named {0:?} is already loaded")]
    DuplicateName(String),
    #[error("parse errors: {}", .0.join("; "))]
    Parse(Vec<String>),
    #[error("rule complexity ({nodes} nodes) exceeds limit ({limit})")]
    Complexity { nodes: usize, limit: usize },
    #[error("failed to read rule file: {0}")]
    Io(#[from] std::io::Error),
}

/// Value-shaped evaluation failures. These are logged against the owning
/// rule and never unload it; the next tick tries again.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("evaluation cancelled")]
    Cancelled,
    #[error("division by zero")]
    DivisionByZero,
    #[error("unknown operator: {operator} for {left} and {right}")]
    UnknownOperator {
        operator: String,
        left: &'static str,
        right: &'static str,
    },
    #[error("unknown prefix operator: {operator} for {operand}")]
    UnknownPrefixOperator {
        operator: String,
        operand: &'static str,
    },
    #[error("unknown metric: {category}.{metric}")]
    UnknownMetric { category: String, metric: String },
    #[error("unknown function: {0}")]
    UnknownFunction(String),
    #[error("identifier not found: {0}")]
    IdentifierNotFound(String),
    #[error("invalid dot expression: expected identifier.identifier")]
    InvalidDotExpression,
    #[error("invalid function call")]
    InvalidCall,
    #[error("metric path must be in format 'category.metric', got {0:?}")]
    BadMetricPath(String),
    #[error("wrong number of arguments for {function}: got {got}, want {want}")]
    WrongArgCount {
        function: &'static str,
        got: usize,
        want: usize,
    },
    #[error("{function} expects {expected} as argument {index}")]
    BadArgument {
        function: &'static str,
        index: usize,
        expected: &'static str,
    },
    #[error("unknown unit: {0}")]
    UnknownUnit(String),
    #[error("invalid value type for unit expression")]
    BadUnitValue,
    #[error("failed to execute {kind} action: {message}")]
    ActionFailed { kind: &'static str, message: String },
}

/// A per-evaluation budget violation. Any violation cancels the evaluation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResourceLimitError {
    #[error("memory limit exceeded: current={current} bytes, limit={limit} bytes")]
    Memory { current: u64, limit: u64 },
    #[error("CPU time limit exceeded: used={used:?}, limit={limit:?}")]
    Cpu { used: Duration, limit: Duration },
    #[error("CPU time limit exceeded (wall-clock fallback): elapsed={elapsed:?}, limit={limit:?}")]
    WallClock { elapsed: Duration, limit: Duration },
    #[error("evaluation cancelled")]
    Cancelled,
}

impl ResourceLimitError {
    /// Short resource tag used in diagnostics.
    pub fn resource(&self) -> &'static str {
        match self {
            ResourceLimitError::Memory { .. } => "memory",
            ResourceLimitError::Cpu { .. } => "cpu",
            ResourceLimitError::WallClock { .. } => "cpu_fallback",
            ResourceLimitError::Cancelled => "context",
        }
    }
}
