use std::fmt;

/// A parsed rule program: a sequence of top-level statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    /// Inclusive node count used for complexity admission.
    pub fn count_nodes(&self) -> usize {
        1 + self.statements.iter().map(Stmt::count_nodes).sum::<usize>()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            write!(f, "{stmt}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `when <condition> { <body> }`
    When { condition: Expr, body: Vec<Stmt> },
    Expr(Expr),
}

impl Stmt {
    pub fn count_nodes(&self) -> usize {
        match self {
            // `when` counts itself, its condition subtree, and its body
            // block (the block is one node plus its statements).
            Stmt::When { condition, body } => {
                2 + condition.count_nodes() + body.iter().map(Stmt::count_nodes).sum::<usize>()
            }
            Stmt::Expr(expr) => expr.count_nodes(),
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::When { condition, body } => {
                write!(f, "when {condition} {{")?;
                for stmt in body {
                    write!(f, "{stmt}")?;
                }
                write!(f, "}}")
            }
            Stmt::Expr(expr) => write!(f, "{expr}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Identifier(String),
    IntegerLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    /// A numeric literal carrying a unit suffix, e.g. `200MB` or `5m`.
    Unit { value: Box<Expr>, unit: String },
    Prefix { operator: String, right: Box<Expr> },
    Infix {
        operator: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Metric access, e.g. `heap.alloc`.
    Dot { left: Box<Expr>, right: Box<Expr> },
    Call { function: Box<Expr>, args: Vec<Expr> },
}

impl Expr {
    pub fn count_nodes(&self) -> usize {
        match self {
            Expr::Identifier(_)
            | Expr::IntegerLiteral(_)
            | Expr::FloatLiteral(_)
            | Expr::StringLiteral(_) => 1,
            Expr::Unit { value, .. } => 1 + value.count_nodes(),
            Expr::Prefix { right, .. } => 1 + right.count_nodes(),
            Expr::Infix { left, right, .. } => 1 + left.count_nodes() + right.count_nodes(),
            Expr::Dot { left, right } => 1 + left.count_nodes() + right.count_nodes(),
            Expr::Call { function, args } => {
                1 + function.count_nodes() + args.iter().map(Expr::count_nodes).sum::<usize>()
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Identifier(name) => f.write_str(name),
            Expr::IntegerLiteral(v) => write!(f, "{v}"),
            Expr::FloatLiteral(v) => write!(f, "{v}"),
            Expr::StringLiteral(s) => f.write_str(s),
            Expr::Unit { value, unit } => write!(f, "{value}{unit}"),
            Expr::Prefix { operator, right } => write!(f, "({operator}{right})"),
            Expr::Infix {
                operator,
                left,
                right,
            } => write!(f, "({left} {operator} {right})"),
            Expr::Dot { left, right } => write!(f, "{left}.{right}"),
            Expr::Call { function, args } => {
                let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{function}({})", rendered.join(", "))
            }
        }
    }
}
