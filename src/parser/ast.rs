//! Abstract Syntax Tree types for the template language
//!
//! The tree is rooted at a single [`Module`]. Nodes and expressions are
//! tagged unions over their syntactic role; traversal order is the document
//! order in which the parser produced them, with positional children visited
//! in increasing index order.

use serde::Serialize;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// A literal value carried by a constant expression
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl Value {
    /// The string content, if this is a string literal
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{}", s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
        }
    }
}

/// Binary operators in template expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Eq,
    NotEq,
}

/// Unary operators in template expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
}

/// An expression node
///
/// `Array` children are key/value-interleaved: even positional indices hold
/// keys, odd indices hold values. Array literals written as `[a, b]` are
/// auto-keyed `0..n` by the parser; hash literals `{k: v}` carry their keys
/// as constants in the even slots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    /// Literal constant; the value is mutable and may be rewritten after
    /// parsing (template references are replaced with registry keys)
    Constant { value: Value },
    /// Variable reference
    Name { name: String },
    /// Key/value-interleaved array or hash literal
    Array { items: Vec<Expr> },
    /// Ternary `cond ? then : otherwise`
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// Function call `name(args...)`
    FunctionCall { name: String, args: Vec<Expr> },
    /// Filter application `expr|name(args...)`
    Filter {
        expr: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    /// String concatenation `left ~ right`
    Concat { left: Box<Expr>, right: Box<Expr> },
    /// Binary operation
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary operation
    Unary { op: UnaryOp, expr: Box<Expr> },
    /// Attribute access `expr.name`
    GetAttr { expr: Box<Expr>, name: String },
}

impl Expr {
    /// Shorthand for a constant expression
    pub fn constant(value: Value) -> Self {
        Expr::Constant { value }
    }

    /// Shorthand for a string constant
    pub fn string(s: impl Into<String>) -> Self {
        Expr::Constant {
            value: Value::Str(s.into()),
        }
    }

    /// Shorthand for a name expression
    pub fn name(name: impl Into<String>) -> Self {
        Expr::Name { name: name.into() }
    }
}

/// One `if`/`elseif` arm: condition plus body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IfArm {
    pub cond: Expr,
    pub body: Vec<Node>,
}

/// A body-level node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Raw template text
    Text { content: String },
    /// Output block `{{ expr }}`
    Print { expr: Expr },
    /// Conditional `{% if %}...{% elseif %}...{% else %}...{% endif %}`
    If {
        arms: Vec<IfArm>,
        else_body: Vec<Node>,
    },
    /// Include tag `{% include expr %}`
    Include {
        expr: Expr,
        variables: Option<Expr>,
        only: bool,
        ignore_missing: bool,
    },
    /// Import tag `{% import expr as alias %}`
    Import { expr: Expr, alias: String },
    /// Named block `{% block name %}...{% endblock %}`
    Block { name: String, body: Vec<Node> },
    /// Assignment `{% set name = expr %}`
    Set { name: String, value: Expr },
    /// Embed site; the inline template lives at `index` in the enclosing
    /// module's embedded list, with the embed target as its parent
    Embed {
        index: usize,
        variables: Option<Expr>,
        only: bool,
    },
}

/// Root AST node - a complete template module
///
/// Embedded sub-templates (`{% embed %}` bodies) are full modules attached
/// to the nearest enclosing module; each carries the embed target as its
/// `parent` expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Module {
    /// Parent-template expression from `{% extends %}`, if any
    pub parent: Option<Expr>,
    /// Document body in source order
    pub body: Vec<Node>,
    /// Embedded sub-templates from `{% embed %}` blocks
    pub embedded: Vec<Module>,
}

impl Module {
    /// Create an empty module
    pub fn new() -> Self {
        Self {
            parent: None,
            body: Vec::new(),
            embedded: Vec::new(),
        }
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}
