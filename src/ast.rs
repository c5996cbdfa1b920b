//! Abstract Syntax Tree definitions for Quill
//!
//! Represents the structure of programs after parsing. Function and class
//! bodies sit behind `Rc` so closures and classes can hold on to them
//! without copying the tree.

use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::token::Span;

/// A unique identifier for AST nodes (keys the resolver's binding distances)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

static NEXT_NODE_ID: AtomicUsize = AtomicUsize::new(0);

impl NodeId {
    /// Ids are unique across every parse in the process, so REPL lines
    /// parsed separately never collide in the resolution table.
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Literal values known at parse time
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    BigInt(String),
    BigFloat(String),
    String(Rc<str>),
}

/// Expression nodes
#[derive(Debug, Clone)]
pub enum Expr {
    Literal { value: Literal, span: Span },

    /// Variable reference: foo
    Variable { name: String, id: NodeId, span: Span },

    /// Assignment: x = v, x += v
    Assign {
        name: String,
        op: Option<BinaryOp>,
        value: Box<Expr>,
        id: NodeId,
        span: Span,
    },

    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
        span: Span,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },

    /// Short-circuit and/or: a && b, x || y
    Logical {
        left: Box<Expr>,
        op: LogicalOp,
        right: Box<Expr>,
        span: Span,
    },

    /// Conditional: c ? a : b
    Ternary {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        span: Span,
    },

    Grouping { expr: Box<Expr>, span: Span },

    /// Function call: foo(a, ...rest)
    Call {
        callee: Box<Expr>,
        args: Vec<Arg>,
        span: Span,
    },

    /// Property access: obj.prop
    Get {
        object: Box<Expr>,
        name: String,
        span: Span,
    },

    /// Property assignment: obj.prop = value
    Set {
        object: Box<Expr>,
        name: String,
        op: Option<BinaryOp>,
        value: Box<Expr>,
        span: Span,
    },

    /// Point access: xs[i]
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },

    /// Slice: xs[a:b], either bound optional
    Slice {
        object: Box<Expr>,
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
        span: Span,
    },

    /// Index assignment: xs[i] = v
    IndexSet {
        object: Box<Expr>,
        index: Box<Expr>,
        op: Option<BinaryOp>,
        value: Box<Expr>,
        span: Span,
    },

    This { id: NodeId, span: Span },

    /// Superclass method access: super.name
    Super { method: String, id: NodeId, span: Span },

    /// Anonymous function: fun (a) { ... } or |a| a + 1
    Lambda { decl: Rc<FunctionDecl>, span: Span },

    /// List literal: [a, ...b]
    List { items: Vec<Arg>, span: Span },

    /// Dict literal: {k: v}
    Dict { entries: Vec<(Expr, Expr)>, span: Span },

    /// Lazy range: a..b
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal { span, .. }
            | Expr::Variable { span, .. }
            | Expr::Assign { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Logical { span, .. }
            | Expr::Ternary { span, .. }
            | Expr::Grouping { span, .. }
            | Expr::Call { span, .. }
            | Expr::Get { span, .. }
            | Expr::Set { span, .. }
            | Expr::Index { span, .. }
            | Expr::Slice { span, .. }
            | Expr::IndexSet { span, .. }
            | Expr::This { span, .. }
            | Expr::Super { span, .. }
            | Expr::Lambda { span, .. }
            | Expr::List { span, .. }
            | Expr::Dict { span, .. }
            | Expr::Range { span, .. } => *span,
        }
    }
}

/// Call argument or list element, possibly spread
#[derive(Debug, Clone)]
pub enum Arg {
    Plain(Expr),
    Spread(Expr),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    In,
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::In => "in",
        };
        f.write_str(text)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,    // -
    Not,    // !
    BitNot, // ~
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// A named or anonymous function body
#[derive(Debug)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    /// Trailing `...rest` parameter collecting surplus arguments
    pub rest: Option<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

impl FunctionDecl {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// `var name = init;` inside a class body
#[derive(Debug)]
pub struct FieldDecl {
    pub name: String,
    pub initializer: Option<Expr>,
    pub span: Span,
}

#[derive(Debug)]
pub struct ClassDecl {
    pub name: String,
    pub superclass: Option<Expr>,
    pub methods: Vec<Rc<FunctionDecl>>,
    pub static_methods: Vec<Rc<FunctionDecl>>,
    /// Instance fields, evaluated fresh for every new instance
    pub fields: Vec<FieldDecl>,
    pub static_fields: Vec<FieldDecl>,
    pub span: Span,
}

/// Statement nodes
#[derive(Debug, Clone)]
pub enum Stmt {
    Expr { expr: Expr },

    Print { expr: Expr, newline: bool, span: Span },

    Var {
        name: String,
        initializer: Option<Expr>,
        span: Span,
    },

    Block { stmts: Vec<Stmt>, span: Span },

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        span: Span,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
        span: Span,
    },

    DoWhile {
        body: Box<Stmt>,
        condition: Expr,
        span: Span,
    },

    /// C-style loop; the initializer lives in a scope of its own
    For {
        initializer: Option<Box<Stmt>>,
        condition: Option<Expr>,
        increment: Option<Expr>,
        body: Box<Stmt>,
        span: Span,
    },

    Foreach {
        var: String,
        iterable: Expr,
        body: Box<Stmt>,
        span: Span,
    },

    Repeat {
        count: Expr,
        body: Box<Stmt>,
        span: Span,
    },

    Loop { body: Box<Stmt>, span: Span },

    Function { decl: Rc<FunctionDecl> },

    Class { decl: Rc<ClassDecl> },

    Enum {
        name: String,
        variants: Vec<String>,
        span: Span,
    },

    Return { value: Option<Expr>, span: Span },

    Break { span: Span },

    Continue { span: Span },

    Throw { value: Expr, span: Span },

    Try {
        body: Vec<Stmt>,
        catch_var: Option<String>,
        catch_body: Option<Vec<Stmt>>,
        finally_body: Option<Vec<Stmt>>,
        span: Span,
    },

    /// `assert expr;` keeps the expression's source text for the failure message
    Assert {
        expr: Expr,
        source: String,
        span: Span,
    },
}

/// A complete program
#[derive(Debug, Clone)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }
}
