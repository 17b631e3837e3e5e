//! AST produced by [`crate::parse`].
//!
//! Types are kept close to surface syntax — unit resolution, symbol
//! resolution, and shape classification are all later phases (C3/C4/C7),
//! not this one. `PhysicalType` in particular is just the token text; only
//! `nestml-units` knows what `"mV"` or `"1/ms"` actually means.

use nestml_core::SourceRange;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub package: String,
    pub artifact: String,
    pub models: Vec<Model>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Model {
    Neuron(Neuron),
    Synapse(Synapse),
}

impl Model {
    pub fn name(&self) -> &str {
        match self {
            Model::Neuron(n) => &n.name,
            Model::Synapse(s) => &s.name,
        }
    }

    pub fn range(&self) -> SourceRange {
        match self {
            Model::Neuron(n) => n.range,
            Model::Synapse(s) => s.range,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neuron {
    pub name: String,
    pub docstring: Option<String>,
    pub blocks: Vec<Block>,
    pub range: SourceRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synapse {
    pub name: String,
    pub docstring: Option<String>,
    pub blocks: Vec<Block>,
    pub range: SourceRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Block {
    State(Vec<Declaration>),
    Parameters(Vec<Declaration>),
    Internals(Vec<Declaration>),
    InitialValues(Vec<Declaration>),
    Equations(Vec<EquationsEntry>),
    Input(Vec<InputPort>),
    Output(OutputPort),
    Update(Vec<Statement>),
    Function(FunctionDecl),
    PreSpike(Vec<Statement>),
    PostSpike(Vec<Statement>),
}

impl Block {
    /// Short machine name used in CoCo diagnostics (e.g. "at most one
    /// `output` block").
    pub fn kind_name(&self) -> &'static str {
        match self {
            Block::State(_) => "state",
            Block::Parameters(_) => "parameters",
            Block::Internals(_) => "internals",
            Block::InitialValues(_) => "initial_values",
            Block::Equations(_) => "equations",
            Block::Input(_) => "input",
            Block::Output(_) => "output",
            Block::Update(_) => "update",
            Block::Function(_) => "function",
            Block::PreSpike(_) => "pre_spike",
            Block::PostSpike(_) => "post_spike",
        }
    }
}

/// A type as written in source: a bare unit expression (`"mV"`, `"1/ms"`,
/// `"nS/ms"`), a numeric/boolean/string primitive, or `void` (function
/// return type only). Resolved into an algebraic unit by `nestml-units`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PhysicalType {
    Unit(String),
    Integer,
    Real,
    Boolean,
    String,
    Void,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    /// `Some(expr)` for `x[10] real = 0`; the size expression is checked by
    /// a CoCo to be a positive integer literal or parameter reference.
    pub array_size: Option<Expr>,
    pub type_name: PhysicalType,
    pub initializer: Option<Expr>,
    pub recordable: bool,
    pub is_function: bool,
    pub docstring: Option<String>,
    pub range: SourceRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EquationsEntry {
    /// An ODE in the `equations` block, e.g. `V_m' = ( -V_m + I ) / tau`.
    /// `order` is the number of trailing primes on the LHS identifier.
    Ode {
        target: String,
        order: u8,
        rhs: Expr,
        range: SourceRange,
    },
    Shape(Shape),
}

/// A `shape` entry. `order == 0` means a direct (closed-form) shape; `order
/// >= 1` means an ODE-defined shape of that order. Both are carried
/// uniformly so C7/C8 can treat them as the same IR shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub name: String,
    pub order: u8,
    pub rhs: Expr,
    pub range: SourceRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortQualifier {
    Inhibitory,
    Excitatory,
    Current,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPort {
    pub name: String,
    pub type_name: Option<PhysicalType>,
    /// `None` for a bare `<- spike` port; C5 infers `Excitatory` as the
    /// documented default.
    pub qualifier: Option<PortQualifier>,
    pub is_spike: bool,
    pub range: SourceRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputPort {
    Spike,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub parameters: Vec<(String, PhysicalType)>,
    pub return_type: PhysicalType,
    pub body: Vec<Statement>,
    pub docstring: Option<String>,
    pub range: SourceRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Assignment {
        lhs: Expr,
        rhs: Expr,
        range: SourceRange,
    },
    If(IfStatement),
    For(ForStatement),
    While {
        condition: Expr,
        body: Vec<Statement>,
        range: SourceRange,
    },
    Return(Option<Expr>),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStatement {
    pub condition: Expr,
    pub then_branch: Vec<Statement>,
    /// `(elif condition, body)` pairs, in source order.
    pub elif_branches: Vec<(Expr, Vec<Statement>)>,
    pub else_branch: Option<Vec<Statement>>,
    pub range: SourceRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStatement {
    pub variable: String,
    pub start: Expr,
    pub end: Expr,
    pub step: Option<Expr>,
    pub body: Vec<Statement>,
    pub range: SourceRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    BoolLiteral(bool),
    /// A bare identifier, possibly followed by a unit literal in source
    /// (`10 mV`) — unit-suffixed numeric literals are folded into a `Call`
    /// to a synthetic `"__unit_literal"` function by the parser, resolved
    /// by `nestml-units`.
    Variable(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        range: SourceRange,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        range: SourceRange,
    },
    Power {
        base: Box<Expr>,
        exponent: Box<Expr>,
        range: SourceRange,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        range: SourceRange,
    },
    /// `convolve(shape_name, port_name)`.
    Convolve {
        shape: String,
        port: String,
        range: SourceRange,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
        range: SourceRange,
    },
}
