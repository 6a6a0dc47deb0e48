//! Structured Cypher clause builder.
//!
//! The query IR never writes backend syntax itself. It assembles values from
//! this module (patterns, expressions, projections, scoped subqueries and
//! unions) and hands the resulting [`ClauseSequence`] to the execution layer,
//! which renders it through [`ToCypher`].
//!
//! Parameters travel inside the expression tree ([`Param`] carries its value),
//! so a sequence is self-contained: [`ClauseSequence::params`] collects them by
//! walking the tree instead of relying on a shared mutable registry.

mod to_cypher;

pub use to_cypher::{escape_identifier, ToCypher};

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::graph_catalog::Direction;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(String);

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Variable(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn expr(&self) -> Expr {
        Expr::Variable(self.clone())
    }

    pub fn property(&self, name: impl Into<String>) -> Expr {
        Expr::Property(Box::new(self.expr()), name.into())
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Contains,
    StartsWith,
    EndsWith,
    In,
    RegexMatch,
    Addition,
    Subtraction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListQuantifier {
    Any,
    All,
    None,
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubqueryKind {
    Exists,
    Count,
    Collect,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapEntry {
    /// `.name` shorthand inside a map projection
    Property(String),
    Keyed(String, Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Param(Param),
    Variable(Variable),
    Property(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Binary(Box<Expr>, BinaryOperator, Box<Expr>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    IsNull(Box<Expr>),
    IsNotNull(Box<Expr>),
    HasLabels(Variable, Vec<String>),
    /// `CASE WHEN .. THEN .. END`, null when no arm matches
    Case(Vec<(Expr, Expr)>),
    Function(String, Vec<Expr>),
    List(Vec<Expr>),
    Map(Vec<(String, Expr)>),
    MapProjection(Variable, Vec<MapEntry>),
    Quantified {
        quantifier: ListQuantifier,
        variable: Variable,
        list: Box<Expr>,
        predicate: Box<Expr>,
    },
    Subquery(SubqueryKind, Box<ClauseSequence>),
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn null() -> Self {
        Expr::Literal(Value::Null)
    }

    pub fn true_() -> Self {
        Expr::Literal(Value::Bool(true))
    }

    pub fn false_() -> Self {
        Expr::Literal(Value::Bool(false))
    }

    pub fn property(self, name: impl Into<String>) -> Self {
        Expr::Property(Box::new(self), name.into())
    }

    pub fn index(self, index: Expr) -> Self {
        Expr::Index(Box::new(self), Box::new(index))
    }

    pub fn binary(left: Expr, operator: BinaryOperator, right: Expr) -> Self {
        Expr::Binary(Box::new(left), operator, Box::new(right))
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Expr::binary(left, BinaryOperator::Equal, right)
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function(name.into(), args)
    }

    pub fn size(self) -> Self {
        Expr::function("size", vec![self])
    }

    pub fn is_literal_bool(&self, value: bool) -> bool {
        matches!(self, Expr::Literal(Value::Bool(b)) if *b == value)
    }

    /// Conjunction with the usual identities: nested ANDs are flattened,
    /// `true` operands dropped, an empty conjunction is `true`.
    pub fn and(exprs: Vec<Expr>) -> Self {
        let mut flat = Vec::with_capacity(exprs.len());
        for expr in exprs {
            match expr {
                Expr::And(inner) => flat.extend(inner),
                e if e.is_literal_bool(true) => {}
                e => flat.push(e),
            }
        }
        match flat.len() {
            0 => Expr::true_(),
            1 => flat.remove(0),
            _ => Expr::And(flat),
        }
    }

    /// Disjunction; an empty disjunction is `false`.
    pub fn or(exprs: Vec<Expr>) -> Self {
        let mut flat = Vec::with_capacity(exprs.len());
        for expr in exprs {
            match expr {
                Expr::Or(inner) => flat.extend(inner),
                e if e.is_literal_bool(false) => {}
                e => flat.push(e),
            }
        }
        match flat.len() {
            0 => Expr::false_(),
            1 => flat.remove(0),
            _ => Expr::Or(flat),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(expr: Expr) -> Self {
        match expr {
            Expr::Not(inner) => *inner,
            Expr::Literal(Value::Bool(b)) => Expr::Literal(Value::Bool(!b)),
            e => Expr::Not(Box::new(e)),
        }
    }

    pub fn subquery(kind: SubqueryKind, body: ClauseSequence) -> Self {
        Expr::Subquery(kind, Box::new(body))
    }
}

impl From<Variable> for Expr {
    fn from(variable: Variable) -> Self {
        Expr::Variable(variable)
    }
}

impl From<Param> for Expr {
    fn from(param: Param) -> Self {
        Expr::Param(param)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodePattern {
    pub variable: Option<Variable>,
    pub labels: Vec<String>,
}

impl NodePattern {
    pub fn new(variable: Variable) -> Self {
        NodePattern {
            variable: Some(variable),
            labels: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipPattern {
    pub variable: Option<Variable>,
    pub types: Vec<String>,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub start: NodePattern,
    pub hops: Vec<(RelationshipPattern, NodePattern)>,
}

impl Pattern {
    pub fn node(start: NodePattern) -> Self {
        Pattern {
            start,
            hops: Vec::new(),
        }
    }

    pub fn related(mut self, relationship: RelationshipPattern, node: NodePattern) -> Self {
        self.hops.push((relationship, node));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionItem {
    pub expr: Expr,
    pub alias: Option<Variable>,
}

impl ProjectionItem {
    pub fn aliased(expr: Expr, alias: Variable) -> Self {
        ProjectionItem {
            expr,
            alias: Some(alias),
        }
    }

    pub fn variable(variable: Variable) -> Self {
        ProjectionItem {
            expr: Expr::Variable(variable),
            alias: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Expr,
    pub descending: bool,
}

/// Body shared by WITH and RETURN
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Projection {
    pub star: bool,
    pub distinct: bool,
    pub items: Vec<ProjectionItem>,
    pub order_by: Vec<OrderItem>,
    pub skip: Option<Expr>,
    pub limit: Option<Expr>,
}

impl Projection {
    pub fn star() -> Self {
        Projection {
            star: true,
            ..Default::default()
        }
    }

    pub fn items(items: Vec<ProjectionItem>) -> Self {
        Projection {
            items,
            ..Default::default()
        }
    }

    pub fn variables(variables: &[Variable]) -> Self {
        Projection::items(variables.iter().cloned().map(ProjectionItem::variable).collect())
    }

    pub fn order_by(mut self, order_by: Vec<OrderItem>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn skip(mut self, skip: Option<Expr>) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: Option<Expr>) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Match {
        optional: bool,
        pattern: Pattern,
        predicate: Option<Expr>,
    },
    With {
        projection: Projection,
        predicate: Option<Expr>,
    },
    Unwind {
        expr: Expr,
        alias: Variable,
    },
    /// `CALL { ... }` subquery; the body imports what it needs with a leading WITH
    Call(ClauseSequence),
    /// Branches joined with `UNION ALL`; only valid as the whole body of a CALL
    UnionAll(Vec<ClauseSequence>),
    Return(Projection),
    /// Caller supplied statement text, emitted verbatim
    Raw(String),
}

impl Clause {
    pub fn matching(pattern: Pattern, predicate: Option<Expr>) -> Self {
        Clause::Match {
            optional: false,
            pattern,
            predicate,
        }
    }

    pub fn with(projection: Projection) -> Self {
        Clause::With {
            projection,
            predicate: None,
        }
    }

    /// `WITH a, b` carrying variables into a subquery
    pub fn import(variables: &[Variable]) -> Self {
        Clause::with(Projection::variables(variables))
    }

    pub fn filter(predicate: Expr) -> Self {
        Clause::With {
            projection: Projection::star(),
            predicate: Some(predicate),
        }
    }

    pub fn returning(items: Vec<ProjectionItem>) -> Self {
        Clause::Return(Projection::items(items))
    }
}

/// Ordered, renderable clause program handed to the execution layer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClauseSequence {
    clauses: Vec<Clause>,
}

impl ClauseSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    pub fn then(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// All parameters referenced anywhere in the sequence, by name
    pub fn params(&self) -> BTreeMap<String, Value> {
        let mut collector = ParamCollector::default();
        walk_sequence(self, &mut collector);
        collector.params
    }

    /// Variables introduced by match patterns and UNWIND, in emission order,
    /// including those inside nested subqueries. A label-less start node
    /// refers to an existing binding and is not counted. Used to check that
    /// sibling branches never share a derived variable.
    pub fn pattern_variables(&self) -> Vec<Variable> {
        let mut collector = PatternVariableCollector::default();
        walk_sequence(self, &mut collector);
        collector.variables
    }
}

impl From<Vec<Clause>> for ClauseSequence {
    fn from(clauses: Vec<Clause>) -> Self {
        ClauseSequence { clauses }
    }
}

impl Extend<Clause> for ClauseSequence {
    fn extend<T: IntoIterator<Item = Clause>>(&mut self, iter: T) {
        self.clauses.extend(iter);
    }
}

impl IntoIterator for ClauseSequence {
    type Item = Clause;
    type IntoIter = std::vec::IntoIter<Clause>;

    fn into_iter(self) -> Self::IntoIter {
        self.clauses.into_iter()
    }
}

/// Read-only traversal over a clause tree
pub trait Visitor {
    fn visit_clause(&mut self, _clause: &Clause) {}
    fn visit_expr(&mut self, _expr: &Expr) {}
}

pub fn walk_sequence<V: Visitor>(sequence: &ClauseSequence, visitor: &mut V) {
    for clause in &sequence.clauses {
        walk_clause(clause, visitor);
    }
}

pub fn walk_clause<V: Visitor>(clause: &Clause, visitor: &mut V) {
    visitor.visit_clause(clause);
    match clause {
        Clause::Match { predicate, .. } => {
            if let Some(predicate) = predicate {
                walk_expr(predicate, visitor);
            }
        }
        Clause::With {
            projection,
            predicate,
        } => {
            walk_projection(projection, visitor);
            if let Some(predicate) = predicate {
                walk_expr(predicate, visitor);
            }
        }
        Clause::Unwind { expr, .. } => walk_expr(expr, visitor),
        Clause::Call(body) => walk_sequence(body, visitor),
        Clause::UnionAll(branches) => {
            for branch in branches {
                walk_sequence(branch, visitor);
            }
        }
        Clause::Return(projection) => walk_projection(projection, visitor),
        Clause::Raw(_) => {}
    }
}

fn walk_projection<V: Visitor>(projection: &Projection, visitor: &mut V) {
    for item in &projection.items {
        walk_expr(&item.expr, visitor);
    }
    for order in &projection.order_by {
        walk_expr(&order.expr, visitor);
    }
    for expr in projection.skip.iter().chain(projection.limit.iter()) {
        walk_expr(expr, visitor);
    }
}

pub fn walk_expr<V: Visitor>(expr: &Expr, visitor: &mut V) {
    visitor.visit_expr(expr);
    match expr {
        Expr::Literal(_) | Expr::Param(_) | Expr::Variable(_) | Expr::HasLabels(..) => {}
        Expr::Property(inner, _)
        | Expr::Not(inner)
        | Expr::IsNull(inner)
        | Expr::IsNotNull(inner) => walk_expr(inner, visitor),
        Expr::Index(left, right) | Expr::Binary(left, _, right) => {
            walk_expr(left, visitor);
            walk_expr(right, visitor);
        }
        Expr::And(items) | Expr::Or(items) | Expr::List(items) | Expr::Function(_, items) => {
            for item in items {
                walk_expr(item, visitor);
            }
        }
        Expr::Map(entries) => {
            for (_, value) in entries {
                walk_expr(value, visitor);
            }
        }
        Expr::Case(arms) => {
            for (condition, value) in arms {
                walk_expr(condition, visitor);
                walk_expr(value, visitor);
            }
        }
        Expr::MapProjection(_, entries) => {
            for entry in entries {
                if let MapEntry::Keyed(_, value) = entry {
                    walk_expr(value, visitor);
                }
            }
        }
        Expr::Quantified {
            list, predicate, ..
        } => {
            walk_expr(list, visitor);
            walk_expr(predicate, visitor);
        }
        Expr::Subquery(_, body) => walk_sequence(body, visitor),
    }
}

#[derive(Default)]
struct ParamCollector {
    params: BTreeMap<String, Value>,
}

impl Visitor for ParamCollector {
    fn visit_expr(&mut self, expr: &Expr) {
        if let Expr::Param(param) = expr {
            self.params.insert(param.name.clone(), param.value.clone());
        }
    }
}

#[derive(Default)]
struct PatternVariableCollector {
    variables: Vec<Variable>,
}

impl Visitor for PatternVariableCollector {
    fn visit_clause(&mut self, clause: &Clause) {
        match clause {
            Clause::Match { pattern, .. } => {
                if !pattern.start.labels.is_empty() {
                    self.variables.extend(pattern.start.variable.iter().cloned());
                }
                for (relationship, node) in &pattern.hops {
                    self.variables.extend(relationship.variable.iter().cloned());
                    self.variables.extend(node.variable.iter().cloned());
                }
            }
            Clause::Unwind { alias, .. } => self.variables.push(alias.clone()),
            _ => {}
        }
    }
}
