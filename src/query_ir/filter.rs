//! Filter nodes and their lowering to predicates.
//!
//! Lowering is pure: a filter and a context yield one predicate expression.
//! Values are never inlined into the query text, every compared value becomes
//! a parameter.
//!
//! Relationship filters and aggregation filters read through the
//! polymorphism resolver, so one filter may expand into one subquery
//! expression per concrete branch.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{
    clause_builder::{BinaryOperator, Clause, ClauseSequence, Expr, SubqueryKind},
    graph_catalog::{GraphSchemaError, ScalarKind},
    query_ir::{
        aggregation_filter::{lower_aggregation_filter, AggregationFilter},
        errors::{QueryIrError, QueryIrResult},
        plan_ctx::PlanCtx,
        polymorphism::resolve_relationship_branches,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
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
    Matches,
    /// List attribute contains the value
    Includes,
}

impl ComparisonOperator {
    pub fn token(self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "EQ",
            ComparisonOperator::NotEqual => "NOT",
            ComparisonOperator::LessThan => "LT",
            ComparisonOperator::LessThanEqual => "LTE",
            ComparisonOperator::GreaterThan => "GT",
            ComparisonOperator::GreaterThanEqual => "GTE",
            ComparisonOperator::Contains => "CONTAINS",
            ComparisonOperator::StartsWith => "STARTS_WITH",
            ComparisonOperator::EndsWith => "ENDS_WITH",
            ComparisonOperator::In => "IN",
            ComparisonOperator::Matches => "MATCHES",
            ComparisonOperator::Includes => "INCLUDES",
        }
    }

    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            ComparisonOperator::LessThan
                | ComparisonOperator::LessThanEqual
                | ComparisonOperator::GreaterThan
                | ComparisonOperator::GreaterThanEqual
        )
    }

    pub(crate) fn apply(self, left: Expr, right: Expr) -> Expr {
        let binary = |op| Expr::binary(left.clone(), op, right.clone());
        match self {
            ComparisonOperator::Equal => binary(BinaryOperator::Equal),
            ComparisonOperator::NotEqual => Expr::not(binary(BinaryOperator::Equal)),
            ComparisonOperator::LessThan => binary(BinaryOperator::LessThan),
            ComparisonOperator::LessThanEqual => binary(BinaryOperator::LessThanEqual),
            ComparisonOperator::GreaterThan => binary(BinaryOperator::GreaterThan),
            ComparisonOperator::GreaterThanEqual => binary(BinaryOperator::GreaterThanEqual),
            ComparisonOperator::Contains => binary(BinaryOperator::Contains),
            ComparisonOperator::StartsWith => binary(BinaryOperator::StartsWith),
            ComparisonOperator::EndsWith => binary(BinaryOperator::EndsWith),
            ComparisonOperator::In => binary(BinaryOperator::In),
            ComparisonOperator::Matches => binary(BinaryOperator::RegexMatch),
            ComparisonOperator::Includes => Expr::binary(right, BinaryOperator::In, left),
        }
    }
}

impl FromStr for ComparisonOperator {
    type Err = QueryIrError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "EQ" => Ok(ComparisonOperator::Equal),
            "NOT" | "NE" => Ok(ComparisonOperator::NotEqual),
            "LT" => Ok(ComparisonOperator::LessThan),
            "LTE" => Ok(ComparisonOperator::LessThanEqual),
            "GT" => Ok(ComparisonOperator::GreaterThan),
            "GTE" => Ok(ComparisonOperator::GreaterThanEqual),
            "CONTAINS" => Ok(ComparisonOperator::Contains),
            "STARTS_WITH" => Ok(ComparisonOperator::StartsWith),
            "ENDS_WITH" => Ok(ComparisonOperator::EndsWith),
            "IN" => Ok(ComparisonOperator::In),
            "MATCHES" => Ok(ComparisonOperator::Matches),
            "INCLUDES" => Ok(ComparisonOperator::Includes),
            other => Err(QueryIrError::unsupported_operator(other, "in a comparison filter")),
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// What a comparison measures on the attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Measure {
    #[default]
    Value,
    /// `size()` of a string attribute
    Length,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonFilter {
    pub attribute: String,
    pub operator: ComparisonOperator,
    pub value: Value,
    pub measure: Measure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Some,
    None,
    All,
    Single,
}

impl FromStr for Quantifier {
    type Err = QueryIrError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "SOME" => Ok(Quantifier::Some),
            "NONE" => Ok(Quantifier::None),
            "ALL" => Ok(Quantifier::All),
            "SINGLE" => Ok(Quantifier::Single),
            other => Err(QueryIrError::unsupported_operator(other, "as a relationship quantifier")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipFilter {
    pub relationship: String,
    pub quantifier: Quantifier,
    pub filter: Option<ConnectionFilter>,
}

/// Filter on the attributes stored on an edge
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeFilter {
    /// Applies to whatever property type the branch has
    Untyped(Box<Filter>),
    /// Keyed by relationship-property type; a branch whose property type has
    /// no entry is left unconstrained
    Typed(BTreeMap<String, Filter>),
}

/// Filter over `(edge, node)` pairs of a relationship
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionFilter {
    Node(Box<Filter>),
    Edge(EdgeFilter),
    And(Vec<ConnectionFilter>),
    Or(Vec<ConnectionFilter>),
    Not(Box<ConnectionFilter>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Comparison(ComparisonFilter),
    Logical {
        operator: LogicalOperator,
        children: Vec<Filter>,
    },
    /// The node is one of the named types
    Typename(Vec<String>),
    Relationship(RelationshipFilter),
    Aggregation(AggregationFilter),
}

impl Filter {
    pub fn compare(
        attribute: impl Into<String>,
        operator: ComparisonOperator,
        value: impl Into<Value>,
    ) -> Self {
        Filter::Comparison(ComparisonFilter {
            attribute: attribute.into(),
            operator,
            value: value.into(),
            measure: Measure::Value,
        })
    }

    pub fn length(
        attribute: impl Into<String>,
        operator: ComparisonOperator,
        value: impl Into<Value>,
    ) -> Self {
        Filter::Comparison(ComparisonFilter {
            attribute: attribute.into(),
            operator,
            value: value.into(),
            measure: Measure::Length,
        })
    }

    /// Checked constructor: NOT takes exactly one child
    pub fn logical(operator: LogicalOperator, children: Vec<Filter>) -> QueryIrResult<Self> {
        if operator == LogicalOperator::Not && children.len() != 1 {
            return Err(QueryIrError::InvalidFilter(format!(
                "NOT takes exactly one child, got {}",
                children.len()
            )));
        }
        Ok(Filter::Logical { operator, children })
    }

    pub fn and(children: Vec<Filter>) -> Self {
        Filter::Logical {
            operator: LogicalOperator::And,
            children,
        }
    }

    pub fn or(children: Vec<Filter>) -> Self {
        Filter::Logical {
            operator: LogicalOperator::Or,
            children,
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: Filter) -> Self {
        Filter::Logical {
            operator: LogicalOperator::Not,
            children: vec![child],
        }
    }

    pub fn relationship(
        relationship: impl Into<String>,
        quantifier: Quantifier,
        filter: Option<ConnectionFilter>,
    ) -> Self {
        Filter::Relationship(RelationshipFilter {
            relationship: relationship.into(),
            quantifier,
            filter,
        })
    }
}

/// Lower one filter against the context's bound variable
pub fn lower_filter(filter: &Filter, ctx: &PlanCtx) -> QueryIrResult<Expr> {
    match filter {
        Filter::Comparison(comparison) => {
            let attribute = ctx.schema().attribute(ctx.bound_type(), &comparison.attribute)?;
            comparison_predicate(
                ctx,
                ctx.bound().property(comparison.attribute.clone()),
                &attribute.kind,
                comparison.operator,
                &comparison.value,
                comparison.measure,
            )
        }
        Filter::Logical { operator, children } => {
            let mut lowered = children
                .iter()
                .map(|child| lower_filter(child, ctx))
                .collect::<QueryIrResult<Vec<_>>>()?;
            match operator {
                LogicalOperator::And => Ok(Expr::and(lowered)),
                LogicalOperator::Or => Ok(Expr::or(lowered)),
                LogicalOperator::Not if lowered.len() == 1 => Ok(Expr::not(lowered.remove(0))),
                LogicalOperator::Not => Err(QueryIrError::InvalidFilter(format!(
                    "NOT takes exactly one child, got {}",
                    lowered.len()
                ))),
            }
        }
        Filter::Typename(names) => {
            let mut labels: Vec<&str> = Vec::new();
            for name in names {
                for entity in ctx.schema().implementations_of(name)? {
                    if !labels.contains(&entity.primary_label()) {
                        labels.push(entity.primary_label());
                    }
                }
            }
            Ok(Expr::or(
                labels
                    .into_iter()
                    .map(|label| Expr::HasLabels(ctx.bound().clone(), vec![label.to_string()]))
                    .collect(),
            ))
        }
        Filter::Relationship(relationship) => lower_relationship_filter(relationship, ctx),
        Filter::Aggregation(aggregation) => lower_aggregation_filter(aggregation, ctx),
    }
}

/// Conjunction of all filters of an operation, `None` when there are none
pub(crate) fn lower_filters(filters: &[Filter], ctx: &PlanCtx) -> QueryIrResult<Option<Expr>> {
    if filters.is_empty() {
        return Ok(None);
    }
    let lowered = filters
        .iter()
        .map(|filter| lower_filter(filter, ctx))
        .collect::<QueryIrResult<Vec<_>>>()?;
    let predicate = Expr::and(lowered);
    Ok((!predicate.is_literal_bool(true)).then_some(predicate))
}

/// Compare `subject` (an attribute of kind `kind`) with `value`
pub(crate) fn comparison_predicate(
    ctx: &PlanCtx,
    subject: Expr,
    kind: &ScalarKind,
    operator: ComparisonOperator,
    value: &Value,
    measure: Measure,
) -> QueryIrResult<Expr> {
    if value.is_null() {
        return match operator {
            ComparisonOperator::Equal => Ok(Expr::IsNull(Box::new(subject))),
            ComparisonOperator::NotEqual => Ok(Expr::IsNotNull(Box::new(subject))),
            other => Err(QueryIrError::InvalidFilter(format!(
                "{} cannot compare with null",
                other
            ))),
        };
    }
    let (left, right) = match measure {
        Measure::Value => (subject, ctx.param(value.clone())),
        Measure::Length => {
            if !kind.is_string() {
                return Err(QueryIrError::unsupported_operator(
                    format!("LENGTH_{}", operator),
                    format!("on a {} attribute", kind),
                ));
            }
            (subject.size(), measured_value(ctx, value))
        }
    };
    Ok(operator.apply(left, right))
}

/// Parameter for a length comparison; string values are measured too
pub(crate) fn measured_value(ctx: &PlanCtx, value: &Value) -> Expr {
    let param = ctx.param(value.clone());
    if value.is_string() {
        param.size()
    } else {
        param
    }
}

/// Lower a connection filter for one branch. `None` means the filter does
/// not constrain this branch at all.
pub(crate) fn lower_connection_filter(
    filter: &ConnectionFilter,
    node_ctx: &PlanCtx,
    edge_ctx: Option<&PlanCtx>,
) -> QueryIrResult<Option<Expr>> {
    match filter {
        ConnectionFilter::Node(filter) => lower_filter(filter, node_ctx).map(Some),
        ConnectionFilter::Edge(EdgeFilter::Untyped(filter)) => match edge_ctx {
            Some(edge_ctx) => lower_filter(filter, edge_ctx).map(Some),
            None => Ok(None),
        },
        ConnectionFilter::Edge(EdgeFilter::Typed(by_type)) => {
            for properties in by_type.keys() {
                if !node_ctx.schema().has_relationship_properties(properties) {
                    return Err(GraphSchemaError::UnknownType {
                        type_name: properties.clone(),
                    }
                    .into());
                }
            }
            let applicable = edge_ctx.and_then(|edge_ctx| {
                by_type
                    .get(edge_ctx.bound_type())
                    .map(|filter| (edge_ctx, filter))
            });
            match applicable {
                Some((edge_ctx, filter)) => lower_filter(filter, edge_ctx).map(Some),
                None => Ok(None),
            }
        }
        ConnectionFilter::And(children) | ConnectionFilter::Or(children) => {
            let mut applied = Vec::new();
            for child in children {
                if let Some(expr) = lower_connection_filter(child, node_ctx, edge_ctx)? {
                    applied.push(expr);
                }
            }
            if applied.is_empty() && !children.is_empty() {
                return Ok(None);
            }
            Ok(Some(match filter {
                ConnectionFilter::And(_) => Expr::and(applied),
                _ => Expr::or(applied),
            }))
        }
        ConnectionFilter::Not(child) => {
            Ok(lower_connection_filter(child, node_ctx, edge_ctx)?.map(Expr::not))
        }
    }
}

fn lower_relationship_filter(filter: &RelationshipFilter, ctx: &PlanCtx) -> QueryIrResult<Expr> {
    let resolved =
        resolve_relationship_branches(ctx.schema(), ctx.bound_type(), &filter.relationship, None)?;

    let mut parts = Vec::with_capacity(resolved.branches.len());
    for branch in &resolved.branches {
        let edge = ctx.fresh("this");
        let node = ctx.fresh("this");
        let node_ctx = ctx.descend(node.clone(), &branch.target)?;
        let edge_ctx = branch
            .properties
            .as_deref()
            .map(|properties| node_ctx.rebind(edge.clone(), properties));

        let predicate = match &filter.filter {
            Some(connection) => lower_connection_filter(connection, &node_ctx, edge_ctx.as_ref())?,
            None => None,
        };
        let guard = branch.source_guard(ctx.bound());
        let pattern = branch.pattern(ctx.bound(), &edge, &node);
        let body = |predicate: Option<Expr>| {
            let conditions: Vec<Expr> = guard.iter().cloned().chain(predicate).collect();
            let condition = Expr::and(conditions);
            ClauseSequence::new().then(Clause::matching(
                pattern.clone(),
                (!condition.is_literal_bool(true)).then_some(condition),
            ))
        };

        parts.push(match filter.quantifier {
            Quantifier::Some => Expr::subquery(SubqueryKind::Exists, body(predicate)),
            Quantifier::None => Expr::not(Expr::subquery(SubqueryKind::Exists, body(predicate))),
            Quantifier::All => match predicate {
                Some(predicate) => Expr::not(Expr::subquery(
                    SubqueryKind::Exists,
                    body(Some(Expr::not(predicate))),
                )),
                None => Expr::true_(),
            },
            Quantifier::Single => Expr::subquery(SubqueryKind::Count, body(predicate)),
        });
    }

    Ok(match filter.quantifier {
        Quantifier::Some => Expr::or(parts),
        Quantifier::None | Quantifier::All => Expr::and(parts),
        Quantifier::Single => match parts
            .into_iter()
            .reduce(|sum, count| Expr::binary(sum, BinaryOperator::Addition, count))
        {
            Some(total) => Expr::eq(total, Expr::literal(1)),
            None => Expr::false_(),
        },
    })
}
