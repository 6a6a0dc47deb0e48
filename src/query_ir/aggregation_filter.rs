//! Aggregation filters over a relationship's collection.
//!
//! Three shapes, all built from subquery expressions over the related rows:
//!
//! ```text
//! COUNT               COUNT { MATCH (this)-[e]->(n) } > $p
//! aggregated (MAX)    head(COLLECT { MATCH ... RETURN max(n.attr) AS v }) > $p
//! existential         any(x IN COLLECT { MATCH ... RETURN n.attr AS v } WHERE x > $p)
//! ```
//!
//! String attributes are measured by length before aggregating. In existential
//! mode they are measured only when the comparison is not EQ: equality
//! compares the raw strings.

use serde_json::Value;
use std::str::FromStr;

use crate::{
    clause_builder::{
        BinaryOperator, Clause, ClauseSequence, Expr, ListQuantifier, ProjectionItem,
        SubqueryKind, Variable,
    },
    graph_catalog::{GraphSchemaError, ScalarKind},
    query_ir::{
        errors::{QueryIrError, QueryIrResult},
        filter::{measured_value, ComparisonOperator},
        plan_ctx::PlanCtx,
        polymorphism::resolve_relationship_branches,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationOperator {
    Average,
    Min,
    Max,
    Sum,
    Shortest,
    Longest,
}

impl AggregationOperator {
    pub fn token(self) -> &'static str {
        match self {
            AggregationOperator::Average => "AVERAGE",
            AggregationOperator::Min => "MIN",
            AggregationOperator::Max => "MAX",
            AggregationOperator::Sum => "SUM",
            AggregationOperator::Shortest => "SHORTEST",
            AggregationOperator::Longest => "LONGEST",
        }
    }

    fn function(self) -> &'static str {
        match self {
            AggregationOperator::Average => "avg",
            AggregationOperator::Min | AggregationOperator::Shortest => "min",
            AggregationOperator::Max | AggregationOperator::Longest => "max",
            AggregationOperator::Sum => "sum",
        }
    }
}

impl FromStr for AggregationOperator {
    type Err = QueryIrError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "AVERAGE" => Ok(AggregationOperator::Average),
            "MIN" => Ok(AggregationOperator::Min),
            "MAX" => Ok(AggregationOperator::Max),
            "SUM" => Ok(AggregationOperator::Sum),
            "SHORTEST" => Ok(AggregationOperator::Shortest),
            "LONGEST" => Ok(AggregationOperator::Longest),
            other => Err(QueryIrError::unsupported_operator(other, "as an aggregation")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationTarget {
    /// Number of related rows
    Count,
    /// Attribute of the related node
    Node(String),
    /// Attribute stored on the edge, optionally keyed by property type
    Edge {
        properties: Option<String>,
        attribute: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationFilter {
    pub relationship: String,
    pub target: AggregationTarget,
    /// `None` selects existential mode for attributes
    pub aggregation: Option<AggregationOperator>,
    pub comparison: ComparisonOperator,
    pub value: Value,
}

impl AggregationFilter {
    pub fn count(
        relationship: impl Into<String>,
        comparison: ComparisonOperator,
        value: impl Into<Value>,
    ) -> Self {
        AggregationFilter {
            relationship: relationship.into(),
            target: AggregationTarget::Count,
            aggregation: None,
            comparison,
            value: value.into(),
        }
    }

    pub fn node(
        relationship: impl Into<String>,
        attribute: impl Into<String>,
        aggregation: Option<AggregationOperator>,
        comparison: ComparisonOperator,
        value: impl Into<Value>,
    ) -> Self {
        AggregationFilter {
            relationship: relationship.into(),
            target: AggregationTarget::Node(attribute.into()),
            aggregation,
            comparison,
            value: value.into(),
        }
    }

    pub fn edge(
        relationship: impl Into<String>,
        properties: Option<&str>,
        attribute: impl Into<String>,
        aggregation: Option<AggregationOperator>,
        comparison: ComparisonOperator,
        value: impl Into<Value>,
    ) -> Self {
        AggregationFilter {
            relationship: relationship.into(),
            target: AggregationTarget::Edge {
                properties: properties.map(str::to_string),
                attribute: attribute.into(),
            },
            aggregation,
            comparison,
            value: value.into(),
        }
    }
}

/// One branch's contribution: the match producing related rows and the
/// value read from each row
struct BranchValues {
    matching: Clause,
    value: Expr,
    kind: Option<ScalarKind>,
}

pub(crate) fn lower_aggregation_filter(
    filter: &AggregationFilter,
    ctx: &PlanCtx,
) -> QueryIrResult<Expr> {
    let comparison = filter.comparison;
    if !(comparison == ComparisonOperator::Equal || comparison.is_ordering()) {
        return Err(QueryIrError::unsupported_operator(
            comparison.token(),
            "in an aggregation filter",
        ));
    }
    if filter.target == AggregationTarget::Count {
        if let Some(aggregation) = filter.aggregation {
            return Err(QueryIrError::unsupported_operator(
                aggregation.token(),
                "on a relationship count",
            ));
        }
    }
    if let AggregationTarget::Edge {
        properties: Some(properties),
        ..
    } = &filter.target
    {
        if !ctx.schema().has_relationship_properties(properties) {
            return Err(GraphSchemaError::UnknownType {
                type_name: properties.clone(),
            }
            .into());
        }
    }

    let schema = ctx.schema();
    let resolved =
        resolve_relationship_branches(schema, ctx.bound_type(), &filter.relationship, None)?;

    let mut branches = Vec::with_capacity(resolved.branches.len());
    for branch in &resolved.branches {
        let attribute_owner = match &filter.target {
            AggregationTarget::Count => None,
            AggregationTarget::Node(_) => Some(branch.target.as_str()),
            AggregationTarget::Edge { properties, .. } => match (&branch.properties, properties) {
                (Some(own), Some(wanted)) if own == wanted => Some(own.as_str()),
                (Some(own), None) => Some(own.as_str()),
                _ => continue,
            },
        };

        let edge = ctx.fresh("this");
        let node = ctx.fresh("this");
        let (value, kind) = match (&filter.target, attribute_owner) {
            (AggregationTarget::Node(attribute), Some(owner)) => (
                node.property(attribute.clone()),
                Some(schema.attribute(owner, attribute)?.kind.clone()),
            ),
            (AggregationTarget::Edge { attribute, .. }, Some(owner)) => (
                edge.property(attribute.clone()),
                Some(schema.attribute(owner, attribute)?.kind.clone()),
            ),
            _ => (edge.expr(), None),
        };
        branches.push(BranchValues {
            matching: Clause::matching(
                branch.pattern(ctx.bound(), &edge, &node),
                branch.source_guard(ctx.bound()),
            ),
            value,
            kind,
        });
    }

    if branches.is_empty() {
        log::debug!(
            "Aggregation filter on {}.{} applies to no branch",
            ctx.bound_type(),
            filter.relationship
        );
        return Ok(Expr::true_());
    }

    if filter.target == AggregationTarget::Count {
        let total = branches
            .into_iter()
            .map(|b| Expr::subquery(SubqueryKind::Count, ClauseSequence::new().then(b.matching)))
            .reduce(|sum, count| Expr::binary(sum, BinaryOperator::Addition, count))
            .unwrap_or_else(|| Expr::literal(0));
        return Ok(comparison.apply(total, ctx.param(filter.value.clone())));
    }

    let kind = branches
        .iter()
        .find_map(|b| b.kind.clone())
        .unwrap_or(ScalarKind::Int);
    let is_string = kind.is_string();
    let (mut body, value) = related_values(ctx, branches);
    let result = ctx.fresh("var");

    match filter.aggregation {
        Some(aggregation) => {
            let shortest_or_longest = matches!(
                aggregation,
                AggregationOperator::Shortest | AggregationOperator::Longest
            );
            let arithmetic = matches!(
                aggregation,
                AggregationOperator::Average | AggregationOperator::Sum
            );
            if (shortest_or_longest && !is_string)
                || (arithmetic && !is_string && !kind.is_numeric())
            {
                return Err(QueryIrError::unsupported_operator(
                    aggregation.token(),
                    format!("on a {} attribute", kind),
                ));
            }

            let measured = if is_string { value.size() } else { value };
            body.push(Clause::returning(vec![ProjectionItem::aliased(
                Expr::function(aggregation.function(), vec![measured]),
                result,
            )]));
            let aggregated = Expr::function(
                "head",
                vec![Expr::subquery(SubqueryKind::Collect, body)],
            );
            let right = if is_string {
                measured_value(ctx, &filter.value)
            } else {
                ctx.param(filter.value.clone())
            };
            Ok(comparison.apply(aggregated, right))
        }
        None => {
            body.push(Clause::returning(vec![ProjectionItem::aliased(value, result)]));
            let element = ctx.fresh("var");
            let (left, right) = if is_string && comparison != ComparisonOperator::Equal {
                (element.expr().size(), measured_value(ctx, &filter.value))
            } else {
                (element.expr(), ctx.param(filter.value.clone()))
            };
            Ok(Expr::Quantified {
                quantifier: ListQuantifier::Any,
                variable: element,
                list: Box::new(Expr::subquery(SubqueryKind::Collect, body)),
                predicate: Box::new(comparison.apply(left, right)),
            })
        }
    }
}

/// Clauses producing one row per related value, and the expression reading
/// that value. Several branches are unioned inside a CALL.
fn related_values(ctx: &PlanCtx, mut branches: Vec<BranchValues>) -> (ClauseSequence, Expr) {
    if branches.len() == 1 {
        let branch = branches.remove(0);
        return (ClauseSequence::new().then(branch.matching), branch.value);
    }
    let column: Variable = ctx.fresh("var");
    let union = branches
        .into_iter()
        .map(|branch| {
            ClauseSequence::new()
                .then(Clause::import(&[ctx.bound().clone()]))
                .then(branch.matching)
                .then(Clause::returning(vec![ProjectionItem::aliased(
                    branch.value,
                    column.clone(),
                )]))
        })
        .collect();
    (
        ClauseSequence::new().then(Clause::Call(ClauseSequence::from(vec![
            Clause::UnionAll(union),
        ]))),
        column.expr(),
    )
}
