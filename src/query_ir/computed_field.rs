//! Computed fields backed by a caller-supplied statement.
//!
//! The statement runs in a nested subquery where the current node is bound as
//! `this`, whatever its variable in the outer query:
//!
//! ```text
//! CALL {
//!     WITH this1
//!     CALL {
//!         WITH this1
//!         WITH this1 AS this
//!         <statement returning `column`>
//!     }
//!     WITH column AS this2
//!     RETURN head(collect(this2)) AS var3
//! }
//! ```
//!
//! Entity results over an interface or union are projected with one
//! `CASE WHEN row:Label THEN ...` arm per implementing entity.

use crate::{
    clause_builder::{
        Clause, ClauseSequence, Expr, MapEntry, Projection, ProjectionItem, Variable,
    },
    graph_catalog::{Cardinality, EntitySchema},
    query_ir::{
        errors::{QueryIrError, QueryIrResult},
        field::lower_selection,
        filter::lower_filters,
        operation::Operation,
        pagination::{resolve_window, Window},
        plan_ctx::{PlanCtx, ROOT_VARIABLE},
        sort,
    },
};

/// Shape of the rows a computation returns
#[derive(Debug, Clone, PartialEq)]
pub enum ComputedResult {
    Scalar,
    /// Map rows re-projected through `(alias, source key)` pairs
    Object(Vec<(String, String)>),
    /// Graph nodes, read through a nested operation
    Entity(Box<Operation>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Computation {
    pub statement: String,
    /// Column of the statement's RETURN holding the result
    pub column: String,
    pub cardinality: Cardinality,
    pub result: ComputedResult,
}

impl Computation {
    pub fn scalar(
        statement: impl Into<String>,
        column: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Computation {
            statement: statement.into(),
            column: column.into(),
            cardinality,
            result: ComputedResult::Scalar,
        }
    }

    pub fn object(
        statement: impl Into<String>,
        column: impl Into<String>,
        cardinality: Cardinality,
        columns: Vec<(String, String)>,
    ) -> Self {
        Computation {
            result: ComputedResult::Object(columns),
            ..Computation::scalar(statement, column, cardinality)
        }
    }

    pub fn entity(
        statement: impl Into<String>,
        column: impl Into<String>,
        cardinality: Cardinality,
        operation: Operation,
    ) -> Self {
        Computation {
            result: ComputedResult::Entity(Box::new(operation)),
            ..Computation::scalar(statement, column, cardinality)
        }
    }
}

pub(crate) fn lower_computed_field(
    alias: &str,
    computation: Option<&Computation>,
    ctx: &PlanCtx,
) -> QueryIrResult<(Expr, Vec<Clause>)> {
    let computation = computation.ok_or_else(|| QueryIrError::MissingComputation {
        field: format!("{}.{}", ctx.bound_type(), alias),
    })?;
    let bound = ctx.bound().clone();

    let mut statement = ClauseSequence::new().then(Clause::import(&[bound.clone()]));
    if bound.name() != ROOT_VARIABLE {
        statement.push(Clause::with(Projection::items(vec![ProjectionItem::aliased(
            bound.expr(),
            Variable::new(ROOT_VARIABLE),
        )])));
    }
    statement.push(Clause::Raw(computation.statement.clone()));

    let row = ctx.fresh("this");
    let mut body = ClauseSequence::new()
        .then(Clause::import(&[bound]))
        .then(Clause::Call(statement))
        .then(Clause::with(Projection::items(vec![ProjectionItem::aliased(
            Variable::new(computation.column.clone()).expr(),
            row.clone(),
        )])));

    let projection = match &computation.result {
        ComputedResult::Scalar => row.expr(),
        ComputedResult::Object(columns) if columns.is_empty() => row.expr(),
        ComputedResult::Object(columns) => Expr::MapProjection(
            row.clone(),
            columns
                .iter()
                .map(|(alias, source)| {
                    if alias == source {
                        MapEntry::Property(source.clone())
                    } else {
                        MapEntry::Keyed(alias.clone(), row.property(source.clone()))
                    }
                })
                .collect(),
        ),
        ComputedResult::Entity(operation) => {
            lower_entity_rows(operation, computation.cardinality, &row, &mut body, ctx)?
        }
    };

    let collected = Expr::function("collect", vec![projection]);
    let value = match computation.cardinality {
        Cardinality::List => collected,
        Cardinality::Single => Expr::function("head", vec![collected]),
    };
    let result = ctx.fresh("var");
    body.push(Clause::returning(vec![ProjectionItem::aliased(value, result.clone())]));

    Ok((result.expr(), vec![Clause::Call(body)]))
}

/// Filter, window and project the returned nodes through a nested operation.
/// Over an interface or union only nodes of an implementing entity are kept,
/// and each is projected by the entity its label names.
fn lower_entity_rows(
    operation: &Operation,
    cardinality: Cardinality,
    row: &Variable,
    body: &mut ClauseSequence,
    ctx: &PlanCtx,
) -> QueryIrResult<Expr> {
    let target = ctx.schema().composite(&operation.target)?;
    let row_ctx = ctx.descend(row.clone(), target.name())?;
    let implementations = if target.is_abstract() {
        Some(ctx.schema().implementations_of(target.name())?)
    } else {
        None
    };
    let has_label = |entity: &EntitySchema| {
        Expr::HasLabels(row.clone(), vec![entity.primary_label().to_string()])
    };

    let mut conditions = Vec::new();
    if let Some(implementations) = &implementations {
        conditions.push(Expr::or(
            implementations.iter().map(|entity| has_label(*entity)).collect(),
        ));
    }
    conditions.extend(lower_filters(&operation.filters, &row_ctx)?);
    if !conditions.is_empty() {
        body.push(Clause::filter(Expr::and(conditions)));
    }

    let order = sort::node_order(&row_ctx, &operation.sort)?;
    let window = match cardinality {
        Cardinality::List => resolve_window(
            ctx,
            &operation.target,
            &operation.sort,
            operation.pagination.as_ref(),
        )?,
        Cardinality::Single => Window::default(),
    };
    if !order.is_empty() || !window.is_unbounded() {
        body.push(Clause::with(
            Projection::star()
                .order_by(order)
                .skip(window.skip)
                .limit(window.limit),
        ));
    }

    let Some(implementations) = implementations else {
        let (subqueries, projection) = lower_selection(&row_ctx, &operation.fields, false)?;
        body.extend(subqueries);
        return Ok(projection);
    };
    let mut arms = Vec::with_capacity(implementations.len());
    for entity in implementations {
        let entity_ctx = row_ctx.rebind(row.clone(), &entity.name);
        let (subqueries, projection) = lower_selection(&entity_ctx, &operation.fields, true)?;
        body.extend(subqueries);
        arms.push((has_label(entity), projection));
    }
    Ok(Expr::Case(arms))
}
