//! Relationship fields: traverse an edge and read the nested operation over
//! the related nodes.
//!
//! A relationship with one concrete branch is lowered inline:
//!
//! ```text
//! CALL {
//!     WITH this
//!     MATCH (this)<-[this0:ACTED_IN]-(this1:Actor)
//!     WHERE <filters>
//!     WITH *
//!     ORDER BY this1.name ASC
//!     LIMIT $param0
//!     <nested field subqueries>
//!     RETURN collect(this1 { .name }) AS var2
//! }
//! ```
//!
//! Polymorphic relationships run every branch inside a union and merge the
//! rows before ordering and windowing them.

use crate::{
    clause_builder::{Clause, ClauseSequence, Expr, Projection, ProjectionItem, Variable},
    graph_catalog::Cardinality,
    query_ir::{
        errors::QueryIrResult,
        field::lower_selection,
        filter::lower_filters,
        operation::Operation,
        pagination::{resolve_window, Window},
        plan_ctx::PlanCtx,
        polymorphism::{
            merge_branch_rows, resolve_relationship_branches, MergeOutputs, RelationshipBranches,
        },
        sort::{self, KeySource},
    },
};

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipField {
    pub relationship: String,
    /// Read over the related nodes; its target may narrow the declared one
    pub operation: Operation,
}

impl RelationshipField {
    pub fn new(relationship: impl Into<String>, operation: Operation) -> Self {
        RelationshipField {
            relationship: relationship.into(),
            operation,
        }
    }
}

pub(crate) fn lower_relationship_field(
    field: &RelationshipField,
    ctx: &PlanCtx,
) -> QueryIrResult<(Expr, Vec<Clause>)> {
    let operation = &field.operation;
    let resolved = resolve_relationship_branches(
        ctx.schema(),
        ctx.bound_type(),
        &field.relationship,
        Some(&operation.target),
    )?;
    sort::node_keys_only(&operation.sort)?;

    if resolved.branches.is_empty() {
        let empty = match resolved.cardinality {
            Cardinality::List => Expr::List(Vec::new()),
            Cardinality::Single => Expr::null(),
        };
        return Ok((empty, Vec::new()));
    }

    let (body, result) = if resolved.is_monomorphic() {
        lower_inline(&resolved, operation, ctx)?
    } else {
        lower_union(&resolved, operation, ctx)?
    };
    Ok((result.expr(), vec![Clause::Call(body)]))
}

fn window_for(
    resolved: &RelationshipBranches,
    operation: &Operation,
    ctx: &PlanCtx,
) -> QueryIrResult<Window> {
    match resolved.cardinality {
        Cardinality::List => resolve_window(
            ctx,
            &operation.target,
            &operation.sort,
            operation.pagination.as_ref(),
        ),
        Cardinality::Single => Ok(Window::default()),
    }
}

fn aggregate(cardinality: Cardinality, rows: Expr, collect: bool) -> Expr {
    let rows = if collect {
        Expr::function("collect", vec![rows])
    } else {
        rows
    };
    match cardinality {
        Cardinality::List => rows,
        Cardinality::Single => Expr::function("head", vec![rows]),
    }
}

fn lower_inline(
    resolved: &RelationshipBranches,
    operation: &Operation,
    ctx: &PlanCtx,
) -> QueryIrResult<(ClauseSequence, Variable)> {
    let branch = &resolved.branches[0];
    let edge = ctx.fresh("this");
    let node = ctx.fresh("this");
    let node_ctx = ctx.descend(node.clone(), &branch.target)?;

    let conditions: Vec<Expr> = branch
        .source_guard(ctx.bound())
        .into_iter()
        .chain(lower_filters(&operation.filters, &node_ctx)?)
        .collect();
    let mut body = ClauseSequence::new()
        .then(Clause::import(&[ctx.bound().clone()]))
        .then(Clause::matching(
            branch.pattern(ctx.bound(), &edge, &node),
            (!conditions.is_empty()).then(|| Expr::and(conditions)),
        ));

    let order = sort::node_order(&node_ctx, &operation.sort)?;
    let window = window_for(resolved, operation, ctx)?;
    if !order.is_empty() || !window.is_unbounded() {
        body.push(Clause::with(
            Projection::star()
                .order_by(order)
                .skip(window.skip)
                .limit(window.limit),
        ));
    }

    let (subqueries, projection) = lower_selection(&node_ctx, &operation.fields, false)?;
    body.extend(subqueries);

    let result = ctx.fresh("var");
    body.push(Clause::returning(vec![ProjectionItem::aliased(
        aggregate(resolved.cardinality, projection, true),
        result.clone(),
    )]));
    Ok((body, result))
}

fn lower_union(
    resolved: &RelationshipBranches,
    operation: &Operation,
    ctx: &PlanCtx,
) -> QueryIrResult<(ClauseSequence, Variable)> {
    let row = ctx.fresh("var");
    let keys = (!operation.sort.is_empty()).then(|| ctx.fresh("var"));

    let mut branches = Vec::with_capacity(resolved.branches.len());
    let mut branch_keys = Vec::with_capacity(resolved.branches.len());
    for branch in &resolved.branches {
        let edge = ctx.fresh("this");
        let node = ctx.fresh("this");
        let node_ctx = ctx.descend(node.clone(), &branch.target)?;

        let conditions: Vec<Expr> = branch
            .source_guard(ctx.bound())
            .into_iter()
            .chain(lower_filters(&operation.filters, &node_ctx)?)
            .collect();
        let mut sequence = ClauseSequence::new()
            .then(Clause::import(&[ctx.bound().clone()]))
            .then(Clause::matching(
                branch.pattern(ctx.bound(), &edge, &node),
                (!conditions.is_empty()).then(|| Expr::and(conditions)),
            ));

        let (subqueries, projection) =
            lower_selection(&node_ctx, &operation.fields, resolved.abstract_target)?;
        sequence.extend(subqueries);

        let mut items = vec![ProjectionItem::aliased(projection, row.clone())];
        if let Some(keys) = &keys {
            let values = sort::branch_keys(
                ctx.schema(),
                &operation.sort,
                &KeySource {
                    node: &node,
                    node_type: &branch.target,
                    edge: None,
                },
            )?;
            items.push(ProjectionItem::aliased(Expr::List(values.clone()), keys.clone()));
            branch_keys.push(values);
        }
        sequence.push(Clause::returning(items));
        branches.push(sequence);
    }
    sort::check_branch_keys(&operation.sort, &branch_keys, &operation.target)?;

    let window = window_for(resolved, operation, ctx)?;
    let merged = merge_branch_rows(
        ctx,
        branches,
        &row,
        keys.as_ref(),
        &operation.sort,
        &window,
        MergeOutputs::default(),
    );

    let result = ctx.fresh("var");
    let mut body = ClauseSequence::new().then(Clause::import(&[ctx.bound().clone()]));
    body.extend(merged.clauses);
    body.push(Clause::returning(vec![ProjectionItem::aliased(
        aggregate(resolved.cardinality, merged.page.expr(), false),
        result.clone(),
    )]));
    Ok((body, result))
}
