//! Root operations and the public lowering entry points.
//!
//! A read over a concrete entity lowers to
//!
//! ```text
//! MATCH (this:Movie)
//! WHERE <filters>
//! WITH *
//! ORDER BY this.title ASC
//! LIMIT $param0
//! <field subqueries>
//! RETURN this { .title } AS this
//! ```
//!
//! A read over an interface or union runs one branch per implementing entity,
//! merges the rows and unwinds the resulting page back into `this`.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{
    clause_builder::{
        Clause, ClauseSequence, Expr, NodePattern, Pattern, Projection, ProjectionItem, ToCypher,
        Variable,
    },
    config::TranslatorConfig,
    graph_catalog::GraphSchema,
    query_ir::{
        errors::QueryIrResult,
        field::{lower_selection, Field},
        filter::{lower_filters, Filter},
        pagination::{resolve_window, PaginationSpec},
        plan_ctx::{PlanCtx, ROOT_VARIABLE},
        polymorphism::{merge_branch_rows, MergeOutputs},
        sort::{self, KeySource, SortSpec},
    },
};

/// A typed read: which nodes, which of them, what to project and in which
/// window. Used for root queries and nested relationship reads.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub target: String,
    /// Combined with AND
    pub filters: Vec<Filter>,
    pub fields: Vec<Field>,
    pub sort: Vec<SortSpec>,
    pub pagination: Option<PaginationSpec>,
}

impl Operation {
    pub fn new(target: impl Into<String>) -> Self {
        Operation {
            target: target.into(),
            filters: Vec::new(),
            fields: Vec::new(),
            sort: Vec::new(),
            pagination: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn sort(mut self, spec: SortSpec) -> Self {
        self.sort.push(spec);
        self
    }

    pub fn paginate(mut self, pagination: PaginationSpec) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

/// Rendered query text with its parameters, ready for a Cypher driver
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CypherQuery {
    pub cypher: String,
    pub params: BTreeMap<String, Value>,
}

/// Lower a root operation to a clause sequence
pub fn lower(
    operation: &Operation,
    schema: &GraphSchema,
    config: &TranslatorConfig,
) -> QueryIrResult<ClauseSequence> {
    let target = schema.composite(&operation.target)?;
    let ctx = PlanCtx::root(schema, config, target.name());
    if target.is_abstract() {
        lower_abstract_root(operation, &ctx)
    } else {
        lower_concrete_root(operation, &ctx)
    }
}

/// Lower and render a root operation
pub fn translate(
    operation: &Operation,
    schema: &GraphSchema,
    config: &TranslatorConfig,
) -> QueryIrResult<CypherQuery> {
    let sequence = lower(operation, schema, config)?;
    let mut cypher = sequence.to_cypher();
    if config.cypher_version_prefix {
        cypher = format!("CYPHER 5\n{}", cypher);
    }
    let params = sequence.params();
    log::debug!(
        "Translated {} read into {} clause(s) with {} parameter(s)",
        operation.target,
        sequence.len(),
        params.len()
    );
    crate::debug_print!("{}", cypher);
    Ok(CypherQuery { cypher, params })
}

fn lower_concrete_root(operation: &Operation, ctx: &PlanCtx) -> QueryIrResult<ClauseSequence> {
    let entity = ctx.schema().entity(ctx.bound_type())?;
    let mut sequence = ClauseSequence::new().then(Clause::matching(
        Pattern::node(NodePattern::new(ctx.bound().clone()).with_label(entity.primary_label())),
        lower_filters(&operation.filters, ctx)?,
    ));

    let order = sort::node_order(ctx, &operation.sort)?;
    let window = resolve_window(
        ctx,
        &operation.target,
        &operation.sort,
        operation.pagination.as_ref(),
    )?;
    if !order.is_empty() || !window.is_unbounded() {
        sequence.push(Clause::with(
            Projection::star()
                .order_by(order)
                .skip(window.skip)
                .limit(window.limit),
        ));
    }

    let (subqueries, projection) = lower_selection(ctx, &operation.fields, false)?;
    sequence.extend(subqueries);
    sequence.push(Clause::returning(vec![ProjectionItem::aliased(
        projection,
        ctx.bound().clone(),
    )]));
    Ok(sequence)
}

fn lower_abstract_root(operation: &Operation, ctx: &PlanCtx) -> QueryIrResult<ClauseSequence> {
    sort::node_keys_only(&operation.sort)?;
    let implementations = ctx.schema().implementations_of(ctx.bound_type())?;
    let root = Variable::new(ROOT_VARIABLE);

    if implementations.is_empty() {
        log::debug!("{} has no implementing entity", operation.target);
        return Ok(ClauseSequence::new()
            .then(Clause::Unwind {
                expr: Expr::List(Vec::new()),
                alias: root.clone(),
            })
            .then(Clause::returning(vec![ProjectionItem::variable(root)])));
    }

    let row = ctx.fresh("var");
    let keys = (!operation.sort.is_empty()).then(|| ctx.fresh("var"));

    let mut branches = Vec::with_capacity(implementations.len());
    let mut branch_keys = Vec::with_capacity(implementations.len());
    for entity in implementations {
        let node = ctx.fresh(ROOT_VARIABLE);
        let node_ctx = ctx.rebind(node.clone(), &entity.name);
        let mut sequence = ClauseSequence::new().then(Clause::matching(
            Pattern::node(NodePattern::new(node.clone()).with_label(entity.primary_label())),
            lower_filters(&operation.filters, &node_ctx)?,
        ));

        let (subqueries, projection) = lower_selection(&node_ctx, &operation.fields, true)?;
        sequence.extend(subqueries);

        let mut items = vec![ProjectionItem::aliased(projection, row.clone())];
        if let Some(keys) = &keys {
            let values = sort::branch_keys(
                ctx.schema(),
                &operation.sort,
                &KeySource {
                    node: &node,
                    node_type: &entity.name,
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

    let window = resolve_window(
        ctx,
        &operation.target,
        &operation.sort,
        operation.pagination.as_ref(),
    )?;
    let merged = merge_branch_rows(
        ctx,
        branches,
        &row,
        keys.as_ref(),
        &operation.sort,
        &window,
        MergeOutputs::default(),
    );

    let mut sequence = ClauseSequence::from(merged.clauses);
    sequence.push(Clause::Unwind {
        expr: merged.page.expr(),
        alias: root.clone(),
    });
    sequence.push(Clause::returning(vec![ProjectionItem::variable(root)]));
    Ok(sequence)
}
