//! Connection fields: a relationship read as a page of edges.
//!
//! Every connection goes through the branch union so that `totalCount` and
//! `pageInfo` are computed over the same collected rows as the page itself.
//! Each branch row is a map `{ node, properties }`; the result value is
//!
//! ```text
//! { edges: <page>, totalCount: <total>, pageInfo: { hasNextPage, hasPreviousPage } }
//! ```
//!
//! restricted to the parts that were selected. Cursors are not computed here.
//! An edge's cursor is its offset in the unwindowed ordering plus its sort key
//! values; a sorted connection reports those values for every edge of the page
//! as `pageInfo.sortValues`, and the response layer encodes them with
//! [`edge_cursors`](crate::query_ir::cursor::edge_cursors).

use crate::{
    clause_builder::{BinaryOperator, Clause, ClauseSequence, Expr, ProjectionItem},
    query_ir::{
        errors::QueryIrResult,
        field::{lower_selection, Field},
        filter::{lower_connection_filter, ConnectionFilter},
        pagination::{resolve_window, PaginationSpec, Window},
        plan_ctx::PlanCtx,
        polymorphism::{merge_branch_rows, resolve_relationship_branches, MergeOutputs},
        sort::{self, KeySource, SortSpec},
    },
};

/// What is projected for every edge of the page
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EdgeSelection {
    pub node: Option<Vec<Field>>,
    pub properties: Option<Vec<Field>>,
}

impl EdgeSelection {
    pub fn node(mut self, fields: Vec<Field>) -> Self {
        self.node = Some(fields);
        self
    }

    pub fn properties(mut self, fields: Vec<Field>) -> Self {
        self.properties = Some(fields);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionField {
    pub relationship: String,
    /// Narrows the relationship's declared target
    pub target: Option<String>,
    pub filter: Option<ConnectionFilter>,
    pub sort: Vec<SortSpec>,
    pub pagination: Option<PaginationSpec>,
    pub edges: Option<EdgeSelection>,
    pub page_info: bool,
    pub total_count: bool,
}

impl ConnectionField {
    pub fn new(relationship: impl Into<String>) -> Self {
        ConnectionField {
            relationship: relationship.into(),
            target: None,
            filter: None,
            sort: Vec::new(),
            pagination: None,
            edges: None,
            page_info: false,
            total_count: false,
        }
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn filter(mut self, filter: ConnectionFilter) -> Self {
        self.filter = Some(filter);
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

    pub fn edges(mut self, edges: EdgeSelection) -> Self {
        self.edges = Some(edges);
        self
    }

    pub fn with_page_info(mut self) -> Self {
        self.page_info = true;
        self
    }

    pub fn with_total_count(mut self) -> Self {
        self.total_count = true;
        self
    }
}

pub(crate) fn lower_connection_field(
    field: &ConnectionField,
    ctx: &PlanCtx,
) -> QueryIrResult<(Expr, Vec<Clause>)> {
    let resolved = resolve_relationship_branches(
        ctx.schema(),
        ctx.bound_type(),
        &field.relationship,
        field.target.as_deref(),
    )?;
    let target = field
        .target
        .clone()
        .unwrap_or_else(|| resolved.declared_target.clone());

    if resolved.branches.is_empty() {
        crate::debug_print!("connection {} has no concrete branch", field.relationship);
        let empty = ResultShape::new(field).render(
            Expr::List(Vec::new()),
            Some(Expr::literal(0)),
            (!field.sort.is_empty()).then(|| Expr::List(Vec::new())),
            &Window::default(),
        );
        return Ok((empty, Vec::new()));
    }

    let row = ctx.fresh("var");
    let keys = (!field.sort.is_empty()).then(|| ctx.fresh("var"));

    let mut branches = Vec::with_capacity(resolved.branches.len());
    let mut branch_keys = Vec::with_capacity(resolved.branches.len());
    for branch in &resolved.branches {
        let edge = ctx.fresh("this");
        let node = ctx.fresh("this");
        let node_ctx = ctx.descend(node.clone(), &branch.target)?;
        let edge_ctx = branch
            .properties
            .as_deref()
            .map(|properties| node_ctx.rebind(edge.clone(), properties));

        let filter = match &field.filter {
            Some(filter) => lower_connection_filter(filter, &node_ctx, edge_ctx.as_ref())?,
            None => None,
        };
        let condition = Expr::and(
            branch
                .source_guard(ctx.bound())
                .into_iter()
                .chain(filter)
                .collect(),
        );
        let mut sequence = ClauseSequence::new()
            .then(Clause::import(&[ctx.bound().clone()]))
            .then(Clause::matching(
                branch.pattern(ctx.bound(), &edge, &node),
                (!condition.is_literal_bool(true)).then_some(condition),
            ));

        let mut entries = Vec::new();
        if let Some(selection) = &field.edges {
            if let Some(fields) = &selection.node {
                let (subqueries, projection) =
                    lower_selection(&node_ctx, fields, resolved.abstract_target)?;
                sequence.extend(subqueries);
                entries.push(("node".to_string(), projection));
            }
            if let Some(fields) = &selection.properties {
                let projection = match &edge_ctx {
                    Some(edge_ctx) => {
                        let (subqueries, projection) =
                            lower_selection(edge_ctx, fields, resolved.polymorphic_properties)?;
                        sequence.extend(subqueries);
                        projection
                    }
                    None => Expr::null(),
                };
                entries.push(("properties".to_string(), projection));
            }
        }

        let mut items = vec![ProjectionItem::aliased(Expr::Map(entries), row.clone())];
        if let Some(keys) = &keys {
            let values = sort::branch_keys(
                ctx.schema(),
                &field.sort,
                &KeySource {
                    node: &node,
                    node_type: &branch.target,
                    edge: Some((&edge, branch.properties.as_deref())),
                },
            )?;
            items.push(ProjectionItem::aliased(Expr::List(values.clone()), keys.clone()));
            branch_keys.push(values);
        }
        sequence.push(Clause::returning(items));
        branches.push(sequence);
    }
    sort::check_branch_keys(&field.sort, &branch_keys, &target)?;

    let window = resolve_window(ctx, &target, &field.sort, field.pagination.as_ref())?;
    let shape = ResultShape::new(field);
    let merged = merge_branch_rows(
        ctx,
        branches,
        &row,
        keys.as_ref(),
        &field.sort,
        &window,
        MergeOutputs {
            total: shape.needs_total(),
            page_keys: shape.page_info,
        },
    );

    let value = shape.render(
        merged.page.expr(),
        merged.total.map(|total| total.expr()),
        merged.page_keys.map(|keys| keys.expr()),
        &window,
    );
    let result = ctx.fresh("var");
    let mut body = ClauseSequence::new().then(Clause::import(&[ctx.bound().clone()]));
    body.extend(merged.clauses);
    body.push(Clause::returning(vec![ProjectionItem::aliased(value, result.clone())]));

    Ok((result.expr(), vec![Clause::Call(body)]))
}

/// The selected parts of the connection value
struct ResultShape {
    edges: bool,
    total_count: bool,
    page_info: bool,
}

impl ResultShape {
    fn new(field: &ConnectionField) -> Self {
        ResultShape {
            edges: field.edges.is_some(),
            total_count: field.total_count,
            page_info: field.page_info,
        }
    }

    fn needs_total(&self) -> bool {
        self.total_count || self.page_info
    }

    fn render(
        &self,
        page: Expr,
        total: Option<Expr>,
        page_keys: Option<Expr>,
        window: &Window,
    ) -> Expr {
        let total = total.unwrap_or_else(|| Expr::literal(0));
        let mut entries = Vec::new();
        if self.edges {
            entries.push(("edges".to_string(), page.clone()));
        }
        if self.total_count {
            entries.push(("totalCount".to_string(), total.clone()));
        }
        if self.page_info {
            let seen = match &window.skip {
                Some(skip) => Expr::binary(skip.clone(), BinaryOperator::Addition, page.size()),
                None => page.size(),
            };
            let has_previous = match &window.skip {
                Some(skip) => {
                    Expr::binary(skip.clone(), BinaryOperator::GreaterThan, Expr::literal(0))
                }
                None => Expr::false_(),
            };
            let mut page_info = vec![
                (
                    "hasNextPage".to_string(),
                    Expr::binary(total, BinaryOperator::GreaterThan, seen),
                ),
                ("hasPreviousPage".to_string(), has_previous),
            ];
            if let Some(page_keys) = page_keys {
                page_info.push(("sortValues".to_string(), page_keys));
            }
            entries.push(("pageInfo".to_string(), Expr::Map(page_info)));
        }
        Expr::Map(entries)
    }
}
