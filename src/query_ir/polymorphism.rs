//! Polymorphism resolution.
//!
//! A relationship read from an abstract source, towards an abstract target, or
//! through a relationship that implementing entities bind differently is
//! flattened into concrete *branches*. Each branch is one
//! `(edge type, direction, property type, concrete target)` combination; the
//! concrete sources sharing it are merged, and a source-label guard is added
//! when the branch does not apply to every possible source.
//!
//! Branches are disjoint by construction (distinct target labels or distinct
//! edge types), so they are merged with `UNION ALL`. Ordering and windowing
//! happen once, after the union, over collected rows.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    clause_builder::{
        BinaryOperator, Clause, ClauseSequence, Expr, NodePattern, OrderItem, Pattern, Projection,
        ProjectionItem, RelationshipPattern, Variable,
    },
    graph_catalog::{Cardinality, Direction, GraphSchema},
    query_ir::{
        errors::QueryIrResult, pagination::Window, plan_ctx::PlanCtx, sort, sort::SortSpec,
    },
};

/// One concrete traversal of a relationship field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolymorphicBranch {
    pub edge_type: String,
    pub direction: Direction,
    pub properties: Option<String>,
    pub target: String,
    pub target_label: String,
    /// Labels of the concrete sources this branch is restricted to; `None`
    /// when it applies to every source the bound variable can hold
    pub source_labels: Option<Vec<String>>,
}

impl PolymorphicBranch {
    /// `(source)-[edge:TYPE]->(node:Target)` in the branch's direction
    pub fn pattern(&self, source: &Variable, edge: &Variable, node: &Variable) -> Pattern {
        Pattern::node(NodePattern::new(source.clone())).related(
            RelationshipPattern {
                variable: Some(edge.clone()),
                types: vec![self.edge_type.clone()],
                direction: self.direction,
            },
            NodePattern::new(node.clone()).with_label(self.target_label.clone()),
        )
    }

    /// Label predicate restricting the source, if this branch needs one
    pub fn source_guard(&self, source: &Variable) -> Option<Expr> {
        self.source_labels.as_ref().map(|labels| {
            Expr::or(
                labels
                    .iter()
                    .map(|label| Expr::HasLabels(source.clone(), vec![label.clone()]))
                    .collect(),
            )
        })
    }
}

#[derive(Debug, Clone)]
pub struct RelationshipBranches {
    pub field: String,
    pub declared_target: String,
    pub cardinality: Cardinality,
    /// Node projections need `__resolveType`
    pub abstract_target: bool,
    /// Edge projections need `__resolveType`
    pub polymorphic_properties: bool,
    pub branches: Vec<PolymorphicBranch>,
}

impl RelationshipBranches {
    /// A single concrete branch that can be lowered inline, without a union
    pub fn is_monomorphic(&self) -> bool {
        self.branches.len() == 1 && !self.abstract_target
    }
}

/// Flatten `source_type.field` into concrete branches.
///
/// `narrowed_target` restricts the concrete targets to those that are
/// subtypes of it (a nested operation over a more specific type).
pub fn resolve_relationship_branches(
    schema: &GraphSchema,
    source_type: &str,
    field: &str,
    narrowed_target: Option<&str>,
) -> QueryIrResult<RelationshipBranches> {
    let declared = schema.relationship(source_type, field)?;
    let narrowed = match narrowed_target {
        Some(name) if name != declared.target => Some(schema.composite(name)?.name()),
        _ => None,
    };
    let sources = schema.implementations_of(source_type)?;

    type BranchKey = (String, String, Direction, Option<String>);
    let mut grouped: BTreeMap<BranchKey, Vec<String>> = BTreeMap::new();
    for source in &sources {
        let implementation = schema.resolve_relationship_implementation(&source.name, field)?;
        for target in schema.implementations_of(&implementation.target)? {
            if let Some(narrowed) = narrowed {
                if !schema.is_subtype(&target.name, narrowed) {
                    continue;
                }
            }
            grouped
                .entry((
                    target.name.clone(),
                    implementation.edge_type.clone(),
                    implementation.direction,
                    implementation.properties.clone(),
                ))
                .or_default()
                .push(source.primary_label().to_string());
        }
    }

    let mut branches = Vec::with_capacity(grouped.len());
    for ((target, edge_type, direction, properties), source_labels) in grouped {
        let target_label = schema.entity(&target)?.primary_label().to_string();
        branches.push(PolymorphicBranch {
            edge_type,
            direction,
            properties,
            target,
            target_label,
            source_labels: (source_labels.len() < sources.len()).then_some(source_labels),
        });
    }

    let property_types: BTreeSet<&Option<String>> =
        branches.iter().map(|b| &b.properties).collect();
    let polymorphic_properties = declared.is_declared_only() || property_types.len() > 1;

    log::debug!(
        "Resolved {}.{} into {} branch(es)",
        source_type,
        field,
        branches.len()
    );

    Ok(RelationshipBranches {
        field: field.to_string(),
        declared_target: declared.target.clone(),
        cardinality: declared.cardinality,
        abstract_target: schema.composite(narrowed.unwrap_or(&declared.target))?.is_abstract(),
        polymorphic_properties,
        branches,
    })
}

/// Clauses that merge per-branch rows and window them
pub(crate) struct MergedRows {
    pub clauses: Vec<Clause>,
    /// List of row values after ordering and windowing
    pub page: Variable,
    /// Number of rows before windowing, when requested
    pub total: Option<Variable>,
    /// Sort key values of the page's rows, in page order, when requested
    pub page_keys: Option<Variable>,
}

/// Extra values `merge_branch_rows` can produce besides the page
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MergeOutputs {
    pub total: bool,
    /// Only honoured when the rows carry sort keys
    pub page_keys: bool,
}

/// Run `branches` in one `CALL { ... UNION ALL ... }`, collect their rows and
/// apply the global ordering and window.
///
/// Every branch must return the row as `row` and, when `keys` is given, the
/// list of sort key values as `keys`. The final ordering sorts by those keys
/// left to right and breaks ties by the row's position in the union.
pub(crate) fn merge_branch_rows(
    ctx: &PlanCtx,
    branches: Vec<ClauseSequence>,
    row: &Variable,
    keys: Option<&Variable>,
    sort: &[SortSpec],
    window: &Window,
    outputs: MergeOutputs,
) -> MergedRows {
    let union = if branches.len() == 1 {
        ClauseSequence::from(branches.into_iter().flatten().collect::<Vec<_>>())
    } else {
        ClauseSequence::from(vec![Clause::UnionAll(branches)])
    };
    let mut clauses = vec![Clause::Call(union)];

    let collected = ctx.fresh("var");
    let element = match keys {
        Some(keys) => Expr::Map(vec![
            ("row".to_string(), row.expr()),
            ("keys".to_string(), keys.expr()),
        ]),
        None => row.expr(),
    };
    clauses.push(Clause::with(Projection::items(vec![ProjectionItem::aliased(
        Expr::function("collect", vec![element]),
        collected.clone(),
    )])));

    let total = if outputs.total {
        let total = ctx.fresh("var");
        clauses.push(Clause::with(Projection::items(vec![
            ProjectionItem::variable(collected.clone()),
            ProjectionItem::aliased(collected.expr().size(), total.clone()),
        ])));
        Some(total)
    } else {
        None
    };

    if sort.is_empty() && window.is_unbounded() {
        return MergedRows {
            clauses,
            page: collected,
            total,
            page_keys: None,
        };
    }

    let ordinal = ctx.fresh("var");
    let entry = ctx.fresh("var");
    let page = ctx.fresh("var");
    let page_keys = (outputs.page_keys && keys.is_some()).then(|| ctx.fresh("var"));

    let mut order = match keys {
        Some(_) => sort::merged_order(&entry, sort),
        None => Vec::new(),
    };
    order.push(OrderItem {
        expr: ordinal.expr(),
        descending: false,
    });
    let entry_row = match keys {
        Some(_) => entry.property("row"),
        None => entry.expr(),
    };

    let window_body = ClauseSequence::new()
        .then(Clause::import(&[collected.clone()]))
        .then(Clause::Unwind {
            expr: Expr::function(
                "range",
                vec![
                    Expr::literal(0),
                    Expr::binary(
                        collected.expr().size(),
                        BinaryOperator::Subtraction,
                        Expr::literal(1),
                    ),
                ],
            ),
            alias: ordinal.clone(),
        })
        .then(Clause::with(
            Projection::items(vec![
                ProjectionItem::aliased(collected.expr().index(ordinal.expr()), entry.clone()),
                ProjectionItem::variable(ordinal.clone()),
            ])
            .order_by(order)
            .skip(window.skip.clone())
            .limit(window.limit.clone()),
        ))
        .then(Clause::returning(
            std::iter::once(ProjectionItem::aliased(
                Expr::function("collect", vec![entry_row]),
                page.clone(),
            ))
            .chain(page_keys.iter().map(|page_keys| {
                ProjectionItem::aliased(
                    Expr::function("collect", vec![entry.property("keys")]),
                    page_keys.clone(),
                )
            }))
            .collect(),
        ));
    clauses.push(Clause::Call(window_body));

    MergedRows {
        clauses,
        page,
        total,
        page_keys,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_ir::test_support::{movies_schema, shared_edge_schema};

    #[test]
    fn test_concrete_relationship_is_monomorphic() {
        let schema = movies_schema();
        let resolved = resolve_relationship_branches(&schema, "Movie", "actors", None).unwrap();
        assert!(resolved.is_monomorphic());
        assert_eq!(resolved.branches[0].edge_type, "ACTED_IN");
        assert_eq!(resolved.branches[0].source_labels, None);
        assert!(!resolved.polymorphic_properties);
    }

    #[test]
    fn test_abstract_source_fans_out_with_guards() {
        let schema = movies_schema();
        let resolved =
            resolve_relationship_branches(&schema, "Production", "actors", None).unwrap();
        assert_eq!(resolved.branches.len(), 2);
        assert!(resolved.polymorphic_properties);
        assert!(!resolved.abstract_target);

        let acted = &resolved.branches[0];
        assert_eq!(acted.edge_type, "ACTED_IN");
        assert_eq!(acted.properties.as_deref(), Some("ActedIn"));
        assert_eq!(acted.source_labels, Some(vec!["Movie".to_string()]));

        let starred = &resolved.branches[1];
        assert_eq!(starred.edge_type, "STARRED_IN");
        assert_eq!(starred.source_labels, Some(vec!["Series".to_string()]));
    }

    #[test]
    fn test_shared_edge_type_keeps_branches_apart() {
        let schema = shared_edge_schema();
        let resolved =
            resolve_relationship_branches(&schema, "Production", "actors", None).unwrap();
        assert_eq!(resolved.branches.len(), 2);
        assert!(resolved.polymorphic_properties);
        assert!(resolved.branches.iter().all(|b| b.edge_type == "ACTED_IN"));

        let properties: Vec<Option<&str>> = resolved
            .branches
            .iter()
            .map(|b| b.properties.as_deref())
            .collect();
        assert_eq!(properties, vec![Some("ActedIn"), Some("StarredIn")]);
        assert_eq!(
            resolved.branches[0].source_labels,
            Some(vec!["Movie".to_string()])
        );
        assert_eq!(
            resolved.branches[1].source_labels,
            Some(vec!["Series".to_string()])
        );
    }

    #[test]
    fn test_abstract_target_fans_out_per_entity() {
        let schema = movies_schema();
        let resolved = resolve_relationship_branches(&schema, "Actor", "actedIn", None).unwrap();
        let targets: Vec<&str> = resolved.branches.iter().map(|b| b.target.as_str()).collect();
        assert_eq!(targets, vec!["Movie", "Series"]);
        assert!(resolved.abstract_target);
        assert!(resolved.branches.iter().all(|b| b.source_labels.is_none()));

        let narrowed =
            resolve_relationship_branches(&schema, "Actor", "actedIn", Some("Series")).unwrap();
        assert_eq!(narrowed.branches.len(), 1);
        assert!(narrowed.is_monomorphic());
    }

    #[test]
    fn test_guard_renders_label_disjunction() {
        use crate::clause_builder::ToCypher;

        let branch = PolymorphicBranch {
            edge_type: "ACTED_IN".to_string(),
            direction: Direction::Incoming,
            properties: None,
            target: "Actor".to_string(),
            target_label: "Actor".to_string(),
            source_labels: Some(vec!["Movie".to_string(), "Short".to_string()]),
        };
        let guard = branch.source_guard(&Variable::new("this")).unwrap();
        assert_eq!(guard.to_cypher(), "(this:Movie OR this:Short)");
    }
}
