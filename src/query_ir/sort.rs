//! Sort keys. A single binding orders with `ORDER BY`; merged branch rows
//! carry their key values in a list and are ordered by list slot.

use std::str::FromStr;

use crate::{
    clause_builder::{Expr, OrderItem, Variable},
    graph_catalog::{GraphSchema, GraphSchemaError},
    query_ir::{
        errors::{QueryIrError, QueryIrResult},
        plan_ctx::PlanCtx,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = QueryIrError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            other => Err(QueryIrError::unsupported_operator(other, "as a sort direction")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    /// Attribute of the target node
    Node(String),
    /// Attribute stored on the edge, optionally qualified by the
    /// relationship-property type it belongs to
    Edge {
        properties: Option<String>,
        attribute: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn node(attribute: impl Into<String>, direction: SortDirection) -> Self {
        SortSpec {
            key: SortKey::Node(attribute.into()),
            direction,
        }
    }

    pub fn edge(
        properties: Option<&str>,
        attribute: impl Into<String>,
        direction: SortDirection,
    ) -> Self {
        SortSpec {
            key: SortKey::Edge {
                properties: properties.map(str::to_string),
                attribute: attribute.into(),
            },
            direction,
        }
    }

    fn descending(&self) -> bool {
        self.direction == SortDirection::Desc
    }
}

/// Edge keys only make sense where an edge is bound, i.e. in connections
pub(crate) fn node_keys_only(sort: &[SortSpec]) -> QueryIrResult<()> {
    match sort.iter().find_map(|spec| match &spec.key {
        SortKey::Edge { attribute, .. } => Some(attribute),
        SortKey::Node(_) => None,
    }) {
        Some(attribute) => Err(QueryIrError::unsupported_operator(
            format!("edge sort on `{}`", attribute),
            "outside a connection",
        )),
        None => Ok(()),
    }
}

/// ORDER BY items over a single concrete node binding
pub(crate) fn node_order(ctx: &PlanCtx, sort: &[SortSpec]) -> QueryIrResult<Vec<OrderItem>> {
    node_keys_only(sort)?;
    let mut order = Vec::with_capacity(sort.len());
    for spec in sort {
        if let SortKey::Node(attribute) = &spec.key {
            ctx.schema().attribute(ctx.bound_type(), attribute)?;
            order.push(OrderItem {
                expr: ctx.bound().property(attribute.clone()),
                descending: spec.descending(),
            });
        }
    }
    Ok(order)
}

/// Where a branch row can read its key values from
pub(crate) struct KeySource<'a> {
    pub node: &'a Variable,
    pub node_type: &'a str,
    pub edge: Option<(&'a Variable, Option<&'a str>)>,
}

/// The key values one branch contributes to the merged ordering. A key that
/// does not apply to the branch contributes `null`.
pub(crate) fn branch_keys(
    schema: &GraphSchema,
    sort: &[SortSpec],
    source: &KeySource,
) -> QueryIrResult<Vec<Expr>> {
    let mut keys = Vec::with_capacity(sort.len());
    for spec in sort {
        let key = match &spec.key {
            SortKey::Node(attribute) => schema
                .attribute(source.node_type, attribute)
                .ok()
                .map(|_| source.node.property(attribute.clone())),
            SortKey::Edge {
                properties: Some(properties),
                attribute,
            } => {
                if !schema.has_relationship_properties(properties) {
                    return Err(GraphSchemaError::UnknownType {
                        type_name: properties.clone(),
                    }
                    .into());
                }
                schema.attribute(properties, attribute)?;
                match source.edge {
                    Some((edge, Some(edge_properties)))
                        if edge_properties == properties.as_str() =>
                    {
                        Some(edge.property(attribute.clone()))
                    }
                    _ => None,
                }
            }
            SortKey::Edge {
                properties: None,
                attribute,
            } => match source.edge {
                Some((edge, Some(edge_properties))) => schema
                    .attribute(edge_properties, attribute)
                    .ok()
                    .map(|_| edge.property(attribute.clone())),
                _ => None,
            },
        };
        keys.push(key.unwrap_or_else(Expr::null));
    }
    Ok(keys)
}

/// Reject sort keys that no branch can provide. Keys qualified by a
/// relationship-property type are checked against that type instead and may
/// legitimately apply to none of the branches.
pub(crate) fn check_branch_keys(
    sort: &[SortSpec],
    per_branch: &[Vec<Expr>],
    type_name: &str,
) -> QueryIrResult<()> {
    if per_branch.is_empty() {
        return Ok(());
    }
    for (position, spec) in sort.iter().enumerate() {
        if let SortKey::Edge {
            properties: Some(_),
            ..
        } = spec.key
        {
            continue;
        }
        let applies = per_branch
            .iter()
            .any(|keys| keys.get(position).is_some_and(|key| *key != Expr::null()));
        if !applies {
            let attribute = match &spec.key {
                SortKey::Node(attribute) | SortKey::Edge { attribute, .. } => attribute.clone(),
            };
            return Err(GraphSchemaError::UnknownAttribute {
                type_name: type_name.to_string(),
                attribute,
            }
            .into());
        }
    }
    Ok(())
}

/// ORDER BY over collected `{row, keys}` entries
pub(crate) fn merged_order(entry: &Variable, sort: &[SortSpec]) -> Vec<OrderItem> {
    sort.iter()
        .enumerate()
        .map(|(position, spec)| OrderItem {
            expr: entry.property("keys").index(Expr::literal(position)),
            descending: spec.descending(),
        })
        .collect()
}
