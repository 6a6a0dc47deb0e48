//! Selections: each field becomes a map projection entry plus the subqueries
//! that compute its value.

use crate::{
    clause_builder::{Clause, Expr, MapEntry},
    query_ir::{
        computed_field::{lower_computed_field, Computation},
        connection::{lower_connection_field, ConnectionField},
        errors::QueryIrResult,
        plan_ctx::PlanCtx,
        relationship_field::{lower_relationship_field, RelationshipField},
    },
};

/// Key carrying the concrete type name in polymorphic projections
pub const RESOLVE_TYPE_KEY: &str = "__resolveType";

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Attribute(String),
    /// Name of the concrete type
    Typename,
    /// `None` when the schema declares the field computed but no computation
    /// was supplied
    Computed(Option<Computation>),
    Relationship(Box<RelationshipField>),
    Connection(Box<ConnectionField>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub alias: String,
    /// Only project the field for values of this type
    pub type_condition: Option<String>,
    pub kind: FieldKind,
}

impl Field {
    fn new(alias: impl Into<String>, kind: FieldKind) -> Self {
        Field {
            alias: alias.into(),
            type_condition: None,
            kind,
        }
    }

    pub fn attribute(name: impl Into<String>) -> Self {
        let name = name.into();
        Field::new(name.clone(), FieldKind::Attribute(name))
    }

    pub fn attribute_as(alias: impl Into<String>, name: impl Into<String>) -> Self {
        Field::new(alias, FieldKind::Attribute(name.into()))
    }

    pub fn typename() -> Self {
        Field::new("__typename", FieldKind::Typename)
    }

    pub fn computed(alias: impl Into<String>, computation: Option<Computation>) -> Self {
        Field::new(alias, FieldKind::Computed(computation))
    }

    pub fn relationship(alias: impl Into<String>, field: RelationshipField) -> Self {
        Field::new(alias, FieldKind::Relationship(Box::new(field)))
    }

    pub fn connection(alias: impl Into<String>, field: ConnectionField) -> Self {
        Field::new(alias, FieldKind::Connection(Box::new(field)))
    }

    /// Restrict the field to values of `type_name`
    pub fn on(mut self, type_name: impl Into<String>) -> Self {
        self.type_condition = Some(type_name.into());
        self
    }
}

/// A field lowered to its projection entry and the subqueries computing it
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredField {
    pub entry: MapEntry,
    pub subqueries: Vec<Clause>,
}

/// Lower one field against the context's bound variable
pub fn lower_field(field: &Field, ctx: &PlanCtx) -> QueryIrResult<LoweredField> {
    let (value, subqueries) = match &field.kind {
        FieldKind::Attribute(attribute) => {
            ctx.schema().attribute(ctx.bound_type(), attribute)?;
            if *attribute == field.alias {
                return Ok(LoweredField {
                    entry: MapEntry::Property(attribute.clone()),
                    subqueries: Vec::new(),
                });
            }
            (ctx.bound().property(attribute.clone()), Vec::new())
        }
        FieldKind::Typename => (Expr::literal(ctx.bound_type()), Vec::new()),
        FieldKind::Computed(computation) => {
            lower_computed_field(&field.alias, computation.as_ref(), ctx)?
        }
        FieldKind::Relationship(relationship) => lower_relationship_field(relationship, ctx)?,
        FieldKind::Connection(connection) => lower_connection_field(connection, ctx)?,
    };
    Ok(LoweredField {
        entry: MapEntry::Keyed(field.alias.clone(), value),
        subqueries,
    })
}

/// Map projection of the bound variable over the fields that apply to its
/// (concrete) type, together with the subqueries they need.
pub(crate) fn lower_selection(
    ctx: &PlanCtx,
    fields: &[Field],
    resolve_type: bool,
) -> QueryIrResult<(Vec<Clause>, Expr)> {
    let mut subqueries = Vec::new();
    let mut entries = Vec::with_capacity(fields.len() + 1);
    for field in fields {
        if let Some(condition) = &field.type_condition {
            if !ctx.schema().is_subtype(ctx.bound_type(), condition) {
                continue;
            }
        }
        let lowered = lower_field(field, ctx)?;
        entries.push(lowered.entry);
        subqueries.extend(lowered.subqueries);
    }
    if resolve_type {
        entries.push(MapEntry::Keyed(
            RESOLVE_TYPE_KEY.to_string(),
            Expr::literal(ctx.bound_type()),
        ));
    }
    Ok((subqueries, Expr::MapProjection(ctx.bound().clone(), entries)))
}
