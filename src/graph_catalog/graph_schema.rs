use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::errors::GraphSchemaError;

/// Scalar kind of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarKind {
    String,
    Int,
    Float,
    Boolean,
    Id,
    Enum(String),
    List(Box<ScalarKind>),
}

impl ScalarKind {
    /// Strings are the only kind that length-based comparisons and the
    /// SHORTEST/LONGEST aggregations measure through `size()`.
    pub fn is_string(&self) -> bool {
        matches!(self, ScalarKind::String)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarKind::Int | ScalarKind::Float)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ScalarKind::List(_))
    }

    /// Resolve a builtin scalar name, or `None` when the name is not builtin
    pub fn builtin(name: &str) -> Option<ScalarKind> {
        match name {
            "String" => Some(ScalarKind::String),
            "Int" | "BigInt" => Some(ScalarKind::Int),
            "Float" => Some(ScalarKind::Float),
            "Boolean" => Some(ScalarKind::Boolean),
            "ID" => Some(ScalarKind::Id),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarKind::String => f.write_str("String"),
            ScalarKind::Int => f.write_str("Int"),
            ScalarKind::Float => f.write_str("Float"),
            ScalarKind::Boolean => f.write_str("Boolean"),
            ScalarKind::Id => f.write_str("ID"),
            ScalarKind::Enum(name) => f.write_str(name),
            ScalarKind::List(inner) => write!(f, "[{}]", inner),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub kind: ScalarKind,
    pub nullable: bool,
}

impl Attribute {
    pub fn new(name: impl Into<String>, kind: ScalarKind) -> Self {
        Attribute {
            name: name.into(),
            kind,
            nullable: true,
        }
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[serde(alias = "OUT")]
    Outgoing,
    #[serde(alias = "IN")]
    Incoming,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Incoming => f.write_str("incoming"),
            Direction::Outgoing => f.write_str("outgoing"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    Single,
    List,
}

/// Storage-level binding of a relationship: the edge type, the direction it is
/// traversed in from the declaring type, and the relationship-property type
/// describing attributes stored on the edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeBinding {
    pub edge_type: String,
    pub direction: Direction,
    pub properties: Option<String>,
}

impl fmt::Display for EdgeBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.edge_type, self.direction)?;
        if let Some(properties) = &self.properties {
            write!(f, " with {}", properties)?;
        }
        Ok(())
    }
}

/// A relationship field as declared on an entity or interface.
///
/// `edge` is `None` for a *declared* relationship: the field shape is fixed on
/// the interface but each implementing entity supplies its own binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSchema {
    pub field: String,
    pub target: String,
    pub cardinality: Cardinality,
    pub edge: Option<EdgeBinding>,
}

impl RelationshipSchema {
    pub fn is_declared_only(&self) -> bool {
        self.edge.is_none()
    }
}

/// Default and maximum page sizes for reads of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueryLimit {
    #[serde(default)]
    pub default: Option<u64>,
    #[serde(default)]
    pub max: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySchema {
    pub name: String,
    /// Backend labels; the first one is used in match patterns
    pub labels: Vec<String>,
    pub implements: Vec<String>,
    pub attributes: Vec<Attribute>,
    pub relationships: Vec<RelationshipSchema>,
    pub limit: Option<QueryLimit>,
}

impl EntitySchema {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        EntitySchema {
            labels: vec![name.clone()],
            name,
            implements: Vec::new(),
            attributes: Vec::new(),
            relationships: Vec::new(),
            limit: None,
        }
    }

    pub fn primary_label(&self) -> &str {
        self.labels.first().map(String::as_str).unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceSchema {
    pub name: String,
    pub implements: Vec<String>,
    pub attributes: Vec<Attribute>,
    pub relationships: Vec<RelationshipSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnionSchema {
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipPropertiesSchema {
    pub name: String,
    pub attributes: Vec<Attribute>,
}

/// A named composite type, resolved to its kind.
#[derive(Debug, Clone, Copy)]
pub enum CompositeType<'a> {
    Entity(&'a EntitySchema),
    Interface(&'a InterfaceSchema),
    Union(&'a UnionSchema),
}

impl<'a> CompositeType<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            CompositeType::Entity(entity) => &entity.name,
            CompositeType::Interface(interface) => &interface.name,
            CompositeType::Union(union) => &union.name,
        }
    }

    pub fn is_abstract(&self) -> bool {
        !matches!(self, CompositeType::Entity(_))
    }
}

/// A relationship resolved against a concrete source entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipImplementation {
    pub source: String,
    pub field: String,
    pub edge_type: String,
    pub direction: Direction,
    pub target: String,
    pub properties: Option<String>,
    pub cardinality: Cardinality,
}

/// Read-only schema catalogue shared by every translation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSchema {
    entities: BTreeMap<String, EntitySchema>,
    interfaces: BTreeMap<String, InterfaceSchema>,
    unions: BTreeMap<String, UnionSchema>,
    relationship_properties: BTreeMap<String, RelationshipPropertiesSchema>,
    enums: BTreeSet<String>,
}

impl GraphSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_entity(&mut self, entity: EntitySchema) {
        self.entities.insert(entity.name.clone(), entity);
    }

    pub fn insert_interface(&mut self, interface: InterfaceSchema) {
        self.interfaces.insert(interface.name.clone(), interface);
    }

    pub fn insert_union(&mut self, union: UnionSchema) {
        self.unions.insert(union.name.clone(), union);
    }

    pub fn insert_relationship_properties(&mut self, properties: RelationshipPropertiesSchema) {
        self.relationship_properties
            .insert(properties.name.clone(), properties);
    }

    pub fn insert_enum(&mut self, name: impl Into<String>) {
        self.enums.insert(name.into());
    }

    pub fn has_type(&self, name: &str) -> bool {
        self.entities.contains_key(name)
            || self.interfaces.contains_key(name)
            || self.unions.contains_key(name)
    }

    pub fn has_enum(&self, name: &str) -> bool {
        self.enums.contains(name)
    }

    pub fn has_relationship_properties(&self, name: &str) -> bool {
        self.relationship_properties.contains_key(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntitySchema> {
        self.entities.values()
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &InterfaceSchema> {
        self.interfaces.values()
    }

    pub fn unions(&self) -> impl Iterator<Item = &UnionSchema> {
        self.unions.values()
    }

    pub fn entity(&self, name: &str) -> Result<&EntitySchema, GraphSchemaError> {
        self.entities
            .get(name)
            .ok_or_else(|| GraphSchemaError::UnknownEntity {
                entity: name.to_string(),
            })
    }

    pub fn composite(&self, name: &str) -> Result<CompositeType<'_>, GraphSchemaError> {
        if let Some(entity) = self.entities.get(name) {
            return Ok(CompositeType::Entity(entity));
        }
        if let Some(interface) = self.interfaces.get(name) {
            return Ok(CompositeType::Interface(interface));
        }
        if let Some(union) = self.unions.get(name) {
            return Ok(CompositeType::Union(union));
        }
        Err(GraphSchemaError::UnknownType {
            type_name: name.to_string(),
        })
    }

    /// Attributes of an entity, interface or relationship-property type.
    /// Unions carry no attributes.
    pub fn attributes_of(&self, type_name: &str) -> Result<&[Attribute], GraphSchemaError> {
        if let Some(properties) = self.relationship_properties.get(type_name) {
            return Ok(&properties.attributes);
        }
        match self.composite(type_name)? {
            CompositeType::Entity(entity) => Ok(&entity.attributes),
            CompositeType::Interface(interface) => Ok(&interface.attributes),
            CompositeType::Union(_) => Ok(&[]),
        }
    }

    /// Look up one attribute, falling back to the implemented interfaces when
    /// the type does not redeclare it.
    pub fn attribute(&self, type_name: &str, name: &str) -> Result<&Attribute, GraphSchemaError> {
        if let Some(attribute) = self
            .attributes_of(type_name)?
            .iter()
            .find(|attribute| attribute.name == name)
        {
            return Ok(attribute);
        }
        if !self.relationship_properties.contains_key(type_name) {
            for level in self.interface_levels(type_name)? {
                for interface in level {
                    if let Some(attribute) =
                        interface.attributes.iter().find(|attribute| attribute.name == name)
                    {
                        return Ok(attribute);
                    }
                }
            }
        }
        Err(GraphSchemaError::UnknownAttribute {
            type_name: type_name.to_string(),
            attribute: name.to_string(),
        })
    }

    /// Relationships declared directly on an entity or interface
    pub fn relationships_of(
        &self,
        type_name: &str,
    ) -> Result<&[RelationshipSchema], GraphSchemaError> {
        match self.composite(type_name)? {
            CompositeType::Entity(entity) => Ok(&entity.relationships),
            CompositeType::Interface(interface) => Ok(&interface.relationships),
            CompositeType::Union(_) => Ok(&[]),
        }
    }

    /// The declaration of a relationship field as seen from `type_name`: its
    /// own declaration if present, otherwise the nearest inherited one.
    pub fn relationship(
        &self,
        type_name: &str,
        field: &str,
    ) -> Result<&RelationshipSchema, GraphSchemaError> {
        if let Some(rel) = self
            .relationships_of(type_name)?
            .iter()
            .find(|rel| rel.field == field)
        {
            return Ok(rel);
        }
        for level in self.interface_levels(type_name)? {
            for interface in level {
                if let Some(rel) = interface.relationships.iter().find(|rel| rel.field == field) {
                    return Ok(rel);
                }
            }
        }
        Err(GraphSchemaError::UnknownRelationship {
            type_name: type_name.to_string(),
            field: field.to_string(),
        })
    }

    /// Interfaces implemented by `type_name`, grouped by distance: level 0 holds
    /// the directly implemented interfaces, level 1 the interfaces those
    /// implement, and so on. Each interface appears once, at its nearest level.
    pub fn interface_levels(
        &self,
        type_name: &str,
    ) -> Result<Vec<Vec<&InterfaceSchema>>, GraphSchemaError> {
        let direct: &[String] = match self.composite(type_name)? {
            CompositeType::Entity(entity) => &entity.implements,
            CompositeType::Interface(interface) => &interface.implements,
            CompositeType::Union(_) => &[],
        };

        let mut seen: BTreeSet<&str> = BTreeSet::new();
        seen.insert(type_name);
        let mut levels = Vec::new();
        let mut frontier: Vec<&str> = direct.iter().map(String::as_str).collect();

        while !frontier.is_empty() {
            let mut level = Vec::new();
            let mut next = Vec::new();
            for name in frontier {
                if !seen.insert(name) {
                    continue;
                }
                let interface =
                    self.interfaces
                        .get(name)
                        .ok_or_else(|| GraphSchemaError::UnknownType {
                            type_name: name.to_string(),
                        })?;
                next.extend(interface.implements.iter().map(String::as_str));
                level.push(interface);
            }
            if !level.is_empty() {
                levels.push(level);
            }
            frontier = next;
        }
        Ok(levels)
    }

    /// Concrete entities behind a type name: an entity yields itself, an
    /// interface every entity implementing it directly or transitively, a
    /// union its members. Results are in name order without duplicates.
    pub fn implementations_of(
        &self,
        type_name: &str,
    ) -> Result<Vec<&EntitySchema>, GraphSchemaError> {
        match self.composite(type_name)? {
            CompositeType::Entity(entity) => Ok(vec![entity]),
            CompositeType::Union(union) => {
                let members: BTreeSet<&str> = union.members.iter().map(String::as_str).collect();
                members.into_iter().map(|member| self.entity(member)).collect()
            }
            CompositeType::Interface(_) => {
                let mut implementations = Vec::new();
                for entity in self.entities.values() {
                    if self.implements_interface(&entity.name, type_name)? {
                        implementations.push(entity);
                    }
                }
                Ok(implementations)
            }
        }
    }

    fn implements_interface(
        &self,
        type_name: &str,
        interface: &str,
    ) -> Result<bool, GraphSchemaError> {
        Ok(self
            .interface_levels(type_name)?
            .iter()
            .flatten()
            .any(|candidate| candidate.name == interface))
    }

    /// Whether values of the concrete entity `concrete` are also values of
    /// `type_name` (same type, implemented interface or containing union).
    pub fn is_subtype(&self, concrete: &str, type_name: &str) -> bool {
        if concrete == type_name {
            return true;
        }
        if let Some(union) = self.unions.get(type_name) {
            return union.members.iter().any(|member| member == concrete);
        }
        self.implements_interface(concrete, type_name)
            .unwrap_or(false)
    }

    /// Resolve a relationship field against a concrete source entity.
    ///
    /// The deepest declaration carrying an edge binding wins: the entity's own
    /// declaration first, then its interfaces level by level. When several
    /// interfaces at the winning level bind the field differently the
    /// resolution is ambiguous. The entity's own declaration, even a declared
    /// only one, still decides the target type and cardinality.
    pub fn resolve_relationship_implementation(
        &self,
        entity_name: &str,
        field: &str,
    ) -> Result<RelationshipImplementation, GraphSchemaError> {
        let entity = self.entity(entity_name)?;
        let own = entity.relationships.iter().find(|rel| rel.field == field);

        let implementation = |shape: &RelationshipSchema, edge: &EdgeBinding| {
            RelationshipImplementation {
                source: entity.name.clone(),
                field: field.to_string(),
                edge_type: edge.edge_type.clone(),
                direction: edge.direction,
                target: shape.target.clone(),
                properties: edge.properties.clone(),
                cardinality: shape.cardinality,
            }
        };

        if let Some(rel) = own {
            if let Some(edge) = &rel.edge {
                return Ok(implementation(rel, edge));
            }
        }

        let mut declared_anywhere = own.is_some();
        for level in self.interface_levels(entity_name)? {
            let mut bound: Vec<(&RelationshipSchema, &EdgeBinding)> = Vec::new();
            for interface in level {
                if let Some(rel) = interface.relationships.iter().find(|rel| rel.field == field) {
                    declared_anywhere = true;
                    if let Some(edge) = &rel.edge {
                        bound.push((rel, edge));
                    }
                }
            }

            let Some((first_rel, first_edge)) = bound.first().copied() else {
                continue;
            };
            if bound.iter().any(|(_, edge)| *edge != first_edge) {
                let candidates = bound
                    .iter()
                    .map(|(_, edge)| edge.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(GraphSchemaError::AmbiguousRelationshipProperty {
                    entity: entity_name.to_string(),
                    field: field.to_string(),
                    candidates,
                });
            }
            return Ok(implementation(own.unwrap_or(first_rel), first_edge));
        }

        if declared_anywhere {
            Err(GraphSchemaError::UnboundRelationship {
                entity: entity_name.to_string(),
                field: field.to_string(),
            })
        } else {
            Err(GraphSchemaError::UnknownRelationship {
                type_name: entity_name.to_string(),
                field: field.to_string(),
            })
        }
    }
}
