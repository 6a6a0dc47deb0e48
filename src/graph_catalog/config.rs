use super::errors::GraphSchemaError;
use super::graph_schema::{
    Attribute, Cardinality, Direction, EdgeBinding, EntitySchema, GraphSchema, InterfaceSchema,
    QueryLimit, RelationshipPropertiesSchema, RelationshipSchema, ScalarKind, UnionSchema,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Schema definitions are written in YAML with the following structure:
///
/// ```yaml
/// name: movies                    # Optional schema name
/// graph_schema:
///   enums: [Genre]
///   interfaces:
///     - name: Production
///       attributes:
///         - { name: title, type: "String!" }
///       relationships:
///         - { field: actors, target: "[Actor]" }     # declared only
///   entities:
///     - name: Movie
///       implements: [Production]
///       limit: { default: 20, max: 100 }
///       attributes:
///         - { name: title, type: "String!" }
///         - { name: genres, type: "[Genre]" }
///       relationships:
///         - field: actors
///           target: "[Actor]"
///           type: ACTED_IN
///           direction: IN
///           properties: ActedIn
///   unions:
///     - { name: Search, members: [Movie, Actor] }
///   relationship_properties:
///     - name: ActedIn
///       attributes:
///         - { name: screenTime, type: Int }
/// ```
///
/// Type references follow the request language: `[T]` is a list and a trailing
/// `!` marks the value non-null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSchemaConfig {
    /// Optional schema name
    #[serde(default)]
    pub name: Option<String>,
    /// Graph schema definition
    pub graph_schema: GraphSchemaDefinition,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSchemaDefinition {
    #[serde(default)]
    pub enums: Vec<String>,
    #[serde(default)]
    pub entities: Vec<EntityDefinition>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceDefinition>,
    #[serde(default)]
    pub unions: Vec<UnionDefinition>,
    #[serde(default)]
    pub relationship_properties: Vec<RelationshipPropertiesDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,
    /// Backend labels, defaulting to the entity name
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDefinition>,
    #[serde(default)]
    pub limit: Option<QueryLimit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDefinition {
    pub name: String,
    #[serde(default)]
    pub implements: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnionDefinition {
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipPropertiesDefinition {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipDefinition {
    pub field: String,
    /// Target type reference, `[T]` for list cardinality
    pub target: String,
    /// Edge type; omitted for relationships declared only on an interface
    #[serde(default, rename = "type")]
    pub edge_type: Option<String>,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub properties: Option<String>,
}

/// A parsed type reference such as `[String!]!`
#[derive(Debug, Clone, PartialEq, Eq)]
struct TypeRef {
    name: String,
    list: bool,
    nullable: bool,
}

fn parse_type_ref(raw: &str) -> Result<TypeRef, String> {
    let trimmed = raw.trim();
    let (body, nullable) = match trimmed.strip_suffix('!') {
        Some(body) => (body.trim(), false),
        None => (trimmed, true),
    };
    let (name, list) = match body.strip_prefix('[') {
        Some(inner) => {
            let inner = inner
                .strip_suffix(']')
                .ok_or_else(|| format!("unterminated list type `{}`", raw))?;
            (inner.trim().trim_end_matches('!').trim(), true)
        }
        None => (body, false),
    };
    if name.is_empty() || name.contains(['[', ']', '!', ' ']) {
        return Err(format!("malformed type reference `{}`", raw));
    }
    Ok(TypeRef {
        name: name.to_string(),
        list,
        nullable,
    })
}

impl GraphSchemaConfig {
    /// Parse a schema definition from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self, GraphSchemaError> {
        serde_yaml::from_str(content).map_err(|e| GraphSchemaError::ConfigParseError {
            error: e.to_string(),
        })
    }

    /// Load a schema definition from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, GraphSchemaError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| GraphSchemaError::ConfigReadError {
                error: format!("{}: {}", path.as_ref().display(), e),
            })?;
        Self::from_yaml_str(&content)
    }

    /// Build the schema catalogue, validating every cross reference
    pub fn to_graph_schema(&self) -> Result<GraphSchema, GraphSchemaError> {
        let def = &self.graph_schema;
        let mut schema = GraphSchema::new();

        let mut names = BTreeSet::new();
        let all_names = def
            .entities
            .iter()
            .map(|e| &e.name)
            .chain(def.interfaces.iter().map(|i| &i.name))
            .chain(def.unions.iter().map(|u| &u.name))
            .chain(def.relationship_properties.iter().map(|p| &p.name))
            .chain(def.enums.iter());
        for name in all_names {
            if !names.insert(name.as_str()) {
                return Err(GraphSchemaError::InvalidConfig {
                    message: format!("type `{}` is defined more than once", name),
                });
            }
        }

        for name in &def.enums {
            schema.insert_enum(name.clone());
        }

        // Attribute kinds depend only on enums, so they resolve before any
        // composite type is inserted.
        for properties in &def.relationship_properties {
            let attributes = build_attributes(&schema, &properties.name, &properties.attributes)?;
            schema.insert_relationship_properties(RelationshipPropertiesSchema {
                name: properties.name.clone(),
                attributes,
            });
        }
        for interface in &def.interfaces {
            let attributes = build_attributes(&schema, &interface.name, &interface.attributes)?;
            schema.insert_interface(InterfaceSchema {
                name: interface.name.clone(),
                implements: interface.implements.clone(),
                attributes,
                relationships: build_relationships(&interface.name, &interface.relationships)?,
            });
        }
        for entity in &def.entities {
            let labels = if entity.labels.is_empty() {
                vec![entity.name.clone()]
            } else {
                entity.labels.clone()
            };
            let attributes = build_attributes(&schema, &entity.name, &entity.attributes)?;
            schema.insert_entity(EntitySchema {
                name: entity.name.clone(),
                labels,
                implements: entity.implements.clone(),
                attributes,
                relationships: build_relationships(&entity.name, &entity.relationships)?,
                limit: entity.limit,
            });
        }
        for union in &def.unions {
            schema.insert_union(UnionSchema {
                name: union.name.clone(),
                members: union.members.clone(),
            });
        }

        validate_references(&schema, def)?;

        log::debug!(
            "Built graph schema {:?}: {} entities, {} interfaces, {} unions",
            self.name,
            def.entities.len(),
            def.interfaces.len(),
            def.unions.len()
        );
        Ok(schema)
    }
}

fn build_attributes(
    schema: &GraphSchema,
    owner: &str,
    definitions: &[AttributeDefinition],
) -> Result<Vec<Attribute>, GraphSchemaError> {
    definitions
        .iter()
        .map(|def| -> Result<Attribute, GraphSchemaError> {
            let context = format!("{}.{}", owner, def.name);
            let type_ref = parse_type_ref(&def.type_ref)
                .map_err(|msg| GraphSchemaError::invalid_config_with_context(&context, msg))?;
            let scalar = match ScalarKind::builtin(&type_ref.name) {
                Some(kind) => kind,
                None if schema.has_enum(&type_ref.name) => ScalarKind::Enum(type_ref.name.clone()),
                None => {
                    return Err(GraphSchemaError::invalid_config_with_context(
                        &context,
                        format!("unknown scalar or enum type `{}`", type_ref.name),
                    ))
                }
            };
            let kind = if type_ref.list {
                ScalarKind::List(Box::new(scalar))
            } else {
                scalar
            };
            Ok(Attribute {
                name: def.name.clone(),
                kind,
                nullable: type_ref.nullable,
            })
        })
        .collect()
}

fn build_relationships(
    owner: &str,
    definitions: &[RelationshipDefinition],
) -> Result<Vec<RelationshipSchema>, GraphSchemaError> {
    definitions
        .iter()
        .map(|def| -> Result<RelationshipSchema, GraphSchemaError> {
            let context = format!("{}.{}", owner, def.field);
            let target = parse_type_ref(&def.target)
                .map_err(|msg| GraphSchemaError::invalid_config_with_context(&context, msg))?;
            let edge = match (&def.edge_type, def.direction) {
                (Some(edge_type), Some(direction)) => Some(EdgeBinding {
                    edge_type: edge_type.clone(),
                    direction,
                    properties: def.properties.clone(),
                }),
                (Some(_), None) => {
                    return Err(GraphSchemaError::invalid_config_with_context(
                        &context,
                        "relationship with an edge type needs a direction",
                    ))
                }
                (None, _) if def.properties.is_some() => {
                    return Err(GraphSchemaError::invalid_config_with_context(
                        &context,
                        "relationship properties need an edge type",
                    ))
                }
                (None, _) => None,
            };
            Ok(RelationshipSchema {
                field: def.field.clone(),
                target: target.name,
                cardinality: if target.list {
                    Cardinality::List
                } else {
                    Cardinality::Single
                },
                edge,
            })
        })
        .collect()
}

fn validate_references(
    schema: &GraphSchema,
    def: &GraphSchemaDefinition,
) -> Result<(), GraphSchemaError> {
    let interface_names: BTreeSet<&str> = def.interfaces.iter().map(|i| i.name.as_str()).collect();
    let entity_names: BTreeSet<&str> = def.entities.iter().map(|e| e.name.as_str()).collect();

    let check_implements = |owner: &str, implements: &[String]| -> Result<(), GraphSchemaError> {
        for name in implements {
            if !interface_names.contains(name.as_str()) {
                return Err(GraphSchemaError::invalid_config_with_context(
                    owner,
                    format!("implements unknown interface `{}`", name),
                ));
            }
        }
        Ok(())
    };
    let check_relationships =
        |owner: &str, relationships: &[RelationshipDefinition]| -> Result<(), GraphSchemaError> {
        for rel in relationships {
            let context = format!("{}.{}", owner, rel.field);
            let target = parse_type_ref(&rel.target)
                .map_err(|msg| GraphSchemaError::invalid_config_with_context(&context, msg))?;
            if !schema.has_type(&target.name) {
                return Err(GraphSchemaError::invalid_config_with_context(
                    &context,
                    format!("target type `{}` is not defined", target.name),
                ));
            }
            if let Some(properties) = &rel.properties {
                if !schema.has_relationship_properties(properties) {
                    return Err(GraphSchemaError::invalid_config_with_context(
                        &context,
                        format!("relationship properties `{}` are not defined", properties),
                    ));
                }
            }
        }
        Ok(())
    };

    for interface in &def.interfaces {
        check_implements(&interface.name, &interface.implements)?;
        check_relationships(&interface.name, &interface.relationships)?;
    }
    for entity in &def.entities {
        check_implements(&entity.name, &entity.implements)?;
        check_relationships(&entity.name, &entity.relationships)?;
    }
    for union in &def.unions {
        for member in &union.members {
            if !entity_names.contains(member.as_str()) {
                return Err(GraphSchemaError::invalid_config_with_context(
                    &union.name,
                    format!("union member `{}` is not an entity", member),
                ));
            }
        }
    }
    Ok(())
}
