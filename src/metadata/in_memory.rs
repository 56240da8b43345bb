//! In-memory metadata provider built from entity definitions.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use sqlparser::ast::Statement as SqlStatement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use super::error::{MetadataError, MetadataResult};
use super::model_file::{EntityDefinition, ModelFile};
use super::provider::MetadataProvider;
use super::types::*;

/// A fully validated domain model held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadata {
    /// Entities in registration order.
    entities: Vec<Arc<EntityType>>,
    by_name: HashMap<String, usize>,
    by_class: HashMap<String, usize>,
    shapes: HashMap<String, TableShape>,
}

/// Collects entity definitions before validation.
#[derive(Debug, Default)]
pub struct MetadataBuilder {
    definitions: Vec<EntityDefinition>,
}

impl MetadataBuilder {
    pub fn entity(mut self, definition: EntityDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn build(self) -> MetadataResult<InMemoryMetadata> {
        InMemoryMetadata::from_definitions(self.definitions)
    }
}

impl InMemoryMetadata {
    pub fn builder() -> MetadataBuilder {
        MetadataBuilder::default()
    }

    /// Load and validate a TOML or JSON model file.
    pub fn load(path: &Path) -> MetadataResult<Self> {
        let model = ModelFile::load(path)?;
        Self::from_definitions(model.entities)
    }

    pub fn from_model(model: ModelFile) -> MetadataResult<Self> {
        Self::from_definitions(model.entities)
    }

    /// Validate definitions and build entity types and table shapes.
    pub fn from_definitions(definitions: Vec<EntityDefinition>) -> MetadataResult<Self> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, def) in definitions.iter().enumerate() {
            if index.insert(def.name.as_str(), i).is_some() {
                return Err(MetadataError::DuplicateEntity(def.name.clone()));
            }
        }

        let mut metadata = InMemoryMetadata::default();
        for def in &definitions {
            let chain = hierarchy_chain(def, &definitions, &index)?;
            let entity = build_entity_type(&chain, &index)?;
            let shape = build_table_shape(&chain, &entity, &definitions, &index)?;

            let position = metadata.entities.len();
            if let Some(class_name) = &entity.class_name {
                if metadata.by_class.insert(class_name.clone(), position).is_some() {
                    return Err(MetadataError::DuplicateEntity(class_name.clone()));
                }
            }
            metadata.by_name.insert(entity.name.clone(), position);
            metadata.shapes.insert(entity.name.clone(), shape);
            metadata.entities.push(Arc::new(entity));
        }

        tracing::debug!(entities = metadata.entities.len(), "built in-memory metadata");
        Ok(metadata)
    }

    /// Entities in registration order.
    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityType>> {
        self.entities.iter()
    }

    fn lookup(&self, name: &str) -> Option<&Arc<EntityType>> {
        self.by_name
            .get(name)
            .or_else(|| self.by_class.get(name))
            .and_then(|&i| self.entities.get(i))
    }

    /// True when `entity` inherits (directly or not) from `ancestor`.
    fn inherits_from(&self, entity: &EntityType, ancestor: &str) -> bool {
        let mut seen = HashSet::new();
        let mut current = entity.super_type.as_deref();
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            if !seen.insert(name) {
                return false;
            }
            current = self
                .lookup(name)
                .and_then(|parent| parent.super_type.as_deref());
        }
        false
    }
}

impl MetadataProvider for InMemoryMetadata {
    fn resolve_entity_reference(&self, name: &str) -> Option<EntityReference> {
        if let Some(entity) = self.lookup(name) {
            return Some(EntityReference::Concrete(entity.clone()));
        }

        let implementors: Vec<&Arc<EntityType>> = self
            .entities
            .iter()
            .filter(|e| e.implements.iter().any(|i| i == name))
            .collect();

        // Only the topmost implementor of each hierarchy counts
        let roots: Vec<Arc<EntityType>> = implementors
            .iter()
            .filter(|e| {
                !implementors
                    .iter()
                    .any(|other| self.inherits_from(e, &other.name))
            })
            .map(|e| Arc::clone(e))
            .collect();

        match roots.len() {
            0 => None,
            1 => roots.into_iter().next().map(EntityReference::Concrete),
            _ => Some(EntityReference::Polymorphic(PolymorphicEntity::new(name, roots))),
        }
    }

    fn entity_type(&self, name: &str) -> Option<Arc<EntityType>> {
        self.by_name
            .get(name)
            .and_then(|&i| self.entities.get(i))
            .cloned()
    }

    fn table_shape(&self, entity: &str) -> Option<&TableShape> {
        self.shapes.get(entity)
    }
}

/// The definition's ancestors, root first, ending with the definition itself.
fn hierarchy_chain<'d>(
    def: &'d EntityDefinition,
    definitions: &'d [EntityDefinition],
    index: &HashMap<&str, usize>,
) -> MetadataResult<Vec<&'d EntityDefinition>> {
    let mut chain = vec![def];
    let mut seen: HashSet<&str> = HashSet::from([def.name.as_str()]);
    let mut current = def;
    while let Some(super_name) = &current.super_type {
        let parent = index
            .get(super_name.as_str())
            .and_then(|&i| definitions.get(i))
            .ok_or_else(|| MetadataError::UnknownSuperType {
                entity: current.name.clone(),
                super_type: super_name.clone(),
            })?;
        if !seen.insert(parent.name.as_str()) {
            return Err(MetadataError::InheritanceCycle(def.name.clone()));
        }
        chain.push(parent);
        current = parent;
    }
    chain.reverse();
    Ok(chain)
}

fn parse_attribute_type(
    entity: &str,
    attribute: &str,
    ty: &str,
    index: &HashMap<&str, usize>,
) -> MetadataResult<TypeDescriptor> {
    let descriptor = TypeDescriptor::parse(ty).ok_or_else(|| MetadataError::InvalidType {
        entity: entity.to_string(),
        attribute: attribute.to_string(),
        ty: ty.to_string(),
    })?;

    let referenced = match &descriptor {
        TypeDescriptor::Entity { name } => Some(name.as_str()),
        TypeDescriptor::Collection { collection } => {
            match collection.element.entity_name() {
                Some(name) => Some(name),
                None => {
                    return Err(MetadataError::InvalidCollection {
                        entity: entity.to_string(),
                        attribute: attribute.to_string(),
                        reason: "collection elements must be entities".to_string(),
                    })
                }
            }
        }
        TypeDescriptor::Basic { .. } => None,
    };

    if let Some(target) = referenced {
        if !index.contains_key(target) {
            return Err(MetadataError::UnknownEntity {
                entity: entity.to_string(),
                attribute: attribute.to_string(),
                target: target.to_string(),
            });
        }
    }
    Ok(descriptor)
}

fn build_entity_type(
    chain: &[&EntityDefinition],
    index: &HashMap<&str, usize>,
) -> MetadataResult<EntityType> {
    let Some(def) = chain.last() else {
        return Err(MetadataError::InheritanceCycle(String::new()));
    };

    let mut attributes: Vec<Attribute> = Vec::new();
    let mut implements: Vec<String> = Vec::new();
    for ancestor in chain {
        for attr in &ancestor.attributes {
            if attributes.iter().any(|a| a.name == attr.name) {
                return Err(MetadataError::DuplicateAttribute {
                    entity: def.name.clone(),
                    attribute: attr.name.clone(),
                });
            }
            let ty = parse_attribute_type(&ancestor.name, &attr.name, &attr.ty, index)?;
            attributes.push(Attribute {
                name: attr.name.clone(),
                ty,
            });
        }
        for interface in &ancestor.implements {
            if !implements.contains(interface) {
                implements.push(interface.clone());
            }
        }
    }

    Ok(EntityType {
        name: def.name.clone(),
        class_name: def.class_name.clone(),
        super_type: def.super_type.clone(),
        implements,
        attributes,
    })
}

fn build_table_shape(
    chain: &[&EntityDefinition],
    entity: &EntityType,
    definitions: &[EntityDefinition],
    index: &HashMap<&str, usize>,
) -> MetadataResult<TableShape> {
    let mut shape = TableShape::default();
    // Position in `shape.tables` of the table receiving declared attributes
    let mut home: Option<usize> = None;

    for def in chain {
        if let Some(table) = &def.table {
            validate_table_name(&def.name, table)?;
            shape.tables.push(MappedTable {
                name: table.clone(),
                key_column: def.key_column.clone(),
                columns: Vec::new(),
                optional: false,
                identifying: true,
            });
            home = Some(shape.tables.len() - 1);
        }
        let Some(home_table) = home else {
            return Err(MetadataError::MissingTable(def.name.clone()));
        };

        let mut secondary_positions: HashMap<&str, usize> = HashMap::new();
        for secondary in &def.secondary_tables {
            validate_table_name(&def.name, &secondary.name)?;
            shape.tables.push(MappedTable {
                name: secondary.name.clone(),
                key_column: secondary.key_column.clone(),
                columns: Vec::new(),
                optional: secondary.optional,
                identifying: false,
            });
            for attr in &secondary.attributes {
                secondary_positions.insert(attr.as_str(), shape.tables.len() - 1);
            }
        }

        for attr in &def.attributes {
            let ty = entity.attribute(&attr.name).cloned().ok_or_else(|| {
                MetadataError::InvalidType {
                    entity: def.name.clone(),
                    attribute: attr.name.clone(),
                    ty: attr.ty.clone(),
                }
            })?;

            if let Some(collection) = ty.as_collection() {
                let foreign_key_column = attr.foreign_key.clone().ok_or_else(|| {
                    MetadataError::InvalidCollection {
                        entity: def.name.clone(),
                        attribute: attr.name.clone(),
                        reason: "missing foreign_key".to_string(),
                    }
                })?;
                if collection.index.is_some() && attr.index_column.is_none() {
                    return Err(MetadataError::InvalidCollection {
                        entity: def.name.clone(),
                        attribute: attr.name.clone(),
                        reason: "indexed collection needs index_column".to_string(),
                    });
                }
                shape.collections.push(CollectionMapping {
                    attribute: attr.name.clone(),
                    foreign_key_column,
                    index_column: attr.index_column.clone(),
                });
                continue;
            }

            let column = attr.column.clone().unwrap_or_else(|| match &ty {
                TypeDescriptor::Entity { .. } => format!("{}_id", attr.name),
                _ => attr.name.clone(),
            });
            let position = secondary_positions
                .get(attr.name.as_str())
                .copied()
                .unwrap_or(home_table);
            if let Some(table) = shape.tables.get_mut(position) {
                table.columns.push(MappedColumn {
                    attribute: attr.name.clone(),
                    column,
                });
            }
        }
    }

    // Collection element entities must have a root table to hold the FK
    for mapping in &shape.collections {
        let element = entity
            .attribute(&mapping.attribute)
            .and_then(|ty| ty.as_collection())
            .and_then(|c| c.element.entity_name().map(str::to_string));
        if let Some(element) = element {
            let has_table = index
                .get(element.as_str())
                .and_then(|&i| definitions.get(i))
                .map(|d| d.table.is_some() || d.super_type.is_some())
                .unwrap_or(false);
            if !has_table {
                return Err(MetadataError::MissingTable(element));
            }
        }
    }

    Ok(shape)
}

/// A derived table must wrap exactly one parseable query.
fn validate_table_name(entity: &str, table: &str) -> MetadataResult<()> {
    if !is_derived_table_name(table) {
        return Ok(());
    }
    let inner = table.trim();
    let inner = &inner[1..inner.len() - 1];
    let statements = Parser::parse_sql(&GenericDialect {}, inner).map_err(|e| {
        MetadataError::InvalidDerivedTable {
            entity: entity.to_string(),
            message: e.to_string(),
        }
    })?;
    match statements.as_slice() {
        [SqlStatement::Query(_)] => Ok(()),
        _ => Err(MetadataError::InvalidDerivedTable {
            entity: entity.to_string(),
            message: "expected a single SELECT".to_string(),
        }),
    }
}
