//! Domain-model types exposed by a metadata provider.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// `list<Item>`, `set<Item>`, `bag<Item>`, `map<string,Item>`
static COLLECTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(list|set|bag|map)\s*<\s*([A-Za-z_][\w.]*)\s*(?:,\s*([A-Za-z_][\w.]*)\s*)?>$")
        .expect("collection type pattern is valid")
});

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][\w]*(\.[A-Za-z_][\w]*)*$").expect("name pattern is valid")
});

// ============================================================================
// Type descriptors
// ============================================================================

/// Scalar attribute types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasicType {
    String,
    Integer,
    Long,
    Double,
    Decimal,
    Boolean,
    Date,
    Timestamp,
}

impl BasicType {
    /// Parse from the model-file spelling (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "string" | "text" => Some(BasicType::String),
            "int" | "integer" => Some(BasicType::Integer),
            "long" | "bigint" => Some(BasicType::Long),
            "double" | "float" => Some(BasicType::Double),
            "decimal" => Some(BasicType::Decimal),
            "bool" | "boolean" => Some(BasicType::Boolean),
            "date" => Some(BasicType::Date),
            "timestamp" => Some(BasicType::Timestamp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BasicType::String => "string",
            BasicType::Integer => "integer",
            BasicType::Long => "long",
            BasicType::Double => "double",
            BasicType::Decimal => "decimal",
            BasicType::Boolean => "boolean",
            BasicType::Date => "date",
            BasicType::Timestamp => "timestamp",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            BasicType::Integer | BasicType::Long | BasicType::Double | BasicType::Decimal
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionNature {
    List,
    Set,
    Bag,
    Map,
}

impl CollectionNature {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionNature::List => "list",
            CollectionNature::Set => "set",
            CollectionNature::Bag => "bag",
            CollectionNature::Map => "map",
        }
    }
}

/// A plural attribute type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionType {
    pub nature: CollectionNature,
    pub element: Box<TypeDescriptor>,
    /// Index type; present only for indexed collections.
    pub index: Option<Box<TypeDescriptor>>,
}

/// The type of an attribute, a from-element or an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDescriptor {
    Basic { ty: BasicType },
    /// A to-one association, by entity name.
    Entity { name: String },
    Collection { collection: CollectionType },
}

impl TypeDescriptor {
    pub fn basic(ty: BasicType) -> Self {
        TypeDescriptor::Basic { ty }
    }

    pub fn entity(name: impl Into<String>) -> Self {
        TypeDescriptor::Entity { name: name.into() }
    }

    pub fn list(element: TypeDescriptor) -> Self {
        TypeDescriptor::Collection {
            collection: CollectionType {
                nature: CollectionNature::List,
                element: Box::new(element),
                index: Some(Box::new(TypeDescriptor::basic(BasicType::Integer))),
            },
        }
    }

    pub fn set(element: TypeDescriptor) -> Self {
        TypeDescriptor::Collection {
            collection: CollectionType {
                nature: CollectionNature::Set,
                element: Box::new(element),
                index: None,
            },
        }
    }

    pub fn map(key: TypeDescriptor, element: TypeDescriptor) -> Self {
        TypeDescriptor::Collection {
            collection: CollectionType {
                nature: CollectionNature::Map,
                element: Box::new(element),
                index: Some(Box::new(key)),
            },
        }
    }

    /// Parse a model-file type string: a basic type name, an entity name,
    /// or a collection form such as `list<Item>`.
    ///
    /// Returns `None` when the string matches none of these forms. Entity
    /// names are not checked against a model here.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(caps) = COLLECTION_PATTERN.captures(s) {
            let first = Self::parse_simple(caps.get(2)?.as_str())?;
            let second = caps.get(3).map(|m| m.as_str());
            let collection = match (&caps[1], second) {
                ("list", None) => Self::list(first),
                ("set", None) => Self::set(first),
                ("bag", None) => TypeDescriptor::Collection {
                    collection: CollectionType {
                        nature: CollectionNature::Bag,
                        element: Box::new(first),
                        index: None,
                    },
                },
                ("map", Some(element)) => Self::map(first, Self::parse_simple(element)?),
                _ => return None,
            };
            return Some(collection);
        }
        Self::parse_simple(s)
    }

    fn parse_simple(s: &str) -> Option<Self> {
        if let Some(basic) = BasicType::from_str(s) {
            return Some(Self::basic(basic));
        }
        NAME_PATTERN.is_match(s).then(|| Self::entity(s))
    }

    pub fn as_basic(&self) -> Option<BasicType> {
        match self {
            TypeDescriptor::Basic { ty } => Some(*ty),
            _ => None,
        }
    }

    /// The entity name of a to-one association type.
    pub fn entity_name(&self) -> Option<&str> {
        match self {
            TypeDescriptor::Entity { name } => Some(name),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&CollectionType> {
        match self {
            TypeDescriptor::Collection { collection } => Some(collection),
            _ => None,
        }
    }

    pub fn is_plural(&self) -> bool {
        matches!(self, TypeDescriptor::Collection { .. })
    }

    /// True for a collection with an index type (list or map).
    pub fn is_indexed_collection(&self) -> bool {
        self.as_collection()
            .map(|c| c.index.is_some())
            .unwrap_or(false)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Basic { ty } => write!(f, "{}", ty.as_str()),
            TypeDescriptor::Entity { name } => write!(f, "{}", name),
            TypeDescriptor::Collection { collection } => match (&collection.nature, &collection.index) {
                (CollectionNature::Map, Some(key)) => {
                    write!(f, "map<{},{}>", key, collection.element)
                }
                (nature, _) => write!(f, "{}<{}>", nature.as_str(), collection.element),
            },
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub ty: TypeDescriptor,
}

/// A mapped domain type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    /// Fully-qualified class name, when the model gives one.
    pub class_name: Option<String>,
    pub super_type: Option<String>,
    /// Interface names implemented by this type (directly or inherited).
    pub implements: Vec<String>,
    /// All attributes, inherited ones first.
    pub attributes: Vec<Attribute>,
}

impl EntityType {
    pub fn attribute(&self, name: &str) -> Option<&TypeDescriptor> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.ty)
    }

    pub fn type_descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::entity(self.name.clone())
    }
}

/// A reference to a queryable type: either one mapped hierarchy or a name
/// satisfied by several unrelated hierarchies.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityReference {
    Concrete(Arc<EntityType>),
    Polymorphic(PolymorphicEntity),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolymorphicEntity {
    pub name: String,
    /// Hierarchy roots implementing `name`, in registration order.
    pub implementors: Vec<Arc<EntityType>>,
    /// Attributes every implementor declares with an identical type.
    pub common_attributes: Vec<Attribute>,
}

impl PolymorphicEntity {
    pub fn new(name: impl Into<String>, implementors: Vec<Arc<EntityType>>) -> Self {
        let common_attributes = match implementors.split_first() {
            Some((first, rest)) => first
                .attributes
                .iter()
                .filter(|attr| {
                    rest.iter()
                        .all(|other| other.attribute(&attr.name) == Some(&attr.ty))
                })
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Self {
            name: name.into(),
            implementors,
            common_attributes,
        }
    }
}

impl EntityReference {
    pub fn name(&self) -> &str {
        match self {
            EntityReference::Concrete(entity) => &entity.name,
            EntityReference::Polymorphic(poly) => &poly.name,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&TypeDescriptor> {
        match self {
            EntityReference::Concrete(entity) => entity.attribute(name),
            EntityReference::Polymorphic(poly) => poly
                .common_attributes
                .iter()
                .find(|a| a.name == name)
                .map(|a| &a.ty),
        }
    }

    pub fn is_polymorphic(&self) -> bool {
        matches!(self, EntityReference::Polymorphic(_))
    }

    pub fn as_concrete(&self) -> Option<&Arc<EntityType>> {
        match self {
            EntityReference::Concrete(entity) => Some(entity),
            EntityReference::Polymorphic(_) => None,
        }
    }

    pub fn type_descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::entity(self.name())
    }
}

// ============================================================================
// Table mapping
// ============================================================================

/// An attribute stored in a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedColumn {
    pub attribute: String,
    pub column: String,
}

/// One physical (or derived) table of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedTable {
    /// Table name; a name wrapped in parentheses is a derived table.
    pub name: String,
    pub key_column: String,
    pub columns: Vec<MappedColumn>,
    /// Rows may be absent for some entity instances.
    pub optional: bool,
    /// Primary table of the entity or one of its ancestors. Every instance
    /// has a row here.
    #[serde(default)]
    pub identifying: bool,
}

impl MappedTable {
    /// A table name wrapped in parentheses denotes a sub-select.
    pub fn is_derived(&self) -> bool {
        is_derived_table_name(&self.name)
    }

    pub fn column_for(&self, attribute: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.attribute == attribute)
            .map(|c| c.column.as_str())
    }
}

pub fn is_derived_table_name(name: &str) -> bool {
    let name = name.trim();
    name.len() >= 2 && name.starts_with('(') && name.ends_with(')')
}

/// How a plural attribute is stored: a foreign key on the element entity's
/// root table pointing back at the owner, plus an optional index column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMapping {
    pub attribute: String,
    pub foreign_key_column: String,
    pub index_column: Option<String>,
}

/// Every table an entity spans, root table first.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableShape {
    pub tables: Vec<MappedTable>,
    pub collections: Vec<CollectionMapping>,
}

impl TableShape {
    pub fn root(&self) -> Option<&MappedTable> {
        self.tables.first()
    }

    /// Tables after the root, in join order.
    pub fn secondary_tables(&self) -> &[MappedTable] {
        self.tables.get(1..).unwrap_or(&[])
    }

    /// Position of the table holding `attribute` and its column name.
    pub fn locate(&self, attribute: &str) -> Option<(usize, &str)> {
        self.tables
            .iter()
            .enumerate()
            .find_map(|(i, t)| t.column_for(attribute).map(|c| (i, c)))
    }

    pub fn collection(&self, attribute: &str) -> Option<&CollectionMapping> {
        self.collections.iter().find(|c| c.attribute == attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(name: &str, attrs: &[(&str, TypeDescriptor)]) -> Arc<EntityType> {
        Arc::new(EntityType {
            name: name.to_string(),
            class_name: None,
            super_type: None,
            implements: vec![],
            attributes: attrs
                .iter()
                .map(|(n, ty)| Attribute {
                    name: n.to_string(),
                    ty: ty.clone(),
                })
                .collect(),
        })
    }

    #[test]
    fn test_parse_basic_types() {
        assert_eq!(
            TypeDescriptor::parse("long"),
            Some(TypeDescriptor::basic(BasicType::Long))
        );
        assert_eq!(
            TypeDescriptor::parse("STRING"),
            Some(TypeDescriptor::basic(BasicType::String))
        );
    }

    #[test]
    fn test_parse_entity_and_collections() {
        assert_eq!(
            TypeDescriptor::parse("Customer"),
            Some(TypeDescriptor::entity("Customer"))
        );

        let list = TypeDescriptor::parse("list<LineItem>").expect("list type");
        assert!(list.is_indexed_collection());
        assert_eq!(list.to_string(), "list<LineItem>");

        let set = TypeDescriptor::parse("set< LineItem >").expect("set type");
        assert!(set.is_plural());
        assert!(!set.is_indexed_collection());

        let map = TypeDescriptor::parse("map<string,LineItem>").expect("map type");
        let collection = map.as_collection().expect("collection");
        assert_eq!(
            collection.index.as_deref(),
            Some(&TypeDescriptor::basic(BasicType::String))
        );
        assert_eq!(map.to_string(), "map<string,LineItem>");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(TypeDescriptor::parse("list<>"), None);
        assert_eq!(TypeDescriptor::parse("map<string>"), None);
        assert_eq!(TypeDescriptor::parse("set<a,b>"), None);
        assert_eq!(TypeDescriptor::parse("not a type"), None);
    }

    #[test]
    fn test_polymorphic_common_attributes() {
        let account = entity(
            "Account",
            &[
                ("id", TypeDescriptor::basic(BasicType::Long)),
                ("createdBy", TypeDescriptor::basic(BasicType::String)),
                ("balance", TypeDescriptor::basic(BasicType::Decimal)),
            ],
        );
        let fund = entity(
            "Fund",
            &[
                ("id", TypeDescriptor::basic(BasicType::Integer)),
                ("createdBy", TypeDescriptor::basic(BasicType::String)),
            ],
        );

        let poly = EntityReference::Polymorphic(PolymorphicEntity::new(
            "Auditable",
            vec![account, fund],
        ));

        assert!(poly.is_polymorphic());
        assert!(poly.attribute("createdBy").is_some());
        // Differing types are not common
        assert!(poly.attribute("id").is_none());
        assert!(poly.attribute("balance").is_none());
    }

    #[test]
    fn test_table_shape_locate() {
        let shape = TableShape {
            tables: vec![
                MappedTable {
                    name: "accounts".into(),
                    key_column: "id".into(),
                    columns: vec![MappedColumn {
                        attribute: "id".into(),
                        column: "id".into(),
                    }],
                    optional: false,
                    identifying: true,
                },
                MappedTable {
                    name: "savings_accounts".into(),
                    key_column: "account_id".into(),
                    columns: vec![MappedColumn {
                        attribute: "rate".into(),
                        column: "interest_rate".into(),
                    }],
                    optional: false,
                    identifying: true,
                },
            ],
            collections: vec![],
        };

        assert_eq!(shape.locate("rate"), Some((1, "interest_rate")));
        assert_eq!(shape.locate("id"), Some((0, "id")));
        assert_eq!(shape.locate("missing"), None);
        assert_eq!(shape.secondary_tables().len(), 1);
    }

    #[test]
    fn test_derived_table_name() {
        assert!(is_derived_table_name("(select * from accounts)"));
        assert!(!is_derived_table_name("accounts"));
        assert!(!is_derived_table_name("("));
    }
}
