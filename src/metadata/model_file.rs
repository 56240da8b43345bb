//! Serde model file describing entities and their table mapping.
//!
//! Example (TOML):
//! ```toml
//! [[entity]]
//! name = "Order"
//! class = "com.example.Order"
//! table = "orders"
//!
//! [[entity.attribute]]
//! name = "id"
//! type = "long"
//!
//! [[entity.attribute]]
//! name = "customer"
//! type = "Customer"
//! column = "customer_id"
//!
//! [[entity.attribute]]
//! name = "items"
//! type = "list<LineItem>"
//! foreign_key = "order_id"
//! index_column = "position"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{MetadataError, MetadataResult};

fn default_key_column() -> String {
    "id".to_string()
}

/// Root of a model file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    #[serde(default, rename = "entity")]
    pub entities: Vec<EntityDefinition>,
}

impl ModelFile {
    /// Load a model file, choosing the format from the extension.
    pub fn load(path: &Path) -> MetadataResult<Self> {
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            _ => Err(MetadataError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn from_toml_str(content: &str) -> MetadataResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> MetadataResult<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

/// One mapped entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,

    #[serde(default, rename = "class", skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,

    #[serde(default, rename = "extends", skip_serializing_if = "Option::is_none")]
    pub super_type: Option<String>,

    #[serde(default)]
    pub implements: Vec<String>,

    /// Own table; when absent, declared attributes live in the nearest
    /// ancestor's table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    #[serde(default = "default_key_column")]
    pub key_column: String,

    #[serde(default, rename = "attribute")]
    pub attributes: Vec<AttributeDefinition>,

    #[serde(default, rename = "secondary_table")]
    pub secondary_tables: Vec<SecondaryTableDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,

    #[serde(rename = "type")]
    pub ty: String,

    /// Column name; defaults to the attribute name, or `<name>_id` for a
    /// to-one association.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,

    /// For collections: column on the element's root table referencing the owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,

    /// For indexed collections: the index column on the element's root table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_column: Option<String>,
}

/// An extra table joined to the entity's own table on the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryTableDefinition {
    pub name: String,

    #[serde(default = "default_key_column")]
    pub key_column: String,

    /// Attributes stored in this table.
    pub attributes: Vec<String>,

    #[serde(default)]
    pub optional: bool,
}

impl EntityDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_name: None,
            super_type: None,
            implements: Vec::new(),
            table: None,
            key_column: default_key_column(),
            attributes: Vec::new(),
            secondary_tables: Vec::new(),
        }
    }

    pub fn class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn extends(mut self, super_type: impl Into<String>) -> Self {
        self.super_type = Some(super_type.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.implements.push(interface.into());
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = column.into();
        self
    }

    /// Add an attribute with the default column.
    pub fn attribute(self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.push_attribute(name, ty, None, None, None)
    }

    /// Add an attribute stored in an explicitly named column.
    pub fn attribute_in(
        self,
        name: impl Into<String>,
        ty: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        self.push_attribute(name, ty, Some(column.into()), None, None)
    }

    /// Add a collection attribute.
    pub fn collection(
        self,
        name: impl Into<String>,
        ty: impl Into<String>,
        foreign_key: impl Into<String>,
        index_column: Option<&str>,
    ) -> Self {
        self.push_attribute(
            name,
            ty,
            None,
            Some(foreign_key.into()),
            index_column.map(str::to_string),
        )
    }

    pub fn secondary_table(
        mut self,
        name: impl Into<String>,
        key_column: impl Into<String>,
        attributes: &[&str],
        optional: bool,
    ) -> Self {
        self.secondary_tables.push(SecondaryTableDefinition {
            name: name.into(),
            key_column: key_column.into(),
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
            optional,
        });
        self
    }

    fn push_attribute(
        mut self,
        name: impl Into<String>,
        ty: impl Into<String>,
        column: Option<String>,
        foreign_key: Option<String>,
        index_column: Option<String>,
    ) -> Self {
        self.attributes.push(AttributeDefinition {
            name: name.into(),
            ty: ty.into(),
            column,
            foreign_key,
            index_column,
        });
        self
    }
}
