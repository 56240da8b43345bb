//! Domain-model metadata.
//!
//! Both analysis phases and SQL lowering read the domain model through the
//! [`MetadataProvider`] trait:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     MetadataProvider                         │
//! │  - resolve_entity_reference()  name / class → Concrete |     │
//! │                                 Polymorphic                  │
//! │  - entity_type()               attributes + type descriptors │
//! │  - table_shape()               tables, columns, collections  │
//! └──────────────────────────────────────────────────────────────┘
//!                           ▲
//!                           │
//! ┌──────────────────────────────────────────────────────────────┐
//! │   InMemoryMetadata  ◄──  EntityDefinition (builder)          │
//! │                     ◄──  ModelFile (TOML / JSON)             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use orql::metadata::{EntityDefinition, InMemoryMetadata, MetadataProvider};
//!
//! let metadata = InMemoryMetadata::builder()
//!     .entity(EntityDefinition::new("Account").table("accounts").attribute("id", "long"))
//!     .build()?;
//! let account = metadata.resolve_entity_reference("Account");
//! ```

mod error;
mod in_memory;
mod model_file;
mod provider;
mod types;

pub use error::{MetadataError, MetadataResult};
pub use in_memory::{InMemoryMetadata, MetadataBuilder};
pub use model_file::{AttributeDefinition, EntityDefinition, ModelFile, SecondaryTableDefinition};
pub use provider::MetadataProvider;
pub use types::*;
