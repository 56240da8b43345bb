//! MetadataProvider trait definition.

use std::sync::Arc;

use super::types::{EntityReference, EntityType, TableShape};

/// Read-only access to the domain model.
///
/// Consumed by both analysis phases and by SQL lowering. Implementations
/// must be shareable across compilations, which each run single-threaded.
///
/// # Example
///
/// ```ignore
/// use orql::metadata::MetadataProvider;
///
/// fn describe(provider: &dyn MetadataProvider) {
///     if let Some(reference) = provider.resolve_entity_reference("com.example.Auditable") {
///         println!("{} polymorphic={}", reference.name(), reference.is_polymorphic());
///     }
/// }
/// ```
pub trait MetadataProvider: Send + Sync {
    /// Resolve an entity name or class name to a queryable reference.
    ///
    /// A name that is not itself mapped but is implemented by several
    /// unrelated hierarchies yields a polymorphic reference whose
    /// implementors follow registration order. A name implemented by a
    /// single hierarchy collapses to that hierarchy's root type.
    fn resolve_entity_reference(&self, name: &str) -> Option<EntityReference>;

    /// Look up a mapped entity by entity name.
    fn entity_type(&self, name: &str) -> Option<Arc<EntityType>>;

    /// The tables an entity spans.
    fn table_shape(&self, entity: &str) -> Option<&TableShape>;
}
