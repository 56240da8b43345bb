//! Per-compilation state shared by the two analysis phases.

use crate::metadata::MetadataProvider;

use super::alias::AliasGenerator;
use super::from_clause::FromClauseIndex;

/// Everything one compilation needs besides the parse tree.
///
/// The from-clause indexer fills it (`&mut`), the query builder only reads
/// it. A context is never reused across compilations.
pub struct ParsingContext<'m> {
    metadata: &'m dyn MetadataProvider,
    aliases: AliasGenerator,
    from_clauses: FromClauseIndex,
}

impl<'m> ParsingContext<'m> {
    pub fn new(metadata: &'m dyn MetadataProvider) -> Self {
        Self {
            metadata,
            aliases: AliasGenerator::new(),
            from_clauses: FromClauseIndex::new(),
        }
    }

    pub fn metadata(&self) -> &'m dyn MetadataProvider {
        self.metadata
    }

    pub fn alias_generator(&mut self) -> &mut AliasGenerator {
        &mut self.aliases
    }

    pub fn from_clause_index(&self) -> &FromClauseIndex {
        &self.from_clauses
    }

    pub fn from_clause_index_mut(&mut self) -> &mut FromClauseIndex {
        &mut self.from_clauses
    }
}

impl std::fmt::Debug for ParsingContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsingContext")
            .field("aliases", &self.aliases)
            .field("from_clauses", &self.from_clauses)
            .finish_non_exhaustive()
    }
}
