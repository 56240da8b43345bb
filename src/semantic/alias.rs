//! Implicit alias generation.

/// Produces aliases for from-elements the query left unaliased.
///
/// Generated aliases have the form `<gen:N>`, counting from 0 per generator.
/// `<` and `:` cannot appear in a user identifier, so a generated alias never
/// collides with an explicit one. Each compilation owns its own generator.
#[derive(Debug, Default)]
pub struct AliasGenerator {
    next: usize,
}

impl AliasGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_alias(&mut self) -> String {
        let alias = format!("<gen:{}>", self.next);
        self.next += 1;
        alias
    }

    /// True for aliases this generator's format produces.
    pub fn is_generated(alias: &str) -> bool {
        alias.starts_with("<gen:") && alias.ends_with('>')
    }
}
