//! The SQL AST produced by lowering.
//!
//! Every from-element becomes a [`TableGroup`]: its entity's root table plus
//! one [`TableSpecificationJoin`] per further table. Groups hang off a
//! [`TableSpace`], one per from-clause space. Rendering flattens spaces and
//! groups into a single FROM/JOIN list.

use std::fmt;

use serde::Serialize;

use crate::metadata::is_derived_table_name;
use crate::semantic::tree::Parameter;

use super::dml::{Delete, Update};
use super::error::{ConversionError, ConversionResult};
use super::expr::{table_col, Expr};
use super::plan::{ParameterBinder, QueryPlan};
use super::query::{Join, JoinType, OrderByExpr, Query, SelectExpr, TableRef};
use super::token::TokenStream;

// ============================================================================
// Tables
// ============================================================================

/// One physical or derived table with its SQL alias.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSpecification {
    /// Table name, or parenthesized sub-select text for a derived table.
    pub name: String,
    pub alias: String,
    pub derived: bool,
}

impl TableSpecification {
    /// A name wrapped in parentheses is a derived table; anything else is a
    /// physical table reference.
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        let name = name.into();
        let derived = is_derived_table_name(&name);
        Self {
            name,
            alias: alias.into(),
            derived,
        }
    }

    pub fn table_ref(&self) -> TableRef {
        if self.derived {
            TableRef::derived(&self.name).with_alias(&self.alias)
        } else {
            TableRef::new(&self.name).with_alias(&self.alias)
        }
    }
}

/// A table joined into a group.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpecificationJoin {
    pub join_type: JoinType,
    pub table: TableSpecification,
    pub predicate: Option<Expr>,
}

impl TableSpecificationJoin {
    pub fn new(
        join_type: JoinType,
        table: TableSpecification,
        predicate: Option<Expr>,
    ) -> ConversionResult<Self> {
        check_join(join_type, &table.alias, predicate.is_some())?;
        Ok(Self {
            join_type,
            table,
            predicate,
        })
    }

    fn to_join(&self) -> Join {
        Join {
            join_type: self.join_type,
            table: self.table.table_ref(),
            on: self.predicate.clone(),
        }
    }
}

fn check_join(join_type: JoinType, alias: &str, has_predicate: bool) -> ConversionResult<()> {
    if join_type == JoinType::Cross && has_predicate {
        return Err(ConversionError::IllegalJoinSpecification(format!(
            "cross join to '{}' cannot have a join predicate",
            alias
        )));
    }
    Ok(())
}

/// Where an attribute of a group is stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnBinding {
    pub attribute: String,
    pub table_alias: String,
    pub column: String,
}

// ============================================================================
// Groups and spaces
// ============================================================================

/// The SQL expansion of one from-element.
#[derive(Debug, Clone, PartialEq)]
pub struct TableGroup {
    /// Alias of the from-element; table aliases are `<alias>_<position>`.
    pub alias: String,
    pub entity: String,
    pub root: TableSpecification,
    pub key_column: String,
    pub secondary: Vec<TableSpecificationJoin>,
    pub columns: Vec<ColumnBinding>,
}

impl TableGroup {
    /// Table alias for the table at `position` within the group.
    pub fn table_alias(alias: &str, position: usize) -> String {
        format!("{}_{}", alias, position)
    }

    /// The root table's key column.
    pub fn key(&self) -> Expr {
        table_col(&self.root.alias, &self.key_column)
    }

    pub fn column(&self, attribute: &str) -> Option<Expr> {
        self.columns
            .iter()
            .find(|c| c.attribute == attribute)
            .map(|c| table_col(&c.table_alias, &c.column))
    }

    /// The key followed by every mapped column, for selecting a whole entity.
    pub fn all_columns(&self) -> Vec<Expr> {
        std::iter::once(self.key())
            .chain(
                self.columns
                    .iter()
                    .filter(|c| !(c.table_alias == self.root.alias && c.column == self.key_column))
                    .map(|c| table_col(&c.table_alias, &c.column)),
            )
            .collect()
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSpecification> {
        std::iter::once(&self.root).chain(self.secondary.iter().map(|j| &j.table))
    }
}

/// A group joined to a space.
#[derive(Debug, Clone, PartialEq)]
pub struct TableGroupJoin {
    pub join_type: JoinType,
    pub group: TableGroup,
    pub predicate: Option<Expr>,
}

impl TableGroupJoin {
    pub fn new(
        join_type: JoinType,
        group: TableGroup,
        predicate: Option<Expr>,
    ) -> ConversionResult<Self> {
        check_join(join_type, &group.alias, predicate.is_some())?;
        Ok(Self {
            join_type,
            group,
            predicate,
        })
    }
}

/// The SQL expansion of one from-clause space.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpace {
    pub root: TableGroup,
    pub joins: Vec<TableGroupJoin>,
}

impl TableSpace {
    pub fn new(root: TableGroup) -> Self {
        Self {
            root,
            joins: Vec::new(),
        }
    }

    pub fn groups(&self) -> impl Iterator<Item = &TableGroup> {
        std::iter::once(&self.root).chain(self.joins.iter().map(|j| &j.group))
    }
}

// ============================================================================
// Statements
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlSelect {
    pub distinct: bool,
    pub selections: Vec<SelectExpr>,
    pub spaces: Vec<TableSpace>,
    pub where_clause: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
}

impl SqlSelect {
    /// Flatten spaces into one FROM list. Later spaces are cross joined.
    /// Secondary tables of a LEFT joined group are LEFT joined as well.
    pub fn to_query(&self) -> Query {
        let mut query = Query::new().select(self.selections.clone());
        query.distinct = self.distinct;

        for (i, space) in self.spaces.iter().enumerate() {
            let root = &space.root;
            if i == 0 {
                query = query.from(root.root.table_ref());
            } else {
                query = query.join(JoinType::Cross, root.root.table_ref(), None);
            }
            query.joins.extend(root.secondary.iter().map(TableSpecificationJoin::to_join));

            for join in &space.joins {
                query.joins.push(Join {
                    join_type: join.join_type,
                    table: join.group.root.table_ref(),
                    on: join.predicate.clone(),
                });
                // Null-extended rows of an outer joined group survive its
                // secondary joins
                query.joins.extend(join.group.secondary.iter().map(|secondary| {
                    let mut rendered = secondary.to_join();
                    if join.join_type == JoinType::Left {
                        rendered.join_type = JoinType::Left;
                    }
                    rendered
                }));
            }
        }

        query.where_clause = self.where_clause.clone();
        query.order_by = self.order_by.clone();
        query
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SqlStatement {
    Select(SqlSelect),
    Update(Update),
    Delete(Delete),
}

impl SqlStatement {
    pub fn to_tokens(&self) -> TokenStream {
        match self {
            SqlStatement::Select(select) => select.to_query().to_tokens(),
            SqlStatement::Update(update) => update.to_tokens(),
            SqlStatement::Delete(delete) => delete.to_tokens(),
        }
    }

    pub fn to_sql(&self) -> String {
        self.to_tokens().to_string()
    }

    /// SQL text plus one binder per placeholder.
    pub fn query_plan(&self) -> QueryPlan {
        let tokens = self.to_tokens();
        let binders = tokens
            .placeholders()
            .enumerate()
            .map(|(i, parameter)| ParameterBinder::new(parameter, i + 1))
            .collect();
        QueryPlan {
            sql: tokens.to_string(),
            binders,
        }
    }
}

impl fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}

/// Lowered form of one semantic statement: one SQL statement per split
/// tree, in split order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlAst {
    pub statements: Vec<SqlStatement>,
}

impl SqlAst {
    pub fn sql_statements(&self) -> Vec<String> {
        self.statements.iter().map(SqlStatement::to_sql).collect()
    }

    /// Distinct parameters across all statements, in first-placeholder order.
    pub fn parameter_bindings(&self) -> Vec<Parameter> {
        let mut found: Vec<Parameter> = Vec::new();
        for statement in &self.statements {
            for parameter in statement.to_tokens().placeholders() {
                if !found.iter().any(|p| p.kind == parameter.kind) {
                    found.push(parameter.clone());
                }
            }
        }
        found
    }

    pub fn query_plans(&self) -> Vec<QueryPlan> {
        self.statements.iter().map(SqlStatement::query_plan).collect()
    }
}
