//! Executable form of a lowered statement.

use serde::{Serialize, Serializer};

use crate::metadata::TypeDescriptor;
use crate::semantic::tree::{Parameter, ParameterKind, ParameterType};

/// SQL text and the parameter to bind at each placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPlan {
    pub sql: String,
    pub binders: Vec<ParameterBinder>,
}

/// Binds one query parameter to one `?` placeholder.
///
/// A parameter used twice gets two binders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterBinder {
    #[serde(serialize_with = "display_kind")]
    pub parameter: ParameterKind,
    /// 1-based placeholder position.
    pub position: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ty: Option<TypeDescriptor>,
}

impl ParameterBinder {
    pub fn new(parameter: &Parameter, position: usize) -> Self {
        let ty = match &parameter.ty {
            ParameterType::Resolved(ty) => Some(ty.clone()),
            ParameterType::Unresolved => None,
        };
        Self {
            parameter: parameter.kind.clone(),
            position,
            ty,
        }
    }
}

fn display_kind<S: Serializer>(kind: &ParameterKind, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(kind)
}
