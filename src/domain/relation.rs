//! Typed directed links between content items.

use serde::{Deserialize, Serialize};

use crate::domain::types::{ContentId, FieldDefinitionId, RelationId, VersionNo};

/// Kind of a relation edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// Object-level relation added explicitly by an editor.
    Common,
    /// Relation embedded inside rich-text content.
    Embed,
    /// Relation held by a relation-typed field value.
    Field,
    /// Relation held by an asset-typed field value.
    Asset,
}

impl RelationType {
    pub fn as_str(self) -> &'static str {
        match self {
            RelationType::Common => "common",
            RelationType::Embed => "embed",
            RelationType::Field => "field",
            RelationType::Asset => "asset",
        }
    }
}

/// Directed edge from a source content version to a destination content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Relation row id; 0 until inserted.
    pub id: RelationId,
    pub source_content_id: ContentId,
    pub source_content_version_no: VersionNo,
    /// Set when the relation is held by a specific field.
    pub source_field_definition_id: Option<FieldDefinitionId>,
    pub destination_content_id: ContentId,
    pub relation_type: RelationType,
}
