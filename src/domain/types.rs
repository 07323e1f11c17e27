//! Shared identifier aliases and collaborator-owned schema types.

use serde::{Deserialize, Serialize};

use crate::domain::content::FieldValue;

/// Row id of a content object.
pub type ContentId = i64;
/// Per-content version number, starting at 1.
pub type VersionNo = i32;
/// Row id of a location (tree node).
pub type LocationId = i64;
/// Row id of a single field value.
pub type FieldId = i64;
/// Row id of a field definition within a content type.
pub type FieldDefinitionId = i64;
/// Row id of a content type.
pub type ContentTypeId = i64;
/// Row id of a section.
pub type SectionId = i64;
/// Row id of a repository user.
pub type UserId = i64;
/// Row id of a language.
pub type LanguageId = i64;
/// Row id of a relation edge.
pub type RelationId = i64;
/// Row id of an object state.
pub type ObjectStateId = i64;
/// Row id of an object state group.
pub type ObjectStateGroupId = i64;

/// Schema-level description of a content type, as served by the content-type
/// subsystem. Only the slice this crate consumes is modeled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentType {
    pub id: ContentTypeId,
    pub identifier: String,
    pub field_definitions: Vec<FieldDefinition>,
}

/// One attribute declared by a content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: FieldDefinitionId,
    pub identifier: String,
    pub field_type: String,
    pub is_translatable: bool,
    pub default_value: FieldValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Language {
    pub id: LanguageId,
    pub language_code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectStateGroup {
    pub id: ObjectStateGroupId,
    pub identifier: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectState {
    pub id: ObjectStateId,
    pub group_id: ObjectStateGroupId,
    pub identifier: String,
    pub priority: i32,
}
