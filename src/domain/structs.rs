//! Transient request structs consumed once by handler operations.

use std::collections::BTreeMap;

use time::OffsetDateTime;

use crate::domain::content::Field;
use crate::domain::location::{SortField, SortOrder};
use crate::domain::relation::RelationType;
use crate::domain::types::{
    ContentId, ContentTypeId, FieldDefinitionId, LanguageId, LocationId, SectionId, UserId,
    VersionNo,
};

/// Request to create a new content item with its first version.
#[derive(Debug, Clone)]
pub struct CreateStruct {
    /// Per-language display names.
    pub name: BTreeMap<String, String>,
    pub content_type_id: ContentTypeId,
    pub section_id: SectionId,
    pub owner_id: UserId,
    pub fields: Vec<Field>,
    /// Parent placements, staged as node assignments until publish.
    pub locations: Vec<LocationCreateStruct>,
    pub always_available: bool,
    pub remote_id: String,
    pub initial_language_code: String,
    pub modified: OffsetDateTime,
}

/// Request to update the fields and names of one draft version.
#[derive(Debug, Clone)]
pub struct UpdateStruct {
    pub name: BTreeMap<String, String>,
    pub creator_id: UserId,
    pub fields: Vec<Field>,
    pub modification_date: OffsetDateTime,
    pub initial_language_code: String,
}

/// Request to update content-level metadata only.
#[derive(Debug, Clone, Default)]
pub struct MetadataUpdateStruct {
    pub owner_id: Option<UserId>,
    pub name: Option<String>,
    pub publication_date: Option<OffsetDateTime>,
    pub modification_date: Option<OffsetDateTime>,
    pub main_language_id: Option<LanguageId>,
    pub always_available: Option<bool>,
    pub remote_id: Option<String>,
}

/// Request to place a content item at a new position in the tree.
#[derive(Debug, Clone)]
pub struct LocationCreateStruct {
    pub priority: i32,
    pub hidden: bool,
    pub invisible: bool,
    pub remote_id: String,
    pub content_id: ContentId,
    pub content_version_no: VersionNo,
    pub parent_id: LocationId,
    pub path_identification_string: Option<String>,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
    /// Whether the created node becomes the content's main location.
    pub is_main: bool,
}

/// Request to update non-structural attributes of an existing location.
#[derive(Debug, Clone)]
pub struct LocationUpdateStruct {
    pub priority: i32,
    pub remote_id: String,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
}

/// Request to create a relation edge.
#[derive(Debug, Clone)]
pub struct RelationCreateStruct {
    pub source_content_id: ContentId,
    pub source_content_version_no: VersionNo,
    pub source_field_definition_id: Option<FieldDefinitionId>,
    pub destination_content_id: ContentId,
    pub relation_type: RelationType,
}
