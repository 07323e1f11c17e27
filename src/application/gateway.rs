//! Gateway traits describing the relational store boundary.
//!
//! Gateways own every query and statement; the handlers above them never see
//! SQL. Each read returns typed row structs keyed by query shape rather than
//! loose column maps, so handler code gets checked field access.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::content::{ContentStatus, FieldValue, VersionStatus};
use crate::domain::location::{SortField, SortOrder};
use crate::domain::relation::RelationType;
use crate::domain::structs::{
    CreateStruct, LocationCreateStruct, LocationUpdateStruct, MetadataUpdateStruct,
    RelationCreateStruct, UpdateStruct,
};
use crate::domain::types::{
    ContentId, ContentTypeId, FieldDefinitionId, FieldId, LanguageId, LocationId, RelationId,
    SectionId, UserId, VersionNo,
};
use crate::domain::content::{Content, Field, VersionInfo};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl GatewayError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }
}

/// Content-row slice shared by every content query shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentInfoRow {
    pub id: ContentId,
    pub content_type_id: ContentTypeId,
    pub section_id: SectionId,
    pub owner_id: UserId,
    pub remote_id: String,
    pub name: String,
    pub current_version_no: VersionNo,
    pub main_language_code: String,
    pub main_location_id: Option<LocationId>,
    pub always_available: bool,
    pub status: ContentStatus,
    pub publication_date: Option<time::OffsetDateTime>,
    pub modification_date: Option<time::OffsetDateTime>,
}

/// Version-row slice shared by version query shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionRow {
    pub id: i64,
    pub content_id: ContentId,
    pub version_no: VersionNo,
    pub status: VersionStatus,
    pub creator_id: UserId,
    pub creation_date: time::OffsetDateTime,
    pub modification_date: time::OffsetDateTime,
    pub initial_language_code: String,
    pub language_codes: Vec<String>,
}

/// Field-row slice joined into content loads.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRow {
    pub id: FieldId,
    pub field_definition_id: FieldDefinitionId,
    pub field_type: String,
    pub language_code: String,
    pub version_no: VersionNo,
    pub value: FieldValue,
}

/// One row of a full content load: content info joined with one version and
/// at most one field. Loads emit one row per field of the version.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRow {
    pub info: ContentInfoRow,
    pub version: VersionRow,
    pub field: Option<FieldRow>,
}

/// One row of a version-info load (no field join).
#[derive(Debug, Clone, PartialEq)]
pub struct VersionInfoRow {
    pub info: ContentInfoRow,
    pub version: VersionRow,
}

/// Versioned per-language display name row.
#[derive(Debug, Clone, PartialEq)]
pub struct NameRow {
    pub content_id: ContentId,
    pub version_no: VersionNo,
    pub language_code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationRow {
    pub id: RelationId,
    pub source_content_id: ContentId,
    pub source_content_version_no: VersionNo,
    pub source_field_definition_id: Option<FieldDefinitionId>,
    pub destination_content_id: ContentId,
    pub relation_type: RelationType,
}

/// Raw location-tree node row.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRow {
    pub node_id: LocationId,
    pub parent_id: LocationId,
    pub content_id: ContentId,
    pub content_version_no: VersionNo,
    pub main_node_id: LocationId,
    pub remote_id: String,
    pub path_string: String,
    pub path_identification_string: String,
    pub depth: i32,
    pub priority: i32,
    pub hidden: bool,
    pub invisible: bool,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
}

/// One entry of the URL-alias table for a location, in one language.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlAliasRow {
    pub text: String,
}

/// Node-assignment operation recorded when an assignment row is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOpcode {
    /// Staged placement to be materialized into a location on publish.
    Create,
    /// Placement already materialized; row kept for bookkeeping only.
    CreateNop,
    /// Placement moved to a new parent.
    Move,
}

/// Low-level CRUD over content, version, field, name and relation rows.
#[async_trait]
pub trait ContentGateway: Send + Sync {
    /// Insert the content row, returning the new content id.
    async fn insert_content_object(
        &self,
        create_struct: &CreateStruct,
        current_version_no: VersionNo,
    ) -> Result<ContentId, GatewayError>;

    /// Insert a version row, returning the version row id.
    async fn insert_version(
        &self,
        version_info: &VersionInfo,
        fields: &[Field],
    ) -> Result<i64, GatewayError>;

    /// Apply content-level metadata changes.
    async fn update_content(
        &self,
        content_id: ContentId,
        update: &MetadataUpdateStruct,
    ) -> Result<(), GatewayError>;

    /// Apply version-level changes (modification date, creator, initial language).
    async fn update_version(
        &self,
        content_id: ContentId,
        version_no: VersionNo,
        update: &UpdateStruct,
    ) -> Result<(), GatewayError>;

    /// Insert a new field row, returning the new field id.
    async fn insert_new_field(
        &self,
        content: &Content,
        field: &Field,
    ) -> Result<FieldId, GatewayError>;

    /// Insert a field row reusing the field id of an earlier version.
    async fn insert_existing_field(
        &self,
        content: &Content,
        field: &Field,
    ) -> Result<(), GatewayError>;

    /// Rewrite the stored value of one field row.
    async fn update_field(&self, field: &Field) -> Result<(), GatewayError>;

    /// Rewrite the stored value of an untranslatable field for every language
    /// row of its definition in one statement.
    async fn update_non_translatable_field(
        &self,
        field: &Field,
        content_id: ContentId,
    ) -> Result<(), GatewayError>;

    /// Load content rows for one version (`None` selects the current one),
    /// optionally restricted to the given languages. Empty when the content
    /// or version does not exist.
    async fn load(
        &self,
        content_id: ContentId,
        version_no: Option<VersionNo>,
        languages: Option<&[String]>,
    ) -> Result<Vec<ContentRow>, GatewayError>;

    /// Batched current-version load for several content items.
    async fn load_content_list(
        &self,
        content_ids: &[ContentId],
        languages: Option<&[String]>,
    ) -> Result<Vec<ContentRow>, GatewayError>;

    async fn load_content_info(
        &self,
        content_id: ContentId,
    ) -> Result<Option<ContentInfoRow>, GatewayError>;

    async fn load_content_info_by_remote_id(
        &self,
        remote_id: &str,
    ) -> Result<Option<ContentInfoRow>, GatewayError>;

    /// Load version-info rows for one version (`None` selects the current one).
    async fn load_version_info(
        &self,
        content_id: ContentId,
        version_no: Option<VersionNo>,
    ) -> Result<Vec<VersionInfoRow>, GatewayError>;

    /// Batched current-version info load.
    async fn load_version_info_list(
        &self,
        content_ids: &[ContentId],
    ) -> Result<Vec<VersionInfoRow>, GatewayError>;

    /// Highest version number ever assigned for the content.
    async fn get_last_version_number(
        &self,
        content_id: ContentId,
    ) -> Result<VersionNo, GatewayError>;

    /// All versions of one content, ascending by version number, optionally
    /// filtered by status.
    async fn list_versions(
        &self,
        content_id: ContentId,
        status: Option<VersionStatus>,
    ) -> Result<Vec<VersionInfoRow>, GatewayError>;

    /// Versions created by the given user in the given status.
    async fn list_versions_for_user(
        &self,
        user_id: UserId,
        status: VersionStatus,
    ) -> Result<Vec<VersionInfoRow>, GatewayError>;

    /// Name rows for the given (content id, version no) pairs.
    async fn load_versioned_name_data(
        &self,
        pairs: &[(ContentId, VersionNo)],
    ) -> Result<Vec<NameRow>, GatewayError>;

    /// Upsert one per-language display name for a version.
    async fn set_name(
        &self,
        content_id: ContentId,
        version_no: VersionNo,
        name: &str,
        language_code: &str,
    ) -> Result<(), GatewayError>;

    /// Set a non-published status on a version row. Returns whether a row was
    /// affected.
    async fn set_status(
        &self,
        content_id: ContentId,
        version_no: VersionNo,
        status: VersionStatus,
    ) -> Result<bool, GatewayError>;

    /// Mark a version published: flips the version status, the content-level
    /// status and the content's current-version pointer together.
    async fn set_published_status(
        &self,
        content_id: ContentId,
        version_no: VersionNo,
    ) -> Result<(), GatewayError>;

    async fn insert_relation(
        &self,
        create_struct: &RelationCreateStruct,
    ) -> Result<RelationId, GatewayError>;

    async fn load_relation(
        &self,
        relation_id: RelationId,
    ) -> Result<Option<RelationRow>, GatewayError>;

    /// Relations originating at a content (version), optionally filtered by type.
    async fn load_relations(
        &self,
        source_content_id: ContentId,
        source_version_no: Option<VersionNo>,
        relation_type: Option<RelationType>,
    ) -> Result<Vec<RelationRow>, GatewayError>;

    /// Paged variant of [`ContentGateway::load_relations`] over the current version.
    async fn load_relation_list(
        &self,
        source_content_id: ContentId,
        limit: u32,
        offset: u32,
        relation_type: Option<RelationType>,
    ) -> Result<Vec<RelationRow>, GatewayError>;

    /// Relations pointing at a content from published versions.
    async fn load_reverse_relations(
        &self,
        destination_content_id: ContentId,
        relation_type: Option<RelationType>,
    ) -> Result<Vec<RelationRow>, GatewayError>;

    async fn count_reverse_relations(
        &self,
        destination_content_id: ContentId,
        relation_type: Option<RelationType>,
    ) -> Result<u64, GatewayError>;

    async fn delete_relation(
        &self,
        relation_id: RelationId,
        relation_type: RelationType,
    ) -> Result<(), GatewayError>;

    /// Delete relations originating at a content, for one version or all.
    async fn delete_relations(
        &self,
        content_id: ContentId,
        version_no: Option<VersionNo>,
    ) -> Result<(), GatewayError>;

    /// Drop field and asset relations held by other contents that point at
    /// the given content.
    async fn remove_reverse_field_relations(
        &self,
        content_id: ContentId,
    ) -> Result<(), GatewayError>;

    /// Duplicate relation rows from one content to another, for one version
    /// or all.
    async fn copy_relations(
        &self,
        source_content_id: ContentId,
        destination_content_id: ContentId,
        version_no: Option<VersionNo>,
    ) -> Result<(), GatewayError>;

    /// Field ids of one version (or all versions) grouped by field type
    /// identifier.
    async fn get_field_ids_by_type(
        &self,
        content_id: ContentId,
        version_no: Option<VersionNo>,
    ) -> Result<BTreeMap<String, Vec<FieldId>>, GatewayError>;

    async fn delete_fields(
        &self,
        content_id: ContentId,
        version_no: Option<VersionNo>,
    ) -> Result<(), GatewayError>;

    async fn delete_versions(
        &self,
        content_id: ContentId,
        version_no: Option<VersionNo>,
    ) -> Result<(), GatewayError>;

    async fn delete_names(
        &self,
        content_id: ContentId,
        version_no: Option<VersionNo>,
    ) -> Result<(), GatewayError>;

    /// Delete the content row itself. Last step of raw content removal.
    async fn delete_content(&self, content_id: ContentId) -> Result<(), GatewayError>;

    /// Node ids of every location referencing the content.
    async fn get_all_location_ids(
        &self,
        content_id: ContentId,
    ) -> Result<Vec<LocationId>, GatewayError>;
}

/// Low-level CRUD over location-tree and node-assignment rows.
#[async_trait]
pub trait LocationGateway: Send + Sync {
    async fn get_basic_node_data(
        &self,
        location_id: LocationId,
    ) -> Result<Option<LocationRow>, GatewayError>;

    async fn get_basic_node_data_by_remote_id(
        &self,
        remote_id: &str,
    ) -> Result<Option<LocationRow>, GatewayError>;

    /// Location rows of one content, optionally restricted to a subtree root.
    async fn load_location_data_by_content(
        &self,
        content_id: ContentId,
        root_location_id: Option<LocationId>,
    ) -> Result<Vec<LocationRow>, GatewayError>;

    /// Parent locations of the pending node assignments of a draft content.
    async fn load_parent_location_data_for_draft_content(
        &self,
        content_id: ContentId,
    ) -> Result<Vec<LocationRow>, GatewayError>;

    /// Every row of the subtree rooted at the location, path-ordered so
    /// parents precede their children.
    async fn get_subtree_content(
        &self,
        location_id: LocationId,
    ) -> Result<Vec<LocationRow>, GatewayError>;

    /// Direct children of a location, path-ordered.
    async fn get_children(
        &self,
        location_id: LocationId,
    ) -> Result<Vec<LocationRow>, GatewayError>;

    /// Content ids of draft contents whose main placement hangs under the
    /// given location.
    async fn get_subtree_children_draft_content_ids(
        &self,
        location_id: LocationId,
    ) -> Result<Vec<ContentId>, GatewayError>;

    /// Rewrite the materialized paths of a whole subtree under a new parent.
    async fn move_subtree_nodes(
        &self,
        source: &LocationRow,
        destination: &LocationRow,
    ) -> Result<(), GatewayError>;

    /// Repoint a node-assignment row at a new parent.
    async fn update_node_assignment(
        &self,
        content_id: ContentId,
        old_parent_id: LocationId,
        new_parent_id: LocationId,
        opcode: AssignmentOpcode,
    ) -> Result<(), GatewayError>;

    /// Materialize pending node assignments of a version into real locations.
    async fn create_locations_from_node_assignments(
        &self,
        content_id: ContentId,
        version_no: VersionNo,
    ) -> Result<(), GatewayError>;

    /// Point the content's location rows at the newly published version.
    async fn update_locations_content_version_no(
        &self,
        content_id: ContentId,
        version_no: VersionNo,
    ) -> Result<(), GatewayError>;

    /// Insert a location row under the given parent, returning it.
    async fn create(
        &self,
        create_struct: &LocationCreateStruct,
        parent: &LocationRow,
    ) -> Result<LocationRow, GatewayError>;

    async fn create_node_assignment(
        &self,
        create_struct: &LocationCreateStruct,
        parent_id: LocationId,
        opcode: AssignmentOpcode,
    ) -> Result<(), GatewayError>;

    /// Delete node assignments of a content, for one version or all.
    async fn delete_node_assignment(
        &self,
        content_id: ContentId,
        version_no: Option<VersionNo>,
    ) -> Result<(), GatewayError>;

    async fn update(
        &self,
        update_struct: &LocationUpdateStruct,
        location_id: LocationId,
    ) -> Result<(), GatewayError>;

    async fn remove_location(&self, location_id: LocationId) -> Result<(), GatewayError>;

    /// Another location of the content usable as its main location, excluding
    /// the given node.
    async fn get_fallback_main_node_data(
        &self,
        content_id: ContentId,
        excluded_location_id: LocationId,
    ) -> Result<Option<LocationRow>, GatewayError>;

    async fn change_main_location(
        &self,
        content_id: ContentId,
        location_id: LocationId,
        version_no: VersionNo,
        parent_location_id: LocationId,
    ) -> Result<(), GatewayError>;

    async fn count_locations_by_content_id(
        &self,
        content_id: ContentId,
    ) -> Result<u64, GatewayError>;

    /// Set the section of every node whose path starts with the given prefix.
    async fn set_section_for_subtree(
        &self,
        path_string: &str,
        section_id: SectionId,
    ) -> Result<(), GatewayError>;

    async fn hide_subtree(&self, path_string: &str) -> Result<(), GatewayError>;

    async fn unhide_subtree(&self, path_string: &str) -> Result<(), GatewayError>;

    /// Exchange the content assignments of two nodes in place.
    async fn swap(
        &self,
        location_id1: LocationId,
        location_id2: LocationId,
    ) -> Result<(), GatewayError>;

    async fn update_path_identification_string(
        &self,
        location_id: LocationId,
        parent_location_id: LocationId,
        text: &str,
    ) -> Result<(), GatewayError>;
}

/// Read slice of the URL-alias subsystem consumed by metadata updates.
#[async_trait]
pub trait UrlAliasGateway: Send + Sync {
    /// Alias entries of a location in the given language, most specific first.
    async fn load_location_entries(
        &self,
        location_id: LocationId,
        language_id: LanguageId,
    ) -> Result<Vec<UrlAliasRow>, GatewayError>;
}
