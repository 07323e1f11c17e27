//! Content aggregate: identity metadata, version revisions and field values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::types::{
    ContentId, ContentTypeId, FieldDefinitionId, FieldId, LocationId, SectionId, UserId, VersionNo,
};

/// Content-level lifecycle status, denormalized onto the content row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    Published,
    Trashed,
}

impl ContentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Published => "published",
            ContentStatus::Trashed => "trashed",
        }
    }
}

/// Status of one version revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    Draft,
    Published,
    Archived,
}

impl VersionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VersionStatus::Draft => "draft",
            VersionStatus::Published => "published",
            VersionStatus::Archived => "archived",
        }
    }
}

impl TryFrom<&str> for VersionStatus {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "draft" => Ok(VersionStatus::Draft),
            "published" => Ok(VersionStatus::Published),
            "archived" => Ok(VersionStatus::Archived),
            _ => Err(()),
        }
    }
}

/// Always-current identity and metadata of a content item. One row per
/// content; never versioned itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentInfo {
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
    pub publication_date: Option<OffsetDateTime>,
    pub modification_date: Option<OffsetDateTime>,
}

/// One revision of a content item. Identity (content id, version no) is
/// immutable once created; only the status transitions afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Version row id; 0 until the row has been inserted.
    pub id: i64,
    pub version_no: VersionNo,
    pub content_info: ContentInfo,
    pub creator_id: UserId,
    pub creation_date: OffsetDateTime,
    pub modification_date: OffsetDateTime,
    pub initial_language_code: String,
    /// Languages carrying field data in this version.
    pub language_codes: Vec<String>,
    pub status: VersionStatus,
    /// Per-language display names.
    pub names: BTreeMap<String, String>,
}

/// Opaque field payload. The lightweight `data` representation lives in the
/// field row; `external_data` is owned by the field type's storage engine and
/// only hydrated on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub data: serde_json::Value,
    pub external_data: serde_json::Value,
    pub sort_key: Option<String>,
}

/// One value for one field definition, in one language, in one version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Field row id; `None` until inserted. Stable across versions of the
    /// same content (the version number completes the key).
    pub id: Option<FieldId>,
    pub field_definition_id: FieldDefinitionId,
    pub field_type: String,
    pub value: FieldValue,
    pub language_code: String,
    pub version_no: Option<VersionNo>,
}

/// Aggregate of one version and its fields. A projection over content,
/// version and field rows; never persisted as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub version_info: VersionInfo,
    pub fields: Vec<Field>,
}
