//! Location tree nodes and materialized-path helpers.

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;
use crate::domain::types::{ContentId, LocationId, VersionNo};

/// Field a location's children are ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Path,
    Published,
    Modified,
    Section,
    Depth,
    Priority,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// A node placing a content item at one position in the tree.
///
/// `path_string` is the materialized ancestor path (`/1/2/69/`) and is kept
/// consistent with the `parent_id` chain by every structural mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub priority: i32,
    pub hidden: bool,
    /// Set when this node or any ancestor is hidden.
    pub invisible: bool,
    pub remote_id: String,
    pub content_id: ContentId,
    pub content_version_no: VersionNo,
    pub parent_id: LocationId,
    pub path_identification_string: String,
    pub path_string: String,
    pub depth: i32,
    pub sort_field: SortField,
    pub sort_order: SortOrder,
    /// Node id of the content's main location.
    pub main_location_id: LocationId,
}

impl Location {
    /// Whether this node is the main location of its content.
    pub fn is_main(&self) -> bool {
        self.id == self.main_location_id
    }
}

/// Parse a materialized path (`/1/2/69/`) into its node ids, root first.
pub fn path_node_ids(path: &str) -> Result<Vec<LocationId>, DomainError> {
    if !path.starts_with('/') || !path.ends_with('/') {
        return Err(DomainError::invalid_path(path));
    }
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            segment
                .parse::<LocationId>()
                .map_err(|_| DomainError::invalid_path(path))
        })
        .collect()
}

/// Materialized path of a child node under `parent_path`.
pub fn child_path(parent_path: &str, id: LocationId) -> String {
    format!("{parent_path}{id}/")
}
