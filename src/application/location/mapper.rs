//! Location row-to-domain transformation.

use uuid::Uuid;

use crate::application::gateway::LocationRow;
use crate::domain::location::Location;
use crate::domain::structs::LocationCreateStruct;

#[derive(Debug, Clone, Default)]
pub struct LocationMapper;

impl LocationMapper {
    pub fn new() -> Self {
        Self
    }

    pub fn create_location_from_row(&self, row: &LocationRow) -> Location {
        Location {
            id: row.node_id,
            priority: row.priority,
            hidden: row.hidden,
            invisible: row.invisible,
            remote_id: row.remote_id.clone(),
            content_id: row.content_id,
            content_version_no: row.content_version_no,
            parent_id: row.parent_id,
            path_identification_string: row.path_identification_string.clone(),
            path_string: row.path_string.clone(),
            depth: row.depth,
            sort_field: row.sort_field,
            sort_order: row.sort_order,
            main_location_id: row.main_node_id,
        }
    }

    pub fn create_locations_from_rows(&self, rows: &[LocationRow]) -> Vec<Location> {
        rows.iter()
            .map(|row| self.create_location_from_row(row))
            .collect()
    }

    /// Derive a create struct that re-creates the given node elsewhere.
    /// Content, parent and main flags are patched by the caller; a fresh
    /// remote id keeps the copy distinct from its source.
    pub fn create_struct_from_row(&self, row: &LocationRow) -> LocationCreateStruct {
        LocationCreateStruct {
            priority: row.priority,
            hidden: row.hidden,
            invisible: row.invisible,
            remote_id: Uuid::new_v4().simple().to_string(),
            content_id: row.content_id,
            content_version_no: row.content_version_no,
            parent_id: row.parent_id,
            path_identification_string: if row.path_identification_string.is_empty() {
                None
            } else {
                Some(row.path_identification_string.clone())
            },
            sort_field: row.sort_field,
            sort_order: row.sort_order,
            is_main: false,
        }
    }
}
