//! Location handler: placement, movement, visibility and subtree copies.

pub mod mapper;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use metrics::counter;
use time::OffsetDateTime;
use tracing::info;

use crate::application::collaborators::ObjectStateHandler;
use crate::application::content::ContentHandler;
use crate::application::error::HandlerError;
use crate::application::gateway::{AssignmentOpcode, LocationGateway};
use crate::application::location::mapper::LocationMapper;
use crate::application::tree::TreeHandler;
use crate::domain::error::DomainError;
use crate::domain::location::Location;
use crate::domain::structs::{LocationCreateStruct, LocationUpdateStruct, MetadataUpdateStruct};
use crate::domain::types::{
    ContentId, LocationId, ObjectStateGroupId, ObjectStateId, SectionId, VersionNo,
};

/// Handler for location-tree operations.
///
/// Structural mutations of whole subtrees (removal, section propagation,
/// main-location changes) are delegated to [`TreeHandler`] so only one
/// component performs them. Operations assume an enclosing store-level
/// transaction; partial completion on gateway error is the caller's to
/// contain.
pub struct LocationHandler {
    location_gateway: Arc<dyn LocationGateway>,
    location_mapper: LocationMapper,
    content_handler: Arc<ContentHandler>,
    object_state_handler: Arc<dyn ObjectStateHandler>,
    tree_handler: Arc<TreeHandler>,
}

impl LocationHandler {
    pub fn new(
        location_gateway: Arc<dyn LocationGateway>,
        location_mapper: LocationMapper,
        content_handler: Arc<ContentHandler>,
        object_state_handler: Arc<dyn ObjectStateHandler>,
        tree_handler: Arc<TreeHandler>,
    ) -> Self {
        Self {
            location_gateway,
            location_mapper,
            content_handler,
            object_state_handler,
            tree_handler,
        }
    }

    pub async fn load(&self, location_id: LocationId) -> Result<Location, HandlerError> {
        self.tree_handler.load_location(location_id).await
    }

    pub async fn load_by_remote_id(&self, remote_id: &str) -> Result<Location, HandlerError> {
        let row = self
            .location_gateway
            .get_basic_node_data_by_remote_id(remote_id)
            .await?
            .ok_or_else(|| HandlerError::not_found("location", remote_id))?;
        Ok(self.location_mapper.create_location_from_row(&row))
    }

    pub async fn load_locations_by_content(
        &self,
        content_id: ContentId,
        root_location_id: Option<LocationId>,
    ) -> Result<Vec<Location>, HandlerError> {
        let rows = self
            .location_gateway
            .load_location_data_by_content(content_id, root_location_id)
            .await?;
        Ok(self.location_mapper.create_locations_from_rows(&rows))
    }

    /// Parent locations of the staged placements of a draft content.
    pub async fn load_parent_locations_for_draft_content(
        &self,
        content_id: ContentId,
    ) -> Result<Vec<Location>, HandlerError> {
        let rows = self
            .location_gateway
            .load_parent_location_data_for_draft_content(content_id)
            .await?;
        Ok(self.location_mapper.create_locations_from_rows(&rows))
    }

    /// Create a location under an existing parent, together with its
    /// bookkeeping node assignment.
    pub async fn create(
        &self,
        create_struct: &LocationCreateStruct,
    ) -> Result<Location, HandlerError> {
        let parent = self
            .location_gateway
            .get_basic_node_data(create_struct.parent_id)
            .await?
            .ok_or_else(|| HandlerError::not_found("location", create_struct.parent_id))?;
        let row = self.location_gateway.create(create_struct, &parent).await?;
        self.location_gateway
            .create_node_assignment(create_struct, parent.node_id, AssignmentOpcode::CreateNop)
            .await?;
        Ok(self.location_mapper.create_location_from_row(&row))
    }

    pub async fn update(
        &self,
        update_struct: &LocationUpdateStruct,
        location_id: LocationId,
    ) -> Result<(), HandlerError> {
        self.location_gateway.update(update_struct, location_id).await?;
        Ok(())
    }

    /// Move a subtree under a new parent, rewriting the materialized paths
    /// and repointing the node assignment. When the destination's content
    /// sits in a different section, that section spreads over the moved
    /// subtree.
    pub async fn move_subtree(
        &self,
        source_id: LocationId,
        destination_parent_id: LocationId,
    ) -> Result<(), HandlerError> {
        let source = self
            .location_gateway
            .get_basic_node_data(source_id)
            .await?
            .ok_or_else(|| HandlerError::not_found("location", source_id))?;
        let destination = self
            .location_gateway
            .get_basic_node_data(destination_parent_id)
            .await?
            .ok_or_else(|| HandlerError::not_found("location", destination_parent_id))?;

        self.location_gateway
            .move_subtree_nodes(&source, &destination)
            .await?;
        self.location_gateway
            .update_node_assignment(
                source.content_id,
                source.parent_id,
                destination_parent_id,
                AssignmentOpcode::Move,
            )
            .await?;

        let source_info = self.tree_handler.load_content_info(source.content_id).await?;
        let destination_info = self
            .tree_handler
            .load_content_info(destination.content_id)
            .await?;
        if source_info.section_id != destination_info.section_id {
            self.tree_handler
                .set_section_for_subtree(source_id, destination_info.section_id)
                .await?;
        }

        info!(source_id, destination_parent_id, "moved subtree");
        Ok(())
    }

    /// Atomically exchange the content assignments of two locations. Tree
    /// positions and descendants stay put.
    pub async fn swap(
        &self,
        location_id1: LocationId,
        location_id2: LocationId,
    ) -> Result<(), HandlerError> {
        self.location_gateway.swap(location_id1, location_id2).await?;
        Ok(())
    }

    /// Hide a node and cascade invisibility over its descendants.
    pub async fn hide(&self, location_id: LocationId) -> Result<(), HandlerError> {
        let row = self
            .location_gateway
            .get_basic_node_data(location_id)
            .await?
            .ok_or_else(|| HandlerError::not_found("location", location_id))?;
        self.location_gateway.hide_subtree(&row.path_string).await?;
        Ok(())
    }

    /// Reveal a node. Descendants hidden in their own right keep their flag;
    /// visibility recomputation below them is the gateway's business.
    pub async fn unhide(&self, location_id: LocationId) -> Result<(), HandlerError> {
        let row = self
            .location_gateway
            .get_basic_node_data(location_id)
            .await?
            .ok_or_else(|| HandlerError::not_found("location", location_id))?;
        self.location_gateway.unhide_subtree(&row.path_string).await?;
        Ok(())
    }

    /// Copy a whole subtree under a new parent.
    ///
    /// Each distinct content in the subtree is copied exactly once, assigned
    /// the default object state of every group, and published; every original
    /// row then gets a counterpart location, parents before children. For a
    /// content with several locations in the subtree, the copy of its
    /// original main location becomes main when that location was copied too,
    /// the first-created copy otherwise. The destination's section spreads
    /// over the copied subtree at the end.
    pub async fn copy_subtree(
        &self,
        source_id: LocationId,
        destination_parent_id: LocationId,
    ) -> Result<Location, HandlerError> {
        let children = self.location_gateway.get_subtree_content(source_id).await?;
        let first = children
            .first()
            .ok_or_else(|| HandlerError::not_found("location", source_id))?;
        let destination_parent = self
            .location_gateway
            .get_basic_node_data(destination_parent_id)
            .await?
            .ok_or_else(|| HandlerError::not_found("location", destination_parent_id))?;
        let default_states = self.default_content_states().await?;

        let mut subtree_locations: HashMap<ContentId, HashSet<LocationId>> = HashMap::new();
        for child in &children {
            subtree_locations
                .entry(child.content_id)
                .or_default()
                .insert(child.node_id);
        }

        struct CopiedNode {
            id: LocationId,
            hidden: bool,
            invisible: bool,
        }

        let mut location_map: HashMap<LocationId, CopiedNode> = HashMap::new();
        location_map.insert(
            first.parent_id,
            CopiedNode {
                id: destination_parent.node_id,
                hidden: destination_parent.hidden,
                invisible: destination_parent.invisible,
            },
        );

        let mut content_map: HashMap<ContentId, ContentId> = HashMap::new();
        let mut content_version_map: HashMap<ContentId, VersionNo> = HashMap::new();
        let mut main_locations: HashMap<ContentId, LocationId> = HashMap::new();
        let mut main_locations_update: HashMap<ContentId, LocationId> = HashMap::new();
        let now = OffsetDateTime::now_utc();
        let mut copied_root: Option<Location> = None;

        for child in &children {
            let new_content_id = match content_map.get(&child.content_id) {
                Some(new_content_id) => *new_content_id,
                None => {
                    let draft = self
                        .content_handler
                        .copy(child.content_id, Some(child.content_version_no))
                        .await?;
                    let draft_content_id = draft.version_info.content_info.id;
                    self.assign_default_states(draft_content_id, &default_states)
                        .await?;
                    let metadata = MetadataUpdateStruct {
                        publication_date: Some(now),
                        modification_date: Some(now),
                        ..MetadataUpdateStruct::default()
                    };
                    let published = self
                        .content_handler
                        .publish(draft_content_id, draft.version_info.version_no, &metadata)
                        .await?;
                    content_map.insert(child.content_id, draft_content_id);
                    content_version_map
                        .insert(child.content_id, published.version_info.version_no);
                    draft_content_id
                }
            };

            let parent = location_map.get(&child.parent_id).ok_or_else(|| {
                DomainError::invariant("subtree rows are not ordered parents-first")
            })?;

            let mut create_struct = self.location_mapper.create_struct_from_row(child);
            create_struct.content_id = new_content_id;
            create_struct.content_version_no = content_version_map[&child.content_id];
            create_struct.parent_id = parent.id;
            create_struct.invisible =
                create_struct.invisible || parent.hidden || parent.invisible;

            // The first copied location of a content starts out as main; when
            // the original main location is inside the subtree but copied
            // later, the flag is remapped after the walk.
            if let std::collections::hash_map::Entry::Vacant(entry) =
                main_locations.entry(child.content_id)
            {
                create_struct.is_main = true;
                if subtree_locations[&child.content_id].contains(&child.main_node_id)
                    && child.main_node_id != child.node_id
                {
                    entry.insert(child.main_node_id);
                    main_locations_update.insert(child.content_id, child.main_node_id);
                } else {
                    entry.insert(child.node_id);
                }
            } else {
                create_struct.is_main = false;
            }

            let new_location = self.create(&create_struct).await?;
            location_map.insert(
                child.node_id,
                CopiedNode {
                    id: new_location.id,
                    hidden: new_location.hidden,
                    invisible: new_location.invisible,
                },
            );
            if copied_root.is_none() {
                copied_root = Some(new_location);
            }
        }

        for (original_content_id, original_main_node) in &main_locations_update {
            let new_content_id = content_map[original_content_id];
            let new_main_id = location_map[original_main_node].id;
            self.tree_handler
                .change_main_location(new_content_id, new_main_id)
                .await?;
        }

        let copied_root = copied_root
            .ok_or_else(|| DomainError::invariant("copied subtree produced no root"))?;
        let destination_info = self
            .tree_handler
            .load_content_info(destination_parent.content_id)
            .await?;
        self.tree_handler
            .set_section_for_subtree(copied_root.id, destination_info.section_id)
            .await?;

        counter!("strato_subtree_copy_total").increment(1);
        info!(
            source_id,
            destination_parent_id,
            copied_root = copied_root.id,
            contents = content_map.len(),
            "copied subtree"
        );
        Ok(copied_root)
    }

    pub async fn remove_subtree(&self, location_id: LocationId) -> Result<(), HandlerError> {
        self.tree_handler.remove_subtree(location_id).await
    }

    pub async fn set_section_for_subtree(
        &self,
        location_id: LocationId,
        section_id: SectionId,
    ) -> Result<(), HandlerError> {
        self.tree_handler
            .set_section_for_subtree(location_id, section_id)
            .await
    }

    pub async fn change_main_location(
        &self,
        content_id: ContentId,
        location_id: LocationId,
    ) -> Result<(), HandlerError> {
        self.tree_handler
            .change_main_location(content_id, location_id)
            .await
    }

    pub async fn count_locations_by_content(
        &self,
        content_id: ContentId,
    ) -> Result<u64, HandlerError> {
        Ok(self
            .location_gateway
            .count_locations_by_content_id(content_id)
            .await?)
    }

    pub async fn delete_children_drafts(
        &self,
        location_id: LocationId,
    ) -> Result<(), HandlerError> {
        self.tree_handler.delete_children_drafts(location_id).await
    }

    /// Default object state of every group, first state wins.
    async fn default_content_states(
        &self,
    ) -> Result<Vec<(ObjectStateGroupId, ObjectStateId)>, HandlerError> {
        let mut defaults = Vec::new();
        for group in self.object_state_handler.load_all_groups().await? {
            if let Some(state) = self
                .object_state_handler
                .load_object_states(group.id)
                .await?
                .into_iter()
                .next()
            {
                defaults.push((group.id, state.id));
            }
        }
        Ok(defaults)
    }

    async fn assign_default_states(
        &self,
        content_id: ContentId,
        defaults: &[(ObjectStateGroupId, ObjectStateId)],
    ) -> Result<(), HandlerError> {
        for (group_id, state_id) in defaults {
            self.object_state_handler
                .set_content_state(content_id, *group_id, *state_id)
                .await?;
        }
        Ok(())
    }
}
