//! Location-tree structural operations shared by the content and location
//! handlers.
//!
//! All multi-node walks are strictly depth-first, children before their
//! ancestor, so the materialized paths and node assignments stay consistent
//! at every intermediate step. The handler assumes an enclosing store-level
//! transaction and performs no compensation on partial failure.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info};

use crate::application::error::HandlerError;
use crate::application::fields::FieldHandler;
use crate::application::gateway::{ContentGateway, LocationGateway};
use crate::application::location::mapper::LocationMapper;
use crate::application::mapper::Mapper;
use crate::domain::content::{ContentInfo, VersionInfo};
use crate::domain::location::Location;
use crate::domain::types::{ContentId, LocationId, SectionId};

pub struct TreeHandler {
    content_gateway: Arc<dyn ContentGateway>,
    location_gateway: Arc<dyn LocationGateway>,
    mapper: Mapper,
    location_mapper: LocationMapper,
    field_handler: Arc<FieldHandler>,
}

impl TreeHandler {
    pub fn new(
        content_gateway: Arc<dyn ContentGateway>,
        location_gateway: Arc<dyn LocationGateway>,
        mapper: Mapper,
        location_mapper: LocationMapper,
        field_handler: Arc<FieldHandler>,
    ) -> Self {
        Self {
            content_gateway,
            location_gateway,
            mapper,
            location_mapper,
            field_handler,
        }
    }

    pub async fn load_location(&self, location_id: LocationId) -> Result<Location, HandlerError> {
        let row = self
            .location_gateway
            .get_basic_node_data(location_id)
            .await?
            .ok_or_else(|| HandlerError::not_found("location", location_id))?;
        Ok(self.location_mapper.create_location_from_row(&row))
    }

    pub async fn load_content_info(
        &self,
        content_id: ContentId,
    ) -> Result<ContentInfo, HandlerError> {
        let row = self
            .content_gateway
            .load_content_info(content_id)
            .await?
            .ok_or_else(|| HandlerError::not_found("content", content_id))?;
        Ok(self.mapper.extract_content_info_from_row(&row))
    }

    pub async fn list_versions(
        &self,
        content_id: ContentId,
    ) -> Result<Vec<VersionInfo>, HandlerError> {
        let rows = self.content_gateway.list_versions(content_id, None).await?;
        let pairs: Vec<_> = rows
            .iter()
            .map(|row| (row.version.content_id, row.version.version_no))
            .collect();
        let name_rows = self
            .content_gateway
            .load_versioned_name_data(&pairs)
            .await?;
        Ok(self
            .mapper
            .extract_version_info_list_from_rows(&rows, &name_rows))
    }

    /// Delete every row belonging to a content that no location references
    /// any more: fields (external data first), relations pointing both ways,
    /// versions, names, then the content row itself.
    pub async fn remove_raw_content(&self, content_id: ContentId) -> Result<(), HandlerError> {
        let content_info = self.load_content_info(content_id).await?;
        for version_info in self.list_versions(content_id).await? {
            self.field_handler
                .delete_fields(content_id, &version_info)
                .await?;
        }
        // Field and asset relations held by other contents must go before the
        // content's own relation rows.
        self.content_gateway
            .remove_reverse_field_relations(content_id)
            .await?;
        self.content_gateway.delete_relations(content_id, None).await?;
        self.content_gateway.delete_versions(content_id, None).await?;
        self.content_gateway.delete_names(content_id, None).await?;
        self.content_gateway.delete_content(content_id).await?;
        info!(
            content_id,
            remote_id = %content_info.remote_id,
            "removed raw content"
        );
        Ok(())
    }

    /// Remove a whole subtree, deepest nodes first.
    ///
    /// For each node: when it is the main location of its content and the
    /// content has no other location, the content is removed outright; when
    /// other locations remain, one of them is promoted to main before the
    /// node goes away. No content keeps a dangling main location.
    pub async fn remove_subtree(&self, location_id: LocationId) -> Result<(), HandlerError> {
        if self
            .location_gateway
            .get_basic_node_data(location_id)
            .await?
            .is_none()
        {
            return Err(HandlerError::not_found("location", location_id));
        }

        // Explicit stack instead of recursion; post-order is preserved by
        // revisiting a node after its children were expanded.
        let mut stack = vec![(location_id, false)];
        while let Some((node_id, children_done)) = stack.pop() {
            if children_done {
                self.remove_single_location(node_id).await?;
                continue;
            }
            stack.push((node_id, true));
            let children = self.location_gateway.get_children(node_id).await?;
            for child in children.into_iter().rev() {
                stack.push((child.node_id, false));
            }
        }

        counter!("strato_subtree_removal_total").increment(1);
        info!(location_id, "removed subtree");
        Ok(())
    }

    pub async fn set_section_for_subtree(
        &self,
        location_id: LocationId,
        section_id: SectionId,
    ) -> Result<(), HandlerError> {
        let row = self
            .location_gateway
            .get_basic_node_data(location_id)
            .await?
            .ok_or_else(|| HandlerError::not_found("location", location_id))?;
        self.location_gateway
            .set_section_for_subtree(&row.path_string, section_id)
            .await?;
        Ok(())
    }

    /// Promote a location to be its content's main location and align the
    /// subtree's section with the new parent's content.
    pub async fn change_main_location(
        &self,
        content_id: ContentId,
        location_id: LocationId,
    ) -> Result<(), HandlerError> {
        let parent_id = self.load_location(location_id).await?.parent_id;
        let current_version_no = self.load_content_info(content_id).await?.current_version_no;
        self.location_gateway
            .change_main_location(content_id, location_id, current_version_no, parent_id)
            .await?;

        let parent_content_id = self.load_location(parent_id).await?.content_id;
        let section_id = self.load_content_info(parent_content_id).await?.section_id;
        self.set_section_for_subtree(location_id, section_id).await?;
        Ok(())
    }

    /// Remove draft contents staged under a subtree, deepest nodes first.
    /// Contents whose main location lies outside the subtree are left alone.
    pub async fn delete_children_drafts(&self, location_id: LocationId) -> Result<(), HandlerError> {
        let mut stack = vec![(location_id, false)];
        while let Some((node_id, children_done)) = stack.pop() {
            if children_done {
                self.remove_node_drafts(node_id).await?;
                continue;
            }
            stack.push((node_id, true));
            let children = self.location_gateway.get_children(node_id).await?;
            for child in children.into_iter().rev() {
                stack.push((child.node_id, false));
            }
        }
        Ok(())
    }

    async fn remove_node_drafts(&self, node_id: LocationId) -> Result<(), HandlerError> {
        let draft_content_ids = self
            .location_gateway
            .get_subtree_children_draft_content_ids(node_id)
            .await?;
        for content_id in draft_content_ids {
            let Some(row) = self.content_gateway.load_content_info(content_id).await? else {
                continue;
            };
            match row.main_location_id {
                Some(main_location_id) if main_location_id != node_id => continue,
                _ => self.remove_raw_content(content_id).await?,
            }
        }
        Ok(())
    }

    async fn remove_single_location(&self, node_id: LocationId) -> Result<(), HandlerError> {
        let Some(row) = self.location_gateway.get_basic_node_data(node_id).await? else {
            // Already gone; a sibling walk removed the content's only location.
            return Ok(());
        };
        let content_id = row.content_id;

        if node_id == row.main_node_id {
            if self
                .location_gateway
                .count_locations_by_content_id(content_id)
                .await?
                == 1
            {
                self.remove_raw_content(content_id).await?;
            } else if let Some(fallback) = self
                .location_gateway
                .get_fallback_main_node_data(content_id, node_id)
                .await?
            {
                self.change_main_location(content_id, fallback.node_id).await?;
            }
        }

        self.location_gateway.remove_location(node_id).await?;
        self.location_gateway
            .delete_node_assignment(content_id, None)
            .await?;
        debug!(node_id, content_id, "removed location");
        Ok(())
    }
}
