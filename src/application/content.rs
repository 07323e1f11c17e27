//! Top-level content persistence handler: versioned create, publish, draft,
//! load, update, copy, delete and relations.
//!
//! Every operation issues its gateway calls sequentially and assumes an
//! enclosing store-level transaction; there is no retry and no compensation
//! on partial failure.

use std::collections::BTreeMap;
use std::sync::Arc;

use metrics::counter;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::application::collaborators::{ContentTypeHandler, LanguageHandler};
use crate::application::error::HandlerError;
use crate::application::fields::FieldHandler;
use crate::application::gateway::{
    AssignmentOpcode, ContentGateway, LocationGateway, UrlAliasGateway,
};
use crate::application::mapper::Mapper;
use crate::application::tree::TreeHandler;
use crate::config::RepositoryOptions;
use crate::domain::content::{Content, ContentInfo, VersionInfo, VersionStatus};
use crate::domain::relation::{Relation, RelationType};
use crate::domain::slug::SlugConverter;
use crate::domain::structs::{
    CreateStruct, MetadataUpdateStruct, RelationCreateStruct, UpdateStruct,
};
use crate::domain::types::{
    ContentId, ContentType, ContentTypeId, RelationId, UserId, VersionNo,
};

pub struct ContentHandler {
    content_gateway: Arc<dyn ContentGateway>,
    location_gateway: Arc<dyn LocationGateway>,
    url_alias_gateway: Arc<dyn UrlAliasGateway>,
    mapper: Mapper,
    field_handler: Arc<FieldHandler>,
    slug_converter: SlugConverter,
    content_type_handler: Arc<dyn ContentTypeHandler>,
    language_handler: Arc<dyn LanguageHandler>,
    tree_handler: Arc<TreeHandler>,
    options: RepositoryOptions,
}

impl ContentHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        content_gateway: Arc<dyn ContentGateway>,
        location_gateway: Arc<dyn LocationGateway>,
        url_alias_gateway: Arc<dyn UrlAliasGateway>,
        mapper: Mapper,
        field_handler: Arc<FieldHandler>,
        slug_converter: SlugConverter,
        content_type_handler: Arc<dyn ContentTypeHandler>,
        language_handler: Arc<dyn LanguageHandler>,
        tree_handler: Arc<TreeHandler>,
        options: RepositoryOptions,
    ) -> Self {
        Self {
            content_gateway,
            location_gateway,
            url_alias_gateway,
            mapper,
            field_handler,
            slug_converter,
            content_type_handler,
            language_handler,
            tree_handler,
            options,
        }
    }

    /// Create a new content item with a first draft version and one staged
    /// node assignment per requested parent location. The assignments become
    /// real locations on publish.
    pub async fn create(&self, create_struct: &CreateStruct) -> Result<Content, HandlerError> {
        self.language_handler
            .load_by_language_code(&create_struct.initial_language_code)
            .await?
            .ok_or_else(|| {
                HandlerError::not_found("language", &create_struct.initial_language_code)
            })?;

        let content = self.internal_create(create_struct, 1).await?;
        let content_id = content.version_info.content_info.id;

        for location in &create_struct.locations {
            let mut location = location.clone();
            location.content_id = content_id;
            location.content_version_no = 1;
            self.location_gateway
                .create_node_assignment(&location, location.parent_id, AssignmentOpcode::Create)
                .await?;
        }

        info!(content_id, "created content draft");
        Ok(content)
    }

    /// Publish one version: archive the previously current version if any,
    /// persist the metadata changes, materialize staged node assignments
    /// into locations and flip the version to published.
    pub async fn publish(
        &self,
        content_id: ContentId,
        version_no: VersionNo,
        metadata: &MetadataUpdateStruct,
    ) -> Result<Content, HandlerError> {
        let version_info = self.load_version_info(content_id, Some(version_no)).await?;
        if version_info.content_info.current_version_no != version_no {
            self.set_status(
                content_id,
                VersionStatus::Archived,
                version_info.content_info.current_version_no,
            )
            .await?;
        }

        // Full load runs the external-storage side effects before the version
        // goes live.
        let content = self.load(content_id, Some(version_no), None).await?;
        self.content_gateway.update_content(content_id, metadata).await?;
        self.location_gateway
            .create_locations_from_node_assignments(content_id, version_no)
            .await?;
        self.location_gateway
            .update_locations_content_version_no(content_id, version_no)
            .await?;
        self.set_status(content_id, VersionStatus::Published, version_no)
            .await?;

        counter!("strato_content_publish_total").increment(1);
        info!(content_id, version_no, "published content version");

        if let Some(limit) = self.options.version_archive_limit {
            self.trim_archived_versions(content_id, limit).await?;
        }

        Ok(content)
    }

    /// Derive a new draft from an existing version. Field rows are carried
    /// over referencing the same external data; relations of the source
    /// version are duplicated onto the new one.
    pub async fn create_draft_from_version(
        &self,
        content_id: ContentId,
        source_version_no: VersionNo,
        user_id: UserId,
    ) -> Result<Content, HandlerError> {
        let mut content = self.load(content_id, Some(source_version_no), None).await?;
        let new_version_no = self
            .content_gateway
            .get_last_version_number(content_id)
            .await?
            + 1;

        let mut version_info = self.mapper.create_version_info_for_content(
            &content,
            new_version_no,
            user_id,
            OffsetDateTime::now_utc(),
        );
        version_info.id = self
            .content_gateway
            .insert_version(&version_info, &content.fields)
            .await?;
        content.version_info = version_info;

        self.field_handler
            .create_existing_fields_in_new_version(&mut content)
            .await?;

        for relation in self
            .load_relations(content_id, Some(source_version_no), None)
            .await?
        {
            let create_struct = RelationCreateStruct {
                source_content_id: content_id,
                source_content_version_no: new_version_no,
                source_field_definition_id: relation.source_field_definition_id,
                destination_content_id: relation.destination_content_id,
                relation_type: relation.relation_type,
            };
            self.content_gateway.insert_relation(&create_struct).await?;
        }

        debug!(content_id, new_version_no, "created draft from version");
        Ok(content)
    }

    /// Load one version of a content item (`None` selects the current one),
    /// optionally restricted to the given languages.
    pub async fn load(
        &self,
        content_id: ContentId,
        version_no: Option<VersionNo>,
        languages: Option<&[String]>,
    ) -> Result<Content, HandlerError> {
        let rows = self
            .content_gateway
            .load(content_id, version_no, languages)
            .await?;
        if rows.is_empty() {
            return Err(HandlerError::not_found("content", content_id));
        }

        let content_type = self.load_content_type(rows[0].info.content_type_id).await?;
        let name_rows = self
            .content_gateway
            .load_versioned_name_data(&[(content_id, rows[0].version.version_no)])
            .await?;
        let mut content = self
            .mapper
            .extract_content_from_rows(&rows, &name_rows, &content_type)
            .into_iter()
            .next()
            .ok_or_else(|| HandlerError::not_found("content", content_id))?;

        self.field_handler.load_external_field_data(&mut content).await?;
        Ok(content)
    }

    /// Batched current-version load. Contents that reference a missing
    /// content type are omitted rather than failing the whole batch.
    pub async fn load_content_list(
        &self,
        content_ids: &[ContentId],
        languages: Option<&[String]>,
    ) -> Result<BTreeMap<ContentId, Content>, HandlerError> {
        let rows = self
            .content_gateway
            .load_content_list(content_ids, languages)
            .await?;

        let mut grouped: BTreeMap<ContentId, Vec<_>> = BTreeMap::new();
        for row in rows {
            grouped.entry(row.info.id).or_default().push(row);
        }

        let pairs: Vec<_> = grouped
            .iter()
            .map(|(content_id, group)| (*content_id, group[0].version.version_no))
            .collect();
        let name_rows = self
            .content_gateway
            .load_versioned_name_data(&pairs)
            .await?;

        let mut contents = BTreeMap::new();
        for (content_id, group) in grouped {
            let Some(content_type) = self
                .content_type_handler
                .load(group[0].info.content_type_id)
                .await?
            else {
                continue;
            };
            let names: Vec<_> = name_rows
                .iter()
                .filter(|name| name.content_id == content_id)
                .cloned()
                .collect();
            if let Some(mut content) = self
                .mapper
                .extract_content_from_rows(&group, &names, &content_type)
                .into_iter()
                .next()
            {
                self.field_handler.load_external_field_data(&mut content).await?;
                contents.insert(content_id, content);
            }
        }
        Ok(contents)
    }

    pub async fn load_content_info(
        &self,
        content_id: ContentId,
    ) -> Result<ContentInfo, HandlerError> {
        self.tree_handler.load_content_info(content_id).await
    }

    pub async fn load_content_info_by_remote_id(
        &self,
        remote_id: &str,
    ) -> Result<ContentInfo, HandlerError> {
        let row = self
            .content_gateway
            .load_content_info_by_remote_id(remote_id)
            .await?
            .ok_or_else(|| HandlerError::not_found("content", remote_id))?;
        Ok(self.mapper.extract_content_info_from_row(&row))
    }

    pub async fn load_version_info(
        &self,
        content_id: ContentId,
        version_no: Option<VersionNo>,
    ) -> Result<VersionInfo, HandlerError> {
        let rows = self
            .content_gateway
            .load_version_info(content_id, version_no)
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| HandlerError::not_found("content version", content_id))?;
        let name_rows = self
            .content_gateway
            .load_versioned_name_data(&[(content_id, row.version.version_no)])
            .await?;
        Ok(self.mapper.extract_version_info_from_row(row, &name_rows))
    }

    pub async fn list_versions(
        &self,
        content_id: ContentId,
    ) -> Result<Vec<VersionInfo>, HandlerError> {
        self.tree_handler.list_versions(content_id).await
    }

    /// Batched current-version info load.
    pub async fn load_version_info_list(
        &self,
        content_ids: &[ContentId],
    ) -> Result<BTreeMap<ContentId, VersionInfo>, HandlerError> {
        let rows = self
            .content_gateway
            .load_version_info_list(content_ids)
            .await?;
        let pairs: Vec<_> = rows
            .iter()
            .map(|row| (row.version.content_id, row.version.version_no))
            .collect();
        let name_rows = self
            .content_gateway
            .load_versioned_name_data(&pairs)
            .await?;
        Ok(rows
            .iter()
            .map(|row| {
                (
                    row.version.content_id,
                    self.mapper.extract_version_info_from_row(row, &name_rows),
                )
            })
            .collect())
    }

    /// Draft versions created by the given user.
    pub async fn load_drafts_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<VersionInfo>, HandlerError> {
        let rows = self
            .content_gateway
            .list_versions_for_user(user_id, VersionStatus::Draft)
            .await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
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

    /// Update the fields and names of one draft version and return the
    /// reloaded aggregate.
    pub async fn update_content(
        &self,
        content_id: ContentId,
        version_no: VersionNo,
        update: &UpdateStruct,
    ) -> Result<Content, HandlerError> {
        let content_info = self.load_content_info(content_id).await?;
        let content_type = self.load_content_type(content_info.content_type_id).await?;

        self.content_gateway
            .update_version(content_id, version_no, update)
            .await?;
        let content = self.load(content_id, Some(version_no), None).await?;
        self.field_handler
            .update_fields(&content, update, &content_type)
            .await?;
        for (language_code, name) in &update.name {
            self.content_gateway
                .set_name(content_id, version_no, name, language_code)
                .await?;
        }

        self.load(content_id, Some(version_no), None).await
    }

    /// Update content-level metadata. A main-language change recomputes the
    /// path-identification string of every location of the content.
    pub async fn update_metadata(
        &self,
        content_id: ContentId,
        update: &MetadataUpdateStruct,
    ) -> Result<ContentInfo, HandlerError> {
        self.content_gateway.update_content(content_id, update).await?;
        self.update_path_identification_strings(content_id, update)
            .await?;
        self.load_content_info(content_id).await
    }

    /// Set a version's status, routing published transitions through the
    /// dedicated gateway operation that also moves the content's
    /// current-version pointer.
    pub async fn set_status(
        &self,
        content_id: ContentId,
        status: VersionStatus,
        version_no: VersionNo,
    ) -> Result<bool, HandlerError> {
        if status == VersionStatus::Published {
            self.content_gateway
                .set_published_status(content_id, version_no)
                .await?;
            Ok(true)
        } else {
            Ok(self
                .content_gateway
                .set_status(content_id, version_no, status)
                .await?)
        }
    }

    /// Copy one version (`Some`) or the whole version history (`None`) of a
    /// content item into a new content item.
    pub async fn copy(
        &self,
        content_id: ContentId,
        version_no: Option<VersionNo>,
    ) -> Result<Content, HandlerError> {
        let current_version_no = match version_no {
            Some(version_no) => version_no,
            None => self.load_content_info(content_id).await?.current_version_no,
        };

        let source = self.load(content_id, Some(current_version_no), None).await?;
        let create_struct = self.mapper.create_create_struct_from_content(&source);
        let copied = self.internal_create(&create_struct, current_version_no).await?;
        let new_content_id = copied.version_info.content_info.id;

        if version_no.is_none() {
            let content_type = self.load_content_type(create_struct.content_type_id).await?;
            for version_info in self.tree_handler.list_versions(content_id).await? {
                if version_info.version_no == current_version_no {
                    continue;
                }
                let mut version_content = self
                    .load(content_id, Some(version_info.version_no), None)
                    .await?;
                version_content.version_info.content_info =
                    copied.version_info.content_info.clone();
                for field in &mut version_content.fields {
                    field.id = None;
                }
                version_content.version_info.id = self
                    .content_gateway
                    .insert_version(&version_content.version_info, &version_content.fields)
                    .await?;
                self.field_handler
                    .create_new_fields(&mut version_content, &content_type)
                    .await?;
                let names = version_content.version_info.names.clone();
                for (language_code, name) in &names {
                    self.content_gateway
                        .set_name(new_content_id, version_info.version_no, name, language_code)
                        .await?;
                }
            }
        }

        self.content_gateway
            .copy_relations(content_id, new_content_id, version_no)
            .await?;

        info!(content_id, new_content_id, "copied content");
        Ok(copied)
    }

    /// Delete a content item. With locations present, deletion cascades
    /// through subtree removal (which removes the content once its last
    /// location goes away); without any, the raw rows are removed directly.
    pub async fn delete_content(&self, content_id: ContentId) -> Result<(), HandlerError> {
        let location_ids = self.content_gateway.get_all_location_ids(content_id).await?;
        if location_ids.is_empty() {
            self.remove_raw_content(content_id).await?;
        } else {
            for location_id in location_ids {
                // A location nested under an earlier one is gone by the time
                // its turn comes.
                match self.tree_handler.remove_subtree(location_id).await {
                    Err(err) if err.is_not_found() => continue,
                    result => result?,
                }
            }
        }
        Ok(())
    }

    pub async fn remove_raw_content(&self, content_id: ContentId) -> Result<(), HandlerError> {
        self.tree_handler.remove_raw_content(content_id).await
    }

    /// Delete one version and everything hanging off it. Application-level
    /// dependency order: node assignments, fields, relations, the version
    /// row, names.
    pub async fn delete_version(
        &self,
        content_id: ContentId,
        version_no: VersionNo,
    ) -> Result<(), HandlerError> {
        let version_info = self.load_version_info(content_id, Some(version_no)).await?;
        self.location_gateway
            .delete_node_assignment(content_id, Some(version_no))
            .await?;
        self.field_handler
            .delete_fields(content_id, &version_info)
            .await?;
        self.content_gateway
            .delete_relations(content_id, Some(version_no))
            .await?;
        self.content_gateway
            .delete_versions(content_id, Some(version_no))
            .await?;
        self.content_gateway
            .delete_names(content_id, Some(version_no))
            .await?;
        debug!(content_id, version_no, "deleted version");
        Ok(())
    }

    pub async fn add_relation(
        &self,
        create_struct: &RelationCreateStruct,
    ) -> Result<Relation, HandlerError> {
        let mut relation = self.mapper.create_relation_from_create_struct(create_struct);
        relation.id = self.content_gateway.insert_relation(create_struct).await?;
        Ok(relation)
    }

    pub async fn remove_relation(
        &self,
        relation_id: RelationId,
        relation_type: RelationType,
    ) -> Result<(), HandlerError> {
        self.content_gateway
            .load_relation(relation_id)
            .await?
            .ok_or_else(|| HandlerError::not_found("relation", relation_id))?;
        self.content_gateway
            .delete_relation(relation_id, relation_type)
            .await?;
        Ok(())
    }

    pub async fn load_relation(&self, relation_id: RelationId) -> Result<Relation, HandlerError> {
        let row = self
            .content_gateway
            .load_relation(relation_id)
            .await?
            .ok_or_else(|| HandlerError::not_found("relation", relation_id))?;
        Ok(self.mapper.extract_relation_from_row(&row))
    }

    pub async fn load_relations(
        &self,
        source_content_id: ContentId,
        source_version_no: Option<VersionNo>,
        relation_type: Option<RelationType>,
    ) -> Result<Vec<Relation>, HandlerError> {
        let rows = self
            .content_gateway
            .load_relations(source_content_id, source_version_no, relation_type)
            .await?;
        Ok(self.mapper.extract_relations_from_rows(&rows))
    }

    pub async fn load_relation_list(
        &self,
        source_content_id: ContentId,
        limit: u32,
        offset: u32,
        relation_type: Option<RelationType>,
    ) -> Result<Vec<Relation>, HandlerError> {
        let rows = self
            .content_gateway
            .load_relation_list(source_content_id, limit, offset, relation_type)
            .await?;
        Ok(self.mapper.extract_relations_from_rows(&rows))
    }

    pub async fn load_reverse_relations(
        &self,
        destination_content_id: ContentId,
        relation_type: Option<RelationType>,
    ) -> Result<Vec<Relation>, HandlerError> {
        let rows = self
            .content_gateway
            .load_reverse_relations(destination_content_id, relation_type)
            .await?;
        Ok(self.mapper.extract_relations_from_rows(&rows))
    }

    pub async fn count_reverse_relations(
        &self,
        destination_content_id: ContentId,
        relation_type: Option<RelationType>,
    ) -> Result<u64, HandlerError> {
        Ok(self
            .content_gateway
            .count_reverse_relations(destination_content_id, relation_type)
            .await?)
    }

    /// Shared creation path for [`ContentHandler::create`] and
    /// [`ContentHandler::copy`]: content row, version row, fields, names.
    /// Node assignments are the caller's business.
    pub(crate) async fn internal_create(
        &self,
        create_struct: &CreateStruct,
        version_no: VersionNo,
    ) -> Result<Content, HandlerError> {
        let content_type = self.load_content_type(create_struct.content_type_id).await?;

        let mut content = Content {
            version_info: self
                .mapper
                .create_version_info_from_create_struct(create_struct, version_no),
            fields: create_struct.fields.clone(),
        };
        content.version_info.content_info.id = self
            .content_gateway
            .insert_content_object(create_struct, version_no)
            .await?;
        content.version_info.id = self
            .content_gateway
            .insert_version(&content.version_info, &content.fields)
            .await?;

        self.field_handler
            .create_new_fields(&mut content, &content_type)
            .await?;

        let content_id = content.version_info.content_info.id;
        for (language_code, name) in &create_struct.name {
            self.content_gateway
                .set_name(content_id, version_no, name, language_code)
                .await?;
        }

        Ok(content)
    }

    async fn load_content_type(
        &self,
        content_type_id: ContentTypeId,
    ) -> Result<ContentType, HandlerError> {
        self.content_type_handler
            .load(content_type_id)
            .await?
            .ok_or_else(|| HandlerError::not_found("content type", content_type_id))
    }

    async fn update_path_identification_strings(
        &self,
        content_id: ContentId,
        update: &MetadataUpdateStruct,
    ) -> Result<(), HandlerError> {
        let Some(main_language_id) = update.main_language_id else {
            return Ok(());
        };
        let language = self
            .language_handler
            .load(main_language_id)
            .await?
            .ok_or_else(|| HandlerError::not_found("language", main_language_id))?;

        for row in self
            .location_gateway
            .load_location_data_by_content(content_id, None)
            .await?
        {
            let entries = self
                .url_alias_gateway
                .load_location_entries(row.node_id, main_language_id)
                .await?;
            let location_name = entries
                .first()
                .map(|entry| entry.text.as_str())
                .unwrap_or_default();
            let slug = self
                .slug_converter
                .convert(location_name, &format!("node_{}", row.node_id));
            self.location_gateway
                .update_path_identification_string(row.node_id, row.parent_id, &slug)
                .await?;
        }

        debug!(
            content_id,
            language = %language.language_code,
            "refreshed path identification strings"
        );
        Ok(())
    }

    async fn trim_archived_versions(
        &self,
        content_id: ContentId,
        limit: u32,
    ) -> Result<(), HandlerError> {
        let archived = self
            .content_gateway
            .list_versions(content_id, Some(VersionStatus::Archived))
            .await?;
        if archived.len() <= limit as usize {
            return Ok(());
        }
        let excess = archived.len() - limit as usize;
        for row in archived.iter().take(excess) {
            self.delete_version(content_id, row.version.version_no).await?;
            debug!(
                content_id,
                version_no = row.version.version_no,
                "trimmed archived version"
            );
        }
        Ok(())
    }
}
