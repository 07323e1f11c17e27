//! Per-field persistence orchestration across languages and definitions.
//!
//! The field handler decides, for every (field definition, language) cell of
//! a version, whether a row is inserted, updated, copied from the main
//! language or left alone, and keeps the external storage engines in step
//! with the field rows through [`StorageHandler`].

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::application::error::HandlerError;
use crate::application::gateway::ContentGateway;
use crate::application::storage::StorageHandler;
use crate::domain::content::{Content, Field, VersionInfo};
use crate::domain::error::DomainError;
use crate::domain::structs::UpdateStruct;
use crate::domain::types::{ContentId, ContentType, FieldDefinition};

pub struct FieldHandler {
    content_gateway: Arc<dyn ContentGateway>,
    storage_handler: Arc<StorageHandler>,
}

impl FieldHandler {
    pub fn new(content_gateway: Arc<dyn ContentGateway>, storage_handler: Arc<StorageHandler>) -> Self {
        Self {
            content_gateway,
            storage_handler,
        }
    }

    /// Populate every (definition, language) cell of a freshly created
    /// version. Untranslatable definitions take their value from the main
    /// language; their rows in other languages reference the same external
    /// data instead of storing it again.
    pub async fn create_new_fields(
        &self,
        content: &mut Content,
        content_type: &ContentType,
    ) -> Result<(), HandlerError> {
        let main_language = content.version_info.content_info.main_language_code.clone();
        let languages = main_first(&content.version_info.language_codes, &main_language);
        let supplied: HashMap<(i64, String), Field> = content
            .fields
            .iter()
            .map(|field| {
                (
                    (field.field_definition_id, field.language_code.clone()),
                    field.clone(),
                )
            })
            .collect();

        let mut created = Vec::new();
        for definition in &content_type.field_definitions {
            let mut main_field: Option<Field> = None;
            for language in &languages {
                let source_language = if definition.is_translatable {
                    language
                } else {
                    &main_language
                };
                let mut field = supplied
                    .get(&(definition.id, source_language.clone()))
                    .cloned()
                    .unwrap_or_else(|| empty_field(definition, source_language));
                field.language_code = language.clone();

                if !definition.is_translatable && language != &main_language {
                    let original = main_field.clone().ok_or_else(|| {
                        DomainError::invariant(
                            "untranslatable definition has no main-language field",
                        )
                    })?;
                    self.copy_field(&mut field, &original, content).await?;
                } else {
                    self.create_new_field(&mut field, content).await?;
                    if language == &main_language {
                        main_field = Some(field.clone());
                    }
                }
                created.push(field);
            }
        }

        content.fields = created;
        Ok(())
    }

    /// Re-insert the fields of a source version under a new version number.
    /// Field ids are kept; external data is referenced, not duplicated.
    pub async fn create_existing_fields_in_new_version(
        &self,
        content: &mut Content,
    ) -> Result<(), HandlerError> {
        let version_no = content.version_info.version_no;
        let originals = content.fields.clone();
        for (index, original) in originals.iter().enumerate() {
            let mut field = original.clone();
            field.version_no = Some(version_no);
            self.content_gateway
                .insert_existing_field(content, &field)
                .await?;
            if self
                .storage_handler
                .copy_field_data(&content.version_info, &mut field, original)
                .await?
                .value_changed
            {
                self.content_gateway.update_field(&field).await?;
            }
            content.fields[index] = field;
        }
        Ok(())
    }

    /// Apply a version update. Three cases per (definition, language) cell:
    /// a language newly added to the version, an existing language being
    /// updated, and untranslatable mirrors refreshed after a main-language
    /// change. A cell counts as existing only when a persisted row (field
    /// with an id) backs it; placeholders synthesized at load time do not.
    pub async fn update_fields(
        &self,
        content: &Content,
        update: &UpdateStruct,
        content_type: &ContentType,
    ) -> Result<(), HandlerError> {
        let version_no = content.version_info.version_no;
        let main_language = content.version_info.content_info.main_language_code.clone();

        let content_map: HashMap<(i64, String), &Field> = content
            .fields
            .iter()
            .map(|field| ((field.field_definition_id, field.language_code.clone()), field))
            .collect();
        let update_map: HashMap<(i64, String), &Field> = update
            .fields
            .iter()
            .map(|field| ((field.field_definition_id, field.language_code.clone()), field))
            .collect();
        let touched: HashSet<String> = update
            .fields
            .iter()
            .map(|field| field.language_code.clone())
            .collect();
        let main_updated: HashSet<i64> = update
            .fields
            .iter()
            .filter(|field| field.language_code == main_language)
            .map(|field| field.field_definition_id)
            .collect();

        let mut all_languages: BTreeSet<String> = touched.iter().cloned().collect();
        all_languages.extend(content.fields.iter().map(|field| field.language_code.clone()));
        let languages = main_first(&all_languages.into_iter().collect::<Vec<_>>(), &main_language);

        for definition in &content_type.field_definitions {
            for language in &languages {
                let key = (definition.id, language.clone());
                let has_row = content_map
                    .get(&key)
                    .map(|field| field.id.is_some())
                    .unwrap_or(false);

                if let Some(updated) = update_map.get(&key) {
                    let mut field = (*updated).clone();
                    field.version_no = Some(version_no);
                    if field.id.is_some() {
                        self.update_field(&mut field, content).await?;
                    } else if !definition.is_translatable && language != &main_language {
                        let original = update_map
                            .get(&(definition.id, main_language.clone()))
                            .or_else(|| content_map.get(&(definition.id, main_language.clone())))
                            .map(|field| (*field).clone())
                            .ok_or_else(|| {
                                DomainError::invariant(
                                    "untranslatable definition has no main-language field",
                                )
                            })?;
                        self.copy_field(&mut field, &original, content).await?;
                    } else {
                        self.create_new_field(&mut field, content).await?;
                    }
                } else if !has_row && touched.contains(language) {
                    if !definition.is_translatable {
                        if let Some(main_field) =
                            content_map.get(&(definition.id, main_language.clone()))
                        {
                            let original = (*main_field).clone();
                            let mut field = original.clone();
                            field.id = None;
                            field.language_code = language.clone();
                            self.copy_field(&mut field, &original, content).await?;
                        }
                    } else {
                        // Placeholder row; external storage is written once the
                        // translation is actually supplied.
                        let mut field = empty_field(definition, language);
                        field.version_no = Some(version_no);
                        self.content_gateway.insert_new_field(content, &field).await?;
                    }
                } else if has_row
                    && !definition.is_translatable
                    && language != &main_language
                    && main_updated.contains(&definition.id)
                {
                    if let (Some(mirror), Some(updated_main)) = (
                        content_map.get(&key),
                        update_map.get(&(definition.id, main_language.clone())),
                    ) {
                        self.update_copied_field((*mirror).clone(), updated_main, content)
                            .await?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Let storage engines hydrate field data that lives outside the rows.
    pub async fn load_external_field_data(&self, content: &mut Content) -> Result<(), HandlerError> {
        let Content {
            version_info,
            fields,
        } = content;
        for field in fields.iter_mut() {
            self.storage_handler.get_field_data(version_info, field).await?;
        }
        Ok(())
    }

    /// Delete the field rows of one version, purging external data per field
    /// type first so engines know what to drop.
    pub async fn delete_fields(
        &self,
        content_id: ContentId,
        version_info: &VersionInfo,
    ) -> Result<(), HandlerError> {
        let ids_by_type = self
            .content_gateway
            .get_field_ids_by_type(content_id, Some(version_info.version_no))
            .await?;
        for (field_type, field_ids) in &ids_by_type {
            self.storage_handler
                .delete_field_data(field_type, version_info, field_ids)
                .await?;
        }
        self.content_gateway
            .delete_fields(content_id, Some(version_info.version_no))
            .await?;
        debug!(
            content_id,
            version_no = version_info.version_no,
            "deleted version fields"
        );
        Ok(())
    }

    async fn create_new_field(&self, field: &mut Field, content: &Content) -> Result<(), HandlerError> {
        field.version_no = Some(content.version_info.version_no);
        field.id = Some(self.content_gateway.insert_new_field(content, field).await?);
        if self
            .storage_handler
            .store_field_data(&content.version_info, field)
            .await?
            .value_changed
        {
            // The engine rewrote the lightweight value while processing.
            self.content_gateway.update_field(field).await?;
        }
        Ok(())
    }

    async fn copy_field(
        &self,
        field: &mut Field,
        original: &Field,
        content: &Content,
    ) -> Result<(), HandlerError> {
        field.version_no = Some(content.version_info.version_no);
        field.id = Some(self.content_gateway.insert_new_field(content, field).await?);
        if self
            .storage_handler
            .copy_field_data(&content.version_info, field, original)
            .await?
            .value_changed
        {
            self.content_gateway.update_field(field).await?;
        }
        Ok(())
    }

    async fn update_field(&self, field: &mut Field, content: &Content) -> Result<(), HandlerError> {
        self.content_gateway.update_field(field).await?;
        if self
            .storage_handler
            .store_field_data(&content.version_info, field)
            .await?
            .value_changed
        {
            self.content_gateway.update_field(field).await?;
        }
        Ok(())
    }

    async fn update_copied_field(
        &self,
        mut field: Field,
        updated_main: &Field,
        content: &Content,
    ) -> Result<(), HandlerError> {
        field.version_no = Some(content.version_info.version_no);
        field.value = updated_main.value.clone();
        self.content_gateway
            .update_non_translatable_field(&field, content.version_info.content_info.id)
            .await?;
        if self
            .storage_handler
            .copy_field_data(&content.version_info, &mut field, updated_main)
            .await?
            .value_changed
        {
            self.content_gateway.update_field(&field).await?;
        }
        Ok(())
    }
}

fn empty_field(definition: &FieldDefinition, language_code: &str) -> Field {
    Field {
        id: None,
        field_definition_id: definition.id,
        field_type: definition.field_type.clone(),
        value: definition.default_value.clone(),
        language_code: language_code.to_string(),
        version_no: None,
    }
}

fn main_first(languages: &[String], main_language: &str) -> Vec<String> {
    let mut ordered = Vec::with_capacity(languages.len());
    if languages.iter().any(|language| language == main_language) {
        ordered.push(main_language.to_string());
    }
    ordered.extend(
        languages
            .iter()
            .filter(|language| *language != main_language)
            .cloned(),
    );
    ordered
}
