//! Row-to-domain transformation. Pure and stateless: every method maps its
//! inputs without touching the store.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::application::gateway::{
    ContentInfoRow, ContentRow, NameRow, RelationRow, VersionInfoRow, VersionRow,
};
use crate::domain::content::{Content, ContentInfo, Field, VersionInfo, VersionStatus};
use crate::domain::relation::Relation;
use crate::domain::structs::{CreateStruct, RelationCreateStruct};
use crate::domain::types::{ContentId, ContentType, UserId, VersionNo};

#[derive(Debug, Clone, Default)]
pub struct Mapper;

impl Mapper {
    pub fn new() -> Self {
        Self
    }

    /// Build the first version of a content item out of its create struct.
    /// Ids stay 0 until the gateway has assigned them.
    pub fn create_version_info_from_create_struct(
        &self,
        create_struct: &CreateStruct,
        version_no: VersionNo,
    ) -> VersionInfo {
        let mut language_codes: Vec<String> = create_struct.name.keys().cloned().collect();
        for field in &create_struct.fields {
            if !language_codes.contains(&field.language_code) {
                language_codes.push(field.language_code.clone());
            }
        }
        language_codes.sort();

        VersionInfo {
            id: 0,
            version_no,
            content_info: ContentInfo {
                id: 0,
                content_type_id: create_struct.content_type_id,
                section_id: create_struct.section_id,
                owner_id: create_struct.owner_id,
                remote_id: create_struct.remote_id.clone(),
                name: create_struct
                    .name
                    .get(&create_struct.initial_language_code)
                    .cloned()
                    .unwrap_or_default(),
                current_version_no: version_no,
                main_language_code: create_struct.initial_language_code.clone(),
                main_location_id: None,
                always_available: create_struct.always_available,
                status: crate::domain::content::ContentStatus::Draft,
                publication_date: None,
                modification_date: Some(create_struct.modified),
            },
            creator_id: create_struct.owner_id,
            creation_date: create_struct.modified,
            modification_date: create_struct.modified,
            initial_language_code: create_struct.initial_language_code.clone(),
            language_codes,
            status: VersionStatus::Draft,
            names: create_struct.name.clone(),
        }
    }

    /// Build a new draft version on top of an existing content aggregate.
    pub fn create_version_info_for_content(
        &self,
        content: &Content,
        version_no: VersionNo,
        creator_id: UserId,
        created: time::OffsetDateTime,
    ) -> VersionInfo {
        let source = &content.version_info;
        VersionInfo {
            id: 0,
            version_no,
            content_info: source.content_info.clone(),
            creator_id,
            creation_date: created,
            modification_date: created,
            initial_language_code: source.initial_language_code.clone(),
            language_codes: source.language_codes.clone(),
            status: VersionStatus::Draft,
            names: source.names.clone(),
        }
    }

    /// Assemble content aggregates out of joined load rows, one per version
    /// present, reconciling fields against the current content-type schema:
    /// fields of removed definitions are dropped, definitions added since the
    /// version was written are synthesized with their default value.
    pub fn extract_content_from_rows(
        &self,
        rows: &[ContentRow],
        name_rows: &[NameRow],
        content_type: &ContentType,
    ) -> Vec<Content> {
        let mut order: Vec<(ContentId, VersionNo)> = Vec::new();
        let mut groups: HashMap<(ContentId, VersionNo), Vec<&ContentRow>> = HashMap::new();
        for row in rows {
            let key = (row.info.id, row.version.version_no);
            let group = groups.entry(key).or_default();
            if group.is_empty() {
                order.push(key);
            }
            group.push(row);
        }

        let definitions: HashMap<_, _> = content_type
            .field_definitions
            .iter()
            .map(|definition| (definition.id, definition))
            .collect();

        order
            .into_iter()
            .map(|key| {
                let group = &groups[&key];
                let first = group[0];
                let version_info =
                    self.version_info_from_parts(&first.info, &first.version, name_rows);

                let mut fields = Vec::new();
                let mut seen = HashSet::new();
                for row in group {
                    let Some(field_row) = &row.field else { continue };
                    if !seen.insert(field_row.id) {
                        continue;
                    }
                    if !definitions.contains_key(&field_row.field_definition_id) {
                        continue;
                    }
                    fields.push(Field {
                        id: Some(field_row.id),
                        field_definition_id: field_row.field_definition_id,
                        field_type: field_row.field_type.clone(),
                        value: field_row.value.clone(),
                        language_code: field_row.language_code.clone(),
                        version_no: Some(field_row.version_no),
                    });
                }

                let present: HashSet<(i64, String)> = fields
                    .iter()
                    .map(|field| (field.field_definition_id, field.language_code.clone()))
                    .collect();
                for definition in &content_type.field_definitions {
                    for language_code in &version_info.language_codes {
                        if present.contains(&(definition.id, language_code.clone())) {
                            continue;
                        }
                        fields.push(Field {
                            id: None,
                            field_definition_id: definition.id,
                            field_type: definition.field_type.clone(),
                            value: definition.default_value.clone(),
                            language_code: language_code.clone(),
                            version_no: Some(version_info.version_no),
                        });
                    }
                }

                Content {
                    version_info,
                    fields,
                }
            })
            .collect()
    }

    pub fn extract_content_info_from_row(&self, row: &ContentInfoRow) -> ContentInfo {
        ContentInfo {
            id: row.id,
            content_type_id: row.content_type_id,
            section_id: row.section_id,
            owner_id: row.owner_id,
            remote_id: row.remote_id.clone(),
            name: row.name.clone(),
            current_version_no: row.current_version_no,
            main_language_code: row.main_language_code.clone(),
            main_location_id: row.main_location_id,
            always_available: row.always_available,
            status: row.status,
            publication_date: row.publication_date,
            modification_date: row.modification_date,
        }
    }

    pub fn extract_version_info_from_row(
        &self,
        row: &VersionInfoRow,
        name_rows: &[NameRow],
    ) -> VersionInfo {
        self.version_info_from_parts(&row.info, &row.version, name_rows)
    }

    pub fn extract_version_info_list_from_rows(
        &self,
        rows: &[VersionInfoRow],
        name_rows: &[NameRow],
    ) -> Vec<VersionInfo> {
        rows.iter()
            .map(|row| self.extract_version_info_from_row(row, name_rows))
            .collect()
    }

    /// Derive a create struct that re-creates the given content. Row ids are
    /// cleared and a fresh remote id generated so the copy cannot collide
    /// with its source.
    pub fn create_create_struct_from_content(&self, content: &Content) -> CreateStruct {
        let info = &content.version_info.content_info;
        CreateStruct {
            name: content.version_info.names.clone(),
            content_type_id: info.content_type_id,
            section_id: info.section_id,
            owner_id: info.owner_id,
            fields: content
                .fields
                .iter()
                .map(|field| Field {
                    id: None,
                    version_no: None,
                    ..field.clone()
                })
                .collect(),
            locations: Vec::new(),
            always_available: info.always_available,
            remote_id: Uuid::new_v4().simple().to_string(),
            initial_language_code: content.version_info.initial_language_code.clone(),
            modified: content.version_info.modification_date,
        }
    }

    pub fn create_relation_from_create_struct(
        &self,
        create_struct: &RelationCreateStruct,
    ) -> Relation {
        Relation {
            id: 0,
            source_content_id: create_struct.source_content_id,
            source_content_version_no: create_struct.source_content_version_no,
            source_field_definition_id: create_struct.source_field_definition_id,
            destination_content_id: create_struct.destination_content_id,
            relation_type: create_struct.relation_type,
        }
    }

    pub fn extract_relation_from_row(&self, row: &RelationRow) -> Relation {
        Relation {
            id: row.id,
            source_content_id: row.source_content_id,
            source_content_version_no: row.source_content_version_no,
            source_field_definition_id: row.source_field_definition_id,
            destination_content_id: row.destination_content_id,
            relation_type: row.relation_type,
        }
    }

    pub fn extract_relations_from_rows(&self, rows: &[RelationRow]) -> Vec<Relation> {
        rows.iter()
            .map(|row| self.extract_relation_from_row(row))
            .collect()
    }

    fn version_info_from_parts(
        &self,
        info: &ContentInfoRow,
        version: &VersionRow,
        name_rows: &[NameRow],
    ) -> VersionInfo {
        let names = name_rows
            .iter()
            .filter(|name| {
                name.content_id == version.content_id && name.version_no == version.version_no
            })
            .map(|name| (name.language_code.clone(), name.name.clone()))
            .collect();

        VersionInfo {
            id: version.id,
            version_no: version.version_no,
            content_info: self.extract_content_info_from_row(info),
            creator_id: version.creator_id,
            creation_date: version.creation_date,
            modification_date: version.modification_date,
            initial_language_code: version.initial_language_code.clone(),
            language_codes: version.language_codes.clone(),
            status: version.status,
            names,
        }
    }
}
