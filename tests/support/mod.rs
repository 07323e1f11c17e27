//! In-memory store implementing every boundary the handlers consume, plus a
//! handler assembly helper. Mutating gateway calls are appended to a call log
//! so tests can assert ordering.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;

use strato::application::collaborators::{
    ContentTypeHandler, LanguageHandler, ObjectStateHandler,
};
use strato::application::content::ContentHandler;
use strato::application::fields::FieldHandler;
use strato::application::gateway::{
    AssignmentOpcode, ContentGateway, ContentInfoRow, ContentRow, FieldRow, GatewayError,
    LocationGateway, LocationRow, NameRow, RelationRow, UrlAliasGateway, UrlAliasRow,
    VersionInfoRow, VersionRow,
};
use strato::application::location::mapper::LocationMapper;
use strato::application::location::LocationHandler;
use strato::application::mapper::Mapper;
use strato::application::storage::{
    FieldStorage, StorageContext, StorageError, StorageHandler, StorageRegistry, ValueUpdate,
};
use strato::application::tree::TreeHandler;
use strato::config::RepositoryOptions;
use strato::domain::content::{
    Content, ContentStatus, Field, FieldValue, VersionInfo, VersionStatus,
};
use strato::domain::relation::RelationType;
use strato::domain::slug::SlugConverter;
use strato::domain::structs::{
    CreateStruct, LocationCreateStruct, LocationUpdateStruct, MetadataUpdateStruct,
    RelationCreateStruct, UpdateStruct,
};
use strato::domain::location::{SortField, SortOrder};
use strato::domain::types::{
    ContentId, ContentType, ContentTypeId, FieldDefinition, FieldId, Language, LanguageId,
    LocationId, ObjectState, ObjectStateGroup, ObjectStateGroupId, ObjectStateId, RelationId,
    SectionId, UserId, VersionNo,
};

pub const ROOT_LOCATION_ID: LocationId = 1;
pub const ROOT_CONTENT_ID: ContentId = 1;
pub const ENG_GB: LanguageId = 2;
pub const GER_DE: LanguageId = 4;

#[derive(Clone)]
struct FieldRecord {
    content_id: ContentId,
    row: FieldRow,
}

#[derive(Clone)]
struct Assignment {
    content_id: ContentId,
    version_no: VersionNo,
    parent_id: LocationId,
    opcode: AssignmentOpcode,
    is_main: bool,
    remote_id: String,
    priority: i32,
    hidden: bool,
    sort_field: SortField,
    sort_order: SortOrder,
}

#[derive(Default)]
struct State {
    content_infos: BTreeMap<ContentId, ContentInfoRow>,
    versions: BTreeMap<(ContentId, VersionNo), VersionRow>,
    fields: Vec<FieldRecord>,
    names: Vec<NameRow>,
    relations: BTreeMap<RelationId, RelationRow>,
    locations: BTreeMap<LocationId, LocationRow>,
    assignments: Vec<Assignment>,
    content_states: Vec<(ContentId, ObjectStateGroupId, ObjectStateId)>,
    next_content_id: i64,
    next_version_row_id: i64,
    next_field_id: i64,
    next_relation_id: i64,
    next_location_id: i64,
}

pub struct InMemoryStore {
    state: Mutex<State>,
    calls: Mutex<Vec<String>>,
    content_types: Mutex<BTreeMap<ContentTypeId, ContentType>>,
    languages: Mutex<Vec<Language>>,
    state_groups: Mutex<Vec<(ObjectStateGroup, Vec<ObjectState>)>>,
    aliases: Mutex<HashMap<(LocationId, LanguageId), Vec<UrlAliasRow>>>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        let mut state = State {
            next_content_id: 9,
            next_version_row_id: 1,
            next_field_id: 0,
            next_relation_id: 0,
            next_location_id: 1,
            ..State::default()
        };

        let now = OffsetDateTime::now_utc();
        state.content_infos.insert(
            ROOT_CONTENT_ID,
            ContentInfoRow {
                id: ROOT_CONTENT_ID,
                content_type_id: 1,
                section_id: 1,
                owner_id: 14,
                remote_id: "root".into(),
                name: "Home".into(),
                current_version_no: 1,
                main_language_code: "eng-GB".into(),
                main_location_id: Some(ROOT_LOCATION_ID),
                always_available: true,
                status: ContentStatus::Published,
                publication_date: Some(now),
                modification_date: Some(now),
            },
        );
        state.versions.insert(
            (ROOT_CONTENT_ID, 1),
            VersionRow {
                id: 1,
                content_id: ROOT_CONTENT_ID,
                version_no: 1,
                status: VersionStatus::Published,
                creator_id: 14,
                creation_date: now,
                modification_date: now,
                initial_language_code: "eng-GB".into(),
                language_codes: vec!["eng-GB".into()],
            },
        );
        state.locations.insert(
            ROOT_LOCATION_ID,
            LocationRow {
                node_id: ROOT_LOCATION_ID,
                parent_id: ROOT_LOCATION_ID,
                content_id: ROOT_CONTENT_ID,
                content_version_no: 1,
                main_node_id: ROOT_LOCATION_ID,
                remote_id: "root-location".into(),
                path_string: "/1/".into(),
                path_identification_string: String::new(),
                depth: 0,
                priority: 0,
                hidden: false,
                invisible: false,
                sort_field: SortField::Path,
                sort_order: SortOrder::Asc,
            },
        );

        let store = Self {
            state: Mutex::new(state),
            calls: Mutex::new(Vec::new()),
            content_types: Mutex::new(BTreeMap::new()),
            languages: Mutex::new(vec![
                Language {
                    id: ENG_GB,
                    language_code: "eng-GB".into(),
                    name: "English (United Kingdom)".into(),
                },
                Language {
                    id: GER_DE,
                    language_code: "ger-DE".into(),
                    name: "German".into(),
                },
            ]),
            state_groups: Mutex::new(Vec::new()),
            aliases: Mutex::new(HashMap::new()),
        };
        store.register_content_type(ContentType {
            id: 1,
            identifier: "folder".into(),
            field_definitions: Vec::new(),
        });
        Arc::new(store)
    }

    pub fn register_content_type(&self, content_type: ContentType) {
        self.content_types
            .lock()
            .unwrap()
            .insert(content_type.id, content_type);
    }

    pub fn add_object_state_group(&self, group: ObjectStateGroup, states: Vec<ObjectState>) {
        self.state_groups.lock().unwrap().push((group, states));
    }

    pub fn set_alias(&self, location_id: LocationId, language_id: LanguageId, text: &str) {
        self.aliases
            .lock()
            .unwrap()
            .entry((location_id, language_id))
            .or_default()
            .push(UrlAliasRow { text: text.into() });
    }

    /// Force the id the next created content receives.
    pub fn set_next_content_id(&self, next: ContentId) {
        self.state.lock().unwrap().next_content_id = next - 1;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn content_exists(&self, content_id: ContentId) -> bool {
        self.state
            .lock()
            .unwrap()
            .content_infos
            .contains_key(&content_id)
    }

    pub fn content_count(&self) -> usize {
        self.state.lock().unwrap().content_infos.len()
    }

    pub fn location_count(&self) -> usize {
        self.state.lock().unwrap().locations.len()
    }

    pub fn location_row(&self, location_id: LocationId) -> Option<LocationRow> {
        self.state.lock().unwrap().locations.get(&location_id).cloned()
    }

    pub fn locations_of(&self, content_id: ContentId) -> Vec<LocationRow> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<_> = state
            .locations
            .values()
            .filter(|row| row.content_id == content_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.path_string.cmp(&b.path_string));
        rows
    }

    pub fn find_contents_by_name(&self, name: &str) -> Vec<ContentInfoRow> {
        self.state
            .lock()
            .unwrap()
            .content_infos
            .values()
            .filter(|info| info.name == name)
            .cloned()
            .collect()
    }

    pub fn content_info_row(&self, content_id: ContentId) -> Option<ContentInfoRow> {
        self.state
            .lock()
            .unwrap()
            .content_infos
            .get(&content_id)
            .cloned()
    }

    pub fn version_rows(&self, content_id: ContentId) -> Vec<VersionRow> {
        let state = self.state.lock().unwrap();
        state
            .versions
            .values()
            .filter(|row| row.content_id == content_id)
            .cloned()
            .collect()
    }

    pub fn field_row_count(&self, content_id: ContentId) -> usize {
        let state = self.state.lock().unwrap();
        state
            .fields
            .iter()
            .filter(|record| record.content_id == content_id)
            .count()
    }

    pub fn name_row_count(&self, content_id: ContentId) -> usize {
        let state = self.state.lock().unwrap();
        state
            .names
            .iter()
            .filter(|row| row.content_id == content_id)
            .count()
    }

    pub fn relation_count_for(&self, content_id: ContentId) -> usize {
        let state = self.state.lock().unwrap();
        state
            .relations
            .values()
            .filter(|row| {
                row.source_content_id == content_id || row.destination_content_id == content_id
            })
            .count()
    }

    pub fn content_states_of(
        &self,
        content_id: ContentId,
    ) -> Vec<(ObjectStateGroupId, ObjectStateId)> {
        self.state
            .lock()
            .unwrap()
            .content_states
            .iter()
            .filter(|(id, _, _)| *id == content_id)
            .map(|(_, group, state)| (*group, *state))
            .collect()
    }

    /// Stage a raw node assignment, bypassing the handlers.
    pub fn add_assignment(
        &self,
        content_id: ContentId,
        version_no: VersionNo,
        parent_id: LocationId,
        opcode: AssignmentOpcode,
        is_main: bool,
    ) {
        self.state.lock().unwrap().assignments.push(Assignment {
            content_id,
            version_no,
            parent_id,
            opcode,
            is_main,
            remote_id: format!("assignment-{content_id}-{parent_id}"),
            priority: 0,
            hidden: false,
            sort_field: SortField::Path,
            sort_order: SortOrder::Asc,
        });
    }

    fn log(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }

    fn language_code_of(&self, language_id: LanguageId) -> Option<String> {
        self.languages
            .lock()
            .unwrap()
            .iter()
            .find(|language| language.id == language_id)
            .map(|language| language.language_code.clone())
    }
}

fn depth_of(path: &str) -> i32 {
    strato::domain::location::path_node_ids(path)
        .expect("well-formed materialized path")
        .len() as i32
        - 1
}

fn materialize_location(
    state: &mut State,
    content_id: ContentId,
    version_no: VersionNo,
    parent_id: LocationId,
    remote_id: String,
    priority: i32,
    hidden: bool,
    sort_field: SortField,
    sort_order: SortOrder,
    is_main: bool,
) -> Result<LocationId, GatewayError> {
    let parent = state
        .locations
        .get(&parent_id)
        .cloned()
        .ok_or_else(|| GatewayError::integrity(format!("parent location {parent_id} missing")))?;

    state.next_location_id += 1;
    let node_id = state.next_location_id;
    let path_string = strato::domain::location::child_path(&parent.path_string, node_id);

    let has_main = state
        .locations
        .values()
        .any(|row| row.content_id == content_id);
    let main = is_main || !has_main;

    let row = LocationRow {
        node_id,
        parent_id,
        content_id,
        content_version_no: version_no,
        main_node_id: if main { node_id } else { 0 },
        remote_id,
        path_string: path_string.clone(),
        path_identification_string: String::new(),
        depth: depth_of(&path_string),
        priority,
        hidden,
        invisible: hidden || parent.hidden || parent.invisible,
        sort_field,
        sort_order,
    };
    state.locations.insert(node_id, row);

    if main {
        let ids: Vec<_> = state
            .locations
            .values()
            .filter(|row| row.content_id == content_id)
            .map(|row| row.node_id)
            .collect();
        for id in ids {
            state.locations.get_mut(&id).unwrap().main_node_id = node_id;
        }
        if let Some(info) = state.content_infos.get_mut(&content_id) {
            info.main_location_id = Some(node_id);
        }
    } else {
        let main_node_id = state
            .content_infos
            .get(&content_id)
            .and_then(|info| info.main_location_id)
            .unwrap_or(node_id);
        state.locations.get_mut(&node_id).unwrap().main_node_id = main_node_id;
    }

    Ok(node_id)
}

fn recompute_visibility(state: &mut State) {
    let hidden_ids: HashSet<LocationId> = state
        .locations
        .values()
        .filter(|row| row.hidden)
        .map(|row| row.node_id)
        .collect();
    let updates: Vec<(LocationId, bool)> = state
        .locations
        .values()
        .map(|row| {
            let invisible = row
                .path_string
                .split('/')
                .filter(|segment| !segment.is_empty())
                .filter_map(|segment| segment.parse::<LocationId>().ok())
                .any(|id| hidden_ids.contains(&id));
            (row.node_id, invisible)
        })
        .collect();
    for (node_id, invisible) in updates {
        state.locations.get_mut(&node_id).unwrap().invisible = invisible;
    }
}

#[async_trait]
impl ContentGateway for InMemoryStore {
    async fn insert_content_object(
        &self,
        create_struct: &CreateStruct,
        current_version_no: VersionNo,
    ) -> Result<ContentId, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.next_content_id += 1;
        let content_id = state.next_content_id;
        state.content_infos.insert(
            content_id,
            ContentInfoRow {
                id: content_id,
                content_type_id: create_struct.content_type_id,
                section_id: create_struct.section_id,
                owner_id: create_struct.owner_id,
                remote_id: create_struct.remote_id.clone(),
                name: create_struct
                    .name
                    .get(&create_struct.initial_language_code)
                    .cloned()
                    .unwrap_or_default(),
                current_version_no,
                main_language_code: create_struct.initial_language_code.clone(),
                main_location_id: None,
                always_available: create_struct.always_available,
                status: ContentStatus::Draft,
                publication_date: None,
                modification_date: Some(create_struct.modified),
            },
        );
        drop(state);
        self.log(format!("insert_content_object({content_id})"));
        Ok(content_id)
    }

    async fn insert_version(
        &self,
        version_info: &VersionInfo,
        _fields: &[Field],
    ) -> Result<i64, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.next_version_row_id += 1;
        let row_id = state.next_version_row_id;
        let content_id = version_info.content_info.id;
        state.versions.insert(
            (content_id, version_info.version_no),
            VersionRow {
                id: row_id,
                content_id,
                version_no: version_info.version_no,
                status: version_info.status,
                creator_id: version_info.creator_id,
                creation_date: version_info.creation_date,
                modification_date: version_info.modification_date,
                initial_language_code: version_info.initial_language_code.clone(),
                language_codes: version_info.language_codes.clone(),
            },
        );
        Ok(row_id)
    }

    async fn update_content(
        &self,
        content_id: ContentId,
        update: &MetadataUpdateStruct,
    ) -> Result<(), GatewayError> {
        let main_language_code = update
            .main_language_id
            .and_then(|id| self.language_code_of(id));
        let mut state = self.state.lock().unwrap();
        let info = state
            .content_infos
            .get_mut(&content_id)
            .ok_or_else(|| GatewayError::integrity(format!("content {content_id} missing")))?;
        if let Some(owner_id) = update.owner_id {
            info.owner_id = owner_id;
        }
        if let Some(name) = &update.name {
            info.name = name.clone();
        }
        if let Some(publication_date) = update.publication_date {
            info.publication_date = Some(publication_date);
        }
        if let Some(modification_date) = update.modification_date {
            info.modification_date = Some(modification_date);
        }
        if let Some(language_code) = main_language_code {
            info.main_language_code = language_code;
        }
        if let Some(always_available) = update.always_available {
            info.always_available = always_available;
        }
        if let Some(remote_id) = &update.remote_id {
            info.remote_id = remote_id.clone();
        }
        Ok(())
    }

    async fn update_version(
        &self,
        content_id: ContentId,
        version_no: VersionNo,
        update: &UpdateStruct,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        let version = state
            .versions
            .get_mut(&(content_id, version_no))
            .ok_or_else(|| {
                GatewayError::integrity(format!("version {content_id}/{version_no} missing"))
            })?;
        version.creator_id = update.creator_id;
        version.modification_date = update.modification_date;
        version.initial_language_code = update.initial_language_code.clone();
        for field in &update.fields {
            if !version.language_codes.contains(&field.language_code) {
                version.language_codes.push(field.language_code.clone());
                version.language_codes.sort();
            }
        }
        Ok(())
    }

    async fn insert_new_field(
        &self,
        content: &Content,
        field: &Field,
    ) -> Result<FieldId, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.next_field_id += 1;
        let field_id = state.next_field_id;
        state.fields.push(FieldRecord {
            content_id: content.version_info.content_info.id,
            row: FieldRow {
                id: field_id,
                field_definition_id: field.field_definition_id,
                field_type: field.field_type.clone(),
                language_code: field.language_code.clone(),
                version_no: field.version_no.unwrap_or(content.version_info.version_no),
                value: field.value.clone(),
            },
        });
        Ok(field_id)
    }

    async fn insert_existing_field(
        &self,
        content: &Content,
        field: &Field,
    ) -> Result<(), GatewayError> {
        let field_id = field
            .id
            .ok_or_else(|| GatewayError::integrity("existing field without id"))?;
        let mut state = self.state.lock().unwrap();
        state.fields.push(FieldRecord {
            content_id: content.version_info.content_info.id,
            row: FieldRow {
                id: field_id,
                field_definition_id: field.field_definition_id,
                field_type: field.field_type.clone(),
                language_code: field.language_code.clone(),
                version_no: field.version_no.unwrap_or(content.version_info.version_no),
                value: field.value.clone(),
            },
        });
        Ok(())
    }

    async fn update_field(&self, field: &Field) -> Result<(), GatewayError> {
        let field_id = field
            .id
            .ok_or_else(|| GatewayError::integrity("field update without id"))?;
        let version_no = field
            .version_no
            .ok_or_else(|| GatewayError::integrity("field update without version"))?;
        let mut state = self.state.lock().unwrap();
        for record in &mut state.fields {
            if record.row.id == field_id && record.row.version_no == version_no {
                record.row.value = field.value.clone();
            }
        }
        Ok(())
    }

    async fn update_non_translatable_field(
        &self,
        field: &Field,
        content_id: ContentId,
    ) -> Result<(), GatewayError> {
        let version_no = field
            .version_no
            .ok_or_else(|| GatewayError::integrity("field update without version"))?;
        let mut state = self.state.lock().unwrap();
        for record in &mut state.fields {
            if record.content_id == content_id
                && record.row.field_definition_id == field.field_definition_id
                && record.row.version_no == version_no
            {
                record.row.value = field.value.clone();
            }
        }
        Ok(())
    }

    async fn load(
        &self,
        content_id: ContentId,
        version_no: Option<VersionNo>,
        languages: Option<&[String]>,
    ) -> Result<Vec<ContentRow>, GatewayError> {
        let state = self.state.lock().unwrap();
        let Some(info) = state.content_infos.get(&content_id) else {
            return Ok(Vec::new());
        };
        let version_no = version_no.unwrap_or(info.current_version_no);
        let Some(version) = state.versions.get(&(content_id, version_no)) else {
            return Ok(Vec::new());
        };

        let fields: Vec<FieldRow> = state
            .fields
            .iter()
            .filter(|record| {
                record.content_id == content_id
                    && record.row.version_no == version_no
                    && languages
                        .map(|languages| languages.contains(&record.row.language_code))
                        .unwrap_or(true)
            })
            .map(|record| record.row.clone())
            .collect();

        if fields.is_empty() {
            return Ok(vec![ContentRow {
                info: info.clone(),
                version: version.clone(),
                field: None,
            }]);
        }
        Ok(fields
            .into_iter()
            .map(|field| ContentRow {
                info: info.clone(),
                version: version.clone(),
                field: Some(field),
            })
            .collect())
    }

    async fn load_content_list(
        &self,
        content_ids: &[ContentId],
        languages: Option<&[String]>,
    ) -> Result<Vec<ContentRow>, GatewayError> {
        let mut rows = Vec::new();
        for content_id in content_ids {
            rows.extend(ContentGateway::load(self, *content_id, None, languages).await?);
        }
        Ok(rows)
    }

    async fn load_content_info(
        &self,
        content_id: ContentId,
    ) -> Result<Option<ContentInfoRow>, GatewayError> {
        Ok(self.state.lock().unwrap().content_infos.get(&content_id).cloned())
    }

    async fn load_content_info_by_remote_id(
        &self,
        remote_id: &str,
    ) -> Result<Option<ContentInfoRow>, GatewayError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .content_infos
            .values()
            .find(|info| info.remote_id == remote_id)
            .cloned())
    }

    async fn load_version_info(
        &self,
        content_id: ContentId,
        version_no: Option<VersionNo>,
    ) -> Result<Vec<VersionInfoRow>, GatewayError> {
        let state = self.state.lock().unwrap();
        let Some(info) = state.content_infos.get(&content_id) else {
            return Ok(Vec::new());
        };
        let version_no = version_no.unwrap_or(info.current_version_no);
        Ok(state
            .versions
            .get(&(content_id, version_no))
            .map(|version| {
                vec![VersionInfoRow {
                    info: info.clone(),
                    version: version.clone(),
                }]
            })
            .unwrap_or_default())
    }

    async fn load_version_info_list(
        &self,
        content_ids: &[ContentId],
    ) -> Result<Vec<VersionInfoRow>, GatewayError> {
        let mut rows = Vec::new();
        for content_id in content_ids {
            rows.extend(ContentGateway::load_version_info(self, *content_id, None).await?);
        }
        Ok(rows)
    }

    async fn get_last_version_number(
        &self,
        content_id: ContentId,
    ) -> Result<VersionNo, GatewayError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .versions
            .values()
            .filter(|version| version.content_id == content_id)
            .map(|version| version.version_no)
            .max()
            .unwrap_or(0))
    }

    async fn list_versions(
        &self,
        content_id: ContentId,
        status: Option<VersionStatus>,
    ) -> Result<Vec<VersionInfoRow>, GatewayError> {
        let state = self.state.lock().unwrap();
        let Some(info) = state.content_infos.get(&content_id) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<_> = state
            .versions
            .values()
            .filter(|version| {
                version.content_id == content_id
                    && status.map(|status| version.status == status).unwrap_or(true)
            })
            .map(|version| VersionInfoRow {
                info: info.clone(),
                version: version.clone(),
            })
            .collect();
        rows.sort_by_key(|row| row.version.version_no);
        Ok(rows)
    }

    async fn list_versions_for_user(
        &self,
        user_id: UserId,
        status: VersionStatus,
    ) -> Result<Vec<VersionInfoRow>, GatewayError> {
        let state = self.state.lock().unwrap();
        let mut rows = Vec::new();
        for version in state.versions.values() {
            if version.creator_id != user_id || version.status != status {
                continue;
            }
            if let Some(info) = state.content_infos.get(&version.content_id) {
                rows.push(VersionInfoRow {
                    info: info.clone(),
                    version: version.clone(),
                });
            }
        }
        rows.sort_by_key(|row| (row.version.content_id, row.version.version_no));
        Ok(rows)
    }

    async fn load_versioned_name_data(
        &self,
        pairs: &[(ContentId, VersionNo)],
    ) -> Result<Vec<NameRow>, GatewayError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .names
            .iter()
            .filter(|row| pairs.contains(&(row.content_id, row.version_no)))
            .cloned()
            .collect())
    }

    async fn set_name(
        &self,
        content_id: ContentId,
        version_no: VersionNo,
        name: &str,
        language_code: &str,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        if let Some(row) = state.names.iter_mut().find(|row| {
            row.content_id == content_id
                && row.version_no == version_no
                && row.language_code == language_code
        }) {
            row.name = name.to_string();
        } else {
            state.names.push(NameRow {
                content_id,
                version_no,
                language_code: language_code.to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    async fn set_status(
        &self,
        content_id: ContentId,
        version_no: VersionNo,
        status: VersionStatus,
    ) -> Result<bool, GatewayError> {
        let mut state = self.state.lock().unwrap();
        let updated = match state.versions.get_mut(&(content_id, version_no)) {
            Some(version) => {
                version.status = status;
                true
            }
            None => false,
        };
        drop(state);
        self.log(format!(
            "set_status({content_id}, v{version_no}, {})",
            status.as_str()
        ));
        Ok(updated)
    }

    async fn set_published_status(
        &self,
        content_id: ContentId,
        version_no: VersionNo,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        if let Some(version) = state.versions.get_mut(&(content_id, version_no)) {
            version.status = VersionStatus::Published;
        }
        if let Some(info) = state.content_infos.get_mut(&content_id) {
            info.status = ContentStatus::Published;
            info.current_version_no = version_no;
            if info.publication_date.is_none() {
                info.publication_date = Some(OffsetDateTime::now_utc());
            }
        }
        drop(state);
        self.log(format!("set_published_status({content_id}, v{version_no})"));
        Ok(())
    }

    async fn insert_relation(
        &self,
        create_struct: &RelationCreateStruct,
    ) -> Result<RelationId, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.next_relation_id += 1;
        let relation_id = state.next_relation_id;
        state.relations.insert(
            relation_id,
            RelationRow {
                id: relation_id,
                source_content_id: create_struct.source_content_id,
                source_content_version_no: create_struct.source_content_version_no,
                source_field_definition_id: create_struct.source_field_definition_id,
                destination_content_id: create_struct.destination_content_id,
                relation_type: create_struct.relation_type,
            },
        );
        Ok(relation_id)
    }

    async fn load_relation(
        &self,
        relation_id: RelationId,
    ) -> Result<Option<RelationRow>, GatewayError> {
        Ok(self.state.lock().unwrap().relations.get(&relation_id).cloned())
    }

    async fn load_relations(
        &self,
        source_content_id: ContentId,
        source_version_no: Option<VersionNo>,
        relation_type: Option<RelationType>,
    ) -> Result<Vec<RelationRow>, GatewayError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .relations
            .values()
            .filter(|row| {
                row.source_content_id == source_content_id
                    && source_version_no
                        .map(|version| row.source_content_version_no == version)
                        .unwrap_or(true)
                    && relation_type
                        .map(|relation_type| row.relation_type == relation_type)
                        .unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    async fn load_relation_list(
        &self,
        source_content_id: ContentId,
        limit: u32,
        offset: u32,
        relation_type: Option<RelationType>,
    ) -> Result<Vec<RelationRow>, GatewayError> {
        let current_version_no = self
            .state
            .lock()
            .unwrap()
            .content_infos
            .get(&source_content_id)
            .map(|info| info.current_version_no);
        let Some(current_version_no) = current_version_no else {
            return Ok(Vec::new());
        };
        let rows = self
            .load_relations(source_content_id, Some(current_version_no), relation_type)
            .await?;
        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn load_reverse_relations(
        &self,
        destination_content_id: ContentId,
        relation_type: Option<RelationType>,
    ) -> Result<Vec<RelationRow>, GatewayError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .relations
            .values()
            .filter(|row| {
                row.destination_content_id == destination_content_id
                    && relation_type
                        .map(|relation_type| row.relation_type == relation_type)
                        .unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    async fn count_reverse_relations(
        &self,
        destination_content_id: ContentId,
        relation_type: Option<RelationType>,
    ) -> Result<u64, GatewayError> {
        Ok(self
            .load_reverse_relations(destination_content_id, relation_type)
            .await?
            .len() as u64)
    }

    async fn delete_relation(
        &self,
        relation_id: RelationId,
        _relation_type: RelationType,
    ) -> Result<(), GatewayError> {
        self.state.lock().unwrap().relations.remove(&relation_id);
        Ok(())
    }

    async fn delete_relations(
        &self,
        content_id: ContentId,
        version_no: Option<VersionNo>,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.relations.retain(|_, row| {
            !(row.source_content_id == content_id
                && version_no
                    .map(|version| row.source_content_version_no == version)
                    .unwrap_or(true))
        });
        drop(state);
        self.log(format!("delete_relations({content_id}, {version_no:?})"));
        Ok(())
    }

    async fn remove_reverse_field_relations(
        &self,
        content_id: ContentId,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.relations.retain(|_, row| {
            !(row.destination_content_id == content_id
                && matches!(row.relation_type, RelationType::Field | RelationType::Asset))
        });
        Ok(())
    }

    async fn copy_relations(
        &self,
        source_content_id: ContentId,
        destination_content_id: ContentId,
        version_no: Option<VersionNo>,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        let copies: Vec<RelationRow> = state
            .relations
            .values()
            .filter(|row| {
                row.source_content_id == source_content_id
                    && version_no
                        .map(|version| row.source_content_version_no == version)
                        .unwrap_or(true)
            })
            .cloned()
            .collect();
        for mut row in copies {
            state.next_relation_id += 1;
            row.id = state.next_relation_id;
            row.source_content_id = destination_content_id;
            state.relations.insert(row.id, row);
        }
        drop(state);
        self.log(format!(
            "copy_relations({source_content_id}, {destination_content_id}, {version_no:?})"
        ));
        Ok(())
    }

    async fn get_field_ids_by_type(
        &self,
        content_id: ContentId,
        version_no: Option<VersionNo>,
    ) -> Result<BTreeMap<String, Vec<FieldId>>, GatewayError> {
        let state = self.state.lock().unwrap();
        let mut grouped: BTreeMap<String, Vec<FieldId>> = BTreeMap::new();
        for record in &state.fields {
            if record.content_id == content_id
                && version_no
                    .map(|version| record.row.version_no == version)
                    .unwrap_or(true)
            {
                grouped
                    .entry(record.row.field_type.clone())
                    .or_default()
                    .push(record.row.id);
            }
        }
        Ok(grouped)
    }

    async fn delete_fields(
        &self,
        content_id: ContentId,
        version_no: Option<VersionNo>,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.fields.retain(|record| {
            !(record.content_id == content_id
                && version_no
                    .map(|version| record.row.version_no == version)
                    .unwrap_or(true))
        });
        drop(state);
        self.log(format!("delete_fields({content_id}, {version_no:?})"));
        Ok(())
    }

    async fn delete_versions(
        &self,
        content_id: ContentId,
        version_no: Option<VersionNo>,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.versions.retain(|(id, version), _| {
            !(*id == content_id
                && version_no.map(|target| *version == target).unwrap_or(true))
        });
        drop(state);
        self.log(format!("delete_versions({content_id}, {version_no:?})"));
        Ok(())
    }

    async fn delete_names(
        &self,
        content_id: ContentId,
        version_no: Option<VersionNo>,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.names.retain(|row| {
            !(row.content_id == content_id
                && version_no
                    .map(|version| row.version_no == version)
                    .unwrap_or(true))
        });
        drop(state);
        self.log(format!("delete_names({content_id}, {version_no:?})"));
        Ok(())
    }

    async fn delete_content(&self, content_id: ContentId) -> Result<(), GatewayError> {
        self.state.lock().unwrap().content_infos.remove(&content_id);
        self.log(format!("delete_content({content_id})"));
        Ok(())
    }

    async fn get_all_location_ids(
        &self,
        content_id: ContentId,
    ) -> Result<Vec<LocationId>, GatewayError> {
        let state = self.state.lock().unwrap();
        let mut ids: Vec<_> = state
            .locations
            .values()
            .filter(|row| row.content_id == content_id)
            .map(|row| row.node_id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl LocationGateway for InMemoryStore {
    async fn get_basic_node_data(
        &self,
        location_id: LocationId,
    ) -> Result<Option<LocationRow>, GatewayError> {
        Ok(self.state.lock().unwrap().locations.get(&location_id).cloned())
    }

    async fn get_basic_node_data_by_remote_id(
        &self,
        remote_id: &str,
    ) -> Result<Option<LocationRow>, GatewayError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .locations
            .values()
            .find(|row| row.remote_id == remote_id)
            .cloned())
    }

    async fn load_location_data_by_content(
        &self,
        content_id: ContentId,
        root_location_id: Option<LocationId>,
    ) -> Result<Vec<LocationRow>, GatewayError> {
        let state = self.state.lock().unwrap();
        let root_path = root_location_id
            .and_then(|id| state.locations.get(&id))
            .map(|row| row.path_string.clone());
        let mut rows: Vec<_> = state
            .locations
            .values()
            .filter(|row| {
                row.content_id == content_id
                    && root_path
                        .as_ref()
                        .map(|path| row.path_string.starts_with(path.as_str()))
                        .unwrap_or(true)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.path_string.cmp(&b.path_string));
        Ok(rows)
    }

    async fn load_parent_location_data_for_draft_content(
        &self,
        content_id: ContentId,
    ) -> Result<Vec<LocationRow>, GatewayError> {
        let state = self.state.lock().unwrap();
        let mut parent_ids: Vec<LocationId> = state
            .assignments
            .iter()
            .filter(|assignment| {
                assignment.content_id == content_id
                    && assignment.opcode == AssignmentOpcode::Create
            })
            .map(|assignment| assignment.parent_id)
            .collect();
        parent_ids.sort();
        parent_ids.dedup();
        Ok(parent_ids
            .into_iter()
            .filter_map(|id| state.locations.get(&id).cloned())
            .collect())
    }

    async fn get_subtree_content(
        &self,
        location_id: LocationId,
    ) -> Result<Vec<LocationRow>, GatewayError> {
        let state = self.state.lock().unwrap();
        let Some(root) = state.locations.get(&location_id) else {
            return Ok(Vec::new());
        };
        let prefix = root.path_string.clone();
        let mut rows: Vec<_> = state
            .locations
            .values()
            .filter(|row| row.path_string.starts_with(prefix.as_str()))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.path_string.cmp(&b.path_string));
        Ok(rows)
    }

    async fn get_children(
        &self,
        location_id: LocationId,
    ) -> Result<Vec<LocationRow>, GatewayError> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<_> = state
            .locations
            .values()
            .filter(|row| row.parent_id == location_id && row.node_id != location_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.path_string.cmp(&b.path_string));
        Ok(rows)
    }

    async fn get_subtree_children_draft_content_ids(
        &self,
        location_id: LocationId,
    ) -> Result<Vec<ContentId>, GatewayError> {
        let state = self.state.lock().unwrap();
        let mut ids: Vec<ContentId> = state
            .assignments
            .iter()
            .filter(|assignment| {
                assignment.parent_id == location_id
                    && assignment.opcode == AssignmentOpcode::Create
                    && state
                        .content_infos
                        .get(&assignment.content_id)
                        .map(|info| info.status == ContentStatus::Draft)
                        .unwrap_or(false)
            })
            .map(|assignment| assignment.content_id)
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn move_subtree_nodes(
        &self,
        source: &LocationRow,
        destination: &LocationRow,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        let old_prefix = source.path_string.clone();
        let new_prefix =
            strato::domain::location::child_path(&destination.path_string, source.node_id);
        let updates: Vec<(LocationId, String)> = state
            .locations
            .values()
            .filter(|row| row.path_string.starts_with(old_prefix.as_str()))
            .map(|row| {
                (
                    row.node_id,
                    row.path_string.replacen(old_prefix.as_str(), new_prefix.as_str(), 1),
                )
            })
            .collect();
        for (node_id, path_string) in updates {
            let row = state.locations.get_mut(&node_id).unwrap();
            row.depth = depth_of(&path_string);
            row.path_string = path_string;
        }
        if let Some(row) = state.locations.get_mut(&source.node_id) {
            row.parent_id = destination.node_id;
        }
        drop(state);
        self.log(format!(
            "move_subtree_nodes({}, {})",
            source.node_id, destination.node_id
        ));
        Ok(())
    }

    async fn update_node_assignment(
        &self,
        content_id: ContentId,
        old_parent_id: LocationId,
        new_parent_id: LocationId,
        opcode: AssignmentOpcode,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        for assignment in &mut state.assignments {
            if assignment.content_id == content_id && assignment.parent_id == old_parent_id {
                assignment.parent_id = new_parent_id;
                assignment.opcode = opcode;
            }
        }
        Ok(())
    }

    async fn create_locations_from_node_assignments(
        &self,
        content_id: ContentId,
        version_no: VersionNo,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        let pending: Vec<Assignment> = state
            .assignments
            .iter()
            .filter(|assignment| {
                assignment.content_id == content_id
                    && assignment.opcode == AssignmentOpcode::Create
            })
            .cloned()
            .collect();
        for assignment in pending {
            materialize_location(
                &mut state,
                content_id,
                version_no,
                assignment.parent_id,
                assignment.remote_id.clone(),
                assignment.priority,
                assignment.hidden,
                assignment.sort_field,
                assignment.sort_order,
                assignment.is_main,
            )?;
        }
        for assignment in &mut state.assignments {
            if assignment.content_id == content_id
                && assignment.opcode == AssignmentOpcode::Create
            {
                assignment.opcode = AssignmentOpcode::CreateNop;
            }
        }
        drop(state);
        self.log(format!(
            "create_locations_from_node_assignments({content_id}, v{version_no})"
        ));
        Ok(())
    }

    async fn update_locations_content_version_no(
        &self,
        content_id: ContentId,
        version_no: VersionNo,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        for row in state.locations.values_mut() {
            if row.content_id == content_id {
                row.content_version_no = version_no;
            }
        }
        drop(state);
        self.log(format!(
            "update_locations_content_version_no({content_id}, v{version_no})"
        ));
        Ok(())
    }

    async fn create(
        &self,
        create_struct: &LocationCreateStruct,
        parent: &LocationRow,
    ) -> Result<LocationRow, GatewayError> {
        let mut state = self.state.lock().unwrap();
        let node_id = materialize_location(
            &mut state,
            create_struct.content_id,
            create_struct.content_version_no,
            parent.node_id,
            create_struct.remote_id.clone(),
            create_struct.priority,
            create_struct.hidden,
            create_struct.sort_field,
            create_struct.sort_order,
            create_struct.is_main,
        )?;
        if create_struct.invisible {
            state.locations.get_mut(&node_id).unwrap().invisible = true;
        }
        if let Some(path_identification_string) = &create_struct.path_identification_string {
            state
                .locations
                .get_mut(&node_id)
                .unwrap()
                .path_identification_string = path_identification_string.clone();
        }
        Ok(state.locations.get(&node_id).cloned().unwrap())
    }

    async fn create_node_assignment(
        &self,
        create_struct: &LocationCreateStruct,
        parent_id: LocationId,
        opcode: AssignmentOpcode,
    ) -> Result<(), GatewayError> {
        self.state.lock().unwrap().assignments.push(Assignment {
            content_id: create_struct.content_id,
            version_no: create_struct.content_version_no,
            parent_id,
            opcode,
            is_main: create_struct.is_main,
            remote_id: create_struct.remote_id.clone(),
            priority: create_struct.priority,
            hidden: create_struct.hidden,
            sort_field: create_struct.sort_field,
            sort_order: create_struct.sort_order,
        });
        Ok(())
    }

    async fn delete_node_assignment(
        &self,
        content_id: ContentId,
        version_no: Option<VersionNo>,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.assignments.retain(|assignment| {
            !(assignment.content_id == content_id
                && version_no
                    .map(|version| assignment.version_no == version)
                    .unwrap_or(true))
        });
        drop(state);
        self.log(format!("delete_node_assignment({content_id}, {version_no:?})"));
        Ok(())
    }

    async fn update(
        &self,
        update_struct: &LocationUpdateStruct,
        location_id: LocationId,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        let row = state
            .locations
            .get_mut(&location_id)
            .ok_or_else(|| GatewayError::integrity(format!("location {location_id} missing")))?;
        row.priority = update_struct.priority;
        row.remote_id = update_struct.remote_id.clone();
        row.sort_field = update_struct.sort_field;
        row.sort_order = update_struct.sort_order;
        Ok(())
    }

    async fn remove_location(&self, location_id: LocationId) -> Result<(), GatewayError> {
        self.state.lock().unwrap().locations.remove(&location_id);
        self.log(format!("remove_location({location_id})"));
        Ok(())
    }

    async fn get_fallback_main_node_data(
        &self,
        content_id: ContentId,
        excluded_location_id: LocationId,
    ) -> Result<Option<LocationRow>, GatewayError> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<_> = state
            .locations
            .values()
            .filter(|row| row.content_id == content_id && row.node_id != excluded_location_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.node_id);
        Ok(rows.into_iter().next())
    }

    async fn change_main_location(
        &self,
        content_id: ContentId,
        location_id: LocationId,
        version_no: VersionNo,
        parent_location_id: LocationId,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        for row in state.locations.values_mut() {
            if row.content_id == content_id {
                row.main_node_id = location_id;
            }
        }
        if let Some(info) = state.content_infos.get_mut(&content_id) {
            info.main_location_id = Some(location_id);
        }
        for assignment in &mut state.assignments {
            if assignment.content_id == content_id {
                assignment.is_main = assignment.parent_id == parent_location_id;
            }
        }
        drop(state);
        self.log(format!(
            "change_main_location({content_id}, {location_id}, v{version_no}, parent {parent_location_id})"
        ));
        Ok(())
    }

    async fn count_locations_by_content_id(
        &self,
        content_id: ContentId,
    ) -> Result<u64, GatewayError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .locations
            .values()
            .filter(|row| row.content_id == content_id)
            .count() as u64)
    }

    async fn set_section_for_subtree(
        &self,
        path_string: &str,
        section_id: SectionId,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        let content_ids: Vec<ContentId> = state
            .locations
            .values()
            .filter(|row| row.path_string.starts_with(path_string))
            .map(|row| row.content_id)
            .collect();
        for content_id in content_ids {
            if let Some(info) = state.content_infos.get_mut(&content_id) {
                info.section_id = section_id;
            }
        }
        drop(state);
        self.log(format!("set_section_for_subtree({path_string}, {section_id})"));
        Ok(())
    }

    async fn hide_subtree(&self, path_string: &str) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        let ids: Vec<LocationId> = state
            .locations
            .values()
            .filter(|row| row.path_string == path_string)
            .map(|row| row.node_id)
            .collect();
        for node_id in ids {
            state.locations.get_mut(&node_id).unwrap().hidden = true;
        }
        recompute_visibility(&mut state);
        drop(state);
        self.log(format!("hide_subtree({path_string})"));
        Ok(())
    }

    async fn unhide_subtree(&self, path_string: &str) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        let ids: Vec<LocationId> = state
            .locations
            .values()
            .filter(|row| row.path_string == path_string)
            .map(|row| row.node_id)
            .collect();
        for node_id in ids {
            state.locations.get_mut(&node_id).unwrap().hidden = false;
        }
        recompute_visibility(&mut state);
        drop(state);
        self.log(format!("unhide_subtree({path_string})"));
        Ok(())
    }

    async fn swap(
        &self,
        location_id1: LocationId,
        location_id2: LocationId,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        let row1 = state
            .locations
            .get(&location_id1)
            .cloned()
            .ok_or_else(|| GatewayError::integrity(format!("location {location_id1} missing")))?;
        let row2 = state
            .locations
            .get(&location_id2)
            .cloned()
            .ok_or_else(|| GatewayError::integrity(format!("location {location_id2} missing")))?;

        {
            let first = state.locations.get_mut(&location_id1).unwrap();
            first.content_id = row2.content_id;
            first.content_version_no = row2.content_version_no;
            first.main_node_id = if row2.main_node_id == location_id2 {
                location_id1
            } else {
                row2.main_node_id
            };
        }
        {
            let second = state.locations.get_mut(&location_id2).unwrap();
            second.content_id = row1.content_id;
            second.content_version_no = row1.content_version_no;
            second.main_node_id = if row1.main_node_id == location_id1 {
                location_id2
            } else {
                row1.main_node_id
            };
        }
        if let Some(info) = state.content_infos.get_mut(&row1.content_id) {
            if info.main_location_id == Some(location_id1) {
                info.main_location_id = Some(location_id2);
            }
        }
        if let Some(info) = state.content_infos.get_mut(&row2.content_id) {
            if info.main_location_id == Some(location_id2) {
                info.main_location_id = Some(location_id1);
            }
        }
        drop(state);
        self.log(format!("swap({location_id1}, {location_id2})"));
        Ok(())
    }

    async fn update_path_identification_string(
        &self,
        location_id: LocationId,
        _parent_location_id: LocationId,
        text: &str,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().unwrap();
        if let Some(row) = state.locations.get_mut(&location_id) {
            row.path_identification_string = text.to_string();
        }
        drop(state);
        self.log(format!("update_path_identification_string({location_id}, {text})"));
        Ok(())
    }
}

#[async_trait]
impl UrlAliasGateway for InMemoryStore {
    async fn load_location_entries(
        &self,
        location_id: LocationId,
        language_id: LanguageId,
    ) -> Result<Vec<UrlAliasRow>, GatewayError> {
        Ok(self
            .aliases
            .lock()
            .unwrap()
            .get(&(location_id, language_id))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ContentTypeHandler for InMemoryStore {
    async fn load(
        &self,
        content_type_id: ContentTypeId,
    ) -> Result<Option<ContentType>, GatewayError> {
        Ok(self
            .content_types
            .lock()
            .unwrap()
            .get(&content_type_id)
            .cloned())
    }
}

#[async_trait]
impl LanguageHandler for InMemoryStore {
    async fn load(&self, language_id: LanguageId) -> Result<Option<Language>, GatewayError> {
        Ok(self
            .languages
            .lock()
            .unwrap()
            .iter()
            .find(|language| language.id == language_id)
            .cloned())
    }

    async fn load_by_language_code(
        &self,
        language_code: &str,
    ) -> Result<Option<Language>, GatewayError> {
        Ok(self
            .languages
            .lock()
            .unwrap()
            .iter()
            .find(|language| language.language_code == language_code)
            .cloned())
    }

    async fn load_all(&self) -> Result<Vec<Language>, GatewayError> {
        Ok(self.languages.lock().unwrap().clone())
    }
}

#[async_trait]
impl ObjectStateHandler for InMemoryStore {
    async fn load_all_groups(&self) -> Result<Vec<ObjectStateGroup>, GatewayError> {
        Ok(self
            .state_groups
            .lock()
            .unwrap()
            .iter()
            .map(|(group, _)| group.clone())
            .collect())
    }

    async fn load_object_states(
        &self,
        group_id: ObjectStateGroupId,
    ) -> Result<Vec<ObjectState>, GatewayError> {
        Ok(self
            .state_groups
            .lock()
            .unwrap()
            .iter()
            .find(|(group, _)| group.id == group_id)
            .map(|(_, states)| states.clone())
            .unwrap_or_default())
    }

    async fn set_content_state(
        &self,
        content_id: ContentId,
        group_id: ObjectStateGroupId,
        state_id: ObjectStateId,
    ) -> Result<(), GatewayError> {
        self.state
            .lock()
            .unwrap()
            .content_states
            .push((content_id, group_id, state_id));
        Ok(())
    }
}

/// Storage engine counting calls; used to observe external-data traffic.
#[derive(Default)]
pub struct CountingStorage {
    pub stores: AtomicUsize,
    pub copies: AtomicUsize,
    pub gets: AtomicUsize,
    pub deletes: AtomicUsize,
}

#[async_trait]
impl FieldStorage for CountingStorage {
    async fn store_field_data(
        &self,
        _version_info: &VersionInfo,
        _field: &mut Field,
        _context: &StorageContext,
    ) -> Result<ValueUpdate, StorageError> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        Ok(ValueUpdate::unchanged())
    }

    async fn copy_field_data(
        &self,
        _version_info: &VersionInfo,
        _field: &mut Field,
        _original: &Field,
        _context: &StorageContext,
    ) -> Result<ValueUpdate, StorageError> {
        self.copies.fetch_add(1, Ordering::SeqCst);
        Ok(ValueUpdate::unchanged())
    }

    async fn get_field_data(
        &self,
        _version_info: &VersionInfo,
        field: &mut Field,
        _context: &StorageContext,
    ) -> Result<(), StorageError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        field.value.external_data = serde_json::json!({"exists": true});
        Ok(())
    }

    async fn delete_field_data(
        &self,
        _version_info: &VersionInfo,
        _field_ids: &[FieldId],
        _context: &StorageContext,
    ) -> Result<(), StorageError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn has_field_data(&self) -> bool {
        true
    }
}

pub struct TestRepository {
    pub store: Arc<InMemoryStore>,
    pub storage: Arc<CountingStorage>,
    pub content_handler: Arc<ContentHandler>,
    pub location_handler: Arc<LocationHandler>,
    pub tree_handler: Arc<TreeHandler>,
}

pub fn build_repository() -> TestRepository {
    build_repository_with(RepositoryOptions::default())
}

pub fn build_repository_with(options: RepositoryOptions) -> TestRepository {
    let store = InMemoryStore::new();
    let storage = Arc::new(CountingStorage::default());

    let registry = StorageRegistry::new();
    registry.register("ezbinaryfile", storage.clone());
    let storage_handler = Arc::new(StorageHandler::new(
        Arc::new(registry),
        StorageContext::default(),
    ));

    let field_handler = Arc::new(FieldHandler::new(store.clone(), storage_handler));
    let tree_handler = Arc::new(TreeHandler::new(
        store.clone(),
        store.clone(),
        Mapper::new(),
        LocationMapper::new(),
        field_handler.clone(),
    ));
    let content_handler = Arc::new(ContentHandler::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Mapper::new(),
        field_handler,
        SlugConverter::new(),
        store.clone(),
        store.clone(),
        tree_handler.clone(),
        options,
    ));
    let location_handler = Arc::new(LocationHandler::new(
        store.clone(),
        LocationMapper::new(),
        content_handler.clone(),
        store.clone(),
        tree_handler.clone(),
    ));

    TestRepository {
        store,
        storage,
        content_handler,
        location_handler,
        tree_handler,
    }
}

/// Content type with a translatable title and an untranslatable attachment.
pub fn article_type() -> ContentType {
    ContentType {
        id: 4,
        identifier: "article".into(),
        field_definitions: vec![
            FieldDefinition {
                id: 7,
                identifier: "title".into(),
                field_type: "ezstring".into(),
                is_translatable: true,
                default_value: FieldValue::default(),
            },
            FieldDefinition {
                id: 8,
                identifier: "attachment".into(),
                field_type: "ezbinaryfile".into(),
                is_translatable: false,
                default_value: FieldValue::default(),
            },
        ],
    }
}

pub fn title_field(language_code: &str, text: &str) -> Field {
    Field {
        id: None,
        field_definition_id: 7,
        field_type: "ezstring".into(),
        value: FieldValue {
            data: serde_json::json!(text),
            ..FieldValue::default()
        },
        language_code: language_code.into(),
        version_no: None,
    }
}

pub fn attachment_field(language_code: &str, file: &str) -> Field {
    Field {
        id: None,
        field_definition_id: 8,
        field_type: "ezbinaryfile".into(),
        value: FieldValue {
            data: serde_json::json!({ "file": file }),
            ..FieldValue::default()
        },
        language_code: language_code.into(),
        version_no: None,
    }
}

pub fn article_create_struct(
    title: &str,
    section_id: SectionId,
    parent_location_id: LocationId,
) -> CreateStruct {
    CreateStruct {
        name: [("eng-GB".to_string(), title.to_string())]
            .into_iter()
            .collect(),
        content_type_id: 4,
        section_id,
        owner_id: 14,
        fields: vec![
            title_field("eng-GB", title),
            attachment_field("eng-GB", "report.pdf"),
        ],
        locations: vec![location_create_struct(0, parent_location_id)],
        always_available: false,
        remote_id: format!("remote-{title}"),
        initial_language_code: "eng-GB".into(),
        modified: OffsetDateTime::now_utc(),
    }
}

pub fn location_create_struct(
    content_id: ContentId,
    parent_location_id: LocationId,
) -> LocationCreateStruct {
    LocationCreateStruct {
        priority: 0,
        hidden: false,
        invisible: false,
        remote_id: format!("location-{content_id}-{parent_location_id}"),
        content_id,
        content_version_no: 1,
        parent_id: parent_location_id,
        path_identification_string: None,
        sort_field: SortField::Path,
        sort_order: SortOrder::Asc,
        is_main: false,
    }
}

/// Create and publish an article under the given parent, returning the
/// published content.
pub async fn create_published_article(
    repo: &TestRepository,
    title: &str,
    section_id: SectionId,
    parent_location_id: LocationId,
) -> Content {
    repo.store.register_content_type(article_type());
    let draft = repo
        .content_handler
        .create(&article_create_struct(title, section_id, parent_location_id))
        .await
        .expect("content created");
    repo.content_handler
        .publish(
            draft.version_info.content_info.id,
            1,
            &MetadataUpdateStruct::default(),
        )
        .await
        .expect("content published")
}
