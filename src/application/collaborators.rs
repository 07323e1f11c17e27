//! Consumed persistence-handler boundaries from sibling subsystems.
//!
//! These subsystems have their own handlers elsewhere; this crate only
//! consumes the slices declared here.

use async_trait::async_trait;

use crate::application::gateway::GatewayError;
use crate::domain::types::{
    ContentId, ContentType, ContentTypeId, Language, LanguageId, ObjectState, ObjectStateGroup,
    ObjectStateGroupId, ObjectStateId,
};

/// Content-type schema lookups.
#[async_trait]
pub trait ContentTypeHandler: Send + Sync {
    async fn load(
        &self,
        content_type_id: ContentTypeId,
    ) -> Result<Option<ContentType>, GatewayError>;
}

/// Language registry lookups.
#[async_trait]
pub trait LanguageHandler: Send + Sync {
    async fn load(&self, language_id: LanguageId) -> Result<Option<Language>, GatewayError>;

    async fn load_by_language_code(
        &self,
        language_code: &str,
    ) -> Result<Option<Language>, GatewayError>;

    async fn load_all(&self) -> Result<Vec<Language>, GatewayError>;
}

/// Object-state assignment, consumed when copying subtrees.
#[async_trait]
pub trait ObjectStateHandler: Send + Sync {
    async fn load_all_groups(&self) -> Result<Vec<ObjectStateGroup>, GatewayError>;

    /// States of a group, default state first.
    async fn load_object_states(
        &self,
        group_id: ObjectStateGroupId,
    ) -> Result<Vec<ObjectState>, GatewayError>;

    async fn set_content_state(
        &self,
        content_id: ContentId,
        group_id: ObjectStateGroupId,
        state_id: ObjectStateId,
    ) -> Result<(), GatewayError>;
}
