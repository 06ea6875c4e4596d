//! User token metadata: a per (token, user) JSON document with a
//! protected/public split.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Metadata fields supplied by a user for one of their keys.
///
/// `protected` is only ever returned to callers that explicitly ask for
/// it (the key owner or the lock manager); `public` is visible to all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserMetadata {
    /// Owner/manager-only fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub protected: Option<serde_json::Value>,
    /// Fields visible to everyone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub public: Option<serde_json::Value>,
}

/// Stored `data` column of a [`UserTokenMetadata`] row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MetadataDocument {
    /// The user-supplied metadata.
    #[serde(rename = "userMetadata", default)]
    pub user_metadata: UserMetadata,
}

impl MetadataDocument {
    /// Wraps user metadata into a storable document.
    #[must_use]
    pub fn new(user_metadata: UserMetadata) -> Self {
        Self { user_metadata }
    }

    /// Drops the protected sub-document.
    #[must_use]
    pub fn redacted(mut self) -> Self {
        self.user_metadata.protected = None;
        self
    }
}

/// A persisted metadata record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserTokenMetadata {
    /// Network the token lives on.
    pub chain: i64,
    /// Checksummed lock (token contract) address.
    pub token_address: String,
    /// Checksummed key owner address.
    pub user_address: String,
    /// Metadata document.
    pub data: MetadataDocument,
    /// First insert.
    pub created_at: DateTime<Utc>,
    /// Last upsert.
    pub updated_at: DateTime<Utc>,
}
