//! Metadata DTOs.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{UserMetadata, UserTokenMetadata};

/// Request body for `PUT /metadata/{token_address}/{user_address}`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PutMetadataRequest {
    /// Network of the token. Ignored once a record exists.
    pub chain: i64,
    /// Protected and public parts; both may be omitted.
    #[serde(default)]
    pub metadata: UserMetadata,
}

/// Query of `GET /metadata/{token_address}/{user_address}`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MetadataQuery {
    /// Include the protected part. Callers must only set this for the
    /// key owner or a lock manager.
    #[serde(default)]
    pub include_protected: bool,
}

/// Response body for metadata writes.
#[derive(Debug, Serialize, ToSchema)]
pub struct MetadataResponse {
    /// Network of the token.
    pub chain: i64,
    /// Checksummed lock address.
    pub token_address: String,
    /// Checksummed key owner.
    pub user_address: String,
    /// Stored metadata.
    pub user_metadata: UserMetadata,
}

impl From<UserTokenMetadata> for MetadataResponse {
    fn from(record: UserTokenMetadata) -> Self {
        Self {
            chain: record.chain,
            token_address: record.token_address,
            user_address: record.user_address,
            user_metadata: record.data.user_metadata,
        }
    }
}
