//! Metadata service: normalized upsert/find over user token metadata.

use std::sync::Arc;

use crate::domain::{MetadataDocument, UserMetadata, UserTokenMetadata, normalize_address};
use crate::error::GatewayError;
use crate::persistence::MetadataStore;

/// Reads and writes the protected/public metadata users attach to their
/// keys.
#[derive(Debug, Clone)]
pub struct MetadataService {
    store: Arc<dyn MetadataStore>,
}

impl MetadataService {
    /// Creates a new `MetadataService`.
    #[must_use]
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// Replaces the metadata of `user_address` for `token_address`.
    ///
    /// Concurrent writers to the same key race; the last write wins.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidAddress`] for malformed addresses, or
    /// a persistence error.
    pub async fn add_metadata(
        &self,
        chain: i64,
        token_address: &str,
        user_address: &str,
        metadata: UserMetadata,
    ) -> Result<UserTokenMetadata, GatewayError> {
        let token_address = normalize_address(token_address)?;
        let user_address = normalize_address(user_address)?;
        let document = MetadataDocument::new(metadata);

        let record = self
            .store
            .upsert_metadata(chain, &token_address, &user_address, &document)
            .await?;

        tracing::info!(chain, %token_address, %user_address, "metadata saved");
        Ok(record)
    }

    /// Loads the metadata document of `user_address` for `token_address`.
    ///
    /// The protected part is only included when `include_protected` is
    /// set; the caller is responsible for deciding whether the requester
    /// may see it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidAddress`] for malformed addresses, or
    /// a persistence error.
    pub async fn get_metadata(
        &self,
        token_address: &str,
        user_address: &str,
        include_protected: bool,
    ) -> Result<Option<MetadataDocument>, GatewayError> {
        let token_address = normalize_address(token_address)?;
        let user_address = normalize_address(user_address)?;

        let record = self
            .store
            .find_metadata(&token_address, &user_address)
            .await?;

        Ok(record.map(|r| {
            if include_protected {
                r.data
            } else {
                r.data.redacted()
            }
        }))
    }
}
