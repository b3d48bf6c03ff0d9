//! Client storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::RegisteredClient;

// =============================================================================
// Client Storage Trait
// =============================================================================

/// Lookup of client registrations.
///
/// # Example
///
/// ```ignore
/// use authpoint_auth::storage::ClientStorage;
///
/// async fn example(storage: &impl ClientStorage) -> AuthResult<()> {
///     if let Some(client) = storage.find_by_client_id("my-app").await? {
///         println!("Redirect URIs: {:?}", client.registered_redirect_uris);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Find a client by its OAuth client_id.
    ///
    /// Returns `None` if the client doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<RegisteredClient>>;
}
