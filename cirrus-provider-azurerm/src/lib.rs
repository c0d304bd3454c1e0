//! Cirrus Azure Resource Manager Provider
//!
//! Resource families of the Azure Resource Manager API built on the
//! identifier codecs and convergence engine of `cirrus-core`.
//!
//! ## Module Structure
//!
//! - `storagepool` - disk pools and their managed disk attachments
//! - `resources` - Resource type definitions
//! - `provider` - AzurermProvider implementation

pub mod provider;
pub mod resources;
pub mod storagepool;

// Re-export main types
pub use provider::AzurermProvider;

use cirrus_core::provider::{BoxFuture, Provider, ProviderResult};
use cirrus_core::resource::{Resource, ResourceId, State};

use resources::resource_types;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for AzurermProvider {
    fn name(&self) -> &'static str {
        "azurerm"
    }

    fn resource_types(&self) -> Vec<Box<dyn cirrus_core::provider::ResourceType>> {
        resource_types()
    }

    fn read(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move { self.read_resource(&id, &identifier).await })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        _identifier: &str,
        _from: &State,
        _to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        Box::pin(async move { self.update_resource(id).await })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move { self.delete_resource(&id, &identifier).await })
    }
}
