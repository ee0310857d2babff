use std::collections::BTreeMap;

use breeze_core::{AppError, AppResult};
use breeze_domain::{DataResource, ResourceKey};

use crate::QueryDeclaration;

/// Resource together with the query fields callers may filter on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredResource {
    /// Table binding and ownership columns.
    pub resource: DataResource,
    /// Declared query bindings.
    pub declaration: QueryDeclaration,
}

/// Startup registry of data-permission resources.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    resources: BTreeMap<ResourceKey, RegisteredResource>,
}

impl ResourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource; keys must be unique and declared bindings must
    /// target columns of the resource.
    pub fn register(
        &mut self,
        resource: DataResource,
        declaration: QueryDeclaration,
    ) -> AppResult<()> {
        let key = resource.key().clone();
        if self.resources.contains_key(&key) {
            return Err(AppError::Configuration(format!(
                "data resource '{key}' is registered more than once"
            )));
        }

        if let Some(binding) = declaration
            .bindings()
            .iter()
            .find(|binding| !resource.has_column(binding.column()))
        {
            return Err(AppError::Configuration(format!(
                "data resource '{key}' has no column '{}' for a declared query field",
                binding.column()
            )));
        }

        self.resources.insert(
            key,
            RegisteredResource {
                resource,
                declaration,
            },
        );
        Ok(())
    }

    /// Returns whether the key is registered.
    #[must_use]
    pub fn contains(&self, resource_key: &ResourceKey) -> bool {
        self.resources.contains_key(resource_key)
    }

    /// Looks up a registered resource.
    pub fn resolve(&self, resource_key: &ResourceKey) -> AppResult<&RegisteredResource> {
        self.resources.get(resource_key).ok_or_else(|| {
            AppError::Configuration(format!("data resource '{resource_key}' is not registered"))
        })
    }

    /// Returns registered keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.resources.keys()
    }
}
