use dashmap::DashMap;
use std::sync::Arc;

use sigil_core::{CredentialStatus, CredentialStatusType};

use crate::error::StatusError;
use crate::resolver::{CredentialStatusResolver, ResolveOptions, RevocationStatus};

/// Maps a status mechanism to the resolver that answers it.
#[derive(Default)]
pub struct CredentialStatusResolverRegistry {
    resolvers: DashMap<CredentialStatusType, Arc<dyn CredentialStatusResolver>>,
}

impl CredentialStatusResolverRegistry {
    /// An empty registry. Every lookup fails until a resolver is registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver. A later registration for the same type wins.
    pub fn register(
        &self,
        status_type: CredentialStatusType,
        resolver: Arc<dyn CredentialStatusResolver>,
    ) {
        if self.resolvers.insert(status_type, resolver).is_some() {
            tracing::warn!(status_type = %status_type, "status resolver replaced");
        } else {
            tracing::debug!(status_type = %status_type, "status resolver registered");
        }
    }

    /// The resolver for `status_type`, or `NoResolverRegistered`.
    pub fn get(
        &self,
        status_type: CredentialStatusType,
    ) -> Result<Arc<dyn CredentialStatusResolver>, StatusError> {
        self.resolvers
            .get(&status_type)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| StatusError::NoResolverRegistered(status_type.to_string()))
    }

    /// Resolve `status` with the resolver registered for its type.
    pub async fn resolve(
        &self,
        status: &CredentialStatus,
        opts: &ResolveOptions,
    ) -> Result<RevocationStatus, StatusError> {
        let resolver = self.get(status.status_type)?;
        resolver.resolve(status, opts).await
    }

    /// Status types that currently have a resolver, in no particular order.
    pub fn registered_types(&self) -> Vec<CredentialStatusType> {
        self.resolvers.iter().map(|e| *e.key()).collect()
    }
}
