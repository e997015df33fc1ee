//! Sigil Status: credential revocation status resolution.
//!
//! A [`CredentialStatusResolverRegistry`] maps each status mechanism to a
//! resolver. [`IssuerResolver`] reads the issuer's local revocation tree;
//! [`RhsResolver`] reads the published state from the chain and walks the
//! revocation tree on a reverse hash service.

pub mod error;
pub mod issuer;
pub mod registry;
pub mod resolver;
pub mod rhs;
pub mod rhs_resolver;

pub use error::StatusError;
pub use issuer::IssuerResolver;
pub use registry::CredentialStatusResolverRegistry;
pub use resolver::{CredentialStatusResolver, ResolveOptions, RevocationStatus};
pub use rhs::{HttpReverseHashService, InMemoryReverseHashService, ReverseHashService, RhsNode};
pub use rhs_resolver::RhsResolver;
