//! Sigil Crypto: key providers, private key storage and the KMS that
//! dispatches signing requests by key type.

pub mod bjj;
pub mod ed25519;
pub mod error;
pub mod keys;
pub mod kms;
pub mod provider;
pub mod store;

pub use bjj::BjjProvider;
pub use ed25519::Ed25519Provider;
pub use error::CryptoError;
pub use keys::{KeyId, KmsKeyType};
pub use kms::{verify_signature, Kms};
pub use provider::KeyProvider;
pub use store::{InMemoryPrivateKeyStore, PrivateKeyStore};
