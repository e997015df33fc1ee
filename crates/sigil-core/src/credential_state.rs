use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Holder-side lifecycle of a credential.
///
/// ```text
/// Issued --Activate--> Active --Expire--> Expired
///    \                    |
///     \--Revoke--> Revoked <--Revoke
/// ```
///
/// `Revoked` and `Expired` absorb every further event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialState {
    Issued,
    /// In a holder's wallet, presentable.
    Active,
    Revoked,
    Expired,
}

/// What a holder observed about a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialEvent {
    /// Stored in a wallet.
    Activate,
    /// Its nonce showed up in the issuer's revocation tree.
    Revoke,
    /// Verified after its expiration date.
    Expire,
}

impl CredentialEvent {
    fn target(self) -> CredentialState {
        match self {
            Self::Activate => CredentialState::Active,
            Self::Revoke => CredentialState::Revoked,
            Self::Expire => CredentialState::Expired,
        }
    }
}

impl CredentialState {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Revoked | Self::Expired)
    }

    /// The state reached by applying `event`, if the lifecycle allows it.
    pub fn apply(self, event: CredentialEvent) -> Result<Self, CoreError> {
        use CredentialEvent::*;
        use CredentialState::*;

        let allowed = matches!(
            (self, event),
            (Issued, Activate) | (Issued, Revoke) | (Active, Revoke) | (Active, Expire)
        );
        if !allowed {
            return Err(CoreError::InvalidStateTransition {
                from: self,
                to: event.target(),
            });
        }
        Ok(event.target())
    }

    pub fn accepts(self, event: CredentialEvent) -> bool {
        self.apply(event).is_ok()
    }
}

impl fmt::Display for CredentialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Issued => "issued",
            Self::Active => "active",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        };
        f.write_str(name)
    }
}
