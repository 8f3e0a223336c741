//! Caller identities handed in by the session service.
//!
//! pagewright performs no authentication. An `Identity` arrives already
//! authenticated; the kernel only checks whether it is entitled to a site.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::{PrincipalId, SiteId};

/// What an identity may touch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityRole {
    /// Every site.
    Admin,
    /// Only the sites listed on the identity.
    Owner,
}

/// An authorized caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub principal: PrincipalId,
    /// Short handle for logs: "amy", "system".
    pub username: String,
    pub role: IdentityRole,
    /// Sites this identity owns. Ignored for admins.
    #[serde(default)]
    pub sites: BTreeSet<SiteId>,
}

impl Identity {
    /// An admin identity with access to every site.
    pub fn admin(principal: PrincipalId, username: impl Into<String>) -> Self {
        Self {
            principal,
            username: username.into(),
            role: IdentityRole::Admin,
            sites: BTreeSet::new(),
        }
    }

    /// An owner of the given sites.
    pub fn owner(
        principal: PrincipalId,
        username: impl Into<String>,
        sites: impl IntoIterator<Item = SiteId>,
    ) -> Self {
        Self {
            principal,
            username: username.into(),
            role: IdentityRole::Owner,
            sites: sites.into_iter().collect(),
        }
    }

    /// The local operator (CLI, maintenance). Admin over everything.
    pub fn system() -> Self {
        Self::admin(PrincipalId::system(), "system")
    }

    /// Whether this identity may act on pages of `site`.
    pub fn can_access(&self, site: SiteId) -> bool {
        match self.role {
            IdentityRole::Admin => true,
            IdentityRole::Owner => self.sites.contains(&site),
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.username, self.principal.short())
    }
}
