//! Role registry
//!
//! An explicit map from role to member set. The regulator is fixed when the
//! registry is created; issuers are granted and revoked by the regulator.
//! Every authorization decision goes through [`RoleRegistry::authorize`].

use crate::{
    error::{Error, Result},
    types::{Address, Role},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Role → members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRegistry {
    regulator: Address,
    members: HashMap<Role, BTreeSet<Address>>,
}

impl RoleRegistry {
    /// Create registry with a fixed regulator
    pub fn new(regulator: Address) -> Self {
        let mut members = HashMap::new();
        members.insert(Role::Regulator, BTreeSet::from([regulator.clone()]));
        members.insert(Role::Issuer, BTreeSet::new());
        Self { regulator, members }
    }

    /// The regulator address
    pub fn regulator(&self) -> &Address {
        &self.regulator
    }

    /// Whether `address` holds `role`
    pub fn has_role(&self, role: Role, address: &Address) -> bool {
        self.members
            .get(&role)
            .map(|set| set.contains(address))
            .unwrap_or(false)
    }

    /// Fail with [`Error::Unauthorized`] unless `caller` holds `required`
    pub fn authorize(&self, caller: &Address, required: Role) -> Result<()> {
        if self.has_role(required, caller) {
            Ok(())
        } else {
            Err(Error::Unauthorized {
                caller: caller.clone(),
                required,
            })
        }
    }

    /// Members of `role`, sorted
    pub fn members(&self, role: Role) -> Vec<Address> {
        self.members
            .get(&role)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Registry with `member` granted the issuer role.
    ///
    /// Returns `None` when `member` already is an issuer.
    pub fn with_issuer(&self, caller: &Address, member: &Address) -> Result<Option<Self>> {
        self.authorize(caller, Role::Regulator)?;
        if member.is_empty() {
            return Err(Error::InvalidInput("issuer address must not be empty".to_string()));
        }
        if self.has_role(Role::Issuer, member) {
            return Ok(None);
        }

        let mut next = self.clone();
        next.members
            .entry(Role::Issuer)
            .or_default()
            .insert(member.clone());
        Ok(Some(next))
    }

    /// Registry with `member` stripped of the issuer role.
    ///
    /// Returns `None` when `member` is not an issuer.
    pub fn without_issuer(&self, caller: &Address, member: &Address) -> Result<Option<Self>> {
        self.authorize(caller, Role::Regulator)?;
        if !self.has_role(Role::Issuer, member) {
            return Ok(None);
        }

        let mut next = self.clone();
        if let Some(set) = next.members.get_mut(&Role::Issuer) {
            set.remove(member);
        }
        Ok(Some(next))
    }
}
