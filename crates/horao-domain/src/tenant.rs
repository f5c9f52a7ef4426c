//! Tenants and the resource constraints placed on them.

use crate::resource::ResourceTotals;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub name: String,
    pub owner: String,
    pub delegates: Vec<String>,
    pub shares: u32,
}

/// A cap on the total resources a tenant may hold across all of its
/// reservations at once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub tenant: String,
    pub limits: ResourceTotals,
}

impl Constraint {
    pub fn new(tenant: impl Into<String>, limits: ResourceTotals) -> Self {
        Self {
            tenant: tenant.into(),
            limits,
        }
    }
}
