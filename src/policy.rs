//! Commission policy: per-role accrual rates.
//!
//! Rates are basis points applied to the labor total a worker completed.
//! Built-in defaults cover the eligible roles; a TOML file can override
//! them per deployment.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::Role;

/// Top-level TOML wrapper.
#[derive(Debug, Deserialize)]
struct PolicyConfig {
    commission: RatesSection,
}

#[derive(Debug, Deserialize)]
struct RatesSection {
    /// Role name (kebab-case) → rate in basis points.
    rates: HashMap<String, u32>,
}

/// Resolved commission rates, indexed by role.
#[derive(Debug, Clone)]
pub struct CommissionPolicy {
    rates: HashMap<Role, u32>,
}

impl CommissionPolicy {
    /// Built-in default rates: 10% for mechanic and body-work.
    pub fn default_rates() -> Self {
        let mut rates = HashMap::new();
        rates.insert(Role::Mechanic, 1000);
        rates.insert(Role::BodyWork, 1000);
        Self { rates }
    }

    /// Load rates from a TOML file, replacing the defaults for any role
    /// the file names. Unknown role names are a config error.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read policy {}: {e}", path.display())))?;
        let config: PolicyConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("bad policy {}: {e}", path.display())))?;

        let mut policy = Self::default_rates();
        for (name, bps) in config.commission.rates {
            let role: Role = name
                .parse()
                .map_err(|_| Error::Config(format!("policy names unknown role: {name}")))?;
            policy.rates.insert(role, bps);
        }
        Ok(policy)
    }

    /// Load from an optional path, falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default_rates()),
        }
    }

    /// Rate for a role in basis points. Non-eligible roles accrue nothing
    /// regardless of what a policy file says.
    pub fn rate_bps(&self, role: Role) -> u32 {
        if !role.commission_eligible() {
            return 0;
        }
        self.rates.get(&role).copied().unwrap_or(0)
    }

    /// Commission amount for a completed labor total, minor units.
    /// Integer basis-point arithmetic, rounds toward zero.
    pub fn amount_for(&self, role: Role, labor_total: i64) -> i64 {
        labor_total * i64::from(self.rate_bps(role)) / 10_000
    }
}

impl Default for CommissionPolicy {
    fn default() -> Self {
        Self::default_rates()
    }
}
