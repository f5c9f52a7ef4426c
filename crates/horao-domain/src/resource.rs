//! Resource definitions: what a reservation asks for, and what a
//! tenant's constraint bounds.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageType {
    Block,
    Object,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageClass {
    Hot,
    Warm,
    Cold,
}

/// A requested or constrained slice of infrastructure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ResourceDefinition {
    Compute {
        cpu: u32,
        ram_gb: u32,
        accelerator: bool,
        count: u32,
    },
    Storage {
        capacity_gb: u64,
        storage_type: StorageType,
        storage_class: StorageClass,
    },
}

/// The four dimensions the scheduler and tenant constraints reason about.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTotals {
    pub cpu: u64,
    pub ram_gb: u64,
    pub accelerators: u64,
    pub block_storage_gb: u64,
}

impl ResourceTotals {
    pub fn add(&mut self, resources: &[ResourceDefinition]) {
        for resource in resources {
            match resource {
                ResourceDefinition::Compute {
                    cpu,
                    ram_gb,
                    accelerator,
                    count,
                } => {
                    // `accelerator` is a per-unit kind flag, not a per-unit
                    // amount: the claimed accelerator count is `count`
                    // itself, not `count` scaled by anything.
                    self.cpu += u64::from(*cpu) * u64::from(*count);
                    self.ram_gb += u64::from(*ram_gb) * u64::from(*count);
                    if *accelerator {
                        self.accelerators += u64::from(*count);
                    }
                }
                ResourceDefinition::Storage {
                    capacity_gb,
                    storage_type: StorageType::Block,
                    ..
                } => {
                    self.block_storage_gb += capacity_gb;
                }
                ResourceDefinition::Storage { .. } => {}
            }
        }
    }

    pub fn exceeds(&self, limit: &ResourceTotals) -> bool {
        self.cpu > limit.cpu
            || self.ram_gb > limit.ram_gb
            || self.accelerators > limit.accelerators
            || self.block_storage_gb > limit.block_storage_gb
    }

    pub fn saturating_sub(&self, other: &ResourceTotals) -> ResourceTotals {
        ResourceTotals {
            cpu: self.cpu.saturating_sub(other.cpu),
            ram_gb: self.ram_gb.saturating_sub(other.ram_gb),
            accelerators: self.accelerators.saturating_sub(other.accelerators),
            block_storage_gb: self.block_storage_gb.saturating_sub(other.block_storage_gb),
        }
    }
}
