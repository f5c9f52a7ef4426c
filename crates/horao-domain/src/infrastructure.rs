//! The top-level replica: every data center, its networks, tenant
//! constraints, and the global claim list the scheduler reasons over.

use crate::claim::Claim;
use crate::composite::{Cabinet, Module, Server};
use crate::data_center::DataCenter;
use crate::network::DataCenterNetwork;
use crate::resource::{ResourceDefinition, ResourceTotals, StorageClass, StorageType};
use crate::tenant::Constraint;
use std::collections::BTreeMap;

/// The full replicated world-model held by one peer.
///
/// `data_centers` and their per-row cabinets converge via the CRDTs they're
/// built from; `networks`, `constraints`, and `claims` are plain local
/// collections appended to under the scheduler's read-then-commit
/// discipline (see `horao-scheduler`), not CRDTs in their own right.
pub struct LogicalInfrastructure {
    pub data_centers: Vec<DataCenter>,
    pub networks: BTreeMap<String, Vec<DataCenterNetwork>>,
    pub constraints: Vec<Constraint>,
    pub claims: Vec<Claim>,
}

impl LogicalInfrastructure {
    pub fn new() -> Self {
        Self {
            data_centers: Vec::new(),
            networks: BTreeMap::new(),
            constraints: Vec::new(),
            claims: Vec::new(),
        }
    }

    pub fn add_data_center(&mut self, data_center: DataCenter) {
        self.networks
            .entry(data_center.name.clone())
            .or_default();
        self.data_centers.push(data_center);
    }

    pub fn add_network(&mut self, data_center_name: &str, network: DataCenterNetwork) {
        self.networks
            .entry(data_center_name.to_string())
            .or_default()
            .push(network);
    }

    pub fn networks_for(&self, data_center_name: &str) -> &[DataCenterNetwork] {
        self.networks
            .get(data_center_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn constraint_for(&self, tenant: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.tenant == tenant)
    }

    pub fn add_claim(&mut self, claim: Claim) {
        self.claims.push(claim);
    }

    pub fn claims_overlapping(&self, window_start: i64, window_end: i64) -> Vec<&Claim> {
        self.claims
            .iter()
            .filter(|c| c.overlaps(window_start, window_end))
            .collect()
    }

    /// Sum of compute and block-storage capacity across every data center
    /// that carries at least one `Data` network (optionally restricted to
    /// high-speed-network-attached networks).
    ///
    /// The source walks each `Data` network's graph and only counts
    /// computers actually attached to it; here the network graph's nodes
    /// carry hardware identity rather than owned component references, so
    /// membership is approximated at the data-center level: a data center
    /// counts in full once it carries a matching `Data` network.
    pub fn totals(&self, hsn_only: bool) -> ResourceTotals {
        let mut totals = ResourceTotals::default();
        for dc in &self.data_centers {
            let has_matching_network = self.networks_for(&dc.name).iter().any(|n| {
                n.is_data() && (!hsn_only || n.hsn)
            });
            if !has_matching_network {
                continue;
            }
            for cabinet in dc.all_cabinets() {
                accumulate_cabinet(&cabinet, &mut totals);
            }
        }
        totals
    }
}

fn accumulate_cabinet(cabinet: &Cabinet, totals: &mut ResourceTotals) {
    for server in &cabinet.servers {
        accumulate_server(server, totals);
    }
    for chassis in &cabinet.chassis {
        for server in &chassis.servers {
            accumulate_server(server, totals);
        }
        for blade in &chassis.blades {
            for node in &blade.nodes {
                for module in &node.modules {
                    accumulate_module(module, totals);
                }
            }
        }
    }
}

fn accumulate_server(server: &Server, totals: &mut ResourceTotals) {
    let cpu = server.cpus.iter().map(|c| c.cores).sum();
    let ram_gb = server.ram.iter().map(|r| r.capacity_gb).sum();
    let accelerator = !server.accelerators.is_empty();
    let capacity_gb: u64 = server.disks.iter().map(|d| d.capacity_gb).sum();
    totals.add(&[
        ResourceDefinition::Compute {
            cpu,
            ram_gb,
            accelerator,
            count: 1,
        },
        ResourceDefinition::Storage {
            capacity_gb,
            storage_type: StorageType::Block,
            storage_class: StorageClass::Hot,
        },
    ]);
}

fn accumulate_module(module: &Module, totals: &mut ResourceTotals) {
    let cpu = module.cpus.iter().map(|c| c.cores).sum();
    let ram_gb = module.ram.iter().map(|r| r.capacity_gb).sum();
    let accelerator = !module.accelerators.is_empty();
    let capacity_gb: u64 = module.disks.iter().map(|d| d.capacity_gb).sum();
    totals.add(&[
        ResourceDefinition::Compute {
            cpu,
            ram_gb,
            accelerator,
            count: 1,
        },
        ResourceDefinition::Storage {
            capacity_gb,
            storage_type: StorageType::Block,
            storage_class: StorageClass::Hot,
        },
    ]);
}

impl Default for LogicalInfrastructure {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceTotals;

    #[test]
    fn networks_are_scoped_per_data_center() {
        let mut infra = LogicalInfrastructure::new();
        infra.add_data_center(DataCenter::new("dc-1"));
        infra.add_network(
            "dc-1",
            DataCenterNetwork::new("fabric-0", crate::network::NetworkType::Data),
        );
        assert_eq!(infra.networks_for("dc-1").len(), 1);
        assert!(infra.networks_for("dc-2").is_empty());
    }

    #[test]
    fn constraint_lookup_by_tenant_name() {
        let mut infra = LogicalInfrastructure::new();
        infra
            .constraints
            .push(Constraint::new("tenant-a", ResourceTotals::default()));
        assert!(infra.constraint_for("tenant-a").is_some());
        assert!(infra.constraint_for("tenant-b").is_none());
    }

    fn server(serial: &str, cores: u32, ram_gb: u32) -> Server {
        Server {
            hardware: crate::hardware::Hardware::new(serial, "X200", 0),
            cpus: vec![crate::component::Cpu {
                hardware: crate::hardware::Hardware::new(format!("{serial}-cpu"), "X200", 0),
                cores,
                clock_speed_mhz: 2400,
            }],
            ram: vec![crate::component::Ram {
                hardware: crate::hardware::Hardware::new(format!("{serial}-ram"), "X200", 0),
                capacity_gb: ram_gb,
            }],
            nics: vec![],
            disks: vec![],
            accelerators: vec![],
            status: crate::composite::DeviceStatus::Up,
        }
    }

    #[test]
    fn totals_sum_every_server_in_a_data_center_with_a_data_network() {
        let mut infra = LogicalInfrastructure::new();
        let mut dc = DataCenter::new("dc-1");
        dc.set_row(
            0,
            vec![Cabinet {
                hardware: crate::hardware::Hardware::new("CAB1", "RACK-X", 0),
                servers: vec![server("S1", 8, 48), server("S2", 8, 48)],
                chassis: vec![],
                switches: vec![],
            }],
            "admin".to_string(),
        );
        infra.add_data_center(dc);
        infra.add_network("dc-1", DataCenterNetwork::new("fabric-0", crate::network::NetworkType::Data));

        let totals = infra.totals(false);
        assert_eq!(totals.cpu, 16);
        assert_eq!(totals.ram_gb, 96);
    }

    #[test]
    fn totals_skip_data_centers_without_a_data_network() {
        let mut infra = LogicalInfrastructure::new();
        let mut dc = DataCenter::new("dc-1");
        dc.set_row(
            0,
            vec![Cabinet {
                hardware: crate::hardware::Hardware::new("CAB1", "RACK-X", 0),
                servers: vec![server("S1", 8, 48)],
                chassis: vec![],
                switches: vec![],
            }],
            "admin".to_string(),
        );
        infra.add_data_center(dc);
        infra.add_network("dc-1", DataCenterNetwork::new("mgmt", crate::network::NetworkType::Management));

        assert_eq!(infra.totals(false), ResourceTotals::default());
    }
}
