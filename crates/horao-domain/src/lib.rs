//! Hardware, network, and data-center domain model for HORAO, built atop
//! the CRDT family in `horao-core`.

pub mod claim;
pub mod component;
pub mod composite;
pub mod data_center;
pub mod hardware;
pub mod infrastructure;
pub mod network;
pub mod resource;
pub mod tenant;

pub use claim::Claim;
pub use component::{Accelerator, Cpu, Disk, LinkStatus, Nic, Port, Ram};
pub use composite::{Blade, Cabinet, Chassis, DeviceStatus, Module, Node, Server};
pub use data_center::DataCenter;
pub use hardware::Hardware;
pub use infrastructure::LogicalInfrastructure;
pub use network::{DataCenterNetwork, Firewall, NetworkDevice, NetworkNode, NetworkType, Router, Switch};
pub use resource::{ResourceDefinition, ResourceTotals, StorageClass, StorageType};
pub use tenant::{Constraint, Tenant};
