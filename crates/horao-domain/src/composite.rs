//! Composites: units of physical containment, from a single server up to
//! a cabinet.

use crate::component::{Accelerator, Cpu, Disk, Nic, Ram};
use crate::hardware::Hardware;
use crate::network::Switch;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceStatus {
    Up,
    Down,
    Maintenance,
}

/// The shape shared by a standalone server and a pluggable module: CPUs,
/// RAM, NICs, disks, and accelerators behind one status flag.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Server {
    pub hardware: Hardware,
    pub cpus: Vec<Cpu>,
    pub ram: Vec<Ram>,
    pub nics: Vec<Nic>,
    pub disks: Vec<Disk>,
    pub accelerators: Vec<Accelerator>,
    pub status: DeviceStatus,
}

/// Same shape as [`Server`], but meant to be plugged into a [`Node`]
/// rather than stand alone in a chassis or cabinet.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Module {
    pub hardware: Hardware,
    pub cpus: Vec<Cpu>,
    pub ram: Vec<Ram>,
    pub nics: Vec<Nic>,
    pub disks: Vec<Disk>,
    pub accelerators: Vec<Accelerator>,
    pub status: DeviceStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub hardware: Hardware,
    pub modules: Vec<Module>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blade {
    pub hardware: Hardware,
    pub nodes: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chassis {
    pub hardware: Hardware,
    pub servers: Vec<Server>,
    pub blades: Vec<Blade>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cabinet {
    pub hardware: Hardware,
    pub servers: Vec<Server>,
    pub chassis: Vec<Chassis>,
    pub switches: Vec<Switch>,
}
