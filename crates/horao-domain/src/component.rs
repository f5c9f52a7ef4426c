//! Leaf hardware components that make up a server, module, or network
//! device.

use crate::hardware::Hardware;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cpu {
    pub hardware: Hardware,
    pub cores: u32,
    pub clock_speed_mhz: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ram {
    pub hardware: Hardware,
    pub capacity_gb: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Disk {
    pub hardware: Hardware,
    pub capacity_gb: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Accelerator {
    pub hardware: Hardware,
    pub kind: String,
    pub count: u32,
}

/// Link state of a single physical port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkStatus {
    Up,
    Down,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Port {
    pub hardware: Hardware,
    pub connected: bool,
    pub status: LinkStatus,
}

impl Port {
    pub fn new(hardware: Hardware) -> Self {
        Self {
            hardware,
            connected: false,
            status: LinkStatus::Unknown,
        }
    }
}

/// A network interface card: a component with its own local port fan-out.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nic {
    pub hardware: Hardware,
    pub ports: Vec<Port>,
}
