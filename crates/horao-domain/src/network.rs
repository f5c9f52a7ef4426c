//! Network devices and the graph that connects them within a data center.

use crate::component::{Nic, Port};
use crate::hardware::Hardware;
use petgraph::graph::UnGraph;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Switch {
    pub hardware: Hardware,
    pub ports: Vec<Port>,
    pub uplinks: Vec<Port>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Router {
    pub hardware: Hardware,
    pub ports: Vec<Port>,
    pub wan: Vec<Port>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Firewall {
    pub hardware: Hardware,
    pub ports: Vec<Port>,
    pub wan: Vec<Port>,
}

/// Any device that can sit as a node in a [`DataCenterNetwork`] graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkDevice {
    Nic(Nic),
    Switch(Switch),
    Router(Router),
    Firewall(Firewall),
}

/// A graph node: either a network device or the computer it's attached
/// to, identified by its hardware.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkNode {
    Device(NetworkDevice),
    Computer(Hardware),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkType {
    Management,
    Control,
    Data,
}

/// A physical network within a data center: devices and computers as
/// nodes, physical links as edges.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataCenterNetwork {
    pub name: String,
    pub network_type: NetworkType,
    /// Set only for `Data` networks that ride the high-speed network
    /// fabric; irrelevant for `Management`/`Control`.
    pub hsn: bool,
    pub graph: UnGraph<NetworkNode, ()>,
}

impl DataCenterNetwork {
    pub fn new(name: impl Into<String>, network_type: NetworkType) -> Self {
        Self {
            name: name.into(),
            network_type,
            hsn: false,
            graph: UnGraph::new_undirected(),
        }
    }

    pub fn add_node(&mut self, node: NetworkNode) -> petgraph::graph::NodeIndex {
        self.graph.add_node(node)
    }

    pub fn link(&mut self, a: petgraph::graph::NodeIndex, b: petgraph::graph::NodeIndex) {
        self.graph.update_edge(a, b, ());
    }

    pub fn is_data(&self) -> bool {
        matches!(self.network_type, NetworkType::Data)
    }
}
