//! Graph assembly: four resource tables → sorted node/edge lists.
//!
//! Routers and switches are not linked by any foreign key. A router's presence
//! on a switch is inferred from naming: a switch port of type `router` names
//! its peer router port in `options:router-port`, and router ports are
//! indexed by name back to their router.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::warn;

use crate::api::{Edge, EdgeKind, Node, NodeKind};
use crate::collector::resources::{LogicalRouterPort, ResourceSet};

/// Switch port type marking the switch side of a router peering.
const ROUTER_PORT_TYPE: &str = "router";
/// Option key naming the peer router port.
const ROUTER_PORT_OPTION: &str = "router-port";

/// Assembled topology, both lists sorted ascending by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Node id of a resource: its UUID, or its name when the UUID is blank.
///
/// Resources with blank UUID and equal names share an id; the one assembled
/// last replaces the other.
pub fn node_id(uuid: &str, name: &str) -> String {
    let uuid = uuid.trim();
    if uuid.is_empty() {
        name.trim().to_string()
    } else {
        uuid.to_string()
    }
}

fn label(name: &str, id: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        id.to_string()
    } else {
        name.to_string()
    }
}

fn uuid_data(uuid: &str) -> BTreeMap<String, Value> {
    BTreeMap::from([("uuid".to_string(), Value::String(uuid.trim().to_string()))])
}

/// Inserts `node`, replacing any node with the same id. Replacement is logged.
fn insert_node(nodes: &mut BTreeMap<String, Node>, node: Node) {
    if let Some(previous) = nodes.insert(node.id.clone(), node)
        && let Some(current) = nodes.get(&previous.id)
    {
        warn!(
            id = %previous.id,
            replaced = ?previous.kind,
            by = ?current.kind,
            "node id collision, keeping the last resource"
        );
    }
}

/// Builds the graph. Output order does not depend on input order.
pub fn assemble(resources: &ResourceSet) -> Graph {
    let mut nodes: BTreeMap<String, Node> = BTreeMap::new();
    let mut edges: BTreeMap<String, Edge> = BTreeMap::new();

    let router_ports: HashMap<&str, &LogicalRouterPort> = resources
        .router_ports
        .iter()
        .map(|port| (port.uuid.trim(), port))
        .collect();

    let mut router_by_port_name: HashMap<String, String> = HashMap::new();
    for router in &resources.routers {
        let id = node_id(&router.uuid, &router.name);
        for port_uuid in &router.port_uuids {
            if let Some(port) = router_ports.get(port_uuid.trim())
                && !port.name.trim().is_empty()
            {
                router_by_port_name.insert(port.name.trim().to_string(), id.clone());
            }
        }
        insert_node(
            &mut nodes,
            Node {
                label: label(&router.name, &id),
                id,
                kind: NodeKind::LogicalRouter,
                data: uuid_data(&router.uuid),
            },
        );
    }

    let mut switch_by_port_uuid: HashMap<String, String> = HashMap::new();
    for switch in &resources.switches {
        let id = node_id(&switch.uuid, &switch.name);
        for port_uuid in &switch.port_uuids {
            switch_by_port_uuid.insert(port_uuid.trim().to_string(), id.clone());
        }
        insert_node(
            &mut nodes,
            Node {
                label: label(&switch.name, &id),
                id,
                kind: NodeKind::LogicalSwitch,
                data: uuid_data(&switch.uuid),
            },
        );
    }

    for port in &resources.switch_ports {
        let id = node_id(&port.uuid, &port.name);
        let switch_id = switch_by_port_uuid.get(port.uuid.trim());

        if let Some(switch_id) = switch_id {
            let edge = Edge::new(EdgeKind::SwitchToPort, switch_id.clone(), id.clone());
            edges.insert(edge.id.clone(), edge);
        }

        if port.port_type == ROUTER_PORT_TYPE
            && let Some(peer) = port.options.get(ROUTER_PORT_OPTION)
            && let Some(router_id) = router_by_port_name.get(peer.trim())
            && let Some(switch_id) = switch_id
        {
            let edge = Edge::new(EdgeKind::RouterToSwitch, router_id.clone(), switch_id.clone());
            edges.insert(edge.id.clone(), edge);
        }

        let mut data = uuid_data(&port.uuid);
        data.insert("type".to_string(), Value::String(port.port_type.clone()));
        data.insert(
            "options".to_string(),
            Value::Object(
                port.options
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
        );
        insert_node(
            &mut nodes,
            Node {
                label: label(&port.name, &id),
                id,
                kind: NodeKind::LogicalSwitchPort,
                data,
            },
        );
    }

    Graph {
        nodes: nodes.into_values().collect(),
        edges: edges.into_values().collect(),
    }
}
