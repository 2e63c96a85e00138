//! Typed records for the four northbound tables.
//!
//! Parsers project decoded rows by column name. A missing column yields the
//! field's zero value, so added or removed upstream columns never break parsing.

use std::collections::BTreeMap;

use super::table::{Row, TableError, decode_table};

const COL_UUID: &str = "_uuid";
const COL_NAME: &str = "name";
const COL_PORTS: &str = "ports";
const COL_TYPE: &str = "type";
const COL_OPTIONS: &str = "options";

/// Row of `Logical_Router`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogicalRouter {
    pub uuid: String,
    pub name: String,
    pub port_uuids: Vec<String>,
}

/// Row of `Logical_Router_Port`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogicalRouterPort {
    pub uuid: String,
    pub name: String,
}

/// Row of `Logical_Switch`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogicalSwitch {
    pub uuid: String,
    pub name: String,
    pub port_uuids: Vec<String>,
}

/// Row of `Logical_Switch_Port`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogicalSwitchPort {
    pub uuid: String,
    pub name: String,
    /// Port type; `"router"` for the switch side of a router peering.
    pub port_type: String,
    pub options: BTreeMap<String, String>,
}

/// All four resource sets of one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceSet {
    pub routers: Vec<LogicalRouter>,
    pub router_ports: Vec<LogicalRouterPort>,
    pub switches: Vec<LogicalSwitch>,
    pub switch_ports: Vec<LogicalSwitchPort>,
}

/// Parsed records plus the decoder's normalization flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub normalized: bool,
}

pub fn parse_routers(rows: &[Row]) -> Vec<LogicalRouter> {
    rows.iter()
        .map(|row| LogicalRouter {
            uuid: row.string(COL_UUID),
            name: row.string(COL_NAME),
            port_uuids: row.strings(COL_PORTS),
        })
        .collect()
}

pub fn parse_router_ports(rows: &[Row]) -> Vec<LogicalRouterPort> {
    rows.iter()
        .map(|row| LogicalRouterPort {
            uuid: row.string(COL_UUID),
            name: row.string(COL_NAME),
        })
        .collect()
}

pub fn parse_switches(rows: &[Row]) -> Vec<LogicalSwitch> {
    rows.iter()
        .map(|row| LogicalSwitch {
            uuid: row.string(COL_UUID),
            name: row.string(COL_NAME),
            port_uuids: row.strings(COL_PORTS),
        })
        .collect()
}

pub fn parse_switch_ports(rows: &[Row]) -> Vec<LogicalSwitchPort> {
    rows.iter()
        .map(|row| LogicalSwitchPort {
            uuid: row.string(COL_UUID),
            name: row.string(COL_NAME),
            port_type: row.string(COL_TYPE),
            options: row.string_map(COL_OPTIONS),
        })
        .collect()
}

fn parse_output<T>(raw: &str, parse: fn(&[Row]) -> Vec<T>) -> Result<Parsed<T>, TableError> {
    let table = decode_table(raw)?;
    Ok(Parsed {
        records: parse(&table.rows),
        normalized: table.normalized,
    })
}

pub fn parse_routers_output(raw: &str) -> Result<Parsed<LogicalRouter>, TableError> {
    parse_output(raw, parse_routers)
}

pub fn parse_router_ports_output(raw: &str) -> Result<Parsed<LogicalRouterPort>, TableError> {
    parse_output(raw, parse_router_ports)
}

pub fn parse_switches_output(raw: &str) -> Result<Parsed<LogicalSwitch>, TableError> {
    parse_output(raw, parse_switches)
}

pub fn parse_switch_ports_output(raw: &str) -> Result<Parsed<LogicalSwitchPort>, TableError> {
    parse_output(raw, parse_switch_ports)
}
