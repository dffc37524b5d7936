//! Configuration handling for the simulation harness.
//!
//! A simulation is described by a YAML file listing routers, clients, links,
//! scripted link events, and data probes. Environment variables override
//! the timing knobs.

use anyhow::{bail, Result};
use lsr_node::config::DEFAULT_HEARTBEAT_INTERVAL_MS;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, warn};

/// Simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Refresh interval for every router (virtual ms)
    pub heartbeat_interval_ms: u64,
    /// Virtual time advanced per simulation step
    pub tick_interval_ms: u64,
    /// Real time slept per simulation step
    pub wall_tick_ms: u64,
    /// Virtual time at which the simulation stops
    pub end_time_ms: u64,
    /// Routing nodes
    pub routers: Vec<String>,
    /// Terminal nodes that only send and receive data
    pub clients: Vec<String>,
    /// Links up at time zero
    pub links: Vec<LinkSpec>,
    /// Scripted link changes
    pub events: Vec<LinkEvent>,
    /// Data packets injected by clients or routers
    pub probes: Vec<ProbeSpec>,
}

/// A link between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSpec {
    /// One endpoint
    pub a: String,
    /// Other endpoint
    pub b: String,
    /// Link cost
    #[serde(default = "default_cost")]
    pub cost: i64,
    /// Port on `a`, auto-assigned if absent
    #[serde(default)]
    pub port_a: Option<u32>,
    /// Port on `b`, auto-assigned if absent
    #[serde(default)]
    pub port_b: Option<u32>,
}

/// Link state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkAction {
    /// Bring the link up (or change its cost)
    Up,
    /// Take the link down
    Down,
}

/// A scripted change to a configured link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkEvent {
    /// Virtual time of the change
    pub at_ms: u64,
    /// What happens to the link
    pub action: LinkAction,
    /// One endpoint
    pub a: String,
    /// Other endpoint
    pub b: String,
    /// Cost when the link comes up
    #[serde(default = "default_cost")]
    pub cost: i64,
}

/// A data packet sent from `from` to `to`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSpec {
    /// Virtual send time
    pub at_ms: u64,
    /// Sender
    pub from: String,
    /// Destination
    pub to: String,
}

/// A link with both ports known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    /// One endpoint
    pub a: String,
    /// Other endpoint
    pub b: String,
    /// Port on `a`
    pub port_a: u32,
    /// Port on `b`
    pub port_b: u32,
    /// Link cost
    pub cost: i64,
}

fn default_cost() -> i64 {
    1
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            tick_interval_ms: 100,
            wall_tick_ms: 2,
            end_time_ms: 5000,
            routers: vec!["A".to_string(), "B".to_string()],
            clients: vec!["a".to_string(), "b".to_string()],
            links: vec![
                LinkSpec::new("a", "A", 1),
                LinkSpec::new("A", "B", 1),
                LinkSpec::new("B", "b", 1),
            ],
            events: Vec::new(),
            probes: vec![ProbeSpec {
                at_ms: 2000,
                from: "a".to_string(),
                to: "b".to_string(),
            }],
        }
    }
}

impl LinkSpec {
    /// Link with auto-assigned ports
    pub fn new(a: &str, b: &str, cost: i64) -> Self {
        Self {
            a: a.to_string(),
            b: b.to_string(),
            cost,
            port_a: None,
            port_b: None,
        }
    }

    fn joins(&self, a: &str, b: &str) -> bool {
        (self.a == a && self.b == b) || (self.a == b && self.b == a)
    }
}

impl SimConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config = Self::default();

        match std::fs::read_to_string(&config_path) {
            Ok(content) => match serde_yaml::from_str::<SimConfig>(&content) {
                Ok(parsed) => {
                    config = parsed;
                    info!("Loaded configuration from {:?}", config_path.as_ref());
                }
                Err(e) => {
                    warn!("Failed to parse config file {:?} ({}), using defaults", config_path.as_ref(), e);
                }
            },
            Err(_) => {
                warn!("Config file {:?} not found, using defaults", config_path.as_ref());
            }
        }

        config.apply_environment_overrides(|name| std::env::var(name).ok());

        info!(
            "Final simulation configuration: {} routers, {} clients, {} links, heartbeat={}ms, tick={}ms, end={}ms",
            config.routers.len(),
            config.clients.len(),
            config.links.len(),
            config.heartbeat_interval_ms,
            config.tick_interval_ms,
            config.end_time_ms
        );

        Ok(config)
    }

    /// Apply environment variable overrides, reading variables through `lookup`
    fn apply_environment_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let env_millis = |name: &str| parse_millis(name, lookup(name)?);

        if let Some(ms) = env_millis("LSR_HEARTBEAT_MS") {
            self.heartbeat_interval_ms = ms;
            info!("Heartbeat interval overridden by environment: {}ms", ms);
        }

        if let Some(ms) = env_millis("LSR_END_TIME_MS") {
            self.end_time_ms = ms;
            info!("End time overridden by environment: {}ms", ms);
        }

        if let Some(ms) = env_millis("LSR_TICK_MS") {
            self.tick_interval_ms = ms;
            info!("Tick interval overridden by environment: {}ms", ms);
        }
    }

    /// Check that the topology description is self-consistent
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            bail!("tick_interval_ms must be positive");
        }

        let mut names = BTreeSet::new();
        for name in self.routers.iter().chain(&self.clients) {
            if !names.insert(name.as_str()) {
                bail!("node {} is declared twice", name);
            }
        }
        let known = |name: &str| names.contains(name);

        let mut client_links: BTreeMap<&str, usize> = BTreeMap::new();
        for link in &self.links {
            for end in [&link.a, &link.b] {
                if !known(end) {
                    bail!("link {}-{} names unknown node {}", link.a, link.b, end);
                }
                if self.clients.contains(end) {
                    *client_links.entry(end.as_str()).or_insert(0) += 1;
                }
            }
            if link.a == link.b {
                bail!("link {}-{} connects a node to itself", link.a, link.b);
            }
            check_cost(link.cost, &link.a, &link.b)?;
            if link.port_a == Some(0) || link.port_b == Some(0) {
                bail!("link {}-{} uses reserved port 0", link.a, link.b);
            }
        }
        if let Some((client, count)) = client_links.iter().find(|(_, count)| **count > 1) {
            bail!("client {} has {} links, clients may have at most one", client, count);
        }

        for event in &self.events {
            if !self.links.iter().any(|link| link.joins(&event.a, &event.b)) {
                bail!("event at {}ms refers to unconfigured link {}-{}", event.at_ms, event.a, event.b);
            }
            if event.action == LinkAction::Up {
                check_cost(event.cost, &event.a, &event.b)?;
            }
        }
        for probe in &self.probes {
            if !known(&probe.from) || !known(&probe.to) {
                bail!("probe {} -> {} names an unknown node", probe.from, probe.to);
            }
        }

        self.resolved_links().map(|_| ())
    }

    /// Assign ports to every link, keeping explicit ones
    pub fn resolved_links(&self) -> Result<Vec<ResolvedLink>> {
        let mut used: BTreeMap<&str, BTreeSet<u32>> = BTreeMap::new();
        for link in &self.links {
            for (end, port) in [(&link.a, link.port_a), (&link.b, link.port_b)] {
                if let Some(port) = port {
                    if !used.entry(end.as_str()).or_default().insert(port) {
                        bail!("port {} is used twice on node {}", port, end);
                    }
                }
            }
        }

        let mut resolved = Vec::with_capacity(self.links.len());
        for link in &self.links {
            let port_a = match link.port_a {
                Some(port) => port,
                None => allocate_port(&mut used, &link.a),
            };
            let port_b = match link.port_b {
                Some(port) => port,
                None => allocate_port(&mut used, &link.b),
            };
            resolved.push(ResolvedLink {
                a: link.a.clone(),
                b: link.b.clone(),
                port_a,
                port_b,
                cost: link.cost,
            });
        }
        Ok(resolved)
    }
}

fn check_cost(cost: i64, a: &str, b: &str) -> Result<()> {
    if u32::try_from(cost).is_err() {
        bail!("link {}-{} has cost {}, costs must be between 0 and {}", a, b, cost, u32::MAX);
    }
    Ok(())
}

/// Lowest free port on `node`, starting at 1
fn allocate_port<'a>(used: &mut BTreeMap<&'a str, BTreeSet<u32>>, node: &'a str) -> u32 {
    let ports = used.entry(node).or_default();
    let port = (1..u32::MAX).find(|p| !ports.contains(p)).unwrap_or(u32::MAX);
    ports.insert(port);
    port
}

fn parse_millis(name: &str, value: String) -> Option<u64> {
    match value.parse::<u64>() {
        Ok(ms) => Some(ms),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a number of milliseconds", name, value);
            None
        }
    }
}
