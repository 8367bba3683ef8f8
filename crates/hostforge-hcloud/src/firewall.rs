//! Firewall rule synthesis

use crate::types::FirewallRule;

const ALL_SOURCES: [&str; 2] = ["0.0.0.0/0", "::/0"];

/// Build the inbound rule set for a provisioned node.
///
/// SSH (port 22) is restricted to `ssh_sources`; ICMP stays open; every
/// other entry of the comma-separated `inbound_ports` list (single ports
/// or `lo-hi` ranges) is opened to all sources.
#[must_use]
pub fn build_firewall_rules(ssh_sources: &[String], inbound_ports: &str) -> Vec<FirewallRule> {
    let mut rules = vec![
        FirewallRule {
            direction: "in".to_string(),
            protocol: "tcp".to_string(),
            port: Some("22".to_string()),
            source_ips: ssh_sources.iter().map(|ip| normalize_cidr(ip)).collect(),
        },
        FirewallRule {
            direction: "in".to_string(),
            protocol: "icmp".to_string(),
            port: None,
            source_ips: all_sources(),
        },
    ];

    for port in inbound_ports.split(',') {
        let port = port.trim();
        if port.is_empty() || port == "22" {
            continue;
        }
        rules.push(FirewallRule {
            direction: "in".to_string(),
            protocol: "tcp".to_string(),
            port: Some(port.to_string()),
            source_ips: all_sources(),
        });
    }
    rules
}

/// Source list meaning "anywhere", v4 and v6
#[must_use]
pub fn all_sources() -> Vec<String> {
    ALL_SOURCES.iter().map(ToString::to_string).collect()
}

/// Append a host-route prefix to bare addresses (`1.2.3.4` -> `1.2.3.4/32`)
fn normalize_cidr(ip: &str) -> String {
    let ip = ip.trim();
    if ip.contains('/') {
        ip.to_string()
    } else {
        format!("{ip}/32")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssh_rule_is_restricted_to_sources() {
        let rules = build_firewall_rules(&["198.51.100.7".to_string()], "9000-9001,9010-9011");

        let ssh = &rules[0];
        assert_eq!(ssh.port.as_deref(), Some("22"));
        assert_eq!(ssh.source_ips, vec!["198.51.100.7/32"]);
    }

    #[test]
    fn icmp_and_node_ports_are_open() {
        let rules = build_firewall_rules(&["198.51.100.7/32".to_string()], "9000-9001,9010-9011");

        assert_eq!(rules.len(), 4);
        assert_eq!(rules[1].protocol, "icmp");
        assert_eq!(rules[2].port.as_deref(), Some("9000-9001"));
        assert_eq!(rules[3].port.as_deref(), Some("9010-9011"));
        assert_eq!(rules[2].source_ips, all_sources());
    }

    #[test]
    fn existing_cidr_suffix_is_preserved() {
        let rules = build_firewall_rules(&["10.0.0.0/8".to_string()], "");
        assert_eq!(rules[0].source_ips, vec!["10.0.0.0/8"]);
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn port_22_is_not_duplicated_from_inbound_list() {
        let rules = build_firewall_rules(&["198.51.100.7".to_string()], "22,9000");
        let tcp_22 = rules
            .iter()
            .filter(|r| r.port.as_deref() == Some("22"))
            .count();
        assert_eq!(tcp_22, 1);
    }
}
