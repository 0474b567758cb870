//! Firewall admission control: the rule model and the controller seam.
//!
//! Every rule this daemon manages carries an ownership comment of the form
//! `disk-monitor <resource-id>`. Reconciliation only ever looks at rules
//! carrying that tag; everything else in the packet filter is left alone.

mod iptables;

use anyhow::Result;
use async_trait::async_trait;

pub use iptables::{check_root, IptablesFirewall};

/// Ownership tag carried in the comment of every rule this daemon manages.
pub const RULE_TAG: &str = "disk-monitor";

/// A blocking rule the daemon wants live: reject inbound TCP to one port
/// except via loopback, tagged with the owning resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RuleSpec {
    pub resource: String,
    pub port: u16,
}

impl RuleSpec {
    pub fn new(resource: impl Into<String>, port: u16) -> Self {
        Self {
            resource: resource.into(),
            port,
        }
    }

    /// Canonical rule body in the form `iptables -S` echoes back, so desired
    /// and live rules compare as plain strings.
    pub fn body(&self) -> String {
        format!(
            "INPUT ! -i lo -p tcp -m tcp --dport {} -m comment --comment \"{} {}\" \
             -j REJECT --reject-with icmp-port-unreachable",
            self.port, RULE_TAG, self.resource
        )
    }
}

/// One live rule carrying our ownership tag, parsed out of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedRule {
    /// Resource named in the ownership comment.
    pub resource: String,
    /// Rule body with the listing's `-A`/`-I` prefix stripped, verbatim.
    pub body: String,
}

/// Parse `iptables -S` style output, keeping only rules tagged as ours.
pub fn parse_listing(output: &str) -> Vec<TaggedRule> {
    output.lines().filter_map(parse_listing_line).collect()
}

fn parse_listing_line(line: &str) -> Option<TaggedRule> {
    let line = line.trim();
    let body = line
        .strip_prefix("-A ")
        .or_else(|| line.strip_prefix("-I "))?;
    let resource = tag_resource(body)?;
    Some(TaggedRule {
        resource,
        body: body.to_string(),
    })
}

/// Extract the resource name from an ownership comment, if present.
fn tag_resource(body: &str) -> Option<String> {
    let marker = format!("--comment \"{} ", RULE_TAG);
    let start = body.find(&marker)? + marker.len();
    let rest = &body[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

/// Split a rule body into argv form for handing back to iptables, honoring
/// the double quotes around the comment text. A listed body cannot be split
/// on bare whitespace: the comment `"disk-monitor app1"` is one argument.
pub fn split_rule_args(body: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in body.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

/// Narrow seam to the host packet filter, so reconciliation is testable
/// without a live iptables.
#[async_trait]
pub trait FirewallController: Send + Sync {
    /// List live rules carrying our ownership tag.
    async fn list_rules(&self) -> Result<Vec<TaggedRule>>;

    /// Insert a blocking rule by body.
    async fn insert_rule(&self, body: &str) -> Result<()>;

    /// Remove a blocking rule by body.
    async fn remove_rule(&self, body: &str) -> Result<()>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// In-memory controller for reconciler tests. Cloning shares the
    /// underlying state, so tests can keep a probe handle after moving a
    /// clone into the reconciler.
    #[derive(Clone, Default)]
    pub struct MockFirewall {
        rules: Arc<Mutex<Vec<String>>>,
        commands: Arc<Mutex<Vec<String>>>,
    }

    impl MockFirewall {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed live rule bodies, as if left over from a previous run.
        pub fn seed(&self, bodies: &[&str]) {
            let mut rules = self.rules.lock().unwrap();
            rules.extend(bodies.iter().map(|b| b.to_string()));
        }

        pub fn live_rules(&self) -> Vec<String> {
            self.rules.lock().unwrap().clone()
        }

        /// Every insert/remove issued, in order.
        pub fn command_log(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FirewallController for MockFirewall {
        async fn list_rules(&self) -> Result<Vec<TaggedRule>> {
            let rules = self.rules.lock().unwrap();
            Ok(rules
                .iter()
                .filter_map(|body| {
                    tag_resource(body).map(|resource| TaggedRule {
                        resource,
                        body: body.clone(),
                    })
                })
                .collect())
        }

        async fn insert_rule(&self, body: &str) -> Result<()> {
            self.commands.lock().unwrap().push(format!("-I {}", body));
            self.rules.lock().unwrap().insert(0, body.to_string());
            Ok(())
        }

        async fn remove_rule(&self, body: &str) -> Result<()> {
            self.commands.lock().unwrap().push(format!("-D {}", body));
            self.rules.lock().unwrap().retain(|b| b != body);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_body_matches_template() {
        let body = RuleSpec::new("app1", 80).body();
        assert_eq!(
            body,
            "INPUT ! -i lo -p tcp -m tcp --dport 80 -m comment \
             --comment \"disk-monitor app1\" -j REJECT --reject-with icmp-port-unreachable"
        );
    }

    #[test]
    fn listing_round_trips_own_rule() {
        let body = RuleSpec::new("/var/www", 443).body();
        let listing = format!("-A {}", body);
        let rules = parse_listing(&listing);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].resource, "/var/www");
        assert_eq!(rules[0].body, body);
    }

    #[test]
    fn listing_skips_untagged_rules() {
        let listing = "\
-P INPUT ACCEPT
-A INPUT -i eth0 -j ACCEPT
-A INPUT -p tcp --dport 22 -m comment --comment \"something-else\" -j ACCEPT
";
        assert!(parse_listing(listing).is_empty());
    }

    #[test]
    fn listing_accepts_insert_prefix() {
        let body = RuleSpec::new("app1", 80).body();
        let rules = parse_listing(&format!("-I {}", body));
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn tag_resource_reads_comment() {
        let body = RuleSpec::new("app with spaces", 80).body();
        assert_eq!(tag_resource(&body).as_deref(), Some("app with spaces"));
        assert_eq!(tag_resource("INPUT -j ACCEPT"), None);
    }

    #[test]
    fn split_keeps_quoted_comment_as_one_arg() {
        let body = RuleSpec::new("app1", 80).body();
        let args = split_rule_args(&body);
        assert!(args.contains(&"disk-monitor app1".to_string()));
        assert_eq!(args[0], "INPUT");
        assert_eq!(args.last().unwrap(), "icmp-port-unreachable");
        // No argument retains a literal quote.
        assert!(args.iter().all(|a| !a.contains('"')));
    }

    #[test]
    fn split_collapses_extra_whitespace() {
        assert_eq!(split_rule_args("  a   b  "), vec!["a", "b"]);
        assert!(split_rule_args("").is_empty());
    }
}
