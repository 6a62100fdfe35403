//! Robots.txt rule parsing and longest-prefix matching
//!
//! The parser recognizes `User-agent`, `Allow`, and `Disallow` directives
//! only. Consecutive `User-agent` lines before any directive accumulate
//! into one agent set; a `User-agent` line after a directive starts a new
//! group, as does a blank line. Rules are sanitized by removing `*`
//! wildcards and forcing a leading `/`; an empty `Disallow` means "allow
//! all" and is dropped.

use std::collections::HashMap;

/// The resolved allow/disallow rule set for one host
#[derive(Debug, Clone, Default)]
pub struct RuleGroup {
    allows: Vec<String>,
    disallows: Vec<String>,
}

impl RuleGroup {
    /// Checks whether a request path is allowed under these rules
    ///
    /// Uses longest-prefix matching: the path is allowed when no disallow
    /// rule matches, when the longest allow match is longer than the
    /// longest disallow match, or when both match with equal length.
    pub fn allows_path(&self, path: &str) -> bool {
        let allow = longest_prefix(path, &self.allows);
        let disallow = longest_prefix(path, &self.disallows);

        if disallow.is_empty() {
            return true;
        }
        if allow.len() > disallow.len() {
            return true;
        }
        !allow.is_empty() && allow.len() == disallow.len()
    }

    #[cfg(test)]
    fn from_rules(allows: &[&str], disallows: &[&str]) -> Self {
        Self {
            allows: allows.iter().map(|r| r.to_string()).collect(),
            disallows: disallows.iter().map(|r| r.to_string()).collect(),
        }
    }
}

/// Parses robots.txt content and resolves the group for a user agent
///
/// Resolution order: the base agent (the part of the user agent before the
/// first `/`), then the full user agent, then `*`. Returns `None` when no
/// group applies, which means the host has no restrictions.
pub fn parse_rules(payload: &[u8], user_agent: &str) -> Option<RuleGroup> {
    let text = String::from_utf8_lossy(payload);
    let mut groups: HashMap<String, RuleGroup> = HashMap::new();
    let mut current_agents: Vec<String> = Vec::new();
    let mut had_directive = false;

    for raw_line in text.lines() {
        let mut line = raw_line;
        if let Some(idx) = line.find('#') {
            line = &line[..idx];
        }
        let line = line.trim();
        if line.is_empty() {
            current_agents.clear();
            had_directive = false;
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if had_directive {
                    current_agents.clear();
                    had_directive = false;
                }
                current_agents.push(value.to_lowercase());
            }
            "allow" | "disallow" => {
                if current_agents.is_empty() {
                    continue;
                }
                let rule = sanitize_rule(value);
                if rule.is_empty() && key == "disallow" {
                    continue;
                }
                had_directive = true;
                for agent in &current_agents {
                    let group = groups.entry(agent.clone()).or_default();
                    if key == "allow" {
                        group.allows.push(rule.clone());
                    } else {
                        group.disallows.push(rule.clone());
                    }
                }
            }
            _ => {}
        }
    }

    let lowered = user_agent.to_lowercase();
    let base_agent = lowered.split('/').next().unwrap_or(&lowered);
    if let Some(group) = groups.remove(base_agent) {
        return Some(group);
    }
    if let Some(group) = groups.remove(&lowered) {
        return Some(group);
    }
    groups.remove("*")
}

/// Strips `*` wildcards and forces a leading `/`
fn sanitize_rule(rule: &str) -> String {
    let cleaned = rule.trim();
    if cleaned.is_empty() {
        return String::new();
    }
    let cleaned = cleaned.replace('*', "");
    if cleaned.starts_with('/') {
        cleaned
    } else {
        format!("/{cleaned}")
    }
}

fn longest_prefix<'a>(path: &str, rules: &'a [String]) -> &'a str {
    let mut longest = "";
    for rule in rules {
        if rule.is_empty() {
            continue;
        }
        if path.starts_with(rule.as_str()) && rule.len() > longest.len() {
            longest = rule;
        }
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;

    const UA: &str = "linkcheck-bot/1.0";

    #[test]
    fn test_longest_prefix_allow_wins() {
        let group = RuleGroup::from_rules(&["/a/b"], &["/a"]);
        assert!(group.allows_path("/a/b/c"));
        assert!(!group.allows_path("/a/x"));
    }

    #[test]
    fn test_no_disallow_means_allowed() {
        let group = RuleGroup::from_rules(&[], &[]);
        assert!(group.allows_path("/anything"));
    }

    #[test]
    fn test_equal_length_tie_allows() {
        let group = RuleGroup::from_rules(&["/ab"], &["/ab"]);
        assert!(group.allows_path("/ab/page"));
    }

    #[test]
    fn test_disallow_all() {
        let payload = b"User-agent: *\nDisallow: /";
        let group = parse_rules(payload, UA).expect("wildcard group");
        assert!(!group.allows_path("/"));
        assert!(!group.allows_path("/page"));
    }

    #[test]
    fn test_empty_disallow_ignored() {
        let payload = b"User-agent: *\nDisallow:";
        let group = parse_rules(payload, UA).expect("wildcard group");
        assert!(group.allows_path("/anything"));
    }

    #[test]
    fn test_wildcards_stripped_from_rules() {
        let payload = b"User-agent: *\nDisallow: /private*/area";
        let group = parse_rules(payload, UA).expect("wildcard group");
        assert!(!group.allows_path("/private/area"));
        assert!(group.allows_path("/public"));
    }

    #[test]
    fn test_rule_without_leading_slash() {
        let payload = b"User-agent: *\nDisallow: admin";
        let group = parse_rules(payload, UA).expect("wildcard group");
        assert!(!group.allows_path("/admin/users"));
    }

    #[test]
    fn test_comments_stripped() {
        let payload = b"User-agent: * # everyone\nDisallow: /admin # keep out";
        let group = parse_rules(payload, UA).expect("wildcard group");
        assert!(!group.allows_path("/admin"));
        assert!(group.allows_path("/page"));
    }

    #[test]
    fn test_base_agent_preferred_over_wildcard() {
        let payload = b"User-agent: linkcheck-bot\nDisallow: /bot-only\n\nUser-agent: *\nDisallow: /";
        let group = parse_rules(payload, UA).expect("specific group");
        assert!(!group.allows_path("/bot-only"));
        assert!(group.allows_path("/open"));
    }

    #[test]
    fn test_agent_lines_accumulate_into_one_group() {
        let payload = b"User-agent: alpha\nUser-agent: linkcheck-bot\nDisallow: /shared";
        let group = parse_rules(payload, UA).expect("accumulated group");
        assert!(!group.allows_path("/shared"));
    }

    #[test]
    fn test_agent_after_directive_starts_new_group() {
        let payload = b"User-agent: other\nDisallow: /other-only\nUser-agent: *\nDisallow: /everyone";
        let group = parse_rules(payload, UA).expect("wildcard group");
        assert!(group.allows_path("/other-only"));
        assert!(!group.allows_path("/everyone"));
    }

    #[test]
    fn test_blank_line_ends_group() {
        let payload = b"User-agent: *\n\nDisallow: /orphaned";
        // The blank line cleared the agent set, so the directive is dropped
        // and no group exists for any agent.
        assert!(parse_rules(payload, UA).is_none());
    }

    #[test]
    fn test_no_matching_group_means_unrestricted() {
        let payload = b"User-agent: other-bot\nDisallow: /";
        assert!(parse_rules(payload, UA).is_none());
    }

    #[test]
    fn test_unknown_directives_ignored() {
        let payload = b"User-agent: *\nCrawl-delay: 5\nSitemap: https://example.com/sitemap.xml\nDisallow: /admin";
        let group = parse_rules(payload, UA).expect("wildcard group");
        assert!(!group.allows_path("/admin"));
    }

    #[test]
    fn test_allow_overrides_shorter_disallow() {
        let payload = b"User-agent: *\nDisallow: /private\nAllow: /private/public";
        let group = parse_rules(payload, UA).expect("wildcard group");
        assert!(!group.allows_path("/private/secret"));
        assert!(group.allows_path("/private/public/page"));
    }
}
