//! Per-host rewrite passes.
//!
//! Some upstreams serve assets from paths that must be remapped under a
//! different prefix than the page itself (a docs site under `/docs` whose
//! `/_next/` bundles live under `/docs_assets`). Each configured
//! `[[special_rules]]` table becomes one [`RewritePass`] for its host,
//! applied after the generic HTML pass.

use std::collections::HashMap;

use crate::config::schema::SpecialRuleSetConfig;
use crate::rewrite::rule::{RewritePass, RewriteRule};

/// Immutable host → passes lookup.
#[derive(Debug, Default)]
pub struct SpecialRuleRegistry {
    by_host: HashMap<String, Vec<RewritePass>>,
}

impl SpecialRuleRegistry {
    /// Compile every configured rule set.
    pub fn from_config(sets: &[SpecialRuleSetConfig]) -> Result<Self, regex::Error> {
        let mut by_host: HashMap<String, Vec<RewritePass>> = HashMap::new();

        for set in sets {
            let host = set.host.trim().to_ascii_lowercase();
            let rules = set
                .rules
                .iter()
                .enumerate()
                .map(|(i, rule)| {
                    RewriteRule::template(format!("{host}#{i}"), &rule.pattern, rule.template.as_str())
                })
                .collect::<Result<Vec<_>, _>>()?;
            by_host.entry(host).or_default().push(RewritePass::new(rules));
        }

        Ok(Self { by_host })
    }

    /// Passes registered for `host`, in configuration order.
    pub fn rules_for(&self, host: &str) -> &[RewritePass] {
        self.by_host
            .get(&host.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_host.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_host.is_empty()
    }
}
