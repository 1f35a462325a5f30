use std::fmt;
use std::str::FromStr;

use fairsoil_types::TrailItem;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditCategory {
    Treasury,
    Covenant,
    Dispute,
    Ubi,
    Other,
}

/// First matching keyword group wins, in this order.
pub fn audit_category(title: &str) -> AuditCategory {
    let lower = title.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|word| lower.contains(word));
    if has(&["treasury", "reserve", "liability"]) {
        AuditCategory::Treasury
    } else if has(&["agreement", "covenant", "work"]) {
        AuditCategory::Covenant
    } else if has(&["support", "dispute", "proposal"]) {
        AuditCategory::Dispute
    } else if has(&["bonus", "ubi"]) {
        AuditCategory::Ubi
    } else {
        AuditCategory::Other
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditFilter {
    #[default]
    All,
    Treasury,
    Covenant,
    Dispute,
    Ubi,
}

impl AuditFilter {
    pub fn admits(self, category: AuditCategory) -> bool {
        match self {
            Self::All => true,
            Self::Treasury => category == AuditCategory::Treasury,
            Self::Covenant => category == AuditCategory::Covenant,
            Self::Dispute => category == AuditCategory::Dispute,
            Self::Ubi => category == AuditCategory::Ubi,
        }
    }
}

impl FromStr for AuditFilter {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "treasury" => Ok(Self::Treasury),
            "covenant" => Ok(Self::Covenant),
            "dispute" => Ok(Self::Dispute),
            "ubi" => Ok(Self::Ubi),
            other => Err(format!(
                "unknown trail filter `{other}` (expected all, treasury, covenant, dispute or ubi)"
            )),
        }
    }
}

impl fmt::Display for AuditFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::All => "all",
            Self::Treasury => "treasury",
            Self::Covenant => "covenant",
            Self::Dispute => "dispute",
            Self::Ubi => "ubi",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrailQuery {
    pub filter: AuditFilter,
    pub text: String,
}

impl TrailQuery {
    pub fn new(filter: AuditFilter, text: impl Into<String>) -> Self {
        Self {
            filter,
            text: text.into(),
        }
    }
}

/// Items admitted by the category filter whose title/body, or the tag
/// annotation of their covenant, contains the query (case-insensitive).
pub fn filter_trail<'a, F>(items: &'a [TrailItem], query: &TrailQuery, tags_for: F) -> Vec<&'a TrailItem>
where
    F: Fn(u64) -> Option<String>,
{
    let needle = query.text.trim().to_lowercase();
    items
        .iter()
        .filter(|item| query.filter.admits(audit_category(&item.title)))
        .filter(|item| {
            if needle.is_empty() || item.search_text().contains(&needle) {
                return true;
            }
            item.covenant_id
                .and_then(&tags_for)
                .is_some_and(|tags| tags.to_lowercase().contains(&needle))
        })
        .collect()
}
