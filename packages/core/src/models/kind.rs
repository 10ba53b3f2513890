//! Hierarchy Kinds
//!
//! Every entity kind owns an independent nested-set numbering space persisted
//! in its own table. Kinds never share boundaries, so a mutation in one kind
//! never renumbers rows of another.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical entity type sharing the nested-set table shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HierarchyKind {
    Taxonomy,
    Menu,
    Organization,
    Comment,
    Media,
}

impl HierarchyKind {
    /// Every kind, in schema creation order
    pub const ALL: [HierarchyKind; 5] = [
        HierarchyKind::Taxonomy,
        HierarchyKind::Menu,
        HierarchyKind::Organization,
        HierarchyKind::Comment,
        HierarchyKind::Media,
    ];

    /// Lowercase identifier used in logs, events and the CLI
    pub fn as_str(&self) -> &'static str {
        match self {
            HierarchyKind::Taxonomy => "taxonomy",
            HierarchyKind::Menu => "menu",
            HierarchyKind::Organization => "organization",
            HierarchyKind::Comment => "comment",
            HierarchyKind::Media => "media",
        }
    }

    /// Name of the table holding this kind's rows
    ///
    /// Table names are compile-time constants, which is what makes it safe for
    /// the db layer to splice them into SQL text.
    pub fn table_name(&self) -> &'static str {
        match self {
            HierarchyKind::Taxonomy => "taxonomy_nodes",
            HierarchyKind::Menu => "menu_nodes",
            HierarchyKind::Organization => "organization_nodes",
            HierarchyKind::Comment => "comment_nodes",
            HierarchyKind::Media => "media_nodes",
        }
    }
}

impl fmt::Display for HierarchyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HierarchyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "taxonomy" => Ok(HierarchyKind::Taxonomy),
            "menu" => Ok(HierarchyKind::Menu),
            "organization" | "organisation" => Ok(HierarchyKind::Organization),
            "comment" => Ok(HierarchyKind::Comment),
            "media" => Ok(HierarchyKind::Media),
            other => Err(format!("Unknown hierarchy kind: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_roundtrip() {
        for kind in HierarchyKind::ALL {
            assert_eq!(kind.as_str().parse::<HierarchyKind>().unwrap(), kind);
        }
        assert_eq!(
            " Organisation ".parse::<HierarchyKind>().unwrap(),
            HierarchyKind::Organization
        );
        assert!("folder".parse::<HierarchyKind>().is_err());
    }

    #[test]
    fn test_table_names_are_distinct() {
        let mut names: Vec<_> = HierarchyKind::ALL.iter().map(|k| k.table_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), HierarchyKind::ALL.len());
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        let json = serde_json::to_string(&HierarchyKind::Organization).unwrap();
        assert_eq!(json, "\"organization\"");
    }
}
