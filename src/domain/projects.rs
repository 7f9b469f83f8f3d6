//! Project aggregates: one project per customer, holding the versioned
//! rulesets produced by the constraint workflow.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// One titled section of constraint clauses as extracted from a
/// guidelines document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRuleSection {
    pub title: String,
    pub rules: Vec<String>,
}

/// A constraint mapped onto the structured rule schema: the catalog
/// attribute it governs and the values it permits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedRule {
    pub constraint: String,
    #[serde(default)]
    pub sentinel_allowed_values: Vec<String>,
    #[serde(default)]
    pub rules: Vec<String>,
}

/// A single gap-analysis delta between the document's constraints and the
/// reference catalog. Both the newer (`allowed_values`/`not_allowed_values`)
/// and the older (`pdf_value`/`fidessa_value`) agent response shapes are
/// retained on the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapFinding {
    pub constraint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_allowed_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_value: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fidessa_value: Option<Vec<String>>,
    #[serde(default)]
    pub delta: String,
    #[serde(default)]
    pub matched: bool,
}

impl GapFinding {
    /// Values the document permits, whichever response shape carried them.
    pub fn document_values(&self) -> &[String] {
        self.allowed_values
            .as_deref()
            .or(self.pdf_value.as_deref())
            .unwrap_or_default()
    }

    /// Values observed in the reference catalog.
    pub fn catalog_values(&self) -> &[String] {
        self.fidessa_value
            .as_deref()
            .or(self.not_allowed_values.as_deref())
            .unwrap_or_default()
    }
}

/// Payload of one ruleset version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulesetData {
    #[serde(default)]
    pub raw_rules: Vec<RawRuleSection>,
    #[serde(default)]
    pub mapped_rules: Vec<MappedRule>,
    #[serde(default)]
    pub gap_analysis: Vec<GapFinding>,
}

/// A saved snapshot of mapped rules plus metadata, stored per project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    pub version: i32,
    pub version_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub data: RulesetData,
}

/// The reference company whose catalog attribute summary feeds gap
/// analysis when a request does not carry its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedCompany {
    pub company_id: String,
    pub company_name: String,
    pub fidessa_catalog: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectRecord {
    pub id: Uuid,
    pub name: String,
    pub customer_id: String,
    pub selected_company: Option<SelectedCompany>,
    pub rulesets: Vec<Ruleset>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ProjectRecord {
    pub fn latest_ruleset(&self) -> Option<&Ruleset> {
        self.rulesets.last()
    }

    /// The version number the next appended ruleset will receive.
    pub fn next_version(&self) -> i32 {
        self.rulesets
            .iter()
            .map(|ruleset| ruleset.version)
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Whether this project belongs to the given customer; handlers use
    /// this to cross-check ids supplied together in one request.
    pub fn belongs_to(&self, customer_id: &str) -> bool {
        self.customer_id == customer_id
    }
}

/// The stored upload backing an extraction run, together with the rule
/// sections the extraction agent produced for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuidelineDocumentRecord {
    pub id: Uuid,
    pub project_id: Uuid,
    pub filename: String,
    pub body: String,
    pub extracted_rules: Vec<RawRuleSection>,
    pub created_at: OffsetDateTime,
}
