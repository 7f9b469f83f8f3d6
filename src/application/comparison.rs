//! Multi-version ruleset comparison service.
//!
//! Assembles the version sequence (stored rulesets plus, optionally, the
//! in-flight extraction as a synthetic "Current" version) and produces
//! tagged comparisons. The deterministic engine in `domain::diff` is
//! authoritative; when a diff agent is configured its reply is used after
//! normalization, falling back to the local engine on any failure.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::warn;
use uuid::Uuid;

use crate::application::agents::{AgentGateway, AgentMessage, AgentTask};
use crate::application::projects::{ProjectError, ProjectService};
use crate::application::workflow::{parse_sections, unwrap_reply};
use crate::domain::diff::{
    self, ComparisonResult, ComparisonTag, MultiVersionDiff, VersionComparison, VersionInfo,
    VersionRules,
};
use crate::domain::projects::RawRuleSection;
use crate::util::json;

#[derive(Debug, Error)]
pub enum ComparisonError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("no versions found for comparison")]
    NoVersions,
    #[error(transparent)]
    Project(#[from] ProjectError),
}

/// One version supplied inline with a comparison request.
#[derive(Debug, Clone)]
pub struct VersionInput {
    pub info: VersionInfo,
    pub raw_rules: Vec<RawRuleSection>,
}

#[derive(Debug, Clone)]
pub struct RulesDiffCommand {
    pub project_id: Uuid,
    pub customer_id: String,
    pub rules_extractor_response: Option<JsonValue>,
    pub versions: Option<Vec<VersionInput>>,
}

#[derive(Clone)]
pub struct RulesDiffService {
    projects: ProjectService,
    agent: Arc<dyn AgentGateway>,
}

impl RulesDiffService {
    pub fn new(projects: ProjectService, agent: Arc<dyn AgentGateway>) -> Self {
        Self { projects, agent }
    }

    pub async fn compare(
        &self,
        command: RulesDiffCommand,
    ) -> Result<MultiVersionDiff, ComparisonError> {
        if command.customer_id.trim().is_empty() {
            return Err(ComparisonError::Validation("customer_id is required"));
        }

        let versions = match command.versions {
            Some(versions) if !versions.is_empty() => versions,
            _ => {
                let Some(extractor_response) = command.rules_extractor_response else {
                    return Err(ComparisonError::Validation(
                        "rules_extractor_response or versions is required",
                    ));
                };
                let mut versions = self.stored_versions(&command.customer_id).await?;
                versions.push(current_version(extractor_response, versions.len() as i32 + 1));
                versions
            }
        };

        Ok(self.run_comparison(&command.customer_id, &versions).await)
    }

    /// Compare a project's stored versions only; the comparison page uses
    /// this to render history without an in-flight extraction.
    pub async fn compare_stored(
        &self,
        customer_id: &str,
    ) -> Result<MultiVersionDiff, ComparisonError> {
        let versions = self.stored_versions(customer_id).await?;
        Ok(self.run_comparison(customer_id, &versions).await)
    }

    async fn stored_versions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<VersionInput>, ComparisonError> {
        let project = self.projects.get_by_customer(customer_id).await?;

        let versions: Vec<VersionInput> = project
            .rulesets
            .iter()
            .map(|ruleset| VersionInput {
                info: VersionInfo {
                    version: ruleset.version,
                    version_name: ruleset.version_name.clone(),
                    created_at: ruleset.created_at,
                },
                raw_rules: ruleset.data.raw_rules.clone(),
            })
            .collect();

        if versions.is_empty() {
            return Err(ComparisonError::NoVersions);
        }

        Ok(versions)
    }

    async fn run_comparison(
        &self,
        customer_id: &str,
        versions: &[VersionInput],
    ) -> MultiVersionDiff {
        if self.agent.is_configured(AgentTask::RulesDiff) {
            match self.agent_comparison(customer_id, versions).await {
                Ok(diff) => return diff,
                Err(err) => {
                    warn!(
                        target = "sentinel::comparison",
                        customer_id = %customer_id,
                        error = %err,
                        "diff agent failed, using local comparison"
                    );
                }
            }
        }

        local_comparison(versions)
    }

    /// Forward all versions in one message and normalize the reply.
    async fn agent_comparison(
        &self,
        customer_id: &str,
        versions: &[VersionInput],
    ) -> Result<MultiVersionDiff, Box<dyn std::error::Error + Send + Sync>> {
        let message = serde_json::to_string(&serde_json::json!({
            "versions": versions
                .iter()
                .map(|version| {
                    serde_json::json!({
                        "version": version.info.version,
                        "versionName": version.info.version_name,
                        "createdAt": version
                            .info
                            .created_at
                            .format(&Rfc3339)
                            .unwrap_or_default(),
                        "raw_rules": version.raw_rules,
                    })
                })
                .collect::<Vec<_>>(),
        }))?;

        let reply = self
            .agent
            .send(AgentMessage::new(
                AgentTask::RulesDiff,
                customer_id,
                message,
            ))
            .await?;

        let payload = unwrap_reply(reply, "rules diff reply")?;
        Ok(normalize_agent_diff(&payload, versions))
    }
}

/// The in-flight extraction as the latest, synthetic version.
fn current_version(extractor_response: JsonValue, version: i32) -> VersionInput {
    let value = match &extractor_response {
        JsonValue::String(text) => json::parse(text, None).unwrap_or(JsonValue::Null),
        other => other.clone(),
    };
    VersionInput {
        info: VersionInfo {
            version,
            version_name: "Current".to_owned(),
            created_at: OffsetDateTime::now_utc(),
        },
        raw_rules: parse_sections(&value),
    }
}

/// Deterministic comparison over the flattened rule texts.
pub fn local_comparison(versions: &[VersionInput]) -> MultiVersionDiff {
    let flattened: Vec<VersionRules> = versions
        .iter()
        .map(|version| VersionRules::from_sections(version.info.clone(), &version.raw_rules))
        .collect();
    diff::compare_versions(&flattened)
}

#[derive(Debug, Deserialize)]
struct RawDiffReply {
    #[serde(default)]
    comparisons: Vec<RawComparison>,
}

#[derive(Debug, Deserialize)]
struct RawComparison {
    #[serde(default)]
    from: String,
    #[serde(default)]
    to: String,
    #[serde(default)]
    results: Vec<RawResult>,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    tag: Option<String>,
    previous: Option<String>,
    current: Option<String>,
}

/// Normalize a diff-agent reply: lenient tag parsing (malformed or
/// missing tags become `unchanged`), null-tolerant texts, and version
/// metadata taken from the request rather than trusted from the agent.
pub fn normalize_agent_diff(payload: &JsonValue, versions: &[VersionInput]) -> MultiVersionDiff {
    let reply: RawDiffReply = serde_json::from_value(payload.clone()).unwrap_or(RawDiffReply {
        comparisons: Vec::new(),
    });

    MultiVersionDiff {
        versions: versions.iter().map(|v| v.info.clone()).collect(),
        comparisons: reply
            .comparisons
            .into_iter()
            .map(|comparison| VersionComparison {
                from: comparison.from,
                to: comparison.to,
                results: comparison
                    .results
                    .into_iter()
                    .map(|result| ComparisonResult {
                        tag: ComparisonTag::parse_lenient(result.tag.as_deref()),
                        previous: result.previous,
                        current: result.current,
                    })
                    .collect(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn version(name: &str, number: i32, rules: &[&str]) -> VersionInput {
        VersionInput {
            info: VersionInfo {
                version: number,
                version_name: name.into(),
                created_at: datetime!(2025-06-01 12:00 UTC),
            },
            raw_rules: vec![RawRuleSection {
                title: "General".into(),
                rules: rules.iter().map(|r| r.to_string()).collect(),
            }],
        }
    }

    #[test]
    fn local_comparison_flattens_sections() {
        let diff = local_comparison(&[
            version("v1", 1, &["No tobacco issuers"]),
            version("v2", 2, &["No tobacco issuers", "ESG exclusions apply"]),
        ]);
        assert_eq!(diff.comparisons.len(), 1);
        assert_eq!(diff.comparisons[0].from, "v1");
        let tags: Vec<ComparisonTag> = diff.comparisons[0]
            .results
            .iter()
            .map(|r| r.tag)
            .collect();
        assert_eq!(tags, vec![ComparisonTag::Unchanged, ComparisonTag::Added]);
    }

    #[test]
    fn current_version_parses_text_payloads() {
        let input = current_version(
            json!(r#"[{"title": "Ratings", "rules": ["IG only"]}]"#),
            3,
        );
        assert_eq!(input.info.version_name, "Current");
        assert_eq!(input.info.version, 3);
        assert_eq!(input.raw_rules.len(), 1);
    }

    #[test]
    fn normalization_defaults_malformed_tags() {
        let payload = json!({
            "comparisons": [{
                "from": "v1",
                "to": "v2",
                "results": [
                    {"tag": "MODIFIED", "previous": "a", "current": "b"},
                    {"tag": "renamed", "previous": "c", "current": "c"},
                    {"previous": null, "current": "d"}
                ]
            }]
        });
        let versions = [version("v1", 1, &[]), version("v2", 2, &[])];
        let diff = normalize_agent_diff(&payload, &versions);

        let results = &diff.comparisons[0].results;
        assert_eq!(results[0].tag, ComparisonTag::Modified);
        assert_eq!(results[1].tag, ComparisonTag::Unchanged);
        assert_eq!(results[2].tag, ComparisonTag::Unchanged);
        assert_eq!(results[2].previous, None);
        assert_eq!(diff.versions.len(), 2);
    }

    #[test]
    fn normalization_survives_garbage_payloads() {
        let versions = [version("v1", 1, &[])];
        let diff = normalize_agent_diff(&json!("nonsense"), &versions);
        assert!(diff.comparisons.is_empty());
        assert_eq!(diff.versions.len(), 1);
    }
}
