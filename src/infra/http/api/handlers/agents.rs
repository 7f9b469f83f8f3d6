use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use sentinel_api_types::{
    GapAnalysisRequest, GapAnalysisResponse, RulesDiffRequest, RulesExtractorRequest,
    RulesExtractorResponse, RulesToColumnRequest, RulesToColumnResponse,
};

use crate::application::comparison::{RulesDiffCommand, VersionInput};
use crate::application::workflow::{ExtractCommand, GapAnalysisCommand, MapRulesCommand};
use crate::domain::diff::VersionInfo;
use crate::domain::projects::RawRuleSection;

use super::super::error::ApiError;
use super::super::models;
use super::super::state::ApiState;

pub async fn rules_extractor(
    State(state): State<ApiState>,
    Json(request): Json<RulesExtractorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let sections = state
        .workflow
        .extract(ExtractCommand {
            project_id: request.project_id,
            customer_id: request.customer_id,
            document_text: request.document_text,
            filename: request.filename,
        })
        .await?;

    Ok(Json(RulesExtractorResponse {
        raw_rules: sections.iter().map(models::raw_rule_section).collect(),
    }))
}

pub async fn rules_to_column(
    State(state): State<ApiState>,
    Json(request): Json<RulesToColumnRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (ruleset, mapped_rules) = state
        .workflow
        .map_rules(MapRulesCommand {
            project_id: request.project_id,
            customer_id: request.customer_id,
            rules_extractor_response: request.rules_extractor_response,
        })
        .await?;

    Ok(Json(RulesToColumnResponse {
        version: ruleset.version,
        version_name: ruleset.version_name,
        mapped_rules: mapped_rules.iter().map(models::mapped_rule).collect(),
    }))
}

pub async fn gap_analysis(
    State(state): State<ApiState>,
    Json(request): Json<GapAnalysisRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let findings = state
        .workflow
        .gap_analysis(GapAnalysisCommand {
            project_id: request.project_id,
            customer_id: request.customer_id,
            rules_to_column_response: request.rules_to_column_response,
            fidessa_catalog: request.fidessa_catalog,
        })
        .await?;

    Ok(Json(GapAnalysisResponse {
        mapped_rules: findings.iter().map(models::gap_finding).collect(),
    }))
}

pub async fn rules_diff(
    State(state): State<ApiState>,
    Json(request): Json<RulesDiffRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let versions = request.versions.map(|versions| {
        versions
            .into_iter()
            .map(|payload| VersionInput {
                info: VersionInfo {
                    version: payload.version,
                    version_name: payload.version_name,
                    created_at: payload.created_at,
                },
                raw_rules: payload
                    .raw_rules
                    .into_iter()
                    .map(|section| RawRuleSection {
                        title: section.title,
                        rules: section.rules,
                    })
                    .collect(),
            })
            .collect()
    });

    let diff = state
        .comparison
        .compare(RulesDiffCommand {
            project_id: request.project_id,
            customer_id: request.customer_id,
            rules_extractor_response: request.rules_extractor_response,
            versions,
        })
        .await?;

    Ok(Json(models::diff_response(&diff)))
}
