//! Shared request and response types for the Sentinel compliance workflow API.
//!
//! These types define the wire contract between the Sentinel server and its
//! clients. Timestamps serialize as RFC 3339.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use uuid::Uuid;

/// Standard API error envelope.
#[derive(Debug, Deserialize, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

// -------- Projects --------

#[derive(Debug, Deserialize, Serialize)]
pub struct ProjectCreateRequest {
    pub name: String,
    pub customer_id: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LatestRulesetSummary {
    pub version: i32,
    pub version_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ProjectSummary {
    pub id: Uuid,
    pub customer_id: String,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub rulesets_count: usize,
    pub latest_ruleset: Option<LatestRulesetSummary>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ProjectListResponse {
    pub projects: Vec<ProjectSummary>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RulesetSummary {
    pub version: i32,
    pub version_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub data: JsonValue,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SelectedCompanyDto {
    pub company_id: String,
    pub company_name: String,
    pub fidessa_catalog: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ProjectDetailResponse {
    pub id: Uuid,
    pub customer_id: String,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub selected_company: Option<SelectedCompanyDto>,
    pub rulesets: Vec<RulesetSummary>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SelectCompanyRequest {
    pub company_id: String,
    pub company_name: String,
    pub fidessa_catalog: BTreeMap<String, String>,
}

// -------- Securities --------

#[derive(Debug, Deserialize, Serialize)]
pub struct SecurityDto {
    pub id: Uuid,
    #[serde(rename = "ISIN")]
    pub isin: String,
    #[serde(rename = "CUSIP")]
    pub cusip: String,
    #[serde(rename = "FIGI")]
    pub figi: String,
    #[serde(rename = "Ticker")]
    pub ticker: String,
    #[serde(rename = "Security_Name")]
    pub security_name: String,
    #[serde(rename = "Issuer_Name")]
    pub issuer_name: String,
    #[serde(rename = "Issuer_Country")]
    pub issuer_country: String,
    #[serde(rename = "Country_of_Risk")]
    pub country_of_risk: String,
    #[serde(rename = "Instrument_Type")]
    pub instrument_type: String,
    #[serde(rename = "Seniority")]
    pub seniority: String,
    #[serde(rename = "Currency")]
    pub currency: String,
    #[serde(rename = "Coupon_Type")]
    pub coupon_type: String,
    #[serde(rename = "Coupon_Rate")]
    pub coupon_rate: f64,
    #[serde(rename = "Issue_Date")]
    pub issue_date: String,
    #[serde(rename = "Maturity_Date")]
    pub maturity_date: String,
    #[serde(rename = "Days_to_Maturity")]
    pub days_to_maturity: i32,
    #[serde(rename = "Rating_SP")]
    pub rating_sp: String,
    #[serde(rename = "Rating_Moodys")]
    pub rating_moodys: String,
    #[serde(rename = "Rating_Fitch")]
    pub rating_fitch: String,
    #[serde(rename = "Composite_Rating")]
    pub composite_rating: String,
    #[serde(rename = "IG_Flag")]
    pub ig_flag: String,
    #[serde(rename = "Developed_Market")]
    pub developed_market: String,
    #[serde(rename = "Sector")]
    pub sector: String,
    #[serde(rename = "Index_Member")]
    pub index_member: String,
    #[serde(rename = "Approved_Index")]
    pub approved_index: String,
    #[serde(rename = "Callable")]
    pub callable: String,
    #[serde(rename = "Putable")]
    pub putable: String,
    #[serde(rename = "Subordinated_Flag")]
    pub subordinated_flag: String,
    #[serde(rename = "ESG_Exclusion")]
    pub esg_exclusion: String,
    #[serde(rename = "Shariah_Compliant")]
    pub shariah_compliant: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PaginationDto {
    pub page: u32,
    pub limit: u32,
    pub total_count: u64,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SecurityListResponse {
    pub securities: Vec<SecurityDto>,
    pub pagination: PaginationDto,
}

// -------- Agent workflow --------

#[derive(Debug, Deserialize, Serialize)]
pub struct RulesExtractorRequest {
    pub project_id: Uuid,
    pub customer_id: String,
    pub document_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RawRuleSectionDto {
    pub title: String,
    pub rules: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RulesExtractorResponse {
    pub raw_rules: Vec<RawRuleSectionDto>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RulesToColumnRequest {
    pub project_id: Uuid,
    pub customer_id: String,
    /// Extractor output, either the parsed object or its JSON text.
    pub rules_extractor_response: JsonValue,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MappedRuleDto {
    pub constraint: String,
    pub sentinel_allowed_values: Vec<String>,
    pub rules: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RulesToColumnResponse {
    pub version: i32,
    pub version_name: String,
    pub mapped_rules: Vec<MappedRuleDto>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GapAnalysisRequest {
    pub project_id: Uuid,
    pub customer_id: String,
    /// Mapping output, either the parsed object or its JSON text.
    pub rules_to_column_response: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fidessa_catalog: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GapFindingDto {
    pub constraint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_allowed_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_value: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fidessa_value: Option<Vec<String>>,
    pub delta: String,
    pub matched: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GapAnalysisResponse {
    pub mapped_rules: Vec<GapFindingDto>,
}

// -------- Version comparison --------

#[derive(Debug, Deserialize, Serialize)]
pub struct VersionPayload {
    pub version: i32,
    pub version_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub raw_rules: Vec<RawRuleSectionDto>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RulesDiffRequest {
    pub project_id: Uuid,
    pub customer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_extractor_response: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<VersionPayload>>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct VersionInfoDto {
    pub version: i32,
    pub version_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ComparisonResultDto {
    pub tag: String,
    pub previous: Option<String>,
    pub current: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct VersionComparisonDto {
    pub from: String,
    pub to: String,
    pub results: Vec<ComparisonResultDto>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RulesDiffResponse {
    pub versions: Vec<VersionInfoDto>,
    pub comparisons: Vec<VersionComparisonDto>,
}

// -------- Simulation --------

#[derive(Debug, Deserialize, Serialize)]
pub struct FunnelStageDto {
    pub name: String,
    pub count: i64,
    pub removed: i64,
    pub percentage: u32,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FunnelResponse {
    pub stages: Vec<FunnelStageDto>,
}
