//! Conversions between domain records and the shared API wire types.

use sentinel_api_types::{
    ComparisonResultDto, FunnelStageDto, GapFindingDto, LatestRulesetSummary, MappedRuleDto,
    PaginationDto, ProjectDetailResponse, ProjectSummary, RawRuleSectionDto, RulesDiffResponse,
    RulesetSummary, SecurityDto, SelectedCompanyDto, VersionComparisonDto, VersionInfoDto,
};
use serde_json::Value as JsonValue;

use crate::application::pagination::PageInfo;
use crate::domain::diff::MultiVersionDiff;
use crate::domain::funnel::FunnelStage;
use crate::domain::projects::{
    GapFinding, MappedRule, ProjectRecord, RawRuleSection, Ruleset, SelectedCompany,
};
use crate::domain::securities::SecurityRecord;

pub fn project_summary(record: &ProjectRecord) -> ProjectSummary {
    ProjectSummary {
        id: record.id,
        customer_id: record.customer_id.clone(),
        name: record.name.clone(),
        created_at: record.created_at,
        rulesets_count: record.rulesets.len(),
        latest_ruleset: record.latest_ruleset().map(|ruleset| LatestRulesetSummary {
            version: ruleset.version,
            version_name: ruleset.version_name.clone(),
            created_at: ruleset.created_at,
        }),
    }
}

pub fn project_detail(record: &ProjectRecord) -> ProjectDetailResponse {
    ProjectDetailResponse {
        id: record.id,
        customer_id: record.customer_id.clone(),
        name: record.name.clone(),
        created_at: record.created_at,
        selected_company: record.selected_company.as_ref().map(selected_company),
        rulesets: record.rulesets.iter().map(ruleset_summary).collect(),
    }
}

fn selected_company(company: &SelectedCompany) -> SelectedCompanyDto {
    SelectedCompanyDto {
        company_id: company.company_id.clone(),
        company_name: company.company_name.clone(),
        fidessa_catalog: company.fidessa_catalog.clone(),
    }
}

fn ruleset_summary(ruleset: &Ruleset) -> RulesetSummary {
    RulesetSummary {
        version: ruleset.version,
        version_name: ruleset.version_name.clone(),
        created_at: ruleset.created_at,
        data: serde_json::to_value(&ruleset.data).unwrap_or(JsonValue::Null),
    }
}

pub fn raw_rule_section(section: &RawRuleSection) -> RawRuleSectionDto {
    RawRuleSectionDto {
        title: section.title.clone(),
        rules: section.rules.clone(),
    }
}

pub fn mapped_rule(rule: &MappedRule) -> MappedRuleDto {
    MappedRuleDto {
        constraint: rule.constraint.clone(),
        sentinel_allowed_values: rule.sentinel_allowed_values.clone(),
        rules: rule.rules.clone(),
    }
}

pub fn gap_finding(finding: &GapFinding) -> GapFindingDto {
    GapFindingDto {
        constraint: finding.constraint.clone(),
        allowed_values: finding.allowed_values.clone(),
        not_allowed_values: finding.not_allowed_values.clone(),
        pdf_value: finding.pdf_value.clone(),
        fidessa_value: finding.fidessa_value.clone(),
        delta: finding.delta.clone(),
        matched: finding.matched,
    }
}

pub fn security_dto(record: &SecurityRecord) -> SecurityDto {
    SecurityDto {
        id: record.id,
        isin: record.isin.clone(),
        cusip: record.cusip.clone(),
        figi: record.figi.clone(),
        ticker: record.ticker.clone(),
        security_name: record.security_name.clone(),
        issuer_name: record.issuer_name.clone(),
        issuer_country: record.issuer_country.clone(),
        country_of_risk: record.country_of_risk.clone(),
        instrument_type: record.instrument_type.clone(),
        seniority: record.seniority.clone(),
        currency: record.currency.clone(),
        coupon_type: record.coupon_type.clone(),
        coupon_rate: record.coupon_rate,
        issue_date: record.issue_date.clone(),
        maturity_date: record.maturity_date.clone(),
        days_to_maturity: record.days_to_maturity,
        rating_sp: record.rating_sp.clone(),
        rating_moodys: record.rating_moodys.clone(),
        rating_fitch: record.rating_fitch.clone(),
        composite_rating: record.composite_rating.clone(),
        ig_flag: record.ig_flag.clone(),
        developed_market: record.developed_market.clone(),
        sector: record.sector.clone(),
        index_member: record.index_member.clone(),
        approved_index: record.approved_index.clone(),
        callable: record.callable.clone(),
        putable: record.putable.clone(),
        subordinated_flag: record.subordinated_flag.clone(),
        esg_exclusion: record.esg_exclusion.clone(),
        shariah_compliant: record.shariah_compliant.clone(),
    }
}

pub fn pagination_dto(info: PageInfo) -> PaginationDto {
    PaginationDto {
        page: info.page,
        limit: info.limit,
        total_count: info.total_count,
        total_pages: info.total_pages,
        has_next_page: info.has_next_page,
        has_prev_page: info.has_prev_page,
    }
}

pub fn diff_response(diff: &MultiVersionDiff) -> RulesDiffResponse {
    RulesDiffResponse {
        versions: diff
            .versions
            .iter()
            .map(|info| VersionInfoDto {
                version: info.version,
                version_name: info.version_name.clone(),
                created_at: info.created_at,
            })
            .collect(),
        comparisons: diff
            .comparisons
            .iter()
            .map(|comparison| VersionComparisonDto {
                from: comparison.from.clone(),
                to: comparison.to.clone(),
                results: comparison
                    .results
                    .iter()
                    .map(|result| ComparisonResultDto {
                        tag: result.tag.as_str().to_owned(),
                        previous: result.previous.clone(),
                        current: result.current.clone(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

pub fn funnel_stage(stage: &FunnelStage) -> FunnelStageDto {
    FunnelStageDto {
        name: stage.name.clone(),
        count: stage.count,
        removed: stage.removed,
        percentage: stage.percentage,
    }
}
