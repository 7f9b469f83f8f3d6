//! Handler-level API tests over in-memory repository implementations.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use serde_json::{Value as JsonValue, json};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use sentinel::application::agents::{AgentError, AgentGateway, AgentMessage, AgentTask};
use sentinel::application::comparison::RulesDiffService;
use sentinel::application::pagination::PageRequest;
use sentinel::application::projects::ProjectService;
use sentinel::application::repos::{
    CreateProjectParams, DocumentsRepo, NewGuidelineDocument, ProjectsRepo, RepoError,
    SecuritiesRepo, SecurityQueryFilter, SecuritySort,
};
use sentinel::application::securities::SecurityService;
use sentinel::application::simulation::SimulationService;
use sentinel::application::workflow::ConstraintWorkflowService;
use sentinel::domain::projects::{
    GuidelineDocumentRecord, ProjectRecord, RawRuleSection, Ruleset, SelectedCompany,
};
use sentinel::domain::securities::{ColumnFilter, SecurityColumn, SecurityRecord, SortOrder};
use sentinel::infra::http::api::handlers;
use sentinel::infra::http::api::rate_limit::ApiRateLimiter;
use sentinel::infra::http::api::state::ApiState;
use sentinel_api_types::{
    FunnelResponse, GapAnalysisResponse, ProjectCreateRequest, ProjectListResponse,
    RulesDiffRequest, RulesDiffResponse, RulesToColumnRequest, RulesToColumnResponse,
    SecurityListResponse,
};

#[derive(Default)]
struct MemoryProjectsRepo {
    projects: Mutex<Vec<ProjectRecord>>,
}

#[async_trait]
impl ProjectsRepo for MemoryProjectsRepo {
    async fn list_projects(&self) -> Result<Vec<ProjectRecord>, RepoError> {
        let mut projects = self.projects.lock().await.clone();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn find_project(&self, id: Uuid) -> Result<Option<ProjectRecord>, RepoError> {
        Ok(self
            .projects
            .lock()
            .await
            .iter()
            .find(|project| project.id == id)
            .cloned())
    }

    async fn find_project_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<ProjectRecord>, RepoError> {
        Ok(self
            .projects
            .lock()
            .await
            .iter()
            .find(|project| project.customer_id == customer_id)
            .cloned())
    }

    async fn insert_project(
        &self,
        params: CreateProjectParams,
    ) -> Result<ProjectRecord, RepoError> {
        let mut projects = self.projects.lock().await;
        if projects
            .iter()
            .any(|project| project.customer_id == params.customer_id)
        {
            return Err(RepoError::Duplicate {
                constraint: "projects_customer_id_key".into(),
            });
        }
        let record = ProjectRecord {
            id: Uuid::new_v4(),
            name: params.name,
            customer_id: params.customer_id,
            selected_company: None,
            rulesets: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        };
        projects.push(record.clone());
        Ok(record)
    }

    async fn update_rulesets(&self, id: Uuid, rulesets: &[Ruleset]) -> Result<(), RepoError> {
        let mut projects = self.projects.lock().await;
        let project = projects
            .iter_mut()
            .find(|project| project.id == id)
            .ok_or(RepoError::NotFound)?;
        project.rulesets = rulesets.to_vec();
        project.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn update_selected_company(
        &self,
        id: Uuid,
        company: &SelectedCompany,
    ) -> Result<(), RepoError> {
        let mut projects = self.projects.lock().await;
        let project = projects
            .iter_mut()
            .find(|project| project.id == id)
            .ok_or(RepoError::NotFound)?;
        project.selected_company = Some(company.clone());
        Ok(())
    }
}

#[derive(Default)]
struct MemorySecuritiesRepo {
    records: Mutex<Vec<SecurityRecord>>,
}

fn column_value(record: &SecurityRecord, column: SecurityColumn) -> String {
    match column {
        SecurityColumn::Isin => record.isin.clone(),
        SecurityColumn::Cusip => record.cusip.clone(),
        SecurityColumn::Figi => record.figi.clone(),
        SecurityColumn::Ticker => record.ticker.clone(),
        SecurityColumn::SecurityName => record.security_name.clone(),
        SecurityColumn::IssuerName => record.issuer_name.clone(),
        SecurityColumn::IssuerCountry => record.issuer_country.clone(),
        SecurityColumn::CountryOfRisk => record.country_of_risk.clone(),
        SecurityColumn::InstrumentType => record.instrument_type.clone(),
        SecurityColumn::Seniority => record.seniority.clone(),
        SecurityColumn::Currency => record.currency.clone(),
        SecurityColumn::CouponType => record.coupon_type.clone(),
        SecurityColumn::CouponRate => format!("{:012.4}", record.coupon_rate),
        SecurityColumn::IssueDate => record.issue_date.clone(),
        SecurityColumn::MaturityDate => record.maturity_date.clone(),
        SecurityColumn::DaysToMaturity => record.days_to_maturity.to_string(),
        SecurityColumn::RatingSp => record.rating_sp.clone(),
        SecurityColumn::RatingMoodys => record.rating_moodys.clone(),
        SecurityColumn::RatingFitch => record.rating_fitch.clone(),
        SecurityColumn::CompositeRating => record.composite_rating.clone(),
        SecurityColumn::IgFlag => record.ig_flag.clone(),
        SecurityColumn::DevelopedMarket => record.developed_market.clone(),
        SecurityColumn::Sector => record.sector.clone(),
        SecurityColumn::IndexMember => record.index_member.clone(),
        SecurityColumn::ApprovedIndex => record.approved_index.clone(),
        SecurityColumn::Callable => record.callable.clone(),
        SecurityColumn::Putable => record.putable.clone(),
        SecurityColumn::SubordinatedFlag => record.subordinated_flag.clone(),
        SecurityColumn::EsgExclusion => record.esg_exclusion.clone(),
        SecurityColumn::ShariahCompliant => record.shariah_compliant.clone(),
    }
}

fn matches_search(record: &SecurityRecord, search: &str) -> bool {
    let needle = search.to_lowercase();
    [
        &record.isin,
        &record.security_name,
        &record.issuer_name,
        &record.ticker,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(&needle))
}

#[async_trait]
impl SecuritiesRepo for MemorySecuritiesRepo {
    async fn list_securities(
        &self,
        filter: &SecurityQueryFilter,
        sort: SecuritySort,
        page: PageRequest,
    ) -> Result<Vec<SecurityRecord>, RepoError> {
        let mut records: Vec<SecurityRecord> = self
            .records
            .lock()
            .await
            .iter()
            .filter(|record| {
                filter
                    .search
                    .as_deref()
                    .is_none_or(|search| matches_search(record, search))
            })
            .cloned()
            .collect();

        records.sort_by_key(|record| column_value(record, sort.column));
        if sort.order == SortOrder::Descending {
            records.reverse();
        }

        Ok(records
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect())
    }

    async fn count_securities(&self, filter: &SecurityQueryFilter) -> Result<u64, RepoError> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .filter(|record| {
                filter
                    .search
                    .as_deref()
                    .is_none_or(|search| matches_search(record, search))
            })
            .count() as u64)
    }

    async fn count_matching(&self, filters: &[ColumnFilter]) -> Result<i64, RepoError> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .filter(|record| {
                filters.iter().all(|filter| {
                    filter
                        .values
                        .contains(&column_value(record, filter.column))
                })
            })
            .count() as i64)
    }

    async fn insert_securities(&self, records: &[SecurityRecord]) -> Result<u64, RepoError> {
        let mut stored = self.records.lock().await;
        stored.extend(records.iter().cloned());
        Ok(records.len() as u64)
    }
}

#[derive(Default)]
struct MemoryDocumentsRepo {
    documents: Mutex<Vec<GuidelineDocumentRecord>>,
}

#[async_trait]
impl DocumentsRepo for MemoryDocumentsRepo {
    async fn insert_document(
        &self,
        document: NewGuidelineDocument,
    ) -> Result<GuidelineDocumentRecord, RepoError> {
        let record = GuidelineDocumentRecord {
            id: Uuid::new_v4(),
            project_id: document.project_id,
            filename: document.filename,
            body: document.body,
            extracted_rules: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.documents.lock().await.push(record.clone());
        Ok(record)
    }

    async fn set_document_extraction(
        &self,
        id: Uuid,
        sections: &[RawRuleSection],
    ) -> Result<(), RepoError> {
        let mut documents = self.documents.lock().await;
        let document = documents
            .iter_mut()
            .find(|document| document.id == id)
            .ok_or(RepoError::NotFound)?;
        document.extracted_rules = sections.to_vec();
        Ok(())
    }

    async fn list_documents_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<GuidelineDocumentRecord>, RepoError> {
        Ok(self
            .documents
            .lock()
            .await
            .iter()
            .filter(|document| document.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn latest_document_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Option<GuidelineDocumentRecord>, RepoError> {
        Ok(self
            .documents
            .lock()
            .await
            .iter()
            .filter(|document| document.project_id == project_id)
            .last()
            .cloned())
    }
}

/// Scripted agent gateway: replies come from a per-task table and every
/// outgoing message is captured for assertions.
#[derive(Default)]
struct ScriptedAgent {
    replies: HashMap<&'static str, JsonValue>,
    sent: Mutex<Vec<AgentMessage>>,
}

impl ScriptedAgent {
    fn with_reply(mut self, task: AgentTask, reply: JsonValue) -> Self {
        self.replies.insert(task.as_str(), reply);
        self
    }
}

#[async_trait]
impl AgentGateway for ScriptedAgent {
    fn is_configured(&self, task: AgentTask) -> bool {
        self.replies.contains_key(task.as_str())
    }

    async fn send(&self, message: AgentMessage) -> Result<JsonValue, AgentError> {
        let reply = self
            .replies
            .get(message.task.as_str())
            .cloned()
            .ok_or(AgentError::NotConfigured {
                task: message.task.as_str(),
            });
        self.sent.lock().await.push(message);
        reply
    }
}

struct TestHarness {
    state: ApiState,
    projects_repo: Arc<MemoryProjectsRepo>,
    securities_repo: Arc<MemorySecuritiesRepo>,
    agent: Arc<ScriptedAgent>,
}

fn build_harness(agent: ScriptedAgent) -> TestHarness {
    let projects_repo = Arc::new(MemoryProjectsRepo::default());
    let securities_repo = Arc::new(MemorySecuritiesRepo::default());
    let documents_repo = Arc::new(MemoryDocumentsRepo::default());
    let agent = Arc::new(agent);

    let projects = Arc::new(ProjectService::new(projects_repo.clone()));
    let securities = Arc::new(SecurityService::new(securities_repo.clone()));
    let workflow = Arc::new(ConstraintWorkflowService::new(
        projects.as_ref().clone(),
        documents_repo,
        agent.clone(),
    ));
    let comparison = Arc::new(RulesDiffService::new(
        projects.as_ref().clone(),
        agent.clone(),
    ));
    let simulation = Arc::new(SimulationService::new(
        projects.as_ref().clone(),
        securities_repo.clone(),
    ));

    let state = ApiState {
        projects,
        securities,
        workflow,
        comparison,
        simulation,
        rate_limiter: Arc::new(ApiRateLimiter::new(Duration::from_secs(60), 1_000)),
    };

    TestHarness {
        state,
        projects_repo,
        securities_repo,
        agent,
    }
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn security(isin: &str, name: &str, country: &str, rating: &str, sector: &str) -> SecurityRecord {
    SecurityRecord {
        id: Uuid::new_v4(),
        isin: isin.into(),
        cusip: "037833100".into(),
        figi: "BBG000B9XRY4".into(),
        ticker: "TCK".into(),
        security_name: name.into(),
        issuer_name: "Issuer Plc".into(),
        issuer_country: country.into(),
        country_of_risk: country.into(),
        instrument_type: "Corporate Bond".into(),
        seniority: "Senior".into(),
        currency: "USD".into(),
        coupon_type: "Fixed".into(),
        coupon_rate: 4.25,
        issue_date: "2020-01-15".into(),
        maturity_date: "2030-01-15".into(),
        days_to_maturity: 1600,
        rating_sp: rating.into(),
        rating_moodys: rating.into(),
        rating_fitch: rating.into(),
        composite_rating: rating.into(),
        ig_flag: "Yes".into(),
        developed_market: "Yes".into(),
        sector: sector.into(),
        index_member: "Yes".into(),
        approved_index: "Yes".into(),
        callable: "No".into(),
        putable: "No".into(),
        subordinated_flag: "No".into(),
        esg_exclusion: "No".into(),
        shariah_compliant: "No".into(),
        created_at: OffsetDateTime::now_utc(),
    }
}

// -------- Projects --------

#[tokio::test]
async fn create_project_trims_and_validates() {
    let harness = build_harness(ScriptedAgent::default());

    let response = handlers::create_project(
        State(harness.state.clone()),
        Json(ProjectCreateRequest {
            name: "  Global Bond Mandate  ".into(),
            customer_id: " cust-1 ".into(),
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::CREATED);

    let created: sentinel_api_types::ProjectSummary = body_json(response).await;
    assert_eq!(created.name, "Global Bond Mandate");
    assert_eq!(created.customer_id, "cust-1");
    assert_eq!(created.rulesets_count, 0);

    let blank = handlers::create_project(
        State(harness.state.clone()),
        Json(ProjectCreateRequest {
            name: "   ".into(),
            customer_id: "cust-2".into(),
        }),
    )
    .await
    .into_response();
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let duplicate = handlers::create_project(
        State(harness.state.clone()),
        Json(ProjectCreateRequest {
            name: "Another".into(),
            customer_id: "cust-1".into(),
        }),
    )
    .await
    .into_response();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn list_projects_reports_latest_ruleset() {
    let harness = build_harness(ScriptedAgent::default());

    let created = harness
        .projects_repo
        .insert_project(CreateProjectParams {
            name: "Mandate".into(),
            customer_id: "cust-1".into(),
        })
        .await
        .unwrap();
    let ruleset = Ruleset {
        version: 1,
        version_name: "v1".into(),
        created_at: OffsetDateTime::now_utc(),
        data: Default::default(),
    };
    harness
        .projects_repo
        .update_rulesets(created.id, &[ruleset])
        .await
        .unwrap();

    let response = handlers::list_projects(State(harness.state.clone()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let listed: ProjectListResponse = body_json(response).await;
    assert_eq!(listed.projects.len(), 1);
    assert_eq!(listed.projects[0].rulesets_count, 1);
    assert_eq!(
        listed.projects[0]
            .latest_ruleset
            .as_ref()
            .unwrap()
            .version_name,
        "v1"
    );
}

#[tokio::test]
async fn unknown_project_is_not_found() {
    let harness = build_harness(ScriptedAgent::default());
    let response = handlers::get_project(State(harness.state.clone()), Path(Uuid::new_v4()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// -------- Securities --------

#[tokio::test]
async fn securities_list_clamps_pagination_and_sorts() {
    let harness = build_harness(ScriptedAgent::default());
    harness
        .securities_repo
        .insert_securities(&[
            security("US0002", "Beta Note", "US", "AA", "Financials"),
            security("US0001", "Alpha Bond", "US", "BBB", "Energy"),
            security("GB0003", "Gamma Gilt", "GB", "A", "Utilities"),
        ])
        .await
        .unwrap();

    let response = handlers::list_securities(
        State(harness.state.clone()),
        Query(handlers_query(json!({
            "limit": 500,
            "page": 0,
            "sortBy": "definitely_not_a_column",
        }))),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let listed: SecurityListResponse = body_json(response).await;
    assert_eq!(listed.pagination.limit, 100);
    assert_eq!(listed.pagination.page, 1);
    assert_eq!(listed.pagination.total_count, 3);
    // Unknown sort column falls back to ISIN ascending.
    let isins: Vec<&str> = listed
        .securities
        .iter()
        .map(|security| security.isin.as_str())
        .collect();
    assert_eq!(isins, ["GB0003", "US0001", "US0002"]);
}

#[tokio::test]
async fn securities_search_filters_by_substring() {
    let harness = build_harness(ScriptedAgent::default());
    harness
        .securities_repo
        .insert_securities(&[
            security("US0001", "Alpha Bond", "US", "AA", "Energy"),
            security("US0002", "Beta Note", "US", "AA", "Energy"),
        ])
        .await
        .unwrap();

    let response = handlers::list_securities(
        State(harness.state.clone()),
        Query(handlers_query(json!({ "search": "alpha" }))),
    )
    .await
    .into_response();
    let listed: SecurityListResponse = body_json(response).await;
    assert_eq!(listed.pagination.total_count, 1);
    assert_eq!(listed.securities[0].security_name, "Alpha Bond");
}

fn handlers_query(value: JsonValue) -> handlers::SecuritiesQuery {
    serde_json::from_value(value).unwrap()
}

// -------- Agent workflow --------

fn mapped_rules_reply() -> JsonValue {
    // Wrapped reply with a fenced payload, as the mapping agent answers.
    json!({
        "response": "```json\n{\"mapped_rules\": [{\"constraint\": \"Country Restriction\", \"sentinel_allowed_values\": [\"US\", \"GB\"], \"rules\": [\"No sanctioned jurisdictions\"]}]}\n```"
    })
}

#[tokio::test]
async fn rules_to_column_appends_a_version() {
    let agent = ScriptedAgent::default().with_reply(AgentTask::RulesToColumn, mapped_rules_reply());
    let harness = build_harness(agent);
    let project = harness
        .projects_repo
        .insert_project(CreateProjectParams {
            name: "Mandate".into(),
            customer_id: "cust-1".into(),
        })
        .await
        .unwrap();

    let response = handlers::rules_to_column(
        State(harness.state.clone()),
        Json(RulesToColumnRequest {
            project_id: project.id,
            customer_id: "cust-1".into(),
            rules_extractor_response: json!({
                "rules": [{"title": "Countries", "rules": ["No sanctioned jurisdictions"]}]
            }),
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let mapped: RulesToColumnResponse = body_json(response).await;
    assert_eq!(mapped.version, 1);
    assert_eq!(mapped.version_name, "v1");
    assert_eq!(mapped.mapped_rules.len(), 1);
    assert_eq!(mapped.mapped_rules[0].constraint, "Country Restriction");

    // The version persisted with both the raw sections and the mapping.
    let stored = harness
        .projects_repo
        .find_project(project.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.rulesets.len(), 1);
    assert_eq!(stored.rulesets[0].data.raw_rules.len(), 1);
    assert_eq!(stored.rulesets[0].data.mapped_rules.len(), 1);

    // The agent session is scoped by customer id.
    let sent = harness.agent.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].session_id, "cust-1");
}

#[tokio::test]
async fn rules_to_column_rejects_mismatched_customer() {
    let agent = ScriptedAgent::default().with_reply(AgentTask::RulesToColumn, mapped_rules_reply());
    let harness = build_harness(agent);
    let project = harness
        .projects_repo
        .insert_project(CreateProjectParams {
            name: "Mandate".into(),
            customer_id: "cust-1".into(),
        })
        .await
        .unwrap();

    let response = handlers::rules_to_column(
        State(harness.state.clone()),
        Json(RulesToColumnRequest {
            project_id: project.id,
            customer_id: "someone-else".into(),
            rules_extractor_response: json!({"rules": []}),
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn gap_analysis_uses_company_catalog_and_saves_findings() {
    let gap_reply = json!({
        "mapped_rules": [{
            "constraint": "Country Restriction",
            "pdf_value": ["US"],
            "fidessa_value": ["US", "GB"],
            "delta": "GB present in catalog but not allowed by the document",
            "matched": false
        }]
    });
    let agent = ScriptedAgent::default().with_reply(AgentTask::GapAnalysis, gap_reply);
    let harness = build_harness(agent);

    let project = harness
        .projects_repo
        .insert_project(CreateProjectParams {
            name: "Mandate".into(),
            customer_id: "cust-1".into(),
        })
        .await
        .unwrap();
    harness
        .projects_repo
        .update_selected_company(
            project.id,
            &SelectedCompany {
                company_id: "acme".into(),
                company_name: "Acme Asset Mgmt".into(),
                fidessa_catalog: BTreeMap::from([(
                    "Issuer_Country".to_owned(),
                    "US, GB, FR".to_owned(),
                )]),
            },
        )
        .await
        .unwrap();
    harness
        .projects_repo
        .update_rulesets(
            project.id,
            &[Ruleset {
                version: 1,
                version_name: "v1".into(),
                created_at: OffsetDateTime::now_utc(),
                data: Default::default(),
            }],
        )
        .await
        .unwrap();

    let response = handlers::gap_analysis(
        State(harness.state.clone()),
        Json(sentinel_api_types::GapAnalysisRequest {
            project_id: project.id,
            customer_id: "cust-1".into(),
            rules_to_column_response: json!({"mapped_rules": []}),
            fidessa_catalog: None,
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let analysis: GapAnalysisResponse = body_json(response).await;
    assert_eq!(analysis.mapped_rules.len(), 1);
    assert!(!analysis.mapped_rules[0].matched);

    // The company catalog travelled as an agent prompt variable.
    let sent = harness.agent.sent.lock().await;
    let variables = sent[0].prompt_variables.as_ref().unwrap();
    assert!(variables["fidessa_catalog"].contains("Issuer_Country"));
    drop(sent);

    // Findings attached to the latest version.
    let stored = harness
        .projects_repo
        .find_project(project.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.rulesets[0].data.gap_analysis.len(), 1);
}

// -------- Version diff --------

#[tokio::test]
async fn rules_diff_compares_inline_versions_locally() {
    // No diff agent configured: the deterministic engine answers.
    let harness = build_harness(ScriptedAgent::default());
    let project = harness
        .projects_repo
        .insert_project(CreateProjectParams {
            name: "Mandate".into(),
            customer_id: "cust-1".into(),
        })
        .await
        .unwrap();

    let request = RulesDiffRequest {
        project_id: project.id,
        customer_id: "cust-1".into(),
        rules_extractor_response: None,
        versions: Some(vec![
            version_payload(1, "v1", &["No tobacco issuers", "Max 5% per issuer"]),
            version_payload(2, "v2", &["No tobacco issuers", "Max 3% per issuer"]),
        ]),
    };

    let response = handlers::rules_diff(State(harness.state.clone()), Json(request))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let diff: RulesDiffResponse = body_json(response).await;
    assert_eq!(diff.versions.len(), 2);
    assert_eq!(diff.comparisons.len(), 1);
    let tags: Vec<&str> = diff.comparisons[0]
        .results
        .iter()
        .map(|result| result.tag.as_str())
        .collect();
    assert_eq!(tags, ["unchanged", "modified"]);
}

#[tokio::test]
async fn rules_diff_normalizes_agent_tags() {
    let agent_reply = json!({
        "versions": [],
        "comparisons": [{
            "from": "v1",
            "to": "v2",
            "results": [
                {"tag": "ADDED", "previous": null, "current": "New rule"},
                {"tag": "gibberish", "previous": "Old", "current": "Old"}
            ]
        }]
    });
    let agent = ScriptedAgent::default().with_reply(AgentTask::RulesDiff, agent_reply);
    let harness = build_harness(agent);
    let project = harness
        .projects_repo
        .insert_project(CreateProjectParams {
            name: "Mandate".into(),
            customer_id: "cust-1".into(),
        })
        .await
        .unwrap();

    let request = RulesDiffRequest {
        project_id: project.id,
        customer_id: "cust-1".into(),
        rules_extractor_response: None,
        versions: Some(vec![
            version_payload(1, "v1", &["Old"]),
            version_payload(2, "v2", &["Old", "New rule"]),
        ]),
    };

    let response = handlers::rules_diff(State(harness.state.clone()), Json(request))
        .await
        .into_response();
    let diff: RulesDiffResponse = body_json(response).await;

    let results = &diff.comparisons[0].results;
    assert_eq!(results[0].tag, "added");
    // Malformed tags default to unchanged.
    assert_eq!(results[1].tag, "unchanged");
    // Version metadata comes from the request, not the agent.
    assert_eq!(diff.versions.len(), 2);
}

#[tokio::test]
async fn rules_diff_without_versions_requires_extractor_response() {
    let harness = build_harness(ScriptedAgent::default());
    let project = harness
        .projects_repo
        .insert_project(CreateProjectParams {
            name: "Mandate".into(),
            customer_id: "cust-1".into(),
        })
        .await
        .unwrap();

    let response = handlers::rules_diff(
        State(harness.state.clone()),
        Json(RulesDiffRequest {
            project_id: project.id,
            customer_id: "cust-1".into(),
            rules_extractor_response: None,
            versions: None,
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rules_diff_with_no_stored_versions_is_not_found() {
    let harness = build_harness(ScriptedAgent::default());
    let project = harness
        .projects_repo
        .insert_project(CreateProjectParams {
            name: "Mandate".into(),
            customer_id: "cust-1".into(),
        })
        .await
        .unwrap();

    let response = handlers::rules_diff(
        State(harness.state.clone()),
        Json(RulesDiffRequest {
            project_id: project.id,
            customer_id: "cust-1".into(),
            rules_extractor_response: Some(json!([{"title": "T", "rules": ["R"]}])),
            versions: None,
        }),
    )
    .await
    .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

fn version_payload(
    version: i32,
    name: &str,
    rules: &[&str],
) -> sentinel_api_types::VersionPayload {
    sentinel_api_types::VersionPayload {
        version,
        version_name: name.into(),
        created_at: OffsetDateTime::now_utc(),
        raw_rules: vec![sentinel_api_types::RawRuleSectionDto {
            title: "General".into(),
            rules: rules.iter().map(|rule| rule.to_string()).collect(),
        }],
    }
}

// -------- Simulation --------

#[tokio::test]
async fn funnel_counts_narrow_monotonically() {
    let harness = build_harness(ScriptedAgent::default());
    harness
        .securities_repo
        .insert_securities(&[
            security("US0001", "Alpha Bond", "US", "AA", "Energy"),
            security("US0002", "Beta Note", "US", "BBB", "Financials"),
            security("GB0003", "Gamma Gilt", "GB", "AA", "Utilities"),
        ])
        .await
        .unwrap();

    let project = harness
        .projects_repo
        .insert_project(CreateProjectParams {
            name: "Mandate".into(),
            customer_id: "cust-1".into(),
        })
        .await
        .unwrap();
    harness
        .projects_repo
        .update_rulesets(
            project.id,
            &[Ruleset {
                version: 1,
                version_name: "v1".into(),
                created_at: OffsetDateTime::now_utc(),
                data: serde_json::from_value(json!({
                    "mapped_rules": [
                        {"constraint": "Country Restriction", "sentinel_allowed_values": ["US"], "rules": []},
                        {"constraint": "Credit Rating Filter", "sentinel_allowed_values": ["AA"], "rules": []},
                        {"constraint": "Liquidity buffer policy", "sentinel_allowed_values": ["n/a"], "rules": []}
                    ]
                }))
                .unwrap(),
            }],
        )
        .await
        .unwrap();

    let response = handlers::project_funnel(State(harness.state.clone()), Path(project.id))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);

    let funnel: FunnelResponse = body_json(response).await;
    // Start + three constraints + tradable universe.
    assert_eq!(funnel.stages.len(), 5);
    assert_eq!(funnel.stages[0].count, 3);
    assert_eq!(funnel.stages[1].count, 2); // US only
    assert_eq!(funnel.stages[2].count, 1); // US and AA
    // The unresolvable constraint passes the universe through.
    assert_eq!(funnel.stages[3].count, 1);
    assert_eq!(funnel.stages[4].count, 1);

    let counts: Vec<i64> = funnel.stages.iter().map(|stage| stage.count).collect();
    assert!(counts.windows(2).all(|pair| pair[1] <= pair[0]));
}

#[tokio::test]
async fn funnel_without_mapped_rules_is_not_found() {
    let harness = build_harness(ScriptedAgent::default());
    let project = harness
        .projects_repo
        .insert_project(CreateProjectParams {
            name: "Mandate".into(),
            customer_id: "cust-1".into(),
        })
        .await
        .unwrap();

    let response = handlers::project_funnel(State(harness.state.clone()), Path(project.id))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
