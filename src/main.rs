use std::{net::SocketAddr, process, sync::Arc};

use sentinel::{
    application::{
        catalog,
        comparison::RulesDiffService,
        error::AppError,
        projects::ProjectService,
        repos::{DocumentsRepo, ProjectsRepo, SecuritiesRepo},
        securities::SecurityService,
        simulation::SimulationService,
        workflow::ConstraintWorkflowService,
    },
    config,
    infra::{
        agent::HttpAgentGateway,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiRateLimiter, ApiState, PagesState, RouterState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::ImportSecurities(args) => run_import_securities(settings, args).await,
    }
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_router_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<RouterState, AppError> {
    let projects_repo: Arc<dyn ProjectsRepo> = repositories.clone();
    let securities_repo: Arc<dyn SecuritiesRepo> = repositories.clone();
    let documents_repo: Arc<dyn DocumentsRepo> = repositories.clone();

    let agent = Arc::new(
        HttpAgentGateway::new(settings.agents.clone())
            .map_err(|err| AppError::from(InfraError::agent(err.to_string())))?,
    );

    let projects = Arc::new(ProjectService::new(projects_repo));
    let securities = Arc::new(SecurityService::new(securities_repo.clone()));
    let workflow = Arc::new(ConstraintWorkflowService::new(
        projects.as_ref().clone(),
        documents_repo.clone(),
        agent.clone(),
    ));
    let comparison = Arc::new(RulesDiffService::new(projects.as_ref().clone(), agent));
    let simulation = Arc::new(SimulationService::new(
        projects.as_ref().clone(),
        securities_repo,
    ));

    let rate_limiter = Arc::new(ApiRateLimiter::new(
        std::time::Duration::from_secs(settings.api_rate_limit.window_seconds.get() as u64),
        settings.api_rate_limit.max_requests.get(),
    ));

    let pages = PagesState {
        projects: projects.clone(),
        securities: securities.clone(),
        workflow: workflow.clone(),
        comparison: comparison.clone(),
        simulation: simulation.clone(),
        documents: documents_repo,
        db: repositories,
    };

    let api = ApiState {
        projects,
        securities,
        workflow,
        comparison,
        simulation,
        rate_limiter,
    };

    Ok(RouterState { pages, api })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let router_state = build_router_state(repositories, &settings)?;

    let router = http::build_pages_router()
        .merge(http::build_api_router(router_state.clone()))
        .with_state(router_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "sentinel::server",
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn run_import_securities(
    settings: config::Settings,
    args: config::ImportSecuritiesArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;

    info!(
        target = "sentinel::import",
        file = %args.file.display(),
        "reading security catalog"
    );

    let securities_repo: Arc<dyn SecuritiesRepo> = repositories;
    catalog::import_catalog(securities_repo, &args.file)
        .await
        .map_err(|err| AppError::unexpected(err.to_string()))?;

    Ok(())
}
