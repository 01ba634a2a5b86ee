use std::{process, sync::Arc};

use apalis::{
    layers::WorkerBuilderExt,
    prelude::{Monitor, WorkerBuilder, WorkerFactoryFn},
};
use apalis_sql::{Config as ApalisSqlConfig, postgres::PostgresStorage};
use taskflow::{
    application::{
        commands::TaskCommandService,
        error::AppError,
        jobs::{
            SyncWorkerContext, process_task_created_job, process_task_deleted_job,
            process_task_updated_job,
        },
        queries::TaskQueryService,
        repos::{JobsRepo, TaskReadRepo, TaskWriteRepo},
        sync::ReadModelSynchronizer,
    },
    cache::{CacheConfig, CacheHandle},
    config,
    domain::types::JobType,
    infra::{
        cache as cache_backend,
        db::{self, ReadRepositories, WriteRepositories},
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
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
        config::Command::Worker(_) => run_worker(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
        config::Command::RebuildCache(_) => run_rebuild_cache(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let (write, read) = init_repositories(&settings, true).await?;
    let cache = init_cache(&settings).await?;
    let app = build_application_context(write.clone(), read, cache);

    let monitor_handle = spawn_sync_monitor(&write, app.sync_context, &settings.jobs);

    let result = serve_http(&settings, app.http_state).await;

    monitor_handle.abort();
    let _ = monitor_handle.await;

    result
}

async fn run_worker(settings: config::Settings) -> Result<(), AppError> {
    let (write, read) = init_repositories(&settings, false).await?;
    let cache_config = CacheConfig::from(&settings.cache);
    if cache_config.is_enabled() && !cache_config.uses_redis() {
        warn!(
            target = "taskflow::worker",
            "in-process cache is private to this worker; API processes will not see its writes"
        );
    }
    let cache = init_cache(&settings).await?;
    let app = build_application_context(write.clone(), read, cache);

    info!(target = "taskflow::worker", "starting read-model workers");
    build_sync_monitor(&write, app.sync_context, &settings.jobs)
        .run_with_signal(tokio::signal::ctrl_c())
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "taskflow::worker", "read-model workers stopped");
    Ok(())
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    init_repositories(&settings, true).await?;
    info!(target = "taskflow::migrate", "migrations applied");
    Ok(())
}

async fn run_rebuild_cache(settings: config::Settings) -> Result<(), AppError> {
    let read = connect_read(&settings, false).await?;
    let cache = init_cache(&settings).await?;
    if !cache.is_enabled() {
        return Err(AppError::validation(
            "rebuild-cache requires an enabled cache",
        ));
    }

    let reader: Arc<dyn TaskReadRepo> = read;
    let queries = TaskQueryService::new(reader, cache);
    let tasks = queries.rebuild_cache().await?;
    info!(
        target = "taskflow::rebuild_cache",
        tasks = tasks.len(),
        "cache rebuild completed"
    );
    Ok(())
}

struct ApplicationContext {
    http_state: HttpState,
    sync_context: SyncWorkerContext,
}

async fn init_repositories(
    settings: &config::Settings,
    migrate: bool,
) -> Result<(Arc<WriteRepositories>, Arc<ReadRepositories>), AppError> {
    let write_url = settings
        .write_database
        .require_url("write_database.url")
        .map_err(|err| InfraError::configuration(err.to_string()))?;
    let write_pool = db::connect(write_url, settings.write_database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    if migrate {
        WriteRepositories::run_migrations(&write_pool)
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    }

    let read = connect_read(settings, migrate).await?;
    Ok((Arc::new(WriteRepositories::new(write_pool)), read))
}

async fn connect_read(
    settings: &config::Settings,
    migrate: bool,
) -> Result<Arc<ReadRepositories>, AppError> {
    let read_url = settings
        .read_database
        .require_url("read_database.url")
        .map_err(|err| InfraError::configuration(err.to_string()))?;
    let read_pool = db::connect(read_url, settings.read_database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    if migrate {
        ReadRepositories::run_migrations(&read_pool)
            .await
            .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    }

    Ok(Arc::new(ReadRepositories::new(read_pool)))
}

async fn init_cache(settings: &config::Settings) -> Result<CacheHandle, AppError> {
    let config = CacheConfig::from(&settings.cache);
    cache_backend::connect(&config)
        .await
        .map_err(AppError::from)
}

fn build_application_context(
    write: Arc<WriteRepositories>,
    read: Arc<ReadRepositories>,
    cache: CacheHandle,
) -> ApplicationContext {
    let writer: Arc<dyn TaskWriteRepo> = write.clone();
    let jobs: Arc<dyn JobsRepo> = write;
    let reader: Arc<dyn TaskReadRepo> = read;

    let commands = Arc::new(TaskCommandService::new(writer, jobs));
    let queries = Arc::new(TaskQueryService::new(reader.clone(), cache.clone()));
    let synchronizer = Arc::new(ReadModelSynchronizer::new(reader, cache));

    ApplicationContext {
        http_state: HttpState { commands, queries },
        sync_context: SyncWorkerContext { synchronizer },
    }
}

fn build_sync_monitor(
    repositories: &WriteRepositories,
    context: SyncWorkerContext,
    jobs: &config::JobsSettings,
) -> Monitor {
    let storage_for = |job_type: JobType| {
        PostgresStorage::new_with_config(
            repositories.pool().clone(),
            ApalisSqlConfig::new(job_type.as_str()),
        )
    };

    let created_worker = WorkerBuilder::new("sync-task-created-worker")
        .concurrency(jobs.created_concurrency.get() as usize)
        .data(context.clone())
        .backend(storage_for(JobType::SyncTaskCreated))
        .build_fn(process_task_created_job);
    let updated_worker = WorkerBuilder::new("sync-task-updated-worker")
        .concurrency(jobs.updated_concurrency.get() as usize)
        .data(context.clone())
        .backend(storage_for(JobType::SyncTaskUpdated))
        .build_fn(process_task_updated_job);
    let deleted_worker = WorkerBuilder::new("sync-task-deleted-worker")
        .concurrency(jobs.deleted_concurrency.get() as usize)
        .data(context)
        .backend(storage_for(JobType::SyncTaskDeleted))
        .build_fn(process_task_deleted_job);

    Monitor::new()
        .register(created_worker)
        .register(updated_worker)
        .register(deleted_worker)
}

fn spawn_sync_monitor(
    repositories: &WriteRepositories,
    context: SyncWorkerContext,
    jobs: &config::JobsSettings,
) -> tokio::task::JoinHandle<()> {
    let monitor = build_sync_monitor(repositories, context, jobs);

    tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    })
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state, &settings.server.api_prefix);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "taskflow::http",
        addr = %settings.server.addr,
        api_prefix = %settings.server.api_prefix,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "taskflow::http", "shutdown signal received");
}
