mod cli;
mod output;

use crate::cli::{Cli, Command, SweepKind};
use crate::output::{DeletedView, PageView, ReportView, ScanView};
use clap::Parser;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;
use timekeeper_config::{Config, Role};
use timekeeper_lifecycle::{
    BackoffGate, ClockHandle, DedupPolicy, ScanService, StatusStage, SubmissionStage, Sweeper, SystemClock,
    spawn_sweeper,
};
use timekeeper_provider::{ProviderHandle, UrlScanClient};
use timekeeper_store::{Database, Repository, StoreHandle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Error trees from the library crates are printed with their full context.
fn report(err: impl Debug) -> miette::Report {
    miette::miette!("{err:?}")
}

fn print(view: &impl Serialize) -> miette::Result<()> {
    let rendered = serde_json::to_string_pretty(view).map_err(report)?;
    println!("{rendered}");
    Ok(())
}

struct App {
    config: Config,
    db: Database,
    store: StoreHandle,
    clock: ClockHandle,
}

impl App {
    async fn start(cli: &Cli) -> miette::Result<Self> {
        let config = Config::load(cli.config.as_deref()).map_err(report)?;
        if let Some(parent) = config.database.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(report)?;
        }
        let db = Database::connect(&config.database.path).await.map_err(report)?;
        let store: StoreHandle = Arc::new(Repository::from(&db));
        Ok(Self {
            config,
            db,
            store,
            clock: Arc::new(SystemClock),
        })
    }

    fn service(&self) -> ScanService {
        let policy = DedupPolicy::new(self.config.scan.dedupe_window());
        ScanService::new(Arc::clone(&self.store), Arc::clone(&self.clock), policy)
    }

    fn provider(&self) -> miette::Result<ProviderHandle> {
        if self.config.provider.api_key.is_empty() {
            tracing::warn!("No provider API key configured; submissions will likely be rejected");
        }
        let client = UrlScanClient::new(self.config.provider.client_options()).map_err(report)?;
        Ok(Arc::new(client))
    }

    fn submission_sweeper(&self, provider: ProviderHandle) -> Arc<Sweeper<SubmissionStage>> {
        let stage = SubmissionStage::new(provider, self.config.sweep.fallback_backoff());
        Arc::new(Sweeper::new(Arc::clone(&self.store), Arc::new(BackoffGate::new()), stage))
    }

    fn status_sweeper(&self, provider: ProviderHandle) -> Arc<Sweeper<StatusStage>> {
        let stage = StatusStage::new(provider, self.config.sweep.fallback_backoff());
        Arc::new(Sweeper::new(Arc::clone(&self.store), Arc::new(BackoffGate::new()), stage))
    }

    async fn run(&self, roles: Vec<Role>) -> miette::Result<()> {
        let requested = if roles.is_empty() { self.config.roles.clone() } else { roles };
        let mut roles = Vec::with_capacity(requested.len());
        for role in requested {
            if !roles.contains(&role) {
                roles.push(role);
            }
        }
        if roles.is_empty() {
            return Err(miette::miette!("no roles to run"));
        }
        let provider = self.provider()?;
        let shutdown = CancellationToken::new();
        let mut handles = Vec::with_capacity(roles.len());
        for role in &roles {
            tracing::info!(%role, "Starting sweeper");
            let handle = match role {
                Role::Submitter => spawn_sweeper(
                    self.submission_sweeper(Arc::clone(&provider)),
                    Arc::clone(&self.clock),
                    self.config.sweep.submission_interval(),
                    shutdown.clone(),
                ),
                Role::Poller => spawn_sweeper(
                    self.status_sweeper(Arc::clone(&provider)),
                    Arc::clone(&self.clock),
                    self.config.sweep.status_interval(),
                    shutdown.clone(),
                ),
            };
            handles.push(handle);
        }

        tokio::signal::ctrl_c().await.map_err(report)?;
        tracing::info!("Shutting down; waiting for running sweeps to finish");
        shutdown.cancel();
        for result in futures::future::join_all(handles).await {
            if let Err(err) = result {
                tracing::error!(error = %err, "Sweeper task failed");
            }
        }
        Ok(())
    }

    async fn sweep(&self, kind: SweepKind) -> miette::Result<()> {
        let provider = self.provider()?;
        let now = self.clock.now();
        let view = match kind {
            SweepKind::Submission => {
                let sweeper = self.submission_sweeper(provider);
                ReportView::new("submission", &sweeper.sweep(now).await)
            },
            SweepKind::Status => {
                let sweeper = self.status_sweeper(provider);
                ReportView::new("status", &sweeper.sweep(now).await)
            },
        };
        print(&view)
    }

    async fn dispatch(&self, command: Command) -> miette::Result<()> {
        match command {
            Command::Run { roles } => self.run(roles).await,
            Command::Sweep { kind } => self.sweep(kind).await,
            Command::Create { user, url } => {
                let scan = self.service().create_scan(&user, &url).await.map_err(report)?;
                print(&ScanView::from(&scan))
            },
            Command::Get { user, id } => {
                let scan = self.service().get_scan(&user, id).await.map_err(report)?;
                print(&ScanView::from(&scan))
            },
            Command::List {
                user,
                status,
                page,
                page_size,
            } => {
                let request = ScanService::page_request(page, page_size).map_err(report)?;
                let page = self
                    .service()
                    .list_scan_summaries(&user, status, request)
                    .await
                    .map_err(report)?;
                print(&PageView::from(&page))
            },
            Command::Delete { user, id } => {
                let deleted = self.service().delete_scan(&user, id).await.map_err(report)?;
                print(&DeletedView::new(id, deleted))
            },
        }
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let app = App::start(&cli).await?;
    let result = app.dispatch(cli.command).await;
    app.db.close().await;
    result
}
