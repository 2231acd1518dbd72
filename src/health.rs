use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::chains::ChainProbe;
use crate::services::{JobStatus, JobStatusBoard};

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: HashMap<String, DependencyStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<JobStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

impl DependencyStatus {
    fn healthy(start: Instant) -> Self {
        DependencyStatus::Healthy {
            status: "healthy".to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn unhealthy(error: impl ToString) -> Self {
        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error: error.to_string(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, DependencyStatus::Healthy { .. })
    }
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    async fn check(&self) -> DependencyStatus;
}

pub struct PostgresChecker {
    pool: sqlx::PgPool,
}

impl PostgresChecker {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyChecker for PostgresChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e),
        }
    }
}

/// Healthy when the node answers a height query.
pub struct ChainChecker {
    probe: Arc<dyn ChainProbe>,
}

impl ChainChecker {
    pub fn new(probe: Arc<dyn ChainProbe>) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl DependencyChecker for ChainChecker {
    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match self.probe.latest_height().await {
            Ok(_) => DependencyStatus::healthy(start),
            Err(e) => DependencyStatus::unhealthy(e),
        }
    }
}

struct Dependency {
    name: String,
    critical: bool,
    checker: Arc<dyn DependencyChecker>,
}

/// Shared state behind `/health`.
#[derive(Clone)]
pub struct HealthState {
    dependencies: Arc<Vec<Dependency>>,
    jobs: Option<JobStatusBoard>,
    start_time: Instant,
}

impl HealthState {
    pub fn builder() -> HealthStateBuilder {
        HealthStateBuilder::default()
    }
}

#[derive(Default)]
pub struct HealthStateBuilder {
    dependencies: Vec<Dependency>,
    jobs: Option<JobStatusBoard>,
}

impl HealthStateBuilder {
    /// A failing critical dependency makes the service unhealthy; any other
    /// failure only degrades it.
    pub fn dependency(
        mut self,
        name: impl Into<String>,
        critical: bool,
        checker: Arc<dyn DependencyChecker>,
    ) -> Self {
        self.dependencies.push(Dependency {
            name: name.into(),
            critical,
            checker,
        });
        self
    }

    /// Reports scheduled job status alongside the dependencies.
    pub fn jobs(mut self, board: JobStatusBoard) -> Self {
        self.jobs = Some(board);
        self
    }

    pub fn build(self) -> HealthState {
        HealthState {
            dependencies: Arc::new(self.dependencies),
            jobs: self.jobs,
            start_time: Instant::now(),
        }
    }
}

pub async fn check_health(state: &HealthState) -> HealthResponse {
    let results = futures::future::join_all(state.dependencies.iter().map(|dep| async move {
        let status = timeout(CHECK_TIMEOUT, dep.checker.check())
            .await
            .unwrap_or_else(|_| DependencyStatus::unhealthy("timeout"));
        (dep, status)
    }))
    .await;

    let mut has_critical_failure = false;
    let mut has_non_critical_failure = false;
    let mut dependencies = HashMap::new();

    for (dep, status) in results {
        if !status.is_healthy() {
            if dep.critical {
                has_critical_failure = true;
            } else {
                has_non_critical_failure = true;
            }
        }
        dependencies.insert(dep.name.clone(), status);
    }

    let status = if has_critical_failure {
        "unhealthy"
    } else if has_non_critical_failure {
        "degraded"
    } else {
        "healthy"
    };

    let jobs = match &state.jobs {
        Some(board) => board.snapshot().await,
        None => Vec::new(),
    };

    HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        dependencies,
        jobs,
    }
}

pub async fn health(State(state): State<HealthState>) -> impl IntoResponse {
    let response = check_health(&state).await;

    // Degraded still serves: the ledger store is reachable.
    let status_code = if response.status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(response))
}

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(state)
}
