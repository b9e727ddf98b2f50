//! Submit/status/cancel surface over the orchestrator.

use crate::error::{PipelineError, Result};
use crate::job::JobParams;
use crate::orchestrator::PipelineOrchestrator;
use scout_core::JobId;
use scout_db::{search_jobs, DatabaseError, JobCounters, JobStatus, SearchJobRecord};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Runs jobs in the background and tracks the live ones.
///
/// Each submitted job gets a row in `search_jobs` before its task spawns, so
/// `status` answers for every job the manager has ever accepted, not just
/// the ones still in flight. Cancellation tokens are held only while a job
/// runs; cancelling a finished job is a no-op.
#[derive(Clone)]
pub struct JobManager {
    orchestrator: Arc<PipelineOrchestrator>,
    live: Arc<RwLock<HashMap<JobId, CancellationToken>>>,
}

impl JobManager {
    #[must_use]
    pub fn new(orchestrator: Arc<PipelineOrchestrator>) -> Self {
        Self {
            orchestrator,
            live: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Validate, persist, and start a job. Returns its id immediately.
    pub async fn submit(&self, params: JobParams) -> Result<JobId> {
        if params.stores.is_empty() && params.zip_code.is_none() {
            return Err(PipelineError::InvalidParams(
                "either an explicit store list or a ZIP code is required".to_string(),
            ));
        }
        if params.retailers.is_empty() {
            return Err(PipelineError::InvalidParams(
                "at least one retailer is required".to_string(),
            ));
        }

        let job_id = JobId::generate();
        search_jobs::create_search_job(
            self.orchestrator.db().pool(),
            &job_id,
            params.zip_code.as_deref(),
            params.radius_miles,
            &params.retailers,
        )
        .await?;

        let cancel = CancellationToken::new();
        self.live.write().await.insert(job_id.clone(), cancel.clone());

        let manager = self.clone();
        let id = job_id.clone();
        tokio::spawn(async move {
            if let Err(e) = manager.orchestrator.run_job(&id, &params, cancel).await {
                tracing::error!(job_id = %id, error = %e, "job aborted");
                manager.record_aborted(&id, &e).await;
            }
            manager.live.write().await.remove(&id);
        });

        Ok(job_id)
    }

    /// Current job record, terminal or not.
    pub async fn status(&self, job_id: &JobId) -> Result<SearchJobRecord> {
        search_jobs::get_search_job(self.orchestrator.db().pool(), job_id)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound(_) => PipelineError::JobNotFound(job_id.to_string()),
                other => PipelineError::Database(other),
            })
    }

    /// Request cancellation of a running job.
    ///
    /// Succeeds for any known job; a job that already reached a terminal
    /// status is left untouched.
    pub async fn cancel(&self, job_id: &JobId) -> Result<()> {
        if let Some(token) = self.live.read().await.get(job_id) {
            token.cancel();
            return Ok(());
        }
        // Not in flight. Distinguish "already finished" from "never existed".
        self.status(job_id).await.map(|_| ())
    }

    /// Mark a job Failed when its task errored out of the pipeline itself.
    async fn record_aborted(&self, job_id: &JobId, error: &PipelineError) {
        let detail = serde_json::json!([{
            "scope": "job",
            "subject": job_id.as_str(),
            "error": error.to_string(),
        }]);
        if let Err(db_err) = search_jobs::complete_search_job(
            self.orchestrator.db().pool(),
            job_id,
            JobStatus::Failed,
            &JobCounters::default(),
            Some(&detail),
        )
        .await
        {
            tracing::error!(%job_id, error = %db_err, "failed to record aborted job");
        }
    }
}
