//! Per-session state: in-flight guard and lazily established connectivity.

use crate::error::RecError;
use crate::runtime::executor::Engine;
use crate::types::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Releases the in-flight flag when the run finishes or is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, RecError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RecError::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One logical session (typically one user's screen).
///
/// A session runs at most one recommendation at a time and connects to both
/// services once, before its first run.
pub struct Session {
    engine: Arc<Engine>,
    in_flight: AtomicBool,
    endpoints: OnceCell<Endpoints>,
}

impl Session {
    pub(crate) fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            in_flight: AtomicBool::new(false),
            endpoints: OnceCell::new(),
        }
    }

    /// Whether a run is currently in flight
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Endpoints, once connected
    pub fn endpoints(&self) -> Option<&Endpoints> {
        self.endpoints.get()
    }

    /// Connect both services if not already connected
    pub async fn connect(&self) -> Result<Endpoints, RecError> {
        let endpoints = self
            .endpoints
            .get_or_try_init(|| async {
                let engine = &self.engine;
                let (completion, query) = tokio::try_join!(
                    engine.bounded("connect completion", engine.completion.connect()),
                    engine.bounded("connect query", engine.query.connect()),
                )?;
                tracing::debug!("session connected: completion={}, query={}", completion, query);
                Ok::<_, RecError>(Endpoints { completion, query })
            })
            .await?;
        Ok(endpoints.clone())
    }

    /// Produce recommendations for `request`.
    ///
    /// Returns `Err` only when the run cannot start (invalid request, or a
    /// run already in flight for this session). Every started run yields an
    /// outcome carrying either ids or an error message.
    pub async fn recommend(
        &self,
        request: RecommendationRequest,
    ) -> Result<RecommendationOutcome, RecError> {
        request.check()?;
        let _guard = InFlight::acquire(&self.in_flight)?;

        let ctx = RunContext::new(
            request,
            self.engine.completion.info().id.as_str(),
            self.engine.query.info().id.as_str(),
        );
        tracing::debug!(
            "run {} started: user_id={}, top_k={}",
            ctx.run_id,
            request.user_id,
            request.top_k
        );

        let outcome = match self.connect().await {
            Ok(_) => {
                self.engine.plugin_engine.on_run_start(&ctx).await;
                self.engine.run(&ctx).await
            }
            Err(e) => {
                tracing::error!("run {} could not connect: {}", ctx.run_id, e);
                RecommendationOutcome::failed(format!("connection failed: {}", e))
            }
        };

        self.engine.plugin_engine.on_run_end(&ctx, &outcome).await;
        Ok(outcome)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("running", &self.is_running())
            .field("endpoints", &self.endpoints.get())
            .finish()
    }
}
