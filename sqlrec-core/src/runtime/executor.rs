//! Recommender implementation.
//!
//! This module implements the attempt state machine:
//!
//! ```text
//! Simple ──ok──────────────────────────────▶ done
//!   │ retryable failure        other failure
//!   ▼                               │
//! Guided ──ok──▶ done               │
//!   │ any failure                   │
//!   ▼                               ▼
//! Fallback ──ok──▶ done      failure ──▶ error outcome
//! ```

use crate::error::RecError;
use crate::layer::Layer;
use crate::pipeline::{extract_any, parse, validate, CatalogSchema, FallbackQueryBuilder};
use crate::plugin::{Plugin, PluginEngine};
use crate::runtime::policy::RetryPolicy;
use crate::runtime::session::Session;
use crate::service::{CompletionService, QueryService};
use crate::strategy::{GuidedPrompt, PromptContext, PromptStrategy, SimplePrompt};
use crate::types::*;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Type-erased services that can be shared across sessions
type BoxedCompletion = Arc<dyn CompletionService>;
type BoxedQuery = Arc<dyn QueryService>;

/// Default bound on a single network call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Builder for composing a recommender from its two services.
///
/// - Layers wrap a service (static dispatch during building)
/// - Plugins observe runs (stored for execution)
///
/// # Example
///
/// ```ignore
/// let recommender = Recommender::builder(openai, sql_endpoint)
///     .completion_layer(LoggingLayer::new())
///     .query_layer(RetryLayer::new())
///     .plugin(Arc::new(AttemptLogPlugin::new()))
///     .finish();
///
/// let session = recommender.session();
/// let outcome = session.recommend(RecommendationRequest::new(42, 5)?).await?;
/// ```
pub struct RecommenderBuilder<C, Q> {
    completion: C,
    query: Q,
    plugins: Vec<Arc<dyn Plugin>>,
    policy: RetryPolicy,
    fallback: FallbackQueryBuilder,
    call_timeout: Duration,
    simple_prompt: Box<dyn PromptStrategy>,
    guided_prompt: Box<dyn PromptStrategy>,
}

impl<C: CompletionService, Q: QueryService> RecommenderBuilder<C, Q> {
    /// Create a new builder with both services
    pub fn new(completion: C, query: Q) -> Self {
        Self {
            completion,
            query,
            plugins: Vec::new(),
            policy: RetryPolicy::default(),
            fallback: FallbackQueryBuilder::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            simple_prompt: Box::new(SimplePrompt),
            guided_prompt: Box::new(GuidedPrompt::new()),
        }
    }

    /// Add a layer around the completion service
    pub fn completion_layer<L>(self, layer: L) -> RecommenderBuilder<L::Layered, Q>
    where
        L: Layer<C>,
        L::Layered: CompletionService,
    {
        RecommenderBuilder {
            completion: layer.layer(self.completion),
            query: self.query,
            plugins: self.plugins,
            policy: self.policy,
            fallback: self.fallback,
            call_timeout: self.call_timeout,
            simple_prompt: self.simple_prompt,
            guided_prompt: self.guided_prompt,
        }
    }

    /// Add a layer around the query service
    pub fn query_layer<L>(self, layer: L) -> RecommenderBuilder<C, L::Layered>
    where
        L: Layer<Q>,
        L::Layered: QueryService,
    {
        RecommenderBuilder {
            completion: self.completion,
            query: layer.layer(self.query),
            plugins: self.plugins,
            policy: self.policy,
            fallback: self.fallback,
            call_timeout: self.call_timeout,
            simple_prompt: self.simple_prompt,
            guided_prompt: self.guided_prompt,
        }
    }

    /// Add a plugin
    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Set the retry policy for failed simple attempts
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the catalog schema used by the fallback query
    pub fn catalog(mut self, schema: CatalogSchema) -> Self {
        self.fallback = FallbackQueryBuilder::new(schema);
        self
    }

    /// Set the bound on each completion/query call
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Replace the first-attempt prompt strategy
    pub fn simple_prompt(mut self, strategy: Box<dyn PromptStrategy>) -> Self {
        self.simple_prompt = strategy;
        self
    }

    /// Replace the retry prompt strategy
    pub fn guided_prompt(mut self, strategy: Box<dyn PromptStrategy>) -> Self {
        self.guided_prompt = strategy;
        self
    }

    /// Finish building and create a Recommender
    pub fn finish(self) -> Recommender {
        Recommender {
            engine: Arc::new(Engine {
                completion: Arc::new(self.completion),
                query: Arc::new(self.query),
                plugin_engine: PluginEngine::new(self.plugins),
                policy: self.policy,
                fallback: self.fallback,
                call_timeout: self.call_timeout,
                simple_prompt: self.simple_prompt,
                guided_prompt: self.guided_prompt,
            }),
        }
    }
}

/// Shareable recommendation engine.
///
/// Cloning is cheap. Runs happen through [`Session`]s; sessions of different
/// users share this engine and nothing else.
#[derive(Clone)]
pub struct Recommender {
    engine: Arc<Engine>,
}

impl Recommender {
    /// Create a new builder
    pub fn builder<C: CompletionService, Q: QueryService>(
        completion: C,
        query: Q,
    ) -> RecommenderBuilder<C, Q> {
        RecommenderBuilder::new(completion, query)
    }

    /// Open a new session (its own in-flight guard and connection state)
    pub fn session(&self) -> Session {
        Session::new(self.engine.clone())
    }

    /// Get the retry policy
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.engine.policy
    }

    /// Get reference to the plugin engine
    pub fn plugin_engine(&self) -> &PluginEngine {
        &self.engine.plugin_engine
    }
}

/// Immutable state shared by every session of a recommender.
pub(crate) struct Engine {
    pub(crate) completion: BoxedCompletion,
    pub(crate) query: BoxedQuery,
    pub(crate) plugin_engine: PluginEngine,
    policy: RetryPolicy,
    fallback: FallbackQueryBuilder,
    pub(crate) call_timeout: Duration,
    simple_prompt: Box<dyn PromptStrategy>,
    guided_prompt: Box<dyn PromptStrategy>,
}

/// What a stage got as far as producing
#[derive(Default)]
struct StageTrace {
    answer: Option<String>,
    sql: Option<String>,
}

impl Engine {
    /// Await `fut`, turning an elapsed bound into a timeout error
    pub(crate) async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T, RecError>
    where
        F: Future<Output = Result<T, RecError>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(RecError::timeout(format!(
                "{} call exceeded {:?}",
                what, self.call_timeout
            ))),
        }
    }

    /// Run the state machine for one request. Never fails: terminal errors
    /// end up in the outcome.
    pub(crate) async fn run(&self, ctx: &RunContext) -> RecommendationOutcome {
        let req = ctx.request;
        let mut outcome = RecommendationOutcome::default();

        let simple_ctx = PromptContext::new(&req);
        let mut trace = StageTrace::default();
        let first = self
            .attempt(ctx, &*self.simple_prompt, &simple_ctx, &mut trace)
            .await;

        match first {
            Ok(ids) => return Self::succeed(outcome, trace, Stage::Simple, ids),
            Err(err) => {
                let retryable = self.policy.is_retryable(&err);
                self.fail_stage(ctx, &mut outcome, trace, Stage::Simple, &err, retryable)
                    .await;

                if retryable {
                    tracing::warn!(
                        "run {} simple attempt failed with retryable error, retrying guided: {}",
                        ctx.run_id,
                        err
                    );
                    let hint = err.to_string();
                    let guided_ctx = PromptContext::new(&req).with_error_hint(&hint);
                    let mut trace = StageTrace::default();
                    match self
                        .attempt(ctx, &*self.guided_prompt, &guided_ctx, &mut trace)
                        .await
                    {
                        Ok(ids) => return Self::succeed(outcome, trace, Stage::Guided, ids),
                        Err(err) => {
                            tracing::warn!(
                                "run {} guided attempt failed, falling back: {}",
                                ctx.run_id,
                                err
                            );
                            self.fail_stage(ctx, &mut outcome, trace, Stage::Guided, &err, false)
                                .await;
                        }
                    }
                } else {
                    tracing::warn!(
                        "run {} simple attempt failed, falling back: {}",
                        ctx.run_id,
                        err
                    );
                }
            }
        }

        self.run_fallback(ctx, outcome).await
    }

    /// One model attempt: prompt, completion, extraction, validation, execution.
    async fn attempt(
        &self,
        ctx: &RunContext,
        strategy: &dyn PromptStrategy,
        prompt_ctx: &PromptContext<'_>,
        trace: &mut StageTrace,
    ) -> Result<Vec<i64>, RecError> {
        let prompt = strategy.render(prompt_ctx);
        tracing::debug!(
            "run {} asking model with {} ({} chars)",
            ctx.run_id,
            strategy.name(),
            prompt.len()
        );

        let answer = self
            .bounded("completion", self.completion.ask(&prompt))
            .await?;
        trace.answer = Some(answer.clone());

        let candidate = extract_any(&answer).ok_or(RecError::NoSqlFound)?;
        trace.sql = Some(candidate.as_str().to_string());

        let sql = validate(candidate)?;
        self.execute(ctx, &sql).await
    }

    async fn execute(&self, ctx: &RunContext, sql: &ValidatedSql) -> Result<Vec<i64>, RecError> {
        let response = self
            .bounded("query", self.query.execute_sql(sql.as_str()))
            .await?;
        let ids = parse(&response);
        tracing::debug!(
            "run {} query returned {} rows, {} ids",
            ctx.run_id,
            response.rows.len(),
            ids.len()
        );

        if ids.is_empty() {
            return Err(RecError::EmptyResult);
        }
        Ok(ids)
    }

    async fn run_fallback(
        &self,
        ctx: &RunContext,
        mut outcome: RecommendationOutcome,
    ) -> RecommendationOutcome {
        let req = ctx.request;
        let candidate = self.fallback.build(req.user_id, req.top_k);
        let trace = StageTrace {
            answer: None,
            sql: Some(candidate.as_str().to_string()),
        };

        let result = match validate(candidate) {
            Ok(sql) => self.execute(ctx, &sql).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(ids) => Self::succeed(outcome, trace, Stage::Fallback, ids),
            Err(err) => {
                self.fail_stage(ctx, &mut outcome, trace, Stage::Fallback, &err, false)
                    .await;
                let err = RecError::fallback_exhausted(err.to_string());
                tracing::error!("run {} ended without recommendations: {}", ctx.run_id, err);
                outcome.recommended_ids.clear();
                outcome.source = None;
                outcome.error = Some(err.to_string());
                outcome
            }
        }
    }

    fn absorb(outcome: &mut RecommendationOutcome, trace: &StageTrace) {
        if let Some(answer) = &trace.answer {
            outcome.last_answer_text = Some(answer.clone());
        }
        if let Some(sql) = &trace.sql {
            outcome.last_sql = Some(sql.clone());
        }
    }

    fn succeed(
        mut outcome: RecommendationOutcome,
        trace: StageTrace,
        stage: Stage,
        ids: Vec<i64>,
    ) -> RecommendationOutcome {
        Self::absorb(&mut outcome, &trace);
        outcome.attempts.push(AttemptReport {
            stage,
            sql: trace.sql,
            failure: None,
            retryable: false,
        });
        outcome.recommended_ids = ids;
        outcome.source = Some(stage);
        outcome.error = None;
        outcome
    }

    async fn fail_stage(
        &self,
        ctx: &RunContext,
        outcome: &mut RecommendationOutcome,
        trace: StageTrace,
        stage: Stage,
        err: &RecError,
        retryable: bool,
    ) {
        Self::absorb(outcome, &trace);
        let report = AttemptReport {
            stage,
            sql: trace.sql,
            failure: Some(err.to_string()),
            retryable,
        };
        self.plugin_engine.on_attempt_failed(ctx, &report).await;
        outcome.attempts.push(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::build_fallback_query;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    fn info(id: &str) -> Arc<ServiceInfo> {
        Arc::new(ServiceInfo {
            id: id.to_string(),
            name: id.to_string(),
        })
    }

    /// Completion service replaying scripted answers
    #[derive(Debug, Default)]
    struct ScriptedModel {
        answers: Mutex<VecDeque<Result<String, String>>>,
        prompts: Mutex<Vec<String>>,
        connects: Mutex<u32>,
        delay: Option<Duration>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedModel {
        fn new<const N: usize>(answers: [Result<&'static str, &'static str>; N]) -> Self {
            Self {
                answers: Mutex::new(
                    answers
                        .into_iter()
                        .map(|a| a.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                ..Default::default()
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedModel {
        fn info(&self) -> Arc<ServiceInfo> {
            info("scripted-model")
        }

        async fn connect(&self) -> Result<String, RecError> {
            *self.connects.lock().unwrap() += 1;
            Ok("model://test".to_string())
        }

        async fn ask(&self, prompt: &str) -> Result<String, RecError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.answers.lock().unwrap().pop_front();
            match next {
                Some(Ok(answer)) => Ok(answer),
                Some(Err(message)) => Err(RecError::completion(message)),
                None => Err(RecError::completion("script exhausted")),
            }
        }
    }

    type Responder = Box<dyn Fn(&str) -> Result<QueryResponse, RecError> + Send + Sync>;

    /// Query service answering through a closure and recording every statement
    struct ScriptedDb {
        respond: Responder,
        executed: Mutex<Vec<String>>,
        fail_connect: bool,
    }

    impl std::fmt::Debug for ScriptedDb {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("ScriptedDb").finish()
        }
    }

    impl ScriptedDb {
        fn new(respond: impl Fn(&str) -> Result<QueryResponse, RecError> + Send + Sync + 'static) -> Self {
            Self {
                respond: Box::new(respond),
                executed: Mutex::new(Vec::new()),
                fail_connect: false,
            }
        }

        fn executed(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueryService for ScriptedDb {
        fn info(&self) -> Arc<ServiceInfo> {
            info("scripted-db")
        }

        async fn connect(&self) -> Result<String, RecError> {
            if self.fail_connect {
                return Err(RecError::query("connection refused"));
            }
            Ok("db://test".to_string())
        }

        async fn execute_sql(&self, sql: &str) -> Result<QueryResponse, RecError> {
            self.executed.lock().unwrap().push(sql.to_string());
            (self.respond)(sql)
        }
    }

    fn ids_rows(ids: &[i64]) -> QueryResponse {
        QueryResponse::with_rows(ids.iter().map(|id| vec![json!(id), json!("name")]).collect())
    }

    fn is_fallback(sql: &str) -> bool {
        sql.starts_with("WITH rec_target")
    }

    fn req(user_id: i64, top_k: u32) -> RecommendationRequest {
        RecommendationRequest::new(user_id, top_k).unwrap()
    }

    #[tokio::test]
    async fn test_simple_attempt_success() {
        let model = Arc::new(ScriptedModel::new([Ok(
            "Here you go:\n```sql\nSELECT id FROM programs LIMIT 5;\n```",
        )]));
        let db = Arc::new(ScriptedDb::new(|_| Ok(ids_rows(&[5, 4, 3, 2, 1]))));
        let session = Recommender::builder(model.clone(), db.clone())
            .finish()
            .session();

        let outcome = session.recommend(req(42, 5)).await.unwrap();

        assert_eq!(outcome.recommended_ids, vec![5, 4, 3, 2, 1]);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.source, Some(Stage::Simple));
        assert_eq!(outcome.last_sql.as_deref(), Some("SELECT id FROM programs LIMIT 5;"));
        assert!(outcome.last_answer_text.unwrap().starts_with("Here you go"));
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(db.executed(), vec!["SELECT id FROM programs LIMIT 5;"]);
        assert!(model.prompts()[0].contains("exactly 5 programs"));
    }

    #[tokio::test]
    async fn test_no_sql_goes_straight_to_fallback() {
        let model = Arc::new(ScriptedModel::new([Ok("I cannot answer that.")]));
        let db = Arc::new(ScriptedDb::new(|sql| {
            if is_fallback(sql) {
                Ok(ids_rows(&[9, 8]))
            } else {
                Err(RecError::query("unexpected statement"))
            }
        }));
        let session = Recommender::builder(model.clone(), db.clone())
            .finish()
            .session();

        let outcome = session.recommend(req(7, 3)).await.unwrap();

        assert_eq!(outcome.recommended_ids, vec![9, 8]);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.source, Some(Stage::Fallback));
        assert_eq!(
            outcome.last_sql.as_deref(),
            Some(build_fallback_query(7, 3).as_str())
        );
        assert_eq!(outcome.last_answer_text.as_deref(), Some("I cannot answer that."));
        assert_eq!(model.prompts().len(), 1);
        assert_eq!(db.executed().len(), 1);

        let first = &outcome.attempts[0];
        assert_eq!(first.stage, Stage::Simple);
        assert_eq!(first.failure.as_deref(), Some("No SQL found in model answer"));
        assert!(!first.retryable);
    }

    #[tokio::test]
    async fn test_retryable_then_failed_guided_then_empty_fallback() {
        let model = Arc::new(ScriptedModel::new([
            Ok("```sql\nSELECT id FROM programs p, jsonb_array_elements_text(p.tags) t;\n```"),
            Ok("```sql\nSELECT id FROM programs WHERE false;\n```"),
        ]));
        let db = Arc::new(ScriptedDb::new(|sql| {
            if sql.contains("jsonb_array_elements_text(p.tags)") {
                Err(RecError::query(
                    "function jsonb_array_elements_text(text) does not exist",
                ))
            } else {
                Ok(QueryResponse::default())
            }
        }));
        let session = Recommender::builder(model.clone(), db.clone())
            .finish()
            .session();

        let outcome = session.recommend(req(3, 4)).await.unwrap();

        assert!(outcome.recommended_ids.is_empty());
        assert!(outcome.error.as_deref().unwrap().starts_with("Fallback exhausted"));
        assert!(outcome.source.is_none());

        let stages: Vec<_> = outcome.attempts.iter().map(|a| a.stage).collect();
        assert_eq!(stages, vec![Stage::Simple, Stage::Guided, Stage::Fallback]);
        assert!(outcome.attempts[0].retryable);

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("jsonb_array_elements_text(text) does not exist"));

        let executed = db.executed();
        assert_eq!(executed.len(), 3);
        assert!(is_fallback(&executed[2]));
    }

    #[tokio::test]
    async fn test_guided_attempt_recovers() {
        let model = Arc::new(ScriptedModel::new([
            Ok("SELECT id FROM programs WHERE budget > '10';"),
            Ok("```sql\nSELECT id FROM programs WHERE budget::numeric > 10;\n```"),
        ]));
        let db = Arc::new(ScriptedDb::new(|sql| {
            if sql.contains("::numeric") {
                Ok(ids_rows(&[11, 12]))
            } else {
                Err(RecError::query("operator does not exist: integer > text"))
            }
        }));
        let session = Recommender::builder(model, db).finish().session();

        let outcome = session.recommend(req(1, 2)).await.unwrap();

        assert_eq!(outcome.recommended_ids, vec![11, 12]);
        assert_eq!(outcome.source, Some(Stage::Guided));
        assert_eq!(
            outcome.last_sql.as_deref(),
            Some("SELECT id FROM programs WHERE budget::numeric > 10;")
        );
        assert_eq!(outcome.attempts.len(), 2);
    }

    #[tokio::test]
    async fn test_ellipsis_is_not_retried() {
        let model = Arc::new(ScriptedModel::new([Ok(
            "```sql\nSELECT id, title, ... FROM programs;\n```",
        )]));
        let db = Arc::new(ScriptedDb::new(|_| Ok(ids_rows(&[1]))));
        let session = Recommender::builder(model.clone(), db.clone())
            .finish()
            .session();

        let outcome = session.recommend(req(2, 1)).await.unwrap();

        assert_eq!(outcome.source, Some(Stage::Fallback));
        assert_eq!(model.prompts().len(), 1);
        // the truncated statement never reaches the database
        assert!(db.executed().iter().all(|sql| is_fallback(sql)));
        assert_eq!(
            outcome.attempts[0].sql.as_deref(),
            Some("SELECT id, title, ... FROM programs;")
        );
    }

    #[tokio::test]
    async fn test_unclassified_error_skips_guided() {
        let model = Arc::new(ScriptedModel::new([Ok("SELECT id FROM secret;")]));
        let db = Arc::new(ScriptedDb::new(|sql| {
            if is_fallback(sql) {
                Ok(ids_rows(&[3]))
            } else {
                Err(RecError::query("permission denied for table secret"))
            }
        }));
        let session = Recommender::builder(model.clone(), db).finish().session();

        let outcome = session.recommend(req(2, 1)).await.unwrap();

        assert_eq!(outcome.recommended_ids, vec![3]);
        assert_eq!(model.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_service_error_is_terminal() {
        let model = Arc::new(ScriptedModel::new([Ok("No idea, sorry.")]));
        let db = Arc::new(ScriptedDb::new(|sql| {
            if is_fallback(sql) {
                Err(RecError::query("relation \"program_sectors\" does not exist"))
            } else {
                Ok(ids_rows(&[1]))
            }
        }));
        let session = Recommender::builder(model, db.clone()).finish().session();

        let outcome = session.recommend(req(6, 2)).await.unwrap();

        assert!(outcome.recommended_ids.is_empty());
        assert!(outcome.source.is_none());
        let error = outcome.error.as_deref().unwrap();
        assert!(error.starts_with("Fallback exhausted"));
        assert!(error.contains("program_sectors"));
        assert_eq!(
            outcome.last_sql.as_deref(),
            Some(build_fallback_query(6, 2).as_str())
        );

        let last = outcome.attempts.last().unwrap();
        assert_eq!(last.stage, Stage::Fallback);
        assert!(last.failure.as_deref().unwrap().contains("program_sectors"));
        assert_eq!(db.executed().len(), 1);
    }

    #[tokio::test]
    async fn test_completion_error_with_custom_signature() {
        let model = Arc::new(ScriptedModel::new([
            Err("upstream overloaded"),
            Ok("SELECT 77;"),
        ]));
        let db = Arc::new(ScriptedDb::new(|_| Ok(ids_rows(&[77]))));
        let session = Recommender::builder(model.clone(), db)
            .retry_policy(RetryPolicy::empty().with_signature("overloaded"))
            .finish()
            .session();

        let outcome = session.recommend(req(2, 1)).await.unwrap();

        assert_eq!(outcome.source, Some(Stage::Guided));
        assert_eq!(outcome.recommended_ids, vec![77]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_escalate_then_fall_back() {
        let model = Arc::new(ScriptedModel {
            delay: Some(Duration::from_secs(600)),
            ..ScriptedModel::new([Ok("SELECT 1;"), Ok("SELECT 1;")])
        });
        let db = Arc::new(ScriptedDb::new(|_| Ok(ids_rows(&[4]))));
        let session = Recommender::builder(model.clone(), db)
            .call_timeout(Duration::from_secs(1))
            .finish()
            .session();

        let outcome = session.recommend(req(2, 1)).await.unwrap();

        assert_eq!(outcome.source, Some(Stage::Fallback));
        assert_eq!(model.prompts().len(), 2);
        assert!(outcome.attempts[0].failure.as_deref().unwrap().contains("timeout"));
        assert!(outcome.attempts[0].retryable);
    }

    #[tokio::test]
    async fn test_connection_failure_is_reported_in_outcome() {
        let model = Arc::new(ScriptedModel::new([Ok("SELECT 1;")]));
        let db = Arc::new(ScriptedDb {
            fail_connect: true,
            ..ScriptedDb::new(|_| Ok(ids_rows(&[1])))
        });
        let session = Recommender::builder(model.clone(), db).finish().session();

        let outcome = session.recommend(req(2, 1)).await.unwrap();

        assert!(outcome.recommended_ids.is_empty());
        assert!(outcome.error.unwrap().contains("connection refused"));
        assert!(model.prompts().is_empty());
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn test_connects_once_per_session() {
        let model = Arc::new(ScriptedModel::new([Ok("SELECT 1;"), Ok("SELECT 2;")]));
        let db = Arc::new(ScriptedDb::new(|_| Ok(ids_rows(&[1]))));
        let recommender = Recommender::builder(model.clone(), db).finish();
        let session = recommender.session();

        session.recommend(req(1, 1)).await.unwrap();
        session.recommend(req(1, 1)).await.unwrap();
        assert_eq!(*model.connects.lock().unwrap(), 1);
        assert_eq!(
            session.endpoints().unwrap(),
            &Endpoints {
                completion: "model://test".to_string(),
                query: "db://test".to_string(),
            }
        );

        let _other = recommender.session().connect().await.unwrap();
        assert_eq!(*model.connects.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_refuses_reentrant_run() {
        let gate = Arc::new(Notify::new());
        let model = Arc::new(ScriptedModel {
            gate: Some(gate.clone()),
            ..ScriptedModel::new([Ok("SELECT 1;")])
        });
        let db = Arc::new(ScriptedDb::new(|_| Ok(ids_rows(&[1]))));
        let session = Arc::new(Recommender::builder(model, db).finish().session());

        let running = session.clone();
        let handle = tokio::spawn(async move { running.recommend(req(1, 1)).await });
        while !session.is_running() {
            tokio::task::yield_now().await;
        }

        assert!(matches!(session.recommend(req(1, 1)).await, Err(RecError::Busy)));

        gate.notify_one();
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.recommended_ids, vec![1]);
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn test_rejects_zero_top_k() {
        let model = Arc::new(ScriptedModel::default());
        let db = Arc::new(ScriptedDb::new(|_| Ok(ids_rows(&[1]))));
        let session = Recommender::builder(model, db).finish().session();

        let bad = RecommendationRequest { user_id: 1, top_k: 0 };
        assert!(matches!(
            session.recommend(bad).await,
            Err(RecError::InvalidRequest(_))
        ));
    }
}
