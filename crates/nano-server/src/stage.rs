use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::middleware;
use axum::response::Response;
use axum::Router;
use futures::future::BoxFuture;
use futures::FutureExt;

// ---------------------------------------------------------------------------
// RequestStage trait
// ---------------------------------------------------------------------------

/// A single processing stage in the request pipeline.
///
/// A stage receives the request and a [`Next`] continuation. It may act
/// before and after calling `next.run(request)`, or answer on its own
/// without calling it at all.
///
/// The trait is object-safe and `Send + Sync` so stages can be stored in
/// a `Vec<Arc<dyn RequestStage>>`.
#[async_trait]
pub trait RequestStage: Send + Sync {
    /// Human-readable name of this stage (e.g., "logging", "api-key").
    fn name(&self) -> &str;

    async fn handle(&self, request: Request, next: Next<'_>) -> Response;
}

/// The route handler at the end of the pipeline.
pub type Endpoint = Box<dyn FnOnce(Request) -> BoxFuture<'static, Response> + Send>;

// ---------------------------------------------------------------------------
// Next
// ---------------------------------------------------------------------------

/// Continuation handed to a stage: the stages after it, then the endpoint.
pub struct Next<'a> {
    stages: &'a [Arc<dyn RequestStage>],
    endpoint: Endpoint,
}

impl Next<'_> {
    /// Run the next stage, or the endpoint once every stage has run.
    pub async fn run(self, request: Request) -> Response {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    endpoint: self.endpoint,
                };
                stage.handle(request, next).await
            }
            None => (self.endpoint)(request).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// An ordered list of stages run by a single dispatcher.
///
/// Stage `i` wraps stages `i+1..`: the first stage added sees the request
/// first and the response last.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn RequestStage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage to the end of the pipeline.
    pub fn add_stage(&mut self, stage: impl RequestStage + 'static) {
        self.stages.push(Arc::new(stage));
    }

    /// Builder form of [`Self::add_stage`].
    pub fn with_stage(mut self, stage: impl RequestStage + 'static) -> Self {
        self.add_stage(stage);
        self
    }

    /// Number of stages in the pipeline.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run `request` through every stage and finally `endpoint`.
    pub async fn run(&self, request: Request, endpoint: Endpoint) -> Response {
        Next {
            stages: &self.stages,
            endpoint,
        }
        .run(request)
        .await
    }

    /// Mount the pipeline in front of every route of `router`.
    pub fn apply<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(middleware::from_fn_with_state(Arc::new(self), dispatch))
    }
}

/// Bridge from axum's middleware chain into the pipeline.
async fn dispatch(
    State(pipeline): State<Arc<Pipeline>>,
    request: Request,
    next: middleware::Next,
) -> Response {
    let endpoint: Endpoint = Box::new(move |request: Request| next.run(request).boxed());
    pipeline.run(request, endpoint).await
}
