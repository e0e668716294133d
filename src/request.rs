//! The per-invocation request descriptor.
//!
//! A [`Request`] bundles the three user stages of one logical operation —
//! `preprocess` (input producer), `handler` (the operation itself), and
//! `postprocess` (outcome transformer) — together with the lease duration,
//! the timeout and persistence flags, and the codecs used to move values in
//! and out of the record store.
//!
//! The generic/persistent distinction is one boolean of behavior: a
//! persistent request serializes the preprocess output into the record on
//! first insert and rehydrates it on every retry, so the handler sees the
//! identical input on each attempt; a generic request recomputes `preprocess`
//! instead, which is why that closure is assumed idempotent.
//!
//! # Example
//!
//! ```rust
//! use run_once::{Duration, Request};
//!
//! let request = Request::new(
//!     || async { Ok(21u32) },
//!     |n: u32, _ctx| async move { Ok(n * 2) },
//!     |resp: u32, _already_completed| async move { Ok(resp) },
//! )
//! .with_ttl(Duration::from_seconds(30))
//! .with_automatic_timeout(true);
//!
//! assert!(request.automatic_timeout());
//! assert!(!request.is_persistent());
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::duration::Duration;
use crate::error::BoxError;
use crate::serdes::{JsonSerDes, SerDes};

pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

type PreprocessFn<Req> = Arc<dyn Fn() -> BoxFuture<Result<Req, BoxError>> + Send + Sync>;
type HandlerFn<Req, Resp> =
    Arc<dyn Fn(Req, HandlerContext) -> BoxFuture<Result<Resp, BoxError>> + Send + Sync>;
type PostprocessFn<Resp, Out> =
    Arc<dyn Fn(Resp, bool) -> BoxFuture<Result<Out, BoxError>> + Send + Sync>;

/// Context handed to the handler on each attempt.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    /// The idempotency key of this invocation.
    pub key: String,
    /// True when this attempt re-enters the handler after a retryable
    /// failure or an expired lease; false on the first attempt.
    pub retry: bool,
}

impl HandlerContext {
    pub(crate) fn new(key: impl Into<String>, retry: bool) -> Self {
        Self {
            key: key.into(),
            retry,
        }
    }
}

/// Descriptor for one idempotent operation.
///
/// Type parameters: `Req` is the preprocessed input, `Resp` the handler's
/// successful result (stored and replayed), `Out` the caller-visible result
/// produced by `postprocess`.
///
/// Built with [`Request::new`] (JSON response codec) or
/// [`Request::with_serdes`] (custom codec), then refined with the `with_*`
/// chainers. The descriptor is cheap to clone; all stages are shared.
pub struct Request<Req, Resp, Out> {
    pub(crate) preprocess: PreprocessFn<Req>,
    pub(crate) handler: HandlerFn<Req, Resp>,
    pub(crate) postprocess: PostprocessFn<Resp, Out>,
    pub(crate) ttl: Option<Duration>,
    pub(crate) automatic_timeout: bool,
    pub(crate) persistent: bool,
    pub(crate) request_serdes: Option<Arc<dyn SerDes<Req>>>,
    pub(crate) response_serdes: Arc<dyn SerDes<Resp>>,
}

impl<Req, Resp, Out> Request<Req, Resp, Out> {
    /// Creates a request descriptor with the default JSON response codec.
    ///
    /// `handler` receives the preprocessed input and a [`HandlerContext`]
    /// whose `retry` flag distinguishes first attempts from re-runs.
    /// `postprocess` receives the response and `already_completed`, true when
    /// the response was replayed from the store rather than freshly computed.
    pub fn new<P, PFut, H, HFut, T, TFut>(preprocess: P, handler: H, postprocess: T) -> Self
    where
        Resp: Serialize + DeserializeOwned + 'static,
        P: Fn() -> PFut + Send + Sync + 'static,
        PFut: Future<Output = Result<Req, BoxError>> + Send + 'static,
        H: Fn(Req, HandlerContext) -> HFut + Send + Sync + 'static,
        HFut: Future<Output = Result<Resp, BoxError>> + Send + 'static,
        T: Fn(Resp, bool) -> TFut + Send + Sync + 'static,
        TFut: Future<Output = Result<Out, BoxError>> + Send + 'static,
    {
        Self::with_serdes(
            preprocess,
            handler,
            postprocess,
            Arc::new(JsonSerDes::<Resp>::new()),
        )
    }

    /// Creates a request descriptor with an explicit response codec.
    ///
    /// Use this when `Resp` is not serde-serializable or when the stored
    /// blob must use an encoding other than JSON (see
    /// [`custom_serdes`](crate::serdes::custom_serdes)).
    pub fn with_serdes<P, PFut, H, HFut, T, TFut>(
        preprocess: P,
        handler: H,
        postprocess: T,
        response_serdes: Arc<dyn SerDes<Resp>>,
    ) -> Self
    where
        P: Fn() -> PFut + Send + Sync + 'static,
        PFut: Future<Output = Result<Req, BoxError>> + Send + 'static,
        H: Fn(Req, HandlerContext) -> HFut + Send + Sync + 'static,
        HFut: Future<Output = Result<Resp, BoxError>> + Send + 'static,
        T: Fn(Resp, bool) -> TFut + Send + Sync + 'static,
        TFut: Future<Output = Result<Out, BoxError>> + Send + 'static,
    {
        let preprocess: PreprocessFn<Req> = Arc::new(move || Box::pin(preprocess()));
        let handler: HandlerFn<Req, Resp> = Arc::new(move |req, ctx| Box::pin(handler(req, ctx)));
        let postprocess: PostprocessFn<Resp, Out> =
            Arc::new(move |resp, replayed| Box::pin(postprocess(resp, replayed)));
        Self {
            preprocess,
            handler,
            postprocess,
            ttl: None,
            automatic_timeout: false,
            persistent: false,
            request_serdes: None,
            response_serdes,
        }
    }

    /// Sets the lease duration.
    ///
    /// The lease bounds how long a `RUNNING` record blocks other attempts;
    /// after it elapses, one subsequent attempt may reclaim the key. With
    /// [`with_automatic_timeout`](Self::with_automatic_timeout) it is also
    /// the hard deadline imposed on the handler. [`Duration::ZERO`] disables
    /// both: a crashed worker then wedges the key until externally repaired.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = if ttl.is_zero() { None } else { Some(ttl) };
        self
    }

    /// Enables or disables the hard handler timeout.
    ///
    /// Only effective together with a non-zero ttl; on breach the invocation
    /// fails with [`RunOnceError::Timeout`](crate::RunOnceError::Timeout) and
    /// is recorded as a retryable failure.
    pub fn with_automatic_timeout(mut self, automatic_timeout: bool) -> Self {
        self.automatic_timeout = automatic_timeout;
        self
    }

    /// Marks the request persistent with the default JSON request codec.
    ///
    /// The preprocess output is serialized into the record on first insert
    /// and rehydrated on every retry, so the handler receives the identical
    /// input on each attempt. A `None` preprocess value serializes as the
    /// explicit JSON `null` and round-trips as such.
    pub fn persistent(self) -> Self
    where
        Req: Serialize + DeserializeOwned + 'static,
    {
        self.persistent_with(Arc::new(JsonSerDes::<Req>::new()))
    }

    /// Marks the request persistent with an explicit request codec.
    pub fn persistent_with(mut self, request_serdes: Arc<dyn SerDes<Req>>) -> Self {
        self.persistent = true;
        self.request_serdes = Some(request_serdes);
        self
    }

    /// Replaces the response codec.
    pub fn with_response_serdes(mut self, response_serdes: Arc<dyn SerDes<Resp>>) -> Self {
        self.response_serdes = response_serdes;
        self
    }

    /// The configured lease duration, if any.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// True if the hard handler timeout is enabled.
    pub fn automatic_timeout(&self) -> bool {
        self.automatic_timeout
    }

    /// True if the preprocess output is persisted and rehydrated on retry.
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub(crate) async fn run_preprocess(&self) -> Result<Req, BoxError> {
        (self.preprocess)().await
    }

    pub(crate) async fn run_handler(&self, req: Req, ctx: HandlerContext) -> Result<Resp, BoxError> {
        (self.handler)(req, ctx).await
    }

    pub(crate) async fn run_postprocess(
        &self,
        resp: Resp,
        already_completed: bool,
    ) -> Result<Out, BoxError> {
        (self.postprocess)(resp, already_completed).await
    }
}

impl<Req, Resp, Out> Clone for Request<Req, Resp, Out> {
    fn clone(&self) -> Self {
        Self {
            preprocess: self.preprocess.clone(),
            handler: self.handler.clone(),
            postprocess: self.postprocess.clone(),
            ttl: self.ttl,
            automatic_timeout: self.automatic_timeout,
            persistent: self.persistent,
            request_serdes: self.request_serdes.clone(),
            response_serdes: self.response_serdes.clone(),
        }
    }
}

impl<Req, Resp, Out> std::fmt::Debug for Request<Req, Resp, Out> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("ttl", &self.ttl)
            .field("automatic_timeout", &self.automatic_timeout)
            .field("persistent", &self.persistent)
            .finish()
    }
}
