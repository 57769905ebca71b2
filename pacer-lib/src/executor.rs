//! The capability which actually performs a call.
//!
//! The dispatcher never looks inside requests or responses. All it needs is
//! something implementing [`Execute`]. Implementations are provided for
//! [`reqwest::Client`], for any `Arc<X>` where `X: Execute`, and for plain
//! blocking functions through [`BlockingExecutor`].
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinError;

/// Performs one request and produces a response or an error.
///
/// A call may take arbitrarily long. The dispatcher does not impose timeouts
/// and never cancels a call once it has started, so implementations are
/// expected to terminate on their own.
#[async_trait]
pub trait Execute: Send + Sync + 'static {
    /// Input of a single call
    type Request: Send + 'static;
    /// Successful output of a single call
    type Response: Send + 'static;
    /// Failed output of a single call
    type Error: std::error::Error + Send + Sync + 'static;

    /// Perform the call
    async fn execute(&self, request: Self::Request) -> Result<Self::Response, Self::Error>;
}

#[async_trait]
impl Execute for reqwest::Client {
    type Request = reqwest::Request;
    type Response = reqwest::Response;
    type Error = reqwest::Error;

    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response, reqwest::Error> {
        reqwest::Client::execute(self, request).await
    }
}

#[async_trait]
impl<X: Execute> Execute for Arc<X> {
    type Request = X::Request;
    type Response = X::Response;
    type Error = X::Error;

    async fn execute(&self, request: Self::Request) -> Result<Self::Response, Self::Error> {
        (**self).execute(request).await
    }
}

/// Error of a [`BlockingExecutor`]
#[derive(Error, Debug)]
pub enum BlockingError<E> {
    /// The wrapped function returned an error
    #[error(transparent)]
    Execution(E),
    /// The wrapped function panicked on the blocking thread
    #[error("Blocking call did not complete: {0}")]
    Join(#[from] JoinError),
}

/// Adapter turning a synchronous, possibly blocking function into an
/// [`Execute`] capability.
///
/// Every call runs on Tokio's blocking thread pool, so a slow call never
/// stalls the runtime threads the workers live on.
///
/// ```
/// use pacer_lib::{BlockingExecutor, DispatcherBuilder};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let double = BlockingExecutor::new(|n: u64| Ok::<_, std::io::Error>(n * 2));
/// let dispatcher = DispatcherBuilder::builder().workers(2).build().dispatcher(double)?;
/// assert_eq!(dispatcher.call(21).await?, 42);
/// dispatcher.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct BlockingExecutor<F, Req> {
    call: Arc<F>,
    _request: PhantomData<fn(Req)>,
}

impl<F, Req> BlockingExecutor<F, Req> {
    /// Wrap the given function
    pub fn new<Res, E>(call: F) -> Self
    where
        F: Fn(Req) -> Result<Res, E>,
    {
        Self {
            call: Arc::new(call),
            _request: PhantomData,
        }
    }
}

impl<F, Req> Debug for BlockingExecutor<F, Req> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingExecutor").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Req, Res, E> Execute for BlockingExecutor<F, Req>
where
    F: Fn(Req) -> Result<Res, E> + Send + Sync + 'static,
    Req: Send + 'static,
    Res: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    type Request = Req;
    type Response = Res;
    type Error = BlockingError<E>;

    async fn execute(&self, request: Req) -> Result<Res, BlockingError<E>> {
        let call = Arc::clone(&self.call);
        tokio::task::spawn_blocking(move || call(request))
            .await?
            .map_err(BlockingError::Execution)
    }
}
