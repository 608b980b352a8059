//! The future type an RPC call returns to its caller.
//!
//! `RpcFuture<R>` is [`crate::future::Future`] specialised to
//! `Result<R, RpcError>`: the inner cell's own exception channel is
//! reserved for *broken promise* (dropping every [`crate::future::Promise`]
//! clone without a value — see [`crate::future::Shared::release_producer`]),
//! while an ordinary method-raised failure arrives as an `Ok(Err(..))`
//! value. [`RpcFuture::get`]/[`RpcFuture::wait`] flatten the two into one
//! `Result<R, RpcError>` so callers never see the inner future's own error
//! type.

use crate::error::{FutureError, RpcError};
use crate::future::{Future as Cell, Promise as CellPromise};

pub type RpcFuture<R> = Cell<Result<R, RpcError>>;
pub type RpcPromise<R> = CellPromise<Result<R, RpcError>>;

/// Blanket helpers so `RpcFuture<R>::get_rpc()`/`wait_rpc()` read naturally
/// at call sites instead of spelling out the flattening match every time.
pub trait RpcFutureExt<R> {
    fn get_rpc(&self) -> Result<R, RpcError>;
    #[allow(async_fn_in_trait)]
    async fn wait_rpc(&self) -> Result<R, RpcError>;
}

impl<R: Clone + Send + 'static> RpcFutureExt<R> for RpcFuture<R> {
    fn get_rpc(&self) -> Result<R, RpcError> {
        flatten(self.get())
    }

    async fn wait_rpc(&self) -> Result<R, RpcError> {
        flatten(self.wait().await)
    }
}

fn flatten<R>(outer: Result<Result<R, RpcError>, FutureError>) -> Result<R, RpcError> {
    match outer {
        Ok(inner) => inner,
        Err(FutureError::BrokenPromise) => Err(RpcError::BrokenPromise),
        Err(e) => Err(RpcError::MethodFailed(e.to_string())),
    }
}
