//! Per-operation context: who is asking, and whether they still are.

use std::future::Future;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::{VfsError, VfsResult};
use crate::path::{ResolvedPath, resolve};
use crate::types::TenantId;

/// Tenant identity plus the caller's cancellation token.
///
/// Every store call made on behalf of an operation races this token, so a
/// client that disconnects mid-zip or mid-move stops the work at the next
/// store call. Nothing is rolled back.
#[derive(Debug, Clone)]
pub struct OpContext {
    tenant: TenantId,
    cancel: CancellationToken,
}

impl OpContext {
    /// Context that is never cancelled.
    pub fn new(tenant: TenantId) -> Self {
        Self {
            tenant,
            cancel: CancellationToken::new(),
        }
    }

    /// Context bound to a caller-owned token.
    pub fn with_cancel(tenant: TenantId, cancel: CancellationToken) -> Self {
        Self { tenant, cancel }
    }

    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolve a raw path for this context's tenant.
    pub fn resolve(&self, raw: &str) -> VfsResult<ResolvedPath> {
        resolve(self.tenant, raw)
    }

    /// Run a store call, giving up with [`VfsError::Cancelled`] if the
    /// caller goes away first.
    pub(crate) async fn guard<T>(&self, fut: impl Future<Output = VfsResult<T>>) -> VfsResult<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(VfsError::Cancelled),
            result = fut => result,
        }
    }

    /// Pull the next item from a store stream under cancellation.
    pub(crate) async fn next<S>(&self, stream: &mut S) -> VfsResult<Option<S::Item>>
    where
        S: Stream + Unpin,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(VfsError::Cancelled),
            item = stream.next() => Ok(item),
        }
    }
}
