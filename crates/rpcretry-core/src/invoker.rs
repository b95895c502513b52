//! Boundary to the transport: one network round trip per call.

use std::sync::Arc;

use async_trait::async_trait;

use crate::intercept::AttemptContext;
use crate::status::Status;

/// Performs a single unary round trip.
///
/// The executor enforces the per-attempt timeout found in `ctx.timeout`;
/// implementations may also forward it to the remote side.
#[async_trait]
pub trait CallInvoker: Send + Sync {
    type Request: Send + Sync;
    type Response: Send;

    async fn invoke(
        &self,
        ctx: &AttemptContext,
        request: &Self::Request,
    ) -> Result<Self::Response, Status>;
}

#[async_trait]
impl<I> CallInvoker for Arc<I>
where
    I: CallInvoker + ?Sized,
{
    type Request = I::Request;
    type Response = I::Response;

    async fn invoke(
        &self,
        ctx: &AttemptContext,
        request: &Self::Request,
    ) -> Result<Self::Response, Status> {
        (**self).invoke(ctx, request).await
    }
}
