//! Middleware pipeline
//!
//! Ordered payload-transforming steps that run before an action. Any step
//! can abort by returning an error; the action is then skipped and the
//! error propagates unchanged.

use std::sync::Arc;

use crate::error::Result;
use crate::protocol::Payload;
use crate::transport::{Fd, Transport};

/// What each middleware step sees and may rewrite
#[derive(Clone)]
pub struct MiddlewareContext {
    pub transport: Arc<dyn Transport>,
    pub fd: Fd,
    pub payload: Payload,
    pub current_user_id: Option<i64>,
}

/// One pipeline step
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: MiddlewareContext) -> Result<MiddlewareContext>;
}

impl<F> Middleware for F
where
    F: Fn(MiddlewareContext) -> Result<MiddlewareContext> + Send + Sync,
{
    fn handle(&self, ctx: MiddlewareContext) -> Result<MiddlewareContext> {
        self(ctx)
    }
}

/// Composed steps for one action; empty means identity
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Arc<dyn Middleware>>) -> Self {
        Self { stages }
    }

    /// Run every stage in registration order
    pub fn process(&self, ctx: MiddlewareContext) -> Result<MiddlewareContext> {
        self.stages.iter().try_fold(ctx, |ctx, stage| stage.handle(ctx))
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
