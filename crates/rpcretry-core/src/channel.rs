//! Client channel: where the service config, retry switch and interceptors
//! are bound to an invoker.
//!
//! A `Channel` is cheap to clone and safe to share between tasks; every call
//! gets its own session while policies stay shared behind `Arc`.

use std::sync::Arc;

use tokio::time::Instant;

use crate::intercept::{Interceptor, InterceptorChain};
use crate::invoker::CallInvoker;
use crate::method::MethodPath;
use crate::retry::{
    CallError, CallOptions, CallSession, Jitter, RetryExecutor, RetryPolicy, ValidationError,
};
use crate::service_config::{self, ServiceConfig};

/// Channel-level switches.
#[derive(Debug, Clone, Copy)]
pub struct ChannelOptions {
    /// When false every call is a single attempt, whatever the service config says.
    pub enable_retries: bool,
    pub jitter: Jitter,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            enable_retries: true,
            jitter: Jitter::None,
        }
    }
}

struct Inner<I> {
    invoker: I,
    service_config: ServiceConfig,
    interceptors: InterceptorChain,
    options: ChannelOptions,
    no_retry: Arc<RetryPolicy>,
}

pub struct Channel<I> {
    inner: Arc<Inner<I>>,
}

impl<I> Clone for Channel<I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<I: CallInvoker> Channel<I> {
    pub fn builder(invoker: I) -> ChannelBuilder<I> {
        ChannelBuilder {
            invoker,
            service_config: ServiceConfig::empty(),
            interceptors: InterceptorChain::new(),
            options: ChannelOptions::default(),
        }
    }

    pub fn invoker(&self) -> &I {
        &self.inner.invoker
    }

    pub fn options(&self) -> ChannelOptions {
        self.inner.options
    }

    /// Retry policy that applies to `method` on this channel.
    pub fn policy_for(&self, method: &MethodPath) -> Arc<RetryPolicy> {
        if !self.inner.options.enable_retries {
            return Arc::clone(&self.inner.no_retry);
        }
        self.inner
            .service_config
            .retry_policy(method)
            .unwrap_or_else(|| Arc::clone(&self.inner.no_retry))
    }

    /// Make a unary call and return the full session (attempt log included).
    pub async fn unary_session(
        &self,
        method: &MethodPath,
        request: &I::Request,
        options: CallOptions,
    ) -> CallSession<I::Response> {
        let policy = self.policy_for(method);
        let default_timeout = self.inner.service_config.timeout(method);
        let deadline = options.effective_deadline(Instant::now(), default_timeout);
        tracing::debug!(
            method = %method,
            max_attempts = policy.max_attempts(),
            has_deadline = deadline.is_some(),
            "starting call"
        );
        RetryExecutor::new(&self.inner.invoker, &self.inner.interceptors)
            .run(method, request, policy, deadline, &options)
            .await
    }

    /// Make a unary call.
    pub async fn unary(
        &self,
        method: &MethodPath,
        request: &I::Request,
        options: CallOptions,
    ) -> Result<I::Response, CallError> {
        self.unary_session(method, request, options)
            .await
            .into_result()
    }
}

pub struct ChannelBuilder<I> {
    invoker: I,
    service_config: ServiceConfig,
    interceptors: InterceptorChain,
    options: ChannelOptions,
}

impl<I: CallInvoker> ChannelBuilder<I> {
    pub fn service_config(mut self, config: ServiceConfig) -> Self {
        self.service_config = config;
        self
    }

    /// Parse and attach a JSON service-config document.
    pub fn service_config_json(self, json: &str) -> Result<Self, ValidationError> {
        let config = service_config::parse(json)?;
        Ok(self.service_config(config))
    }

    pub fn enable_retries(mut self, enable: bool) -> Self {
        self.options.enable_retries = enable;
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.options.jitter = jitter;
        self
    }

    /// Register an interceptor; earlier registrations wrap later ones.
    pub fn interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn build(self) -> Channel<I> {
        let service_config = match self.options.jitter {
            Jitter::None => self.service_config,
            jitter => self.service_config.with_jitter(jitter),
        };
        tracing::debug!(
            method_configs = service_config.method_configs().len(),
            interceptors = self.interceptors.len(),
            enable_retries = self.options.enable_retries,
            "channel built"
        );
        Channel {
            inner: Arc::new(Inner {
                invoker: self.invoker,
                service_config,
                interceptors: self.interceptors,
                options: self.options,
                no_retry: Arc::new(RetryPolicy::no_retry()),
            }),
        }
    }
}
