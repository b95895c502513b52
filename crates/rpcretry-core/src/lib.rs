//! Policy-driven retry executor for unary calls, with an interceptor chain
//! for per-attempt observability.

pub mod config;
pub mod logging;

pub mod channel;
pub mod intercept;
pub mod invoker;
pub mod metadata;
pub mod method;
pub mod retry;
pub mod server;
pub mod service_config;
pub mod status;

pub use channel::{Channel, ChannelBuilder, ChannelOptions};
pub use intercept::{AttemptContext, Interceptor, InterceptorChain, LoggingInterceptor};
pub use invoker::CallInvoker;
pub use metadata::Metadata;
pub use method::MethodPath;
pub use retry::{CallError, CallOptions, RetryPolicy, ValidationError};
pub use service_config::ServiceConfig;
pub use status::{Code, Status};
