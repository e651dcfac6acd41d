//! Query agent
//!
//! The two-stage pipeline (`pipeline`), its collaborator seams (`gateway`)
//! and an HTTP implementation of those seams (`http`).

pub mod gateway;
pub mod http;
pub mod pipeline;

pub use gateway::{
    FunctionCallGenerator, QueryAgent, QueryRewriter, SharedFunctionCallGenerator,
    SharedQueryAgent, SharedQueryRewriter,
};
pub use http::HttpAgentGateway;
pub use pipeline::ContractAgent;
