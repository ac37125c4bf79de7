//! Gateway: HTTP front-end for whitelisted command execution.
//!
//! `GET /ping` is a liveness probe; `POST /run` takes a raw command line as the body.
//! Every route sits behind the bearer-token gate in [`auth`].

pub mod auth;
mod protocol;
mod server;

pub use auth::{check_authorization, AuthOutcome};
pub use protocol::{messages, RunReply};
pub use server::{router, run_gateway, serve, GatewayState};
