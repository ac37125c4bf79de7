//! Wire types for the HTTP surface.

use serde::{Deserialize, Serialize};

/// Body of a successful `POST /run`: `{ "msg": "<combined output>" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReply {
    pub msg: String,
}

impl RunReply {
    /// Build from raw command output; invalid UTF-8 is replaced with U+FFFD.
    pub fn from_output(output: &[u8]) -> Self {
        Self {
            msg: String::from_utf8_lossy(output).into_owned(),
        }
    }
}

/// Plain-text bodies for the refusal branches of `/run`.
pub mod messages {
    pub const UNAUTHORIZED: &str = "Unauthorized";
    pub const NOT_SUPPORTED: &str = "not supported. set authstr in the config to enable";
    pub const BODY_IS_NIL: &str = "body is nil";
    pub const BODY_NOT_UTF8: &str = "body is not valid UTF-8";
    pub const AUTHORIZATION_BLANK: &str = "Authorization is blank";
    pub const AUTHORIZATION_INVALID: &str = "Authorization invalid";
    pub const PONG: &str = "pong";
}
