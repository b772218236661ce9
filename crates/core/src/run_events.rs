//! WebSocket frame type constants for script runs.
//!
//! Every frame sent to a browser carries one of these values in its
//! `type` field.

/// Sent once per connection with the assigned client id.
pub const MSG_TYPE_WELCOME: &str = "welcome";

/// Reply to an inbound `ping` frame.
pub const MSG_TYPE_PONG: &str = "pong";

/// A run was spawned.
pub const MSG_TYPE_SCRIPT_START: &str = "script_start";

/// One plain output line from the child process.
pub const MSG_TYPE_SCRIPT_OUTPUT: &str = "script_output";

/// A structured progress event plus the recomputed percent.
pub const MSG_TYPE_PROGRESS: &str = "progress";

/// A structured result object emitted by the script.
pub const MSG_TYPE_RESULT: &str = "result";

/// The run could not be started or the process failed abnormally.
pub const MSG_TYPE_SCRIPT_ERROR: &str = "script_error";

/// The run reached a terminal state.
pub const MSG_TYPE_SCRIPT_END: &str = "script_end";
