//! UI module for consistent CLI output
//!
//! Uses `cliclack` for styled log lines and spinners in a terminal, with
//! automatic fallback to plain output in CI/non-interactive environments.
//! Plain output is stable and line-oriented so scripts can match on it:
//!
//! ```text
//! Fetching https://example.com/foo.git
//! Using foo (1.0.0) from https://example.com/foo.git (at main@1a2b3c4)
//! ```

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    outro_success, step_fetch, step_info, step_ok, step_ok_detail, step_using, step_warn_hint,
};
pub use progress::TaskSpinner;
