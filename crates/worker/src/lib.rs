//! Job orchestration for the snapgen worker.
//!
//! [`handler::JobHandler`] is the entry point invoked once per job. It
//! validates input, checks resource headroom, drives the ComfyUI client
//! through upload, submission, and monitoring, collects the outputs, and
//! maps every failure to a structured error response -- nothing raises
//! past this boundary.

pub mod handler;
pub mod response;
