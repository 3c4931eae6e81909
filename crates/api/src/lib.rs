//! Local serverless API emulation.
//!
//! Serves the hosting runtime's surface (`/run`, `/runsync`,
//! `/status/{id}`, `/health`) in front of a [`snapgen_worker::handler::JobHandler`]
//! so the worker can be exercised end to end without the real platform.
//! Exposes the building blocks so integration tests and the binary
//! entrypoint construct the exact same router.

pub mod config;
pub mod error;
pub mod jobs;
pub mod routes;
pub mod state;
