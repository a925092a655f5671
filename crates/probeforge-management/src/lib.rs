//! Read-only management API for the capability registry and plugin
//! lifecycle, with a small set of operator actions (reload, unload,
//! test-tool).

pub mod routes;
pub mod server;
pub mod state;

pub use server::serve;
pub use state::ManagementState;
