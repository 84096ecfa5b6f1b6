//! Dashboard orchestration: connection strategy and displayed state.

mod orchestrator;
mod state;

pub use orchestrator::{Dashboard, ToggleOutcome};
pub use state::{ConnectionState, DashboardState, PendingToggle, ToggleRejection};
