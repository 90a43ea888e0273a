//! Dashboard state
//!
//! Derived view of agents and scheduled jobs, refreshed from the gateway.

pub mod poller;
pub mod view;

pub use poller::DashboardPoller;
pub use view::{AgentActivity, AgentView, CronView, DashboardSnapshot};
