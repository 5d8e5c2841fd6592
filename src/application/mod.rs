pub mod compare;
pub mod diff;
pub mod monitoring;
pub mod reconcile;
pub mod session;
