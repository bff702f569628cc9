//! extask-worker
//!
//! Worker binary for the insurance application process: risk scoring and
//! customer/manager notifications, served as external task topics.

pub mod handlers;
