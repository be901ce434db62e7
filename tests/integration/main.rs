//! Integration tests for session-bridge
//! These drive a full SessionContext over the in-memory backend

pub mod test_harness;

pub mod fault_routing_test;
pub mod session_lifecycle_test;
