//! Runtime for reportd: persistence, idempotent submission, artifact
//! production, the worker engine, and the HTTP gateway.

pub mod db;
pub mod gateway;
pub mod producer;
pub mod service;
pub mod store;
pub mod worker;
