#![cfg(test)]

pub mod common;
pub mod concurrency_tests;
pub mod deployment_tests;
pub mod shutdown_tests;
