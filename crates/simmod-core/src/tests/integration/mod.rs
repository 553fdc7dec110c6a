#![cfg(test)]

pub mod pipeline_tests;
pub mod lifecycle_tests;
