//! Property-based tests using proptest.
//!
//! These tests verify that invariants hold for randomly generated inputs:
//! whatever a registry holds, a reader of any target encoding sees the same
//! facts, and no byte pattern makes the reader panic or loop.

mod common;

#[path = "property/contract_props.rs"]
mod contract_props;

#[path = "property/reader_robustness.rs"]
mod reader_robustness;

#[path = "property/versioning_props.rs"]
mod versioning_props;
