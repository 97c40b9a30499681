//! Nullable infrastructure for deterministic testing.
//!
//! The overlay's one external dependency — proof verification — sits behind
//! the `ProofVerifier` trait. This crate provides a test-friendly stand-in
//! that returns deterministic, programmable outcomes and never touches chain
//! state. Time needs no double: every time-dependent overlay operation takes
//! an explicit `now` parameter, so tests drive the clock with plain
//! timestamp values.
//!
//! Usage: swap the real verifier for the nullable in tests.

pub mod verifier;

pub use verifier::NullVerifier;
