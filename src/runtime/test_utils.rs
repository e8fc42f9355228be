//! Test utilities for runtime testing
//!
//! A fluent builder that wraps a list of instructions into a single-function
//! module, instantiates it in a fresh store, and invokes it.
