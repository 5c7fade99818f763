//! Integration test suite for Scry.
//!
//! This crate contains end-to-end and property tests that run the full
//! snapshot → decode → build → format pipeline and verify the template
//! invariants under well-formed, adversarial, and randomized inputs.

pub mod helpers;
