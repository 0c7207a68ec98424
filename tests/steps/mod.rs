//! Step definitions for behavioural tests.

mod harness_steps;
