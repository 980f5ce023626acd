//! Browser chat backend: per-user conversation storage and streamed LLM answers.

// Forbid dangerous or non-idiomatic practices outright
#![deny(warnings)] // Every warning is an error
#![deny(unsafe_code)] // No unsafe code
#![deny(missing_docs)] // Every public function, struct, enum and module is documented
#![deny(dead_code)] // No unused code
#![deny(non_camel_case_types)]
// Types follow CamelCase (explicit exceptions allowed where needed)

// Leave nothing unused
#![deny(unused_imports)] // No unused imports
#![deny(unused_variables)] // No unused variables
#![deny(unused_must_use)] // Results and options are handled explicitly
#![deny(non_snake_case)] // Variables and functions are snake_case
#![deny(non_upper_case_globals)] // Constants and globals are UPPER_CASE
#![deny(nonstandard_style)] // No non-standard style
#![forbid(unsafe_op_in_unsafe_fn)]
// No unsafe even inside an unsafe fn

// Clippy discipline
#![deny(clippy::all)] // Standard Clippy lints
#![deny(clippy::pedantic)] // Strict Clippy lints
#![deny(clippy::nursery)] // Experimental lints
#![deny(clippy::unwrap_used)] // No unwrap()
#![deny(clippy::expect_used)] // No expect()
#![deny(clippy::panic)] // No panic!()
#![deny(clippy::print_stdout)] // No println!() in production
#![deny(clippy::todo)] // No todo!()
#![deny(clippy::unimplemented)] // No unimplemented!()
#![deny(clippy::missing_const_for_fn)] // const wherever possible
#![deny(clippy::unwrap_in_result)] // No unwrap() inside Result functions
#![deny(clippy::module_inception)] // No module named like its parent
#![deny(clippy::redundant_clone)] // No needless clones
#![deny(clippy::shadow_unrelated)] // No shadowing by unrelated values
#![deny(clippy::too_many_arguments)] // Bounded argument lists
#![deny(clippy::cognitive_complexity)] // Bounded function complexity

// Safety and robustness
#![deny(overflowing_literals)] // No overflowing literals
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

/// Conversation storage, naming and answer assembly.
pub mod conversations;
/// Chat model client and oracle interface.
pub mod llm;
/// HTTP server and API routes.
#[allow(
    clippy::missing_errors_doc,
    clippy::missing_const_for_fn,
    clippy::unused_async
)]
pub mod server;
/// Entry helpers to start the Parlor agent.
pub mod start_parlor_agent;
