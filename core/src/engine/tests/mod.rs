//! Engine tests
//!
//! Organized by feature area; every test drives the engine through a scripted host.

mod helpers;

mod call_tests;
mod template_tests;
