//! Unit tests for the tracker module.

mod memory_tests;
