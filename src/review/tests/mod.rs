//! Unit tests for the review module.
