//! Unit tests for the dispatch module.
