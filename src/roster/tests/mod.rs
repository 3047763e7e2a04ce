//! Unit tests for the roster domain.
