//! CLI module tests.

mod stream_test;
