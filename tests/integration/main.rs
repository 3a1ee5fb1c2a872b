//! Integration tests for Campus-Harvest
//!
//! These tests use wiremock to stand in for university websites and the
//! extraction endpoint, and exercise the crawler and the full pipeline
//! end-to-end against real SQLite files.

mod crawl_tests;
mod pipeline_tests;
