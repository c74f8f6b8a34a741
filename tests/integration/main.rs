//! Integration tests for course-harvest
//!
//! These tests use wiremock to serve a mock course catalog and exercise the
//! HTTP fetcher and the full harvest cycle end-to-end.

mod fetcher_tests;
mod harvest_tests;
