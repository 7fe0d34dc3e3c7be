//! Integration tests for jsripple
//!
//! These tests run mock HTTP servers with wiremock and exercise fetching,
//! decoding and full crawls end-to-end.

mod crawl_tests;
mod fetch_tests;
