//! Integration tests for the initial report pipeline

mod auto_repair;
mod backfill_run;
mod chunked_builder;
mod retry_fallback;
mod single_flight;
mod sled_store;
mod test_utils;
