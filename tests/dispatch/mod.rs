mod batching;
mod failure_reporting;
mod processing_loop;
