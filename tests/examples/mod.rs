mod filter_tests;
mod headers_tests;
mod repetition_tests;
mod server_tests;
mod stream_tests;
mod verification_tests;
