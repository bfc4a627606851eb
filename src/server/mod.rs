pub mod delivery;
pub mod handler;
pub(crate) mod matchers;
pub mod server;
pub(crate) mod state;
