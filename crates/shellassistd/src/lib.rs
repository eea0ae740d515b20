//! Library half of the `shellassistd` binary, split out so integration
//! tests can drive the dispatcher and socket server directly.

pub mod dispatcher;
pub mod provider;
pub mod server;
pub mod state;
