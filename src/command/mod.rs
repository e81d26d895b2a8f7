// Named-command dispatch over JSON-RPC 2.0.
pub mod handler;
pub mod protocol;
