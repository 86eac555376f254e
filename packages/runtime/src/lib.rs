//! Binary entry points wiring the governance-fabric library crates to the
//! host agent's hook protocol (stdin/stdout JSON) and to the gateway HTTP
//! server. Grounded in `foundation/runtime/src/bin/main.rs`
//! env-driven entry pattern and `arbiter/src/bin/server.rs`'s tracing-init
//! + `#[tokio::main]` shape.

pub mod env;
pub mod hookio;

pub use env::Paths;
