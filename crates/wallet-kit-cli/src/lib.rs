/*
[INPUT]:  Public API exports for wallet-kit-cli crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod authorizer;
pub mod config;
pub mod runtime;

// Re-export main types for convenience
pub use authorizer::TerminalAuthorizer;
pub use config::KitConfig;
pub use runtime::build_manager;
