// ABOUTME: Root library module exposing platform adapters and the live-marker watcher
// ABOUTME: Re-exports the platform-agnostic bridge-core modules

pub mod marker;
pub mod platform;

// Re-export platform-agnostic modules from bridge-core
pub use bridge_core::config;
pub use bridge_core::link;
pub use bridge_core::live;
pub use bridge_core::parser;
pub use bridge_core::relay;
pub use bridge_core::traits;
