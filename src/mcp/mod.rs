//! MCP (Model Context Protocol) server implementation for propscan
//!
//! Exposes the property assessment pipeline as tools that can be used by AI
//! assistants and other MCP clients.

#[cfg(feature = "mcp")]
pub mod server;

#[cfg(feature = "mcp")]
pub use server::PropscanMcpServer;
