// Wire protocols spoken by the server's agent-facing endpoints.

pub mod jsonrpc;
pub mod mcp;
