/// Tools Module
///
/// All MCP tool implementations. Each tool is a module exporting a `register`
/// function that adds it to the registry during server initialization.

pub mod add;
