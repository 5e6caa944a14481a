/// Environment Helpers
///
/// Server configuration comes from environment variables with defaults; this
/// keeps the lookup in one place.

/// Get an environment variable, falling back to `default` when unset.
pub fn get_env_var(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default_when_unset() {
        assert_eq!(get_env_var("MCP_ADD_SERVER_UNSET_VAR", "3000"), "3000");
    }
}
