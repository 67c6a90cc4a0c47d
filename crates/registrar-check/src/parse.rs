//! Lenient parsing of attribute values.
//!
//! None of these fail loudly: callers pick their own fallback.

pub use registrar_core::parse::parse_bool;

/// Normalize a TTL so it always carries exactly one trailing `s`.
pub fn normalize_ttl(ttl: &str) -> String {
    format!("{}s", ttl.strip_suffix('s').unwrap_or(ttl))
}

/// Substitute `$SERVICE_IP`, then `$SERVICE_PORT`, in a command line.
pub fn interpolate(command: &str, ip: &str, port: u16) -> String {
    command
        .replace("$SERVICE_IP", ip)
        .replace("$SERVICE_PORT", &port.to_string())
}

/// Split a script command on single spaces. Consecutive spaces yield
/// empty arguments.
pub fn split_script_args(command: &str) -> Vec<String> {
    command.split(' ').map(str::to_string).collect()
}

/// Split a docker command into one argument per character.
///
/// Kept for parity with the registrator behaviour this adapter replaces;
/// whether docker checks should instead split on spaces is an open
/// product question.
pub fn split_docker_args(command: &str) -> Vec<String> {
    command.chars().map(String::from).collect()
}
