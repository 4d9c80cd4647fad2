// src/core/platform.rs

//! The canonical per-OS command table consumed by the (out-of-scope)
//! metrics collectors. This crate owns only the table and its validation;
//! it never runs these commands itself.

use crate::core::errors::{OpsError, OpsResult};

#[derive(Debug, Clone)]
pub struct PlatformCommands {
    pub cpu: &'static str,
    pub memory: &'static str,
    pub process: &'static str,
    pub disk: &'static str,
    pub network: &'static str,
}

const LINUX: PlatformCommands = PlatformCommands {
    cpu: "top -bn1 | grep 'Cpu(s)'",
    memory: "free -m",
    process: "ps aux",
    disk: "df -h",
    network: "ss -tuln",
};

const DARWIN: PlatformCommands = PlatformCommands {
    cpu: "top -l 1 -n 0",
    memory: "vm_stat",
    process: "ps aux",
    disk: "df -h",
    network: "netstat -an",
};

const WINDOWS: PlatformCommands = PlatformCommands {
    cpu: "wmic cpu get loadpercentage",
    memory: "wmic OS get FreePhysicalMemory,TotalVisibleMemorySize",
    process: "tasklist",
    disk: "wmic logicaldisk get size,freespace,caption",
    network: "netstat -an",
};

/// Returns the command table for `os`, or `UnsupportedPlatform` otherwise.
/// `os` is matched case-insensitively against `linux`, `darwin`, and
/// `windows`.
pub fn commands_for(os: &str) -> OpsResult<PlatformCommands> {
    match os.to_lowercase().as_str() {
        "linux" => Ok(LINUX),
        "darwin" | "macos" => Ok(DARWIN),
        "windows" => Ok(WINDOWS),
        other => Err(OpsError::UnsupportedPlatform(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_platforms_resolve() {
        assert!(commands_for("linux").is_ok());
        assert!(commands_for("Darwin").is_ok());
        assert!(commands_for("WINDOWS").is_ok());
    }

    #[test]
    fn unknown_platform_errors() {
        let err = commands_for("plan9").unwrap_err();
        assert!(matches!(err, OpsError::UnsupportedPlatform(p) if p == "plan9"));
    }
}
