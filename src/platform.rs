//! # Platform-specific utilities
//!
//! Questo modulo centralizza la risoluzione cross-platform dei tool esterni
//! (`ffmpeg`, `ffprobe`) usati dal backend di export.
//!
//! ## Ordine di risoluzione:
//! 1. Path esplicito in configurazione (`ffmpeg_path`, `ffprobe_path`)
//! 2. Directory di tool bundled indicata da `VIDEO_COMPRESS_TOOLS_DIR`
//! 3. `PATH` di sistema

use crate::config::Config;
use crate::error::{CompressError, Result};
use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const TOOLS_DIR_ENV: &str = "VIDEO_COMPRESS_TOOLS_DIR";

/// Tools the ffmpeg backend cannot run without
pub const REQUIRED_TOOLS: [&str; 2] = ["ffmpeg", "ffprobe"];

/// Tool path resolver for bundled and system-installed binaries
#[derive(Debug, Clone)]
pub struct ToolPathResolver {
    overrides: HashMap<&'static str, PathBuf>,
    tools_dir: Option<PathBuf>,
    search_path: Option<OsString>,
}

impl ToolPathResolver {
    /// Resolver for `config`, reading the tools directory and `PATH` from the environment
    pub fn new(config: &Config) -> Self {
        let tools_dir = env::var_os(TOOLS_DIR_ENV).map(PathBuf::from);
        Self::from_parts(config, tools_dir, env::var_os("PATH"))
    }

    pub fn from_parts(config: &Config, tools_dir: Option<PathBuf>, search_path: Option<OsString>) -> Self {
        let mut overrides = HashMap::new();
        if let Some(path) = &config.ffmpeg_path {
            overrides.insert("ffmpeg", path.clone());
        }
        if let Some(path) = &config.ffprobe_path {
            overrides.insert("ffprobe", path.clone());
        }

        let tools_dir = tools_dir.filter(|dir| {
            let exists = dir.is_dir();
            if !exists {
                warn!("Tools directory {} does not exist", dir.display());
            }
            exists
        });

        Self {
            overrides,
            tools_dir,
            search_path,
        }
    }

    /// File name of `tool` on this platform
    pub fn executable_name(tool: &str) -> String {
        if cfg!(windows) {
            format!("{}.exe", tool)
        } else {
            tool.to_string()
        }
    }

    /// Resolve the path to a specific tool
    pub fn resolve_tool(&self, tool: &str) -> Option<PathBuf> {
        if let Some(path) = self.overrides.get(tool) {
            if path.is_file() {
                debug!("Using configured {}: {}", tool, path.display());
                return Some(path.clone());
            }
            warn!("Configured {} path {} does not exist, searching elsewhere", tool, path.display());
        }

        if let Some(dir) = &self.tools_dir {
            if let Some(path) = Self::find_in_tools_dir(dir, tool) {
                debug!("Using bundled tool: {} -> {}", tool, path.display());
                return Some(path);
            }
        }

        if let Some(path) = self.find_in_system_path(tool) {
            debug!("Using system tool: {} -> {}", tool, path.display());
            return Some(path);
        }

        debug!("Tool not found: {}", tool);
        None
    }

    /// `tools/<tool>`, `tools/<platform>/<tool>` or `tools/<platform>/<tool>/<tool>`
    fn find_in_tools_dir(tools_dir: &Path, tool: &str) -> Option<PathBuf> {
        let file_name = Self::executable_name(tool);
        let platform = platform_dir_name();

        [
            tools_dir.join(&file_name),
            tools_dir.join(platform).join(&file_name),
            tools_dir.join(platform).join(tool).join(&file_name),
        ]
        .into_iter()
        .find(|path| path.is_file())
    }

    fn find_in_system_path(&self, tool: &str) -> Option<PathBuf> {
        let file_name = Self::executable_name(tool);
        let search_path = self.search_path.as_ref()?;
        env::split_paths(search_path)
            .map(|dir| dir.join(&file_name))
            .find(|path| path.is_file())
    }

    /// Resolved path, or a `MissingDependency` error carrying install instructions
    pub fn check_tool_with_instructions(&self, tool: &str) -> Result<PathBuf> {
        self.resolve_tool(tool).ok_or_else(|| {
            CompressError::MissingDependency(format!(
                "'{}' not found. Install it with: {} (or set {})",
                tool,
                install_instructions(tool),
                TOOLS_DIR_ENV
            ))
        })
    }

    /// Check that every required tool is available
    pub fn verify_tools(&self) -> Result<()> {
        let missing: Vec<String> = REQUIRED_TOOLS
            .iter()
            .filter_map(|tool| self.check_tool_with_instructions(tool).err())
            .map(|e| e.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CompressError::MissingDependency(missing.join("\n")))
        }
    }

    /// Get a report of tool availability
    pub fn get_tools_report(&self) -> String {
        let mut report = String::new();
        report.push_str("Tool Path Resolver Report\n");
        report.push_str(&format!("System: {}\n", SystemInfo::current()));
        match &self.tools_dir {
            Some(dir) => report.push_str(&format!("Bundled tools dir: {}\n", dir.display())),
            None => report.push_str(&format!("Bundled tools dir: none ({} not set)\n", TOOLS_DIR_ENV)),
        }
        report.push_str("\nTool Availability:\n");

        for tool in REQUIRED_TOOLS {
            match self.resolve_tool(tool) {
                Some(path) => report.push_str(&format!("  ✅ {} -> {}\n", tool, path.display())),
                None => report.push_str(&format!("  ❌ {} (install with: {})\n", tool, install_instructions(tool))),
            }
        }

        report
    }
}

fn platform_dir_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "darwin"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        env::consts::OS
    }
}

/// Get installation instructions for a tool on this platform
fn install_instructions(tool: &str) -> String {
    let package = match tool {
        "ffmpeg" | "ffprobe" => "ffmpeg",
        other => other,
    };
    if cfg!(target_os = "macos") {
        format!("brew install {}", package)
    } else if cfg!(windows) {
        format!("winget install {}", package)
    } else {
        format!("sudo apt-get install {}", package)
    }
}

/// System information structure
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub family: &'static str,
}

impl SystemInfo {
    pub fn current() -> Self {
        Self {
            os: env::consts::OS,
            arch: env::consts::ARCH,
            family: env::consts::FAMILY,
        }
    }
}

impl std::fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.os, self.arch, self.family)
    }
}
