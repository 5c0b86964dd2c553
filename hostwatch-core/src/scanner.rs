use crate::error::ScanError;
use crate::platform::{self, ListenerCommand, PlatformAdapter};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Raw listener command output, or a description of why it failed.
    pub open_ports: String,
    pub insecure_files: Vec<PathBuf>,
    pub scanned_at: chrono::DateTime<chrono::Utc>,
}

pub struct SecurityScanner {
    adapter: Arc<dyn PlatformAdapter>,
}

impl SecurityScanner {
    pub fn new(adapter: Arc<dyn PlatformAdapter>) -> Self {
        Self { adapter }
    }

    pub fn native() -> Self {
        Self::new(platform::native())
    }

    /// Runs both checks. Never fails; problems end up in the result text or
    /// in the warning log.
    pub fn scan(&self, directories: &[PathBuf]) -> ScanResult {
        let open_ports = self.open_ports();
        let insecure_files = self.insecure_files(directories);

        tracing::debug!(
            directories = directories.len(),
            insecure = insecure_files.len(),
            "security scan finished"
        );

        ScanResult {
            open_ports,
            insecure_files,
            scanned_at: chrono::Utc::now(),
        }
    }

    pub fn open_ports(&self) -> String {
        match run_listener_command(&self.adapter.open_ports_command()) {
            Ok(output) => output,
            Err(e) => format!("Error retrieving open ports: {}", e),
        }
    }

    /// Directories are swept in order; overlapping directories report the
    /// same file more than once.
    pub fn insecure_files(&self, directories: &[PathBuf]) -> Vec<PathBuf> {
        directories
            .iter()
            .flat_map(|dir| self.adapter.list_insecure_files(dir))
            .collect()
    }
}

fn run_listener_command(command: &ListenerCommand) -> Result<String, ScanError> {
    let output = Command::new(command.program)
        .args(command.args)
        .output()
        .map_err(|source| ScanError::Spawn {
            command: command.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(ScanError::CommandFailed {
            command: command.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
