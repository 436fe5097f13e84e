//! Hardware summary for the `/checkup` route

use async_trait::async_trait;
use std::fmt;
use tokio::process::Command;

/// GPUs visible to the server
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardwareSummary {
    /// Names of the detected GPUs, empty when there are none
    pub gpu_names: Vec<String>,
}

impl HardwareSummary {
    /// Whether at least one GPU was found
    pub fn gpu_available(&self) -> bool {
        !self.gpu_names.is_empty()
    }
}

impl fmt::Display for HardwareSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.gpu_available() {
            write!(
                f,
                "GPU available: true\nGPU: {}",
                self.gpu_names.join(", ")
            )
        } else {
            write!(f, "GPU available: false\nGPU: none")
        }
    }
}

/// Source of the hardware summary
#[async_trait]
pub trait HardwareProbe: Send + Sync {
    /// Inspect the machine. Probing never fails; missing tools mean no GPU.
    async fn probe(&self) -> HardwareSummary;
}

/// Asks `nvidia-smi` for the installed GPUs
#[derive(Debug, Clone)]
pub struct NvidiaSmiProbe {
    program: String,
}

impl NvidiaSmiProbe {
    /// Run `program` in place of `nvidia-smi`, with the same arguments
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for NvidiaSmiProbe {
    fn default() -> Self {
        Self::with_program("nvidia-smi")
    }
}

#[async_trait]
impl HardwareProbe for NvidiaSmiProbe {
    async fn probe(&self) -> HardwareSummary {
        let output = Command::new(&self.program)
            .args(["--query-gpu=name", "--format=csv,noheader"])
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => HardwareSummary {
                gpu_names: parse_gpu_names(&String::from_utf8_lossy(&output.stdout)),
            },
            Ok(output) => {
                tracing::debug!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                HardwareSummary::default()
            }
            Err(e) => {
                tracing::debug!("{} not available: {}", self.program, e);
                HardwareSummary::default()
            }
        }
    }
}

/// One GPU name per non-empty line
pub fn parse_gpu_names(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
