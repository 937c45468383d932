//! Accelerator detection for OCR / embedding inference.
//!
//! Looks for NVIDIA device nodes or the driver's proc entry. `LAYTIME_FORCE_CPU`
//! disables detection. Conservative: anything unexpected means CPU.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceleratorKind {
    Cuda,
    CpuOnly,
}

impl std::fmt::Display for AcceleratorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cuda => write!(f, "CUDA"),
            Self::CpuOnly => write!(f, "CPU only"),
        }
    }
}

/// Inference hardware visible to this process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceleratorProfile {
    pub kind: AcceleratorKind,
    /// What the detection matched on (device node or driver file).
    pub evidence: Option<String>,
    /// Detection skipped because `LAYTIME_FORCE_CPU` is set.
    pub forced_cpu: bool,
    /// ISO 8601 timestamp when detection occurred.
    pub detected_at: String,
}

impl AcceleratorProfile {
    pub fn is_accelerated(&self) -> bool {
        self.kind != AcceleratorKind::CpuOnly
    }

    pub fn cpu_fallback() -> Self {
        Self {
            kind: AcceleratorKind::CpuOnly,
            evidence: None,
            forced_cpu: false,
            detected_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Detection
// ═══════════════════════════════════════════════════════════

const NVIDIA_PROBES: &[&str] = &["/dev/nvidia0", "/proc/driver/nvidia/version"];

/// Detect the accelerator profile of this machine. Never fails.
pub fn detect_accelerator() -> AcceleratorProfile {
    let force_cpu = std::env::var("LAYTIME_FORCE_CPU")
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    let probes: Vec<PathBuf> = NVIDIA_PROBES.iter().map(PathBuf::from).collect();
    detect_with(force_cpu, &probes)
}

fn detect_with(force_cpu: bool, probes: &[PathBuf]) -> AcceleratorProfile {
    let _span = tracing::info_span!("accelerator_detect").entered();

    if force_cpu {
        tracing::info!("LAYTIME_FORCE_CPU set, skipping accelerator detection");
        return AcceleratorProfile {
            forced_cpu: true,
            ..AcceleratorProfile::cpu_fallback()
        };
    }

    match probes.iter().find(|p| p.exists()) {
        Some(hit) => {
            let profile = AcceleratorProfile {
                kind: AcceleratorKind::Cuda,
                evidence: Some(hit.display().to_string()),
                forced_cpu: false,
                detected_at: chrono::Utc::now().to_rfc3339(),
            };
            tracing::info!(kind = %profile.kind, evidence = %hit.display(), "Accelerator detected");
            profile
        }
        None => {
            tracing::info!("No accelerator found, assuming CPU");
            AcceleratorProfile::cpu_fallback()
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_cpu_ignores_devices() {
        let dir = tempfile::tempdir().unwrap();
        let device = dir.path().join("nvidia0");
        std::fs::write(&device, b"").unwrap();

        let profile = detect_with(true, &[device]);
        assert_eq!(profile.kind, AcceleratorKind::CpuOnly);
        assert!(profile.forced_cpu);
        assert!(!profile.is_accelerated());
    }

    #[test]
    fn device_node_means_cuda() {
        let dir = tempfile::tempdir().unwrap();
        let device = dir.path().join("nvidia0");
        std::fs::write(&device, b"").unwrap();

        let profile = detect_with(false, &[dir.path().join("missing"), device.clone()]);
        assert_eq!(profile.kind, AcceleratorKind::Cuda);
        assert_eq!(profile.evidence, Some(device.display().to_string()));
        assert!(profile.is_accelerated());
    }

    #[test]
    fn nothing_found_is_cpu() {
        let dir = tempfile::tempdir().unwrap();
        let profile = detect_with(false, &[dir.path().join("missing")]);
        assert_eq!(profile, AcceleratorProfile {
            detected_at: profile.detected_at.clone(),
            ..AcceleratorProfile::cpu_fallback()
        });
    }

    #[test]
    fn cpu_fallback_is_conservative() {
        let profile = AcceleratorProfile::cpu_fallback();
        assert_eq!(profile.kind, AcceleratorKind::CpuOnly);
        assert!(profile.evidence.is_none());
        assert!(!profile.forced_cpu);
    }

    #[test]
    fn kind_display_and_serde() {
        assert_eq!(AcceleratorKind::CpuOnly.to_string(), "CPU only");
        assert_eq!(serde_json::to_string(&AcceleratorKind::Cuda).unwrap(), "\"cuda\"");
    }

    #[test]
    fn detect_never_panics() {
        let _ = detect_accelerator();
    }
}
