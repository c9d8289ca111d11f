//! One-shot check of whether the 3D frame can run at all on this machine.

use tracing::{debug, info};

use crate::config::RendererConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Supported,
    /// Nothing will be rendered for the lifetime of the process.
    Unsupported(UnsupportedReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsupportedReason {
    ReducedMotion,
    NoGpuAdapter,
}

impl UnsupportedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReducedMotion => "reduced_motion",
            Self::NoGpuAdapter => "no_gpu_adapter",
        }
    }
}

/// Reduced motion is checked before the adapter probe.
pub fn probe(cfg: &RendererConfig) -> Environment {
    probe_with(cfg, has_gpu_adapter)
}

pub fn probe_with(
    cfg: &RendererConfig,
    adapter_available: impl FnOnce(wgpu::PowerPreference) -> bool,
) -> Environment {
    if cfg.reduced_motion {
        info!("reduced motion requested; 3d frame disabled");
        return Environment::Unsupported(UnsupportedReason::ReducedMotion);
    }
    if !adapter_available(cfg.power_preference.into()) {
        info!("no compatible gpu adapter; 3d frame disabled");
        return Environment::Unsupported(UnsupportedReason::NoGpuAdapter);
    }
    Environment::Supported
}

fn has_gpu_adapter(power_preference: wgpu::PowerPreference) -> bool {
    let instance = wgpu::Instance::default();
    match pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference,
        compatible_surface: None,
        force_fallback_adapter: false,
    })) {
        Ok(adapter) => {
            let info = adapter.get_info();
            debug!(name = %info.name, backend = ?info.backend, "gpu_adapter_probed");
            true
        }
        Err(err) => {
            debug!(error = %err, "gpu_adapter_probe_failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduced_motion_skips_adapter_probe() {
        let cfg = RendererConfig {
            reduced_motion: true,
            ..RendererConfig::default()
        };
        let env = probe_with(&cfg, |_| panic!("adapter must not be probed"));
        assert_eq!(
            env,
            Environment::Unsupported(UnsupportedReason::ReducedMotion)
        );
    }

    #[test]
    fn missing_adapter_is_unsupported() {
        let cfg = RendererConfig::default();
        assert_eq!(
            probe_with(&cfg, |_| false),
            Environment::Unsupported(UnsupportedReason::NoGpuAdapter)
        );
        assert_eq!(probe_with(&cfg, |_| true), Environment::Supported);
    }

    #[test]
    fn probe_requests_configured_power_preference() {
        let cfg = RendererConfig::default();
        let mut seen = None;
        probe_with(&cfg, |pref| {
            seen = Some(pref);
            true
        });
        assert_eq!(seen, Some(wgpu::PowerPreference::LowPower));
    }
}
