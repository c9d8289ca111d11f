use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use palette::{LinSrgba, Srgba};
use serde::Deserialize;

use crate::events::Rotation;
use crate::frame::{DEFAULT_DAMPING, DEFAULT_FADE_DURATION, FrameSettings};

pub const DEFAULT_BACKGROUND: &str = "#fdf9f2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerPreference {
    LowPower,
    HighPerformance,
}

impl From<PowerPreference> for wgpu::PowerPreference {
    fn from(value: PowerPreference) -> Self {
        match value {
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct RendererConfig {
    /// Vertical field of view of the perspective camera, in degrees.
    pub camera_fov_deg: f32,
    /// Extra room around the frame when fitting the camera distance.
    pub fit_margin: f32,
    #[serde(with = "humantime_serde")]
    pub fade_duration: Duration,
    /// Fraction of the remaining rotation error closed each frame.
    pub rotation_damping: f32,
    pub max_anisotropy: u16,
    pub power_preference: PowerPreference,
    /// Clear colour behind the frame, as `#rrggbb` or `#rrggbbaa`.
    pub background: String,
    /// Treat the session as preferring reduced motion and render nothing.
    pub reduced_motion: bool,
    /// Delay between attempts to re-acquire a lost GPU device.
    #[serde(with = "humantime_serde")]
    pub restore_retry: Duration,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            camera_fov_deg: 24.0,
            fit_margin: crate::frame::geometry::DEFAULT_FIT_MARGIN,
            fade_duration: DEFAULT_FADE_DURATION,
            rotation_damping: DEFAULT_DAMPING,
            max_anisotropy: 3,
            power_preference: PowerPreference::LowPower,
            background: DEFAULT_BACKGROUND.to_string(),
            reduced_motion: false,
            restore_retry: Duration::from_secs(1),
        }
    }
}

impl RendererConfig {
    pub fn frame_settings(&self) -> FrameSettings {
        FrameSettings {
            fade_duration: self.fade_duration,
            damping: self.rotation_damping,
        }
    }

    pub fn background_color(&self) -> Result<wgpu::Color> {
        parse_hex_color(&self.background)
            .map(to_wgpu_color)
            .with_context(|| format!("invalid background colour {:?}", self.background))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct LoaderConfig {
    pub max_concurrent_decodes: usize,
    /// User-Agent sent with http(s) image requests.
    pub user_agent: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent_decodes: 2,
            user_agent: concat!("frame3d/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct HostConfig {
    /// Advance to the next image automatically after this long.
    #[serde(with = "humantime_serde")]
    pub dwell: Option<Duration>,
    /// How long a navigation direction hint stays set.
    #[serde(with = "humantime_serde")]
    pub direction_reset: Duration,
    /// Re-request the wanted image when it has not shown up within this window.
    #[serde(with = "humantime_serde")]
    pub retry_after: Duration,
    pub max_retries: u32,
    pub shuffle: bool,
    pub shuffle_seed: Option<u64>,
    /// Rest pose applied while the inspect overlay is open.
    pub inspect_rest_rotation: Rotation,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            dwell: None,
            direction_reset: Duration::from_millis(620),
            retry_after: Duration::from_secs(4),
            max_retries: 2,
            shuffle: true,
            shuffle_seed: None,
            inspect_rest_rotation: Rotation::new(0.06, -0.18),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Image URLs in feed order: `http(s)://`, `file://` or plain paths.
    pub images: Vec<String>,
    pub renderer: RendererConfig,
    pub loader: LoaderConfig,
    pub host: HostConfig,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(!self.images.is_empty(), "images must list at least one url");
        ensure!(
            self.images.iter().all(|url| !url.trim().is_empty()),
            "images must not contain empty entries"
        );

        let renderer = &self.renderer;
        ensure!(
            renderer.camera_fov_deg > 0.0 && renderer.camera_fov_deg < 180.0,
            "renderer.camera-fov-deg must be within (0, 180)"
        );
        ensure!(
            renderer.fit_margin > 0.0,
            "renderer.fit-margin must be positive"
        );
        ensure!(
            renderer.rotation_damping > 0.0 && renderer.rotation_damping <= 1.0,
            "renderer.rotation-damping must be within (0, 1]"
        );
        ensure!(
            (1..=16).contains(&renderer.max_anisotropy),
            "renderer.max-anisotropy must be between 1 and 16"
        );
        ensure!(
            !renderer.fade_duration.is_zero(),
            "renderer.fade-duration must be greater than zero"
        );
        ensure!(
            !renderer.restore_retry.is_zero(),
            "renderer.restore-retry must be greater than zero"
        );
        renderer.background_color()?;

        ensure!(
            self.loader.max_concurrent_decodes > 0,
            "loader.max-concurrent-decodes must be greater than zero"
        );

        let host = &self.host;
        ensure!(
            !host.direction_reset.is_zero(),
            "host.direction-reset must be greater than zero"
        );
        ensure!(
            !host.retry_after.is_zero(),
            "host.retry-after must be greater than zero"
        );
        if let Some(dwell) = host.dwell {
            ensure!(!dwell.is_zero(), "host.dwell must be greater than zero");
        }
        Ok(self)
    }
}

pub fn parse_hex_color(input: &str) -> Result<LinSrgba<f32>> {
    let trimmed = input.trim();
    let srgba = match Srgba::<u8>::from_str(trimmed) {
        Ok(c) => c,
        Err(_) => {
            let rgb = palette::Srgb::<u8>::from_str(trimmed)
                .with_context(|| format!("expected #rrggbb or #rrggbbaa, got {trimmed:?}"))?;
            Srgba::new(rgb.red, rgb.green, rgb.blue, u8::MAX)
        }
    };
    let rgba_f32: Srgba<f32> = srgba.into_format();
    Ok(rgba_f32.into_linear())
}

pub fn to_wgpu_color(color: LinSrgba<f32>) -> wgpu::Color {
    wgpu::Color {
        r: color.red as f64,
        g: color.green as f64,
        b: color.blue as f64,
        a: color.alpha as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_convert_to_linear() {
        let white = parse_hex_color("#ffffff").unwrap();
        assert!((white.red - 1.0).abs() < 1e-6);
        assert!((white.alpha - 1.0).abs() < 1e-6);

        let translucent = parse_hex_color("#00000080").unwrap();
        assert!(translucent.red.abs() < 1e-6);
        assert!((translucent.alpha - 128.0 / 255.0).abs() < 1e-3);
    }

    #[test]
    fn rejects_garbage_colors() {
        assert!(parse_hex_color("sand").is_err());
    }

    #[test]
    fn frame_settings_follow_renderer_config() {
        let cfg = RendererConfig {
            fade_duration: Duration::from_millis(300),
            rotation_damping: 0.5,
            ..RendererConfig::default()
        };
        let settings = cfg.frame_settings();
        assert_eq!(settings.fade_duration, Duration::from_millis(300));
        assert!((settings.damping - 0.5).abs() < f32::EPSILON);
    }
}
