use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Host coordinate units per internal rendering unit.
    pub distance_scale: f64,
    /// How far outside the view volume nodes and labels may sit before they are culled.
    pub visibility_tolerance: f64,
    pub camera: CameraConfig,
    pub edges: EdgeConfig,
    pub picking: PickingConfig,
    pub main_fit: FitConfig,
    pub birds_eye_fit: FitConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            distance_scale: 180.0,
            visibility_tolerance: 0.1,
            camera: CameraConfig::default(),
            edges: EdgeConfig::default(),
            picking: PickingConfig::default(),
            main_fit: FitConfig {
                multiplier: 1.25,
                min_distance: 2.0,
            },
            birds_eye_fit: FitConfig {
                multiplier: 2.0,
                min_distance: 3.0,
            },
            scheduler: SchedulerConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub vertical_fov_deg: f64,
    pub z_near: f64,
    pub z_far: f64,
    pub orbit_speed: f64,
    /// Radians of orbit per pixel of mouse drag.
    pub drag_sensitivity: f64,
    pub zoom_speed: f64,
    pub near_limit: f64,
    pub far_limit: f64,
    pub default_distance: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            vertical_fov_deg: 45.0,
            z_near: 0.2,
            z_far: 2000.0,
            orbit_speed: 1.0,
            drag_sensitivity: 0.01,
            zoom_speed: 0.05,
            near_limit: 0.5,
            far_limit: 500.0,
            default_distance: 3.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    pub arc_segments: usize,
    pub self_loop_segments: usize,
    pub straight_segments: usize,
    pub dash_spacing: f64,
    pub dot_spacing: f64,
    pub self_loop_min_radius: f64,
    pub self_loop_radius_factor: f64,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            arc_segments: 8,
            self_loop_segments: 16,
            straight_segments: 2,
            dash_spacing: 0.08,
            dot_spacing: 0.04,
            self_loop_min_radius: 0.04,
            self_loop_radius_factor: 0.02,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickingConfig {
    pub single_pick_box: f64,
    /// Hit buffer capacity in 32-bit words for single-point picks.
    pub single_pick_buffer_words: usize,
    /// Line width, in pixels, edges are given during the selection pass.
    pub edge_pick_width: f64,
}

impl Default for PickingConfig {
    fn default() -> Self {
        Self {
            single_pick_box: 2.0,
            single_pick_buffer_words: 256,
            edge_pick_width: 4.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub multiplier: f64,
    pub min_distance: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            multiplier: 1.25,
            min_distance: 2.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub frame_interval_ms: u64,
    pub poll_interval_ms: u64,
    pub shutdown_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            poll_interval_ms: 150,
            shutdown_timeout_ms: 1000,
        }
    }
}

impl SchedulerConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl RenderConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        debug!(path = %path.display(), "render config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive("distance_scale", self.distance_scale)?;
        ensure_positive("camera.z_near", self.camera.z_near)?;
        ensure_positive("camera.near_limit", self.camera.near_limit)?;
        if !(self.camera.vertical_fov_deg > 0.0 && self.camera.vertical_fov_deg < 180.0) {
            return Err(Error::InvalidParameter(
                "camera.vertical_fov_deg must be in (0, 180)".to_string(),
            ));
        }
        if self.camera.z_far <= self.camera.z_near {
            return Err(Error::Config(
                "camera.z_far must be greater than camera.z_near".to_string(),
            ));
        }
        if self.camera.far_limit < self.camera.near_limit {
            return Err(Error::Config(
                "camera.far_limit must not be less than camera.near_limit".to_string(),
            ));
        }
        if self.visibility_tolerance < 0.0 {
            return Err(Error::InvalidParameter(
                "visibility_tolerance must be >= 0".to_string(),
            ));
        }
        if self.edges.arc_segments == 0 || self.edges.self_loop_segments == 0 {
            return Err(Error::InvalidParameter(
                "edge segment counts must be > 0".to_string(),
            ));
        }
        ensure_positive("edges.dash_spacing", self.edges.dash_spacing)?;
        ensure_positive("edges.dot_spacing", self.edges.dot_spacing)?;
        Ok(())
    }
}

fn ensure_positive(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0) {
        return Err(Error::InvalidParameter(format!("{name} must be > 0")));
    }
    Ok(())
}
