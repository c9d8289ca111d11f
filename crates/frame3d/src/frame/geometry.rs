//! Frame dimensions, face-plane placement and camera fitting.

/// Height of the frame in world units; width follows the image aspect.
pub const BASE_HEIGHT: f32 = 1.0;
pub const MIN_WIDTH: f32 = 0.25;
pub const MIN_DEPTH: f32 = 0.06;
pub const DEPTH_RATIO: f32 = 0.12;
pub const DEFAULT_FIT_MARGIN: f32 = 1.35;

const PLANE_OFFSET: f32 = 0.001;
const NEXT_PLANE_OFFSET: f32 = 0.0025;
const MIN_NEAR: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameDimensions {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

impl Default for FrameDimensions {
    fn default() -> Self {
        Self {
            width: 0.75,
            height: BASE_HEIGHT,
            depth: 0.12,
        }
    }
}

impl FrameDimensions {
    pub fn for_aspect(aspect: f32) -> Self {
        let width = (aspect * BASE_HEIGHT).max(MIN_WIDTH);
        let height = BASE_HEIGHT;
        let depth = (width.min(height) * DEPTH_RATIO).max(MIN_DEPTH);
        Self {
            width,
            height,
            depth,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }

    /// Aspect of a decoded image, falling back to `fallback` when either
    /// dimension is missing.
    pub fn image_aspect(width: u32, height: u32, fallback: f32) -> f32 {
        if width == 0 || height == 0 {
            return fallback;
        }
        width as f32 / height as f32
    }

    /// Z of the current face plane, just proud of the front face.
    pub fn current_plane_z(&self) -> f32 {
        self.depth / 2.0 + PLANE_OFFSET
    }

    pub fn next_plane_z(&self) -> f32 {
        self.current_plane_z() + NEXT_PLANE_OFFSET
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFit {
    pub distance: f32,
    pub near: f32,
    pub far: f32,
}

/// Minimal camera distance along the view axis so the mesh fits both the
/// vertical and horizontal frustum, scaled by `margin`.
pub fn fit_camera(
    vertical_fov_deg: f32,
    viewport_aspect: f32,
    mesh_width: f32,
    mesh_height: f32,
    margin: f32,
) -> CameraFit {
    let aspect = if viewport_aspect.is_finite() && viewport_aspect > 0.0 {
        viewport_aspect
    } else {
        1.0
    };
    let half_v = vertical_fov_deg.to_radians() / 2.0;
    let dist_h = (mesh_height / 2.0) / half_v.tan();
    let half_h = (half_v.tan() * aspect).atan();
    let dist_w = (mesh_width / 2.0) / half_h.tan();

    let distance = dist_h.max(dist_w) * margin;
    CameraFit {
        distance,
        near: (distance / 10.0).max(MIN_NEAR),
        far: distance * 10.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_tracks_short_side_with_floor() {
        let wide = FrameDimensions::for_aspect(2.0);
        assert!((wide.width - 2.0).abs() < 1e-6);
        assert!((wide.depth - 0.12).abs() < 1e-6);

        let narrow = FrameDimensions::for_aspect(0.3);
        assert!((narrow.depth - 0.06).abs() < 1e-6);

        let sliver = FrameDimensions::for_aspect(0.1);
        assert!((sliver.width - MIN_WIDTH).abs() < 1e-6);
    }

    #[test]
    fn next_plane_sits_in_front() {
        let dims = FrameDimensions::default();
        assert!(dims.next_plane_z() > dims.current_plane_z());
        assert!(dims.current_plane_z() > dims.depth / 2.0);
    }

    #[test]
    fn image_aspect_falls_back_when_dimensions_missing() {
        assert!((FrameDimensions::image_aspect(0, 100, 0.75) - 0.75).abs() < 1e-6);
        assert!((FrameDimensions::image_aspect(200, 100, 0.75) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn tall_mesh_is_height_bound() {
        let fit = fit_camera(24.0, 1.0, 0.5, 1.0, 1.0);
        let expected = 0.5 / 12f32.to_radians().tan();
        assert!((fit.distance - expected).abs() < 1e-4);
    }

    #[test]
    fn wide_mesh_in_narrow_viewport_is_width_bound() {
        let fit = fit_camera(24.0, 0.5, 2.0, 1.0, 1.0);
        let half_h = (12f32.to_radians().tan() * 0.5).atan();
        let expected = 1.0 / half_h.tan();
        assert!((fit.distance - expected).abs() < 1e-4);
    }

    #[test]
    fn margin_and_clip_planes_scale_with_distance() {
        let bare = fit_camera(24.0, 1.5, 0.75, 1.0, 1.0);
        let fit = fit_camera(24.0, 1.5, 0.75, 1.0, DEFAULT_FIT_MARGIN);
        assert!((fit.distance - bare.distance * 1.35).abs() < 1e-4);
        assert!((fit.near - fit.distance / 10.0).abs() < 1e-6);
        assert!((fit.far - fit.distance * 10.0).abs() < 1e-4);
    }

    #[test]
    fn near_plane_has_a_floor() {
        let fit = fit_camera(24.0, 1.0, 0.001, 0.001, 1.0);
        assert!((fit.near - 0.01).abs() < 1e-6);
    }
}
