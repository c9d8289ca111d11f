//! Renderer-side state for the picture frame.
//!
//! [`FrameController`] owns everything that decides *what* the GPU scene
//! should show: the two face-plane bindings and their crossfade, the damped
//! rotation, the load generation counter and the context-loss state. The
//! viewer projects it onto `wgpu` objects once per frame and can throw those
//! objects away at any time (context loss) and replay the controller into a
//! fresh scene.
//!
//! The controller is generic over the texture handle so it can be driven
//! without a GPU.

pub mod crossfade;
pub mod geometry;
pub mod recovery;
pub mod rotation;
pub mod sequence;

use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::events::{
    DecodedImage, FrameInput, HostEvent, LoadCompleted, LoadRequest, RenderStatus, Rotation,
};

pub use crossfade::{BindOutcome, BoundTexture, Crossfade, DEFAULT_FADE_DURATION};
pub use geometry::{CameraFit, FrameDimensions, fit_camera};
pub use recovery::{ContextRecovery, ContextState};
pub use rotation::{DEFAULT_DAMPING, RotationController};
pub use sequence::{Generation, LoadSequence};

/// GPU resource that must be explicitly freed once unbound.
pub trait Release {
    fn release(self);
}

#[derive(Debug, Clone, Copy)]
pub struct FrameSettings {
    pub fade_duration: Duration,
    pub damping: f32,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            fade_duration: DEFAULT_FADE_DURATION,
            damping: DEFAULT_DAMPING,
        }
    }
}

/// What the scene needs to draw one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    pub rotation: Rotation,
    pub current_opacity: f32,
    pub next_opacity: f32,
}

/// Result of handing a finished load to the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadVerdict {
    Failed,
    Superseded,
    /// Bound to a plane; `dimensions` is the mesh size it was bound at.
    Bound { dimensions: FrameDimensions },
}

pub struct FrameController<T> {
    sequence: LoadSequence,
    planes: Crossfade<T>,
    rotation: RotationController,
    recovery: ContextRecovery,
    dimensions: FrameDimensions,
    scene_ready: bool,
    pending_url: Option<String>,
    latest_requested: Option<String>,
    last_bound: Option<String>,
    displayed: Option<String>,
    events: UnboundedSender<HostEvent>,
}

impl<T: Release> FrameController<T> {
    pub fn new(settings: FrameSettings, events: UnboundedSender<HostEvent>) -> Self {
        Self {
            sequence: LoadSequence::new(),
            planes: Crossfade::new(settings.fade_duration),
            rotation: RotationController::new(settings.damping),
            recovery: ContextRecovery::new(),
            dimensions: FrameDimensions::default(),
            scene_ready: false,
            pending_url: None,
            latest_requested: None,
            last_bound: None,
            displayed: None,
            events,
        }
    }

    pub fn planes(&self) -> &Crossfade<T> {
        &self.planes
    }

    pub fn rotation(&self) -> &RotationController {
        &self.rotation
    }

    pub fn dimensions(&self) -> FrameDimensions {
        self.dimensions
    }

    pub fn context_state(&self) -> ContextState {
        self.recovery.state()
    }

    /// Whether the render loop should keep scheduling frames.
    pub fn is_rendering(&self) -> bool {
        self.scene_ready && !self.recovery.is_lost()
    }

    pub fn pending_url(&self) -> Option<&str> {
        self.pending_url.as_deref()
    }

    pub fn displayed_url(&self) -> Option<&str> {
        self.displayed.as_deref()
    }

    pub fn apply(&mut self, input: FrameInput) -> Option<LoadRequest> {
        match input {
            FrameInput::ShowImage(url) => self.request_image(url),
            FrameInput::Direction(direction) => {
                self.rotation.set_direction(direction);
                None
            }
            FrameInput::Frozen(frozen) => {
                self.rotation.set_frozen(frozen);
                None
            }
            FrameInput::RestRotation(rest) => {
                self.rotation.set_rest(rest);
                None
            }
        }
    }

    pub fn request_image(&mut self, url: String) -> Option<LoadRequest> {
        if url.is_empty() {
            return None;
        }
        self.latest_requested = Some(url.clone());
        if !self.scene_ready {
            debug!(%url, "scene_not_ready_deferring_request");
            self.pending_url = Some(url);
            return None;
        }
        if self.planes.showing_url() == Some(url.as_str()) {
            return None;
        }
        Some(self.queue_texture(url))
    }

    fn queue_texture(&mut self, url: String) -> LoadRequest {
        self.emit(HostEvent::Status(RenderStatus::Loading));
        if self.planes.cancel() {
            debug!("crossfade_cancelled_by_new_request");
        }
        let generation = self.sequence.issue();
        debug!(%url, %generation, "texture_load_issued");
        LoadRequest { url, generation }
    }

    /// Marks the GPU scene as built and issues any request held while it was not.
    pub fn scene_ready(&mut self) -> Option<LoadRequest> {
        self.scene_ready = true;
        let url = self.pending_url.take()?;
        Some(self.queue_texture(url))
    }

    /// Accepts a finished load. `upload` turns the decoded pixels into a
    /// texture and is only invoked for the current generation.
    pub fn complete_load<F>(&mut self, done: LoadCompleted, now: Instant, upload: F) -> LoadVerdict
    where
        F: FnOnce(&DecodedImage) -> T,
    {
        let LoadCompleted {
            url,
            generation,
            outcome,
        } = done;

        if !self.sequence.is_current(generation) {
            debug!(%url, %generation, latest = %self.sequence.latest(), "texture_load_superseded");
            return LoadVerdict::Superseded;
        }
        let image = match outcome {
            Ok(image) => image,
            Err(err) => {
                warn!(%url, %generation, error = %err, "texture_load_failed");
                return LoadVerdict::Failed;
            }
        };
        if self.recovery.is_lost() || !self.scene_ready {
            debug!(%url, "texture_load_dropped_without_scene");
            return LoadVerdict::Superseded;
        }

        let aspect =
            FrameDimensions::image_aspect(image.width, image.height, self.dimensions.aspect());
        self.dimensions = FrameDimensions::for_aspect(aspect);
        let texture = upload(&image);

        self.last_bound = Some(url.clone());
        match self.planes.bind(texture, url.clone(), now) {
            BindOutcome::Immediate => {
                info!(%url, "texture_bound_first");
                self.became_visible(url);
            }
            BindOutcome::FadeStarted { replaced } => {
                debug!(%url, "crossfade_started");
                if let Some(texture) = replaced {
                    self.dispose(texture);
                }
            }
        }
        LoadVerdict::Bound {
            dimensions: self.dimensions,
        }
    }

    /// Advances the crossfade and rotation by one frame.
    pub fn tick(&mut self, now: Instant) -> FrameTick {
        if let Some(done) = self.planes.tick(now) {
            if let Some(previous) = done.released {
                self.dispose(previous);
            }
            debug!(url = %done.url, "crossfade_completed");
            self.became_visible(done.url);
        }
        let rotation = self.rotation.tick();
        let (current_opacity, next_opacity) = self.planes.opacities();
        FrameTick {
            rotation,
            current_opacity,
            next_opacity,
        }
    }

    pub fn begin_drag(&mut self) {
        self.rotation.begin_drag();
    }

    pub fn drag_to(&mut self, dx: f32, dy: f32) {
        self.rotation.drag_to(dx, dy);
    }

    pub fn end_drag(&mut self) {
        self.rotation.end_drag();
    }

    pub fn context_lost(&mut self) {
        if !self.recovery.mark_lost() {
            return;
        }
        warn!(losses = self.recovery.losses(), "gpu_context_lost");
        self.scene_ready = false;
        self.emit(HostEvent::Status(RenderStatus::ContextLost));
    }

    /// Called once a new GPU context is available. Forgets every binding from
    /// the dead context and queues the reload target until the rebuilt scene
    /// reports ready.
    pub fn context_restored(&mut self) {
        if !self.recovery.mark_restored() {
            return;
        }
        self.emit(HostEvent::Status(RenderStatus::Loading));
        // A request made while the context was down takes precedence.
        let target = self.pending_url.take().or_else(|| {
            ContextRecovery::reload_target(
                self.last_bound.as_deref(),
                self.displayed.as_deref(),
                self.latest_requested.as_deref(),
            )
        });
        info!(reload = target.as_deref().unwrap_or("<none>"), "gpu_context_restored");
        self.pending_url = target;
        // Handles belong to the lost device; dropping them is all that is allowed.
        drop(self.planes.clear());
        self.sequence.invalidate();
        self.scene_ready = false;
    }

    /// Releases every bound texture unless the context is not live.
    pub fn shutdown(&mut self) {
        let textures = self.planes.clear();
        if !self.recovery.may_dispose() {
            debug!(count = textures.len(), "shutdown_skipping_disposal");
            return;
        }
        for texture in textures {
            texture.release();
        }
    }

    fn became_visible(&mut self, url: String) {
        self.displayed = Some(url.clone());
        self.recovery.mark_ready();
        self.emit(HostEvent::TextureReady(url));
        self.emit(HostEvent::Status(RenderStatus::Ready));
    }

    fn dispose(&self, texture: T) {
        if self.recovery.may_dispose() {
            texture.release();
        } else {
            debug!("texture_disposal_skipped_during_recovery");
        }
    }

    fn emit(&self, event: HostEvent) {
        if self.events.send(event).is_err() {
            debug!("host_event_receiver_gone");
        }
    }
}
