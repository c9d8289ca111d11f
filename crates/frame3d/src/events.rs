use serde::Deserialize;

use crate::frame::Generation;

/// Navigation hint supplied by the host alongside a new image request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

/// Euler rotation of the frame group, in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rotation {
    pub x: f32,
    pub y: f32,
}

impl Rotation {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Host -> renderer inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameInput {
    ShowImage(String),
    Direction(Option<Direction>),
    Frozen(bool),
    RestRotation(Rotation),
}

/// Health of the rendering pipeline as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    Loading,
    Ready,
    ContextLost,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::ContextLost => "context_lost",
        }
    }
}

/// Renderer -> host notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Status(RenderStatus),
    /// The URL is now fully visible on the current plane.
    TextureReady(String),
}

/// Window input the renderer does not consume itself and forwards to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserIntent {
    Next,
    Prev,
    Tap,
    CloseInspect,
}

/// Request for the loader task to fetch and decode `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub url: String,
    pub generation: Generation,
}

#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Result of a [`LoadRequest`], tagged with the generation it was issued under.
#[derive(Debug)]
pub struct LoadCompleted {
    pub url: String,
    pub generation: Generation,
    pub outcome: Result<DecodedImage, crate::tasks::loader::LoadError>,
}
