//! Two-plane crossfade between the currently shown texture and the next one.

use std::time::{Duration, Instant};

pub const DEFAULT_FADE_DURATION: Duration = Duration::from_millis(520);

/// A texture bound to one of the face planes, remembered with its source URL.
#[derive(Debug)]
pub struct BoundTexture<T> {
    pub texture: T,
    pub url: String,
}

#[derive(Debug, Clone, Copy)]
struct FadeState {
    start: Instant,
    duration: Duration,
}

impl FadeState {
    fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.start);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }
}

#[derive(Debug)]
pub enum BindOutcome<T> {
    /// Nothing was showing yet; the texture went straight onto the current plane.
    Immediate,
    /// A fade towards the texture began. `replaced` is a leftover next-plane
    /// texture from a cancelled fade that must now be released.
    FadeStarted { replaced: Option<T> },
}

#[derive(Debug)]
pub struct FadeCompleted<T> {
    pub url: String,
    /// The texture that was on the current plane before the fade.
    pub released: Option<T>,
}

#[derive(Debug)]
pub struct Crossfade<T> {
    current: Option<BoundTexture<T>>,
    next: Option<BoundTexture<T>>,
    current_opacity: f32,
    next_opacity: f32,
    fade: Option<FadeState>,
    duration: Duration,
}

impl<T> Crossfade<T> {
    pub fn new(duration: Duration) -> Self {
        Self {
            current: None,
            next: None,
            current_opacity: 1.0,
            next_opacity: 0.0,
            fade: None,
            duration,
        }
    }

    pub fn current(&self) -> Option<&BoundTexture<T>> {
        self.current.as_ref()
    }

    pub fn next(&self) -> Option<&BoundTexture<T>> {
        self.next.as_ref()
    }

    /// `(current, next)` plane opacities.
    pub fn opacities(&self) -> (f32, f32) {
        (self.current_opacity, self.next_opacity)
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    /// URL that is shown, or is on its way to being shown by an active fade.
    pub fn showing_url(&self) -> Option<&str> {
        if self.fade.is_some() {
            if let Some(next) = &self.next {
                return Some(&next.url);
            }
        }
        self.current.as_ref().map(|bound| bound.url.as_str())
    }

    /// Abandons an in-flight fade, snapping back to the current plane fully
    /// opaque. Returns whether a fade was active.
    pub fn cancel(&mut self) -> bool {
        if self.fade.take().is_none() {
            return false;
        }
        self.next_opacity = 0.0;
        self.current_opacity = 1.0;
        true
    }

    pub fn bind(&mut self, texture: T, url: String, now: Instant) -> BindOutcome<T> {
        if self.current.is_none() {
            self.current = Some(BoundTexture { texture, url });
            self.current_opacity = 1.0;
            let replaced = self.next.take();
            debug_assert!(replaced.is_none(), "next plane occupied without a current texture");
            self.next_opacity = 0.0;
            self.fade = None;
            return BindOutcome::Immediate;
        }

        let replaced = self.next.take().map(|bound| bound.texture);
        self.next = Some(BoundTexture { texture, url });
        self.next_opacity = 0.0;
        self.fade = Some(FadeState {
            start: now,
            duration: self.duration,
        });
        BindOutcome::FadeStarted { replaced }
    }

    /// Advances the active fade. Returns the completion once the next plane
    /// has reached full opacity and been promoted to current.
    pub fn tick(&mut self, now: Instant) -> Option<FadeCompleted<T>> {
        let fade = self.fade?;
        let t = fade.progress(now);
        self.next_opacity = t;
        self.current_opacity = 1.0 - t;
        if t < 1.0 {
            return None;
        }

        self.fade = None;
        let promoted = self.next.take()?;
        let url = promoted.url.clone();
        let released = self
            .current
            .replace(promoted)
            .map(|previous| previous.texture);
        self.current_opacity = 1.0;
        self.next_opacity = 0.0;
        Some(FadeCompleted { url, released })
    }

    /// Unbinds both planes and returns whatever textures they held.
    pub fn clear(&mut self) -> Vec<T> {
        self.fade = None;
        self.current_opacity = 1.0;
        self.next_opacity = 0.0;
        self.current
            .take()
            .into_iter()
            .chain(self.next.take())
            .map(|bound| bound.texture)
            .collect()
    }
}
