mod scene;
mod texture;
mod wood;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wgpu::SurfaceError;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseButton, Touch, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy},
    keyboard::{Key, NamedKey},
    window::{Window, WindowAttributes, WindowId},
};

pub use texture::GpuTexture;

use crate::config::RendererConfig;
use crate::events::{FrameInput, HostEvent, LoadCompleted, LoadRequest, UserIntent};
use crate::frame::{ContextState, FrameController, LoadVerdict};
use scene::{FrameScene, SceneSettings, effective_anisotropy};

/// Squared pointer travel below which a press/release counts as a tap.
const TAP_SLOP_SQ: f64 = 100.0;

#[derive(Debug)]
enum ViewerEvent {
    Cancelled,
    Input(FrameInput),
    Loaded(LoadCompleted),
    DeviceLost { epoch: u64, reason: String },
}

/// Channels connecting the viewer to the loader and the host.
pub struct ViewerChannels {
    pub host_events: mpsc::UnboundedSender<HostEvent>,
    pub inputs: mpsc::Receiver<FrameInput>,
    pub to_loader: mpsc::UnboundedSender<LoadRequest>,
    pub loaded: mpsc::Receiver<LoadCompleted>,
    pub intents: mpsc::Sender<UserIntent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureEnd {
    Tap,
    Drag,
}

/// Tracks one pointer (mouse or first touch) from press to release.
#[derive(Debug, Default)]
struct PointerGesture {
    position: (f64, f64),
    origin: Option<(f64, f64)>,
    touch: Option<u64>,
}

impl PointerGesture {
    fn press(&mut self) {
        self.origin = Some(self.position);
    }

    /// Cumulative displacement since the press, if one is active.
    fn moved(&mut self, x: f64, y: f64) -> Option<(f32, f32)> {
        self.position = (x, y);
        let (ox, oy) = self.origin?;
        Some(((x - ox) as f32, (y - oy) as f32))
    }

    fn release(&mut self) -> Option<GestureEnd> {
        let (ox, oy) = self.origin.take()?;
        self.touch = None;
        let (dx, dy) = (self.position.0 - ox, self.position.1 - oy);
        if dx * dx + dy * dy <= TAP_SLOP_SQ {
            Some(GestureEnd::Tap)
        } else {
            Some(GestureEnd::Drag)
        }
    }

    fn cancel(&mut self) {
        self.origin = None;
        self.touch = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrawOutcome {
    Presented,
    Skipped,
    Reconfigure,
    Lost(&'static str),
}

/// Whether another frame must follow `outcome`. A skipped frame is retried
/// as long as the controller is still animating.
fn wants_redraw(outcome: DrawOutcome, rendering: bool) -> bool {
    match outcome {
        DrawOutcome::Presented | DrawOutcome::Skipped => rendering,
        DrawOutcome::Reconfigure => true,
        DrawOutcome::Lost(_) => false,
    }
}

/// Every GPU object tied to one device. Dropped wholesale on context loss.
struct GpuState {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    device: wgpu::Device,
    queue: wgpu::Queue,
    scene: FrameScene,
    max_texture_dim: u32,
}

impl GpuState {
    fn new(
        cfg: &RendererConfig,
        window: Arc<Window>,
        epoch: u64,
        proxy: EventLoopProxy<ViewerEvent>,
    ) -> Result<Self> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: cfg.power_preference.into(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to acquire GPU adapter")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|fmt| fmt.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let anisotropic = adapter
            .get_downlevel_capabilities()
            .flags
            .contains(wgpu::DownlevelFlags::ANISOTROPIC_FILTERING);
        let limits = adapter.limits();
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("frame3d-device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits.clone(),
            ..Default::default()
        }))
        .context("failed to acquire GPU device")?;

        device.set_device_lost_callback(move |reason, message| {
            if reason == wgpu::DeviceLostReason::Destroyed {
                return;
            }
            let _ = proxy.send_event(ViewerEvent::DeviceLost {
                epoch,
                reason: message,
            });
        });

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!(
            width = config.width,
            height = config.height,
            format = ?config.format,
            epoch,
            "viewer surface configured",
        );

        let settings = SceneSettings {
            fov_deg: cfg.camera_fov_deg,
            fit_margin: cfg.fit_margin,
            anisotropy: effective_anisotropy(cfg.max_anisotropy, anisotropic),
        };
        let scene = FrameScene::new(&device, &queue, format, settings, (config.width, config.height));

        Ok(Self {
            surface,
            config,
            device,
            queue,
            scene,
            max_texture_dim: limits.max_texture_dimension_2d,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
        self.scene
            .resize(&self.device, self.config.width, self.config.height);
        debug!(
            width = self.config.width,
            height = self.config.height,
            "viewer surface resized",
        );
    }
}

struct ViewerApp {
    cfg: RendererConfig,
    background: wgpu::Color,
    cancel: CancellationToken,
    proxy: EventLoopProxy<ViewerEvent>,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    epoch: u64,
    controller: FrameController<GpuTexture>,
    to_loader: mpsc::UnboundedSender<LoadRequest>,
    intents: mpsc::Sender<UserIntent>,
    gesture: PointerGesture,
    pending_redraw: bool,
    retry_at: Option<Instant>,
    fatal: Option<anyhow::Error>,
}

impl ViewerApp {
    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
        if let Some(window) = self.window.as_ref() {
            return Some(window.clone());
        }

        let attrs = WindowAttributes::default().with_title("frame3d");
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                self.window = Some(window.clone());
                Some(window)
            }
            Err(err) => {
                error!(error = %err, "failed to create viewer window");
                None
            }
        }
    }

    /// Builds the GPU scene from scratch, both at first mount and after a loss.
    fn start_gpu(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = self.window.clone() else {
            return;
        };
        self.epoch += 1;
        match GpuState::new(&self.cfg, window, self.epoch, self.proxy.clone()) {
            Ok(gpu) => {
                self.gpu = Some(gpu);
                self.retry_at = None;
                self.controller.context_restored();
                if let Some(request) = self.controller.scene_ready() {
                    self.dispatch(request);
                }
                self.request_redraw();
            }
            Err(err) if self.controller.context_state() == ContextState::Lost => {
                warn!(error = ?err, epoch = self.epoch, "gpu context restore failed; retrying");
                self.retry_at = Some(Instant::now() + self.cfg.restore_retry);
            }
            Err(err) => {
                error!(error = ?err, "failed to initialize GPU state");
                self.fatal = Some(err);
                event_loop.exit();
            }
        }
    }

    fn lose_context(&mut self, reason: &str, retry: bool) {
        if self.gpu.is_none() {
            return;
        }
        warn!(reason, "viewer dropping gpu context");
        self.controller.context_lost();
        self.gesture.cancel();
        self.gpu = None;
        self.retry_at = retry.then(|| Instant::now() + self.cfg.restore_retry);
    }

    fn dispatch(&self, request: LoadRequest) {
        if let Err(err) = self.to_loader.send(request) {
            warn!(url = %err.0.url, "loader is gone; dropping load request");
        }
    }

    fn forward_intent(&self, intent: UserIntent) {
        if let Err(err) = self.intents.try_send(intent) {
            warn!(error = %err, "dropping user intent");
        }
    }

    fn request_redraw(&self) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn handle_resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.resize(new_size.width, new_size.height);
        }
        self.request_redraw();
    }

    fn draw(&mut self) -> DrawOutcome {
        let Some(gpu) = self.gpu.as_mut() else {
            return DrawOutcome::Skipped;
        };

        let frame = match gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Outdated) | Err(SurfaceError::Lost) => {
                info!("viewer surface lost; reconfiguring");
                return DrawOutcome::Reconfigure;
            }
            Err(SurfaceError::OutOfMemory) => return DrawOutcome::Lost("surface out of memory"),
            Err(SurfaceError::Timeout) => {
                warn!("viewer surface acquisition timed out");
                return DrawOutcome::Skipped;
            }
            Err(SurfaceError::Other) => {
                warn!("viewer surface reported an unknown error; retrying");
                return DrawOutcome::Reconfigure;
            }
        };

        let tick = self.controller.tick(Instant::now());
        let planes = self.controller.planes();
        gpu.scene.prepare(
            &gpu.device,
            &gpu.queue,
            self.controller.dimensions(),
            planes.current().map(|bound| &bound.texture),
            planes.next().map(|bound| &bound.texture),
            &tick,
        );

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });
        gpu.scene.render(&mut encoder, &view, self.background);
        gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        DrawOutcome::Presented
    }

    fn on_loaded(&mut self, done: LoadCompleted) {
        let Some(gpu) = self.gpu.as_ref() else {
            debug!(url = %done.url, "load completed without a gpu scene; dropping");
            return;
        };
        let url = done.url.clone();
        let verdict = self.controller.complete_load(done, Instant::now(), |image| {
            GpuTexture::upload(&gpu.device, &gpu.queue, image, gpu.max_texture_dim)
        });
        if let LoadVerdict::Bound { dimensions } = verdict {
            debug!(
                %url,
                width = dimensions.width,
                height = dimensions.height,
                depth = dimensions.depth,
                camera_distance = gpu.scene.camera().distance,
                "frame_mesh_sized"
            );
            self.request_redraw();
        }
    }

    fn on_key(&mut self, event_loop: &ActiveEventLoop, key: Key<&str>) {
        match key {
            Key::Named(NamedKey::ArrowRight) => self.forward_intent(UserIntent::Next),
            Key::Named(NamedKey::ArrowLeft) => self.forward_intent(UserIntent::Prev),
            Key::Named(NamedKey::Escape) => self.forward_intent(UserIntent::CloseInspect),
            Key::Character(c) if c.eq_ignore_ascii_case("q") => {
                info!("quit requested from keyboard");
                event_loop.exit();
            }
            Key::Character(c) if c.eq_ignore_ascii_case("l") => {
                self.lose_context("simulated from keyboard", true);
            }
            _ => {}
        }
    }

    fn pointer_moved(&mut self, x: f64, y: f64) {
        if let Some((dx, dy)) = self.gesture.moved(x, y) {
            self.controller.drag_to(dx, dy);
        }
    }

    fn pointer_pressed(&mut self) {
        self.gesture.press();
        self.controller.begin_drag();
    }

    fn pointer_released(&mut self) {
        if self.gesture.release() == Some(GestureEnd::Tap) {
            self.forward_intent(UserIntent::Tap);
        }
        self.controller.end_drag();
    }

    fn on_touch(&mut self, touch: Touch) {
        let id = touch.id;
        if self.gesture.touch.is_some_and(|active| active != id) {
            return;
        }
        let (x, y) = (touch.location.x, touch.location.y);
        match touch.phase {
            TouchPhase::Started => {
                self.gesture.touch = Some(id);
                self.gesture.moved(x, y);
                self.pointer_pressed();
            }
            TouchPhase::Moved => self.pointer_moved(x, y),
            TouchPhase::Ended => {
                self.gesture.moved(x, y);
                self.pointer_released();
            }
            TouchPhase::Cancelled => {
                self.gesture.cancel();
                self.controller.end_drag();
            }
        }
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            event_loop.exit();
            return;
        }

        if self.ensure_window(event_loop).is_none() {
            event_loop.exit();
            return;
        }

        if self.gpu.is_none() {
            self.start_gpu(event_loop);
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        self.lose_context("application suspended", false);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.clone() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("viewer window close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => self.handle_resize(new_size),
            WindowEvent::ScaleFactorChanged {
                mut inner_size_writer,
                ..
            } => {
                let size = window.inner_size();
                let _ = inner_size_writer.request_inner_size(size);
                self.handle_resize(size);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    self.on_key(event_loop, event.logical_key.as_ref());
                }
            }
            WindowEvent::CursorMoved { position, .. } => self.pointer_moved(position.x, position.y),
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => self.pointer_pressed(),
                ElementState::Released => self.pointer_released(),
            },
            WindowEvent::CursorLeft { .. } => {
                if self.controller.rotation().is_dragging() {
                    self.gesture.cancel();
                    self.controller.end_drag();
                }
            }
            WindowEvent::Touch(touch) => self.on_touch(touch),
            WindowEvent::RedrawRequested => {
                let outcome = self.draw();
                match outcome {
                    DrawOutcome::Presented | DrawOutcome::Skipped => {}
                    DrawOutcome::Reconfigure => self.handle_resize(window.inner_size()),
                    DrawOutcome::Lost(reason) => self.lose_context(reason, true),
                }
                self.pending_redraw = wants_redraw(outcome, self.controller.is_rendering());
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.pending_redraw {
            self.pending_redraw = false;
            self.request_redraw();
        }
        if let Some(at) = self.retry_at {
            if Instant::now() >= at {
                self.retry_at = None;
                info!("attempting gpu context restore");
                self.start_gpu(event_loop);
            }
        }
        match self.retry_at {
            Some(at) => event_loop.set_control_flow(ControlFlow::WaitUntil(at)),
            None => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Cancelled => {
                info!("viewer received cancellation event");
                event_loop.exit();
            }
            ViewerEvent::Input(input) => {
                if let Some(request) = self.controller.apply(input) {
                    self.dispatch(request);
                }
                self.request_redraw();
            }
            ViewerEvent::Loaded(done) => self.on_loaded(done),
            ViewerEvent::DeviceLost { epoch, reason } => {
                if epoch == self.epoch {
                    self.lose_context(&reason, true);
                } else {
                    debug!(epoch, current = self.epoch, "ignoring loss of a retired device");
                }
            }
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.controller.shutdown();
    }
}

fn forward<T, F>(
    mut rx: mpsc::Receiver<T>,
    proxy: EventLoopProxy<ViewerEvent>,
    wrap: F,
) -> tokio::task::JoinHandle<()>
where
    T: Send + 'static,
    F: Fn(T) -> ViewerEvent + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            if proxy.send_event(wrap(item)).is_err() {
                break;
            }
        }
    })
}

/// Runs the frame window on the calling thread until it closes or `cancel` fires.
pub fn run_windowed(
    cfg: RendererConfig,
    channels: ViewerChannels,
    cancel: CancellationToken,
) -> Result<()> {
    let background = cfg.background_color()?;
    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to build viewer event loop")?;
    let proxy = event_loop.create_proxy();

    let ViewerChannels {
        host_events,
        inputs,
        to_loader,
        loaded,
        intents,
    } = channels;

    let bridges = [
        {
            let cancel = cancel.clone();
            let proxy = proxy.clone();
            tokio::spawn(async move {
                cancel.cancelled().await;
                let _ = proxy.send_event(ViewerEvent::Cancelled);
            })
        },
        forward(inputs, proxy.clone(), ViewerEvent::Input),
        forward(loaded, proxy.clone(), ViewerEvent::Loaded),
    ];

    let mut app = ViewerApp {
        controller: FrameController::new(cfg.frame_settings(), host_events),
        cfg,
        background,
        cancel,
        proxy,
        window: None,
        gpu: None,
        epoch: 0,
        to_loader,
        intents,
        gesture: PointerGesture::default(),
        pending_redraw: false,
        retry_at: None,
        fatal: None,
    };
    let run_result = event_loop.run_app(&mut app);
    for bridge in bridges {
        bridge.abort();
    }

    if let Some(err) = app.fatal.take() {
        return Err(err);
    }
    run_result.context("viewer event loop failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_press_is_a_tap() {
        let mut gesture = PointerGesture::default();
        gesture.moved(100.0, 100.0);
        gesture.press();
        assert_eq!(gesture.moved(106.0, 108.0), Some((6.0, 8.0)));
        assert_eq!(gesture.release(), Some(GestureEnd::Tap));
        assert_eq!(gesture.release(), None);
    }

    #[test]
    fn long_travel_is_a_drag() {
        let mut gesture = PointerGesture::default();
        gesture.press();
        assert_eq!(gesture.moved(40.0, -30.0), Some((40.0, -30.0)));
        assert_eq!(gesture.release(), Some(GestureEnd::Drag));
    }

    #[test]
    fn timed_out_frame_is_retried_while_animating() {
        assert!(wants_redraw(DrawOutcome::Skipped, true));
        assert!(wants_redraw(DrawOutcome::Presented, true));
        assert!(wants_redraw(DrawOutcome::Reconfigure, false));
    }

    #[test]
    fn idle_or_lost_scene_stops_redrawing() {
        assert!(!wants_redraw(DrawOutcome::Skipped, false));
        assert!(!wants_redraw(DrawOutcome::Presented, false));
        assert!(!wants_redraw(DrawOutcome::Lost("surface out of memory"), true));
    }

    #[test]
    fn motion_without_press_is_not_a_drag() {
        let mut gesture = PointerGesture::default();
        assert_eq!(gesture.moved(10.0, 10.0), None);
        gesture.press();
        gesture.cancel();
        assert_eq!(gesture.moved(50.0, 50.0), None);
        assert_eq!(gesture.release(), None);
    }
}
