use anyhow::Result;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender, UnboundedReceiver};
use tokio::time::{Duration, Instant, Sleep, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::HostConfig;
use crate::events::{Direction, FrameInput, HostEvent, RenderStatus, Rotation, UserIntent};

/// Feed position and inspect state of the demo host.
///
/// `requested` is the entry the frame has been asked to show; `displayed` is
/// the last entry the frame confirmed visible. The loader overlay is shown
/// whenever the two differ or the GPU context is lost.
#[derive(Debug)]
pub struct FeedState {
    feed: Vec<String>,
    requested: usize,
    displayed: Option<usize>,
    inspecting: bool,
    inspect_rest: Rotation,
    status: RenderStatus,
    retries: u32,
}

impl FeedState {
    pub fn new(feed: Vec<String>, inspect_rest: Rotation) -> Self {
        Self {
            feed,
            requested: 0,
            displayed: None,
            inspecting: false,
            inspect_rest,
            status: RenderStatus::Loading,
            retries: 0,
        }
    }

    pub fn shuffled(mut feed: Vec<String>, inspect_rest: Rotation, rng: &mut StdRng) -> Self {
        feed.shuffle(rng);
        Self::new(feed, inspect_rest)
    }

    pub fn feed(&self) -> &[String] {
        &self.feed
    }

    pub fn requested_url(&self) -> &str {
        self.feed.get(self.requested).map_or("", String::as_str)
    }

    pub fn displayed_url(&self) -> Option<&str> {
        self.displayed
            .and_then(|idx| self.feed.get(idx))
            .map(String::as_str)
    }

    pub fn is_inspecting(&self) -> bool {
        self.inspecting
    }

    pub fn status(&self) -> RenderStatus {
        self.status
    }

    pub fn loader_visible(&self) -> bool {
        self.status == RenderStatus::ContextLost || self.displayed != Some(self.requested)
    }

    /// Inputs that put a freshly mounted frame into a known state.
    pub fn startup(&self) -> Vec<FrameInput> {
        vec![
            FrameInput::RestRotation(Rotation::ZERO),
            FrameInput::Frozen(false),
            FrameInput::Direction(None),
            FrameInput::ShowImage(self.requested_url().to_string()),
        ]
    }

    pub fn navigate(&mut self, direction: Direction) -> Vec<FrameInput> {
        let mut out = self.set_inspecting(false);
        let len = self.feed.len();
        if len == 0 {
            return out;
        }
        self.requested = match direction {
            Direction::Next => (self.requested + 1) % len,
            Direction::Prev => (self.requested + len - 1) % len,
        };
        self.retries = 0;
        out.push(FrameInput::Direction(Some(direction)));
        out.push(FrameInput::ShowImage(self.requested_url().to_string()));
        out
    }

    pub fn toggle_inspect(&mut self) -> Vec<FrameInput> {
        self.set_inspecting(!self.inspecting)
    }

    pub fn close_inspect(&mut self) -> Vec<FrameInput> {
        self.set_inspecting(false)
    }

    fn set_inspecting(&mut self, inspecting: bool) -> Vec<FrameInput> {
        if self.inspecting == inspecting {
            return Vec::new();
        }
        self.inspecting = inspecting;
        let rest = if inspecting {
            self.inspect_rest
        } else {
            Rotation::ZERO
        };
        vec![FrameInput::Frozen(inspecting), FrameInput::RestRotation(rest)]
    }

    pub fn set_status(&mut self, status: RenderStatus) {
        self.status = status;
    }

    /// Returns `true` when `url` is the requested entry and it is now displayed.
    pub fn texture_ready(&mut self, url: &str) -> bool {
        if url != self.requested_url() {
            return false;
        }
        self.displayed = Some(self.requested);
        self.retries = 0;
        true
    }

    /// Re-request the wanted entry if it is still loading and retries remain.
    pub fn retry(&mut self, max_retries: u32) -> Option<FrameInput> {
        if self.status != RenderStatus::Loading
            || self.displayed == Some(self.requested)
            || self.retries >= max_retries
        {
            return None;
        }
        self.retries += 1;
        Some(FrameInput::ShowImage(self.requested_url().to_string()))
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }
}

fn sleep_until_opt(deadline: Option<Instant>) -> Sleep {
    sleep_until(deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400)))
}

async fn send_all(to_frame: &Sender<FrameInput>, inputs: Vec<FrameInput>) -> bool {
    for input in inputs {
        if to_frame.send(input).await.is_err() {
            warn!("frame input channel closed");
            return false;
        }
    }
    true
}

/// Stand-in for the feed UI: walks the configured images, forwards navigation
/// and inspect toggles to the frame, and re-requests images that fail to show.
pub async fn run(
    cfg: HostConfig,
    images: Vec<String>,
    seed_override: Option<u64>,
    mut intents: Receiver<UserIntent>,
    mut host_events: UnboundedReceiver<HostEvent>,
    to_frame: Sender<FrameInput>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut feed = if cfg.shuffle {
        let mut rng = match seed_override.or(cfg.shuffle_seed) {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        FeedState::shuffled(images, cfg.inspect_rest_rotation, &mut rng)
    } else {
        FeedState::new(images, cfg.inspect_rest_rotation)
    };
    info!(images = feed.feed().len(), first = feed.requested_url(), "host feed ready");

    if !send_all(&to_frame, feed.startup()).await {
        return Ok(());
    }

    let mut direction_deadline: Option<Instant> = None;
    let mut retry_deadline = Some(Instant::now() + cfg.retry_after);
    let mut dwell_deadline: Option<Instant> = None;
    let mut loader_visible = feed.loader_visible();

    loop {
        let mut outbound = Vec::new();
        let mut navigated = false;

        select! {
            _ = cancel.cancelled() => break,

            maybe_intent = intents.recv() => {
                let Some(intent) = maybe_intent else { break };
                debug!(?intent, "host_intent");
                match intent {
                    UserIntent::Next => {
                        outbound = feed.navigate(Direction::Next);
                        navigated = true;
                    }
                    UserIntent::Prev => {
                        outbound = feed.navigate(Direction::Prev);
                        navigated = true;
                    }
                    UserIntent::Tap => outbound = feed.toggle_inspect(),
                    UserIntent::CloseInspect => outbound = feed.close_inspect(),
                }
            }

            maybe_event = host_events.recv() => {
                let Some(event) = maybe_event else { break };
                match event {
                    HostEvent::Status(status) => {
                        info!(status = status.as_str(), "frame_status");
                        feed.set_status(status);
                    }
                    HostEvent::TextureReady(url) => {
                        info!(%url, "frame_texture_ready");
                        if feed.texture_ready(&url) {
                            retry_deadline = None;
                            dwell_deadline = cfg.dwell.map(|dwell| Instant::now() + dwell);
                        }
                    }
                }
            }

            _ = sleep_until_opt(direction_deadline), if direction_deadline.is_some() => {
                direction_deadline = None;
                outbound.push(FrameInput::Direction(None));
            }

            _ = sleep_until_opt(retry_deadline), if retry_deadline.is_some() => {
                match feed.retry(cfg.max_retries) {
                    Some(input) => {
                        warn!(url = feed.requested_url(), attempt = feed.retries(), "image not shown in time; re-requesting");
                        outbound.push(input);
                        retry_deadline = Some(Instant::now() + cfg.retry_after);
                    }
                    None => retry_deadline = None,
                }
            }

            _ = sleep_until_opt(dwell_deadline), if dwell_deadline.is_some() => {
                dwell_deadline = None;
                outbound = feed.navigate(Direction::Next);
                navigated = true;
            }
        }

        if navigated {
            let now = Instant::now();
            direction_deadline = Some(now + cfg.direction_reset);
            retry_deadline = Some(now + cfg.retry_after);
            dwell_deadline = None;
            info!(url = feed.requested_url(), "host_requested_image");
        }

        if !send_all(&to_frame, outbound).await {
            break;
        }

        let visible = feed.loader_visible();
        if visible != loader_visible {
            loader_visible = visible;
            info!(
                loader_visible = visible,
                displayed = feed.displayed_url().unwrap_or("<none>"),
                inspecting = feed.is_inspecting(),
                "host_loader_state"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn feed(n: usize) -> FeedState {
        let urls = (0..n).map(|i| format!("img-{i}.jpg")).collect();
        FeedState::new(urls, Rotation::new(0.06, -0.18))
    }

    #[test]
    fn navigation_wraps_both_ways() {
        let mut state = feed(3);
        let out = state.navigate(Direction::Prev);
        assert_eq!(state.requested_url(), "img-2.jpg");
        assert_eq!(
            out,
            vec![
                FrameInput::Direction(Some(Direction::Prev)),
                FrameInput::ShowImage("img-2.jpg".into()),
            ]
        );
        state.navigate(Direction::Next);
        assert_eq!(state.requested_url(), "img-0.jpg");
    }

    #[test]
    fn navigation_closes_inspection_first() {
        let mut state = feed(2);
        assert_eq!(
            state.toggle_inspect(),
            vec![
                FrameInput::Frozen(true),
                FrameInput::RestRotation(Rotation::new(0.06, -0.18)),
            ]
        );
        let out = state.navigate(Direction::Next);
        assert_eq!(out[0], FrameInput::Frozen(false));
        assert_eq!(out[1], FrameInput::RestRotation(Rotation::ZERO));
        assert!(!state.is_inspecting());
        assert!(state.close_inspect().is_empty());
    }

    #[test]
    fn loader_tracks_displayed_and_context_loss() {
        let mut state = feed(2);
        assert!(state.loader_visible());
        assert!(!state.texture_ready("img-1.jpg"));
        assert!(state.texture_ready("img-0.jpg"));
        assert!(!state.loader_visible());
        state.set_status(RenderStatus::ContextLost);
        assert!(state.loader_visible());
    }

    #[test]
    fn retries_are_bounded_and_reset_by_navigation() {
        let mut state = feed(2);
        assert_eq!(state.retry(2), Some(FrameInput::ShowImage("img-0.jpg".into())));
        assert!(state.retry(2).is_some());
        assert_eq!(state.retry(2), None);

        state.navigate(Direction::Next);
        assert!(state.retry(2).is_some());
        state.set_status(RenderStatus::ContextLost);
        assert_eq!(state.retry(2), None);
    }

    #[test]
    fn seeded_shuffle_is_deterministic() {
        let urls: Vec<String> = (0..8).map(|i| format!("{i}")).collect();
        let a = FeedState::shuffled(urls.clone(), Rotation::ZERO, &mut StdRng::seed_from_u64(7));
        let b = FeedState::shuffled(urls.clone(), Rotation::ZERO, &mut StdRng::seed_from_u64(7));
        assert_eq!(a.feed(), b.feed());
        let mut sorted = a.feed().to_vec();
        sorted.sort();
        assert_eq!(sorted, urls);
    }

    #[tokio::test]
    async fn run_drives_frame_inputs() {
        let cfg = HostConfig {
            shuffle: false,
            direction_reset: Duration::from_millis(20),
            ..HostConfig::default()
        };
        let images = vec!["a.jpg".to_string(), "b.jpg".to_string()];
        let (intent_tx, intent_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (frame_tx, mut frame_rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            cfg,
            images,
            None,
            intent_rx,
            event_rx,
            frame_tx,
            cancel.clone(),
        ));

        let mut startup = Vec::new();
        for _ in 0..4 {
            startup.push(frame_rx.recv().await.unwrap());
        }
        assert_eq!(startup.last(), Some(&FrameInput::ShowImage("a.jpg".into())));

        event_tx
            .send(HostEvent::TextureReady("a.jpg".into()))
            .unwrap();
        intent_tx.send(UserIntent::Next).await.unwrap();
        assert_eq!(
            frame_rx.recv().await.unwrap(),
            FrameInput::Direction(Some(Direction::Next))
        );
        assert_eq!(
            frame_rx.recv().await.unwrap(),
            FrameInput::ShowImage("b.jpg".into())
        );

        let reset = timeout(Duration::from_secs(2), frame_rx.recv())
            .await
            .expect("direction reset arrives")
            .unwrap();
        assert_eq!(reset, FrameInput::Direction(None));

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
