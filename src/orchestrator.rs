//! Sequencing of character selection, model loading and display.
//!
//! [`LoadOrchestrator`] is the only component with state that spans calls.
//! Loads run on worker threads that never touch the stage; they post tagged
//! [`LoadMessage`]s back over a channel which the orchestrator drains on its
//! own thread (`poll_loads`, `tick` or `settle`). Every request carries the
//! generation it was issued under, and results from older generations are
//! dropped before anything reaches the GPU.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use thiserror::Error;

use crate::animation::AnimationController;
use crate::assets::{AssetLoadError, AssetSource, LoadFailure, LoadProgress};
use crate::config::StageConfig;
use crate::disposal::dispose;
use crate::normalize::normalize;
use crate::placeholder::generate_placeholder;
use crate::render::{upload_asset, GpuBackend};
use crate::roster::{EntityDescriptor, Roster};
use crate::scene_graph::SceneAsset;
use crate::stage::{ModelId, Stage};

/// Receives loading lifecycle notifications, e.g. to drive a progress banner.
pub trait LoadObserver {
    fn on_load_start(&mut self, entity: &EntityDescriptor);

    /// Percentage of the current load, `None` when the size is unknown.
    fn on_load_progress(&mut self, _percent: Option<u8>) {}

    fn on_load_end(&mut self);
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl LoadObserver for NullObserver {
    fn on_load_start(&mut self, _entity: &EntityDescriptor) {}

    fn on_load_end(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    Loading,
    Attached,
    AttachedPlaceholder,
}

/// What is currently on stage and which request it belongs to.
#[derive(Debug)]
pub struct DisplayState {
    current_asset: Option<ModelId>,
    current_animation: Option<AnimationController>,
    request_generation: u64,
    selected_index: Option<usize>,
    phase: LoadPhase,
}

impl DisplayState {
    fn new() -> Self {
        Self {
            current_asset: None,
            current_animation: None,
            request_generation: 0,
            selected_index: None,
            phase: LoadPhase::Idle,
        }
    }

    pub fn current_asset(&self) -> Option<ModelId> {
        self.current_asset
    }

    pub fn current_animation(&self) -> Option<&AnimationController> {
        self.current_animation.as_ref()
    }

    pub fn request_generation(&self) -> u64 {
        self.request_generation
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected_index
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("entity index {index} is out of range for a roster of {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Message posted by a load worker.
#[derive(Debug)]
pub enum LoadMessage {
    Progress {
        generation: u64,
        progress: LoadProgress,
    },
    Settled {
        generation: u64,
        index: usize,
        result: Result<SceneAsset, AssetLoadError>,
    },
}

pub struct LoadOrchestrator<B: GpuBackend> {
    roster: Roster,
    source: Arc<dyn AssetSource>,
    backend: B,
    stage: Stage,
    observer: Box<dyn LoadObserver>,
    state: DisplayState,
    canonical_height: f32,
    sender: Sender<LoadMessage>,
    receiver: Receiver<LoadMessage>,
    in_flight: usize,
}

impl<B: GpuBackend> LoadOrchestrator<B> {
    pub fn new(
        roster: Roster,
        source: Arc<dyn AssetSource>,
        backend: B,
        config: &StageConfig,
    ) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            roster,
            source,
            backend,
            stage: Stage::new(config),
            observer: Box::new(NullObserver),
            state: DisplayState::new(),
            canonical_height: config.canonical_height,
            sender,
            receiver,
            in_flight: 0,
        }
    }

    pub fn with_observer(mut self, observer: impl LoadObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Starts showing the entity at `index` and returns the request generation.
    ///
    /// The previous model is disposed and the theme applied before this
    /// returns; the new model appears once its load settles.
    pub fn select_character(&mut self, index: usize) -> Result<u64, OrchestratorError> {
        let entity = self
            .roster
            .get(index)
            .cloned()
            .ok_or(OrchestratorError::IndexOutOfRange {
                index,
                len: self.roster.len(),
            })?;

        self.state.request_generation += 1;
        let generation = self.state.request_generation;
        self.state.selected_index = Some(index);
        self.state.phase = LoadPhase::Loading;
        info!(
            "selecting {} ({}) as request {generation}",
            entity.display_name, entity.id
        );

        self.dispose_current();
        self.stage.theme_mut().apply_theme(entity.theme_color);
        self.observer.on_load_start(&entity);
        self.spawn_load(generation, index, entity.model_path);
        Ok(generation)
    }

    fn spawn_load(&mut self, generation: u64, index: usize, path: String) {
        let source = Arc::clone(&self.source);
        let sender = self.sender.clone();
        let worker_path = path.clone();
        let spawned = thread::Builder::new()
            .name(format!("asset-load-{generation}"))
            .spawn(move || {
                let progress_sender = sender.clone();
                let mut report = |progress: LoadProgress| {
                    let _ = progress_sender.send(LoadMessage::Progress {
                        generation,
                        progress,
                    });
                };
                let result =
                    panic::catch_unwind(AssertUnwindSafe(|| source.load(&worker_path, &mut report)))
                        .unwrap_or_else(|payload| {
                            Err(AssetLoadError::new(
                                &worker_path,
                                LoadFailure::Panicked(panic_message(payload.as_ref())),
                            ))
                        });
                let _ = sender.send(LoadMessage::Settled {
                    generation,
                    index,
                    result,
                });
            });

        self.in_flight += 1;
        if let Err(err) = spawned {
            let _ = self.sender.send(LoadMessage::Settled {
                generation,
                index,
                result: Err(AssetLoadError::new(path, LoadFailure::Spawn(err))),
            });
        }
    }

    /// Applies every message the workers have posted so far. Returns the
    /// number of loads that settled, stale ones included.
    pub fn poll_loads(&mut self) -> usize {
        let mut settled = 0;
        while let Ok(message) = self.receiver.try_recv() {
            if self.handle_message(message) {
                settled += 1;
            }
        }
        settled
    }

    /// Blocks until no load is in flight or `timeout` passes. Returns whether
    /// everything settled.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let start = Instant::now();
        self.poll_loads();
        while self.in_flight > 0 {
            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                return false;
            }
            match self.receiver.recv_timeout(remaining) {
                Ok(message) => {
                    self.handle_message(message);
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return false,
            }
        }
        true
    }

    /// One frame: drain settled loads, then animate, spin and drift.
    pub fn tick(&mut self, delta: f32) {
        self.poll_loads();
        if let (Some(id), Some(animation)) = (
            self.state.current_asset,
            self.state.current_animation.as_mut(),
        ) {
            if let Some(root) = self.stage.model_root_mut(id) {
                animation.advance(delta, root);
            }
        }
        self.stage.advance(delta);
    }

    fn handle_message(&mut self, message: LoadMessage) -> bool {
        match message {
            LoadMessage::Progress {
                generation,
                progress,
            } => {
                if generation == self.state.request_generation {
                    self.observer.on_load_progress(progress.percent());
                }
                false
            }
            LoadMessage::Settled {
                generation,
                index,
                result,
            } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                if generation != self.state.request_generation {
                    debug!(
                        "discarding stale load {generation}, current request is {}",
                        self.state.request_generation
                    );
                    return true;
                }
                self.finish_load(index, result);
                true
            }
        }
    }

    fn finish_load(&mut self, index: usize, result: Result<SceneAsset, AssetLoadError>) {
        self.dispose_current();

        let (mut asset, phase) = match result {
            Ok(mut asset) => {
                let report = normalize(&mut asset.root, self.canonical_height);
                debug!(
                    "normalized {} by {} (translation {})",
                    asset.root.name, report.scale_factor, report.translation
                );
                (asset, LoadPhase::Attached)
            }
            Err(err) => {
                warn!("{err}: {}; using placeholder", err.cause);
                let theme = self
                    .roster
                    .get(index)
                    .map(|entity| entity.theme_color)
                    .unwrap_or_else(|| self.stage.theme().current());
                (generate_placeholder(theme), LoadPhase::AttachedPlaceholder)
            }
        };

        let animation = AnimationController::from_clips(&asset.clips);
        if let Some(animation) = &animation {
            debug!("playing clip {}", animation.clip_name());
        }
        upload_asset(&mut asset, &mut self.backend);
        let id = self.stage.attach(asset);

        self.state.current_asset = Some(id);
        self.state.current_animation = animation;
        self.state.phase = phase;
        self.observer.on_load_end();
    }

    fn dispose_current(&mut self) {
        self.state.current_animation = None;
        if let Some(id) = self.state.current_asset.take() {
            dispose(&mut self.stage, &mut self.backend, id);
        }
    }

    /// Disposes whatever is displayed and invalidates loads still in flight.
    pub fn teardown(&mut self) {
        self.state.request_generation += 1;
        self.dispose_current();
        self.state.phase = LoadPhase::Idle;
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Loads issued but not yet drained.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn selected_entity(&self) -> Option<&EntityDescriptor> {
        self.state
            .selected_index
            .and_then(|index| self.roster.get(index))
    }

    pub fn current_model(&self) -> Option<&SceneAsset> {
        self.state
            .current_asset
            .and_then(|id| self.stage.model(id))
    }
}

impl<B: GpuBackend> Drop for LoadOrchestrator<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::TrackingBackend;

    struct FailingSource;

    impl AssetSource for FailingSource {
        fn load(
            &self,
            path: &str,
            _progress: &mut dyn FnMut(LoadProgress),
        ) -> Result<SceneAsset, AssetLoadError> {
            Err(AssetLoadError::new(
                path,
                LoadFailure::Malformed("nothing here".into()),
            ))
        }
    }

    struct PanickingSource;

    impl AssetSource for PanickingSource {
        fn load(
            &self,
            _path: &str,
            _progress: &mut dyn FnMut(LoadProgress),
        ) -> Result<SceneAsset, AssetLoadError> {
            panic!("decoder exploded")
        }
    }

    fn orchestrator(source: Arc<dyn AssetSource>) -> LoadOrchestrator<TrackingBackend> {
        LoadOrchestrator::new(
            Roster::builtin(),
            source,
            TrackingBackend::new(),
            &StageConfig::default(),
        )
    }

    #[test]
    fn out_of_range_selection_leaves_state_alone() {
        let mut orchestrator = orchestrator(Arc::new(FailingSource));
        let err = orchestrator.select_character(6).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::IndexOutOfRange { index: 6, len: 6 }
        ));
        assert_eq!(orchestrator.state().request_generation(), 0);
        assert_eq!(orchestrator.state().phase(), LoadPhase::Idle);
        assert_eq!(orchestrator.in_flight(), 0);
    }

    #[test]
    fn failed_load_shows_placeholder() {
        let mut orchestrator = orchestrator(Arc::new(FailingSource));
        orchestrator.select_character(1).unwrap();
        assert_eq!(orchestrator.state().phase(), LoadPhase::Loading);
        assert!(orchestrator.settle(Duration::from_secs(10)));
        assert_eq!(orchestrator.state().phase(), LoadPhase::AttachedPlaceholder);
        assert!(orchestrator.current_model().unwrap().is_placeholder());
        assert_eq!(orchestrator.stage().attached_count(), 1);
    }

    #[test]
    fn panicking_loader_still_settles() {
        let mut orchestrator = orchestrator(Arc::new(PanickingSource));
        orchestrator.select_character(0).unwrap();
        assert!(orchestrator.settle(Duration::from_secs(10)));
        assert_eq!(orchestrator.state().phase(), LoadPhase::AttachedPlaceholder);
    }

    #[test]
    fn teardown_releases_everything() {
        let mut orchestrator = orchestrator(Arc::new(FailingSource));
        orchestrator.select_character(2).unwrap();
        orchestrator.settle(Duration::from_secs(10));
        assert!(orchestrator.backend().live_resources().total() > 0);
        orchestrator.teardown();
        assert_eq!(orchestrator.backend().live_resources().total(), 0);
        assert_eq!(orchestrator.stage().attached_count(), 0);
        assert_eq!(orchestrator.state().phase(), LoadPhase::Idle);
    }

    #[test]
    fn panic_messages_are_extracted() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
