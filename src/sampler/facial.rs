//! Facial expression stress sampler
//!
//! Consumes per-face emotion probabilities from a pretrained classifier and maps
//! them onto a stress score with fixed per-emotion weights.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::FacialConfig;
use crate::error::PulseError;
use crate::sampler::lifecycle::{Generation, SamplerPhase, SamplerState, TickTicket};
use crate::sampler::{MediaStream, VideoDevice, VideoStream};
use crate::types::{clamp_stress, StressChannel, StressSample};

/// Networks the classifier must load before the first detection, in load order
pub const REQUIRED_NETWORKS: [&str; 3] = ["tiny_face_detector", "face_expression", "face_landmark_68"];

/// Stress weight per recognized emotion
const EMOTION_WEIGHTS: [(&str, f64); 6] = [
    ("angry", 100.0),
    ("disgusted", 90.0),
    ("fearful", 80.0),
    ("sad", 70.0),
    ("surprised", 40.0),
    ("happy", 0.0),
];

/// Fraction of the remaining gap closed per display step
const DISPLAY_EASING: f64 = 0.1;

/// One detected face with its emotion probabilities
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    /// Emotion name to probability; probabilities need not sum to 1
    pub expressions: HashMap<String, f64>,
}

/// Pretrained face/expression model, treated as a black box
pub trait EmotionClassifier {
    type Frame;

    /// Load one network's artifacts from `model_path`
    fn load_network(&mut self, model_path: &Path, network: &str) -> Result<(), PulseError>;

    /// Detect all faces in a frame
    fn detect(&mut self, frame: &Self::Frame) -> Result<Vec<FaceDetection>, PulseError>;
}

/// Weighted emotion score for one face.
///
/// Formula: `round(Σ weight·p / Σ p)` over recognized emotions, 0 when no
/// recognized emotion has probability mass.
pub fn score_expressions(expressions: &HashMap<String, f64>) -> f64 {
    let mut total_score = 0.0;
    let mut total_weight = 0.0;

    for (emotion, weight) in EMOTION_WEIGHTS {
        if let Some(&probability) = expressions.get(emotion) {
            if probability.is_finite() {
                total_score += weight * probability;
                total_weight += probability;
            }
        }
    }

    if total_weight <= 0.0 {
        return 0.0;
    }
    clamp_stress((total_score / total_weight).round())
}

/// Score used when no face is visible: decay rather than reset
pub fn decay_score(previous: f64, step: f64) -> f64 {
    (previous - step).max(0.0)
}

/// Facial stress sampler
///
/// Detection runs on every tick so the host can render overlays from
/// [`FacialSampler::detections`]; scores are emitted at most once per
/// `emit_interval_ms`.
pub struct FacialSampler<C, S>
where
    C: EmotionClassifier,
    S: VideoStream<Frame = C::Frame>,
{
    classifier: C,
    config: FacialConfig,
    state: SamplerState<S>,
    generation: Generation,
    networks_loaded: usize,
    score: f64,
    last_emit: Option<DateTime<Utc>>,
    detections: Vec<FaceDetection>,
}

impl<C, S> FacialSampler<C, S>
where
    C: EmotionClassifier,
    S: VideoStream<Frame = C::Frame>,
{
    pub fn new(classifier: C, config: FacialConfig) -> Self {
        Self {
            classifier,
            config,
            state: SamplerState::Unloaded,
            generation: Generation::default(),
            networks_loaded: 0,
            score: 0.0,
            last_emit: None,
            detections: Vec::new(),
        }
    }

    pub fn phase(&self) -> SamplerPhase {
        self.state.phase()
    }

    /// Last emitted (unsmoothed) score
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Detections from the most recent tick
    pub fn detections(&self) -> &[FaceDetection] {
        &self.detections
    }

    /// Model loading progress in percent
    pub fn load_progress(&self) -> f64 {
        self.networks_loaded as f64 / REQUIRED_NETWORKS.len() as f64 * 100.0
    }

    /// Reason for the last load failure, if the sampler is blocked
    pub fn failure(&self) -> Option<&str> {
        match &self.state {
            SamplerState::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    /// Load all classifier networks. Loading happens once; later calls are no-ops
    /// unless the previous attempt failed.
    pub fn load_models(&mut self) -> Result<(), PulseError> {
        if matches!(
            self.state,
            SamplerState::Loaded | SamplerState::Streaming { .. }
        ) {
            return Ok(());
        }

        self.networks_loaded = 0;
        for network in REQUIRED_NETWORKS {
            debug!(network, path = %self.config.model_path.display(), "loading classifier network");
            if let Err(e) = self.classifier.load_network(&self.config.model_path, network) {
                let reason = format!(
                    "Failed to load model: {network}. Check that the model files are present in {} ({e})",
                    self.config.model_path.display()
                );
                warn!(network, error = %e, "classifier network failed to load");
                self.state = SamplerState::Failed {
                    reason: reason.clone(),
                };
                return Err(PulseError::ResourceLoadFailure(reason));
            }
            self.networks_loaded += 1;
        }

        info!("facial classifier networks loaded");
        self.state = SamplerState::Loaded;
        Ok(())
    }

    /// Acquire the camera and begin sampling.
    ///
    /// Calling `start` while already streaming returns the live ticket without
    /// opening a second stream.
    pub fn start<D>(&mut self, device: &mut D) -> Result<TickTicket, PulseError>
    where
        D: VideoDevice<Stream = S>,
    {
        match &self.state {
            SamplerState::Streaming { ticket, .. } => return Ok(*ticket),
            SamplerState::Unloaded => {
                return Err(PulseError::InvalidState(
                    "facial classifier has not been loaded".to_string(),
                ))
            }
            SamplerState::Failed { reason } => {
                return Err(PulseError::InvalidState(format!(
                    "facial classifier unavailable: {reason}"
                )))
            }
            SamplerState::Loaded => {}
        }

        let stream = device.open_video().map_err(|e| {
            warn!(error = %e, "camera unavailable");
            e
        })?;

        let ticket = self.generation.next_ticket();
        self.state = SamplerState::Streaming { stream, ticket };
        self.last_emit = None;
        self.detections.clear();
        info!("facial sampling started");
        Ok(ticket)
    }

    /// Process the next frame. Returns a sample when one is due.
    ///
    /// Stale tickets and ticks while not streaming are ignored. A detection
    /// error stops the sampler and releases the camera.
    pub fn tick(
        &mut self,
        ticket: TickTicket,
        now: DateTime<Utc>,
    ) -> Result<Option<StressSample>, PulseError> {
        if !self.generation.is_current(ticket) {
            debug!("ignoring stale facial tick");
            return Ok(None);
        }
        let Some(stream) = self.state.live_stream(ticket) else {
            return Ok(None);
        };
        let Some(frame) = stream.read_frame() else {
            return Ok(None);
        };

        match self.classifier.detect(&frame) {
            Ok(detections) => self.detections = detections,
            Err(e) => {
                warn!(error = %e, "face detection failed, stopping sampler");
                self.stop();
                return Err(e);
            }
        }

        let interval = Duration::milliseconds(self.config.emit_interval_ms);
        if let Some(last) = self.last_emit {
            if now - last < interval {
                return Ok(None);
            }
        }

        self.score = match self.detections.first() {
            Some(face) => score_expressions(&face.expressions),
            None => decay_score(self.score, self.config.no_face_decay),
        };
        self.last_emit = Some(now);
        debug!(score = self.score, faces = self.detections.len(), "facial score emitted");

        Ok(Some(StressSample::new(StressChannel::Facial, self.score, now)))
    }

    /// Release the camera and invalidate outstanding tickets. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.generation.invalidate();
        if let Some(mut stream) = self.state.take_stream() {
            stream.stop();
            self.detections.clear();
            info!("facial sampling stopped");
        }
    }
}

impl<C, S> Drop for FacialSampler<C, S>
where
    C: EmotionClassifier,
    S: VideoStream<Frame = C::Frame>,
{
    fn drop(&mut self) {
        self.stop();
    }
}

/// Presentation-only easing of a score toward its true value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DisplaySmoother {
    shown: f64,
}

impl DisplaySmoother {
    pub fn new(initial: f64) -> Self {
        Self { shown: initial }
    }

    pub fn value(&self) -> f64 {
        self.shown
    }

    /// Advance one 100ms display step toward `target`
    pub fn step(&mut self, target: f64) -> f64 {
        let diff = target - self.shown;
        if diff.abs() < 1.0 {
            self.shown = target;
        } else {
            self.shown += diff * DISPLAY_EASING;
        }
        self.shown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    use chrono::TimeZone;

    fn expressions(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn face(pairs: &[(&str, f64)]) -> FaceDetection {
        FaceDetection {
            expressions: expressions(pairs),
        }
    }

    struct ScriptedClassifier {
        fail_network: Option<&'static str>,
        loaded: Vec<String>,
        results: VecDeque<Result<Vec<FaceDetection>, PulseError>>,
    }

    impl ScriptedClassifier {
        fn new(results: Vec<Vec<FaceDetection>>) -> Self {
            Self {
                fail_network: None,
                loaded: Vec::new(),
                results: results.into_iter().map(Ok).collect(),
            }
        }
    }

    impl EmotionClassifier for ScriptedClassifier {
        type Frame = u32;

        fn load_network(&mut self, _model_path: &Path, network: &str) -> Result<(), PulseError> {
            if self.fail_network == Some(network) {
                return Err(PulseError::ResourceLoadFailure("404".to_string()));
            }
            self.loaded.push(network.to_string());
            Ok(())
        }

        fn detect(&mut self, _frame: &u32) -> Result<Vec<FaceDetection>, PulseError> {
            self.results.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    struct FakeStream {
        stopped: Rc<Cell<u32>>,
    }

    impl MediaStream for FakeStream {
        fn stop(&mut self) {
            self.stopped.set(self.stopped.get() + 1);
        }
    }

    impl VideoStream for FakeStream {
        type Frame = u32;

        fn read_frame(&mut self) -> Option<u32> {
            Some(0)
        }
    }

    struct FakeCamera {
        deny: bool,
        opened: Rc<RefCell<u32>>,
        stopped: Rc<Cell<u32>>,
    }

    impl FakeCamera {
        fn new() -> Self {
            Self {
                deny: false,
                opened: Rc::new(RefCell::new(0)),
                stopped: Rc::new(Cell::new(0)),
            }
        }
    }

    impl VideoDevice for FakeCamera {
        type Stream = FakeStream;

        fn open_video(&mut self) -> Result<FakeStream, PulseError> {
            if self.deny {
                return Err(PulseError::PermissionDenied(
                    "camera access was refused".to_string(),
                ));
            }
            *self.opened.borrow_mut() += 1;
            Ok(FakeStream {
                stopped: self.stopped.clone(),
            })
        }
    }

    fn at(seconds: i64, millis: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
            + Duration::seconds(seconds)
            + Duration::milliseconds(millis)
    }

    #[test]
    fn test_score_single_emotion() {
        assert_eq!(score_expressions(&expressions(&[("angry", 0.8)])), 100.0);
        assert_eq!(score_expressions(&expressions(&[("happy", 0.9)])), 0.0);
    }

    #[test]
    fn test_score_weighted_mix() {
        // (100*0.5 + 0*0.5) / 1.0 = 50
        let mixed = expressions(&[("angry", 0.5), ("happy", 0.5)]);
        assert_eq!(score_expressions(&mixed), 50.0);

        // (70*0.3 + 40*0.1) / 0.4 = 62.5 -> 63
        let sad_surprised = expressions(&[("sad", 0.3), ("surprised", 0.1)]);
        assert_eq!(score_expressions(&sad_surprised), 63.0);
    }

    #[test]
    fn test_score_ignores_unknown_emotions() {
        let with_neutral = expressions(&[("neutral", 0.9), ("fearful", 0.1)]);
        assert_eq!(score_expressions(&with_neutral), 80.0);
        assert_eq!(score_expressions(&expressions(&[("neutral", 1.0)])), 0.0);
        assert_eq!(score_expressions(&HashMap::new()), 0.0);
    }

    #[test]
    fn test_decay_floors_at_zero() {
        assert_eq!(decay_score(10.0, 2.0), 8.0);
        assert_eq!(decay_score(1.0, 2.0), 0.0);
        assert_eq!(decay_score(0.0, 2.0), 0.0);
    }

    proptest! {
        #[test]
        fn prop_score_stays_in_range(
            angry in 0.0f64..1.0,
            disgusted in 0.0f64..1.0,
            fearful in 0.0f64..1.0,
            sad in 0.0f64..1.0,
            surprised in 0.0f64..1.0,
            happy in 0.001f64..1.0,
        ) {
            let map = expressions(&[
                ("angry", angry),
                ("disgusted", disgusted),
                ("fearful", fearful),
                ("sad", sad),
                ("surprised", surprised),
                ("happy", happy),
            ]);
            let score = score_expressions(&map);
            prop_assert!((0.0..=100.0).contains(&score));
        }
    }

    #[test]
    fn test_start_requires_loaded_models() {
        let mut sampler: FacialSampler<ScriptedClassifier, FakeStream> =
            FacialSampler::new(ScriptedClassifier::new(vec![]), FacialConfig::default());
        let mut camera = FakeCamera::new();

        let err = sampler.start(&mut camera).unwrap_err();
        assert!(matches!(err, PulseError::InvalidState(_)));
        assert_eq!(*camera.opened.borrow(), 0);
    }

    #[test]
    fn test_load_failure_blocks_start_until_reload() {
        let mut classifier = ScriptedClassifier::new(vec![]);
        classifier.fail_network = Some("face_expression");
        let mut sampler: FacialSampler<_, FakeStream> =
            FacialSampler::new(classifier, FacialConfig::default());

        let err = sampler.load_models().unwrap_err();
        assert!(matches!(err, PulseError::ResourceLoadFailure(_)));
        assert_eq!(sampler.phase(), SamplerPhase::Failed);
        assert!(sampler.failure().unwrap().contains("face_expression"));
        assert!((sampler.load_progress() - 100.0 / 3.0).abs() < 1e-9);

        let mut camera = FakeCamera::new();
        assert!(matches!(
            sampler.start(&mut camera),
            Err(PulseError::InvalidState(_))
        ));

        sampler.classifier.fail_network = None;
        sampler.load_models().unwrap();
        assert_eq!(sampler.phase(), SamplerPhase::Loaded);
        assert_eq!(sampler.load_progress(), 100.0);
        assert!(sampler.start(&mut camera).is_ok());
    }

    #[test]
    fn test_permission_denied_leaves_sampler_idle() {
        let mut sampler: FacialSampler<_, FakeStream> =
            FacialSampler::new(ScriptedClassifier::new(vec![]), FacialConfig::default());
        sampler.load_models().unwrap();

        let mut camera = FakeCamera::new();
        camera.deny = true;
        let err = sampler.start(&mut camera).unwrap_err();
        assert!(matches!(err, PulseError::PermissionDenied(_)));
        assert_eq!(sampler.phase(), SamplerPhase::Loaded);
    }

    #[test]
    fn test_emission_is_rate_limited() {
        let results = vec![
            vec![face(&[("angry", 1.0)])],
            vec![face(&[("happy", 1.0)])],
            vec![face(&[("happy", 1.0)])],
        ];
        let mut sampler: FacialSampler<_, FakeStream> =
            FacialSampler::new(ScriptedClassifier::new(results), FacialConfig::default());
        sampler.load_models().unwrap();
        let mut camera = FakeCamera::new();
        let ticket = sampler.start(&mut camera).unwrap();

        let first = sampler.tick(ticket, at(0, 0)).unwrap().unwrap();
        assert_eq!(first.value, 100.0);

        // Detection still runs but no score is emitted within the interval
        assert!(sampler.tick(ticket, at(0, 500)).unwrap().is_none());
        assert_eq!(sampler.detections().len(), 1);
        assert_eq!(sampler.score(), 100.0);

        let third = sampler.tick(ticket, at(1, 0)).unwrap().unwrap();
        assert_eq!(third.value, 0.0);
    }

    #[test]
    fn test_no_face_decays_previous_score() {
        let results = vec![vec![face(&[("sad", 1.0)])], vec![], vec![]];
        let mut sampler: FacialSampler<_, FakeStream> =
            FacialSampler::new(ScriptedClassifier::new(results), FacialConfig::default());
        sampler.load_models().unwrap();
        let mut camera = FakeCamera::new();
        let ticket = sampler.start(&mut camera).unwrap();

        assert_eq!(sampler.tick(ticket, at(0, 0)).unwrap().unwrap().value, 70.0);
        assert_eq!(sampler.tick(ticket, at(1, 0)).unwrap().unwrap().value, 68.0);
        assert_eq!(sampler.tick(ticket, at(2, 0)).unwrap().unwrap().value, 66.0);
    }

    #[test]
    fn test_stop_releases_camera_and_ignores_stale_ticks() {
        let results = vec![vec![face(&[("angry", 1.0)])]];
        let mut sampler: FacialSampler<_, FakeStream> =
            FacialSampler::new(ScriptedClassifier::new(results), FacialConfig::default());
        sampler.load_models().unwrap();
        let mut camera = FakeCamera::new();
        let ticket = sampler.start(&mut camera).unwrap();

        sampler.stop();
        sampler.stop();
        assert_eq!(camera.stopped.get(), 1);
        assert_eq!(sampler.phase(), SamplerPhase::Loaded);
        assert!(sampler.tick(ticket, at(5, 0)).unwrap().is_none());

        // A restarted run issues a new ticket; the old one stays dead
        let fresh = sampler.start(&mut camera).unwrap();
        assert_ne!(fresh, ticket);
        assert!(sampler.tick(ticket, at(6, 0)).unwrap().is_none());
        assert_eq!(*camera.opened.borrow(), 2);
    }

    #[test]
    fn test_start_twice_keeps_single_stream() {
        let mut sampler: FacialSampler<_, FakeStream> =
            FacialSampler::new(ScriptedClassifier::new(vec![]), FacialConfig::default());
        sampler.load_models().unwrap();
        let mut camera = FakeCamera::new();

        let first = sampler.start(&mut camera).unwrap();
        let second = sampler.start(&mut camera).unwrap();
        assert_eq!(first, second);
        assert_eq!(*camera.opened.borrow(), 1);
    }

    #[test]
    fn test_detection_error_stops_sampler() {
        let mut classifier = ScriptedClassifier::new(vec![]);
        classifier
            .results
            .push_back(Err(PulseError::ResourceLoadFailure("model evicted".to_string())));
        let mut sampler: FacialSampler<_, FakeStream> =
            FacialSampler::new(classifier, FacialConfig::default());
        sampler.load_models().unwrap();
        let mut camera = FakeCamera::new();
        let ticket = sampler.start(&mut camera).unwrap();

        assert!(sampler.tick(ticket, at(0, 0)).is_err());
        assert_eq!(sampler.phase(), SamplerPhase::Loaded);
        assert_eq!(camera.stopped.get(), 1);
    }

    #[test]
    fn test_drop_releases_camera() {
        let mut camera = FakeCamera::new();
        {
            let mut sampler: FacialSampler<_, FakeStream> =
                FacialSampler::new(ScriptedClassifier::new(vec![]), FacialConfig::default());
            sampler.load_models().unwrap();
            sampler.start(&mut camera).unwrap();
        }
        assert_eq!(camera.stopped.get(), 1);
    }

    #[test]
    fn test_display_smoother_eases_and_snaps() {
        let mut smoother = DisplaySmoother::default();
        assert_eq!(smoother.step(100.0), 10.0);
        assert_eq!(smoother.step(100.0), 19.0);

        let mut near = DisplaySmoother::new(99.5);
        assert_eq!(near.step(100.0), 100.0);
        assert_eq!(near.value(), 100.0);
    }
}
