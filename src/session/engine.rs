use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::{
    analysis::{Detection, NoveltyCurve, SegmentationResult, SimilarityMatrix, SimilarityMatrixBuilder, StructureDetector},
    audio::{AudioSource, PcmFormat},
    config::{AnalysisConfig, ConfigProvider, DetectionConfig, LevelConfig},
    error::{AnalysisError, Result},
    features::{ExtractorRegistry, FeatureKind, FeatureVector},
    pipeline::{FeatureFramePipeline, FeatureSet, FrameClock, FrameLayout},
    session::{CalculationListener, CalculationOutcome, SessionState},
};

/// What identifies the signal a run analysed
#[derive(Debug, Clone, PartialEq)]
struct SourceKey {
    id: String,
    total_frames: usize,
    format: PcmFormat,
}

impl SourceKey {
    fn of(source: &dyn AudioSource) -> Self {
        Self {
            id: source.source_id(),
            total_frames: source.total_frames(),
            format: source.format(),
        }
    }
}

/// Artifacts of the last successful run, replaced wholesale on publish
#[derive(Default)]
struct Published {
    source: Option<SourceKey>,
    config: Option<AnalysisConfig>,
    clock: Option<FrameClock>,
    features: Option<Arc<FeatureSet>>,
    matrix: Option<Arc<SimilarityMatrix>>,
    detection: Option<Arc<Detection>>,
}

/// Everything one run hands to `publish`
struct RunOutput {
    source: SourceKey,
    config: AnalysisConfig,
    clock: FrameClock,
    features: Arc<FeatureSet>,
    matrix: Arc<SimilarityMatrix>,
    detection: Detection,
}

/// Clears the busy flag when a run ends, however it ends
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns one analysis from audio to segmentation
///
/// The session follows a simple pipeline:
/// 1. Feature Extraction - Cut the audio into frames and run the enabled extractors
/// 2. Similarity Matrix - Blend per-feature distances into one normalized matrix
/// 3. Novelty Curves - Correlate a checkerboard kernel per level along the diagonal
/// 4. Structure Detection - Pick nested macro/meso/micro boundaries
///
/// Only one run may be in progress at a time; a second concurrent call fails with
/// `SessionBusy`. A failed run publishes nothing and leaves the session in the state it
/// had before the run. [`clear`](AnalysisSession::clear) discards every computed artifact
/// and makes an in-flight run finish with `Abandoned`.
pub struct AnalysisSession {
    registry: ExtractorRegistry,
    listeners: RwLock<Vec<Arc<dyn CalculationListener>>>,
    busy: AtomicBool,
    generation: AtomicU64,
    state: RwLock<SessionState>,
    published: RwLock<Published>,
}

impl AnalysisSession {
    /// Create a session with the built-in extractors
    pub fn new() -> Self {
        Self::with_registry(ExtractorRegistry::new())
    }

    /// Create a session that builds extractors from a custom registry
    pub fn with_registry(registry: ExtractorRegistry) -> Self {
        Self {
            registry,
            listeners: RwLock::new(Vec::new()),
            busy: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            state: RwLock::new(SessionState::Idle),
            published: RwLock::new(Published::default()),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn CalculationListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Analyze `source` with `config` and publish the result
    ///
    /// When the source and every extraction-relevant setting match the last published run,
    /// the stored features and matrix are reused and only boundary detection runs again.
    pub fn run(&self, source: &dyn AudioSource, config: &AnalysisConfig) -> Result<SegmentationResult> {
        let _guard = self.acquire()?;

        self.notify_started();
        let result = self.guarded(|generation| self.analyze(source, config.clone(), generation));
        self.notify_done(&result);

        result
    }

    /// Like [`run`](Self::run), taking a configuration snapshot from `provider`
    pub fn run_with_provider(&self, source: &dyn AudioSource, provider: &dyn ConfigProvider) -> Result<SegmentationResult> {
        let config = provider.snapshot()?;
        self.run(source, &config)
    }

    /// Re-run boundary detection only, on the published similarity matrix
    pub fn redetect(&self, levels: LevelConfig, detection: DetectionConfig) -> Result<SegmentationResult> {
        let _guard = self.acquire()?;

        self.notify_started();
        let result = self.guarded(|generation| self.detect_again(levels, detection, generation));
        self.notify_done(&result);

        result
    }

    /// Discard features, matrix, curves and segmentation
    ///
    /// The source identity and configuration of the last run are kept. A run in progress
    /// will fail with `Abandoned` instead of publishing.
    pub fn clear(&self) {
        let mut published = self.write_published();
        self.generation.fetch_add(1, Ordering::SeqCst);

        published.features = None;
        published.matrix = None;
        published.detection = None;
        self.set_state(SessionState::Idle);

        info!("🧹 Session cleared");
    }

    pub fn state(&self) -> SessionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of analysis frames of the last published run
    pub fn frame_count(&self) -> Result<usize> {
        Ok(self.features()?.frame_count())
    }

    /// Configuration of the last run that got as far as publishing, after frame-size
    /// adjustments
    pub fn last_config(&self) -> Option<AnalysisConfig> {
        self.read_published().config.clone()
    }

    pub fn similarity_matrix(&self) -> Result<Arc<SimilarityMatrix>> {
        self.read_published()
            .matrix
            .clone()
            .ok_or_else(|| AnalysisError::NotYetComputed { stage: "similarity matrix" }.into())
    }

    pub fn features(&self) -> Result<Arc<FeatureSet>> {
        self.read_published()
            .features
            .clone()
            .ok_or_else(|| AnalysisError::NotYetComputed { stage: "feature extraction" }.into())
    }

    /// One feature vector of the last run
    pub fn feature(&self, kind: FeatureKind, index: usize) -> Result<FeatureVector> {
        let features = self.features()?;
        features.vector(kind, index).map(<[f32]>::to_vec)
    }

    pub fn novelty_curves(&self) -> Result<Vec<NoveltyCurve>> {
        self.detection("novelty curves").map(|d| d.curves.clone())
    }

    pub fn segmentation(&self) -> Result<SegmentationResult> {
        self.detection("segmentation").map(|d| d.result.clone())
    }

    fn detection(&self, stage: &'static str) -> Result<Arc<Detection>> {
        self.read_published()
            .detection
            .clone()
            .ok_or_else(|| AnalysisError::NotYetComputed { stage }.into())
    }

    // ==========================================
    // RUNS
    // ==========================================

    fn acquire(&self) -> Result<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| AnalysisError::SessionBusy)?;
        Ok(BusyGuard(&self.busy))
    }

    /// Run `work`, restoring the previous state if it fails without being abandoned
    fn guarded<F>(&self, work: F) -> Result<SegmentationResult>
    where
        F: FnOnce(u64) -> Result<SegmentationResult>,
    {
        let generation = self.generation.load(Ordering::SeqCst);
        let previous_state = self.state();

        let result = work(generation);
        if let Err(e) = &result {
            warn!("Analysis failed: {}", e);
            if !self.abandoned(generation) {
                self.set_state(previous_state);
            }
        }
        result
    }

    fn analyze(&self, source: &dyn AudioSource, mut config: AnalysisConfig, generation: u64) -> Result<SegmentationResult> {
        let started = Instant::now();
        config.validate()?;

        let duration = source.duration_secs();
        self.apply_frame_size_recommendation(&mut config, duration);
        let key = SourceKey::of(source);
        let layout = FrameLayout::new(key.total_frames, config.frame_size, config.overlap)?;
        let clock = FrameClock::new(&layout, key.format.sample_rate, duration);

        info!("🎵 Analyzing {} ({:.1}s)", key.id, duration);

        let reusable = {
            let published = self.read_published();
            match (&published.source, &published.config, &published.features, &published.matrix) {
                (Some(previous_key), Some(previous), Some(features), Some(matrix))
                    if *previous_key == key && previous.same_extraction(&config) =>
                {
                    // A strict run must not inherit a matrix that skipped a degenerate feature
                    let matrix_reusable = previous.same_matrix(&config)
                        && !(config.runtime.strict_normalization && !matrix.degenerate_kinds().is_empty());
                    Some((
                        features.clone(),
                        matrix_reusable.then(|| matrix.clone()),
                        published.detection.clone(),
                    ))
                }
                _ => None,
            }
        };

        let (features, matrix, previous) = match reusable {
            Some((features, Some(matrix), previous)) => {
                info!("♻️ Extraction settings unchanged; reusing features and similarity matrix");
                (features, matrix, previous)
            }
            Some((features, None, previous)) => {
                info!("♻️ Extraction settings unchanged; rebuilding the similarity matrix from stored features");
                let matrix = self.build_matrix(&config, &features, generation)?;
                (features, matrix, previous)
            }
            None => {
                // Pipeline Step 1: Feature Extraction
                self.set_state(SessionState::Extracting);
                let features = FeatureFramePipeline::new(&self.registry)
                    .extract_until(source, &config, || self.abandoned(generation))?;
                let features = Arc::new(features);

                let matrix = self.build_matrix(&config, &features, generation)?;
                (features, matrix, None)
            }
        };

        // Pipeline Steps 3 & 4: Novelty and Structure Detection
        let detection = self.detect(&config, &matrix, &clock, previous.as_deref());

        let result = self.publish(
            generation,
            RunOutput {
                source: key,
                config,
                clock,
                features,
                matrix,
                detection,
            },
        )?;

        info!("🎉 Analysis complete in {:.2?}", started.elapsed());
        Ok(result)
    }

    /// Pipeline Step 2: Similarity Matrix
    fn build_matrix(&self, config: &AnalysisConfig, features: &FeatureSet, generation: u64) -> Result<Arc<SimilarityMatrix>> {
        let matrix = SimilarityMatrixBuilder::from_config(config).build(features)?;
        if self.abandoned(generation) {
            return Err(AnalysisError::Abandoned.into());
        }
        self.set_state(SessionState::MatrixBuilt);
        info!("📊 Similarity matrix ready: {} frames", matrix.size());
        Ok(Arc::new(matrix))
    }

    fn detect_again(&self, levels: LevelConfig, detection: DetectionConfig, generation: u64) -> Result<SegmentationResult> {
        let (source, mut config, clock, features, matrix, previous) = {
            let published = self.read_published();
            match (&published.source, &published.config, &published.clock, &published.features, &published.matrix) {
                (Some(source), Some(config), Some(clock), Some(features), Some(matrix)) => (
                    source.clone(),
                    config.clone(),
                    *clock,
                    features.clone(),
                    matrix.clone(),
                    published.detection.clone(),
                ),
                _ => return Err(AnalysisError::NotYetComputed { stage: "similarity matrix" }.into()),
            }
        };

        config.levels = levels;
        config.detection = detection;
        config.validate()?;

        let detection = self.detect(&config, &matrix, &clock, previous.as_deref());
        self.publish(
            generation,
            RunOutput {
                source,
                config,
                clock,
                features,
                matrix,
                detection,
            },
        )
    }

    fn detect(&self, config: &AnalysisConfig, matrix: &SimilarityMatrix, clock: &FrameClock, previous: Option<&Detection>) -> Detection {
        self.set_state(SessionState::SegmentDetecting);
        let started = Instant::now();

        let detection = StructureDetector::new(&config.detection, config.levels).detect(matrix, clock, previous);

        for level in detection.result.computed_levels() {
            info!("🔍 {} level: {} segments", level.level, level.segments.len());
        }
        debug!("Structure detection took {:.2?}", started.elapsed());
        detection
    }

    fn publish(&self, generation: u64, output: RunOutput) -> Result<SegmentationResult> {
        let mut published = self.write_published();
        if self.abandoned(generation) {
            return Err(AnalysisError::Abandoned.into());
        }

        let result = output.detection.result.clone();
        *published = Published {
            source: Some(output.source),
            config: Some(output.config),
            clock: Some(output.clock),
            features: Some(output.features),
            matrix: Some(output.matrix),
            detection: Some(Arc::new(output.detection)),
        };
        self.set_state(SessionState::Done);

        Ok(result)
    }

    fn apply_frame_size_recommendation(&self, config: &mut AnalysisConfig, duration: f64) {
        let Some(recommended) = config.recommended_frame_size(duration) else {
            return;
        };

        if config.runtime.auto_frame_size {
            info!(
                "Long recording ({:.1} min): frame size {} -> {}",
                duration / 60.0,
                config.frame_size,
                recommended
            );
            config.frame_size = recommended;
        } else {
            warn!(
                "Long recording ({:.1} min) with frame size {}; {} is recommended to keep the similarity matrix manageable",
                duration / 60.0,
                config.frame_size,
                recommended
            );
        }
    }

    // ==========================================
    // BOOKKEEPING
    // ==========================================

    fn abandoned(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }

    fn set_state(&self, state: SessionState) {
        let mut current = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if *current != state {
            debug!("Session state {:?} -> {:?}", *current, state);
            *current = state;
        }
    }

    fn read_published(&self) -> RwLockReadGuard<'_, Published> {
        self.published.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_published(&self) -> RwLockWriteGuard<'_, Published> {
        self.published.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> Vec<Arc<dyn CalculationListener>> {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn notify_started(&self) {
        for listener in self.listeners() {
            listener.calculation_started();
        }
    }

    fn notify_done(&self, result: &Result<SegmentationResult>) {
        let outcome = match result {
            Ok(_) => CalculationOutcome::Completed,
            Err(e) => CalculationOutcome::Failed { message: e.to_string() },
        };
        for listener in self.listeners() {
            listener.calculation_done(&outcome);
        }
    }
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new()
    }
}
