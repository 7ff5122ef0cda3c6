use std::sync::Arc;

use structure_segmenter::{
    analysis::SegmentationLevel,
    audio::AudioData,
    config::{AnalysisConfig, FileConfigProvider, LevelConfig},
    error::{AnalysisError, ConfigError, SegmenterError},
    features::FeatureKind,
    session::{AnalysisSession, CalculationEvent, ChannelListener, SessionState},
};
use tempfile::tempdir;

/// 100 Hz "audio" made of constant blocks, one analysis frame per 100 samples
fn blocks(levels: &[f32], samples_per_block: usize) -> AudioData {
    let samples = levels
        .iter()
        .flat_map(|&level| std::iter::repeat(level).take(samples_per_block))
        .collect();
    AudioData::from_mono(samples, 100, "blocks")
}

fn energy_config() -> AnalysisConfig {
    let mut config = AnalysisConfig {
        frame_size: 100,
        overlap: 0,
        ..AnalysisConfig::default()
    };
    config.features.enabled = vec![FeatureKind::Autocorrelation];
    config.detection.macro_kernel_secs = 8.0;
    config.detection.meso_kernel_secs = 4.0;
    config.detection.micro_kernel_secs = 2.0;
    config
}

#[test]
fn test_sections_are_found_and_levels_nest() {
    let audio = blocks(&[0.0, 1.0, 0.0], 2000);
    let session = AnalysisSession::new();

    let result = session.run(&audio, &energy_config()).unwrap();

    assert_eq!(result.frame_count, 60);
    assert_eq!(result.boundary_frames(SegmentationLevel::Macro), vec![20, 40]);
    assert!(result.is_nested());

    let meso = result.boundary_frames(SegmentationLevel::Meso);
    assert!(meso.contains(&20) && meso.contains(&40));

    let sections = result.macro_level().unwrap();
    assert_eq!(sections.segments.len(), 3);
    assert_eq!(sections.segments.first().unwrap().start, 0.0);
    assert!((sections.segments.last().unwrap().end - 60.0).abs() < 1e-9);
    assert_eq!(session.state(), SessionState::Done);
}

#[test]
fn test_identical_frames_give_a_flat_matrix() {
    let audio = blocks(&[0.5], 1000);
    let config = energy_config();
    let session = AnalysisSession::new();

    let result = session.run(&audio, &config).unwrap();
    let matrix = session.similarity_matrix().unwrap();

    assert_eq!(matrix.size(), 10);
    assert_eq!(matrix.degenerate_kinds(), &[FeatureKind::Autocorrelation]);
    for i in 0..10 {
        for j in 0..10 {
            assert_eq!(matrix.get(i, j), Some(config.max_scale));
        }
    }
    assert!(result.computed_levels().all(|level| level.boundaries.is_empty()));
}

#[test]
fn test_identical_mfcc_frames_are_degenerate() {
    let audio = AudioData::from_mono(vec![0.5; 2560], 8000, "dc");
    let mut config = AnalysisConfig {
        frame_size: 256,
        overlap: 0,
        ..AnalysisConfig::default()
    };
    config.features.enabled = vec![FeatureKind::Mfcc];
    config.features.mel_filters = 8;
    config.features.mfcc_coefficients = 4;
    config.features.upper_filter_freq = 3000.0;

    let session = AnalysisSession::new();
    session.run(&audio, &config).unwrap();

    assert_eq!(session.feature(FeatureKind::Mfcc, 3).unwrap().len(), 4);
    let matrix = session.similarity_matrix().unwrap();
    assert_eq!(matrix.size(), 10);
    assert!((0..10).all(|i| matrix.row(i).unwrap().iter().all(|&v| v == config.max_scale)));
}

#[test]
fn test_strict_normalization_rejects_flat_features() {
    let audio = blocks(&[0.5], 1000);
    let mut config = energy_config();
    config.runtime.strict_normalization = true;
    let session = AnalysisSession::new();

    let err = session.run(&audio, &config).unwrap_err();
    assert!(matches!(
        err,
        SegmenterError::Analysis(AnalysisError::DegenerateNormalization { kind: FeatureKind::Autocorrelation })
    ));
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn test_strict_run_does_not_reuse_a_lenient_flat_matrix() {
    let audio = blocks(&[0.5], 1000);
    let mut config = energy_config();
    let session = AnalysisSession::new();
    let lenient = session.run(&audio, &config).unwrap();

    config.runtime.strict_normalization = true;
    let err = session.run(&audio, &config).unwrap_err();
    assert!(matches!(
        err,
        SegmenterError::Analysis(AnalysisError::DegenerateNormalization { kind: FeatureKind::Autocorrelation })
    ));
    assert_eq!(session.segmentation().unwrap(), lenient);
    assert_eq!(session.state(), SessionState::Done);
}

#[test]
fn test_same_name_with_different_length_is_extracted_again() {
    let session = AnalysisSession::new();
    let config = energy_config();

    let long = AudioData::from_mono(blocks(&[0.0, 1.0, 0.0], 2000).samples, 100, "take.wav");
    assert_eq!(session.run(&long, &config).unwrap().frame_count, 60);

    let short = AudioData::from_mono(blocks(&[0.0, 1.0], 1500).samples, 100, "take.wav");
    let result = session.run(&short, &config).unwrap();

    assert_eq!(result.frame_count, 30);
    assert_eq!(result.duration, 30.0);
    assert_eq!(session.similarity_matrix().unwrap().size(), 30);
    assert_eq!(session.feature(FeatureKind::Autocorrelation, 29).unwrap(), vec![1.0]);
}

#[test]
fn test_boundary_time_matches_frame_start_with_heavy_overlap() {
    // Silence, then a constant level from 4.0 s
    let samples = (0..1000).map(|i| if i < 400 { 0.0 } else { 1.0 }).collect();
    let audio = AudioData::from_mono(samples, 100, "step");
    let mut config = energy_config();
    config.frame_size = 20;
    config.overlap = 18;
    config.levels = LevelConfig { macro_enabled: true, meso_enabled: false, micro_enabled: false };
    config.detection.macro_kernel_secs = 2.0;

    let session = AnalysisSession::new();
    let result = session.run(&audio, &config).unwrap();
    assert_eq!(result.frame_count, 328);

    // The last frame starts at sample 981 and is padded by one zero
    let last = session.feature(FeatureKind::Autocorrelation, 327).unwrap();
    assert!((last[0] - 0.95).abs() < 1e-6);

    let sections = result.macro_level().unwrap();
    assert_eq!(sections.boundaries.len(), 1);
    let boundary = sections.boundaries[0];
    assert!((boundary.time - 4.0).abs() < 0.15, "boundary at {}s", boundary.time);
    assert!((boundary.time - boundary.frame as f64 * 0.03).abs() < 1e-9);
    assert_eq!(sections.segments.last().unwrap().end, 10.0);
}

#[test]
fn test_feature_lookup_bounds() {
    let audio = blocks(&[0.0, 1.0], 500);
    let session = AnalysisSession::new();
    session.run(&audio, &energy_config()).unwrap();

    let frame_count = session.frame_count().unwrap();
    assert_eq!(frame_count, 10);
    assert_eq!(session.feature(FeatureKind::Autocorrelation, 7).unwrap(), vec![1.0]);

    for (kind, index) in [
        (FeatureKind::Autocorrelation, frame_count),
        (FeatureKind::Mfcc, 0),
    ] {
        assert!(matches!(
            session.feature(kind, index),
            Err(SegmenterError::Analysis(AnalysisError::InvalidFeatureRequest { .. }))
        ));
    }
}

#[test]
fn test_run_with_file_provider() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("segmenter.toml");
    let mut config = energy_config();
    config.levels = LevelConfig { macro_enabled: true, meso_enabled: false, micro_enabled: false };
    config.save_to_file(&path).unwrap();

    let session = AnalysisSession::new();
    let result = session
        .run_with_provider(&blocks(&[0.0, 1.0, 0.0], 2000), &FileConfigProvider::new(&path))
        .unwrap();

    assert_eq!(result.boundary_frames(SegmentationLevel::Macro), vec![20, 40]);
    assert!(result.meso_level().is_none());
    assert!(result.micro_level().is_none());
    assert_eq!(session.last_config(), Some(config));
}

#[test]
fn test_missing_config_file_is_rejected_before_the_run() {
    let dir = tempdir().unwrap();
    let session = AnalysisSession::new();
    let (listener, events) = ChannelListener::channel();
    session.add_listener(Arc::new(listener));

    let provider = FileConfigProvider::new(dir.path().join("missing.toml"));
    let err = session.run_with_provider(&blocks(&[0.0], 1000), &provider).unwrap_err();
    assert!(matches!(err, SegmenterError::Config(ConfigError::FileNotFound { .. })));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(events.try_recv().is_err());
}

#[test]
fn test_failed_run_notifies_listeners() {
    let session = AnalysisSession::new();
    let (listener, events) = ChannelListener::channel();
    session.add_listener(Arc::new(listener));

    let mut config = energy_config();
    config.overlap = config.frame_size;
    assert!(session.run(&blocks(&[0.0], 1000), &config).is_err());

    let events: Vec<CalculationEvent> = events.try_iter().collect();
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[1], CalculationEvent::Done(outcome) if !outcome.is_success()));
}

#[test]
fn test_source_shorter_than_a_frame() {
    let session = AnalysisSession::new();
    let err = session.run(&blocks(&[1.0], 50), &energy_config()).unwrap_err();
    assert!(matches!(err, SegmenterError::Audio(_)));
    assert!(session.segmentation().is_err());
}

#[test]
fn test_redetect_keeps_coarse_levels() {
    let audio = blocks(&[0.0, 1.0, 0.0], 2000);
    let config = energy_config();
    let session = AnalysisSession::new();
    let first = session.run(&audio, &config).unwrap();

    let levels = LevelConfig { macro_enabled: false, meso_enabled: true, micro_enabled: true };
    let second = session.redetect(levels, config.detection.clone()).unwrap();

    assert_eq!(
        second.boundary_frames(SegmentationLevel::Macro),
        first.boundary_frames(SegmentationLevel::Macro)
    );
    assert!(second.is_nested());
}
