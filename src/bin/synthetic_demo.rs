// Demo binary: segments a synthetic A-B-A-C signal

use std::f32::consts::PI;
use std::sync::Arc;

use structure_segmenter::{
    audio::AudioData,
    config::AnalysisConfig,
    features::FeatureKind,
    session::{AnalysisSession, CalculationEvent, ChannelListener},
    SegmentationLevel,
};

const SAMPLE_RATE: u32 = 22050;

/// One section: a chord of partials with a slow tremolo so frames are not identical
fn section(partials: &[f32], seconds: f32) -> Vec<f32> {
    let len = (seconds * SAMPLE_RATE as f32) as usize;
    (0..len)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            let tremolo = 0.8 + 0.2 * (2.0 * PI * 0.5 * t).sin();
            let sum: f32 = partials.iter().map(|f| (2.0 * PI * f * t).sin()).sum();
            tremolo * sum / partials.len() as f32 * 0.5
        })
        .collect()
}

fn create_test_audio() -> AudioData {
    let a = [220.0, 277.2, 329.6];
    let b = [196.0, 246.9, 293.7, 392.0];
    let c = [523.3, 659.3];

    let mut samples = Vec::new();
    samples.extend(section(&a, 30.0));
    samples.extend(section(&b, 30.0));
    samples.extend(section(&a, 30.0));
    samples.extend(section(&c, 30.0));

    AudioData::from_mono(samples, SAMPLE_RATE, "synthetic-a-b-a-c")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("🎵 Structure-Segmenter synthetic demo");

    println!("\n1. Creating synthetic audio...");
    let audio = create_test_audio();
    println!("   ✅ {:.1}s, sections change at 30s, 60s and 90s", audio.duration);

    println!("\n2. Running analysis...");
    let mut config = AnalysisConfig::high_resolution();
    config.features.enabled = vec![FeatureKind::Mfcc, FeatureKind::Autocorrelation];

    let session = AnalysisSession::new();
    let (listener, events) = ChannelListener::channel();
    session.add_listener(Arc::new(listener));

    let result = session.run(&audio, &config)?;
    for event in events.try_iter() {
        if let CalculationEvent::Done(outcome) = event {
            println!("   ✅ Run finished: {:?}", outcome);
        }
    }

    println!("\n3. Boundaries:");
    for level in SegmentationLevel::ALL {
        let Some(segmentation) = result.level(level) else {
            continue;
        };
        let times: Vec<String> = segmentation
            .boundaries
            .iter()
            .map(|b| format!("{:.1}s", b.time))
            .collect();
        println!("   {:>5}: {}", level, times.join(", "));
    }

    println!("\n4. Detection only, macro level skipped...");
    let mut levels = config.levels;
    levels.macro_enabled = false;
    let refined = session.redetect(levels, config.detection.clone())?;
    println!(
        "   ✅ Macro kept: {} boundaries, micro: {} boundaries",
        refined.boundary_frames(SegmentationLevel::Macro).len(),
        refined.boundary_frames(SegmentationLevel::Micro).len()
    );

    Ok(())
}
