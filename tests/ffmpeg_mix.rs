//! Runs the real ffmpeg when it is installed; skipped otherwise.

use std::{path::Path, sync::Arc};

use stemdeck::{
    core::engine::is_tool_available, AudioFormat, ConvertOutcome, FfmpegPostProcessor,
    MixOutcome, PostProcessor, SystemRunner,
};

const RATE: u32 = 44_100;

fn ffmpeg() -> Option<FfmpegPostProcessor> {
    if !is_tool_available(&SystemRunner, "ffmpeg", "-version") {
        eprintln!("ffmpeg not found, skipping");
        return None;
    }
    Some(FfmpegPostProcessor::new(Arc::new(SystemRunner), "ffmpeg"))
}

fn write_tone(path: &Path, secs: f32, freq: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut w = hound::WavWriter::create(path, spec).unwrap();
    let n = (secs * RATE as f32) as usize;
    for i in 0..n {
        let t = i as f32 / RATE as f32;
        let s = (t * freq * 2.0 * std::f32::consts::PI).sin() * 0.3;
        w.write_sample((s * i16::MAX as f32) as i16).unwrap();
    }
    w.finalize().unwrap();
}

fn duration_secs(path: &Path) -> f32 {
    let r = hound::WavReader::open(path).unwrap();
    r.duration() as f32 / r.spec().sample_rate as f32
}

#[test]
fn mix_spans_the_longest_input() {
    let Some(pp) = ffmpeg() else { return };
    let tmp = tempfile::tempdir().unwrap();
    let drums = tmp.path().join("drums.wav");
    let bass = tmp.path().join("bass.wav");
    write_tone(&drums, 1.0, 220.0);
    write_tone(&bass, 2.0, 55.0);

    let out = tmp.path().join("session").join("mixed_audio.wav");
    let outcome = pp
        .mix(&[drums.as_path(), bass.as_path()], &out, Some(AudioFormat::Wav))
        .unwrap();
    assert_eq!(outcome, MixOutcome::Mixed(out.clone()));

    let d = duration_secs(&out);
    assert!((d - 2.0).abs() < 0.1, "mix lasted {d}s");
}

#[test]
fn mix_with_missing_input_runs_nothing() {
    let Some(pp) = ffmpeg() else { return };
    let tmp = tempfile::tempdir().unwrap();
    let drums = tmp.path().join("drums.wav");
    write_tone(&drums, 0.5, 220.0);
    let bass = tmp.path().join("bass.wav");
    let out = tmp.path().join("mixed_audio.wav");

    let outcome = pp
        .mix(&[drums.as_path(), bass.as_path()], &out, Some(AudioFormat::Wav))
        .unwrap();
    assert_eq!(outcome, MixOutcome::Unavailable { missing: vec![bass] });
    assert!(!out.exists());
}

#[test]
fn wav_converts_to_mp3_and_replaces_original() {
    let Some(pp) = ffmpeg() else { return };
    let tmp = tempfile::tempdir().unwrap();
    let vocals = tmp.path().join("vocals.wav");
    write_tone(&vocals, 0.5, 440.0);

    // builds without libmp3lame leave the original in place
    match pp.convert(&vocals, AudioFormat::Mp3) {
        ConvertOutcome::Converted(out) => {
            assert_eq!(out, tmp.path().join("vocals.mp3"));
            assert!(out.is_file());
            assert!(!vocals.exists());
        }
        ConvertOutcome::Unchanged(out) => {
            assert_eq!(out, vocals);
            assert!(vocals.is_file());
        }
    }
}

#[test]
fn compressed_wav_keeps_the_path() {
    let Some(pp) = ffmpeg() else { return };
    let tmp = tempfile::tempdir().unwrap();
    let other = tmp.path().join("other.wav");
    write_tone(&other, 1.0, 330.0);
    let before = std::fs::metadata(&other).unwrap().len();

    let out = pp.convert(&other, AudioFormat::CompressedWav);
    assert_eq!(out, ConvertOutcome::Converted(other.clone()));
    assert!(std::fs::metadata(&other).unwrap().len() < before);
}

#[test]
fn garbage_input_cannot_be_compressed_in_place() {
    let Some(pp) = ffmpeg() else { return };
    let tmp = tempfile::tempdir().unwrap();
    let bad = tmp.path().join("drums.wav");
    std::fs::write(&bad, b"not audio at all").unwrap();

    let out = pp.convert(&bad, AudioFormat::CompressedWav);
    assert_eq!(out, ConvertOutcome::Unchanged(bad.clone()));
    assert_eq!(std::fs::read(&bad).unwrap(), b"not audio at all");
}

#[test]
fn garbage_input_is_left_untouched() {
    let Some(pp) = ffmpeg() else { return };
    let tmp = tempfile::tempdir().unwrap();
    let bad = tmp.path().join("bad.wav");
    std::fs::write(&bad, b"not audio at all").unwrap();

    let out = pp.convert(&bad, AudioFormat::Mp3);
    assert_eq!(out, ConvertOutcome::Unchanged(bad.clone()));
    assert_eq!(std::fs::read(&bad).unwrap(), b"not audio at all");
    assert!(!tmp.path().join("bad.mp3").exists());
}
