//! Image-sequence sink.
//!
//! Writes each annotated frame as `frame_000001.png`, numbered in write order,
//! and on `finish` a `sequence.json` manifest with the frame rate, size and count
//! needed to mux the sequence back into a video.
//!
//! `begin` removes the frames and manifest of any earlier sequence in the same
//! directory; other files are left alone.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::FrameSink;
use crate::frame::{Frame, SourceInfo};

pub const MANIFEST_FILE: &str = "sequence.json";

const FRAME_PREFIX: &str = "frame_";
const FRAME_SUFFIX: &str = ".png";

fn frame_file_name(number: u64) -> String {
    format!("{}{:06}{}", FRAME_PREFIX, number, FRAME_SUFFIX)
}

fn is_sequence_file(name: &str) -> bool {
    if name == MANIFEST_FILE {
        return true;
    }
    name.strip_prefix(FRAME_PREFIX)
        .and_then(|rest| rest.strip_suffix(FRAME_SUFFIX))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Delete the frames and manifest of a previous sequence in `dir`.
fn clear_previous_sequence(dir: &Path) -> Result<usize> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?;
    let mut removed = 0;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_sequence_file(name) || !entry.path().is_file() {
            continue;
        }
        std::fs::remove_file(entry.path())
            .with_context(|| format!("failed to remove stale {}", entry.path().display()))?;
        removed += 1;
    }
    Ok(removed)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SequenceManifest {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub frame_count: u64,
    /// Source frame index of every written frame, in order.
    pub source_frames: Vec<u64>,
}

impl SequenceManifest {
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&raw).map_err(|e| anyhow!("invalid manifest {}: {}", path.display(), e))
    }
}

pub struct ImageSequenceSink {
    dir: PathBuf,
    manifest: Option<SequenceManifest>,
    finished: bool,
}

impl ImageSequenceSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            manifest: None,
            finished: false,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn frames_written(&self) -> u64 {
        self.manifest.as_ref().map_or(0, |m| m.frame_count)
    }
}

impl FrameSink for ImageSequenceSink {
    fn begin(&mut self, source: &SourceInfo, width: u32, height: u32) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create output directory {}", self.dir.display()))?;
        let removed = clear_previous_sequence(&self.dir)?;
        if removed > 0 {
            log::info!(
                "removed {} file(s) of a previous sequence from {}",
                removed,
                self.dir.display()
            );
        }
        self.manifest = Some(SequenceManifest {
            fps: source.fps,
            width,
            height,
            frame_count: 0,
            source_frames: Vec::new(),
        });
        self.finished = false;
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        let manifest = self
            .manifest
            .as_mut()
            .ok_or_else(|| anyhow!("image sequence sink written before begin"))?;
        if self.finished {
            return Err(anyhow!("image sequence sink already finished"));
        }
        let number = manifest.frame_count + 1;
        let path = self.dir.join(frame_file_name(number));
        frame
            .image()
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        manifest.frame_count = number;
        manifest.source_frames.push(frame.index);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let Some(manifest) = &self.manifest else {
            return Ok(());
        };
        let path = self.dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(manifest)?;
        std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
        log::info!(
            "wrote {} frame(s) at {:.2} fps to {}",
            manifest.frame_count,
            manifest.fps,
            self.dir.display()
        );
        Ok(())
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn info() -> SourceInfo {
        SourceInfo {
            width: 4,
            height: 2,
            fps: 30.0,
            frame_count: Some(8),
        }
    }

    #[test]
    fn writes_numbered_frames_and_manifest() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let mut sink = ImageSequenceSink::new(&out);
        sink.begin(&info(), 4, 2).unwrap();
        for index in [4, 8] {
            sink.write(&Frame::new(index, 4, 2, vec![9; 24]).unwrap())
                .unwrap();
        }
        sink.finish().unwrap();

        assert!(out.join("frame_000001.png").is_file());
        assert!(out.join("frame_000002.png").is_file());
        let manifest = SequenceManifest::load(&out).unwrap();
        assert_eq!(manifest.fps, 30.0);
        assert_eq!(manifest.frame_count, 2);
        assert_eq!(manifest.source_frames, vec![4, 8]);
        assert_eq!(sink.frames_written(), 2);
    }

    #[test]
    fn begin_replaces_an_earlier_sequence() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().to_path_buf();
        let notes = out.join("notes.txt");
        std::fs::write(&notes, "keep").unwrap();

        let mut first = ImageSequenceSink::new(&out);
        first.begin(&info(), 4, 2).unwrap();
        for index in 1..=8 {
            first
                .write(&Frame::new(index, 4, 2, vec![1; 24]).unwrap())
                .unwrap();
        }
        first.finish().unwrap();
        assert!(out.join("frame_000008.png").is_file());

        let mut second = ImageSequenceSink::new(&out);
        second.begin(&info(), 4, 2).unwrap();
        assert!(!out.join(MANIFEST_FILE).exists());
        for index in 1..=2 {
            second
                .write(&Frame::new(index, 4, 2, vec![2; 24]).unwrap())
                .unwrap();
        }
        second.finish().unwrap();

        let mut names: Vec<String> = std::fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec!["frame_000001.png", "frame_000002.png", "notes.txt", MANIFEST_FILE]
        );
        assert_eq!(SequenceManifest::load(&out).unwrap().frame_count, 2);
    }

    #[test]
    fn only_sequence_files_are_cleared() {
        assert!(is_sequence_file("frame_000001.png"));
        assert!(is_sequence_file("frame_1234567.png"));
        assert!(is_sequence_file(MANIFEST_FILE));
        assert!(!is_sequence_file("frame_.png"));
        assert!(!is_sequence_file("frame_0001.jpg"));
        assert!(!is_sequence_file("frame_final.png"));
        assert!(!is_sequence_file("cover.png"));
    }

    #[test]
    fn write_before_begin_fails() {
        let dir = TempDir::new().unwrap();
        let mut sink = ImageSequenceSink::new(dir.path());
        assert!(sink.write(&Frame::new(1, 1, 1, vec![0; 3]).unwrap()).is_err());
        sink.finish().unwrap();
    }
}
