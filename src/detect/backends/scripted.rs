use anyhow::{anyhow, Context, Result};
use std::path::Path;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;

/// Deterministic backend that replays a per-call detection script.
///
/// Call `n` (0-based, counting sampled frames) returns `script[n]`; calls past the
/// end return no detections, or the last entry again when built with `repeating`.
/// Used by tests, demos and offline replays of recorded detector output.
pub struct ScriptedBackend {
    script: Vec<Vec<Detection>>,
    repeat_last: bool,
    fail_on_call: Option<usize>,
    calls: usize,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Vec<Detection>>) -> Self {
        Self {
            script,
            repeat_last: false,
            fail_on_call: None,
            calls: 0,
        }
    }

    /// Same detections on every call.
    pub fn constant(detections: Vec<Detection>) -> Self {
        Self::new(vec![detections]).repeating()
    }

    /// Load a script from a JSON array of per-frame detection arrays.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detection script {}", path.display()))?;
        let script: Vec<Vec<Detection>> = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid detection script {}: {}", path.display(), e))?;
        Ok(Self::new(script))
    }

    pub fn repeating(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    /// Make call `call` (0-based) fail.
    pub fn fail_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    /// Number of `detect` calls so far.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _pixels: &[u8], _width: u32, _height: u32) -> Result<Vec<Detection>> {
        let call = self.calls;
        self.calls += 1;

        if self.fail_on_call == Some(call) {
            return Err(anyhow!("scripted failure on call {}", call));
        }

        let entry = match self.script.get(call) {
            Some(entry) => Some(entry),
            None if self.repeat_last => self.script.last(),
            None => None,
        };
        Ok(entry.cloned().unwrap_or_default())
    }
}
