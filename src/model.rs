//! Pose estimator boundary.
//!
//! The estimator owns the camera and the pretrained networks; this crate only
//! sees its per-frame output. Implementations block, so the detection loop
//! calls them from `spawn_blocking`.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use crate::posture::PoseFrame;

pub trait PoseEstimator: Send + Sync + 'static {
    /// Grab the current frame and run pose + posture classification on it.
    /// `Ok(None)` means nobody is in view.
    fn estimate(&self) -> Result<Option<PoseFrame>>;
}

/// Plays back recorded estimator output, one JSON `PoseFrame` (or `null` for
/// an empty frame) per line. Cancels `exhausted` once the last line is used.
pub struct ReplayEstimator {
    lines: Mutex<VecDeque<String>>,
    exhausted: CancellationToken,
}

impl ReplayEstimator {
    pub fn from_path(path: &Path, exhausted: CancellationToken) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open replay file {}", path.display()))?;
        Self::from_reader(BufReader::new(file), exhausted)
    }

    pub fn from_reader<R: BufRead>(reader: R, exhausted: CancellationToken) -> Result<Self> {
        let mut lines = VecDeque::new();
        for line in reader.lines() {
            let line = line.context("failed to read replay line")?;
            if !line.trim().is_empty() {
                lines.push_back(line);
            }
        }
        if lines.is_empty() {
            exhausted.cancel();
        }
        Ok(Self {
            lines: Mutex::new(lines),
            exhausted,
        })
    }

    pub fn remaining(&self) -> usize {
        match self.lines.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl PoseEstimator for ReplayEstimator {
    fn estimate(&self) -> Result<Option<PoseFrame>> {
        let next = {
            let mut guard = match self.lines.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let next = guard.pop_front();
            if guard.is_empty() {
                self.exhausted.cancel();
            }
            next
        };

        match next {
            Some(line) => serde_json::from_str::<Option<PoseFrame>>(&line)
                .with_context(|| format!("malformed replay frame: {line}")),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const RECORDING: &str = r#"
{"keypoints":[],"class":"good","confidence":0.9}
null

{"class":"bad","confidence":0.7}
not json
"#;

    #[test]
    fn replays_frames_in_order_then_signals_end() {
        let done = CancellationToken::new();
        let replay = ReplayEstimator::from_reader(Cursor::new(RECORDING), done.clone()).unwrap();
        assert_eq!(replay.remaining(), 4);

        let first = replay.estimate().unwrap().unwrap();
        assert_eq!(first.class_label, "good");
        assert!(replay.estimate().unwrap().is_none());
        assert_eq!(replay.estimate().unwrap().unwrap().confidence, 0.7);
        assert!(!done.is_cancelled());

        assert!(replay.estimate().is_err());
        assert!(done.is_cancelled());
        assert!(replay.estimate().unwrap().is_none());
    }

    #[test]
    fn empty_recording_is_exhausted_immediately() {
        let done = CancellationToken::new();
        ReplayEstimator::from_reader(Cursor::new("\n\n"), done.clone()).unwrap();
        assert!(done.is_cancelled());
    }
}
