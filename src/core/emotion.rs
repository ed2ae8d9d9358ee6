use crate::camera::{BoundedFrames, DeviceOpener};
use crate::common::config::EmotionConfig;
use crate::common::{MoodFitError, Result};
use crate::core::recognizer::Recognizer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Emotions the workout catalog knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Emotion {
    Happy,
    Sad,
    Angry,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 4] = [Emotion::Happy, Emotion::Sad, Emotion::Angry, Emotion::Neutral];

    /// Case-insensitive; labels outside the set give `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|emotion| emotion.as_str().eq_ignore_ascii_case(label))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happy => "Happy",
            Emotion::Sad => "Sad",
            Emotion::Angry => "Angry",
            Emotion::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Emotion {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Distinct values of `samples` in order of first appearance, at most `cap`.
pub fn first_distinct<T: PartialEq + Copy>(samples: &[T], cap: usize) -> Vec<T> {
    let mut distinct = Vec::with_capacity(cap);
    for sample in samples {
        if distinct.len() == cap {
            break;
        }
        if !distinct.contains(sample) {
            distinct.push(*sample);
        }
    }
    distinct
}

pub struct EmotionSensor<'a> {
    opener: &'a dyn DeviceOpener,
    recognizer: &'a dyn Recognizer,
    timeout: Duration,
    max_samples: usize,
    max_distinct: usize,
}

impl<'a> EmotionSensor<'a> {
    pub fn new(opener: &'a dyn DeviceOpener, recognizer: &'a dyn Recognizer, config: &EmotionConfig) -> Self {
        Self {
            opener,
            recognizer,
            timeout: Duration::from_secs(config.timeout_seconds),
            max_samples: config.max_samples,
            max_distinct: config.max_distinct,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sample the camera and return the first few distinct emotions seen.
    ///
    /// Fails only when the camera cannot be opened or started. A read error
    /// mid-stream ends sampling early with whatever was collected.
    pub fn sense(&self) -> Result<Vec<Emotion>> {
        let mut device = self.opener.open()?;
        let mut stream = device.start_stream()?;
        let mut frames = BoundedFrames::new(stream.as_mut(), self.timeout);

        println!("🙂 Detecting emotions...");
        let mut samples = Vec::with_capacity(self.max_samples);

        while samples.len() < self.max_samples {
            let Some(frame) = frames.next() else { break };
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!("Camera read failed, stopping after {} samples: {}", samples.len(), e);
                    break;
                }
            };

            match self.recognizer.analyze_emotion(&frame) {
                Ok(reading) => match Emotion::from_label(&reading.dominant) {
                    Some(emotion) => samples.push(emotion),
                    None => tracing::warn!("Ignoring emotion '{}'", reading.dominant),
                },
                Err(MoodFitError::NoFaceDetected) => tracing::warn!("No face in frame"),
                Err(e) => tracing::warn!("Emotion detection error: {}", e),
            }
        }

        tracing::debug!(
            "Collected {} emotion samples from {} frames",
            samples.len(),
            frames.frames_pulled()
        );

        Ok(first_distinct(&samples, self.max_distinct))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::testing::{ScriptedOpener, Shot};
    use crate::core::recognizer::testing::FakeRecognizer;

    fn sensor<'a>(opener: &'a ScriptedOpener, recognizer: &'a FakeRecognizer) -> EmotionSensor<'a> {
        EmotionSensor::new(opener, recognizer, &EmotionConfig::default()).with_timeout(Duration::from_millis(200))
    }

    fn recognizer() -> FakeRecognizer {
        FakeRecognizer::default()
            .with_emotion(1, "happy")
            .with_emotion(2, "sad")
            .with_emotion(3, "fear")
            .with_emotion(4, "neutral")
            .with_emotion(5, "angry")
    }

    #[test]
    fn keeps_first_three_distinct_in_order() {
        let script = [1, 3, 1, 2, 0, 2, 4, 5, 1, 1, 1, 1]
            .into_iter()
            .map(Shot::Frame)
            .collect();
        let opener = ScriptedOpener::new(script);
        let recognizer = recognizer();

        let emotions = sensor(&opener, &recognizer).sense().unwrap();
        assert_eq!(emotions, vec![Emotion::Happy, Emotion::Sad, Emotion::Neutral]);
        assert_eq!(opener.counters.released(), 1);
    }

    #[test]
    fn stops_after_max_samples() {
        let script: Vec<Shot> = std::iter::repeat(Shot::Frame(1))
            .take(10)
            .chain([Shot::Frame(2)])
            .collect();
        let recognizer = recognizer();

        let opener = ScriptedOpener::new(script.clone());
        let config = EmotionConfig { max_distinct: 4, ..EmotionConfig::default() };
        let emotions = EmotionSensor::new(&opener, &recognizer, &config)
            .with_timeout(Duration::from_millis(200))
            .sense()
            .unwrap();
        assert_eq!(emotions, vec![Emotion::Happy]);

        // one more sample reaches the first sad frame
        let opener = ScriptedOpener::new(script);
        let config = EmotionConfig { max_samples: 11, max_distinct: 4, ..EmotionConfig::default() };
        let emotions = EmotionSensor::new(&opener, &recognizer, &config)
            .with_timeout(Duration::from_millis(200))
            .sense()
            .unwrap();
        assert_eq!(emotions, vec![Emotion::Happy, Emotion::Sad]);
    }

    #[test]
    fn read_failure_keeps_collected_samples() {
        let opener = ScriptedOpener::new(vec![Shot::Frame(2), Shot::Frame(5), Shot::Broken]);
        let recognizer = recognizer();

        let emotions = sensor(&opener, &recognizer).sense().unwrap();
        assert_eq!(emotions, vec![Emotion::Sad, Emotion::Angry]);
        assert_eq!(opener.counters.released(), 1);
    }

    #[test]
    fn no_faces_until_timeout_is_empty() {
        let opener = ScriptedOpener::new(vec![Shot::Frame(0)]);
        let recognizer = recognizer();

        let sensor = EmotionSensor::new(&opener, &recognizer, &EmotionConfig::default())
            .with_timeout(Duration::from_millis(30));
        assert!(sensor.sense().unwrap().is_empty());
    }

    #[test]
    fn unavailable_camera_fails_fast() {
        let opener = ScriptedOpener::unavailable();
        let recognizer = recognizer();

        assert!(matches!(sensor(&opener, &recognizer).sense(), Err(MoodFitError::DeviceError(_))));
    }

    #[test]
    fn labels_outside_the_set_are_rejected() {
        assert_eq!(Emotion::from_label(" HAPPY "), Some(Emotion::Happy));
        assert_eq!(Emotion::from_label("surprise"), None);
        assert_eq!(first_distinct(&[3, 3, 1, 2, 4], 3), vec![3, 1, 2]);
    }
}
