//! Trained-model phone detection with frame skipping

use std::sync::{Mutex, PoisonError};

use frame::VideoFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::heuristic::detect_phone_like_object;
use crate::{PhoneDetectorConfig, PhoneError};

/// Substrings that mark a class label as a phone
pub const PHONE_LABEL_TOKENS: [&str; 4] = ["cell phone", "mobile phone", "phone", "mobile"];

/// Axis-aligned box in pixel coordinates of the classified frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Intersection over union with another box
    pub fn iou(&self, other: &BBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        let union = self.width() * self.height() + other.width() * other.height() - inter;
        inter / union
    }
}

/// One classifier detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BBox,
}

/// Per-call inference parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictParams {
    pub confidence: f32,
    pub iou: f32,
    pub image_size: u32,
}

impl From<&PhoneDetectorConfig> for PredictParams {
    fn from(config: &PhoneDetectorConfig) -> Self {
        Self {
            confidence: config.confidence,
            iou: config.iou,
            image_size: config.image_size,
        }
    }
}

/// Object classifier capability (YOLO-style)
pub trait ObjectClassifier: Send + Sync {
    /// Class labels indexed by class id
    fn labels(&self) -> &[String];

    /// Detect objects, restricted to `classes` when given
    fn predict(
        &self,
        frame: &VideoFrame,
        params: &PredictParams,
        classes: Option<&[usize]>,
    ) -> Result<Vec<Detection>, PhoneError>;
}

/// Class ids whose lowercased label contains a phone token; `None` means no filter
pub fn resolve_phone_classes(labels: &[String]) -> Option<Vec<usize>> {
    let ids: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, label)| {
            let label = label.trim().to_lowercase();
            PHONE_LABEL_TOKENS.iter().any(|token| label.contains(token))
        })
        .map(|(id, _)| id)
        .collect();

    if ids.is_empty() {
        None
    } else {
        Some(ids)
    }
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes
pub fn nms(mut detections: Vec<Detection>, iou_thresh: f32) -> Vec<Detection> {
    detections.sort_unstable_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        kept.push(detections[i]);
        for j in (i + 1)..detections.len() {
            if detections[i].bbox.iou(&detections[j].bbox) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }

    kept
}

#[derive(Debug, Default)]
struct SkipState {
    frame_counter: u64,
    last_detected: bool,
    last_infer_frame: u64,
}

/// Model-backed detector; runs inference every Nth frame and holds positives briefly
pub struct ModelDetector {
    classifier: Box<dyn ObjectClassifier>,
    params: PredictParams,
    class_ids: Option<Vec<usize>>,
    frame_skip: u64,
    persist_frames: u64,
    max_dim: u32,
    state: Mutex<SkipState>,
}

impl ModelDetector {
    /// Create a detector; phone classes are resolved once here
    pub fn new(classifier: Box<dyn ObjectClassifier>, config: &PhoneDetectorConfig) -> Self {
        let class_ids = resolve_phone_classes(classifier.labels());
        info!(
            classes = ?class_ids,
            frame_skip = config.effective_frame_skip(),
            "Phone model detector ready"
        );
        Self {
            classifier,
            params: PredictParams::from(config),
            class_ids,
            frame_skip: config.effective_frame_skip() as u64,
            persist_frames: config.persist_frames() as u64,
            max_dim: config.effective_max_dim(),
            state: Mutex::new(SkipState::default()),
        }
    }

    /// Phone decision for the next frame in the stream
    pub fn detect(&self, frame: &VideoFrame) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.frame_counter += 1;
        let counter = state.frame_counter;

        let should_infer = counter == 1 || counter % self.frame_skip == 0;
        if !should_infer {
            return state.last_detected && counter - state.last_infer_frame <= self.persist_frames;
        }

        let detected = match self.infer(frame) {
            Ok(detected) => detected,
            Err(e) => {
                warn!("Phone model inference failed, using heuristic for this frame: {}", e);
                detect_phone_like_object(frame)
            }
        };

        state.last_detected = detected;
        state.last_infer_frame = counter;
        detected
    }

    fn infer(&self, frame: &VideoFrame) -> Result<bool, PhoneError> {
        let prepared;
        let input = if frame.max_dimension() > self.max_dim {
            prepared = frame.fit_within(self.max_dim)?;
            &prepared
        } else {
            frame
        };

        let detections = self
            .classifier
            .predict(input, &self.params, self.class_ids.as_deref())?;
        debug!(count = detections.len(), "Phone model detections");
        Ok(!detections.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;

    type Script = Arc<Mutex<VecDeque<Result<usize, ()>>>>;
    /// (width, height, class filter) per inference call
    type Calls = Arc<Mutex<Vec<(u32, u32, Option<Vec<usize>>)>>>;

    /// Pops a scripted detection count per inference call
    struct Scripted {
        labels: Vec<String>,
        script: Script,
        calls: Calls,
    }

    impl ObjectClassifier for Scripted {
        fn labels(&self) -> &[String] {
            &self.labels
        }

        fn predict(
            &self,
            frame: &VideoFrame,
            _params: &PredictParams,
            classes: Option<&[usize]>,
        ) -> Result<Vec<Detection>, PhoneError> {
            self.calls
                .lock()
                .unwrap()
                .push((frame.width, frame.height, classes.map(|c| c.to_vec())));
            let next = self.script.lock().unwrap().pop_front().unwrap_or(Ok(0));
            match next {
                Ok(count) => Ok(vec![
                    Detection {
                        class_id: 67,
                        confidence: 0.9,
                        bbox: BBox {
                            x1: 0.0,
                            y1: 0.0,
                            x2: 1.0,
                            y2: 1.0
                        },
                    };
                    count
                ]),
                Err(()) => Err(PhoneError::Inference("scripted failure".into())),
            }
        }
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn detector(script: Vec<Result<usize, ()>>, skip: u32) -> (ModelDetector, Calls) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let classifier = Scripted {
            labels: labels(&["person", "cell phone", "book"]),
            script: Arc::new(Mutex::new(script.into())),
            calls: calls.clone(),
        };
        let config = PhoneDetectorConfig {
            frame_skip: skip,
            ..Default::default()
        };
        (ModelDetector::new(Box::new(classifier), &config), calls)
    }

    fn blank(width: u32, height: u32) -> VideoFrame {
        VideoFrame::from_fn(width, height, |_, _| [128, 128, 128])
    }

    #[test]
    fn test_resolve_phone_classes() {
        let names = labels(&["person", " Cell Phone ", "Mobile", "microphone", "car"]);
        assert_eq!(resolve_phone_classes(&names), Some(vec![1, 2, 3]));
        assert_eq!(resolve_phone_classes(&labels(&["person", "car"])), None);
    }

    #[test]
    fn test_frame_skip_holds_positive_then_decays() {
        // infer on frames 1, 3, 6; frame 3 positive
        let (det, calls) = detector(vec![Ok(0), Ok(1), Ok(0)], 3);
        let frame = blank(64, 48);

        let decisions: Vec<bool> = (0..7).map(|_| det.detect(&frame)).collect();
        // 1: infer neg, 2: hold neg, 3: infer pos, 4: held, 5: held, 6: infer neg, 7: neg
        assert_eq!(decisions, vec![false, false, true, true, true, false, false]);
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_persistence_window_expires() {
        // skip 4: infer on 1, 4, 8; persistence 3
        let (det, _) = detector(vec![Ok(1), Ok(1)], 4);
        let frame = blank(64, 48);
        let decisions: Vec<bool> = (0..7).map(|_| det.detect(&frame)).collect();
        // 1 infer pos, 2-3 held, 4 infer pos, 5-7 held (7 - 4 = 3)
        assert_eq!(decisions, vec![true, true, true, true, true, true, true]);
        // frame 8 infers and the script is exhausted
        assert!(!det.detect(&frame));
    }

    #[test]
    fn test_inference_failure_uses_heuristic() {
        let (det, _) = detector(vec![Err(())], 3);
        // featureless frame: heuristic says no phone
        assert!(!det.detect(&blank(64, 48)));

        let (det, _) = detector(vec![Err(())], 3);
        let phone = VideoFrame::from_fn(320, 240, |x, y| {
            if (135..185).contains(&x) && (75..165).contains(&y) {
                [35, 35, 40]
            } else {
                [170, 170, 170]
            }
        });
        assert!(det.detect(&phone));
        // held on the next skipped frame
        assert!(det.detect(&blank(64, 48)));
    }

    #[test]
    fn test_large_frames_downscaled_and_filtered() {
        let (det, calls) = detector(vec![Ok(0)], 3);
        det.detect(&blank(1920, 1080));
        let calls = calls.lock().unwrap();
        let (w, h, classes) = &calls[0];
        assert_eq!(*w, 960);
        assert_eq!(*h, 540);
        assert_eq!(classes.as_deref(), Some(&[1usize][..]));
    }

    #[test]
    fn test_nms_suppresses_overlaps() {
        let det = |x1: f32, confidence: f32| Detection {
            class_id: 0,
            confidence,
            bbox: BBox {
                x1,
                y1: 0.0,
                x2: x1 + 10.0,
                y2: 10.0,
            },
        };
        let kept = nms(vec![det(0.0, 0.5), det(1.0, 0.9), det(50.0, 0.4)], 0.45);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.4);
    }
}
