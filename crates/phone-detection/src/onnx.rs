//! YOLOv8 ONNX classifier (tract)

use std::fs;
use std::path::Path;

use frame::VideoFrame;
use tracing::info;
use tract_onnx::prelude::*;

use crate::model::{nms, BBox, Detection, ObjectClassifier, PredictParams};
use crate::PhoneError;

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// COCO class names in YOLO order
pub const COCO_LABELS: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

/// YOLOv8 detector with output layout `[1, 4 + classes, proposals]`
pub struct OnnxYoloClassifier {
    model: Plan,
    labels: Vec<String>,
    input_size: u32,
}

impl OnnxYoloClassifier {
    /// Load and optimize the model for a fixed square input
    pub fn load(
        model_path: &Path,
        labels_path: Option<&Path>,
        input_size: u32,
    ) -> Result<Self, PhoneError> {
        let size = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .and_then(|m| m.with_input_fact(0, f32::fact([1, 3, size, size]).into()))
            .and_then(|m| m.into_optimized())
            .and_then(|m| m.into_runnable())
            .map_err(|e| PhoneError::ModelLoad(format!("{}: {}", model_path.display(), e)))?;

        let labels = match labels_path {
            Some(path) => load_labels(path)?,
            None => COCO_LABELS.iter().map(|s| s.to_string()).collect(),
        };

        info!(
            model = %model_path.display(),
            classes = labels.len(),
            input_size,
            "Phone model loaded"
        );
        Ok(Self {
            model,
            labels,
            input_size,
        })
    }

    fn preprocess(&self, frame: &VideoFrame) -> Result<Tensor, PhoneError> {
        let size = self.input_size;
        let resized = frame.resize(size, size)?;
        let side = size as usize;
        let array = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            let idx = (y * side + x) * 3 + c;
            resized.data.get(idx).copied().unwrap_or(0) as f32 / 255.0
        });
        Ok(array.into())
    }
}

impl ObjectClassifier for OnnxYoloClassifier {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn predict(
        &self,
        frame: &VideoFrame,
        params: &PredictParams,
        classes: Option<&[usize]>,
    ) -> Result<Vec<Detection>, PhoneError> {
        let input = self.preprocess(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| PhoneError::Inference(e.to_string()))?;

        let output = outputs
            .first()
            .ok_or_else(|| PhoneError::Inference("model produced no outputs".into()))?
            .to_array_view::<f32>()
            .map_err(|e| PhoneError::Inference(e.to_string()))?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .map_err(|e| PhoneError::Inference(format!("unexpected output rank: {}", e)))?;

        let (_, rows, proposals) = output.dim();
        if rows <= 4 {
            return Err(PhoneError::Inference(format!("unexpected output rows: {}", rows)));
        }
        let num_classes = rows - 4;

        let scale_x = frame.width as f32 / self.input_size as f32;
        let scale_y = frame.height as f32 / self.input_size as f32;

        let allowed: Vec<usize> = match classes {
            Some(ids) => ids.iter().copied().filter(|&c| c < num_classes).collect(),
            None => (0..num_classes).collect(),
        };

        let candidates: Vec<Detection> = (0..proposals)
            .filter_map(|i| {
                // Data layout: [cx, cy, w, h, cls0_score, cls1_score, ...] per column
                let (class_id, confidence) = allowed
                    .iter()
                    .map(|&c| (c, output[[0, 4 + c, i]]))
                    .max_by(|a, b| a.1.total_cmp(&b.1))?;
                if confidence < params.confidence {
                    return None;
                }

                let cx = output[[0, 0, i]];
                let cy = output[[0, 1, i]];
                let w = output[[0, 2, i]];
                let h = output[[0, 3, i]];
                Some(Detection {
                    class_id,
                    confidence,
                    bbox: BBox {
                        x1: ((cx - w / 2.0) * scale_x).max(0.0),
                        y1: ((cy - h / 2.0) * scale_y).max(0.0),
                        x2: ((cx + w / 2.0) * scale_x).min(frame.width as f32),
                        y2: ((cy + h / 2.0) * scale_y).min(frame.height as f32),
                    },
                })
            })
            .collect();

        Ok(nms(candidates, params.iou))
    }
}

/// One label per line; blank lines are skipped
fn load_labels(path: &Path) -> Result<Vec<String>, PhoneError> {
    let text = fs::read_to_string(path)
        .map_err(|e| PhoneError::Labels(format!("{}: {}", path.display(), e)))?;
    Ok(parse_labels(&text))
}

fn parse_labels(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
