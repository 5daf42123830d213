use garde::Validate;
use serde::{Deserialize, Serialize};

/// One predicted bounding box.
///
/// Coordinates are the box center and size, normalized to the image
/// width/height.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct Detection {
    #[garde(range(min = 0.0, max = 1.0), custom(finite))]
    pub x: f32,

    #[garde(range(min = 0.0, max = 1.0), custom(finite))]
    pub y: f32,

    #[garde(range(min = 0.0, max = 1.0), custom(finite))]
    pub w: f32,

    #[garde(range(min = 0.0, max = 1.0), custom(finite))]
    pub h: f32,

    #[garde(range(min = 0.0, max = 1.0), custom(finite))]
    pub prob: f32,

    #[serde(rename = "class")]
    #[garde(length(min = 1, max = 100))]
    pub class_label: String,
}

/// Range checks pass NaN, since every comparison with it is false.
fn finite(value: &f32, _ctx: &()) -> garde::Result {
    if value.is_finite() {
        Ok(())
    } else {
        Err(garde::Error::new("must be a finite number"))
    }
}

/// Output of one inference call: detections plus the annotated artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    /// Reference to the annotated image, relative to the server root
    /// (e.g. `static/3f2a9c1d.jpg`).
    pub file_name: String,
    pub bbox: Vec<Detection>,
}
