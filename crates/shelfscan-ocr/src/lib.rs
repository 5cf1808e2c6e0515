//! Text recognition over product images and nutrition extraction from the
//! recognized text.

pub mod batch;
pub mod credentials;
pub mod download;
pub mod engine;
pub mod error;
pub mod extract;
pub mod stitch;
mod token;
pub mod vision;

pub use batch::{BatchRecognizer, OcrRun};
pub use credentials::{ServiceAccountKey, VisionCredentials};
pub use download::{HttpImageSource, ImageSource};
pub use engine::{full_text, ImageRef, OcrEngine, TextAnnotation};
pub use error::{CredentialsError, OcrError};
pub use extract::extract_nutrition;
pub use stitch::stitch_png;
pub use vision::VisionClient;
