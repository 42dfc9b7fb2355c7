use std::sync::Arc;

use async_trait::async_trait;
use glimpse_backend::ImageRef;
use glimpse_core::tool::{
    Error as ToolError, Tool, ToolOutput, ToolResult,
};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::{Value, json};

/// Pixel dimensions and scale factor of a captured image.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureResolution {
    /// Width of the capture in physical pixels.
    pub width: u32,
    /// Height of the capture in physical pixels.
    pub height: u32,
    /// Ratio of physical pixels to logical pixels.
    pub scale_factor: f64,
}

/// On-screen text recognized from the current screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScreenText {
    /// The recognized text.
    pub text: String,
    /// What was captured, such as `"window"` or `"screen"`.
    pub source: String,
    /// Name of the frontmost application, when known.
    pub app_name: Option<String>,
}

/// A screenshot of the current screen, persisted to a local file.
#[derive(Clone, Debug, PartialEq)]
pub struct ScreenCapture {
    /// MIME type of the image file.
    pub mime_type: String,
    /// Path of the image file on disk.
    pub file_path: String,
    /// What was captured, such as `"window"` or `"screen"`.
    pub source: String,
    /// Name of the frontmost application, when known.
    pub app_name: Option<String>,
    /// Dimensions of the captured image.
    pub resolution: CaptureResolution,
}

/// Host-side integration that performs the actual screen captures.
///
/// The capture tools are platform-agnostic. Embedders provide an
/// implementation of this trait that talks to the host's screenshot
/// and OCR facilities.
#[async_trait]
pub trait CaptureHost: Send + Sync + 'static {
    /// Recognizes the text currently visible on screen.
    async fn capture_screen_text(&self) -> Result<ScreenText, String>;

    /// Takes a screenshot of the current screen.
    async fn capture_screen_image(&self) -> Result<ScreenCapture, String>;
}

#[derive(Deserialize, JsonSchema)]
pub struct CaptureParameters {}

/// A tool for reading on-screen text via the host's OCR facility.
pub struct CaptureScreenTextTool {
    host: Arc<dyn CaptureHost>,
    parameter_schema: Value,
}

impl CaptureScreenTextTool {
    /// Creates a new screen text tool backed by the given host.
    #[inline]
    pub fn new(host: Arc<dyn CaptureHost>) -> Self {
        CaptureScreenTextTool {
            host,
            parameter_schema: schema_for!(CaptureParameters).to_value(),
        }
    }
}

impl Tool for CaptureScreenTextTool {
    type Input = CaptureParameters;

    fn name(&self) -> &str {
        "capture_screen_text"
    }

    fn description(&self) -> &str {
        "Capture on-screen text via OCR. Requires explicit user \
         approval and returns text + metadata only."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn requires_consent(&self) -> bool {
        true
    }

    fn hides_host_ui(&self) -> bool {
        true
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        _input: CaptureParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let host = Arc::clone(&self.host);
        async move {
            let capture =
                host.capture_screen_text().await.map_err(|reason| {
                    ToolError::execution_error().with_reason(reason)
                })?;
            Ok(ToolOutput::content(json!({
                "text": capture.text,
                "source": capture.source,
                "app_name": capture.app_name,
            })))
        }
    }
}

/// A tool for taking screenshots via the host.
pub struct CaptureScreenImageTool {
    host: Arc<dyn CaptureHost>,
    parameter_schema: Value,
}

impl CaptureScreenImageTool {
    /// Creates a new screenshot tool backed by the given host.
    #[inline]
    pub fn new(host: Arc<dyn CaptureHost>) -> Self {
        CaptureScreenImageTool {
            host,
            parameter_schema: schema_for!(CaptureParameters).to_value(),
        }
    }
}

impl Tool for CaptureScreenImageTool {
    type Input = CaptureParameters;

    fn name(&self) -> &str {
        "capture_screen_image"
    }

    fn description(&self) -> &str {
        "Capture a screenshot of the current screen. Requires explicit \
         user approval and returns image + metadata."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn requires_consent(&self) -> bool {
        true
    }

    fn hides_host_ui(&self) -> bool {
        true
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        _input: CaptureParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let host = Arc::clone(&self.host);
        async move {
            let capture = host
                .capture_screen_image()
                .await
                .map_err(|reason| {
                    ToolError::execution_error().with_reason(reason)
                })?;
            let payload = json!({
                "source": capture.source,
                "app_name": capture.app_name,
                "mime_type": capture.mime_type,
                "resolution": {
                    "width": capture.resolution.width,
                    "height": capture.resolution.height,
                    "scale_factor": capture.resolution.scale_factor,
                },
            });
            let prompt = attachment_prompt(capture.app_name.as_deref());
            Ok(ToolOutput::content(payload).with_attachment(
                prompt,
                vec![ImageRef(capture.file_path)],
            ))
        }
    }
}

/// Builds the follow-up prompt that accompanies a screenshot image.
fn attachment_prompt(app_name: Option<&str>) -> String {
    let lead = match app_name {
        Some(app) => format!("Screenshot from {app}."),
        None => "Screenshot attached.".to_owned(),
    };
    format!(
        "{lead} Use the image to answer the user's last request. \
         Respond in markdown. Do not include the screenshot in the \
         response."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeHost {
        fail: bool,
    }

    #[async_trait]
    impl CaptureHost for FakeHost {
        async fn capture_screen_text(&self) -> Result<ScreenText, String> {
            if self.fail {
                return Err("OCR unavailable".to_owned());
            }
            Ok(ScreenText {
                text: "Meeting at 3pm".to_owned(),
                source: "window".to_owned(),
                app_name: Some("Notes".to_owned()),
            })
        }

        async fn capture_screen_image(
            &self,
        ) -> Result<ScreenCapture, String> {
            if self.fail {
                return Err("screen recording permission denied"
                    .to_owned());
            }
            Ok(ScreenCapture {
                mime_type: "image/png".to_owned(),
                file_path: "/tmp/capture.png".to_owned(),
                source: "screen".to_owned(),
                app_name: None,
                resolution: CaptureResolution {
                    width: 2560,
                    height: 1440,
                    scale_factor: 2.0,
                },
            })
        }
    }

    #[tokio::test]
    async fn test_screen_text_payload() {
        let tool =
            CaptureScreenTextTool::new(Arc::new(FakeHost { fail: false }));
        let output = tool.execute(CaptureParameters {}).await.unwrap();
        assert_eq!(output.content["text"], json!("Meeting at 3pm"));
        assert_eq!(output.content["app_name"], json!("Notes"));
        assert!(output.attachment.is_none(), "text capture has no image");
    }

    #[tokio::test]
    async fn test_screen_image_carries_attachment() {
        let tool = CaptureScreenImageTool::new(Arc::new(FakeHost {
            fail: false,
        }));
        let output = tool.execute(CaptureParameters {}).await.unwrap();
        assert_eq!(output.content["mime_type"], json!("image/png"));
        assert_eq!(output.content["resolution"]["width"], json!(2560));

        let attachment = output.attachment.expect("image attachment");
        assert!(attachment.prompt.starts_with("Screenshot attached."));
        assert_eq!(
            attachment.images,
            vec![ImageRef("/tmp/capture.png".to_owned())]
        );
    }

    #[tokio::test]
    async fn test_host_failure_becomes_tool_error() {
        let tool =
            CaptureScreenTextTool::new(Arc::new(FakeHost { fail: true }));
        let err = tool.execute(CaptureParameters {}).await.unwrap_err();
        assert_eq!(err.reason(), "OCR unavailable");
    }

    #[test]
    fn test_attachment_prompt_names_the_app() {
        let prompt = attachment_prompt(Some("Safari"));
        assert!(prompt.starts_with("Screenshot from Safari."));
    }
}
