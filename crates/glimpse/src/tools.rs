//! A set of built-in tools that models can use.

mod capture;
mod read_file;

pub use capture::{
    CaptureHost, CaptureResolution, CaptureScreenImageTool,
    CaptureScreenTextTool, ScreenCapture, ScreenText,
};
pub use read_file::ReadFileTool;
