use std::path::Path;
use std::process::Command;
use tracing::debug;

use crate::error::{DubError, Result};

/// One external encoder invocation, assembled argument by argument.
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Request hardware-accelerated decoding for the next input
    pub fn hwaccel<S: Into<String>>(self, accel: S) -> Self {
        self.arg("-hwaccel").arg(accel)
    }

    /// Seek the next input to the given offset in seconds
    pub fn seek(self, seconds: f64) -> Self {
        self.arg("-ss").arg(seconds.to_string())
    }

    /// Limit the next input to the given duration in seconds
    pub fn duration(self, seconds: f64) -> Self {
        self.arg("-t").arg(seconds.to_string())
    }

    /// Loop the next input indefinitely (animated watermarks)
    pub fn loop_input(self) -> Self {
        self.arg("-stream_loop").arg("-1")
    }

    /// Attach a complex filter graph
    pub fn filter_complex<S: Into<String>>(self, graph: S) -> Self {
        self.arg("-filter_complex").arg(graph)
    }

    /// Map a labeled stream into the output
    pub fn map<S: Into<String>>(self, label: S) -> Self {
        self.arg("-map").arg(label)
    }

    /// Set video codec
    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Copy audio stream
    pub fn copy_audio(self) -> Self {
        self.audio_codec("copy")
    }

    /// Set target video bitrate
    pub fn video_bitrate<S: Into<String>>(self, bitrate: S) -> Self {
        self.arg("-b:v").arg(bitrate)
    }

    /// Add video filter (single-stream form)
    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    /// Execute the command, blocking until the encoder finishes.
    pub fn execute(&self) -> Result<()> {
        debug!("Executing media command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .map_err(|e| DubError::Media(format!("Failed to execute encoder: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DubError::Media(format!(
                "{} failed: {}",
                self.description, stderr
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_options_precede_their_input() {
        let cmd = MediaCommand::new("ffmpeg", "test")
            .overwrite()
            .hwaccel("cuda")
            .seek(2.0)
            .duration(56.0)
            .input("download.mp4")
            .loop_input()
            .input("mark.gif");

        assert_eq!(
            cmd.args,
            vec![
                "-y", "-hwaccel", "cuda", "-ss", "2", "-t", "56", "-i", "download.mp4",
                "-stream_loop", "-1", "-i", "mark.gif",
            ]
        );
    }

    #[test]
    fn test_codec_and_mapping_helpers() {
        let cmd = MediaCommand::new("ffmpeg", "test")
            .filter_complex("[0:v]hflip[vout]")
            .map("[vout]")
            .map("0:a")
            .video_codec("libx264")
            .video_bitrate("5000k")
            .copy_audio()
            .output("out.mp4");

        assert_eq!(
            cmd.args,
            vec![
                "-filter_complex", "[0:v]hflip[vout]", "-map", "[vout]", "-map", "0:a",
                "-c:v", "libx264", "-b:v", "5000k", "-c:a", "copy", "out.mp4",
            ]
        );
    }
}
