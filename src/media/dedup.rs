use rand::seq::SliceRandom;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

use crate::config::MediaConfig;
use crate::error::{DubError, Result};
use crate::transcript::VideoInfo;

use super::commands::MediaCommand;

pub const VIDEO_FILE: &str = "download.mp4";
pub const OUTPUT_FILE: &str = "download_final.mp4";
pub const THUMBNAIL_FILE: &str = "download.webp";

const WATERMARK_COUNT: usize = 4;
const WATERMARK_EXTENSIONS: &[&str] = &["gif", "png", "jpg", "jpeg"];

/// The four corner positions for watermark overlays, in overlay-filter
/// coordinate expressions.
const CORNER_POSITIONS: [(&str, &str); 4] = [
    ("0", "0"),
    ("main_w-overlay_w", "0"),
    ("0", "main_h-overlay_h"),
    ("main_w-overlay_w", "main_h-overlay_h"),
];

/// Everything the filter graph needs, resolved before any randomness or
/// file I/O so graph construction stays a pure function.
#[derive(Debug, Clone)]
struct GraphSpec {
    rotate: bool,
    watermarks: usize,
    watermark_size: u32,
    mirror: bool,
    /// (source width, source height, margin) when uniform-margin cropping
    /// is enabled
    crop: Option<(u32, u32, u32)>,
    saturation: f64,
    brightness: f64,
    contrast: f64,
}

/// Cosmetic video transformation for re-upload: trim, rotate, watermark,
/// mirror, color-shift and re-encode, with a hardware-then-software encoder
/// fallback.
pub struct Deduplicator<'a> {
    config: &'a MediaConfig,
}

impl<'a> Deduplicator<'a> {
    pub fn new(config: &'a MediaConfig) -> Self {
        Self { config }
    }

    /// Check if the encoder binary is available
    pub fn check_availability(&self) -> Result<()> {
        let output = Command::new(&self.config.binary_path)
            .arg("-version")
            .output()
            .map_err(|e| DubError::Media(format!("Encoder not found: {}", e)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(DubError::Media("Encoder version check failed".to_string()))
        }
    }

    /// Produce the deduplicated variant of the downloaded video in `folder`.
    pub fn dedup_folder(&self, folder: &Path, info: &VideoInfo) -> Result<PathBuf> {
        let video_path = folder.join(VIDEO_FILE);
        if !video_path.exists() {
            return Err(DubError::FileNotFound(video_path.display().to_string()));
        }

        let duration = match info.duration {
            Some(d) => d,
            None => self.probe_duration(&video_path)?,
        };
        let clip = duration - 2.0 * self.config.trim_secs;
        if clip <= 0.0 {
            return Err(DubError::Media(format!(
                "Video too short to trim: {:.1}s",
                duration
            )));
        }

        let best = best_format(info);
        // Portrait output: rotate when the source is landscape.
        let rotate = best
            .map(|f| f.height.unwrap_or(0) < f.width.unwrap_or(0))
            .unwrap_or(false);
        if rotate {
            self.rotate_thumbnail(folder)?;
        }

        let watermarks = self.pick_watermarks()?;
        let mut rng = rand::thread_rng();
        let mirror = rng.gen_bool(0.5);

        let crop = self.config.crop_margin.and_then(|margin| {
            best.and_then(|f| match (f.width, f.height) {
                (Some(w), Some(h)) => Some((w, h, margin)),
                _ => None,
            })
        });

        let spec = GraphSpec {
            rotate,
            watermarks: watermarks.len(),
            watermark_size: self.config.watermark_size,
            mirror,
            crop,
            saturation: self.config.saturation,
            brightness: self.config.brightness,
            contrast: self.config.contrast,
        };
        let graph = build_filter_graph(&spec);
        let bitrate = select_bitrate(info);
        let output_path = folder.join(OUTPUT_FILE);

        info!(
            "Deduplicating {} (rotate: {}, mirror: {}, bitrate: {})",
            video_path.display(),
            rotate,
            mirror,
            bitrate
        );

        let hardware = self
            .base_command("Hardware encode", &video_path, &watermarks, clip, &graph, true)
            .video_codec("h264_nvenc")
            .video_bitrate(&bitrate)
            .arg("-maxrate").arg(scale_rate(&bitrate, 1.5))
            .arg("-bufsize").arg(scale_rate(&bitrate, 2.0))
            .arg("-preset").arg("p4")
            .arg("-spatial_aq").arg("1")
            .arg("-temporal_aq").arg("1")
            .arg("-rc_lookahead").arg("20")
            .arg("-b_ref_mode").arg("middle")
            .copy_audio()
            .output(&output_path);

        if let Err(e) = hardware.execute() {
            warn!("Hardware encoding failed, falling back to libx264: {}", e);
            let software = self
                .base_command("Software encode", &video_path, &watermarks, clip, &graph, false)
                .video_codec("libx264")
                .video_bitrate(&bitrate)
                .arg("-preset").arg("faster")
                .arg("-tune").arg("film")
                .arg("-threads").arg("0")
                .arg("-x264opts").arg("rc-lookahead=30:ref=3:subme=7")
                .copy_audio()
                .output(&output_path);
            software.execute()?;
        }

        info!("Deduplicated video written to {}", output_path.display());
        Ok(output_path)
    }

    fn base_command(
        &self,
        description: &str,
        video_path: &Path,
        watermarks: &[PathBuf],
        clip: f64,
        graph: &str,
        hardware: bool,
    ) -> MediaCommand {
        let mut cmd = MediaCommand::new(&self.config.binary_path, description).overwrite();
        if hardware {
            cmd = cmd.hwaccel("cuda");
        }
        cmd = cmd
            .seek(self.config.trim_secs)
            .duration(clip)
            .input(video_path);
        for watermark in watermarks {
            cmd = cmd.loop_input().input(watermark);
        }
        cmd.filter_complex(graph).map("[vout]").map("0:a")
    }

    /// Rotate the thumbnail alongside the video, replacing it in place via
    /// a temp file.
    fn rotate_thumbnail(&self, folder: &Path) -> Result<()> {
        let thumbnail = folder.join(THUMBNAIL_FILE);
        if !thumbnail.exists() {
            return Ok(());
        }
        let temp = folder.join(format!("temp_{}", THUMBNAIL_FILE));
        MediaCommand::new(&self.config.binary_path, "Thumbnail rotation")
            .overwrite()
            .input(&thumbnail)
            .video_filter("transpose=1")
            .output(&temp)
            .execute()?;
        std::fs::rename(&temp, &thumbnail)?;
        info!("Thumbnail rotated: {}", thumbnail.display());
        Ok(())
    }

    /// Choose four random watermark images from the configured directory.
    fn pick_watermarks(&self) -> Result<Vec<PathBuf>> {
        let mut candidates = Vec::new();
        for entry in std::fs::read_dir(&self.config.watermark_dir)
            .map_err(|e| DubError::Media(format!("Cannot read watermark directory: {}", e)))?
        {
            let path = entry?.path();
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                if WATERMARK_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
                    candidates.push(path);
                }
            }
        }

        if candidates.len() < WATERMARK_COUNT {
            return Err(DubError::Media(format!(
                "Watermark directory {} holds {} image(s), need {}",
                self.config.watermark_dir,
                candidates.len(),
                WATERMARK_COUNT
            )));
        }

        let mut rng = rand::thread_rng();
        Ok(candidates
            .choose_multiple(&mut rng, WATERMARK_COUNT)
            .cloned()
            .collect())
    }

    /// Read the container duration via ffprobe when the info file lacks it.
    fn probe_duration(&self, video_path: &Path) -> Result<f64> {
        let output = Command::new(&self.config.probe_path)
            .args(["-v", "error", "-show_entries", "format=duration", "-of", "json"])
            .arg(video_path)
            .output()
            .map_err(|e| DubError::Media(format!("Failed to execute ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DubError::Media(format!("ffprobe failed: {}", stderr)));
        }

        let probe: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        probe["format"]["duration"]
            .as_str()
            .and_then(|d| d.parse::<f64>().ok())
            .ok_or_else(|| DubError::Media("ffprobe reported no duration".to_string()))
    }
}

/// Assemble the filter graph. Order matters: crop, rotate, watermark
/// overlays, mirror, then color adjustment. The final labeled stream is
/// always `[vout]`.
fn build_filter_graph(spec: &GraphSpec) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current = "0:v".to_string();
    let mut stage = 0usize;

    let mut chain = |parts: &mut Vec<String>, current: &mut String, filter: String| {
        let next = format!("v{}", stage);
        stage += 1;
        parts.push(format!("[{}]{}[{}]", current, filter, next));
        *current = next;
    };

    if let Some((width, height, margin)) = spec.crop {
        chain(&mut parts, &mut current, crop_filter(width, height, margin));
    }
    if spec.rotate {
        chain(&mut parts, &mut current, "transpose=1".to_string());
    }
    for i in 0..spec.watermarks {
        let (x, y) = CORNER_POSITIONS[i % CORNER_POSITIONS.len()];
        parts.push(format!(
            "[{}:v]scale={}:{}[wm{}]",
            i + 1,
            spec.watermark_size,
            spec.watermark_size,
            i
        ));
        let next = format!("ov{}", i);
        parts.push(format!(
            "[{}][wm{}]overlay={}:{}:shortest=1[{}]",
            current, i, x, y, next
        ));
        current = next;
    }
    if spec.mirror {
        chain(&mut parts, &mut current, "hflip".to_string());
    }
    parts.push(format!(
        "[{}]eq=brightness={}:contrast={}:saturation={}[vout]",
        current, spec.brightness, spec.contrast, spec.saturation
    ));

    parts.join(";")
}

/// Uniform-margin crop keeping the frame centered.
fn crop_filter(width: u32, height: u32, margin: u32) -> String {
    format!(
        "crop={}:{}:{}:{}",
        width.saturating_sub(2 * margin),
        height.saturating_sub(2 * margin),
        margin,
        margin
    )
}

/// The format with the greatest height, used for rotation and crop decisions.
fn best_format(info: &VideoInfo) -> Option<&crate::transcript::FormatInfo> {
    info.formats
        .iter()
        .max_by_key(|f| f.height.unwrap_or(0))
}

/// Target bitrate: the highest reported vbr among formats, else derived from
/// the best format's resolution.
pub fn select_bitrate(info: &VideoInfo) -> String {
    let best_vbr = info
        .formats
        .iter()
        .filter_map(|f| f.vbr)
        .fold(0.0f64, f64::max);
    if best_vbr > 0.0 {
        return format!("{}k", best_vbr.round() as u64);
    }

    let resolution = best_format(info)
        .and_then(|f| f.resolution.as_deref())
        .unwrap_or("3840x2160");
    let (width, height) = parse_resolution(resolution).unwrap_or((3840, 2160));
    bitrate_for_resolution(width, height).to_string()
}

fn parse_resolution(resolution: &str) -> Option<(u32, u32)> {
    let (w, h) = resolution.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// Fixed resolution-to-bitrate table.
pub fn bitrate_for_resolution(width: u32, height: u32) -> &'static str {
    if width >= 3840 && height >= 2160 {
        "20000k"
    } else if width >= 2560 && height >= 1440 {
        "10000k"
    } else if width >= 1920 && height >= 1080 {
        "5000k"
    } else if width >= 1280 && height >= 720 {
        "2500k"
    } else {
        "1000k"
    }
}

/// Scale a "<n>k" bitrate string, rounding to whole kilobits.
fn scale_rate(bitrate: &str, factor: f64) -> String {
    let value: f64 = bitrate.trim_end_matches('k').parse().unwrap_or(0.0);
    format!("{}k", (value * factor).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> GraphSpec {
        GraphSpec {
            rotate: true,
            watermarks: 4,
            watermark_size: 100,
            mirror: true,
            crop: None,
            saturation: 1.05,
            brightness: 0.05,
            contrast: 1.05,
        }
    }

    #[test]
    fn test_full_filter_graph() {
        let graph = build_filter_graph(&spec());
        let expected = "[0:v]transpose=1[v0];\
            [1:v]scale=100:100[wm0];[v0][wm0]overlay=0:0:shortest=1[ov0];\
            [2:v]scale=100:100[wm1];[ov0][wm1]overlay=main_w-overlay_w:0:shortest=1[ov1];\
            [3:v]scale=100:100[wm2];[ov1][wm2]overlay=0:main_h-overlay_h:shortest=1[ov2];\
            [4:v]scale=100:100[wm3];[ov2][wm3]overlay=main_w-overlay_w:main_h-overlay_h:shortest=1[ov3];\
            [ov3]hflip[v1];\
            [v1]eq=brightness=0.05:contrast=1.05:saturation=1.05[vout]";
        assert_eq!(graph, expected);
    }

    #[test]
    fn test_minimal_graph_still_ends_in_vout() {
        let mut s = spec();
        s.rotate = false;
        s.mirror = false;
        s.watermarks = 0;
        let graph = build_filter_graph(&s);
        assert_eq!(
            graph,
            "[0:v]eq=brightness=0.05:contrast=1.05:saturation=1.05[vout]"
        );
    }

    #[test]
    fn test_crop_filter_shaves_uniform_margin() {
        let mut s = spec();
        s.rotate = false;
        s.mirror = false;
        s.watermarks = 0;
        s.crop = Some((1920, 1080, 10));
        let graph = build_filter_graph(&s);
        assert!(graph.starts_with("[0:v]crop=1900:1060:10:10[v0];"));
    }

    #[test]
    fn test_bitrate_table() {
        assert_eq!(bitrate_for_resolution(3840, 2160), "20000k");
        assert_eq!(bitrate_for_resolution(2560, 1440), "10000k");
        assert_eq!(bitrate_for_resolution(1920, 1080), "5000k");
        assert_eq!(bitrate_for_resolution(1280, 720), "2500k");
        assert_eq!(bitrate_for_resolution(640, 360), "1000k");
        assert_eq!(bitrate_for_resolution(320, 240), "1000k");
    }

    #[test]
    fn test_select_bitrate_prefers_reported_vbr() {
        let info: VideoInfo = serde_json::from_str(
            r#"{"title": "t", "uploader": "u",
                "formats": [{"vbr": 4433.7, "height": 1080}, {"vbr": 900.0, "height": 360}]}"#,
        )
        .unwrap();
        assert_eq!(select_bitrate(&info), "4434k");
    }

    #[test]
    fn test_select_bitrate_falls_back_to_resolution_table() {
        let info: VideoInfo = serde_json::from_str(
            r#"{"title": "t", "uploader": "u",
                "formats": [{"height": 720, "width": 1280, "resolution": "1280x720"}]}"#,
        )
        .unwrap();
        assert_eq!(select_bitrate(&info), "2500k");

        let empty: VideoInfo =
            serde_json::from_str(r#"{"title": "t", "uploader": "u"}"#).unwrap();
        assert_eq!(select_bitrate(&empty), "20000k");
    }

    #[test]
    fn test_scale_rate_rounds_whole_kilobits() {
        assert_eq!(scale_rate("5000k", 1.5), "7500k");
        assert_eq!(scale_rate("4433k", 1.5), "6650k");
        assert_eq!(scale_rate("4433k", 2.0), "8866k");
    }
}
