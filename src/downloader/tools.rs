// External tool detection (yt-dlp engine, ffmpeg postprocessor)

use serde::Serialize;
use std::path::Path;
use std::process::Command;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            ToolType::Ffmpeg => "-version",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

pub struct ToolManager {
    /// Explicit yt-dlp location, checked before anything else
    ytdlp_override: Option<String>,
}

impl ToolManager {
    pub fn new(ytdlp_override: Option<String>) -> Self {
        Self { ytdlp_override }
    }

    pub fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let path = self.locate(tool_type);
        let version = path.as_deref().and_then(|p| Self::get_version(p, tool_type));

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            // A binary that cannot report its version is not usable
            is_available: version.is_some(),
            version,
            path,
        }
    }

    pub fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::YtDlp),
            self.get_tool_info(ToolType::Ffmpeg),
        ]
    }

    /// Path used to invoke yt-dlp; falls back to a bare PATH lookup
    pub fn ytdlp_command(&self) -> String {
        self.locate(ToolType::YtDlp)
            .unwrap_or_else(|| ToolType::YtDlp.as_str().to_string())
    }

    fn locate(&self, tool_type: ToolType) -> Option<String> {
        if tool_type == ToolType::YtDlp {
            if let Some(path) = self.ytdlp_override.as_deref().filter(|p| !p.trim().is_empty()) {
                return Some(path.to_string());
            }
        }

        let binary_name = tool_type.as_str();

        // 1. Try common paths first
        let common_paths = [
            format!("/opt/homebrew/bin/{}", binary_name),
            format!("/usr/local/bin/{}", binary_name),
            format!("/usr/bin/{}", binary_name),
        ];
        if let Some(path) = common_paths.into_iter().find(|p| Path::new(p).exists()) {
            return Some(path);
        }

        // 2. Try PATH
        match Command::new("which").arg(binary_name).output() {
            Ok(output) if output.status.success() => {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                (!path.is_empty()).then_some(path)
            }
            _ => None,
        }
    }

    fn get_version(path: &str, tool_type: ToolType) -> Option<String> {
        match Command::new(path).arg(tool_type.version_arg()).output() {
            Ok(output) if output.status.success() => {
                // ffmpeg prints a banner; the first line carries the version
                String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty())
            }
            _ => None,
        }
    }
}
