//! Stand-in executables for the external synthesis tools.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::SignalBuffer;

/// A one-second 220 Hz tone with the given peak, written as 16-bit WAV.
pub fn tone_wav(dir: &Path, name: &str, sample_rate: u32, peak: f32) -> PathBuf {
    let samples = (0..sample_rate)
        .map(|i| peak * (2.0 * std::f32::consts::PI * 220.0 * i as f32 / sample_rate as f32).sin())
        .collect();
    let path = dir.join(name);
    SignalBuffer::new(samples, sample_rate).write_wav(&path).unwrap();
    path
}

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Answers `--version` and copies `clip` to the path following `-w`.
pub fn fake_espeak(dir: &Path, clip: &Path) -> PathBuf {
    script(
        dir,
        "fake-espeak-ng",
        &format!(
            r#"if [ "$1" = "--version" ]; then echo "eSpeak NG 1.51"; exit 0; fi
while [ $# -gt 0 ]; do
  if [ "$1" = "-w" ]; then cp "{}" "$2"; exit $?; fi
  shift
done
exit 2
"#,
            clip.display()
        ),
    )
}

/// Answers `--help`. Synthesis copies `clip` to the path following
/// `--out_path`, or fails like a model download error when `clip` is `None`.
pub fn fake_tts(dir: &Path, clip: Option<&Path>) -> PathBuf {
    let synthesize = match clip {
        Some(clip) => format!(
            r#"while [ $# -gt 0 ]; do
  if [ "$1" = "--out_path" ]; then cp "{}" "$2"; exit $?; fi
  shift
done
exit 2
"#,
            clip.display()
        ),
        None => "echo \"cannot download xtts_v2: connection refused\" >&2\nexit 1\n".to_string(),
    };
    script(
        dir,
        "fake-tts",
        &format!(
            "if [ \"$1\" = \"--help\" ]; then echo \"usage: tts\"; exit 0; fi\n{synthesize}"
        ),
    )
}
