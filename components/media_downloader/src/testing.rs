// components/media_downloader/src/testing.rs
//! Shell stand-ins for spotdl used by the unit tests

use crate::SpotDlOptions;
use std::path::Path;
use tempfile::TempDir;

/// Creates `<ref>.mp3` in the working directory for every reference not containing BAD
pub(crate) const FAKE_SPOTDL: &str = r#"
shift
for ref in "$@"; do
  case "$ref" in --*) break;; esac
  echo "$ref: Downloading"
  case "$ref" in
    *BAD*) echo "$ref: lookup failed" >&2 ;;
    *) echo "audio" > "$ref.mp3"; echo "$ref: Embedding metadata"; echo "$ref: Done" ;;
  esac
done
"#;

/// Runs `script` with `sh`, keeping the script alive as long as the returned dir
pub(crate) fn fake_spotdl(script: &str) -> (TempDir, SpotDlOptions) {
    let scripts = TempDir::new().unwrap();
    let path = scripts.path().join("spotdl.sh");
    std::fs::write(&path, script).unwrap();
    let options = SpotDlOptions {
        program: "sh".to_string(),
        program_args: vec![path_arg(&path)],
        ..SpotDlOptions::default()
    };
    (scripts, options)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
