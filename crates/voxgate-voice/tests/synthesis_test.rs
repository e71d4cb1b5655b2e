#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use voxgate_types::{
    find_voice, CloneModel, CloneTuning, Language, ReferenceAudio, SynthesisRequest,
    VoiceSelection,
};
use voxgate_voice::{ExecutableConfig, SynthesisError, SynthesisService, SynthesizerConfig};

/// Fake prebuilt-voice tool: records its arguments and environment, then
/// writes a small WAV-looking file to `--output`.
const SIMPLE_TOOL: &str = r#"
for a in "$@"; do printf '%s\n' "$a"; done > "$WORKDIR/args.txt"
printf '%s' "$PYTHONIOENCODING" > "$WORKDIR/env.txt"
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
echo "loading pipeline"
echo "warming up" >&2
printf 'RIFF\044\000\000\000WAVEfmt ' > "$out"
"#;

/// Fake clone tool: fails unless the staged reference audio exists, then
/// writes into `--output_dir/--output_file`.
const CLONE_TOOL: &str = r#"
ref=""; dir=""; file=""
while [ $# -gt 0 ]; do
  case "$1" in
    --ref_audio) ref="$2"; shift 2 ;;
    --output_dir) dir="$2"; shift 2 ;;
    --output_file) file="$2"; shift 2 ;;
    *) shift ;;
  esac
done
[ -f "$ref" ] || { echo "reference audio missing: $ref" >&2; exit 4; }
printf 'RIFFcloned' > "$dir/$file"
"#;

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        Self { _dir: dir, root }
    }

    /// Writes `body` as a shell script and returns an executable config that
    /// runs it through `sh`, with `$WORKDIR` pointing at the fixture root.
    fn tool(&self, name: &str, body: &str) -> ExecutableConfig {
        let path = self.root.join(name);
        let script = format!("WORKDIR='{}'\n{}", self.root.display(), body);
        std::fs::write(&path, script).unwrap();
        ExecutableConfig::new("sh", [path.to_string_lossy().into_owned()])
    }

    fn config(&self, simple: ExecutableConfig, clone: ExecutableConfig) -> SynthesizerConfig {
        SynthesizerConfig {
            staging_dir: self.root.join("uploads"),
            output_dir: self.root.join("output"),
            timeout_secs: 10,
            simple,
            clone,
        }
    }

    fn output_files(&self) -> Vec<PathBuf> {
        list_files(&self.root.join("output"))
    }

    fn staged_files(&self) -> Vec<PathBuf> {
        list_files(&self.root.join("uploads"))
    }
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

fn english_request(text: &str) -> SynthesisRequest {
    SynthesisRequest {
        language: Language::English,
        voice: VoiceSelection::Prebuilt(*find_voice(Language::English, "bella (female)").unwrap()),
        text: text.to_string(),
        speed: 1.0,
        reference_text: None,
        reference_audio: None,
        tuning: CloneTuning::default(),
    }
}

fn hindi_clone_request() -> SynthesisRequest {
    SynthesisRequest {
        language: Language::Hindi,
        voice: VoiceSelection::Clone(CloneModel::F5TtsSmall),
        text: "नमस्ते".to_string(),
        speed: 1.0,
        reference_text: Some("संदर्भ पाठ".to_string()),
        reference_audio: Some(ReferenceAudio {
            bytes: b"RIFFreference".to_vec(),
            file_name: Some("reference.wav".to_string()),
        }),
        tuning: CloneTuning::default(),
    }
}

#[tokio::test]
async fn simple_voice_produces_audio_and_cleans_up() {
    let fx = Fixture::new();
    let service = SynthesisService::new(fx.config(
        fx.tool("simple.sh", SIMPLE_TOOL),
        fx.tool("clone.sh", CLONE_TOOL),
    ));
    service.prepare_workspace().await.unwrap();

    let output = service
        .synthesize(&english_request("Hello world"))
        .await
        .unwrap();
    assert!(output.size() > 0);
    assert!(output.path().exists());
    assert_eq!(output.path().extension().unwrap(), "wav");

    let args = std::fs::read_to_string(fx.root.join("args.txt")).unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert_eq!(
        &args[..7],
        &["--lang", "a", "--text=Hello world", "--voice", "af_bella", "--speed", "1"]
    );
    assert_eq!(
        std::fs::read_to_string(fx.root.join("env.txt")).unwrap(),
        "utf-8"
    );

    let path = output.path().to_path_buf();
    drop(output);
    assert!(!path.exists(), "output should be removed once released");
}

#[tokio::test]
async fn clone_stages_reference_audio_and_removes_it() {
    let fx = Fixture::new();
    let service = SynthesisService::new(fx.config(
        fx.tool("simple.sh", SIMPLE_TOOL),
        fx.tool("clone.sh", CLONE_TOOL),
    ));

    let output = service.synthesize(&hindi_clone_request()).await.unwrap();
    assert_eq!(std::fs::read(output.path()).unwrap(), b"RIFFcloned");
    assert!(fx.staged_files().is_empty(), "staged audio should be deleted");
}

#[tokio::test]
async fn missing_executable_is_spawn_error() {
    let fx = Fixture::new();
    let missing = ExecutableConfig::new(
        fx.root.join("no-such-tool").to_string_lossy().into_owned(),
        Vec::<String>::new(),
    );
    let service = SynthesisService::new(fx.config(missing.clone(), missing));

    let err = service
        .synthesize(&english_request("Hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, SynthesisError::Spawn { .. }), "got {:?}", err);
    assert!(fx.output_files().is_empty());

    let err = service.synthesize(&hindi_clone_request()).await.unwrap_err();
    assert!(matches!(err, SynthesisError::Spawn { .. }), "got {:?}", err);
    assert!(fx.staged_files().is_empty());
}

#[tokio::test]
async fn non_zero_exit_reports_code_and_stderr() {
    let fx = Fixture::new();
    let failing = fx.tool(
        "fail.sh",
        "echo 'partial' > /dev/null\necho 'CUDA out of memory' >&2\nexit 3",
    );
    let service = SynthesisService::new(fx.config(failing.clone(), failing));

    let err = service
        .synthesize(&english_request("Hello"))
        .await
        .unwrap_err();
    match err {
        SynthesisError::NonZeroExit {
            code, output_tail, ..
        } => {
            assert_eq!(code, Some(3));
            assert!(output_tail.contains("CUDA out of memory"));
        }
        other => panic!("expected NonZeroExit, got {:?}", other),
    }
}

#[tokio::test]
async fn non_zero_exit_removes_partial_output() {
    let fx = Fixture::new();
    let partial = fx.tool(
        "partial.sh",
        r#"
while [ $# -gt 0 ]; do
  case "$1" in --output) out="$2"; shift 2 ;; *) shift ;; esac
done
printf 'RIFF' > "$out"
exit 1
"#,
    );
    let service = SynthesisService::new(fx.config(partial.clone(), partial));

    let err = service
        .synthesize(&english_request("Hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, SynthesisError::NonZeroExit { .. }));
    assert!(fx.output_files().is_empty());
}

#[tokio::test]
async fn success_without_file_is_missing_output() {
    let fx = Fixture::new();
    let silent = fx.tool("silent.sh", "echo 'done'");
    let service = SynthesisService::new(fx.config(silent.clone(), silent));

    let err = service
        .synthesize(&english_request("Hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, SynthesisError::MissingOutput { .. }), "got {:?}", err);
}

#[tokio::test]
async fn empty_file_is_empty_output() {
    let fx = Fixture::new();
    let empty = fx.tool(
        "empty.sh",
        r#"
while [ $# -gt 0 ]; do
  case "$1" in --output) out="$2"; shift 2 ;; *) shift ;; esac
done
: > "$out"
"#,
    );
    let service = SynthesisService::new(fx.config(empty.clone(), empty));

    let err = service
        .synthesize(&english_request("Hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, SynthesisError::EmptyOutput { .. }), "got {:?}", err);
    assert!(fx.output_files().is_empty());
}

#[tokio::test]
async fn slow_tool_times_out() {
    let fx = Fixture::new();
    let slow = fx.tool("slow.sh", "sleep 30");
    let mut config = fx.config(slow.clone(), slow);
    config.timeout_secs = 1;
    let service = SynthesisService::new(config);

    let started = std::time::Instant::now();
    let err = service
        .synthesize(&english_request("Hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, SynthesisError::TimedOut { secs: 1, .. }), "got {:?}", err);
    assert!(started.elapsed() < std::time::Duration::from_secs(15));
}

#[tokio::test]
async fn concurrent_requests_use_distinct_paths() {
    let fx = Fixture::new();
    let service = Arc::new(SynthesisService::new(fx.config(
        fx.tool("simple.sh", SIMPLE_TOOL),
        fx.tool("clone.sh", CLONE_TOOL),
    )));

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..8 {
        let service = service.clone();
        tasks.spawn(async move {
            let request = if i % 2 == 0 {
                english_request(&format!("request {}", i))
            } else {
                hindi_clone_request()
            };
            service.synthesize(&request).await
        });
    }

    let mut outputs = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        outputs.push(joined.unwrap().unwrap());
    }
    let paths: std::collections::HashSet<PathBuf> =
        outputs.iter().map(|o| o.path().to_path_buf()).collect();
    assert_eq!(paths.len(), 8);
    assert_eq!(fx.output_files().len(), 8);
    assert!(fx.staged_files().is_empty());
}

#[tokio::test]
async fn prepare_workspace_is_idempotent() {
    let fx = Fixture::new();
    let service = SynthesisService::new(fx.config(
        ExecutableConfig::new("true", Vec::<String>::new()),
        ExecutableConfig::new("true", Vec::<String>::new()),
    ));
    service.prepare_workspace().await.unwrap();
    service.prepare_workspace().await.unwrap();
    assert!(fx.root.join("uploads").is_dir());
    assert!(fx.root.join("output").is_dir());
}

/// Clone tool that records its pid and then hangs until killed.
#[cfg(target_os = "linux")]
const HANGING_TOOL: &str = r#"
printf '%s' $$ > "$WORKDIR/pid"
exec sleep 30
"#;

#[cfg(target_os = "linux")]
fn process_gone(pid: &str) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Err(_) => true,
        Ok(stat) => stat
            .rsplit_once(") ")
            .map(|(_, rest)| rest.starts_with('Z'))
            .unwrap_or(false),
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn cancelled_request_kills_tool_and_removes_staged_audio() {
    let fx = Fixture::new();
    let service = Arc::new(SynthesisService::new(fx.config(
        fx.tool("simple.sh", SIMPLE_TOOL),
        fx.tool("clone.sh", HANGING_TOOL),
    )));
    service.prepare_workspace().await.unwrap();

    let task = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.synthesize(&hindi_clone_request()).await })
    };

    let pid_file = fx.root.join("pid");
    let mut waited = 0;
    while !pid_file.exists() {
        assert!(waited < 500, "tool never started");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        waited += 1;
    }
    let pid = std::fs::read_to_string(&pid_file).unwrap();
    assert_eq!(fx.staged_files().len(), 1);

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert!(
        fx.staged_files().is_empty(),
        "staged reference audio should go with the request"
    );

    let mut waited = 0;
    while !process_gone(&pid) {
        assert!(waited < 500, "tool process {} survived the request", pid);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        waited += 1;
    }
}
