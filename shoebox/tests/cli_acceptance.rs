use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
    input: PathBuf,
    library: PathBuf,
    videolibrary: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");
        let input = base.join("input");
        let library = base.join("library");
        let videolibrary = base.join("videolibrary");

        for dir in [&home, &xdg_config, &xdg_state, &input] {
            fs::create_dir_all(dir).expect("failed to create test dir");
        }

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_config,
            xdg_state,
            input,
            library,
            videolibrary,
        }
    }

    fn seed_file(&self, name: &str, content: &[u8]) {
        let path = self.input.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn run_import(&self, extra_args: &[&str]) -> Output {
        let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("shoebox"));

        let mut command = Command::new(bin_path);
        command
            .arg("import")
            .arg(&self.input)
            .args(["--user", "val"])
            .arg("--library")
            .arg(&self.library)
            .arg("--videolibrary")
            .arg(&self.videolibrary)
            .args(extra_args)
            .env("HOME", &self.home)
            .env("XDG_CONFIG_HOME", &self.xdg_config)
            .env("XDG_STATE_HOME", &self.xdg_state)
            .output()
            .expect("failed to execute shoebox")
    }

    fn session_dirs(&self) -> Vec<PathBuf> {
        let imports = self.library.join("imports");
        if !imports.exists() {
            return Vec::new();
        }
        let mut dirs: Vec<PathBuf> = fs::read_dir(imports)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        dirs.sort();
        dirs
    }

    fn manifest_events(&self, session_dir: &Path) -> Vec<serde_json::Value> {
        let content = fs::read_to_string(session_dir.join("manifest.jsonl")).unwrap();
        content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }
}

fn assert_success(output: &Output) {
    if output.status.success() {
        return;
    }
    panic!(
        "shoebox import failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn import_organizes_media_and_writes_manifest() {
    let env = CliTestEnv::new();
    env.seed_file("IMG_20240101_093000.jpg", b"photo one");
    env.seed_file("IMG-20240102-WA0001.jpg", b"photo two");
    env.seed_file("clip_20240103_120000.mp4", b"video one");
    env.seed_file("notes.txt", b"not media");

    let output = env.run_import(&[]);
    assert_success(&output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Found 3 media files"), "stdout:\n{stdout}");
    assert!(stdout.contains("Import Summary:"), "stdout:\n{stdout}");
    assert!(stdout.contains("3 files"), "stdout:\n{stdout}");

    // Date-partitioned destinations, videos under the video root
    assert_eq!(
        fs::read(env.library.join("val/2024/01/01/IMG_20240101_093000.jpg")).unwrap(),
        b"photo one"
    );
    assert_eq!(
        fs::read(env.library.join("val/2024/01/02/IMG-20240102-WA0001.jpg")).unwrap(),
        b"photo two"
    );
    assert_eq!(
        fs::read(env.videolibrary.join("val/2024/01/03/clip_20240103_120000.mp4")).unwrap(),
        b"video one"
    );
    // The document was not touched or imported
    assert!(env.input.join("notes.txt").exists());

    // One session: start + 3 copied + end, one browse link per copy
    let sessions = env.session_dirs();
    assert_eq!(sessions.len(), 1);
    let events = env.manifest_events(&sessions[0]);
    assert_eq!(events.len(), 5);
    assert_eq!(events[0]["event"], "session_start");
    assert_eq!(events[0]["user"], "val");
    assert_eq!(events[4]["event"], "session_end");
    assert_eq!(events[4]["copied"], 3);

    let links = fs::read_dir(&sessions[0])
        .unwrap()
        .filter(|e| e.as_ref().unwrap().file_name() != "manifest.jsonl")
        .count();
    assert_eq!(links, 3);
}

#[test]
fn second_import_skips_duplicates() {
    let env = CliTestEnv::new();
    env.seed_file("IMG_20240101_093000.jpg", b"photo one");
    env.seed_file("IMG_20240102_093000.jpg", b"photo two");

    assert_success(&env.run_import(&[]));
    assert_success(&env.run_import(&[]));

    let sessions = env.session_dirs();
    assert_eq!(sessions.len(), 2);

    let events = env.manifest_events(&sessions[1]);
    assert_eq!(events.len(), 4);
    assert_eq!(events[1]["event"], "skipped_duplicate");
    assert_eq!(events[2]["event"], "skipped_duplicate");
    assert_eq!(events[3]["skipped_duplicate"], 2);

    // Second session holds no browse links
    let links = fs::read_dir(&sessions[1])
        .unwrap()
        .filter(|e| e.as_ref().unwrap().file_name() != "manifest.jsonl")
        .count();
    assert_eq!(links, 0);
}

#[test]
fn dry_run_creates_nothing() {
    let env = CliTestEnv::new();
    env.seed_file("IMG_20240101_093000.jpg", b"photo one");

    let output = env.run_import(&["--dry-run"]);
    assert_success(&output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Dry run mode"), "stdout:\n{stdout}");
    assert!(stdout.contains("[dry-run]"), "stdout:\n{stdout}");

    assert!(!env.library.exists());
    assert!(!env.videolibrary.exists());
}

#[test]
fn missing_folder_fails() {
    let env = CliTestEnv::new();
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("shoebox"));

    let output = Command::new(bin_path)
        .arg("import")
        .arg(env.input.join("does-not-exist"))
        .env("HOME", &env.home)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .output()
        .expect("failed to execute shoebox");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("does not exist"), "stderr:\n{stderr}");
}
