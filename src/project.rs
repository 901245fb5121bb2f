//! Project registry: the set of known sessions and their bootstrap.
//!
//! A project is a directory of session subdirectories plus one project
//! record. `init` is one-time and auto-discovers sessions; afterwards
//! sessions enter the registry only through explicit `add`.

use crate::config::{ProjectConfig, SessionConfig};
use crate::defaults;
use crate::error::{ChitterError, Result};
use crate::probe::probe_session;
use std::fs;
use std::path::Path;

const GITIGNORE_NAME: &str = ".gitignore";

const GITIGNORE_RULES: &str = "\
*.raw
*.wav
*.avi
*.mp4
*.ogv
*.bin
*.levels
.chitter/
";

/// One-time project bootstrap.
///
/// Fails if an ignore file or project record already exists. Every non-dot
/// subdirectory is discovered as a session and its record bootstrapped;
/// the first bootstrap failure aborts init.
pub fn init(root: &Path, repository_url: Option<&str>) -> Result<ProjectConfig> {
    let gitignore_path = root.join(GITIGNORE_NAME);
    if gitignore_path.exists() {
        return Err(ChitterError::FileAlreadyExists {
            path: gitignore_path,
        });
    }
    let config_path = ProjectConfig::path(root);
    if config_path.exists() {
        return Err(ChitterError::FileAlreadyExists { path: config_path });
    }

    let mut sessions = Vec::new();
    for name in discoverable_dirs(root)? {
        eprintln!("initializing session: {name}");
        bootstrap_session(&root.join(&name), &name)?;
        sessions.push(name);
    }

    let project = ProjectConfig {
        sessions,
        repository_url: repository_url
            .unwrap_or(defaults::REPOSITORY_URL_PLACEHOLDER)
            .to_string(),
        use_sandbox_for_transcode: false,
    };
    project.save(root)?;
    fs::write(&gitignore_path, GITIGNORE_RULES)?;
    Ok(project)
}

/// Register one session.
///
/// Fails if the id is already registered or the directory does not exist,
/// otherwise bootstraps the session record and appends the id.
pub fn add(root: &Path, session_id: &str) -> Result<()> {
    let mut project = ProjectConfig::load(root)?;
    if project.sessions.iter().any(|s| s == session_id) {
        return Err(ChitterError::SessionAlreadyRegistered {
            session_id: session_id.to_string(),
        });
    }
    let session_dir = root.join(session_id);
    if !session_dir.is_dir() {
        return Err(ChitterError::NotADirectory { path: session_dir });
    }
    bootstrap_session(&session_dir, session_id)?;
    project.sessions.push(session_id.to_string());
    project.save(root)?;
    Ok(())
}

/// Register every discoverable subdirectory not yet in the registry.
/// Fail-fast: the first failing registration aborts.
pub fn add_all(root: &Path) -> Result<Vec<String>> {
    let project = ProjectConfig::load(root)?;
    let mut added = Vec::new();
    for name in discoverable_dirs(root)? {
        if project.sessions.iter().any(|s| s == &name) {
            continue;
        }
        add(root, &name)?;
        added.push(name);
    }
    Ok(added)
}

/// Non-dot subdirectories of the project root, name-sorted for
/// deterministic registration order.
fn discoverable_dirs(root: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Probe the session directory's raw media and write its record,
/// preserving any fields an existing record already carries.
fn bootstrap_session(session_dir: &Path, session_id: &str) -> Result<()> {
    let bootstrap = probe_session(session_dir)?;
    let mut config = SessionConfig::load(session_dir).unwrap_or_default();
    config.session_id = session_id.to_string();
    config.audio = Some(bootstrap.audio);
    config.save(session_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_session_dir(root: &Path, name: &str) {
        let dir = root.join(name);
        fs::create_dir(&dir).unwrap();
        // 4 channels x 2 bytes x 500 frames of raw audio plus a video file.
        fs::write(dir.join("mic.raw"), vec![0u8; 4000]).unwrap();
        fs::write(dir.join("cam.avi"), b"").unwrap();
    }

    #[test]
    fn init_discovers_sessions_and_writes_records() {
        let dir = TempDir::new().unwrap();
        make_session_dir(dir.path(), "s-b");
        make_session_dir(dir.path(), "s-a");
        fs::create_dir(dir.path().join(".hidden")).unwrap();

        let project = init(dir.path(), Some("https://github.com/lab/rec")).unwrap();
        assert_eq!(project.sessions, vec!["s-a".to_string(), "s-b".to_string()]);
        assert_eq!(project.repository_url, "https://github.com/lab/rec");
        assert!(!project.use_sandbox_for_transcode);

        let session = SessionConfig::load(&dir.path().join("s-a")).unwrap();
        assert_eq!(session.session_id, "s-a");
        assert!(session.audio.is_some());

        let ignore = fs::read_to_string(dir.path().join(GITIGNORE_NAME)).unwrap();
        assert!(ignore.contains("*.ogv"));
        assert!(ignore.contains(".chitter/"));
    }

    #[test]
    fn init_is_one_time() {
        let dir = TempDir::new().unwrap();
        init(dir.path(), None).unwrap();
        let err = init(dir.path(), None).unwrap_err();
        assert!(matches!(err, ChitterError::FileAlreadyExists { .. }));
    }

    #[test]
    fn init_uses_placeholder_repository_url() {
        let dir = TempDir::new().unwrap();
        let project = init(dir.path(), None).unwrap();
        assert_eq!(project.repository_url, defaults::REPOSITORY_URL_PLACEHOLDER);
    }

    #[test]
    fn add_registers_new_session() {
        let dir = TempDir::new().unwrap();
        init(dir.path(), None).unwrap();
        make_session_dir(dir.path(), "s1");
        add(dir.path(), "s1").unwrap();
        let project = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(project.sessions, vec!["s1".to_string()]);
    }

    #[test]
    fn add_rejects_duplicate_session() {
        let dir = TempDir::new().unwrap();
        make_session_dir(dir.path(), "s1");
        init(dir.path(), None).unwrap();
        let err = add(dir.path(), "s1").unwrap_err();
        assert!(matches!(err, ChitterError::SessionAlreadyRegistered { .. }));
    }

    #[test]
    fn add_rejects_missing_directory() {
        let dir = TempDir::new().unwrap();
        init(dir.path(), None).unwrap();
        let err = add(dir.path(), "nope").unwrap_err();
        assert!(matches!(err, ChitterError::NotADirectory { .. }));
    }

    #[test]
    fn add_preserves_registration_order() {
        let dir = TempDir::new().unwrap();
        init(dir.path(), None).unwrap();
        make_session_dir(dir.path(), "zz");
        make_session_dir(dir.path(), "aa");
        add(dir.path(), "zz").unwrap();
        add(dir.path(), "aa").unwrap();
        let project = ProjectConfig::load(dir.path()).unwrap();
        // Registration order, not lexicographic.
        assert_eq!(project.sessions, vec!["zz".to_string(), "aa".to_string()]);
    }

    #[test]
    fn add_all_skips_registered_and_dot_dirs() {
        let dir = TempDir::new().unwrap();
        make_session_dir(dir.path(), "s1");
        init(dir.path(), None).unwrap();
        make_session_dir(dir.path(), "s2");
        make_session_dir(dir.path(), "s3");
        fs::create_dir(dir.path().join(".cache")).unwrap();

        let added = add_all(dir.path()).unwrap();
        assert_eq!(added, vec!["s2".to_string(), "s3".to_string()]);
        let project = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(
            project.sessions,
            vec!["s1".to_string(), "s2".to_string(), "s3".to_string()]
        );
    }

    #[test]
    fn add_all_aborts_on_first_failure() {
        let dir = TempDir::new().unwrap();
        init(dir.path(), None).unwrap();
        // "bad" sorts before "good" and has no raw media.
        fs::create_dir(dir.path().join("bad")).unwrap();
        make_session_dir(dir.path(), "good");

        let err = add_all(dir.path()).unwrap_err();
        assert!(matches!(err, ChitterError::NoInputFile { .. }));
        let project = ProjectConfig::load(dir.path()).unwrap();
        assert!(project.sessions.is_empty());
    }

    #[test]
    fn bootstrap_preserves_existing_fields() {
        let dir = TempDir::new().unwrap();
        make_session_dir(dir.path(), "s1");
        let session_dir = dir.path().join("s1");
        SessionConfig {
            session_id: "s1".to_string(),
            detect_freq_band: Some((50, 90)),
            ..SessionConfig::default()
        }
        .save(&session_dir)
        .unwrap();

        bootstrap_session(&session_dir, "s1").unwrap();
        let config = SessionConfig::load(&session_dir).unwrap();
        assert_eq!(config.detect_freq_band, Some((50, 90)));
        assert!(config.audio.is_some());
    }
}
