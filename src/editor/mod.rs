use anyhow::Result;
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

/// Navigation target for comment anchors. Handed through to each comment view model; the
/// coordinator itself never calls it.
pub trait Editor: Send + Sync {
    fn open_at(&self, path: &str, line: Option<u32>) -> Result<()>;
}

/// Launches the user's editor as `<editor> +{line} {path}` relative to the repository root.
#[derive(Debug, Clone)]
pub struct ExternalEditor {
    configured: Option<String>,
    root: PathBuf,
}

impl ExternalEditor {
    pub fn new(configured: Option<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            configured,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Editor for ExternalEditor {
    fn open_at(&self, path: &str, line: Option<u32>) -> Result<()> {
        let editor = EditorCommand::resolve(self.configured.as_deref())?;
        let status = editor.launch(&self.root, path, line)?;
        if !status.success() {
            anyhow::bail!("{} exited with {} while opening {}", editor.program, status, path);
        }
        Ok(())
    }
}

/// A resolved editor invocation: program plus the arguments from its configured string.
#[derive(Debug, Clone, PartialEq, Eq)]
struct EditorCommand {
    program: String,
    args: Vec<String>,
}

impl EditorCommand {
    fn parse(raw: &str) -> Result<Option<Self>> {
        let mut words = shell_words::split(raw)?.into_iter();
        Ok(words.next().map(|program| Self {
            program,
            args: words.collect(),
        }))
    }

    /// First candidate found in PATH, in git's order: config → $VISUAL → $EDITOR → vi.
    ///
    /// When none is installed the first candidate is kept so launching reports it by name.
    fn resolve(configured: Option<&str>) -> Result<Self> {
        let mut first = None;
        let mut missing = Vec::new();

        for raw in candidates(configured) {
            let Some(editor) = Self::parse(&raw)? else {
                continue;
            };
            if which::which(&editor.program).is_ok() {
                if !missing.is_empty() {
                    tracing::warn!(
                        skipped_editors = ?missing,
                        resolved_editor = %editor.program,
                        "editor candidate not found in PATH, falling back"
                    );
                }
                return Ok(editor);
            }
            missing.push(editor.program.clone());
            first.get_or_insert(editor);
        }

        Ok(first.unwrap_or_else(|| Self {
            program: "vi".to_string(),
            args: Vec::new(),
        }))
    }

    fn command(&self, root: &Path, path: &str, line: Option<u32>) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).current_dir(root);
        if let Some(line) = line {
            command.arg(format!("+{}", line));
        }
        command.arg(path);
        command
    }

    fn launch(&self, root: &Path, path: &str, line: Option<u32>) -> Result<ExitStatus> {
        self.command(root, path, line).status().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                anyhow::anyhow!(
                    "Editor '{}' not found (also checked $VISUAL and $EDITOR). \
                     Set 'editor' in ~/.config/octorus/review.toml to an installed editor.",
                    self.program
                )
            } else {
                anyhow::anyhow!("Failed to launch editor '{}': {}", self.program, e)
            }
        })
    }
}

fn candidates(configured: Option<&str>) -> Vec<String> {
    let non_blank = |s: &String| !s.trim().is_empty();
    let mut out: Vec<String> = configured.map(str::to_string).into_iter().collect();
    out.extend(env::var("VISUAL").ok());
    out.extend(env::var("EDITOR").ok());
    out.retain(non_blank);
    out.push("vi".to_string());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    struct EnvGuard(Option<String>, Option<String>);

    impl EnvGuard {
        fn set(visual: Option<&str>, editor: Option<&str>) -> Self {
            let guard = Self(env::var("VISUAL").ok(), env::var("EDITOR").ok());
            set_or_remove("VISUAL", visual);
            set_or_remove("EDITOR", editor);
            guard
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            set_or_remove("VISUAL", self.0.as_deref());
            set_or_remove("EDITOR", self.1.as_deref());
        }
    }

    fn set_or_remove(key: &str, value: Option<&str>) {
        match value {
            Some(v) => env::set_var(key, v),
            None => env::remove_var(key),
        }
    }

    #[test]
    #[serial]
    fn test_candidates_order() {
        let _env = EnvGuard::set(Some("nano"), Some("emacs"));
        assert_eq!(candidates(Some("hx")), vec!["hx", "nano", "emacs", "vi"]);

        let _env = EnvGuard::set(Some(" "), None);
        assert_eq!(candidates(Some("")), vec!["vi"]);
    }

    #[test]
    #[serial]
    fn test_resolve_skips_missing_editor_and_its_args() {
        let _env = EnvGuard::set(None, Some("sh"));

        let editor = EditorCommand::resolve(Some("__nonexistent__ --flag")).unwrap();
        assert_eq!(
            editor,
            EditorCommand {
                program: "sh".to_string(),
                args: Vec::new(),
            }
        );
    }

    #[test]
    #[serial]
    fn test_resolve_keeps_first_candidate_when_nothing_installed() {
        let _env = EnvGuard::set(Some("__also_missing__"), None);
        let resolved = EditorCommand::resolve(Some("__nonexistent__ -w")).unwrap();

        // vi might be installed on the host; only check the all-missing case when it isn't
        if which::which("vi").is_err() {
            assert_eq!(resolved.program, "__nonexistent__");
            assert_eq!(resolved.args, vec!["-w"]);
        }
    }

    #[test]
    fn test_command_places_line_before_path() {
        let editor = EditorCommand::parse(r#"code --goto "a b""#).unwrap().unwrap();
        let command = editor.command(Path::new("/tmp"), "src/lib.rs", Some(7));

        let args: Vec<_> = command.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(command.get_program(), "code");
        assert_eq!(args, vec!["--goto", "a b", "+7", "src/lib.rs"]);
        assert_eq!(command.get_current_dir(), Some(Path::new("/tmp")));
    }

    #[test]
    fn test_parse_blank_is_none() {
        assert_eq!(EditorCommand::parse("   ").unwrap(), None);
        assert!(EditorCommand::parse("vim \"unterminated").is_err());
    }

    #[test]
    #[serial]
    fn test_open_at_runs_in_repository_root() {
        let _env = EnvGuard::set(None, None);

        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("marker.txt"), "x").unwrap();
        // $1 is the "+3" line argument; the path arrives as $2
        let editor = ExternalEditor::new(
            Some(r#"sh -c "test -f \"$2\"" sh"#.to_string()),
            root.path(),
        );
        editor.open_at("marker.txt", Some(3)).unwrap();
        assert!(editor.open_at("missing.txt", Some(3)).is_err());
    }

    #[test]
    fn test_launch_reports_missing_program() {
        let editor = EditorCommand {
            program: "__octorus_nonexistent_editor__".to_string(),
            args: Vec::new(),
        };
        let err = editor
            .launch(Path::new("."), "a.rs", None)
            .unwrap_err()
            .to_string();
        assert!(err.contains("not found"), "unexpected message: {}", err);
        assert!(err.contains("review.toml"));
    }
}
