//! Throwaway sketch projects compiled with arduino-cli.

use crate::cli::ArduinoCli;
use async_trait::async_trait;
use boardcheck_core::ids::WorkspaceName;
use boardcheck_core::ports::{
    BuildDiagnostics, BuildKind, CompileOptions, Project, ProjectFactory, ProjectRequest,
    ProgressSink,
};
use boardcheck_core::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Result of the most recent build of a project.
#[derive(Debug, Clone, Default)]
pub struct BuildRecord {
    pub exit_code: i32,
    /// Lines of compiler output that mention an error. Informational only:
    /// compilers echo source lines, so the exit code is the verdict.
    pub errors: Vec<String>,
}

impl BuildRecord {
    pub fn has_errors(&self) -> bool {
        self.exit_code != 0
    }
}

/// Last build result per project, shared between projects and diagnostics.
#[derive(Debug, Clone, Default)]
pub struct BuildLog {
    records: Arc<RwLock<HashMap<WorkspaceName, BuildRecord>>>,
}

impl BuildLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, project: &WorkspaceName, record: BuildRecord) {
        self.records.write().await.insert(project.clone(), record);
    }

    pub async fn get(&self, project: &WorkspaceName) -> Option<BuildRecord> {
        self.records.read().await.get(project).cloned()
    }
}

/// Materializes an example as a standalone sketch directory under
/// `<root>/<run id>/<name>/<name>/`.
pub struct SketchProjectFactory {
    cli: Arc<ArduinoCli>,
    workspace_root: PathBuf,
    log: BuildLog,
}

impl SketchProjectFactory {
    pub fn new(cli: Arc<ArduinoCli>, workspace_root: PathBuf, log: BuildLog) -> Self {
        Self {
            cli,
            workspace_root,
            log,
        }
    }
}

#[async_trait]
impl ProjectFactory for SketchProjectFactory {
    async fn create(
        &self,
        request: &ProjectRequest,
        progress: &dyn ProgressSink,
    ) -> Result<Box<dyn Project>> {
        let parent = request
            .location
            .clone()
            .unwrap_or_else(|| self.workspace_root.clone());
        let project_dir = parent
            .join(request.run.to_string())
            .join(request.name.as_str());
        // arduino-cli requires the sketch folder and main .ino to share a name.
        let sketch_dir = project_dir.join(request.name.as_str());
        let build_dir = project_dir.join("build");

        let sources = request.example.paths.clone();
        let name = request.name.clone();
        let dir = sketch_dir.clone();
        tokio::task::spawn_blocking(move || materialize(&name, &sources, &dir))
            .await
            .map_err(|e| Error::Internal(e.to_string()))?
            .map_err(|e| Error::ProjectCreation {
                workspace: request.name.to_string(),
                reason: e.to_string(),
            })?;

        progress.report(&format!("Created sketch {}", sketch_dir.display()));
        info!(project = %request.name, fqbn = %request.target.descriptor, "Created project");

        Ok(Box::new(SketchProject {
            name: request.name.clone(),
            sketch_dir,
            build_dir,
            fqbn: request.target.descriptor.clone(),
            compile_options: request.compile_options.clone(),
            cli: self.cli.clone(),
            log: self.log.clone(),
        }))
    }
}

/// Copy every source path into `sketch_dir`, renaming the primary sketch.
fn materialize(name: &WorkspaceName, sources: &[PathBuf], sketch_dir: &Path) -> Result<()> {
    if sketch_dir.exists() {
        return Err(Error::Internal(format!(
            "{} already exists",
            sketch_dir.display()
        )));
    }
    std::fs::create_dir_all(sketch_dir)?;

    let primary = sources
        .first()
        .ok_or_else(|| Error::Internal("example has no source paths".into()))?;
    for source in sources {
        copy_tree(source, sketch_dir)?;
    }

    if let Some(segment) = primary.file_name() {
        let mut original = segment.to_os_string();
        original.push(".ino");
        let from = sketch_dir.join(original);
        if from.is_file() {
            std::fs::rename(&from, sketch_dir.join(format!("{}.ino", name)))?;
        }
    }
    Ok(())
}

fn copy_tree(source: &Path, dest: &Path) -> Result<()> {
    if source.is_file() {
        let file_name = source
            .file_name()
            .ok_or_else(|| Error::Internal(format!("bad source path {}", source.display())))?;
        std::fs::copy(source, dest.join(file_name))?;
        return Ok(());
    }
    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| Error::Internal(e.to_string()))?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// A sketch directory bound to one board.
pub struct SketchProject {
    name: WorkspaceName,
    sketch_dir: PathBuf,
    build_dir: PathBuf,
    fqbn: String,
    compile_options: CompileOptions,
    cli: Arc<ArduinoCli>,
    log: BuildLog,
}

impl SketchProject {
    pub fn sketch_dir(&self) -> &Path {
        &self.sketch_dir
    }

    fn compile_args(&self, kind: BuildKind) -> Vec<String> {
        let mut args = vec![
            "compile".to_string(),
            "--fqbn".to_string(),
            self.fqbn.clone(),
            "--build-path".to_string(),
            self.build_dir.display().to_string(),
        ];
        if kind == BuildKind::Full {
            args.push("--clean".to_string());
        }
        if !self.compile_options.is_empty() {
            let mut flags = self.compile_options.extra_flags.clone();
            let mut defines: Vec<_> = self.compile_options.defines.iter().collect();
            defines.sort();
            flags.extend(defines.into_iter().map(|(k, v)| format!("-D{}={}", k, v)));
            args.push("--build-property".to_string());
            args.push(format!("build.extra_flags={}", flags.join(" ")));
        }
        args.push(self.sketch_dir.display().to_string());
        args
    }
}

#[async_trait]
impl Project for SketchProject {
    fn name(&self) -> &WorkspaceName {
        &self.name
    }

    async fn build(&self, kind: BuildKind, progress: &dyn ProgressSink) -> Result<()> {
        let output = self
            .cli
            .run(self.compile_args(kind), progress)
            .await
            .map_err(|e| Error::Build {
                workspace: self.name.to_string(),
                reason: e.to_string(),
            })?;

        let errors: Vec<String> = output
            .stderr
            .lines()
            .chain(output.stdout.lines())
            .filter(|line| line.contains("error:") || line.contains("Error "))
            .map(str::to_string)
            .collect();
        if output.success() {
            debug!(project = %self.name, "Compile finished");
        } else {
            debug!(
                project = %self.name,
                exit_code = output.exit_code,
                first_error = errors.first().map(String::as_str).unwrap_or(""),
                "Compile failed"
            );
        }

        self.log
            .record(
                &self.name,
                BuildRecord {
                    exit_code: output.exit_code,
                    errors,
                },
            )
            .await;
        Ok(())
    }
}

/// Reads build errors recorded in a [`BuildLog`].
pub struct ArduinoDiagnostics {
    log: BuildLog,
}

impl ArduinoDiagnostics {
    pub fn new(log: BuildLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl BuildDiagnostics for ArduinoDiagnostics {
    async fn has_errors(&self, project: &dyn Project) -> Result<bool> {
        self.log
            .get(project.name())
            .await
            .map(|record| record.has_errors())
            .ok_or_else(|| Error::Diagnostics {
                workspace: project.name().to_string(),
                reason: "project has not been built".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArduinoConfig;
    use boardcheck_core::case::TestCase;
    use boardcheck_core::example::ExampleBundle;
    use boardcheck_core::ids::TargetId;
    use boardcheck_core::ports::{BuildConfiguration, NullProgress};
    use boardcheck_core::target::TargetProfile;
    use boardcheck_harness::RunContext;
    use std::collections::BTreeMap;
    use std::fs;

    fn case(example: &Path) -> TestCase {
        let target = TargetProfile {
            id: TargetId::new("uno"),
            index_source: "package_index.json".into(),
            vendor: "arduino".into(),
            package_name: "Arduino AVR Boards".into(),
            board_id: "uno".into(),
            options: BTreeMap::new(),
            descriptor: "arduino:avr:uno".into(),
        };
        TestCase::new(
            Arc::new(target),
            Arc::new(ExampleBundle::new("examples-01.Basics-Blink", example)),
        )
    }

    fn request(root: &Path, ctx: &RunContext, case: &TestCase) -> ProjectRequest {
        ProjectRequest {
            run: ctx.run_id(),
            name: ctx.workspace_name(case),
            location: Some(root.to_path_buf()),
            configurations: BuildConfiguration::defaults(),
            target: case.target.clone(),
            example: case.example.clone(),
            compile_options: CompileOptions::default(),
        }
    }

    fn factory(root: &Path, log: BuildLog) -> SketchProjectFactory {
        factory_with(root, log, ArduinoConfig::default())
    }

    fn factory_with(root: &Path, log: BuildLog, config: ArduinoConfig) -> SketchProjectFactory {
        SketchProjectFactory::new(Arc::new(ArduinoCli::new(&config)), root.to_path_buf(), log)
    }

    fn blink(root: &Path) -> PathBuf {
        let example = root.join("src/Blink");
        fs::create_dir_all(&example).unwrap();
        fs::write(example.join("Blink.ino"), "void setup() {}").unwrap();
        example
    }

    #[tokio::test]
    async fn test_create_copies_and_renames_sketch() {
        let tmp = tempfile::tempdir().unwrap();
        let example = blink(tmp.path());
        fs::write(example.join("pins.h"), "#define LED 13").unwrap();

        let ws = tmp.path().join("ws");
        let ctx = RunContext::new();
        let project = factory(&ws, BuildLog::new())
            .create(&request(&ws, &ctx, &case(&example)), &NullProgress)
            .await
            .unwrap();

        let sketch = ws
            .join(ctx.run_id().to_string())
            .join("000_unoBlink/000_unoBlink");
        assert_eq!(project.name().as_str(), "000_unoBlink");
        assert!(sketch.join("000_unoBlink.ino").is_file());
        assert!(sketch.join("pins.h").is_file());
        assert!(!sketch.join("Blink.ino").exists());
    }

    #[tokio::test]
    async fn test_create_refuses_existing_workspace() {
        let tmp = tempfile::tempdir().unwrap();
        let example = blink(tmp.path());
        let ctx = RunContext::new();
        fs::create_dir_all(
            tmp.path()
                .join(ctx.run_id().to_string())
                .join("000_unoBlink/000_unoBlink"),
        )
        .unwrap();

        let err = factory(tmp.path(), BuildLog::new())
            .create(&request(tmp.path(), &ctx, &case(&example)), &NullProgress)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::ProjectCreation { .. }));
    }

    #[tokio::test]
    async fn test_repeated_runs_share_a_workspace_root() {
        let tmp = tempfile::tempdir().unwrap();
        let example = blink(tmp.path());
        let ws = tmp.path().join("ws");
        let factory = factory(&ws, BuildLog::new());
        let case = case(&example);

        let mut dirs = Vec::new();
        for _ in 0..2 {
            let ctx = RunContext::new();
            let req = request(&ws, &ctx, &case);
            assert_eq!(req.name.as_str(), "000_unoBlink");
            factory.create(&req, &NullProgress).await.unwrap();
            dirs.push(ws.join(ctx.run_id().to_string()).join("000_unoBlink"));
        }

        assert_ne!(dirs[0], dirs[1]);
        assert!(dirs.iter().all(|d| d.join("000_unoBlink/000_unoBlink.ino").is_file()));
    }

    #[tokio::test]
    async fn test_diagnostics_read_build_log() {
        let tmp = tempfile::tempdir().unwrap();
        let example = blink(tmp.path());

        let log = BuildLog::new();
        let project = factory(tmp.path(), log.clone())
            .create(
                &request(tmp.path(), &RunContext::new(), &case(&example)),
                &NullProgress,
            )
            .await
            .unwrap();
        let diagnostics = ArduinoDiagnostics::new(log.clone());

        assert!(diagnostics.has_errors(project.as_ref()).await.is_err());

        log.record(
            project.name(),
            BuildRecord {
                exit_code: 1,
                errors: vec!["Blink.ino:1: error: 'foo' was not declared".into()],
            },
        )
        .await;
        assert!(diagnostics.has_errors(project.as_ref()).await.unwrap());

        log.record(project.name(), BuildRecord::default()).await;
        assert!(!diagnostics.has_errors(project.as_ref()).await.unwrap());
    }

    #[cfg(unix)]
    fn fake_cli(dir: &Path, exit_code: i32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(format!("arduino-cli-{}", exit_code));
        let script = format!(
            "#!/bin/sh\n\
             echo \"Blink.ino:3:7: warning: unused variable 'x' [-Wunused-variable]\" >&2\n\
             echo '    Serial.println(\"Error reading sensor\");' >&2\n\
             exit {}\n",
            exit_code
        );
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_decides_build_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let example = blink(tmp.path());

        for (exit_code, expect_errors) in [(0, false), (1, true)] {
            let log = BuildLog::new();
            let config = ArduinoConfig {
                cli_path: fake_cli(tmp.path(), exit_code),
                ..ArduinoConfig::default()
            };
            let ws = tmp.path().join("ws");
            let req = request(&ws, &RunContext::new(), &case(&example));
            let project = factory_with(&ws, log.clone(), config)
                .create(&req, &NullProgress)
                .await
                .unwrap();
            project.build(BuildKind::Full, &NullProgress).await.unwrap();

            let has_errors = ArduinoDiagnostics::new(log.clone())
                .has_errors(project.as_ref())
                .await
                .unwrap();
            assert_eq!(has_errors, expect_errors, "exit code {}", exit_code);

            // The echoed source line is kept for the report either way.
            let record = log.get(project.name()).await.unwrap();
            assert!(record.errors.iter().any(|l| l.contains("Error reading sensor")));
        }
    }

    #[test]
    fn test_full_build_is_clean_build() {
        let project = SketchProject {
            name: WorkspaceName::new("001_unoBlink"),
            sketch_dir: PathBuf::from("/ws/001_unoBlink/001_unoBlink"),
            build_dir: PathBuf::from("/ws/001_unoBlink/build"),
            fqbn: "arduino:avr:uno".into(),
            compile_options: CompileOptions {
                extra_flags: vec!["-Wall".into()],
                defines: HashMap::from([("DEBUG".to_string(), "1".to_string())]),
            },
            cli: Arc::new(ArduinoCli::new(&ArduinoConfig::default())),
            log: BuildLog::new(),
        };
        let full = project.compile_args(BuildKind::Full);
        assert!(full.contains(&"--clean".to_string()));
        assert!(full.contains(&"build.extra_flags=-Wall -DDEBUG=1".to_string()));
        assert_eq!(full.last().map(String::as_str), Some("/ws/001_unoBlink/001_unoBlink"));

        let incremental = project.compile_args(BuildKind::Incremental);
        assert!(!incremental.contains(&"--clean".to_string()));
    }
}
