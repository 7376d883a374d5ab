//! End-to-end runs against generated release archives and a stub
//! `bake-and-build.sh`.

use std::fs;
use std::path::{Path, PathBuf};

use ovxr_docker::run_manifest::{RunManifest, RunStatus};
use ovxr_docker::runlog::{BUILD_LOG_FILENAME, RUN_LOG_FILENAME, RUN_MANIFEST_FILENAME};
use ovxr_docker::{
    ArchivePair, BuildVersionSource, RunOutcome, RunRequest, TargetProfile, ToolConfig, Workflow,
};
use tempfile::TempDir;

const ISO_TAR: &str = "8000-2512-iso-eft15.1.tar";
const FIXED_IMAGE_TAR: &str = "8000-2512-f-8101-image-eft15.1.tar";

struct Release {
    tmp: TempDir,
}

impl Release {
    fn new() -> Self {
        let release = Self {
            tmp: TempDir::new().unwrap(),
        };
        fs::create_dir_all(release.script().parent().unwrap()).unwrap();
        fs::write(release.manifest(), "bake-and-build/bake-and-build.sh\n").unwrap();
        write_tar(&release.path(ISO_TAR), &[("8000-x64.iso", b"iso")]);
        release
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.tmp.path().join(rel)
    }

    fn script(&self) -> PathBuf {
        self.path("bake-and-build/bake-and-build.sh")
    }

    fn manifest(&self) -> PathBuf {
        self.path("required_files.conf")
    }

    fn args_file(&self) -> PathBuf {
        self.path("script-args.txt")
    }

    /// Stub build script: records its arguments, runs `body`, exits `code`.
    fn stub_script(&self, body: &str, code: i32) {
        fs::write(
            self.script(),
            format!(
                "#!/bin/bash\necho \"$@\" > '{}'\necho \"bake-and-build starting\"\n{body}\nexit {code}\n",
                self.args_file().display()
            ),
        )
        .unwrap();
    }

    fn image_tar(&self, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
        let path = self.path(name);
        write_tar(&path, files);
        path
    }

    fn config(&self) -> ToolConfig {
        ToolConfig {
            release_root: self.tmp.path().to_path_buf(),
            bake_script: self.script(),
            required_files: self.manifest(),
            output_root: self.path("ovxr-docker.out"),
            sdk_version: Some("24.10.2230.6.dc".to_string()),
        }
    }

    fn request(&self, image_tar: PathBuf) -> RunRequest {
        let mut request = RunRequest::new(ArchivePair::explicit(self.path(ISO_TAR), image_tar));
        request.temp_dir = Some(self.path("scratch"));
        request
    }

    fn run(&self, request: RunRequest) -> RunOutcome {
        Workflow::new(self.config()).run(request)
    }

    fn script_args(&self) -> String {
        fs::read_to_string(self.args_file()).unwrap()
    }
}

fn write_tar(path: &Path, files: &[(&str, &[u8])]) {
    let mut builder = tar::Builder::new(fs::File::create(path).unwrap());
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.finish().unwrap();
}

#[test]
fn platform_from_archive_name_without_disk_image() {
    let release = Release::new();
    release.stub_script("", 0);
    let image = release.image_tar(FIXED_IMAGE_TAR, &[("README", b"notes")]);

    let outcome = release.run(release.request(image));

    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.platform, "8101-32H");
    let args = release.script_args();
    assert!(args.contains("-p 8101-32H -t all --forcesdk 24.10.2230.6.dc"));
    assert!(args.contains(&format!("-i {}", release.path("scratch/8000-x64.iso").display())));
}

#[test]
fn disk_image_refines_platform() {
    let release = Release::new();
    release.stub_script("", 0);
    let image = release.image_tar(FIXED_IMAGE_TAR, &[("8101-32FH-x64-25.1.2.qcow2", b"disk")]);

    let outcome = release.run(release.request(image));

    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.platform, "8101-32FH");
    assert!(release.script_args().contains("-p 8101-32FH "));
    assert!(outcome
        .log_dir
        .unwrap()
        .to_string_lossy()
        .ends_with("-24.10.2230.6.dc-8101-32FH"));
}

#[test]
fn explicit_platform_and_options_reach_script() {
    let release = Release::new();
    release.stub_script("", 0);
    let image = release.image_tar(FIXED_IMAGE_TAR, &[("8101-32FH-x64-25.1.2.qcow2", b"disk")]);

    let mut request = release.request(image);
    request.platform = Some("8202-32FH-M".into());
    request.docker_name = Some("lab:latest".into());
    request.target = TargetProfile::Clab;
    let outcome = release.run(request);

    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.platform, "8202-32FH-M");
    assert!(release
        .script_args()
        .contains("-p 8202-32FH-M -t clab -d lab:latest --forcesdk 24.10.2230.6.dc"));
}

#[test]
fn announced_drop_folders_are_removed() {
    let release = Release::new();
    let img_drop = release.path("drop1");
    let yaml_drop = release.path("yaml-drop");
    fs::create_dir_all(img_drop.join("nested")).unwrap();
    fs::create_dir_all(&yaml_drop).unwrap();
    release.stub_script(
        &format!(
            "echo \"IMG_DROP_FOLDER: {}\"\necho \"  YAML_DROP_FOLDER: {}\" >&2",
            img_drop.display(),
            yaml_drop.display()
        ),
        0,
    );
    let image = release.image_tar(FIXED_IMAGE_TAR, &[("README", b"notes")]);

    let outcome = release.run(release.request(image));

    assert_eq!(outcome.exit_code, 0);
    assert!(!img_drop.exists());
    assert!(!yaml_drop.exists());
}

#[test]
fn success_without_image_line() {
    let release = Release::new();
    release.stub_script("echo \"all done\"", 0);
    let image = release.image_tar(FIXED_IMAGE_TAR, &[("README", b"notes")]);

    let outcome = release.run(release.request(image));

    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.docker_image, None);
}

#[test]
fn reported_image_must_exist() {
    let release = Release::new();
    let missing = release.path("images/lab.tar");
    release.stub_script(
        &format!("echo \"Saving docker image, lab:latest to {}\"", missing.display()),
        0,
    );
    let image = release.image_tar(FIXED_IMAGE_TAR, &[("README", b"notes")]);

    let outcome = release.run(release.request(image));

    assert_eq!(outcome.exit_code, 1);
    assert_eq!(outcome.docker_image, Some(missing));

    let manifest = RunManifest::load(&outcome.log_dir.unwrap().join(RUN_MANIFEST_FILENAME)).unwrap();
    assert_eq!(manifest.status, RunStatus::Failed);
    assert_eq!(manifest.exit_code, Some(1));
}

#[test]
fn reported_image_on_disk_succeeds() {
    let release = Release::new();
    let saved = release.path("images/lab.tar");
    release.stub_script(
        &format!(
            "mkdir -p '{dir}'\ntouch '{file}'\necho \"Saving docker image, lab:latest to {file}\"",
            dir = saved.parent().unwrap().display(),
            file = saved.display()
        ),
        0,
    );
    let image = release.image_tar(FIXED_IMAGE_TAR, &[("README", b"notes")]);

    let outcome = release.run(release.request(image));

    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.docker_image, Some(saved.clone()));

    let log_dir = outcome.log_dir.unwrap();
    let manifest = RunManifest::load(&log_dir.join(RUN_MANIFEST_FILENAME)).unwrap();
    assert_eq!(manifest.status, RunStatus::Success);
    assert_eq!(manifest.docker_image, Some(saved.clone()));
    assert_eq!(manifest.platform, "8101-32H");

    let run_log = fs::read_to_string(log_dir.join(RUN_LOG_FILENAME)).unwrap();
    assert!(run_log.starts_with("=== create_single_docker Run Log ==="));
    assert!(run_log.contains("Exit code: 0"));
    assert!(run_log.contains(&format!("Docker image path: {}", saved.display())));
}

#[test]
fn relative_image_path_resolves_from_script_dir() {
    let release = Release::new();
    release.stub_script(
        "mkdir -p out\ntouch out/img.tar\necho \"Saving docker image, lab:latest to out/img.tar\"",
        0,
    );
    let image = release.image_tar(FIXED_IMAGE_TAR, &[("README", b"notes")]);

    let outcome = release.run(release.request(image));

    let saved = release.path("bake-and-build/out/img.tar");
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.docker_image, Some(saved.clone()));

    let manifest =
        RunManifest::load(&outcome.log_dir.unwrap().join(RUN_MANIFEST_FILENAME)).unwrap();
    assert_eq!(manifest.docker_image, Some(saved));
}

#[test]
fn relative_temp_dir_hands_script_an_absolute_iso() {
    let release = Release::new();
    release.stub_script(
        "case \"$2\" in /*) ;; *) exit 7 ;; esac\n[ -f \"$2\" ] || exit 8",
        0,
    );
    let image = release.image_tar(FIXED_IMAGE_TAR, &[("README", b"notes")]);
    let scratch_name = format!("create_single_docker_it_{}", std::process::id());
    let mut request = release.request(image);
    request.temp_dir = Some(PathBuf::from(&scratch_name));

    let outcome = release.run(request);

    let scratch = std::env::current_dir().unwrap().join(&scratch_name);
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.scratch_dir, Some(scratch.clone()));
    assert!(release
        .script_args()
        .contains(&format!("-i {}", scratch.join("8000-x64.iso").display())));
    assert!(!scratch.exists());
}

#[test]
fn failing_script_still_cleans_up() {
    let release = Release::new();
    let img_drop = release.path("drop1");
    fs::create_dir_all(&img_drop).unwrap();
    release.stub_script(
        &format!(
            "echo \"IMG_DROP_FOLDER: {}\"\necho \"Saving docker image, x to /nowhere/x.tar\"\necho \"docker: build failed\" >&2",
            img_drop.display()
        ),
        2,
    );
    let image = release.image_tar(FIXED_IMAGE_TAR, &[("README", b"notes")]);

    let outcome = release.run(release.request(image));

    assert_eq!(outcome.exit_code, 2);
    assert_eq!(outcome.docker_image, None);
    assert!(!img_drop.exists());
    assert!(!release.path("scratch").exists());

    let build_log = fs::read_to_string(outcome.log_dir.unwrap().join(BUILD_LOG_FILENAME)).unwrap();
    assert!(build_log.contains("bake-and-build starting"));
    assert!(build_log.contains("docker: build failed"));
    assert!(build_log.contains("Exit code: 2"));
}

#[test]
fn no_cleanup_keeps_scratch() {
    let release = Release::new();
    release.stub_script("", 0);
    let image = release.image_tar(FIXED_IMAGE_TAR, &[("8101-x64-25.1.2.qcow2", b"disk")]);

    let mut request = release.request(image);
    request.cleanup = false;
    let outcome = release.run(request);

    assert_eq!(outcome.exit_code, 0);
    assert!(release.path("scratch/8000-x64.iso").is_file());
    assert!(release.path("scratch/8101-x64-25.1.2.qcow2").is_file());
}

#[test]
fn system_scratch_is_removed() {
    let release = Release::new();
    release.stub_script("", 0);
    let image = release.image_tar(FIXED_IMAGE_TAR, &[("README", b"notes")]);

    let mut request = release.request(image);
    request.temp_dir = None;
    let outcome = release.run(request);

    assert_eq!(outcome.exit_code, 0);
    let scratch = outcome.scratch_dir.unwrap();
    assert!(scratch
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("create_single_docker_"));
    assert!(!scratch.exists());
}

#[test]
fn missing_required_file_aborts_before_build() {
    let release = Release::new();
    release.stub_script("", 0);
    fs::write(release.manifest(), "bake-and-build/bake-and-build.sh\nyaml/kne.yaml\n").unwrap();
    let image = release.image_tar(FIXED_IMAGE_TAR, &[("README", b"notes")]);

    let outcome = release.run(release.request(image));

    assert_eq!(outcome.exit_code, 1);
    assert_eq!(outcome.log_dir, None);
    assert!(!release.args_file().exists());
}

#[test]
fn iso_tar_without_iso_fails_after_extraction() {
    let release = Release::new();
    release.stub_script("", 0);
    write_tar(&release.path(ISO_TAR), &[("docs/README", b"no iso here")]);
    let image = release.image_tar(FIXED_IMAGE_TAR, &[("README", b"notes")]);

    let outcome = release.run(release.request(image));

    assert_eq!(outcome.exit_code, 1);
    assert!(!release.path("scratch").exists());
    assert!(!release.args_file().exists());
}

struct NoVersion;

impl BuildVersionSource for NoVersion {
    fn extract_build_version(&self, _installer_image: &Path) -> Option<String> {
        None
    }
}

#[test]
fn unknown_sdk_version_drops_forcesdk() {
    let release = Release::new();
    release.stub_script("", 0);
    let image = release.image_tar(FIXED_IMAGE_TAR, &[("README", b"notes")]);

    let outcome = Workflow::new(release.config())
        .with_version_source(Box::new(NoVersion))
        .run(release.request(image));

    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.sdk_version, None);
    assert!(!release.script_args().contains("--forcesdk"));
    assert!(outcome
        .log_dir
        .unwrap()
        .to_string_lossy()
        .ends_with("-unknown-8101-32H"));
}
