//! Integration tests for CLI commands

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Helper to run rudder command
fn rudder(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_rudder"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute rudder")
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A workspace with a `web` pack and configs under `configs/`
fn create_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    write(
        root,
        "packs/web/Pack.yaml",
        "apiVersion: rudder/v1\nmetadata:\n  name: web\n  version: 1.0.0\n",
    );
    write(root, "packs/web/values.yaml", "replicas: 1\nimage: nginx\n");
    write(
        root,
        "packs/web/templates/deployment.yaml",
        r#"kind: Deployment
metadata:
  name: {{ release.name }}-{{ pack.name }}
  namespace: {{ release.namespace }}
spec:
  replicas: {{ values.replicas }}
  template:
    spec:
      containers:
      - name: web
        image: {{ values.image }}
"#,
    );
    write(
        root,
        "packs/web/templates/service.yaml",
        "kind: Service\nmetadata:\n  name: {{ release.name }}-{{ pack.name }}\n",
    );

    write(root, "configs/common.yaml", "values:\n  image: nginx-stable\n");
    write(
        root,
        "configs/prod.yaml",
        r##"includes:
  - path: common.yaml
charts:
  - path: ../packs/web
    values:
      replicas: 2
    patches:
      - target:
          kind: Deployment
        patch:
          - op: add
            path: /metadata/labels
            value: { $ref: "#/labels" }
values:
  labels:
    env: production
release:
  name: shop
  namespace: prod
target:
  path: prod
"##,
    );

    dir
}

mod template_command {
    use super::*;

    #[test]
    fn test_template_writes_manifest() {
        let dir = create_workspace();
        let out = dir.path().join("out");

        let output = rudder(&[
            "template",
            dir.path().join("configs/prod.yaml").to_str().unwrap(),
            "--output-dir",
            out.to_str().unwrap(),
        ]);

        assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("wrote"));
        assert!(stdout.contains("prod/web/manifest.yaml"));

        let manifest = fs::read_to_string(out.join("prod/web/manifest.yaml")).unwrap();
        assert!(manifest.contains("# Source: web/templates/deployment.yaml"));
        assert!(manifest.contains("# Source: web/templates/service.yaml"));
        assert!(manifest.contains("name: shop-web"));
        assert!(manifest.contains("namespace: prod"));
        assert!(manifest.contains("replicas: 2"));
        assert!(manifest.contains("image: nginx-stable"));
        assert!(manifest.contains("labels:\n    env: production"));
    }

    #[test]
    fn test_template_directory_input() {
        let dir = create_workspace();
        let out = dir.path().join("out");

        let output = rudder(&[
            "template",
            dir.path().join("configs").to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ]);

        assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
        // common.yaml has no target and renders nothing on its own
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert_eq!(stdout.lines().count(), 1);
        assert!(out.join("prod/web/manifest.yaml").is_file());
    }

    #[test]
    fn test_template_default_output_dir() {
        let dir = create_workspace();

        let output = Command::new(env!("CARGO_BIN_EXE_rudder"))
            .args(["template", "configs/prod.yaml"])
            .current_dir(dir.path())
            .output()
            .expect("Failed to execute rudder");

        assert!(output.status.success());
        assert!(dir.path().join("prod/web/manifest.yaml").is_file());
    }

    #[test]
    fn test_template_same_target_twice_appends() {
        let dir = create_workspace();
        let out = dir.path().join("out");
        let config = dir.path().join("configs/prod.yaml");

        let output = rudder(&[
            "template",
            config.to_str().unwrap(),
            config.to_str().unwrap(),
            "--output-dir",
            out.to_str().unwrap(),
        ]);

        assert!(output.status.success());
        let manifest = fs::read_to_string(out.join("prod/web/manifest.yaml")).unwrap();
        assert_eq!(manifest.matches("kind: Deployment").count(), 2);

        let output = rudder(&[
            "template",
            config.to_str().unwrap(),
            "--output-dir",
            out.to_str().unwrap(),
        ]);

        assert!(output.status.success());
        let manifest = fs::read_to_string(out.join("prod/web/manifest.yaml")).unwrap();
        assert_eq!(manifest.matches("kind: Deployment").count(), 1);
    }

    #[test]
    fn test_template_circular_include_fails() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.yaml", "includes:\n  - path: b.yaml\ntarget:\n  path: out\n");
        write(dir.path(), "b.yaml", "includes:\n  - path: a.yaml\n");

        let output = rudder(&[
            "template",
            dir.path().join("a.yaml").to_str().unwrap(),
            "--output-dir",
            dir.path().to_str().unwrap(),
        ]);

        assert_eq!(output.status.code(), Some(1));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Circular include"));
    }

    #[test]
    fn test_template_error_reported() {
        let dir = create_workspace();
        write(
            dir.path(),
            "packs/web/templates/broken.yaml",
            "value: {{ values.does_not_exist }}\n",
        );

        let output = rudder(&[
            "template",
            dir.path().join("configs/prod.yaml").to_str().unwrap(),
            "--output-dir",
            dir.path().join("out").to_str().unwrap(),
        ]);

        assert!(!output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Failed to render chart"));
    }

    #[test]
    fn test_template_requires_config() {
        let output = rudder(&["template"]);

        assert!(!output.status.success());
    }

    #[test]
    fn test_missing_config_fails() {
        let dir = TempDir::new().unwrap();

        let output = rudder(&[
            "template",
            dir.path().join("nope.yaml").to_str().unwrap(),
        ]);

        assert_eq!(output.status.code(), Some(1));
    }
}

mod general {
    use super::*;

    #[test]
    fn test_version() {
        let output = rudder(&["--version"]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.starts_with("rudder "));
    }

    #[test]
    fn test_verbose_logs_to_stderr() {
        let dir = create_workspace();

        let output = rudder(&[
            "template",
            "-v",
            dir.path().join("configs/prod.yaml").to_str().unwrap(),
            "--output-dir",
            dir.path().join("out").to_str().unwrap(),
        ]);

        assert!(output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("DEBUG"));
    }
}
