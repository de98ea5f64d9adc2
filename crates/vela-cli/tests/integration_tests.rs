//! Integration tests for commands that work without a cluster

use std::path::Path;
use std::process::Command;

/// Helper to run vela with its home in `home`
fn vela(home: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_vela"))
        .args(args)
        .env("VELA_HOME", home)
        .env_remove("VELA_NAMESPACE")
        .env("KUBECONFIG", home.join("no-such-kubeconfig"))
        .output()
        .expect("Failed to execute vela")
}

/// Get the fixtures path
fn fixtures_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/../../fixtures")
}

fn fixture(name: &str) -> String {
    format!("{}/{}", fixtures_path(), name)
}

mod dry_run_command {
    use super::*;

    #[test]
    fn test_offline_dry_run() {
        let home = tempfile::tempdir().unwrap();
        let output = vela(
            home.path(),
            &[
                "dry-run",
                "-f",
                &fixture("app.yaml"),
                "-d",
                &fixture("definitions"),
                "--offline",
            ],
        );

        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(output.status.success(), "dry-run failed: {}", stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("# Application(first-vela-app) -- Component(express-server)"));
        assert!(stdout.contains("kind: Deployment"));
        assert!(stdout.contains("image: oamdev/hello-world"));
        assert!(stdout.contains("## From the trait expose"));
        assert!(stdout.contains("port: 8000"));
        assert!(stdout.contains("namespace: default"));
    }

    #[test]
    fn test_dry_run_namespace_flag() {
        let home = tempfile::tempdir().unwrap();
        let output = vela(
            home.path(),
            &[
                "dry-run",
                "-f",
                &fixture("app.yaml"),
                "-d",
                &fixture("definitions"),
                "--offline",
                "-n",
                "staging",
            ],
        );

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("namespace: staging"));
    }

    #[test]
    fn test_merged_policies_and_workflow() {
        let home = tempfile::tempdir().unwrap();
        let output = vela(
            home.path(),
            &[
                "dry-run",
                "-f",
                &fixture("multi-env/app.yaml"),
                "-f",
                &fixture("multi-env/policies.yaml"),
                "-f",
                &fixture("multi-env/workflow.yaml"),
                "-d",
                &fixture("definitions"),
                "--offline",
                "--merge",
            ],
        );

        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(output.status.success(), "dry-run failed: {}", stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("# Application(multi-env-demo with topology target-prod) -- Component(server)"));
        assert!(stdout.contains("replicas: 3"));
        assert!(stdout.contains("namespace: demo"));
        assert!(!stdout.contains("WARNING"));
    }

    #[test]
    fn test_unreferenced_objects_warn() {
        let home = tempfile::tempdir().unwrap();
        let output = vela(
            home.path(),
            &[
                "dry-run",
                "-f",
                &fixture("multi-env/app.yaml"),
                "-f",
                &fixture("multi-env/policies.yaml"),
                "-f",
                &fixture("multi-env/workflow.yaml"),
                "-d",
                &fixture("definitions"),
                "--offline",
            ],
        );

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.starts_with("WARNING: workflow deploy-prod not referenced by application"));
        assert!(stdout.contains("WARNING: policy target-prod not referenced by application"));
        assert!(stdout.contains("# Application(multi-env-demo) -- Component(server)"));
        assert!(!stdout.contains("replicas: 3"));
    }

    #[test]
    fn test_two_applications_is_input_error() {
        let home = tempfile::tempdir().unwrap();
        let output = vela(home.path(), &["dry-run", "-f", &fixture("two-apps.yaml"), "--offline"]);

        assert_eq!(output.status.code(), Some(2));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("more than one applications provided"));
    }

    #[test]
    fn test_missing_definition_is_render_error() {
        let home = tempfile::tempdir().unwrap();
        let output = vela(
            home.path(),
            &[
                "dry-run",
                "-f",
                &fixture("app.yaml"),
                "-d",
                &fixture("definitions/traits"),
                "--offline",
            ],
        );

        assert_eq!(output.status.code(), Some(3));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let home = tempfile::tempdir().unwrap();
        let output = vela(home.path(), &["dry-run", "-f", &fixture("missing.yaml"), "--offline"]);

        assert_eq!(output.status.code(), Some(5));
    }
}

mod env_command {
    use super::*;

    #[test]
    fn test_env_lifecycle() {
        let home = tempfile::tempdir().unwrap();

        let output = vela(home.path(), &["env", "init", "prod", "--namespace", "production"]);
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("environment prod with namespace production created"));

        let output = vela(home.path(), &["env", "set", "prod"]);
        assert!(output.status.success());

        let output = vela(home.path(), &["env", "ls"]);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let prod = stdout.lines().find(|l| l.starts_with("prod")).expect("prod listed");
        assert!(prod.contains("production"));
        assert!(prod.trim_end().ends_with('*'));

        // the current env cannot be deleted
        let output = vela(home.path(), &["env", "delete", "prod"]);
        assert_eq!(output.status.code(), Some(2));

        let output = vela(home.path(), &["env", "set", "default"]);
        assert!(output.status.success());
        let output = vela(home.path(), &["env", "delete", "prod"]);
        assert!(output.status.success());
    }

    #[test]
    fn test_current_env_namespace_used_by_dry_run() {
        let home = tempfile::tempdir().unwrap();
        vela(home.path(), &["env", "init", "prod", "--namespace", "production"]);
        vela(home.path(), &["env", "set", "prod"]);

        let output = vela(
            home.path(),
            &[
                "dry-run",
                "-f",
                &fixture("app.yaml"),
                "-d",
                &fixture("definitions"),
                "--offline",
            ],
        );
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("namespace: production"));
    }
}

mod registry_command {
    use super::*;

    #[test]
    fn test_default_registry_listed() {
        let home = tempfile::tempdir().unwrap();
        let output = vela(home.path(), &["addon", "registry", "list"]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("KubeVela"));
        assert!(stdout.contains("https://addons.kubevela.net"));
    }

    #[test]
    fn test_add_update_remove() {
        let home = tempfile::tempdir().unwrap();

        let output = vela(
            home.path(),
            &[
                "addon",
                "registry",
                "add",
                "experimental",
                "--url",
                "https://addons.example.com/experimental",
                "--token",
                "secret-token",
            ],
        );
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("registry experimental"));

        // duplicate names are rejected
        let output = vela(
            home.path(),
            &["addon", "registry", "add", "experimental", "--url", "https://other.example.com"],
        );
        assert_eq!(output.status.code(), Some(2));

        let output = vela(home.path(), &["addon", "registry", "get", "experimental"]);
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("https://addons.example.com/experimental"));
        assert!(!stdout.contains("secret-token"));

        let output = vela(home.path(), &["registry", "config", "experimental", "https://mirror.example.com"]);
        assert!(output.status.success());
        let output = vela(home.path(), &["registry", "ls"]);
        assert!(String::from_utf8_lossy(&output.stdout).contains("https://mirror.example.com"));

        let output = vela(home.path(), &["addon", "registry", "delete", "experimental"]);
        assert!(output.status.success());
        let output = vela(home.path(), &["addon", "registry", "list"]);
        assert!(!String::from_utf8_lossy(&output.stdout).contains("experimental"));
    }

    #[test]
    fn test_unknown_registry() {
        let home = tempfile::tempdir().unwrap();
        let output = vela(home.path(), &["addon", "registry", "get", "nope"]);

        assert_eq!(output.status.code(), Some(2));
        assert!(String::from_utf8_lossy(&output.stderr).contains("registry nope not found"));
    }
}

mod version_command {
    use super::*;

    #[test]
    fn test_short_version() {
        let home = tempfile::tempdir().unwrap();
        let output = vela(home.path(), &["version", "--short"]);

        assert!(output.status.success());
        assert_eq!(
            String::from_utf8_lossy(&output.stdout).trim(),
            format!("v{}", env!("CARGO_PKG_VERSION"))
        );
    }

    #[test]
    fn test_full_version() {
        let home = tempfile::tempdir().unwrap();
        let output = vela(home.path(), &["version"]);

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("CLI Version:"));
        assert!(stdout.contains("Git Revision:"));
    }
}

mod usage {
    use super::*;

    #[test]
    fn test_help_exits_zero() {
        let home = tempfile::tempdir().unwrap();
        let output = vela(home.path(), &["--help"]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("dry-run"));
        assert!(stdout.contains("addon"));
    }

    #[test]
    fn test_missing_required_argument() {
        let home = tempfile::tempdir().unwrap();
        let output = vela(home.path(), &["dry-run"]);

        assert_eq!(output.status.code(), Some(64));
    }

    #[test]
    fn test_unknown_command() {
        let home = tempfile::tempdir().unwrap();
        let output = vela(home.path(), &["frobnicate"]);

        assert_eq!(output.status.code(), Some(64));
    }

    #[test]
    fn test_up_requires_name_or_file() {
        let home = tempfile::tempdir().unwrap();
        let output = vela(home.path(), &["up"]);

        assert_eq!(output.status.code(), Some(2));
        assert!(String::from_utf8_lossy(&output.stderr).contains("either app name or file should be set"));
    }

    #[test]
    fn test_ql_requires_statement() {
        let home = tempfile::tempdir().unwrap();
        let output = vela(home.path(), &["ql"]);

        assert_eq!(output.status.code(), Some(2));
        assert!(String::from_utf8_lossy(&output.stderr).contains("please specify at least one VelaQL statement"));
    }

    #[test]
    fn test_cuex_rejects_unknown_output() {
        let home = tempfile::tempdir().unwrap();
        let output = vela(home.path(), &["cuex", "eval", "-o", "toml", &fixture("app.yaml")]);

        assert_eq!(output.status.code(), Some(2));
    }
}
