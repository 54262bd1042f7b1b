use serial_test::serial;
use soldeploy_cli::config::GlobalConfig;
use soldeploy_cli::constants::CONFIG_ENV;
use tempfile::TempDir;

struct EnvGuard(Option<String>);

impl EnvGuard {
    fn set(value: &std::path::Path) -> Self {
        let previous = std::env::var(CONFIG_ENV).ok();
        // SAFETY: tests touching the process environment are #[serial]
        unsafe { std::env::set_var(CONFIG_ENV, value) };
        Self(previous)
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        // SAFETY: see EnvGuard::set
        unsafe {
            match &self.0 {
                Some(previous) => std::env::set_var(CONFIG_ENV, previous),
                None => std::env::remove_var(CONFIG_ENV),
            }
        }
    }
}

#[tokio::test]
#[serial]
async fn test_env_var_names_the_config_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("custom.toml");
    tokio::fs::write(&path, "max_parallel = 7\n[cost_weights]\nDashboard = 2\n").await.unwrap();
    let _guard = EnvGuard::set(&path);

    assert_eq!(GlobalConfig::default_path().unwrap(), path);
    let config = GlobalConfig::load().await.unwrap();
    assert_eq!(config.max_parallel, 7);
    assert_eq!(config.build_options(None).cost_weights.get("dashboard"), Some(&2));
}

#[tokio::test]
#[serial]
async fn test_missing_config_file_means_defaults() {
    let temp = TempDir::new().unwrap();
    let _guard = EnvGuard::set(&temp.path().join("absent.toml"));

    assert_eq!(GlobalConfig::load().await.unwrap(), GlobalConfig::default());
}

#[tokio::test]
#[serial]
async fn test_explicit_path_wins_over_env_var() {
    let temp = TempDir::new().unwrap();
    let from_env = temp.path().join("env.toml");
    let explicit = temp.path().join("explicit.toml");
    tokio::fs::write(&from_env, "max_parallel = 2\n").await.unwrap();
    tokio::fs::write(&explicit, "max_parallel = 9\nskip_inaccessible = true\n").await.unwrap();
    let _guard = EnvGuard::set(&from_env);

    let config = GlobalConfig::load_with_optional(Some(explicit)).await.unwrap();
    assert_eq!(config.max_parallel, 9);
    assert!(config.skip_inaccessible);
}
