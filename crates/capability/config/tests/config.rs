use relay_config::{AppConfig, ConfigError};

// 环境变量是进程级的，所有场景放在同一个测试里顺序执行。
#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::remove_var("RELAY_HTTP_ADDR");
        std::env::remove_var("RELAY_DATABASE_URL");
        std::env::remove_var("RELAY_SEED_FILE");
        std::env::remove_var("RELAY_AUTO_OPEN");
        std::env::remove_var("RELAY_OUTPUTS_ENABLED");
    }
    let config = AppConfig::from_env().expect("defaults");
    assert_eq!(config.http_addr, "127.0.0.1:8090");
    assert!(config.database_url.is_none());
    assert!(config.seed_file.is_none());
    assert!(!config.auto_open);
    assert!(config.outputs_enabled);

    unsafe {
        std::env::set_var("RELAY_HTTP_ADDR", "0.0.0.0:9000");
        std::env::set_var("RELAY_SEED_FILE", "seed.json");
        std::env::set_var("RELAY_AUTO_OPEN", "on");
        std::env::set_var("RELAY_OUTPUTS_ENABLED", "false");
    }
    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.http_addr, "0.0.0.0:9000");
    assert_eq!(config.seed_file.as_deref(), Some("seed.json"));
    assert!(config.auto_open);
    assert!(!config.outputs_enabled);

    unsafe {
        std::env::set_var("RELAY_AUTO_OPEN", "sometimes");
    }
    let err = AppConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(key, _) if key == "RELAY_AUTO_OPEN"));

    unsafe {
        std::env::remove_var("RELAY_AUTO_OPEN");
    }
}
