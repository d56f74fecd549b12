use contract_progress::config::{
    AppConfig, CONFIG_PATH_VAR, ConfigError, DATABASE_VAR, HTTP_ADDR_VAR, LOCALE_VAR,
};
use contract_progress::MonthLabelLocale;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

#[test]
fn defaults_without_environment() {
    let config = AppConfig::load_with(lookup(&[])).unwrap();
    assert_eq!(config, AppConfig::default());
    assert_eq!(config.http_addr.port(), 3000);
}

#[test]
fn toml_file_is_read_and_partially_defaulted() {
    let config = AppConfig::from_toml_str("locale = \"id\"\nhttp_addr = \"127.0.0.1:8080\"\n").unwrap();
    assert_eq!(config.locale, MonthLabelLocale::Indonesian);
    assert_eq!(config.http_addr.to_string(), "127.0.0.1:8080");
    assert_eq!(config.database_path, PathBuf::from("contract-progress.db"));
}

#[test]
fn environment_overrides_file_values() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "database_path = \"/var/lib/progress.db\"").unwrap();
    writeln!(file, "locale = \"en\"").unwrap();
    let path = file.path().to_string_lossy().to_string();

    let config = AppConfig::load_with(lookup(&[
        (CONFIG_PATH_VAR, path.as_str()),
        (HTTP_ADDR_VAR, "127.0.0.1:9000"),
        (LOCALE_VAR, "indonesian"),
    ]))
    .unwrap();
    assert_eq!(config.database_path, PathBuf::from("/var/lib/progress.db"));
    assert_eq!(config.http_addr.port(), 9000);
    assert_eq!(config.locale, MonthLabelLocale::Indonesian);

    let config = AppConfig::load_with(lookup(&[(DATABASE_VAR, "other.db")])).unwrap();
    assert_eq!(config.database_path, PathBuf::from("other.db"));
}

#[test]
fn invalid_values_are_reported() {
    let err = AppConfig::load_with(lookup(&[(HTTP_ADDR_VAR, "not-an-addr")])).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { name, .. } if name == HTTP_ADDR_VAR));

    assert!(matches!(
        AppConfig::from_toml_str("locale = \"fr\"").unwrap_err(),
        ConfigError::Toml(_)
    ));
    assert!(matches!(
        AppConfig::load_with(lookup(&[(CONFIG_PATH_VAR, "/nonexistent/progress.toml")])).unwrap_err(),
        ConfigError::Io { .. }
    ));
}
