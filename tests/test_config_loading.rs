use edge_purge::config::PurgeConfig;
use edge_purge::PurgeError;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_sample_config() {
    let config = PurgeConfig::from_file("edge_purge.yaml");
    assert!(config.is_ok(), "Failed to load sample config: {:?}", config.err());

    let config = config.unwrap();
    assert!(config.enabled);
    assert_eq!(config.zone_id, "023e105f4ecef8ad9ca31a8372d0c353");
    assert_eq!(config.base_url.as_deref(), Some("https://www.example.com"));
    assert_eq!(config.purge_all_delay_hours, 1);
    assert_eq!(config.chunk_size, 30);
    assert_eq!(config.request_timeout_secs, 30);
    assert_eq!(config.reading_mode_param, "stage");
    assert_eq!(config.assets_url_prefix, "_resources");
    assert_eq!(config.css_javascript_extensions, vec!["css", "js", "json"]);
}

#[test]
fn test_load_minimal_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("minimal.yaml");
    fs::write(
        &path,
        r#"
enabled: true
auth_token: "token"
zone_id: "zone-1"
chunk_size: 10
"#,
    )
    .unwrap();

    let config = PurgeConfig::from_file(&path).unwrap();
    assert_eq!(config.chunk_size, 10);
    // Check defaults are applied
    assert_eq!(config.purge_all_delay_hours, 1);
    assert_eq!(config.reading_mode_param, "stage");
    assert!(config.base_url.is_none());
    assert!(config.image_extensions.contains(&"png".to_string()));
}

#[test]
fn test_load_invalid_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("invalid.yaml");
    fs::write(&path, "chunk_size: 50\n").unwrap();

    let config = PurgeConfig::from_file(&path);
    assert!(
        matches!(config, Err(PurgeError::ConfigError(_))),
        "Should fail validation for chunk_size above the API limit"
    );
}

#[test]
fn test_load_malformed_yaml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("malformed.yaml");
    fs::write(&path, "enabled: [not, a, bool\n").unwrap();

    assert!(PurgeConfig::from_file(&path).is_err());
}

#[test]
fn test_load_nonexistent_file() {
    let config = PurgeConfig::from_file("nonexistent.yaml");
    assert!(config.is_err(), "Should fail when file doesn't exist");
}
