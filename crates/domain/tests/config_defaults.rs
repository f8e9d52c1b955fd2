use dr_domain::config::Config;

#[test]
fn default_workspace_root_is_reports() {
    let config = Config::default();
    assert_eq!(config.workspace_root, std::path::PathBuf::from("./reports"));
}

#[test]
fn explicit_workspace_root_parses() {
    let toml_str = r#"
workspace_root = "/tmp/research"

[engine]
max_agents = 5
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.workspace_root, std::path::PathBuf::from("/tmp/research"));
    assert_eq!(config.engine.max_agents, 5);
}
