//! Config file loading: `DR_CONFIG` env var, else `config.toml` in the
//! current directory, else built-in defaults.

use dr_domain::config::Config;

pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("DR_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        Config::from_toml_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        Config::default()
    };

    Ok((config, config_path))
}

/// Parse and validate the config, printing any issues. Returns `false` when
/// at least one `Error`-severity issue was found.
pub fn validate(config: &Config, config_path: &str) -> bool {
    use dr_domain::config::ConfigSeverity;

    let issues = config.validate();
    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues.iter().filter(|e| e.severity == ConfigSeverity::Error).count();
    let warning_count = issues.len() - error_count;
    for issue in &issues {
        println!("{issue}");
    }
    println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");
    error_count == 0
}

pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(output) => print!("{output}"),
        Err(e) => eprintln!("failed to serialize config: {e}"),
    }
}

/// Resolves each of the five model roles from `[models.roles]`, letting
/// `--model` override just the `orchestrator` role for a quick one-off run.
pub fn resolve_model_selection(
    config: &Config,
    model_override: Option<&str>,
) -> anyhow::Result<dr_domain::model::ModelSelection> {
    let role = |name: &str| config.models.roles.get(name).cloned();

    let orchestrator = match model_override {
        Some(m) => m.to_string(),
        None => role("orchestrator").ok_or_else(|| {
            anyhow::anyhow!("no model configured for role 'orchestrator' (set [models.roles] in config, or pass --model)")
        })?,
    };

    Ok(dr_domain::model::ModelSelection {
        planner: role("planner").unwrap_or_else(|| orchestrator.clone()),
        summarizer: role("summarizer").unwrap_or_else(|| orchestrator.clone()),
        report_writer: role("report_writer").unwrap_or_else(|| orchestrator.clone()),
        sub_agent: role("sub_agent").unwrap_or_else(|| orchestrator.clone()),
        orchestrator,
    })
}
