// ABOUTME: Config scaffolding for new wait plans.
// ABOUTME: Creates container-wait.yml template files.

use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::ContainerPort;

use super::{CONFIG_FILENAME, StrategyKind, WaitConfig};

pub fn init_config(dir: &Path, port: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let port = match port {
        Some(p) => ContainerPort::parse(p).map_err(|e| Error::InvalidConfig(e.to_string()))?,
        None => ContainerPort::tcp(8080),
    };

    let yaml = generate_template_yaml(&WaitConfig::template(port));
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(config: &WaitConfig) -> String {
    let mut yaml = format!(
        r#"defaults:
  timeout: {}
  poll_interval: {}
"#,
        format_duration(config.defaults.timeout),
        format_duration(config.defaults.poll_interval),
    );

    if let Some(deadline) = config.deadline {
        yaml.push_str(&format!("deadline: {}\n", format_duration(deadline)));
    }

    yaml.push_str("strategies:\n");
    for entry in config.strategies.iter() {
        match &entry.kind {
            StrategyKind::ListeningPort { port, .. } => {
                yaml.push_str(&format!("  - type: listening_port\n    port: {}\n", port));
            }
            StrategyKind::Http { path, port, .. } => {
                yaml.push_str(&format!("  - type: http\n    path: {}\n", path));
                if let Some(port) = port {
                    yaml.push_str(&format!("    port: {}\n", port));
                }
            }
            _ => {}
        }
    }

    yaml.push_str(
        r#"  # Other types: log, exposed_port, mapped_port, exec, file, healthy, exit
  # - type: log
  #   message: "ready to accept connections"
  #   occurrence: 2
"#,
    );

    yaml
}

fn format_duration(duration: Duration) -> String {
    if duration.subsec_nanos() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
