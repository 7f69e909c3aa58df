// ABOUTME: Integration tests for wait plan parsing and validation.
// ABOUTME: Tests YAML parsing, file discovery, scaffolding and conversion into strategies.

use container_wait::config::*;
use container_wait::error::Error;
use container_wait::types::ContainerPort;
use std::time::Duration;

mod parsing {
    use super::*;

    #[test]
    fn parse_full_plan() {
        let yaml = r#"
defaults:
  timeout: 90s
  poll_interval: 250ms
deadline: 3m
startup_timeout: 45s
strategies:
  - type: log
    message: "database system is ready to accept connections"
    occurrence: 2
  - type: listening_port
    port: 5432
    skip_internal_check: true
  - type: exposed_port
  - type: mapped_port
    port: 53/udp
  - type: http
    path: /health
    port: "8080/tcp"
    method: POST
    headers:
      Authorization: Bearer token
    body: "{}"
    status: 204
    timeout: 10s
  - type: exec
    command: ["pg_isready", "-U", "postgres"]
    exit_code: 0
    user: postgres
  - type: file
    path: /tmp/ready
    poll_interval: 1s
  - type: healthy
  - type: exit
"#;
        let config = WaitConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.defaults.timeout, Duration::from_secs(90));
        assert_eq!(config.defaults.poll_interval, Duration::from_millis(250));
        assert_eq!(config.deadline, Some(Duration::from_secs(180)));
        assert_eq!(config.startup_timeout, Some(Duration::from_secs(45)));
        assert_eq!(config.strategies.len(), 9);

        let http = config.strategies.get(4).unwrap();
        assert_eq!(http.timeout, Some(Duration::from_secs(10)));
        match &http.kind {
            StrategyKind::Http {
                path,
                port,
                method,
                headers,
                status,
                ..
            } => {
                assert_eq!(path, "/health");
                assert_eq!(*port, Some(ContainerPort::tcp(8080)));
                assert_eq!(method, "POST");
                assert_eq!(headers.get("Authorization").unwrap(), "Bearer token");
                assert_eq!(*status, Some(204));
            }
            other => panic!("expected http, got {:?}", other),
        }

        assert!(matches!(
            config.strategies.get(3).unwrap().kind,
            StrategyKind::MappedPort { port } if port == ContainerPort::udp(53)
        ));
        assert_eq!(
            config.strategies.get(6).unwrap().poll_interval,
            Some(Duration::from_secs(1))
        );

        let all = config.into_strategy().unwrap();
        assert_eq!(all.len(), 9);
        assert_eq!(all.deadline(), Some(Duration::from_secs(180)));
    }

    #[test]
    fn defaults_fill_in_optional_fields() {
        let config = WaitConfig::from_yaml(
            r#"
strategies:
  - type: http
"#,
        )
        .unwrap();

        match &config.strategies.first().kind {
            StrategyKind::Http {
                path,
                port,
                method,
                ..
            } => {
                assert_eq!(path, "/");
                assert_eq!(*port, None);
                assert_eq!(method, "GET");
            }
            other => panic!("expected http, got {:?}", other),
        }
    }

    #[test]
    fn missing_strategies_returns_error() {
        let err = WaitConfig::from_yaml("deadline: 1m\n").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }

    #[test]
    fn empty_strategies_returns_error() {
        let err = WaitConfig::from_yaml("strategies: []\n").unwrap_err();
        assert!(err.to_string().contains("at least one strategy is required"));
    }

    #[test]
    fn unknown_type_returns_error() {
        let err = WaitConfig::from_yaml("strategies:\n  - type: telepathy\n").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }

    #[test]
    fn invalid_port_returns_error() {
        let yaml = r#"
strategies:
  - type: listening_port
    port: 70000
"#;
        assert!(WaitConfig::from_yaml(yaml).is_err());
    }
}

mod validation {
    use super::*;

    fn build_error(yaml: &str) -> String {
        let config = WaitConfig::from_yaml(yaml).unwrap();
        match config.into_strategy() {
            Err(Error::InvalidConfig(message)) => message,
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("plan should be rejected"),
        }
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let message = build_error(
            r#"
strategies:
  - type: log
    message: "(unclosed"
    regex: true
"#,
        );
        assert!(message.starts_with("log strategy"), "{}", message);
    }

    #[test]
    fn invalid_http_method_is_rejected() {
        let message = build_error(
            r#"
strategies:
  - type: http
    method: "NOT A METHOD"
"#,
        );
        assert!(message.starts_with("http strategy"), "{}", message);
    }

    #[test]
    fn udp_http_port_is_rejected() {
        let message = build_error(
            r#"
strategies:
  - type: http
    port: 53/udp
"#,
        );
        assert!(message.contains("not tcp"), "{}", message);
    }

    #[test]
    fn out_of_range_status_is_rejected() {
        let message = build_error(
            r#"
strategies:
  - type: http
    status: 1000
"#,
        );
        assert!(message.starts_with("http strategy"), "{}", message);
    }

    #[test]
    fn empty_exec_command_is_rejected() {
        let message = build_error(
            r#"
strategies:
  - type: exec
    command: []
"#,
        );
        assert_eq!(message, "exec strategy: command must not be empty");
    }

    #[test]
    fn startup_timeout_becomes_default_child_timeout() {
        use container_wait::wait::Strategy;

        let config = WaitConfig::from_yaml(
            r#"
startup_timeout: 5s
strategies:
  - type: exit
"#,
        )
        .unwrap();
        let all = config.into_strategy().unwrap();
        assert_eq!(all.timeout(), Some(Duration::from_secs(5)));
    }
}

mod discovery {
    use super::*;
    use std::fs;

    const PLAN: &str = "strategies:\n  - type: healthy\n";

    #[test]
    fn finds_primary_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), PLAN).unwrap();

        let config = WaitConfig::discover(dir.path()).unwrap();
        assert_eq!(config.strategies.len(), 1);
    }

    #[test]
    fn finds_alternate_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_ALT), PLAN).unwrap();

        assert_eq!(
            WaitConfig::find(dir.path()),
            Some(dir.path().join(CONFIG_FILENAME_ALT))
        );
    }

    #[test]
    fn finds_config_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".container-wait")).unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_DIR), PLAN).unwrap();

        assert!(WaitConfig::discover(dir.path()).is_ok());
    }

    #[test]
    fn primary_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), PLAN).unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME_ALT), "not: [valid").unwrap();

        assert!(WaitConfig::discover(dir.path()).is_ok());
    }

    #[test]
    fn missing_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();

        let err = WaitConfig::discover(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound(_)));
    }
}

mod init {
    use super::*;
    use std::fs;

    #[test]
    fn writes_a_loadable_template() {
        let dir = tempfile::tempdir().unwrap();

        init_config(dir.path(), Some("5432"), false).unwrap();

        let config = WaitConfig::discover(dir.path()).unwrap();
        assert!(matches!(
            config.strategies.first().kind,
            StrategyKind::ListeningPort { port, .. } if port == ContainerPort::tcp(5432)
        ));
        assert!(config.into_strategy().is_ok());
    }

    #[test]
    fn refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "keep me").unwrap();

        let err = init_config(dir.path(), None, false).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert_eq!(
            fs::read_to_string(dir.path().join(CONFIG_FILENAME)).unwrap(),
            "keep me"
        );
    }

    #[test]
    fn force_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "old").unwrap();

        init_config(dir.path(), None, true).unwrap();
        assert!(WaitConfig::discover(dir.path()).is_ok());
    }

    #[test]
    fn invalid_port_is_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let err = init_config(dir.path(), Some("http"), false).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(!dir.path().join(CONFIG_FILENAME).exists());
    }
}
