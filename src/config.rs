use crate::events::{EventSink, MemorySink, NullSink, TracingSink};
use anyhow::Context;
use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSinkKind {
    None,
    #[default]
    Tracing,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Participant name used by the top-level caller.
    pub caller_name: String,
    pub event_sink: EventSinkKind,
    /// Release each promise once its value has been read.
    pub release_completed: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            caller_name: "main".to_string(),
            event_sink: EventSinkKind::default(),
            release_completed: false,
        }
    }
}

impl CoordinatorConfig {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let mut cfg: CoordinatorConfig = serde_json::from_str(raw)?;
        cfg.caller_name = expand_env_vars(&cfg.caller_name);
        if cfg.caller_name.trim().is_empty() {
            return Err(anyhow::anyhow!("`caller_name` must not be empty"));
        }
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Build the configured sink. The memory sink is also returned on its
    /// own so the caller can read the log back.
    pub fn build_sink(&self) -> (Arc<dyn EventSink>, Option<MemorySink>) {
        let memory = match self.event_sink {
            EventSinkKind::None => return (Arc::new(NullSink), None),
            EventSinkKind::Tracing => return (Arc::new(TracingSink), None),
            EventSinkKind::Memory => MemorySink::new(),
        };
        let sink: Arc<dyn EventSink> = Arc::new(memory.clone());
        (sink, Some(memory))
    }
}

pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(p) = env::var("COORDINATOR_CONFIG") {
        return Some(PathBuf::from(p));
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let candidate = PathBuf::from(xdg)
            .join("coordinated-await")
            .join("config.json");
        if candidate.exists() {
            return Some(candidate);
        }
    }

    let candidate = PathBuf::from("coordinated-await.json");
    if candidate.exists() {
        return Some(candidate);
    }

    None
}

/// Load from `explicit`, else from the resolved location, else defaults.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<CoordinatorConfig> {
    match explicit.map(Path::to_path_buf).or_else(resolve_config_path) {
        Some(path) => {
            tracing::info!("Loading coordinator config from {}", path.display());
            CoordinatorConfig::from_path(&path)
        }
        None => Ok(CoordinatorConfig::default()),
    }
}

fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next(); // consume '{'
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            if let Ok(val) = env::var(&name) {
                out.push_str(&val);
            } else {
                out.push_str("${");
                out.push_str(&name);
                out.push('}');
            }
        } else {
            out.push(ch);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_fields_missing() {
        let cfg = CoordinatorConfig::from_json("{}").unwrap();
        assert_eq!(cfg.caller_name, "main");
        assert_eq!(cfg.event_sink, EventSinkKind::Tracing);
        assert!(!cfg.release_completed);
    }

    #[test]
    fn parses_all_fields() {
        let cfg = CoordinatorConfig::from_json(
            r#"{ "caller_name": "driver", "event_sink": "memory", "release_completed": true }"#,
        )
        .unwrap();
        assert_eq!(cfg.caller_name, "driver");
        assert_eq!(cfg.event_sink, EventSinkKind::Memory);
        assert!(cfg.release_completed);
    }

    #[test]
    fn rejects_empty_caller_and_unknown_sink() {
        assert!(CoordinatorConfig::from_json(r#"{ "caller_name": "  " }"#).is_err());
        assert!(CoordinatorConfig::from_json(r#"{ "event_sink": "syslog" }"#).is_err());
    }

    #[test]
    fn unset_variables_are_left_verbatim() {
        assert_eq!(
            expand_env_vars("${COORDINATED_AWAIT_SURELY_UNSET_VAR}-x"),
            "${COORDINATED_AWAIT_SURELY_UNSET_VAR}-x"
        );
        assert_eq!(expand_env_vars("plain"), "plain");
    }

    #[test]
    fn memory_sink_is_handed_back() {
        let cfg = CoordinatorConfig {
            event_sink: EventSinkKind::Memory,
            ..Default::default()
        };
        let (_sink, memory) = cfg.build_sink();
        assert!(memory.is_some());

        let (_sink, memory) = CoordinatorConfig::default().build_sink();
        assert!(memory.is_none());
    }

    #[test]
    fn loads_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "caller_name": "from-file", "event_sink": "none" }}"#).unwrap();

        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.caller_name, "from-file");
        assert_eq!(cfg.event_sink, EventSinkKind::None);
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(dir.path().join("absent.json").as_path())).unwrap_err();
        assert!(err.to_string().contains("reading config"));
    }
}
