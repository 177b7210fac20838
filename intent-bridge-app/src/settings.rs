//! Persistent application settings (JSON file in app data directory).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use intent_bridge_core::{
    config::{KEY_ENV, REGION_ENV},
    BridgeConfig, ConfigError,
};
use serde::{Deserialize, Serialize};

use crate::commands::normalize_utterance;

pub const DEFAULT_LOG_FILTER: &str = "intent_bridge=info,intent_bridge_core=info";

const MAX_INTENTS: usize = 256;
const MAX_PHRASES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentSetting {
    pub phrase: String,
    pub intent_id: String,
}

impl IntentSetting {
    fn new(phrase: &str, intent_id: &str) -> Self {
        Self {
            phrase: phrase.into(),
            intent_id: intent_id.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub key: Option<String>,
    pub region: Option<String>,
    pub intents: Vec<IntentSetting>,
    pub phrases: Vec<String>,
    /// Exact utterance → command id.
    pub commands: BTreeMap<String, String>,
    pub log_filter: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            key: None,
            region: None,
            intents: vec![
                IntentSetting::new("Create new file {fileName}", "Voice.CreateFile"),
                IntentSetting::new("Add {numNewLines} new line", "Voice.InsertNewLine"),
                IntentSetting::new("Add {numNewLines} new lines", "Voice.InsertNewLine"),
                IntentSetting::new("Toggle break point line {breakpointLine}", "Voice.Debugging"),
                IntentSetting::new("Toggle breakpoint line {breakpointLine}", "Voice.Debugging"),
                IntentSetting::new(
                    "Toggle break point on line {breakpointLine}",
                    "Voice.Debugging",
                ),
                IntentSetting::new(
                    "Toggle breakpoint on line {breakpointLine}",
                    "Voice.Debugging",
                ),
                IntentSetting::new("Insert text {textInsertion}", "Voice.InsertText"),
                IntentSetting::new("Insert comment {textInsertion}", "Voice.InsertComment"),
                IntentSetting::new("{terminalPhrase} in terminal", "Voice.Terminal"),
                IntentSetting::new("Move cursor to line {lineNumber}", "Voice.Positioning"),
                IntentSetting::new("Go to line {lineNumber}", "Voice.Positioning"),
                IntentSetting::new("Show message {dialogText}", "Voice.Dialog"),
            ],
            phrases: vec!["on line".into()],
            commands: [
                ("breakpoint", "editor.debug.action.toggleBreakpoint"),
                ("close editor", "workbench.action.closeActiveEditor"),
                ("comment", "editor.action.commentLine"),
                ("copy", "editor.action.clipboardCopyAction"),
                ("delete line", "editor.action.deleteLines"),
                ("format document", "editor.action.formatDocument"),
                ("go to definition", "editor.action.revealDefinition"),
                ("open terminal", "workbench.action.terminal.focus"),
                ("paste", "editor.action.clipboardPasteAction"),
                ("redo", "redo"),
                ("start debugging", "workbench.action.debug.start"),
                ("step over", "workbench.action.debug.stepOver"),
                ("toggle sidebar", "workbench.action.toggleSidebarVisibility"),
                ("undo", "undo"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
            log_filter: DEFAULT_LOG_FILTER.into(),
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.key = normalize_optional(self.key.take());
        self.region = normalize_optional(self.region.take());
        self.intents = normalize_intents(&self.intents);
        self.phrases = normalize_phrases(&self.phrases);
        self.commands = normalize_commands(&self.commands);
        self.log_filter = self.log_filter.trim().to_string();
        if self.log_filter.is_empty() {
            self.log_filter = DEFAULT_LOG_FILTER.into();
        }
    }

    /// Credentials for the bridge. `SUBSCRIPTION_KEY` / `REGION` win over the file.
    pub fn bridge_config(&self) -> Result<BridgeConfig, ConfigError> {
        self.bridge_config_with(|name| std::env::var(name).ok())
    }

    fn bridge_config_with<F>(&self, env: F) -> Result<BridgeConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // A variable that is set but blank counts as unset.
        let lookup = |name: &str| env(name).filter(|v: &String| !v.trim().is_empty());
        let key = lookup(KEY_ENV)
            .or_else(|| self.key.clone())
            .ok_or(ConfigError::MissingKey)?;
        let region = lookup(REGION_ENV)
            .or_else(|| self.region.clone())
            .ok_or(ConfigError::MissingRegion)?;
        BridgeConfig::new(key, region)
    }
}

fn normalize_optional(raw: Option<String>) -> Option<String> {
    raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn normalize_intents(raw: &[IntentSetting]) -> Vec<IntentSetting> {
    let mut out: Vec<IntentSetting> = Vec::new();
    for intent in raw {
        let phrase = intent.phrase.trim();
        let intent_id = intent.intent_id.trim();
        if phrase.is_empty() || intent_id.is_empty() {
            continue;
        }
        let candidate = IntentSetting::new(phrase, intent_id);
        if out.contains(&candidate) {
            continue;
        }
        out.push(candidate);
        if out.len() >= MAX_INTENTS {
            break;
        }
    }
    out
}

fn normalize_phrases(raw: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for phrase in raw {
        let normalized = phrase.trim();
        if normalized.is_empty() {
            continue;
        }
        if out.iter().any(|p: &String| p.eq_ignore_ascii_case(normalized)) {
            continue;
        }
        out.push(normalized.to_string());
        if out.len() >= MAX_PHRASES {
            break;
        }
    }
    out
}

fn normalize_commands(raw: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    raw.iter()
        .filter_map(|(utterance, command)| {
            let utterance = normalize_utterance(utterance);
            let command = command.trim();
            (!utterance.is_empty() && !command.is_empty())
                .then(|| (utterance, command.to_string()))
        })
        .collect()
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Lattice Labs")
            .join("IntentBridge")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("intent-bridge")
            .join("settings.json")
    }
}

pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<AppSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(&dir.path().join("absent.json"));
        assert_eq!(settings.phrases, vec!["on line".to_string()]);
        assert_eq!(settings.log_filter, DEFAULT_LOG_FILTER);
        assert!(settings.key.is_none());
    }

    #[test]
    fn invalid_json_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_settings(&path).commands, AppSettings::default().commands);
    }

    #[test]
    fn save_then_load_keeps_user_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut settings = AppSettings {
            key: Some("abc".into()),
            region: Some("westus".into()),
            ..AppSettings::default()
        };
        settings
            .commands
            .insert("save all".into(), "workbench.action.files.saveAll".into());

        save_settings(&path, &settings).unwrap();
        let loaded = load_settings(&path);

        assert_eq!(loaded.key.as_deref(), Some("abc"));
        assert_eq!(loaded.region.as_deref(), Some("westus"));
        assert_eq!(
            loaded.commands.get("save all").map(String::as_str),
            Some("workbench.action.files.saveAll")
        );
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "region": "eastus", "logFilter": "  " }"#).unwrap();

        let settings = load_settings(&path);
        assert_eq!(settings.region.as_deref(), Some("eastus"));
        assert_eq!(settings.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(settings.intents, AppSettings::default().intents);
    }

    #[test]
    fn normalize_trims_and_deduplicates() {
        let mut settings = AppSettings {
            key: Some("   ".into()),
            region: Some(" westus ".into()),
            intents: vec![
                IntentSetting::new(" Go to line {n} ", "Voice.Positioning"),
                IntentSetting::new("Go to line {n}", " Voice.Positioning "),
                IntentSetting::new("", "Voice.Empty"),
            ],
            phrases: vec!["on line".into(), "On Line".into(), " ".into()],
            commands: BTreeMap::from([
                ("Format Document.".to_string(), " editor.action.formatDocument ".to_string()),
                ("noop".to_string(), "".to_string()),
            ]),
            log_filter: "debug".into(),
        };
        settings.normalize();

        assert!(settings.key.is_none());
        assert_eq!(settings.region.as_deref(), Some("westus"));
        assert_eq!(settings.intents.len(), 1);
        assert_eq!(settings.phrases, vec!["on line".to_string()]);
        assert_eq!(
            settings.commands,
            BTreeMap::from([(
                "format document".to_string(),
                "editor.action.formatDocument".to_string()
            )])
        );
        assert_eq!(settings.log_filter, "debug");
    }

    #[test]
    fn environment_overrides_file_credentials() {
        let settings = AppSettings {
            key: Some("file-key".into()),
            region: Some("westus".into()),
            ..AppSettings::default()
        };

        let config = settings
            .bridge_config_with(|name| (name == KEY_ENV).then(|| "env-key".to_string()))
            .unwrap();
        assert_eq!(config.key(), "env-key");
        assert_eq!(config.region(), "westus");
    }

    #[test]
    fn blank_environment_values_fall_back_to_the_file() {
        let settings = AppSettings {
            key: Some("file-key".into()),
            region: Some("westus".into()),
            ..AppSettings::default()
        };

        let config = settings
            .bridge_config_with(|name| match name {
                KEY_ENV => Some(String::new()),
                _ => Some("   ".to_string()),
            })
            .unwrap();
        assert_eq!(config.key(), "file-key");
        assert_eq!(config.region(), "westus");
    }

    #[test]
    fn default_intents_cover_spoken_variants() {
        let settings = AppSettings::default();
        let phrases: Vec<&str> = settings
            .intents
            .iter()
            .map(|i| i.phrase.as_str())
            .collect();
        for expected in [
            "Add {numNewLines} new line",
            "Move cursor to line {lineNumber}",
            "Toggle break point line {breakpointLine}",
            "Toggle breakpoint line {breakpointLine}",
            "Toggle break point on line {breakpointLine}",
        ] {
            assert!(phrases.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn missing_credentials_are_reported() {
        let settings = AppSettings::default();
        assert_eq!(
            settings.bridge_config_with(|_| None).unwrap_err(),
            ConfigError::MissingKey
        );

        let settings = AppSettings {
            key: Some("abc".into()),
            ..AppSettings::default()
        };
        assert_eq!(
            settings.bridge_config_with(|_| None).unwrap_err(),
            ConfigError::MissingRegion
        );
    }
}
