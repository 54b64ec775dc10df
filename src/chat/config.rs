//! Configuration types for the chat application.
//!
//! Settings come from three layers: built-in defaults, an optional YAML file,
//! and command-line arguments parsed via `arrrg`.  Later layers win.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::Deserialize;

use crate::entitlement;
use crate::error::{Error, Result};
use crate::types::{Model, UserTier};

/// The instruction sent with every conversation unless overridden.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are LexaAI, an advanced conversational assistant.
The application you are in provides the following context:
- A consultable conversation history is available to you to maintain context.
- The application has management features in a navigation menu, such as language settings and logout.
- Your capabilities and the model you use might differ based on the user's tier (Guest, Free, or PRO).
Your responses should be helpful, clear, and engaging.";

/// Command-line arguments for the lexa-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// YAML configuration file.
    #[arrrg(optional, "Read settings from this YAML file", "PATH")]
    pub config: Option<String>,

    /// Directory for the stored user and saved chat.
    #[arrrg(optional, "Store state here (default: $LEXA_HOME or ~/.lexa)", "DIR")]
    pub store_dir: Option<String>,

    /// Keep all state in memory.
    #[arrrg(flag, "Do not read or write any state on disk")]
    pub ephemeral: bool,

    /// Model to use for every tier.
    #[arrrg(optional, "Model to use regardless of tier", "MODEL")]
    pub model: Option<String>,

    /// System instruction for the conversation.
    #[arrrg(optional, "System instruction for the conversation", "PROMPT")]
    pub system: Option<String>,

    /// Base URL of the model API.
    #[arrrg(optional, "Model API base URL", "URL")]
    pub base_url: Option<String>,

    /// Request timeout in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: 300)", "SECS")]
    pub timeout_secs: Option<u64>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// The YAML configuration file.
///
/// ```yaml
/// system_instruction: "You are terse."
/// pro_model: gemini-2.5-pro
/// standard_model: gemini-2.5-flash-lite
/// store_dir: /var/lib/lexa
/// timeout_secs: 120
/// color: false
/// ```
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Overrides the default system instruction.
    #[serde(default)]
    pub system_instruction: Option<String>,
    /// Model used for every tier.
    #[serde(default)]
    pub model: Option<Model>,
    /// Model used for PRO users.
    #[serde(default)]
    pub pro_model: Option<Model>,
    /// Model used for everyone else.
    #[serde(default)]
    pub standard_model: Option<Model>,
    /// Directory for stored state.
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
    /// Keep all state in memory.
    #[serde(default)]
    pub ephemeral: Option<bool>,
    /// Model API base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Whether to use ANSI colors.
    #[serde(default)]
    pub color: Option<bool>,
}

impl ConfigFile {
    /// Parse a configuration file from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|err| {
            Error::serialization("failed to parse configuration", Some(Box::new(err)))
        })
    }

    /// Read and parse a configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|err| Error::io(format!("failed to read {}", path.display()), err))?;
        Self::from_yaml(&yaml)
    }
}

/// Configuration for a chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Instruction sent with every request; `None` sends none.
    pub system_instruction: Option<String>,

    /// When set, used for every tier.
    pub model_override: Option<Model>,

    /// Model for PRO users.
    pub pro_model: Model,

    /// Model for GUEST and FREE users.
    pub standard_model: Model,

    /// Where state lives on disk; `None` uses the default location.
    pub store_dir: Option<PathBuf>,

    /// Keep all state in memory.
    pub ephemeral: bool,

    /// Model API base URL; `None` uses the client default.
    pub base_url: Option<String>,

    /// Request timeout; `None` uses the client default.
    pub timeout: Option<Duration>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - System instruction: the LexaAI assistant instruction
    /// - Models: gemini-2.5-pro for PRO, gemini-2.5-flash otherwise
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            system_instruction: Some(DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            model_override: None,
            pro_model: entitlement::model_for(UserTier::Pro),
            standard_model: entitlement::model_for(UserTier::Free),
            store_dir: None,
            ephemeral: false,
            base_url: None,
            timeout: None,
            use_color: true,
        }
    }

    /// Resolve defaults, then the file named by `--config`, then the arguments.
    pub fn load(args: ChatArgs) -> Result<Self> {
        let config = match &args.config {
            Some(path) => Self::new().with_file(ConfigFile::from_path(path)?),
            None => Self::new(),
        };
        config.with_args(args)
    }

    /// The model to ask on behalf of a user on `tier`.
    pub fn model_for(&self, tier: UserTier) -> Model {
        if let Some(model) = &self.model_override {
            return model.clone();
        }
        match tier {
            UserTier::Pro => self.pro_model.clone(),
            UserTier::Guest | UserTier::Free => self.standard_model.clone(),
        }
    }

    /// The directory for stored state.
    ///
    /// Falls back to `$LEXA_HOME`, then `$HOME/.lexa`.
    pub fn resolved_store_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.store_dir {
            return Some(dir.clone());
        }
        if let Ok(home) = env::var("LEXA_HOME")
            && !home.is_empty()
        {
            return Some(PathBuf::from(home));
        }
        env::var("HOME")
            .ok()
            .filter(|home| !home.is_empty())
            .map(|home| PathBuf::from(home).join(".lexa"))
    }

    /// Applies every setting present in a configuration file.
    pub fn with_file(mut self, file: ConfigFile) -> Self {
        if let Some(instruction) = file.system_instruction {
            self.system_instruction = Some(instruction);
        }
        if let Some(model) = file.model {
            self.model_override = Some(model);
        }
        if let Some(model) = file.pro_model {
            self.pro_model = model;
        }
        if let Some(model) = file.standard_model {
            self.standard_model = model;
        }
        if let Some(dir) = file.store_dir {
            self.store_dir = Some(dir);
        }
        if let Some(ephemeral) = file.ephemeral {
            self.ephemeral = ephemeral;
        }
        if let Some(url) = file.base_url {
            self.base_url = Some(url);
        }
        if let Some(secs) = file.timeout_secs {
            self.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(color) = file.color {
            self.use_color = color;
        }
        self
    }

    /// Applies every setting present on the command line.
    pub fn with_args(mut self, args: ChatArgs) -> Result<Self> {
        if let Some(model) = args.model {
            let model = model
                .parse::<Model>()
                .map_err(|err| Error::validation(err, Some("model".to_string())))?;
            self.model_override = Some(model);
        }
        if let Some(system) = args.system {
            self.system_instruction = Some(system);
        }
        if let Some(dir) = args.store_dir {
            self.store_dir = Some(PathBuf::from(dir));
        }
        if args.ephemeral {
            self.ephemeral = true;
        }
        if let Some(url) = args.base_url {
            self.base_url = Some(url);
        }
        if let Some(secs) = args.timeout_secs {
            self.timeout = Some(Duration::from_secs(secs));
        }
        if args.no_color {
            self.use_color = false;
        }
        Ok(self)
    }

    /// Sets the model used for every tier.
    pub fn with_model(mut self, model: Model) -> Self {
        self.model_override = Some(model);
        self
    }

    /// Sets the system instruction.
    pub fn with_system_instruction(mut self, instruction: Option<String>) -> Self {
        self.system_instruction = instruction;
        self
    }

    /// Sets the store directory.
    pub fn with_store_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.store_dir = Some(dir.into());
        self
    }

    /// Keeps all state in memory.
    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KnownModel;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(
            config.system_instruction.as_deref(),
            Some(DEFAULT_SYSTEM_INSTRUCTION)
        );
        assert_eq!(
            config.model_for(UserTier::Pro),
            Model::Known(KnownModel::Gemini25Pro)
        );
        assert_eq!(
            config.model_for(UserTier::Free),
            Model::Known(KnownModel::Gemini25Flash)
        );
        assert_eq!(
            config.model_for(UserTier::Guest),
            Model::Known(KnownModel::Gemini25Flash)
        );
        assert!(config.use_color);
        assert!(!config.ephemeral);
        assert!(config.timeout.is_none());
    }

    #[test]
    fn config_from_args() {
        let args = ChatArgs {
            model: Some("gemini-2.5-flash-lite".to_string()),
            system: Some("Be terse.".to_string()),
            store_dir: Some("/tmp/lexa".to_string()),
            ephemeral: true,
            timeout_secs: Some(10),
            no_color: true,
            ..ChatArgs::default()
        };
        let config = ChatConfig::load(args).unwrap();
        assert_eq!(
            config.model_for(UserTier::Pro),
            Model::Known(KnownModel::Gemini25FlashLite)
        );
        assert_eq!(config.system_instruction.as_deref(), Some("Be terse."));
        assert_eq!(config.store_dir, Some(PathBuf::from("/tmp/lexa")));
        assert_eq!(config.resolved_store_dir(), Some(PathBuf::from("/tmp/lexa")));
        assert!(config.ephemeral);
        assert_eq!(config.timeout, Some(Duration::from_secs(10)));
        assert!(!config.use_color);
    }

    #[test]
    fn empty_model_is_rejected() {
        let args = ChatArgs {
            model: Some("  ".to_string()),
            ..ChatArgs::default()
        };
        assert!(ChatConfig::load(args).unwrap_err().is_validation());
    }

    #[test]
    fn file_then_args() {
        let file = ConfigFile::from_yaml(
            "system_instruction: From the file.\npro_model: gemini-exp\nstandard_model: gemini-2.5-flash-lite\ntimeout_secs: 30\ncolor: false\n",
        )
        .unwrap();
        let config = ChatConfig::new()
            .with_file(file)
            .with_args(ChatArgs {
                timeout_secs: Some(5),
                ..ChatArgs::default()
            })
            .unwrap();
        assert_eq!(config.system_instruction.as_deref(), Some("From the file."));
        assert_eq!(
            config.model_for(UserTier::Pro),
            Model::Custom("gemini-exp".to_string())
        );
        assert_eq!(
            config.model_for(UserTier::Free),
            Model::Known(KnownModel::Gemini25FlashLite)
        );
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert!(!config.use_color);
    }

    #[test]
    fn config_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexa.yaml");
        std::fs::write(&path, "model: gemini-2.5-pro\nephemeral: true\n").unwrap();
        let config = ChatConfig::load(ChatArgs {
            config: Some(path.display().to_string()),
            ..ChatArgs::default()
        })
        .unwrap();
        assert_eq!(
            config.model_for(UserTier::Guest),
            Model::Known(KnownModel::Gemini25Pro)
        );
        assert!(config.ephemeral);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ConfigFile::from_yaml("colour: true\n").is_err());
        assert!(ChatConfig::load(ChatArgs {
            config: Some("/nonexistent/lexa.yaml".to_string()),
            ..ChatArgs::default()
        })
        .unwrap_err()
        .is_persistence());
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_model(Model::Known(KnownModel::Gemini25FlashLite))
            .with_system_instruction(None)
            .with_store_dir("/srv/lexa")
            .ephemeral()
            .without_color();
        assert_eq!(
            config.model_for(UserTier::Pro),
            Model::Known(KnownModel::Gemini25FlashLite)
        );
        assert!(config.system_instruction.is_none());
        assert_eq!(config.store_dir, Some(PathBuf::from("/srv/lexa")));
        assert!(config.ephemeral);
        assert!(!config.use_color);
    }
}
