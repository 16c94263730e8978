use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub copy: CopyConfig,
    pub notify: NotifyConfig,
}

/// バックアップ時のコピー挙動を表す設定。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CopyConfig {
    /// シンボリックリンクを辿らず、リンク自体を再作成する
    pub preserve_symlinks: bool,
    /// コピー元の更新日時・アクセス日時を引き継ぐ
    pub preserve_timestamps: bool,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            preserve_symlinks: false,
            preserve_timestamps: true,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifyConfig {
    pub macos_notify: bool,
}

impl Config {
    /// 設定ファイルを読み込む。
    ///
    /// # 判定ルール
    /// 1. `FOLDERBAK_CONFIG_PATH` が指定されていればそのパスを使用
    /// 2. それ以外は `~/.config/folderbak/config.toml` を使用
    /// 3. 設定ファイルが存在しない場合は作成せず、デフォルト設定を返す
    pub fn load() -> Result<Self, String> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            log::debug!(
                "no config file at '{}', using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// 指定パスの設定ファイルを読み込み、パースする。
    pub fn load_from(config_path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(config_path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))?;

        log::debug!("loaded config from '{}'", config_path.display());
        Ok(config)
    }

    /// Determines the path to the configuration file.
    ///
    /// # Priority
    /// 1. FOLDERBAK_CONFIG_PATH environment variable (for testing and custom setups)
    /// 2. ~/.config/folderbak/config.toml (default location)
    fn config_path() -> Result<PathBuf, String> {
        if let Ok(path) = std::env::var("FOLDERBAK_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let home_dir =
            dirs::home_dir().ok_or_else(|| "Could not determine home directory".to_string())?;

        Ok(home_dir.join(".config").join("folderbak").join("config.toml"))
    }
}
