use std::{path::PathBuf, time::Duration};

use resolve_path::PathResolveExt;
use serde::{Deserialize, Serialize};

use crate::sale::DefaultPrices;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// Адрес бэкенда инвентаря.
    pub base_url: String,

    /// Путь до файла с сессией.
    pub session_path: PathBuf,

    /// Куда сохранять скачанные акты.
    pub download_dir: PathBuf,

    /// Таймаут запросов в секундах.
    pub timeout_secs: u64,

    /// Цены по-умолчанию для продажи оборудования.
    pub default_prices: DefaultPrices,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_owned(),
            session_path: PathBuf::from("./session.json"),
            download_dir: PathBuf::from("."),
            timeout_secs: 30,
            default_prices: DefaultPrices::default(),
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Загружает конфигурацию.
/// Если файла нет, confy создаст его со значениями по-умолчанию.
pub fn load(path: PathBuf) -> anyhow::Result<Config> {
    let mut cfg: Config = confy::load_path(path)?;

    normalize(&mut cfg)?;

    Ok(cfg)
}

pub fn normalize(cfg: &mut Config) -> anyhow::Result<()> {
    // Чтобы правильно обработать относительные пути.
    cfg.session_path = cfg.session_path.try_resolve()?.into_owned();
    cfg.download_dir = cfg.download_dir.try_resolve()?.into_owned();

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "base_url = \"https://inventario.example\"\n\n[default_prices]\nlaptop = 350\n",
        )
        .unwrap();

        let cfg = load(path).unwrap();

        assert_eq!(cfg.base_url, "https://inventario.example");
        assert_eq!(cfg.timeout(), Duration::from_secs(30));
        assert_eq!(cfg.default_prices.laptop, 350);
        assert_eq!(cfg.default_prices.monitor, 50);
        assert!(cfg.session_path.is_absolute());
    }
}
