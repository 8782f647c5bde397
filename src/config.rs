use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use dotenvy::dotenv;
use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::fs;
use url::Url;

pub const KEYRING_SERVICE: &str = "buc-api-key";
pub const KEYRING_USER: &str = "Buchat";

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    pub buchat_base_url: Option<Url>,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigEnv {
    buchat_base_url: Option<Url>,
    buchat_api_key: Option<String>,
}

pub struct Config {
    pub buchat_base_url: Url,
    pub buchat_api_key: String,
}

fn merge_config(base: ConfigFile, override_config: ConfigEnv) -> Result<Config> {
    let buchat_base_url = override_config
        .buchat_base_url
        .or(base.buchat_base_url)
        .ok_or(anyhow!("No Buchat base URL provided"))?;

    let buchat_api_key = if let Some(api_key) = override_config.buchat_api_key {
        api_key
    } else {
        let entry = Entry::new(KEYRING_SERVICE, KEYRING_USER)?;
        let api_key = entry
            .get_secret()
            .context("API key not specified via environment variable nor present in OS keyring")?;
        String::from_utf8(api_key)?
    };

    Ok(Config {
        buchat_base_url,
        buchat_api_key,
    })
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("app", "buchat", "buc").ok_or(anyhow!("Unable to determine home directory"))
}

pub fn read_config() -> Result<Config> {
    let _ = dotenv();
    let env_config = envy::from_env::<ConfigEnv>().unwrap_or_default();

    let config_file = project_dirs()?.config_dir().join("config.toml");
    let file_config = if let Ok(config) = fs::read_to_string(config_file) {
        toml::from_str(&config)?
    } else {
        ConfigFile::default()
    };

    merge_config(file_config, env_config)
}

pub fn write_config(config: ConfigFile) -> Result<()> {
    let config_dir = project_dirs()?.config_dir().to_path_buf();
    fs::create_dir_all(&config_dir)?;
    fs::write(
        config_dir.join("config.toml"),
        toml::to_string_pretty(&config)?,
    )?;
    Ok(())
}

pub fn set_api_key_keyring(api_key: String) -> Result<()> {
    let entry = Entry::new(KEYRING_SERVICE, KEYRING_USER)?;
    entry.set_secret(api_key.as_bytes())?;
    println!("API key set for use with buc");
    Ok(())
}
