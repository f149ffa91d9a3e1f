use std::{collections::HashMap, fs};

use client_core::DEFAULT_UPLOAD_PATH;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server_url: String,
    pub upload_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".into(),
            upload_path: DEFAULT_UPLOAD_PATH.into(),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("client.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            apply_file_config(&mut settings, &file_cfg);
        }
    }

    if let Ok(v) = std::env::var("SERVER_URL") {
        settings.server_url = v;
    }
    if let Ok(v) = std::env::var("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Ok(v) = std::env::var("UPLOAD_PATH") {
        settings.upload_path = v;
    }
    if let Ok(v) = std::env::var("APP__UPLOAD_PATH") {
        settings.upload_path = v;
    }

    settings
}

fn apply_file_config(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("server_url") {
        settings.server_url = v.clone();
    }
    if let Some(v) = file_cfg.get("upload_path") {
        settings.upload_path = v.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_local_development() {
        let settings = Settings::default();
        assert_eq!(settings.server_url, "http://127.0.0.1:8000");
        assert_eq!(settings.upload_path, "/api/upload");
    }

    #[test]
    fn file_values_override_defaults() {
        let mut settings = Settings::default();
        let mut file_cfg = HashMap::new();
        file_cfg.insert(
            "server_url".to_string(),
            "https://qa.example.net".to_string(),
        );
        apply_file_config(&mut settings, &file_cfg);

        assert_eq!(settings.server_url, "https://qa.example.net");
        assert_eq!(settings.upload_path, "/api/upload");
    }

    #[test]
    fn unknown_file_keys_are_ignored() {
        let mut settings = Settings::default();
        let mut file_cfg = HashMap::new();
        file_cfg.insert("server_bind".to_string(), "0.0.0.0:9".to_string());
        apply_file_config(&mut settings, &file_cfg);

        assert_eq!(settings.server_url, "http://127.0.0.1:8000");
    }
}
