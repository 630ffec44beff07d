use std::{collections::HashMap, fs};

/// Runtime settings for the operator console. Defaults are overridden by an
/// optional `admin.toml` next to the binary, then by environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server_url: String,
    pub asset_base_url: String,
    pub fallback_image: String,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".into(),
            asset_base_url: "http://127.0.0.1:5000".into(),
            fallback_image: "/E-bazar.png".into(),
            email: None,
            password: None,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("admin.toml") {
        apply_file_overrides(&mut settings, &raw);
    }

    if let Ok(v) = std::env::var("ADMIN_SERVER_URL") {
        settings.server_url = v;
    }
    if let Ok(v) = std::env::var("ADMIN_ASSET_BASE_URL") {
        settings.asset_base_url = v;
    }
    if let Ok(v) = std::env::var("ADMIN_FALLBACK_IMAGE") {
        settings.fallback_image = v;
    }
    if let Ok(v) = std::env::var("ADMIN_EMAIL") {
        settings.email = Some(v);
    }
    if let Ok(v) = std::env::var("ADMIN_PASSWORD") {
        settings.password = Some(v);
    }

    settings
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(raw) else {
        return;
    };
    if let Some(v) = file_cfg.get("server_url") {
        settings.server_url = v.clone();
    }
    if let Some(v) = file_cfg.get("asset_base_url") {
        settings.asset_base_url = v.clone();
    }
    if let Some(v) = file_cfg.get("fallback_image") {
        settings.fallback_image = v.clone();
    }
    if let Some(v) = file_cfg.get("email") {
        settings.email = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("password") {
        settings.password = Some(v.clone());
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
