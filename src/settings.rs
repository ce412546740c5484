use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
    pub public_url: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WhatsApp {
    pub api_url: String,
    pub access_token: String,
    pub phone_number_id: String,
    pub verify_token: String,
    pub simulation: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Renderer {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Sessions {
    pub ttl_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub postgres: Postgres,
    pub server: Server,
    pub whatsapp: WhatsApp,
    pub renderer: Renderer,
    pub sessions: Sessions,
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("RECIBOLEGAL").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
