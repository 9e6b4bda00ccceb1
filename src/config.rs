use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub nats_url: Option<String>,
    pub storefront: StorefrontConfig,
    pub regenerate_debounce: Duration,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base used to build public image URLs.
    pub public_url: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    pub name: String,
    pub currency: String,
    pub whatsapp_number: Option<String>,
    pub delivery_fee: Decimal,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8083, public_url: "http://localhost:8083".to_string() }
    }
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self { name: "OpenSASE Store".to_string(), currency: "BRL".to_string(), whatsapp_number: None, delivery_fee: Decimal::ZERO }
    }
}

impl AppConfig {
    /// Load configuration from environment variables (call `dotenvy::dotenv()` first to pick up `.env`).
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let server_defaults = ServerConfig::default();
        let store_defaults = StorefrontConfig::default();
        let port = parse_or(&get, "PORT", server_defaults.port)?;
        let public_url = get("PUBLIC_URL").unwrap_or_else(|| format!("http://localhost:{port}"));

        Ok(Self {
            server: ServerConfig {
                host: get("HOST").unwrap_or(server_defaults.host),
                port,
                public_url: public_url.trim_end_matches('/').to_string(),
            },
            database: DatabaseConfig {
                url: get("DATABASE_URL").ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?,
                max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            },
            nats_url: get("NATS_URL").filter(|u| !u.is_empty()),
            storefront: StorefrontConfig {
                name: get("STORE_NAME").unwrap_or(store_defaults.name),
                currency: get("CURRENCY").unwrap_or(store_defaults.currency).to_uppercase(),
                whatsapp_number: get("WHATSAPP_NUMBER").filter(|n| !n.is_empty()),
                delivery_fee: parse_or(&get, "DELIVERY_FEE", store_defaults.delivery_fee)?,
            },
            regenerate_debounce: Duration::from_millis(parse_or(&get, "REGENERATE_DEBOUNCE_MS", 150)?),
        })
    }

    /// Get the server bind address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e| anyhow::anyhow!("{key}: {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/catalog")])).unwrap();
        assert_eq!(config.server_address(), "0.0.0.0:8083");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.regenerate_debounce, Duration::from_millis(150));
        assert_eq!(config.storefront.currency, "BRL");
        assert!(config.nats_url.is_none());
    }

    #[test]
    fn test_overrides_and_errors() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/catalog"), ("PORT", "9000"), ("DELIVERY_FEE", "7.50"),
            ("PUBLIC_URL", "https://shop.example/"), ("WHATSAPP_NUMBER", "5581999990000"),
        ])).unwrap();
        assert_eq!(config.server.public_url, "https://shop.example");
        assert_eq!(config.storefront.delivery_fee, Decimal::new(750, 2));
        assert!(AppConfig::from_lookup(lookup(&[])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("DATABASE_URL", "x"), ("PORT", "eighty")])).is_err());
    }
}
