use anyhow::Context;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const LOG_ENV: &str = "TALENT_LOG";
pub const DEFAULT_LOG_FILTER: &str = "talent_signal_aggregator=info";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;
        let max_connections = parse_max_connections(
            std::env::var("TALENT_DB_MAX_CONNECTIONS").ok().as_deref(),
        )?;
        Ok(Self {
            database_url,
            max_connections,
        })
    }
}

fn parse_max_connections(value: Option<&str>) -> anyhow::Result<u32> {
    match value.map(str::trim) {
        None | Some("") => Ok(DEFAULT_MAX_CONNECTIONS),
        Some(raw) => {
            let parsed: u32 = raw
                .parse()
                .with_context(|| format!("TALENT_DB_MAX_CONNECTIONS is not a number: {raw}"))?;
            anyhow::ensure!(parsed > 0, "TALENT_DB_MAX_CONNECTIONS must be positive");
            Ok(parsed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_connections_defaults_and_validates() {
        assert_eq!(parse_max_connections(None).unwrap(), DEFAULT_MAX_CONNECTIONS);
        assert_eq!(parse_max_connections(Some(" ")).unwrap(), DEFAULT_MAX_CONNECTIONS);
        assert_eq!(parse_max_connections(Some("12")).unwrap(), 12);
        assert!(parse_max_connections(Some("0")).is_err());
        assert!(parse_max_connections(Some("many")).is_err());
    }
}
