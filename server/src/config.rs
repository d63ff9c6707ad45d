use anyhow::{Result, anyhow};

use crate::auth::AuthConfig;

const DEV_SECRET: &str = "pipeline-dev-secret-change-me-0123456789";
const MIN_SECRET_LEN: usize = 32;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    /// Reads the environment. Outside `dev` mode `AUTH_SECRET` is required.
    pub fn load(dev: bool) -> Result<Self> {
        let jwt_secret = match std::env::var("AUTH_SECRET") {
            Ok(secret) => secret,
            Err(_) if dev => {
                tracing::warn!("AUTH_SECRET not set; using the development secret");
                DEV_SECRET.to_string()
            }
            Err(_) => return Err(anyhow!("AUTH_SECRET missing (pass --dev for a local secret)")),
        };
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(anyhow!(
                "AUTH_SECRET must be at least {MIN_SECRET_LEN} bytes"
            ));
        }
        let session_ttl_minutes = std::env::var("SESSION_TTL_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|minutes| *minutes > 0)
            .unwrap_or(60);

        let cors_allowed_origins = parse_origins(
            &std::env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        Ok(Self {
            auth: AuthConfig {
                jwt_secret,
                session_ttl_minutes,
            },
            cors_allowed_origins,
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_skip_blanks() {
        assert_eq!(
            parse_origins(" http://a.test ,, http://b.test"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert!(parse_origins("").is_empty());
    }
}
