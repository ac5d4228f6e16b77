use std::str::FromStr;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that must not sign hosted sessions.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your-super-secret-jwt-token-with-at-least-32-characters-long",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// In-memory backend, seeded contacts and one local operator account.
    Demo,
    /// REST data API, realtime channel and hosted auth service.
    Hosted,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "demo" => Ok(Mode::Demo),
            "hosted" => Ok(Mode::Hosted),
            other => bail!("INBOX_MODE must be `demo` or `hosted`, got `{}`", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Hosted {
    pub backend_url: String,
    pub backend_key: String,
}

#[derive(Debug, Clone)]
pub struct Demo {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub mode: Mode,
    pub jwt_secret: String,
    pub secure_cookies: bool,
    pub hosted: Option<Hosted>,
    pub demo: Option<Demo>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = var("INBOX_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("INBOX_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("INBOX_PORT is not a port number")?;
        let mode: Mode = var("INBOX_MODE").unwrap_or_else(|| "demo".into()).parse()?;

        let secure_cookies = match var("INBOX_SECURE_COOKIES") {
            Some(v) => parse_flag(&v).context("INBOX_SECURE_COOKIES must be true or false")?,
            None => mode == Mode::Hosted,
        };

        match mode {
            Mode::Hosted => {
                let backend_url = var("INBOX_BACKEND_URL").context("INBOX_BACKEND_URL is required in hosted mode")?;
                let backend_key = var("INBOX_BACKEND_KEY").context("INBOX_BACKEND_KEY is required in hosted mode")?;
                let jwt_secret = var("INBOX_JWT_SECRET").unwrap_or_default();
                if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
                    bail!("INBOX_JWT_SECRET is unset or still a placeholder; it must match the auth service's signing secret");
                }

                Ok(Config {
                    host,
                    port,
                    mode,
                    jwt_secret,
                    secure_cookies,
                    hosted: Some(Hosted {
                        backend_url: backend_url.trim_end_matches('/').to_string(),
                        backend_key,
                    }),
                    demo: None,
                })
            }
            Mode::Demo => {
                let email = var("INBOX_DEMO_EMAIL").unwrap_or_else(|| "founder@example.com".into());
                let password = var("INBOX_DEMO_PASSWORD").context("INBOX_DEMO_PASSWORD is required in demo mode")?;
                // Demo sessions do not need to outlive the process.
                let jwt_secret = var("INBOX_JWT_SECRET").unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

                Ok(Config {
                    host,
                    port,
                    mode,
                    jwt_secret,
                    secure_cookies,
                    hosted: None,
                    demo: Some(Demo { email, password }),
                })
            }
        }
    }
}

fn parse_flag(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("not a flag: {}", other),
    }
}
