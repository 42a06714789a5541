use std::env;

const DEV_JWT_SECRET: &str = "development-secret-change-in-production";

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub static_dir: String,
    pub admin: Option<AdminSeed>,
}

/// Administrator account created at startup when it does not exist yet.
#[derive(Clone, Debug)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub username: String,
}

impl Config {
    pub fn from_env() -> Self {
        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using the development secret");
            DEV_JWT_SECRET.to_string()
        });

        let admin = match (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => {
                Some(AdminSeed {
                    email,
                    password,
                    username: env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string()),
                })
            }
            _ => None,
        };

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./data/projectboard.db?mode=rwc".to_string()),
            jwt_secret,
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "./frontend".to_string()),
            admin,
        }
    }
}
