use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct IntegratorConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub dynamodb: DynamoConfig,
    pub cognito: CognitoConfig,
    pub s3: S3Config,
    pub aws: AwsConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DynamoConfig {
    pub table_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CognitoConfig {
    pub user_pool_id: String,
    pub client_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub bucket: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    /// Overrides every AWS endpoint, e.g. a local DynamoDB or LocalStack.
    pub endpoint_url: Option<String>,
    pub timeout_ms: u64,
}

impl IntegratorConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = IntegratorConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("integrator-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            dynamodb: DynamoConfig {
                table_name: get_env("DYNAMODB_TABLE_NAME", Some("integrators"), is_prod)?,
            },
            cognito: CognitoConfig {
                user_pool_id: get_env("USER_POOL_ID", None, is_prod)?,
                client_id: get_env("USER_CLIENT_ID", None, is_prod)?,
            },
            s3: S3Config {
                bucket: get_env("BUCKET", Some("integrator-reports"), is_prod)?,
            },
            aws: AwsConfig {
                region: get_env("AWS_REGION", Some("eu-central-1"), is_prod)?,
                endpoint_url: env::var("AWS_ENDPOINT_URL").ok().filter(|s| !s.is_empty()),
                timeout_ms: get_env("AWS_TIMEOUT_MS", Some("5000"), false)?
                    .parse()
                    .map_err(|e: std::num::ParseIntError| {
                        AppError::ConfigError(anyhow::anyhow!("AWS_TIMEOUT_MS: {}", e))
                    })?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.aws.timeout_ms == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "AWS_TIMEOUT_MS must be positive"
            )));
        }

        if self.dynamodb.table_name.trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DYNAMODB_TABLE_NAME cannot be empty"
            )));
        }

        if self.environment == Environment::Prod && self.aws.endpoint_url.is_some() {
            tracing::warn!("AWS_ENDPOINT_URL is set in production - all AWS calls go to the override");
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
