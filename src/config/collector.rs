//! Interactive collection of the provisioning configuration.

use super::prompt::InteractiveSource;
use super::validator;
use super::FieldDefaults;
use crate::error::ConfigError;
use crate::models::{DataStore, ProvisioningConfig};

/// Gathers operator answers into a `ProvisioningConfig`.
///
/// Fields are asked in a fixed order: device identity, database host,
/// database user, database password, sensor pin. Empty answers take the
/// documented default except for the identity and the password, which are
/// required. Nothing is written anywhere.
#[derive(Debug, Clone)]
pub struct ConfigCollector {
    defaults: FieldDefaults,
}

impl ConfigCollector {
    pub fn new(defaults: FieldDefaults) -> Self {
        ConfigCollector { defaults }
    }

    /// Run the full question sequence and the confirmation prompt.
    pub fn collect(
        &self,
        source: &mut dyn InteractiveSource,
    ) -> Result<ProvisioningConfig, ConfigError> {
        let device_identity = ask(source, "Device identity (e.g. NATIONAL_1): ")?
            .ok_or_else(|| ConfigError::MissingRequiredField("device identity".to_string()))?;
        check("device identity", validator::validate_identity(&device_identity))?;

        let host = ask(
            source,
            &format!("Database host [{}]: ", self.defaults.host),
        )?
        .unwrap_or_else(|| self.defaults.host.clone());
        check("database host", validator::validate_host(&host))?;

        let user = ask(
            source,
            &format!("Database user [{}]: ", self.defaults.user),
        )?
        .unwrap_or_else(|| self.defaults.user.clone());
        check("database user", validator::validate_user(&user))?;

        let password = source
            .ask_secret("Database password: ")?
            .filter(|answer| !answer.is_empty())
            .ok_or_else(|| ConfigError::MissingRequiredField("database password".to_string()))?;
        check("database password", validator::validate_password(&password))?;

        let sensor_pin = match ask(
            source,
            &format!("Sensor GPIO pin [{}]: ", self.defaults.sensor_pin),
        )? {
            Some(raw) => raw.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                field: "sensor pin".to_string(),
                reason: format!("'{}' is not a positive integer", raw),
            })?,
            None => self.defaults.sensor_pin,
        };
        check("sensor pin", validator::validate_sensor_pin(sensor_pin))?;

        let config = ProvisioningConfig {
            device_identity,
            sensor_pin,
            data_store: DataStore {
                host,
                user,
                password,
                database_name: self.defaults.database.clone(),
            },
        };

        source.say("")?;
        source.say("Provisioning will use:")?;
        source.say(&config.summary())?;

        let answer = source
            .ask("Proceed with these settings? [y/N]: ")?
            .unwrap_or_default();
        if !is_affirmative(&answer) {
            log::info!("[Config] Operator declined the collected configuration");
            return Err(ConfigError::UserCancelled);
        }

        log::info!(
            "[Config] Collected configuration for '{}' (pin {}, host {})",
            config.device_identity,
            config.sensor_pin,
            config.data_store.host
        );
        Ok(config)
    }
}

/// Ask and normalise: `None` for EOF or an empty answer.
fn ask(source: &mut dyn InteractiveSource, prompt: &str) -> Result<Option<String>, ConfigError> {
    Ok(source.ask(prompt)?.filter(|answer| !answer.is_empty()))
}

fn check(field: &str, result: Result<(), String>) -> Result<(), ConfigError> {
    result.map_err(|reason| ConfigError::InvalidValue {
        field: field.to_string(),
        reason,
    })
}

/// Only an explicit yes counts.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
