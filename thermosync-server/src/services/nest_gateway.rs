use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use thermosync_api::{Fahrenheit, Reading};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::DeviceGateway;
use crate::errors::GatewayError;

pub const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const SDM_API_BASE: &str = "https://smartdevicemanagement.googleapis.com/v1";

const THERMOSTAT_TYPE: &str = "sdm.devices.types.THERMOSTAT";
const SET_COOL: &str = "sdm.devices.commands.ThermostatTemperatureSetpoint.SetCool";
const SET_HEAT: &str = "sdm.devices.commands.ThermostatTemperatureSetpoint.SetHeat";
const SET_RANGE: &str = "sdm.devices.commands.ThermostatTemperatureSetpoint.SetRange";

/// Tokens are refreshed this long before Google says they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

pub fn celsius_to_fahrenheit(celsius: f64) -> Fahrenheit {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(fahrenheit: Fahrenheit) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Debug, Clone)]
pub struct NestCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub project_id: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Debug)]
struct AccessToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug, Deserialize)]
struct DeviceList {
    #[serde(default)]
    devices: Vec<DeviceEntry>,
}

#[derive(Debug, Deserialize)]
struct DeviceEntry {
    name: String,
    #[serde(default, rename = "type")]
    kind: String,
}

/// Temperature-related traits of one thermostat, all in Celsius.
#[derive(Debug, Clone, PartialEq)]
struct ThermostatTraits {
    ambient: Option<f64>,
    heat: Option<f64>,
    cool: Option<f64>,
    humidity: Option<f64>,
    mode: Option<String>,
}

impl ThermostatTraits {
    fn parse(device: &Value) -> Self {
        let traits = &device["traits"];
        let setpoint = &traits["sdm.devices.traits.ThermostatTemperatureSetpoint"];

        Self {
            ambient: traits["sdm.devices.traits.Temperature"]["ambientTemperatureCelsius"].as_f64(),
            heat: setpoint["heatCelsius"].as_f64(),
            cool: setpoint["coolCelsius"].as_f64(),
            humidity: traits["sdm.devices.traits.Humidity"]["ambientHumidityPercent"].as_f64(),
            mode: traits["sdm.devices.traits.ThermostatMode"]["mode"]
                .as_str()
                .map(str::to_string),
        }
    }

    /// The setpoint the control loop steers for the current mode.
    fn target(&self) -> Option<f64> {
        match self.mode.as_deref() {
            Some("COOL") | Some("HEATCOOL") => self.cool,
            Some("HEAT") => self.heat,
            _ => self.heat.or(self.cool),
        }
    }

    fn command_for(&self, target: Fahrenheit) -> Result<Value, GatewayError> {
        let celsius = fahrenheit_to_celsius(target);

        match self.mode.as_deref() {
            Some("COOL") => Ok(json!({"command": SET_COOL, "params": {"coolCelsius": celsius}})),
            Some("HEAT") => Ok(json!({"command": SET_HEAT, "params": {"heatCelsius": celsius}})),
            Some("HEATCOOL") => {
                let span = match (self.heat, self.cool) {
                    (Some(heat), Some(cool)) if cool > heat => cool - heat,
                    _ => 2.0,
                };
                Ok(json!({
                    "command": SET_RANGE,
                    "params": {"heatCelsius": celsius - span, "coolCelsius": celsius}
                }))
            }
            other => Err(GatewayError::Permanent(format!(
                "thermostat mode {} does not accept a setpoint",
                other.unwrap_or("unknown")
            ))),
        }
    }
}

/// Google Smart Device Management thermostat adapter.
pub struct NestGateway {
    client: reqwest::Client,
    credentials: NestCredentials,
    token_url: String,
    api_base: String,
    token: Mutex<Option<AccessToken>>,
    thermostat: Mutex<Option<String>>,
}

impl NestGateway {
    pub fn new(credentials: NestCredentials, timeout: Duration) -> Result<Self, GatewayError> {
        Self::with_endpoints(credentials, OAUTH_TOKEN_URL, SDM_API_BASE, timeout)
    }

    pub fn with_endpoints(
        credentials: NestCredentials,
        token_url: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Permanent(format!("http client: {e}")))?;

        Ok(Self {
            client,
            credentials,
            token_url: token_url.into(),
            api_base: api_base.into(),
            token: Mutex::new(None),
            thermostat: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let mut token = self.token.lock().await;

        if let Some(current) = token.as_ref() {
            if Instant::now() < current.refresh_at {
                return Ok(current.value.clone());
            }
        }

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("token refresh failed: {status} {body}");
            return Err(match status.as_u16() {
                400 | 401 | 403 => GatewayError::Authentication(message),
                code => GatewayError::from_status(code, message),
            });
        }

        let refreshed: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(refreshed.expires_in.unwrap_or(3600));
        *token = Some(AccessToken {
            value: refreshed.access_token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        });

        tracing::debug!(expires_in = lifetime.as_secs(), "nest access token refreshed");
        Ok(refreshed.access_token)
    }

    async fn get_json(&self, url: &str, context: &str) -> Result<Value, GatewayError> {
        let token = self.access_token().await?;
        let response = self.client.get(url).bearer_auth(token).send().await?;
        self.checked(response, context).await?.json().await.map_err(Into::into)
    }

    /// Maps error statuses and drops the cached token on a rejected one.
    async fn checked(
        &self,
        response: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status.as_u16() == 401 {
            self.token.lock().await.take();
        }

        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::from_status(
            status.as_u16(),
            format!("{context}: {status} {body}"),
        ))
    }

    async fn thermostat_name(&self) -> Result<String, GatewayError> {
        let mut thermostat = self.thermostat.lock().await;
        if let Some(name) = thermostat.as_ref() {
            return Ok(name.clone());
        }

        let url = format!(
            "{}/enterprises/{}/devices",
            self.api_base, self.credentials.project_id
        );
        let list: DeviceList = serde_json::from_value(self.get_json(&url, "list devices").await?)
            .map_err(|e| GatewayError::Permanent(format!("unexpected device list: {e}")))?;

        let name = list
            .devices
            .into_iter()
            .find(|device| device.kind.contains(THERMOSTAT_TYPE))
            .map(|device| device.name)
            .ok_or_else(|| GatewayError::Permanent("no thermostat found in the project".into()))?;

        tracing::info!(thermostat = %name, "nest thermostat discovered");
        *thermostat = Some(name.clone());
        Ok(name)
    }

    async fn fetch_traits(&self) -> Result<(String, ThermostatTraits), GatewayError> {
        let name = self.thermostat_name().await?;
        let url = format!("{}/{}", self.api_base, name);
        let device = self.get_json(&url, "get thermostat").await?;

        Ok((name, ThermostatTraits::parse(&device)))
    }
}

#[async_trait]
impl DeviceGateway for NestGateway {
    fn kind(&self) -> &'static str {
        "nest"
    }

    async fn read_temperature(&self) -> Result<Reading, GatewayError> {
        let (name, traits) = self.fetch_traits().await?;

        let ambient = traits
            .ambient
            .ok_or_else(|| GatewayError::Permanent("thermostat reports no ambient temperature".into()))?;
        let target = traits.target().ok_or_else(|| {
            GatewayError::Permanent("thermostat reports no setpoint, is it switched off?".into())
        })?;

        Ok(Reading {
            ambient: round_tenth(celsius_to_fahrenheit(ambient)),
            target: round_tenth(celsius_to_fahrenheit(target)),
            device_id: name,
            observed_at: OffsetDateTime::now_utc(),
            humidity: traits.humidity,
            mode: traits.mode,
        })
    }

    async fn write_target(&self, target: Fahrenheit) -> Result<(), GatewayError> {
        let (name, traits) = self.fetch_traits().await?;
        let command = traits.command_for(target)?;

        let token = self.access_token().await?;
        let response = self
            .client
            .post(format!("{}/{}:executeCommand", self.api_base, name))
            .bearer_auth(token)
            .json(&command)
            .send()
            .await?;
        self.checked(response, "execute command").await?;

        tracing::info!(thermostat = %name, target, command = %command["command"], "setpoint command accepted");
        Ok(())
    }
}
