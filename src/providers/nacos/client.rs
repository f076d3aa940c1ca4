//! Blocking client for the Nacos config open API (v1).

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;

use crate::constants::{
    DEFAULT_NACOS_PORT, ENV_NACOS_DATA_ID, ENV_NACOS_GROUP, ENV_NACOS_HOST, ENV_NACOS_NAMESPACE,
    ENV_NACOS_PORT, NACOS_CONTEXT_PATH, NACOS_LONG_POLL_TIMEOUT_MS, NACOS_TIMEOUT_MS,
};
use crate::env::Env;
use crate::providers::ProviderError;

/// Field separator inside a `Listening-Configs` entry.
const WORD_SEPARATOR: char = '\u{2}';
/// Entry terminator inside `Listening-Configs`.
const LINE_SEPARATOR: char = '\u{1}';

/// Coordinates of one Nacos config item, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NacosSettings {
    pub host: String,
    pub port: u16,
    pub namespace: String,
    pub group: String,
    pub data_id: String,
}

impl NacosSettings {
    /// Read `NACOS_HOST`, `NACOS_PORT`, `NACOS_NAMESPACE`, `NACOS_GROUP` and
    /// `NACOS_DATAID`. All five must be non-empty.
    pub fn from_env(env: &Env) -> Result<Self, ProviderError> {
        let host = env.var_or_empty(ENV_NACOS_HOST);
        let port = env.var_or_empty(ENV_NACOS_PORT);
        let namespace = env.var_or_empty(ENV_NACOS_NAMESPACE);
        let group = env.var_or_empty(ENV_NACOS_GROUP);
        let data_id = env.var_or_empty(ENV_NACOS_DATA_ID);

        tracing::debug!(
            host = %host,
            port = %port,
            namespace = %namespace,
            group = %group,
            data_id = %data_id,
            "reading nacos config from env"
        );

        if [&host, &port, &namespace, &group, &data_id]
            .iter()
            .any(|v| v.is_empty())
        {
            return Err(ProviderError::MissingEnv(format!(
                "{ENV_NACOS_HOST}={host}, {ENV_NACOS_PORT}={port}, {ENV_NACOS_NAMESPACE}={namespace}, \
                 {ENV_NACOS_GROUP}={group}, {ENV_NACOS_DATA_ID}={data_id}, nacos_server={host}:{port}"
            )));
        }

        let port = port.parse::<u16>().unwrap_or_else(|e| {
            tracing::error!(
                port = %port,
                error = %e,
                default = DEFAULT_NACOS_PORT,
                "failed to parse nacos server port, using default"
            );
            DEFAULT_NACOS_PORT
        });

        Ok(Self {
            host,
            port,
            namespace,
            group,
            data_id,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, NACOS_CONTEXT_PATH)
    }
}

/// Thin wrapper over the two endpoints the provider needs.
#[derive(Debug, Clone)]
pub(crate) struct NacosClient {
    http: Client,
    settings: NacosSettings,
    base_url: String,
}

impl NacosClient {
    pub(crate) fn new(settings: NacosSettings) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(NACOS_TIMEOUT_MS))
            .build()
            .map_err(|e| ProviderError::Remote(format!("failed to build http client: {e}")))?;
        let base_url = settings.base_url();
        Ok(Self {
            http,
            settings,
            base_url,
        })
    }

    pub(crate) fn settings(&self) -> &NacosSettings {
        &self.settings
    }

    /// Current content of the config item. A missing item reads as empty.
    pub(crate) fn get_config(&self) -> Result<String, ProviderError> {
        let resp = self
            .http
            .get(format!("{}/v1/cs/configs", self.base_url))
            .query(&[
                ("dataId", self.settings.data_id.as_str()),
                ("group", self.settings.group.as_str()),
                ("tenant", self.settings.namespace.as_str()),
            ])
            .send()
            .map_err(|e| ProviderError::Remote(format!("request failed: {e}")))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(String::new());
        }
        let body = resp
            .text()
            .map_err(|e| ProviderError::Remote(format!("failed to read response body: {e}")))?;
        if !status.is_success() {
            return Err(ProviderError::Remote(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }

    /// Long-poll the listener endpoint. Returns `true` when the server reports
    /// that the item no longer matches `content_md5`.
    pub(crate) fn poll_change(&self, content_md5: &str) -> Result<bool, ProviderError> {
        let listening = format!(
            "{data_id}{WORD_SEPARATOR}{group}{WORD_SEPARATOR}{content_md5}{WORD_SEPARATOR}{tenant}{LINE_SEPARATOR}",
            data_id = self.settings.data_id,
            group = self.settings.group,
            tenant = self.settings.namespace,
        );
        let resp = self
            .http
            .post(format!("{}/v1/cs/configs/listener", self.base_url))
            .header("Long-Pulling-Timeout", NACOS_LONG_POLL_TIMEOUT_MS.to_string())
            .timeout(Duration::from_millis(
                NACOS_LONG_POLL_TIMEOUT_MS + NACOS_TIMEOUT_MS,
            ))
            .form(&[("Listening-Configs", listening)])
            .send()
            .map_err(|e| ProviderError::Remote(format!("listener request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| ProviderError::Remote(format!("failed to read listener body: {e}")))?;
        if !status.is_success() {
            return Err(ProviderError::Remote(format!("listener HTTP {status}: {body}")));
        }
        Ok(!body.trim().is_empty())
    }
}

/// Hex MD5 digest, as Nacos uses to identify content versions.
pub(crate) fn content_md5(content: &str) -> String {
    format!("{:x}", md5::compute(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_NACOS_HOST, "nacos.internal"),
            (ENV_NACOS_PORT, "8848"),
            (ENV_NACOS_NAMESPACE, "prod"),
            (ENV_NACOS_GROUP, "DEFAULT_GROUP"),
            (ENV_NACOS_DATA_ID, "billing.toml"),
        ]
    }

    #[test]
    fn settings_from_complete_env() {
        let settings = NacosSettings::from_env(&Env::from_vars(full_env())).unwrap();
        assert_eq!(settings.port, 8848);
        assert_eq!(settings.base_url(), "http://nacos.internal:8848/nacos");
    }

    #[test]
    fn missing_variable_lists_every_value() {
        let vars: Vec<_> = full_env()
            .into_iter()
            .filter(|(k, _)| *k != ENV_NACOS_GROUP)
            .collect();
        let err = NacosSettings::from_env(&Env::from_vars(vars)).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, ProviderError::MissingEnv(_)));
        assert!(msg.contains("NACOS_HOST=nacos.internal"));
        assert!(msg.contains("NACOS_GROUP=,"));
        assert!(msg.contains("NACOS_DATAID=billing.toml"));
    }

    #[test]
    fn bad_port_falls_back_to_default() {
        let vars: Vec<_> = full_env()
            .into_iter()
            .map(|(k, v)| if k == ENV_NACOS_PORT { (k, "http") } else { (k, v) })
            .collect();
        let settings = NacosSettings::from_env(&Env::from_vars(vars)).unwrap();
        assert_eq!(settings.port, DEFAULT_NACOS_PORT);
    }

    #[test]
    fn md5_is_lowercase_hex() {
        assert_eq!(content_md5(""), "d41d8cd98f00b204e9800998ecf8427e");
    }
}
