use serde::Deserialize;

/// Prometheus metrics configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and print its rendering on exit
    #[serde(default)]
    pub enabled: bool,
}
