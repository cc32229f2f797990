use configurator::config::CatalogConfig;
use configurator::engine::{RuleCatalog, Scalar};
use configurator::error::AppError;
use configurator::router::ConfiguratorState;
use configurator::store::{
    load_catalog, load_materials_csv, sample_catalog, InMemoryLaborCostCache,
    InMemoryRateSheetDirectory, InMemoryRuleStore,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type Configurator =
    ConfiguratorState<InMemoryRuleStore, InMemoryRateSheetDirectory, InMemoryLaborCostCache>;

/// Reads the configured rule catalog, or the built-in sample when no path is set.
pub(crate) fn load_rule_catalog(
    rules_path: Option<&Path>,
    materials_csv: Option<&Path>,
) -> Result<RuleCatalog, AppError> {
    let catalog = match rules_path {
        Some(path) => {
            info!(path = %path.display(), "loading rule catalog");
            load_catalog(path, materials_csv)?
        }
        None => {
            info!("no rule catalog configured; using the built-in sample");
            let mut catalog = sample_catalog()?;
            if let Some(csv_path) = materials_csv {
                catalog.merge_materials(load_materials_csv(csv_path)?);
            }
            catalog
        }
    };
    Ok(catalog)
}

pub(crate) fn configured_catalog(config: &CatalogConfig) -> Result<RuleCatalog, AppError> {
    load_rule_catalog(config.rules_path.as_deref(), config.materials_csv.as_deref())
}

/// Wires the in-memory adapters over one catalog.
pub(crate) fn build_configurator(catalog: &RuleCatalog, fetch_timeout: Duration) -> Configurator {
    ConfiguratorState::new(
        Arc::new(InMemoryRuleStore::new(catalog)),
        Arc::new(InMemoryRateSheetDirectory::new(&catalog.pricing)),
        Arc::new(InMemoryLaborCostCache::default()),
        fetch_timeout,
    )
}

/// Parses `name=value` as typed on the command line.
pub(crate) fn parse_variable(raw: &str) -> Result<(String, Scalar), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("variable name missing in '{raw}'"));
    }
    Ok((name.to_string(), Scalar::infer(value)))
}
