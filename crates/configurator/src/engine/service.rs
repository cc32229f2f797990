use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::components::{resolve_components, ActiveComponent};
use super::domain::{ComponentCode, MaterialId, ProductTypeCode, VariableContext};
use super::eligibility::{resolve_materials, EligibleMaterial};
use super::labor::{resolve_labor_codes, ApplicableLabor};
use super::snapshot::RuleSnapshot;
use super::ResolutionError;
use crate::store::{RuleStore, StoreError};

/// Component with its candidate materials.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfiguredComponent {
    #[serde(flatten)]
    pub component: ActiveComponent,
    pub materials: Vec<EligibleMaterial>,
    /// Set for a required component with exactly one candidate. UI annotation only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_selected: Option<MaterialId>,
}

/// Everything the engine derives for one product type and variable context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildConfiguration {
    pub product_type: ProductTypeCode,
    pub variables: VariableContext,
    pub components: Vec<ConfiguredComponent>,
    pub labor: Vec<ApplicableLabor>,
    pub snapshot_compiled_at: DateTime<Utc>,
}

impl BuildConfiguration {
    /// Required components left without any legal material.
    pub fn unfilled_required(&self) -> impl Iterator<Item = &ConfiguredComponent> {
        self.components
            .iter()
            .filter(|entry| entry.component.is_required && entry.materials.is_empty())
    }

    pub fn component(&self, code: &ComponentCode) -> Option<&ConfiguredComponent> {
        self.components
            .iter()
            .find(|entry| entry.component.code == *code)
    }
}

/// Runs every resolver against one snapshot.
pub fn build_configuration(
    snapshot: &RuleSnapshot,
    product_type: &ProductTypeCode,
    context: &VariableContext,
) -> Result<BuildConfiguration, ResolutionError> {
    let mut components = Vec::new();
    for component in resolve_components(snapshot, product_type, context)? {
        let materials = resolve_materials(snapshot, product_type, &component.code, context)?;
        let auto_selected = match materials.as_slice() {
            [only] if component.is_required => Some(only.material.material_id.clone()),
            _ => None,
        };
        components.push(ConfiguredComponent {
            component,
            materials,
            auto_selected,
        });
    }
    let labor = resolve_labor_codes(snapshot, product_type, context)?;

    debug!(
        product_type = %product_type,
        components = components.len(),
        labor_codes = labor.len(),
        "configuration resolved"
    );

    Ok(BuildConfiguration {
        product_type: product_type.clone(),
        variables: context.clone(),
        components,
        labor,
        snapshot_compiled_at: snapshot.compiled_at(),
    })
}

/// Facade that takes one snapshot from the rule store per call.
pub struct ConfigurationEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for ConfigurationEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S> ConfigurationEngine<S>
where
    S: RuleStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn snapshot(&self) -> Result<Arc<RuleSnapshot>, ResolutionError> {
        Ok(self.store.snapshot()?)
    }

    /// Fetches a snapshot off the async runtime, giving up after `timeout`.
    pub async fn snapshot_within(
        &self,
        timeout: Duration,
    ) -> Result<Arc<RuleSnapshot>, ResolutionError> {
        let store = self.store.clone();
        let fetch = tokio::task::spawn_blocking(move || store.snapshot());

        match tokio::time::timeout(timeout, fetch).await {
            Ok(Ok(result)) => Ok(result?),
            Ok(Err(join)) => {
                Err(StoreError::Unavailable(format!("snapshot fetch failed: {join}")).into())
            }
            Err(_) => Err(StoreError::Timeout(timeout).into()),
        }
    }

    pub fn resolve_components(
        &self,
        product_type: &ProductTypeCode,
        context: &VariableContext,
    ) -> Result<Vec<ActiveComponent>, ResolutionError> {
        let snapshot = self.snapshot()?;
        resolve_components(&snapshot, product_type, context)
    }

    pub fn resolve_materials(
        &self,
        product_type: &ProductTypeCode,
        component: &ComponentCode,
        context: &VariableContext,
    ) -> Result<Vec<EligibleMaterial>, ResolutionError> {
        let snapshot = self.snapshot()?;
        resolve_materials(&snapshot, product_type, component, context)
    }

    pub fn resolve_labor_codes(
        &self,
        product_type: &ProductTypeCode,
        context: &VariableContext,
    ) -> Result<Vec<ApplicableLabor>, ResolutionError> {
        let snapshot = self.snapshot()?;
        resolve_labor_codes(&snapshot, product_type, context)
    }

    pub fn resolve_configuration(
        &self,
        product_type: &ProductTypeCode,
        context: &VariableContext,
    ) -> Result<BuildConfiguration, ResolutionError> {
        let snapshot = self.snapshot()?;
        build_configuration(&snapshot, product_type, context)
    }
}
