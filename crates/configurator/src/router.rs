use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::costing::{
    CachedLaborCost, LaborCostCache, LaborCostKey, LaborCostService, PrecomputedLaborCost,
};
use crate::engine::{
    build_configuration, BuildConfiguration, BusinessUnitId, ClientId, CommunityId,
    ConfigurationEngine, MaterialId, ProductId, ProductTypeCode, RuleSnapshot, VariableContext,
};
use crate::error::AppError;
use crate::pricing::{PricedMaterial, RateSheetDirectory, RateSheetResolution, RateSheetResolver};
use crate::store::RuleStore;

/// Everything the configurator endpoints need, shared across requests.
pub struct ConfiguratorState<S, D, C> {
    pub engine: ConfigurationEngine<S>,
    pub pricing: RateSheetResolver<D>,
    pub labor_costs: LaborCostService<C>,
    /// Upper bound on acquiring a rule snapshot for one request.
    pub fetch_timeout: Duration,
}

impl<S, D, C> ConfiguratorState<S, D, C>
where
    S: RuleStore + 'static,
    D: RateSheetDirectory + 'static,
    C: LaborCostCache + 'static,
{
    pub fn new(store: Arc<S>, directory: Arc<D>, cache: Arc<C>, fetch_timeout: Duration) -> Self {
        Self {
            engine: ConfigurationEngine::new(store),
            pricing: RateSheetResolver::new(directory),
            labor_costs: LaborCostService::new(cache),
            fetch_timeout,
        }
    }

    /// Resolves a configuration against `snapshot` and prices every candidate material.
    pub fn quote(
        &self,
        snapshot: &RuleSnapshot,
        request: &ResolveConfigurationRequest,
    ) -> Result<ResolveConfigurationResponse, AppError> {
        let configuration =
            build_configuration(snapshot, &request.product_type, &request.variables)?;

        let scope = &request.scope;
        let rate_sheet = self.pricing.resolve(
            scope.community_id.as_ref(),
            scope.client_id.as_ref(),
            scope.business_unit_id.as_ref(),
        )?;
        let candidates = configuration
            .components
            .iter()
            .flat_map(|entry| entry.materials.iter().map(|eligible| &eligible.material));
        let prices = self
            .pricing
            .price_materials(&rate_sheet, candidates)?
            .into_iter()
            .map(|priced| (priced.material_id.clone(), priced))
            .collect();

        Ok(ResolveConfigurationResponse {
            configuration,
            rate_sheet,
            prices,
        })
    }
}

/// Pricing context shared by the configuration and rate-sheet requests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PricingScope {
    #[serde(default)]
    pub community_id: Option<CommunityId>,
    #[serde(default)]
    pub client_id: Option<ClientId>,
    #[serde(default)]
    pub business_unit_id: Option<BusinessUnitId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveConfigurationRequest {
    pub product_type: ProductTypeCode,
    #[serde(default)]
    pub variables: VariableContext,
    #[serde(flatten)]
    pub scope: PricingScope,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveConfigurationResponse {
    #[serde(flatten)]
    pub configuration: BuildConfiguration,
    pub rate_sheet: RateSheetResolution,
    /// Prices for every candidate material, keyed by material id.
    pub prices: BTreeMap<MaterialId, PricedMaterial>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecomputeLaborCostRequest {
    pub product_type: ProductTypeCode,
    pub product_id: ProductId,
    pub business_unit_id: BusinessUnitId,
}

/// Router builder exposing configuration, pricing, and labor-cost endpoints.
pub fn configurator_router<S, D, C>(state: Arc<ConfiguratorState<S, D, C>>) -> Router
where
    S: RuleStore + 'static,
    D: RateSheetDirectory + 'static,
    C: LaborCostCache + 'static,
{
    Router::new()
        .route(
            "/api/v1/configurations/resolve",
            post(resolve_configuration_handler::<S, D, C>),
        )
        .route(
            "/api/v1/rate-sheets/resolve",
            post(resolve_rate_sheet_handler::<S, D, C>),
        )
        .route(
            "/api/v1/labor-costs/recompute",
            post(recompute_labor_cost_handler::<S, D, C>),
        )
        .route(
            "/api/v1/labor-costs/:product_type/:product_id/:business_unit_id",
            get(cached_labor_cost_handler::<S, D, C>),
        )
        .with_state(state)
}

pub(crate) async fn resolve_configuration_handler<S, D, C>(
    State(state): State<Arc<ConfiguratorState<S, D, C>>>,
    Json(request): Json<ResolveConfigurationRequest>,
) -> Result<Json<ResolveConfigurationResponse>, AppError>
where
    S: RuleStore + 'static,
    D: RateSheetDirectory + 'static,
    C: LaborCostCache + 'static,
{
    let snapshot = state.engine.snapshot_within(state.fetch_timeout).await?;
    Ok(Json(state.quote(&snapshot, &request)?))
}

pub(crate) async fn resolve_rate_sheet_handler<S, D, C>(
    State(state): State<Arc<ConfiguratorState<S, D, C>>>,
    Json(scope): Json<PricingScope>,
) -> Result<Json<RateSheetResolution>, AppError>
where
    S: RuleStore + 'static,
    D: RateSheetDirectory + 'static,
    C: LaborCostCache + 'static,
{
    let resolution = state.pricing.resolve(
        scope.community_id.as_ref(),
        scope.client_id.as_ref(),
        scope.business_unit_id.as_ref(),
    )?;
    Ok(Json(resolution))
}

pub(crate) async fn recompute_labor_cost_handler<S, D, C>(
    State(state): State<Arc<ConfiguratorState<S, D, C>>>,
    Json(request): Json<RecomputeLaborCostRequest>,
) -> Result<Json<PrecomputedLaborCost>, AppError>
where
    S: RuleStore + 'static,
    D: RateSheetDirectory + 'static,
    C: LaborCostCache + 'static,
{
    let snapshot = state.engine.snapshot_within(state.fetch_timeout).await?;
    let entry = state.labor_costs.recompute(
        &snapshot,
        &request.product_type,
        &request.product_id,
        &request.business_unit_id,
    )?;
    Ok(Json(entry))
}

pub(crate) async fn cached_labor_cost_handler<S, D, C>(
    State(state): State<Arc<ConfiguratorState<S, D, C>>>,
    Path((product_type, product_id, business_unit_id)): Path<(String, String, String)>,
) -> Result<Json<CachedLaborCost>, AppError>
where
    S: RuleStore + 'static,
    D: RateSheetDirectory + 'static,
    C: LaborCostCache + 'static,
{
    let key = LaborCostKey {
        product_type: ProductTypeCode::from(product_type),
        product_id: ProductId::from(product_id),
        business_unit_id: BusinessUnitId::from(business_unit_id),
    };
    let snapshot = state.engine.snapshot_within(state.fetch_timeout).await?;
    match state.labor_costs.cached(&snapshot, &key)? {
        Some(cached) => Ok(Json(cached)),
        None => Err(AppError::NotFound(format!(
            "no labor cost for {}/{} in business unit {}",
            key.product_type, key.product_id, key.business_unit_id
        ))),
    }
}
