use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{price_material, PricedMaterial, RateSheet, RateSheetDirectory};
use crate::engine::domain::{BusinessUnitId, ClientId, CommunityId, Material, RateSheetId};
use crate::store::StoreError;

/// Scope that supplied the effective rate sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum RateSheetSource {
    Community(CommunityId),
    Client(ClientId),
    BusinessUnit(BusinessUnitId),
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSheetResolution {
    pub rate_sheet_id: Option<RateSheetId>,
    pub source: RateSheetSource,
}

impl RateSheetResolution {
    fn found(rate_sheet_id: RateSheetId, source: RateSheetSource) -> Self {
        Self {
            rate_sheet_id: Some(rate_sheet_id),
            source,
        }
    }

    fn unresolved() -> Self {
        Self {
            rate_sheet_id: None,
            source: RateSheetSource::None,
        }
    }
}

/// Picks the effective rate sheet: community, then client (explicit, else the community's
/// client), then business unit. The first scope holding a sheet wins and lower scopes are
/// never consulted, so at most three scope lookups happen.
pub fn resolve_rate_sheet<D>(
    directory: &D,
    community_id: Option<&CommunityId>,
    client_id: Option<&ClientId>,
    business_unit_id: Option<&BusinessUnitId>,
) -> Result<RateSheetResolution, StoreError>
where
    D: RateSheetDirectory + ?Sized,
{
    let mut implied_client = None;

    if let Some(id) = community_id {
        if let Some(community) = directory.community(id)? {
            if let Some(sheet) = community.rate_sheet_id {
                return Ok(RateSheetResolution::found(
                    sheet,
                    RateSheetSource::Community(id.clone()),
                ));
            }
            implied_client = community.client_id;
        }
    }

    if let Some(id) = client_id.cloned().or(implied_client) {
        if let Some(client) = directory.client(&id)? {
            if let Some(sheet) = client.default_rate_sheet_id {
                return Ok(RateSheetResolution::found(sheet, RateSheetSource::Client(id)));
            }
        }
    }

    if let Some(id) = business_unit_id {
        if let Some(unit) = directory.business_unit(id)? {
            if let Some(sheet) = unit.default_rate_sheet_id {
                return Ok(RateSheetResolution::found(
                    sheet,
                    RateSheetSource::BusinessUnit(id.clone()),
                ));
            }
        }
    }

    Ok(RateSheetResolution::unresolved())
}

/// Cascade plus pricing of resolved materials against the chosen sheet.
pub struct RateSheetResolver<D> {
    directory: Arc<D>,
}

impl<D> Clone for RateSheetResolver<D> {
    fn clone(&self) -> Self {
        Self {
            directory: self.directory.clone(),
        }
    }
}

impl<D> RateSheetResolver<D>
where
    D: RateSheetDirectory + 'static,
{
    pub fn new(directory: Arc<D>) -> Self {
        Self { directory }
    }

    pub fn resolve(
        &self,
        community_id: Option<&CommunityId>,
        client_id: Option<&ClientId>,
        business_unit_id: Option<&BusinessUnitId>,
    ) -> Result<RateSheetResolution, StoreError> {
        let resolution = resolve_rate_sheet(
            self.directory.as_ref(),
            community_id,
            client_id,
            business_unit_id,
        )?;

        match &resolution.rate_sheet_id {
            Some(sheet) => {
                debug!(rate_sheet = %sheet, source = ?resolution.source, "rate sheet resolved")
            }
            None => warn!("no rate sheet resolved; materials will be priced at raw cost"),
        }

        Ok(resolution)
    }

    /// Loads the resolved sheet. A resolved id that no longer exists is reported and treated
    /// as no sheet; the cascade is not re-run against lower scopes.
    pub fn sheet_for(
        &self,
        resolution: &RateSheetResolution,
    ) -> Result<Option<RateSheet>, StoreError> {
        let Some(id) = &resolution.rate_sheet_id else {
            return Ok(None);
        };
        let sheet = self.directory.rate_sheet(id)?;
        if sheet.is_none() {
            warn!(rate_sheet = %id, "resolved rate sheet not found");
        }
        Ok(sheet)
    }

    pub fn price_materials<'a, I>(
        &self,
        resolution: &RateSheetResolution,
        materials: I,
    ) -> Result<Vec<PricedMaterial>, StoreError>
    where
        I: IntoIterator<Item = &'a Material>,
    {
        let sheet = self.sheet_for(resolution)?;
        Ok(materials
            .into_iter()
            .map(|material| price_material(sheet.as_ref(), material))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{BusinessUnit, Client, Community, PricingCatalog};
    use crate::store::InMemoryRateSheetDirectory;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn catalog() -> PricingCatalog {
        PricingCatalog {
            communities: vec![
                Community {
                    community_id: CommunityId::from("willow-creek"),
                    client_id: Some(ClientId::from("acme-homes")),
                    rate_sheet_id: Some(RateSheetId::from("RS-WILLOW")),
                },
                Community {
                    community_id: CommunityId::from("oak-ridge"),
                    client_id: Some(ClientId::from("acme-homes")),
                    rate_sheet_id: None,
                },
            ],
            clients: vec![
                Client {
                    client_id: ClientId::from("acme-homes"),
                    default_rate_sheet_id: Some(RateSheetId::from("RS-ACME")),
                },
                Client {
                    client_id: ClientId::from("walk-in"),
                    default_rate_sheet_id: None,
                },
            ],
            business_units: vec![BusinessUnit {
                business_unit_id: BusinessUnitId::from("north"),
                default_rate_sheet_id: Some(RateSheetId::from("RS-NORTH")),
            }],
            rate_sheets: Vec::new(),
        }
    }

    struct CountingDirectory {
        inner: InMemoryRateSheetDirectory,
        lookups: AtomicUsize,
    }

    impl RateSheetDirectory for CountingDirectory {
        fn community(&self, id: &CommunityId) -> Result<Option<Community>, StoreError> {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            self.inner.community(id)
        }

        fn client(&self, id: &ClientId) -> Result<Option<Client>, StoreError> {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            self.inner.client(id)
        }

        fn business_unit(&self, id: &BusinessUnitId) -> Result<Option<BusinessUnit>, StoreError> {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            self.inner.business_unit(id)
        }

        fn rate_sheet(&self, id: &RateSheetId) -> Result<Option<RateSheet>, StoreError> {
            self.inner.rate_sheet(id)
        }
    }

    struct OfflineDirectory;

    impl RateSheetDirectory for OfflineDirectory {
        fn community(&self, _id: &CommunityId) -> Result<Option<Community>, StoreError> {
            Err(StoreError::Unavailable("pricing database offline".to_string()))
        }

        fn client(&self, _id: &ClientId) -> Result<Option<Client>, StoreError> {
            Err(StoreError::Unavailable("pricing database offline".to_string()))
        }

        fn business_unit(&self, _id: &BusinessUnitId) -> Result<Option<BusinessUnit>, StoreError> {
            Err(StoreError::Unavailable("pricing database offline".to_string()))
        }

        fn rate_sheet(&self, _id: &RateSheetId) -> Result<Option<RateSheet>, StoreError> {
            Err(StoreError::Unavailable("pricing database offline".to_string()))
        }
    }

    fn counting() -> CountingDirectory {
        CountingDirectory {
            inner: InMemoryRateSheetDirectory::new(&catalog()),
            lookups: AtomicUsize::new(0),
        }
    }

    #[test]
    fn community_sheet_short_circuits_lower_scopes() {
        let directory = counting();
        let resolution = resolve_rate_sheet(
            &directory,
            Some(&CommunityId::from("willow-creek")),
            Some(&ClientId::from("acme-homes")),
            Some(&BusinessUnitId::from("north")),
        )
        .expect("resolves");

        assert_eq!(resolution.rate_sheet_id, Some(RateSheetId::from("RS-WILLOW")));
        assert_eq!(
            resolution.source,
            RateSheetSource::Community(CommunityId::from("willow-creek"))
        );
        assert_eq!(directory.lookups.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn community_without_sheet_implies_its_client() {
        let directory = counting();
        let resolution = resolve_rate_sheet(
            &directory,
            Some(&CommunityId::from("oak-ridge")),
            None,
            Some(&BusinessUnitId::from("north")),
        )
        .expect("resolves");

        assert_eq!(resolution.rate_sheet_id, Some(RateSheetId::from("RS-ACME")));
        assert_eq!(
            resolution.source,
            RateSheetSource::Client(ClientId::from("acme-homes"))
        );
    }

    #[test]
    fn explicit_client_beats_implied_client() {
        let directory = counting();
        let resolution = resolve_rate_sheet(
            &directory,
            Some(&CommunityId::from("oak-ridge")),
            Some(&ClientId::from("walk-in")),
            Some(&BusinessUnitId::from("north")),
        )
        .expect("resolves");

        assert_eq!(
            resolution.source,
            RateSheetSource::BusinessUnit(BusinessUnitId::from("north"))
        );
        assert_eq!(directory.lookups.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn nothing_resolvable_is_not_an_error() {
        let directory = counting();
        let resolution = resolve_rate_sheet(
            &directory,
            Some(&CommunityId::from("unknown")),
            None,
            None,
        )
        .expect("resolves");

        assert_eq!(resolution.rate_sheet_id, None);
        assert_eq!(resolution.source, RateSheetSource::None);
    }

    #[test]
    fn directory_outage_propagates() {
        let result = resolve_rate_sheet(
            &OfflineDirectory,
            Some(&CommunityId::from("willow-creek")),
            None,
            None,
        );
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[test]
    fn missing_resolved_sheet_prices_at_raw_cost() {
        let directory = Arc::new(InMemoryRateSheetDirectory::new(&catalog()));
        let resolver = RateSheetResolver::new(directory);
        let resolution = resolver
            .resolve(Some(&CommunityId::from("willow-creek")), None, None)
            .expect("resolves");

        assert!(resolver.sheet_for(&resolution).expect("lookup").is_none());
    }
}
