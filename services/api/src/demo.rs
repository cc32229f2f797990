use crate::cli::CatalogArgs;
use crate::infra::{build_configurator, load_rule_catalog, parse_variable, Configurator};
use clap::Args;
use configurator::config::CatalogConfig;
use configurator::costing::PrecomputedLaborCost;
use configurator::engine::{
    validate, BusinessUnitId, ClientId, CommunityId, ProductTypeCode, RuleCatalog, Scalar,
    VariableContext,
};
use configurator::error::AppError;
use configurator::pricing::{PriceBasis, RateSheetSource};
use configurator::router::{
    PricingScope, ResolveConfigurationRequest, ResolveConfigurationResponse,
};

#[derive(Args, Debug)]
pub(crate) struct ResolveArgs {
    #[command(flatten)]
    pub(crate) catalog: CatalogArgs,
    /// Product type code, e.g. wood-privacy
    #[arg(long)]
    pub(crate) product_type: String,
    /// Variable assignment NAME=VALUE; repeat for each variable
    #[arg(long = "var", value_parser = parse_variable)]
    pub(crate) variables: Vec<(String, Scalar)>,
    /// Community whose rate sheet should price the materials
    #[arg(long)]
    pub(crate) community: Option<String>,
    /// Client whose default rate sheet applies when the community has none
    #[arg(long)]
    pub(crate) client: Option<String>,
    /// Business unit used as the last pricing fallback
    #[arg(long)]
    pub(crate) business_unit: Option<String>,
    /// Print the resolution as JSON instead of a summary
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct CostsArgs {
    #[command(flatten)]
    pub(crate) catalog: CatalogArgs,
    /// Business unit whose labor rates apply
    #[arg(long)]
    pub(crate) business_unit: String,
}

pub(crate) fn run_resolve(args: ResolveArgs) -> Result<(), AppError> {
    let ResolveArgs {
        catalog,
        product_type,
        variables,
        community,
        client,
        business_unit,
        json,
    } = args;

    let rules = load_rule_catalog(catalog.rules.as_deref(), catalog.materials.as_deref())?;
    let configurator = build_configurator(&rules, CatalogConfig::DEFAULT_FETCH_TIMEOUT);
    let request = ResolveConfigurationRequest {
        product_type: ProductTypeCode::from(product_type),
        variables: variables.into_iter().collect(),
        scope: PricingScope {
            community_id: community.map(CommunityId::from),
            client_id: client.map(ClientId::from),
            business_unit_id: business_unit.map(BusinessUnitId::from),
        },
    };
    let quote = quote(&configurator, &request)?;

    if json {
        match serde_json::to_string_pretty(&quote) {
            Ok(payload) => println!("{payload}"),
            Err(err) => println!("failed to serialize resolution: {err}"),
        }
    } else {
        render_quote(&quote);
    }
    Ok(())
}

pub(crate) fn run_validate(args: CatalogArgs) -> Result<(), AppError> {
    let catalog = load_rule_catalog(args.rules.as_deref(), args.materials.as_deref())?;
    render_catalog_summary(&catalog);

    match validate(&catalog) {
        Ok(()) => {
            println!("Catalog is valid");
            Ok(())
        }
        Err(errors) => {
            println!("\nConfiguration errors ({})", errors.0.len());
            for error in &errors.0 {
                println!("- {error}");
            }
            Err(errors.into())
        }
    }
}

pub(crate) fn run_costs(args: CostsArgs) -> Result<(), AppError> {
    let CostsArgs {
        catalog,
        business_unit,
    } = args;
    let catalog = load_rule_catalog(catalog.rules.as_deref(), catalog.materials.as_deref())?;
    let configurator = build_configurator(&catalog, CatalogConfig::DEFAULT_FETCH_TIMEOUT);
    let business_unit = BusinessUnitId::from(business_unit);

    let snapshot = configurator.engine.snapshot()?;
    let entries = configurator
        .labor_costs
        .recompute_all(&snapshot, &business_unit)?;
    render_labor_costs(&business_unit, &entries);
    Ok(())
}

pub(crate) fn run_demo() -> Result<(), AppError> {
    let catalog = load_rule_catalog(None, None)?;
    let configurator = build_configurator(&catalog, CatalogConfig::DEFAULT_FETCH_TIMEOUT);

    println!("Product configurator demo");
    render_catalog_summary(&catalog);

    let scenarios = [
        (
            "6ft wood privacy, Prairie Trail builder pricing",
            VariableContext::new()
                .with("post_type", "WOOD")
                .with("height", 6)
                .with("rail_count", 3)
                .with("cap", true),
            Some("prairie-trail"),
        ),
        (
            "8ft shadowbox on steel posts, Des Moines retail",
            VariableContext::new()
                .with("post_type", "STEEL")
                .with("height", 8)
                .with("rail_count", 4)
                .with("style", "shadowbox"),
            Some("oak-hollow"),
        ),
    ];

    for (title, variables, community) in scenarios {
        println!("\n== {title}");
        let request = ResolveConfigurationRequest {
            product_type: ProductTypeCode::from("wood-privacy"),
            variables,
            scope: PricingScope {
                community_id: community.map(CommunityId::from),
                client_id: None,
                business_unit_id: Some(BusinessUnitId::from("des-moines")),
            },
        };
        match quote(&configurator, &request) {
            Ok(quote) => render_quote(&quote),
            Err(err) => println!("  Resolution failed: {err}"),
        }
    }

    let business_unit = BusinessUnitId::from("des-moines");
    let snapshot = configurator.engine.snapshot()?;
    let entries = configurator
        .labor_costs
        .recompute_all(&snapshot, &business_unit)?;
    println!();
    render_labor_costs(&business_unit, &entries);

    Ok(())
}

pub(crate) fn quote(
    configurator: &Configurator,
    request: &ResolveConfigurationRequest,
) -> Result<ResolveConfigurationResponse, AppError> {
    let snapshot = configurator.engine.snapshot()?;
    configurator.quote(&snapshot, request)
}

fn render_catalog_summary(catalog: &RuleCatalog) {
    let active_types = catalog
        .product_types
        .iter()
        .filter(|product_type| product_type.is_active)
        .count();
    println!(
        "Catalog: {} product types ({} active), {} components, {} eligibility rules, {} materials",
        catalog.product_types.len(),
        active_types,
        catalog.components.len(),
        catalog.eligibility_rules.len(),
        catalog.materials.len()
    );
    println!(
        "Labor: {} codes, {} applicability rules, {} rates, {} products",
        catalog.labor_codes.len(),
        catalog.labor_rules.len(),
        catalog.labor_rates.len(),
        catalog.products.len()
    );
}

fn render_quote(quote: &ResolveConfigurationResponse) {
    let configuration = &quote.configuration;
    let variables: Vec<String> = configuration
        .variables
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect();
    println!(
        "Product type {} with {}",
        configuration.product_type,
        if variables.is_empty() {
            "no variables".to_string()
        } else {
            variables.join(", ")
        }
    );

    match (&quote.rate_sheet.rate_sheet_id, &quote.rate_sheet.source) {
        (Some(sheet), source) => println!("Rate sheet: {sheet} ({})", source_label(source)),
        (None, _) => println!("Rate sheet: none resolved, pricing at raw cost"),
    }

    println!("\nComponents");
    for entry in &configuration.components {
        let component = &entry.component;
        let flag = if component.is_required {
            "required"
        } else {
            "optional"
        };
        println!("- {} ({flag})", component.name);
        if entry.materials.is_empty() {
            println!("    no eligible materials");
        }
        for eligible in &entry.materials {
            let material = &eligible.material;
            let marker = if entry.auto_selected.as_ref() == Some(&material.material_id) {
                " [auto-selected]"
            } else {
                ""
            };
            match quote.prices.get(&material.material_id) {
                Some(priced) => println!(
                    "    {} {} @ {} ({}){marker}",
                    material.material_id,
                    material.name,
                    priced.unit_price,
                    basis_label(&priced.basis)
                ),
                None => println!("    {} {}{marker}", material.material_id, material.name),
            }
        }
    }

    let unfilled: Vec<String> = configuration
        .unfilled_required()
        .map(|entry| entry.component.name.clone())
        .collect();
    if !unfilled.is_empty() {
        println!("Required components without materials: {}", unfilled.join(", "));
    }

    if configuration.labor.is_empty() {
        println!("\nLabor: none applicable");
    } else {
        println!("\nLabor");
        for labor in &configuration.labor {
            println!(
                "- {} {} (rules: {})",
                labor.code,
                labor.name,
                labor.matched_rules.join(", ")
            );
        }
    }
}

fn render_labor_costs(business_unit: &BusinessUnitId, entries: &[PrecomputedLaborCost]) {
    println!("Labor costs for business unit {business_unit}");
    if entries.is_empty() {
        println!("- no product definitions in the catalog");
    }
    for entry in entries {
        println!(
            "- {}/{}: total {} | per unit {}",
            entry.key.product_type,
            entry.key.product_id,
            entry.total_labor_cost,
            entry.labor_cost_per_unit
        );
        for line in &entry.lines {
            println!(
                "    {} x{} @ {} = {}",
                line.labor_code, line.quantity, line.rate, line.extended
            );
        }
        if !entry.missing_rates.is_empty() {
            let missing: Vec<String> = entry
                .missing_rates
                .iter()
                .map(ToString::to_string)
                .collect();
            println!("    missing rates: {}", missing.join(", "));
        }
    }
}

fn source_label(source: &RateSheetSource) -> String {
    match source {
        RateSheetSource::Community(id) => format!("community {id}"),
        RateSheetSource::Client(id) => format!("client {id}"),
        RateSheetSource::BusinessUnit(id) => format!("business unit {id}"),
        RateSheetSource::None => "no scope".to_string(),
    }
}

fn basis_label(basis: &PriceBasis) -> &'static str {
    match basis {
        PriceBasis::RateSheet(_) => "rate sheet",
        PriceBasis::RawCost => "raw cost",
        PriceBasis::Unpriced => "unpriced",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use configurator::engine::{ComponentCode, MaterialId, RateSheetId};

    #[test]
    fn demo_scenario_quotes_against_the_community_sheet() {
        let catalog = load_rule_catalog(None, None).expect("sample loads");
        let configurator = build_configurator(&catalog, CatalogConfig::DEFAULT_FETCH_TIMEOUT);
        let request = ResolveConfigurationRequest {
            product_type: ProductTypeCode::from("wood-privacy"),
            variables: VariableContext::new()
                .with("post_type", "WOOD")
                .with("height", 6)
                .with("rail_count", 3),
            scope: PricingScope {
                community_id: Some(CommunityId::from("prairie-trail")),
                client_id: None,
                business_unit_id: Some(BusinessUnitId::from("des-moines")),
            },
        };

        let quote = quote(&configurator, &request).expect("quote resolves");
        assert_eq!(
            quote.rate_sheet.rate_sheet_id,
            Some(RateSheetId::from("RS-PRAIRIE-TRAIL"))
        );
        let rail = quote
            .configuration
            .component(&ComponentCode::from("rail"))
            .expect("rail present");
        assert_eq!(rail.auto_selected, Some(MaterialId::from("RAIL-2X4-8-PT")));
        let priced = quote
            .prices
            .get(&MaterialId::from("RAIL-2X4-8-PT"))
            .expect("rail priced");
        assert_eq!(basis_label(&priced.basis), "rate sheet");
    }

    #[test]
    fn unknown_product_type_is_an_error() {
        let catalog = load_rule_catalog(None, None).expect("sample loads");
        let configurator = build_configurator(&catalog, CatalogConfig::DEFAULT_FETCH_TIMEOUT);
        let request = ResolveConfigurationRequest {
            product_type: ProductTypeCode::from("vinyl"),
            variables: VariableContext::new(),
            scope: PricingScope::default(),
        };
        let err = quote(&configurator, &request).expect_err("unknown type");
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
    }
}
