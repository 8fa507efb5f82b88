use crate::core::errors::Result;
use crate::core::types::{
    Coordinate, RawResource, ResolutionResult, ResolvedResource, ResourceCategory,
};
use crate::parser::GeodataSource;
use crate::spatial::haversine_distance;
use log::debug;

pub fn display_name(category: ResourceCategory, raw: &RawResource) -> String {
    let base = match raw.name() {
        Some(name) => name.to_string(),
        None => category.label().to_uppercase(),
    };
    match category.info().display_suffix {
        Some(suffix) => format!("{}{}", base, suffix),
        None => base,
    }
}

/// Annotates and ranks already fetched resources. Ties keep service order.
pub fn resolve_raw(
    category: ResourceCategory,
    origin: Coordinate,
    raw: Vec<RawResource>,
) -> ResolutionResult {
    let mut sorted_resources: Vec<ResolvedResource> = raw
        .into_iter()
        .map(|raw| ResolvedResource {
            distance_km: haversine_distance(origin, raw.coordinate),
            display_name: display_name(category, &raw),
            raw,
        })
        .collect();

    sorted_resources.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

    let nearest = sorted_resources.first().cloned();

    ResolutionResult {
        category,
        sorted_resources,
        nearest,
    }
}

pub async fn resolve<S: GeodataSource + ?Sized>(
    source: &S,
    category: ResourceCategory,
    origin: Coordinate,
    radius_m: u32,
) -> Result<ResolutionResult> {
    let raw = source.fetch_category(category, origin, radius_m).await?;
    let result = resolve_raw(category, origin, raw);
    debug!(
        "Resolved {} {} resources within {} m",
        result.sorted_resources.len(),
        category,
        radius_m
    );
    Ok(result)
}
