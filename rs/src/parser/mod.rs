use crate::core::errors::{Result, WidgetError};
use crate::core::types::{Coordinate, OverpassOptions, RawResource, ResourceCategory};
use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Anything that can list the points of interest of a category around a point.
#[async_trait]
pub trait GeodataSource: Send + Sync {
    async fn fetch_category(
        &self,
        category: ResourceCategory,
        origin: Coordinate,
        radius_m: u32,
    ) -> Result<Vec<RawResource>>;
}

#[derive(Deserialize)]
struct OverpassResponse {
    elements: Vec<OverpassElement>,
}

#[derive(Deserialize)]
struct OverpassElement {
    id: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    tags: Option<HashMap<String, String>>,
}

pub fn build_query(category: ResourceCategory, origin: Coordinate, radius_m: u32) -> String {
    format!(
        "[out:json];node[{}](around:{},{},{});out;",
        category.info().filter,
        radius_m,
        origin.lat,
        origin.lon
    )
}

pub struct OverpassClient {
    client: reqwest::Client,
    server: String,
}

impl OverpassClient {
    pub fn new(options: &OverpassOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .user_agent(options.user_agent.clone())
            .build()
            .map_err(|e| WidgetError::InvalidOptions(e.to_string()))?;

        Ok(OverpassClient {
            client,
            server: options.server.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/interpreter", self.server)
    }
}

#[async_trait]
impl GeodataSource for OverpassClient {
    async fn fetch_category(
        &self,
        category: ResourceCategory,
        origin: Coordinate,
        radius_m: u32,
    ) -> Result<Vec<RawResource>> {
        let query = build_query(category, origin, radius_m);
        debug!("Fetching {} from {} with {}", category, self.endpoint(), query);

        let response = self
            .client
            .get(self.endpoint())
            .query(&[("data", query.as_str())])
            .send()
            .await
            .map_err(|e| WidgetError::fetch(category, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WidgetError::fetch(
                category,
                format!("Overpass API responded with {}", status),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| WidgetError::fetch(category, e))?;

        parse_overpass_json(category, &body)
    }
}

pub fn parse_overpass_json(category: ResourceCategory, body: &str) -> Result<Vec<RawResource>> {
    let response: OverpassResponse =
        serde_json::from_str(body).map_err(|e| WidgetError::fetch(category, e))?;

    let total = response.elements.len();
    let resources: Vec<RawResource> = response
        .elements
        .into_iter()
        .filter_map(|element| {
            let coordinate = Coordinate::new(element.lat?, element.lon?).ok()?;
            Some(RawResource {
                id: element.id,
                coordinate,
                tags: element.tags.unwrap_or_default(),
            })
        })
        .collect();

    if resources.len() < total {
        warn!(
            "Skipped {} {} elements without usable coordinates",
            total - resources.len(),
            category
        );
    }

    Ok(resources)
}
