use crate::core::errors::{Result, WidgetError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        if valid {
            Ok(Coordinate { lat, lon })
        } else {
            Err(WidgetError::InvalidCoordinate { lat, lon })
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// Where the user is, as last reported by geolocation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Origin {
    #[default]
    Unset,
    Known(Coordinate),
}

impl Origin {
    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            Origin::Known(coord) => Some(*coord),
            Origin::Unset => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Police,
    Hospital,
    RailwayStation,
    Hotel,
    BusStation,
}

pub struct CategoryInfo {
    pub key: &'static str,
    pub filter: &'static str,
    pub icon: &'static str,
    pub display_suffix: Option<&'static str>,
    pub list_element_id: &'static str,
    pub nearest_element_id: &'static str,
}

static POLICE: CategoryInfo = CategoryInfo {
    key: "police",
    filter: "amenity=police",
    icon: "police.png",
    display_suffix: None,
    list_element_id: "police-list",
    nearest_element_id: "nearest-police-station",
};

static HOSPITAL: CategoryInfo = CategoryInfo {
    key: "hospital",
    filter: "amenity=hospital",
    icon: "hospital.png",
    display_suffix: None,
    list_element_id: "hospital-list",
    nearest_element_id: "nearest-hospital",
};

static RAILWAY_STATION: CategoryInfo = CategoryInfo {
    key: "railway_station",
    filter: "railway=station",
    icon: "railway_station.png",
    display_suffix: Some(" station"),
    list_element_id: "transport-list",
    nearest_element_id: "nearest-railway-station",
};

static HOTEL: CategoryInfo = CategoryInfo {
    key: "hotel",
    filter: "tourism=hotel",
    icon: "hotel.png",
    display_suffix: Some(" hotel"),
    list_element_id: "safety-places-list",
    nearest_element_id: "nearest-hotel",
};

static BUS_STATION: CategoryInfo = CategoryInfo {
    key: "bus_station",
    filter: "amenity=bus_station",
    icon: "bus_station.png",
    display_suffix: None,
    list_element_id: "bus-stations-list",
    nearest_element_id: "nearest-bus-station",
};

impl ResourceCategory {
    pub const ALL: [ResourceCategory; 5] = [
        ResourceCategory::Police,
        ResourceCategory::Hospital,
        ResourceCategory::RailwayStation,
        ResourceCategory::Hotel,
        ResourceCategory::BusStation,
    ];

    pub fn info(&self) -> &'static CategoryInfo {
        match self {
            ResourceCategory::Police => &POLICE,
            ResourceCategory::Hospital => &HOSPITAL,
            ResourceCategory::RailwayStation => &RAILWAY_STATION,
            ResourceCategory::Hotel => &HOTEL,
            ResourceCategory::BusStation => &BUS_STATION,
        }
    }

    pub fn key(&self) -> &'static str {
        self.info().key
    }

    /// Human label, e.g. "railway station".
    pub fn label(&self) -> String {
        self.key().replace('_', " ")
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.key() == key)
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RawResource {
    pub id: i64,
    pub coordinate: Coordinate,
    pub tags: HashMap<String, String>,
}

impl RawResource {
    pub fn name(&self) -> Option<&str> {
        self.tags
            .get("name")
            .map(|name| name.as_str())
            .filter(|name| !name.trim().is_empty())
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedResource {
    #[serde(flatten)]
    pub raw: RawResource,
    pub distance_km: f64,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionResult {
    pub category: ResourceCategory,
    pub sorted_resources: Vec<ResolvedResource>,
    pub nearest: Option<ResolvedResource>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OverpassOptions {
    #[serde(default = "default_server")]
    pub server: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for OverpassOptions {
    fn default() -> Self {
        OverpassOptions {
            server: default_server(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WidgetOptions {
    #[serde(default)]
    pub overpass: OverpassOptions,
    #[serde(default = "default_radius")]
    pub default_radius_m: u32,
    #[serde(default = "default_min_radius")]
    pub min_radius_m: u32,
    #[serde(default = "default_max_radius")]
    pub max_radius_m: u32,
    #[serde(default = "default_zoom")]
    pub zoom: u8,
    #[serde(default)]
    pub contacts_path: Option<String>,
}

impl Default for WidgetOptions {
    fn default() -> Self {
        WidgetOptions {
            overpass: OverpassOptions::default(),
            default_radius_m: default_radius(),
            min_radius_m: default_min_radius(),
            max_radius_m: default_max_radius(),
            zoom: default_zoom(),
            contacts_path: None,
        }
    }
}

impl WidgetOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        let options: WidgetOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_radius_m == 0 || self.min_radius_m > self.max_radius_m {
            return Err(WidgetError::InvalidOptions(format!(
                "radius bounds {}..{} are not usable",
                self.min_radius_m, self.max_radius_m
            )));
        }
        if self.overpass.server.trim().is_empty() {
            return Err(WidgetError::InvalidOptions(
                "overpass server must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn clamp_radius(&self, meters: u32) -> u32 {
        meters.clamp(self.min_radius_m, self.max_radius_m)
    }
}

fn default_server() -> String {
    "https://overpass-api.de".to_string()
}

fn default_timeout_secs() -> u64 {
    25
}

fn default_user_agent() -> String {
    concat!("sos-locator/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_radius() -> u32 {
    10_000
}

fn default_min_radius() -> u32 {
    100
}

fn default_max_radius() -> u32 {
    50_000
}

fn default_zoom() -> u8 {
    13
}
