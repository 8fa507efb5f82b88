use crate::core::types::ResourceCategory;
use std::io::Error as IoError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WidgetError {
    #[error("File IO Error: {0}")]
    FileIO(#[from] IoError),
    #[error("JSON Deserialization Error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Bincode Error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("Unable to retrieve {}s data: {reason}", .category.label())]
    ResourceFetch {
        category: ResourceCategory,
        reason: String,
    },
    #[error("Location is not known yet")]
    LocationUnavailable,
    #[error("Invalid coordinate: lat {lat}, lon {lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },
    #[error("Invalid widget options: {0}")]
    InvalidOptions(String),
    #[error("Widget with ID {0} not found")]
    WidgetNotFound(i32),
    #[error("SOS dispatch failed: {0}")]
    Dispatch(String),
}

impl WidgetError {
    pub fn fetch(category: ResourceCategory, reason: impl ToString) -> Self {
        WidgetError::ResourceFetch {
            category,
            reason: reason.to_string(),
        }
    }

    pub fn category(&self) -> Option<ResourceCategory> {
        match self {
            WidgetError::ResourceFetch { category, .. } => Some(*category),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, WidgetError>;
