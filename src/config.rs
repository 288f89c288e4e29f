//! Game configuration loaded from environment variables.
//!
//! Every geometry and scoring tunable lives here so that tests can build a
//! config without touching the environment. Values mirror the production
//! mobile client; changing them changes territory shapes and scores.

use std::env;
use std::path::PathBuf;

/// Core configuration, loaded once at session start.
#[derive(Debug, Clone)]
pub struct GameConfig {
    // --- Environment ---
    /// GCP project ID for the Firestore backend
    pub gcp_project_id: String,
    /// Directory for device-local persistence (session log, offline queue)
    pub data_dir: PathBuf,

    // --- Route validation ---
    /// Minimum route distance for a territory claim (km)
    pub min_route_km: f64,

    // --- Geometry ---
    /// Half-width of the stored territory polygon (km, ~20 m)
    pub territory_width_km: f64,
    /// Buffer tolerance when testing capture intersections (m).
    /// Wider than the storage buffer on purpose: capture should be easier
    /// to trigger than territory width alone would suggest.
    pub capture_buffer_m: f64,
    /// Douglas-Peucker simplification tolerance (degrees)
    pub simplify_tolerance_deg: f64,

    // --- Spatial index ---
    /// Geohash precision for the territory index key
    pub geohash_precision: usize,
    /// Above this many cached territories, consumers filter to the viewport
    pub visible_filter_threshold: usize,

    // --- Scoring ---
    /// Base points per kilometre run
    pub score_per_km: u32,
    /// Bonus points granted per captured rival territory
    pub capture_bonus: u32,
}

impl GameConfig {
    /// Load configuration from environment variables, with production
    /// defaults for everything except the project ID.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            data_dir: env::var("GASP_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".gasp")),
            min_route_km: parse_env("GASP_MIN_ROUTE_KM", 0.1)?,
            territory_width_km: parse_env("GASP_TERRITORY_WIDTH_KM", 0.02)?,
            capture_buffer_m: parse_env("GASP_CAPTURE_BUFFER_M", 15.0)?,
            simplify_tolerance_deg: parse_env("GASP_SIMPLIFY_TOLERANCE", 1e-4)?,
            geohash_precision: parse_env("GASP_GEOHASH_PRECISION", 9)?,
            visible_filter_threshold: parse_env("GASP_VISIBLE_THRESHOLD", 50)?,
            score_per_km: parse_env("GASP_SCORE_PER_KM", 10)?,
            capture_bonus: parse_env("GASP_CAPTURE_BONUS", 5)?,
        })
    }

    /// Default config for tests: production tunables, temp-friendly paths.
    pub fn test_default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            data_dir: PathBuf::from(".gasp-test"),
            min_route_km: 0.1,
            territory_width_km: 0.02,
            capture_buffer_m: 15.0,
            simplify_tolerance_deg: 1e-4,
            geohash_precision: 9,
            visible_filter_threshold: 50,
            score_per_km: 10,
            capture_bonus: 5,
        }
    }
}

/// Parse an env var, falling back to a default when unset.
fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Unparseable environment variable: {0}")]
    Invalid(&'static str),
}
