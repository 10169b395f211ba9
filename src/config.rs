use anyhow::Context;
use chrono::NaiveTime;

// Office geofence defaults match the coordinates the check-in clients ship
// with; override via environment for other sites.
const DEFAULT_OFFICE_LAT: f64 = 18.662431200582347;
const DEFAULT_OFFICE_LNG: f64 = 73.7929215654713;
const DEFAULT_RADIUS_M: i32 = 100;

/// Process-wide engine settings, loaded once at startup and passed by
/// reference into the core. Scoring weights and the daily hours cap are
/// fixed policy, not configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub office_latitude: f64,
    pub office_longitude: f64,
    pub geofence_radius_m: i32,
    pub late_cutoff: NaiveTime,
}

impl EngineConfig {
    pub fn from_env() -> anyhow::Result<EngineConfig> {
        let office_latitude = env_or("OFFICE_LAT", DEFAULT_OFFICE_LAT)?;
        let office_longitude = env_or("OFFICE_LNG", DEFAULT_OFFICE_LNG)?;
        let geofence_radius_m = env_or("GEOFENCE_RADIUS_M", DEFAULT_RADIUS_M)?;

        let late_cutoff = match std::env::var("LATE_CUTOFF") {
            Ok(raw) => NaiveTime::parse_from_str(&raw, "%H:%M")
                .with_context(|| format!("LATE_CUTOFF must look like 09:15, got {raw:?}"))?,
            Err(_) => NaiveTime::from_hms_opt(9, 15, 0).context("invalid default cutoff")?,
        };

        Ok(EngineConfig {
            office_latitude,
            office_longitude,
            geofence_radius_m,
            late_cutoff,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}
