//! Sun position and clear-sky insolation

use super::{ConversionEngine, round_to};
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::f64::consts::PI;

const SOLAR_CONSTANT: f64 = 1353.0;

/// Solar elevation and zenith in degrees (NOAA fractional-year approximation)
fn sun_position(latitude: f64, longitude: f64, at: DateTime<Utc>) -> (f64, f64) {
    let hour = f64::from(at.hour());
    let minutes = hour * 60.0 + f64::from(at.minute()) + f64::from(at.second()) / 60.0;
    let day_of_year = f64::from(at.ordinal());

    let gamma = 2.0 * PI / 365.0 * (day_of_year - 1.0 + (hour - 12.0) / 24.0);

    let eqtime = 229.18
        * (0.000075 + 0.001868 * gamma.cos()
            - 0.032077 * gamma.sin()
            - 0.014615 * (2.0 * gamma).cos()
            - 0.040849 * (2.0 * gamma).sin());
    let declination = 0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin()
        - 0.006758 * (2.0 * gamma).cos()
        + 0.000907 * (2.0 * gamma).sin()
        - 0.002697 * (3.0 * gamma).cos()
        + 0.00148 * (3.0 * gamma).sin();

    let true_solar_time = minutes + eqtime + 4.0 * longitude;
    let hour_angle = (true_solar_time / 4.0 - 180.0).to_radians();

    let lat = latitude.to_radians();
    let cos_zenith = (lat.sin() * declination.sin()
        + lat.cos() * declination.cos() * hour_angle.cos())
    .clamp(-1.0, 1.0);
    let zenith = cos_zenith.acos().to_degrees();

    (90.0 - zenith, zenith)
}

impl ConversionEngine {
    /// Sun elevation above the horizon in degrees
    #[must_use]
    pub fn solar_elevation(&self, latitude: f64, longitude: f64, at: DateTime<Utc>) -> f64 {
        round_to(sun_position(latitude, longitude, at).0, 1)
    }

    /// Clear-sky irradiance on a horizontal surface in W/m²
    #[must_use]
    pub fn solar_insolation(
        &self,
        elevation_m: f64,
        latitude: f64,
        longitude: f64,
        at: DateTime<Utc>,
    ) -> f64 {
        let (sun_elevation, zenith) = sun_position(latitude, longitude, at);
        if sun_elevation <= 0.0 {
            return 0.0;
        }

        // Kasten-Young relative air mass
        let air_mass = 1.0 / (zenith.to_radians().cos() + 0.50572 * (96.07995 - zenith).powf(-1.6364));
        let height_km = elevation_m.max(0.0) / 1000.0;
        let direct = (1.0 - 0.14 * height_km) * 0.7f64.powf(air_mass.powf(0.678)) + 0.14 * height_km;

        round_to(SOLAR_CONSTANT * direct * sun_elevation.to_radians().sin(), 1)
    }
}
