use chrono::{DateTime, Datelike, Timelike, Utc};
use std::sync::Mutex;
use swisseph::Cusp;
use swisseph::swe::{calc_ut, houses_ex, julday};

use super::{Body, ChartEngine, ChartError, EclipticPositions};

// SEFLG_MOSEPH: built-in analytic ephemeris, no data files required
const FLG_MOSEPH: u32 = 4;
const FLG_SPEED: u32 = 256;
const GREG_CAL: u32 = 1;
const PLACIDUS: u8 = b'P';

impl Body {
    fn swe_id(self) -> u32 {
        match self {
            Body::Sun => 0,
            Body::Moon => 1,
            Body::Mercury => 2,
            Body::Venus => 3,
            Body::Mars => 4,
            Body::Jupiter => 5,
            Body::Saturn => 6,
        }
    }
}

/// Swiss Ephemeris engine with Placidus houses.
///
/// The C library keeps global state, so calls are serialized.
#[derive(Default)]
pub struct SwissEphemeris {
    lock: Mutex<()>,
}

impl SwissEphemeris {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChartEngine for SwissEphemeris {
    fn positions(
        &self,
        moment: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
    ) -> Result<EclipticPositions, ChartError> {
        let _guard = self.lock.lock().map_err(|_| ChartError::Engine {
            body: "ephemeris".to_string(),
            message: "engine lock poisoned".to_string(),
        })?;

        let jd = julian_day(moment);

        let mut bodies = Vec::with_capacity(Body::ALL.len());
        for body in Body::ALL {
            let result = calc_ut(jd, body.swe_id(), FLG_MOSEPH | FLG_SPEED).map_err(|e| {
                ChartError::Engine {
                    body: body.name().to_string(),
                    message: format!("Swiss Ephemeris error: {}", e),
                }
            })?;
            bodies.push((body, result.out[0].rem_euclid(360.0)));
        }

        let (c, _ascmc) = houses_ex(jd, 0, latitude, longitude, PLACIDUS as i32);
        let cusps = Cusp::from_array(c);
        let cusps = [
            cusps.first,
            cusps.second,
            cusps.third,
            cusps.fourth,
            cusps.fifth,
            cusps.sixth,
            cusps.seventh,
            cusps.eighth,
            cusps.ninth,
            cusps.tenth,
            cusps.eleventh,
            cusps.twelfth,
        ]
        .map(|cusp| cusp.rem_euclid(360.0));

        if cusps.iter().any(|c| !c.is_finite()) {
            return Err(ChartError::Engine {
                body: "houses".to_string(),
                message: format!("no Placidus houses at latitude {latitude}"),
            });
        }

        Ok(EclipticPositions { bodies, cusps })
    }
}

fn julian_day(dt: DateTime<Utc>) -> f64 {
    let hour = dt.hour() as f64 + dt.minute() as f64 / 60.0 + dt.second() as f64 / 3600.0;
    julday(dt.year(), dt.month() as i32, dt.day() as i32, hour, GREG_CAL)
}
