//! Birth chart generation on top of an ephemeris engine.

mod signs;
mod swiss;

pub use signs::{ZodiacSign, translate_sign};
pub use swiss::SwissEphemeris;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{AscendantPlacement, BodyPlacement, ChartResult};

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("Timezone inválido: {0}")]
    InvalidTimezone(String),
    #[error("Horário local inexistente em {timezone}: {local}")]
    NonexistentLocalTime { local: NaiveDateTime, timezone: String },
    #[error("Falha no cálculo de {body}: {message}")]
    Engine { body: String, message: String },
    #[error("Fila de cálculo indisponível")]
    QueueClosed,
}

/// Bodies reported in a chart.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Body {
    Sun,
    Moon,
    Mercury,
    Venus,
    Mars,
    Jupiter,
    Saturn,
}

impl Body {
    pub const ALL: [Body; 7] = [
        Body::Sun,
        Body::Moon,
        Body::Mercury,
        Body::Venus,
        Body::Mars,
        Body::Jupiter,
        Body::Saturn,
    ];

    // Keys under "planetas"
    pub const PLANETS: [(Body, &'static str); 5] = [
        (Body::Mercury, "mercurio"),
        (Body::Venus, "venus"),
        (Body::Mars, "marte"),
        (Body::Jupiter, "jupiter"),
        (Body::Saturn, "saturno"),
    ];

    pub fn name(self) -> &'static str {
        match self {
            Body::Sun => "sun",
            Body::Moon => "moon",
            Body::Mercury => "mercury",
            Body::Venus => "venus",
            Body::Mars => "mars",
            Body::Jupiter => "jupiter",
            Body::Saturn => "saturn",
        }
    }
}

/// Raw engine output: tropical ecliptic longitudes in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct EclipticPositions {
    pub bodies: Vec<(Body, f64)>,
    /// House cusps 1..=12, cusp 1 is the ascendant.
    pub cusps: [f64; 12],
}

impl EclipticPositions {
    fn longitude(&self, body: Body) -> Result<f64, ChartError> {
        self.bodies
            .iter()
            .find(|(b, _)| *b == body)
            .map(|(_, lon)| *lon)
            .ok_or_else(|| ChartError::Engine {
                body: body.name().to_string(),
                message: "missing from engine output".to_string(),
            })
    }
}

/// The astrology computation. Synchronous and CPU-bound.
pub trait ChartEngine: Send + Sync {
    fn positions(
        &self,
        moment: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
    ) -> Result<EclipticPositions, ChartError>;
}

#[derive(Debug, Clone)]
pub struct BirthSubject {
    pub name: String,
    /// Wall-clock time at the birth place.
    pub local_datetime: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

#[derive(Clone)]
pub struct ChartGenerator {
    engine: Arc<dyn ChartEngine>,
}

impl ChartGenerator {
    pub fn new(engine: Arc<dyn ChartEngine>) -> Self {
        Self { engine }
    }

    pub fn generate(&self, subject: &BirthSubject) -> Result<ChartResult, ChartError> {
        let moment = to_utc(subject.local_datetime, &subject.timezone)?;
        tracing::debug!(subject = %subject.name, %moment, "computing chart");
        let positions = self
            .engine
            .positions(moment, subject.latitude, subject.longitude)?;

        let placement = |body: Body| -> Result<BodyPlacement, ChartError> {
            let lon = positions.longitude(body)?;
            Ok(BodyPlacement {
                sign: sign_name(lon),
                house: house_of(lon, &positions.cusps),
                degree: degree_in_sign(lon),
            })
        };

        let mut planets = BTreeMap::new();
        for (body, key) in Body::PLANETS {
            planets.insert(key.to_string(), placement(body)?);
        }

        let ascendant = positions.cusps[0];
        Ok(ChartResult {
            sun: placement(Body::Sun)?,
            moon: placement(Body::Moon)?,
            ascendant: AscendantPlacement {
                sign: sign_name(ascendant),
                degree: degree_in_sign(ascendant),
            },
            planets,
        })
    }
}

/// Local wall-clock time in an IANA zone to UTC. Ambiguous times (DST fall
/// back) take the earlier instant.
pub fn to_utc(local: NaiveDateTime, timezone: &str) -> Result<DateTime<Utc>, ChartError> {
    let tz: Tz = timezone
        .parse()
        .map_err(|_| ChartError::InvalidTimezone(timezone.to_string()))?;
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| ChartError::NonexistentLocalTime {
            local,
            timezone: timezone.to_string(),
        })
}

fn sign_name(longitude: f64) -> String {
    translate_sign(ZodiacSign::from_longitude(longitude).english_name())
}

fn degree_in_sign(longitude: f64) -> f64 {
    round2(longitude.rem_euclid(30.0))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// House (1..=12) whose cusp arc contains the longitude.
pub fn house_of(longitude: f64, cusps: &[f64; 12]) -> u8 {
    let lon = longitude.rem_euclid(360.0);
    for i in 0..12 {
        let start = cusps[i].rem_euclid(360.0);
        let end = cusps[(i + 1) % 12].rem_euclid(360.0);
        let width = (end - start).rem_euclid(360.0);
        if (lon - start).rem_euclid(360.0) < width {
            return i as u8 + 1;
        }
    }
    // degenerate cusps (all equal)
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    // Equal houses starting at 100 degrees
    const CUSPS: [f64; 12] = [
        100.0, 130.0, 160.0, 190.0, 220.0, 250.0, 280.0, 310.0, 340.0, 10.0, 40.0, 70.0,
    ];

    struct FixedEngine;

    impl ChartEngine for FixedEngine {
        fn positions(&self, _: DateTime<Utc>, _: f64, _: f64) -> Result<EclipticPositions, ChartError> {
            Ok(EclipticPositions {
                bodies: vec![
                    (Body::Sun, 4.567),
                    (Body::Moon, 215.0),
                    (Body::Mercury, 350.123),
                    (Body::Venus, 320.5),
                    (Body::Mars, 300.0),
                    (Body::Jupiter, 93.0),
                    (Body::Saturn, 293.456),
                ],
                cusps: CUSPS,
            })
        }
    }

    struct EmptyEngine;

    impl ChartEngine for EmptyEngine {
        fn positions(&self, _: DateTime<Utc>, _: f64, _: f64) -> Result<EclipticPositions, ChartError> {
            Ok(EclipticPositions {
                bodies: vec![],
                cusps: CUSPS,
            })
        }
    }

    fn subject(timezone: &str) -> BirthSubject {
        BirthSubject {
            name: "Maria Silva".into(),
            local_datetime: NaiveDate::from_ymd_opt(1990, 3, 25)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap(),
            latitude: -22.90642,
            longitude: -43.18223,
            timezone: timezone.into(),
        }
    }

    #[test]
    fn builds_translated_chart() {
        let generator = ChartGenerator::new(Arc::new(FixedEngine));
        let chart = generator.generate(&subject("America/Sao_Paulo")).unwrap();

        assert_eq!(chart.sun.sign, "Áries");
        assert_eq!(chart.sun.degree, 4.57);
        assert_eq!(chart.sun.house, 9);
        assert_eq!(chart.moon.sign, "Escorpião");
        assert_eq!(chart.moon.house, 4);
        assert_eq!(chart.ascendant.sign, "Câncer");
        assert_eq!(chart.ascendant.degree, 10.0);

        let keys: Vec<&str> = chart.planets.keys().map(String::as_str).collect();
        assert_eq!(keys, ["jupiter", "marte", "mercurio", "saturno", "venus"]);
        assert_eq!(chart.planets["saturno"].sign, "Capricórnio");
        assert_eq!(chart.planets["saturno"].degree, 23.46);
        assert_eq!(chart.planets["jupiter"].house, 12);
    }

    #[test]
    fn unknown_timezone_is_an_error() {
        let generator = ChartGenerator::new(Arc::new(FixedEngine));
        let err = generator.generate(&subject("Mars/Olympus_Mons")).unwrap_err();
        assert!(matches!(err, ChartError::InvalidTimezone(_)));
    }

    #[test]
    fn missing_body_is_an_error() {
        let generator = ChartGenerator::new(Arc::new(EmptyEngine));
        let err = generator.generate(&subject("America/Sao_Paulo")).unwrap_err();
        assert!(matches!(err, ChartError::Engine { .. }));
    }

    #[test]
    fn converts_local_time_to_utc() {
        // No DST in Sao Paulo in March 1990, UTC-3
        let utc = to_utc(subject("America/Sao_Paulo").local_datetime, "America/Sao_Paulo").unwrap();
        assert_eq!(utc.to_rfc3339(), "1990-03-25T11:30:00+00:00");
    }

    #[test]
    fn skipped_local_time_is_an_error() {
        // Clocks jumped from 02:00 to 03:00 in New York on 2021-03-14
        let local = NaiveDate::from_ymd_opt(2021, 3, 14)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        assert!(matches!(
            to_utc(local, "America/New_York"),
            Err(ChartError::NonexistentLocalTime { .. })
        ));
    }

    #[test]
    fn house_wraps_around_zero() {
        assert_eq!(house_of(100.0, &CUSPS), 1);
        assert_eq!(house_of(129.99, &CUSPS), 1);
        assert_eq!(house_of(345.0, &CUSPS), 9);
        assert_eq!(house_of(5.0, &CUSPS), 9);
        assert_eq!(house_of(99.0, &CUSPS), 12);
    }
}
