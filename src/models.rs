use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

// Chart request body
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChartRequest {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "data_nascimento")]
    pub birth_date: String, // DD/MM/YYYY
    #[serde(rename = "hora_nascimento")]
    pub birth_time: String, // HH:MM
    #[serde(rename = "local_nascimento")]
    pub birth_place: String, // City/UF
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl ChartRequest {
    /// Checks every field format before any I/O happens.
    /// The error names the offending field.
    pub fn validate(&self) -> Result<(), String> {
        let name_len = self.name.chars().count();
        if !(2..=100).contains(&name_len) {
            return Err("nome: deve ter entre 2 e 100 caracteres".to_string());
        }

        parse_birth_date(&self.birth_date).map_err(|e| format!("data_nascimento: {e}"))?;
        parse_birth_time(&self.birth_time).map_err(|e| format!("hora_nascimento: {e}"))?;

        if self.birth_place.chars().count() < 3 {
            return Err("local_nascimento: deve ter pelo menos 3 caracteres".to_string());
        }
        // timezone is checked when the chart is computed
        Ok(())
    }

    /// Combines date and time into the local birth moment.
    pub fn birth_datetime(&self) -> Result<NaiveDateTime, String> {
        let date = parse_birth_date(&self.birth_date)?;
        let time = parse_birth_time(&self.birth_time)?;
        Ok(date.and_time(time))
    }
}

// "dd" style fixed-width numeric field
fn fixed_digits(s: &str, width: usize) -> Option<u32> {
    if s.len() == width && s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}

/// Parses `DD/MM/YYYY`, year between 1900 and the current year.
pub fn parse_birth_date(value: &str) -> Result<NaiveDate, String> {
    const INVALID: &str = "Data inválida. Use formato DD/MM/AAAA";

    let parts: Vec<&str> = value.split('/').collect();
    let [day, month, year] = parts.as_slice() else {
        return Err(INVALID.to_string());
    };
    let (Some(day), Some(month), Some(year)) = (
        fixed_digits(day, 2),
        fixed_digits(month, 2),
        fixed_digits(year, 4),
    ) else {
        return Err(INVALID.to_string());
    };

    let year = year as i32;
    if !(1900..=Utc::now().year()).contains(&year) {
        return Err("Ano deve estar entre 1900 e o ano atual".to_string());
    }
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| INVALID.to_string())
}

/// Parses `HH:MM` in 00:00..=23:59.
pub fn parse_birth_time(value: &str) -> Result<NaiveTime, String> {
    const INVALID: &str = "Hora inválida. Use formato HH:MM";

    let Some((hour, minute)) = value.split_once(':') else {
        return Err(INVALID.to_string());
    };
    let (Some(hour), Some(minute)) = (fixed_digits(hour, 2), fixed_digits(minute, 2)) else {
        return Err(INVALID.to_string());
    };
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| INVALID.to_string())
}

// Resolved place
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Coordinates {
    #[serde(rename = "cidade")]
    pub city: String,
    #[serde(rename = "estado")]
    pub region: String,
    #[serde(rename = "pais")]
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn formatted_place(&self) -> String {
        format!("{}, {}, {}", self.city, self.region, self.country)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BodyPlacement {
    #[serde(rename = "signo")]
    pub sign: String,
    #[serde(rename = "casa")]
    pub house: u8,
    #[serde(rename = "grau")]
    pub degree: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AscendantPlacement {
    #[serde(rename = "signo")]
    pub sign: String,
    #[serde(rename = "grau")]
    pub degree: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ChartResult {
    #[serde(rename = "sol")]
    pub sun: BodyPlacement,
    #[serde(rename = "lua")]
    pub moon: BodyPlacement,
    #[serde(rename = "ascendente")]
    pub ascendant: AscendantPlacement,
    // Portuguese planet name -> placement, ordered for stable output
    #[serde(rename = "planetas")]
    pub planets: BTreeMap<String, BodyPlacement>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PersonalData {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "data_nascimento")]
    pub birth_datetime: String,
    #[serde(rename = "local_nascimento")]
    pub formatted_place: String,
    #[serde(rename = "coordenadas")]
    pub coordinates: LatLng,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ResponseMetadata {
    #[serde(rename = "calculado_em")]
    pub computed_at: String,
    #[serde(rename = "versao_api")]
    pub api_version: String,
    pub cache_hit: bool,
}

// Chart endpoint response, also the cached value
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ChartResponse {
    #[serde(rename = "dados_pessoais")]
    pub personal_data: PersonalData,
    #[serde(rename = "mapa_astral")]
    pub chart: ChartResult,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PlaceLookupResponse {
    #[serde(rename = "dados")]
    pub data: Coordinates,
    pub cache_hit: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ChartRequest {
        serde_json::from_value(serde_json::json!({
            "nome": "Maria Silva",
            "data_nascimento": "25/03/1990",
            "hora_nascimento": "08:30",
            "local_nascimento": "Rio de Janeiro/RJ"
        }))
        .unwrap()
    }

    #[test]
    fn timezone_defaults_to_sao_paulo() {
        let req = request();
        assert_eq!(req.timezone, "America/Sao_Paulo");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn rejects_impossible_calendar_date() {
        let mut req = request();
        req.birth_date = "31/02/1990".to_string();
        let err = req.validate().unwrap_err();
        assert!(err.starts_with("data_nascimento"));
    }

    #[test]
    fn rejects_out_of_range_years() {
        assert!(parse_birth_date("01/01/1899").is_err());
        let next_year = Utc::now().year() + 1;
        assert!(parse_birth_date(&format!("01/01/{next_year}")).is_err());
        assert!(parse_birth_date("01/01/1900").is_ok());
    }

    #[test]
    fn rejects_loose_date_formats() {
        assert!(parse_birth_date("1/3/1990").is_err());
        assert!(parse_birth_date("1990-03-25").is_err());
        assert!(parse_birth_date("25/03/90").is_err());
    }

    #[test]
    fn time_bounds() {
        assert!(parse_birth_time("00:00").is_ok());
        assert!(parse_birth_time("23:59").is_ok());
        assert!(parse_birth_time("24:00").is_err());
        assert!(parse_birth_time("12:60").is_err());
        assert!(parse_birth_time("8:30").is_err());
    }

    #[test]
    fn rejects_short_name_and_place() {
        let mut req = request();
        req.name = "M".to_string();
        assert!(req.validate().unwrap_err().starts_with("nome"));

        let mut req = request();
        req.birth_place = "RJ".to_string();
        assert!(req.validate().unwrap_err().starts_with("local_nascimento"));
    }

    #[test]
    fn lengths_count_surrounding_spaces() {
        let mut req = request();
        req.name = " a ".to_string();
        req.birth_place = " R ".to_string();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn empty_timezone_passes_validation() {
        let mut req = request();
        req.timezone = String::new();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn birth_datetime_combines_fields() {
        let dt = request().birth_datetime().unwrap();
        assert_eq!(dt.format("%Y-%m-%dT%H:%M:%S").to_string(), "1990-03-25T08:30:00");
    }

    #[test]
    fn envelope_uses_portuguese_field_names() {
        let coords = Coordinates {
            city: "Rio de Janeiro".into(),
            region: "21".into(),
            country: "Brasil".into(),
            latitude: -22.9,
            longitude: -43.2,
        };
        let value = serde_json::to_value(PlaceLookupResponse {
            data: coords.clone(),
            cache_hit: false,
        })
        .unwrap();
        assert_eq!(value["dados"]["cidade"], "Rio de Janeiro");
        assert_eq!(value["cache_hit"], false);
        assert_eq!(coords.formatted_place(), "Rio de Janeiro, 21, Brasil");
    }
}
