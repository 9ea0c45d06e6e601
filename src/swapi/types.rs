//! SWAPI records and the view types parsed from them.
//!
//! The API serves every field as a string. Numeric-looking fields become
//! `Measure::Number`, everything else (`"unknown"`, `"n/a"`) stays text, and
//! comma lists are split into tags.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::fetch::ParseError;
use crate::table::SortValue;

/// A quantity the API reports either as a number or as free text.
#[derive(Debug, Clone, PartialEq)]
pub enum Measure {
  Number(f64),
  Text(String),
}

impl Measure {
  pub fn parse(raw: &str) -> Self {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
      Ok(n) if n.is_finite() && !trimmed.is_empty() => Self::Number(n),
      _ => Self::Text(raw.to_string()),
    }
  }

  pub fn as_number(&self) -> Option<f64> {
    match self {
      Self::Number(n) => Some(*n),
      Self::Text(_) => None,
    }
  }

  /// Numbers sort, text reads as null so it trails either direction.
  pub fn sort_value(&self) -> SortValue {
    self.as_number().into()
  }
}

impl fmt::Display for Measure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Number(n) => f.write_str(&format_number(*n)),
      Self::Text(text) => f.write_str(text),
    }
  }
}

/// Group thousands and keep at most three fraction digits.
pub fn format_number(n: f64) -> String {
  let rendered = format!("{:.3}", n.abs());
  let (int_part, frac_part) = rendered.split_once('.').unwrap_or((rendered.as_str(), ""));
  let frac_part = frac_part.trim_end_matches('0');

  let mut grouped = String::new();
  for (i, digit) in int_part.chars().enumerate() {
    if i > 0 && (int_part.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(digit);
  }

  let is_zero = frac_part.is_empty() && int_part.chars().all(|c| c == '0');
  let sign = if n < 0.0 && !is_zero { "-" } else { "" };
  if frac_part.is_empty() {
    format!("{}{}", sign, grouped)
  } else {
    format!("{}{}.{}", sign, grouped, frac_part)
  }
}

fn split_list(raw: &str) -> Vec<String> {
  raw
    .split(',')
    .map(str::trim)
    .filter(|part| !part.is_empty())
    .map(str::to_string)
    .collect()
}

fn checked_url(field: &str, raw: String) -> Result<String, ParseError> {
  Url::parse(&raw)
    .map_err(|e| ParseError::invalid(format!("{}: invalid URL {:?}: {}", field, raw, e)))?;
  Ok(raw)
}

fn checked_urls(field: &str, raw: Vec<String>) -> Result<Vec<String>, ParseError> {
  raw.into_iter().map(|url| checked_url(field, url)).collect()
}

#[derive(Debug, Deserialize)]
struct RawPerson {
  name: String,
  height: String,
  mass: String,
  hair_color: String,
  skin_color: String,
  eye_color: String,
  birth_year: String,
  gender: String,
  homeworld: String,
  films: Vec<String>,
  species: Vec<String>,
  vehicles: Vec<String>,
  starships: Vec<String>,
  created: DateTime<Utc>,
  edited: DateTime<Utc>,
  url: String,
}

#[derive(Debug, Deserialize)]
struct RawPlanet {
  name: String,
  rotation_period: String,
  orbital_period: String,
  diameter: String,
  climate: String,
  gravity: String,
  terrain: String,
  surface_water: String,
  population: String,
  residents: Vec<String>,
  films: Vec<String>,
  created: DateTime<Utc>,
  edited: DateTime<Utc>,
  url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
  pub name: String,
  pub height: Measure,
  pub mass: Measure,
  pub hair_color: Vec<String>,
  pub skin_color: Vec<String>,
  pub eye_color: Vec<String>,
  pub birth_year: String,
  pub gender: String,
  pub homeworld: String,
  pub films: Vec<String>,
  pub species: Vec<String>,
  pub vehicles: Vec<String>,
  pub starships: Vec<String>,
  pub created: DateTime<Utc>,
  pub edited: DateTime<Utc>,
  pub url: String,
}

impl TryFrom<RawPerson> for Person {
  type Error = ParseError;

  fn try_from(raw: RawPerson) -> Result<Self, Self::Error> {
    Ok(Self {
      height: Measure::parse(&raw.height),
      mass: Measure::parse(&raw.mass),
      hair_color: split_list(&raw.hair_color),
      skin_color: split_list(&raw.skin_color),
      eye_color: split_list(&raw.eye_color),
      homeworld: checked_url("homeworld", raw.homeworld)?,
      films: checked_urls("films", raw.films)?,
      species: checked_urls("species", raw.species)?,
      vehicles: checked_urls("vehicles", raw.vehicles)?,
      starships: checked_urls("starships", raw.starships)?,
      url: checked_url("url", raw.url)?,
      name: raw.name,
      birth_year: raw.birth_year,
      gender: raw.gender,
      created: raw.created,
      edited: raw.edited,
    })
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Planet {
  pub name: String,
  pub rotation_period: Measure,
  pub orbital_period: Measure,
  pub diameter: Measure,
  pub climate: Vec<String>,
  pub gravity: String,
  pub terrain: Vec<String>,
  pub surface_water: Measure,
  pub population: Measure,
  pub residents: Vec<String>,
  pub films: Vec<String>,
  pub created: DateTime<Utc>,
  pub edited: DateTime<Utc>,
  pub url: String,
}

impl TryFrom<RawPlanet> for Planet {
  type Error = ParseError;

  fn try_from(raw: RawPlanet) -> Result<Self, Self::Error> {
    Ok(Self {
      rotation_period: Measure::parse(&raw.rotation_period),
      orbital_period: Measure::parse(&raw.orbital_period),
      diameter: Measure::parse(&raw.diameter),
      surface_water: Measure::parse(&raw.surface_water),
      population: Measure::parse(&raw.population),
      climate: split_list(&raw.climate),
      terrain: split_list(&raw.terrain),
      residents: checked_urls("residents", raw.residents)?,
      films: checked_urls("films", raw.films)?,
      url: checked_url("url", raw.url)?,
      name: raw.name,
      gravity: raw.gravity,
      created: raw.created,
      edited: raw.edited,
    })
  }
}

pub fn parse_people(raw: Value) -> Result<Vec<Person>, ParseError> {
  let records: Vec<RawPerson> = serde_json::from_value(raw)?;
  records.into_iter().map(Person::try_from).collect()
}

pub fn parse_planets(raw: Value) -> Result<Vec<Planet>, ParseError> {
  let records: Vec<RawPlanet> = serde_json::from_value(raw)?;
  records.into_iter().map(Planet::try_from).collect()
}

pub fn parse_planet(raw: Value) -> Result<Planet, ParseError> {
  let record: RawPlanet = serde_json::from_value(raw)?;
  Planet::try_from(record)
}


#[cfg(test)]
mod tests {
  use super::fixtures::*;
  use super::*;
  use serde_json::json;

  #[test]
  fn test_measure_parse() {
    assert_eq!(Measure::parse("172"), Measure::Number(172.0));
    assert_eq!(Measure::parse("1.1"), Measure::Number(1.1));
    assert_eq!(Measure::parse("unknown"), Measure::Text("unknown".into()));
    assert_eq!(Measure::parse("1,358"), Measure::Text("1,358".into()));
    assert_eq!(Measure::parse(""), Measure::Text(String::new()));
    assert_eq!(Measure::parse("inf"), Measure::Text("inf".into()));
  }

  #[test]
  fn test_format_number() {
    assert_eq!(format_number(0.0), "0");
    assert_eq!(format_number(77.0), "77");
    assert_eq!(format_number(200000.0), "200,000");
    assert_eq!(format_number(1000000000000.0), "1,000,000,000,000");
    assert_eq!(format_number(-1234.5), "-1,234.5");
    assert_eq!(format_number(0.1234), "0.123");
  }

  #[test]
  fn test_parse_people() {
    let people = parse_people(json!([luke(), jabba()])).unwrap();
    assert_eq!(people.len(), 2);

    let luke = &people[0];
    assert_eq!(luke.height, Measure::Number(172.0));
    assert_eq!(luke.hair_color, ["blond"]);
    assert_eq!(luke.homeworld, "https://swapi.info/api/planets/1");
    assert_eq!(luke.created.timestamp(), 1418133051);

    let jabba = &people[1];
    assert_eq!(jabba.mass, Measure::Text("1,358".into()));
    assert_eq!(jabba.skin_color, ["green-tan", "brown"]);
    assert_eq!(jabba.mass.sort_value(), SortValue::Null);
  }

  #[test]
  fn test_parse_planets() {
    let planets = parse_planets(json!([tatooine(), hoth()])).unwrap();
    assert_eq!(planets[1].terrain, ["tundra", "ice caves", "mountain ranges"]);
    assert_eq!(planets[1].population, Measure::Text("unknown".into()));
    assert_eq!(planets[0].diameter.to_string(), "10,465");
  }

  #[test]
  fn test_invalid_url_rejected() {
    let mut record = tatooine();
    record["url"] = json!("not a url");
    let err = parse_planet(record).unwrap_err();
    assert!(err.to_string().starts_with("url: invalid URL"), "{}", err);
  }

  #[test]
  fn test_missing_field_rejected() {
    let mut record = luke();
    record.as_object_mut().unwrap().remove("gender");
    let err = parse_people(json!([record])).unwrap_err();
    assert!(err.to_string().contains("gender"));
  }
}
