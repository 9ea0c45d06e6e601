//! Shared resource definitions for the SWAPI endpoints.
//!
//! Definitions are process-wide statics so every view observing the same
//! endpoint lands in the same cache namespace.

use std::sync::LazyLock;

use url::Url;

use crate::fetch::{define_resource_with, ResourceDefinition};

use super::types::{parse_people, parse_planet, parse_planets, Person, Planet};

/// Validated API root, always ending in `/` so endpoints join beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiBase(Url);

impl ApiBase {
  pub fn parse(raw: &str) -> Result<Self, url::ParseError> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
      let path = format!("{}/", url.path());
      url.set_path(&path);
    }
    Ok(Self(url))
  }

  pub fn endpoint(&self, name: &str) -> Option<String> {
    self.0.join(name).ok().map(String::from)
  }

  pub fn as_str(&self) -> &str {
    self.0.as_str()
  }
}

pub static PEOPLE: LazyLock<ResourceDefinition<Vec<Person>, ApiBase>> =
  LazyLock::new(|| define_resource_with(|base: &ApiBase| base.endpoint("people"), parse_people));

pub static PLANETS: LazyLock<ResourceDefinition<Vec<Planet>, ApiBase>> =
  LazyLock::new(|| define_resource_with(|base: &ApiBase| base.endpoint("planets"), parse_planets));

/// A single planet by its canonical URL. No link, no fetch.
pub static PLANET_BY_URL: LazyLock<ResourceDefinition<Planet, Option<String>>> =
  LazyLock::new(|| define_resource_with(|link: &Option<String>| link.clone(), parse_planet));
