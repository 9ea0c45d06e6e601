//! Column declarations for the people and planets listings.

use ratatui::prelude::*;

use crate::table::ColumnDef;
use crate::ui::cells::{mixed_cell, tags_text};

use super::types::{Person, Planet};

fn name_style() -> Style {
  Style::default().add_modifier(Modifier::BOLD)
}

fn measure_header() -> Style {
  Style::default().add_modifier(Modifier::ITALIC)
}

pub fn people_columns() -> Vec<ColumnDef<Person>> {
  vec![
    ColumnDef::content("name", "Name", |p: &Person| p.name.clone())
      .sortable(|p| p.name.as_str().into())
      .styled_cells(name_style())
      .width(Constraint::Fill(2)),
    ColumnDef::content("gender", "Gender", |p: &Person| p.gender.clone())
      .sortable(|p| p.gender.as_str().into()),
    ColumnDef::content("birth_year", "Birth Year", |p: &Person| p.birth_year.clone())
      .sortable(|p| p.birth_year.as_str().into()),
    ColumnDef::full_cell("height", "Height", |p: &Person| mixed_cell(&p.height, "cm"))
      .sortable(|p| p.height.sort_value())
      .styled_header(measure_header()),
    ColumnDef::full_cell("mass", "Mass", |p: &Person| mixed_cell(&p.mass, "kg"))
      .sortable(|p| p.mass.sort_value())
      .styled_header(measure_header()),
    ColumnDef::content("hair_color", "Hair Color", |p: &Person| tags_text(&p.hair_color)),
    ColumnDef::content("eye_color", "Eye Color", |p: &Person| tags_text(&p.eye_color)),
    ColumnDef::content("skin_color", "Skin Color", |p: &Person| tags_text(&p.skin_color)),
  ]
}

pub fn planet_columns() -> Vec<ColumnDef<Planet>> {
  vec![
    ColumnDef::content("name", "Name", |p: &Planet| p.name.clone())
      .sortable(|p| p.name.as_str().into())
      .styled_cells(name_style()),
    ColumnDef::content("climate", "Climate", |p: &Planet| tags_text(&p.climate)),
    ColumnDef::content("terrain", "Terrain", |p: &Planet| tags_text(&p.terrain))
      .width(Constraint::Fill(2)),
    ColumnDef::full_cell("population", "Population", |p: &Planet| {
      mixed_cell(&p.population, "")
    })
    .sortable(|p| p.population.sort_value())
    .styled_header(measure_header()),
    ColumnDef::full_cell("diameter", "Diameter", |p: &Planet| mixed_cell(&p.diameter, "km"))
      .sortable(|p| p.diameter.sort_value())
      .styled_header(measure_header()),
    ColumnDef::content("gravity", "Gravity", |p: &Planet| p.gravity.clone())
      .sortable(|p| p.gravity.as_str().into()),
    ColumnDef::full_cell("rotation_period", "Rotation Period", |p: &Planet| {
      mixed_cell(&p.rotation_period, "h")
    })
    .sortable(|p| p.rotation_period.sort_value())
    .styled_header(measure_header()),
    ColumnDef::full_cell("orbital_period", "Orbital Period", |p: &Planet| {
      mixed_cell(&p.orbital_period, "days")
    })
    .sortable(|p| p.orbital_period.sort_value())
    .styled_header(measure_header()),
    ColumnDef::full_cell("surface_water", "Surface Water", |p: &Planet| {
      mixed_cell(&p.surface_water, "%")
    })
    .sortable(|p| p.surface_water.sort_value())
    .styled_header(measure_header()),
  ]
}
