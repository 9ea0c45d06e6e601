mod people;
mod planet_detail;
mod planets;

pub use people::PeopleView;
pub use planet_detail::PlanetDetailView;
pub use planets::PlanetsView;

use crate::ui::view::ShortcutInfo;

/// Header hints shared by the listings
pub(crate) fn listing_shortcuts() -> Vec<ShortcutInfo> {
  vec![
    ShortcutInfo::new(":", "command").with_priority(10),
    ShortcutInfo::new("r/R", "refetch").with_priority(20),
    ShortcutInfo::new("h/l", "column").with_priority(30),
    ShortcutInfo::new("s/S", "sort").with_priority(40),
    ShortcutInfo::new("x", "unsort").with_priority(50),
    ShortcutInfo::new("1-9/0", "columns").with_priority(60),
    ShortcutInfo::new("q", "back").with_priority(90),
  ]
}
