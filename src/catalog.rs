use serde::Deserialize;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
  pub slug: String,
  #[serde(rename = "id")]
  pub podcast_id: u64,
  pub title: String,
  pub author: String,
  pub image: String,
  #[serde(default)]
  pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
  All,
  Only(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Catalog {
  entries: Vec<CatalogEntry>,
}

// slug, podcast id, title, author, image, description
const BUILTIN: &[(&str, u64, &str, &str, &str, &str)] = &[
  (
    "per-fare-il-post",
    234755,
    "Per fare il post",
    "Redazione de Il Post",
    "https://www.ilpost.it/wp-content/uploads/2023/09/19/1695103517-copertina676x355-autori.jpg?x84864",
    "Un podcast per conoscere il giornale, e la sua redazione.",
  ),
  (
    "morning",
    227474,
    "Morning",
    "Francesco Costa",
    "https://www.ilpost.it/wp-content/uploads/2021/05/evening-1.png",
    "Comincia la giornata con la rassegna stampa di Francesco Costa.",
  ),
  (
    "tienimi-bordone",
    227193,
    "Tienimi Bordone",
    "Matteo Bordone",
    "https://www.ilpost.it/wp-content/uploads/2021/04/app-tb.jpg",
    "Il podcast quotidiano di Matteo Bordone. Tutto quello che non sapevi di voler sapere.",
  ),
  (
    "politics",
    229701,
    "Politics",
    "Marco Simoni, Chiara Albanese",
    "https://www.ilpost.it/wp-content/uploads/2022/01/politics-1x1-1.jpg.webp",
    "La politica italiana spiegata bene, ogni giovedì. Con Marco Simoni e Chiara Albanese.",
  ),
  (
    "podcast-eurovision",
    227496,
    "Un podcast sull'Eurovision",
    "Giulia Balducci, Matteo Bordone, Luca Misculin, Stefano Vizio",
    "https://www.ilpost.it/wp-content/uploads/2023/05/05/1683279303-copertina500x500.jpg",
    "Inesorabile. Con Matteo Bordone, Giulia Balducci, Stefano Vizio e Luca Misculin.",
  ),
  (
    "tienimi_morning",
    231758,
    "Tienimi Morning",
    "Matteo Bordone e Francesco Costa",
    "https://www.ilpost.it/wp-content/uploads/2022/09/25/1664102867-tm.png",
    "Matteo Bordone e Francesco Costa, insieme, dal vivo.",
  ),
  (
    "il-podcast-del-post-su-sanremo",
    227196,
    "Un podcast su Sanremo",
    "Giulia Balducci, Matteo Bordone, Luca Misculin, Stefano Vizio",
    "https://www.ilpost.it/wp-content/uploads/2023/02/03/1675414490-copertina-podcast500x500.jpg",
    "Immancabile. Con Matteo Bordone, Giulia Balducci, Stefano Vizio e Luca Misculin.",
  ),
  (
    "tienimi-parigi",
    237733,
    "Tienimi Parigi",
    "Matteo Bordone",
    "https://www.ilpost.it/wp-content/uploads/2024/07/17/1721194784-Tienimi_parigi.jpg",
    "Tienimi Parigi è il podcast quotidiano di Matteo Bordone dedicato alle Olimpiadi di Parigi 2024: esce tutti i giorni, dal 26 luglio al 12 agosto",
  ),
  (
    "altre-indagini",
    236670,
    "Altre Indagini",
    "Stefano Nazzi",
    "https://www.ilpost.it/wp-content/uploads/2024/04/09/1712669037-altre-Indagini-logo-1.png",
    "Le puntate speciali di Indagini che raccontano le grandi vicende della storia italiana, di Stefano Nazzi.",
  ),
];

impl Catalog {
  pub fn builtin() -> Self {
    let entries = BUILTIN
      .iter()
      .map(
        |&(slug, podcast_id, title, author, image, description)| CatalogEntry {
          slug: slug.to_owned(),
          podcast_id,
          title: title.to_owned(),
          author: author.to_owned(),
          image: image.to_owned(),
          description: description.to_owned(),
        },
      )
      .collect();

    Self { entries }
  }

  /// Entries sharing a slug replace the existing one in place, others are
  /// appended.
  pub fn merge(
    mut self,
    overrides: impl IntoIterator<Item = CatalogEntry>,
  ) -> Self {
    for entry in overrides {
      match self.entries.iter_mut().find(|e| e.slug == entry.slug) {
        Some(existing) => *existing = entry,
        None => self.entries.push(entry),
      }
    }
    self
  }

  pub fn get(&self, slug: &str) -> Result<&CatalogEntry> {
    self
      .entries
      .iter()
      .find(|e| e.slug == slug)
      .ok_or_else(|| Error::UnknownPodcast(slug.to_owned()))
  }

  pub fn select(&self, target: &Target) -> Result<Vec<&CatalogEntry>> {
    match target {
      Target::All => Ok(self.entries.iter().collect()),
      Target::Only(slugs) => slugs.iter().map(|s| self.get(s)).collect(),
    }
  }

  pub fn entries(&self) -> &[CatalogEntry] {
    &self.entries
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(slug: &str, podcast_id: u64) -> CatalogEntry {
    CatalogEntry {
      slug: slug.to_owned(),
      podcast_id,
      title: slug.to_uppercase(),
      author: "Redazione".to_owned(),
      image: "https://example.com/cover.png".to_owned(),
      description: String::new(),
    }
  }

  #[test]
  fn test_builtin_catalog() {
    let catalog = Catalog::builtin();
    assert_eq!(catalog.entries().len(), 9);
    assert_eq!(catalog.entries()[0].slug, "per-fare-il-post");
    assert_eq!(catalog.get("morning").unwrap().podcast_id, 227474);
    assert_eq!(catalog.get("altre-indagini").unwrap().author, "Stefano Nazzi");
  }

  #[test]
  fn test_merge_replaces_and_appends() {
    let catalog = Catalog::builtin()
      .merge(vec![entry("morning", 1), entry("indagini", 2)]);

    assert_eq!(catalog.entries().len(), 10);
    assert_eq!(catalog.entries()[1].slug, "morning");
    assert_eq!(catalog.entries()[1].podcast_id, 1);
    assert_eq!(catalog.entries()[9].slug, "indagini");
  }

  #[test]
  fn test_select_keeps_requested_order() {
    let catalog = Catalog::builtin();
    let target = Target::Only(vec!["politics".into(), "morning".into()]);
    let slugs: Vec<_> = catalog
      .select(&target)
      .unwrap()
      .into_iter()
      .map(|e| e.slug.as_str())
      .collect();

    assert_eq!(slugs, ["politics", "morning"]);
    assert_eq!(catalog.select(&Target::All).unwrap().len(), 9);
  }

  #[test]
  fn test_select_unknown_slug() {
    let catalog = Catalog::builtin();
    let target = Target::Only(vec!["morning".into(), "nope".into()]);

    let err = catalog.select(&target).unwrap_err();
    assert!(matches!(err, Error::UnknownPodcast(slug) if slug == "nope"));
  }
}
