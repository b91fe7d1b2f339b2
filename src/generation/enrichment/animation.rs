//! Animation placeholder resolution against a simulation catalog.
//!
//! `[animation:<term>:<detailed>]` is matched word-by-word against catalog
//! keys; the first entry in declaration order whose key contains one of the
//! words wins. Unmatched placeholders are left in place.

use regex::{Captures, Regex};
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::escape_html;

static ANIMATION_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[animation:([^:\]]+):([^\]]+)\]").expect("valid animation placeholder regex")
});

const ATTRIBUTION: &str = "Simulation by PhET Interactive Simulations, University of Colorado Boulder, licensed under CC-BY 4.0.";

/// One embeddable simulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Lowercase match key, e.g. "pendulum"
    pub key: String,
    /// PhET simulation id, e.g. "pendulum-lab"
    pub simulation_id: String,
}

impl CatalogEntry {
    pub fn new(key: impl Into<String>, simulation_id: impl Into<String>) -> Self {
        Self {
            key: key.into().to_lowercase(),
            simulation_id: simulation_id.into(),
        }
    }

    pub fn embed_url(&self) -> String {
        format!(
            "https://phet.colorado.edu/sims/html/{id}/latest/{id}_en.html",
            id = self.simulation_id
        )
    }
}

/// Ordered simulation catalog
#[derive(Debug, Clone)]
pub struct AnimationCatalog {
    entries: Vec<CatalogEntry>,
}

impl Default for AnimationCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AnimationCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// Physics, chemistry, biology and math simulations
    pub fn builtin() -> Self {
        let entries = [
            ("pendulum", "pendulum-lab"),
            ("projectile", "projectile-motion"),
            ("wave string", "wave-on-a-string"),
            ("interference", "wave-interference"),
            ("circuit electricity", "circuit-construction-kit-dc"),
            ("ohm resistance", "ohms-law"),
            ("faraday magnet induction", "faradays-law"),
            ("gravity orbit planet", "gravity-and-orbits"),
            ("force motion push", "forces-and-motion-basics"),
            ("friction", "friction"),
            ("spring hooke", "hookes-law"),
            ("energy skate", "energy-skate-park-basics"),
            ("collision momentum", "collision-lab"),
            ("balance torque lever", "balancing-act"),
            ("density mass volume", "density"),
            ("buoyancy float", "buoyancy"),
            ("light refraction bending", "bending-light"),
            ("color vision", "color-vision"),
            ("gas pressure temperature", "gas-properties"),
            ("states matter solid liquid", "states-of-matter-basics"),
            ("molecule shape", "molecule-shapes"),
            ("atom build", "build-an-atom"),
            ("acid base", "acid-base-solutions"),
            ("concentration solution", "concentration"),
            ("equation balancing chemical", "balancing-chemical-equations"),
            ("greenhouse climate", "greenhouse-effect"),
            ("selection evolution", "natural-selection"),
            ("fraction", "fractions-intro"),
            ("graph line slope", "graphing-lines"),
            ("area model multiplication", "area-model-multiplication"),
        ];

        Self::new(
            entries
                .into_iter()
                .map(|(key, id)| CatalogEntry::new(key, id))
                .collect(),
        )
    }

    /// First entry whose key contains any word of `term`
    pub fn lookup(&self, term: &str) -> Option<&CatalogEntry> {
        let term = term.to_lowercase();
        let words: Vec<&str> = term.split_whitespace().collect();

        self.entries
            .iter()
            .find(|entry| words.iter().any(|word| entry.key.contains(word)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct AnimationResolver {
    catalog: AnimationCatalog,
}

impl AnimationResolver {
    pub fn new(catalog: AnimationCatalog) -> Self {
        Self { catalog }
    }

    /// Replace matched animation placeholders with simulation embeds
    pub fn process_animation_placeholders(&self, html: &str) -> String {
        ANIMATION_PLACEHOLDER
            .replace_all(html, |caps: &Captures| {
                let term = caps[1].trim();
                let detailed = caps[2].trim();

                match self.catalog.lookup(term) {
                    Some(entry) => {
                        debug!("Animation '{}' matched {}", term, entry.simulation_id);
                        render_embed(entry, detailed)
                    }
                    None => {
                        warn!("No simulation matches animation term '{}'", term);
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }
}

impl Default for AnimationResolver {
    fn default() -> Self {
        Self::new(AnimationCatalog::builtin())
    }
}

fn render_embed(entry: &CatalogEntry, caption: &str) -> String {
    let caption = escape_html(caption);
    format!(
        concat!(
            "<div class=\"lesson-animation\">",
            "<div class=\"lesson-animation-frame\">",
            "<iframe src=\"{url}\" title=\"{caption}\" width=\"800\" height=\"600\" loading=\"lazy\" allowfullscreen></iframe>",
            "</div>",
            "<p class=\"lesson-animation-caption\">{caption}</p>",
            "<p class=\"lesson-animation-attribution\">{attribution}</p>",
            "</div>"
        ),
        url = entry.embed_url(),
        caption = caption,
        attribution = ATTRIBUTION
    )
}
