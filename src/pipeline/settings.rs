use image::Rgb;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{AppError, Result};

/// Color categories the classifier thresholds on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Coin,
    Path,
    Player,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Coin, Category::Path, Category::Player];

    pub fn name(&self) -> &'static str {
        match self {
            Category::Coin => "coin",
            Category::Path => "path",
            Category::Player => "player",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive per-channel RGB bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorRange {
    pub min: Rgb<u8>,
    pub max: Rgb<u8>,
}

impl ColorRange {
    pub fn new(min: [u8; 3], max: [u8; 3]) -> Result<Self> {
        if min.iter().zip(max.iter()).any(|(lo, hi)| lo > hi) {
            return Err(AppError::Configuration(format!(
                "color range min {min:?} exceeds max {max:?}"
            )));
        }
        Ok(Self {
            min: Rgb(min),
            max: Rgb(max),
        })
    }

    /// Accepts every color.
    pub fn everything() -> Self {
        Self {
            min: Rgb([0, 0, 0]),
            max: Rgb([255, 255, 255]),
        }
    }

    #[inline]
    pub fn contains(&self, px: &Rgb<u8>) -> bool {
        (0..3).all(|c| self.min[c] <= px[c] && px[c] <= self.max[c])
    }
}

#[derive(Debug, Deserialize)]
struct SettingsDocument {
    rgb: BTreeMap<String, RangeEntry>,
}

#[derive(Debug, Deserialize)]
struct RangeEntry {
    min: [u8; 3],
    max: [u8; 3],
}

/// Named color ranges, immutable once loaded.
///
/// The settings document looks like
/// `{"rgb": {"coin": {"min": [R, G, B], "max": [R, G, B]}, ...}}` and must
/// define at least `coin`, `path` and `player`. Other categories are kept and
/// can be looked up by name.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorRangeSettings {
    coin: ColorRange,
    path: ColorRange,
    player: ColorRange,
    extra: BTreeMap<String, ColorRange>,
}

impl ColorRangeSettings {
    pub fn new(coin: ColorRange, path: ColorRange, player: ColorRange) -> Self {
        Self {
            coin,
            path,
            player,
            extra: BTreeMap::new(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading color range settings from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let document: SettingsDocument = serde_json::from_str(text)
            .map_err(|e| AppError::Configuration(format!("malformed settings: {e}")))?;

        let mut ranges = BTreeMap::new();
        for (name, entry) in document.rgb {
            let range = ColorRange::new(entry.min, entry.max)
                .map_err(|e| AppError::Configuration(format!("category '{name}': {e}")))?;
            debug!("Category {} -> {:?}..={:?}", name, entry.min, entry.max);
            ranges.insert(name, range);
        }

        let mut take = |category: Category| {
            ranges.remove(category.name()).ok_or_else(|| {
                AppError::Configuration(format!("missing color range for '{category}'"))
            })
        };
        let coin = take(Category::Coin)?;
        let path = take(Category::Path)?;
        let player = take(Category::Player)?;

        Ok(Self {
            coin,
            path,
            player,
            extra: ranges,
        })
    }

    pub fn range(&self, category: Category) -> &ColorRange {
        match category {
            Category::Coin => &self.coin,
            Category::Path => &self.path,
            Category::Player => &self.player,
        }
    }

    pub fn get(&self, name: &str) -> Option<&ColorRange> {
        Category::ALL
            .iter()
            .find(|c| c.name() == name)
            .map(|c| self.range(*c))
            .or_else(|| self.extra.get(name))
    }
}
