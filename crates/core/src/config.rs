use crate::filter::SortMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub library: LibraryConfig,
    pub import: ImportConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "cardshelf.db".to_string(),
        }
    }
}

/// Fixed vocabularies: built-in collections (in display order) and tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub builtin_collections: Vec<String>,
    pub tiers: Vec<String>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            builtin_collections: vec!["Dayseal".to_string(), "Nightseal".to_string()],
            tiers: ["Seal", "Gold", "Silver", "Bronze"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub max_file_bytes: Option<u64>,
    pub skip_duplicates: bool,
    pub thumbnail_size: u32,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            include: vec!["*.pdf".to_string(), "*.gif".to_string()],
            exclude: Vec::new(),
            max_file_bytes: None,
            skip_duplicates: true,
            thumbnail_size: 256,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub reorder_enabled: bool,
    pub default_sort: SortMode,
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix("CARDSHELF")
            .prefix_separator("__")
            .separator("__"),
    );
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("shelf.toml");
        std::fs::write(
            &path,
            "[library]\ntiers = [\"S\", \"A\"]\n\n[ui]\nreorder_enabled = true\ndefault_sort = \"name_asc\"\n",
        )
        .unwrap();

        let cfg = load(Some(&path.to_string_lossy())).unwrap();
        assert_eq!(cfg.library.tiers, vec!["S", "A"]);
        assert_eq!(cfg.library.builtin_collections, vec!["Dayseal", "Nightseal"]);
        assert!(cfg.ui.reorder_enabled);
        assert_eq!(cfg.ui.default_sort, SortMode::NameAsc);
        assert_eq!(cfg.import.include, vec!["*.pdf", "*.gif"]);
        assert_eq!(cfg.database.path, "cardshelf.db");
    }
}
