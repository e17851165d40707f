//! Query parameter extractors for list endpoints.
//!
//! Enum-valued filters arrive as plain strings and are parsed in the
//! handlers so a bad value yields a `VALIDATION_ERROR` envelope rather than
//! axum's plain-text rejection.

use serde::Deserialize;

use kindred_types::asset::AssetSearch;

use crate::http::error::AppError;

#[derive(Debug, Deserialize, Default)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

/// `?kind=&limit=` for interactions, media and memories.
#[derive(Debug, Deserialize, Default)]
pub struct KindQuery {
    pub kind: Option<String>,
    pub limit: Option<u32>,
}

impl KindQuery {
    /// Parse `kind` with the target type's `FromStr`.
    pub fn parsed_kind<T>(&self) -> Result<Option<T>, AppError>
    where
        T: std::str::FromStr<Err = String>,
    {
        self.kind
            .as_deref()
            .map(|k| k.parse::<T>().map_err(AppError::Validation))
            .transpose()
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct VoicemailQuery {
    #[serde(default)]
    pub unheard: bool,
}

/// Asset listing filters. `tags` is comma-separated; every tag must match.
#[derive(Debug, Deserialize, Default)]
pub struct AssetListQuery {
    #[serde(rename = "type")]
    pub asset_type: Option<String>,
    pub tags: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl AssetListQuery {
    pub fn to_search(&self) -> Result<AssetSearch, AppError> {
        let defaults = AssetSearch::default();
        Ok(AssetSearch {
            asset_type: self
                .asset_type
                .as_deref()
                .map(|t| t.parse().map_err(AppError::Validation))
                .transpose()?,
            tags: self
                .tags
                .as_deref()
                .map(|t| {
                    t.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            limit: self.limit.unwrap_or(defaults.limit),
            offset: self.offset.unwrap_or(defaults.offset),
        })
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct AssetGetQuery {
    pub version: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AssetDeleteQuery {
    #[serde(default)]
    pub cascade: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct DependencyQuery {
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Deserialize, Default)]
pub struct OrphanQuery {
    #[serde(rename = "type")]
    pub asset_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    use kindred_types::asset::AssetType;
    use kindred_types::interaction::MediaKind;

    #[test]
    fn test_asset_query_splits_tags() {
        let query = AssetListQuery {
            asset_type: Some("scene".into()),
            tags: Some("cozy, night,,".into()),
            limit: None,
            offset: Some(10),
        };
        let search = query.to_search().unwrap();
        assert_eq!(search.asset_type, Some(AssetType::Scene));
        assert_eq!(search.tags, vec!["cozy", "night"]);
        assert_eq!(search.limit, 100);
        assert_eq!(search.offset, 10);
    }

    #[test]
    fn test_bad_kind_is_validation_error() {
        let query = KindQuery {
            kind: Some("hologram".into()),
            limit: None,
        };
        assert!(matches!(
            query.parsed_kind::<MediaKind>(),
            Err(AppError::Validation(_))
        ));
    }
}
