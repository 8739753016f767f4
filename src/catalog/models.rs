//! Response shapes of the movie catalog API.
//!
//! Only the fields the engine consumes are modeled; everything else the
//! catalog sends is ignored on decode.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dao::documents::{Candidate, CandidateId, MediaKind};

/// One page of search / discover / trending results.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PageResponse {
    /// Page number echoed back by the catalog.
    #[serde(default)]
    pub page: u32,
    /// Entries on this page.
    #[serde(default)]
    pub results: Vec<CatalogEntry>,
    /// Total number of pages available.
    #[serde(default = "one")]
    pub total_pages: u32,
}

fn one() -> u32 {
    1
}

/// A raw catalog listing. Movies use `title`/`release_date`, shows use
/// `name`/`first_air_date`; both spellings are kept so either kind decodes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CatalogEntry {
    /// Catalog id.
    pub id: CandidateId,
    /// Movie title.
    #[serde(default)]
    pub title: Option<String>,
    /// Show name.
    #[serde(default)]
    pub name: Option<String>,
    /// Original-language movie title.
    #[serde(default)]
    pub original_title: Option<String>,
    /// Original-language show name.
    #[serde(default)]
    pub original_name: Option<String>,
    /// Poster reference.
    #[serde(default)]
    pub poster_path: Option<String>,
    /// Average rating, 0-10.
    #[serde(default)]
    pub vote_average: f64,
    /// Movie release date.
    #[serde(default)]
    pub release_date: Option<String>,
    /// Show first-air date.
    #[serde(default)]
    pub first_air_date: Option<String>,
    /// Short synopsis.
    #[serde(default)]
    pub overview: Option<String>,
    /// Genre ids attached to the listing.
    #[serde(default)]
    pub genre_ids: Vec<u32>,
}

impl CatalogEntry {
    /// Display title with the same fallback chain the pool has always used.
    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.name.clone())
            .or_else(|| self.original_title.clone())
            .or_else(|| self.original_name.clone())
            .unwrap_or_else(|| "Untitled".into())
    }

    /// Snapshot the entry into a pool candidate of the given kind.
    pub fn candidate(&self, kind: MediaKind) -> Candidate {
        Candidate {
            id: self.id,
            title: self.display_title(),
            poster_path: self.poster_path.clone(),
            vote_average: self.vote_average,
            release_date: self
                .release_date
                .clone()
                .or_else(|| self.first_air_date.clone())
                .unwrap_or_default(),
            media_type: kind,
        }
    }
}

/// Full metadata for a single title.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TitleDetails {
    /// Catalog id.
    pub id: CandidateId,
    /// Movie title.
    #[serde(default)]
    pub title: Option<String>,
    /// Show name.
    #[serde(default)]
    pub name: Option<String>,
    /// Synopsis.
    #[serde(default)]
    pub overview: Option<String>,
    /// Runtime in minutes (movies).
    #[serde(default)]
    pub runtime: Option<u32>,
    /// Episode runtimes (shows).
    #[serde(default)]
    pub episode_run_time: Vec<u32>,
    /// Poster reference.
    #[serde(default)]
    pub poster_path: Option<String>,
    /// Average rating, 0-10.
    #[serde(default)]
    pub vote_average: f64,
    /// Movie release date.
    #[serde(default)]
    pub release_date: Option<String>,
    /// Show first-air date.
    #[serde(default)]
    pub first_air_date: Option<String>,
    /// Full genre objects.
    #[serde(default)]
    pub genres: Vec<Genre>,
}

/// A catalog genre.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Genre {
    /// Genre id used in discovery filters.
    pub id: u32,
    /// Human-readable name.
    pub name: String,
}

/// Response of the genre-list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenreList {
    /// All genres for the requested kind.
    #[serde(default)]
    pub genres: Vec<Genre>,
}

/// Reference to a streaming provider.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderRef {
    /// Provider id used in discovery filters.
    pub provider_id: u32,
    /// Provider display name.
    pub provider_name: String,
    /// Provider logo reference.
    #[serde(default)]
    pub logo_path: Option<String>,
}

/// Per-region availability buckets for one title.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProviderRegion {
    /// Catalog deep link for the region.
    #[serde(default)]
    pub link: Option<String>,
    /// Subscription streaming.
    #[serde(default)]
    pub flatrate: Vec<ProviderRef>,
    /// Rental.
    #[serde(default)]
    pub rent: Vec<ProviderRef>,
    /// Purchase.
    #[serde(default)]
    pub buy: Vec<ProviderRef>,
    /// Free with account.
    #[serde(default)]
    pub free: Vec<ProviderRef>,
    /// Ad-supported.
    #[serde(default)]
    pub ads: Vec<ProviderRef>,
}

/// Watch-provider lookup for a single title, keyed by region code.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct WatchProviders {
    /// Region code -> availability buckets.
    #[serde(default)]
    pub results: HashMap<String, ProviderRegion>,
}

/// Region-wide provider directory used to resolve provider ids by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProviderDirectory {
    /// Every provider active in the requested region.
    #[serde(default)]
    pub results: Vec<ProviderRef>,
}

/// Resolved ids of the providers the filter toggles refer to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderIds {
    /// Netflix, when offered in the region.
    pub netflix: Option<u32>,
    /// Prime Video.
    pub prime: Option<u32>,
    /// Hotstar.
    pub hotstar: Option<u32>,
}

impl ProviderIds {
    /// Resolve the well-known providers out of a region directory.
    pub fn resolve(directory: &ProviderDirectory) -> Self {
        let find = |patterns: &[&str]| {
            directory.results.iter().find_map(|provider| {
                let name = provider.provider_name.to_lowercase();
                patterns
                    .iter()
                    .any(|p| name.contains(p))
                    .then_some(provider.provider_id)
            })
        };

        Self {
            netflix: find(&["netflix"]),
            prime: find(&["prime video", "amazon prime"]),
            hotstar: find(&["hotstar"]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_title_falls_back_through_both_kinds() {
        let entry = CatalogEntry {
            id: 1,
            name: Some("Dark".into()),
            ..CatalogEntry::default()
        };
        assert_eq!(entry.display_title(), "Dark");

        let empty = CatalogEntry {
            id: 2,
            ..CatalogEntry::default()
        };
        assert_eq!(empty.display_title(), "Untitled");
    }

    #[test]
    fn provider_resolution_matches_by_name_fragment() {
        let directory = ProviderDirectory {
            results: vec![
                ProviderRef {
                    provider_id: 8,
                    provider_name: "Netflix".into(),
                    logo_path: None,
                },
                ProviderRef {
                    provider_id: 119,
                    provider_name: "Amazon Prime Video".into(),
                    logo_path: None,
                },
            ],
        };
        let ids = ProviderIds::resolve(&directory);
        assert_eq!(ids.netflix, Some(8));
        assert_eq!(ids.prime, Some(119));
        assert_eq!(ids.hotstar, None);
    }
}
