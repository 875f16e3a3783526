use clap::ValueEnum;

use crate::config::TrackerConfig;
use crate::error::Result;
use crate::series::{Series, UNKNOWN};
use crate::store::{SeriesStore, SortField};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub(crate) enum ListFilter {
    #[default]
    All,
    Complete,
    Incomplete,
    /// Series missing a volume between two owned ones.
    Gaps,
    /// Series without any owned volumes.
    Wishlist,
}

impl ListFilter {
    fn accepts(&self, series: &Series) -> bool {
        match self {
            Self::All => true,
            Self::Complete => series.is_completed(),
            Self::Incomplete => !series.is_completed(),
            Self::Gaps => series.volumes().has_gap(),
            Self::Wishlist => series.volumes().is_empty(),
        }
    }

    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Self::All => "",
            Self::Complete => "completed ",
            Self::Incomplete => "incomplete ",
            Self::Gaps => "gapped ",
            Self::Wishlist => "wishlisted ",
        }
    }
}

/// Loads the series matching `filter`, in `order`.
///
/// Empty series are only shown when the config asks for them or the wishlist is requested.
/// For the full list, series whose sort key is still "Unknown" go last.
pub(crate) fn list_series(
    store: &SeriesStore,
    config: &TrackerConfig,
    filter: ListFilter,
    order: SortField,
) -> Result<Vec<Series>> {
    let mut known = Vec::new();
    let mut unknown = Vec::new();
    for row in store.scan_all(order)? {
        let unknown_key = order.key(&row) == UNKNOWN;
        let series = Series::from_row(row, config.volume_limit)?;
        if !config.show_empty_series
            && filter != ListFilter::Wishlist
            && series.volumes().is_empty()
        {
            continue;
        }
        if !filter.accepts(&series) {
            continue;
        }
        if filter == ListFilter::All && unknown_key {
            unknown.push(series);
        } else {
            known.push(series);
        }
    }
    known.extend(unknown);
    Ok(known)
}

/// Search results, decoded. Empty series are included: a search names what it wants.
pub(crate) fn search_series(
    store: &SeriesStore,
    config: &TrackerConfig,
    term: &str,
) -> Result<Vec<Series>> {
    store
        .search(term)?
        .into_iter()
        .map(|row| Series::from_row(row, config.volume_limit))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::NewSeries;
    use crate::volumes::VolumeSet;

    fn store_with_samples() -> (tempfile::TempDir, SeriesStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SeriesStore::open_or_create(&dir.path().join("manga.db")).unwrap();
        let samples = [
            ("Berserk", "1-3, 5", Some("Kentaro Miura"), false),
            ("Akira", "1-6", Some("Katsuhiro Otomo"), true),
            ("Mystery Box", "2", None, false),
            ("Vagabond", "", Some("Takehiko Inoue"), false),
        ];
        for (name, volumes, author, completed) in samples {
            let mut draft = NewSeries::new(name, VolumeSet::from_ranges(volumes, 128));
            draft.author = author.map(str::to_string);
            draft.completed = completed;
            let mut series = Series::new(draft).unwrap();
            store.save(&mut series).unwrap();
        }
        (dir, store)
    }

    fn names(series: &[Series]) -> Vec<&str> {
        series.iter().map(Series::name).collect()
    }

    #[test]
    fn lists_hide_empty_series_by_default() {
        let (_dir, store) = store_with_samples();
        let mut config = TrackerConfig::default();
        let all = list_series(&store, &config, ListFilter::All, SortField::Name).unwrap();
        assert_eq!(names(&all), ["Akira", "Berserk", "Mystery Box"]);

        config.show_empty_series = true;
        let all = list_series(&store, &config, ListFilter::All, SortField::Name).unwrap();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn unknown_sort_keys_go_last() {
        let (_dir, store) = store_with_samples();
        let config = TrackerConfig::default();
        let by_author = list_series(&store, &config, ListFilter::All, SortField::Author).unwrap();
        assert_eq!(names(&by_author), ["Akira", "Berserk", "Mystery Box"]);
        let by_publisher =
            list_series(&store, &config, ListFilter::All, SortField::Publisher).unwrap();
        assert_eq!(names(&by_publisher), ["Akira", "Berserk", "Mystery Box"]);
    }

    #[test]
    fn filters() {
        let (_dir, store) = store_with_samples();
        let config = TrackerConfig::default();
        let list = |filter| list_series(&store, &config, filter, SortField::Name).unwrap();
        assert_eq!(names(&list(ListFilter::Complete)), ["Akira"]);
        assert_eq!(names(&list(ListFilter::Incomplete)), ["Berserk", "Mystery Box"]);
        assert_eq!(names(&list(ListFilter::Gaps)), ["Berserk"]);
        assert_eq!(names(&list(ListFilter::Wishlist)), ["Vagabond"]);
    }

    #[test]
    fn search_includes_empty_series() {
        let (_dir, store) = store_with_samples();
        let config = TrackerConfig::default();
        let found = search_series(&store, &config, "inoue").unwrap();
        assert_eq!(names(&found), ["Vagabond"]);
    }
}
