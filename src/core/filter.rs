use crate::domain::model::{cell_text, Dataset, FilterCriteria, Row, CATEGORY_COLUMN, DATE_COLUMNS};
use crate::domain::ports::FilterObserver;
use chrono::{DateTime, NaiveDate};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Stable filter of `dataset` by search term, category and date range.
///
/// All active conditions must hold. Rows keep their original order and an
/// empty criteria returns the dataset unchanged.
pub fn filter_dataset(dataset: &Dataset, criteria: &FilterCriteria) -> Dataset {
    if dataset.is_empty() || criteria.is_empty() {
        return dataset.clone();
    }

    let needle = criteria.search_term.to_lowercase();

    dataset
        .iter()
        .filter(|row| needle.is_empty() || matches_search(row, &needle))
        .filter(|row| !criteria.filters_category() || matches_category(row, &criteria.category))
        .filter(|row| match &criteria.date_range {
            Some(range) => row_date(row).is_some_and(|date| range.contains(date)),
            None => true,
        })
        .cloned()
        .collect()
}

/// `needle` must already be lower-cased.
fn matches_search(row: &Row, needle: &str) -> bool {
    row.values()
        .filter_map(cell_text)
        .any(|text| text.to_lowercase().contains(needle))
}

fn matches_category(row: &Row, category: &str) -> bool {
    row.text(CATEGORY_COLUMN)
        .is_some_and(|value| value == category)
}

pub fn row_date(row: &Row) -> Option<NaiveDate> {
    row.lookup(&DATE_COLUMNS)
        .and_then(cell_text)
        .and_then(|text| parse_date(text.trim()))
}

/// Accepts ISO dates, slash-separated dates and RFC 3339 timestamps.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// Holds the current criteria and pushes every new filtered dataset to the
/// registered observers.
pub struct FilterEngine<'a> {
    criteria: FilterCriteria,
    observers: Vec<Box<dyn FilterObserver + 'a>>,
}

impl<'a> FilterEngine<'a> {
    pub fn new(criteria: FilterCriteria) -> Self {
        Self {
            criteria,
            observers: Vec::new(),
        }
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn subscribe(&mut self, observer: impl FilterObserver + 'a) {
        self.observers.push(Box::new(observer));
    }

    pub fn set_search(&mut self, dataset: &Dataset, term: impl Into<String>) -> Dataset {
        self.criteria.search_term = term.into();
        self.apply(dataset)
    }

    pub fn set_category(&mut self, dataset: &Dataset, category: impl Into<String>) -> Dataset {
        self.criteria.category = category.into();
        self.apply(dataset)
    }

    pub fn apply(&self, dataset: &Dataset) -> Dataset {
        let filtered = filter_dataset(dataset, &self.criteria);
        tracing::debug!(
            "Filter kept {} of {} rows (search: {:?}, category: {:?})",
            filtered.len(),
            dataset.len(),
            self.criteria.search_term,
            self.criteria.category
        );
        for observer in &self.observers {
            observer.on_filter_change(&filtered);
        }
        filtered
    }
}

impl Default for FilterEngine<'_> {
    fn default() -> Self {
        Self::new(FilterCriteria::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::DateRange;
    use serde_json::Value;
    use std::cell::RefCell;

    fn sample() -> Dataset {
        Dataset::new(vec![
            Row::new().with("name", "Spring Sale").with("category", "Email").with("date", "2024-01-01").with("clicks", 120),
            Row::new().with("name", "Brand Push").with("category", "Social").with("date", "2024-01-05").with("clicks", 80),
            Row::new().with("name", "Retarget").with("category", "Email").with("date", "2024-02-01").with("clicks", Value::Null),
            Row::new().with("name", "Summer SALE").with("category", "Search").with("date", "not a date").with("clicks", 15.5),
        ])
    }

    fn names(dataset: &Dataset) -> Vec<String> {
        dataset.iter().map(|r| r.text("name").unwrap().into_owned()).collect()
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let rows = Dataset::new(vec![
            Row::new().with("name", "foobar"),
            Row::new().with("name", "baz"),
        ]);
        let filtered = filter_dataset(&rows, &FilterCriteria::default().with_search("foo"));
        assert_eq!(filtered.rows(), &rows.rows()[..1]);

        let filtered = filter_dataset(&sample(), &FilterCriteria::default().with_search("sale"));
        assert_eq!(names(&filtered), vec!["Spring Sale", "Summer SALE"]);
    }

    #[test]
    fn test_search_matches_numbers_and_skips_nulls() {
        let filtered = filter_dataset(&sample(), &FilterCriteria::default().with_search("120"));
        assert_eq!(names(&filtered), vec!["Spring Sale"]);

        let filtered = filter_dataset(&sample(), &FilterCriteria::default().with_search("15.5"));
        assert_eq!(names(&filtered), vec!["Summer SALE"]);

        let filtered = filter_dataset(&sample(), &FilterCriteria::default().with_search("null"));
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_category_is_exact_and_composes_with_search() {
        let filtered = filter_dataset(&sample(), &FilterCriteria::default().with_category("Email"));
        assert_eq!(names(&filtered), vec!["Spring Sale", "Retarget"]);

        let filtered = filter_dataset(&sample(), &FilterCriteria::default().with_category("email"));
        assert!(filtered.is_empty());

        let criteria = FilterCriteria::default().with_category("Email").with_search("sale");
        assert_eq!(names(&filter_dataset(&sample(), &criteria)), vec!["Spring Sale"]);
    }

    #[test]
    fn test_empty_criteria_is_identity() {
        let data = sample();
        assert_eq!(filter_dataset(&data, &FilterCriteria::default()), data);
        assert_eq!(
            filter_dataset(&Dataset::default(), &FilterCriteria::default().with_search("x")),
            Dataset::default()
        );
    }

    #[test]
    fn test_result_is_ordered_subsequence() {
        let data = sample();
        for term in ["a", "e", "s", "2024", "zzz"] {
            let filtered = filter_dataset(&data, &FilterCriteria::default().with_search(term));
            let mut source = data.iter();
            for row in filtered.iter() {
                assert!(source.any(|candidate| candidate == row), "{term}: order broken");
            }
        }
    }

    #[test]
    fn test_date_range_reads_same_column_as_chart_labels() {
        let rows = Dataset::new(vec![
            Row::new().with("Date", "2024-03-01").with("date", "2024-01-15").with("revenue", 5),
        ]);
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        );
        let filtered = filter_dataset(&rows, &FilterCriteria::default().with_date_range(range));
        assert_eq!(filtered.len(), 1);

        let aggregation = crate::core::aggregate::aggregate_metrics(&filtered);
        let revenue = aggregation.metric(crate::domain::model::MetricKind::Revenue).unwrap();
        assert_eq!(revenue.labels(), &["2024-03-01".to_string()]);
    }

    #[test]
    fn test_date_range_drops_unparseable_dates() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        );
        let filtered = filter_dataset(&sample(), &FilterCriteria::default().with_date_range(range));
        assert_eq!(names(&filtered), vec!["Spring Sale", "Brand Push"]);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9);
        assert_eq!(parse_date("2024-03-09"), expected);
        assert_eq!(parse_date("2024/03/09"), expected);
        assert_eq!(parse_date("03/09/2024"), expected);
        assert_eq!(parse_date("2024-03-09T10:00:00Z"), expected);
        assert_eq!(parse_date("March"), None);
    }

    #[test]
    fn test_engine_notifies_observers() {
        let seen = RefCell::new(Vec::new());
        let data = sample();
        let mut engine = FilterEngine::default();
        engine.subscribe(|filtered: &Dataset| seen.borrow_mut().push(filtered.len()));

        let result = engine.set_search(&data, "sale");
        assert_eq!(result.len(), 2);
        engine.set_category(&data, "Search");
        engine.set_search(&data, "");

        assert_eq!(*seen.borrow(), vec![2, 1, 1]);
        assert_eq!(engine.criteria().category, "Search");
        assert!(engine.criteria().search_term.is_empty());
    }
}
