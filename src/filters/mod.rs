use crate::assessment::{AmenitySummary, CrimeSummary, PropertyAssessment};

/// Filter for the amenity list of an assessment.
///
/// Category filters match the OpenStreetMap `amenity` value (e.g. "pub",
/// "cafe", "pharmacy"); includes win over excludes when both are given.
#[derive(Debug, Default, Clone)]
pub struct AmenityFilter {
    categories: Vec<String>,
    exclude_categories: Vec<String>,
    max_distance_m: Option<f64>,
}

impl AmenityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_categories(&mut self, categories: Vec<String>) -> &mut Self {
        self.categories = normalize(categories);
        self
    }

    pub fn with_exclude_categories(&mut self, categories: Vec<String>) -> &mut Self {
        self.exclude_categories = normalize(categories);
        self
    }

    pub fn with_max_distance(&mut self, max_distance_m: Option<f64>) -> &mut Self {
        self.max_distance_m = max_distance_m;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
            && self.exclude_categories.is_empty()
            && self.max_distance_m.is_none()
    }

    pub fn apply(&self, summary: &mut AmenitySummary) {
        summary.amenities.retain(|amenity| {
            let category = amenity.category.to_lowercase();

            if !self.categories.is_empty() && !self.categories.contains(&category) {
                return false;
            }
            if self.categories.is_empty() && self.exclude_categories.contains(&category) {
                return false;
            }
            if let Some(max) = self.max_distance_m {
                if amenity.distance_m > max {
                    return false;
                }
            }
            true
        });
    }
}

/// Filter for the crime category counts of an assessment.
#[derive(Debug, Default, Clone)]
pub struct CrimeFilter {
    categories: Vec<String>,
    exclude_categories: Vec<String>,
}

impl CrimeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_categories(&mut self, categories: Vec<String>) -> &mut Self {
        self.categories = normalize(categories);
        self
    }

    pub fn with_exclude_categories(&mut self, categories: Vec<String>) -> &mut Self {
        self.exclude_categories = normalize(categories);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.exclude_categories.is_empty()
    }

    pub fn apply(&self, summary: &mut CrimeSummary) {
        summary.by_category.retain(|category, _| {
            let category = category.to_lowercase();
            if !self.categories.is_empty() {
                return self.categories.contains(&category);
            }
            !self.exclude_categories.contains(&category)
        });

        // Total must track the retained categories or the report overstates
        // the area
        summary.total = summary.by_category.values().sum();
    }
}

fn normalize(categories: Vec<String>) -> Vec<String> {
    categories
        .into_iter()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect()
}

/// Apply both filters to an assessment in place.
pub fn apply_filters(
    assessment: &mut PropertyAssessment,
    amenity_filter: &AmenityFilter,
    crime_filter: &CrimeFilter,
) {
    if !amenity_filter.is_empty() {
        if let Some(summary) = assessment.amenities.as_mut() {
            amenity_filter.apply(summary);
        }
    }
    if !crime_filter.is_empty() {
        if let Some(summary) = assessment.crime.as_mut() {
            crime_filter.apply(summary);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::Amenity;
    use std::collections::BTreeMap;

    fn amenities() -> AmenitySummary {
        AmenitySummary {
            radius_m: 1000,
            amenities: vec![
                Amenity {
                    name: "The Crown".to_string(),
                    category: "pub".to_string(),
                    distance_m: 240.0,
                },
                Amenity {
                    name: "Corner Cafe".to_string(),
                    category: "cafe".to_string(),
                    distance_m: 80.0,
                },
                Amenity {
                    name: "Boots".to_string(),
                    category: "pharmacy".to_string(),
                    distance_m: 620.0,
                },
            ],
        }
    }

    fn crimes() -> CrimeSummary {
        let mut by_category = BTreeMap::new();
        by_category.insert("anti-social-behaviour".to_string(), 10);
        by_category.insert("burglary".to_string(), 3);
        by_category.insert("vehicle-crime".to_string(), 5);
        CrimeSummary {
            month: Some("2026-06".to_string()),
            total: 18,
            by_category,
        }
    }

    #[test]
    fn test_amenity_include_categories() {
        let mut summary = amenities();
        let mut filter = AmenityFilter::new();
        filter.with_categories(vec!["pub".to_string(), "CAFE".to_string()]);
        filter.apply(&mut summary);

        assert_eq!(summary.amenities.len(), 2);
        assert!(summary.amenities.iter().all(|a| a.category != "pharmacy"));
    }

    #[test]
    fn test_amenity_exclude_categories() {
        let mut summary = amenities();
        let mut filter = AmenityFilter::new();
        filter.with_exclude_categories(vec!["pub".to_string()]);
        filter.apply(&mut summary);

        assert_eq!(summary.amenities.len(), 2);
        assert!(summary.amenities.iter().all(|a| a.category != "pub"));
    }

    #[test]
    fn test_amenity_max_distance() {
        let mut summary = amenities();
        let mut filter = AmenityFilter::new();
        filter.with_max_distance(Some(300.0));
        filter.apply(&mut summary);

        assert_eq!(summary.amenities.len(), 2);
        assert!(summary.amenities.iter().all(|a| a.distance_m <= 300.0));
    }

    #[test]
    fn test_amenity_includes_win_over_excludes() {
        let mut summary = amenities();
        let mut filter = AmenityFilter::new();
        filter
            .with_categories(vec!["pub".to_string()])
            .with_exclude_categories(vec!["pub".to_string()]);
        filter.apply(&mut summary);

        assert_eq!(summary.amenities.len(), 1);
        assert_eq!(summary.amenities[0].category, "pub");
    }

    #[test]
    fn test_crime_filter_recomputes_total() {
        let mut summary = crimes();
        let mut filter = CrimeFilter::new();
        filter.with_exclude_categories(vec!["anti-social-behaviour".to_string()]);
        filter.apply(&mut summary);

        assert_eq!(summary.total, 8);
        assert!(!summary.by_category.contains_key("anti-social-behaviour"));
    }

    #[test]
    fn test_crime_include_only() {
        let mut summary = crimes();
        let mut filter = CrimeFilter::new();
        filter.with_categories(vec!["burglary".to_string()]);
        filter.apply(&mut summary);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_category.len(), 1);
    }

    #[test]
    fn test_empty_filters_report_empty() {
        assert!(AmenityFilter::new().is_empty());
        assert!(CrimeFilter::new().is_empty());

        let mut filter = AmenityFilter::new();
        filter.with_max_distance(Some(100.0));
        assert!(!filter.is_empty());
    }
}
