//! Class breakdown summaries
//!
//! Pure functions turning a region record into what the analytics chart
//! shows: totals, the dominant class, grouped shares and insight lines.

use serde::{Deserialize, Serialize};

use super::record::{ClassShare, Epoch, RegionRecord};

/// Colour used for classes outside the fixed palette
pub const FALLBACK_CLASS_COLOR: &str = "#8B5CF6";

/// Classes counted as agricultural activity
pub const AGRICULTURAL_CLASSES: &[&str] = &["Crop", "Trees"];

/// Classes counted as built environment
pub const BUILT_CLASSES: &[&str] = &["Building", "Road"];

/// Classes counted as natural vegetation
pub const NATURAL_CLASSES: &[&str] = &["Trees", "Shrub & Scrub", "Grass"];

/// Highest-share class of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DominantClass {
    pub name: String,
    pub percentage: f64,
}

/// Chart-facing digest of a region record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownSummary {
    pub region_name: String,
    pub epoch: Epoch,
    pub total_area_ha: f64,
    pub dominant: Option<DominantClass>,
    pub agricultural_pct: f64,
    pub built_pct: f64,
    pub natural_pct: f64,
    pub insights: Vec<String>,
}

/// Summarize a record; classes missing from the record count as 0%
pub fn summarize(record: &RegionRecord) -> BreakdownSummary {
    let dominant = record
        .classes
        .iter()
        .fold(None::<&ClassShare>, |best, class| match best {
            Some(b) if b.percentage >= class.percentage => Some(b),
            _ => Some(class),
        })
        .map(|class| DominantClass {
            name: class.name.clone(),
            percentage: class.percentage,
        });

    let agricultural_pct = group_share(record, AGRICULTURAL_CLASSES);
    let built_pct = group_share(record, BUILT_CLASSES);
    let natural_pct = group_share(record, NATURAL_CLASSES);

    let mut insights = Vec::with_capacity(4);
    if let Some(top) = &dominant {
        insights.push(format!(
            "{} dominates the landscape, covering {}% of {}",
            top.name, top.percentage, record.region_name
        ));
    }
    insights.push(format!(
        "Agricultural activities (Crop + Trees) account for {:.1}% of total area",
        agricultural_pct
    ));
    insights.push(format!(
        "Built environment (Building + Road) covers {:.1}% of the region",
        built_pct
    ));
    insights.push(format!(
        "Natural vegetation (Trees + Shrub & Scrub + Grass) represents {:.1}% coverage",
        natural_pct
    ));

    BreakdownSummary {
        region_name: record.region_name.clone(),
        epoch: record.epoch,
        total_area_ha: record.total_area_ha(),
        dominant,
        agricultural_pct,
        built_pct,
        natural_pct,
        insights,
    }
}

fn group_share(record: &RegionRecord, classes: &[&str]) -> f64 {
    classes.iter().map(|name| record.percentage_of(name)).sum()
}

/// Fixed chart colour of a land-cover class
pub fn class_color(name: &str) -> &'static str {
    match name {
        "Crop" => "#10B981",
        "Trees" => "#059669",
        "Road" => "#6B7280",
        "Building" => "#EF4444",
        "Shrub & Scrub" => "#84CC16",
        "Grass" => "#22C55E",
        "Water" => "#3B82F6",
        "Bare Ground" => "#A3A3A3",
        _ => FALLBACK_CLASS_COLOR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::record::LevelKind;
    use approx::assert_relative_eq;

    fn kangema_2022() -> RegionRecord {
        RegionRecord::new(
            "Kangema",
            LevelKind::Subdivision,
            Epoch(2022),
            vec![
                ClassShare::new("Crop", 35461.43, 51.29),
                ClassShare::new("Trees", 25498.97, 36.87),
                ClassShare::new("Building", 2905.7, 4.2),
                ClassShare::new("Road", 2793.1, 4.04),
                ClassShare::new("Shrub & Scrub", 2294.48, 3.32),
            ],
        )
    }

    #[test]
    fn test_summary_groups() {
        let summary = summarize(&kangema_2022());

        assert_relative_eq!(summary.agricultural_pct, 88.16, epsilon = 1e-9);
        assert_relative_eq!(summary.built_pct, 8.24, epsilon = 1e-9);
        // Grass is absent and counts as zero
        assert_relative_eq!(summary.natural_pct, 40.19, epsilon = 1e-9);
        assert_relative_eq!(summary.total_area_ha, 68953.68, epsilon = 1e-6);
    }

    #[test]
    fn test_dominant_class_uses_highest_share() {
        let mut record = kangema_2022();
        record.classes.reverse();

        let summary = summarize(&record);
        let dominant = summary.dominant.unwrap();
        assert_eq!(dominant.name, "Crop");
        assert_eq!(dominant.percentage, 51.29);
        assert_eq!(
            summary.insights[0],
            "Crop dominates the landscape, covering 51.29% of Kangema"
        );
    }

    #[test]
    fn test_insight_formatting() {
        let summary = summarize(&kangema_2022());
        assert_eq!(summary.insights.len(), 4);
        assert_eq!(
            summary.insights[1],
            "Agricultural activities (Crop + Trees) account for 88.2% of total area"
        );
    }

    #[test]
    fn test_class_colors() {
        assert_eq!(class_color("Water"), "#3B82F6");
        assert_eq!(class_color("Wetland"), FALLBACK_CLASS_COLOR);
    }
}
