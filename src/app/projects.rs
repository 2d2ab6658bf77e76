//! Grouping catalog records into projects
//!
//! The project is derived from the tile file name rather than the catalog's
//! `projectName`, which is often missing or inconsistent. A small registry of
//! naming conventions is tried in order; each convention knows how to cut the
//! tile-specific suffix (year, tile id, UTM zone, coordinates) off the name.
//! Names that fit no convention land in the `"Unknown"` bucket.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use tracing::debug;

use crate::app::models::CatalogRecord;
use crate::constants::projects::UNKNOWN;

/// Records grouped by project, in project-name order
pub type ProjectGroups = BTreeMap<String, Vec<CatalogRecord>>;

/// How a convention trims a split file name down to the project name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cut {
    /// Keep parts up to and including the first plausible acquisition year
    AfterYear,
    /// Drop everything from the first part at or past `from` that starts with a digit
    BeforeTileId { from: usize },
    /// Drop everything from the first UTM zone (18T/19T) or long number
    BeforeUtmZone,
    /// Drop everything from the first 4+ digit part at index 2 or later
    BeforeCoordinate,
}

impl Cut {
    fn apply(self, parts: &[&str]) -> Option<usize> {
        match self {
            Cut::AfterYear => parts.iter().position(|p| is_year(p)).map(|i| i + 1),
            Cut::BeforeTileId { from } => {
                if parts.len() <= from {
                    return None;
                }
                parts
                    .iter()
                    .enumerate()
                    .skip(from)
                    .find(|(_, p)| p.starts_with(|c: char| c.is_ascii_digit()))
                    .map(|(i, _)| i)
            }
            Cut::BeforeUtmZone => Some(
                parts
                    .iter()
                    .position(|p| {
                        p.starts_with("18T")
                            || p.starts_with("19T")
                            || (p.len() >= 4 && is_digits(p))
                    })
                    .unwrap_or(parts.len()),
            ),
            Cut::BeforeCoordinate => parts
                .iter()
                .enumerate()
                .skip(2)
                .find(|(_, p)| p.len() >= 4 && is_digits(p))
                .map(|(i, _)| i),
        }
    }
}

/// One known naming convention
#[derive(Debug)]
struct NamingRule {
    name: &'static str,
    pattern: Regex,
    cuts: &'static [Cut],
}

static NAMING_RULES: LazyLock<Vec<NamingRule>> = LazyLock::new(|| {
    let rule = |name: &'static str, pattern: &str, cuts: &'static [Cut]| NamingRule {
        name,
        pattern: Regex::new(pattern).expect("project naming regex is valid"),
        cuts,
    };

    vec![
        rule(
            "usgs-lpc",
            r"^USGS_|USGS_LPC",
            &[Cut::AfterYear, Cut::BeforeTileId { from: 3 }],
        ),
        rule("ma-me-ma", r"USGS_LPC_MA_ME_MA", &[Cut::BeforeUtmZone]),
        rule("ny-region2lot1", r"REGION2LOT1", &[Cut::AfterYear]),
        rule("vt-western", r"Western", &[Cut::AfterYear]),
        rule("il-subset", r"IL_", &[Cut::AfterYear]),
        rule("coordinate-suffix", r"_\d{4,}", &[Cut::BeforeCoordinate]),
    ]
});

fn is_digits(part: &str) -> bool {
    !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
}

fn is_year(part: &str) -> bool {
    part.len() == 4 && is_digits(part) && matches!(part.parse::<u32>(), Ok(2000..=2100))
}

/// Derive the project name for a tile file name
///
/// Pure function of the file name; the extension and everything after the
/// first `.` are ignored.
pub fn project_name_for(file_name: &str) -> String {
    let stem = file_name.split('.').next().unwrap_or_default();
    if stem.is_empty() {
        return UNKNOWN.to_string();
    }
    let parts: Vec<&str> = stem.split('_').collect();

    for rule in NAMING_RULES.iter() {
        if !rule.pattern.is_match(file_name) {
            continue;
        }
        for cut in rule.cuts {
            if let Some(end) = cut.apply(&parts) {
                let name = parts[..end].join("_");
                if !name.is_empty() {
                    debug!("{} -> {} ({})", file_name, name, rule.name);
                    return name;
                }
            }
        }
    }

    debug!("{} matches no naming convention", file_name);
    UNKNOWN.to_string()
}

/// Groups records by derived project name
#[derive(Debug, Clone, Default)]
pub struct ProjectGrouper;

impl ProjectGrouper {
    pub fn new() -> Self {
        Self
    }

    /// Group records by the project derived from their download URL
    ///
    /// No record is dropped, and each bucket keeps input order.
    pub fn group(&self, items: &[CatalogRecord]) -> ProjectGroups {
        let mut groups = ProjectGroups::new();
        for record in items {
            groups
                .entry(project_name_for(record.file_name()))
                .or_default()
                .push(record.clone());
        }
        debug!(
            "Grouped {} records into {} projects",
            items.len(),
            groups.len()
        );
        groups
    }
}

/// Reduce every project to a random sample of at most `max_per_project` records
///
/// Kept records stay in their original relative order.
pub fn sample_per_project<R: Rng + ?Sized>(
    groups: ProjectGroups,
    max_per_project: usize,
    rng: &mut R,
) -> ProjectGroups {
    groups
        .into_iter()
        .map(|(project, records)| {
            if records.len() <= max_per_project {
                return (project, records);
            }

            let mut keep =
                rand::seq::index::sample(&mut *rng, records.len(), max_per_project).into_vec();
            keep.sort_unstable();

            let mut keep = keep.into_iter().peekable();
            let sampled = records
                .into_iter()
                .enumerate()
                .filter_map(|(i, record)| {
                    if keep.peek() == Some(&i) {
                        keep.next();
                        Some(record)
                    } else {
                        None
                    }
                })
                .collect();
            (project, sampled)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn record(id: &str, file: &str) -> CatalogRecord {
        CatalogRecord::new(id, format!("s3://usgs-lidar/Projects/x/{}", file))
    }

    #[test]
    fn test_usgs_lpc_cut_at_year() {
        assert_eq!(
            project_name_for("USGS_LPC_CO_SoPlatteRiver_Lot5_2013_13SEB460530_LAS_2015.laz"),
            "USGS_LPC_CO_SoPlatteRiver_Lot5_2013"
        );
        assert_eq!(
            project_name_for("USGS_LPC_NY_FEMAR2_Central_2018_D18_18TVN123456.laz"),
            "USGS_LPC_NY_FEMAR2_Central_2018"
        );
    }

    #[test]
    fn test_usgs_without_year_cuts_at_tile_id() {
        assert_eq!(
            project_name_for("USGS_LPC_VT_Lidar_18TXP123456_LAS.laz"),
            "USGS_LPC_VT_Lidar"
        );
    }

    #[test]
    fn test_special_conventions() {
        assert_eq!(
            project_name_for("NY_REGION2LOT1_2012_e123n456.laz"),
            "NY_REGION2LOT1_2012"
        );
        assert_eq!(
            project_name_for("VT_Western_2014_tile77.laz"),
            "VT_Western_2014"
        );
        assert_eq!(
            project_name_for("IL_GrnMacMont_2016_1020_3340.laz"),
            "IL_GrnMacMont_2016"
        );
        assert_eq!(
            project_name_for("CO_Pueblo_County_1234_5678.laz"),
            "CO_Pueblo_County"
        );
    }

    #[test]
    fn test_unmatched_names_are_unknown() {
        assert_eq!(project_name_for("tile.laz"), UNKNOWN);
        assert_eq!(project_name_for("random_name_here.laz"), UNKNOWN);
        assert_eq!(project_name_for(""), UNKNOWN);
        assert_eq!(project_name_for(".laz"), UNKNOWN);
    }

    /// Same file name maps to the same project regardless of input order
    #[test]
    fn test_grouping_is_stable() {
        let items = vec![
            record("1", "USGS_LPC_CO_LasAnimas_2016_13S_001.laz"),
            record("2", "odd.laz"),
            record("3", "USGS_LPC_CO_LasAnimas_2016_13S_002.laz"),
            record("4", "USGS_LPC_KS_Statewide_2018_A18_5522.laz"),
        ];
        let grouper = ProjectGrouper::new();
        let forward = grouper.group(&items);

        let mut reversed_items = items.clone();
        reversed_items.reverse();
        let reversed = grouper.group(&reversed_items);

        assert_eq!(
            forward.keys().collect::<Vec<_>>(),
            reversed.keys().collect::<Vec<_>>()
        );
        assert_eq!(forward.values().map(Vec::len).sum::<usize>(), items.len());

        let las_animas = &forward["USGS_LPC_CO_LasAnimas_2016"];
        assert_eq!(
            las_animas.iter().map(|r| r.source_id.as_str()).collect::<Vec<_>>(),
            vec!["1", "3"]
        );
        assert_eq!(forward[UNKNOWN].len(), 1);
        assert!(forward.contains_key("USGS_LPC_KS_Statewide_2018"));
    }

    #[test]
    fn test_sampling_keeps_order_and_bounds() {
        let records: Vec<_> = (0..10)
            .map(|i| record(&i.to_string(), &format!("USGS_LPC_X_Y_2019_{:04}.laz", i)))
            .collect();
        let groups = ProjectGrouper::new().group(&records);

        let mut rng = StdRng::seed_from_u64(7);
        let sampled = sample_per_project(groups, 3, &mut rng);

        let kept = &sampled["USGS_LPC_X_Y_2019"];
        assert_eq!(kept.len(), 3);
        let ids: Vec<u32> = kept.iter().map(|r| r.source_id.parse().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_sampling_leaves_small_projects_alone() {
        let groups = ProjectGrouper::new().group(&[record("a", "USGS_LPC_A_B_2015_1.laz")]);
        let mut rng = StdRng::seed_from_u64(1);
        let sampled = sample_per_project(groups.clone(), 5, &mut rng);
        assert_eq!(sampled, groups);
    }
}
