use super::{ScenarioRecord, Origin};

struct DefaultScenario {
    code: &'static str,
    name: &'static str,
    shot_count: u32,
    description: &'static str,
}

const DEFAULT_SCENARIOS: &[DefaultScenario] = &[
    DefaultScenario {
        code: "CE79-F64D-344F-5F1E",
        name: "Aerial Shots - Redirect",
        shot_count: 44,
        description: "Redirecting aerial shots from a wide range of passes.",
    },
    DefaultScenario {
        code: "FA24-B2B7-2E8E-193B",
        name: "Ultimate Warm-Up",
        shot_count: 50,
        description: "Complete warm-up routine covering a wide range of mechanics.",
    },
    DefaultScenario {
        code: "D7F8-FD53-98D1-DAFE",
        name: "Backboard Therapy",
        shot_count: 40,
        description: "Aerials off the backboard.",
    },
    DefaultScenario {
        code: "6EB1-79B2-33B8-681C",
        name: "Ground Shots",
        shot_count: 50,
        description: "Ground shots at varied angles, distances and speeds.",
    },
    DefaultScenario {
        code: "5A65-4073-F310-5495",
        name: "Wall to Air Dribble",
        shot_count: 3,
        description: "Balls rolling up the wall for air dribble setups.",
    },
    DefaultScenario {
        code: "A503-264C-A7EB-D282",
        name: "Musty's Speed Flip Kickoff",
        shot_count: 3,
        description: "Speed flip kickoff practice.",
    },
    DefaultScenario {
        code: "CEB6-7AF0-9A2E-B92D",
        name: "Flip Reset",
        shot_count: 10,
        description: "Game-like flip reset setups.",
    },
    DefaultScenario {
        code: "6CF3-4C0B-32B4-1AC7",
        name: "Power Shots",
        shot_count: 20,
        description: "Power and accuracy from varied distances and angles.",
    },
    DefaultScenario {
        code: "2E23-ABD5-20C6-DBD4",
        name: "Saves",
        shot_count: 50,
        description: "Saves covering a wide range of situations.",
    },
    DefaultScenario {
        code: "CAFC-FB3E-3C0F-B8F1",
        name: "Double Shot Playground",
        shot_count: 50,
        description: "Backboard self-setups and double taps.",
    },
];

/// Codes of the built-in scenarios, in fallback order
pub fn default_scenario_codes() -> impl Iterator<Item = &'static str> {
    DEFAULT_SCENARIOS.iter().map(|s| s.code)
}

/// Built-in scenarios used to seed an empty installation
pub fn default_scenarios() -> Vec<ScenarioRecord> {
    DEFAULT_SCENARIOS
        .iter()
        .map(|s| {
            let mut record = ScenarioRecord::new(s.code, s.name);
            record.shot_count = s.shot_count;
            record.description = s.description.to_string();
            record.origin = Origin::Imported;
            record
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::is_valid_code;
    use std::collections::HashSet;

    #[test]
    fn test_defaults_are_valid_and_unique() {
        let records = default_scenarios();
        assert_eq!(records.len(), 10);

        let codes: HashSet<_> = records.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes.len(), records.len());
        assert!(records.iter().all(|r| is_valid_code(&r.code)));
        assert_eq!(default_scenario_codes().next(), Some("CE79-F64D-344F-5F1E"));
    }
}
