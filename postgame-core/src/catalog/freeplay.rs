/// Arena loaded when no freeplay map is configured
pub const DEFAULT_FREEPLAY_MAP: &str = "Stadium_P";

/// A standard arena the host can load into freeplay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeplayMap {
    pub code: &'static str,
    pub name: &'static str,
}

pub const FREEPLAY_MAPS: &[FreeplayMap] = &[
    FreeplayMap { code: "Stadium_P", name: "DFH Stadium" },
    FreeplayMap { code: "Stadium_Day_P", name: "DFH Stadium (Day)" },
    FreeplayMap { code: "EuroStadium_P", name: "Mannfield" },
    FreeplayMap { code: "EuroStadium_Night_P", name: "Mannfield (Night)" },
    FreeplayMap { code: "cs_p", name: "Champions Field" },
    FreeplayMap { code: "TrainStation_P", name: "Urban Central" },
    FreeplayMap { code: "Park_P", name: "Beckwith Park" },
    FreeplayMap { code: "UtopiaStadium_P", name: "Utopia Coliseum" },
    FreeplayMap { code: "Wasteland_S_P", name: "Wasteland" },
    FreeplayMap { code: "NeoTokyo_Standard_P", name: "Neo Tokyo" },
    FreeplayMap { code: "arc_standard_p", name: "Starbase ARC" },
    FreeplayMap { code: "Farm_P", name: "Farmstead" },
    FreeplayMap { code: "beach_P", name: "Salty Shores" },
    FreeplayMap { code: "CHN_Stadium_P", name: "Forbidden Temple" },
    FreeplayMap { code: "Underwater_P", name: "AquaDome" },
    FreeplayMap { code: "cs_hw_p", name: "Rivals Arena" },
];

/// Look up an arena by code (case-insensitive)
pub fn find_freeplay_map(code: &str) -> Option<&'static FreeplayMap> {
    FREEPLAY_MAPS
        .iter()
        .find(|map| map.code.eq_ignore_ascii_case(code.trim()))
}

/// The code to issue for a configured freeplay map
///
/// Unknown codes are passed through because the host owns the real map
/// list. A blank value falls back to [`DEFAULT_FREEPLAY_MAP`].
pub fn resolve_freeplay_map(configured: &str) -> String {
    let trimmed = configured.trim();
    if trimmed.is_empty() {
        return DEFAULT_FREEPLAY_MAP.to_string();
    }
    match find_freeplay_map(trimmed) {
        Some(map) => map.code.to_string(),
        None => {
            tracing::debug!("Freeplay map {} is not in the built-in table", trimmed);
            trimmed.to_string()
        }
    }
}
