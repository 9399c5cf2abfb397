// src/services/impact_scorer.rs
//! Keyword heuristics over the model's object names and summary.
//!
//! Rules are evaluated top to bottom and the first match wins for each
//! object. The constants and ordering are fixed; changing either changes
//! every score the dashboard has ever shown.

use crate::models::*;

const FOREST_KEYWORDS: &[&str] = &["tree", "forest", "vegetation", "plant", "woods", "canopy"];
const REFORESTATION_SUMMARY: &[&str] = &[
    "planting",
    "reforestation",
    "tree planting",
    "planted",
    "seedlings",
];
const MATURE_SUMMARY: &[&str] = &["old", "mature", "ancient", "thick", "dense", "pristine"];
const YOUNG_SUMMARY: &[&str] = &["young", "early", "developing", "growing", "new"];

const HEALTH_BASE: i32 = 60;
const REFORESTATION_BONUS: f64 = 20.0;
const MATURITY_BONUS: f64 = 8.0;
const YOUNG_GROWTH_BONUS: f64 = 12.0;
const ECOSYSTEM_BONUS_PER_OBJECT: f64 = 5.0;

enum Matcher {
    Any(&'static [&'static str]),
    Both(&'static [&'static str], &'static [&'static str]),
}

impl Matcher {
    fn matches(&self, text: &str) -> bool {
        match self {
            Matcher::Any(words) => contains_any(text, words),
            Matcher::Both(first, second) => contains_any(text, first) && contains_any(text, second),
        }
    }
}

enum Label {
    /// Use the object's own name, or this default when it has none.
    Object(&'static str),
    Fixed(&'static str),
}

struct Co2Rule {
    matcher: Matcher,
    amount: f64,
    scaled_by_density: bool,
    icon: &'static str,
    label: Label,
    unit: &'static str,
}

const CO2_RULES: &[Co2Rule] = &[
    Co2Rule {
        matcher: Matcher::Any(&[
            "tree",
            "forest",
            "vegetation",
            "plant",
            "woods",
            "canopy",
            "sapling",
        ]),
        amount: 2.5,
        scaled_by_density: true,
        icon: "🌳",
        label: Label::Object("Forest"),
        unit: "kg CO₂/day",
    },
    Co2Rule {
        matcher: Matcher::Any(&[
            "planting",
            "reforestation",
            "tree planting",
            "environmental work",
            "conservation",
        ]),
        amount: 15.0,
        scaled_by_density: true,
        icon: "🌱",
        label: Label::Object("Tree Planting Activity"),
        unit: "kg CO₂/day",
    },
    Co2Rule {
        matcher: Matcher::Both(
            &["people", "person", "human", "worker", "volunteer"],
            &["plant", "environment", "conservation", "garden"],
        ),
        amount: 10.0,
        scaled_by_density: false,
        icon: "👥",
        label: Label::Object("Environmental Workers"),
        unit: "kg CO₂/day",
    },
    Co2Rule {
        matcher: Matcher::Any(&["seedling", "young tree", "saplings", "newly planted"]),
        amount: 5.0,
        scaled_by_density: false,
        icon: "🌿",
        label: Label::Object("Seedlings"),
        unit: "kg CO₂/day (future growth)",
    },
    Co2Rule {
        matcher: Matcher::Any(&["moss", "fern", "undergrowth", "ground cover"]),
        amount: 1.5,
        scaled_by_density: true,
        icon: "🌿",
        label: Label::Object("Undergrowth"),
        unit: "kg CO₂/day",
    },
    Co2Rule {
        matcher: Matcher::Any(&["stream", "river", "water", "creek", "brook"]),
        amount: 2.0,
        scaled_by_density: false,
        icon: "🌊",
        label: Label::Object("Forest Stream"),
        unit: "kg CO₂/day",
    },
    Co2Rule {
        matcher: Matcher::Any(&["soil", "ground", "earth", "organic"]),
        amount: 3.0,
        scaled_by_density: true,
        icon: "🌱",
        label: Label::Object("Forest Soil"),
        unit: "kg CO₂/day",
    },
    Co2Rule {
        matcher: Matcher::Any(&["solar"]),
        amount: 15.0,
        scaled_by_density: false,
        icon: "☀️",
        label: Label::Fixed("Solar Array"),
        unit: "kg CO₂ saved/day",
    },
    Co2Rule {
        matcher: Matcher::Any(&["wind", "turbine"]),
        amount: 25.0,
        scaled_by_density: false,
        icon: "💨",
        label: Label::Fixed("Wind Energy"),
        unit: "kg CO₂ saved/day",
    },
    Co2Rule {
        matcher: Matcher::Any(&["car", "truck", "vehicle", "bus"]),
        amount: -25.0,
        scaled_by_density: false,
        icon: "🚗",
        label: Label::Fixed("Vehicles"),
        unit: "kg CO₂/day",
    },
    Co2Rule {
        matcher: Matcher::Any(&["factory", "industrial", "smokestack", "chimney"]),
        amount: -150.0,
        scaled_by_density: false,
        icon: "🏭",
        label: Label::Fixed("Industrial"),
        unit: "kg CO₂/day",
    },
    Co2Rule {
        matcher: Matcher::Any(&["waste", "trash", "garbage", "landfill"]),
        amount: -8.0,
        scaled_by_density: false,
        icon: "🗑️",
        label: Label::Fixed("Waste Site"),
        unit: "kg CO₂ eq/day",
    },
];

/// Per-object health bonuses, first match wins.
const HEALTH_RULES: &[(Matcher, i32)] = &[
    (Matcher::Any(&["tree", "forest", "vegetation"]), 10),
    (Matcher::Any(&["moss", "fern", "undergrowth"]), 8),
    (Matcher::Any(&["stream", "water"]), 12),
    (
        Matcher::Any(&[
            "planting",
            "reforestation",
            "conservation",
            "environmental work",
        ]),
        25,
    ),
    (
        Matcher::Both(
            &["people", "person", "human", "worker"],
            &["plant", "environment", "conservation"],
        ),
        20,
    ),
];

const FOREST_TIPS: [&str; 3] = [
    "🌳 Protect existing tree canopy by avoiding development in forested areas",
    "🌱 Support reforestation initiatives in your local community",
    "🚫 Avoid disturbing wildlife habitats and maintain natural corridors",
];
const RECYCLING_TIPS: [&str; 3] = [
    "♻️ Implement proper waste sorting and recycling practices",
    "🚯 Reduce single-use plastics and choose sustainable alternatives",
    "🔄 Support circular economy initiatives in your community",
];
const MONITORING_TIPS: [&str; 3] = [
    "🔍 Continue monitoring environmental conditions regularly",
    "📊 Document changes over time to track environmental health",
    "🤝 Share findings with local environmental groups",
];
const RAW_FOREST_TIPS: [&str; 3] = [
    "🌲 Preserve forest ecosystems through conservation efforts",
    "🌿 Promote biodiversity by protecting natural habitats",
    "🏞️ Support sustainable forestry practices",
];
const RAW_WASTE_TIPS: [&str; 3] = [
    "♻️ Improve waste management and recycling systems",
    "🌍 Reduce environmental impact through better disposal practices",
    "💡 Educate others about proper waste sorting",
];
const RAW_GENERAL_TIPS: [&str; 3] = [
    "🌱 Take action to improve environmental sustainability",
    "📈 Monitor and measure environmental impact regularly",
    "🤝 Collaborate with others on conservation efforts",
];
const GETTING_STARTED_TIPS: [&str; 3] = [
    "🔍 Upload an image to receive personalized environmental recommendations",
    "🌍 Start by analyzing your local environment for improvement opportunities",
    "📱 Use this tool regularly to track environmental changes",
];
const PADDING_TIPS: [&str; 6] = [
    "🌳 Plant native species to support local ecosystems",
    "💧 Conserve water resources through mindful usage",
    "🔋 Choose renewable energy sources when possible",
    "🚴‍♂️ Use sustainable transportation options",
    "📚 Educate others about environmental conservation",
    "🧹 Participate in local environmental cleanup efforts",
];

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// Scores an analysis. Pure: the same input always yields the same report.
pub fn score(result: &AnalysisResult) -> ImpactReport {
    let objects = result.objects().unwrap_or(&[]);
    let names: Vec<String> = objects.iter().map(|o| o.lower_name()).collect();
    let summary = result.summary().unwrap_or("").to_lowercase();

    let forest_objects = names
        .iter()
        .filter(|n| contains_any(n, FOREST_KEYWORDS))
        .count();
    let density = ForestDensity::from_count(forest_objects);

    let (co2_impact, co2_breakdown) = co2_impact(objects, &names, &summary, forest_objects, density);
    let health_score = health_score(objects, &names, &summary, forest_objects);

    let living_count = objects.iter().filter(|o| o.is_living()).count();
    let total_objects = objects.len();
    let biodiversity_pct = if total_objects > 0 {
        Some(living_count as f64 / total_objects as f64 * 100.0)
    } else {
        None
    };

    ImpactReport {
        co2_impact,
        co2_breakdown,
        forest_density: density,
        health_score,
        health_status: HealthStatus::from_score(health_score),
        biodiversity_pct,
        living_count,
        total_objects,
        recommendations: recommendations(result),
    }
}

fn co2_impact(
    objects: &[DetectedObject],
    names: &[String],
    summary: &str,
    forest_objects: usize,
    density: ForestDensity,
) -> (f64, Vec<String>) {
    let mut total = 0.0;
    let mut breakdown = Vec::new();

    for (obj, name) in objects.iter().zip(names) {
        let Some(rule) = CO2_RULES.iter().find(|r| r.matcher.matches(name)) else {
            continue;
        };
        let amount = if rule.scaled_by_density {
            rule.amount * density.multiplier()
        } else {
            rule.amount
        };
        let label = match rule.label {
            Label::Object(default) => obj.name.as_deref().unwrap_or(default),
            Label::Fixed(label) => label,
        };
        total += amount;
        breakdown.push(format!("{} {}: {:+.1} {}", rule.icon, label, amount, rule.unit));
    }

    if forest_objects >= 2 {
        let bonus = ECOSYSTEM_BONUS_PER_OBJECT * forest_objects as f64;
        total += bonus;
        breakdown.push(format!("🌲 {} Bonus: +{:.1} kg CO₂/day", density.label(), bonus));
    }

    if contains_any(summary, REFORESTATION_SUMMARY) {
        total += REFORESTATION_BONUS;
        breakdown.push(format!(
            "🌱 Active Reforestation Bonus: +{:.1} kg CO₂/day",
            REFORESTATION_BONUS
        ));
    }

    if contains_any(summary, MATURE_SUMMARY) {
        total += MATURITY_BONUS;
        breakdown.push(format!("🌳 Mature Forest Bonus: +{:.1} kg CO₂/day", MATURITY_BONUS));
    } else if contains_any(summary, YOUNG_SUMMARY) {
        total += YOUNG_GROWTH_BONUS;
        breakdown.push(format!(
            "🌿 Young Forest Growth Bonus: +{:.1} kg CO₂/day",
            YOUNG_GROWTH_BONUS
        ));
    }

    (total, breakdown)
}

fn health_score(
    objects: &[DetectedObject],
    names: &[String],
    summary: &str,
    forest_objects: usize,
) -> u8 {
    let mut score = HEALTH_BASE;

    for (obj, name) in objects.iter().zip(names) {
        match obj.environmental_impact.as_deref() {
            Some("positive") => score += 15,
            Some("negative") => score -= 20,
            _ => {}
        }
        if let Some((_, bonus)) = HEALTH_RULES.iter().find(|(m, _)| m.matches(name)) {
            score += bonus;
        }
    }

    if forest_objects >= 3 {
        score += 20;
    } else if forest_objects >= 2 {
        score += 15;
    }

    if contains_any(summary, REFORESTATION_SUMMARY) {
        score += 30;
    }

    score.clamp(0, 100) as u8
}

/// Exactly three recommendations: the model's own when it gave any,
/// otherwise keyword-derived ones, padded from a generic pool.
pub fn recommendations(result: &AnalysisResult) -> [String; 3] {
    let mut recs: Vec<String> = result
        .overall()
        .map(|o| o.recommendations.clone())
        .unwrap_or_default();

    if recs.is_empty() {
        recs = derive_recommendations(result.objects(), result.raw_analysis())
            .iter()
            .map(|s| s.to_string())
            .collect();
    }

    for tip in PADDING_TIPS {
        if recs.len() >= 3 {
            break;
        }
        if !recs.iter().any(|r| r == tip) {
            recs.push(tip.to_string());
        }
    }

    let mut recs = recs.into_iter();
    [
        recs.next().unwrap_or_default(),
        recs.next().unwrap_or_default(),
        recs.next().unwrap_or_default(),
    ]
}

fn derive_recommendations(
    objects: Option<&[DetectedObject]>,
    raw_analysis: Option<&str>,
) -> [&'static str; 3] {
    if let Some(objects) = objects {
        let names: Vec<String> = objects.iter().map(|o| o.lower_name()).collect();
        if names.iter().any(|n| n.contains("tree") || n.contains("forest")) {
            FOREST_TIPS
        } else if names.iter().any(|n| n.contains("waste") || n.contains("plastic")) {
            RECYCLING_TIPS
        } else {
            MONITORING_TIPS
        }
    } else if let Some(raw) = raw_analysis {
        let text = raw.to_lowercase();
        if text.contains("forest") || text.contains("tree") {
            RAW_FOREST_TIPS
        } else if text.contains("waste") || text.contains("recycl") {
            RAW_WASTE_TIPS
        } else {
            RAW_GENERAL_TIPS
        }
    } else {
        GETTING_STARTED_TIPS
    }
}
