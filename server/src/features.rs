//! Feature derivation from validated user attributes.
//!
//! Everything here is a pure function of its arguments.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub const TIER_1_CITIES: [&str; 7] = [
    "Mumbai", "Delhi", "Bangalore", "Chennai", "Kolkata", "Hyderabad", "Pune",
];

pub const TIER_2_CITIES: [&str; 48] = [
    "Jaipur", "Chandigarh", "Indore", "Lucknow", "Patna", "Ranchi", "Visakhapatnam", "Coimbatore",
    "Bhopal", "Nagpur", "Vadodara", "Surat", "Rajkot", "Jodhpur", "Raipur", "Amritsar", "Varanasi",
    "Agra", "Dehradun", "Mysore", "Jabalpur", "Guwahati", "Thiruvananthapuram", "Ludhiana",
    "Nashik", "Allahabad", "Udaipur", "Aurangabad", "Hubli", "Belgaum", "Salem", "Vijayawada",
    "Tiruchirappalli", "Bhavnagar", "Gwalior", "Dhanbad", "Bareilly", "Aligarh", "Gaya",
    "Kozhikode", "Warangal", "Kolhapur", "Bilaspur", "Jalandhar", "Noida", "Guntur", "Asansol",
    "Siliguri",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Occupation {
    Retired,
    Freelancer,
    Student,
    GovernmentJob,
    BusinessOwner,
    Unemployed,
    PrivateJob,
}

impl Occupation {
    pub const ALL: [Occupation; 7] = [
        Occupation::Retired,
        Occupation::Freelancer,
        Occupation::Student,
        Occupation::GovernmentJob,
        Occupation::BusinessOwner,
        Occupation::Unemployed,
        Occupation::PrivateJob,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Occupation::Retired => "retired",
            Occupation::Freelancer => "freelancer",
            Occupation::Student => "student",
            Occupation::GovernmentJob => "government_job",
            Occupation::BusinessOwner => "business_owner",
            Occupation::Unemployed => "unemployed",
            Occupation::PrivateJob => "private_job",
        }
    }
}

impl FromStr for Occupation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Occupation::ALL
            .iter()
            .copied()
            .find(|o| o.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for Occupation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifestyleRisk {
    High,
    Medium,
    Low,
}

impl LifestyleRisk {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifestyleRisk::High => "high",
            LifestyleRisk::Medium => "medium",
            LifestyleRisk::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    Young,
    Adult,
    MiddleAged,
    Senior,
}

impl AgeGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::Young => "young",
            AgeGroup::Adult => "adult",
            AgeGroup::MiddleAged => "middle_aged",
            AgeGroup::Senior => "senior",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CityTier {
    One,
    Two,
    Three,
}

impl CityTier {
    pub fn number(&self) -> u8 {
        match self {
            CityTier::One => 1,
            CityTier::Two => 2,
            CityTier::Three => 3,
        }
    }
}

impl Serialize for CityTier {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.number())
    }
}

/// Values computed from a validated input, never supplied by the client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedFeatures {
    #[serde(rename = "BMI")]
    pub bmi: f64,
    #[serde(rename = "lifeStyle_risk")]
    pub lifestyle_risk: LifestyleRisk,
    pub age_group: AgeGroup,
    pub city_tier: CityTier,
}

/// Trims surrounding whitespace and title-cases every word.
///
/// A cased letter that follows another cased letter is lowercased, every other
/// cased letter is uppercased, so "new DELHI" becomes "New Delhi" and
/// "o'neil" becomes "O'Neil".
pub fn normalize_city(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut prev_cased = false;
    for c in raw.trim().chars() {
        let cased = c.is_uppercase() || c.is_lowercase();
        if cased && prev_cased {
            out.extend(c.to_lowercase());
        } else if cased {
            // Multi-char uppercase forms ("ß" -> "SS") keep only the first letter upper
            let mut upper = c.to_uppercase();
            if let Some(first) = upper.next() {
                out.push(first);
            }
            for rest in upper {
                out.extend(rest.to_lowercase());
            }
        } else {
            out.push(c);
        }
        prev_cased = cased;
    }
    out
}

/// Body-mass index. Callers guarantee `height > 0`.
pub fn derive_bmi(weight: f64, height: f64) -> f64 {
    debug_assert!(height > 0.0, "height must be positive");
    weight / (height * height)
}

/// Smokers with a BMI in [27, 30] fall through to `Low`.
pub fn derive_lifestyle_risk(smoker: bool, bmi: f64) -> LifestyleRisk {
    if smoker && bmi > 30.0 {
        LifestyleRisk::High
    } else if smoker && bmi < 27.0 {
        LifestyleRisk::Medium
    } else {
        LifestyleRisk::Low
    }
}

pub fn derive_age_group(age: u32) -> AgeGroup {
    if age < 25 {
        AgeGroup::Young
    } else if age < 45 {
        AgeGroup::Adult
    } else if age < 60 {
        AgeGroup::MiddleAged
    } else {
        AgeGroup::Senior
    }
}

/// Tier lookup on an already normalized city name; unlisted cities are tier 3.
pub fn derive_city_tier(city: &str) -> CityTier {
    if TIER_1_CITIES.contains(&city) {
        CityTier::One
    } else if TIER_2_CITIES.contains(&city) {
        CityTier::Two
    } else {
        CityTier::Three
    }
}
