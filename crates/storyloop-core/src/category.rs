use serde::{Deserialize, Serialize};

/// Directive used when no category is known
pub const GENERIC_STRATEGY: &str = "General bedtime story.";

/// Tone/genre of a story request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    BedtimeCalm,
    Adventure,
    AnimalFable,
    Friendship,
    ProblemSolving,
    SillyFun,
    ScienceMagic,
    MysteryCozy,
    CommunityHelping,
    NatureWonder,
    SportsTeamwork,
    ArtsMusic,
    /// Fallback for anything the classifier cannot place
    #[default]
    CustomNames,
}

impl Category {
    pub const ALL: [Category; 13] = [
        Category::BedtimeCalm,
        Category::Adventure,
        Category::AnimalFable,
        Category::Friendship,
        Category::ProblemSolving,
        Category::SillyFun,
        Category::ScienceMagic,
        Category::MysteryCozy,
        Category::CommunityHelping,
        Category::NatureWonder,
        Category::SportsTeamwork,
        Category::ArtsMusic,
        Category::CustomNames,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::BedtimeCalm => "bedtime_calm",
            Category::Adventure => "adventure",
            Category::AnimalFable => "animal_fable",
            Category::Friendship => "friendship",
            Category::ProblemSolving => "problem_solving",
            Category::SillyFun => "silly_fun",
            Category::ScienceMagic => "science_magic",
            Category::MysteryCozy => "mystery_cozy",
            Category::CommunityHelping => "community_helping",
            Category::NatureWonder => "nature_wonder",
            Category::SportsTeamwork => "sports_teamwork",
            Category::ArtsMusic => "arts_music",
            Category::CustomNames => "custom_names",
        }
    }

    /// Stylistic directive handed to the generator
    pub fn strategy(self) -> &'static str {
        match self {
            Category::BedtimeCalm => {
                "Soothing cadence; a tiny, fixable hiccup; quiet sensory images; end on safety and comfort."
            }
            Category::Adventure => {
                "Curious, upbeat tone; 2-3 gentle obstacles; a safe, celebrated discovery; happy homecoming."
            }
            Category::AnimalFable => {
                "Distinct animal quirks; kind consequences; one clear moral that grows out of actions."
            }
            Category::Friendship => {
                "Name feelings; a small misunderstanding; talk it out; apology and repair; a warmer bond."
            }
            Category::ProblemSolving => {
                "Kid reasoning on the page: notice, try, adjust, succeed; simple connectors like because and so."
            }
            Category::SillyFun => {
                "Bouncy rhythm; playful absurdity or light rhyme; surprises without meanness or gross-out."
            }
            Category::ScienceMagic => {
                "Pick ONE: a simple real fact or one soft magic rule; keep it concrete and fun."
            }
            Category::MysteryCozy => {
                "A gentle puzzle with clues; zero menace; a friendly reveal; a cocoa-warm ending."
            }
            Category::CommunityHelping => {
                "Kindness in action; a small neighborhood need; teamwork; gratitude at the end."
            }
            Category::NatureWonder => {
                "Sensory awe (colors, textures, sounds); seasons, animals, or sky; a calm reflective close."
            }
            Category::SportsTeamwork => {
                "Practice and teamwork over winning; fair play; bounce back from a fixable setback."
            }
            Category::ArtsMusic => {
                "Creative expression; trying, messing up, trying again; pride in sharing; a supportive crowd."
            }
            Category::CustomNames => {
                "Center the provided names and interests; gentle stakes; affirm strengths; a proud, cozy finish."
            }
        }
    }
}

/// Directive for an optional category
pub fn strategy_for(category: Option<Category>) -> &'static str {
    category.map(Category::strategy).unwrap_or(GENERIC_STRATEGY)
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.label() == wanted)
            .ok_or_else(|| format!("Unknown category: {}", s))
    }
}
