//! The 72-square board and its plan metadata.
//!
//! Each square ("plan") carries a name and a short description, and some
//! plans are report-gated: landing there demands a written reflection before
//! the next roll. The table is plain data so tests can inject their own
//! boards and the engine stays free of I/O.

use serde::{Deserialize, Serialize};

/// Metadata for one square on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanInfo {
    /// Square number, 1-72.
    pub number: u8,
    /// Thematic name of the plan.
    pub name: String,
    /// One-line description shown to the player.
    pub description: String,
    /// Whether landing here arms the report gate.
    pub requires_report: bool,
}

/// The game board: plan metadata for squares 1-72.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    plans: Vec<PlanInfo>,
}

/// Plans that ask for a written reflection on the standard board. These are
/// the milestone squares of each row plus the finish itself.
const STANDARD_REPORT_PLANS: [u8; 9] = [10, 17, 22, 28, 37, 45, 46, 54, 68];

/// `(name, description)` for every plan on the classic board, in order 1-72.
const STANDARD_PLANS: [(&str, &str); 72] = [
    ("Genesis", "Birth; the journey begins"),
    ("Maya", "Illusion veils the nature of things"),
    ("Anger", "Heat that burns its own vessel"),
    ("Greed", "Wanting more than is needed"),
    ("Physical Plane", "Life lived through the body alone"),
    ("Delusion", "Mistaking the rope for a snake"),
    ("Conceit", "The self inflated beyond its size"),
    ("Avarice", "Hoarding against imagined lack"),
    ("Sensual Plane", "The pull of the senses"),
    ("Purification", "Cleansing of what has accumulated"),
    ("Entertainment", "Diversion from the path"),
    ("Envy", "Measuring oneself by another"),
    ("Nullity", "Emptiness without insight"),
    ("Astral Plane", "The subtle world behind the gross"),
    ("Plane of Fantasy", "Imagination unmoored"),
    ("Jealousy", "Guarding what was never owned"),
    ("Mercy", "Compassion extended without account"),
    ("Joy", "Delight that asks for nothing"),
    ("Plane of Action", "Karma; every deed bears fruit"),
    ("Charity", "Giving that frees the giver"),
    ("Atonement", "Repair of what was broken"),
    ("Dharma", "Right conduct; the path itself"),
    ("Celestial Plane", "Reward that is still within time"),
    ("Bad Company", "Association that drags downward"),
    ("Good Company", "Association that lifts"),
    ("Sorrow", "Grief as teacher"),
    ("Selfless Service", "Work offered without claim"),
    ("True Religiosity", "Practice beyond form"),
    ("Unrighteousness", "The path abandoned"),
    ("Good Tendencies", "Habits that carry upward"),
    ("Plane of Sanctity", "Holiness in ordinary things"),
    ("Plane of Balance", "Neither grasping nor refusing"),
    ("Plane of Fragrance", "Sweetness that precedes sight"),
    ("Plane of Taste", "Discernment of what nourishes"),
    ("Purgatory", "Suffering that clears the account"),
    ("Clarity", "Seeing without distortion"),
    ("Wisdom", "Gyana; knowledge become being"),
    ("Prana", "The in-breath of life"),
    ("Apana", "The out-breath; release"),
    ("Vyana", "The breath that pervades"),
    ("Human Plane", "The rare birth fit for liberation"),
    ("Plane of Agni", "Fire that transforms"),
    ("Birth of Man", "Incarnation accepted"),
    ("Ignorance", "Avidya; the root of bondage"),
    ("Right Knowledge", "Seeing things as they are"),
    ("Discrimination", "Viveka; the real from the unreal"),
    ("Neutrality", "Witness without preference"),
    ("Solar Plane", "The active, radiant current"),
    ("Lunar Plane", "The receptive, reflective current"),
    ("Plane of Austerity", "Tapas; heat of discipline"),
    ("Earth", "Groundedness; the support of all"),
    ("Plane of Violence", "Force turned against life"),
    ("Liquid Plane", "Flow; adaptation without loss"),
    ("Spiritual Devotion", "Bhakti; love as method"),
    ("Ego", "Ahamkara; the knot of I"),
    ("Plane of Primal Vibrations", "Omkara; the first sound"),
    ("Gaseous Plane", "Subtlety beyond form"),
    ("Plane of Radiation", "Tejas; light without source"),
    ("Sattva", "Purity; equilibrium of the strands"),
    ("Positive Intellect", "Mind turned toward truth"),
    ("Negativity", "Mind turned against itself"),
    ("Happiness", "Sukha; ease along the way"),
    ("Tamas", "Inertia; the weight that resists"),
    ("Phenomenal Plane", "The display of appearances"),
    ("Plane of Inner Space", "Akasha within"),
    ("Plane of Bliss", "Ananda; joy of being"),
    ("Plane of Cosmic Good", "Shubha; benevolence at scale"),
    ("Cosmic Consciousness", "The goal; union attained"),
    ("Plane of the Absolute", "Beyond attribute and form"),
    ("Sudharma", "Order that upholds the worlds"),
    ("Plane of Darkness", "The last shadow before descent"),
    ("Tamoguna", "Dissolution; the wheel turns again"),
];

impl Board {
    /// The classic 72-square Leela board.
    pub fn standard() -> Self {
        let plans = STANDARD_PLANS
            .iter()
            .enumerate()
            .map(|(i, (name, description))| {
                let number = (i + 1) as u8;
                PlanInfo {
                    number,
                    name: (*name).to_string(),
                    description: (*description).to_string(),
                    requires_report: STANDARD_REPORT_PLANS.contains(&number),
                }
            })
            .collect();
        Self { plans }
    }

    /// Build a board from explicit plan metadata. Plans must be numbered
    /// 1..=n in order.
    pub fn from_plans(plans: Vec<PlanInfo>) -> Self {
        Self { plans }
    }

    /// Whether `plan` arms the report gate. False for 0 and out-of-range.
    pub fn requires_report(&self, plan: u8) -> bool {
        self.plan_info(plan).map_or(false, |p| p.requires_report)
    }

    /// Metadata for `plan`, if it is a real square.
    pub fn plan_info(&self, plan: u8) -> Option<&PlanInfo> {
        if plan == 0 {
            return None;
        }
        self.plans.get(plan as usize - 1)
    }

    /// Number of squares on the board.
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}
