/// How behaviors with equal priority are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriorityTieBreak {
    /// Lower catalog index first.
    #[default]
    CatalogOrder,
    /// Smallest `value - threshold` margin first, then catalog order.
    MostUrgent,
}

impl PriorityTieBreak {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "catalog" | "catalog_order" => Some(Self::CatalogOrder),
            "urgent" | "most_urgent" => Some(Self::MostUrgent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// A target closer than this counts as reached.
    pub arrival_radius: f32,
    /// Per-frame snap distance for path waypoints.
    pub waypoint_arrival_threshold: f32,
    /// Consecutive unresolved ticks before a behavior is reset; 0 never resets.
    pub max_stall_ticks: u32,
    pub tie_break: PriorityTieBreak,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            arrival_radius: 0.75,
            waypoint_arrival_threshold: 0.1,
            max_stall_ticks: 30,
            tie_break: PriorityTieBreak::CatalogOrder,
        }
    }
}

impl SimConfig {
    pub(crate) fn arrival_radius_sq(&self) -> f32 {
        self.arrival_radius * self.arrival_radius
    }
}
