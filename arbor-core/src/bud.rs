use glam::Quat;

/// What a bud can turn into when it flushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudType {
    /// Continues the current shoot axis.
    Apical,
    /// Starts a side branch.
    Lateral,
    Leaf,
    Fruit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudStatus {
    Dormant,
    Flushed,
    Died,
}

/// A growth-capable point on an internode.
///
/// The first bud of an internode is always the apical bud; lateral buds are
/// seeded behind the tip when the apical bud flushes.
#[derive(Debug, Clone)]
pub struct Bud {
    pub kind: BudType,
    pub status: BudStatus,
    /// Desired orientation of the shoot this bud would produce, relative to
    /// the owning internode.
    pub local_rotation: Quat,
    pub base_resource_requirement: f32,
    pub productive_resource_requirement: f32,
}

impl Bud {
    pub fn new(kind: BudType, local_rotation: Quat) -> Self {
        Self {
            kind,
            status: BudStatus::Dormant,
            local_rotation,
            base_resource_requirement: 0.0,
            productive_resource_requirement: 0.0,
        }
    }
}
