/// A trait that measures some quantity of the radio. It could be a struct or a simple named type.
pub trait Metric: Default + PartialEq + PartialOrd + Copy + Clone + Send + Sync {}

/// An enum that represents the feasibility of a metric. This is used as return type of the
/// feasibility evaluation so that the caller can get the feasibility and the actual value of the
/// metric that was measured.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Feasibility<M>
where
    M: Metric,
{
    Feasible(M),
    Infeasible(M),
}

impl<M: Metric> Feasibility<M> {
    pub fn is_feasible(&self) -> bool {
        matches!(self, Feasibility::Feasible(_))
    }
}

/// A trait that can be used on structs that contain the settings of a metric.
pub trait MetricSettings {}

/// A trait that can be used to define a consumable that can be reset at each time step.
/// This can be used to define resources that are measured as they are consumed.
pub trait Consumable<M>: Clone + Send + Sync
where
    M: Metric,
{
    type S: MetricSettings;
    fn with_settings(settings: &Self::S) -> Self;
    fn reset(&mut self);
    fn consume(&mut self, amount: M) -> Feasibility<M>;
    fn available(&self) -> M;
}
