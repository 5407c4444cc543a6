use rand_distr::{Distribution, Exp, Normal, Uniform};
use rand_pcg::Pcg64Mcg;
use serde::Deserialize;

#[derive(Debug, Clone, Copy)]
pub enum DistType {
    Constant(f64),
    Uniform(Uniform<f64>),
    Normal(Normal<f64>),
    Exponential(Exp<f64>),
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DistParams {
    pub dist_name: String,
    pub seed: Option<u64>,
    pub value: Option<f64>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub rate: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl DistParams {
    pub fn constant(value: f64) -> Self {
        Self {
            dist_name: "constant".to_string(),
            value: Some(value),
            ..Self::default()
        }
    }

    pub fn uniform(min: f64, max: f64) -> Self {
        Self {
            dist_name: "uniform".to_string(),
            min: Some(min),
            max: Some(max),
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl DistType {
    pub fn new(params: &DistParams) -> Self {
        let built = match params.dist_name.to_lowercase().as_str() {
            "constant" => Self::build_constant(params),
            "uniform" => Self::build_uniform(params),
            "normal" => Self::build_normal(params),
            "exponential" => Self::build_exponential(params),
            _ => panic!(
                "Invalid distribution name {}. Supported values are:\
                     constant, uniform, normal, exponential",
                params.dist_name
            ),
        };
        match built {
            Ok(dist) => dist,
            Err(e) => panic!("Invalid distribution parameters {:?}: {}", params, e),
        }
    }

    fn build_constant(dist_params: &DistParams) -> Result<Self, Box<dyn std::error::Error>> {
        let value = dist_params.value.ok_or("Missing value")?;
        Ok(Self::Constant(value))
    }

    fn build_uniform(dist_params: &DistParams) -> Result<Self, Box<dyn std::error::Error>> {
        let min = dist_params.min.ok_or("Missing min")?;
        let max = dist_params.max.ok_or("Missing max")?;
        if min > max {
            return Err(format!("min {} is larger than max {}", min, max).into());
        }
        // A degenerate range behaves like a constant.
        if min == max {
            return Ok(Self::Constant(min));
        }
        Ok(Self::Uniform(Uniform::new(min, max)))
    }

    fn build_normal(dist_params: &DistParams) -> Result<Self, Box<dyn std::error::Error>> {
        let mean = dist_params.mean.ok_or("Missing mean")?;
        let std_dev = dist_params.std_dev.ok_or("Missing std_dev")?;
        Ok(Self::Normal(Normal::new(mean, std_dev)?))
    }

    fn build_exponential(dist_params: &DistParams) -> Result<Self, Box<dyn std::error::Error>> {
        let rate = dist_params.rate.ok_or("Missing rate")?;
        Ok(Self::Exponential(Exp::new(rate)?))
    }
}

#[derive(Debug, Clone)]
pub struct RngSampler {
    pub dist: DistType,
    pub rng: Pcg64Mcg,
}

impl RngSampler {
    pub fn new(params: &DistParams) -> Self {
        let seed: u128 = params.seed.unwrap_or(0) as u128;
        let dist = DistType::new(params);
        Self {
            dist,
            rng: Pcg64Mcg::new(seed),
        }
    }

    pub fn sample(&mut self) -> f64 {
        match self.dist {
            DistType::Constant(value) => value,
            DistType::Uniform(ref dist) => dist.sample(&mut self.rng),
            DistType::Normal(ref dist) => dist.sample(&mut self.rng),
            DistType::Exponential(ref dist) => dist.sample(&mut self.rng),
        }
    }
}

/// Draws unit-interval values for the allocators and direction pickers.
#[derive(Debug, Clone)]
pub struct UnitSampler {
    rng: Pcg64Mcg,
    unit: Uniform<f64>,
}

impl UnitSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg64Mcg::new(seed as u128),
            unit: Uniform::new(0.0, 1.0),
        }
    }

    pub fn next_unit(&mut self) -> f64 {
        self.unit.sample(&mut self.rng)
    }

    pub fn next_in(&mut self, min: f64, max: f64) -> f64 {
        min + (max - min) * self.next_unit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_samples_stay_in_range() {
        let mut sampler = RngSampler::new(&DistParams::uniform(10.0, 50.0).with_seed(7));
        for _ in 0..1000 {
            let value = sampler.sample();
            assert!((10.0..50.0).contains(&value));
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let params = DistParams::uniform(0.0, 1.0).with_seed(42);
        let mut first = RngSampler::new(&params);
        let mut second = RngSampler::new(&params);
        for _ in 0..10 {
            assert_eq!(first.sample(), second.sample());
        }
    }

    #[test]
    fn degenerate_uniform_is_constant() {
        let mut sampler = RngSampler::new(&DistParams::uniform(20.0, 20.0));
        assert_eq!(sampler.sample(), 20.0);
    }
}
